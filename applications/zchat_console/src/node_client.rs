// Copyright 2020. The Tari Project
//
// Redistribution and use in source and binary forms, with or without modification, are permitted provided that the
// following conditions are met:
//
// 1. Redistributions of source code must retain the above copyright notice, this list of conditions and the following
// disclaimer.
//
// 2. Redistributions in binary form must reproduce the above copyright notice, this list of conditions and the
// following disclaimer in the documentation and/or other materials provided with the distribution.
//
// 3. Neither the name of the copyright holder nor the names of its contributors may be used to endorse or promote
// products derived from this software without specific prior written permission.
//
// THIS SOFTWARE IS PROVIDED BY THE COPYRIGHT HOLDERS AND CONTRIBUTORS "AS IS" AND ANY EXPRESS OR IMPLIED WARRANTIES,
// INCLUDING, BUT NOT LIMITED TO, THE IMPLIED WARRANTIES OF MERCHANTABILITY AND FITNESS FOR A PARTICULAR PURPOSE ARE
// DISCLAIMED. IN NO EVENT SHALL THE COPYRIGHT HOLDER OR CONTRIBUTORS BE LIABLE FOR ANY DIRECT, INDIRECT, INCIDENTAL,
// SPECIAL, EXEMPLARY, OR CONSEQUENTIAL DAMAGES (INCLUDING, BUT NOT LIMITED TO, PROCUREMENT OF SUBSTITUTE GOODS OR
// SERVICES; LOSS OF USE, DATA, OR PROFITS; OR BUSINESS INTERRUPTION) HOWEVER CAUSED AND ON ANY THEORY OF LIABILITY,
// WHETHER IN CONTRACT, STRICT LIABILITY, OR TORT (INCLUDING NEGLIGENCE OR OTHERWISE) ARISING IN ANY WAY OUT OF THE
// USE OF THIS SOFTWARE, EVEN IF ADVISED OF THE POSSIBILITY OF SUCH DAMAGE.

//! JSON-RPC client for the shielded node.
//!
//! `jsonrpc` performs blocking HTTP requests, so every call is moved onto the blocking thread pool.

use futures::{future::BoxFuture, FutureExt};
use jsonrpc::client::Client;
use log::*;
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::task;
use zchat_messaging::{
    rpc::{ChainRpc, OperationResult, OperationStatus, RpcError, ShieldedPayment, UnspentOutput},
    types::{Amount, OperationId},
};

const LOG_TARGET: &str = "zchat::console::node_client";

/// Unconfirmed notes are included so that messages show up as soon as they reach the mempool
const MIN_CONFIRMATIONS: u64 = 0;
const MAX_CONFIRMATIONS: u64 = 9_999_999;
/// Confirmations required of the notes spent by an outgoing payment
const SEND_MIN_CONFIRMATIONS: u64 = 1;

#[derive(Clone)]
pub struct NodeClient {
    client: Arc<Client>,
}

impl NodeClient {
    pub fn new(url: String, user: Option<String>, password: Option<String>) -> Self {
        Self {
            client: Arc::new(Client::new(url, user, password)),
        }
    }

    async fn call<T>(&self, method: &'static str, params: Vec<Value>) -> Result<T, RpcError>
    where T: DeserializeOwned + Send + 'static {
        let client = self.client.clone();
        trace!(target: LOG_TARGET, "Calling {}", method);
        task::spawn_blocking(move || {
            let request = client.build_request(method, &params);
            let response = client
                .send_request(&request)
                .map_err(|e| RpcError::Transport(e.to_string()))?;
            response.into_result::<T>().map_err(|e| {
                debug!(target: LOG_TARGET, "{} failed: {}", method, e);
                RpcError::Node(e.to_string())
            })
        })
        .await
        .map_err(|e| RpcError::Transport(e.to_string()))?
    }
}

impl ChainRpc for NodeClient {
    fn list_unspent(&self, address: String) -> BoxFuture<'_, Result<Vec<UnspentOutput>, RpcError>> {
        async move {
            let notes: Vec<UnspentNote> = self
                .call("z_listunspent", vec![
                    json!(MIN_CONFIRMATIONS),
                    json!(MAX_CONFIRMATIONS),
                    json!(true),
                    json!([address]),
                ])
                .await?;
            Ok(notes.into_iter().map(UnspentOutput::from).collect())
        }
        .boxed()
    }

    fn send_shielded(&self, payment: ShieldedPayment) -> BoxFuture<'_, Result<OperationId, RpcError>> {
        async move {
            let recipients = json!([{
                "address": payment.to_address,
                "amount": payment.amount.as_coins(),
                "memo": payment.memo_hex,
            }]);
            self.call("z_sendmany", vec![
                json!(payment.from_address),
                recipients,
                json!(SEND_MIN_CONFIRMATIONS),
                json!(payment.fee.as_coins()),
            ])
            .await
        }
        .boxed()
    }

    fn operation_status(&self, operation: OperationId) -> BoxFuture<'_, Result<OperationStatus, RpcError>> {
        async move {
            let reports: Vec<OperationReport> = self.call("z_getoperationstatus", vec![json!([operation])]).await?;
            match find_report(reports, &operation) {
                Some(report) => report.status(),
                None => Err(RpcError::UnexpectedResponse(format!(
                    "the node does not know operation {}",
                    operation
                ))),
            }
        }
        .boxed()
    }

    fn operation_result(&self, operation: OperationId) -> BoxFuture<'_, Result<Option<OperationResult>, RpcError>> {
        async move {
            let reports: Vec<OperationReport> = self.call("z_getoperationresult", vec![json!([operation])]).await?;
            find_report(reports, &operation)
                .map(OperationReport::into_result)
                .transpose()
        }
        .boxed()
    }

    fn validate_address(&self, address: String) -> BoxFuture<'_, Result<bool, RpcError>> {
        async move {
            let validation: AddressValidation = self.call("z_validateaddress", vec![json!(address)]).await?;
            Ok(validation.isvalid)
        }
        .boxed()
    }

    fn new_shielded_address(&self) -> BoxFuture<'_, Result<String, RpcError>> {
        self.call("z_getnewaddress", vec![json!("sapling")]).boxed()
    }

    fn export_key(&self, address: String) -> BoxFuture<'_, Result<String, RpcError>> {
        async move { self.call("z_exportkey", vec![json!(address)]).await }.boxed()
    }

    fn shielded_balance(&self, address: String) -> BoxFuture<'_, Result<Amount, RpcError>> {
        async move {
            let balance: f64 = self.call("z_getbalance", vec![json!(address)]).await?;
            Ok(Amount::from_coins(balance))
        }
        .boxed()
    }
}

#[derive(Debug, Deserialize)]
struct UnspentNote {
    txid: String,
    amount: f64,
    #[serde(default)]
    memo: String,
}

impl From<UnspentNote> for UnspentOutput {
    fn from(note: UnspentNote) -> Self {
        UnspentOutput {
            txid: note.txid,
            amount: Amount::from_coins(note.amount),
            memo: note.memo,
        }
    }
}

#[derive(Debug, Deserialize)]
struct OperationReport {
    id: String,
    status: String,
    #[serde(default)]
    result: Option<OperationTxid>,
    #[serde(default)]
    error: Option<OperationFailure>,
}

#[derive(Debug, Deserialize)]
struct OperationTxid {
    txid: String,
}

#[derive(Debug, Deserialize)]
struct OperationFailure {
    message: String,
}

impl OperationReport {
    fn status(&self) -> Result<OperationStatus, RpcError> {
        OperationStatus::from_node_status(&self.status, self.error.as_ref().map(|e| e.message.clone()))
    }

    fn into_result(self) -> Result<OperationResult, RpcError> {
        Ok(OperationResult {
            status: self.status()?,
            txid: self.result.map(|r| r.txid),
        })
    }
}

fn find_report(reports: Vec<OperationReport>, operation: &str) -> Option<OperationReport> {
    reports.into_iter().find(|r| r.id == operation)
}

#[derive(Debug, Deserialize)]
struct AddressValidation {
    isvalid: bool,
}
