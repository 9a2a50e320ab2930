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

//! The chain RPC collaborator.
//!
//! The messaging core only needs a handful of node calls. They are modelled as a trait returning boxed futures so
//! that the ledger scanner and outbound sends can run on spawned tasks regardless of the concrete client.

use crate::types::{Amount, OperationId, TxId};
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum RpcError {
    #[error("Could not reach the node: {0}")]
    Transport(String),
    #[error("The node returned an error: {0}")]
    Node(String),
    #[error("Unexpected response from the node: {0}")]
    UnexpectedResponse(String),
}

/// An unspent shielded note sent to one of our addresses
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UnspentOutput {
    pub txid: TxId,
    pub amount: Amount,
    /// The raw memo, hex encoded
    pub memo: String,
}

/// A shielded payment carrying a memo
#[derive(Clone, Debug, PartialEq)]
pub struct ShieldedPayment {
    pub from_address: String,
    pub to_address: String,
    pub amount: Amount,
    pub fee: Amount,
    pub memo_hex: String,
}

/// Lifecycle states of an asynchronous node operation
#[derive(Clone, Debug, PartialEq)]
pub enum OperationStatus {
    Queued,
    Executing,
    Success,
    Failed(String),
    Cancelled,
}

impl OperationStatus {
    /// Parses the `status` string reported by the node
    pub fn from_node_status(status: &str, error: Option<String>) -> Result<Self, RpcError> {
        match status {
            "queued" => Ok(OperationStatus::Queued),
            "executing" => Ok(OperationStatus::Executing),
            "success" => Ok(OperationStatus::Success),
            "failed" => Ok(OperationStatus::Failed(
                error.unwrap_or_else(|| "no reason given".to_string()),
            )),
            "cancelled" => Ok(OperationStatus::Cancelled),
            other => Err(RpcError::UnexpectedResponse(format!("unknown operation status '{}'", other))),
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, OperationStatus::Queued | OperationStatus::Executing)
    }
}

/// The final result of an operation, once the node has one
#[derive(Clone, Debug, PartialEq)]
pub struct OperationResult {
    pub status: OperationStatus,
    pub txid: Option<TxId>,
}

pub trait ChainRpc: Send + Sync + 'static {
    /// All unspent shielded outputs received by `address`, including unconfirmed ones
    fn list_unspent(&self, address: String) -> BoxFuture<'_, Result<Vec<UnspentOutput>, RpcError>>;

    /// Submit a shielded payment. Returns the handle of the asynchronous node operation.
    fn send_shielded(&self, payment: ShieldedPayment) -> BoxFuture<'_, Result<OperationId, RpcError>>;

    fn operation_status(&self, operation: OperationId) -> BoxFuture<'_, Result<OperationStatus, RpcError>>;

    /// `None` while the node has no result for the operation yet
    fn operation_result(&self, operation: OperationId) -> BoxFuture<'_, Result<Option<OperationResult>, RpcError>>;

    fn validate_address(&self, address: String) -> BoxFuture<'_, Result<bool, RpcError>>;

    fn new_shielded_address(&self) -> BoxFuture<'_, Result<String, RpcError>>;

    fn export_key(&self, address: String) -> BoxFuture<'_, Result<String, RpcError>>;

    fn shielded_balance(&self, address: String) -> BoxFuture<'_, Result<Amount, RpcError>>;
}
