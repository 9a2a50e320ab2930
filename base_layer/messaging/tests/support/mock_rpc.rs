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

use futures::{future, future::BoxFuture, FutureExt};
use std::{
    collections::{HashMap, HashSet, VecDeque},
    sync::{Arc, Mutex},
};
use zchat_messaging::{
    memo,
    rpc::{ChainRpc, OperationResult, OperationStatus, RpcError, ShieldedPayment, UnspentOutput},
    types::{Amount, OperationId, TxId},
};

struct MockState {
    unspent: HashMap<String, Vec<UnspentOutput>>,
    calls: Vec<String>,
    payments: Vec<ShieldedPayment>,
    operations: HashMap<OperationId, TxId>,
    status_script: VecDeque<OperationStatus>,
    final_status: OperationStatus,
    empty_results: usize,
    invalid_addresses: HashSet<String>,
    balance: Amount,
    failure: Option<RpcError>,
    counter: usize,
}

/// A chain RPC mock that behaves like a tiny shared ledger: successful payments show up as unspent outputs of the
/// destination address, so several services sharing one mock can talk to each other.
#[derive(Clone)]
pub struct MockChainRpc {
    state: Arc<Mutex<MockState>>,
}

impl MockChainRpc {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState {
                unspent: HashMap::new(),
                calls: Vec::new(),
                payments: Vec::new(),
                operations: HashMap::new(),
                status_script: VecDeque::new(),
                final_status: OperationStatus::Success,
                empty_results: 0,
                invalid_addresses: HashSet::new(),
                balance: Amount(100_000_000),
                failure: None,
                counter: 0,
            })),
        }
    }

    pub fn add_unspent(&self, address: &str, output: UnspentOutput) {
        let mut state = self.state.lock().unwrap();
        state.unspent.entry(address.to_string()).or_default().push(output);
    }

    pub fn unspent(&self, address: &str) -> Vec<UnspentOutput> {
        let state = self.state.lock().unwrap();
        state.unspent.get(address).cloned().unwrap_or_default()
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn call_count(&self, method: &str) -> usize {
        self.state.lock().unwrap().calls.iter().filter(|c| *c == method).count()
    }

    pub fn clear_calls(&self) {
        self.state.lock().unwrap().calls.clear();
    }

    pub fn payments(&self) -> Vec<ShieldedPayment> {
        self.state.lock().unwrap().payments.clone()
    }

    /// Statuses returned, in order, before the final status
    pub fn set_status_script(&self, statuses: Vec<OperationStatus>) {
        self.state.lock().unwrap().status_script = statuses.into();
    }

    pub fn set_final_status(&self, status: OperationStatus) {
        self.state.lock().unwrap().final_status = status;
    }

    /// Number of result polls answered with "no result yet"
    pub fn set_empty_results(&self, count: usize) {
        self.state.lock().unwrap().empty_results = count;
    }

    pub fn mark_invalid(&self, address: &str) {
        self.state.lock().unwrap().invalid_addresses.insert(address.to_string());
    }

    pub fn set_balance(&self, balance: Amount) {
        self.state.lock().unwrap().balance = balance;
    }

    /// Make every call fail with `error` until cleared with `None`
    pub fn fail_with(&self, error: Option<RpcError>) {
        self.state.lock().unwrap().failure = error;
    }

    fn call<T, F>(&self, method: &str, f: F) -> BoxFuture<'_, Result<T, RpcError>>
    where
        T: Send + 'static,
        F: FnOnce(&mut MockState) -> Result<T, RpcError>,
    {
        let mut state = self.state.lock().unwrap();
        state.calls.push(method.to_string());
        let result = match state.failure.clone() {
            Some(err) => Err(err),
            None => f(&mut state),
        };
        future::ready(result).boxed()
    }
}

impl ChainRpc for MockChainRpc {
    fn list_unspent(&self, address: String) -> BoxFuture<'_, Result<Vec<UnspentOutput>, RpcError>> {
        self.call("z_listunspent", move |state| {
            Ok(state.unspent.get(&address).cloned().unwrap_or_default())
        })
    }

    fn send_shielded(&self, payment: ShieldedPayment) -> BoxFuture<'_, Result<OperationId, RpcError>> {
        self.call("z_sendmany", move |state| {
            state.counter += 1;
            let operation = format!("opid-{}", state.counter);
            let txid = format!("tx-{:04}", state.counter);
            if state.final_status == OperationStatus::Success {
                let output = UnspentOutput {
                    txid: txid.clone(),
                    amount: payment.amount,
                    memo: payment.memo_hex.clone(),
                };
                let outputs = state.unspent.entry(payment.to_address.clone()).or_default();
                // Sending to ourselves spends every note we had
                if payment.to_address == payment.from_address {
                    outputs.clear();
                }
                outputs.push(output);
            }
            state.operations.insert(operation.clone(), txid);
            state.payments.push(payment);
            Ok(operation)
        })
    }

    fn operation_status(&self, operation: OperationId) -> BoxFuture<'_, Result<OperationStatus, RpcError>> {
        self.call("z_getoperationstatus", move |state| {
            if !state.operations.contains_key(&operation) {
                return Err(RpcError::Node(format!("unknown operation {}", operation)));
            }
            Ok(state
                .status_script
                .pop_front()
                .unwrap_or_else(|| state.final_status.clone()))
        })
    }

    fn operation_result(&self, operation: OperationId) -> BoxFuture<'_, Result<Option<OperationResult>, RpcError>> {
        self.call("z_getoperationresult", move |state| {
            if state.empty_results > 0 {
                state.empty_results -= 1;
                return Ok(None);
            }
            let txid = state.operations.get(&operation).cloned();
            let status = state.final_status.clone();
            let txid = if status == OperationStatus::Success { txid } else { None };
            Ok(Some(OperationResult { status, txid }))
        })
    }

    fn validate_address(&self, address: String) -> BoxFuture<'_, Result<bool, RpcError>> {
        self.call("z_validateaddress", move |state| {
            Ok(address.starts_with("zs1") && !state.invalid_addresses.contains(&address))
        })
    }

    fn new_shielded_address(&self) -> BoxFuture<'_, Result<String, RpcError>> {
        self.call("z_getnewaddress", |state| {
            state.counter += 1;
            Ok(format!("zs1mockaddress{:04}", state.counter))
        })
    }

    fn export_key(&self, address: String) -> BoxFuture<'_, Result<String, RpcError>> {
        self.call("z_exportkey", move |_| Ok(format!("secret-extended-key-{}", address)))
    }

    fn shielded_balance(&self, _address: String) -> BoxFuture<'_, Result<Amount, RpcError>> {
        self.call("z_getbalance", |state| Ok(state.balance))
    }
}

/// An unspent output carrying a plain text memo
pub fn plain_output(txid: &str, text: &str) -> UnspentOutput {
    UnspentOutput {
        txid: txid.to_string(),
        amount: Amount(10_000),
        memo: memo::encode_text(text),
    }
}
