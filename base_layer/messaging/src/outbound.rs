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

use crate::{
    config::MessagingConfig,
    error::{MessagingError, MessagingStorageError, SendError},
    memo::{self, Envelope},
    rpc::{ChainRpc, OperationResult, OperationStatus, ShieldedPayment},
    storage::database::{DbKeyValuePair, MessagingBackend, MessagingDatabase, WriteOperation},
    types::{Amount, OperationId, TxId},
};
use futures::FutureExt;
use log::*;
use std::sync::Arc;
use tokio::time::delay_for;
use zchat_shutdown::ShutdownSignal;

const LOG_TARGET: &str = "zchat::messaging::outbound";

/// Store state an outbound send was validated against
#[derive(Debug, Clone, PartialEq)]
pub enum Precondition {
    /// The address is not banned and not a contact
    Requestable(String),
    /// The request from `address` is still pending, unbanned, and no contact holds its id
    PendingRequest { address: String, id: String },
    /// The contact still exists at `address`, which is not banned
    Contact { contact_id: String, address: String },
}

impl Precondition {
    fn address(&self) -> &str {
        match self {
            Precondition::Requestable(address) => address,
            Precondition::PendingRequest { address, .. } => address,
            Precondition::Contact { address, .. } => address,
        }
    }
}

/// Sends memo carrying payments and drives the node's asynchronous operation to a confirmed transaction id.
///
/// Nothing is written to the store unless the node reports a txid. Once it does, the txid is marked processed in the
/// same batch as the caller's mutations so that the ledger scanner never ingests our own payment.
pub struct OutboundMessenger<R, B>
where
    R: ChainRpc,
    B: MessagingBackend + 'static,
{
    rpc: Arc<R>,
    db: MessagingDatabase<B>,
    config: MessagingConfig,
    shutdown_signal: ShutdownSignal,
}

impl<R, B> OutboundMessenger<R, B>
where
    R: ChainRpc,
    B: MessagingBackend + 'static,
{
    pub fn new(rpc: Arc<R>, db: MessagingDatabase<B>, config: MessagingConfig, shutdown_signal: ShutdownSignal) -> Self {
        Self {
            rpc,
            db,
            config,
            shutdown_signal,
        }
    }

    /// Encode `envelope`, send it and, once confirmed, apply the mutations returned by `on_confirmed` together with the
    /// processed mark for the new txid.
    ///
    /// The send can take many polls, so `precondition` is checked again under the write lock before anything is
    /// written. If it no longer holds only the processed mark is stored and `SendError::Superseded` is returned.
    #[allow(clippy::too_many_arguments)]
    pub async fn send_envelope<F, T>(
        &self,
        from_address: &str,
        to_address: &str,
        amount: Amount,
        fee: Amount,
        envelope: &Envelope,
        precondition: &Precondition,
        on_confirmed: F,
    ) -> Result<(TxId, T), MessagingError>
    where
        F: FnOnce(&TxId) -> (T, Vec<WriteOperation>),
    {
        let memo_hex = memo::encode(envelope).map_err(|e| SendError::Encoding(e.to_string()))?;
        let txid = self
            .send_memo(from_address, to_address, amount, fee, memo_hex)
            .await?;
        debug!(
            target: LOG_TARGET,
            "{} envelope to {} confirmed with txid {}",
            envelope.kind(),
            to_address,
            txid
        );

        let guard = self.db.acquire_write_lock().await;
        let mut operations = vec![WriteOperation::Insert(DbKeyValuePair::ProcessedTx(txid.clone()))];
        if let Some(reason) = self.violation(precondition).await? {
            warn!(
                target: LOG_TARGET,
                "{} envelope {} confirmed but {}, local state not updated",
                envelope.kind(),
                txid,
                reason
            );
            self.db.write_batch(&guard, operations).await?;
            return Err(SendError::Superseded { txid, reason }.into());
        }

        let (output, mutations) = on_confirmed(&txid);
        operations.extend(mutations);
        self.db.write_batch(&guard, operations).await?;
        Ok((txid, output))
    }

    /// Describes why `precondition` no longer holds, if it doesn't. Must be called with the write lock held.
    async fn violation(&self, precondition: &Precondition) -> Result<Option<String>, MessagingStorageError> {
        let address = precondition.address();
        if self.db.is_banned(address.to_string()).await? {
            return Ok(Some(format!("{} was banned", address)));
        }
        let reason = match precondition {
            Precondition::Requestable(address) => self
                .db
                .get_contact_by_address(address.clone())
                .await?
                .map(|_| format!("{} became a contact", address)),
            Precondition::PendingRequest { address, id } => {
                if self.db.get_pending_request(address.clone()).await?.is_none() {
                    Some(format!("the request from {} is no longer pending", address))
                } else if self.db.get_contact(id.clone()).await?.is_some() {
                    Some(format!("contact id {} is already in use", id))
                } else {
                    None
                }
            },
            Precondition::Contact { contact_id, address } => match self.db.get_contact(contact_id.clone()).await? {
                Some(contact) if &contact.address == address => None,
                _ => Some(format!("contact {} was removed", contact_id)),
            },
        };
        Ok(reason)
    }

    /// Send a payment carrying an already encoded memo and wait for its txid. Does not touch the store.
    pub async fn send_memo(
        &self,
        from_address: &str,
        to_address: &str,
        amount: Amount,
        fee: Amount,
        memo_hex: String,
    ) -> Result<TxId, SendError>
    {
        let size = memo::memo_size(&memo_hex);
        if size > self.config.max_memo_bytes {
            return Err(SendError::MemoTooLarge {
                size,
                max: self.config.max_memo_bytes,
            });
        }

        let operation = self
            .rpc
            .send_shielded(ShieldedPayment {
                from_address: from_address.to_string(),
                to_address: to_address.to_string(),
                amount,
                fee,
                memo_hex,
            })
            .await?;
        trace!(target: LOG_TARGET, "Payment to {} submitted as operation {}", to_address, operation);

        self.wait_for_txid(operation).await
    }

    /// Polls the operation status until it leaves queued/executing, then polls the result until it carries a txid
    async fn wait_for_txid(&self, operation: OperationId) -> Result<TxId, SendError> {
        let max_polls = self.config.max_operation_polls;
        let mut polls = 0;

        loop {
            if polls >= max_polls {
                return Err(self.timed_out(&operation, polls));
            }
            polls += 1;
            match self.rpc.operation_status(operation.clone()).await? {
                OperationStatus::Queued | OperationStatus::Executing => self.pause().await?,
                OperationStatus::Success => break,
                OperationStatus::Failed(reason) => {
                    warn!(target: LOG_TARGET, "Operation {} failed: {}", operation, reason);
                    return Err(SendError::OperationFailed(reason));
                },
                OperationStatus::Cancelled => return Err(SendError::OperationCancelled),
            }
        }

        loop {
            if polls >= max_polls {
                return Err(self.timed_out(&operation, polls));
            }
            polls += 1;
            match self.rpc.operation_result(operation.clone()).await? {
                Some(OperationResult {
                    status: OperationStatus::Failed(reason),
                    ..
                }) => return Err(SendError::OperationFailed(reason)),
                Some(OperationResult {
                    status: OperationStatus::Cancelled,
                    ..
                }) => return Err(SendError::OperationCancelled),
                Some(OperationResult { txid: Some(txid), .. }) => return Ok(txid),
                _ => self.pause().await?,
            }
        }
    }

    async fn pause(&self) -> Result<(), SendError> {
        let mut shutdown = self.shutdown_signal.clone();
        futures::select! {
            _ = delay_for(self.config.operation_poll_interval).fuse() => Ok(()),
            _ = shutdown => Err(SendError::Interrupted),
        }
    }

    fn timed_out(&self, operation: &str, polls: usize) -> SendError {
        warn!(
            target: LOG_TARGET,
            "Operation {} did not produce a txid after {} polls", operation, polls
        );
        SendError::Timeout(polls)
    }
}

impl<R, B> Clone for OutboundMessenger<R, B>
where
    R: ChainRpc,
    B: MessagingBackend + 'static,
{
    fn clone(&self) -> Self {
        Self {
            rpc: self.rpc.clone(),
            db: self.db.clone(),
            config: self.config.clone(),
            shutdown_signal: self.shutdown_signal.clone(),
        }
    }
}
