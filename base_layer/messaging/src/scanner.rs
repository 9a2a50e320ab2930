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

//! # Ledger scanner
//!
//! The node offers no push channel, so inbound envelopes are found by polling the unspent shielded outputs of our
//! identity address. Every call returns the full history, so a txid is processed at most once: the processed mark is
//! written in the same atomic batch as whatever the protocol engine decided for that output.

use crate::{
    config::MessagingConfig,
    error::MessagingError,
    handle::MessagingEvent,
    memo::{self, Envelope},
    outbound::OutboundMessenger,
    protocol::{self, ConversationView, Decision, Delivery, Notification, SweepMode, TrustFacts},
    rpc::{ChainRpc, UnspentOutput},
    storage::database::{DbKeyValuePair, MessagingBackend, MessagingDatabase, WriteOperation},
    types::{Identity, MessageClock, TxId},
};
use futures::{pin_mut, FutureExt};
use log::*;
use std::sync::{Arc, RwLock};
use tokio::{sync::broadcast, time::delay_for};
use zchat_shutdown::ShutdownSignal;

const LOG_TARGET: &str = "zchat::messaging::scanner";

/// Plain text memo used for note consolidation payments
pub const CONSOLIDATION_MEMO: &str = "merge";

/// The outcome of a single sweep
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ScanReport {
    /// Unspent outputs returned by the node, processed or not
    pub outputs_seen: usize,
    /// Outputs consumed by this sweep
    pub newly_processed: usize,
    /// Outputs whose envelope changed the store
    pub applied: usize,
    pub ignored: usize,
    /// Outputs whose memo was not a protocol envelope
    pub not_protocol: usize,
    pub requests: usize,
    pub accepted: usize,
    pub messages: usize,
    pub consolidation_txid: Option<TxId>,
}

pub struct LedgerScanner<R, B>
where
    R: ChainRpc,
    B: MessagingBackend + 'static,
{
    rpc: Arc<R>,
    db: MessagingDatabase<B>,
    outbound: OutboundMessenger<R, B>,
    config: MessagingConfig,
    clock: Arc<MessageClock>,
    view: Arc<RwLock<ConversationView>>,
    event_publisher: broadcast::Sender<Arc<MessagingEvent>>,
}

impl<R, B> LedgerScanner<R, B>
where
    R: ChainRpc,
    B: MessagingBackend + 'static,
{
    pub fn new(
        rpc: Arc<R>,
        db: MessagingDatabase<B>,
        outbound: OutboundMessenger<R, B>,
        config: MessagingConfig,
        clock: Arc<MessageClock>,
        view: Arc<RwLock<ConversationView>>,
        event_publisher: broadcast::Sender<Arc<MessagingEvent>>,
    ) -> Self
    {
        Self {
            rpc,
            db,
            outbound,
            config,
            clock,
            view,
            event_publisher,
        }
    }

    /// Run the startup sweep, then sweep every `scan_interval` until shutdown. Failed sweeps are logged and retried on
    /// the next tick.
    pub async fn run(self, mut shutdown_signal: ShutdownSignal) {
        info!(target: LOG_TARGET, "Ledger scanner started");
        let mut mode = SweepMode::Startup;
        loop {
            {
                let sweep = self.poll(mode).fuse();
                pin_mut!(sweep);
                futures::select! {
                    result = sweep => {
                        if let Err(e) = result {
                            warn!(target: LOG_TARGET, "{:?} sweep failed: {}", mode, e);
                        }
                    },
                    _ = shutdown_signal => break,
                }
            }
            mode = SweepMode::Continuous;

            futures::select! {
                _ = delay_for(self.config.scan_interval).fuse() => {},
                _ = shutdown_signal => break,
            }
        }
        info!(target: LOG_TARGET, "Ledger scanner stopped");
    }

    /// Sweep the unspent outputs of the identity address once
    pub async fn poll(&self, mode: SweepMode) -> Result<ScanReport, MessagingError> {
        let mut report = ScanReport::default();
        let identity = match self.db.get_identity().await? {
            Some(identity) => identity,
            None => {
                trace!(target: LOG_TARGET, "No identity yet, nothing to scan");
                return Ok(report);
            },
        };

        let outputs = self.rpc.list_unspent(identity.address.clone()).await?;
        report.outputs_seen = outputs.len();

        // An output that fails to ingest is left unprocessed for the next sweep. The rest are still ingested and
        // whatever was committed is announced before the first failure is returned.
        let mut notifications = Vec::new();
        let mut failure = None;
        for output in &outputs {
            match self.ingest(&identity, output, mode, &mut report).await {
                Ok(Some(notification)) => notifications.push(notification),
                Ok(None) => {},
                Err(e) => {
                    warn!(target: LOG_TARGET, "Could not ingest output {}: {}", output.txid, e);
                    failure.get_or_insert(e);
                },
            }
        }
        self.publish(mode, notifications);
        if let Some(e) = failure {
            return Err(e);
        }

        if report.outputs_seen >= self.config.consolidation_threshold {
            match self.consolidate(&identity).await {
                Ok(txid) => report.consolidation_txid = Some(txid),
                Err(e) => warn!(target: LOG_TARGET, "Note consolidation failed: {}", e),
            }
        }

        if report.newly_processed > 0 {
            debug!(target: LOG_TARGET, "{:?} sweep: {:?}", mode, report);
        }
        Ok(report)
    }

    async fn ingest(
        &self,
        identity: &Identity,
        output: &UnspentOutput,
        mode: SweepMode,
        report: &mut ScanReport,
    ) -> Result<Option<Notification>, MessagingError>
    {
        let guard = self.db.acquire_write_lock().await;
        if self.db.is_processed(output.txid.clone()).await? {
            return Ok(None);
        }
        report.newly_processed += 1;

        let mut operations = vec![WriteOperation::Insert(DbKeyValuePair::ProcessedTx(output.txid.clone()))];
        let decoded = match memo::decode(&output.memo, output.amount, &output.txid) {
            Ok(decoded) => decoded,
            Err(e) => {
                trace!(target: LOG_TARGET, "Output {} is not a protocol message: {}", output.txid, e);
                report.not_protocol += 1;
                self.db.write_batch(&guard, operations).await?;
                return Ok(None);
            },
        };

        let facts = self.gather_facts(identity, &decoded.envelope).await?;
        let delivery = Delivery {
            txid: decoded.txid.clone(),
            amount: decoded.amount,
            timestamp: self.clock.next_timestamp(),
            mode,
            view: self.current_view(),
        };

        let notification = match protocol::decide(&decoded.envelope, &facts, &delivery) {
            Decision::Ignore(reason) => {
                debug!(
                    target: LOG_TARGET,
                    "Ignoring {} envelope in {}: {}",
                    decoded.envelope.kind(),
                    output.txid,
                    reason
                );
                report.ignored += 1;
                None
            },
            Decision::Apply {
                operations: mutations,
                notification,
            } => {
                report.applied += 1;
                operations.extend(mutations);
                notification
            },
        };
        self.db.write_batch(&guard, operations).await?;

        match &notification {
            Some(Notification::PendingRequest(_)) => report.requests += 1,
            Some(Notification::RequestAccepted(_)) => report.accepted += 1,
            Some(Notification::NewMessage(_)) => report.messages += 1,
            None => {},
        }
        Ok(notification)
    }

    async fn gather_facts(&self, identity: &Identity, envelope: &Envelope) -> Result<TrustFacts, MessagingError> {
        let facts = match envelope {
            Envelope::Identity(card) | Envelope::Request(card) => TrustFacts {
                own_address: card.address == identity.address,
                banned: self.db.is_banned(card.address.clone()).await?,
                contact: self.db.get_contact_by_address(card.address.clone()).await?,
                pending: self.db.get_pending_request(card.address.clone()).await?.is_some(),
                sent_request: self.db.has_sent_request(card.address.clone()).await?,
                id_in_use: self
                    .db
                    .get_contact(card.id.clone())
                    .await?
                    .map_or(false, |c| c.address != card.address),
            },
            Envelope::Message(chat) => {
                let contact = self.db.get_contact(chat.id.clone()).await?;
                let banned = match contact.as_ref() {
                    Some(c) => self.db.is_banned(c.address.clone()).await?,
                    None => false,
                };
                TrustFacts {
                    banned,
                    contact,
                    ..Default::default()
                }
            },
        };
        Ok(facts)
    }

    fn current_view(&self) -> ConversationView {
        match self.view.read() {
            Ok(view) => view.clone(),
            Err(_) => {
                error!(target: LOG_TARGET, "Conversation view lock poisoned, treating view as closed");
                ConversationView::Closed
            },
        }
    }

    fn publish(&self, mode: SweepMode, notifications: Vec<Notification>) {
        match mode {
            SweepMode::Continuous => {
                for notification in notifications {
                    let event = match notification {
                        Notification::PendingRequest(p) => MessagingEvent::PendingRequestReceived(p),
                        Notification::RequestAccepted(c) => MessagingEvent::RequestAccepted(c),
                        Notification::NewMessage(m) => MessagingEvent::NewMessage(m),
                    };
                    self.send_event(event);
                }
            },
            SweepMode::Startup => {
                let requests = notifications
                    .iter()
                    .filter(|n| matches!(n, Notification::PendingRequest(_)))
                    .count();
                let messages = notifications
                    .iter()
                    .filter(|n| matches!(n, Notification::NewMessage(_)))
                    .count();
                let accepted = notifications.len() - requests - messages;
                if !notifications.is_empty() {
                    self.send_event(MessagingEvent::StartupSummary {
                        requests,
                        accepted,
                        messages,
                    });
                }
            },
        }
    }

    fn send_event(&self, event: MessagingEvent) {
        if self.event_publisher.send(Arc::new(event)).is_err() {
            trace!(target: LOG_TARGET, "No subscribers for messaging event");
        }
    }

    /// Send the spendable balance back to ourselves as a single note
    async fn consolidate(&self, identity: &Identity) -> Result<TxId, MessagingError> {
        let balance = self.rpc.shielded_balance(identity.address.clone()).await?;
        let amount = balance
            .checked_sub(self.config.consolidation_reserve)
            .filter(|a| a.0 > 0)
            .ok_or(crate::error::SendError::InsufficientBalance)?;
        info!(
            target: LOG_TARGET,
            "Merging unspent notes: sending {} back to our own address", amount
        );

        let txid = self
            .outbound
            .send_memo(
                &identity.address,
                &identity.address,
                amount,
                self.config.network_fee,
                memo::encode_text(CONSOLIDATION_MEMO),
            )
            .await?;
        self.db
            .apply(vec![WriteOperation::Insert(DbKeyValuePair::ProcessedTx(txid.clone()))])
            .await?;
        Ok(txid)
    }
}

impl<R, B> Clone for LedgerScanner<R, B>
where
    R: ChainRpc,
    B: MessagingBackend + 'static,
{
    fn clone(&self) -> Self {
        Self {
            rpc: self.rpc.clone(),
            db: self.db.clone(),
            outbound: self.outbound.clone(),
            config: self.config.clone(),
            clock: self.clock.clone(),
            view: self.view.clone(),
            event_publisher: self.event_publisher.clone(),
        }
    }
}
