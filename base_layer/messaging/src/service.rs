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
    directory::ContactDirectory,
    error::{MessagingError, MessagingStorageError, ValidationError},
    handle::{MessagingEvent, MessagingHandle, MessagingRequest, MessagingResponse},
    memo::{ChatMessage, Envelope, IdentityCard},
    outbound::{OutboundMessenger, Precondition},
    protocol::{self, ConversationView, SweepMode},
    rpc::ChainRpc,
    scanner::LedgerScanner,
    storage::database::{DbKeyValuePair, MessagingBackend, MessagingDatabase, WriteOperation},
    types::{Amount, Contact, Identity, Message, MessageClock, PendingRequest, TxId},
};
use futures::{channel::oneshot, StreamExt};
use log::*;
use std::sync::{Arc, RwLock};
use tokio::sync::broadcast;
use zchat_service_framework::reply_channel;
use zchat_shutdown::ShutdownSignal;

const LOG_TARGET: &str = "zchat::messaging::service";

type RequestStream = reply_channel::Receiver<MessagingRequest, Result<MessagingResponse, MessagingError>>;
type ReplySender = oneshot::Sender<Result<MessagingResponse, MessagingError>>;

/// Create the messaging service and its handle, and spawn the service onto the current runtime
pub fn spawn_messaging_service<R, B>(
    config: MessagingConfig,
    backend: B,
    rpc: R,
    shutdown_signal: ShutdownSignal,
) -> MessagingHandle
where
    R: ChainRpc,
    B: MessagingBackend + 'static,
{
    let (sender, receiver) = reply_channel::unbounded();
    let (event_publisher, _) = broadcast::channel(config.event_channel_size);
    let service = MessagingService::new(
        config,
        MessagingDatabase::new(backend),
        Arc::new(rpc),
        receiver,
        event_publisher.clone(),
        shutdown_signal,
    );
    tokio::spawn(async move {
        if let Err(e) = service.start().await {
            error!(target: LOG_TARGET, "Messaging service exited with an error: {}", e);
        }
    });
    MessagingHandle::new(sender, event_publisher)
}

/// The messaging service.
///
/// The service loop receives requests from `MessagingHandle`s and runs each one as its own task, so a send waiting on
/// the node never blocks queries. The ledger scanner runs as a sibling task. Every task that mutates the store does so
/// under the database write lock. All of them stop when the shutdown signal fires.
pub struct MessagingService<R, B>
where
    R: ChainRpc,
    B: MessagingBackend + 'static,
{
    resources: MessagingResources<R, B>,
    request_stream: RequestStream,
    shutdown_signal: ShutdownSignal,
}

impl<R, B> MessagingService<R, B>
where
    R: ChainRpc,
    B: MessagingBackend + 'static,
{
    pub fn new(
        config: MessagingConfig,
        db: MessagingDatabase<B>,
        rpc: Arc<R>,
        request_stream: RequestStream,
        event_publisher: broadcast::Sender<Arc<MessagingEvent>>,
        shutdown_signal: ShutdownSignal,
    ) -> Self
    {
        let clock = Arc::new(MessageClock::new());
        let view = Arc::new(RwLock::new(ConversationView::Closed));
        let outbound = OutboundMessenger::new(rpc.clone(), db.clone(), config.clone(), shutdown_signal.clone());
        let scanner = LedgerScanner::new(
            rpc.clone(),
            db.clone(),
            outbound.clone(),
            config.clone(),
            clock.clone(),
            view.clone(),
            event_publisher,
        );
        let directory = ContactDirectory::new(db.clone(), config.history_page_size);

        Self {
            resources: MessagingResources {
                config,
                db,
                rpc,
                outbound,
                scanner,
                directory,
                clock,
                view,
            },
            request_stream,
            shutdown_signal,
        }
    }

    pub async fn start(self) -> Result<(), MessagingError> {
        let MessagingService {
            resources,
            request_stream,
            shutdown_signal,
        } = self;

        if let Some(latest) = resources.db.get_latest_timestamp().await? {
            resources.clock.observe(latest);
        }

        let scanner_task = tokio::spawn(resources.scanner.clone().run(shutdown_signal.clone()));

        let mut request_stream = request_stream.fuse();
        let mut shutdown = shutdown_signal;
        info!(target: LOG_TARGET, "Messaging service started");
        loop {
            futures::select! {
                request_context = request_stream.select_next_some() => {
                    let (request, reply_tx) = request_context.split();
                    if let Some(request) = request {
                        trace!(target: LOG_TARGET, "Handling service request: {}", request);
                        resources.dispatch(request, reply_tx);
                    }
                },
                _ = shutdown => {
                    info!(target: LOG_TARGET, "Messaging service shutting down because it received the shutdown signal");
                    break;
                },
                complete => {
                    info!(target: LOG_TARGET, "Messaging service shutting down because all handles were dropped");
                    break;
                },
            }
        }

        if let Err(e) = scanner_task.await {
            warn!(target: LOG_TARGET, "Ledger scanner task did not finish cleanly: {}", e);
        }
        Ok(())
    }
}

/// Everything a request handler needs, cheap to clone into a spawned task
struct MessagingResources<R, B>
where
    R: ChainRpc,
    B: MessagingBackend + 'static,
{
    config: MessagingConfig,
    db: MessagingDatabase<B>,
    rpc: Arc<R>,
    outbound: OutboundMessenger<R, B>,
    scanner: LedgerScanner<R, B>,
    directory: ContactDirectory<B>,
    clock: Arc<MessageClock>,
    view: Arc<RwLock<ConversationView>>,
}

impl<R, B> MessagingResources<R, B>
where
    R: ChainRpc,
    B: MessagingBackend + 'static,
{
    fn dispatch(&self, request: MessagingRequest, reply_tx: ReplySender) {
        let resources = self.clone();
        tokio::spawn(async move {
            let response = resources.handle_request(request).await;
            if let Err(e) = &response {
                debug!(target: LOG_TARGET, "Request failed: {}", e);
            }
            if reply_tx.send(response).is_err() {
                warn!(target: LOG_TARGET, "Failed to send reply, the requester went away");
            }
        });
    }

    async fn handle_request(&self, request: MessagingRequest) -> Result<MessagingResponse, MessagingError> {
        match request {
            MessagingRequest::SetupIdentity(username) => {
                self.setup_identity(username).await.map(MessagingResponse::IdentityCreated)
            },
            MessagingRequest::GetIdentity => self.db.get_identity().await.map(MessagingResponse::Identity).map_err(Into::into),
            MessagingRequest::RenameIdentity(username) => {
                self.rename_identity(username).await.map(|_| MessagingResponse::IdentityRenamed)
            },
            MessagingRequest::SendRequest(address) => self.send_request(address).await.map(MessagingResponse::RequestSent),
            MessagingRequest::AcceptPending(id) => self.accept_pending(id).await.map(MessagingResponse::PendingAccepted),
            MessagingRequest::RejectPending(id) => self.reject_pending(id).await.map(|_| MessagingResponse::PendingRejected),
            MessagingRequest::BanContact(id) => self.ban_contact(id).await.map(|_| MessagingResponse::ContactBanned),
            MessagingRequest::SendMessage { contact_id, text, fee } => self
                .send_message(contact_id, text, fee)
                .await
                .map(MessagingResponse::MessageSent),
            MessagingRequest::OpenConversation(contact_id) => self
                .open_conversation(contact_id)
                .await
                .map(|_| MessagingResponse::ConversationOpened),
            MessagingRequest::CloseConversation => self
                .set_view(ConversationView::Closed)
                .map(|_| MessagingResponse::ConversationClosed),
            MessagingRequest::Poll => self
                .scanner
                .poll(SweepMode::Continuous)
                .await
                .map(MessagingResponse::Polled),
            MessagingRequest::ListContacts => Ok(MessagingResponse::Contacts(self.directory.contacts().await?)),
            MessagingRequest::ListPending => Ok(MessagingResponse::PendingRequests(
                self.directory.pending_requests().await?,
            )),
            MessagingRequest::ListBanned => Ok(MessagingResponse::BannedAddresses(
                self.directory.banned_addresses().await?,
            )),
            MessagingRequest::ListSentRequests => {
                Ok(MessagingResponse::SentRequests(self.directory.sent_requests().await?))
            },
            MessagingRequest::UnreadCount(contact_id) => Ok(MessagingResponse::UnreadCount(
                self.directory.unread_count(contact_id).await?,
            )),
            MessagingRequest::UnreadMessages(contact_id) => Ok(MessagingResponse::UnreadMessages(
                self.directory.unread_messages(contact_id).await?,
            )),
            MessagingRequest::LoadMessages {
                contact_id,
                before,
                page_size,
            } => Ok(MessagingResponse::MessagePage(
                self.directory.load_messages(contact_id, before, page_size).await?,
            )),
            MessagingRequest::MarkRead(contact_id) => {
                self.directory.mark_read(contact_id).await?;
                Ok(MessagingResponse::MarkedRead)
            },
        }
    }

    async fn require_identity(&self) -> Result<Identity, MessagingError> {
        self.db
            .get_identity()
            .await?
            .ok_or_else(|| ValidationError::NoIdentity.into())
    }

    async fn setup_identity(&self, username: String) -> Result<Identity, MessagingError> {
        let username = username.trim().to_string();
        if username.is_empty() {
            return Err(ValidationError::EmptyUsername.into());
        }
        if self.db.get_identity().await?.is_some() {
            return Err(ValidationError::IdentityExists.into());
        }

        let address = self.rpc.new_shielded_address().await?;
        let private_key = self.rpc.export_key(address.clone()).await?;
        let identity = Identity::new(username, address.clone());

        let guard = self.db.acquire_write_lock().await;
        if self.db.get_identity().await?.is_some() {
            return Err(ValidationError::IdentityExists.into());
        }
        self.db
            .write_batch(&guard, vec![
                WriteOperation::Insert(DbKeyValuePair::Identity(identity.clone())),
                WriteOperation::Insert(DbKeyValuePair::ExportedKey { address, private_key }),
            ])
            .await?;
        info!(target: LOG_TARGET, "Created identity {} at {}", identity.username, identity.address);
        Ok(identity)
    }

    async fn rename_identity(&self, username: String) -> Result<(), MessagingError> {
        let username = username.trim().to_string();
        if username.is_empty() {
            return Err(ValidationError::EmptyUsername.into());
        }
        self.require_identity().await?;
        self.db
            .apply(vec![WriteOperation::UpdateIdentityUsername(username)])
            .await?;
        Ok(())
    }

    /// Store checks run before the node is asked to validate the address
    async fn send_request(&self, address: String) -> Result<TxId, MessagingError> {
        let address = address.trim().to_string();
        if address.is_empty() {
            return Err(ValidationError::InvalidAddress.into());
        }
        let identity = self.require_identity().await?;
        if address == identity.address {
            return Err(ValidationError::OwnAddress.into());
        }
        if self.db.is_banned(address.clone()).await? {
            return Err(ValidationError::Banned.into());
        }
        if self.db.get_contact_by_address(address.clone()).await?.is_some() {
            return Err(ValidationError::AlreadyContact.into());
        }
        if self.db.get_pending_request(address.clone()).await?.is_some() {
            return Err(ValidationError::AlreadyPending.into());
        }
        if self.db.has_sent_request(address.clone()).await? {
            return Err(ValidationError::AlreadyRequested.into());
        }
        if !self.rpc.validate_address(address.clone()).await? {
            return Err(ValidationError::InvalidAddress.into());
        }

        let envelope = Envelope::Request(IdentityCard::from(&identity));
        let (txid, _) = self
            .outbound
            .send_envelope(
                &identity.address,
                &address,
                self.config.handshake_amount,
                self.config.network_fee,
                &envelope,
                &Precondition::Requestable(address.clone()),
                |_| ((), protocol::request_sent(&address)),
            )
            .await?;
        info!(target: LOG_TARGET, "Contact request sent to {} in {}", address, txid);
        Ok(txid)
    }

    /// The contact is only created once the identity reply is confirmed. If the send fails the pending request stays.
    async fn accept_pending(&self, pending_id: String) -> Result<Contact, MessagingError> {
        let identity = self.require_identity().await?;
        let pending = self.find_pending(pending_id).await?;
        if self.db.is_banned(pending.address.clone()).await? {
            return Err(ValidationError::Banned.into());
        }
        if self.db.get_contact(pending.id.clone()).await?.is_some() {
            return Err(ValidationError::ContactIdInUse(pending.id).into());
        }

        let envelope = Envelope::Identity(IdentityCard::from(&identity));
        let (txid, contact) = self
            .outbound
            .send_envelope(
                &identity.address,
                &pending.address,
                self.config.handshake_amount,
                self.config.network_fee,
                &envelope,
                &Precondition::PendingRequest {
                    address: pending.address.clone(),
                    id: pending.id.clone(),
                },
                |_| protocol::pending_accepted(&pending),
            )
            .await?;
        info!(
            target: LOG_TARGET,
            "Accepted request from {}, identity reply in {}", contact.username, txid
        );
        Ok(contact)
    }

    /// Looked up under the write lock so that a concurrent accept either wins outright or sees the ban
    async fn reject_pending(&self, pending_id: String) -> Result<(), MessagingError> {
        let guard = self.db.acquire_write_lock().await;
        let pending = self.find_pending(pending_id).await?;
        self.db.write_batch(&guard, protocol::pending_rejected(&pending)).await?;
        drop(guard);
        info!(target: LOG_TARGET, "Rejected and banned {}", pending.address);
        Ok(())
    }

    async fn ban_contact(&self, contact_id: String) -> Result<(), MessagingError> {
        let guard = self.db.acquire_write_lock().await;
        let contact = self.find_contact(contact_id).await?;
        self.db.write_batch(&guard, protocol::contact_banned(&contact)).await?;
        drop(guard);
        let was_open = self.current_view()?.is_open(&contact.contact_id);
        if was_open {
            self.set_view(ConversationView::Closed)?;
        }
        info!(target: LOG_TARGET, "Banned contact {} ({})", contact.username, contact.address);
        Ok(())
    }

    /// Input checks run before any node call
    async fn send_message(&self, contact_id: String, text: String, fee: Amount) -> Result<Message, MessagingError> {
        if contact_id.is_empty() {
            return Err(ValidationError::NoContactSelected.into());
        }
        if text.trim().is_empty() {
            return Err(ValidationError::EmptyMessage.into());
        }
        let length = text.chars().count();
        if length > self.config.max_message_length {
            return Err(ValidationError::MessageTooLong {
                length,
                max: self.config.max_message_length,
            }
            .into());
        }
        if fee < self.config.min_message_fee {
            return Err(ValidationError::FeeTooLow {
                minimum: self.config.min_message_fee,
            }
            .into());
        }

        let identity = self.require_identity().await?;
        let contact = self.find_contact(contact_id).await?;
        if self.db.is_banned(contact.address.clone()).await? {
            return Err(ValidationError::Banned.into());
        }

        // The network fee is paid out of the user's fee, the remainder travels with the memo
        let amount = fee.checked_sub(self.config.network_fee).unwrap_or_default();
        let envelope = Envelope::Message(ChatMessage {
            id: identity.id.clone(),
            username: identity.username.clone(),
            text: text.clone(),
        });
        let clock = self.clock.clone();
        let (_, message) = self
            .outbound
            .send_envelope(
                &identity.address,
                &contact.address,
                amount,
                self.config.network_fee,
                &envelope,
                &Precondition::Contact {
                    contact_id: contact.contact_id.clone(),
                    address: contact.address.clone(),
                },
                |_| protocol::message_sent(&contact, &text, amount, clock.next_timestamp()),
            )
            .await?;
        Ok(message)
    }

    async fn open_conversation(&self, contact_id: String) -> Result<(), MessagingError> {
        let contact = self.find_contact(contact_id).await?;
        self.set_view(ConversationView::Open(contact.contact_id))
    }

    async fn find_contact(&self, contact_id: String) -> Result<Contact, MessagingError> {
        self.db
            .get_contact(contact_id.clone())
            .await?
            .ok_or_else(|| ValidationError::UnknownContact(contact_id).into())
    }

    async fn find_pending(&self, pending_id: String) -> Result<PendingRequest, MessagingError> {
        self.db
            .get_pending_request_by_id(pending_id.clone())
            .await?
            .ok_or_else(|| ValidationError::UnknownPendingRequest(pending_id).into())
    }

    fn current_view(&self) -> Result<ConversationView, MessagingError> {
        self.view
            .read()
            .map(|view| view.clone())
            .map_err(|_| MessagingStorageError::LockPoisoned.into())
    }

    fn set_view(&self, view: ConversationView) -> Result<(), MessagingError> {
        let mut current = self.view.write().map_err(|_| MessagingStorageError::LockPoisoned)?;
        debug!(target: LOG_TARGET, "Conversation view: {:?} -> {:?}", *current, view);
        *current = view;
        Ok(())
    }
}

impl<R, B> Clone for MessagingResources<R, B>
where
    R: ChainRpc,
    B: MessagingBackend + 'static,
{
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            db: self.db.clone(),
            rpc: self.rpc.clone(),
            outbound: self.outbound.clone(),
            scanner: self.scanner.clone(),
            directory: self.directory.clone(),
            clock: self.clock.clone(),
            view: self.view.clone(),
        }
    }
}
