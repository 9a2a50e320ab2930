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
    directory::MessagePage,
    error::MessagingError,
    scanner::ScanReport,
    types::{Amount, Contact, Identity, Message, PendingRequest, TxId},
};
use std::{fmt, sync::Arc};
use tokio::sync::broadcast;
use zchat_service_framework::{reply_channel::SenderService, Service};

/// API requests for the messaging service
#[derive(Debug)]
pub enum MessagingRequest {
    SetupIdentity(String),
    GetIdentity,
    RenameIdentity(String),
    SendRequest(String),
    AcceptPending(String),
    RejectPending(String),
    BanContact(String),
    SendMessage {
        contact_id: String,
        text: String,
        fee: Amount,
    },
    OpenConversation(String),
    CloseConversation,
    Poll,
    ListContacts,
    ListPending,
    ListBanned,
    ListSentRequests,
    UnreadCount(String),
    UnreadMessages(String),
    LoadMessages {
        contact_id: String,
        before: Option<i64>,
        page_size: Option<usize>,
    },
    MarkRead(String),
}

impl fmt::Display for MessagingRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessagingRequest::SetupIdentity(name) => write!(f, "SetupIdentity ({})", name),
            MessagingRequest::GetIdentity => f.write_str("GetIdentity"),
            MessagingRequest::RenameIdentity(name) => write!(f, "RenameIdentity ({})", name),
            MessagingRequest::SendRequest(address) => write!(f, "SendRequest ({})", address),
            MessagingRequest::AcceptPending(id) => write!(f, "AcceptPending ({})", id),
            MessagingRequest::RejectPending(id) => write!(f, "RejectPending ({})", id),
            MessagingRequest::BanContact(id) => write!(f, "BanContact ({})", id),
            MessagingRequest::SendMessage { contact_id, fee, .. } => {
                write!(f, "SendMessage (to {}, fee {})", contact_id, fee)
            },
            MessagingRequest::OpenConversation(id) => write!(f, "OpenConversation ({})", id),
            MessagingRequest::CloseConversation => f.write_str("CloseConversation"),
            MessagingRequest::Poll => f.write_str("Poll"),
            MessagingRequest::ListContacts => f.write_str("ListContacts"),
            MessagingRequest::ListPending => f.write_str("ListPending"),
            MessagingRequest::ListBanned => f.write_str("ListBanned"),
            MessagingRequest::ListSentRequests => f.write_str("ListSentRequests"),
            MessagingRequest::UnreadCount(id) => write!(f, "UnreadCount ({})", id),
            MessagingRequest::UnreadMessages(id) => write!(f, "UnreadMessages ({})", id),
            MessagingRequest::LoadMessages { contact_id, before, .. } => {
                write!(f, "LoadMessages ({}, before {:?})", contact_id, before)
            },
            MessagingRequest::MarkRead(id) => write!(f, "MarkRead ({})", id),
        }
    }
}

/// API responses from the messaging service
#[derive(Debug)]
pub enum MessagingResponse {
    IdentityCreated(Identity),
    Identity(Option<Identity>),
    IdentityRenamed,
    RequestSent(TxId),
    PendingAccepted(Contact),
    PendingRejected,
    ContactBanned,
    MessageSent(Message),
    ConversationOpened,
    ConversationClosed,
    Polled(ScanReport),
    Contacts(Vec<Contact>),
    PendingRequests(Vec<PendingRequest>),
    BannedAddresses(Vec<String>),
    SentRequests(Vec<String>),
    UnreadCount(u64),
    UnreadMessages(Vec<Message>),
    MessagePage(MessagePage),
    MarkedRead,
}

/// Notifications published by the messaging service
#[derive(Clone, Debug, PartialEq)]
pub enum MessagingEvent {
    PendingRequestReceived(PendingRequest),
    RequestAccepted(Contact),
    NewMessage(Message),
    /// Aggregated counts from the startup sweep
    StartupSummary {
        requests: usize,
        accepted: usize,
        messages: usize,
    },
}

#[derive(Clone)]
pub struct MessagingHandle {
    handle: SenderService<MessagingRequest, Result<MessagingResponse, MessagingError>>,
    event_publisher: broadcast::Sender<Arc<MessagingEvent>>,
}

impl MessagingHandle {
    pub fn new(
        handle: SenderService<MessagingRequest, Result<MessagingResponse, MessagingError>>,
        event_publisher: broadcast::Sender<Arc<MessagingEvent>>,
    ) -> Self
    {
        Self { handle, event_publisher }
    }

    pub fn get_event_stream(&self) -> broadcast::Receiver<Arc<MessagingEvent>> {
        self.event_publisher.subscribe()
    }

    pub async fn setup_identity(&mut self, username: String) -> Result<Identity, MessagingError> {
        match self.handle.call(MessagingRequest::SetupIdentity(username)).await?? {
            MessagingResponse::IdentityCreated(identity) => Ok(identity),
            _ => Err(MessagingError::UnexpectedApiResponse),
        }
    }

    pub async fn get_identity(&mut self) -> Result<Option<Identity>, MessagingError> {
        match self.handle.call(MessagingRequest::GetIdentity).await?? {
            MessagingResponse::Identity(identity) => Ok(identity),
            _ => Err(MessagingError::UnexpectedApiResponse),
        }
    }

    pub async fn rename_identity(&mut self, username: String) -> Result<(), MessagingError> {
        match self.handle.call(MessagingRequest::RenameIdentity(username)).await?? {
            MessagingResponse::IdentityRenamed => Ok(()),
            _ => Err(MessagingError::UnexpectedApiResponse),
        }
    }

    /// Send a contact request to `address`. Resolves once the payment has a confirmed txid.
    pub async fn send_request(&mut self, address: String) -> Result<TxId, MessagingError> {
        match self.handle.call(MessagingRequest::SendRequest(address)).await?? {
            MessagingResponse::RequestSent(txid) => Ok(txid),
            _ => Err(MessagingError::UnexpectedApiResponse),
        }
    }

    pub async fn accept_pending(&mut self, pending_id: String) -> Result<Contact, MessagingError> {
        match self.handle.call(MessagingRequest::AcceptPending(pending_id)).await?? {
            MessagingResponse::PendingAccepted(contact) => Ok(contact),
            _ => Err(MessagingError::UnexpectedApiResponse),
        }
    }

    pub async fn reject_pending(&mut self, pending_id: String) -> Result<(), MessagingError> {
        match self.handle.call(MessagingRequest::RejectPending(pending_id)).await?? {
            MessagingResponse::PendingRejected => Ok(()),
            _ => Err(MessagingError::UnexpectedApiResponse),
        }
    }

    pub async fn ban_contact(&mut self, contact_id: String) -> Result<(), MessagingError> {
        match self.handle.call(MessagingRequest::BanContact(contact_id)).await?? {
            MessagingResponse::ContactBanned => Ok(()),
            _ => Err(MessagingError::UnexpectedApiResponse),
        }
    }

    pub async fn send_message(&mut self, contact_id: String, text: String, fee: Amount) -> Result<Message, MessagingError> {
        match self
            .handle
            .call(MessagingRequest::SendMessage { contact_id, text, fee })
            .await??
        {
            MessagingResponse::MessageSent(message) => Ok(message),
            _ => Err(MessagingError::UnexpectedApiResponse),
        }
    }

    pub async fn open_conversation(&mut self, contact_id: String) -> Result<(), MessagingError> {
        match self.handle.call(MessagingRequest::OpenConversation(contact_id)).await?? {
            MessagingResponse::ConversationOpened => Ok(()),
            _ => Err(MessagingError::UnexpectedApiResponse),
        }
    }

    pub async fn close_conversation(&mut self) -> Result<(), MessagingError> {
        match self.handle.call(MessagingRequest::CloseConversation).await?? {
            MessagingResponse::ConversationClosed => Ok(()),
            _ => Err(MessagingError::UnexpectedApiResponse),
        }
    }

    /// Run a continuous sweep now instead of waiting for the next tick
    pub async fn poll(&mut self) -> Result<ScanReport, MessagingError> {
        match self.handle.call(MessagingRequest::Poll).await?? {
            MessagingResponse::Polled(report) => Ok(report),
            _ => Err(MessagingError::UnexpectedApiResponse),
        }
    }

    pub async fn list_contacts(&mut self) -> Result<Vec<Contact>, MessagingError> {
        match self.handle.call(MessagingRequest::ListContacts).await?? {
            MessagingResponse::Contacts(c) => Ok(c),
            _ => Err(MessagingError::UnexpectedApiResponse),
        }
    }

    pub async fn list_pending(&mut self) -> Result<Vec<PendingRequest>, MessagingError> {
        match self.handle.call(MessagingRequest::ListPending).await?? {
            MessagingResponse::PendingRequests(p) => Ok(p),
            _ => Err(MessagingError::UnexpectedApiResponse),
        }
    }

    pub async fn list_banned(&mut self) -> Result<Vec<String>, MessagingError> {
        match self.handle.call(MessagingRequest::ListBanned).await?? {
            MessagingResponse::BannedAddresses(b) => Ok(b),
            _ => Err(MessagingError::UnexpectedApiResponse),
        }
    }

    pub async fn list_sent_requests(&mut self) -> Result<Vec<String>, MessagingError> {
        match self.handle.call(MessagingRequest::ListSentRequests).await?? {
            MessagingResponse::SentRequests(s) => Ok(s),
            _ => Err(MessagingError::UnexpectedApiResponse),
        }
    }

    pub async fn unread_count(&mut self, contact_id: String) -> Result<u64, MessagingError> {
        match self.handle.call(MessagingRequest::UnreadCount(contact_id)).await?? {
            MessagingResponse::UnreadCount(count) => Ok(count),
            _ => Err(MessagingError::UnexpectedApiResponse),
        }
    }

    pub async fn unread_messages(&mut self, contact_id: String) -> Result<Vec<Message>, MessagingError> {
        match self.handle.call(MessagingRequest::UnreadMessages(contact_id)).await?? {
            MessagingResponse::UnreadMessages(m) => Ok(m),
            _ => Err(MessagingError::UnexpectedApiResponse),
        }
    }

    /// Load a page of history, newest first. Pass the page's `next_cursor` as `before` to load older messages.
    pub async fn load_messages(
        &mut self,
        contact_id: String,
        before: Option<i64>,
        page_size: Option<usize>,
    ) -> Result<MessagePage, MessagingError>
    {
        match self
            .handle
            .call(MessagingRequest::LoadMessages {
                contact_id,
                before,
                page_size,
            })
            .await??
        {
            MessagingResponse::MessagePage(page) => Ok(page),
            _ => Err(MessagingError::UnexpectedApiResponse),
        }
    }

    pub async fn mark_read(&mut self, contact_id: String) -> Result<(), MessagingError> {
        match self.handle.call(MessagingRequest::MarkRead(contact_id)).await?? {
            MessagingResponse::MarkedRead => Ok(()),
            _ => Err(MessagingError::UnexpectedApiResponse),
        }
    }
}
