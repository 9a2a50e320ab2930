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
    error::MessagingStorageError,
    storage::database::{MessagingBackend, MessagingDatabase, WriteOperation},
    types::{Contact, Message, PendingRequest},
};
use log::*;
use serde::{Deserialize, Serialize};

const LOG_TARGET: &str = "zchat::messaging::directory";

/// One page of conversation history
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MessagePage {
    /// Newest first
    pub messages: Vec<Message>,
    /// Pass as `before` to load the next, older page. `None` once the start of the conversation has been reached.
    pub next_cursor: Option<i64>,
}

/// Read side projections over the messaging store
pub struct ContactDirectory<B>
where B: MessagingBackend + 'static
{
    db: MessagingDatabase<B>,
    page_size: usize,
}

impl<B> ContactDirectory<B>
where B: MessagingBackend + 'static
{
    pub fn new(db: MessagingDatabase<B>, page_size: usize) -> Self {
        Self { db, page_size }
    }

    pub async fn contacts(&self) -> Result<Vec<Contact>, MessagingStorageError> {
        self.db.get_contacts().await
    }

    pub async fn pending_requests(&self) -> Result<Vec<PendingRequest>, MessagingStorageError> {
        self.db.get_pending_requests().await
    }

    pub async fn banned_addresses(&self) -> Result<Vec<String>, MessagingStorageError> {
        self.db.get_banned_addresses().await
    }

    pub async fn sent_requests(&self) -> Result<Vec<String>, MessagingStorageError> {
        self.db.get_sent_requests().await
    }

    pub async fn unread_count(&self, contact_id: String) -> Result<u64, MessagingStorageError> {
        self.db.get_unread_count(contact_id).await
    }

    /// Staged messages, oldest first
    pub async fn unread_messages(&self, contact_id: String) -> Result<Vec<Message>, MessagingStorageError> {
        self.db.get_unread_messages(contact_id).await
    }

    pub async fn load_messages(
        &self,
        contact_id: String,
        before: Option<i64>,
        page_size: Option<usize>,
    ) -> Result<MessagePage, MessagingStorageError>
    {
        let page_size = page_size.unwrap_or(self.page_size).max(1);
        let messages = self.db.get_messages(contact_id, before, page_size).await?;
        let next_cursor = if messages.len() < page_size {
            None
        } else {
            messages.last().map(|m| m.timestamp)
        };
        Ok(MessagePage { messages, next_cursor })
    }

    /// Move every unread message of the contact into the history in one atomic step
    pub async fn mark_read(&self, contact_id: String) -> Result<(), MessagingStorageError> {
        trace!(target: LOG_TARGET, "Marking conversation {} as read", contact_id);
        self.db.apply(vec![WriteOperation::PromoteUnread(contact_id)]).await
    }
}

impl<B> Clone for ContactDirectory<B>
where B: MessagingBackend + 'static
{
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
            page_size: self.page_size,
        }
    }
}
