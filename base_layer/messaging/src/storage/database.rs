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
    types::{Contact, Identity, Message, PendingRequest, TxId},
};
use log::*;
use std::{
    fmt::{Display, Error, Formatter},
    sync::Arc,
};
use tokio::sync::{Mutex, MutexGuard};

const LOG_TARGET: &str = "zchat::messaging::storage::database";

/// This trait defines the functionality that a database backend needs to provide for the messaging core.
///
/// `write_batch` must be all-or-nothing: either every operation in the batch is applied or none is.
pub trait MessagingBackend: Send + Sync + 'static {
    /// Retrieve the record associated with the provided DbKey
    fn fetch(&self, key: &DbKey) -> Result<Option<DbValue>, MessagingStorageError>;
    /// Apply a batch of write operations atomically
    fn write_batch(&self, operations: Vec<WriteOperation>) -> Result<(), MessagingStorageError>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum DbKey {
    Identity,
    ExportedKey,
    Contact(String),
    ContactByAddress(String),
    Contacts,
    PendingRequest(String),
    PendingRequestById(String),
    PendingRequests,
    SentRequest(String),
    SentRequests,
    BannedAddress(String),
    BannedAddresses,
    ProcessedTx(TxId),
    /// Newest first, strictly older than `before` when given
    Messages {
        contact_id: String,
        before: Option<i64>,
        limit: usize,
    },
    /// Oldest first
    UnreadMessages(String),
    UnreadCount(String),
    LatestTimestamp,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DbValue {
    Identity(Box<Identity>),
    ExportedKey(String),
    Contact(Box<Contact>),
    Contacts(Vec<Contact>),
    PendingRequest(Box<PendingRequest>),
    PendingRequests(Vec<PendingRequest>),
    SentRequest(String),
    SentRequests(Vec<String>),
    BannedAddress(String),
    BannedAddresses(Vec<String>),
    ProcessedTx(TxId),
    Messages(Vec<Message>),
    Count(u64),
    Timestamp(i64),
}

#[derive(Debug, Clone, PartialEq)]
pub enum DbKeyValuePair {
    Identity(Identity),
    ExportedKey { address: String, private_key: String },
    Contact(Contact),
    PendingRequest(PendingRequest),
    SentRequest(String),
    BannedAddress(String),
    ProcessedTx(TxId),
    Message(Message),
    UnreadMessage(Message),
}

#[derive(Debug, Clone, PartialEq)]
pub enum WriteOperation {
    Insert(DbKeyValuePair),
    /// Supported for `Contact`, `PendingRequest` and `SentRequest` keys
    Remove(DbKey),
    UpdateIdentityUsername(String),
    UpdateContactUsername { contact_id: String, username: String },
    /// Move every unread row of a contact into the message history
    PromoteUnread(String),
}

impl Display for DbKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), Error> {
        match self {
            DbKey::Identity => f.write_str("Identity"),
            DbKey::ExportedKey => f.write_str("Exported key"),
            DbKey::Contact(id) => write!(f, "Contact: {}", id),
            DbKey::ContactByAddress(a) => write!(f, "Contact with address: {}", a),
            DbKey::Contacts => f.write_str("Contacts"),
            DbKey::PendingRequest(a) => write!(f, "Pending request from: {}", a),
            DbKey::PendingRequestById(id) => write!(f, "Pending request: {}", id),
            DbKey::PendingRequests => f.write_str("Pending requests"),
            DbKey::SentRequest(a) => write!(f, "Sent request to: {}", a),
            DbKey::SentRequests => f.write_str("Sent requests"),
            DbKey::BannedAddress(a) => write!(f, "Banned address: {}", a),
            DbKey::BannedAddresses => f.write_str("Banned addresses"),
            DbKey::ProcessedTx(txid) => write!(f, "Processed transaction: {}", txid),
            DbKey::Messages { contact_id, .. } => write!(f, "Messages for: {}", contact_id),
            DbKey::UnreadMessages(id) => write!(f, "Unread messages for: {}", id),
            DbKey::UnreadCount(id) => write!(f, "Unread count for: {}", id),
            DbKey::LatestTimestamp => f.write_str("Latest message timestamp"),
        }
    }
}

/// Fetch a value and unwrap the expected `DbValue` variant, or fail with `UnexpectedResult`
macro_rules! fetch {
    ($db:ident, $key:expr, $value_type:ident) => {{
        let key = $key;
        match $db.fetch(&key) {
            Ok(None) => Ok(None),
            Ok(Some(DbValue::$value_type(v))) => Ok(Some(v)),
            Ok(Some(other)) => unexpected_result(key, other),
            Err(e) => log_error(key, e),
        }
    }};
}

/// Guard held by any caller performing a read-decide-write sequence against the store
pub type WriteGuard<'a> = MutexGuard<'a, ()>;

/// Async wrapper around a `MessagingBackend`.
///
/// Backend calls run on the blocking thread pool. The write lock serialises every task that mutates the store:
/// callers take `acquire_write_lock` before reading the state their writes depend on and hold it until the batch
/// has been written.
pub struct MessagingDatabase<T>
where T: MessagingBackend + 'static
{
    db: Arc<T>,
    write_lock: Arc<Mutex<()>>,
}

impl<T> MessagingDatabase<T>
where T: MessagingBackend + 'static
{
    pub fn new(db: T) -> Self {
        Self {
            db: Arc::new(db),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    pub async fn acquire_write_lock(&self) -> WriteGuard<'_> {
        self.write_lock.lock().await
    }

    async fn run<F, R>(&self, f: F) -> Result<R, MessagingStorageError>
    where
        F: FnOnce(&T) -> Result<R, MessagingStorageError> + Send + 'static,
        R: Send + 'static,
    {
        let db_clone = self.db.clone();
        tokio::task::spawn_blocking(move || f(&*db_clone))
            .await
            .map_err(|err| MessagingStorageError::BlockingTaskSpawnError(err.to_string()))
            .and_then(|inner_result| inner_result)
    }

    /// Applies the operations atomically. The caller must hold the write lock.
    pub async fn write_batch(&self, _guard: &WriteGuard<'_>, operations: Vec<WriteOperation>) -> Result<(), MessagingStorageError> {
        if operations.is_empty() {
            return Ok(());
        }
        self.run(move |db| db.write_batch(operations)).await
    }

    /// Takes the write lock and applies the operations atomically
    pub async fn apply(&self, operations: Vec<WriteOperation>) -> Result<(), MessagingStorageError> {
        let guard = self.acquire_write_lock().await;
        self.write_batch(&guard, operations).await
    }

    pub async fn get_identity(&self) -> Result<Option<Identity>, MessagingStorageError> {
        self.run(|db| fetch!(db, DbKey::Identity, Identity).map(|v| v.map(|b| *b)))
            .await
    }

    pub async fn get_exported_key(&self) -> Result<Option<String>, MessagingStorageError> {
        self.run(|db| fetch!(db, DbKey::ExportedKey, ExportedKey)).await
    }

    pub async fn get_contact(&self, contact_id: String) -> Result<Option<Contact>, MessagingStorageError> {
        self.run(move |db| fetch!(db, DbKey::Contact(contact_id), Contact).map(|v| v.map(|b| *b)))
            .await
    }

    pub async fn get_contact_by_address(&self, address: String) -> Result<Option<Contact>, MessagingStorageError> {
        self.run(move |db| fetch!(db, DbKey::ContactByAddress(address), Contact).map(|v| v.map(|b| *b)))
            .await
    }

    pub async fn get_contacts(&self) -> Result<Vec<Contact>, MessagingStorageError> {
        self.run(|db| fetch!(db, DbKey::Contacts, Contacts).map(Option::unwrap_or_default))
            .await
    }

    pub async fn get_pending_request(&self, address: String) -> Result<Option<PendingRequest>, MessagingStorageError> {
        self.run(move |db| fetch!(db, DbKey::PendingRequest(address), PendingRequest).map(|v| v.map(|b| *b)))
            .await
    }

    pub async fn get_pending_request_by_id(&self, id: String) -> Result<Option<PendingRequest>, MessagingStorageError> {
        self.run(move |db| fetch!(db, DbKey::PendingRequestById(id), PendingRequest).map(|v| v.map(|b| *b)))
            .await
    }

    pub async fn get_pending_requests(&self) -> Result<Vec<PendingRequest>, MessagingStorageError> {
        self.run(|db| fetch!(db, DbKey::PendingRequests, PendingRequests).map(Option::unwrap_or_default))
            .await
    }

    pub async fn has_sent_request(&self, address: String) -> Result<bool, MessagingStorageError> {
        self.run(move |db| fetch!(db, DbKey::SentRequest(address), SentRequest).map(|v| v.is_some()))
            .await
    }

    pub async fn get_sent_requests(&self) -> Result<Vec<String>, MessagingStorageError> {
        self.run(|db| fetch!(db, DbKey::SentRequests, SentRequests).map(Option::unwrap_or_default))
            .await
    }

    pub async fn is_banned(&self, address: String) -> Result<bool, MessagingStorageError> {
        self.run(move |db| fetch!(db, DbKey::BannedAddress(address), BannedAddress).map(|v| v.is_some()))
            .await
    }

    pub async fn get_banned_addresses(&self) -> Result<Vec<String>, MessagingStorageError> {
        self.run(|db| fetch!(db, DbKey::BannedAddresses, BannedAddresses).map(Option::unwrap_or_default))
            .await
    }

    pub async fn is_processed(&self, txid: TxId) -> Result<bool, MessagingStorageError> {
        self.run(move |db| fetch!(db, DbKey::ProcessedTx(txid), ProcessedTx).map(|v| v.is_some()))
            .await
    }

    pub async fn get_messages(
        &self,
        contact_id: String,
        before: Option<i64>,
        limit: usize,
    ) -> Result<Vec<Message>, MessagingStorageError>
    {
        self.run(move |db| {
            fetch!(
                db,
                DbKey::Messages {
                    contact_id,
                    before,
                    limit
                },
                Messages
            )
            .map(Option::unwrap_or_default)
        })
        .await
    }

    pub async fn get_unread_messages(&self, contact_id: String) -> Result<Vec<Message>, MessagingStorageError> {
        self.run(move |db| fetch!(db, DbKey::UnreadMessages(contact_id), Messages).map(Option::unwrap_or_default))
            .await
    }

    pub async fn get_unread_count(&self, contact_id: String) -> Result<u64, MessagingStorageError> {
        self.run(move |db| fetch!(db, DbKey::UnreadCount(contact_id), Count).map(|v| v.unwrap_or(0)))
            .await
    }

    pub async fn get_latest_timestamp(&self) -> Result<Option<i64>, MessagingStorageError> {
        self.run(|db| fetch!(db, DbKey::LatestTimestamp, Timestamp)).await
    }
}

impl<T> Clone for MessagingDatabase<T>
where T: MessagingBackend + 'static
{
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
            write_lock: self.write_lock.clone(),
        }
    }
}

fn unexpected_result<T>(req: DbKey, res: DbValue) -> Result<T, MessagingStorageError> {
    let msg = format!("Unexpected result for database query {}. Response: {:?}", req, res);
    error!(target: LOG_TARGET, "{}", msg);
    Err(MessagingStorageError::UnexpectedResult(msg))
}

fn log_error<T>(req: DbKey, err: MessagingStorageError) -> Result<T, MessagingStorageError> {
    error!(
        target: LOG_TARGET,
        "Database access error on request: {}: {}",
        req,
        err.to_string()
    );
    Err(err)
}
