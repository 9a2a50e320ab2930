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
    storage::database::{DbKey, DbKeyValuePair, DbValue, MessagingBackend, WriteOperation},
    types::{Contact, Identity, Message, PendingRequest},
};
use std::{
    collections::{BTreeSet, HashMap},
    sync::{Arc, RwLock},
};

#[derive(Clone, Default)]
struct InnerDatabase {
    identity: Option<Identity>,
    exported_key: Option<(String, String)>,
    contacts: HashMap<String, Contact>,
    pending_requests: HashMap<String, PendingRequest>,
    sent_requests: BTreeSet<String>,
    banned_addresses: BTreeSet<String>,
    processed_txs: BTreeSet<String>,
    messages: Vec<Message>,
    unread_messages: Vec<Message>,
}

/// A volatile backend, used in tests and by applications that do not need persistence
#[derive(Clone, Default)]
pub struct MessagingMemoryDatabase {
    db: Arc<RwLock<InnerDatabase>>,
}

impl MessagingMemoryDatabase {
    pub fn new() -> Self {
        Default::default()
    }
}

impl MessagingBackend for MessagingMemoryDatabase {
    fn fetch(&self, key: &DbKey) -> Result<Option<DbValue>, MessagingStorageError> {
        let db = self.db.read().map_err(|_| MessagingStorageError::LockPoisoned)?;
        let result = match key {
            DbKey::Identity => db.identity.clone().map(|i| DbValue::Identity(Box::new(i))),
            DbKey::ExportedKey => db.exported_key.clone().map(|(_, key)| DbValue::ExportedKey(key)),
            DbKey::Contact(id) => db.contacts.get(id).cloned().map(|c| DbValue::Contact(Box::new(c))),
            DbKey::ContactByAddress(address) => db
                .contacts
                .values()
                .find(|c| &c.address == address)
                .cloned()
                .map(|c| DbValue::Contact(Box::new(c))),
            DbKey::Contacts => {
                let mut contacts = db.contacts.values().cloned().collect::<Vec<_>>();
                contacts.sort_by(|a, b| a.username.cmp(&b.username));
                Some(DbValue::Contacts(contacts))
            },
            DbKey::PendingRequest(address) => db
                .pending_requests
                .get(address)
                .cloned()
                .map(|p| DbValue::PendingRequest(Box::new(p))),
            DbKey::PendingRequestById(id) => db
                .pending_requests
                .values()
                .find(|p| &p.id == id)
                .cloned()
                .map(|p| DbValue::PendingRequest(Box::new(p))),
            DbKey::PendingRequests => {
                let mut pending = db.pending_requests.values().cloned().collect::<Vec<_>>();
                pending.sort_by(|a, b| a.username.cmp(&b.username));
                Some(DbValue::PendingRequests(pending))
            },
            DbKey::SentRequest(address) => db.sent_requests.get(address).cloned().map(DbValue::SentRequest),
            DbKey::SentRequests => Some(DbValue::SentRequests(db.sent_requests.iter().cloned().collect())),
            DbKey::BannedAddress(address) => db.banned_addresses.get(address).cloned().map(DbValue::BannedAddress),
            DbKey::BannedAddresses => Some(DbValue::BannedAddresses(db.banned_addresses.iter().cloned().collect())),
            DbKey::ProcessedTx(txid) => db.processed_txs.get(txid).cloned().map(DbValue::ProcessedTx),
            DbKey::Messages {
                contact_id,
                before,
                limit,
            } => {
                let mut messages = db
                    .messages
                    .iter()
                    .filter(|m| &m.contact_id == contact_id && before.map(|b| m.timestamp < b).unwrap_or(true))
                    .cloned()
                    .collect::<Vec<_>>();
                messages.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
                messages.truncate(*limit);
                Some(DbValue::Messages(messages))
            },
            DbKey::UnreadMessages(contact_id) => {
                let mut messages = unread_for(&db, contact_id);
                messages.sort_by_key(|m| m.timestamp);
                Some(DbValue::Messages(messages))
            },
            DbKey::UnreadCount(contact_id) => Some(DbValue::Count(
                db.unread_messages.iter().filter(|m| &m.contact_id == contact_id).count() as u64,
            )),
            DbKey::LatestTimestamp => db
                .messages
                .iter()
                .chain(db.unread_messages.iter())
                .map(|m| m.timestamp)
                .max()
                .map(DbValue::Timestamp),
        };

        Ok(result)
    }

    fn write_batch(&self, operations: Vec<WriteOperation>) -> Result<(), MessagingStorageError> {
        let mut db = self.db.write().map_err(|_| MessagingStorageError::LockPoisoned)?;
        // Apply to a copy so that a failing operation leaves the store untouched
        let mut staged = db.clone();
        for op in operations {
            apply_operation(&mut staged, op)?;
        }
        *db = staged;
        Ok(())
    }
}

fn unread_for(db: &InnerDatabase, contact_id: &str) -> Vec<Message> {
    db.unread_messages
        .iter()
        .filter(|m| m.contact_id == contact_id)
        .cloned()
        .collect()
}

fn apply_operation(db: &mut InnerDatabase, op: WriteOperation) -> Result<(), MessagingStorageError> {
    match op {
        WriteOperation::Insert(kvp) => match kvp {
            DbKeyValuePair::Identity(identity) => {
                db.identity = Some(identity);
            },
            DbKeyValuePair::ExportedKey { address, private_key } => {
                db.exported_key = Some((address, private_key));
            },
            DbKeyValuePair::Contact(contact) => {
                if db
                    .contacts
                    .values()
                    .any(|c| c.address == contact.address && c.contact_id != contact.contact_id)
                {
                    return Err(MessagingStorageError::UnexpectedResult(format!(
                        "A different contact already uses address {}",
                        contact.address
                    )));
                }
                if let Some(existing) = db.contacts.get(&contact.contact_id) {
                    if existing.address != contact.address {
                        return Err(MessagingStorageError::UnexpectedResult(format!(
                            "Contact id {} already belongs to address {}",
                            contact.contact_id, existing.address
                        )));
                    }
                }
                db.contacts.insert(contact.contact_id.clone(), contact);
            },
            DbKeyValuePair::PendingRequest(pending) => {
                db.pending_requests.insert(pending.address.clone(), pending);
            },
            DbKeyValuePair::SentRequest(address) => {
                db.sent_requests.insert(address);
            },
            DbKeyValuePair::BannedAddress(address) => {
                db.banned_addresses.insert(address);
            },
            DbKeyValuePair::ProcessedTx(txid) => {
                db.processed_txs.insert(txid);
            },
            DbKeyValuePair::Message(message) => db.messages.push(message),
            DbKeyValuePair::UnreadMessage(message) => db.unread_messages.push(message),
        },
        WriteOperation::Remove(key) => match key {
            DbKey::Contact(contact_id) => {
                db.contacts.remove(&contact_id);
            },
            DbKey::PendingRequest(address) => {
                db.pending_requests.remove(&address);
            },
            DbKey::SentRequest(address) => {
                db.sent_requests.remove(&address);
            },
            other => return Err(MessagingStorageError::OperationNotSupported(format!("Remove {}", other))),
        },
        WriteOperation::UpdateIdentityUsername(username) => match db.identity.as_mut() {
            Some(identity) => identity.username = username,
            None => return Err(MessagingStorageError::ValueNotFound(DbKey::Identity.to_string())),
        },
        WriteOperation::UpdateContactUsername { contact_id, username } => match db.contacts.get_mut(&contact_id) {
            Some(contact) => contact.username = username,
            None => return Err(MessagingStorageError::ValueNotFound(DbKey::Contact(contact_id).to_string())),
        },
        WriteOperation::PromoteUnread(contact_id) => {
            let (promoted, remaining): (Vec<_>, Vec<_>) = db
                .unread_messages
                .drain(..)
                .partition(|m| m.contact_id == contact_id);
            db.unread_messages = remaining;
            db.messages.extend(promoted);
        },
    }
    Ok(())
}
