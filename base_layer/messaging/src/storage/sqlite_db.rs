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
    storage::{
        database::{DbKey, DbKeyValuePair, DbValue, MessagingBackend, WriteOperation},
        schema::*,
    },
    types::{Amount, Category, Contact, Identity, Message, PendingRequest},
};
use diesel::{connection::SimpleConnection, prelude::*, SqliteConnection};
use log::*;
use std::{
    convert::TryFrom,
    path::Path,
    sync::{Arc, Mutex},
};

const LOG_TARGET: &str = "zchat::messaging::storage::sqlite_db";

embed_migrations!("./migrations");

/// A SQLite backend for the messaging core
#[derive(Clone)]
pub struct MessagingSqliteDatabase {
    database_connection: Arc<Mutex<SqliteConnection>>,
}

impl MessagingSqliteDatabase {
    /// Opens (or creates) the database file and brings its schema up to date
    pub fn open<P: AsRef<Path>>(database_path: P) -> Result<Self, MessagingStorageError> {
        let path = database_path.as_ref().to_string_lossy().to_string();
        let connection = SqliteConnection::establish(&path)?;
        connection.batch_execute("PRAGMA foreign_keys = ON; PRAGMA busy_timeout = 60000;")?;
        embedded_migrations::run(&connection).map_err(|e| MessagingStorageError::MigrationError(e.to_string()))?;
        info!(target: LOG_TARGET, "Opened messaging database at {}", path);

        Ok(Self {
            database_connection: Arc::new(Mutex::new(connection)),
        })
    }

    fn connection(&self) -> Result<std::sync::MutexGuard<'_, SqliteConnection>, MessagingStorageError> {
        self.database_connection
            .lock()
            .map_err(|_| MessagingStorageError::LockPoisoned)
    }
}

impl MessagingBackend for MessagingSqliteDatabase {
    fn fetch(&self, key: &DbKey) -> Result<Option<DbValue>, MessagingStorageError> {
        let conn = self.connection()?;
        let conn = &*conn;

        let result = match key {
            DbKey::Identity => identity::table
                .first::<IdentitySql>(conn)
                .optional()?
                .map(Identity::try_from)
                .transpose()?
                .map(|i| DbValue::Identity(Box::new(i))),
            DbKey::ExportedKey => exported_keys::table
                .select(exported_keys::private_key)
                .first::<String>(conn)
                .optional()?
                .map(DbValue::ExportedKey),
            DbKey::Contact(contact_id) => contacts::table
                .filter(contacts::contact_id.eq(contact_id))
                .first::<ContactSql>(conn)
                .optional()?
                .map(Contact::try_from)
                .transpose()?
                .map(|c| DbValue::Contact(Box::new(c))),
            DbKey::ContactByAddress(address) => contacts::table
                .filter(contacts::address.eq(address))
                .first::<ContactSql>(conn)
                .optional()?
                .map(Contact::try_from)
                .transpose()?
                .map(|c| DbValue::Contact(Box::new(c))),
            DbKey::Contacts => Some(DbValue::Contacts(
                contacts::table
                    .order(contacts::username.asc())
                    .load::<ContactSql>(conn)?
                    .into_iter()
                    .map(Contact::try_from)
                    .collect::<Result<Vec<_>, _>>()?,
            )),
            DbKey::PendingRequest(address) => pending_requests::table
                .filter(pending_requests::address.eq(address))
                .first::<PendingRequestSql>(conn)
                .optional()?
                .map(PendingRequest::try_from)
                .transpose()?
                .map(|p| DbValue::PendingRequest(Box::new(p))),
            DbKey::PendingRequestById(id) => pending_requests::table
                .filter(pending_requests::id.eq(id))
                .first::<PendingRequestSql>(conn)
                .optional()?
                .map(PendingRequest::try_from)
                .transpose()?
                .map(|p| DbValue::PendingRequest(Box::new(p))),
            DbKey::PendingRequests => Some(DbValue::PendingRequests(
                pending_requests::table
                    .order(pending_requests::username.asc())
                    .load::<PendingRequestSql>(conn)?
                    .into_iter()
                    .map(PendingRequest::try_from)
                    .collect::<Result<Vec<_>, _>>()?,
            )),
            DbKey::SentRequest(address) => sent_requests::table
                .select(sent_requests::address)
                .filter(sent_requests::address.eq(address))
                .first::<String>(conn)
                .optional()?
                .map(DbValue::SentRequest),
            DbKey::SentRequests => Some(DbValue::SentRequests(
                sent_requests::table
                    .select(sent_requests::address)
                    .order(sent_requests::address.asc())
                    .load::<String>(conn)?,
            )),
            DbKey::BannedAddress(address) => banned_addresses::table
                .select(banned_addresses::address)
                .filter(banned_addresses::address.eq(address))
                .first::<String>(conn)
                .optional()?
                .map(DbValue::BannedAddress),
            DbKey::BannedAddresses => Some(DbValue::BannedAddresses(
                banned_addresses::table
                    .select(banned_addresses::address)
                    .order(banned_addresses::address.asc())
                    .load::<String>(conn)?,
            )),
            DbKey::ProcessedTx(txid) => processed_txs::table
                .select(processed_txs::txid)
                .filter(processed_txs::txid.eq(txid))
                .first::<String>(conn)
                .optional()?
                .map(DbValue::ProcessedTx),
            DbKey::Messages {
                contact_id,
                before,
                limit,
            } => {
                let mut query = messages::table.filter(messages::contact_id.eq(contact_id)).into_boxed();
                if let Some(before) = before {
                    query = query.filter(messages::timestamp.lt(*before));
                }
                let rows = query
                    .order(messages::timestamp.desc())
                    .limit(*limit as i64)
                    .load::<MessageSql>(conn)?;
                Some(DbValue::Messages(rows.into_iter().map(Message::from).collect()))
            },
            DbKey::UnreadMessages(contact_id) => Some(DbValue::Messages(
                load_unread(conn, contact_id)?
                    .into_iter()
                    .map(Message::from)
                    .collect(),
            )),
            DbKey::UnreadCount(contact_id) => {
                let count = unread_messages::table
                    .filter(unread_messages::contact_id.eq(contact_id))
                    .count()
                    .get_result::<i64>(conn)?;
                Some(DbValue::Count(count as u64))
            },
            DbKey::LatestTimestamp => {
                let read = messages::table
                    .select(diesel::dsl::max(messages::timestamp))
                    .first::<Option<i64>>(conn)?;
                let unread = unread_messages::table
                    .select(diesel::dsl::max(unread_messages::timestamp))
                    .first::<Option<i64>>(conn)?;
                read.into_iter().chain(unread).max().map(DbValue::Timestamp)
            },
        };

        Ok(result)
    }

    fn write_batch(&self, operations: Vec<WriteOperation>) -> Result<(), MessagingStorageError> {
        let conn = self.connection()?;
        let conn = &*conn;
        conn.transaction::<_, MessagingStorageError, _>(|| {
            for op in operations {
                apply_operation(conn, op)?;
            }
            Ok(())
        })
    }
}

fn load_unread(conn: &SqliteConnection, contact_id: &str) -> Result<Vec<MessageSql>, MessagingStorageError> {
    Ok(unread_messages::table
        .filter(unread_messages::contact_id.eq(contact_id))
        .order(unread_messages::timestamp.asc())
        .load::<MessageSql>(conn)?)
}

fn apply_operation(conn: &SqliteConnection, op: WriteOperation) -> Result<(), MessagingStorageError> {
    match op {
        WriteOperation::Insert(kvp) => match kvp {
            DbKeyValuePair::Identity(i) => {
                diesel::delete(identity::table).execute(conn)?;
                diesel::insert_into(identity::table)
                    .values(&IdentitySql::from(i))
                    .execute(conn)?;
            },
            DbKeyValuePair::ExportedKey { address, private_key } => {
                diesel::replace_into(exported_keys::table)
                    .values(&ExportedKeySql { address, private_key })
                    .execute(conn)?;
            },
            DbKeyValuePair::Contact(c) => {
                let clash = contacts::table
                    .filter(contacts::address.eq(&c.address))
                    .filter(contacts::contact_id.ne(&c.contact_id))
                    .count()
                    .get_result::<i64>(conn)?;
                if clash > 0 {
                    return Err(MessagingStorageError::UnexpectedResult(format!(
                        "A different contact already uses address {}",
                        c.address
                    )));
                }
                let existing = contacts::table
                    .filter(contacts::contact_id.eq(&c.contact_id))
                    .select(contacts::address)
                    .first::<String>(conn)
                    .optional()?;
                if let Some(address) = existing.filter(|a| a != &c.address) {
                    return Err(MessagingStorageError::UnexpectedResult(format!(
                        "Contact id {} already belongs to address {}",
                        c.contact_id, address
                    )));
                }
                diesel::replace_into(contacts::table)
                    .values(&ContactSql::from(c))
                    .execute(conn)?;
            },
            DbKeyValuePair::PendingRequest(p) => {
                diesel::replace_into(pending_requests::table)
                    .values(&PendingRequestSql::from(p))
                    .execute(conn)?;
            },
            DbKeyValuePair::SentRequest(address) => {
                diesel::replace_into(sent_requests::table)
                    .values(sent_requests::address.eq(address))
                    .execute(conn)?;
            },
            DbKeyValuePair::BannedAddress(address) => {
                diesel::replace_into(banned_addresses::table)
                    .values(banned_addresses::address.eq(address))
                    .execute(conn)?;
            },
            DbKeyValuePair::ProcessedTx(txid) => {
                diesel::replace_into(processed_txs::table)
                    .values(processed_txs::txid.eq(txid))
                    .execute(conn)?;
            },
            DbKeyValuePair::Message(m) => {
                diesel::insert_into(messages::table)
                    .values(&NewMessageSql::from(m))
                    .execute(conn)?;
            },
            DbKeyValuePair::UnreadMessage(m) => {
                diesel::insert_into(unread_messages::table)
                    .values(&NewUnreadMessageSql::from(m))
                    .execute(conn)?;
            },
        },
        WriteOperation::Remove(key) => match key {
            DbKey::Contact(contact_id) => {
                diesel::delete(contacts::table.filter(contacts::contact_id.eq(contact_id))).execute(conn)?;
            },
            DbKey::PendingRequest(address) => {
                diesel::delete(pending_requests::table.filter(pending_requests::address.eq(address))).execute(conn)?;
            },
            DbKey::SentRequest(address) => {
                diesel::delete(sent_requests::table.filter(sent_requests::address.eq(address))).execute(conn)?;
            },
            other => return Err(MessagingStorageError::OperationNotSupported(format!("Remove {}", other))),
        },
        WriteOperation::UpdateIdentityUsername(username) => {
            let updated = diesel::update(identity::table)
                .set(identity::username.eq(username))
                .execute(conn)?;
            if updated == 0 {
                return Err(MessagingStorageError::ValueNotFound(DbKey::Identity.to_string()));
            }
        },
        WriteOperation::UpdateContactUsername { contact_id, username } => {
            let updated = diesel::update(contacts::table.filter(contacts::contact_id.eq(&contact_id)))
                .set(contacts::username.eq(username))
                .execute(conn)?;
            if updated == 0 {
                return Err(MessagingStorageError::ValueNotFound(DbKey::Contact(contact_id).to_string()));
            }
        },
        WriteOperation::PromoteUnread(contact_id) => {
            let rows = load_unread(conn, &contact_id)?;
            for row in rows {
                diesel::insert_into(messages::table)
                    .values(&NewMessageSql::from(Message::from(row)))
                    .execute(conn)?;
            }
            let removed =
                diesel::delete(unread_messages::table.filter(unread_messages::contact_id.eq(&contact_id))).execute(conn)?;
            trace!(target: LOG_TARGET, "Promoted {} unread message(s) for {}", removed, contact_id);
        },
    }
    Ok(())
}

#[derive(Clone, Debug, Queryable, Insertable, PartialEq)]
#[table_name = "identity"]
struct IdentitySql {
    id: String,
    category: String,
    username: String,
    address: String,
}

impl From<Identity> for IdentitySql {
    fn from(i: Identity) -> Self {
        Self {
            id: i.id,
            category: i.category.to_string(),
            username: i.username,
            address: i.address,
        }
    }
}

impl TryFrom<IdentitySql> for Identity {
    type Error = MessagingStorageError;

    fn try_from(i: IdentitySql) -> Result<Self, Self::Error> {
        Ok(Self {
            category: parse_category(&i.category)?,
            id: i.id,
            username: i.username,
            address: i.address,
        })
    }
}

#[derive(Clone, Debug, Insertable, PartialEq)]
#[table_name = "exported_keys"]
struct ExportedKeySql {
    address: String,
    private_key: String,
}

#[derive(Clone, Debug, Queryable, Insertable, PartialEq)]
#[table_name = "contacts"]
struct ContactSql {
    contact_id: String,
    id: String,
    category: String,
    username: String,
    address: String,
}

impl From<Contact> for ContactSql {
    fn from(c: Contact) -> Self {
        Self {
            contact_id: c.contact_id,
            id: c.id,
            category: c.category.to_string(),
            username: c.username,
            address: c.address,
        }
    }
}

impl TryFrom<ContactSql> for Contact {
    type Error = MessagingStorageError;

    fn try_from(c: ContactSql) -> Result<Self, Self::Error> {
        Ok(Self {
            category: parse_category(&c.category)?,
            id: c.id,
            contact_id: c.contact_id,
            username: c.username,
            address: c.address,
        })
    }
}

#[derive(Clone, Debug, Queryable, Insertable, PartialEq)]
#[table_name = "pending_requests"]
struct PendingRequestSql {
    address: String,
    id: String,
    category: String,
    username: String,
}

impl From<PendingRequest> for PendingRequestSql {
    fn from(p: PendingRequest) -> Self {
        Self {
            address: p.address,
            id: p.id,
            category: p.category.to_string(),
            username: p.username,
        }
    }
}

impl TryFrom<PendingRequestSql> for PendingRequest {
    type Error = MessagingStorageError;

    fn try_from(p: PendingRequestSql) -> Result<Self, Self::Error> {
        Ok(Self {
            category: parse_category(&p.category)?,
            id: p.id,
            username: p.username,
            address: p.address,
        })
    }
}

/// Row shape shared by `messages` and `unread_messages`
#[derive(Clone, Debug, Queryable, PartialEq)]
struct MessageSql {
    id: i32,
    contact_id: String,
    author: String,
    body: String,
    amount: i64,
    timestamp: i64,
}

impl From<MessageSql> for Message {
    fn from(m: MessageSql) -> Self {
        Self {
            contact_id: m.contact_id,
            author: m.author,
            text: m.body,
            amount: Amount(m.amount.max(0) as u64),
            timestamp: m.timestamp,
        }
    }
}

#[derive(Clone, Debug, Insertable, PartialEq)]
#[table_name = "messages"]
struct NewMessageSql {
    contact_id: String,
    author: String,
    body: String,
    amount: i64,
    timestamp: i64,
}

impl From<Message> for NewMessageSql {
    fn from(m: Message) -> Self {
        Self {
            contact_id: m.contact_id,
            author: m.author,
            body: m.text,
            amount: m.amount.0 as i64,
            timestamp: m.timestamp,
        }
    }
}

#[derive(Clone, Debug, Insertable, PartialEq)]
#[table_name = "unread_messages"]
struct NewUnreadMessageSql {
    contact_id: String,
    author: String,
    body: String,
    amount: i64,
    timestamp: i64,
}

impl From<Message> for NewUnreadMessageSql {
    fn from(m: Message) -> Self {
        Self {
            contact_id: m.contact_id,
            author: m.author,
            body: m.text,
            amount: m.amount.0 as i64,
            timestamp: m.timestamp,
        }
    }
}

fn parse_category(value: &str) -> Result<Category, MessagingStorageError> {
    value.parse::<Category>().map_err(MessagingStorageError::ConversionError)
}
