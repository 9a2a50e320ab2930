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

use crate::support::utils::{contact_for, identity};
use zchat_messaging::{
    error::MessagingStorageError,
    storage::{
        database::{DbKey, DbKeyValuePair, MessagingBackend, MessagingDatabase, WriteOperation},
        memory_db::MessagingMemoryDatabase,
        sqlite_db::MessagingSqliteDatabase,
    },
    types::{Amount, Category, Contact, Message, PendingRequest},
};
use zchat_test_utils::paths::{create_temporary_data_path, temp_database_path};

fn message(contact_id: &str, text: &str, timestamp: i64) -> Message {
    Message {
        contact_id: contact_id.to_string(),
        author: "alice".to_string(),
        text: text.to_string(),
        amount: Amount(15_000),
        timestamp,
    }
}

pub async fn test_identity<T: MessagingBackend>(db: MessagingDatabase<T>) {
    assert_eq!(db.get_identity().await.unwrap(), None);
    let alice = identity("alice");
    db.apply(vec![
        WriteOperation::Insert(DbKeyValuePair::Identity(alice.clone())),
        WriteOperation::Insert(DbKeyValuePair::ExportedKey {
            address: alice.address.clone(),
            private_key: "secret".to_string(),
        }),
    ])
    .await
    .unwrap();
    assert_eq!(db.get_identity().await.unwrap(), Some(alice.clone()));
    assert_eq!(db.get_exported_key().await.unwrap(), Some("secret".to_string()));

    db.apply(vec![WriteOperation::UpdateIdentityUsername("alicia".to_string())])
        .await
        .unwrap();
    let renamed = db.get_identity().await.unwrap().unwrap();
    assert_eq!(renamed.username, "alicia");
    assert_eq!(renamed.id, alice.id);
    assert_eq!(renamed.address, alice.address);
}

pub async fn test_trust_records<T: MessagingBackend>(db: MessagingDatabase<T>) {
    let bob = contact_for(&identity("bob"));
    let carol = PendingRequest {
        category: Category::Group,
        id: "carol-id".to_string(),
        username: "carol".to_string(),
        address: "zs1carol".to_string(),
    };
    db.apply(vec![
        WriteOperation::Insert(DbKeyValuePair::Contact(bob.clone())),
        WriteOperation::Insert(DbKeyValuePair::PendingRequest(carol.clone())),
        WriteOperation::Insert(DbKeyValuePair::SentRequest("zs1dave".to_string())),
        WriteOperation::Insert(DbKeyValuePair::BannedAddress("zs1mallory".to_string())),
        WriteOperation::Insert(DbKeyValuePair::ProcessedTx("tx1".to_string())),
    ])
    .await
    .unwrap();

    assert_eq!(db.get_contact(bob.contact_id.clone()).await.unwrap(), Some(bob.clone()));
    assert_eq!(db.get_contact_by_address("zs1bob".to_string()).await.unwrap(), Some(bob.clone()));
    assert_eq!(db.get_pending_request("zs1carol".to_string()).await.unwrap(), Some(carol.clone()));
    assert_eq!(db.get_pending_request_by_id("carol-id".to_string()).await.unwrap(), Some(carol.clone()));
    assert!(db.has_sent_request("zs1dave".to_string()).await.unwrap());
    assert!(db.is_banned("zs1mallory".to_string()).await.unwrap());
    assert!(!db.is_banned("zs1bob".to_string()).await.unwrap());
    assert!(db.is_processed("tx1".to_string()).await.unwrap());
    assert!(!db.is_processed("tx2".to_string()).await.unwrap());

    // Inserting the same records again is harmless
    db.apply(vec![
        WriteOperation::Insert(DbKeyValuePair::SentRequest("zs1dave".to_string())),
        WriteOperation::Insert(DbKeyValuePair::ProcessedTx("tx1".to_string())),
    ])
    .await
    .unwrap();
    assert_eq!(db.get_sent_requests().await.unwrap().len(), 1);

    db.apply(vec![WriteOperation::UpdateContactUsername {
        contact_id: bob.contact_id.clone(),
        username: "robert".to_string(),
    }])
    .await
    .unwrap();
    assert_eq!(db.get_contacts().await.unwrap()[0].username, "robert");

    // A second contact may not share an address
    let impostor = Contact::new(Category::Individual, "impostor-id".to_string(), "bob".to_string(), "zs1bob".to_string());
    assert!(db
        .apply(vec![WriteOperation::Insert(DbKeyValuePair::Contact(impostor))])
        .await
        .is_err());

    // Nor may a contact at another address take over an existing id
    let spoofed = Contact::new(
        Category::Individual,
        bob.contact_id.clone(),
        "bob".to_string(),
        "zs1mallory".to_string(),
    );
    assert!(db
        .apply(vec![WriteOperation::Insert(DbKeyValuePair::Contact(spoofed))])
        .await
        .is_err());
    let kept = db.get_contact(bob.contact_id.clone()).await.unwrap().unwrap();
    assert_eq!(kept.address, "zs1bob");
    assert_eq!(kept.username, "robert");

    db.apply(vec![
        WriteOperation::Remove(DbKey::Contact(bob.contact_id.clone())),
        WriteOperation::Remove(DbKey::PendingRequest("zs1carol".to_string())),
        WriteOperation::Remove(DbKey::SentRequest("zs1dave".to_string())),
    ])
    .await
    .unwrap();
    assert!(db.get_contacts().await.unwrap().is_empty());
    assert!(db.get_pending_requests().await.unwrap().is_empty());
    assert!(db.get_sent_requests().await.unwrap().is_empty());
}

pub async fn test_batches_are_atomic<T: MessagingBackend>(db: MessagingDatabase<T>) {
    let result = db
        .apply(vec![
            WriteOperation::Insert(DbKeyValuePair::ProcessedTx("tx9".to_string())),
            WriteOperation::Insert(DbKeyValuePair::UnreadMessage(message("bob-id", "lost", 1))),
            WriteOperation::UpdateContactUsername {
                contact_id: "nobody".to_string(),
                username: "x".to_string(),
            },
        ])
        .await;
    assert!(matches!(result, Err(MessagingStorageError::ValueNotFound(_))));
    assert!(!db.is_processed("tx9".to_string()).await.unwrap());
    assert_eq!(db.get_unread_count("bob-id".to_string()).await.unwrap(), 0);

    let result = db
        .apply(vec![
            WriteOperation::Insert(DbKeyValuePair::ProcessedTx("tx9".to_string())),
            WriteOperation::Remove(DbKey::ProcessedTx("tx9".to_string())),
        ])
        .await;
    assert!(matches!(result, Err(MessagingStorageError::OperationNotSupported(_))));
    assert!(!db.is_processed("tx9".to_string()).await.unwrap());
}

pub async fn test_messages<T: MessagingBackend>(db: MessagingDatabase<T>) {
    assert_eq!(db.get_latest_timestamp().await.unwrap(), None);
    db.apply(vec![
        WriteOperation::Insert(DbKeyValuePair::Message(message("bob-id", "one", 10))),
        WriteOperation::Insert(DbKeyValuePair::Message(message("bob-id", "two", 20))),
        WriteOperation::Insert(DbKeyValuePair::Message(message("bob-id", "three", 30))),
        WriteOperation::Insert(DbKeyValuePair::UnreadMessage(message("bob-id", "five", 50))),
        WriteOperation::Insert(DbKeyValuePair::UnreadMessage(message("bob-id", "four", 40))),
        WriteOperation::Insert(DbKeyValuePair::UnreadMessage(message("carol-id", "other", 60))),
    ])
    .await
    .unwrap();

    let newest = db.get_messages("bob-id".to_string(), None, 2).await.unwrap();
    assert_eq!(newest, vec![message("bob-id", "three", 30), message("bob-id", "two", 20)]);
    let older = db.get_messages("bob-id".to_string(), Some(20), 2).await.unwrap();
    assert_eq!(older, vec![message("bob-id", "one", 10)]);

    let unread = db.get_unread_messages("bob-id".to_string()).await.unwrap();
    assert_eq!(unread, vec![message("bob-id", "four", 40), message("bob-id", "five", 50)]);
    assert_eq!(db.get_unread_count("bob-id".to_string()).await.unwrap(), 2);
    assert_eq!(db.get_latest_timestamp().await.unwrap(), Some(60));

    db.apply(vec![WriteOperation::PromoteUnread("bob-id".to_string())])
        .await
        .unwrap();
    assert_eq!(db.get_unread_count("bob-id".to_string()).await.unwrap(), 0);
    assert_eq!(db.get_unread_count("carol-id".to_string()).await.unwrap(), 1);
    let all = db.get_messages("bob-id".to_string(), None, 100).await.unwrap();
    assert_eq!(
        all.iter().map(|m| m.timestamp).collect::<Vec<_>>(),
        vec![50, 40, 30, 20, 10]
    );
}

#[tokio::test]
async fn memory_identity() {
    test_identity(MessagingDatabase::new(MessagingMemoryDatabase::new())).await;
}

#[tokio::test]
async fn memory_trust_records() {
    test_trust_records(MessagingDatabase::new(MessagingMemoryDatabase::new())).await;
}

#[tokio::test]
async fn memory_batches_are_atomic() {
    test_batches_are_atomic(MessagingDatabase::new(MessagingMemoryDatabase::new())).await;
}

#[tokio::test]
async fn memory_messages() {
    test_messages(MessagingDatabase::new(MessagingMemoryDatabase::new())).await;
}

#[tokio::test]
async fn sqlite_backend() {
    let temp_dir = create_temporary_data_path();
    let db_path = temp_database_path(&temp_dir, "messaging");

    test_identity(MessagingDatabase::new(MessagingSqliteDatabase::open(&db_path).unwrap())).await;
    test_trust_records(MessagingDatabase::new(MessagingSqliteDatabase::open(&db_path).unwrap())).await;
    test_batches_are_atomic(MessagingDatabase::new(MessagingSqliteDatabase::open(&db_path).unwrap())).await;
    test_messages(MessagingDatabase::new(MessagingSqliteDatabase::open(&db_path).unwrap())).await;
}

#[tokio::test]
async fn sqlite_state_survives_reopening() {
    let temp_dir = create_temporary_data_path();
    let db_path = temp_database_path(&temp_dir, "reopen");
    {
        let db = MessagingDatabase::new(MessagingSqliteDatabase::open(&db_path).unwrap());
        db.apply(vec![
            WriteOperation::Insert(DbKeyValuePair::Identity(identity("alice"))),
            WriteOperation::Insert(DbKeyValuePair::ProcessedTx("tx1".to_string())),
        ])
        .await
        .unwrap();
    }
    let db = MessagingDatabase::new(MessagingSqliteDatabase::open(&db_path).unwrap());
    assert_eq!(db.get_identity().await.unwrap(), Some(identity("alice")));
    assert!(db.is_processed("tx1".to_string()).await.unwrap());
}
