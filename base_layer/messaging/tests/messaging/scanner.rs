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

use crate::support::{
    mock_rpc::plain_output,
    utils::{
        contact_for,
        identity,
        FailingBackend,
        identity_reply_from,
        message_from,
        request_from,
        store_counts,
        test_config,
        ScannerContext,
    },
};
use std::time::Duration;
use zchat_messaging::{
    handle::MessagingEvent,
    memo,
    protocol::SweepMode,
    rpc::RpcError,
    scanner::CONSOLIDATION_MEMO,
    storage::database::{DbKeyValuePair, WriteOperation},
    types::{Amount, COIN},
    MessagingConfig,
};

#[tokio::test]
async fn ingestion_is_idempotent() {
    let ctx = ScannerContext::new("bob").await;
    let alice = identity("alice");
    let carol = identity("carol");
    ctx.add_contact(contact_for(&alice)).await;
    ctx.deliver(request_from("tx1", &carol));
    ctx.deliver(message_from("tx2", &alice, "hi"));
    ctx.deliver(plain_output("tx3", "just a payment"));

    let first = ctx.scanner.poll(SweepMode::Continuous).await.unwrap();
    assert_eq!(first.outputs_seen, 3);
    assert_eq!(first.newly_processed, 3);
    assert_eq!(first.applied, 2);
    assert_eq!(first.not_protocol, 1);
    let after_first = store_counts(&ctx.db, &[&alice.id]).await;

    let second = ctx.scanner.poll(SweepMode::Continuous).await.unwrap();
    assert_eq!(second.outputs_seen, 3);
    assert_eq!(second.newly_processed, 0);
    assert_eq!(store_counts(&ctx.db, &[&alice.id]).await, after_first);
    assert_eq!(after_first.pending, 1);
    assert_eq!(after_first.unread, 1);
    for txid in &["tx1", "tx2", "tx3"] {
        assert!(ctx.db.is_processed(txid.to_string()).await.unwrap());
    }
}

#[tokio::test]
async fn message_to_closed_conversation_is_staged() {
    let mut ctx = ScannerContext::new("bob").await;
    let alice = identity("alice");
    ctx.add_contact(contact_for(&alice)).await;
    ctx.deliver(message_from("tx1", &alice, "hi"));

    let report = ctx.scanner.poll(SweepMode::Continuous).await.unwrap();
    assert_eq!(report.messages, 1);

    let unread = ctx.db.get_unread_messages(alice.id.clone()).await.unwrap();
    assert_eq!(unread.len(), 1);
    assert_eq!(unread[0].text, "hi");
    assert_eq!(unread[0].author, "alice");
    assert_eq!(unread[0].amount, Amount(10_000));
    assert!(ctx.db.get_messages(alice.id.clone(), None, 10).await.unwrap().is_empty());

    let events = ctx.drain_events();
    assert_eq!(events.len(), 1);
    assert!(matches!(&events[0], MessagingEvent::NewMessage(m) if m.text == "hi"));
}

#[tokio::test]
async fn message_to_open_conversation_goes_to_history() {
    let mut ctx = ScannerContext::new("bob").await;
    let alice = identity("alice");
    ctx.add_contact(contact_for(&alice)).await;
    ctx.open(&alice.id);
    ctx.deliver(message_from("tx1", &alice, "you there?"));

    ctx.scanner.poll(SweepMode::Continuous).await.unwrap();

    let history = ctx.db.get_messages(alice.id.clone(), None, 10).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(ctx.db.get_unread_count(alice.id.clone()).await.unwrap(), 0);
    assert!(ctx.drain_events().is_empty());
}

#[tokio::test]
async fn message_from_unknown_sender_is_dropped() {
    let ctx = ScannerContext::new("bob").await;
    let eve = identity("eve");
    ctx.deliver(message_from("tx1", &eve, "let me in"));

    let report = ctx.scanner.poll(SweepMode::Continuous).await.unwrap();
    assert_eq!(report.ignored, 1);
    assert_eq!(ctx.db.get_unread_count(eve.id.clone()).await.unwrap(), 0);
    assert!(ctx.db.get_messages(eve.id.clone(), None, 10).await.unwrap().is_empty());
    assert!(ctx.db.is_processed("tx1".to_string()).await.unwrap());
}

#[tokio::test]
async fn banned_address_cannot_request() {
    let ctx = ScannerContext::new("bob").await;
    let mallory = identity("mallory");
    ctx.db
        .apply(vec![WriteOperation::Insert(DbKeyValuePair::BannedAddress(
            mallory.address.clone(),
        ))])
        .await
        .unwrap();
    ctx.deliver(request_from("tx1", &mallory));

    let report = ctx.scanner.poll(SweepMode::Continuous).await.unwrap();
    assert_eq!(report.ignored, 1);
    assert!(ctx.db.get_pending_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn unknown_envelope_type_is_not_a_protocol_message() {
    let ctx = ScannerContext::new("bob").await;
    let before = store_counts(&ctx.db, &[]).await;
    ctx.deliver(zchat_messaging::rpc::UnspentOutput {
        txid: "tx1".to_string(),
        amount: Amount(10_000),
        memo: hex::encode(r#"{"type":"unknown","id":"abc"}"#),
    });

    let report = ctx.scanner.poll(SweepMode::Continuous).await.unwrap();
    assert_eq!(report.not_protocol, 1);
    assert_eq!(report.applied, 0);
    assert_eq!(store_counts(&ctx.db, &[]).await, before);
    assert!(ctx.db.is_processed("tx1".to_string()).await.unwrap());
}

#[tokio::test]
async fn duplicate_requests_leave_one_pending_entry() {
    let ctx = ScannerContext::new("bob").await;
    let alice = identity("alice");
    ctx.deliver(request_from("tx1", &alice));
    ctx.deliver(request_from("tx2", &alice));

    let report = ctx.scanner.poll(SweepMode::Continuous).await.unwrap();
    assert_eq!(report.requests, 1);
    assert_eq!(report.ignored, 1);
    assert_eq!(ctx.db.get_pending_requests().await.unwrap().len(), 1);
}

#[tokio::test]
async fn identity_reply_completes_sent_request() {
    let mut ctx = ScannerContext::new("alice").await;
    let bob = identity("bob");
    ctx.db
        .apply(vec![WriteOperation::Insert(DbKeyValuePair::SentRequest(bob.address.clone()))])
        .await
        .unwrap();
    ctx.deliver(identity_reply_from("tx1", &bob));

    let report = ctx.scanner.poll(SweepMode::Continuous).await.unwrap();
    assert_eq!(report.accepted, 1);
    assert_eq!(ctx.db.get_contact(bob.id.clone()).await.unwrap(), Some(contact_for(&bob)));
    assert!(!ctx.db.has_sent_request(bob.address.clone()).await.unwrap());
    assert!(matches!(
        ctx.drain_events().as_slice(),
        [MessagingEvent::RequestAccepted(c)] if c.username == "bob"
    ));
}

#[tokio::test]
async fn unsolicited_identity_is_ignored() {
    let ctx = ScannerContext::new("alice").await;
    let bob = identity("bob");
    ctx.deliver(identity_reply_from("tx1", &bob));

    let report = ctx.scanner.poll(SweepMode::Continuous).await.unwrap();
    assert_eq!(report.ignored, 1);
    assert!(ctx.db.get_contacts().await.unwrap().is_empty());
}

#[tokio::test]
async fn startup_sweep_aggregates_notifications() {
    let mut ctx = ScannerContext::new("bob").await;
    let alice = identity("alice");
    ctx.add_contact(contact_for(&alice)).await;
    // No UI is showing anything yet, even if a view was left open
    ctx.open(&alice.id);
    ctx.deliver(request_from("tx1", &identity("carol")));
    ctx.deliver(request_from("tx2", &identity("dave")));
    ctx.deliver(message_from("tx3", &alice, "while you were away"));

    ctx.scanner.poll(SweepMode::Startup).await.unwrap();

    assert_eq!(ctx.drain_events(), vec![MessagingEvent::StartupSummary {
        requests: 2,
        accepted: 0,
        messages: 1
    }]);
    assert_eq!(ctx.db.get_unread_count(alice.id.clone()).await.unwrap(), 1);

    // A continuous sweep after start-up does not see them again
    let report = ctx.scanner.poll(SweepMode::Continuous).await.unwrap();
    assert_eq!(report.newly_processed, 0);
    assert!(ctx.drain_events().is_empty());
}

#[tokio::test]
async fn remote_rename_updates_contact() {
    let ctx = ScannerContext::new("bob").await;
    let alice = identity("alice");
    ctx.add_contact(contact_for(&alice)).await;
    let mut renamed = alice.clone();
    renamed.username = "alice_in_chains".to_string();
    ctx.deliver(message_from("tx1", &renamed, "new name"));

    ctx.scanner.poll(SweepMode::Continuous).await.unwrap();

    let contact = ctx.db.get_contact(alice.id.clone()).await.unwrap().unwrap();
    assert_eq!(contact.username, "alice_in_chains");
    let unread = ctx.db.get_unread_messages(alice.id.clone()).await.unwrap();
    assert_eq!(unread[0].author, "alice_in_chains");
}

#[tokio::test]
async fn rpc_failure_is_retried_on_next_sweep() {
    let ctx = ScannerContext::new("bob").await;
    ctx.deliver(request_from("tx1", &identity("alice")));
    ctx.rpc.fail_with(Some(RpcError::Transport("connection refused".to_string())));

    assert!(ctx.scanner.poll(SweepMode::Continuous).await.is_err());
    assert!(!ctx.db.is_processed("tx1".to_string()).await.unwrap());

    ctx.rpc.fail_with(None);
    let report = ctx.scanner.poll(SweepMode::Continuous).await.unwrap();
    assert_eq!(report.requests, 1);
}

#[tokio::test]
async fn store_failure_mid_sweep_keeps_earlier_notifications() {
    // The identity is the first write, so the second request is the one that fails
    let mut ctx = ScannerContext::with_backend("bob", test_config(), FailingBackend::new(3)).await;
    ctx.deliver(request_from("tx1", &identity("carol")));
    ctx.deliver(request_from("tx2", &identity("dave")));
    ctx.deliver(request_from("tx3", &identity("erin")));

    assert!(ctx.scanner.poll(SweepMode::Continuous).await.is_err());

    let announced: Vec<String> = ctx
        .drain_events()
        .into_iter()
        .map(|event| match event {
            MessagingEvent::PendingRequestReceived(pending) => pending.username,
            other => panic!("unexpected event {:?}", other),
        })
        .collect();
    assert_eq!(announced, vec!["carol".to_string(), "erin".to_string()]);
    assert!(ctx.db.is_processed("tx1".to_string()).await.unwrap());
    assert!(!ctx.db.is_processed("tx2".to_string()).await.unwrap());
    assert!(ctx.db.is_processed("tx3".to_string()).await.unwrap());

    // The failed output is picked up by the next sweep
    let report = ctx.scanner.poll(SweepMode::Continuous).await.unwrap();
    assert_eq!(report.newly_processed, 1);
    assert_eq!(report.requests, 1);
    assert_eq!(ctx.db.get_pending_requests().await.unwrap().len(), 3);
}

#[tokio::test]
async fn spoofed_contact_id_is_ignored() {
    let ctx = ScannerContext::new("bob").await;
    let alice = identity("alice");
    ctx.add_contact(contact_for(&alice)).await;
    let mut mallory = identity("mallory");
    mallory.id = alice.id.clone();
    ctx.db
        .apply(vec![WriteOperation::Insert(DbKeyValuePair::SentRequest(
            mallory.address.clone(),
        ))])
        .await
        .unwrap();
    ctx.deliver(request_from("tx1", &mallory));
    ctx.deliver(identity_reply_from("tx2", &mallory));

    let report = ctx.scanner.poll(SweepMode::Continuous).await.unwrap();

    assert_eq!(report.ignored, 2);
    assert!(ctx.db.get_pending_requests().await.unwrap().is_empty());
    let contacts = ctx.db.get_contacts().await.unwrap();
    assert_eq!(contacts, vec![contact_for(&alice)]);
}

#[tokio::test]
async fn consolidates_notes() {
    let config = MessagingConfig {
        consolidation_threshold: 3,
        ..test_config()
    };
    let ctx = ScannerContext::with_config("bob", config).await;
    ctx.rpc.set_balance(Amount(COIN));
    for i in 0..3 {
        ctx.deliver(plain_output(&format!("tx{}", i), "payment"));
    }

    let report = ctx.scanner.poll(SweepMode::Continuous).await.unwrap();
    let txid = report.consolidation_txid.expect("notes were not consolidated");

    let payments = ctx.rpc.payments();
    assert_eq!(payments.len(), 1);
    assert_eq!(payments[0].from_address, ctx.owner.address);
    assert_eq!(payments[0].to_address, ctx.owner.address);
    assert_eq!(payments[0].amount, Amount(COIN - 20_000));
    assert_eq!(payments[0].fee, Amount(10_000));
    assert_eq!(payments[0].memo_hex, memo::encode_text(CONSOLIDATION_MEMO));
    assert!(ctx.db.is_processed(txid).await.unwrap());

    // The merged note is ours and already processed
    let report = ctx.scanner.poll(SweepMode::Continuous).await.unwrap();
    assert_eq!(report.outputs_seen, 1);
    assert_eq!(report.newly_processed, 0);
    assert_eq!(report.consolidation_txid, None);
}

#[tokio::test]
async fn consolidation_needs_a_balance() {
    let config = MessagingConfig {
        consolidation_threshold: 1,
        ..test_config()
    };
    let ctx = ScannerContext::with_config("bob", config).await;
    ctx.rpc.set_balance(Amount(15_000));
    ctx.deliver(plain_output("tx1", "dust"));

    let report = ctx.scanner.poll(SweepMode::Continuous).await.unwrap();
    assert_eq!(report.consolidation_txid, None);
    assert!(ctx.rpc.payments().is_empty());
}

#[tokio::test]
async fn scanner_stops_on_shutdown() {
    let mut ctx = ScannerContext::new("bob").await;
    let alice = identity("alice");
    ctx.deliver(request_from("tx1", &alice));

    let task = tokio::spawn(ctx.scanner.clone().run(ctx.shutdown.to_signal()));
    zchat_test_utils::async_assert_eventually!(
        ctx.db.get_pending_requests().await.unwrap().len(),
        expect = 1,
        max_attempts = 20,
        interval = Duration::from_millis(10)
    );
    ctx.shutdown.trigger();
    tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .expect("scanner did not stop")
        .unwrap();

    // The run loop starts with the aggregated startup sweep
    assert!(matches!(ctx.drain_events().as_slice(), [MessagingEvent::StartupSummary {
        requests: 1,
        ..
    }]));
}

#[tokio::test]
async fn trust_states_are_exclusive() {
    let ctx = ScannerContext::new("bob").await;
    let alice = identity("alice");
    let carol = identity("carol");
    let mallory = identity("mallory");
    ctx.add_contact(contact_for(&alice)).await;
    ctx.db
        .apply(vec![
            WriteOperation::Insert(DbKeyValuePair::SentRequest(carol.address.clone())),
            WriteOperation::Insert(DbKeyValuePair::BannedAddress(mallory.address.clone())),
        ])
        .await
        .unwrap();

    // Requests from a contact, crossed requests, and anything at all from a banned address
    ctx.deliver(request_from("tx1", &alice));
    ctx.deliver(request_from("tx2", &carol));
    ctx.deliver(identity_reply_from("tx3", &carol));
    ctx.deliver(request_from("tx4", &mallory));
    ctx.deliver(identity_reply_from("tx5", &mallory));
    ctx.deliver(identity_reply_from("tx6", &alice));
    ctx.scanner.poll(SweepMode::Continuous).await.unwrap();

    let contacts = ctx.db.get_contacts().await.unwrap();
    let pending = ctx.db.get_pending_requests().await.unwrap();
    let banned = ctx.db.get_banned_addresses().await.unwrap();
    for address in vec![alice.address, carol.address, mallory.address] {
        let states = contacts.iter().filter(|c| c.address == address).count() +
            pending.iter().filter(|p| p.address == address).count() +
            banned.iter().filter(|b| **b == address).count();
        assert!(states <= 1, "{} is in {} trust states", address, states);
    }
    assert_eq!(contacts.len(), 2);
    assert!(pending.is_empty());
    assert!(ctx.db.get_sent_requests().await.unwrap().is_empty());
}
