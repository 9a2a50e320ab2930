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

use crate::support::utils::{contact_for, identity, test_config, ScannerContext};
use std::time::Duration;
use zchat_messaging::{
    error::{MessagingError, SendError},
    memo::{self, ChatMessage, Envelope},
    outbound::Precondition,
    protocol,
    rpc::{OperationStatus, RpcError},
    types::{Amount, PendingRequest},
    MessagingConfig,
};

fn chat(text: &str) -> Envelope {
    Envelope::Message(ChatMessage {
        id: identity("alice").id,
        username: "alice".to_string(),
        text: text.to_string(),
    })
}

#[tokio::test]
async fn confirmed_send_marks_txid_and_applies_mutations() {
    let ctx = ScannerContext::new("alice").await;
    let bob = contact_for(&identity("bob"));
    ctx.add_contact(bob.clone()).await;

    let (txid, message) = ctx
        .outbound
        .send_envelope(
            &ctx.owner.address,
            &bob.address,
            Amount(10_000),
            Amount(10_000),
            &chat("hello"),
            &Precondition::Contact {
                contact_id: bob.contact_id.clone(),
                address: bob.address.clone(),
            },
            |_| protocol::message_sent(&bob, "hello", Amount(10_000), 77),
        )
        .await
        .unwrap();

    let payments = ctx.rpc.payments();
    assert_eq!(payments.len(), 1);
    assert_eq!(payments[0].from_address, "zs1alice");
    assert_eq!(payments[0].to_address, "zs1bob");
    assert_eq!(payments[0].memo_hex, memo::encode(&chat("hello")).unwrap());
    assert!(ctx.db.is_processed(txid).await.unwrap());
    assert_eq!(ctx.db.get_messages(bob.contact_id.clone(), None, 10).await.unwrap(), vec![message]);
}

#[tokio::test]
async fn ban_before_confirmation_only_marks_txid() {
    let ctx = ScannerContext::new("alice").await;
    let bob = contact_for(&identity("bob"));
    ctx.add_contact(bob.clone()).await;
    // Banned while the payment was still in flight
    ctx.db.apply(protocol::contact_banned(&bob)).await.unwrap();

    let result = ctx
        .outbound
        .send_envelope(
            &ctx.owner.address,
            &bob.address,
            Amount(10_000),
            Amount(10_000),
            &chat("hello"),
            &Precondition::Contact {
                contact_id: bob.contact_id.clone(),
                address: bob.address.clone(),
            },
            |_| protocol::message_sent(&bob, "hello", Amount(10_000), 77),
        )
        .await;

    match result {
        Err(MessagingError::SendError(SendError::Superseded { txid, reason })) => {
            assert_eq!(txid, "tx-0001");
            assert_eq!(reason, "zs1bob was banned");
        },
        other => panic!("unexpected result {:?}", other),
    }
    assert_eq!(ctx.rpc.call_count("z_sendmany"), 1);
    assert!(ctx.db.is_processed("tx-0001".to_string()).await.unwrap());
    assert!(ctx.db.get_messages(bob.contact_id.clone(), None, 10).await.unwrap().is_empty());
    assert!(ctx.db.get_contact(bob.contact_id.clone()).await.unwrap().is_none());
}

#[tokio::test]
async fn accepted_request_must_still_be_pending() {
    let ctx = ScannerContext::new("alice").await;
    let carol = identity("carol");
    let pending = PendingRequest {
        category: carol.category,
        id: carol.id.clone(),
        username: carol.username.clone(),
        address: carol.address.clone(),
    };

    let result = ctx
        .outbound
        .send_envelope(
            &ctx.owner.address,
            &carol.address,
            Amount(10_000),
            Amount(10_000),
            &chat("hello"),
            &Precondition::PendingRequest {
                address: carol.address.clone(),
                id: carol.id.clone(),
            },
            |_| protocol::pending_accepted(&pending),
        )
        .await;

    match result {
        Err(MessagingError::SendError(SendError::Superseded { reason, .. })) => {
            assert_eq!(reason, "the request from zs1carol is no longer pending")
        },
        other => panic!("unexpected result {:?}", other),
    }
    assert!(ctx.db.get_contacts().await.unwrap().is_empty());
}

#[tokio::test]
async fn waits_for_operation_to_finish() {
    let ctx = ScannerContext::new("alice").await;
    ctx.rpc
        .set_status_script(vec![OperationStatus::Queued, OperationStatus::Executing]);
    ctx.rpc.set_empty_results(2);

    let txid = ctx
        .outbound
        .send_memo("zs1alice", "zs1bob", Amount(1), Amount(10_000), memo::encode_text("hi"))
        .await
        .unwrap();

    assert_eq!(txid, "tx-0001");
    assert_eq!(ctx.rpc.call_count("z_sendmany"), 1);
    assert_eq!(ctx.rpc.call_count("z_getoperationstatus"), 3);
    assert_eq!(ctx.rpc.call_count("z_getoperationresult"), 3);
}

#[tokio::test]
async fn failed_operation_leaves_store_untouched() {
    let ctx = ScannerContext::new("alice").await;
    ctx.rpc
        .set_final_status(OperationStatus::Failed("insufficient funds".to_string()));

    let result = ctx
        .outbound
        .send_envelope(
            &ctx.owner.address,
            "zs1bob",
            Amount(10_000),
            Amount(10_000),
            &chat("hello"),
            &Precondition::Requestable("zs1bob".to_string()),
            |_| ((), protocol::request_sent("zs1bob")),
        )
        .await;

    match result {
        Err(MessagingError::SendError(SendError::OperationFailed(reason))) => assert_eq!(reason, "insufficient funds"),
        other => panic!("unexpected result {:?}", other),
    }
    assert!(ctx.db.get_sent_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn cancelled_operation() {
    let ctx = ScannerContext::new("alice").await;
    ctx.rpc.set_final_status(OperationStatus::Cancelled);

    let result = ctx
        .outbound
        .send_memo("zs1alice", "zs1bob", Amount(1), Amount(10_000), memo::encode_text("hi"))
        .await;
    assert_eq!(result, Err(SendError::OperationCancelled));
}

#[tokio::test]
async fn gives_up_after_max_polls() {
    let ctx = ScannerContext::new("alice").await;
    ctx.rpc.set_status_script(vec![OperationStatus::Executing; 50]);

    let result = ctx
        .outbound
        .send_memo("zs1alice", "zs1bob", Amount(1), Amount(10_000), memo::encode_text("hi"))
        .await;
    assert_eq!(result, Err(SendError::Timeout(test_config().max_operation_polls)));
}

#[tokio::test]
async fn oversized_memo_is_never_submitted() {
    let ctx = ScannerContext::new("alice").await;

    let result = ctx
        .outbound
        .send_envelope(
            &ctx.owner.address,
            "zs1bob",
            Amount(10_000),
            Amount(10_000),
            &chat(&"z".repeat(600)),
            &Precondition::Requestable("zs1bob".to_string()),
            |_| ((), vec![]),
        )
        .await;

    assert!(matches!(
        result,
        Err(MessagingError::SendError(SendError::MemoTooLarge { max: 512, .. }))
    ));
    assert_eq!(ctx.rpc.call_count("z_sendmany"), 0);
}

#[tokio::test]
async fn rpc_error_on_submit() {
    let ctx = ScannerContext::new("alice").await;
    ctx.rpc.fail_with(Some(RpcError::Transport("timed out".to_string())));

    let result = ctx
        .outbound
        .send_memo("zs1alice", "zs1bob", Amount(1), Amount(10_000), memo::encode_text("hi"))
        .await;
    assert_eq!(
        result,
        Err(SendError::Rpc(RpcError::Transport("timed out".to_string())))
    );
}

#[tokio::test]
async fn shutdown_interrupts_polling() {
    let config = MessagingConfig {
        operation_poll_interval: Duration::from_secs(30),
        ..test_config()
    };
    let mut ctx = ScannerContext::with_config("alice", config).await;
    ctx.rpc.set_status_script(vec![OperationStatus::Queued; 5]);

    let outbound = ctx.outbound.clone();
    let send = tokio::spawn(async move {
        outbound
            .send_memo("zs1alice", "zs1bob", Amount(1), Amount(10_000), memo::encode_text("hi"))
            .await
    });
    tokio::time::delay_for(Duration::from_millis(50)).await;
    ctx.shutdown.trigger();

    let result = tokio::time::timeout(Duration::from_secs(5), send)
        .await
        .expect("send did not stop")
        .unwrap();
    assert_eq!(result, Err(SendError::Interrupted));
}
