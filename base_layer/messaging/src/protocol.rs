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

//! # Protocol engine
//!
//! The handshake and contact state machine. Every remote address is in one of these states:
//!
//! ```text
//! UNKNOWN      -- recv request (not banned)       --> PENDING
//! PENDING      -- user accepts                    --> CONTACT (identity reply sent)
//! PENDING      -- user rejects                    --> BANNED
//! UNKNOWN      -- user sends request              --> SENT_REQUEST
//! SENT_REQUEST -- recv identity reply (not banned) --> CONTACT
//! CONTACT      -- recv message                    --> message or unread message appended
//! BANNED       -- anything                        --> ignored
//! ```
//!
//! [decide] is pure: given an inbound envelope, what the store currently knows about its sender, and how it was
//! delivered, it returns the write operations to apply. Envelopes that match no transition are ignored, never errors.
//! The local transitions at the bottom of this module build the write operations for user initiated actions.

use crate::{
    memo::{ChatMessage, Envelope, IdentityCard},
    storage::database::{DbKey, DbKeyValuePair, WriteOperation},
    types::{Amount, Contact, Message, PendingRequest, TxId, OUTBOUND_AUTHOR},
};
use std::fmt::{Display, Error, Formatter};

/// Which conversation, if any, the user is currently looking at
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConversationView {
    Closed,
    Open(String),
}

impl ConversationView {
    pub fn is_open(&self, contact_id: &str) -> bool {
        match self {
            ConversationView::Open(id) => id == contact_id,
            ConversationView::Closed => false,
        }
    }
}

impl Default for ConversationView {
    fn default() -> Self {
        ConversationView::Closed
    }
}

/// The two kinds of ledger sweep
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SweepMode {
    /// Catch-up sweep run once at start-up. Messages always go to the unread staging area and notifications are
    /// aggregated.
    Startup,
    /// Periodic sweep. Notifies per item and appends straight to the history of the open conversation.
    Continuous,
}

/// What the store knows about the sender of an envelope.
///
/// For `identity` and `request` envelopes the facts are looked up by the address carried in the envelope, for
/// `message` envelopes `contact` is looked up by the sender id.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TrustFacts {
    pub own_address: bool,
    pub banned: bool,
    pub contact: Option<Contact>,
    pub pending: bool,
    pub sent_request: bool,
    /// A contact at a different address already holds the id the envelope claims
    pub id_in_use: bool,
}

/// How an envelope reached us
#[derive(Clone, Debug, PartialEq)]
pub struct Delivery {
    pub txid: TxId,
    pub amount: Amount,
    pub timestamp: i64,
    pub mode: SweepMode,
    pub view: ConversationView,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Notification {
    PendingRequest(PendingRequest),
    RequestAccepted(Contact),
    NewMessage(Message),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum IgnoreReason {
    Banned,
    OwnAddress,
    NotRequested,
    AlreadyContact,
    AlreadyPending,
    UnknownSender,
    IdInUse,
}

impl Display for IgnoreReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), Error> {
        let reason = match self {
            IgnoreReason::Banned => "sender is banned",
            IgnoreReason::OwnAddress => "envelope carries our own address",
            IgnoreReason::NotRequested => "no request was sent to this address",
            IgnoreReason::AlreadyContact => "sender is already a contact",
            IgnoreReason::AlreadyPending => "a request from this sender is already pending",
            IgnoreReason::UnknownSender => "sender is not a contact",
            IgnoreReason::IdInUse => "the claimed id belongs to another contact",
        };
        f.write_str(reason)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Decision {
    Ignore(IgnoreReason),
    Apply {
        operations: Vec<WriteOperation>,
        notification: Option<Notification>,
    },
}

impl Decision {
    pub fn is_ignored(&self) -> bool {
        matches!(self, Decision::Ignore(_))
    }
}

/// Decide the state transition for an inbound envelope
pub fn decide(envelope: &Envelope, facts: &TrustFacts, delivery: &Delivery) -> Decision {
    match envelope {
        Envelope::Identity(card) => decide_identity(card, facts),
        Envelope::Request(card) => decide_request(card, facts),
        Envelope::Message(message) => decide_message(message, facts, delivery),
    }
}

fn decide_identity(card: &IdentityCard, facts: &TrustFacts) -> Decision {
    if facts.banned {
        return Decision::Ignore(IgnoreReason::Banned);
    }
    if facts.own_address {
        return Decision::Ignore(IgnoreReason::OwnAddress);
    }
    if !facts.sent_request {
        return Decision::Ignore(IgnoreReason::NotRequested);
    }
    if facts.id_in_use {
        return Decision::Ignore(IgnoreReason::IdInUse);
    }

    let mut operations = vec![WriteOperation::Remove(DbKey::SentRequest(card.address.clone()))];
    if facts.contact.is_some() {
        return Decision::Apply {
            operations,
            notification: None,
        };
    }
    // Crossed requests: they asked us while we asked them
    if facts.pending {
        operations.push(WriteOperation::Remove(DbKey::PendingRequest(card.address.clone())));
    }
    let contact = Contact::new(card.category, card.id.clone(), card.username.clone(), card.address.clone());
    operations.push(WriteOperation::Insert(DbKeyValuePair::Contact(contact.clone())));

    Decision::Apply {
        operations,
        notification: Some(Notification::RequestAccepted(contact)),
    }
}

fn decide_request(card: &IdentityCard, facts: &TrustFacts) -> Decision {
    if facts.banned {
        return Decision::Ignore(IgnoreReason::Banned);
    }
    if facts.own_address {
        return Decision::Ignore(IgnoreReason::OwnAddress);
    }
    if facts.contact.is_some() {
        return Decision::Ignore(IgnoreReason::AlreadyContact);
    }
    if facts.pending {
        return Decision::Ignore(IgnoreReason::AlreadyPending);
    }
    if facts.id_in_use {
        return Decision::Ignore(IgnoreReason::IdInUse);
    }

    let pending = PendingRequest {
        category: card.category,
        id: card.id.clone(),
        username: card.username.clone(),
        address: card.address.clone(),
    };
    Decision::Apply {
        operations: vec![WriteOperation::Insert(DbKeyValuePair::PendingRequest(pending.clone()))],
        notification: Some(Notification::PendingRequest(pending)),
    }
}

fn decide_message(chat: &ChatMessage, facts: &TrustFacts, delivery: &Delivery) -> Decision {
    let contact = match facts.contact.as_ref() {
        Some(contact) if contact.contact_id == chat.id => contact,
        _ => return Decision::Ignore(IgnoreReason::UnknownSender),
    };
    if facts.banned {
        return Decision::Ignore(IgnoreReason::Banned);
    }

    let message = Message {
        contact_id: contact.contact_id.clone(),
        author: chat.username.clone(),
        text: chat.text.clone(),
        amount: delivery.amount,
        timestamp: delivery.timestamp,
    };

    let mut operations = Vec::with_capacity(2);
    if !chat.username.is_empty() && chat.username != contact.username {
        operations.push(WriteOperation::UpdateContactUsername {
            contact_id: contact.contact_id.clone(),
            username: chat.username.clone(),
        });
    }

    let show_now = delivery.mode == SweepMode::Continuous && delivery.view.is_open(&contact.contact_id);
    if show_now {
        operations.push(WriteOperation::Insert(DbKeyValuePair::Message(message)));
        Decision::Apply {
            operations,
            notification: None,
        }
    } else {
        operations.push(WriteOperation::Insert(DbKeyValuePair::UnreadMessage(message.clone())));
        Decision::Apply {
            operations,
            notification: Some(Notification::NewMessage(message)),
        }
    }
}

/// A request to `address` has been confirmed on chain
pub fn request_sent(address: &str) -> Vec<WriteOperation> {
    vec![WriteOperation::Insert(DbKeyValuePair::SentRequest(address.to_string()))]
}

/// Our identity reply to `pending` has been confirmed on chain
pub fn pending_accepted(pending: &PendingRequest) -> (Contact, Vec<WriteOperation>) {
    let contact = Contact::from(pending.clone());
    let operations = vec![
        WriteOperation::Remove(DbKey::PendingRequest(pending.address.clone())),
        WriteOperation::Remove(DbKey::SentRequest(pending.address.clone())),
        WriteOperation::Insert(DbKeyValuePair::Contact(contact.clone())),
    ];
    (contact, operations)
}

pub fn pending_rejected(pending: &PendingRequest) -> Vec<WriteOperation> {
    ban_address(&pending.address)
}

pub fn contact_banned(contact: &Contact) -> Vec<WriteOperation> {
    let mut operations = vec![WriteOperation::Remove(DbKey::Contact(contact.contact_id.clone()))];
    operations.extend(ban_address(&contact.address));
    operations
}

fn ban_address(address: &str) -> Vec<WriteOperation> {
    vec![
        WriteOperation::Remove(DbKey::PendingRequest(address.to_string())),
        WriteOperation::Remove(DbKey::SentRequest(address.to_string())),
        WriteOperation::Insert(DbKeyValuePair::BannedAddress(address.to_string())),
    ]
}

/// Our chat message to `contact` has been confirmed on chain
pub fn message_sent(contact: &Contact, text: &str, amount: Amount, timestamp: i64) -> (Message, Vec<WriteOperation>) {
    let message = Message {
        contact_id: contact.contact_id.clone(),
        author: OUTBOUND_AUTHOR.to_string(),
        text: text.to_string(),
        amount,
        timestamp,
    };
    let operations = vec![WriteOperation::Insert(DbKeyValuePair::Message(message.clone()))];
    (message, operations)
}
