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

//! # ZChat messaging
//!
//! A contact handshake and text messaging protocol carried in the memo field of shielded payments.
//!
//! Two wallets become contacts by exchanging a `request` envelope and an `identity` reply, after which each side can
//! send `message` envelopes. Inbound envelopes are found by polling the node for unspent outputs at the local
//! identity's address; delivery is at-least-once and ingestion is made idempotent by recording every consumed txid.
//!
//! The crate is organised as:
//! * [memo]: the envelope codec.
//! * [scanner]: the ledger scanner and its polling loop.
//! * [protocol]: the handshake and contact state machine.
//! * [outbound]: sends memo carrying payments and waits for a confirmed txid.
//! * [directory]: read side projections (contacts, pending requests, unread counts, paged history).
//! * [storage]: the store behind all of the above, with memory and SQLite backends.
//! * [service] and [handle]: the async service that ties everything together and the cloneable handle used to talk to
//!   it.

#[macro_use]
extern crate diesel;
#[macro_use]
extern crate diesel_migrations;

pub mod config;
pub mod directory;
pub mod error;
pub mod handle;
pub mod memo;
pub mod outbound;
pub mod protocol;
pub mod rpc;
pub mod scanner;
pub mod service;
pub mod storage;
pub mod types;

pub use config::MessagingConfig;
pub use handle::{MessagingEvent, MessagingHandle};
pub use service::{spawn_messaging_service, MessagingService};
