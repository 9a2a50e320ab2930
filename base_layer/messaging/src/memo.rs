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

//! # Memo codec
//!
//! Protocol envelopes travel inside the memo field of a shielded payment as compact JSON, UTF-8 encoded and then hex
//! encoded. The node pads memos with NUL bytes up to the chain's memo size, so decoding strips trailing NULs before
//! parsing.
//!
//! Anything that does not decode into one of the known envelope types is a [DecodeError]; the ledger scanner treats
//! such a payment as an ordinary transfer.

use crate::types::{Category, Identity};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::str;
use thiserror::Error;

/// Maximum memo size, in bytes, accepted by the chain
pub const MAX_MEMO_BYTES: usize = 512;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityCard {
    pub category: Category,
    pub id: String,
    pub username: String,
    pub address: String,
}

impl From<&Identity> for IdentityCard {
    fn from(identity: &Identity) -> Self {
        Self {
            category: identity.category,
            id: identity.id.clone(),
            username: identity.username.clone(),
            address: identity.address.clone(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// The sender's identity id
    pub id: String,
    pub username: String,
    pub text: String,
}

/// The wire payload embedded in a memo, tagged by its `type` field
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Envelope {
    /// Sent as the accept-reply to a request
    Identity(IdentityCard),
    /// Sent to initiate contact
    Request(IdentityCard),
    Message(ChatMessage),
}

impl Envelope {
    pub fn kind(&self) -> &'static str {
        match self {
            Envelope::Identity(_) => "identity",
            Envelope::Request(_) => "request",
            Envelope::Message(_) => "message",
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum DecodeError {
    #[error("Memo is not valid hex: {0}")]
    InvalidHex(String),
    #[error("Memo is not valid UTF-8")]
    InvalidUtf8,
    #[error("Memo is not a JSON object: {0}")]
    InvalidJson(String),
    #[error("Memo has no `type` field")]
    MissingType,
    #[error("Unknown envelope type `{0}`")]
    UnknownType(String),
    #[error("Malformed `{kind}` envelope: {reason}")]
    MalformedEnvelope { kind: String, reason: String },
}

/// A decoded envelope together with the payment that carried it
#[derive(Clone, Debug, PartialEq)]
pub struct DecodedMemo {
    pub envelope: Envelope,
    pub amount: crate::types::Amount,
    pub txid: String,
}

/// Serialize the envelope to compact JSON and hex encode it
pub fn encode(envelope: &Envelope) -> Result<String, serde_json::Error> {
    let json = serde_json::to_vec(envelope)?;
    Ok(hex::encode(json))
}

/// Hex encode a plain text memo, used for payments that are not protocol messages
pub fn encode_text(text: &str) -> String {
    hex::encode(text.as_bytes())
}

/// Decode a memo hex string into an envelope
pub fn decode_envelope(memo_hex: &str) -> Result<Envelope, DecodeError> {
    let bytes = hex::decode(memo_hex.trim()).map_err(|e| DecodeError::InvalidHex(e.to_string()))?;
    let end = bytes.iter().rposition(|b| *b != 0).map(|pos| pos + 1).unwrap_or(0);
    let text = str::from_utf8(&bytes[..end]).map_err(|_| DecodeError::InvalidUtf8)?;

    let value: Value = serde_json::from_str(text).map_err(|e| DecodeError::InvalidJson(e.to_string()))?;
    let kind = match value.get("type") {
        Some(Value::String(kind)) => kind.clone(),
        Some(_) | None => return Err(DecodeError::MissingType),
    };
    match kind.as_str() {
        "identity" | "request" | "message" => {},
        _ => return Err(DecodeError::UnknownType(kind)),
    }
    serde_json::from_value(value).map_err(|e| DecodeError::MalformedEnvelope {
        kind,
        reason: e.to_string(),
    })
}

/// Decode the memo of an unspent output, keeping the payment details alongside the envelope
pub fn decode(memo_hex: &str, amount: crate::types::Amount, txid: &str) -> Result<DecodedMemo, DecodeError> {
    decode_envelope(memo_hex).map(|envelope| DecodedMemo {
        envelope,
        amount,
        txid: txid.to_string(),
    })
}

/// The number of memo bytes an encoded hex string occupies on chain
pub fn memo_size(memo_hex: &str) -> usize {
    memo_hex.len() / 2
}
