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

use chrono::Utc;
use rand::{distributions::Alphanumeric, rngs::OsRng, Rng};
use serde::{Deserialize, Serialize};
use std::{
    fmt::{Display, Error, Formatter},
    iter,
    ops::Add,
    str::FromStr,
    sync::atomic::{AtomicI64, Ordering},
};
use thiserror::Error;

/// The author recorded on outbound message rows
pub const OUTBOUND_AUTHOR: &str = "you";

/// Length of the randomly generated identity id
pub const IDENTITY_ID_LENGTH: usize = 32;

/// Base units per coin
pub const COIN: u64 = 100_000_000;
const COIN_DECIMALS: usize = 8;

pub type TxId = String;
pub type OperationId = String;

/// A chain amount in base units (1 coin = 10^8 base units)
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Amount(pub u64);

#[derive(Debug, Clone, Error, PartialEq)]
pub enum AmountError {
    #[error("'{0}' is not a valid amount")]
    Invalid(String),
    #[error("Amounts have at most 8 decimal places")]
    TooPrecise,
}

impl Amount {
    pub fn from_base_units(units: u64) -> Self {
        Amount(units)
    }

    /// Converts a floating point coin value (as the node's JSON-RPC reports it) into base units
    pub fn from_coins(coins: f64) -> Self {
        if coins.is_sign_negative() || !coins.is_finite() {
            return Amount(0);
        }
        Amount((coins * COIN as f64).round() as u64)
    }

    pub fn as_coins(self) -> f64 {
        self.0 as f64 / COIN as f64
    }

    pub fn checked_sub(self, other: Amount) -> Option<Amount> {
        self.0.checked_sub(other.0).map(Amount)
    }
}

impl Add for Amount {
    type Output = Amount;

    fn add(self, rhs: Amount) -> Amount {
        Amount(self.0 + rhs.0)
    }
}

impl Display for Amount {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), Error> {
        write!(f, "{}.{:08}", self.0 / COIN, self.0 % COIN)
    }
}

impl FromStr for Amount {
    type Err = AmountError;

    /// Parses a decimal coin value such as `0.0002` without going through floating point
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let invalid = || AmountError::Invalid(s.to_string());
        let (whole, fraction) = match s.find('.') {
            Some(pos) => (&s[..pos], &s[pos + 1..]),
            None => (s, ""),
        };
        if (whole.is_empty() && fraction.is_empty()) || !whole.chars().chain(fraction.chars()).all(|c| c.is_ascii_digit()) {
            return Err(invalid());
        }
        if fraction.len() > COIN_DECIMALS {
            return Err(AmountError::TooPrecise);
        }
        let whole = if whole.is_empty() {
            0
        } else {
            whole.parse::<u64>().map_err(|_| invalid())?
        };
        let fraction = format!("{:0<width$}", fraction, width = COIN_DECIMALS)
            .parse::<u64>()
            .map_err(|_| invalid())?;
        whole
            .checked_mul(COIN)
            .and_then(|w| w.checked_add(fraction))
            .map(Amount)
            .ok_or_else(invalid)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Individual,
    Group,
}

impl Display for Category {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), Error> {
        match self {
            Category::Individual => f.write_str("individual"),
            Category::Group => f.write_str("group"),
        }
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "individual" => Ok(Category::Individual),
            "group" => Ok(Category::Group),
            other => Err(format!("Unknown category '{}'", other)),
        }
    }
}

/// The local user's persona. Exactly one exists per wallet data store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub category: Category,
    pub id: String,
    pub username: String,
    pub address: String,
}

impl Identity {
    /// Creates a new individual identity with a freshly generated id
    pub fn new(username: String, address: String) -> Self {
        Self {
            category: Category::Individual,
            id: generate_identity_id(),
            username,
            address,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    pub category: Category,
    pub id: String,
    /// The conversation key. Populated from the remote identity id, same as `id`.
    pub contact_id: String,
    pub username: String,
    pub address: String,
}

impl Contact {
    pub fn new(category: Category, id: String, username: String, address: String) -> Self {
        Self {
            category,
            contact_id: id.clone(),
            id,
            username,
            address,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingRequest {
    pub category: Category,
    pub id: String,
    pub username: String,
    pub address: String,
}

impl From<PendingRequest> for Contact {
    fn from(pending: PendingRequest) -> Self {
        Contact::new(pending.category, pending.id, pending.username, pending.address)
    }
}

/// A message row. Used for both the message history and the unread staging area.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub contact_id: String,
    /// `"you"` for outbound rows, otherwise the remote username at the time of receipt
    pub author: String,
    pub text: String,
    pub amount: Amount,
    /// Milliseconds since the unix epoch, unique across rows issued by the same `MessageClock`
    pub timestamp: i64,
}

impl Message {
    pub fn is_outbound(&self) -> bool {
        self.author == OUTBOUND_AUTHOR
    }
}

/// Generates a 32 character alphanumeric identity id
pub fn generate_identity_id() -> String {
    iter::repeat(())
        .map(|_| OsRng.sample(Alphanumeric))
        .take(IDENTITY_ID_LENGTH)
        .collect()
}

/// Issues strictly increasing millisecond timestamps, so that message rows never share a timestamp and timestamp
/// cursors are exact.
#[derive(Debug, Default)]
pub struct MessageClock {
    last: AtomicI64,
}

impl MessageClock {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn next_timestamp(&self) -> i64 {
        let now = Utc::now().timestamp_millis();
        let mut last = self.last.load(Ordering::SeqCst);
        loop {
            let candidate = if now > last { now } else { last + 1 };
            match self.last.compare_exchange(last, candidate, Ordering::SeqCst, Ordering::SeqCst) {
                Ok(_) => return candidate,
                Err(actual) => last = actual,
            }
        }
    }

    /// Makes sure future timestamps are issued after `timestamp`, e.g. the newest row already in the store
    pub fn observe(&self, timestamp: i64) {
        self.last.fetch_max(timestamp, Ordering::SeqCst);
    }
}
