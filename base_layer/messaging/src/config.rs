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

use crate::{memo::MAX_MEMO_BYTES, types::Amount};
use std::time::Duration;

#[derive(Clone, Debug)]
pub struct MessagingConfig {
    /// How often the ledger scanner polls the node for new unspent outputs
    pub scan_interval: Duration,
    /// How long to wait between operation status/result polls of an outbound payment
    pub operation_poll_interval: Duration,
    /// Polls of a single operation before the send is reported as timed out
    pub max_operation_polls: usize,
    /// Page size used when loading older messages
    pub history_page_size: usize,
    /// Minimum total fee a user may attach to a chat message
    pub min_message_fee: Amount,
    /// Network fee paid by every protocol transaction
    pub network_fee: Amount,
    /// Amount carried by identity and request payments
    pub handshake_amount: Amount,
    /// Maximum chat message length, in characters
    pub max_message_length: usize,
    pub max_memo_bytes: usize,
    /// Unspent note count at which the scanner merges notes back into one
    pub consolidation_threshold: usize,
    /// Kept back from the balance when merging notes
    pub consolidation_reserve: Amount,
    pub event_channel_size: usize,
}

impl Default for MessagingConfig {
    fn default() -> Self {
        Self {
            scan_interval: Duration::from_secs(5),
            operation_poll_interval: Duration::from_secs(3),
            max_operation_polls: 200,
            history_page_size: 5,
            min_message_fee: Amount(20_000),
            network_fee: Amount(10_000),
            handshake_amount: Amount(10_000),
            max_message_length: 250,
            max_memo_bytes: MAX_MEMO_BYTES,
            consolidation_threshold: 54,
            consolidation_reserve: Amount(20_000),
            event_channel_size: 100,
        }
    }
}
