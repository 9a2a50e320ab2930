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

table! {
    banned_addresses (address) {
        address -> Text,
    }
}

table! {
    contacts (contact_id) {
        contact_id -> Text,
        id -> Text,
        category -> Text,
        username -> Text,
        address -> Text,
    }
}

table! {
    exported_keys (address) {
        address -> Text,
        private_key -> Text,
    }
}

table! {
    identity (id) {
        id -> Text,
        category -> Text,
        username -> Text,
        address -> Text,
    }
}

table! {
    messages (id) {
        id -> Integer,
        contact_id -> Text,
        author -> Text,
        body -> Text,
        amount -> BigInt,
        timestamp -> BigInt,
    }
}

table! {
    pending_requests (address) {
        address -> Text,
        id -> Text,
        category -> Text,
        username -> Text,
    }
}

table! {
    processed_txs (txid) {
        txid -> Text,
    }
}

table! {
    sent_requests (address) {
        address -> Text,
    }
}

table! {
    unread_messages (id) {
        id -> Integer,
        contact_id -> Text,
        author -> Text,
        body -> Text,
        amount -> BigInt,
        timestamp -> BigInt,
    }
}

allow_tables_to_appear_in_same_query!(
    banned_addresses,
    contacts,
    exported_keys,
    identity,
    messages,
    pending_requests,
    processed_txs,
    sent_requests,
    unread_messages,
);
