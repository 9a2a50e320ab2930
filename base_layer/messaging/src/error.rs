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
    memo::DecodeError,
    rpc::RpcError,
    types::{Amount, TxId},
};
use diesel::result::{ConnectionError, Error as DieselError};
use thiserror::Error;
use zchat_service_framework::reply_channel::TransportChannelError;

#[derive(Debug, Error)]
pub enum MessagingError {
    #[error("Validation failed: {0}")]
    ValidationError(#[from] ValidationError),
    #[error("Sending failed: {0}")]
    SendError(#[from] SendError),
    #[error("Storage error: {0}")]
    StorageError(#[from] MessagingStorageError),
    #[error("Node RPC error: {0}")]
    RpcError(#[from] RpcError),
    #[error("Memo decode error: {0}")]
    DecodeError(#[from] DecodeError),
    #[error("Transport channel error: {0}")]
    TransportChannelError(#[from] TransportChannelError),
    #[error("Unexpected API response")]
    UnexpectedApiResponse,
    #[error("The messaging service has shut down")]
    Shutdown,
}

/// User input rejected before any payment is submitted
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ValidationError {
    #[error("No identity has been set up")]
    NoIdentity,
    #[error("An identity already exists")]
    IdentityExists,
    #[error("Username cannot be empty")]
    EmptyUsername,
    #[error("Message Required")]
    EmptyMessage,
    #[error("Message Too Long: {length} characters exceeds the maximum of {max}")]
    MessageTooLong { length: usize, max: usize },
    #[error("Fee Too Low: the minimum fee per message is {minimum}")]
    FeeTooLow { minimum: Amount },
    #[error("No Contact Selected")]
    NoContactSelected,
    #[error("Unknown contact `{0}`")]
    UnknownContact(String),
    #[error("No pending request `{0}`")]
    UnknownPendingRequest(String),
    #[error("Invalid Address")]
    InvalidAddress,
    #[error("That is your own address")]
    OwnAddress,
    #[error("Address already in contacts")]
    AlreadyContact,
    #[error("Address already in the pending list")]
    AlreadyPending,
    #[error("A request to this address is already awaiting a reply")]
    AlreadyRequested,
    #[error("Address Banned")]
    Banned,
    #[error("Contact id `{0}` already belongs to another contact")]
    ContactIdInUse(String),
}

/// An outbound payment could not be confirmed, or was confirmed after the local state it relied on changed. Apart from
/// the processed mark of a superseded payment the local store is left untouched.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SendError {
    #[error("Memo is {size} bytes, the chain allows at most {max}")]
    MemoTooLarge { size: usize, max: usize },
    #[error("Could not encode the envelope: {0}")]
    Encoding(String),
    #[error("Node RPC failed: {0}")]
    Rpc(#[from] RpcError),
    #[error("The payment operation failed: {0}")]
    OperationFailed(String),
    #[error("The payment operation was cancelled")]
    OperationCancelled,
    #[error("Gave up waiting for the payment operation after {0} polls")]
    Timeout(usize),
    #[error("The send was interrupted by shutdown")]
    Interrupted,
    #[error("Insufficient balance")]
    InsufficientBalance,
    #[error("Payment {txid} was confirmed but {reason}, the local state was not updated")]
    Superseded { txid: TxId, reason: String },
}

#[derive(Debug, Error)]
pub enum MessagingStorageError {
    #[error("Value not found: {0}")]
    ValueNotFound(String),
    #[error("Unexpected result: {0}")]
    UnexpectedResult(String),
    #[error("Operation is not supported: {0}")]
    OperationNotSupported(String),
    #[error("A value was stored in an unrecognised format: {0}")]
    ConversionError(String),
    #[error("Blocking task spawn error: {0}")]
    BlockingTaskSpawnError(String),
    #[error("The in-memory database lock was poisoned")]
    LockPoisoned,
    #[error("Diesel error: {0}")]
    DieselError(#[from] DieselError),
    #[error("Diesel connection error: {0}")]
    DieselConnectionError(#[from] ConnectionError),
    #[error("Database migration failed: {0}")]
    MigrationError(String),
}
