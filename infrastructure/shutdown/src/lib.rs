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

//! A cloneable shutdown signal.
//!
//! `Shutdown` owns the trigger. Every long-running loop is handed a `ShutdownSignal` (obtained with
//! `Shutdown::to_signal`) and selects on it next to its own work. The signal resolves once `trigger` is called or the
//! `Shutdown` is dropped, whichever happens first.

use futures::{
    channel::{oneshot, oneshot::Canceled},
    future::{FusedFuture, Shared},
    task::{Context, Poll},
    Future,
    FutureExt,
};
use std::pin::Pin;

pub struct Shutdown {
    trigger: Option<oneshot::Sender<()>>,
    signal: ShutdownSignal,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, rx) = oneshot::channel();
        Self {
            trigger: Some(tx),
            signal: ShutdownSignal { inner: rx.shared() },
        }
    }

    /// Returns a signal which resolves when this instance is triggered or dropped
    pub fn to_signal(&self) -> ShutdownSignal {
        self.signal.clone()
    }

    /// Trigger the shutdown. Triggering more than once is a no-op.
    pub fn trigger(&mut self) {
        if let Some(tx) = self.trigger.take() {
            let _ = tx.send(());
        }
    }

    pub fn is_triggered(&self) -> bool {
        self.trigger.is_none()
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone)]
pub struct ShutdownSignal {
    inner: Shared<oneshot::Receiver<()>>,
}

impl ShutdownSignal {
    /// Non-blocking check. Returns true once the trigger has fired or the `Shutdown` was dropped.
    pub fn is_triggered(&self) -> bool {
        self.inner.clone().now_or_never().is_some()
    }
}

impl Future for ShutdownSignal {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        // Dropping the trigger without sending counts as a shutdown
        match self.inner.poll_unpin(cx) {
            Poll::Ready(Ok(())) | Poll::Ready(Err(Canceled)) => Poll::Ready(()),
            Poll::Pending => Poll::Pending,
        }
    }
}

impl FusedFuture for ShutdownSignal {
    fn is_terminated(&self) -> bool {
        self.inner.is_terminated()
    }
}
