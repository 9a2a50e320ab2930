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

use futures::{
    channel::{
        mpsc::{self, SendError},
        oneshot,
    },
    ready,
    stream::FusedStream,
    task::{Context, Poll},
    Future,
    FutureExt,
    Stream,
    StreamExt,
};
use std::pin::Pin;
use thiserror::Error;
use tower_service::Service;

/// Create a new request/reply channel. The sender half implements `tower_service::Service`.
pub fn unbounded<TReq, TResp>() -> (SenderService<TReq, TResp>, Receiver<TReq, TResp>) {
    let (tx, rx) = mpsc::unbounded();
    (SenderService::new(tx), Receiver::new(rx))
}

type RequestPair<TReq, TResp> = (TReq, oneshot::Sender<TResp>);

pub struct SenderService<TReq, TResp> {
    tx: mpsc::UnboundedSender<RequestPair<TReq, TResp>>,
}

impl<TReq, TResp> SenderService<TReq, TResp> {
    pub fn new(tx: mpsc::UnboundedSender<RequestPair<TReq, TResp>>) -> Self {
        Self { tx }
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

impl<TReq, TResp> Clone for SenderService<TReq, TResp> {
    fn clone(&self) -> Self {
        Self { tx: self.tx.clone() }
    }
}

impl<TReq, TResp> Service<TReq> for SenderService<TReq, TResp> {
    type Error = TransportChannelError;
    type Future = TransportResponseFuture<TResp>;
    type Response = TResp;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.tx.poll_ready(cx).map_err(|_| TransportChannelError::ChannelClosed)
    }

    fn call(&mut self, request: TReq) -> Self::Future {
        let (tx, rx) = oneshot::channel();

        match self.tx.unbounded_send((request, tx)) {
            Ok(_) => TransportResponseFuture::new(rx),
            // We're not able to send (rx closed) so return a future which resolves to a ChannelClosed error
            Err(_) => TransportResponseFuture::closed(),
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum TransportChannelError {
    #[error("Error occurred when sending: {0}")]
    SendError(#[from] SendError),
    #[error("Request was canceled")]
    Canceled,
    #[error("The response channel has closed")]
    ChannelClosed,
}

/// Response future for the results of calling the `SenderService`
pub struct TransportResponseFuture<T> {
    rx: Option<oneshot::Receiver<T>>,
}

impl<T> TransportResponseFuture<T> {
    pub fn new(rx: oneshot::Receiver<T>) -> Self {
        Self { rx: Some(rx) }
    }

    pub fn closed() -> Self {
        Self { rx: None }
    }
}

impl<T> Future for TransportResponseFuture<T> {
    type Output = Result<T, TransportChannelError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match self.rx.as_mut() {
            Some(rx) => {
                let result = ready!(rx.poll_unpin(cx));
                Poll::Ready(result.map_err(|_| TransportChannelError::Canceled))
            },
            None => Poll::Ready(Err(TransportChannelError::ChannelClosed)),
        }
    }
}

/// Request context which the service uses to answer a single request
pub struct RequestContext<TReq, TResp> {
    reply_tx: oneshot::Sender<TResp>,
    request: Option<TReq>,
}

impl<TReq, TResp> RequestContext<TReq, TResp> {
    pub fn new(request: TReq, reply_tx: oneshot::Sender<TResp>) -> Self {
        Self {
            request: Some(request),
            reply_tx,
        }
    }

    /// Take ownership of the request. Returns `None` if it has already been taken.
    pub fn take_request(&mut self) -> Option<TReq> {
        self.request.take()
    }

    /// Consume this instance and send the reply. Returns the response if the caller has gone away.
    pub fn reply(self, response: TResp) -> Result<(), TResp> {
        self.reply_tx.send(response)
    }

    /// Separate the request from the reply sender, so that the reply can be moved into a spawned task
    pub fn split(self) -> (Option<TReq>, oneshot::Sender<TResp>) {
        (self.request, self.reply_tx)
    }
}

/// Receiving end of the request/reply channel. Yields a `RequestContext` for every request.
pub struct Receiver<TReq, TResp> {
    rx: mpsc::UnboundedReceiver<RequestPair<TReq, TResp>>,
}

impl<TReq, TResp> Receiver<TReq, TResp> {
    pub fn new(rx: mpsc::UnboundedReceiver<RequestPair<TReq, TResp>>) -> Self {
        Self { rx }
    }

    pub fn close(&mut self) {
        self.rx.close();
    }
}

impl<TReq, TResp> Stream for Receiver<TReq, TResp> {
    type Item = RequestContext<TReq, TResp>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        match ready!(self.rx.poll_next_unpin(cx)) {
            Some((req, tx)) => Poll::Ready(Some(RequestContext::new(req, tx))),
            None => Poll::Ready(None),
        }
    }
}

impl<TReq, TResp> FusedStream for Receiver<TReq, TResp> {
    fn is_terminated(&self) -> bool {
        self.rx.is_terminated()
    }
}
