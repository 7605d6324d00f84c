// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use std::future::Future;
use std::time::Duration;

use crate::utils::context::Context;

/// How often [`FlumeSenderExt::closed`] checks for a departed receiver.
const DISCONNECT_POLL_INTERVAL: Duration = Duration::from_millis(25);

pub trait FlumeSenderExt<T> {
    fn send_or_warn(&self, msg: T);

    /// Sends `msg`, giving up as soon as `ctx` is done or the receiving side
    /// is gone. Returns `true` when the message was delivered.
    fn send_or_cancel<'a>(&'a self, ctx: &'a Context, msg: T) -> impl Future<Output = bool> + Send + 'a
    where
        T: Send + 'a;

    /// Resolves once every receiver of the channel has been dropped. Lets a
    /// producer that is waiting on something else notice an abandoned
    /// consumer.
    fn closed(&self) -> impl Future<Output = ()> + Send + '_
    where
        T: Send;
}

impl<T> FlumeSenderExt<T> for flume::Sender<T> {
    fn send_or_warn(&self, msg: T) {
        if let Err(e) = self.send(msg) {
            tracing::warn!("{e}");
        }
    }

    fn send_or_cancel<'a>(&'a self, ctx: &'a Context, msg: T) -> impl Future<Output = bool> + Send + 'a
    where
        T: Send + 'a,
    {
        async move {
            tokio::select! {
                biased;
                _ = ctx.done() => false,
                sent = self.send_async(msg) => sent.is_ok(),
            }
        }
    }

    fn closed(&self) -> impl Future<Output = ()> + Send + '_
    where
        T: Send,
    {
        async move {
            while !self.is_disconnected() {
                tokio::time::sleep(DISCONNECT_POLL_INTERVAL).await;
            }
        }
    }
}
