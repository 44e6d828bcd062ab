//! Upstream response body relay
//!
//! [`RelayStream`] passes upstream body chunks through unchanged and keeps
//! track of how the transfer ended. Dropping it early (the caller went away)
//! drops the upstream body with it, which closes the upstream connection.

use std::fmt::Display;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::Stream;
use tracing::{debug, warn};

/// Wraps an upstream body stream for logging
pub struct RelayStream<S> {
    inner: S,
    path: String,
    bytes: u64,
    done: bool,
}

impl<S> RelayStream<S> {
    pub fn new(inner: S, path: impl Into<String>) -> Self {
        Self {
            inner,
            path: path.into(),
            bytes: 0,
            done: false,
        }
    }

    /// Bytes relayed so far
    pub fn bytes(&self) -> u64 {
        self.bytes
    }
}

impl<S, B, E> Stream for RelayStream<S>
where
    S: Stream<Item = Result<B, E>> + Unpin,
    B: AsRef<[u8]>,
    E: Display,
{
    type Item = Result<B, E>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.done {
            return Poll::Ready(None);
        }

        let item = match Pin::new(&mut this.inner).poll_next(cx) {
            Poll::Pending => return Poll::Pending,
            Poll::Ready(item) => item,
        };

        match &item {
            Some(Ok(chunk)) => this.bytes += chunk.as_ref().len() as u64,
            Some(Err(err)) => {
                // Headers are already on the wire, the body is cut short
                warn!(path = %this.path, bytes = this.bytes, error = %err, "upstream body failed");
                this.done = true;
            }
            None => {
                debug!(path = %this.path, bytes = this.bytes, "relayed upstream body");
                this.done = true;
            }
        }

        Poll::Ready(item)
    }
}

impl<S> Drop for RelayStream<S> {
    fn drop(&mut self) {
        if !self.done {
            debug!(path = %self.path, bytes = self.bytes, "caller went away, closing upstream body");
        }
    }
}
