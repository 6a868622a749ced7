//! Closable, fan-out capable byte channel.
//!
//! Every stream in a running command is a `ByteChannel`: process stdio,
//! builtin output, the block's own stdin/stdout/stderr. Chunks are delivered
//! in write order and the queue is unbounded.
//!
//! ```text
//!   write ──▶ [VecDeque<Vec<u8>>] ──▶ read / collect
//!               │
//!               └── split() ──▶ subscriber, subscriber, ...
//!                   (once split, writes are copied to every subscriber)
//!
//!   feed() ──▶ writer lineage; the last dropped Feed closes the channel
//!   join(up) ──▶ feed + background drain of `up` into this channel
//! ```
//!
//! The state lives behind a `std::sync::Mutex`: critical sections are queue
//! operations and waker registration, never awaits. Subscribers form a tree
//! (a channel never subscribes to its own ancestor), so writing through to
//! subscribers while holding the parent lock cannot deadlock.

use std::collections::VecDeque;
use std::future::poll_fn;
use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::task::{Poll, Waker};

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::task::JoinHandle;

/// Read size used when bridging OS pipes into channels.
pub const PUMP_CHUNK_SIZE: usize = 8192;

static NEXT_CHANNEL_ID: AtomicU64 = AtomicU64::new(1);

/// Errors raised by channel writes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChannelError {
    #[error("write to closed channel {0}")]
    Closed(u64),
}

struct State {
    queue: VecDeque<Vec<u8>>,
    closed: bool,
    /// Readers parked on an empty queue.
    wakers: Vec<Waker>,
    subscribers: Vec<ByteChannel>,
    /// Set by the first split; from then on writes only go to subscribers.
    split: bool,
    /// Live `Feed` handles.
    feeds: usize,
}

struct Shared {
    id: u64,
    state: Mutex<State>,
}

/// An unbounded, ordered, closable queue of byte chunks.
///
/// Cloning yields another handle to the same channel.
#[derive(Clone)]
pub struct ByteChannel {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for ByteChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ByteChannel")
            .field("id", &self.shared.id)
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl Default for ByteChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl ByteChannel {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                id: NEXT_CHANNEL_ID.fetch_add(1, Ordering::Relaxed),
                state: Mutex::new(State {
                    queue: VecDeque::new(),
                    closed: false,
                    wakers: Vec::new(),
                    subscribers: Vec::new(),
                    split: false,
                    feeds: 0,
                }),
            }),
        }
    }

    /// A channel that is already closed. Reads see end-of-stream at once.
    pub fn closed() -> Self {
        let channel = Self::new();
        channel.close();
        channel
    }

    /// Process-unique identifier, used in trace output.
    pub fn id(&self) -> u64 {
        self.shared.id
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.shared.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Append a chunk.
    ///
    /// Fails once the channel is closed. If the channel has been split, the
    /// chunk is copied to every live subscriber instead; when the last
    /// subscriber has gone away the channel closes itself and the write fails.
    pub fn write(&self, chunk: impl Into<Vec<u8>>) -> Result<(), ChannelError> {
        let chunk = chunk.into();
        let mut state = self.lock();
        if state.closed {
            return Err(ChannelError::Closed(self.shared.id));
        }
        if chunk.is_empty() {
            return Ok(());
        }

        if state.split {
            state
                .subscribers
                .retain(|subscriber| subscriber.write(chunk.clone()).is_ok());
            if state.subscribers.is_empty() {
                tracing::trace!(channel = self.shared.id, "all subscribers gone, closing");
                let wakers = Self::mark_closed(&mut state);
                drop(state);
                wakers.into_iter().for_each(Waker::wake);
                return Err(ChannelError::Closed(self.shared.id));
            }
            return Ok(());
        }

        state.queue.push_back(chunk);
        let wakers = std::mem::take(&mut state.wakers);
        drop(state);
        wakers.into_iter().for_each(Waker::wake);
        Ok(())
    }

    fn mark_closed(state: &mut State) -> Vec<Waker> {
        state.closed = true;
        std::mem::take(&mut state.wakers)
    }

    /// Close the channel. Idempotent.
    ///
    /// Buffered chunks stay readable; once they are drained every read
    /// returns `None`. Subscribers are closed exactly once, here.
    pub fn close(&self) {
        let mut state = self.lock();
        if state.closed {
            return;
        }
        let wakers = Self::mark_closed(&mut state);
        let subscribers = std::mem::take(&mut state.subscribers);
        drop(state);

        tracing::trace!(channel = self.shared.id, subscribers = subscribers.len(), "close");
        wakers.into_iter().for_each(Waker::wake);
        for subscriber in subscribers {
            subscriber.close();
        }
    }

    /// Wait for the next chunk. `None` means closed and drained.
    pub async fn read(&self) -> Option<Vec<u8>> {
        poll_fn(|cx| {
            let mut state = self.lock();
            if let Some(chunk) = state.queue.pop_front() {
                return Poll::Ready(Some(chunk));
            }
            if state.closed {
                return Poll::Ready(None);
            }
            if !state.wakers.iter().any(|w| w.will_wake(cx.waker())) {
                state.wakers.push(cx.waker().clone());
            }
            Poll::Pending
        })
        .await
    }

    /// Read until close and return everything as one buffer.
    pub async fn collect(&self) -> Vec<u8> {
        let mut out = Vec::new();
        while let Some(chunk) = self.read().await {
            out.extend_from_slice(&chunk);
        }
        out
    }

    /// Register an independent reader that receives a copy of every chunk
    /// written from now on.
    ///
    /// The first split also inherits whatever was queued before it. Splitting
    /// a closed channel yields a closed channel.
    pub fn split(&self) -> ByteChannel {
        let subscriber = ByteChannel::new();
        let mut state = self.lock();
        if state.closed {
            let backlog = std::mem::take(&mut state.queue);
            drop(state);
            subscriber.lock().queue = backlog;
            subscriber.close();
            return subscriber;
        }

        if !state.split {
            state.split = true;
            subscriber.lock().queue = std::mem::take(&mut state.queue);
        }
        state.subscribers.push(subscriber.clone());
        tracing::trace!(channel = self.shared.id, subscriber = subscriber.id(), "split");
        subscriber
    }

    /// Register a writer. The channel closes when the last feed is dropped.
    pub fn feed(&self) -> Feed {
        self.lock().feeds += 1;
        Feed {
            channel: self.clone(),
        }
    }

    /// Drain `upstream` into this channel in the background.
    ///
    /// The join holds a feed until `upstream` ends, so a channel joined from
    /// several sources closes after the last of them. If writing here fails
    /// the upstream is closed, pushing the failure back toward its producer.
    pub fn join(&self, upstream: ByteChannel) -> JoinHandle<()> {
        self.feed().pump(upstream)
    }

    /// Read and drop everything until close.
    pub fn discard(&self) -> JoinHandle<()> {
        let channel = self.clone();
        tokio::spawn(async move { while channel.read().await.is_some() {} })
    }

    /// Copy this channel into an async writer until the channel closes.
    pub async fn pump_into<W>(&self, writer: &mut W) -> io::Result<()>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        while let Some(chunk) = self.read().await {
            writer.write_all(&chunk).await?;
            writer.flush().await?;
        }
        Ok(())
    }

    /// Copy an async reader into this channel until EOF.
    ///
    /// A closed channel surfaces as `BrokenPipe` so the caller can drop its
    /// end of the OS pipe.
    pub async fn pump_from<R>(&self, reader: &mut R) -> io::Result<()>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        let mut buf = vec![0u8; PUMP_CHUNK_SIZE];
        loop {
            let n = reader.read(&mut buf).await?;
            if n == 0 {
                return Ok(());
            }
            self.write(&buf[..n])
                .map_err(|e| io::Error::new(io::ErrorKind::BrokenPipe, e))?;
        }
    }
}

/// A registered writer on a [`ByteChannel`].
///
/// Dropping the last feed of a channel closes it.
pub struct Feed {
    channel: ByteChannel,
}

impl Feed {
    pub fn channel(&self) -> &ByteChannel {
        &self.channel
    }

    pub fn write(&self, chunk: impl Into<Vec<u8>>) -> Result<(), ChannelError> {
        self.channel.write(chunk)
    }

    /// Drain `upstream` through this feed on a background task.
    pub fn pump(self, upstream: ByteChannel) -> JoinHandle<()> {
        tracing::trace!(from = upstream.id(), to = self.channel.id(), "join");
        tokio::spawn(async move {
            while let Some(chunk) = upstream.read().await {
                if self.write(chunk).is_err() {
                    upstream.close();
                    break;
                }
            }
        })
    }
}

impl Drop for Feed {
    fn drop(&mut self) {
        let last = {
            let mut state = self.channel.lock();
            state.feeds = state.feeds.saturating_sub(1);
            state.feeds == 0
        };
        if last {
            self.channel.close();
        }
    }
}

impl std::fmt::Debug for Feed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Feed").field(&self.channel.id()).finish()
    }
}
