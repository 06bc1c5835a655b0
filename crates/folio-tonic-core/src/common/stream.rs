//! Message streams: ordered, directional channels with explicit termination.
//!
//! A stream has two halves. The producer holds an [`Outbound`], the consumer
//! reads through an [`Inbound`]. Between them sits a bounded
//! [`mpsc`](tokio::sync::mpsc) channel, so every `send` and every `recv` is a
//! suspension point and a slow consumer pushes back on its producer.
//!
//! Termination is never a data value:
//!
//! - [`Outbound::finish`] closes the stream normally; the consumer observes
//!   `Ok(None)`.
//! - [`Outbound::fail`] delivers a terminal [`Status`] as the last item; the
//!   consumer observes `Err(..)`.
//!
//! Both consume the `Outbound`, so nothing can be sent after the terminal
//! signal. Once an [`Inbound`] has observed termination it is fused and keeps
//! returning `Ok(None)`.

use crate::common::error::{Error, Result};
use futures::{Stream, StreamExt};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tonic::Status;

/// The consumer side of a server-to-client stream, ready to hand to tonic as a
/// streaming response body.
pub type ResponseStream<T> = ReceiverStream<core::result::Result<T, Status>>;

/// Producer half of a message stream.
#[derive(Debug)]
pub struct Outbound<T> {
    tx: mpsc::Sender<core::result::Result<T, Status>>,
    sent: usize,
}

impl<T> Outbound<T> {
    /// Sends one message, waiting for buffer space if the consumer lags.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ChannelError`] if the consumer has gone away, which
    /// for a response stream means the caller stopped reading.
    pub async fn send(&mut self, message: T) -> Result<()> {
        self.tx
            .send(Ok(message))
            .await
            .map_err(|_| Error::ChannelError {
                context: format!("consumer dropped after {} messages", self.sent),
            })?;
        self.sent += 1;
        Ok(())
    }

    /// Number of messages delivered into the stream so far.
    pub const fn sent(&self) -> usize {
        self.sent
    }

    /// Returns `true` once the consumer half has been dropped.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Resolves when the consumer half has been dropped.
    pub async fn closed(&self) {
        self.tx.closed().await;
    }

    /// Like [`Outbound::send`], but gives up as soon as `cancel` fires, even
    /// while waiting on a full buffer.
    ///
    /// # Errors
    ///
    /// [`Error::RequestCancelled`] if `cancel` fired first, otherwise the
    /// same as [`Outbound::send`].
    pub async fn send_until(&mut self, message: T, cancel: &CancellationToken) -> Result<()> {
        tokio::select! {
            biased;
            () = cancel.cancelled() => Err(Error::RequestCancelled),
            sent = self.send(message) => sent,
        }
    }

    /// Ends the stream with a terminal status, the last item the consumer
    /// sees. Never waits past `cancel`: a status that does not fit in the
    /// buffer once `cancel` has fired is dropped and the stream simply closes.
    ///
    /// # Errors
    ///
    /// [`Error::ChannelError`] if the consumer is gone,
    /// [`Error::RequestCancelled`] if the status could not be buffered before
    /// `cancel` fired.
    pub async fn fail_until(self, status: Status, cancel: &CancellationToken) -> Result<()> {
        let item = match self.tx.try_send(Err(status)) {
            Ok(()) => return Ok(()),
            Err(TrySendError::Closed(_)) => {
                return Err(Error::ChannelError {
                    context: "consumer dropped before the terminal status".to_string(),
                });
            }
            Err(TrySendError::Full(item)) => item,
        };

        tokio::select! {
            biased;
            () = cancel.cancelled() => Err(Error::RequestCancelled),
            sent = self.tx.send(item) => sent.map_err(|_| Error::ChannelError {
                context: "consumer dropped before the terminal status".to_string(),
            }),
        }
    }

    /// Ends the stream normally ("done sending") and returns how many
    /// messages were delivered.
    pub fn finish(self) -> usize {
        self.sent
    }
}

/// Creates a server-to-client stream whose consumer side carries statuses.
pub fn message_stream<T>(capacity: usize) -> (Outbound<T>, ResponseStream<T>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (Outbound { tx, sent: 0 }, ReceiverStream::new(rx))
}

/// Creates a client-to-server request stream.
///
/// tonic consumes request streams of plain messages, so the consumer side ends
/// at the first terminal item: [`Outbound::finish`] and [`Outbound::fail`]
/// both read as "done sending" on the wire. A caller that wants to abort the
/// whole call drops the response instead.
pub fn request_stream<T>(capacity: usize) -> (Outbound<T>, impl Stream<Item = T> + Send + 'static)
where
    T: Send + 'static,
{
    let (outbound, rx) = message_stream(capacity);
    (
        outbound,
        tokio_stream::StreamExt::map_while(rx, core::result::Result::ok),
    )
}

/// Consumer half of a message stream.
///
/// Wraps any stream of `Result<T, Status>`; tonic's `Streaming<T>` and
/// [`ResponseStream`] both qualify.
#[derive(Debug)]
pub struct Inbound<S> {
    inner: S,
    finished: bool,
    received: usize,
}

impl<S> Inbound<S> {
    pub const fn new(inner: S) -> Self {
        Self {
            inner,
            finished: false,
            received: 0,
        }
    }

    /// Number of data messages received so far.
    pub const fn received(&self) -> usize {
        self.received
    }

    /// Returns `true` once end-of-stream or a terminal status was observed.
    pub const fn is_finished(&self) -> bool {
        self.finished
    }
}

impl<S, T> Inbound<S>
where
    S: Stream<Item = core::result::Result<T, Status>> + Unpin,
{
    /// Receives the next message.
    ///
    /// - `Ok(Some(message))`: a data message, in send order.
    /// - `Ok(None)`: the producer finished. Repeated calls stay at `Ok(None)`.
    ///
    /// # Errors
    ///
    /// Returns the producer's terminal status converted into [`Error`]. The
    /// stream is finished afterwards.
    pub async fn recv(&mut self) -> Result<Option<T>> {
        if self.finished {
            return Ok(None);
        }

        match self.inner.next().await {
            Some(Ok(message)) => {
                self.received += 1;
                Ok(Some(message))
            }
            Some(Err(status)) => {
                self.finished = true;
                Err(status.into())
            }
            None => {
                self.finished = true;
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::time::Duration;

    #[tokio::test]
    async fn delivers_in_send_order_then_end_of_stream() {
        let (mut tx, rx) = message_stream(2);
        let producer = tokio::spawn(async move {
            for n in 0..5 {
                tx.send(n).await?;
            }
            Ok::<_, Error>(tx.finish())
        });

        let mut inbound = Inbound::new(rx);
        let mut seen = Vec::new();
        while let Some(n) = inbound.recv().await.unwrap() {
            seen.push(n);
        }

        assert_eq!(seen, vec![0, 1, 2, 3, 4]);
        assert_eq!(producer.await.unwrap().unwrap(), 5);
        assert!(inbound.is_finished());
        assert_eq!(inbound.recv().await.unwrap(), None);
        assert_eq!(inbound.received(), 5);
    }

    #[tokio::test]
    async fn terminal_status_is_last_item() {
        let (mut tx, rx) = message_stream(4);
        tx.send("a").await.unwrap();
        tx.fail_until(Status::not_found("gone"), &CancellationToken::new())
            .await
            .unwrap();

        let mut inbound = Inbound::new(rx);
        assert_eq!(inbound.recv().await.unwrap(), Some("a"));
        let err = inbound.recv().await.unwrap_err();
        assert_eq!(err, Error::not_found("gone"));
        assert_eq!(inbound.recv().await.unwrap(), None);
    }

    #[tokio::test]
    async fn send_fails_once_consumer_is_gone() {
        let (mut tx, rx) = message_stream::<u32>(1);
        drop(rx);
        assert!(tx.is_closed());
        let err = tx.send(1).await.unwrap_err();
        assert!(matches!(err, Error::ChannelError { .. }));
        assert_eq!(tx.sent(), 0);
    }

    #[tokio::test]
    async fn cancellation_unblocks_a_full_stream() {
        let (mut tx, rx) = message_stream::<u32>(1);
        let cancel = CancellationToken::new();
        tx.send_until(1, &cancel).await.unwrap();

        let token = cancel.clone();
        let producer = tokio::spawn(async move {
            let blocked = tx.send_until(2, &token).await;
            let failed = tx.fail_until(Status::cancelled("stop"), &token).await;
            (blocked, failed)
        });

        tokio::task::yield_now().await;
        cancel.cancel();
        let (blocked, failed) = tokio::time::timeout(Duration::from_secs(2), producer)
            .await
            .expect("producer still blocked after cancellation")
            .unwrap();
        assert_eq!(blocked, Err(Error::RequestCancelled));
        assert_eq!(failed, Err(Error::RequestCancelled));

        // The buffered message survives; the stream then just ends.
        let mut inbound = Inbound::new(rx);
        assert_eq!(inbound.recv().await.unwrap(), Some(1));
        assert_eq!(inbound.recv().await.unwrap(), None);
    }

    #[tokio::test]
    async fn fail_until_delivers_when_there_is_room() {
        let (tx, rx) = message_stream::<u32>(1);
        let cancel = CancellationToken::new();
        cancel.cancel();
        tx.fail_until(Status::cancelled("stop"), &cancel).await.unwrap();

        let mut inbound = Inbound::new(rx);
        assert_eq!(inbound.recv().await.unwrap_err(), Error::RequestCancelled);
    }

    #[tokio::test]
    async fn request_stream_ends_when_sender_finishes() {
        let (mut tx, rx) = request_stream(4);
        tx.send(1).await.unwrap();
        tx.send(2).await.unwrap();
        assert_eq!(tx.finish(), 2);

        let collected: Vec<u32> = rx.collect().await;
        assert_eq!(collected, vec![1, 2]);
    }

    #[tokio::test]
    async fn request_stream_fail_reads_as_done_sending() {
        let (mut tx, rx) = request_stream(4);
        tx.send("x").await.unwrap();
        tx.fail_until(Status::cancelled("stop"), &CancellationToken::new())
            .await
            .unwrap();

        let collected: Vec<&str> = rx.collect().await;
        assert_eq!(collected, vec!["x"]);
    }
}
