use super::send_all;
use crate::{
    common::{
        error::{Error, Result},
        signal::completion,
        stream::{Inbound, request_stream},
        types::DEFAULT_STREAM_BUFFER,
    },
    proto::book::{
        Book, GetAllBooksRequest, GetBookByAuthorRequest, GetBookRequest,
        GetBooksForGivenTitlesRequest, GetEachBookRequest,
        book_search_api_client::BookSearchApiClient,
    },
};
use core::{ops::ControlFlow, time::Duration};
use tokio_util::sync::CancellationToken;
use tonic::transport::Channel;

/// Message counts of a finished bidirectional exchange.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Exchange {
    pub sent: usize,
    pub received: usize,
}

/// Client for the `book.BookSearchApi` service.
#[derive(Clone, Debug)]
pub struct BookCaller {
    inner: BookSearchApiClient<Channel>,
    buffer: usize,
    send_interval: Duration,
}

impl BookCaller {
    pub fn new(channel: Channel) -> Self {
        Self {
            inner: BookSearchApiClient::new(channel),
            buffer: DEFAULT_STREAM_BUFFER,
            send_interval: Duration::ZERO,
        }
    }

    /// Pause between two requests on a client or bidirectional stream.
    #[must_use]
    pub const fn with_send_interval(mut self, interval: Duration) -> Self {
        self.send_interval = interval;
        self
    }

    /// Unary lookup by exact title.
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`] if no record has this title.
    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self)))]
    pub async fn get_book(&mut self, title: &str) -> Result<Book> {
        let response = self
            .inner
            .get_book(GetBookRequest {
                title: title.to_string(),
            })
            .await?
            .into_inner();
        response.book.ok_or_else(|| missing_record("GetBook"))
    }

    /// Unary lookup by exact author.
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`] if no record has this author.
    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self)))]
    pub async fn get_book_by_author(&mut self, author: &str) -> Result<Book> {
        let response = self
            .inner
            .get_book_by_author(GetBookByAuthorRequest {
                author: author.to_string(),
            })
            .await?
            .into_inner();
        response.book.ok_or_else(|| missing_record("GetBookByAuthor"))
    }

    /// Server streaming: hands each record to `on_book` as it arrives.
    ///
    /// Returning [`ControlFlow::Break`] stops reading; the response stream is
    /// dropped, which cancels the call on the server. That is a normal exit,
    /// not an error. Returns the number of records received.
    ///
    /// # Errors
    ///
    /// The terminal status of the call if it failed.
    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self, on_book)))]
    pub async fn get_all_books<F>(&mut self, title: &str, mut on_book: F) -> Result<usize>
    where
        F: FnMut(Book) -> ControlFlow<()>,
    {
        let responses = self
            .inner
            .get_all_books(GetAllBooksRequest {
                title: title.to_string(),
            })
            .await?
            .into_inner();

        let mut inbound = Inbound::new(responses);
        let mut delivered = 0;
        while let Some(response) = inbound.recv().await? {
            let Some(book) = response.book else {
                continue;
            };
            delivered += 1;
            if on_book(book).is_break() {
                #[cfg(feature = "tracing")]
                tracing::debug!("Stopped reading after {delivered} records");
                break;
            }
        }
        Ok(delivered)
    }

    /// Client streaming: sends one request per title, closes the send side and
    /// waits for the aggregated answer.
    ///
    /// # Errors
    ///
    /// The call's terminal status, or [`Error::Internal`] if the aggregate does
    /// not hold exactly one record per request.
    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all))]
    pub async fn get_books_for_given_titles<I>(&mut self, titles: I) -> Result<Vec<Book>>
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        let messages: Vec<_> = titles
            .into_iter()
            .map(|title| GetBooksForGivenTitlesRequest {
                title: title.into(),
            })
            .collect();
        let (outbound, requests) = request_stream(self.buffer);

        let (sent, response) = tokio::join!(
            send_all(outbound, messages, self.send_interval),
            self.inner.get_books_for_given_titles(requests),
        );

        // The response carries the authoritative status; a send failure is
        // usually just the fallout of the call ending early.
        let books = response?.into_inner().book;
        let sent = sent?;
        if books.len() != sent {
            return Err(Error::Internal {
                context: format!("aggregate holds {} records for {sent} requests", books.len()),
            });
        }
        Ok(books)
    }

    /// Bidirectional streaming.
    ///
    /// Requests are sent from one task and responses consumed by another, so
    /// neither direction waits on the other. The receive task fires a
    /// completion signal once it has seen end-of-stream, and this method
    /// returns only after that signal, regardless of which direction finished
    /// first. A failure on either side cancels the other.
    ///
    /// # Errors
    ///
    /// The first failure observed on either direction.
    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all))]
    pub async fn get_each_book<I, F>(&mut self, titles: I, mut on_book: F) -> Result<Exchange>
    where
        I: IntoIterator,
        I::Item: Into<String>,
        F: FnMut(Book) + Send + 'static,
    {
        let messages: Vec<_> = titles
            .into_iter()
            .map(|title| GetEachBookRequest {
                title: title.into(),
            })
            .collect();
        let (outbound, requests) = request_stream(self.buffer);
        let abort = CancellationToken::new();

        // Start sending before the call resolves; the buffer absorbs requests
        // until tonic starts polling the request body.
        let send_abort = abort.clone();
        let interval = self.send_interval;
        let sender = tokio::spawn(async move {
            let sent = tokio::select! {
                sent = send_all(outbound, messages, interval) => sent,
                () = send_abort.cancelled() => Err(Error::RequestCancelled),
            };
            if sent.is_err() {
                send_abort.cancel();
            }
            sent
        });

        let responses = match self.inner.get_each_book(requests).await {
            Ok(response) => response.into_inner(),
            Err(status) => {
                abort.cancel();
                let _ = sender.await;
                return Err(status.into());
            }
        };

        let (completer, done) = completion();
        let recv_abort = abort.clone();
        let receiver = tokio::spawn(async move {
            let mut inbound = Inbound::new(responses);
            let outcome = loop {
                tokio::select! {
                    biased;
                    () = recv_abort.cancelled() => break Err(Error::RequestCancelled),
                    next = inbound.recv() => match next {
                        Ok(Some(response)) => {
                            if let Some(book) = response.book {
                                on_book(book);
                            }
                        }
                        Ok(None) => break Ok(inbound.received()),
                        Err(e) => break Err(e),
                    },
                }
            };
            if outcome.is_err() {
                recv_abort.cancel();
            }
            completer.complete(outcome);
        });

        let received = done.wait().await.and_then(|outcome| outcome);
        let sent = sender.await.unwrap_or_else(|e| {
            Err(Error::Internal {
                context: format!("send task failed: {e}"),
            })
        });
        let _ = receiver.await;

        settle(received, sent)
    }
}

/// Combines both directions of an exchange. A receive side that only saw the
/// abort defers to the send failure that caused it.
fn settle(received: Result<usize>, sent: Result<usize>) -> Result<Exchange> {
    match (received, sent) {
        (Ok(received), Ok(sent)) => {
            #[cfg(feature = "tracing")]
            tracing::debug!(sent, received, "Exchange complete");
            Ok(Exchange { sent, received })
        }
        (Err(Error::RequestCancelled), Err(e)) | (Err(e), _) | (Ok(_), Err(e)) => Err(e),
    }
}

fn missing_record(call: &str) -> Error {
    Error::Internal {
        context: format!("{call} answered without a record"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn broken_pipe() -> Error {
        Error::ChannelError {
            context: "request stream closed after 2 messages".to_string(),
        }
    }

    #[test]
    fn send_failure_wins_over_the_abort_it_caused() {
        assert_eq!(
            settle(Err(Error::RequestCancelled), Err(broken_pipe())),
            Err(broken_pipe())
        );
    }

    #[test]
    fn receive_failure_is_reported_first() {
        let not_found = Error::not_found("Book is not found for a given Title: Rust");
        assert_eq!(settle(Err(not_found.clone()), Ok(2)), Err(not_found.clone()));
        assert_eq!(settle(Err(not_found.clone()), Err(broken_pipe())), Err(not_found));
        assert_eq!(
            settle(Err(Error::RequestCancelled), Ok(2)),
            Err(Error::RequestCancelled)
        );
    }

    #[test]
    fn send_failure_alone_fails_the_exchange() {
        assert_eq!(settle(Ok(1), Err(broken_pipe())), Err(broken_pipe()));
    }

    #[test]
    fn both_sides_done_is_an_exchange() {
        assert_eq!(
            settle(Ok(1), Ok(3)),
            Ok(Exchange {
                sent: 3,
                received: 1
            })
        );
    }
}
