use crate::server::{catalog::BookRepository, telemetry::increment_messages_streamed};
use folio_tonic_core::{
    Error, Result,
    proto::book::{Book, GetBooksForGivenTitlesRequest, GetEachBookRequest, GetEachBookResponse},
    stream::{Inbound, Outbound},
    types::CallPattern,
};
use futures::Stream;
use tokio_util::sync::CancellationToken;
use tonic::Status;

/// Consumes a client stream of titles and resolves each one, in arrival order.
///
/// The aggregate grows with the number of requests; nothing is answered until
/// the caller closes its send side.
///
/// # Errors
///
/// - [`Error::NotFound`] for the first title with no record; the whole call
///   fails and the remaining requests are not read.
/// - [`Error::RequestCancelled`] when `cancel` fires.
/// - Whatever status terminated the incoming stream.
pub async fn collect_books<R, S>(
    catalog: &R,
    requests: S,
    cancel: &CancellationToken,
) -> Result<Vec<Book>>
where
    R: BookRepository,
    S: Stream<Item = core::result::Result<GetBooksForGivenTitlesRequest, Status>> + Unpin,
{
    let mut inbound = Inbound::new(requests);
    let mut books = Vec::new();

    loop {
        let next = tokio::select! {
            () = cancel.cancelled() => return Err(Error::RequestCancelled),
            next = inbound.recv() => next?,
        };
        let Some(request) = next else {
            break;
        };

        let book = catalog.find_by_title(&request.title).ok_or_else(|| {
            Error::not_found(format!("Book is not found for a given Title: {}", request.title))
        })?;
        books.push(book);
    }

    #[cfg(feature = "tracing")]
    tracing::debug!("Collected {} records from {} requests", books.len(), inbound.received());
    Ok(books)
}

/// Answers a bidirectional stream: every incoming title is looked up and, when
/// it matches, answered right away on `outbound`.
///
/// Unknown titles are skipped without failing the exchange. The response
/// stream is closed once the caller has finished sending and every answer has
/// been written; if the caller stops reading, remaining requests are drained
/// without being answered.
///
/// Returns the number of answers written.
///
/// # Errors
///
/// The status that terminated the incoming stream, or
/// [`Error::RequestCancelled`] on shutdown, including while parked on a full
/// response buffer. Both are also forwarded as the terminal status of the
/// response stream when it has room.
pub async fn answer_each<R, S>(
    catalog: &R,
    requests: S,
    mut outbound: Outbound<GetEachBookResponse>,
    cancel: CancellationToken,
) -> Result<usize>
where
    R: BookRepository,
    S: Stream<Item = core::result::Result<GetEachBookRequest, Status>> + Unpin,
{
    let mut inbound = Inbound::new(requests);

    loop {
        let next = tokio::select! {
            biased;
            () = cancel.cancelled() => Err(Error::RequestCancelled),
            next = inbound.recv() => next,
        };

        let request = match next {
            Ok(Some(request)) => request,
            Ok(None) => break,
            Err(e) => return terminate(outbound, e, &cancel).await,
        };

        let Some(book) = catalog.find_by_title(&request.title) else {
            #[cfg(feature = "tracing")]
            tracing::debug!(title = %request.title, "No record, skipping");
            continue;
        };

        if outbound.is_closed() {
            continue;
        }
        match outbound
            .send_until(GetEachBookResponse { book: Some(book) }, &cancel)
            .await
        {
            Ok(()) => increment_messages_streamed(CallPattern::BidiStreaming, 1),
            Err(Error::RequestCancelled) => {
                return terminate(outbound, Error::RequestCancelled, &cancel).await;
            }
            Err(_e) => {
                #[cfg(feature = "tracing")]
                tracing::debug!("Caller stopped reading: {_e}");
            }
        }
    }

    #[cfg(feature = "tracing")]
    tracing::debug!(
        received = inbound.received(),
        answered = outbound.sent(),
        "Exchange drained"
    );
    Ok(outbound.finish())
}

/// Forwards `err` as the terminal status, without waiting on a full buffer
/// past `cancel`, and returns it.
async fn terminate<T>(outbound: Outbound<T>, err: Error, cancel: &CancellationToken) -> Result<usize> {
    if let Err(_e) = outbound.fail_until(err.clone().into(), cancel).await {
        #[cfg(feature = "tracing")]
        tracing::debug!("Caller gone before the terminal status: {_e}");
    }
    Err(err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::catalog::StaticCatalog;
    use core::time::Duration;
    use folio_tonic_core::stream::message_stream;
    use tokio_stream::StreamExt;
    use tonic::Code;

    fn titles<T>(make: impl Fn(String) -> T, titles: &[&str]) -> Vec<core::result::Result<T, Status>> {
        titles.iter().map(|t| Ok(make((*t).to_string()))).collect()
    }

    #[tokio::test]
    async fn collects_one_record_per_title_in_order() {
        let catalog = StaticCatalog::new();
        let requests = tokio_stream::iter(titles(
            |title| GetBooksForGivenTitlesRequest { title },
            &["Java", "Domain Driven Design", "Java"],
        ));

        let books = collect_books(&catalog, requests, &CancellationToken::new())
            .await
            .unwrap();
        let got: Vec<_> = books.iter().map(|b| b.title.as_str()).collect();
        assert_eq!(got, ["Java", "Domain Driven Design", "Java"]);
    }

    #[tokio::test]
    async fn empty_client_stream_yields_empty_aggregate() {
        let catalog = StaticCatalog::new();
        let requests = tokio_stream::iter(Vec::<core::result::Result<GetBooksForGivenTitlesRequest, Status>>::new());
        let books = collect_books(&catalog, requests, &CancellationToken::new())
            .await
            .unwrap();
        assert!(books.is_empty());
    }

    #[tokio::test]
    async fn unknown_title_fails_the_aggregate() {
        let catalog = StaticCatalog::new();
        let requests = tokio_stream::iter(titles(
            |title| GetBooksForGivenTitlesRequest { title },
            &["Java", "Rust"],
        ));

        let err = collect_books(&catalog, requests, &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err, Error::not_found("Book is not found for a given Title: Rust"));
    }

    #[tokio::test]
    async fn aborted_client_stream_propagates() {
        let catalog = StaticCatalog::new();
        let requests = tokio_stream::iter(vec![
            Ok(GetBooksForGivenTitlesRequest {
                title: "Java".to_string(),
            }),
            Err(Status::cancelled("gone")),
        ]);

        let err = collect_books(&catalog, requests, &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err, Error::RequestCancelled);
    }

    #[tokio::test]
    async fn answers_known_titles_and_skips_unknown() {
        let catalog = StaticCatalog::new();
        let requests = tokio_stream::iter(titles(
            |title| GetEachBookRequest { title },
            &["Java", "Rust", "Domain Driven Design"],
        ));
        let (outbound, stream) = message_stream(4);

        let answered = answer_each(&catalog, requests, outbound, CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(answered, 2);

        let got: Vec<_> = stream
            .map(|r| r.unwrap().book.unwrap().title)
            .collect()
            .await;
        assert_eq!(got, ["Java", "Domain Driven Design"]);
    }

    #[tokio::test]
    async fn caller_abort_becomes_terminal_status() {
        let catalog = StaticCatalog::new();
        let requests = tokio_stream::iter(vec![
            Ok(GetEachBookRequest {
                title: "Java".to_string(),
            }),
            Err(Status::cancelled("gone")),
        ]);
        let (outbound, mut stream) = message_stream(4);

        let err = answer_each(&catalog, requests, outbound, CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err, Error::RequestCancelled);

        assert!(stream.next().await.unwrap().is_ok());
        let status = stream.next().await.unwrap().unwrap_err();
        assert_eq!(status.code(), Code::Cancelled);
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn reader_gone_drains_requests() {
        let catalog = StaticCatalog::new();
        let requests = tokio_stream::iter(titles(
            |title| GetEachBookRequest { title },
            &["Java", "Java", "Java"],
        ));
        let (outbound, stream) = message_stream(1);
        drop(stream);

        let answered = answer_each(&catalog, requests, outbound, CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(answered, 0);
    }

    #[tokio::test]
    async fn shutdown_unblocks_answers_to_a_stalled_reader() {
        let catalog = StaticCatalog::new();
        let requests = tokio_stream::iter(titles(|title| GetEachBookRequest { title }, &["Java"; 16]));
        let (outbound, stream) = message_stream(1);
        let cancel = CancellationToken::new();

        let token = cancel.clone();
        let producer =
            tokio::spawn(async move { answer_each(&catalog, requests, outbound, token).await });

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!producer.is_finished());
        cancel.cancel();

        let result = tokio::time::timeout(Duration::from_secs(2), producer)
            .await
            .expect("answers still blocked after cancellation")
            .unwrap();
        assert_eq!(result, Err(Error::RequestCancelled));
        drop(stream);
    }
}
