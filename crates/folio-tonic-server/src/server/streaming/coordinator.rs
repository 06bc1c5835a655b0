use crate::server::{catalog::BookRepository, telemetry::increment_messages_streamed};
use core::time::Duration;
use folio_tonic_core::{
    Error, Result, proto::book::GetAllBooksResponse, stream::Outbound, types::CallPattern,
};
use tokio_util::sync::CancellationToken;

/// Streams every record matching `title` to the caller, one message each.
///
/// Records are pulled lazily from the catalog in collection order and written
/// as soon as they are available; `interval` paces consecutive records. The
/// stream ends normally after the last match (immediately when nothing
/// matches).
///
/// # Behavior
///
/// - Backpressure comes from the bounded `outbound` buffer: a slow reader
///   suspends this task rather than growing memory.
/// - If the caller stops reading (drops the stream), production stops and
///   the call counts as successful.
/// - If `cancel` fires (server shutdown), the stream is terminated with
///   `CANCELLED`, even when the task is parked on a full buffer.
///
/// Returns the number of records written.
#[cfg_attr(feature = "tracing", tracing::instrument(skip(catalog, outbound, cancel)))]
pub async fn feed_books<R>(
    catalog: &R,
    title: &str,
    mut outbound: Outbound<GetAllBooksResponse>,
    interval: Duration,
    cancel: CancellationToken,
) -> Result<usize>
where
    R: BookRepository,
{
    for (i, book) in catalog.find_all_by_title(title).enumerate() {
        if i > 0 && !interval.is_zero() {
            tokio::select! {
                () = cancel.cancelled() => {
                    return abort(outbound, Error::RequestCancelled, &cancel).await;
                }
                () = outbound.closed() => return Ok(outbound.finish()),
                () = tokio::time::sleep(interval) => {}
            }
        }

        if cancel.is_cancelled() {
            return abort(outbound, Error::RequestCancelled, &cancel).await;
        }

        let message = GetAllBooksResponse {
            book: Some(book.clone()),
        };
        match outbound.send_until(message, &cancel).await {
            Ok(()) => increment_messages_streamed(CallPattern::ServerStreaming, 1),
            Err(Error::RequestCancelled) => {
                return abort(outbound, Error::RequestCancelled, &cancel).await;
            }
            Err(_e) => {
                #[cfg(feature = "tracing")]
                tracing::debug!("Caller stopped reading after {} records", outbound.sent());
                break;
            }
        }
    }

    Ok(outbound.finish())
}

/// Terminates the stream with `err` as its status. The error is returned so
/// the caller can record it, even if the status could not be delivered.
/// Never waits on a full buffer once `cancel` has fired.
async fn abort<T>(outbound: Outbound<T>, err: Error, cancel: &CancellationToken) -> Result<usize> {
    if let Err(_e) = outbound.fail_until(err.clone().into(), cancel).await {
        #[cfg(feature = "tracing")]
        tracing::debug!("Failed to forward terminal status: {_e}");
    }
    Err(err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::catalog::StaticCatalog;
    use folio_tonic_core::stream::message_stream;
    use tokio_stream::StreamExt;
    use tonic::Code;

    #[tokio::test]
    async fn streams_matches_in_collection_order() {
        let catalog = StaticCatalog::new();
        let (outbound, stream) = message_stream(1);

        let producer = tokio::spawn(async move {
            feed_books(&catalog, "Java", outbound, Duration::ZERO, CancellationToken::new()).await
        });

        let authors: Vec<_> = stream
            .map(|r| r.unwrap().book.unwrap().author)
            .collect()
            .await;
        assert_eq!(authors, ["Herbert Schildt", "Kathy Sierra", "Joshua Bloch"]);
        assert_eq!(producer.await.unwrap(), Ok(3));
    }

    #[tokio::test]
    async fn no_match_ends_immediately() {
        let catalog = StaticCatalog::new();
        let (outbound, stream) = message_stream(1);
        let written = feed_books(&catalog, "Unknown", outbound, Duration::ZERO, CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(written, 0);
        assert!(stream.collect::<Vec<_>>().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn early_exit_stops_production() {
        let catalog = StaticCatalog::new();
        let (outbound, mut stream) = message_stream(1);

        let producer = tokio::spawn(async move {
            feed_books(&catalog, "Java", outbound, Duration::from_secs(1), CancellationToken::new())
                .await
        });

        let first = stream.next().await.unwrap().unwrap();
        assert_eq!(first.book.unwrap().author, "Herbert Schildt");
        drop(stream);

        assert_eq!(producer.await.unwrap(), Ok(1));
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_terminates_with_cancelled() {
        let catalog = StaticCatalog::new();
        let (outbound, mut stream) = message_stream(4);
        let cancel = CancellationToken::new();

        let token = cancel.clone();
        let producer = tokio::spawn(async move {
            feed_books(&catalog, "Java", outbound, Duration::from_secs(1), token).await
        });

        assert!(stream.next().await.unwrap().is_ok());
        cancel.cancel();
        let status = stream.next().await.unwrap().unwrap_err();
        assert_eq!(status.code(), Code::Cancelled);
        assert!(stream.next().await.is_none());
        assert_eq!(producer.await.unwrap(), Err(Error::RequestCancelled));
    }

    #[tokio::test]
    async fn shutdown_unblocks_a_reader_that_stalled() {
        let catalog = StaticCatalog::new();
        let (outbound, stream) = message_stream(1);
        let cancel = CancellationToken::new();

        let token = cancel.clone();
        let producer = tokio::spawn(async move {
            feed_books(&catalog, "Java", outbound, Duration::ZERO, token).await
        });

        // The reader stays connected but never polls; the producer parks on
        // the second record.
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!producer.is_finished());
        cancel.cancel();

        let result = tokio::time::timeout(Duration::from_secs(2), producer)
            .await
            .expect("producer still blocked after cancellation")
            .unwrap();
        assert_eq!(result, Err(Error::RequestCancelled));
        drop(stream);
    }
}
