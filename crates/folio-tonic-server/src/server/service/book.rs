//! `book.BookSearchApi`: title and author lookups in every call pattern.
//!
//! Unary lookups answer inline. Streaming calls hand their long-running half
//! to a spawned task (see [`crate::server::streaming`]) and return the
//! response stream right away, so the transport starts delivering records
//! while they are still being produced.

use crate::server::{
    catalog::BookRepository,
    config::ServerConfig,
    lifecycle::{CallGuard, CallTracker},
    streaming::{
        coordinator::feed_books,
        processor::{answer_each, collect_books},
    },
};
use folio_tonic_core::{
    Error,
    proto::book::{
        GetAllBooksRequest, GetAllBooksResponse, GetBookByAuthorRequest, GetBookRequest,
        GetBookResponse, GetBooksForGivenTitlesRequest, GetBooksForGivenTitlesResponse,
        GetEachBookRequest, GetEachBookResponse, book_search_api_server::BookSearchApi,
    },
    stream::{ResponseStream, message_stream},
    types::CallPattern,
};
use std::sync::Arc;
use tonic::{Request, Response, Status, Streaming};

pub struct BookSearchService<R> {
    catalog: Arc<R>,
    config: ServerConfig,
    tracker: Arc<CallTracker>,
}

impl<R: BookRepository> BookSearchService<R> {
    pub fn new(catalog: Arc<R>, config: ServerConfig, tracker: Arc<CallTracker>) -> Self {
        Self {
            catalog,
            config,
            tracker,
        }
    }
}

impl<R> Clone for BookSearchService<R> {
    fn clone(&self) -> Self {
        Self {
            catalog: Arc::clone(&self.catalog),
            config: self.config.clone(),
            tracker: Arc::clone(&self.tracker),
        }
    }
}

/// Runs the streaming half of a call, recording a failure against its guard.
/// The guard lives until the task ends, so the call stays in flight for as
/// long as it is producing or consuming.
fn spawn_call<F>(call: CallGuard, work: F)
where
    F: Future<Output = folio_tonic_core::Result<usize>> + Send + 'static,
{
    let fut = async move {
        match work.await {
            Ok(_n) => {
                #[cfg(feature = "tracing")]
                tracing::debug!(method = call.method(), "Stream complete after {_n} messages");
            }
            Err(e) => {
                let _ = call.fail(e);
            }
        }
    };

    #[cfg(feature = "tracing")]
    let fut = {
        use tracing::Instrument;
        fut.instrument(tracing::info_span!("streaming"))
    };

    tokio::spawn(fut);
}

#[tonic::async_trait]
impl<R: BookRepository> BookSearchApi for BookSearchService<R> {
    type GetAllBooksStream = ResponseStream<GetAllBooksResponse>;
    type GetEachBookStream = ResponseStream<GetEachBookResponse>;

    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all, fields(title = %req.get_ref().title)))]
    async fn get_book(
        &self,
        req: Request<GetBookRequest>,
    ) -> Result<Response<GetBookResponse>, Status> {
        let call = self.tracker.begin(CallPattern::Unary, "GetBook")?;
        let title = req.into_inner().title;

        match self.catalog.find_by_title(&title) {
            Some(book) => Ok(Response::new(GetBookResponse { book: Some(book) })),
            None => Err(call.fail(Error::not_found(format!(
                "Book is not found for a given Title: {title}"
            )))),
        }
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all, fields(author = %req.get_ref().author)))]
    async fn get_book_by_author(
        &self,
        req: Request<GetBookByAuthorRequest>,
    ) -> Result<Response<GetBookResponse>, Status> {
        let call = self.tracker.begin(CallPattern::Unary, "GetBookByAuthor")?;
        let author = req.into_inner().author;

        match self.catalog.find_by_author(&author) {
            Some(book) => Ok(Response::new(GetBookResponse { book: Some(book) })),
            None => Err(call.fail(Error::not_found(format!(
                "Book is not found for a given Author: {author}"
            )))),
        }
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all, fields(title = %req.get_ref().title)))]
    async fn get_all_books(
        &self,
        req: Request<GetAllBooksRequest>,
    ) -> Result<Response<Self::GetAllBooksStream>, Status> {
        let call = self
            .tracker
            .begin(CallPattern::ServerStreaming, "GetAllBooks")?;
        let title = req.into_inner().title;
        let (outbound, stream) = message_stream(self.config.stream_buffer_size);

        let catalog = Arc::clone(&self.catalog);
        let interval = self.config.stream_interval;
        let cancel = call.token();
        spawn_call(call, async move {
            feed_books(catalog.as_ref(), &title, outbound, interval, cancel).await
        });

        Ok(Response::new(stream))
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all))]
    async fn get_books_for_given_titles(
        &self,
        req: Request<Streaming<GetBooksForGivenTitlesRequest>>,
    ) -> Result<Response<GetBooksForGivenTitlesResponse>, Status> {
        let call = self
            .tracker
            .begin(CallPattern::ClientStreaming, "GetBooksForGivenTitles")?;

        match collect_books(self.catalog.as_ref(), req.into_inner(), &call.token()).await {
            Ok(book) => Ok(Response::new(GetBooksForGivenTitlesResponse { book })),
            Err(e) => Err(call.fail(e)),
        }
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all))]
    async fn get_each_book(
        &self,
        req: Request<Streaming<GetEachBookRequest>>,
    ) -> Result<Response<Self::GetEachBookStream>, Status> {
        let call = self
            .tracker
            .begin(CallPattern::BidiStreaming, "GetEachBook")?;
        let requests = req.into_inner();
        let (outbound, stream) = message_stream(self.config.stream_buffer_size);

        let catalog = Arc::clone(&self.catalog);
        let cancel = call.token();
        spawn_call(call, async move {
            answer_each(catalog.as_ref(), requests, outbound, cancel).await
        });

        Ok(Response::new(stream))
    }
}
