//! Wires the services into a tonic server.
//!
//! [`serve_with_incoming`] is transport-agnostic: the binary feeds it a TCP or
//! Unix socket listener, tests feed it an ephemeral TCP port.

use crate::server::{
    catalog::BookRepository,
    config::{ServerConfig, TlsPaths},
    lifecycle::CallTracker,
    service::{BookSearchService, CalculatorService},
};
use anyhow::Context;
use folio_tonic_core::proto::{
    book::book_search_api_server::BookSearchApiServer,
    compute::calculator_api_server::CalculatorApiServer,
};
use futures::Stream;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tonic::{
    codec::CompressionEncoding,
    transport::{Identity, Server, ServerTlsConfig, server::Connected},
};
use tonic_web::GrpcWebLayer;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};

/// Both services plus the admission state they share.
pub struct Services<R> {
    pub books: BookSearchService<R>,
    pub calculator: CalculatorService,
    pub tracker: Arc<CallTracker>,
}

impl<R: BookRepository> Services<R> {
    pub fn new(catalog: R, config: &ServerConfig) -> Self {
        let tracker = CallTracker::new(config.shutdown_timeout);
        Self {
            books: BookSearchService::new(Arc::new(catalog), config.clone(), Arc::clone(&tracker)),
            calculator: CalculatorService::new(config.sum_unit, Arc::clone(&tracker)),
            tracker,
        }
    }
}

fn build_book_service<R: BookRepository>(
    service: BookSearchService<R>,
) -> BookSearchApiServer<BookSearchService<R>> {
    BookSearchApiServer::new(service)
        .send_compressed(CompressionEncoding::Zstd)
        .send_compressed(CompressionEncoding::Gzip)
        .send_compressed(CompressionEncoding::Deflate)
        .accept_compressed(CompressionEncoding::Zstd)
        .accept_compressed(CompressionEncoding::Gzip)
        .accept_compressed(CompressionEncoding::Deflate)
}

fn build_calculator_service(service: CalculatorService) -> CalculatorApiServer<CalculatorService> {
    CalculatorApiServer::new(service)
        .send_compressed(CompressionEncoding::Zstd)
        .send_compressed(CompressionEncoding::Gzip)
        .send_compressed(CompressionEncoding::Deflate)
        .accept_compressed(CompressionEncoding::Zstd)
        .accept_compressed(CompressionEncoding::Gzip)
        .accept_compressed(CompressionEncoding::Deflate)
}

/// Reads a PEM certificate chain and key into a server TLS config.
///
/// # Errors
///
/// Either file could not be read.
pub async fn load_tls(paths: &TlsPaths) -> anyhow::Result<ServerTlsConfig> {
    let cert = tokio::fs::read(&paths.cert)
        .await
        .with_context(|| format!("reading TLS certificate {}", paths.cert.display()))?;
    let key = tokio::fs::read(&paths.key)
        .await
        .with_context(|| format!("reading TLS key {}", paths.key.display()))?;
    Ok(ServerTlsConfig::new().identity(Identity::from_pem(cert, key)))
}

/// Serves both APIs, plus health checks, on `incoming` until `signal`
/// resolves.
///
/// On `signal` the health status flips to not-serving and the call tracker
/// drains in-flight calls (cancelling stragglers after the configured
/// timeout) before the transport stops.
///
/// # Errors
///
/// The TLS configuration was rejected or the transport failed.
pub async fn serve_with_incoming<R, I, IO, IE, F>(
    services: Services<R>,
    incoming: I,
    tls: Option<ServerTlsConfig>,
    signal: F,
) -> anyhow::Result<()>
where
    R: BookRepository,
    I: Stream<Item = Result<IO, IE>>,
    IO: AsyncRead + AsyncWrite + Connected + Unpin + Send + 'static,
    IE: Into<tower::BoxError>,
    F: Future<Output = ()>,
{
    let (health_reporter, health_service) = tonic_health::server::health_reporter();
    health_reporter
        .set_serving::<BookSearchApiServer<BookSearchService<R>>>()
        .await;
    health_reporter
        .set_serving::<CalculatorApiServer<CalculatorService>>()
        .await;

    let Services {
        books,
        calculator,
        tracker,
    } = services;

    let shutdown = async move {
        signal.await;

        #[cfg(feature = "tracing")]
        tracing::info!("Shutdown signal received, terminating gracefully...");

        // 1. Publish the status
        health_reporter
            .set_not_serving::<BookSearchApiServer<BookSearchService<R>>>()
            .await;
        health_reporter
            .set_not_serving::<CalculatorApiServer<CalculatorService>>()
            .await;

        // 2. Drain, then cancel, in-flight calls
        tracker.shutdown().await;
    };

    let mut builder = Server::builder();
    if let Some(tls) = tls {
        builder = builder.tls_config(tls)?;
    }

    builder
        .accept_http1(true)
        .http2_adaptive_window(Some(true))
        .layer(
            ServiceBuilder::new()
                .layer(
                    CorsLayer::new()
                        .allow_origin(Any)
                        .allow_methods(Any)
                        .allow_headers(Any),
                )
                .layer(GrpcWebLayer::new()),
        )
        .add_service(health_service)
        .add_service(build_book_service(books))
        .add_service(build_calculator_service(calculator))
        .serve_with_incoming_shutdown(incoming, shutdown)
        .await?;

    #[cfg(feature = "tracing")]
    tracing::info!("Service shut down successfully");
    Ok(())
}
