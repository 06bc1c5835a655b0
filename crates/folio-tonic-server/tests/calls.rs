use core::{ops::ControlFlow, time::Duration};
use folio_tonic_core::{
    Error,
    client::{BookCaller, CalculatorCaller, Exchange, connect},
};
use folio_tonic_server::server::{
    catalog::StaticCatalog,
    config::ServerConfig,
    dispatch::{Services, serve_with_incoming},
};
use std::sync::{Arc, Mutex};
use tokio::{net::TcpListener, sync::oneshot, task::JoinHandle};
use tokio_stream::wrappers::TcpListenerStream;
use tonic::transport::Channel;

struct TestServer {
    channel: Channel,
    stop: oneshot::Sender<()>,
    handle: JoinHandle<anyhow::Result<()>>,
}

impl TestServer {
    fn books(&self) -> BookCaller {
        BookCaller::new(self.channel.clone())
    }

    fn calculator(&self) -> CalculatorCaller {
        CalculatorCaller::new(self.channel.clone())
    }

    async fn stop(self) {
        let Self {
            channel,
            stop,
            handle,
        } = self;
        drop(channel);
        let _ = stop.send(());
        handle.await.unwrap().unwrap();
    }
}

fn test_config() -> ServerConfig {
    ServerConfig {
        stream_interval: Duration::from_millis(10),
        sum_unit: Duration::from_millis(50),
        shutdown_timeout: Duration::from_secs(2),
        ..ServerConfig::default()
    }
}

async fn start(config: ServerConfig) -> TestServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (stop, stopped) = oneshot::channel::<()>();

    let services = Services::new(StaticCatalog::new(), &config);
    let handle = tokio::spawn(serve_with_incoming(
        services,
        TcpListenerStream::new(listener),
        None,
        async {
            let _ = stopped.await;
        },
    ));

    let channel = connect(format!("http://{addr}"), None).await.unwrap();
    TestServer {
        channel,
        stop,
        handle,
    }
}

#[tokio::test]
async fn get_book_finds_every_catalog_title() {
    let server = start(test_config()).await;
    let mut books = server.books();

    for title in ["Domain Driven Design", "Java"] {
        let book = books.get_book(title).await.unwrap();
        assert_eq!(book.title, title);
    }

    let first = books.get_book("Java").await.unwrap();
    assert_eq!(first.author, "Herbert Schildt");
    assert_eq!(books.get_book("Java").await.unwrap(), first);

    server.stop().await;
}

#[tokio::test]
async fn get_book_unknown_title_is_not_found() {
    let server = start(test_config()).await;
    let err = server.books().get_book("Unknown").await.unwrap_err();
    assert_eq!(
        err,
        Error::not_found("Book is not found for a given Title: Unknown")
    );
    server.stop().await;
}

#[tokio::test]
async fn get_book_by_author() {
    let server = start(test_config()).await;
    let mut books = server.books();

    let book = books.get_book_by_author("Joshua Bloch").await.unwrap();
    assert_eq!(book.subject, "Effective Java");

    let err = books.get_book_by_author("Nobody").await.unwrap_err();
    assert_eq!(
        err,
        Error::not_found("Book is not found for a given Author: Nobody")
    );
    server.stop().await;
}

#[tokio::test]
async fn get_all_books_streams_every_match_in_order() {
    let server = start(test_config()).await;
    let mut books = server.books();

    let mut authors = Vec::new();
    let count = books
        .get_all_books("Java", |book| {
            authors.push(book.author);
            ControlFlow::Continue(())
        })
        .await
        .unwrap();
    assert_eq!(count, 3);
    assert_eq!(authors, ["Herbert Schildt", "Kathy Sierra", "Joshua Bloch"]);

    let none = books
        .get_all_books("Unknown", |_| ControlFlow::Continue(()))
        .await
        .unwrap();
    assert_eq!(none, 0);

    server.stop().await;
}

#[tokio::test]
async fn get_all_books_early_exit_is_not_an_error() {
    let server = start(test_config()).await;
    let mut books = server.books();

    let count = books
        .get_all_books("Java", |_| ControlFlow::Break(()))
        .await
        .unwrap();
    assert_eq!(count, 1);

    // The abandoned stream must not poison the channel.
    assert!(books.get_book("Java").await.is_ok());
    server.stop().await;
}

#[tokio::test]
async fn client_stream_aggregates_in_send_order() {
    let server = start(test_config()).await;
    let mut books = server.books().with_send_interval(Duration::from_millis(5));

    let found = books
        .get_books_for_given_titles(["Java", "Domain Driven Design", "Java"])
        .await
        .unwrap();
    let titles: Vec<_> = found.iter().map(|b| b.title.as_str()).collect();
    assert_eq!(titles, ["Java", "Domain Driven Design", "Java"]);

    let empty = books
        .get_books_for_given_titles(Vec::<String>::new())
        .await
        .unwrap();
    assert!(empty.is_empty());

    server.stop().await;
}

#[tokio::test]
async fn client_stream_unknown_title_fails_the_call() {
    let server = start(test_config()).await;
    let err = server
        .books()
        .get_books_for_given_titles(["Java", "Rust"])
        .await
        .unwrap_err();
    assert_eq!(
        err,
        Error::not_found("Book is not found for a given Title: Rust")
    );
    server.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn bidi_answers_each_title_as_it_arrives() {
    let server = start(test_config()).await;
    let mut books = server.books().with_send_interval(Duration::from_millis(5));

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let exchange = books
        .get_each_book(["Java", "Domain Driven Design"], move |book| {
            sink.lock().unwrap().push(book.title);
        })
        .await
        .unwrap();

    assert_eq!(
        exchange,
        Exchange {
            sent: 2,
            received: 2
        }
    );
    assert_eq!(*seen.lock().unwrap(), ["Java", "Domain Driven Design"]);
    server.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn bidi_skips_unknown_titles() {
    let server = start(test_config()).await;
    let exchange = server
        .books()
        .get_each_book(["Rust", "Java", "Go"], |_| {})
        .await
        .unwrap();
    assert_eq!(
        exchange,
        Exchange {
            sent: 3,
            received: 1
        }
    );
    server.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn shutdown_cancels_a_long_bidi_exchange() {
    let server = start(ServerConfig {
        shutdown_timeout: Duration::from_millis(100),
        ..test_config()
    })
    .await;
    let mut books = server.books().with_send_interval(Duration::from_millis(50));

    let call = tokio::spawn(async move { books.get_each_book(vec!["Java"; 100], |_| {}).await });
    tokio::time::sleep(Duration::from_millis(200)).await;
    let stopping = tokio::spawn(server.stop());

    let outcome = tokio::time::timeout(Duration::from_secs(5), call)
        .await
        .expect("exchange outlived the shutdown")
        .unwrap();
    assert_eq!(outcome, Err(Error::RequestCancelled));
    tokio::time::timeout(Duration::from_secs(5), stopping)
        .await
        .expect("server did not stop")
        .unwrap();
}

#[tokio::test]
async fn divide() {
    let server = start(test_config()).await;
    let mut calculator = server.calculator();

    assert_eq!(calculator.divide(20, 10).await.unwrap(), 2.0);
    assert_eq!(calculator.divide(7, 2).await.unwrap(), 3.0);

    let err = calculator.divide(20, 0).await.unwrap_err();
    assert_eq!(err, Error::invalid("Received an invalid number: 0"));
    server.stop().await;
}

#[tokio::test]
async fn sum_respects_deadlines() {
    let server = start(test_config()).await;
    let mut calculator = server.calculator();

    assert_eq!(calculator.sum(10, 20, None).await.unwrap(), 30);
    assert_eq!(
        calculator
            .sum(10, 20, Some(Duration::from_secs(5)))
            .await
            .unwrap(),
        30
    );

    let err = calculator
        .sum(10, 20, Some(Duration::from_millis(60)))
        .await
        .unwrap_err();
    assert!(
        matches!(err, Error::DeadlineExceeded | Error::RequestCancelled),
        "unexpected error: {err:?}"
    );

    server.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn shutdown_lets_inflight_calls_finish() {
    let server = start(test_config()).await;
    let mut calculator = server.calculator();

    let call = tokio::spawn(async move { calculator.sum(1, 2, None).await });
    tokio::time::sleep(Duration::from_millis(20)).await;
    server.stop().await;

    assert_eq!(call.await.unwrap().unwrap(), 3);
}
