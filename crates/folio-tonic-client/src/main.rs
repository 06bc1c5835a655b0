use clap::{Parser, Subcommand};
use core::{ops::ControlFlow, time::Duration};
use folio_tonic_core::{
    Error,
    client::{BookCaller, CalculatorCaller, TlsSettings, connect},
    types::DEFAULT_PORT,
};
use serde_json::{Value, json};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Calls every folio API once per pattern and prints the results as JSON.
#[derive(Parser, Debug)]
#[command(name = "folio-tonic-client", version)]
struct CliArgs {
    /// Server to call.
    ///
    /// Environment variable: `SERVER_URL`
    #[arg(long, env = "SERVER_URL", default_value_t = format!("http://127.0.0.1:{DEFAULT_PORT}"))]
    server_url: String,

    /// Pause, in milliseconds, between two messages on a client stream.
    ///
    /// Environment variable: `SEND_INTERVAL_MS`
    #[arg(long, env = "SEND_INTERVAL_MS", default_value_t = 500)]
    send_interval_ms: u64,

    /// Connect over TLS. Requires `--tls-ca`.
    ///
    /// Environment variable: `TLS_ENABLED`
    #[arg(long, env = "TLS_ENABLED", default_value_t = false)]
    tls: bool,

    /// PEM certificate authority that signed the server certificate.
    ///
    /// Environment variable: `TLS_CA`
    #[arg(long, env = "TLS_CA")]
    tls_ca: Option<PathBuf>,

    /// Name to verify the server certificate against.
    ///
    /// Environment variable: `TLS_DOMAIN`
    #[arg(long, env = "TLS_DOMAIN")]
    tls_domain: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Runs every scenario below with sample inputs.
    Demo,
    /// Unary lookup by title.
    Book { title: String },
    /// Unary lookup by author.
    Author { author: String },
    /// Server streaming: every record with this title.
    AllBooks {
        title: String,
        /// Stop reading after this many records.
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Client streaming: one aggregate answer for many titles.
    Titles {
        #[arg(required = true)]
        titles: Vec<String>,
    },
    /// Bidirectional streaming: one answer per known title.
    Each {
        #[arg(required = true)]
        titles: Vec<String>,
    },
    /// Integer division.
    Divide { dividend: i32, divisor: i32 },
    /// Slow addition, optionally bounded by a deadline.
    Sum {
        number1: i32,
        number2: i32,
        #[arg(long)]
        deadline_ms: Option<u64>,
    },
}

struct Callers {
    books: BookCaller,
    calculator: CalculatorCaller,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let args = CliArgs::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
        .with_target(false)
        .init();

    let tls = if args.tls {
        let Some(ca) = &args.tls_ca else {
            anyhow::bail!("TLS_ENABLED requires TLS_CA");
        };
        Some(TlsSettings {
            ca_certificate: tokio::fs::read(ca).await?,
            domain: args.tls_domain.clone(),
        })
    } else {
        None
    };

    let channel = connect(args.server_url.clone(), tls).await?;
    tracing::info!(url = %args.server_url, "Connected");
    let mut callers = Callers {
        books: BookCaller::new(channel.clone())
            .with_send_interval(Duration::from_millis(args.send_interval_ms)),
        calculator: CalculatorCaller::new(channel),
    };

    match args.command.unwrap_or(Command::Demo) {
        Command::Demo => demo(&mut callers).await,
        command => run(&mut callers, command).await,
    }

    Ok(())
}

async fn demo(callers: &mut Callers) {
    let scenarios = [
        Command::Book {
            title: "Domain Driven Design".into(),
        },
        Command::Book {
            title: "Unknown".into(),
        },
        Command::Author {
            author: "Joshua Bloch".into(),
        },
        Command::AllBooks {
            title: "Java".into(),
            limit: None,
        },
        Command::AllBooks {
            title: "Java".into(),
            limit: Some(1),
        },
        Command::Titles {
            titles: vec!["Java".into(), "Domain Driven Design".into()],
        },
        Command::Each {
            titles: vec!["Java".into(), "Domain Driven Design".into()],
        },
        Command::Divide {
            dividend: 20,
            divisor: 10,
        },
        Command::Divide {
            dividend: 20,
            divisor: 0,
        },
        Command::Sum {
            number1: 10,
            number2: 20,
            deadline_ms: Some(2_000),
        },
        Command::Sum {
            number1: 10,
            number2: 20,
            deadline_ms: Some(5_000),
        },
    ];

    for scenario in scenarios {
        run(callers, scenario).await;
    }
}

async fn run(callers: &mut Callers, command: Command) {
    let label = format!("{command:?}");
    let outcome = match command {
        Command::Demo => return,
        Command::Book { title } => callers.books.get_book(&title).await.map(|b| json!(b)),
        Command::Author { author } => callers
            .books
            .get_book_by_author(&author)
            .await
            .map(|b| json!(b)),
        Command::AllBooks { title, limit } => {
            let limit = limit.unwrap_or(usize::MAX);
            let mut books = Vec::new();
            let read = callers
                .books
                .get_all_books(&title, |book| {
                    books.push(json!(book));
                    if books.len() >= limit {
                        ControlFlow::Break(())
                    } else {
                        ControlFlow::Continue(())
                    }
                })
                .await;
            read.map(|_| Value::Array(books))
        }
        Command::Titles { titles } => callers
            .books
            .get_books_for_given_titles(titles)
            .await
            .map(|books| json!(books)),
        Command::Each { titles } => callers
            .books
            .get_each_book(titles, |book| {
                tracing::info!(title = %book.title, author = %book.author, "Received");
            })
            .await
            .map(|e| json!({ "sent": e.sent, "received": e.received })),
        Command::Divide { dividend, divisor } => callers
            .calculator
            .divide(dividend, divisor)
            .await
            .map(|r| json!(r)),
        Command::Sum {
            number1,
            number2,
            deadline_ms,
        } => callers
            .calculator
            .sum(number1, number2, deadline_ms.map(Duration::from_millis))
            .await
            .map(|r| json!(r)),
    };

    print_outcome(&label, outcome);
}

fn print_outcome(label: &str, outcome: Result<Value, Error>) {
    let report = match outcome {
        Ok(value) => json!({ "call": label, "status": "OK", "result": value }),
        Err(err) => {
            let status = err.status();
            if !err.is_business() {
                tracing::warn!("{label} failed: {err}");
            }
            json!({ "call": label, "status": status.code.as_str(), "message": status.message })
        }
    };

    match serde_json::to_string_pretty(&report) {
        Ok(text) => println!("{text}"),
        Err(e) => tracing::error!("Failed to render result: {e}"),
    }
}
