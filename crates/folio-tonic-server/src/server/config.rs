use anyhow::bail;
use clap::Parser;
use core::time::Duration;
use folio_tonic_core::types::{DEFAULT_PORT, DEFAULT_STREAM_BUFFER, DEFAULT_SUM_UNIT};
use std::path::PathBuf;

/// Runtime configuration for the `folio-tonic-server` binary.
///
/// All values are parsed from CLI arguments or environment variables (a `.env`
/// file is honoured), with defaults that reproduce the pacing of the reference
/// deployment: one streamed record per second and a three-second `Sum`.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "folio-tonic-server",
    version,
    about = "A gRPC service for book lookups and arithmetic in every call pattern"
)]
pub struct CliArgs {
    /// Address to listen on (TCP or Unix socket path; use --uds for Unix socket).
    ///
    /// Example: "0.0.0.0:8989" or "/tmp/folio.sock"
    ///
    /// Environment variable: `SERVER_ADDR`
    #[arg(long, env = "SERVER_ADDR", default_value_t = format!("0.0.0.0:{DEFAULT_PORT}"))]
    pub server_addr: String,

    /// Listen on a Unix socket instead of TCP. If set, `SERVER_ADDR` must be a file path.
    #[arg(short, long, default_value_t = false)]
    pub uds: bool,

    /// Capacity of the channel between a streaming handler and its gRPC
    /// response body.
    ///
    /// Lower values make backpressure kick in sooner; higher values let a
    /// producer run further ahead of a slow reader.
    ///
    /// Environment variable: `STREAM_BUFFER_SIZE`
    #[arg(long, env = "STREAM_BUFFER_SIZE", default_value_t = DEFAULT_STREAM_BUFFER)]
    pub stream_buffer_size: usize,

    /// Pause, in milliseconds, between two records of a `GetAllBooks` stream.
    ///
    /// Environment variable: `STREAM_INTERVAL_MS`
    #[arg(long, env = "STREAM_INTERVAL_MS", default_value_t = 1_000)]
    pub stream_interval_ms: u64,

    /// Cost, in milliseconds, of one simulated unit of work in `Sum`.
    ///
    /// Environment variable: `SUM_UNIT_MS`
    #[arg(long, env = "SUM_UNIT_MS", default_value_t = DEFAULT_SUM_UNIT.as_millis() as u64)]
    pub sum_unit_ms: u64,

    /// Seconds to wait for in-flight calls to drain on shutdown before they
    /// are cancelled.
    ///
    /// Environment variable: `SHUTDOWN_TIMEOUT`
    #[arg(long, env = "SHUTDOWN_TIMEOUT", default_value_t = 3)]
    pub shutdown_timeout: u64,

    /// Serve over TLS. Requires `--tls-cert` and `--tls-key`.
    ///
    /// Environment variable: `TLS_ENABLED`
    #[arg(long, env = "TLS_ENABLED", default_value_t = false)]
    pub tls: bool,

    /// PEM certificate chain presented to clients.
    ///
    /// Environment variable: `TLS_CERT`
    #[arg(long, env = "TLS_CERT")]
    pub tls_cert: Option<PathBuf>,

    /// PEM private key matching `--tls-cert`.
    ///
    /// Environment variable: `TLS_KEY`
    #[arg(long, env = "TLS_KEY")]
    pub tls_key: Option<PathBuf>,
}

/// Certificate and key locations for a TLS listener.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsPaths {
    pub cert: PathBuf,
    pub key: PathBuf,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub server_addr: String,
    pub uds: bool,
    pub stream_buffer_size: usize,
    pub stream_interval: Duration,
    pub sum_unit: Duration,
    pub shutdown_timeout: Duration,
    pub tls: Option<TlsPaths>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            server_addr: format!("0.0.0.0:{DEFAULT_PORT}"),
            uds: false,
            stream_buffer_size: DEFAULT_STREAM_BUFFER,
            stream_interval: Duration::from_secs(1),
            sum_unit: DEFAULT_SUM_UNIT,
            shutdown_timeout: Duration::from_secs(3),
            tls: None,
        }
    }
}

impl TryFrom<CliArgs> for ServerConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        if args.stream_buffer_size == 0 {
            bail!("STREAM_BUFFER_SIZE must be greater than 0");
        }

        if args.sum_unit_ms == 0 {
            bail!("SUM_UNIT_MS must be greater than 0");
        }

        let tls = match (args.tls, args.tls_cert, args.tls_key) {
            (false, _, _) => None,
            (true, Some(cert), Some(key)) => Some(TlsPaths { cert, key }),
            (true, cert, key) => bail!(
                "TLS_ENABLED requires both TLS_CERT and TLS_KEY (cert set: {}, key set: {})",
                cert.is_some(),
                key.is_some()
            ),
        };

        Ok(Self {
            server_addr: args.server_addr,
            uds: args.uds,
            stream_buffer_size: args.stream_buffer_size,
            stream_interval: Duration::from_millis(args.stream_interval_ms),
            sum_unit: Duration::from_millis(args.sum_unit_ms),
            shutdown_timeout: Duration::from_secs(args.shutdown_timeout),
            tls,
        })
    }
}
