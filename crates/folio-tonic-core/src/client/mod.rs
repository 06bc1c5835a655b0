//! Caller-side orchestration of the four call patterns.
//!
//! The generated tonic clients only move messages. The callers in this module
//! add what a well-behaved client needs on top:
//!
//! - [`BookCaller`] - unary lookups, early-exit consumption of a server
//!   stream, client streaming with an explicit "done sending", and the
//!   bidirectional exchange with independent send and receive tasks.
//! - [`CalculatorCaller`] - unary arithmetic, including a deadline-bound call.
//!
//! Every method returns [`crate::Result`]; use [`crate::Error::is_business`]
//! to tell contract outcomes (not found, invalid operand, deadline) from
//! transport faults.

mod book;
mod compute;

pub use book::{BookCaller, Exchange};
pub use compute::CalculatorCaller;

use crate::common::{error::Result, stream::Outbound};
use core::time::Duration;
use tonic::transport::{Certificate, Channel, ClientTlsConfig, Endpoint};

/// TLS settings for a client connection.
#[derive(Clone, Debug)]
pub struct TlsSettings {
    /// PEM-encoded certificate authority used to verify the server.
    pub ca_certificate: Vec<u8>,
    /// Name to verify the server certificate against, when it differs from
    /// the host in the URL.
    pub domain: Option<String>,
}

/// Opens a channel to `url` (e.g. `http://127.0.0.1:8989`), over TLS when
/// `tls` is given.
///
/// # Errors
///
/// Returns [`crate::Error::Transport`] if the URL is invalid, the TLS
/// configuration is rejected or the connection cannot be established.
pub async fn connect(url: impl Into<String>, tls: Option<TlsSettings>) -> Result<Channel> {
    let mut endpoint = Endpoint::from_shared(url.into())?;

    if let Some(tls) = tls {
        let mut config =
            ClientTlsConfig::new().ca_certificate(Certificate::from_pem(tls.ca_certificate));
        if let Some(domain) = tls.domain {
            config = config.domain_name(domain);
        }
        endpoint = endpoint.tls_config(config)?;
    }

    Ok(endpoint.connect().await?)
}

/// Sends every message in order, pausing `interval` between two sends, then
/// signals "done sending". Returns the number of messages sent.
async fn send_all<T, I>(mut outbound: Outbound<T>, messages: I, interval: Duration) -> Result<usize>
where
    I: IntoIterator<Item = T>,
{
    for (i, message) in messages.into_iter().enumerate() {
        if i > 0 && !interval.is_zero() {
            tokio::time::sleep(interval).await;
        }
        outbound.send(message).await?;
    }
    Ok(outbound.finish())
}
