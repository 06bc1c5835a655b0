use crate::{
    common::error::{Error, Result},
    proto::compute::{DivideRequest, SumRequest, calculator_api_client::CalculatorApiClient},
};
use core::time::Duration;
use tonic::{Request, transport::Channel};

/// Client for the `compute.CalculatorApi` service.
#[derive(Clone, Debug)]
pub struct CalculatorCaller {
    inner: CalculatorApiClient<Channel>,
}

impl CalculatorCaller {
    pub fn new(channel: Channel) -> Self {
        Self {
            inner: CalculatorApiClient::new(channel),
        }
    }

    /// # Errors
    ///
    /// [`Error::InvalidRequest`] when `divisor` is zero.
    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self)))]
    pub async fn divide(&mut self, dividend: i32, divisor: i32) -> Result<f64> {
        let response = self
            .inner
            .divide(DivideRequest { dividend, divisor })
            .await?
            .into_inner();
        Ok(response.result)
    }

    /// Adds two numbers, optionally bounded by a deadline.
    ///
    /// The deadline is sent to the server as `grpc-timeout` and also enforced
    /// locally: once it elapses the call is dropped, which cancels it on the
    /// server, and [`Error::DeadlineExceeded`] is returned without waiting for
    /// the server to notice.
    ///
    /// # Errors
    ///
    /// [`Error::DeadlineExceeded`] or [`Error::RequestCancelled`] when the
    /// deadline cuts the computation short.
    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self)))]
    pub async fn sum(&mut self, number1: i32, number2: i32, deadline: Option<Duration>) -> Result<i32> {
        let mut request = Request::new(SumRequest { number1, number2 });

        let response = match deadline {
            Some(deadline) => {
                request.set_timeout(deadline);
                tokio::time::timeout(deadline, self.inner.sum(request))
                    .await
                    .map_err(|_| Error::DeadlineExceeded)??
            }
            None => self.inner.sum(request).await?,
        };

        Ok(response.into_inner().result)
    }
}
