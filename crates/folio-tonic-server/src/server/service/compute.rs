//! `compute.CalculatorApi`: integer division and a deliberately slow sum.

use crate::server::lifecycle::CallTracker;
use core::time::Duration;
use folio_tonic_core::{
    Error, Result,
    deadline::CallContext,
    proto::compute::{
        DivideRequest, DivideResponse, SumRequest, SumResponse, calculator_api_server::CalculatorApi,
    },
    types::CallPattern,
};
use std::sync::Arc;
use tonic::{Request, Response, Status};

#[derive(Clone)]
pub struct CalculatorService {
    sum_unit: Duration,
    tracker: Arc<CallTracker>,
}

impl CalculatorService {
    pub const fn new(sum_unit: Duration, tracker: Arc<CallTracker>) -> Self {
        Self { sum_unit, tracker }
    }
}

/// Truncating integer division.
///
/// # Errors
///
/// [`Error::InvalidRequest`] for a zero divisor, or for `i32::MIN / -1`,
/// which does not fit the operand type.
pub fn quotient(dividend: i32, divisor: i32) -> Result<i32> {
    if divisor == 0 {
        return Err(Error::invalid(format!("Received an invalid number: {divisor}")));
    }
    dividend
        .checked_div(divisor)
        .ok_or_else(|| Error::invalid(format!("{dividend} / {divisor} overflows")))
}

/// Adds `operands` one unit of work at a time: one unit per operand, then one
/// to combine the partial result.
///
/// Every unit is a suspension point that honours the context's deadline and
/// cancellation, so the computation stops as soon as either fires.
///
/// # Errors
///
/// - [`Error::DeadlineExceeded`] / [`Error::RequestCancelled`] from `ctx`.
/// - [`Error::InvalidRequest`] if the sum does not fit in an `i32`.
pub async fn sum_in_steps(ctx: &CallContext, operands: &[i32], unit: Duration) -> Result<i32> {
    let mut total: i32 = 0;
    for &operand in operands {
        ctx.pause(unit).await?;
        total = total
            .checked_add(operand)
            .ok_or_else(|| Error::invalid(format!("Sum of {operands:?} overflows")))?;
    }
    ctx.pause(unit).await?;
    ctx.checkpoint()?;
    Ok(total)
}

#[tonic::async_trait]
impl CalculatorApi for CalculatorService {
    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all))]
    async fn divide(
        &self,
        req: Request<DivideRequest>,
    ) -> core::result::Result<Response<DivideResponse>, Status> {
        let call = self.tracker.begin(CallPattern::Unary, "Divide")?;
        let DivideRequest { dividend, divisor } = req.into_inner();

        match quotient(dividend, divisor) {
            Ok(q) => Ok(Response::new(DivideResponse {
                result: f64::from(q),
            })),
            Err(e) => Err(call.fail(e)),
        }
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all))]
    async fn sum(
        &self,
        req: Request<SumRequest>,
    ) -> core::result::Result<Response<SumResponse>, Status> {
        let call = self.tracker.begin(CallPattern::Unary, "Sum")?;
        let ctx = call.context(req.metadata());
        #[cfg(feature = "tracing")]
        tracing::debug!(remaining = ?ctx.remaining(), "Starting sum");
        let SumRequest { number1, number2 } = req.into_inner();

        match sum_in_steps(&ctx, &[number1, number2], self.sum_unit).await {
            Ok(result) => Ok(Response::new(SumResponse { result })),
            Err(e) => Err(call.fail(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_util::sync::CancellationToken;

    #[test]
    fn divide_truncates() {
        assert_eq!(quotient(20, 10), Ok(2));
        assert_eq!(quotient(7, 2), Ok(3));
        assert_eq!(quotient(-7, 2), Ok(-3));
    }

    #[test]
    fn divide_rejects_zero_and_overflow() {
        assert_eq!(
            quotient(5, 0),
            Err(Error::invalid("Received an invalid number: 0"))
        );
        assert!(matches!(
            quotient(i32::MIN, -1),
            Err(Error::InvalidRequest { .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn sum_completes_within_a_generous_deadline() {
        let ctx = CallContext::with_timeout(Duration::from_secs(5), CancellationToken::new());
        let total = sum_in_steps(&ctx, &[10, 20], Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(total, 30);
    }

    #[tokio::test(start_paused = true)]
    async fn sum_stops_at_the_deadline() {
        let ctx = CallContext::with_timeout(Duration::from_secs(2), CancellationToken::new());
        let started = tokio::time::Instant::now();
        let err = sum_in_steps(&ctx, &[10, 20], Duration::from_secs(1))
            .await
            .unwrap_err();
        assert_eq!(err, Error::DeadlineExceeded);
        assert!(started.elapsed() <= Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn sum_stops_when_cancelled() {
        let token = CancellationToken::new();
        let ctx = CallContext::new(None, token.clone());
        let canceller = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(1_500)).await;
            token.cancel();
        });
        let err = sum_in_steps(&ctx, &[10, 20], Duration::from_secs(1))
            .await
            .unwrap_err();
        assert_eq!(err, Error::RequestCancelled);
        canceller.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn sum_rejects_overflow() {
        let ctx = CallContext::new(None, CancellationToken::new());
        let err = sum_in_steps(&ctx, &[i32::MAX, 1], Duration::from_millis(1))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidRequest { .. }));
    }
}
