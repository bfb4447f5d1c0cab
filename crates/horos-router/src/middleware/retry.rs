use horos_contracts::{boxed, CallContext, Middleware, RouterError};
use std::time::Duration;

/// On error, sleeps `base_backoff * 2^attempt` then retries, up to `max`
/// times. Never retries when the context is done or the error is
/// `CircuitOpen`. Returns the last error on exhaustion.
pub fn retry_middleware(max: u32, base_backoff: Duration) -> Middleware {
    std::sync::Arc::new(move |inner| {
        boxed(move |ctx: CallContext, payload| {
            let inner = inner.clone();
            async move {
                let mut attempt = 0u32;
                loop {
                    let result = inner(ctx.clone(), payload.clone()).await;
                    match result {
                        Ok(v) => return Ok(v),
                        Err(e) => {
                            if ctx.is_cancelled() || e.is_circuit_open() || attempt >= max {
                                return Err(e);
                            }
                            let backoff = base_backoff * 2u32.pow(attempt);
                            tokio::select! {
                                _ = tokio::time::sleep(backoff) => {}
                                _ = ctx.cancelled() => return Err(RouterError::Cancelled(ctx.service().to_string())),
                            }
                            attempt += 1;
                        }
                    }
                }
            }
        })
    })
}
