use crate::circuit_breaker::CircuitBreaker;
use horos_contracts::{boxed, CallContext, Middleware, RouterError};
use std::sync::Arc;

/// Rejects calls immediately with `CircuitOpen` when the breaker is open;
/// otherwise dispatches and feeds the outcome back into the breaker.
pub fn circuit_breaker_middleware(breaker: Arc<CircuitBreaker>) -> Middleware {
    Arc::new(move |inner| {
        let breaker = breaker.clone();
        boxed(move |ctx: CallContext, payload| {
            let inner = inner.clone();
            let breaker = breaker.clone();
            async move {
                if !breaker.allow() {
                    return Err(RouterError::CircuitOpen(ctx.service().to_string()));
                }
                let result = inner(ctx, payload).await;
                match &result {
                    Ok(_) => breaker.record_success(),
                    Err(_) => breaker.record_failure(),
                }
                result
            }
        })
    })
}
