use horos_contracts::{boxed, CallContext, Middleware, RouterError};
use std::time::Duration;

/// Derives a child context with the given deadline; callers observe
/// deadline-exceeded even if the handler itself outlives it (the handler
/// keeps running in the background, but the middleware returns immediately
/// with `CallTimeout`).
pub fn timeout_middleware(d: Duration) -> Middleware {
    std::sync::Arc::new(move |inner| {
        boxed(move |ctx: CallContext, payload| {
            let inner = inner.clone();
            async move {
                let service = ctx.service().to_string();
                let child = ctx.child();
                let fut = inner(child.clone(), payload);
                match tokio::time::timeout(d, fut).await {
                    Ok(result) => result,
                    Err(_) => {
                        child.cancel();
                        Err(RouterError::CallTimeout(service))
                    }
                }
            }
        })
    })
}
