use horos_contracts::{boxed, CallContext, Middleware, RouterError};
use tracing::error;

/// Catches a panic in the wrapped handler and converts it into a typed
/// `RouterError::Panic`, logging the panic payload. Panics are isolated by
/// running the handler on its own task so a handler panic cannot unwind
/// through the caller's stack.
pub fn recovery_middleware() -> Middleware {
    std::sync::Arc::new(|inner| {
        boxed(move |ctx: CallContext, payload| {
            let inner = inner.clone();
            async move {
                let service = ctx.service().to_string();
                let fut = inner(ctx, payload);
                match tokio::spawn(fut).await {
                    Ok(result) => result,
                    Err(join_err) => {
                        let msg = if join_err.is_panic() {
                            let payload = join_err.into_panic();
                            if let Some(s) = payload.downcast_ref::<&str>() {
                                s.to_string()
                            } else if let Some(s) = payload.downcast_ref::<String>() {
                                s.clone()
                            } else {
                                "handler panicked".to_string()
                            }
                        } else {
                            "handler task cancelled".to_string()
                        };
                        error!(service = %service, panic = %msg, "recovered from handler panic");
                        Err(RouterError::Panic(service, msg))
                    }
                }
            }
        })
    })
}
