use horos_contracts::{boxed, CallContext, Middleware};
use std::time::Instant;
use tracing::info;

/// Structured log with duration, payload size, and error on every call.
pub fn logging_middleware() -> Middleware {
    std::sync::Arc::new(|inner| {
        boxed(move |ctx: CallContext, payload| {
            let inner = inner.clone();
            async move {
                let service = ctx.service().to_string();
                let size = payload.len();
                let started = Instant::now();
                let result = inner(ctx, payload).await;
                let elapsed = started.elapsed();
                match &result {
                    Ok(out) => info!(
                        service = %service,
                        request_bytes = size,
                        response_bytes = out.len(),
                        duration_ms = elapsed.as_millis() as u64,
                        "call ok"
                    ),
                    Err(e) => info!(
                        service = %service,
                        request_bytes = size,
                        duration_ms = elapsed.as_millis() as u64,
                        error = %e,
                        "call failed"
                    ),
                }
                result
            }
        })
    })
}
