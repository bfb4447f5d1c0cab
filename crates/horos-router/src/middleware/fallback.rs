use horos_contracts::{boxed, BoxHandler, CallContext, Middleware};

/// On remote error — and only if the context is not done — invokes `local`
/// instead of propagating the error. Does not run on context cancellation:
/// if the caller gave up, a stale fallback response would be misleading.
pub fn fallback_middleware(local: BoxHandler, _name: impl Into<String>) -> Middleware {
    std::sync::Arc::new(move |inner| {
        let local = local.clone();
        boxed(move |ctx: CallContext, payload| {
            let inner = inner.clone();
            let local = local.clone();
            async move {
                match inner(ctx.clone(), payload.clone()).await {
                    Ok(v) => Ok(v),
                    Err(e) => {
                        if ctx.is_cancelled() {
                            return Err(e);
                        }
                        local(ctx, payload).await
                    }
                }
            }
        })
    })
}
