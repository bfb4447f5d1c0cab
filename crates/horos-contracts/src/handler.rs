use crate::error::RouterError;
use bytes::Bytes;
use futures::future::BoxFuture;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Result type every handler and every middleware layer agrees on.
pub type HandlerResult = Result<Bytes, RouterError>;

/// Per-call cancellation + deadline context, threaded through the
/// middleware chain and on into the dispatched handler. Mirrors Go's
/// `context.Context` cancellation idiom with `tokio_util::sync::CancellationToken`.
#[derive(Clone)]
pub struct CallContext {
    cancel: CancellationToken,
    service: String,
}

impl CallContext {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            cancel: CancellationToken::new(),
            service: service.into(),
        }
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    /// Returns a child context whose cancellation is independent from the
    /// parent deadline but still observes parent cancellation. Used by the
    /// `Timeout` middleware to derive a deadline-bound child.
    pub fn child(&self) -> Self {
        Self {
            cancel: self.cancel.child_token(),
            service: self.service.clone(),
        }
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub async fn cancelled(&self) {
        self.cancel.cancelled().await;
    }
}

/// A handler: `(ctx, payload) -> (bytes, error)`. Boxed so that local
/// closures, remote-transport handlers, and middleware-wrapped handlers
/// all share one object-safe type.
pub type BoxHandler =
    Arc<dyn Fn(CallContext, Bytes) -> BoxFuture<'static, HandlerResult> + Send + Sync>;

/// Wrap a plain async closure into a `BoxHandler`.
pub fn boxed<F, Fut>(f: F) -> BoxHandler
where
    F: Fn(CallContext, Bytes) -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = HandlerResult> + Send + 'static,
{
    Arc::new(move |ctx, payload| Box::pin(f(ctx, payload)))
}

/// A middleware is a handler-to-handler transformation that preserves the
/// signature. `Chain` composes a list of these left-to-right on the request
/// path (first middleware is outermost).
pub type Middleware = Arc<dyn Fn(BoxHandler) -> BoxHandler + Send + Sync>;

/// Compose middlewares so the first one is outermost: wrapping a base
/// handler applies them left-to-right on the request path and therefore
/// right-to-left on the response path.
pub fn chain(mws: Vec<Middleware>, base: BoxHandler) -> BoxHandler {
    mws.into_iter().rev().fold(base, |inner, mw| mw(inner))
}

/// Optional teardown invoked when a `RemoteEntry`'s fingerprint changes or
/// its route disappears. Async because closing a transport (HTTP pool,
/// QUIC connection) may require awaiting a graceful shutdown.
pub type CloseFn = Box<dyn FnOnce() -> BoxFuture<'static, ()> + Send>;

/// A `TransportFactory` turns `(endpoint, config)` into a handler plus an
/// optional close callback. Implementations should be stateless closures
/// over their own connection pools, registered by strategy name rather than
/// held by direct reference, so the Router never holds a cycle back to
/// whatever owns the factories.
#[async_trait::async_trait]
pub trait TransportFactory: Send + Sync {
    async fn build(
        &self,
        endpoint: Option<&str>,
        config: &serde_json::Value,
    ) -> Result<BuiltTransport, RouterError>;
}

pub struct BuiltTransport {
    pub handler: BoxHandler,
    pub close: Option<CloseFn>,
}
