use crate::store::RouteStore;
use crate::Router;
use bytes::Bytes;
use horos_contracts::{boxed, BoxHandler, BuiltTransport, CallContext, Route, RouterError, Strategy, TransportFactory};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

struct FakeStore {
    routes: Mutex<Vec<Route>>,
}

impl FakeStore {
    fn new(routes: Vec<Route>) -> Self {
        Self {
            routes: Mutex::new(routes),
        }
    }

    fn set(&self, routes: Vec<Route>) {
        *self.routes.lock() = routes;
    }
}

impl RouteStore for FakeStore {
    fn list_routes(&self) -> Result<Vec<Route>, RouterError> {
        Ok(self.routes.lock().clone())
    }
}

fn route(service: &str, strategy: Strategy, endpoint: Option<&str>, config: serde_json::Value) -> Route {
    Route {
        service_name: service.to_string(),
        strategy,
        endpoint: endpoint.map(|s| s.to_string()),
        config,
        updated_at: 0,
    }
}

fn echo_handler(prefix: &'static str) -> BoxHandler {
    boxed(move |_ctx: CallContext, payload: Bytes| async move {
        let mut out = prefix.as_bytes().to_vec();
        out.extend_from_slice(&payload);
        Ok(Bytes::from(out))
    })
}

struct CountingFactory {
    calls: Arc<AtomicUsize>,
    closes: Arc<AtomicUsize>,
}

#[async_trait::async_trait]
impl TransportFactory for CountingFactory {
    async fn build(
        &self,
        _endpoint: Option<&str>,
        _config: &serde_json::Value,
    ) -> Result<BuiltTransport, RouterError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let closes = self.closes.clone();
        Ok(BuiltTransport {
            handler: boxed(|_ctx, payload| async move { Ok(payload) }),
            close: Some(Box::new(move || {
                Box::pin(async move {
                    closes.fetch_add(1, Ordering::SeqCst);
                })
            })),
        })
    }
}

#[tokio::test]
async fn scenario_switch_service_to_noop_with_zero_downtime() {
    let router = Router::new();
    router.register_local(
        "billing",
        boxed(|_ctx, payload: Bytes| async move {
            let mut out = b"billed:".to_vec();
            out.extend_from_slice(&payload);
            Ok(Bytes::from(out))
        }),
    );

    let store = FakeStore::new(vec![route("billing", Strategy::Local, None, serde_json::json!({}))]);
    router.reload(&store).await.unwrap();

    let resp = router
        .call(CallContext::new("billing"), "billing", Bytes::from_static(b"$100"))
        .await
        .unwrap();
    assert_eq!(resp, Bytes::from_static(b"billed:$100"));

    store.set(vec![route("billing", Strategy::Noop, None, serde_json::json!({}))]);
    router.reload(&store).await.unwrap();

    let resp = router
        .call(CallContext::new("billing"), "billing", Bytes::from_static(b"$200"))
        .await
        .unwrap();
    assert_eq!(resp, Bytes::new());
}

#[tokio::test]
async fn scenario_fingerprint_dedup_and_single_close() {
    let calls = Arc::new(AtomicUsize::new(0));
    let closes = Arc::new(AtomicUsize::new(0));
    let factory: Arc<dyn TransportFactory> = Arc::new(CountingFactory {
        calls: calls.clone(),
        closes: closes.clone(),
    });

    let router = Router::new();
    router.register_transport(Strategy::Http, factory);

    let store = FakeStore::new(vec![route(
        "svc",
        Strategy::Http,
        Some("http://10.0.0.1"),
        serde_json::json!({}),
    )]);
    router.reload(&store).await.unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    // Identical row: reload is a no-op (fingerprint unchanged).
    router.reload(&store).await.unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(closes.load(Ordering::SeqCst), 0);

    // Endpoint changed: rebuild, and the previous entry's close runs exactly once.
    store.set(vec![route(
        "svc",
        Strategy::Http,
        Some("http://10.0.0.2"),
        serde_json::json!({}),
    )]);
    router.reload(&store).await.unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(closes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn remote_wins_over_local_when_both_exist() {
    let calls = Arc::new(AtomicUsize::new(0));
    let closes = Arc::new(AtomicUsize::new(0));
    let factory: Arc<dyn TransportFactory> = Arc::new(CountingFactory { calls, closes });

    let router = Router::new();
    router.register_transport(Strategy::Http, factory);
    router.register_local("svc", echo_handler("local:"));

    let store = FakeStore::new(vec![route(
        "svc",
        Strategy::Http,
        Some("http://example"),
        serde_json::json!({}),
    )]);
    router.reload(&store).await.unwrap();

    let resp = router
        .call(CallContext::new("svc"), "svc", Bytes::from_static(b"payload"))
        .await
        .unwrap();
    // The counting factory's handler is a pure echo (no "local:" prefix).
    assert_eq!(resp, Bytes::from_static(b"payload"));
}

#[tokio::test]
async fn unknown_service_is_not_found() {
    let router = Router::new();
    let err = router
        .call(CallContext::new("ghost"), "ghost", Bytes::new())
        .await
        .unwrap_err();
    assert!(matches!(err, RouterError::ServiceNotFound(ref s) if s == "ghost"));
}

#[tokio::test]
async fn factory_failure_isolates_one_route() {
    struct FlakyFactory;
    #[async_trait::async_trait]
    impl TransportFactory for FlakyFactory {
        async fn build(
            &self,
            _endpoint: Option<&str>,
            _config: &serde_json::Value,
        ) -> Result<BuiltTransport, RouterError> {
            Err(RouterError::FactoryFailed {
                service: "bad".into(),
                strategy: "http".into(),
                endpoint: None,
                cause: "boom".into(),
            })
        }
    }

    let router = Router::new();
    router.register_transport(Strategy::Http, Arc::new(FlakyFactory));
    router.register_local("good", echo_handler(""));

    let store = FakeStore::new(vec![
        route("bad", Strategy::Http, None, serde_json::json!({})),
        route("good", Strategy::Local, None, serde_json::json!({})),
    ]);

    // Reload itself succeeds even though the "bad" factory call fails.
    router.reload(&store).await.unwrap();

    let err = router
        .call(CallContext::new("bad"), "bad", Bytes::new())
        .await
        .unwrap_err();
    assert!(matches!(err, RouterError::ServiceNotFound(_)));

    let resp = router
        .call(CallContext::new("good"), "good", Bytes::from_static(b"x"))
        .await
        .unwrap();
    assert_eq!(resp, Bytes::from_static(b"x"));
}

#[tokio::test]
async fn middleware_chain_applies_left_to_right_on_request_path() {
    let order: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(Vec::new()));

    let o1 = order.clone();
    let mw_a: horos_contracts::Middleware = Arc::new(move |inner| {
        let o = o1.clone();
        boxed(move |ctx, payload| {
            let inner = inner.clone();
            let o = o.clone();
            async move {
                o.lock().push("a-before");
                let r = inner(ctx, payload).await;
                o.lock().push("a-after");
                r
            }
        })
    });

    let o2 = order.clone();
    let mw_b: horos_contracts::Middleware = Arc::new(move |inner| {
        let o = o2.clone();
        boxed(move |ctx, payload| {
            let inner = inner.clone();
            let o = o.clone();
            async move {
                o.lock().push("b-before");
                let r = inner(ctx, payload).await;
                o.lock().push("b-after");
                r
            }
        })
    });

    let base = echo_handler("");
    let wrapped = horos_contracts::chain(vec![mw_a, mw_b], base);
    let _ = wrapped(CallContext::new("svc"), Bytes::new()).await.unwrap();

    let observed = order.lock().clone();
    assert_eq!(observed, vec!["a-before", "b-before", "b-after", "a-after"]);
}
