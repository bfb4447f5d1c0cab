use crate::store::RouteStore;
use bytes::Bytes;
use horos_contracts::{
    BoxHandler, BuiltTransport, CallContext, CloseFn, Fingerprint, RouterError, Strategy,
    TransportFactory,
};
use parking_lot::{Mutex as SyncMutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

/// Owned by the Router. Exactly one per currently-active remote route.
/// `close` is shared behind an `Arc<Mutex<Option<_>>>` so a reload that
/// reuses the entry (fingerprint unchanged) can hand it forward without
/// risking a double-close — whichever reload last drops it runs it once.
#[derive(Clone)]
pub struct RemoteEntry {
    pub handler: BoxHandler,
    close: Arc<SyncMutex<Option<CloseFn>>>,
    fingerprint: Fingerprint,
}

impl RemoteEntry {
    fn new(built: BuiltTransport, fingerprint: Fingerprint) -> Self {
        Self {
            handler: built.handler,
            close: Arc::new(SyncMutex::new(built.close)),
            fingerprint,
        }
    }

    async fn close_once(&self) {
        let maybe_close = self.close.lock().take();
        if let Some(close) = maybe_close {
            close().await;
        }
    }
}

#[derive(Default)]
struct RouterState {
    /// Current strategy per service, including `local`/`noop` which never
    /// get a `RemoteEntry`. Drives the `noop` short-circuit in `Call`.
    strategies: HashMap<String, Strategy>,
    remotes: HashMap<String, RemoteEntry>,
}

/// Per-service dispatch: local / http / mcp / quic / dbsync / noop, with
/// hot reload from a routes table.
pub struct Router {
    state: RwLock<RouterState>,
    locals: RwLock<HashMap<String, BoxHandler>>,
    factories: RwLock<HashMap<Strategy, Arc<dyn TransportFactory>>>,
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

impl Router {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(RouterState::default()),
            locals: RwLock::new(HashMap::new()),
            factories: RwLock::new(HashMap::new()),
        }
    }

    /// Bind an in-process function under `service`. A local handler may
    /// coexist with a remote route for the same service; remote wins when
    /// both exist.
    pub fn register_local(&self, service: impl Into<String>, handler: BoxHandler) {
        self.locals.write().insert(service.into(), handler);
    }

    /// Make `strategy` realizable by `factory`.
    pub fn register_transport(&self, strategy: Strategy, factory: Arc<dyn TransportFactory>) {
        self.factories.write().insert(strategy, factory);
    }

    /// Dispatch `(service, payload)`. Resolution order: `noop` route wins
    /// unconditionally; then a built remote entry; then a local handler;
    /// else `ServiceNotFound`.
    pub async fn call(
        &self,
        ctx: CallContext,
        service: &str,
        payload: Bytes,
    ) -> Result<Bytes, RouterError> {
        let (is_noop, remote) = {
            let state = self.state.read();
            let is_noop = matches!(state.strategies.get(service), Some(Strategy::Noop));
            (is_noop, state.remotes.get(service).cloned())
        };

        if is_noop {
            return Ok(Bytes::new());
        }
        if let Some(entry) = remote {
            return (entry.handler)(ctx, payload).await;
        }
        let local = { self.locals.read().get(service).cloned() };
        if let Some(handler) = local {
            return handler(ctx, payload).await;
        }
        Err(RouterError::ServiceNotFound(service.to_string()))
    }

    /// Read all routes, rebuild only entries whose fingerprint changed,
    /// reuse the rest, then swap the active map atomically. A factory
    /// failure for one route never aborts the whole reload.
    pub async fn reload(&self, store: &dyn RouteStore) -> Result<(), RouterError> {
        let routes = store.list_routes()?;

        let existing: HashMap<String, RemoteEntry> = self.state.read().remotes.clone();

        let mut new_strategies = HashMap::with_capacity(routes.len());
        let mut new_remotes = HashMap::with_capacity(routes.len());

        for route in routes {
            new_strategies.insert(route.service_name.clone(), route.strategy);
            if !route.strategy.needs_factory() {
                continue;
            }
            let fp = route.fingerprint();
            if let Some(old) = existing.get(&route.service_name) {
                if old.fingerprint == fp {
                    new_remotes.insert(route.service_name.clone(), old.clone());
                    continue;
                }
            }

            let factory = { self.factories.read().get(&route.strategy).cloned() };
            let Some(factory) = factory else {
                warn!(
                    service = %route.service_name,
                    strategy = route.strategy.as_str(),
                    "no transport factory registered; service becomes unroutable via remote"
                );
                continue;
            };

            match factory.build(route.endpoint.as_deref(), &route.config).await {
                Ok(built) => {
                    info!(service = %route.service_name, strategy = route.strategy.as_str(), "rebuilt remote handler");
                    new_remotes.insert(route.service_name.clone(), RemoteEntry::new(built, fp));
                }
                Err(e) => {
                    warn!(
                        service = %route.service_name,
                        strategy = route.strategy.as_str(),
                        error = %e,
                        "transport factory failed; route left unroutable via remote"
                    );
                }
            }
        }

        let old_remotes = {
            let mut state = self.state.write();
            let old = std::mem::replace(&mut state.remotes, new_remotes.clone());
            state.strategies = new_strategies;
            old
        };

        // Close every entry that disappeared or whose fingerprint changed.
        // Safe to do after releasing the write lock: this runs exactly
        // once per close cell regardless of whether other reloads raced.
        for (service, old_entry) in old_remotes {
            let still_same = new_remotes
                .get(&service)
                .is_some_and(|new_entry| new_entry.fingerprint == old_entry.fingerprint);
            if !still_same {
                old_entry.close_once().await;
            }
        }

        Ok(())
    }

    /// Snapshot-and-iterate the currently known services (both remote and
    /// local), under a read lock. Returns a finite, non-restartable
    /// sequence reflecting the state at call time.
    pub fn list_services(&self) -> Vec<String> {
        let state = self.state.read();
        let locals = self.locals.read();
        let mut names: std::collections::BTreeSet<String> = state.strategies.keys().cloned().collect();
        names.extend(locals.keys().cloned());
        names.into_iter().collect()
    }

    /// Close every remote entry and clear state.
    pub async fn close(&self) {
        let old_remotes = {
            let mut state = self.state.write();
            state.strategies.clear();
            std::mem::take(&mut state.remotes)
        };
        for (_, entry) in old_remotes {
            entry.close_once().await;
        }
    }
}
