use crate::cli_args::ServeArgs;
use crate::config::Config;
use horos_dbsync::{FilterSpec, Publisher, StaticTargets, Subscriber, Target as DbSyncTarget};
use horos_contracts::Strategy;
use horos_registry::{Registry, SqliteRegistryStore};
use horos_router::{HttpTransportFactory, Router, SqliteRouteStore};
use horos_vtq::Vtq;
use horos_watch::{reload_fn, DataVersionDetector, Watch, WatchConfig, WatchError};
use parking_lot::Mutex;
use rusqlite::Connection;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

pub async fn run(db_path: &std::path::Path, args: &ServeArgs) -> anyhow::Result<()> {
    let config = Config::load(
        args.config.as_ref(),
        Some(db_path.to_path_buf()),
        args.listen.clone(),
        args.poll_interval_ms,
        args.debounce_ms,
    )?;

    let conn = Arc::new(Mutex::new(Connection::open(&config.db_path)?));
    SqliteRouteStore::migrate(&conn.lock())?;
    horos_registry::store::migrate(&conn.lock())?;
    Vtq::migrate(&conn.lock())?;

    let router = Arc::new(Router::new());
    router.register_transport(Strategy::Http, Arc::new(HttpTransportFactory));
    let route_store = Arc::new(SqliteRouteStore::new(conn.clone()));

    let registry_store: Arc<dyn horos_registry::RegistryStore> = Arc::new(SqliteRegistryStore::new(conn.clone()));
    let registry = Arc::new(Registry::new(registry_store, conn.clone()));

    let _vtq = Vtq::new(conn.clone(), Duration::from_secs(30));

    let publisher = if !args.publish_to.is_empty() {
        let targets = args
            .publish_to
            .iter()
            .enumerate()
            .map(|(i, addr)| DbSyncTarget {
                name: format!("replica-{i}"),
                strategy: "dbsync".to_string(),
                endpoint: addr.parse().expect("valid socket address"),
            })
            .collect();
        let hot_copy_path = std::path::PathBuf::from(format!("{}.hotcopy", config.db_path.display()));
        Some(Arc::new(Publisher::new(
            config.db_path.clone(),
            hot_copy_path,
            FilterSpec::default(),
            Arc::new(StaticTargets(targets)),
        )?))
    } else {
        None
    };

    let _subscriber = match &config.listen {
        Some(addr) => {
            let addr = addr.parse()?;
            let subscriber = Arc::new(Subscriber::new(config.db_path.clone(), 512 * 1024 * 1024, None));
            let cert = rcgen::generate_simple_self_signed(vec!["horos-dbsync".to_string()])?;
            let cert_der = cert.serialize_der()?;
            let key_der = cert.serialize_private_key_der();
            let sub = subscriber.clone();
            tokio::spawn(async move {
                if let Err(e) = sub.start(addr, cert_der, key_der).await {
                    error!(error = %e, "dbsync subscriber exited");
                }
            });
            Some(subscriber)
        }
        None => None,
    };

    let watch = Arc::new(Watch::new(WatchConfig { interval: config.poll_interval(), debounce: config.debounce() }));
    let cancel = CancellationToken::new();

    let reload = {
        let router = router.clone();
        let route_store = route_store.clone();
        let registry = registry.clone();
        let publisher = publisher.clone();
        reload_fn(move || {
            let router = router.clone();
            let route_store = route_store.clone();
            let registry = registry.clone();
            let publisher = publisher.clone();
            async move {
                router.reload(route_store.as_ref()).await.map_err(|e| WatchError::Reload(e.to_string()))?;
                registry.load_tools().map_err(|e| WatchError::Reload(e.to_string()))?;
                if let Some(publisher) = &publisher {
                    publisher.publish().await.map_err(|e| WatchError::Reload(e.to_string()))?;
                }
                Ok(())
            }
        })
    };

    let detector = DataVersionDetector::new(conn.clone());
    let watch_task = {
        let watch = watch.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move {
            watch.on_change(detector, reload, cancel).await;
        })
    };

    info!(db = %config.db_path.display(), "horos serving; press Ctrl+C to stop");
    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");
    cancel.cancel();
    let _ = watch_task.await;
    router.close().await;
    Ok(())
}
