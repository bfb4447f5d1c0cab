use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Operational knobs shared by `serve`. Layered the way `worker`/`cli`
/// load theirs: an optional TOML file, overridden by environment
/// variables (`HOROS_*`), overridden by explicit CLI flags.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub db_path: PathBuf,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    #[serde(default)]
    pub listen: Option<String>,
    #[serde(default)]
    pub publish_to: Vec<String>,
}

fn default_poll_interval_ms() -> u64 {
    200
}

fn default_debounce_ms() -> u64 {
    200
}

impl Config {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    /// Load a TOML file if present, then apply `HOROS_*` environment
    /// overrides, then the explicit CLI overrides passed in.
    pub fn load(
        file: Option<&PathBuf>,
        db_path_override: Option<PathBuf>,
        listen_override: Option<String>,
        poll_interval_ms_override: Option<u64>,
        debounce_ms_override: Option<u64>,
    ) -> anyhow::Result<Self> {
        let mut config = match file {
            Some(path) => {
                let text = std::fs::read_to_string(path)?;
                toml::from_str(&text)?
            }
            None => Config {
                db_path: PathBuf::from("horos.db"),
                poll_interval_ms: default_poll_interval_ms(),
                debounce_ms: default_debounce_ms(),
                listen: None,
                publish_to: Vec::new(),
            },
        };

        if let Ok(db) = std::env::var("HOROS_DB_PATH") {
            config.db_path = PathBuf::from(db);
        }
        if let Ok(poll_ms) = std::env::var("HOROS_POLL_INTERVAL_MS") {
            config.poll_interval_ms = poll_ms.parse()?;
        }
        if let Ok(listen) = std::env::var("HOROS_LISTEN") {
            config.listen = Some(listen);
        }

        if let Some(db_path) = db_path_override {
            config.db_path = db_path;
        }
        if let Some(listen) = listen_override {
            config.listen = Some(listen);
        }
        if let Some(poll_interval_ms) = poll_interval_ms_override {
            config.poll_interval_ms = poll_interval_ms;
        }
        if let Some(debounce_ms) = debounce_ms_override {
            config.debounce_ms = debounce_ms;
        }

        Ok(config)
    }
}
