use horos_contracts::{boxed, BuiltTransport, CallContext, RouterError, TransportFactory};
use once_cell::sync::Lazy;
use reqwest::Client;
use serde::Deserialize;
use std::net::{IpAddr, ToSocketAddrs};
use std::time::Duration;

static CLIENT: Lazy<Client> = Lazy::new(Client::new);

#[derive(Debug, Deserialize)]
struct HttpConfig {
    timeout_ms: u64,
    content_type: String,
    #[serde(default)]
    whitelisted: bool,
}

/// Dispatches a call as a single HTTP POST of the call's raw payload to
/// `endpoint`, with a per-call timeout and the configured content type.
pub struct HttpTransportFactory;

#[async_trait::async_trait]
impl TransportFactory for HttpTransportFactory {
    async fn build(
        &self,
        endpoint: Option<&str>,
        config: &serde_json::Value,
    ) -> Result<BuiltTransport, RouterError> {
        let endpoint = endpoint
            .ok_or_else(|| factory_failed("http", None, "http strategy requires an endpoint"))?
            .to_string();
        let cfg: HttpConfig = serde_json::from_value(config.clone())
            .map_err(|e| factory_failed("http", Some(&endpoint), &e.to_string()))?;

        check_ssrf(&endpoint, cfg.whitelisted)
            .map_err(|e| factory_failed("http", Some(&endpoint), &e))?;

        let timeout = Duration::from_millis(cfg.timeout_ms);
        let content_type = cfg.content_type.clone();

        let handler = boxed(move |_ctx: CallContext, payload| {
            let endpoint = endpoint.clone();
            let content_type = content_type.clone();
            async move {
                let resp = CLIENT
                    .post(endpoint.as_str())
                    .header("content-type", content_type)
                    .timeout(timeout)
                    .body(payload.to_vec())
                    .send()
                    .await
                    .map_err(|e| RouterError::Transport(e.to_string()))?;

                let resp = resp
                    .error_for_status()
                    .map_err(|e| RouterError::Transport(e.to_string()))?;

                let bytes = resp
                    .bytes()
                    .await
                    .map_err(|e| RouterError::Transport(e.to_string()))?;

                Ok(bytes)
            }
        });

        Ok(BuiltTransport { handler, close: None })
    }
}

fn factory_failed(strategy: &str, endpoint: Option<&str>, cause: &str) -> RouterError {
    RouterError::FactoryFailed {
        service: String::new(),
        strategy: strategy.to_string(),
        endpoint: endpoint.map(str::to_string),
        cause: cause.to_string(),
    }
}

/// Rejects endpoints that resolve to a loopback or RFC1918 address unless
/// `whitelisted` is set on the route's config.
fn check_ssrf(endpoint: &str, whitelisted: bool) -> Result<(), String> {
    if whitelisted {
        return Ok(());
    }
    let url = url::Url::parse(endpoint).map_err(|e| e.to_string())?;
    let host = url.host_str().ok_or_else(|| "endpoint has no host".to_string())?;
    let port = url.port_or_known_default().unwrap_or(443);

    let addrs = (host, port)
        .to_socket_addrs()
        .map_err(|e| format!("could not resolve '{host}': {e}"))?;

    for addr in addrs {
        if is_disallowed(addr.ip()) {
            return Err(format!("endpoint '{host}' resolves to disallowed address {}", addr.ip()));
        }
    }
    Ok(())
}

fn is_disallowed(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => v4.is_loopback() || v4.is_private() || v4.is_link_local(),
        IpAddr::V6(v6) => v6.is_loopback(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loopback_is_disallowed() {
        assert!(check_ssrf("http://127.0.0.1:8080/x", false).is_err());
    }

    #[test]
    fn private_range_is_disallowed() {
        assert!(check_ssrf("http://10.0.0.5:8080/x", false).is_err());
    }

    #[test]
    fn whitelisted_skips_the_check() {
        assert!(check_ssrf("http://127.0.0.1:8080/x", true).is_ok());
    }
}
