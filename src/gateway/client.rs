//! Production gateway client over the vendor's REST API.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, RETRY_AFTER};
use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use super::{GatewayApi, RemoteList, RemoteRule, RulePayload};
use crate::config::GatewayConfig;
use crate::error::GatewayError;

const API_BASE: &str = "https://api.cloudflare.com/client/v4";
const TIMEOUT_SECS: u64 = 30;
const MAX_RETRIES: u32 = 3;
const BACKOFF_BASE_MS: u64 = 500;

/// Fallback wait when a 429 response carries no Retry-After header.
const DEFAULT_RETRY_AFTER_SECS: u64 = 5;

/// Bound on consecutive 429 waits per request. Rate-limit waits do not
/// consume the generic backoff schedule, but they must still terminate.
const MAX_RATE_LIMIT_WAITS: u32 = 10;

/// Resilient HTTP client for the gateway account API.
///
/// Every call is capped by a shared semaphore so the whole process never
/// exceeds the configured number of outstanding requests.
pub struct GatewayClient {
    http: Client,
    base_url: String,
    dry_run: bool,
    semaphore: Semaphore,
    max_list_size: usize,
    dry_run_ids: AtomicUsize,
}

impl GatewayClient {
    /// Build a client from the gateway configuration.
    ///
    /// In dry-run mode every mutating call is short-circuited with a
    /// synthetic success so callers exercise identical control flow.
    pub fn new(config: &GatewayConfig, dry_run: bool) -> anyhow::Result<Self> {
        let account_id = config.get_account_id();
        if account_id.is_empty() {
            anyhow::bail!(
                "Gateway account id is not set (config gateway.account_id or GATEWARDEN_ACCOUNT_ID)"
            );
        }
        let token = config.get_token();
        if token.is_empty() {
            anyhow::bail!(
                "Gateway API token is not set (config gateway.api_token or GATEWARDEN_API_TOKEN)"
            );
        }

        let mut headers = HeaderMap::new();
        let mut auth = HeaderValue::from_str(&format!("Bearer {}", token.as_str()))
            .map_err(|_| anyhow::anyhow!("API token contains invalid header characters"))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);

        let http = Client::builder()
            .timeout(Duration::from_secs(TIMEOUT_SECS))
            .user_agent(format!("gatewarden/{}", env!("CARGO_PKG_VERSION")))
            .default_headers(headers)
            .build()?;

        Ok(Self {
            http,
            base_url: format!("{API_BASE}/accounts/{account_id}/gateway"),
            dry_run,
            semaphore: Semaphore::new(config.concurrency),
            max_list_size: config.max_list_size,
            dry_run_ids: AtomicUsize::new(0),
        })
    }

    /// Override the API base URL (used by tests against a local server).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Issue one request through the retry/backoff/rate-limit machinery
    /// and return the `result` field of the response envelope.
    async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<Value, GatewayError> {
        // Panics only if the semaphore is closed, which never happens here.
        let _permit = self
            .semaphore
            .acquire()
            .await
            .expect("gateway semaphore closed");

        let mut attempt: u32 = 0;
        let mut rate_limit_waits: u32 = 0;

        loop {
            match self.send_once(method.clone(), path, body).await {
                Ok(result) => return Ok(result),
                Err(GatewayError::RateLimited { retry_after_secs }) => {
                    rate_limit_waits += 1;
                    if rate_limit_waits > MAX_RATE_LIMIT_WAITS {
                        return Err(GatewayError::RetriesExhausted {
                            attempts: rate_limit_waits,
                            last_error: "rate limited".to_string(),
                        });
                    }
                    warn!(
                        "Rate limited on {} {path}, waiting {retry_after_secs}s",
                        method.as_str()
                    );
                    tokio::time::sleep(Duration::from_secs(retry_after_secs)).await;
                }
                Err(e) if e.is_retryable() && attempt + 1 < MAX_RETRIES => {
                    attempt += 1;
                    let delay = BACKOFF_BASE_MS * (1 << (attempt - 1));
                    debug!(
                        "Retry {attempt} after {delay}ms for {} {path}: {e}",
                        method.as_str()
                    );
                    tokio::time::sleep(Duration::from_millis(delay)).await;
                }
                Err(e) if e.is_retryable() => {
                    return Err(GatewayError::RetriesExhausted {
                        attempts: MAX_RETRIES,
                        last_error: e.to_string(),
                    });
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn send_once(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<Value, GatewayError> {
        let url = format!("{}/{path}", self.base_url);
        debug!("{} {url}", method.as_str());

        let mut request = self.http.request(method, &url);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            let envelope: Value = response
                .json()
                .await
                .map_err(|e| GatewayError::Decode(e.to_string()))?;
            return Ok(envelope.get("result").cloned().unwrap_or(Value::Null));
        }

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_RETRY_AFTER_SECS);
            return Err(GatewayError::RateLimited { retry_after_secs });
        }

        let message = extract_error_message(&response.text().await.unwrap_or_default());
        if status.is_client_error() {
            Err(GatewayError::Api {
                status: status.as_u16(),
                message,
            })
        } else {
            Err(GatewayError::Server {
                status: status.as_u16(),
                message,
            })
        }
    }

    fn parse<T: DeserializeOwned>(&self, value: Value) -> Result<T, GatewayError> {
        serde_json::from_value(value).map_err(|e| GatewayError::Decode(e.to_string()))
    }

    fn synthetic_id(&self) -> String {
        format!("dryrun-{:03}", self.dry_run_ids.fetch_add(1, Ordering::Relaxed) + 1)
    }
}

/// Pull the first error message out of the vendor envelope, falling back
/// to the raw body.
fn extract_error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            v.get("errors")
                .and_then(|e| e.get(0))
                .and_then(|e| e.get("message"))
                .and_then(|m| m.as_str())
                .map(String::from)
        })
        .unwrap_or_else(|| crate::utils::elide(body, 200))
}

fn list_items_payload(items: &[String]) -> Vec<Value> {
    items.iter().map(|d| json!({ "value": d })).collect()
}

#[async_trait]
impl GatewayApi for GatewayClient {
    async fn get_lists(&self) -> Result<Vec<RemoteList>, GatewayError> {
        let result = self.request(Method::GET, "lists", None).await?;
        if result.is_null() {
            return Ok(Vec::new());
        }
        self.parse(result)
    }

    async fn get_list_items(&self, list_id: &str) -> Result<HashSet<String>, GatewayError> {
        let path = format!("lists/{list_id}/items?limit={}", self.max_list_size);
        let result = self.request(Method::GET, &path, None).await?;
        if result.is_null() {
            return Ok(HashSet::new());
        }

        #[derive(serde::Deserialize)]
        struct Item {
            value: String,
        }
        let items: Vec<Item> = self.parse(result)?;
        Ok(items.into_iter().map(|i| i.value).collect())
    }

    async fn create_list(&self, name: &str, items: &[String]) -> Result<String, GatewayError> {
        if self.dry_run {
            let id = self.synthetic_id();
            info!("[dry-run] create list '{name}' ({} items) -> {id}", items.len());
            return Ok(id);
        }

        let payload = json!({
            "name": name,
            "type": "DOMAIN",
            "items": list_items_payload(items),
        });
        let result = self.request(Method::POST, "lists", Some(&payload)).await?;
        let created: RemoteList = self.parse(result)?;
        Ok(created.id)
    }

    async fn patch_list(
        &self,
        list_id: &str,
        append: &[String],
        remove: &[String],
    ) -> Result<(), GatewayError> {
        if append.is_empty() && remove.is_empty() {
            return Ok(());
        }
        if self.dry_run {
            info!(
                "[dry-run] patch list {list_id}: +{} -{}",
                append.len(),
                remove.len()
            );
            return Ok(());
        }

        let payload = json!({
            "append": list_items_payload(append),
            "remove": remove,
        });
        let path = format!("lists/{list_id}");
        self.request(Method::PATCH, &path, Some(&payload)).await?;
        Ok(())
    }

    async fn delete_list(&self, list_id: &str) -> Result<(), GatewayError> {
        if self.dry_run {
            info!("[dry-run] delete list {list_id}");
            return Ok(());
        }
        let path = format!("lists/{list_id}");
        self.request(Method::DELETE, &path, None).await?;
        Ok(())
    }

    async fn get_rules(&self) -> Result<Vec<RemoteRule>, GatewayError> {
        let result = self.request(Method::GET, "rules", None).await?;
        if result.is_null() {
            return Ok(Vec::new());
        }
        self.parse(result)
    }

    async fn create_rule(&self, payload: &RulePayload) -> Result<(), GatewayError> {
        if self.dry_run {
            info!("[dry-run] create rule '{}'", payload.name);
            return Ok(());
        }
        let body = serde_json::to_value(payload).map_err(|e| GatewayError::Decode(e.to_string()))?;
        self.request(Method::POST, "rules", Some(&body)).await?;
        Ok(())
    }

    async fn update_rule(&self, rule_id: &str, payload: &RulePayload) -> Result<(), GatewayError> {
        if self.dry_run {
            info!("[dry-run] update rule {rule_id} ('{}')", payload.name);
            return Ok(());
        }
        let body = serde_json::to_value(payload).map_err(|e| GatewayError::Decode(e.to_string()))?;
        let path = format!("rules/{rule_id}");
        self.request(Method::PUT, &path, Some(&body)).await?;
        Ok(())
    }

    async fn delete_rule(&self, rule_id: &str) -> Result<(), GatewayError> {
        if self.dry_run {
            info!("[dry-run] delete rule {rule_id}");
            return Ok(());
        }
        let path = format!("rules/{rule_id}");
        self.request(Method::DELETE, &path, None).await?;
        Ok(())
    }
}
