use anyhow::{Context, Result};
use chrono::{Datelike, NaiveDate};
use reqwest::Client;
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use url::Url;

/// Path the period list is normally served from.
pub static PRIMARY_PERIODS_PATH: &str = "/sku-details-active-years";

/// Older deployments expose the same list under one of these.
pub static FALLBACK_PERIODS_PATHS: &[&str] =
    &["/component-years", "/years", "/periods", "/active-years"];

/// Transport seam for the period endpoints. The production impl talks HTTP;
/// tests substitute counting stubs.
#[allow(async_fn_in_trait)]
pub trait PeriodFetch {
    async fn get_json(&self, path: &str) -> Result<Value>;
}

/// `PeriodFetch` over a shared reqwest client and a base URL.
#[derive(Clone)]
pub struct HttpPeriodFetch {
    client: Client,
    base: Url,
}

impl HttpPeriodFetch {
    pub fn new(client: Client, base: Url) -> Self {
        Self { client, base }
    }

    /// Resolve an endpoint path against the base. The leading slash is
    /// stripped first: `Url::join` treats an absolute-path reference as
    /// replacing the base's path, which would drop a base like `/api/`.
    fn endpoint_url(&self, path: &str) -> Result<Url> {
        self.base
            .join(path.trim_start_matches('/'))
            .with_context(|| format!("joining {path} onto {}", self.base))
    }
}

impl PeriodFetch for HttpPeriodFetch {
    async fn get_json(&self, path: &str) -> Result<Value> {
        let url = self.endpoint_url(path)?;
        debug!(%url, "fetching period payload");
        Ok(self
            .client
            .get(url.clone())
            .send()
            .await
            .with_context(|| format!("GET {url} failed"))?
            .error_for_status()
            .with_context(|| format!("non-success status from {url}"))?
            .json()
            .await
            .with_context(|| format!("reading JSON body from {url}"))?)
    }
}

/// Fault-tolerant period retrieval: primary endpoint, then the fallback
/// list in order, then a built-in default set. Always yields a payload;
/// nothing here escalates past a `warn`.
pub struct PeriodSource<F: PeriodFetch> {
    fetch: F,
    paths: Vec<String>,
}

impl<F: PeriodFetch> PeriodSource<F> {
    pub fn new(fetch: F) -> Self {
        let paths = std::iter::once(PRIMARY_PERIODS_PATH)
            .chain(FALLBACK_PERIODS_PATHS.iter().copied())
            .map(str::to_string)
            .collect();
        Self { fetch, paths }
    }

    /// Override the attempt order. The first path is treated as primary.
    pub fn with_paths(fetch: F, paths: Vec<String>) -> Self {
        Self { fetch, paths }
    }

    /// Try each endpoint once, in order, returning the first successful
    /// body untouched. Exhaustion degrades to `default_payload` rather
    /// than erroring; there is no per-endpoint retry or backoff.
    pub async fn fetch_periods(&self, today: NaiveDate) -> Value {
        for path in &self.paths {
            match self.fetch.get_json(path).await {
                Ok(payload) => {
                    debug!(%path, "period endpoint answered");
                    return payload;
                }
                Err(err) => warn!(%path, error = %err, "period endpoint failed, trying next"),
            }
        }
        info!("all period endpoints failed, using built-in default periods");
        default_payload(today.year())
    }
}

/// The three-entry stand-in period set used when every endpoint is down:
/// previous-year range first, then current-year, then two years back. Ids
/// and ordering mirror what the real service hands out.
pub fn default_payload(year: i32) -> Value {
    json!([
        { "id": "1", "period": format!("July {} to June {}", year - 1, year) },
        { "id": "2", "period": format!("July {} to June {}", year, year + 1) },
        { "id": "3", "period": format!("July {} to June {}", year - 2, year - 1) },
    ])
}
