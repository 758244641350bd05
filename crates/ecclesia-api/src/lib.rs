//! REST client for the back-office API
//!
//! [`RestBackend`] implements the core's [`ReportBackend`] against the
//! `/reports-analytics` endpoints, and hands out [`CollectionFetcher`]s that
//! implement [`PageFetcher`] for the paginated record collections.

pub mod error;

use async_trait::async_trait;
use chrono::NaiveDate;
use ecclesia_config::BackendConfig;
use ecclesia_core::{
    CoreResult, ExportArtifact, ExportRequest, FilterCriteria, KpiDomain, MonthlyRow, Page, PageFetcher,
    PaginationCursor, RawReport, Record, ReportBackend, ReportModule,
};
use log::{debug, warn};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

pub use error::{ApiError, ApiResult};

const REPORT_PATH: &str = "reports-analytics/report";
const EXPORT_PATH: &str = "reports-analytics/report/export";
const KPI_PATH: &str = "reports-analytics/kpi";
const ANALYTICS_PATH: &str = "reports-analytics";

/// A paginated record collection and the envelope key its records sit under
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Collection {
    pub path: &'static str,
    pub records_key: &'static str,
}

impl Collection {
    pub const PLEDGES: Collection = Collection {
        path: "pledges",
        records_key: "pledges",
    };
    pub const TITHES: Collection = Collection {
        path: "tithes",
        records_key: "tithes",
    };
    pub const WELFARE_CONTRIBUTIONS: Collection = Collection {
        path: "welfare/contributions",
        records_key: "contributions",
    };
    pub const WELFARE_DISBURSEMENTS: Collection = Collection {
        path: "welfare/disbursements",
        records_key: "disbursements",
    };

    pub fn for_domain(domain: KpiDomain) -> Collection {
        match domain {
            KpiDomain::Pledges => Collection::PLEDGES,
            KpiDomain::Tithe => Collection::TITHES,
            KpiDomain::WelfareContributions => Collection::WELFARE_CONTRIBUTIONS,
            KpiDomain::WelfareDisbursements => Collection::WELFARE_DISBURSEMENTS,
        }
    }
}

/// HTTP client bound to one back-office base URL
#[derive(Debug, Clone)]
pub struct RestBackend {
    client: Client,
    base_url: String,
}

impl RestBackend {
    /// Build a client from config
    ///
    /// The token, when present, is sent as a bearer `Authorization` header
    /// on every request. Without `timeout_secs` the client's own default
    /// applies.
    pub fn new(config: &BackendConfig) -> ApiResult<Self> {
        let mut headers = HeaderMap::new();
        if let Some(token) = config.token.as_deref().filter(|t| !t.trim().is_empty()) {
            let mut value = HeaderValue::from_str(&format!("Bearer {}", token.trim())).map_err(|e| {
                ApiError::Build {
                    message: format!("invalid token: {}", e),
                }
            })?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let mut builder = Client::builder().default_headers(headers);
        if let Some(secs) = config.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder.build().map_err(|e| ApiError::Build {
            message: e.to_string(),
        })?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Page fetcher for one collection
    pub fn collection(&self, collection: Collection) -> CollectionFetcher {
        CollectionFetcher {
            backend: self.clone(),
            collection,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn get(&self, path: &str, query: &[(String, String)]) -> ApiResult<reqwest::Response> {
        let url = self.url(path);
        debug!("GET {} {:?}", url, query);

        let response = self.client.get(&url).query(query).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = error_message(&body);
            warn!("GET {} returned {}: {}", url, status, message);
            return Err(ApiError::Status {
                status: status.as_u16(),
                message,
            });
        }
        Ok(response)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str, query: &[(String, String)]) -> ApiResult<T> {
        let body = self.get(path, query).await?.bytes().await?;
        serde_json::from_slice(&body).map_err(|e| ApiError::Decode {
            message: format!("{}: {}", path, e),
        })
    }
}

/// Pull the human-readable message out of an error body
///
/// The back office answers failures with `{ "message": ... }` or
/// `{ "error": ... }`. Anything else yields an empty message, which the core
/// turns into its generic fallback.
fn error_message(body: &str) -> String {
    let Ok(value) = serde_json::from_str::<Value>(body) else {
        return String::new();
    };
    ["message", "error"]
        .iter()
        .find_map(|key| value.get(*key).and_then(Value::as_str))
        .map(|s| s.trim().to_string())
        .unwrap_or_default()
}

/// Decode `{ <records_key>: [...], pagination: {...} }`
///
/// A response without a pagination block is treated as the only page.
fn decode_page(body: Value, records_key: &str, requested: u32) -> ApiResult<Page<Record>> {
    let Value::Object(mut envelope) = body else {
        return Err(ApiError::Decode {
            message: format!("expected an object holding '{}'", records_key),
        });
    };

    let records = match envelope.remove(records_key) {
        Some(Value::Array(items)) => items
            .into_iter()
            .map(|item| match item {
                Value::Object(record) => Ok(record),
                other => Err(ApiError::Decode {
                    message: format!("'{}' entry is not an object: {}", records_key, other),
                }),
            })
            .collect::<ApiResult<Vec<Record>>>()?,
        Some(Value::Null) | None => Vec::new(),
        Some(other) => {
            return Err(ApiError::Decode {
                message: format!("'{}' is not an array: {}", records_key, other),
            })
        }
    };

    let pagination = match envelope.remove("pagination") {
        Some(Value::Null) | None => PaginationCursor::single(requested),
        Some(value) => serde_json::from_value(value).map_err(|e| ApiError::Decode {
            message: format!("pagination: {}", e),
        })?,
    };

    Ok(Page::new(records, pagination))
}

/// [`PageFetcher`] for `GET /{collection}?page&limit&{filters}`
#[derive(Debug, Clone)]
pub struct CollectionFetcher {
    backend: RestBackend,
    collection: Collection,
}

impl CollectionFetcher {
    pub fn collection(&self) -> Collection {
        self.collection
    }
}

#[async_trait]
impl PageFetcher<Record> for CollectionFetcher {
    async fn fetch_page(&self, criteria: &FilterCriteria, page: u32, limit: u32) -> CoreResult<Page<Record>> {
        let mut query = vec![
            ("page".to_string(), page.to_string()),
            ("limit".to_string(), limit.to_string()),
        ];
        query.extend(criteria.query_pairs());

        let body: Value = self.backend.get_json(self.collection.path, &query).await?;
        Ok(decode_page(body, self.collection.records_key, page)?)
    }
}

#[derive(Deserialize)]
struct ReportEnvelope {
    report: RawReport,
}

#[derive(Deserialize)]
struct KpiEnvelope {
    #[serde(default)]
    kpis: Record,
}

#[derive(Deserialize)]
struct AnalyticsEnvelope {
    analytics: AnalyticsBody,
}

#[derive(Deserialize)]
struct AnalyticsBody {
    #[serde(default)]
    series: Vec<MonthlyRow>,
}

#[async_trait]
impl ReportBackend for RestBackend {
    async fn fetch_report(&self, module: ReportModule, from: NaiveDate, to: NaiveDate) -> CoreResult<RawReport> {
        let query = vec![
            ("module".to_string(), module.as_str().to_string()),
            ("from".to_string(), from.format("%Y-%m-%d").to_string()),
            ("to".to_string(), to.format("%Y-%m-%d").to_string()),
        ];
        let envelope: ReportEnvelope = self.get_json(REPORT_PATH, &query).await?;
        Ok(envelope.report)
    }

    async fn export_report(&self, request: &ExportRequest) -> CoreResult<ExportArtifact> {
        let response = self.get(EXPORT_PATH, &request.query_pairs()).await?;
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = response.bytes().await.map_err(ApiError::from)?;
        debug!(
            "export {} returned {} byte(s) of {}",
            request.module,
            bytes.len(),
            content_type.as_deref().unwrap_or("unknown type")
        );
        Ok(ExportArtifact {
            content_type,
            bytes: bytes.to_vec(),
        })
    }

    async fn fetch_kpis(&self) -> CoreResult<Record> {
        let envelope: KpiEnvelope = self.get_json(KPI_PATH, &[]).await?;
        Ok(envelope.kpis)
    }

    async fn fetch_analytics(&self, year: i32) -> CoreResult<Vec<MonthlyRow>> {
        let query = vec![("year".to_string(), year.to_string())];
        let envelope: AnalyticsEnvelope = self.get_json(ANALYTICS_PATH, &query).await?;
        Ok(envelope.analytics.series)
    }
}
