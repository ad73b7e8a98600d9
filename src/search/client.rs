use async_trait::async_trait;
use reqwest::Url;
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue, RETRY_AFTER};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::HttpConfig;
use crate::search::error::{classify_status, classify_transport};
use crate::search::record::parse_records;
use crate::search::{ReliefCenterRecord, SearchBackend, SearchError, SearchParams};

/// HTTP client for the relief-center search endpoint.
#[derive(Debug, Clone)]
pub struct SearchClient {
    pub base_url: String,
    pub(crate) inner: reqwest::Client,
    pub http_cfg: HttpConfig,
}

impl SearchClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, SearchError> {
        let inner = reqwest::Client::builder().build()?;
        Ok(Self {
            base_url: base_url.into(),
            inner,
            http_cfg: HttpConfig::default(),
        })
    }

    pub fn with_http_config(mut self, cfg: HttpConfig) -> Self {
        let builder = reqwest::Client::builder()
            .connect_timeout(Duration::from_millis(cfg.connect_timeout_ms))
            .timeout(Duration::from_millis(cfg.request_timeout_ms));
        // Keep the existing client if the builder rejects the settings.
        if let Ok(c) = builder.build() {
            self.inner = c;
        }
        self.http_cfg = cfg;
        self
    }

    /// `{base}/search?q=..&lat=..&lon=..&distance=..km` for one params snapshot.
    pub fn search_url(&self, params: &SearchParams) -> Result<Url, SearchError> {
        let base = self.base_url.trim_end_matches('/');
        let mut url = Url::parse(&format!("{base}/search"))
            .map_err(|e| SearchError::InvalidUrl(format!("{base}: {e}")))?;
        // `set_query` percent-encodes spaces as %20. Every value here comes from
        // the enum or a number, so none contains '&' or '='.
        url.set_query(Some(&format!(
            "q={}&lat={}&lon={}&distance={}",
            params.query.as_query(),
            params.lat,
            params.lon,
            params.distance_param()
        )));
        Ok(url)
    }

    pub async fn search(
        &self,
        params: &SearchParams,
        cancel: Option<CancellationToken>,
    ) -> Result<Vec<ReliefCenterRecord>, SearchError> {
        let url = self.search_url(params)?;
        let cancel = cancel.unwrap_or_default();

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        debug!(endpoint=%url, ?params, "sending relief center search");

        let max_attempts = self.http_cfg.max_retries.saturating_add(1);
        let mut last_err = SearchError::Request("no attempt made".into());

        for attempt in 1..=max_attempts {
            let req = self.inner.get(url.clone()).headers(headers.clone());
            let resp = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!(attempt, "search cancelled before response");
                    return Err(SearchError::Cancelled);
                }
                res = req.send() => res,
            };

            let (kind, retry_after) = match resp {
                Err(e) => {
                    error!(attempt, err=%e, "search send error");
                    let kind = classify_transport(&e);
                    last_err = e.into();
                    (kind, None)
                }
                Ok(resp) if !resp.status().is_success() => {
                    let status = resp.status();
                    let retry_after = resp
                        .headers()
                        .get(RETRY_AFTER)
                        .and_then(|h| h.to_str().ok())
                        .and_then(|s| s.trim().parse::<u64>().ok());
                    let body = resp.text().await.unwrap_or_default();
                    error!(attempt, status=%status.as_u16(), body=%body, "search non-success status");
                    last_err = SearchError::Status {
                        status: status.as_u16(),
                        body,
                    };
                    (classify_status(status), retry_after)
                }
                Ok(resp) => {
                    let body = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => return Err(SearchError::Cancelled),
                        res = resp.text() => res,
                    };
                    match body {
                        Ok(text) => {
                            let records = parse_records(&text)?;
                            info!(attempt, count = records.len(), "search returned");
                            return Ok(records);
                        }
                        Err(e) => {
                            error!(attempt, err=%e, "search body read error");
                            let kind = classify_transport(&e);
                            last_err = e.into();
                            (kind, None)
                        }
                    }
                }
            };

            if !kind.is_transient() || attempt == max_attempts {
                break;
            }
            let wait = self.backoff_delay(attempt, retry_after);
            info!(attempt, kind=?kind, wait_ms=%wait.as_millis(), "retrying search");
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(SearchError::Cancelled),
                _ = tokio::time::sleep(wait) => {}
            }
        }

        warn!(err=%last_err, "search failed");
        Err(last_err)
    }

    /// A server-sent `Retry-After` is capped at the request timeout.
    pub(crate) fn backoff_delay(&self, attempt: usize, retry_after_secs: Option<u64>) -> Duration {
        if self.http_cfg.respect_retry_after
            && let Some(secs) = retry_after_secs
        {
            let cap = Duration::from_millis(self.http_cfg.request_timeout_ms);
            return Duration::from_secs(secs).min(cap);
        }
        let base = self.http_cfg.retry_base_ms;
        let exp = base.saturating_mul(1u64 << (attempt.saturating_sub(1).min(16) as u32));
        let jitter = self.http_cfg.retry_jitter_ms;
        let rnd = if jitter == 0 { 0 } else { fastrand::u64(0..=jitter) };
        Duration::from_millis(exp.saturating_add(rnd))
    }
}

#[async_trait]
impl SearchBackend for SearchClient {
    async fn fetch_relief_centers(
        &self,
        params: &SearchParams,
        cancel: CancellationToken,
    ) -> Result<Vec<ReliefCenterRecord>, SearchError> {
        self.search(params, Some(cancel)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::ResourceKind;
    use httptest::{Expectation, Server, matchers::*, responders::*};

    fn quick_cfg(max_retries: usize) -> HttpConfig {
        HttpConfig {
            connect_timeout_ms: 5_000,
            request_timeout_ms: 5_000,
            max_retries,
            retry_base_ms: 1,
            retry_jitter_ms: 0,
            respect_retry_after: true,
        }
    }

    #[test]
    fn search_url_encodes_query_with_space() {
        let client = SearchClient::new("http://relief.example.org/").unwrap();
        let params = SearchParams {
            query: ResourceKind::MedicalAid,
            radius_km: 10.0,
            lat: 33.4255,
            lon: -111.94,
        };
        let url = client.search_url(&params).unwrap();
        assert_eq!(
            url.as_str(),
            "http://relief.example.org/search?q=medical%20aid&lat=33.4255&lon=-111.94&distance=10km"
        );
    }

    #[test]
    fn search_url_rejects_garbage_base() {
        let client = SearchClient::new("not a url").unwrap();
        assert!(matches!(
            client.search_url(&SearchParams::default()),
            Err(SearchError::InvalidUrl(_))
        ));
    }

    #[tokio::test]
    async fn search_happy_path_sends_full_snapshot() {
        let server = Server::run();
        server.expect(
            Expectation::matching(all_of![
                request::method_path("GET", "/search"),
                request::query(url_decoded(contains(("q", "medical aid")))),
                request::query(url_decoded(contains(("lat", "40")))),
                request::query(url_decoded(contains(("lon", "-75")))),
                request::query(url_decoded(contains(("distance", "2.5km")))),
            ])
            .respond_with(json_encoded(serde_json::json!([
                {"_source": {"name": "Clinic", "location": {"lat": 40.01, "lon": -75.02}}},
                {"_source": {"name": "Field Hospital"}}
            ]))),
        );

        let client = SearchClient::new(server.url_str("")).unwrap();
        let params = SearchParams {
            query: ResourceKind::MedicalAid,
            radius_km: 2.5,
            lat: 40.0,
            lon: -75.0,
        };
        let records = client.search(&params, None).await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].name().as_deref(), Some("Clinic"));
    }

    #[tokio::test]
    async fn zero_matches_is_ok_and_empty() {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("GET", "/search"))
                .respond_with(json_encoded(serde_json::json!([]))),
        );
        let client = SearchClient::new(server.url_str("")).unwrap();
        let records = client.search(&SearchParams::default(), None).await.unwrap();
        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn retries_on_500_then_succeeds() {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("GET", "/search"))
                .times(2)
                .respond_with(httptest::cycle![
                    status_code(500).append_header("Retry-After", "0").body("oops"),
                    json_encoded(serde_json::json!([{"name": "ok"}])),
                ]),
        );
        let client = SearchClient::new(server.url_str(""))
            .unwrap()
            .with_http_config(quick_cfg(1));
        let records = client.search(&SearchParams::default(), None).await.unwrap();
        assert_eq!(records[0].name().as_deref(), Some("ok"));
    }

    #[tokio::test]
    async fn server_error_surfaces_after_retries() {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("GET", "/search"))
                .times(2)
                .respond_with(status_code(503).body("down")),
        );
        let client = SearchClient::new(server.url_str(""))
            .unwrap()
            .with_http_config(quick_cfg(1));
        let err = client
            .search(&SearchParams::default(), None)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            SearchError::Status {
                status: 503,
                body: "down".into()
            }
        );
    }

    #[tokio::test]
    async fn client_error_is_not_retried() {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("GET", "/search"))
                .times(1)
                .respond_with(status_code(400).body("bad")),
        );
        let client = SearchClient::new(server.url_str(""))
            .unwrap()
            .with_http_config(quick_cfg(3));
        let err = client
            .search(&SearchParams::default(), None)
            .await
            .unwrap_err();
        assert!(format!("{err}").contains("400"));
    }

    #[tokio::test]
    async fn malformed_body_is_decode_error() {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("GET", "/search"))
                .respond_with(status_code(200).body("<html>oops</html>")),
        );
        let client = SearchClient::new(server.url_str("")).unwrap();
        let err = client
            .search(&SearchParams::default(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, SearchError::Decode(_)));
    }

    #[tokio::test]
    async fn cancelled_token_short_circuits() {
        let client = SearchClient::new("http://127.0.0.1:9").unwrap();
        let token = CancellationToken::new();
        token.cancel();
        let err = client
            .search(&SearchParams::default(), Some(token))
            .await
            .unwrap_err();
        assert_eq!(err, SearchError::Cancelled);
    }

    #[test]
    fn backoff_honors_retry_after() {
        let client = SearchClient::new("http://x").unwrap();
        assert_eq!(client.backoff_delay(1, Some(3)), Duration::from_secs(3));
        let client = client.with_http_config(HttpConfig {
            retry_jitter_ms: 0,
            retry_base_ms: 100,
            ..HttpConfig::default()
        });
        assert_eq!(client.backoff_delay(3, None), Duration::from_millis(400));
    }

    #[test]
    fn backoff_caps_long_retry_after() {
        let client = SearchClient::new("http://x")
            .unwrap()
            .with_http_config(HttpConfig {
                request_timeout_ms: 2_000,
                ..HttpConfig::default()
            });
        assert_eq!(client.backoff_delay(1, Some(86_400)), Duration::from_secs(2));
        assert_eq!(client.backoff_delay(1, Some(1)), Duration::from_secs(1));
    }
}
