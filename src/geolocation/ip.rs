use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use super::{GeolocationError, PositionProvider};
use crate::config::HttpConfig;
use crate::search::Coordinates;

/// Approximate position from an IP geolocation service.
///
/// Understands the ip-api.com shape (`status`, `lat`, `lon`) and the
/// `latitude`/`longitude` shape used by most other services.
#[derive(Debug, Clone)]
pub struct IpLocationProvider {
    pub endpoint: String,
    inner: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct LookupBody {
    status: Option<String>,
    message: Option<String>,
    lat: Option<f64>,
    lon: Option<f64>,
    latitude: Option<f64>,
    longitude: Option<f64>,
}

impl IpLocationProvider {
    pub fn new(endpoint: impl Into<String>, http: &HttpConfig) -> Self {
        let inner = reqwest::Client::builder()
            .connect_timeout(Duration::from_millis(http.connect_timeout_ms))
            .timeout(Duration::from_millis(http.request_timeout_ms))
            .build()
            .unwrap_or_default();
        Self {
            endpoint: endpoint.into(),
            inner,
        }
    }
}

fn coordinates_from(body: LookupBody) -> Result<Coordinates, GeolocationError> {
    if body.status.as_deref() == Some("fail") {
        return Err(GeolocationError::Unavailable(
            body.message.unwrap_or_else(|| "lookup failed".into()),
        ));
    }
    match (body.lat.or(body.latitude), body.lon.or(body.longitude)) {
        (Some(lat), Some(lon)) => Ok(Coordinates { lat, lon }),
        _ => Err(GeolocationError::Unavailable(
            "response carried no coordinates".into(),
        )),
    }
}

#[async_trait]
impl PositionProvider for IpLocationProvider {
    fn name(&self) -> &'static str {
        "ip"
    }

    async fn current_position(&self) -> Result<Coordinates, GeolocationError> {
        let resp = self
            .inner
            .get(&self.endpoint)
            .send()
            .await
            .map_err(|e| GeolocationError::Unavailable(e.to_string()))?;
        let status = resp.status();
        if status == reqwest::StatusCode::FORBIDDEN || status == reqwest::StatusCode::UNAUTHORIZED
        {
            return Err(GeolocationError::PermissionDenied);
        }
        if !status.is_success() {
            return Err(GeolocationError::Unavailable(format!(
                "lookup service returned {status}"
            )));
        }
        let body: LookupBody = resp
            .json()
            .await
            .map_err(|e| GeolocationError::Unavailable(e.to_string()))?;
        debug!(?body, "ip lookup response");
        coordinates_from(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httptest::{Expectation, Server, matchers::*, responders::*};

    #[tokio::test]
    async fn reads_ip_api_shape() {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("GET", "/json")).respond_with(
                json_encoded(serde_json::json!({
                    "status": "success",
                    "lat": 39.9526,
                    "lon": -75.1652,
                    "city": "Philadelphia"
                })),
            ),
        );
        let provider = IpLocationProvider::new(server.url_str("/json"), &HttpConfig::default());
        let pos = provider.current_position().await.unwrap();
        assert_eq!(
            pos,
            Coordinates {
                lat: 39.9526,
                lon: -75.1652
            }
        );
    }

    #[tokio::test]
    async fn reads_latitude_longitude_shape() {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("GET", "/json")).respond_with(
                json_encoded(serde_json::json!({"latitude": 40.0, "longitude": -75.0})),
            ),
        );
        let provider = IpLocationProvider::new(server.url_str("/json"), &HttpConfig::default());
        assert_eq!(
            provider.current_position().await.unwrap(),
            Coordinates {
                lat: 40.0,
                lon: -75.0
            }
        );
    }

    #[tokio::test]
    async fn failed_lookup_is_unavailable() {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("GET", "/json")).respond_with(
                json_encoded(serde_json::json!({"status": "fail", "message": "private range"})),
            ),
        );
        let provider = IpLocationProvider::new(server.url_str("/json"), &HttpConfig::default());
        assert_eq!(
            provider.current_position().await,
            Err(GeolocationError::Unavailable("private range".into()))
        );
    }

    #[tokio::test]
    async fn forbidden_is_permission_denied() {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("GET", "/json"))
                .respond_with(status_code(403)),
        );
        let provider = IpLocationProvider::new(server.url_str("/json"), &HttpConfig::default());
        assert_eq!(
            provider.current_position().await,
            Err(GeolocationError::PermissionDenied)
        );
    }
}
