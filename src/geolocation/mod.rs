//! Current-position resolution.
//!
//! A [`PositionProvider`] performs one platform lookup; the
//! [`GeolocationResolver`] bounds it with a timeout and validates the answer.
//! Failures come back as [`GeolocationError`] values so callers can keep
//! whatever coordinates they already had.

mod ip;

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{Instrument, debug, info, warn};

use crate::config::{GeolocationConfig, HttpConfig, ProviderKind};
use crate::search::Coordinates;

pub use ip::IpLocationProvider;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GeolocationError {
    #[error("location permission denied")]
    PermissionDenied,
    #[error("location request timed out after {0:?}")]
    Timeout(Duration),
    #[error("position unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait PositionProvider: Send + Sync {
    fn name(&self) -> &'static str;

    /// One-shot lookup. Must not poll or cache.
    async fn current_position(&self) -> Result<Coordinates, GeolocationError>;
}

/// Stand-in for a device that always reports the same fix.
#[derive(Debug, Clone)]
pub struct FixedPositionProvider(pub Coordinates);

#[async_trait]
impl PositionProvider for FixedPositionProvider {
    fn name(&self) -> &'static str {
        "fixed"
    }

    async fn current_position(&self) -> Result<Coordinates, GeolocationError> {
        Ok(self.0)
    }
}

/// Location access turned off by the user.
#[derive(Debug, Clone, Default)]
pub struct DisabledPositionProvider;

#[async_trait]
impl PositionProvider for DisabledPositionProvider {
    fn name(&self) -> &'static str {
        "disabled"
    }

    async fn current_position(&self) -> Result<Coordinates, GeolocationError> {
        Err(GeolocationError::PermissionDenied)
    }
}

#[derive(Clone)]
pub struct GeolocationResolver {
    provider: Arc<dyn PositionProvider>,
    timeout: Duration,
}

impl std::fmt::Debug for GeolocationResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeolocationResolver")
            .field("provider", &self.provider.name())
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl GeolocationResolver {
    pub fn new(provider: Arc<dyn PositionProvider>, timeout: Duration) -> Self {
        Self { provider, timeout }
    }

    pub fn from_config(cfg: &GeolocationConfig, http: &HttpConfig) -> Self {
        let provider: Arc<dyn PositionProvider> = match (cfg.provider, cfg.fixed) {
            (ProviderKind::Fixed, Some(c)) => Arc::new(FixedPositionProvider(c)),
            (ProviderKind::Fixed, None) => {
                warn!("fixed geolocation provider without fixed_lat/fixed_lon; disabling");
                Arc::new(DisabledPositionProvider)
            }
            (ProviderKind::Disabled, _) => Arc::new(DisabledPositionProvider),
            (ProviderKind::Ip, _) => Arc::new(IpLocationProvider::new(&cfg.endpoint, http)),
        };
        Self::new(provider, Duration::from_millis(cfg.timeout_ms))
    }

    pub async fn resolve_current_position(&self) -> Result<Coordinates, GeolocationError> {
        let span = tracing::info_span!("geolocation.resolve", provider = %self.provider.name());
        async move {
            debug!("requesting current position");
            let res = match tokio::time::timeout(self.timeout, self.provider.current_position())
                .await
            {
                Ok(res) => res,
                Err(_) => Err(GeolocationError::Timeout(self.timeout)),
            };
            match res {
                Ok(c) if c.is_valid() => {
                    info!(lat = c.lat, lon = c.lon, "position resolved");
                    Ok(c)
                }
                Ok(c) => {
                    warn!(lat = c.lat, lon = c.lon, "provider returned out-of-range position");
                    Err(GeolocationError::Unavailable(format!(
                        "provider returned out-of-range position ({c})"
                    )))
                }
                Err(e) => {
                    warn!(error = %e, "position lookup failed");
                    Err(e)
                }
            }
        }
        .instrument(span)
        .await
    }
}
