//! User location resolution.
//!
//! The acquirer is a single async call, [`acquire_location`], returning an
//! explicit [`Result`]: either a [`UserLocation`] or a [`GeolocationFailure`].
//! Where the coordinates come from is decided by a [`LocationProvider`]:
//! IP geolocation (IpApi), a fixed manual position from `config.toml`, or
//! nothing at all on hosts without a location capability.

use crate::config::{LocationConfig, ProviderKind};
use crate::error::GeolocationFailure;
use crate::models::{Coordinates, UserLocation};
use async_trait::async_trait;
use ipgeolocate::{Locator, Service};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Options handed to the provider for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionOptions {
    /// Prefer a precise fix over a fast one.
    pub high_accuracy: bool,
    /// Requests still running after this long count as denied.
    pub timeout: Duration,
    /// A cached fix younger than this is reused without a new lookup.
    pub maximum_age: Duration,
}

impl Default for PositionOptions {
    fn default() -> Self {
        Self {
            high_accuracy: false,
            timeout: Duration::from_secs(5),
            maximum_age: Duration::from_secs(60),
        }
    }
}

impl From<&LocationConfig> for PositionOptions {
    fn from(config: &LocationConfig) -> Self {
        Self {
            high_accuracy: config.high_accuracy,
            timeout: Duration::from_millis(config.timeout_ms),
            maximum_age: Duration::from_secs(config.max_age_secs),
        }
    }
}

/// Source of the device position.
#[async_trait]
pub trait LocationProvider: Send + Sync {
    /// Whether the host can produce a position at all.
    fn is_supported(&self) -> bool {
        true
    }

    async fn current_position(
        &self,
        options: &PositionOptions,
    ) -> Result<UserLocation, GeolocationFailure>;
}

/// Resolves the user's location once, honouring the timeout in `options`.
///
/// # Errors
///
/// [`GeolocationFailure::Unsupported`] when the provider has no capability,
/// [`GeolocationFailure::Denied`] when it refuses or does not answer within
/// `options.timeout`.
pub async fn acquire_location(
    provider: &dyn LocationProvider,
    options: PositionOptions,
) -> Result<UserLocation, GeolocationFailure> {
    if !provider.is_supported() {
        warn!("Geolocation requested on a host without location support");
        return Err(GeolocationFailure::Unsupported);
    }

    match tokio::time::timeout(options.timeout, provider.current_position(&options)).await {
        Ok(result) => result,
        Err(_) => {
            warn!(timeout_ms = options.timeout.as_millis() as u64, "Geolocation timed out");
            Err(GeolocationFailure::Denied)
        }
    }
}

/// Builds the provider selected in `config.toml`, wrapped with the max-age cache.
pub fn provider_from_config(config: &LocationConfig) -> Arc<dyn LocationProvider> {
    match config.provider {
        ProviderKind::Ip => Arc::new(CachedLocator::new(IpLocator::new(
            config.lookup_ip.clone().unwrap_or_default(),
        ))),
        ProviderKind::Manual => Arc::new(FixedLocation(Coordinates::new(
            config.manual_lat,
            config.manual_lon,
        ))),
        ProviderKind::None => Arc::new(NoLocation),
    }
}

/// IP geolocation through the IpApi service.
///
/// An empty `lookup_ip` asks the service to locate the caller's own address.
pub struct IpLocator {
    lookup_ip: String,
}

impl IpLocator {
    pub fn new(lookup_ip: impl Into<String>) -> Self {
        Self {
            lookup_ip: lookup_ip.into(),
        }
    }
}

#[async_trait]
impl LocationProvider for IpLocator {
    async fn current_position(
        &self,
        options: &PositionOptions,
    ) -> Result<UserLocation, GeolocationFailure> {
        if options.high_accuracy {
            debug!("High accuracy requested; IP geolocation is city-level at best");
        }

        match Locator::get(&self.lookup_ip, Service::IpApi).await {
            Ok(loc) => {
                let lat = loc.latitude.parse::<f64>();
                let lon = loc.longitude.parse::<f64>();
                match (lat, lon) {
                    (Ok(lat), Ok(lon)) => {
                        info!("Geolocation successful - ({}, {})", lat, lon);
                        Ok(Coordinates::new(lat, lon))
                    }
                    _ => {
                        error!(
                            "Geolocation service returned unparseable coordinates ({}, {})",
                            loc.latitude, loc.longitude
                        );
                        Err(GeolocationFailure::Denied)
                    }
                }
            }
            Err(e) => {
                error!("Error using geolocation service: {}", e);
                Err(GeolocationFailure::Denied)
            }
        }
    }
}

/// A fixed position, used when automatic lookup is disabled.
pub struct FixedLocation(pub Coordinates);

#[async_trait]
impl LocationProvider for FixedLocation {
    async fn current_position(
        &self,
        _options: &PositionOptions,
    ) -> Result<UserLocation, GeolocationFailure> {
        Ok(self.0)
    }
}

/// A host with no location capability.
pub struct NoLocation;

#[async_trait]
impl LocationProvider for NoLocation {
    fn is_supported(&self) -> bool {
        false
    }

    async fn current_position(
        &self,
        _options: &PositionOptions,
    ) -> Result<UserLocation, GeolocationFailure> {
        Err(GeolocationFailure::Unsupported)
    }
}

/// Reuses the last fix while it is younger than `maximum_age`.
pub struct CachedLocator<P> {
    inner: P,
    last_fix: Mutex<Option<(UserLocation, Instant)>>,
}

impl<P: LocationProvider> CachedLocator<P> {
    pub fn new(inner: P) -> Self {
        Self {
            inner,
            last_fix: Mutex::new(None),
        }
    }

    fn fresh_fix(&self, maximum_age: Duration) -> Option<UserLocation> {
        let fix = *self.last_fix.lock().ok()?;
        fix.filter(|(_, at)| at.elapsed() <= maximum_age)
            .map(|(loc, _)| loc)
    }
}

#[async_trait]
impl<P: LocationProvider> LocationProvider for CachedLocator<P> {
    fn is_supported(&self) -> bool {
        self.inner.is_supported()
    }

    async fn current_position(
        &self,
        options: &PositionOptions,
    ) -> Result<UserLocation, GeolocationFailure> {
        if let Some(loc) = self.fresh_fix(options.maximum_age) {
            debug!("Reusing cached location fix");
            return Ok(loc);
        }

        let loc = self.inner.current_position(options).await?;
        if let Ok(mut guard) = self.last_fix.lock() {
            *guard = Some((loc, Instant::now()));
        }
        Ok(loc)
    }
}
