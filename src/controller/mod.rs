//! Search state and the request lifecycle behind the map.
//!
//! The controller is owned by exactly one loop (the TUI or the headless
//! runner). Network and geolocation work is spawned onto tokio and reports
//! back as [`ControllerEvent`]s over a channel; the owner feeds those into
//! [`SearchStateController::handle_event`]. Every search is tagged with a
//! [`SessionId`] and only the most recently issued session may publish
//! results, whatever order the responses arrive in.

use chrono::{DateTime, Local};
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::AppConfig;
use crate::geolocation::{GeolocationError, GeolocationResolver};
use crate::markers::{IconSet, MarkerDescriptor, MarkerProjector};
use crate::search::{
    Coordinates, ParamError, ReliefCenterRecord, ResourceKind, SearchBackend, SearchError,
    SearchParams, validate_lat, validate_lon, validate_radius,
};
use crate::viewport::{Viewport, ViewportSynchronizer};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SearchState {
    Idle,
    Loading { session: SessionId },
    Ready { count: usize },
    Failed { error: SearchError },
}

/// What the status line should say.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchStatus {
    Idle,
    Searching,
    Found(usize),
    NoMatches,
    Failed(String),
}

impl fmt::Display for SearchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SearchStatus::Idle => f.write_str("Ready to search"),
            SearchStatus::Searching => f.write_str("Searching..."),
            SearchStatus::Found(1) => f.write_str("1 relief center found"),
            SearchStatus::Found(n) => write!(f, "{n} relief centers found"),
            SearchStatus::NoMatches => f.write_str("No relief centers match this search"),
            SearchStatus::Failed(msg) => write!(f, "Search failed: {msg}"),
        }
    }
}

#[derive(Debug)]
pub enum ControllerEvent {
    SearchFinished {
        session: SessionId,
        outcome: Result<Vec<ReliefCenterRecord>, SearchError>,
    },
    PositionResolved(Result<Coordinates, GeolocationError>),
}

/// Result of applying one event, for notices and logs.
#[derive(Debug, Clone, PartialEq)]
pub enum ControllerUpdate {
    ResultsPublished {
        session: SessionId,
        count: usize,
    },
    SearchFailed {
        session: SessionId,
        error: SearchError,
    },
    StaleDiscarded {
        session: SessionId,
        latest: SessionId,
    },
    Relocated {
        position: Coordinates,
        search: Option<SessionId>,
    },
    LocateFailed(GeolocationError),
}

/// A search that has been started but not yet sent.
#[derive(Debug, Clone)]
pub struct PendingSearch {
    pub session: SessionId,
    pub params: SearchParams,
    pub cancel: CancellationToken,
}

#[derive(Debug, Clone)]
pub struct ControllerOptions {
    pub zoom: u8,
    pub icons: IconSet,
    pub abort_superseded: bool,
    pub refresh_on_locate: bool,
    pub locate_on_start: bool,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self {
            zoom: crate::config::DEFAULT_ZOOM,
            icons: IconSet::default(),
            abort_superseded: true,
            refresh_on_locate: true,
            locate_on_start: false,
        }
    }
}

impl ControllerOptions {
    pub fn from_config(cfg: &AppConfig) -> Self {
        Self {
            zoom: cfg.map.zoom,
            icons: IconSet::from_map_config(&cfg.map),
            abort_superseded: cfg.search.abort_superseded,
            refresh_on_locate: cfg.search.refresh_on_locate,
            locate_on_start: cfg.geolocation.locate_on_start,
        }
    }
}

pub struct SearchStateController {
    params: SearchParams,
    state: SearchState,
    latest_session: SessionId,
    results: Arc<Vec<ReliefCenterRecord>>,
    current_location: Option<Coordinates>,
    projector: MarkerProjector,
    viewport: ViewportSynchronizer,
    backend: Arc<dyn SearchBackend>,
    geolocation: GeolocationResolver,
    events_tx: UnboundedSender<ControllerEvent>,
    in_flight: Option<CancellationToken>,
    pending_locates: usize,
    last_geolocation_error: Option<GeolocationError>,
    last_updated: Option<DateTime<Local>>,
    options: ControllerOptions,
}

impl fmt::Debug for SearchStateController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SearchStateController")
            .field("params", &self.params)
            .field("state", &self.state)
            .field("latest_session", &self.latest_session)
            .field("results", &self.results.len())
            .field("current_location", &self.current_location)
            .field("pending_locates", &self.pending_locates)
            .finish()
    }
}

impl SearchStateController {
    pub fn new(
        params: SearchParams,
        backend: Arc<dyn SearchBackend>,
        geolocation: GeolocationResolver,
        options: ControllerOptions,
    ) -> (Self, UnboundedReceiver<ControllerEvent>) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let controller = Self {
            params,
            state: SearchState::Idle,
            latest_session: SessionId::default(),
            results: Arc::new(Vec::new()),
            current_location: None,
            projector: MarkerProjector::new(options.icons.clone()),
            viewport: ViewportSynchronizer::new(params.coordinates(), options.zoom),
            backend,
            geolocation,
            events_tx,
            in_flight: None,
            pending_locates: 0,
            last_geolocation_error: None,
            last_updated: None,
            options,
        };
        (controller, events_rx)
    }

    pub fn params(&self) -> SearchParams {
        self.params
    }

    #[cfg(test)]
    pub fn state(&self) -> &SearchState {
        &self.state
    }

    pub fn is_loading(&self) -> bool {
        matches!(self.state, SearchState::Loading { .. })
    }

    /// True while a search or a position lookup is outstanding.
    pub fn is_busy(&self) -> bool {
        self.is_loading() || self.pending_locates > 0
    }

    pub fn status(&self) -> SearchStatus {
        match &self.state {
            SearchState::Idle => SearchStatus::Idle,
            SearchState::Loading { .. } => SearchStatus::Searching,
            SearchState::Ready { count: 0 } => SearchStatus::NoMatches,
            SearchState::Ready { count } => SearchStatus::Found(*count),
            SearchState::Failed { error } => SearchStatus::Failed(error.to_string()),
        }
    }

    #[cfg(test)]
    pub fn results(&self) -> &Arc<Vec<ReliefCenterRecord>> {
        &self.results
    }

    pub fn current_location(&self) -> Option<Coordinates> {
        self.current_location
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport.viewport()
    }

    pub fn last_geolocation_error(&self) -> Option<&GeolocationError> {
        self.last_geolocation_error.as_ref()
    }

    pub fn last_updated(&self) -> Option<DateTime<Local>> {
        self.last_updated
    }

    /// Markers for the published results; the same `Arc` comes back until
    /// the results or the current location change.
    pub fn markers(&mut self) -> Arc<[MarkerDescriptor]> {
        self.projector.markers(&self.results, self.current_location)
    }

    pub fn set_query(&mut self, query: ResourceKind) {
        self.params.query = query;
    }

    pub fn cycle_query(&mut self) -> ResourceKind {
        self.params.query = self.params.query.next();
        self.params.query
    }

    pub fn set_radius_km(&mut self, radius_km: f64) -> Result<(), ParamError> {
        self.params.radius_km = validate_radius(radius_km)?;
        Ok(())
    }

    pub fn set_lat(&mut self, lat: f64) -> Result<(), ParamError> {
        self.params.lat = validate_lat(lat)?;
        self.viewport.sync(self.params.coordinates());
        Ok(())
    }

    pub fn set_lon(&mut self, lon: f64) -> Result<(), ParamError> {
        self.params.lon = validate_lon(lon)?;
        self.viewport.sync(self.params.coordinates());
        Ok(())
    }

    pub fn set_coordinates(&mut self, c: Coordinates) -> Result<(), ParamError> {
        let c = Coordinates::new(c.lat, c.lon)?;
        self.params.lat = c.lat;
        self.params.lon = c.lon;
        self.viewport.sync(c);
        Ok(())
    }

    pub fn zoom_in(&mut self) -> u8 {
        self.viewport.zoom_in()
    }

    pub fn zoom_out(&mut self) -> u8 {
        self.viewport.zoom_out()
    }

    pub fn set_zoom(&mut self, zoom: u8) -> u8 {
        self.viewport.set_zoom(zoom)
    }

    /// Initial load: one search, plus a position lookup when configured.
    pub fn mount(&mut self) -> SessionId {
        let session = self.trigger_search();
        if self.options.locate_on_start {
            self.locate();
        }
        session
    }

    /// Enter `Loading` under a fresh session id with a snapshot of the params.
    pub fn begin_search(&mut self) -> PendingSearch {
        if let Some(prev) = self.in_flight.take()
            && self.options.abort_superseded
        {
            prev.cancel();
        }
        self.latest_session = SessionId(self.latest_session.0 + 1);
        let cancel = CancellationToken::new();
        self.in_flight = Some(cancel.clone());
        self.state = SearchState::Loading {
            session: self.latest_session,
        };
        info!(session = %self.latest_session, params = ?self.params, "search started");
        PendingSearch {
            session: self.latest_session,
            params: self.params,
            cancel,
        }
    }

    pub fn trigger_search(&mut self) -> SessionId {
        let pending = self.begin_search();
        let backend = self.backend.clone();
        let tx = self.events_tx.clone();
        tokio::spawn(async move {
            let outcome = backend
                .fetch_relief_centers(&pending.params, pending.cancel)
                .await;
            if tx
                .send(ControllerEvent::SearchFinished {
                    session: pending.session,
                    outcome,
                })
                .is_err()
            {
                debug!(session = %pending.session, "controller gone; dropping search result");
            }
        });
        pending.session
    }

    /// Publish `outcome` if `session` is still the latest; drop it otherwise.
    pub fn apply_search_outcome(
        &mut self,
        session: SessionId,
        outcome: Result<Vec<ReliefCenterRecord>, SearchError>,
    ) -> ControllerUpdate {
        if session != self.latest_session {
            debug!(session = %session, latest = %self.latest_session, "discarding stale search response");
            return ControllerUpdate::StaleDiscarded {
                session,
                latest: self.latest_session,
            };
        }
        self.in_flight = None;
        self.last_updated = Some(Local::now());
        match outcome {
            Ok(records) => {
                let count = records.len();
                info!(session = %session, count, "search results published");
                self.results = Arc::new(records);
                self.state = SearchState::Ready { count };
                ControllerUpdate::ResultsPublished { session, count }
            }
            Err(error) => {
                warn!(session = %session, error = %error, "search failed");
                self.results = Arc::new(Vec::new());
                self.state = SearchState::Failed {
                    error: error.clone(),
                };
                ControllerUpdate::SearchFailed { session, error }
            }
        }
    }

    /// "Use my location": resolve in the background, apply on completion.
    pub fn locate(&mut self) {
        self.pending_locates += 1;
        let resolver = self.geolocation.clone();
        let tx = self.events_tx.clone();
        tokio::spawn(async move {
            let res = resolver.resolve_current_position().await;
            if tx.send(ControllerEvent::PositionResolved(res)).is_err() {
                debug!("controller gone; dropping position");
            }
        });
    }

    pub fn apply_position(
        &mut self,
        result: Result<Coordinates, GeolocationError>,
    ) -> ControllerUpdate {
        self.pending_locates = self.pending_locates.saturating_sub(1);
        match result {
            Ok(position) => {
                self.params.lat = position.lat;
                self.params.lon = position.lon;
                self.current_location = Some(position);
                self.last_geolocation_error = None;
                self.viewport.sync(position);
                let search = if self.options.refresh_on_locate {
                    Some(self.trigger_search())
                } else {
                    None
                };
                info!(lat = position.lat, lon = position.lon, ?search, "moved to current position");
                ControllerUpdate::Relocated { position, search }
            }
            Err(e) => {
                warn!(error = %e, params = ?self.params, "geolocation failed; keeping previous coordinates");
                self.last_geolocation_error = Some(e.clone());
                ControllerUpdate::LocateFailed(e)
            }
        }
    }

    pub fn handle_event(&mut self, event: ControllerEvent) -> ControllerUpdate {
        match event {
            ControllerEvent::SearchFinished { session, outcome } => {
                self.apply_search_outcome(session, outcome)
            }
            ControllerEvent::PositionResolved(result) => self.apply_position(result),
        }
    }
}
