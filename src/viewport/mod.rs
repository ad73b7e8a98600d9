use tracing::debug;

use crate::search::Coordinates;

pub const MIN_ZOOM: u8 = 1;
pub const MAX_ZOOM: u8 = 19;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub center: Coordinates,
    pub zoom: u8,
}

/// Visible window in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub west: f64,
    pub east: f64,
    pub south: f64,
    pub north: f64,
}

impl Bounds {
    pub fn contains(&self, c: Coordinates) -> bool {
        (self.south..=self.north).contains(&c.lat) && (self.west..=self.east).contains(&c.lon)
    }
}

impl Viewport {
    /// Longitude span in degrees at this zoom: the whole world at zoom 0,
    /// halving with every level like a slippy map.
    pub fn lon_span(&self) -> f64 {
        360.0 / 2f64.powi(self.zoom as i32)
    }

    /// `aspect` is width over height of the drawing area, in the same units
    /// the caller will stretch degrees into.
    pub fn bounds(&self, aspect: f64) -> Bounds {
        let half_lon = (self.lon_span() / 2.0).min(180.0);
        let aspect = if aspect.is_finite() && aspect > 0.0 {
            aspect
        } else {
            1.0
        };
        let half_lat = (half_lon / aspect).min(90.0);
        Bounds {
            west: (self.center.lon - half_lon).max(-180.0),
            east: (self.center.lon + half_lon).min(180.0),
            south: (self.center.lat - half_lat).max(-90.0),
            north: (self.center.lat + half_lat).min(90.0),
        }
    }
}

/// Keeps the map centered on the controller's coordinates.
///
/// Recentering never touches zoom; only explicit zoom calls do.
#[derive(Debug, Clone)]
pub struct ViewportSynchronizer {
    viewport: Viewport,
}

impl ViewportSynchronizer {
    pub fn new(center: Coordinates, zoom: u8) -> Self {
        Self {
            viewport: Viewport {
                center,
                zoom: zoom.clamp(MIN_ZOOM, MAX_ZOOM),
            },
        }
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    /// Returns whether the center actually moved.
    pub fn sync(&mut self, target: Coordinates) -> bool {
        if self.viewport.center == target {
            return false;
        }
        debug!(lat = target.lat, lon = target.lon, zoom = self.viewport.zoom, "recentering viewport");
        self.viewport.center = target;
        true
    }

    pub fn set_zoom(&mut self, zoom: u8) -> u8 {
        self.viewport.zoom = zoom.clamp(MIN_ZOOM, MAX_ZOOM);
        self.viewport.zoom
    }

    pub fn zoom_in(&mut self) -> u8 {
        self.set_zoom(self.viewport.zoom.saturating_add(1))
    }

    pub fn zoom_out(&mut self) -> u8 {
        self.set_zoom(self.viewport.zoom.saturating_sub(1))
    }
}
