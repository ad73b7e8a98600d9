use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Resource category a relief center offers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    #[serde(rename = "food")]
    Food,
    #[serde(rename = "medical aid")]
    MedicalAid,
    #[serde(rename = "water")]
    Water,
    #[serde(rename = "shelter")]
    Shelter,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 4] = [
        ResourceKind::Food,
        ResourceKind::MedicalAid,
        ResourceKind::Water,
        ResourceKind::Shelter,
    ];

    /// Value sent as the `q` parameter.
    pub fn as_query(&self) -> &'static str {
        match self {
            ResourceKind::Food => "food",
            ResourceKind::MedicalAid => "medical aid",
            ResourceKind::Water => "water",
            ResourceKind::Shelter => "shelter",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ResourceKind::Food => "Food",
            ResourceKind::MedicalAid => "Medical Aid",
            ResourceKind::Water => "Water",
            ResourceKind::Shelter => "Shelter",
        }
    }

    pub fn next(&self) -> ResourceKind {
        let idx = Self::ALL.iter().position(|k| k == self).unwrap_or(0);
        Self::ALL[(idx + 1) % Self::ALL.len()]
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ResourceKind {
    type Err = ParamError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace(['_', '-'], " ");
        Self::ALL
            .into_iter()
            .find(|k| k.as_query() == normalized)
            .ok_or_else(|| ParamError::UnknownQuery(s.to_string()))
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParamError {
    #[error("unknown resource kind: {0} (expected food, medical aid, water or shelter)")]
    UnknownQuery(String),
    #[error("search radius must be a positive number of km, got {0}")]
    RadiusNotPositive(f64),
    #[error("latitude must be within [-90, 90], got {0}")]
    LatitudeOutOfRange(f64),
    #[error("longitude must be within [-180, 180], got {0}")]
    LongitudeOutOfRange(f64),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinates {
    #[cfg(test)]
    pub const ORIGIN: Coordinates = Coordinates { lat: 0.0, lon: 0.0 };

    pub fn new(lat: f64, lon: f64) -> Result<Self, ParamError> {
        Ok(Self {
            lat: validate_lat(lat)?,
            lon: validate_lon(lon)?,
        })
    }

    pub fn is_valid(&self) -> bool {
        validate_lat(self.lat).is_ok() && validate_lon(self.lon).is_ok()
    }
}

impl fmt::Display for Coordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, {}", self.lat, self.lon)
    }
}

pub fn validate_lat(lat: f64) -> Result<f64, ParamError> {
    if lat.is_finite() && (-90.0..=90.0).contains(&lat) {
        Ok(lat)
    } else {
        Err(ParamError::LatitudeOutOfRange(lat))
    }
}

pub fn validate_lon(lon: f64) -> Result<f64, ParamError> {
    if lon.is_finite() && (-180.0..=180.0).contains(&lon) {
        Ok(lon)
    } else {
        Err(ParamError::LongitudeOutOfRange(lon))
    }
}

pub fn validate_radius(radius_km: f64) -> Result<f64, ParamError> {
    if radius_km.is_finite() && radius_km > 0.0 {
        Ok(radius_km)
    } else {
        Err(ParamError::RadiusNotPositive(radius_km))
    }
}

/// One consistent snapshot of everything a search request is built from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SearchParams {
    pub query: ResourceKind,
    pub radius_km: f64,
    pub lat: f64,
    pub lon: f64,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            query: ResourceKind::Food,
            radius_km: 10.0,
            lat: 33.4255,
            lon: -111.94,
        }
    }
}

impl SearchParams {
    pub fn coordinates(&self) -> Coordinates {
        Coordinates {
            lat: self.lat,
            lon: self.lon,
        }
    }

    /// Radius as sent in the `distance` parameter, e.g. `10km`.
    pub fn distance_param(&self) -> String {
        format!("{}km", self.radius_km)
    }
}
