use serde::Serialize;
use std::sync::Arc;
use tracing::trace;

use crate::config::MapConfig;
use crate::search::{Coordinates, ReliefCenterRecord};

pub const UNKNOWN_NAME: &str = "Unknown Name";
pub const NO_RESOURCES: &str = "No Resources Listed";
pub const NO_ADDRESS: &str = "No Address Available";
pub const NO_CONTACT: &str = "No Contact Information";
pub const CURRENT_LOCATION_NAME: &str = "Your Location";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MarkerKind {
    ReliefCenter,
    CurrentLocation,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IconSpec {
    pub url: String,
    pub size: (u16, u16),
    pub anchor: (i16, i16),
    pub popup_anchor: (i16, i16),
    /// Character drawn for this marker on the terminal map.
    pub glyph: char,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IconSet {
    pub relief_center: IconSpec,
    pub current_location: IconSpec,
}

impl IconSet {
    pub fn from_map_config(cfg: &MapConfig) -> Self {
        Self {
            relief_center: IconSpec {
                url: cfg.relief_icon_url.clone(),
                size: (32, 32),
                anchor: (16, 32),
                popup_anchor: (0, -32),
                glyph: '+',
            },
            current_location: IconSpec {
                url: cfg.location_icon_url.clone(),
                size: (32, 32),
                anchor: (16, 32),
                popup_anchor: (0, -32),
                glyph: '@',
            },
        }
    }

    pub fn for_kind(&self, kind: MarkerKind) -> &IconSpec {
        match kind {
            MarkerKind::ReliefCenter => &self.relief_center,
            MarkerKind::CurrentLocation => &self.current_location,
        }
    }
}

impl Default for IconSet {
    fn default() -> Self {
        Self::from_map_config(&MapConfig::default())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PopupFields {
    pub name: String,
    pub resources: String,
    pub address: String,
    pub contact: String,
}

impl PopupFields {
    pub fn from_record(record: &ReliefCenterRecord) -> Self {
        Self {
            name: record.name().unwrap_or_else(|| UNKNOWN_NAME.to_string()),
            resources: record.resources().unwrap_or_else(|| NO_RESOURCES.to_string()),
            address: record.address().unwrap_or_else(|| NO_ADDRESS.to_string()),
            contact: record.contact().unwrap_or_else(|| NO_CONTACT.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarkerDescriptor {
    pub position: Coordinates,
    pub kind: MarkerKind,
    pub popup: PopupFields,
    pub icon: IconSpec,
}

/// Records to markers, plus one trailing marker for the current location.
pub fn project(
    records: &[ReliefCenterRecord],
    current_location: Option<Coordinates>,
    icons: &IconSet,
) -> Vec<MarkerDescriptor> {
    let mut out: Vec<MarkerDescriptor> = records
        .iter()
        .map(|r| MarkerDescriptor {
            position: r.position(),
            kind: MarkerKind::ReliefCenter,
            popup: PopupFields::from_record(r),
            icon: icons.for_kind(MarkerKind::ReliefCenter).clone(),
        })
        .collect();

    if let Some(loc) = current_location {
        out.push(MarkerDescriptor {
            position: loc,
            kind: MarkerKind::CurrentLocation,
            popup: PopupFields {
                name: CURRENT_LOCATION_NAME.to_string(),
                resources: String::new(),
                address: loc.to_string(),
                contact: String::new(),
            },
            icon: icons.for_kind(MarkerKind::CurrentLocation).clone(),
        });
    }
    out
}

/// Memoizing wrapper around [`project`].
///
/// Output is shared behind an `Arc` and handed back unchanged while the
/// record list (by `Arc` identity) and current location stay the same, so
/// the renderer can compare pointers instead of contents.
#[derive(Debug)]
pub struct MarkerProjector {
    icons: IconSet,
    cached: Option<CacheEntry>,
}

#[derive(Debug)]
struct CacheEntry {
    records: Arc<Vec<ReliefCenterRecord>>,
    current_location: Option<Coordinates>,
    markers: Arc<[MarkerDescriptor]>,
}

impl MarkerProjector {
    pub fn new(icons: IconSet) -> Self {
        Self {
            icons,
            cached: None,
        }
    }

    pub fn markers(
        &mut self,
        records: &Arc<Vec<ReliefCenterRecord>>,
        current_location: Option<Coordinates>,
    ) -> Arc<[MarkerDescriptor]> {
        if let Some(entry) = &self.cached
            && Arc::ptr_eq(&entry.records, records)
            && entry.current_location == current_location
        {
            return entry.markers.clone();
        }

        let markers: Arc<[MarkerDescriptor]> =
            project(records, current_location, &self.icons).into();
        trace!(count = markers.len(), "reprojected markers");
        self.cached = Some(CacheEntry {
            records: records.clone(),
            current_location,
            markers: markers.clone(),
        });
        markers
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Vec<ReliefCenterRecord> {
        vec![
            ReliefCenterRecord::new(json!({
                "_source": {
                    "name": "Tempe Food Bank",
                    "resources": "food, water",
                    "address": "1 Mill Ave",
                    "contact": "555-0100",
                    "location": {"lat": 33.42, "lon": -111.93}
                }
            })),
            ReliefCenterRecord::new(json!({"_source": {}})),
        ]
    }

    #[test]
    fn missing_fields_render_fallbacks() {
        let markers = project(&sample(), None, &IconSet::default());
        assert_eq!(markers.len(), 2);

        let full = &markers[0];
        assert_eq!(full.popup.name, "Tempe Food Bank");
        assert_eq!(full.popup.resources, "food, water");
        assert_eq!(full.position, Coordinates { lat: 33.42, lon: -111.93 });

        let empty = &markers[1];
        assert_eq!(empty.popup.name, UNKNOWN_NAME);
        assert_eq!(empty.popup.resources, NO_RESOURCES);
        assert_eq!(empty.popup.address, NO_ADDRESS);
        assert_eq!(empty.popup.contact, NO_CONTACT);
        assert_eq!(empty.position, Coordinates::ORIGIN);
        assert_eq!(empty.kind, MarkerKind::ReliefCenter);
    }

    #[test]
    fn records_without_any_structure_do_not_fault() {
        let odd = vec![
            ReliefCenterRecord::new(json!(null)),
            ReliefCenterRecord::new(json!("text")),
            ReliefCenterRecord::new(json!({"location": "somewhere"})),
            ReliefCenterRecord::new(json!({"location": {"lat": 12.5}})),
        ];
        let markers = project(&odd, None, &IconSet::default());
        assert_eq!(markers.len(), 4);
        assert!(markers[..3].iter().all(|m| m.position == Coordinates::ORIGIN));
        assert_eq!(markers[3].position, Coordinates { lat: 12.5, lon: 0.0 });
    }

    #[test]
    fn current_location_is_appended_last() {
        let loc = Coordinates {
            lat: 40.0,
            lon: -75.0,
        };
        let icons = IconSet::default();
        let markers = project(&sample(), Some(loc), &icons);
        assert_eq!(markers.len(), 3);
        let last = markers.last().unwrap();
        assert_eq!(last.kind, MarkerKind::CurrentLocation);
        assert_eq!(last.position, loc);
        assert_eq!(last.popup.name, CURRENT_LOCATION_NAME);
        assert_eq!(last.icon, icons.current_location);

        let only_me = project(&[], Some(loc), &icons);
        assert_eq!(only_me.len(), 1);
    }

    #[test]
    fn project_is_idempotent() {
        let records = sample();
        let loc = Some(Coordinates {
            lat: 1.0,
            lon: 2.0,
        });
        let icons = IconSet::default();
        assert_eq!(
            project(&records, loc, &icons),
            project(&records, loc, &icons)
        );
    }

    #[test]
    fn projector_returns_same_allocation_for_unchanged_inputs() {
        let mut projector = MarkerProjector::new(IconSet::default());
        let records = Arc::new(sample());

        let a = projector.markers(&records, None);
        let b = projector.markers(&records, None);
        assert!(Arc::ptr_eq(&a, &b));

        let loc = Some(Coordinates {
            lat: 40.0,
            lon: -75.0,
        });
        let c = projector.markers(&records, loc);
        assert!(!Arc::ptr_eq(&b, &c));
        assert_eq!(c.len(), 3);

        let replaced = Arc::new(sample());
        let d = projector.markers(&replaced, loc);
        assert!(!Arc::ptr_eq(&c, &d));
        assert_eq!(*c, *d);
    }

    #[test]
    fn icons_come_from_map_config() {
        let cfg = MapConfig {
            relief_icon_url: "icons/relief.png".into(),
            ..MapConfig::default()
        };
        let icons = IconSet::from_map_config(&cfg);
        assert_eq!(icons.relief_center.url, "icons/relief.png");
        assert_eq!(icons.relief_center.anchor, (16, 32));
        assert_eq!(icons.for_kind(MarkerKind::CurrentLocation).glyph, '@');
    }
}
