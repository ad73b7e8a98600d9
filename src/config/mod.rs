use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::search::{
    Coordinates, ResourceKind, SearchParams, validate_lat, validate_lon, validate_radius,
};

pub const PROJECT_CONFIG_DIR: &str = ".relief-map";
pub const DEFAULT_BACKEND_URL: &str = "http://localhost:5000";
pub const DEFAULT_TILE_URL: &str = "https://{s}.tile.openstreetmap.org/{z}/{x}/{y}.png";
pub const DEFAULT_GEOLOCATION_ENDPOINT: &str = "http://ip-api.com/json";
pub const DEFAULT_ZOOM: u8 = 12;

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Base URL of the relief-center search service; read once at startup.
    pub backend_url: String,
    pub no_tui: bool,
    pub json: bool,
    pub log_level: String,
    pub log_file: PathBuf,
    pub theme: String,
    pub http: HttpConfig,
    pub search: SearchConfig,
    pub geolocation: GeolocationConfig,
    pub map: MapConfig,
    /// Rejected or unreadable config values, logged once logging is up.
    pub warnings: Vec<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            backend_url: DEFAULT_BACKEND_URL.to_string(),
            no_tui: false,
            json: false,
            log_level: "info".to_string(),
            log_file: PathBuf::from("./relief-map.log"),
            theme: "dark".to_string(),
            http: HttpConfig::default(),
            search: SearchConfig::default(),
            geolocation: GeolocationConfig::default(),
            map: MapConfig::default(),
            warnings: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HttpConfig {
    pub connect_timeout_ms: u64,
    pub request_timeout_ms: u64,
    pub max_retries: usize,
    pub retry_base_ms: u64,
    pub retry_jitter_ms: u64,
    pub respect_retry_after: bool,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: 5_000,
            request_timeout_ms: 15_000,
            max_retries: 2,
            retry_base_ms: 250,
            retry_jitter_ms: 250,
            respect_retry_after: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchConfig {
    pub defaults: SearchParams,
    pub abort_superseded: bool,
    pub refresh_on_locate: bool,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            defaults: SearchParams::default(),
            abort_superseded: true,
            refresh_on_locate: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Ip,
    Fixed,
    Disabled,
}

impl ProviderKind {
    fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "ip" => Some(ProviderKind::Ip),
            "fixed" => Some(ProviderKind::Fixed),
            "none" | "disabled" | "off" => Some(ProviderKind::Disabled),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GeolocationConfig {
    pub provider: ProviderKind,
    pub endpoint: String,
    pub timeout_ms: u64,
    pub locate_on_start: bool,
    pub fixed: Option<Coordinates>,
}

impl Default for GeolocationConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::Ip,
            endpoint: DEFAULT_GEOLOCATION_ENDPOINT.to_string(),
            timeout_ms: 10_000,
            locate_on_start: true,
            fixed: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MapConfig {
    pub zoom: u8,
    pub tile_url: String,
    pub relief_icon_url: String,
    pub location_icon_url: String,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            zoom: DEFAULT_ZOOM,
            tile_url: DEFAULT_TILE_URL.to_string(),
            relief_icon_url: "assets/marker-image.png".to_string(),
            location_icon_url: "assets/current-location.png".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct FileConfig {
    pub backend_url: Option<String>,
    pub theme: Option<String>,
    pub log_level: Option<String>,
    pub log_file: Option<PathBuf>,
    pub http: Option<PartialHttpConfig>,
    pub search: Option<PartialSearchConfig>,
    pub geolocation: Option<PartialGeolocationConfig>,
    pub map: Option<PartialMapConfig>,
    #[serde(skip)]
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct PartialHttpConfig {
    pub connect_timeout_ms: Option<u64>,
    pub request_timeout_ms: Option<u64>,
    pub max_retries: Option<usize>,
    pub retry_base_ms: Option<u64>,
    pub retry_jitter_ms: Option<u64>,
    pub respect_retry_after: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct PartialSearchConfig {
    pub query: Option<String>,
    pub radius_km: Option<f64>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub abort_superseded: Option<bool>,
    pub refresh_on_locate: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct PartialGeolocationConfig {
    pub provider: Option<String>,
    pub endpoint: Option<String>,
    pub timeout_ms: Option<u64>,
    pub locate_on_start: Option<bool>,
    pub fixed_lat: Option<f64>,
    pub fixed_lon: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct PartialMapConfig {
    pub zoom: Option<u8>,
    pub tile_url: Option<String>,
    pub relief_icon_url: Option<String>,
    pub location_icon_url: Option<String>,
}

impl FileConfig {
    /// Field-by-field merge; values in `self` win over `lower`.
    pub fn or(self, lower: FileConfig) -> FileConfig {
        FileConfig {
            backend_url: self.backend_url.or(lower.backend_url),
            theme: self.theme.or(lower.theme),
            log_level: self.log_level.or(lower.log_level),
            log_file: self.log_file.or(lower.log_file),
            http: merge_section(self.http, lower.http, |h, l| PartialHttpConfig {
                connect_timeout_ms: h.connect_timeout_ms.or(l.connect_timeout_ms),
                request_timeout_ms: h.request_timeout_ms.or(l.request_timeout_ms),
                max_retries: h.max_retries.or(l.max_retries),
                retry_base_ms: h.retry_base_ms.or(l.retry_base_ms),
                retry_jitter_ms: h.retry_jitter_ms.or(l.retry_jitter_ms),
                respect_retry_after: h.respect_retry_after.or(l.respect_retry_after),
            }),
            search: merge_section(self.search, lower.search, |h, l| PartialSearchConfig {
                query: h.query.or(l.query),
                radius_km: h.radius_km.or(l.radius_km),
                lat: h.lat.or(l.lat),
                lon: h.lon.or(l.lon),
                abort_superseded: h.abort_superseded.or(l.abort_superseded),
                refresh_on_locate: h.refresh_on_locate.or(l.refresh_on_locate),
            }),
            geolocation: merge_section(self.geolocation, lower.geolocation, |h, l| {
                PartialGeolocationConfig {
                    provider: h.provider.or(l.provider),
                    endpoint: h.endpoint.or(l.endpoint),
                    timeout_ms: h.timeout_ms.or(l.timeout_ms),
                    locate_on_start: h.locate_on_start.or(l.locate_on_start),
                    fixed_lat: h.fixed_lat.or(l.fixed_lat),
                    fixed_lon: h.fixed_lon.or(l.fixed_lon),
                }
            }),
            map: merge_section(self.map, lower.map, |h, l| PartialMapConfig {
                zoom: h.zoom.or(l.zoom),
                tile_url: h.tile_url.or(l.tile_url),
                relief_icon_url: h.relief_icon_url.or(l.relief_icon_url),
                location_icon_url: h.location_icon_url.or(l.location_icon_url),
            }),
            warnings: [self.warnings, lower.warnings].concat(),
        }
    }
}

fn merge_section<T>(high: Option<T>, low: Option<T>, merge: impl FnOnce(T, T) -> T) -> Option<T> {
    match (high, low) {
        (Some(h), Some(l)) => Some(merge(h, l)),
        (h, l) => h.or(l),
    }
}

/// Environment values consulted between CLI flags and config files.
#[derive(Debug, Clone, Default)]
pub struct EnvOverrides {
    pub backend_url: Option<String>,
    pub log_level: Option<String>,
}

impl EnvOverrides {
    pub fn from_env() -> Self {
        Self {
            backend_url: std::env::var("RELIEF_BACKEND_URL")
                .ok()
                .filter(|s| !s.is_empty()),
            log_level: std::env::var("RELIEF_LOG").ok().filter(|s| !s.is_empty()),
        }
    }
}

impl AppConfig {
    pub fn from_cli(cli: crate::Cli) -> Result<Self> {
        let project_root = std::env::current_dir().context("resolve current dir")?;
        let project_cfg = load_project_config(&project_root).unwrap_or_default();
        let file_cfg = load_file_config(cli.config.as_deref()).unwrap_or_default();
        Self::from_sources(cli, EnvOverrides::from_env(), project_cfg.or(file_cfg))
    }

    /// Priority: CLI flags, environment, merged files, built-in defaults.
    pub fn from_sources(cli: crate::Cli, env: EnvOverrides, files: FileConfig) -> Result<Self> {
        let defaults = AppConfig::default();
        let mut warnings = files.warnings;

        let backend_url = cli
            .backend_url
            .or(env.backend_url)
            .or(files.backend_url)
            .unwrap_or(defaults.backend_url);
        let backend_url = backend_url.trim_end_matches('/').to_string();
        if backend_url.is_empty() {
            bail!("backend url must not be empty");
        }

        let log_level = cli
            .log_level
            .or(env.log_level)
            .or(files.log_level)
            .unwrap_or(defaults.log_level);

        let http = {
            let d = HttpConfig::default();
            let p = files.http.unwrap_or_default();
            HttpConfig {
                connect_timeout_ms: p.connect_timeout_ms.unwrap_or(d.connect_timeout_ms),
                request_timeout_ms: p.request_timeout_ms.unwrap_or(d.request_timeout_ms),
                max_retries: p.max_retries.unwrap_or(d.max_retries),
                retry_base_ms: p.retry_base_ms.unwrap_or(d.retry_base_ms),
                retry_jitter_ms: p.retry_jitter_ms.unwrap_or(d.retry_jitter_ms),
                respect_retry_after: p.respect_retry_after.unwrap_or(d.respect_retry_after),
            }
        };

        let search = {
            let d = SearchConfig::default();
            let p = files.search.unwrap_or_default();
            let mut params = file_search_params(&p, d.defaults, &mut warnings);

            // Flags are explicit user input: reject bad values instead of falling back.
            if let Some(q) = cli.query.as_deref() {
                params.query = q.parse()?;
            }
            if let Some(r) = cli.radius {
                params.radius_km = validate_radius(r)?;
            }
            if let Some(lat) = cli.lat {
                params.lat = validate_lat(lat)?;
            }
            if let Some(lon) = cli.lon {
                params.lon = validate_lon(lon)?;
            }

            SearchConfig {
                defaults: params,
                abort_superseded: p.abort_superseded.unwrap_or(d.abort_superseded),
                refresh_on_locate: p.refresh_on_locate.unwrap_or(d.refresh_on_locate),
            }
        };

        let geolocation = {
            let d = GeolocationConfig::default();
            let p = files.geolocation.unwrap_or_default();
            let fixed = match (p.fixed_lat, p.fixed_lon) {
                (Some(lat), Some(lon)) => match Coordinates::new(lat, lon) {
                    Ok(c) => Some(c),
                    Err(e) => {
                        warnings.push(format!("ignoring invalid fixed geolocation: {e}"));
                        None
                    }
                },
                _ => None,
            };
            let provider = match p.provider.as_deref() {
                Some(name) => ProviderKind::parse(name).unwrap_or_else(|| {
                    warnings.push(format!("unknown geolocation provider {name:?}; using ip"));
                    d.provider
                }),
                None if fixed.is_some() => ProviderKind::Fixed,
                None => d.provider,
            };
            let locate_on_start = if cli.no_locate {
                false
            } else if cli.locate {
                true
            } else {
                p.locate_on_start.unwrap_or(d.locate_on_start)
            };
            GeolocationConfig {
                provider,
                endpoint: p.endpoint.unwrap_or(d.endpoint),
                timeout_ms: p.timeout_ms.unwrap_or(d.timeout_ms),
                locate_on_start,
                fixed,
            }
        };

        let map = {
            let d = MapConfig::default();
            let p = files.map.unwrap_or_default();
            MapConfig {
                zoom: p
                    .zoom
                    .map(|z| z.clamp(crate::viewport::MIN_ZOOM, crate::viewport::MAX_ZOOM))
                    .unwrap_or(d.zoom),
                tile_url: p.tile_url.unwrap_or(d.tile_url),
                relief_icon_url: p.relief_icon_url.unwrap_or(d.relief_icon_url),
                location_icon_url: p.location_icon_url.unwrap_or(d.location_icon_url),
            }
        };

        Ok(Self {
            backend_url,
            no_tui: cli.no_tui,
            json: cli.json,
            log_level,
            log_file: files.log_file.unwrap_or(defaults.log_file),
            theme: files.theme.unwrap_or(defaults.theme),
            http,
            search,
            geolocation,
            map,
            warnings,
        })
    }
}

/// File values are validated one by one; a bad value keeps the default.
fn file_search_params(
    p: &PartialSearchConfig,
    defaults: SearchParams,
    warnings: &mut Vec<String>,
) -> SearchParams {
    let mut params = defaults;
    if let Some(q) = p.query.as_deref() {
        match q.parse::<ResourceKind>() {
            Ok(k) => params.query = k,
            Err(e) => warnings.push(format!("ignoring configured search query: {e}")),
        }
    }
    if let Some(r) = p.radius_km {
        match validate_radius(r) {
            Ok(r) => params.radius_km = r,
            Err(e) => warnings.push(format!("ignoring configured search radius: {e}")),
        }
    }
    if let Some(lat) = p.lat {
        match validate_lat(lat) {
            Ok(lat) => params.lat = lat,
            Err(e) => warnings.push(format!("ignoring configured latitude: {e}")),
        }
    }
    if let Some(lon) = p.lon {
        match validate_lon(lon) {
            Ok(lon) => params.lon = lon,
            Err(e) => warnings.push(format!("ignoring configured longitude: {e}")),
        }
    }
    params
}

fn parse_config_file(path: &Path) -> Result<FileConfig> {
    let s = fs::read_to_string(path)
        .with_context(|| format!("read config file: {}", path.display()))?;
    toml::from_str::<FileConfig>(&s)
        .with_context(|| format!("parse config file: {}", path.display()))
}

pub fn load_file_config(explicit: Option<&Path>) -> Result<FileConfig> {
    fn candidate_paths(explicit: Option<&Path>) -> Vec<PathBuf> {
        let mut v = Vec::new();
        if let Some(p) = explicit {
            v.push(p.to_path_buf());
        }
        if let Ok(p) = std::env::var("RELIEF_MAP_CONFIG") {
            v.push(PathBuf::from(p));
        }
        if let Some(dir) = dirs::config_dir() {
            v.push(dir.join("relief-map/config.toml"));
        }
        if let Ok(dirs) = std::env::var("XDG_CONFIG_DIRS") {
            for d in dirs.split(':') {
                if !d.is_empty() {
                    v.push(Path::new(d).join("relief-map/config.toml"));
                }
            }
        }
        v
    }

    // A broken file is skipped in favour of the next candidate.
    let mut warnings = Vec::new();
    for p in candidate_paths(explicit) {
        if !p.exists() {
            continue;
        }
        match parse_config_file(&p) {
            Ok(mut cfg) => {
                cfg.warnings = warnings;
                return Ok(cfg);
            }
            Err(e) => warnings.push(format!("skipping config: {e:#}")),
        }
    }
    Ok(FileConfig {
        warnings,
        ..FileConfig::default()
    })
}

/// Load project-specific configuration from .relief-map/config.toml
pub fn load_project_config(project_root: &Path) -> Result<FileConfig> {
    let path = project_root.join(PROJECT_CONFIG_DIR).join("config.toml");
    if !path.exists() {
        return Ok(FileConfig::default());
    }
    Ok(parse_config_file(&path).unwrap_or_else(|e| FileConfig {
        warnings: vec![format!("skipping config: {e:#}")],
        ..FileConfig::default()
    }))
}

#[cfg(test)]
mod tests;
