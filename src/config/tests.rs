use crate::Cli;
use crate::config::{
    AppConfig, EnvOverrides, FileConfig, PartialGeolocationConfig, PartialSearchConfig,
    ProviderKind, load_file_config, load_project_config,
};
use crate::search::{Coordinates, ResourceKind};
use std::fs;
use tempfile::TempDir;

#[test]
fn test_load_project_config() {
    let temp_dir = TempDir::new().unwrap();
    let project_root = temp_dir.path();

    let cfg_dir = project_root.join(".relief-map");
    fs::create_dir_all(&cfg_dir).unwrap();

    let config_content = r#"
backend_url = "http://relief.example.org"
theme = "light"

[http]
max_retries = 5
retry_base_ms = 500

[search]
query = "medical aid"
radius_km = 25

[geolocation]
provider = "fixed"
fixed_lat = 40.0
fixed_lon = -75.0
"#;

    fs::write(cfg_dir.join("config.toml"), config_content).unwrap();

    let project_cfg = load_project_config(project_root).unwrap();

    assert_eq!(
        project_cfg.backend_url.as_deref(),
        Some("http://relief.example.org")
    );
    assert_eq!(project_cfg.theme.as_deref(), Some("light"));
    let http = project_cfg.http.clone().unwrap();
    assert_eq!(http.max_retries, Some(5));
    assert_eq!(http.retry_base_ms, Some(500));

    let cfg = AppConfig::from_sources(Cli::default(), EnvOverrides::default(), project_cfg)
        .unwrap();
    assert_eq!(cfg.search.defaults.query, ResourceKind::MedicalAid);
    assert_eq!(cfg.search.defaults.radius_km, 25.0);
    assert_eq!(cfg.geolocation.provider, ProviderKind::Fixed);
    assert_eq!(cfg.geolocation.fixed, Some(Coordinates { lat: 40.0, lon: -75.0 }));
}

#[test]
fn test_load_project_config_not_exists() {
    let temp_dir = TempDir::new().unwrap();
    let project_cfg = load_project_config(temp_dir.path()).unwrap();
    assert_eq!(project_cfg, FileConfig::default());
}

#[test]
fn test_unparseable_project_config_falls_back_to_default() {
    let temp_dir = TempDir::new().unwrap();
    let cfg_dir = temp_dir.path().join(".relief-map");
    fs::create_dir_all(&cfg_dir).unwrap();
    fs::write(cfg_dir.join("config.toml"), "backend_url = [not toml").unwrap();

    let project_cfg = load_project_config(temp_dir.path()).unwrap();
    assert_eq!(project_cfg.backend_url, None);
    assert_eq!(project_cfg.warnings.len(), 1);
    assert!(project_cfg.warnings[0].contains("parse config file"));

    let cfg = AppConfig::from_sources(Cli::default(), EnvOverrides::default(), project_cfg)
        .unwrap();
    assert_eq!(cfg.backend_url, "http://localhost:5000");
    assert_eq!(cfg.warnings.len(), 1);
}

#[test]
fn test_broken_explicit_config_is_reported_and_skipped() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("broken.toml");
    fs::write(&path, "[search\nradius_km = 5").unwrap();

    let cfg = load_file_config(Some(&path)).unwrap();
    assert!(
        cfg.warnings
            .iter()
            .any(|w| w.contains("broken.toml")),
        "{:?}",
        cfg.warnings
    );
}

#[test]
fn test_explicit_config_path_is_read_first() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("custom.toml");
    fs::write(&path, "backend_url = \"http://explicit:8080\"\n").unwrap();

    let cfg = load_file_config(Some(&path)).unwrap();
    assert_eq!(cfg.backend_url.as_deref(), Some("http://explicit:8080"));
}

#[test]
fn test_defaults_without_any_source() {
    let cfg =
        AppConfig::from_sources(Cli::default(), EnvOverrides::default(), FileConfig::default())
            .unwrap();
    assert_eq!(cfg.backend_url, "http://localhost:5000");
    assert_eq!(cfg.search.defaults.query, ResourceKind::Food);
    assert_eq!(cfg.search.defaults.radius_km, 10.0);
    assert_eq!(cfg.search.defaults.lat, 33.4255);
    assert_eq!(cfg.search.defaults.lon, -111.94);
    assert_eq!(cfg.map.zoom, 12);
    assert!(cfg.search.abort_superseded);
    assert!(cfg.geolocation.locate_on_start);
}

#[test]
fn test_priority_cli_over_env_over_file() {
    let files = FileConfig {
        backend_url: Some("http://file".into()),
        log_level: Some("warn".into()),
        ..FileConfig::default()
    };
    let env = EnvOverrides {
        backend_url: Some("http://env/".into()),
        log_level: None,
    };

    let cfg = AppConfig::from_sources(Cli::default(), env.clone(), files.clone()).unwrap();
    assert_eq!(cfg.backend_url, "http://env");
    assert_eq!(cfg.log_level, "warn");

    let cli = Cli {
        backend_url: Some("http://cli".into()),
        ..Cli::default()
    };
    let cfg = AppConfig::from_sources(cli, env, files).unwrap();
    assert_eq!(cfg.backend_url, "http://cli");
}

#[test]
fn test_project_config_wins_over_global_per_field() {
    let project = FileConfig {
        search: Some(PartialSearchConfig {
            radius_km: Some(3.0),
            ..Default::default()
        }),
        ..FileConfig::default()
    };
    let global = FileConfig {
        theme: Some("light".into()),
        search: Some(PartialSearchConfig {
            radius_km: Some(50.0),
            query: Some("water".into()),
            ..Default::default()
        }),
        ..FileConfig::default()
    };

    let merged = project.or(global);
    let search = merged.search.clone().unwrap();
    assert_eq!(search.radius_km, Some(3.0));
    assert_eq!(search.query.as_deref(), Some("water"));
    assert_eq!(merged.theme.as_deref(), Some("light"));
}

#[test]
fn test_invalid_file_search_values_keep_defaults() {
    let files = FileConfig {
        search: Some(PartialSearchConfig {
            query: Some("blankets".into()),
            radius_km: Some(-4.0),
            lat: Some(123.0),
            lon: Some(-75.0),
            ..Default::default()
        }),
        ..FileConfig::default()
    };
    let cfg = AppConfig::from_sources(Cli::default(), EnvOverrides::default(), files).unwrap();
    assert_eq!(cfg.search.defaults.query, ResourceKind::Food);
    assert_eq!(cfg.search.defaults.radius_km, 10.0);
    assert_eq!(cfg.search.defaults.lat, 33.4255);
    assert_eq!(cfg.search.defaults.lon, -75.0);

    assert_eq!(cfg.warnings.len(), 3, "{:?}", cfg.warnings);
    assert!(cfg.warnings[0].starts_with("ignoring configured search query"));
    assert!(cfg.warnings[0].contains("blankets"));
    assert!(cfg.warnings[1].starts_with("ignoring configured search radius"));
    assert!(cfg.warnings[2].starts_with("ignoring configured latitude"));
}

#[test]
fn test_invalid_geolocation_values_are_reported() {
    let files = FileConfig {
        geolocation: Some(PartialGeolocationConfig {
            provider: Some("gps".into()),
            fixed_lat: Some(95.0),
            fixed_lon: Some(0.0),
            ..Default::default()
        }),
        ..FileConfig::default()
    };
    let cfg = AppConfig::from_sources(Cli::default(), EnvOverrides::default(), files).unwrap();
    assert_eq!(cfg.geolocation.provider, ProviderKind::Ip);
    assert_eq!(cfg.geolocation.fixed, None);
    assert!(cfg.warnings.iter().any(|w| w.contains("fixed geolocation")));
    assert!(cfg.warnings.iter().any(|w| w.contains("\"gps\"")));
}

#[test]
fn test_valid_sources_produce_no_warnings() {
    let cfg =
        AppConfig::from_sources(Cli::default(), EnvOverrides::default(), FileConfig::default())
            .unwrap();
    assert!(cfg.warnings.is_empty());
}

#[test]
fn test_merge_keeps_warnings_from_both_layers() {
    let project = FileConfig {
        warnings: vec!["project".into()],
        ..FileConfig::default()
    };
    let global = FileConfig {
        warnings: vec!["global".into()],
        ..FileConfig::default()
    };
    assert_eq!(project.or(global).warnings, vec!["project", "global"]);
}

#[test]
fn test_invalid_cli_values_are_rejected() {
    let cli = Cli {
        radius: Some(0.0),
        ..Cli::default()
    };
    assert!(
        AppConfig::from_sources(cli, EnvOverrides::default(), FileConfig::default()).is_err()
    );

    let cli = Cli {
        query: Some("blankets".into()),
        ..Cli::default()
    };
    assert!(
        AppConfig::from_sources(cli, EnvOverrides::default(), FileConfig::default()).is_err()
    );
}

#[test]
fn test_no_locate_flag_overrides_file() {
    let cli = Cli {
        no_locate: true,
        ..Cli::default()
    };
    let cfg =
        AppConfig::from_sources(cli, EnvOverrides::default(), FileConfig::default()).unwrap();
    assert!(!cfg.geolocation.locate_on_start);
}
