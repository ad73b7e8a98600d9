mod config;
mod controller;
mod exec;
mod geolocation;
mod logging;
mod markers;
mod search;
mod tui;
mod viewport;

use std::{path::PathBuf, process::ExitCode, sync::Arc};

use anyhow::Result;
use clap::{ArgAction, Parser};
use dotenvy::dotenv;
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::controller::{ControllerOptions, SearchStateController, SearchStatus};
use crate::geolocation::GeolocationResolver;
use crate::search::SearchClient;
use crate::tui::{Theme, TuiApp};

#[derive(Parser, Debug, Clone, Default)]
#[command(
    name = "relief-map",
    version,
    about = "Find nearby relief centers (food, medical aid, water, shelter) on a terminal map"
)]
pub struct Cli {
    /// Relief-center search service base URL (env: RELIEF_BACKEND_URL)
    #[arg(long)]
    pub backend_url: Option<String>,

    /// Log level (error,warn,info,debug,trace; env: RELIEF_LOG)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Resource to search for: food, "medical aid", water or shelter
    #[arg(long, short = 'q')]
    pub query: Option<String>,

    /// Search radius in kilometers
    #[arg(long, short = 'r')]
    pub radius: Option<f64>,

    /// Search center latitude
    #[arg(long, allow_hyphen_values = true)]
    pub lat: Option<f64>,

    /// Search center longitude
    #[arg(long, allow_hyphen_values = true)]
    pub lon: Option<f64>,

    /// Look up the current position on start
    #[arg(long, action = ArgAction::SetTrue, conflicts_with = "no_locate")]
    pub locate: bool,

    /// Skip the position lookup on start
    #[arg(long, action = ArgAction::SetTrue)]
    pub no_locate: bool,

    /// Run one search, print the results and exit (disable TUI)
    #[arg(long, action = ArgAction::SetTrue)]
    pub no_tui: bool,

    /// With --no-tui, print results as JSON
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Config file to use instead of the user config
    #[arg(long, short = 'c')]
    pub config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    dotenv().ok();
    let cli = Cli::parse();
    let cfg = AppConfig::from_cli(cli)?;

    if cfg.no_tui {
        logging::init_stderr_logging(&cfg.log_level)?;
    } else {
        logging::init_file_logging(&cfg.log_level, &cfg.log_file)?;
    }
    for w in &cfg.warnings {
        warn!(warning = %w, "config value rejected");
    }
    info!(?cfg, "app config");

    let client = SearchClient::new(cfg.backend_url.clone())?.with_http_config(cfg.http.clone());
    let geolocation = GeolocationResolver::from_config(&cfg.geolocation, &cfg.http);
    let (controller, events) = SearchStateController::new(
        cfg.search.defaults,
        Arc::new(client),
        geolocation,
        ControllerOptions::from_config(&cfg),
    );

    if cfg.no_tui {
        let mut executor = exec::Executor::new(controller, events);
        // The report already names the failure; only the exit code is left.
        match executor.run(cfg.json).await? {
            SearchStatus::Failed(_) => Ok(ExitCode::FAILURE),
            _ => Ok(ExitCode::SUCCESS),
        }
    } else {
        let theme = Theme::by_name(&cfg.theme).unwrap_or_else(|| {
            warn!(theme = %cfg.theme, "unknown theme; using dark");
            Theme::dark()
        });
        let mut app = TuiApp::new(
            "relief-map",
            controller,
            events,
            theme,
            cfg.map.tile_url.clone(),
        );
        for w in &cfg.warnings {
            app.push_log(format!("[warn] config: {w}"));
        }
        app.run()?;
        Ok(ExitCode::SUCCESS)
    }
}
