//! Non-interactive mode (`--no-tui`).
//! Mounts the controller, waits for the search (and the position lookup, if
//! one was started) to settle, then prints the markers to stdout. The final
//! status is handed back so the caller can pick the exit code.

use anyhow::Result;
use std::fmt::Write as _;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::info;

use crate::controller::{ControllerEvent, ControllerUpdate, SearchStateController, SearchStatus};
use crate::markers::{MarkerDescriptor, MarkerKind};
use crate::search::SearchParams;

pub struct Executor {
    controller: SearchStateController,
    events: UnboundedReceiver<ControllerEvent>,
}

impl Executor {
    pub fn new(
        controller: SearchStateController,
        events: UnboundedReceiver<ControllerEvent>,
    ) -> Self {
        Self { controller, events }
    }

    pub async fn run(&mut self, json: bool) -> Result<SearchStatus> {
        self.controller.mount();
        while self.controller.is_busy() {
            let Some(ev) = self.events.recv().await else {
                break;
            };
            match self.controller.handle_event(ev) {
                ControllerUpdate::LocateFailed(e) => {
                    eprintln!("Could not determine your location ({e}); using configured coordinates.");
                }
                update => info!(?update, "controller update"),
            }
        }

        let status = self.controller.status();
        let params = self.controller.params();
        let markers = self.controller.markers();
        if json {
            let output = serde_json::json!({
                "success": !matches!(status, SearchStatus::Failed(_)),
                "status": status.to_string(),
                "params": params,
                "markers": &*markers,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        } else {
            print!("{}", format_report(&params, &status, &markers));
        }
        Ok(status)
    }
}

pub fn format_report(
    params: &SearchParams,
    status: &SearchStatus,
    markers: &[MarkerDescriptor],
) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{} within {} km of {}, {}: {}",
        params.query.label(),
        params.radius_km,
        params.lat,
        params.lon,
        status
    );
    for m in markers {
        match m.kind {
            MarkerKind::ReliefCenter => {
                let _ = writeln!(
                    out,
                    "{} {} ({}, {})\n    {}\n    {}\n    {}",
                    m.icon.glyph,
                    m.popup.name,
                    m.position.lat,
                    m.position.lon,
                    m.popup.resources,
                    m.popup.address,
                    m.popup.contact
                );
            }
            MarkerKind::CurrentLocation => {
                let _ = writeln!(out, "{} {} ({})", m.icon.glyph, m.popup.name, m.popup.address);
            }
        }
    }
    out
}
