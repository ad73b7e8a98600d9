use anyhow::Result;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::{cursor, execute, terminal};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use std::io::{self, Stdout};
use std::time::{Duration, Instant};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::mpsc::error::TryRecvError;
use tracing::{debug, info};

use crate::controller::{ControllerEvent, ControllerUpdate, SearchStateController};
use crate::markers::MarkerKind;
use crate::search::Coordinates;
use crate::tui::commands::{Command, HELP_TEXT, ZoomArg, parse_command};
use crate::tui::theme::Theme;

type TerminalType = Terminal<CrosstermBackend<Stdout>>;

pub struct TuiApp {
    pub title: String,
    pub input: String,
    pub log: Vec<String>,
    pub max_log_lines: usize,
    /// Index into the relief-center markers (the location marker is never selected).
    pub selected: usize,
    pub theme: Theme,
    pub tile_url: String,
    pub(crate) controller: SearchStateController,
    events: UnboundedReceiver<ControllerEvent>,
    should_quit: bool,
}

impl TuiApp {
    pub fn new(
        title: impl Into<String>,
        controller: SearchStateController,
        events: UnboundedReceiver<ControllerEvent>,
        theme: Theme,
        tile_url: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            input: String::new(),
            log: Vec::new(),
            max_log_lines: 200,
            selected: 0,
            theme,
            tile_url: tile_url.into(),
            controller,
            events,
            should_quit: false,
        }
    }

    pub fn push_log<S: Into<String>>(&mut self, s: S) {
        self.log.push(s.into());
        if self.log.len() > self.max_log_lines {
            let overflow = self.log.len() - self.max_log_lines;
            self.log.drain(0..overflow);
        }
    }

    pub fn run(&mut self) -> Result<()> {
        struct TuiGuard;
        impl Drop for TuiGuard {
            fn drop(&mut self) {
                let mut stdout = io::stdout();
                let _ = execute!(stdout, terminal::LeaveAlternateScreen, cursor::Show);
                let _ = terminal::disable_raw_mode();
            }
        }
        let mut stdout = io::stdout();
        terminal::enable_raw_mode()?;
        execute!(stdout, terminal::EnterAlternateScreen, cursor::Hide)?;
        let _guard = TuiGuard;
        let mut terminal = Terminal::new(CrosstermBackend::new(io::stdout()))?;
        terminal.clear()?;

        self.controller.mount();
        self.push_log(format!("Searching for {}... (/help for commands)", self.controller.params().query.label()));
        self.event_loop(&mut terminal)
    }

    fn event_loop(&mut self, terminal: &mut TerminalType) -> Result<()> {
        let mut last_ctrl_c_at: Option<Instant> = None;
        let mut dirty = true;
        loop {
            if self.drain_events() {
                dirty = true;
            }

            if event::poll(Duration::from_millis(50))?
                && let Event::Key(k) = event::read()?
                && k.kind != KeyEventKind::Release
            {
                if k.code == KeyCode::Char('c') && k.modifiers.contains(KeyModifiers::CONTROL) {
                    let now = Instant::now();
                    if let Some(prev) = last_ctrl_c_at
                        && now.duration_since(prev) <= Duration::from_secs(3)
                    {
                        return Ok(());
                    }
                    last_ctrl_c_at = Some(now);
                    self.push_log("[Press Ctrl+C again within 3s to exit]");
                    dirty = true;
                    continue;
                }
                self.handle_key(k);
                dirty = true;
            }

            if self.should_quit {
                return Ok(());
            }

            if dirty {
                terminal.draw(|f| self.view(f))?;
                dirty = false;
            }
        }
    }

    /// Applies every event the background tasks have delivered so far.
    pub(crate) fn drain_events(&mut self) -> bool {
        let mut changed = false;
        loop {
            match self.events.try_recv() {
                Ok(ev) => {
                    let update = self.controller.handle_event(ev);
                    self.note_update(&update);
                    changed = true;
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    debug!("controller channel closed");
                    break;
                }
            }
        }
        changed
    }

    fn note_update(&mut self, update: &ControllerUpdate) {
        info!(?update, "controller update");
        match update {
            ControllerUpdate::ResultsPublished { .. } => {
                let count = self.relief_count();
                if self.selected >= count {
                    self.selected = count.saturating_sub(1);
                }
                self.push_log(self.controller.status().to_string());
            }
            ControllerUpdate::SearchFailed { error, .. } => {
                self.push_log(format!("[error] Search failed: {error}"));
            }
            ControllerUpdate::StaleDiscarded { .. } => {}
            ControllerUpdate::Relocated { position, search } => {
                let suffix = if search.is_some() { "; refreshing results" } else { "" };
                self.push_log(format!("Moved to your location ({position}){suffix}"));
            }
            ControllerUpdate::LocateFailed(e) => {
                self.push_log(format!(
                    "[error] Could not determine your location: {e}. Keeping {}.",
                    self.controller.params().coordinates()
                ));
            }
        }
    }

    pub(crate) fn relief_count(&mut self) -> usize {
        self.controller
            .markers()
            .iter()
            .filter(|m| m.kind == MarkerKind::ReliefCenter)
            .count()
    }

    fn handle_key(&mut self, k: KeyEvent) {
        match k.code {
            KeyCode::Esc => self.input.clear(),
            KeyCode::Enter => {
                let line = std::mem::take(&mut self.input);
                if line.trim().is_empty() {
                    self.dispatch("/search");
                } else {
                    self.dispatch(&line);
                }
            }
            KeyCode::Tab => {
                let query = self.controller.cycle_query();
                self.push_log(format!("Resource: {} (Enter to search)", query.label()));
            }
            KeyCode::Up => self.selected = self.selected.saturating_sub(1),
            KeyCode::Down => {
                let count = self.relief_count();
                if self.selected + 1 < count {
                    self.selected += 1;
                }
            }
            KeyCode::Char('+') if self.input.is_empty() => {
                self.dispatch("/zoom in");
            }
            KeyCode::Char('-') if self.input.is_empty() => {
                self.dispatch("/zoom out");
            }
            KeyCode::Backspace => {
                self.input.pop();
            }
            KeyCode::Char(c) => self.input.push(c),
            _ => {}
        }
    }

    pub fn dispatch(&mut self, line: &str) {
        let trimmed = line.trim();
        if !trimmed.starts_with('/') {
            self.push_log(format!("[error] Commands start with '/': {trimmed} (try /help)"));
            return;
        }
        match parse_command(trimmed) {
            Ok(cmd) => self.apply_command(cmd),
            Err(e) => self.push_log(format!("[error] {e}")),
        }
    }

    fn apply_command(&mut self, cmd: Command) {
        match cmd {
            Command::Help => self.push_log(HELP_TEXT),
            Command::Quit => self.should_quit = true,
            Command::Clear => self.log.clear(),
            Command::Search => {
                let params = self.controller.params();
                let session = self.controller.trigger_search();
                self.push_log(format!(
                    "Searching {} within {} km of {} ({session})",
                    params.query.label(),
                    params.radius_km,
                    params.coordinates()
                ));
            }
            Command::Locate => {
                self.controller.locate();
                self.push_log("Locating...");
            }
            Command::Query(q) => {
                self.controller.set_query(q);
                self.push_log(format!("Resource: {} (Enter to search)", q.label()));
            }
            Command::Radius(r) => match self.controller.set_radius_km(r) {
                Ok(()) => self.push_log(format!("Radius: {r} km (Enter to search)")),
                Err(e) => self.push_log(format!("[error] {e}")),
            },
            Command::Lat(v) => match self.controller.set_lat(v) {
                Ok(()) => self.push_log(format!("Latitude: {v} (Enter to search)")),
                Err(e) => self.push_log(format!("[error] {e}")),
            },
            Command::Lon(v) => match self.controller.set_lon(v) {
                Ok(()) => self.push_log(format!("Longitude: {v} (Enter to search)")),
                Err(e) => self.push_log(format!("[error] {e}")),
            },
            Command::At(lat, lon) => {
                match Coordinates::new(lat, lon).and_then(|c| self.controller.set_coordinates(c)) {
                    Ok(()) => self.push_log(format!("Center: {lat}, {lon} (Enter to search)")),
                    Err(e) => self.push_log(format!("[error] {e}")),
                }
            }
            Command::Zoom(arg) => {
                let zoom = match arg {
                    ZoomArg::In => self.controller.zoom_in(),
                    ZoomArg::Out => self.controller.zoom_out(),
                    ZoomArg::Level(l) => self.controller.set_zoom(l),
                };
                self.push_log(format!("Zoom: {zoom}"));
            }
            Command::Theme(name) => match Theme::by_name(&name) {
                Some(theme) => {
                    self.theme = theme;
                    self.push_log(format!("Theme: {}", self.theme.name));
                }
                None => self.push_log(format!("[error] unknown theme: {name} (dark, light)")),
            },
        }
    }
}
