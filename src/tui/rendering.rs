use ratatui::{
    prelude::*,
    symbols,
    widgets::{
        Block, Borders, List, ListItem, ListState, Paragraph, Wrap,
        canvas::{Canvas, Circle, Map, MapResolution, Points},
    },
};
use unicode_width::UnicodeWidthChar;

use crate::controller::SearchStatus;
use crate::markers::{MarkerDescriptor, MarkerKind};
use crate::search::SearchParams;
use crate::tui::app::TuiApp;
use crate::viewport::Viewport;

pub fn truncate_display(s: &str, max: usize) -> String {
    if max == 0 {
        return String::new();
    }
    let mut width = 0usize;
    let mut out = String::new();
    for ch in s.chars() {
        let ch_w = ch.width().unwrap_or(0);
        if ch_w == 0 {
            out.push(ch);
            continue;
        }
        if width + ch_w > max {
            break;
        }
        out.push(ch);
        width += ch_w;
    }
    out
}

/// One-line summary of the search form.
pub fn search_bar_line(title: &str, params: &SearchParams, viewport: &Viewport) -> String {
    format!(
        "{title}  |  Resource: {}  |  Radius: {} km  |  Center: {}  |  Zoom: {}",
        params.query.label(),
        params.radius_km,
        params.coordinates(),
        viewport.zoom
    )
}

/// Search radius in degrees of latitude, for drawing the radius ring.
pub fn radius_degrees(radius_km: f64) -> f64 {
    radius_km / KM_PER_DEGREE
}

const KM_PER_DEGREE: f64 = 111.32;

/// Width-to-height ratio of a map area in degrees. Terminal cells are
/// roughly twice as tall as they are wide.
pub fn map_aspect(area: Rect) -> f64 {
    let inner_w = area.width.saturating_sub(2) as f64;
    let inner_h = area.height.saturating_sub(2) as f64;
    if inner_h == 0.0 {
        return 1.0;
    }
    inner_w / (inner_h * 2.0)
}

impl TuiApp {
    pub fn view(&mut self, f: &mut Frame) {
        let size = f.area();
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(2), // Search bar
                Constraint::Min(6),    // Map and list
                Constraint::Length(5), // Notices
                Constraint::Length(1), // Status footer
                Constraint::Length(3), // Input
            ])
            .split(size);

        let markers = self.controller.markers();
        self.render_header(f, chunks[0]);

        let body = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(62), Constraint::Percentage(38)])
            .split(chunks[1]);
        self.render_map(f, body[0], &markers);

        let side = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(3), Constraint::Length(7)])
            .split(body[1]);
        self.render_list(f, side[0], &markers);
        self.render_details(f, side[1], &markers);

        self.render_log(f, chunks[2]);
        self.render_footer(f, chunks[3]);
        self.render_input(f, chunks[4]);
    }

    fn render_header(&self, f: &mut Frame, area: Rect) {
        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(1), Constraint::Length(1)])
            .split(area);
        let line = search_bar_line(
            &self.title,
            &self.controller.params(),
            &self.controller.viewport(),
        );
        f.render_widget(
            Paragraph::new(truncate_display(&line, area.width as usize))
                .style(self.theme.header_style),
            rows[0],
        );
        f.render_widget(
            Paragraph::new("-".repeat(area.width as usize)).style(self.theme.footer_style),
            rows[1],
        );
    }

    fn render_map(&self, f: &mut Frame, area: Rect, markers: &[MarkerDescriptor]) {
        let viewport = self.controller.viewport();
        let bounds = viewport.bounds(map_aspect(area));
        let theme = &self.theme;
        let selected = self.selected;
        let params = self.controller.params();

        let relief: Vec<(f64, f64)> = markers
            .iter()
            .filter(|m| m.kind == MarkerKind::ReliefCenter)
            .map(|m| (m.position.lon, m.position.lat))
            .collect();

        let canvas = Canvas::default()
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title(format!(" Map ({}) ", viewport.center)),
            )
            .marker(symbols::Marker::Braille)
            .x_bounds([bounds.west, bounds.east])
            .y_bounds([bounds.south, bounds.north])
            .paint(move |ctx| {
                ctx.draw(&Map {
                    color: theme.map_outline,
                    resolution: MapResolution::High,
                });
                ctx.draw(&Circle {
                    x: params.lon,
                    y: params.lat,
                    radius: radius_degrees(params.radius_km),
                    color: theme.radius_color,
                });
                ctx.layer();
                ctx.draw(&Points {
                    coords: &relief,
                    color: theme.relief_style.fg.unwrap_or(Color::Red),
                });
                let mut relief_idx = 0usize;
                for m in markers {
                    if !bounds.contains(m.position) {
                        if m.kind == MarkerKind::ReliefCenter {
                            relief_idx += 1;
                        }
                        continue;
                    }
                    let style = match m.kind {
                        MarkerKind::ReliefCenter => {
                            let s = if relief_idx == selected {
                                theme.selected_style
                            } else {
                                theme.relief_style
                            };
                            relief_idx += 1;
                            s
                        }
                        MarkerKind::CurrentLocation => theme.location_style,
                    };
                    ctx.print(
                        m.position.lon,
                        m.position.lat,
                        Span::styled(m.icon.glyph.to_string(), style),
                    );
                }
            });
        f.render_widget(canvas, area);
    }

    fn render_list(&self, f: &mut Frame, area: Rect, markers: &[MarkerDescriptor]) {
        let width = area.width.saturating_sub(4) as usize;
        let items: Vec<ListItem> = markers
            .iter()
            .filter(|m| m.kind == MarkerKind::ReliefCenter)
            .map(|m| {
                let text = format!("{} {}: {}", m.icon.glyph, m.popup.name, m.popup.resources);
                ListItem::new(truncate_display(&text, width)).style(self.theme.relief_style)
            })
            .collect();
        let count = items.len();
        let title = match self.controller.status() {
            SearchStatus::Searching => " Relief centers (searching...) ".to_string(),
            _ => format!(" Relief centers ({count}) "),
        };
        let list = List::new(items)
            .block(Block::default().borders(Borders::ALL).title(title))
            .highlight_style(self.theme.selected_style);
        let mut state = ListState::default();
        if count > 0 {
            state.select(Some(self.selected.min(count - 1)));
        }
        f.render_stateful_widget(list, area, &mut state);
    }

    fn render_details(&self, f: &mut Frame, area: Rect, markers: &[MarkerDescriptor]) {
        let selected = markers
            .iter()
            .filter(|m| m.kind == MarkerKind::ReliefCenter)
            .nth(self.selected)
            .or_else(|| {
                markers
                    .iter()
                    .find(|m| m.kind == MarkerKind::CurrentLocation)
            });
        let lines: Vec<Line> = match selected {
            Some(m) => {
                let style = match m.kind {
                    MarkerKind::ReliefCenter => self.theme.relief_style,
                    MarkerKind::CurrentLocation => self.theme.location_style,
                };
                vec![
                    Line::from(Span::styled(m.popup.name.clone(), style)),
                    Line::from(format!("Resources: {}", m.popup.resources)),
                    Line::from(format!("Address: {}", m.popup.address)),
                    Line::from(format!("Contact: {}", m.popup.contact)),
                    Line::from(format!("At: {}", m.position)),
                ]
            }
            None => vec![Line::from("Nothing selected")],
        };
        f.render_widget(
            Paragraph::new(lines)
                .block(Block::default().borders(Borders::ALL).title(" Details "))
                .wrap(Wrap { trim: true }),
            area,
        );
    }

    fn render_log(&self, f: &mut Frame, area: Rect) {
        let start = self.log.len().saturating_sub(area.height as usize);
        let lines: Vec<Line> = self.log[start..]
            .iter()
            .map(|l| {
                let style = if l.starts_with("[error]") {
                    self.theme.error_style
                } else {
                    self.theme.log_style
                };
                Line::from(Span::styled(
                    truncate_display(l, area.width as usize),
                    style,
                ))
            })
            .collect();
        f.render_widget(Paragraph::new(lines), area);
    }

    fn render_footer(&self, f: &mut Frame, area: Rect) {
        let status = self.controller.status();
        let mut text = format!("[{status}]");
        if let Some(at) = self.controller.last_updated() {
            text.push_str(&format!("  updated {}", at.format("%H:%M:%S")));
        }
        if let Some(pos) = self.controller.current_location() {
            text.push_str(&format!("  you: {pos}"));
        } else if let Some(e) = self.controller.last_geolocation_error() {
            text.push_str(&format!("  location unavailable: {e}"));
        }
        if !self.tile_url.is_empty() {
            text.push_str(&format!("  tiles: {}", self.tile_url));
        }
        let style = if matches!(status, SearchStatus::Failed(_)) {
            self.theme.error_style
        } else {
            self.theme.footer_style
        };
        f.render_widget(
            Paragraph::new(truncate_display(&text, area.width as usize)).style(style),
            area,
        );
    }

    fn render_input(&self, f: &mut Frame, area: Rect) {
        let prompt = if self.input.is_empty() {
            "> (Enter to search, /help for commands)".to_string()
        } else {
            format!("> {}", self.input)
        };
        f.render_widget(
            Paragraph::new(truncate_display(&prompt, area.width.saturating_sub(2) as usize))
                .style(self.theme.input_style)
                .block(Block::default().borders(Borders::ALL)),
            area,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::{Coordinates, ResourceKind};

    #[test]
    fn truncate_respects_wide_chars() {
        assert_eq!(truncate_display("abcdef", 3), "abc");
        assert_eq!(truncate_display("避難所です", 5), "避難");
        assert_eq!(truncate_display("anything", 0), "");
    }

    #[test]
    fn search_bar_shows_form_values() {
        let params = SearchParams {
            query: ResourceKind::Shelter,
            radius_km: 25.0,
            ..SearchParams::default()
        };
        let viewport = Viewport {
            center: Coordinates {
                lat: params.lat,
                lon: params.lon,
            },
            zoom: 12,
        };
        assert_eq!(
            search_bar_line("relief-map", &params, &viewport),
            "relief-map  |  Resource: Shelter  |  Radius: 25 km  |  Center: 33.4255, -111.94  |  Zoom: 12"
        );
    }

    #[test]
    fn radius_ring_scales_with_km() {
        assert!((radius_degrees(111.32) - 1.0).abs() < 1e-9);
        assert!(radius_degrees(10.0) < radius_degrees(25.0));
    }

    #[test]
    fn aspect_accounts_for_cell_shape() {
        assert_eq!(map_aspect(Rect::new(0, 0, 42, 12)), 2.0);
        assert_eq!(map_aspect(Rect::new(0, 0, 10, 2)), 1.0);
    }
}
