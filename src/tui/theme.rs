use ratatui::style::{Color, Modifier, Style};

#[derive(Debug, Clone)]
pub struct Theme {
    pub name: String,
    pub header_style: Style,
    pub footer_style: Style,
    pub log_style: Style,
    pub error_style: Style,
    pub input_style: Style,
    pub map_outline: Color,
    pub radius_color: Color,
    pub relief_style: Style,
    pub location_style: Style,
    pub selected_style: Style,
}

impl Theme {
    pub fn dark() -> Self {
        Self {
            name: "dark".to_string(),
            header_style: Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            footer_style: Style::default().fg(Color::Cyan),
            log_style: Style::default().fg(Color::White),
            error_style: Style::default().fg(Color::Red),
            input_style: Style::default().fg(Color::White),
            map_outline: Color::DarkGray,
            radius_color: Color::Gray,
            relief_style: Style::default().fg(Color::LightRed).add_modifier(Modifier::BOLD),
            location_style: Style::default().fg(Color::LightBlue).add_modifier(Modifier::BOLD),
            selected_style: Style::default().bg(Color::DarkGray).fg(Color::White),
        }
    }

    pub fn light() -> Self {
        Self {
            name: "light".to_string(),
            header_style: Style::default().fg(Color::Blue).add_modifier(Modifier::BOLD),
            footer_style: Style::default().fg(Color::Blue),
            log_style: Style::default().fg(Color::Black),
            error_style: Style::default().fg(Color::Red),
            input_style: Style::default().fg(Color::Black),
            map_outline: Color::Gray,
            radius_color: Color::DarkGray,
            relief_style: Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
            location_style: Style::default().fg(Color::Blue).add_modifier(Modifier::BOLD),
            selected_style: Style::default().bg(Color::Gray).fg(Color::Black),
        }
    }

    /// `None` for names other than `dark` and `light`.
    pub fn by_name(name: &str) -> Option<Self> {
        match name {
            "dark" => Some(Self::dark()),
            "light" => Some(Self::light()),
            _ => None,
        }
    }
}
