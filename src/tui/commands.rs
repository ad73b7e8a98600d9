use thiserror::Error;

use crate::search::{ParamError, ResourceKind};

pub const HELP_TEXT: &str = "/query <food|medical aid|water|shelter>, /radius <km>, /lat <deg>, /lon <deg>, /at <lat> <lon>, /search, /locate, /zoom <in|out|level>, /theme <dark|light>, /clear, /quit  |  Enter: search, Tab: next resource, Up/Down: select, +/-: zoom";

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Help,
    Quit,
    Clear,
    Search,
    Locate,
    Query(ResourceKind),
    Radius(f64),
    Lat(f64),
    Lon(f64),
    At(f64, f64),
    Zoom(ZoomArg),
    Theme(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZoomArg {
    In,
    Out,
    Level(u8),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CommandError {
    #[error("unknown command: {0} (try /help)")]
    Unknown(String),
    #[error("usage: {0}")]
    Usage(&'static str),
    #[error("not a number: {0}")]
    InvalidNumber(String),
    #[error(transparent)]
    Param(#[from] ParamError),
}

fn number(s: &str) -> Result<f64, CommandError> {
    s.parse::<f64>()
        .map_err(|_| CommandError::InvalidNumber(s.to_string()))
}

pub fn parse_command(line: &str) -> Result<Command, CommandError> {
    let line = line.trim();
    let (name, rest) = match line.split_once(char::is_whitespace) {
        Some((name, rest)) => (name, rest.trim()),
        None => (line, ""),
    };
    let args: Vec<&str> = rest.split_whitespace().collect();

    match name {
        "/help" | "/?" => Ok(Command::Help),
        "/quit" | "/exit" => Ok(Command::Quit),
        "/clear" => Ok(Command::Clear),
        "/search" => Ok(Command::Search),
        "/locate" => Ok(Command::Locate),
        "/query" | "/q" => {
            if rest.is_empty() {
                return Err(CommandError::Usage("/query <food|medical aid|water|shelter>"));
            }
            Ok(Command::Query(rest.parse()?))
        }
        "/radius" | "/r" => match args.as_slice() {
            [r] => Ok(Command::Radius(number(r.trim_end_matches("km"))?)),
            _ => Err(CommandError::Usage("/radius <km>")),
        },
        "/lat" => match args.as_slice() {
            [v] => Ok(Command::Lat(number(v)?)),
            _ => Err(CommandError::Usage("/lat <degrees>")),
        },
        "/lon" => match args.as_slice() {
            [v] => Ok(Command::Lon(number(v)?)),
            _ => Err(CommandError::Usage("/lon <degrees>")),
        },
        "/at" => {
            let parts: Vec<&str> = rest
                .split(|c: char| c == ',' || c.is_whitespace())
                .filter(|s| !s.is_empty())
                .collect();
            match parts.as_slice() {
                [lat, lon] => Ok(Command::At(number(lat)?, number(lon)?)),
                _ => Err(CommandError::Usage("/at <lat> <lon>")),
            }
        }
        "/zoom" | "/z" => match args.as_slice() {
            ["in"] | ["+"] => Ok(Command::Zoom(ZoomArg::In)),
            ["out"] | ["-"] => Ok(Command::Zoom(ZoomArg::Out)),
            [level] => level
                .parse::<u8>()
                .map(|l| Command::Zoom(ZoomArg::Level(l)))
                .map_err(|_| CommandError::InvalidNumber(level.to_string())),
            _ => Err(CommandError::Usage("/zoom <in|out|level>")),
        },
        "/theme" => match args.as_slice() {
            [t] => Ok(Command::Theme(t.to_lowercase())),
            _ => Err(CommandError::Usage("/theme <dark|light>")),
        },
        other => Err(CommandError::Unknown(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_query_with_space() {
        assert_eq!(
            parse_command("/query medical aid"),
            Ok(Command::Query(ResourceKind::MedicalAid))
        );
        assert_eq!(
            parse_command("  /q  Water "),
            Ok(Command::Query(ResourceKind::Water))
        );
        assert!(matches!(
            parse_command("/query blankets"),
            Err(CommandError::Param(ParamError::UnknownQuery(_)))
        ));
        assert!(matches!(
            parse_command("/query"),
            Err(CommandError::Usage(_))
        ));
    }

    #[test]
    fn parses_numeric_commands() {
        assert_eq!(parse_command("/radius 15"), Ok(Command::Radius(15.0)));
        assert_eq!(parse_command("/radius 2.5km"), Ok(Command::Radius(2.5)));
        assert_eq!(parse_command("/lat 40.0"), Ok(Command::Lat(40.0)));
        assert_eq!(parse_command("/lon -75"), Ok(Command::Lon(-75.0)));
        assert_eq!(
            parse_command("/at 40.0, -75.0"),
            Ok(Command::At(40.0, -75.0))
        );
        assert_eq!(
            parse_command("/radius ten"),
            Err(CommandError::InvalidNumber("ten".into()))
        );
        assert!(matches!(
            parse_command("/at 40"),
            Err(CommandError::Usage(_))
        ));
    }

    #[test]
    fn parses_zoom_and_simple_commands() {
        assert_eq!(parse_command("/zoom in"), Ok(Command::Zoom(ZoomArg::In)));
        assert_eq!(parse_command("/z -"), Ok(Command::Zoom(ZoomArg::Out)));
        assert_eq!(
            parse_command("/zoom 14"),
            Ok(Command::Zoom(ZoomArg::Level(14)))
        );
        assert_eq!(parse_command("/search"), Ok(Command::Search));
        assert_eq!(parse_command("/locate"), Ok(Command::Locate));
        assert_eq!(parse_command("/exit"), Ok(Command::Quit));
        assert_eq!(
            parse_command("/theme Light"),
            Ok(Command::Theme("light".into()))
        );
        assert_eq!(
            parse_command("/frobnicate"),
            Err(CommandError::Unknown("/frobnicate".into()))
        );
    }
}
