pub mod app;
pub mod commands;
pub mod rendering;
pub mod theme;

pub use app::TuiApp;
pub use theme::Theme;
