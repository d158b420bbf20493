use std::path::{Path, PathBuf};
use std::time::Duration;

use log::warn;
use ratatui::style::Color;
use serde::Deserialize;

pub const DEFAULT_API_URL: &str = "http://localhost:3000";
pub const API_URL_ENV: &str = "RMANGA_API_URL";
const DEFAULT_THEME: Color = Color::Yellow;

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct ReaderConfig {
    /// Widest viewport, in pixels, still treated as a small screen.
    pub compact_breakpoint: u32,
    pub controls_timeout_ms: u64,
    /// Horizontal drag distance, in pixels, that turns a page.
    pub swipe_threshold: u32,
    pub orientation_settle_ms: u64,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            compact_breakpoint: 768,
            controls_timeout_ms: 3000,
            swipe_threshold: 50,
            orientation_settle_ms: 100,
        }
    }
}

impl ReaderConfig {
    pub fn controls_timeout(&self) -> Duration {
        Duration::from_millis(self.controls_timeout_ms)
    }

    pub fn orientation_settle(&self) -> Duration {
        Duration::from_millis(self.orientation_settle_ms)
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_url: String,
    pub token: Option<String>,
    pub theme_color: Option<String>,
    pub reader: ReaderConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            token: None,
            theme_color: None,
            reader: ReaderConfig::default(),
        }
    }
}

impl Config {
    pub fn path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("rmanga").join("config.toml"))
    }

    /// Reads the config file, then applies the API URL from the environment.
    pub fn load() -> Self {
        let mut config = Self::path()
            .map(|path| Self::load_from(&path))
            .unwrap_or_default();
        if let Ok(url) = std::env::var(API_URL_ENV) {
            if !url.trim().is_empty() {
                config.api_url = url.trim().to_string();
            }
        }
        config
    }

    /// A missing file yields defaults; an unreadable one is logged and ignored.
    pub fn load_from(path: &Path) -> Self {
        let Ok(content) = std::fs::read_to_string(path) else {
            return Self::default();
        };
        match toml::from_str(&content) {
            Ok(config) => config,
            Err(e) => {
                warn!("ignoring invalid config {}: {e}", path.display());
                Self::default()
            }
        }
    }

    pub fn theme(&self) -> Color {
        self.theme_color
            .as_deref()
            .and_then(parse_hex_color)
            .unwrap_or(DEFAULT_THEME)
    }
}

pub fn parse_hex_color(val: &str) -> Option<Color> {
    let val = val.trim().trim_matches('"').trim_matches('\'');
    if !val.is_ascii() || !val.starts_with('#') || val.len() != 7 {
        return None;
    }
    let r = u8::from_str_radix(&val[1..3], 16).ok()?;
    let g = u8::from_str_radix(&val[3..5], 16).ok()?;
    let b = u8::from_str_radix(&val[5..7], 16).ok()?;
    Some(Color::Rgb(r, g, b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("nope.toml"));
        assert_eq!(config, Config::default());
        assert_eq!(config.theme(), Color::Yellow);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "api_url = \"https://manga.example\"\ntheme_color = \"#ff8000\"\n\n[reader]\nswipe_threshold = 80"
        )
        .unwrap();

        let config = Config::load_from(file.path());
        assert_eq!(config.api_url, "https://manga.example");
        assert_eq!(config.theme(), Color::Rgb(255, 128, 0));
        assert_eq!(config.reader.swipe_threshold, 80);
        assert_eq!(config.reader.compact_breakpoint, 768);
        assert_eq!(config.reader.controls_timeout(), Duration::from_secs(3));
    }

    #[test]
    fn invalid_file_falls_back() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "api_url = [").unwrap();
        assert_eq!(Config::load_from(file.path()), Config::default());
    }

    #[test]
    fn hex_colors() {
        assert_eq!(parse_hex_color("#000000"), Some(Color::Rgb(0, 0, 0)));
        assert_eq!(parse_hex_color("'#0a0B0c'"), Some(Color::Rgb(10, 11, 12)));
        assert_eq!(parse_hex_color("red"), None);
        assert_eq!(parse_hex_color("#12345"), None);
        assert_eq!(parse_hex_color("#zz0000"), None);
    }
}
