//! Reader options and their environment overrides.

use std::fmt;
use std::str::FromStr;

use tracing::warn;

use crate::error::ConfigError;

/// Smallest per-image magnification in scroll mode.
pub const MIN_IMG_SCALE: f64 = 0.1;
/// Largest per-image magnification in scroll mode.
pub const MAX_IMG_SCALE: f64 = 3.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadingDirection {
    #[default]
    Rtl,
    Ltr,
}

impl ReadingDirection {
    pub fn flipped(self) -> Self {
        match self {
            Self::Rtl => Self::Ltr,
            Self::Ltr => Self::Rtl,
        }
    }
}

impl FromStr for ReadingDirection {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "rtl" => Ok(Self::Rtl),
            "ltr" => Ok(Self::Ltr),
            _ => Err(ConfigError::Direction(s.to_string())),
        }
    }
}

impl fmt::Display for ReadingDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Rtl => "rtl",
            Self::Ltr => "ltr",
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReaderOptions {
    pub dir: ReadingDirection,
    pub scroll_mode: bool,
    pub one_page_mode: bool,
    /// Turning past either end moves to the neighbouring chapter.
    pub flip_to_next: bool,
    /// Keep loading every image even for long chapters.
    pub always_load_all_img: bool,
    pub scroll_mode_img_scale: f64,
    pub show_comment: bool,
    pub disable_zoom: bool,
}

impl Default for ReaderOptions {
    fn default() -> Self {
        Self {
            dir: ReadingDirection::Rtl,
            scroll_mode: false,
            one_page_mode: false,
            flip_to_next: true,
            always_load_all_img: false,
            scroll_mode_img_scale: 1.0,
            show_comment: true,
            disable_zoom: false,
        }
    }
}

impl ReaderOptions {
    /// Defaults with `MANGAFLOW_*` environment overrides applied.
    pub fn from_env() -> Self {
        let mut options = Self::default();
        options.apply_overrides(|key| std::env::var(key).ok());
        options
    }

    /// Apply overrides from any key lookup. Invalid values are logged and skipped.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("MANGAFLOW_DIR") {
            match v.parse() {
                Ok(dir) => self.dir = dir,
                Err(err) => warn!("Ignoring override: {err}"),
            }
        }

        let flags: [(&'static str, &mut bool); 6] = [
            ("MANGAFLOW_SCROLL_MODE", &mut self.scroll_mode),
            ("MANGAFLOW_ONE_PAGE", &mut self.one_page_mode),
            ("MANGAFLOW_FLIP_TO_NEXT", &mut self.flip_to_next),
            ("MANGAFLOW_LOAD_ALL", &mut self.always_load_all_img),
            ("MANGAFLOW_SHOW_COMMENT", &mut self.show_comment),
            ("MANGAFLOW_DISABLE_ZOOM", &mut self.disable_zoom),
        ];
        for (key, slot) in flags {
            if let Some(v) = lookup(key) {
                match parse_bool(key, &v) {
                    Ok(b) => *slot = b,
                    Err(err) => warn!("Ignoring override: {err}"),
                }
            }
        }

        if let Some(v) = lookup("MANGAFLOW_IMG_SCALE") {
            match v.trim().parse::<f64>() {
                Ok(scale) if scale.is_finite() => {
                    self.scroll_mode_img_scale = scale.clamp(MIN_IMG_SCALE, MAX_IMG_SCALE);
                }
                _ => warn!(
                    "Ignoring override: {}",
                    ConfigError::Number {
                        key: "MANGAFLOW_IMG_SCALE",
                        value: v.clone(),
                    }
                ),
            }
        }

        // Scroll mode always lays out one image per page.
        if self.scroll_mode {
            self.one_page_mode = true;
        }
    }
}

pub fn parse_bool(key: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Bool {
            key,
            value: value.to_string(),
        }),
    }
}
