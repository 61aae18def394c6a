//! Manga reading engine: two-page spread layout, page turning with chapter
//! boundaries, progressive image loading, scrollbar sync and pan/zoom.

pub mod config;
pub mod error;
pub mod layout;
pub mod models;
pub mod reader;
pub mod store;
pub mod timing;

pub use config::{ReaderOptions, ReadingDirection};
pub use error::{ConfigError, ReaderError};
pub use reader::{Effect, HostButton, HostHooks, MangaReader, TurnDirection};
pub use store::{Changes, EndPageType, State};
