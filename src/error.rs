use thiserror::Error;

/// Rejected host input. Engine-internal degenerate states never surface here.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReaderError {
    #[error("image index {index} out of range (image count {len})")]
    ImageIndex { index: usize, len: usize },

    #[error("image {index} reported zero dimensions {width}x{height}")]
    EmptyDimensions { index: usize, width: u32, height: u32 },

    #[error("host button {index} out of range (button count {len})")]
    ButtonIndex { index: usize, len: usize },
}

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("unknown reading direction {0:?}, expected \"rtl\" or \"ltr\"")]
    Direction(String),

    #[error("invalid boolean {value:?} for {key}")]
    Bool { key: &'static str, value: String },

    #[error("invalid number {value:?} for {key}")]
    Number { key: &'static str, value: String },
}
