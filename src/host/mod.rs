//! Filesystem side of the terminal host: chapter discovery and dimension probing.

pub mod probe;
pub mod scanner;
