pub mod spread;

pub use spread::{classify, layout, page_of, segment_of, Proportion};
