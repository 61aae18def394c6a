pub mod comic_image;
pub mod page;

pub use comic_image::*;
pub use page::*;
