mod collector;
mod filter;
mod selector;

pub use collector::{collect_images, ImagePolicy};
pub use filter::LowCountFilter;
pub use selector::{select_typhoons, SelectionPolicy};
