mod file_ops;
mod image_index;
mod materialize;

pub use file_ops::create_dir_all;
pub use materialize::{copy_images, copy_metadata_dir, write_filtered_metadata};

#[cfg(test)]
pub(crate) use materialize::{IMAGE_DIR, METADATA_DIR, METADATA_JSON};
