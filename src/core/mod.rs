pub mod dataset;
pub mod notebook;
pub mod operations;
pub mod sampling;
