mod record;
mod table;

pub use record::{group_by_typhoon, ImageRecord, TyphoonGroup};
pub use table::{AuxTable, AUX_TABLE_FILE};

#[cfg(test)]
pub(crate) use record::test_support;
