use std::collections::HashMap;
use tracing::info;

use crate::core::dataset::ImageRecord;

/// Drops typhoons that ended up with too few images
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LowCountFilter {
    /// Minimum number of records a typhoon needs to survive. 0 disables the filter.
    pub min_images: usize,
}

impl LowCountFilter {
    pub fn new(min_images: usize) -> Self {
        Self { min_images }
    }

    /// Check if the filter removes anything at all
    pub fn is_active(&self) -> bool {
        self.min_images > 0
    }

    /// Remove every typhoon with fewer than `min_images` records.
    /// Surviving records keep their relative order.
    pub fn apply(&self, records: Vec<ImageRecord>) -> Vec<ImageRecord> {
        if !self.is_active() {
            return records;
        }

        let mut counts: HashMap<i64, usize> = HashMap::new();
        for record in &records {
            *counts.entry(record.typhoon_id).or_default() += 1;
        }

        let dropped = counts.values().filter(|&&n| n < self.min_images).count();
        info!(
            "Dropping {} of {} typhoons with fewer than {} images",
            dropped,
            counts.len(),
            self.min_images
        );

        records
            .into_iter()
            .filter(|r| counts[&r.typhoon_id] >= self.min_images)
            .collect()
    }
}
