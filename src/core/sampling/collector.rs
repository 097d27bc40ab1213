use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::{BTreeSet, HashMap, HashSet};
use tracing::{debug, info, warn};

use crate::core::dataset::ImageRecord;

/// How many records of each selected typhoon to keep
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ImagePolicy {
    /// Every record of every selected typhoon
    #[default]
    CollectAll,
    /// At most `per_typhoon` records, always including the earliest, peak and latest
    Capped { per_typhoon: usize },
}

impl ImagePolicy {
    pub fn from_cap(cap: Option<usize>) -> Self {
        match cap {
            Some(per_typhoon) => ImagePolicy::Capped { per_typhoon },
            None => ImagePolicy::CollectAll,
        }
    }
}

/// Gather the records of the selected typhoons.
///
/// Each typhoon's records are sorted chronologically (stable, so ties keep
/// file order) and the typhoons are emitted in selection order. Ids that
/// appear twice in `selected` are only collected once.
pub fn collect_images<R: Rng + ?Sized>(
    records: &[ImageRecord],
    selected: &[i64],
    policy: ImagePolicy,
    rng: &mut R,
) -> Vec<ImageRecord> {
    let mut by_typhoon: HashMap<i64, Vec<&ImageRecord>> = HashMap::new();
    for record in records {
        by_typhoon.entry(record.typhoon_id).or_default().push(record);
    }

    let mut seen = HashSet::new();
    let mut collected = Vec::new();

    for &typhoon_id in selected {
        if !seen.insert(typhoon_id) {
            warn!("Typhoon {} selected twice, collecting it once", typhoon_id);
            continue;
        }
        let Some(typhoon_records) = by_typhoon.get(&typhoon_id) else {
            warn!("Typhoon {} has no records in the table", typhoon_id);
            continue;
        };

        let mut ordered = typhoon_records.clone();
        ordered.sort_by(|a, b| a.cmp_chronological(b));

        let kept: Vec<usize> = match policy {
            ImagePolicy::CollectAll => (0..ordered.len()).collect(),
            ImagePolicy::Capped { per_typhoon } => capped_indices(&ordered, per_typhoon, rng),
        };
        debug!("Typhoon {}: keeping {} of {} records", typhoon_id, kept.len(), ordered.len());

        collected.extend(kept.into_iter().map(|i| ordered[i].clone()));
    }

    info!("Collected {} records for {} typhoons", collected.len(), seen.len());
    collected
}

/// Index of the first record carrying the maximum grade
fn peak_index(ordered: &[&ImageRecord]) -> usize {
    let mut peak = 0;
    for (i, record) in ordered.iter().enumerate() {
        if record.grade > ordered[peak].grade {
            peak = i;
        }
    }
    peak
}

/// Pick at most `cap` indices into a chronologically ordered typhoon.
///
/// Anchors come first (earliest, peak, latest), then an evenly spaced pass over
/// the other indices, then random picks if the quota is still not met.
/// Returned indices are ascending.
fn capped_indices<R: Rng + ?Sized>(ordered: &[&ImageRecord], cap: usize, rng: &mut R) -> Vec<usize> {
    let n = ordered.len();
    if n <= cap {
        return (0..n).collect();
    }

    let mut chosen = BTreeSet::new();
    for anchor in [0, peak_index(ordered), n - 1] {
        if chosen.len() < cap {
            chosen.insert(anchor);
        }
    }

    let remaining = cap - chosen.len();
    if remaining == 0 {
        return chosen.into_iter().collect();
    }

    let available: Vec<usize> = (0..n).filter(|i| !chosen.contains(i)).collect();
    let stride = (available.len() / remaining).max(1);
    chosen.extend(available.iter().step_by(stride).take(remaining).copied());

    if chosen.len() < cap {
        let unused: Vec<usize> = available.iter().copied().filter(|i| !chosen.contains(i)).collect();
        let needed = cap - chosen.len();
        chosen.extend(unused.choose_multiple(rng, needed).copied());
    }

    chosen.into_iter().collect()
}
