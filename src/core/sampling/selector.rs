//! Typhoon selection.
//!
//! Picks which storms make it into the subset. All randomness comes from the
//! caller's RNG so the same seed always yields the same selection.

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, info};

use crate::core::dataset::{group_by_typhoon, ImageRecord, TyphoonGroup};

/// Strategy for choosing typhoons
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default, clap::ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum SelectionPolicy {
    /// Equal quota per first-occurrence year, corrected to the exact target
    #[default]
    Stratified,
    /// Plain uniform draw over all typhoon ids
    Uniform,
    /// One typhoon per evenly spaced year, no randomness
    YearSpread,
}

impl SelectionPolicy {
    pub fn as_str(&self) -> &str {
        match self {
            SelectionPolicy::Stratified => "stratified",
            SelectionPolicy::Uniform => "uniform",
            SelectionPolicy::YearSpread => "year-spread",
        }
    }
}

/// Select at most `total_typhoons` distinct typhoon ids.
///
/// Asking for more typhoons than the table holds is not an error: the target
/// is capped at the number of distinct ids.
pub fn select_typhoons<R: Rng + ?Sized>(
    records: &[ImageRecord],
    total_typhoons: usize,
    policy: SelectionPolicy,
    rng: &mut R,
) -> Vec<i64> {
    let groups = group_by_typhoon(records);
    let target = total_typhoons.min(groups.len());

    info!(
        "Selecting {} of {} typhoons ({} policy)",
        target,
        groups.len(),
        policy.as_str()
    );

    if target == 0 {
        return Vec::new();
    }

    match policy {
        SelectionPolicy::Stratified => select_stratified(&groups, target, rng),
        SelectionPolicy::Uniform => select_uniform(&groups, target, rng),
        SelectionPolicy::YearSpread => select_year_spread(&groups, target),
    }
}

/// Typhoon ids bucketed by first year. Years ascend and ids ascend within a year.
fn ids_by_first_year(groups: &[TyphoonGroup]) -> BTreeMap<i32, Vec<i64>> {
    let mut by_year: BTreeMap<i32, Vec<i64>> = BTreeMap::new();
    for group in groups {
        by_year.entry(group.first_year).or_default().push(group.typhoon_id);
    }
    by_year
}

fn select_stratified<R: Rng + ?Sized>(groups: &[TyphoonGroup], target: usize, rng: &mut R) -> Vec<i64> {
    let by_year = ids_by_first_year(groups);
    let per_year = (target as f64 / by_year.len() as f64).round_ties_even() as usize;
    debug!("{} years, quota of {} typhoons per year", by_year.len(), per_year);

    let mut selected: Vec<i64> = Vec::with_capacity(target);
    for (year, ids) in &by_year {
        let take = per_year.min(ids.len());
        if take > 0 {
            selected.extend(ids.choose_multiple(rng, take).copied());
        }
        debug!("Year {}: took {} of {}", year, take, ids.len());
    }

    // Top up first; the trim below only runs when rounding overshot, so the
    // two corrections never both apply.
    if selected.len() < target {
        let taken: HashSet<i64> = selected.iter().copied().collect();
        let pool: Vec<i64> = groups
            .iter()
            .map(|g| g.typhoon_id)
            .filter(|id| !taken.contains(id))
            .collect();
        let needed = target - selected.len();
        debug!("Topping up {} typhoons from a pool of {}", needed, pool.len());
        selected.extend(pool.choose_multiple(rng, needed).copied());
    }

    if selected.len() > target {
        debug!("Trimming {} typhoons down to {}", selected.len(), target);
        selected = selected.choose_multiple(rng, target).copied().collect();
    }

    selected
}

fn select_uniform<R: Rng + ?Sized>(groups: &[TyphoonGroup], target: usize, rng: &mut R) -> Vec<i64> {
    let ids: Vec<i64> = groups.iter().map(|g| g.typhoon_id).collect();
    ids.choose_multiple(rng, target).copied().collect()
}

fn select_year_spread(groups: &[TyphoonGroup], target: usize) -> Vec<i64> {
    let by_year = ids_by_first_year(groups);
    let step = (by_year.len() / target).max(1);

    by_year
        .values()
        .step_by(step)
        .take(target)
        .filter_map(|ids| ids.first().copied())
        .collect()
}
