//! The sampling pipeline: load, select, collect, filter, materialize.

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use std::fs;
use std::path::PathBuf;
use tracing::{info, info_span, warn};

use crate::config::SampleConfig;
use crate::core::dataset::{AuxTable, AUX_TABLE_FILE};
use crate::core::operations::{copy_images, copy_metadata_dir, create_dir_all, write_filtered_metadata};
use crate::core::sampling::{collect_images, select_typhoons};

pub const SUMMARY_FILE: &str = "sample_summary.json";
pub const CONFIG_SNAPSHOT_FILE: &str = "sample_config.json";

/// What a sampling run produced
#[derive(Debug, Clone, Default, Serialize)]
pub struct SampleSummary {
    pub typhoons_available: usize,
    pub images_available: usize,
    pub typhoons_selected: usize,
    pub images_collected: usize,
    pub typhoons_kept: usize,
    pub images_kept: usize,
    pub images_copied: usize,
    pub images_not_found: Vec<String>,
    /// Ids chosen by the selector, in selection order
    pub selected_typhoons: Vec<i64>,
    pub metadata_files_copied: Option<usize>,
    pub metadata_entries_kept: Option<usize>,
    pub output_dir: PathBuf,
}

impl SampleSummary {
    pub fn average_images_per_typhoon(&self) -> f64 {
        if self.typhoons_kept == 0 {
            0.0
        } else {
            self.images_kept as f64 / self.typhoons_kept as f64
        }
    }
}

fn copy_progress_bar(show: bool) -> ProgressBar {
    if !show {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new(0);
    if let Ok(style) = ProgressStyle::with_template(
        "[{elapsed_precise} ETA: {eta}] Copying images: {wide_bar:.cyan/blue} {human_pos}/{human_len}",
    ) {
        bar.set_style(style.progress_chars("=>-"));
    }
    bar
}

/// Run the whole pipeline for one configuration.
///
/// `show_progress` controls the image copy progress bar; it is drawn on
/// stderr and hides itself when stderr is not a terminal.
pub fn run_sampling(config: &SampleConfig, show_progress: bool) -> Result<SampleSummary> {
    let _span = info_span!("run_sampling").entered();
    config.validate()?;

    create_dir_all(&config.output_dir)
        .with_context(|| format!("creating output directory {:?}", config.output_dir))?;

    info!("Loading data from {:?}", config.root);
    let table = AuxTable::load_from_root(&config.root).context("loading aux table")?;

    let mut summary = SampleSummary {
        typhoons_available: table.typhoon_count(),
        images_available: table.len(),
        output_dir: config.output_dir.clone(),
        ..SampleSummary::default()
    };
    info!(
        "Full dataset: {} typhoons | {} images",
        summary.typhoons_available, summary.images_available
    );

    let mut rng = ChaCha8Rng::seed_from_u64(config.random_seed);

    let selected = select_typhoons(
        table.records(),
        config.total_typhoons,
        config.selection_policy,
        &mut rng,
    );
    summary.typhoons_selected = selected.len();
    info!("Sampled {} unique typhoons", selected.len());

    let collected = collect_images(table.records(), &selected, config.image_policy(), &mut rng);
    summary.images_collected = collected.len();

    let kept = config.low_count_filter().apply(collected);
    let subset = table.with_records(kept);
    summary.typhoons_kept = subset.typhoon_count();
    summary.images_kept = subset.len();
    info!(
        "After filtering >= {} images: kept {} typhoons | {} images ({:.1} images/typhoon)",
        config.min_images_per_typhoon,
        summary.typhoons_kept,
        summary.images_kept,
        summary.average_images_per_typhoon()
    );
    if subset.is_empty() {
        warn!("No records survived sampling; the output table will only have a header");
    }

    let table_path = config.output_dir.join(AUX_TABLE_FILE);
    info!("Saving aux table to {:?}", table_path);
    subset.write(&table_path).context("saving sampled aux table")?;

    let progress = copy_progress_bar(show_progress);
    let report = copy_images(subset.records(), &config.root, &config.output_dir, &progress)
        .context("copying images")?;
    info!("Copied {} images | Not found: {}", report.copied, report.not_found.len());
    summary.images_copied = report.copied;
    summary.images_not_found = report.not_found;

    summary.metadata_files_copied =
        copy_metadata_dir(&config.root, &config.output_dir).context("copying metadata directory")?;
    summary.metadata_entries_kept = write_filtered_metadata(&config.root, &config.output_dir, &selected)
        .context("filtering metadata.json")?;
    summary.selected_typhoons = selected;

    if config.write_summary {
        let summary_path = config.output_dir.join(SUMMARY_FILE);
        let json = serde_json::to_string_pretty(&summary)?;
        fs::write(&summary_path, json).with_context(|| format!("writing {:?}", summary_path))?;
        config
            .save(&config.output_dir.join(CONFIG_SNAPSHOT_FILE))
            .context("writing config snapshot")?;
    }

    info!("Subset created in {:?}", config.output_dir);
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::operations::{IMAGE_DIR, METADATA_DIR, METADATA_JSON};
    use crate::core::sampling::SelectionPolicy;
    use std::collections::{BTreeMap, HashSet};
    use std::path::Path;
    use tempfile::TempDir;

    /// Dataset with typhoons 1, 2, 3 holding 10, 60 and 5 images, one
    /// extra column, metadata, and every image on disk except typhoon 2's last
    fn build_source(root: &Path) {
        let mut csv = String::from("id,year,month,day,hour,grade,image_path,wind\n");
        for (id, count, year) in [(1i64, 10usize, 2001), (2, 60, 2002), (3, 5, 2003)] {
            // Reverse chronological in the file to check sorting
            for i in (0..count).rev() {
                let (day, hour) = (1 + i / 24, i % 24);
                let name = format!("{id}-{year}01{day:02}{hour:02}.h5");
                csv.push_str(&format!("{id},{year},1,{day},{hour},{},{name},{}.5\n", 2 + i % 3, i));
                if !(id == 2 && i == count - 1) {
                    let path = root.join(IMAGE_DIR).join(id.to_string()).join(&name);
                    fs::create_dir_all(path.parent().unwrap()).unwrap();
                    fs::write(path, name.as_bytes()).unwrap();
                }
            }
        }
        fs::write(root.join(AUX_TABLE_FILE), csv).unwrap();

        fs::create_dir_all(root.join(METADATA_DIR)).unwrap();
        fs::write(root.join(METADATA_DIR).join("2.json"), r#"{"id": 2}"#).unwrap();
        fs::write(
            root.join(METADATA_JSON),
            r#"{"1": {"n": 10}, "2": {"n": 60}, "3": {"n": 5}, "4": {"n": 0}}"#,
        )
        .unwrap();
    }

    fn config_for(src: &TempDir, out: &TempDir) -> SampleConfig {
        SampleConfig {
            root: src.path().to_path_buf(),
            output_dir: out.path().join("sampled"),
            total_typhoons: 500,
            min_images_per_typhoon: 50,
            random_seed: 7,
            write_summary: true,
            ..SampleConfig::default()
        }
    }

    #[test]
    fn test_full_run_keeps_only_large_typhoon() {
        let src = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        build_source(src.path());
        let config = config_for(&src, &out);

        let summary = run_sampling(&config, false).unwrap();

        assert_eq!(summary.typhoons_available, 3);
        assert_eq!(summary.typhoons_selected, 3);
        assert_eq!(summary.images_collected, 75);
        assert_eq!(summary.typhoons_kept, 1);
        assert_eq!(summary.images_kept, 60);
        assert_eq!(summary.images_copied, 59);
        assert_eq!(summary.images_not_found, vec!["2-2002010311.h5".to_string()]);
        assert_eq!(summary.metadata_files_copied, Some(1));
        assert_eq!(summary.metadata_entries_kept, Some(3));

        let written = AuxTable::load(&config.output_dir.join(AUX_TABLE_FILE)).unwrap();
        assert_eq!(written.len(), 60);
        assert!(written.records().iter().all(|r| r.typhoon_id == 2));
        assert!(written
            .records()
            .windows(2)
            .all(|w| w[0].cmp_chronological(&w[1]).is_le()));
        assert_eq!(written.headers().get(7), Some("wind"));
        assert_eq!(written.records()[0].row().get(7), Some("0.5"));

        assert!(config.output_dir.join(IMAGE_DIR).join("2").join("2-2002010100.h5").is_file());
        assert!(config.output_dir.join(METADATA_DIR).join("2.json").is_file());
        assert!(config.output_dir.join(SUMMARY_FILE).is_file());
        assert!(config.output_dir.join(CONFIG_SNAPSHOT_FILE).is_file());
    }

    #[test]
    fn test_no_leakage_and_within_typhoon_order() {
        let src = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        build_source(src.path());
        let config = SampleConfig {
            total_typhoons: 2,
            min_images_per_typhoon: 0,
            selection_policy: SelectionPolicy::Uniform,
            ..config_for(&src, &out)
        };

        let summary = run_sampling(&config, false).unwrap();
        let written = AuxTable::load(&config.output_dir.join(AUX_TABLE_FILE)).unwrap();

        let selected: HashSet<i64> = summary.selected_typhoons.iter().copied().collect();
        assert_eq!(selected.len(), 2);
        assert!(written.records().iter().all(|r| selected.contains(&r.typhoon_id)));

        let mut blocks: BTreeMap<i64, Vec<(i32, u32, u32, u32)>> = BTreeMap::new();
        for record in written.records() {
            blocks.entry(record.typhoon_id).or_default().push(record.timestamp_key());
        }
        for keys in blocks.values() {
            assert!(keys.windows(2).all(|w| w[0] <= w[1]));
        }
    }

    #[test]
    fn test_same_seed_same_output_table() {
        let src = TempDir::new().unwrap();
        build_source(src.path());
        let out_a = TempDir::new().unwrap();
        let out_b = TempDir::new().unwrap();
        let base = SampleConfig {
            total_typhoons: 2,
            min_images_per_typhoon: 0,
            images_per_typhoon: Some(6),
            ..config_for(&src, &out_a)
        };
        let other = SampleConfig {
            output_dir: out_b.path().join("sampled"),
            ..base.clone()
        };

        run_sampling(&base, false).unwrap();
        run_sampling(&other, false).unwrap();

        let a = fs::read_to_string(base.output_dir.join(AUX_TABLE_FILE)).unwrap();
        let b = fs::read_to_string(other.output_dir.join(AUX_TABLE_FILE)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_default_output_only_mirrors_source_layout() {
        let src = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        build_source(src.path());
        let config = SampleConfig {
            write_summary: false,
            ..config_for(&src, &out)
        };

        run_sampling(&config, false).unwrap();

        let mut entries: Vec<String> = fs::read_dir(&config.output_dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        entries.sort();
        assert_eq!(entries, vec![AUX_TABLE_FILE, IMAGE_DIR, METADATA_DIR, METADATA_JSON]);
    }

    #[test]
    fn test_missing_table_is_fatal() {
        let src = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        let config = config_for(&src, &out);

        assert!(run_sampling(&config, false).is_err());
    }
}
