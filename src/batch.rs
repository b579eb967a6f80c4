/// Folder batch synthesis.
///
/// Every `.gpx` file under the input folder becomes one independent
/// synthesis run on a rayon pool. Run `i` (in file-name order) draws from its
/// own `ChaCha8Rng` seeded with `seed + i`, so output does not depend on
/// scheduling.
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use csv::Writer;
use log::{info, warn};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::Serialize;
use walkdir::WalkDir;

use crate::config::SynthConfig;
use crate::error::Result;
use crate::export;
use crate::gpx_io;
use crate::track;

pub const RESULTS_FILENAME: &str = "synthesis_results.csv";

#[derive(Debug, Clone, Default)]
pub struct BatchOptions {
    /// Worker threads; all cores when `None`.
    pub jobs: Option<usize>,
    pub seed: u64,
    /// Also write a per-point CSV next to each output GPX.
    pub write_csv: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchResult {
    pub original_filename: String,
    pub output_filename: String,
    pub route_points: usize,
    pub skipped_samples: usize,
    pub output_points: usize,
    pub distance_km: f64,
    pub ascent_m: f64,
    pub duration: String,
    pub average_heart_rate: f64,
    pub estimated_calories: f64,
    pub processing_status: String,
}

impl BatchResult {
    pub fn is_success(&self) -> bool {
        self.processing_status == "SUCCESS"
    }

    fn error(original_filename: String, output_filename: String, status: String) -> Self {
        BatchResult {
            original_filename,
            output_filename,
            route_points: 0,
            skipped_samples: 0,
            output_points: 0,
            distance_km: 0.0,
            ascent_m: 0.0,
            duration: String::new(),
            average_heart_rate: 0.0,
            estimated_calories: 0.0,
            processing_status: status,
        }
    }
}

struct Job {
    index: usize,
    input: PathBuf,
    output_stem: String,
}

/// Synthesize every GPX file under `input_folder` into `output_folder`.
///
/// Per-file failures are recorded in the returned results (and the results
/// CSV) rather than aborting the batch.
pub fn process_folder(
    input_folder: &Path,
    output_folder: &Path,
    config: &SynthConfig,
    options: &BatchOptions,
) -> Result<Vec<BatchResult>> {
    config.validate()?;
    fs::create_dir_all(output_folder)?;

    let gpx_files = collect_gpx_files(input_folder)?;
    let jobs = plan_jobs(gpx_files);
    let threads = options.jobs.unwrap_or_else(num_cpus::get).max(1);
    info!("Found {} GPX files, synthesizing on {} threads", jobs.len(), threads);

    let pool = rayon::ThreadPoolBuilder::new().num_threads(threads).build()?;
    let results: Vec<BatchResult> = pool.install(|| {
        jobs.par_iter()
            .map(|job| {
                let original_filename = job.input.file_name().map_or_else(
                    || job.input.display().to_string(),
                    |name| name.to_string_lossy().to_string(),
                );
                match process_single_file(job, output_folder, config, options) {
                    Ok(result) => result,
                    Err(e) => {
                        warn!("{}: {}", original_filename, e);
                        BatchResult::error(
                            original_filename,
                            format!("{}.gpx", job.output_stem),
                            format!("ERROR: {}", e),
                        )
                    }
                }
            })
            .collect()
    });

    let csv_path = output_folder.join(RESULTS_FILENAME);
    save_results_to_csv(&results, &csv_path)?;

    Ok(results)
}

fn collect_gpx_files(input_folder: &Path) -> Result<Vec<PathBuf>> {
    let mut gpx_files = Vec::new();
    for entry in WalkDir::new(input_folder).sort_by_file_name() {
        let entry = entry?;
        if entry.file_type().is_file() {
            if let Some(extension) = entry.path().extension() {
                if extension.to_string_lossy().eq_ignore_ascii_case("gpx") {
                    gpx_files.push(entry.path().to_path_buf());
                }
            }
        }
    }
    Ok(gpx_files)
}

/// Assign each input its seed index and a unique output name.
fn plan_jobs(gpx_files: Vec<PathBuf>) -> Vec<Job> {
    let mut taken = HashSet::new();
    gpx_files
        .into_iter()
        .enumerate()
        .map(|(index, input)| {
            let stem = input
                .file_stem()
                .map(|s| clean_filename(&s.to_string_lossy()))
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| format!("track_{index}"));
            let mut output_stem = stem.clone();
            let mut n = 2;
            while !taken.insert(output_stem.to_lowercase()) {
                output_stem = format!("{stem}_{n}");
                n += 1;
            }
            Job { index, input, output_stem }
        })
        .collect()
}

fn process_single_file(
    job: &Job,
    output_folder: &Path,
    config: &SynthConfig,
    options: &BatchOptions,
) -> Result<BatchResult> {
    let import = gpx_io::read_route_file(&job.input)?;

    let mut config = config.clone();
    if config.track_name.is_none() {
        config.track_name = Some(job.output_stem.clone());
    }

    let mut rng = ChaCha8Rng::seed_from_u64(options.seed.wrapping_add(job.index as u64));
    let synthesized = track::synthesize(&import.points, &config, &mut rng)?;
    let (bytes, summary) = track::assemble(&synthesized.points, &config)?;

    let output_filename = format!("{}.gpx", job.output_stem);
    fs::write(output_folder.join(&output_filename), bytes)?;
    if options.write_csv {
        let csv_path = output_folder.join(format!("{}.csv", job.output_stem));
        export::save_points_to_csv(&synthesized.points, &csv_path)?;
    }

    Ok(BatchResult {
        original_filename: job.input.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default(),
        output_filename,
        route_points: import.points.len(),
        skipped_samples: import.skipped,
        output_points: synthesized.points.len(),
        distance_km: summary.total_distance_m / 1000.0,
        ascent_m: summary.total_ascent_m,
        duration: summary.duration_hms(),
        average_heart_rate: summary.average_heart_rate,
        estimated_calories: summary.estimated_calories,
        processing_status: "SUCCESS".to_string(),
    })
}

/// Replace characters that are not portable in file names.
fn clean_filename(name: &str) -> String {
    const RESERVED: &str = "<>:\"/\\|?*";
    let cleaned: String = name
        .chars()
        .map(|c| if c.is_control() || RESERVED.contains(c) { '_' } else { c })
        .collect();
    cleaned.trim().to_string()
}

/// One row per input file, headed by the [`BatchResult`] field names.
fn save_results_to_csv(results: &[BatchResult], csv_path: &Path) -> Result<()> {
    let mut wtr = Writer::from_path(csv_path)?;
    for result in results {
        wtr.serialize(result)?;
    }
    wtr.flush()?;
    info!("Batch results saved to {}", csv_path.display());
    Ok(())
}

pub fn print_batch_summary(results: &[BatchResult]) {
    let successful: Vec<&BatchResult> = results.iter().filter(|r| r.is_success()).collect();
    let error_count = results.len() - successful.len();

    println!("\n🎯 SYNTHESIS SUMMARY");
    println!("====================");
    println!("Total files: {}", results.len());
    println!("✅ Successful: {}", successful.len());
    println!("❌ Errors: {}", error_count);

    for result in results.iter().filter(|r| !r.is_success()) {
        println!("   {} -> {}", result.original_filename, result.processing_status);
    }

    if !successful.is_empty() {
        let n = successful.len() as f64;
        let total_km: f64 = successful.iter().map(|r| r.distance_km).sum();
        let avg_hr = successful.iter().map(|r| r.average_heart_rate).sum::<f64>() / n;
        let skipped: usize = successful.iter().map(|r| r.skipped_samples).sum();

        println!("\n📊 TOTALS:");
        println!("Distance: {:.2} km", total_km);
        println!("Average heart rate: {:.0} bpm", avg_hr);
        if skipped > 0 {
            println!("⚠️  Skipped malformed samples: {}", skipped);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ActivityType;
    use chrono::{TimeZone, Utc};

    fn route_gpx(points: usize) -> String {
        let mut content = String::from(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<gpx version=\"1.1\" creator=\"test\" xmlns=\"http://www.topografix.com/GPX/1/1\">\n<trk><trkseg>\n",
        );
        for i in 0..points {
            content.push_str(&format!(
                "<trkpt lat=\"{:.6}\" lon=\"{:.6}\"><ele>{:.1}</ele></trkpt>\n",
                46.0 + i as f64 * 0.0005,
                7.0 + i as f64 * 0.0003,
                400.0 + (i as f64 * 0.2).sin() * 20.0
            ));
        }
        content.push_str("</trkseg></trk>\n</gpx>\n");
        content
    }

    fn config() -> SynthConfig {
        SynthConfig::new(ActivityType::Running, Utc.with_ymd_and_hms(2024, 6, 2, 7, 30, 0).unwrap())
    }

    fn input_folder() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a_morning.gpx"), route_gpx(40)).unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();
        fs::write(dir.path().join("nested").join("b_evening.GPX"), route_gpx(25)).unwrap();
        fs::write(dir.path().join("c_empty.gpx"), "<gpx></gpx>").unwrap();
        fs::write(dir.path().join("notes.txt"), "not a track").unwrap();
        dir
    }

    #[test]
    fn test_process_folder() {
        let input = input_folder();
        let output = tempfile::tempdir().unwrap();
        let options = BatchOptions { jobs: Some(2), seed: 7, write_csv: true };

        let results = process_folder(input.path(), output.path(), &config(), &options).unwrap();
        assert_eq!(results.len(), 3);
        assert_eq!(results.iter().filter(|r| r.is_success()).count(), 2);

        let failed = results.iter().find(|r| !r.is_success()).unwrap();
        assert_eq!(failed.original_filename, "c_empty.gpx");
        assert!(failed.processing_status.starts_with("ERROR"));

        let morning = fs::read(output.path().join("a_morning.gpx")).unwrap();
        let points = gpx_io::read_track(&morning).unwrap();
        assert_eq!(points.len(), 40);
        assert!(output.path().join("a_morning.csv").exists());
        assert!(output.path().join("b_evening.gpx").exists());

        let summary = fs::read_to_string(output.path().join(RESULTS_FILENAME)).unwrap();
        assert_eq!(summary.lines().count(), 4);
        assert!(summary.starts_with("original_filename,output_filename,route_points,skipped_samples,"));

        let mut reader = csv::Reader::from_path(output.path().join(RESULTS_FILENAME)).unwrap();
        let statuses: Vec<String> = reader
            .records()
            .map(|r| r.unwrap().get(10).unwrap().to_string())
            .collect();
        assert_eq!(statuses.iter().filter(|s| s.as_str() == "SUCCESS").count(), 2);
    }

    #[test]
    fn test_batch_is_deterministic_for_seed() {
        let input = input_folder();
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();

        let one_thread = BatchOptions { jobs: Some(1), seed: 42, write_csv: false };
        let many_threads = BatchOptions { jobs: Some(4), seed: 42, write_csv: false };
        process_folder(input.path(), first.path(), &config(), &one_thread).unwrap();
        process_folder(input.path(), second.path(), &config(), &many_threads).unwrap();

        for name in ["a_morning.gpx", "b_evening.gpx"] {
            let a = fs::read(first.path().join(name)).unwrap();
            let b = fs::read(second.path().join(name)).unwrap();
            assert_eq!(a, b, "{name} differs between runs");
        }
    }

    #[test]
    fn test_plan_jobs_deduplicates_names() {
        let jobs = plan_jobs(vec![
            PathBuf::from("x/run.gpx"),
            PathBuf::from("y/run.gpx"),
            PathBuf::from("z/Run.gpx"),
            PathBuf::from("w/a:b.gpx"),
        ]);
        let stems: Vec<&str> = jobs.iter().map(|j| j.output_stem.as_str()).collect();
        assert_eq!(stems, ["run", "run_2", "Run_3", "a_b"]);
        assert_eq!(clean_filename(" tab\there?.v2 "), "tab_there_.v2");
        assert_eq!(jobs[2].index, 2);
    }

    #[test]
    fn test_invalid_config_aborts_batch() {
        let input = input_folder();
        let output = tempfile::tempdir().unwrap();
        let cfg = SynthConfig { speed_boost: 3.0, ..config() };
        assert!(process_folder(input.path(), output.path(), &cfg, &BatchOptions::default()).is_err());
    }
}
