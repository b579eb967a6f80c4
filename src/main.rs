use std::fs;
use std::path::{Path, PathBuf};
use std::process;

use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};
use log::info;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use gpx_synth::batch::{self, BatchOptions};
use gpx_synth::elevation::ElevationStrategy;
use gpx_synth::{export, gpx_io, track};
use gpx_synth::{ActivityType, PathType, Preset, SkillLevel, SynthConfig, Tuning, UserProfile};

#[derive(Parser)]
#[command(
    name = "gpx-synth",
    version,
    about = "Synthesize realistic GPX activity tracks from route coordinates",
    long_about = "Turns a bare route (GPX track, route or waypoints) into a timed activity with slope-aware pacing, elevation, heart rate and cadence"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Synthesize one track
    Synth {
        /// Route GPX file
        input: PathBuf,

        /// Output GPX file
        #[arg(long, short = 'o')]
        output: PathBuf,

        /// Also write a per-point CSV
        #[arg(long)]
        csv: Option<PathBuf>,

        #[command(flatten)]
        options: SynthArgs,
    },
    /// Synthesize every GPX file under a folder
    Batch {
        input_folder: PathBuf,
        output_folder: PathBuf,

        /// Worker threads (defaults to all cores)
        #[arg(long)]
        jobs: Option<usize>,

        /// Also write a per-point CSV for every track
        #[arg(long)]
        csv: bool,

        #[command(flatten)]
        options: SynthArgs,
    },
}

#[derive(Args)]
struct SynthArgs {
    /// hiking, running or cycling
    #[arg(long, default_value = "hiking")]
    activity: ActivityType,

    /// beginner, intermediate or advanced
    #[arg(long, default_value = "intermediate")]
    skill: SkillLevel,

    /// loop or one-way
    #[arg(long, default_value = "one-way")]
    path: PathType,

    /// Speed multiplier (0.5 to 2.0)
    #[arg(long, default_value_t = 1.0)]
    boost: f64,

    /// Start time, RFC 3339 (defaults to now)
    #[arg(long)]
    start: Option<DateTime<Utc>>,

    #[arg(long, default_value_t = 43)]
    age: u32,

    /// Body weight in kg
    #[arg(long, default_value_t = 94.0)]
    weight: f64,

    #[arg(long, default_value_t = 43)]
    resting_hr: u32,

    /// Body height in cm
    #[arg(long)]
    height: Option<f64>,

    /// Elevation when the route has none: synthetic or flat
    #[arg(long)]
    elevation: Option<ElevationStrategy>,

    /// Starting elevation for the generated profile, meters
    #[arg(long)]
    base_elevation: Option<f64>,

    /// Generate elevation even when the route carries it
    #[arg(long)]
    ignore_file_elevation: bool,

    #[arg(long, default_value_t = gpx_synth::config::DEFAULT_MAX_OUTPUT_POINTS)]
    max_points: usize,

    #[arg(long, value_enum, default_value = "standard")]
    preset: Preset,

    /// JSON tuning overrides applied on top of the preset
    #[arg(long)]
    tuning: Option<PathBuf>,

    /// RNG seed (random when omitted)
    #[arg(long)]
    seed: Option<u64>,

    /// Track name written to the GPX
    #[arg(long)]
    name: Option<String>,
}

impl SynthArgs {
    fn to_config(&self) -> gpx_synth::Result<SynthConfig> {
        let tuning = match &self.tuning {
            Some(path) => Tuning::from_json_file_over(path, &self.preset.tuning())?,
            None => self.preset.tuning(),
        };

        let elevation_strategy = match (self.elevation, self.base_elevation) {
            (strategy, Some(base)) => Some(strategy.unwrap_or(tuning.elevation_strategy).with_base(base)),
            (strategy, None) => strategy,
        };

        let config = SynthConfig {
            skill: self.skill,
            path_type: self.path,
            speed_boost: self.boost,
            user: UserProfile {
                age: self.age,
                weight_kg: self.weight,
                resting_heart_rate: self.resting_hr,
                height_cm: self.height,
            },
            elevation_strategy,
            use_route_elevation: !self.ignore_file_elevation,
            max_output_points: self.max_points,
            tuning,
            track_name: self.name.clone(),
            ..SynthConfig::new(self.activity, self.start.unwrap_or_else(Utc::now))
        };
        config.validate()?;
        Ok(config)
    }

    fn seed(&self) -> u64 {
        self.seed.unwrap_or_else(rand::random)
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let outcome = match cli.command {
        Command::Synth { input, output, csv, options } => run_synth(&input, &output, csv.as_deref(), &options),
        Command::Batch { input_folder, output_folder, jobs, csv, options } => {
            run_batch(&input_folder, &output_folder, jobs, csv, &options)
        }
    };

    if let Err(e) = outcome {
        eprintln!("❌ Error: {}", e);
        process::exit(1);
    }
}

fn run_synth(input: &Path, output: &Path, csv: Option<&Path>, options: &SynthArgs) -> gpx_synth::Result<()> {
    let config = options.to_config()?;
    let seed = options.seed();

    let import = gpx_io::read_route_file(input)?;
    if import.tolerant {
        println!("⚠️  {} is not standard GPX, coordinates were scanned manually", input.display());
    }
    if import.skipped > 0 {
        println!("⚠️  Skipped {} malformed samples", import.skipped);
    }

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let synthesized = track::synthesize(&import.points, &config, &mut rng)?;
    let (bytes, summary) = track::assemble(&synthesized.points, &config)?;
    fs::write(output, bytes)?;
    info!("Seed {} for {}", seed, input.display());

    if let Some(csv_path) = csv {
        export::save_points_to_csv(&synthesized.points, csv_path)?;
        println!("📊 Point table saved to: {}", csv_path.display());
    }

    println!("\n🏁 SYNTHESIZED {} TRACK", config.activity.to_string().to_uppercase());
    println!("=========================");
    println!("Route points:       {} -> {}", import.points.len(), synthesized.points.len());
    println!("Distance:           {:.2} km", summary.total_distance_m / 1000.0);
    println!("Ascent:             {:.0} m", summary.total_ascent_m);
    println!("Duration:           {}", summary.duration_hms());
    println!("Average heart rate: {:.0} bpm", summary.average_heart_rate);
    if let Some(cadence) = summary.average_cadence {
        println!("Average cadence:    {:.0}", cadence);
    }
    println!("Calories:           {:.0} kcal", summary.estimated_calories);
    println!("✅ Saved to: {}", output.display());

    Ok(())
}

fn run_batch(
    input_folder: &Path,
    output_folder: &Path,
    jobs: Option<usize>,
    write_csv: bool,
    options: &SynthArgs,
) -> gpx_synth::Result<()> {
    let config = options.to_config()?;
    let batch_options = BatchOptions { jobs, seed: options.seed(), write_csv };

    println!("📁 Output folder: {}", output_folder.display());
    let results = batch::process_folder(input_folder, output_folder, &config, &batch_options)?;
    batch::print_batch_summary(&results);
    println!(
        "\n📊 Results saved to: {}",
        output_folder.join(batch::RESULTS_FILENAME).display()
    );

    Ok(())
}
