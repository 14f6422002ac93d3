use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use etude::quick_test::QuickTestParams;
use etude::services::{LexicalValidator, ReplayModel};
use etude::telemetry::MaterialTelemetry;
use etude::weak_drill::{WeakDrillGenerator, WeakDrillParams};
use etude::{
    check_quality_gate, explain_analysis, suggest_improvements, try_analyze, DifficultyLevel,
    EngineConfig, InMemoryTelemetry, QualityStatus, QuickTestGenerator, WeakSpotAggregator,
    WeakSpotsAggregation,
};
use std::fs;
use std::path::{Path, PathBuf};
use std::process;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "etude")]
#[command(about = "Score ABC practice material and build quick tests from class weak spots")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Engine configuration (YAML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print notation statistics and scores for an ABC file
    Analyze {
        file: PathBuf,

        #[arg(long, default_value = "piano")]
        instrument: String,

        /// Difficulty the material is meant for
        #[arg(long)]
        target: Option<DifficultyLevel>,

        /// Print JSON instead of a report
        #[arg(long)]
        json: bool,
    },

    /// Run the publication quality gate over content holding ABC notation
    Gate {
        file: PathBuf,

        #[arg(long, default_value = "piano")]
        instrument: String,

        /// Overrides the configured threshold
        #[arg(long)]
        threshold: Option<f64>,
    },

    /// Aggregate class weak spots from a telemetry fixture
    Aggregate {
        telemetry: PathBuf,

        /// Material to aggregate; defaults to the first in the fixture
        #[arg(long)]
        material: Option<String>,

        /// Number of weak spots to keep
        #[arg(long)]
        top: Option<usize>,
    },

    /// Aggregate, then build a quick test from a recorded model completion
    QuickTest {
        telemetry: PathBuf,

        /// File holding the model completion to replay
        #[arg(long)]
        completion: PathBuf,

        #[arg(long)]
        material: Option<String>,

        #[arg(long, default_value_t = 3)]
        sections: usize,

        #[arg(long, default_value = "intermediate")]
        difficulty: DifficultyLevel,
    },

    /// Build same/easier/harder drills for a looped passage from a recorded completion
    Drill {
        /// ABC file holding the full piece
        file: PathBuf,

        /// First looped bar, counted from 1
        #[arg(long)]
        from: u32,

        /// Last looped bar
        #[arg(long)]
        to: u32,

        /// File holding the model completion to replay
        #[arg(long)]
        completion: PathBuf,

        #[arg(long, default_value = "piano")]
        instrument: String,

        /// Tempo the student currently reaches, in BPM
        #[arg(long, default_value_t = 80)]
        tempo: u32,

        /// Defaults to the file name
        #[arg(long)]
        title: Option<String>,
    },
}

fn read_file(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("Error reading file '{}'", path.display()))
}

fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    match path {
        Some(path) => Ok(EngineConfig::load(path)?),
        None => Ok(EngineConfig::default()),
    }
}

fn select_material<'a>(
    store: &'a InMemoryTelemetry,
    material_id: Option<&str>,
) -> Result<&'a MaterialTelemetry> {
    match material_id {
        Some(id) => store
            .materials()
            .iter()
            .find(|m| m.material_id == id)
            .ok_or_else(|| anyhow!("material '{}' not found in telemetry", id)),
        None => store
            .materials()
            .first()
            .ok_or_else(|| anyhow!("telemetry fixture holds no materials")),
    }
}

fn aggregate(
    config: &EngineConfig,
    telemetry: &Path,
    material_id: Option<&str>,
    top: Option<usize>,
) -> Result<Option<WeakSpotsAggregation>> {
    let store = InMemoryTelemetry::from_json(&read_file(telemetry)?)?;
    let material = select_material(&store, material_id)?;

    let mut aggregation_config = config.aggregation.clone();
    if let Some(top) = top {
        aggregation_config.top_n = top.max(1);
    }
    let aggregator = WeakSpotAggregator::new(aggregation_config);
    Ok(aggregator.aggregate_class(&store, &material.material_id, &material.cohort()))
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Analyze {
            file,
            instrument,
            target,
            json,
        } => {
            let text = read_file(&file)?;
            let stats = try_analyze(&text, &instrument, target)
                .with_context(|| format!("Could not analyze '{}'", file.display()))?;
            if json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                println!("{}", explain_analysis(&stats));
            }
        }
        Commands::Gate {
            file,
            instrument,
            threshold,
        } => {
            let content = read_file(&file)?;
            let threshold = threshold.unwrap_or(config.quality.threshold);
            let result = check_quality_gate(&content, &instrument, threshold);

            println!("Status: {:?}", result.status);
            println!("{}", result.message);
            if let Some(stats) = &result.statistics {
                for suggestion in suggest_improvements(stats) {
                    println!("  - {}", suggestion);
                }
            }
            if result.status != QualityStatus::Approved {
                process::exit(1);
            }
        }
        Commands::Aggregate {
            telemetry,
            material,
            top,
        } => match aggregate(&config, &telemetry, material.as_deref(), top)? {
            Some(aggregation) => println!("{}", serde_json::to_string_pretty(&aggregation)?),
            None => bail!("no weak-spot data to aggregate"),
        },
        Commands::QuickTest {
            telemetry,
            completion,
            material,
            sections,
            difficulty,
        } => {
            let aggregation = aggregate(&config, &telemetry, material.as_deref(), None)?
                .ok_or_else(|| anyhow!("no weak-spot data to build a quick test from"))?;
            let params = QuickTestParams::from_aggregation(&aggregation, difficulty, sections);

            let model = ReplayModel::new(read_file(&completion)?);
            let generator =
                QuickTestGenerator::new(&model, &LexicalValidator, config.generator.clone());
            let result = generator
                .try_generate(&params)?
                .ok_or_else(|| anyhow!("no weak spots selected"))?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Commands::Drill {
            file,
            from,
            to,
            completion,
            instrument,
            tempo,
            title,
        } => {
            let material_title = title.unwrap_or_else(|| {
                file.file_stem()
                    .map(|stem| stem.to_string_lossy().into_owned())
                    .unwrap_or_default()
            });
            let params = WeakDrillParams {
                source_notation: read_file(&file)?,
                loop_start_bar: from,
                loop_end_bar: to,
                instrument,
                current_tempo: tempo,
                material_title,
            };

            let model = ReplayModel::new(read_file(&completion)?);
            let generator =
                WeakDrillGenerator::new(&model, &LexicalValidator, config.generator.clone());
            let result = generator.try_generate(&params)?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
    }

    Ok(())
}
