use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing::{info, Level};

use std::path::PathBuf;

use lpr_locate::config::AppConfig;
use lpr_locate::dataset;
use lpr_locate::utils;
use lpr_locate::{LocatorConfig, PlateCandidate, PlateClassifier, PlateLocator};

#[derive(Parser, Debug)]
#[command(name = "lpr", version, about = "Locate license plates and classify them by category")]
struct Args {
    /// TOML file with [feature], [svm] and [locator] settings
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// More logging, repeat for more
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Find plate candidates in an image
    Locate {
        image: PathBuf,
        #[arg(long, value_name = "FILE")]
        model: PathBuf,
        /// Geometry bounds and fallback policy to use
        #[arg(long, value_enum, default_value_t = Preset::General)]
        preset: Preset,
        /// Write the source with candidates outlined
        #[arg(long, value_name = "FILE")]
        output: Option<PathBuf>,
        /// Write the binary mask of the strategy that produced the result
        #[arg(long, value_name = "FILE")]
        mask: Option<PathBuf>,
        /// Print candidates as JSON
        #[arg(long)]
        json: bool,
    },
    /// Classify a single plate image, read as grayscale
    Classify {
        image: PathBuf,
        #[arg(long, value_name = "FILE")]
        model: PathBuf,
    },
    /// Train a model from <LIBRARY>/plates/<category>/ samples
    Train {
        library: PathBuf,
        #[arg(long, value_name = "FILE")]
        output: PathBuf,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Preset {
    /// Color plates, or edge plates if color finds none
    General,
    /// All candidates, non-plates included
    AutoSample,
    /// Plates only, with looser size bounds
    Calibration,
}

#[derive(Serialize)]
struct CandidateSummary {
    x: i32,
    y: i32,
    width: u32,
    height: u32,
    angle: f32,
    category: String,
    method: String,
}

impl From<&PlateCandidate> for CandidateSummary {
    fn from(c: &PlateCandidate) -> Self {
        CandidateSummary {
            x: c.bounds.left(),
            y: c.bounds.top(),
            width: c.bounds.width(),
            height: c.bounds.height(),
            angle: c.rotated.angle,
            category: c.category.to_string(),
            method: format!("{:?}", c.method),
        }
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt().with_max_level(level).with_writer(std::io::stderr).init();
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let config = match &args.config {
        Some(path) => AppConfig::load(path).with_context(|| format!("reading {}", path.display()))?,
        None => AppConfig::default(),
    };
    let classifier = PlateClassifier::with_params(config.feature, config.svm)?;

    match args.command {
        Command::Locate { image, model, preset, output, mask, json } => {
            classifier.load(&model)?;
            let locator_config = match (&args.config, preset) {
                (Some(_), _) => config.locator.clone(),
                (None, Preset::Calibration) => LocatorConfig::calibration(),
                (None, Preset::AutoSample) => LocatorConfig::auto_sample(),
                (None, Preset::General) => LocatorConfig::general(),
            };
            let locator = PlateLocator::new(&classifier, locator_config)?;

            let source = utils::open_rgb(&image).with_context(|| format!("opening {}", image.display()))?;
            let (candidates, binary) = match preset {
                Preset::General => locator.locate_with_mask(&source)?,
                Preset::AutoSample => locator.locate_for_auto_sample_with_mask(&source)?,
                Preset::Calibration => locator.locate_for_calibration_with_mask(&source)?,
            };
            info!(candidates = candidates.len(), "located plates in {}", image.display());

            if json {
                let summaries: Vec<CandidateSummary> = candidates.iter().map(CandidateSummary::from).collect();
                println!("{}", serde_json::to_string_pretty(&summaries)?);
            } else {
                for c in &candidates {
                    println!(
                        "{:?} {} at ({}, {}) {}x{}, angle {:.1}",
                        c.method,
                        c.category,
                        c.bounds.left(),
                        c.bounds.top(),
                        c.bounds.width(),
                        c.bounds.height(),
                        c.rotated.angle
                    );
                }
            }
            if let Some(output) = output {
                let mut annotated = source.clone();
                utils::draw_candidates(&mut annotated, &candidates);
                annotated.save(&output).with_context(|| format!("writing {}", output.display()))?;
            }
            if let Some(mask) = mask {
                binary.save(&mask).with_context(|| format!("writing {}", mask.display()))?;
            }
        }
        Command::Classify { image, model } => {
            classifier.load(&model)?;
            println!("{}", classifier.test_file(&image)?);
        }
        Command::Train { library, output } => {
            if !dataset::is_training_directory(&library) {
                tracing::warn!("{} is missing some category folders", library.display());
            }
            let set = dataset::load_training_set(&library, &classifier)?;
            for category in lpr_locate::PlateCategory::ALL {
                println!("{:>10}: {}", category, set.count(category));
            }
            if !classifier.train(&set.samples, &set.labels) {
                bail!("training failed, see log for the reason");
            }
            let mut correct = 0;
            for category in lpr_locate::PlateCategory::ALL {
                for path in dataset::sample_files(&library, category)? {
                    if classifier.test_file(&path)? == category {
                        correct += 1;
                    }
                }
            }
            println!("training accuracy: {}/{}", correct, set.len());
            classifier.save(&output)?;
            println!("model saved to {}", output.display());
        }
    }

    Ok(())
}
