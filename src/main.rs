mod category;
mod error;
mod feedback;
mod images;
mod model;
mod normalize;
mod output;
mod pagination;
mod parser;
mod pipeline;
mod rates;
mod settings;

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::{Duration, Instant};

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use tracing::{info, warn};

use crate::feedback::{FeedbackSource, NoFeedback, SqliteFeedback};
use crate::images::{ImageLookup, ImageResolver, NoImageLookup, SpiderLookup};
use crate::pagination::Verdict;
use crate::pipeline::{Pipeline, PipelineOptions};
use crate::rates::{FixedRate, FrankfurterRates, NoRates, RateSource};
use crate::settings::{Overrides, Settings};

const RATE_TIMEOUT: Duration = Duration::from_secs(10);
const IMAGE_RETAILER: &str = "ssense";

#[derive(Parser)]
#[command(name = "sale-monitor", about = "Extract discounted products from scraped sale pages")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse scraped markdown into a filtered, sorted snapshot
    Parse {
        /// Directory of scraped *.md files
        #[arg(long)]
        input_dir: Option<PathBuf>,
        /// Where snapshots and latest.json are written
        #[arg(long)]
        output_dir: Option<PathBuf>,
        /// Directory holding the viewer's index.html template
        #[arg(long)]
        viewer_dir: Option<PathBuf>,
        /// Preferences JSON (default: data/config/preferences.json)
        #[arg(long)]
        prefs: Option<PathBuf>,
        /// Minimum discount percentage to keep
        #[arg(long)]
        min_discount: Option<i64>,
        /// Use this JPY→USD rate instead of fetching one
        #[arg(long)]
        jpy_usd_rate: Option<f64>,
        /// Skip every network lookup (rates, images)
        #[arg(long)]
        offline: bool,
    },
    /// Decide whether a paginated scrape should fetch the next page (exit 0 = continue, 1 = stop)
    Check {
        #[arg(long, value_enum)]
        mode: CheckMode,
        /// Scraped markdown of the current page
        #[arg(long)]
        file: PathBuf,
        /// Previous run's latest.json (seen-before mode)
        #[arg(long)]
        latest: Option<PathBuf>,
        /// Fraction of already-known products that ends pagination
        #[arg(long, default_value = "0.5")]
        threshold: f64,
    },
    /// Tag a product URL in the feedback store
    Feedback {
        url: String,
        /// Status to record (e.g. liked, hidden); omit with --clear
        #[arg(required_unless_present = "clear")]
        status: Option<String>,
        /// Remove the URL's tag
        #[arg(long)]
        clear: bool,
        #[arg(long)]
        prefs: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum CheckMode {
    #[value(alias = "no_discount")]
    NoDiscount,
    #[value(alias = "seen_before")]
    SeenBefore,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Parse {
            input_dir,
            output_dir,
            viewer_dir,
            prefs,
            min_discount,
            jpy_usd_rate,
            offline,
        } => {
            let settings = Settings::load(
                prefs.as_deref(),
                Overrides {
                    input_dir,
                    output_dir,
                    viewer_dir,
                    min_discount_pct: min_discount,
                },
            )
            .context("Invalid configuration")?;
            run_parse(&settings, jpy_usd_rate, offline).await?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Check {
            mode,
            file,
            latest,
            threshold,
        } => Ok(ExitCode::from(run_check(mode, &file, latest, threshold).exit_code())),
        Commands::Feedback {
            url,
            status,
            clear,
            prefs,
        } => {
            let settings = Settings::load(prefs.as_deref(), Overrides::default())
                .context("Invalid configuration")?;
            let path = settings
                .feedback_db
                .context("No feedback_db configured (set it in preferences or SALE_FEEDBACK_DB)")?;
            let conn = feedback::connect(&path)?;
            feedback::init_schema(&conn)?;
            let status = if clear { None } else { status.as_deref() };
            feedback::set_status(&conn, &url, status)?;
            println!("{} -> {}", url, status.unwrap_or("(cleared)"));
            Ok(ExitCode::SUCCESS)
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        info!("Done in {}", format_duration(elapsed));
    }

    result
}

async fn run_parse(settings: &Settings, jpy_usd_rate: Option<f64>, offline: bool) -> anyhow::Result<()> {
    let docs = parser::load_documents(&settings.input_dir)?;

    let rates: Box<dyn RateSource> = match (jpy_usd_rate, offline) {
        (Some(rate), _) => Box::new(FixedRate(rate)),
        (None, true) => Box::new(NoRates),
        (None, false) => Box::new(FrankfurterRates::new(RATE_TIMEOUT)?),
    };

    let lookup: Box<dyn ImageLookup> = if offline {
        Box::new(NoImageLookup)
    } else {
        match SpiderLookup::from_env()? {
            Some(spider) => Box::new(spider),
            None => {
                warn!("SPIDER_API_KEY not set, image lookups limited to cache");
                Box::new(NoImageLookup)
            }
        }
    };

    let feedback: Box<dyn FeedbackSource> = match &settings.feedback_db {
        Some(path) => Box::new(SqliteFeedback::new(path)),
        None => Box::new(NoFeedback),
    };

    let pipeline = Pipeline::new(PipelineOptions {
        min_discount_pct: settings.min_discount_pct,
        min_document_bytes: settings.min_document_bytes,
    })
    .with_rates(rates)
    .with_images(ImageResolver {
        retailer: IMAGE_RETAILER.to_string(),
        cache_path: settings.image_cache.clone(),
        delay: Duration::from_millis(settings.lookup_delay_ms),
        lookup,
    })
    .with_feedback(feedback);

    let snapshot = pipeline.run(&docs).await;
    output::write_snapshot(&snapshot, &settings.output_dir)?;
    output::render_viewer(&snapshot, &settings.viewer_dir)?;

    println!(
        "{} of {} products at >={}% off from {}",
        snapshot.meta.total_filtered,
        snapshot.meta.total_parsed,
        snapshot.meta.min_discount_pct,
        snapshot.meta.retailers.iter().cloned().collect::<Vec<_>>().join(", "),
    );
    Ok(())
}

fn run_check(mode: CheckMode, file: &std::path::Path, latest: Option<PathBuf>, threshold: f64) -> Verdict {
    let text = match std::fs::read_to_string(file) {
        Ok(t) => t,
        Err(e) => {
            warn!("Cannot read {}: {}", file.display(), e);
            return Verdict::Stop;
        }
    };
    match mode {
        CheckMode::NoDiscount => pagination::check_no_discount(&text),
        CheckMode::SeenBefore => match latest {
            Some(latest) => pagination::check_seen_before(&text, &latest, threshold),
            None => {
                warn!("seen-before mode needs --latest");
                Verdict::Stop
            }
        },
    }
}

fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
