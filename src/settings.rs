use std::path::{Path, PathBuf};

use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;

use crate::error::MonitorError;

pub const DEFAULT_PREFS: &str = "data/config/preferences.json";

/// Everything a run needs to know about paths and thresholds.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub viewer_dir: PathBuf,
    pub image_cache: PathBuf,
    pub feedback_db: Option<PathBuf>,
    pub min_discount_pct: i64,
    pub min_document_bytes: usize,
    pub lookup_delay_ms: u64,
}

/// Command-line values that win over every other source.
#[derive(Debug, Default)]
pub struct Overrides {
    pub input_dir: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
    pub viewer_dir: Option<PathBuf>,
    pub min_discount_pct: Option<i64>,
}

impl Settings {
    /// Defaults, then the preferences file (if present), then `SALE_*`
    /// environment variables, then `overrides`.
    pub fn load(prefs: Option<&Path>, overrides: Overrides) -> Result<Self, MonitorError> {
        let prefs = prefs.unwrap_or(Path::new(DEFAULT_PREFS));
        Self::load_with_env(prefs, overrides, Environment::with_prefix("SALE").try_parsing(true))
    }

    fn load_with_env(prefs: &Path, overrides: Overrides, env: Environment) -> Result<Self, MonitorError> {
        let settings = Config::builder()
            .set_default("input_dir", "data/output")?
            .set_default("output_dir", "data/results")?
            .set_default("viewer_dir", "data/viewer")?
            .set_default("image_cache", "data/cache/ssense_images.json")?
            .set_default("min_discount_pct", 50)?
            .set_default("min_document_bytes", 500)?
            .set_default("lookup_delay_ms", 500)?
            .add_source(File::from(prefs).format(FileFormat::Json).required(false))
            .add_source(env)
            .set_override_option("input_dir", path_value(overrides.input_dir))?
            .set_override_option("output_dir", path_value(overrides.output_dir))?
            .set_override_option("viewer_dir", path_value(overrides.viewer_dir))?
            .set_override_option("min_discount_pct", overrides.min_discount_pct)?
            .build()?;
        Ok(settings.try_deserialize()?)
    }
}

fn path_value(path: Option<PathBuf>) -> Option<String> {
    path.map(|p| p.to_string_lossy().into_owned())
}
