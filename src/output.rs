use std::fs;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::error::MonitorError;
use crate::model::Snapshot;

pub const LATEST_FILE: &str = "latest.json";
const TEMPLATE_FILE: &str = "index.html";
const VIEWER_FILE: &str = "deals.html";
const DATA_PLACEHOLDER: &str = "const EMBEDDED_DATA = null;";

/// Write `<dir>/<timestamp>.json` and point `latest.json` at it.
pub fn write_snapshot(snapshot: &Snapshot, dir: &Path) -> Result<PathBuf, MonitorError> {
    fs::create_dir_all(dir).map_err(|e| MonitorError::write(dir, e))?;

    let file_name = format!("{}.json", snapshot.meta.scraped_at.format("%Y-%m-%d_%H%M%S"));
    let path = dir.join(&file_name);
    let json = serde_json::to_string_pretty(snapshot)?;
    fs::write(&path, json).map_err(|e| MonitorError::write(&path, e))?;
    info!("Wrote {}", path.display());

    update_latest(dir, &file_name)?;
    info!("Updated {} -> {}", dir.join(LATEST_FILE).display(), file_name);
    Ok(path)
}

/// Replace `latest.json` in one rename so readers never see it missing.
#[cfg(unix)]
fn update_latest(dir: &Path, target: &str) -> Result<(), MonitorError> {
    let latest = dir.join(LATEST_FILE);
    let tmp = dir.join(format!(".{}.tmp", LATEST_FILE));
    if tmp.symlink_metadata().is_ok() {
        fs::remove_file(&tmp).map_err(|e| MonitorError::write(&tmp, e))?;
    }
    std::os::unix::fs::symlink(target, &tmp).map_err(|e| MonitorError::write(&tmp, e))?;
    fs::rename(&tmp, &latest).map_err(|e| MonitorError::write(&latest, e))
}

#[cfg(not(unix))]
fn update_latest(dir: &Path, target: &str) -> Result<(), MonitorError> {
    let latest = dir.join(LATEST_FILE);
    let tmp = dir.join(format!(".{}.tmp", LATEST_FILE));
    fs::copy(dir.join(target), &tmp).map_err(|e| MonitorError::write(&tmp, e))?;
    fs::rename(&tmp, &latest).map_err(|e| MonitorError::write(&latest, e))
}

/// Inline the snapshot into `<viewer_dir>/index.html`, producing `deals.html`.
/// Returns `None` when there is no template to render.
pub fn render_viewer(snapshot: &Snapshot, viewer_dir: &Path) -> Result<Option<PathBuf>, MonitorError> {
    let template_path = viewer_dir.join(TEMPLATE_FILE);
    let template = match fs::read_to_string(&template_path) {
        Ok(t) => t,
        Err(_) => {
            warn!("{} not found, skipping {} generation", template_path.display(), VIEWER_FILE);
            return Ok(None);
        }
    };

    let data = serde_json::to_string(snapshot)?;
    let html = template.replace(DATA_PLACEHOLDER, &format!("const EMBEDDED_DATA = {};", data));

    let out = viewer_dir.join(VIEWER_FILE);
    fs::write(&out, html).map_err(|e| MonitorError::write(&out, e))?;
    info!("Wrote {}", out.display());
    Ok(Some(out))
}
