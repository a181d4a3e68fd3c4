pub mod brackets;
pub mod extract;
pub mod lines;

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::MonitorError;
use crate::model::RawProduct;
use extract::Format;

const NO_RESULTS_MARKER: &str = "no sale products to display";

/// One scraped listing page.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    pub file_name: String,
    pub retailer: String,
    pub text: String,
}

impl SourceDocument {
    pub fn new(file_name: &str, text: String) -> Self {
        SourceDocument {
            file_name: file_name.to_string(),
            retailer: retailer_tag(file_name),
            text,
        }
    }

    pub fn read(path: &Path) -> std::io::Result<Self> {
        let text = fs::read_to_string(path)?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(SourceDocument::new(&file_name, text))
    }

    /// Placeholder, anti-bot and empty-result pages carry no products.
    pub fn is_empty_page(&self, min_bytes: usize) -> bool {
        self.text.len() < min_bytes || self.text.to_lowercase().contains(NO_RESULTS_MARKER)
    }
}

/// `ssense_men_p2.md` → `ssense`.
pub fn retailer_tag(file_name: &str) -> String {
    match file_name.split_once('_') {
        Some((tag, _)) => tag.to_string(),
        None => "unknown".to_string(),
    }
}

/// Extract every product block of one page with the layout its retailer uses.
pub fn parse_document(doc: &SourceDocument, min_bytes: usize) -> Vec<RawProduct> {
    if doc.is_empty_page(min_bytes) {
        debug!(file = %doc.file_name, bytes = doc.text.len(), "skipping empty page");
        return Vec::new();
    }
    Format::for_retailer(&doc.retailer).extract(&doc.text)
}

/// Sorted `*.md` paths in `dir`.
pub fn list_documents(dir: &Path) -> Result<Vec<PathBuf>, MonitorError> {
    let entries = fs::read_dir(dir).map_err(|source| MonitorError::InputDir {
        path: dir.to_path_buf(),
        source,
    })?;
    let mut paths: Vec<PathBuf> = entries
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "md"))
        .collect();
    paths.sort();
    if paths.is_empty() {
        return Err(MonitorError::NoDocuments(dir.to_path_buf()));
    }
    Ok(paths)
}

/// Read every listed page. Unreadable files are logged and left out.
pub fn load_documents(dir: &Path) -> Result<Vec<SourceDocument>, MonitorError> {
    let docs = list_documents(dir)?
        .iter()
        .filter_map(|path| match SourceDocument::read(path) {
            Ok(doc) => Some(doc),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "unreadable document, skipping");
                None
            }
        })
        .collect();
    Ok(docs)
}
