use std::path::{Path, PathBuf};

use anyhow::Result;
use tracing::info;

use crate::model::PlotCategory;
use crate::util::ensure_directory;

pub const REPORT_FOLDER: &str = "Report";

/// The per-run output tree: `<prefix>_<timestamp>/` with one folder per
/// plot category plus `Report/`.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub root: PathBuf,
    pub timestamp: String,
}

impl RunOutput {
    pub fn layout(base: &Path, prefix: &str, timestamp: &str) -> Self {
        Self {
            root: base.join(format!("{prefix}_{timestamp}")),
            timestamp: timestamp.to_string(),
        }
    }

    /// Creates the root and all five subfolders. An existing folder from a
    /// run in the same second is reused as-is.
    pub fn create(base: &Path, prefix: &str, timestamp: &str) -> Result<Self> {
        let output = Self::layout(base, prefix, timestamp);
        for category in PlotCategory::ALL {
            ensure_directory(&output.category_dir(category))?;
        }
        ensure_directory(&output.report_dir())?;
        info!(root = %output.root.display(), "created output folders");
        Ok(output)
    }

    pub fn category_dir(&self, category: PlotCategory) -> PathBuf {
        self.root.join(category.folder_name())
    }

    pub fn report_dir(&self) -> PathBuf {
        self.root.join(REPORT_FOLDER)
    }

    pub fn report_path(&self) -> PathBuf {
        self.report_dir()
            .join(format!("thermal_report_{}.txt", self.timestamp))
    }

    pub fn summary_path(&self) -> PathBuf {
        self.report_dir()
            .join(format!("run_summary_{}.json", self.timestamp))
    }
}
