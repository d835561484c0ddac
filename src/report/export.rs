//! Report export.
//!
//! The core hands a finalized [`RunReport`] to a [`ReportExporter`] and is
//! agnostic to the concrete format. The shipped exporter writes one CSV
//! per sheet, index-prefixed so the documented sheet order survives in a
//! directory listing.

use super::RunReport;
use crate::error::{AutomationError, Result};
use std::path::{Path, PathBuf};
use tracing::info;

pub trait ReportExporter {
    /// Persist the report; returns the paths written.
    fn export(&self, report: &RunReport) -> Result<Vec<PathBuf>>;
}

pub struct CsvExporter {
    dir: PathBuf,
}

impl CsvExporter {
    pub fn new(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
        }
    }
}

impl ReportExporter for CsvExporter {
    fn export(&self, report: &RunReport) -> Result<Vec<PathBuf>> {
        std::fs::create_dir_all(&self.dir)
            .map_err(|e| AutomationError::assembly(format!("cannot create report dir: {e}")))?;

        let mut written = Vec::with_capacity(report.tables.len());
        for (index, table) in report.tables.iter().enumerate() {
            let path = self.dir.join(format!("{:02}_{}.csv", index + 1, table.name));
            let mut writer = csv::Writer::from_path(&path)
                .map_err(|e| AutomationError::assembly(format!("cannot open {}: {e}", path.display())))?;
            if !table.headers.is_empty() {
                writer
                    .write_record(&table.headers)
                    .map_err(|e| AutomationError::assembly(e.to_string()))?;
            }
            for row in &table.rows {
                writer
                    .write_record(row)
                    .map_err(|e| AutomationError::assembly(e.to_string()))?;
            }
            writer
                .flush()
                .map_err(|e| AutomationError::assembly(e.to_string()))?;
            written.push(path);
        }
        info!(sheets = written.len(), dir = %self.dir.display(), "report exported");
        Ok(written)
    }
}
