// src/snapshot.rs

use anyhow::{Context, Result};
use chrono::Local;
use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing::{debug, warn};

/// Writes raw page HTML for offline diagnosis. Nothing ever reads these back.
pub struct SnapshotWriter {
    dir: Option<PathBuf>,
}

impl SnapshotWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("creating snapshot directory {:?}", &dir))?;
        Ok(Self { dir: Some(dir) })
    }

    pub fn disabled() -> Self {
        Self { dir: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.dir.is_some()
    }

    /// Write `<stem>_<YYYYmmdd_HHMMSS>.html`. Failures are logged, never
    /// propagated.
    pub fn save(&self, stem: &str, html: &str) -> Option<PathBuf> {
        let dir = self.dir.as_ref()?;
        let ts = Local::now().format("%Y%m%d_%H%M%S");
        let path = dir.join(format!("{}_{}.html", stem, ts));
        match write_atomic(&path, html) {
            Ok(()) => {
                debug!(path = %path.display(), bytes = html.len(), "snapshot written");
                Some(path)
            }
            Err(e) => {
                warn!(stem, error = %e, "snapshot not written");
                None
            }
        }
    }
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let tmp = path.with_extension("html.tmp");
    fs::write(&tmp, contents).with_context(|| format!("writing {:?}", &tmp))?;
    fs::rename(&tmp, path).with_context(|| format!("renaming {:?} to {:?}", &tmp, path))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use tempfile::tempdir;

    #[test]
    fn test_snapshot_named_by_stem_and_timestamp() -> Result<()> {
        let dir = tempdir()?;
        let w = SnapshotWriter::new(dir.path().join("html"))?;
        let path = w
            .save("Y_Maker_X_Calendar_Year_Year_2023", "<table></table>")
            .unwrap();
        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("Y_Maker_X_Calendar_Year_Year_2023_"));
        assert!(name.ends_with(".html"));
        // stem + '_' + 15-char timestamp + ".html"
        assert_eq!(name.len(), "Y_Maker_X_Calendar_Year_Year_2023_".len() + 15 + 5);
        assert_eq!(fs::read_to_string(&path)?, "<table></table>");

        let leftovers: Vec<_> = fs::read_dir(dir.path().join("html"))?
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().map_or(false, |x| x == "tmp"))
            .collect();
        assert!(leftovers.is_empty());
        Ok(())
    }

    #[test]
    fn test_disabled_writer_writes_nothing() {
        let w = SnapshotWriter::disabled();
        assert!(!w.is_enabled());
        assert!(w.save("initial_page", "<html/>").is_none());
    }
}
