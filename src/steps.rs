use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::Local;
use tracing::info;

use crate::errors::{AppError, AppResult};
use crate::places::PlaceRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    PlacesLoaded,
    Enriched,
    Categorized,
    WithIcons,
}

impl Stage {
    pub fn file_name(&self) -> &'static str {
        match self {
            Stage::PlacesLoaded => "places_loaded.json",
            Stage::Enriched => "enriched.json",
            Stage::Categorized => "categorized.json",
            Stage::WithIcons => "categorized_with_icons.json",
        }
    }
}

/// Whole-collection JSON snapshots, one file per pipeline stage.
///
/// Layout under the data directory: `steps/input` for source lists,
/// `steps/output` for stage snapshots and `output` for timestamped copies.
#[derive(Debug, Clone)]
pub struct StepStore {
    root: PathBuf,
}

impl StepStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn input_dir(&self) -> PathBuf {
        self.root.join("steps").join("input")
    }

    pub fn output_dir(&self) -> PathBuf {
        self.root.join("steps").join("output")
    }

    pub fn debug_dir(&self) -> PathBuf {
        self.root.join("output")
    }

    pub fn stage_path(&self, stage: Stage) -> PathBuf {
        self.output_dir().join(stage.file_name())
    }

    pub fn save(&self, stage: Stage, records: &[PlaceRecord]) -> AppResult<PathBuf> {
        let path = self.stage_path(stage);
        write_records(&path, records)?;
        info!(
            stage = stage.file_name(),
            count = records.len(),
            path = %path.display(),
            "saved step file"
        );
        Ok(path)
    }

    pub fn load(&self, stage: Stage) -> AppResult<Vec<PlaceRecord>> {
        let path = self.stage_path(stage);
        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(AppError::Io(io::Error::new(
                    io::ErrorKind::NotFound,
                    format!(
                        "step file {} not found; run the earlier step first",
                        path.display()
                    ),
                )));
            }
            Err(err) => return Err(AppError::Io(err)),
        };
        Ok(serde_json::from_str(&contents)?)
    }

    /// Writes `enriched_YYYYmmdd_HHMM.json` under the debug directory.
    pub fn save_debug_snapshot(&self, records: &[PlaceRecord]) -> AppResult<PathBuf> {
        let name = format!("enriched_{}.json", Local::now().format("%Y%m%d_%H%M"));
        let path = self.debug_dir().join(name);
        write_records(&path, records)?;
        info!(count = records.len(), path = %path.display(), "saved enrichment snapshot");
        Ok(path)
    }
}

fn write_records(path: &Path, records: &[PlaceRecord]) -> AppResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let serialized = serde_json::to_string_pretty(records)?;
    fs::write(path, serialized)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::categories::Category;
    use tempfile::tempdir;

    #[test]
    fn persists_stage_snapshots() {
        let dir = tempdir().unwrap();
        let store = StepStore::new(dir.path());
        let mut record = PlaceRecord::with_address("Náměstí", "Praha 1");
        record.category = Some(Category::Attractions);

        let path = store.save(Stage::Categorized, &[record.clone()]).unwrap();
        assert!(path.ends_with("steps/output/categorized.json"));
        let raw = fs::read_to_string(&path).unwrap();
        assert!(raw.contains("Náměstí"));
        assert!(raw.contains("\"category\": \"Attractions\""));

        assert_eq!(store.load(Stage::Categorized).unwrap(), vec![record]);
    }

    #[test]
    fn missing_stage_is_not_found() {
        let dir = tempdir().unwrap();
        let store = StepStore::new(dir.path());
        let err = store.load(Stage::Enriched).unwrap_err();
        assert!(matches!(err, AppError::Io(ref e) if e.kind() == io::ErrorKind::NotFound));
    }

    #[test]
    fn writes_timestamped_snapshot() {
        let dir = tempdir().unwrap();
        let store = StepStore::new(dir.path());
        let path = store.save_debug_snapshot(&[PlaceRecord::named("X")]).unwrap();

        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("enriched_"));
        assert_eq!(name.len(), "enriched_20240101_1200.json".len());
        assert!(path.starts_with(store.debug_dir()));
    }
}
