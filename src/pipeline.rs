use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{info, warn};

use crate::categorize::{apply_categories, CategorizeSettings, Categorizer};
use crate::config::AppConfig;
use crate::errors::{AppError, AppResult};
use crate::icons::assign_icons;
use crate::ingestion::load_places;
use crate::llm::LlmClient;
use crate::places::{EnrichmentReport, PlaceRecord, PlacesService};
use crate::steps::{Stage, StepStore};

/// Runs the load, enrich, categorize and icon stages over step files.
///
/// Each stage reads the previous stage's snapshot, so stages can be rerun
/// on their own.
pub struct Pipeline {
    config: AppConfig,
    store: StepStore,
}

impl Pipeline {
    pub fn new(config: AppConfig) -> Self {
        let store = StepStore::new(config.data_dir.clone());
        Self { config, store }
    }

    pub fn store(&self) -> &StepStore {
        &self.store
    }

    /// An explicit path wins; otherwise `INPUT_FILE` under `steps/input`.
    pub fn resolve_input(&self, explicit: Option<&Path>) -> AppResult<PathBuf> {
        if let Some(path) = explicit {
            return Ok(path.to_path_buf());
        }
        self.config
            .input_file
            .as_ref()
            .map(|name| self.store.input_dir().join(name))
            .ok_or_else(|| AppError::Config("INPUT_FILE is not set and no input was given".into()))
    }

    pub fn run_load(&self, input: &Path) -> AppResult<Vec<PlaceRecord>> {
        let places = load_places(input)?;
        info!(count = places.len(), input = %input.display(), "loaded places");
        self.store.save(Stage::PlacesLoaded, &places)?;
        Ok(places)
    }

    pub async fn run_enrich(&self, places: &PlacesService) -> AppResult<EnrichmentReport> {
        let loaded = self.store.load(Stage::PlacesLoaded)?;
        let report = places.enrich(&loaded).await;
        self.store.save(Stage::Enriched, &report.enriched)?;
        if !report.enriched.is_empty() {
            self.store.save_debug_snapshot(&report.enriched)?;
        }
        if !report.failed.is_empty() {
            warn!(failed = report.failed.len(), "some places could not be enriched");
        }
        Ok(report)
    }

    pub async fn run_categorize(&self, llm: Arc<dyn LlmClient>) -> AppResult<Vec<PlaceRecord>> {
        let mut records = self.store.load(Stage::Enriched)?;
        let categorizer = Categorizer::new(llm, CategorizeSettings::from_config(&self.config));
        let assignments = categorizer.categorize(&records).await;
        apply_categories(&mut records, &assignments);
        self.store.save(Stage::Categorized, &records)?;
        Ok(records)
    }

    pub fn run_icons(&self) -> AppResult<Vec<PlaceRecord>> {
        let mut records = self.store.load(Stage::Categorized)?;
        assign_icons(&mut records);
        self.store.save(Stage::WithIcons, &records)?;
        Ok(records)
    }
}

/// Places per category label, for run summaries.
pub fn category_counts(records: &[PlaceRecord]) -> BTreeMap<&'static str, usize> {
    let mut counts = BTreeMap::new();
    for record in records {
        if let Some(category) = record.category {
            *counts.entry(category.as_str()).or_insert(0) += 1;
        }
    }
    counts
}
