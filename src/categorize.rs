use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, error, info};

use crate::categories::{Category, DEFAULT_CATEGORY};
use crate::config::AppConfig;
use crate::llm::LlmClient;
use crate::places::PlaceRecord;
use crate::prompt::build_prompt;
use crate::quality::classify;
use crate::response::{default_assignments, parse_batch_response};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CategorizeSettings {
    pub batch_size: usize,
    pub inter_batch_delay: Duration,
}

impl CategorizeSettings {
    pub fn new(batch_size: usize, inter_batch_delay: Duration) -> Self {
        Self {
            batch_size: batch_size.max(1),
            inter_batch_delay,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.categorize_batch_size, config.llm_request_delay)
    }
}

/// Result of one batch request, before it is folded into the run's mapping.
#[derive(Debug, Clone, PartialEq)]
pub enum BatchOutcome {
    Categorized(HashMap<String, Category>),
    Failed { reason: String },
}

impl BatchOutcome {
    /// Failed batches resolve to the default category for every place.
    pub fn into_assignments(self, batch: &[PlaceRecord]) -> HashMap<String, Category> {
        match self {
            BatchOutcome::Categorized(assignments) => assignments,
            BatchOutcome::Failed { .. } => default_assignments(batch),
        }
    }
}

pub struct Categorizer {
    client: Arc<dyn LlmClient>,
    settings: CategorizeSettings,
}

impl Categorizer {
    pub fn new(client: Arc<dyn LlmClient>, settings: CategorizeSettings) -> Self {
        Self {
            client,
            settings: CategorizeSettings::new(settings.batch_size, settings.inter_batch_delay),
        }
    }

    pub fn settings(&self) -> CategorizeSettings {
        self.settings
    }

    /// Categorizes `places` batch by batch, in order.
    ///
    /// Every place name ends up in the returned mapping. A batch whose request
    /// fails contributes default categories; later batches still run. Names
    /// seen in several places keep the last answer.
    pub async fn categorize(&self, places: &[PlaceRecord]) -> HashMap<String, Category> {
        let mut combined = HashMap::with_capacity(places.len());
        if places.is_empty() {
            return combined;
        }

        let batch_size = self.settings.batch_size;
        let total_batches = places.len().div_ceil(batch_size);
        for (batch_index, batch) in places.chunks(batch_size).enumerate() {
            let start = batch_index * batch_size;
            let batch_number = batch_index + 1;
            if batch_index > 0 && !self.settings.inter_batch_delay.is_zero() {
                debug!(
                    delay_ms = self.settings.inter_batch_delay.as_millis() as u64,
                    "pacing before next batch"
                );
                sleep(self.settings.inter_batch_delay).await;
            }

            let outcome = self.categorize_batch(batch).await;
            if let BatchOutcome::Failed { reason } = &outcome {
                error!(
                    batch = batch_number,
                    total_batches,
                    %reason,
                    "batch failed (places {}-{}); using default category",
                    start + 1,
                    start + batch.len()
                );
            }

            let assignments = outcome.into_assignments(batch);
            for place in batch {
                let category = assignments
                    .get(&place.name)
                    .copied()
                    .unwrap_or(DEFAULT_CATEGORY);
                info!(batch = batch_number, "{} -> {}", place.name, category);
            }
            combined.extend(assignments);
        }
        combined
    }

    /// One prompt, one request, one parse.
    pub async fn categorize_batch(&self, batch: &[PlaceRecord]) -> BatchOutcome {
        let prompt = build_prompt(batch);
        match self.client.send(&prompt).await {
            Ok(raw) => BatchOutcome::Categorized(parse_batch_response(&raw, batch)),
            Err(err) => BatchOutcome::Failed {
                reason: err.to_string(),
            },
        }
    }
}

/// Writes categories and quality colors onto the records.
pub fn apply_categories(places: &mut [PlaceRecord], assignments: &HashMap<String, Category>) {
    for place in places.iter_mut() {
        let category = assignments
            .get(&place.name)
            .copied()
            .unwrap_or(DEFAULT_CATEGORY);
        place.category = Some(category);
        place.quality_color = Some(classify(place.rating, place.user_ratings_count));
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use async_trait::async_trait;
    use parking_lot::Mutex;
    use tokio::time::Instant;

    use super::*;
    use crate::errors::{AppError, AppResult};
    use crate::quality::QualityColor;

    struct ScriptedClient {
        replies: Mutex<Vec<AppResult<String>>>,
        calls: Mutex<Vec<(Instant, String)>>,
    }

    impl ScriptedClient {
        fn new(replies: Vec<AppResult<String>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies),
                calls: Mutex::new(Vec::new()),
            })
        }

        fn prompts(&self) -> Vec<String> {
            self.calls.lock().iter().map(|(_, p)| p.clone()).collect()
        }
    }

    #[async_trait]
    impl LlmClient for ScriptedClient {
        async fn send(&self, prompt: &str) -> AppResult<String> {
            self.calls.lock().push((Instant::now(), prompt.to_string()));
            let mut replies = self.replies.lock();
            if replies.is_empty() {
                return Ok("{}".into());
            }
            replies.remove(0)
        }
    }

    fn places(names: &[&str]) -> Vec<PlaceRecord> {
        names.iter().map(|name| PlaceRecord::named(*name)).collect()
    }

    fn categorizer(client: Arc<ScriptedClient>, batch_size: usize) -> Categorizer {
        Categorizer::new(client, CategorizeSettings::new(batch_size, Duration::ZERO))
    }

    #[tokio::test]
    async fn empty_input_makes_no_calls() {
        let client = ScriptedClient::new(vec![]);
        let result = categorizer(client.clone(), 30).categorize(&[]).await;

        assert!(result.is_empty());
        assert!(client.prompts().is_empty());
    }

    #[tokio::test]
    async fn failed_batch_defaults_without_stopping_the_run() {
        let client = ScriptedClient::new(vec![
            Ok(r#"{"1": "Shopping", "2": "Hotel"}"#.into()),
            Err(AppError::Llm("503 Service Unavailable".into())),
            Ok("```json\n{\"1\": \"sweets\", \"2\": \"Cable\"}\n```".into()),
        ]);
        let input = places(&["Mall", "Inn", "Diner", "Stall", "Bakery", "Gondola"]);

        let result = categorizer(client.clone(), 2).categorize(&input).await;

        assert_eq!(client.prompts().len(), 3);
        assert_eq!(result["Mall"], Category::Shopping);
        assert_eq!(result["Inn"], Category::Hotel);
        assert_eq!(result["Diner"], DEFAULT_CATEGORY);
        assert_eq!(result["Stall"], DEFAULT_CATEGORY);
        assert_eq!(result["Bakery"], Category::Sweets);
        assert_eq!(result["Gondola"], Category::Cable);
    }

    #[tokio::test]
    async fn covers_every_distinct_name() {
        let client = ScriptedClient::new(vec![
            Ok("not json".into()),
            Ok(r#"{"1": "Restaurants"}"#.into()),
        ]);
        let input = places(&["A", "B", "A", "C", "D", "B", "E"]);

        let result = categorizer(client.clone(), 3).categorize(&input).await;

        let expected: HashSet<_> = input.iter().map(|p| p.name.clone()).collect();
        let keys: HashSet<_> = result.keys().cloned().collect();
        assert_eq!(keys, expected);
        assert_eq!(client.prompts().len(), 3);
    }

    #[tokio::test]
    async fn later_batches_overwrite_duplicate_names() {
        let client = ScriptedClient::new(vec![
            Ok(r#"{"1": "Hotel"}"#.into()),
            Ok(r#"{"1": "Street food"}"#.into()),
        ]);
        let input = places(&["Twin", "Twin"]);

        let result = categorizer(client, 1).categorize(&input).await;

        assert_eq!(result.len(), 1);
        assert_eq!(result["Twin"], Category::StreetFood);
    }

    #[tokio::test]
    async fn numbers_restart_in_each_batch() {
        let client = ScriptedClient::new(vec![]);
        let input = places(&["A", "B", "C"]);

        categorizer(client.clone(), 2).categorize(&input).await;

        let prompts = client.prompts();
        assert!(prompts[0].contains("--- Place 2 ---\nName: B\n"));
        assert!(prompts[1].contains("--- Place 1 ---\nName: C\n"));
        assert!(!prompts[1].contains("--- Place 2 ---"));
    }

    #[tokio::test(start_paused = true)]
    async fn paces_batches_after_the_first() {
        let client = ScriptedClient::new(vec![]);
        let delay = Duration::from_secs(6);
        let categorizer = Categorizer::new(client.clone(), CategorizeSettings::new(2, delay));
        let started = Instant::now();

        categorizer.categorize(&places(&["A", "B", "C", "D", "E"])).await;

        let calls: Vec<Instant> = client.calls.lock().iter().map(|(at, _)| *at).collect();
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[0] - started, Duration::ZERO);
        assert_eq!(calls[1] - calls[0], delay);
        assert_eq!(calls[2] - calls[1], delay);
    }

    #[test]
    fn zero_batch_size_is_clamped() {
        assert_eq!(CategorizeSettings::new(0, Duration::ZERO).batch_size, 1);
    }

    #[test]
    fn applies_categories_and_quality() {
        let mut records = vec![
            PlaceRecord {
                rating: Some(4.6),
                user_ratings_count: Some(800),
                ..PlaceRecord::named("Popular")
            },
            PlaceRecord::named("Unmapped"),
        ];
        let assignments = HashMap::from([("Popular".to_string(), Category::Restaurants)]);

        apply_categories(&mut records, &assignments);

        assert_eq!(records[0].category, Some(Category::Restaurants));
        assert_eq!(records[0].quality_color, Some(QualityColor::Green));
        assert_eq!(records[1].category, Some(DEFAULT_CATEGORY));
        assert_eq!(records[1].quality_color, Some(QualityColor::Red));
    }

    #[test]
    fn failed_outcome_reduces_to_defaults() {
        let batch = places(&["X", "Y"]);
        let outcome = BatchOutcome::Failed {
            reason: "timeout".into(),
        };
        let assignments = outcome.into_assignments(&batch);
        assert_eq!(assignments.len(), 2);
        assert!(assignments.values().all(|c| *c == DEFAULT_CATEGORY));
    }
}
