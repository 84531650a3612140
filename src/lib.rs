pub mod categories;
pub mod categorize;
pub mod config;
pub mod errors;
pub mod icons;
pub mod ingestion;
pub mod llm;
pub mod pipeline;
pub mod places;
pub mod prompt;
pub mod quality;
pub mod response;
pub mod steps;

use once_cell::sync::OnceCell;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub use categories::{normalize, Category, DEFAULT_CATEGORY};
pub use categorize::{apply_categories, BatchOutcome, CategorizeSettings, Categorizer};
pub use config::{mask_key, AppConfig, PublicAppConfig};
pub use errors::{AppError, AppResult};
pub use icons::{assign_icons, icon_for, Icon, DEFAULT_ICON};
pub use ingestion::{load_enriched, load_places};
pub use llm::{HttpLlmClient, LlmClient, LlmService};
pub use pipeline::{category_counts, Pipeline};
pub use places::{EnrichmentReport, HttpPlacesClient, PlaceLookup, PlaceRecord, PlacesService};
pub use prompt::build_prompt;
pub use quality::{classify, QualityColor};
pub use response::parse_batch_response;
pub use steps::{Stage, StepStore};

pub fn init_tracing() {
    static INIT: OnceCell<()> = OnceCell::new();
    let _ = INIT.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("info,place_categorizer=debug"));
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    });
}
