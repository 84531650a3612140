use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use tracing::info;

use place_categorizer::{
    category_counts, init_tracing, mask_key, AppConfig, LlmService, Pipeline, PlacesService,
};
use secrecy::ExposeSecret;

#[derive(Parser)]
#[command(name = "place-categorizer")]
#[command(about = "Enrich a list of places, categorize them and assign map icons")]
#[command(version)]
struct Cli {
    /// Step to run; each step reads the previous step's file
    #[arg(value_enum, default_value_t = Step::All)]
    step: Step,

    /// Input list (.txt or .csv); defaults to INPUT_FILE under data/steps/input
    #[arg(short, long, value_name = "FILE")]
    input: Option<PathBuf>,

    /// Data directory holding step files
    #[arg(long, value_name = "DIR", env = "DATA_DIR")]
    data_dir: Option<PathBuf>,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Step {
    Load,
    Enrich,
    Categorize,
    Icons,
    All,
}

impl Step {
    fn includes(self, step: Step) -> bool {
        self == Step::All || self == step
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let mut config = AppConfig::from_env();
    if let Some(dir) = cli.data_dir {
        config.data_dir = dir;
    }
    info!(config = ?config.public_profile(), "starting");
    let pipeline = Pipeline::new(config.clone());

    // Missing credentials are fatal before any stage touches the step files.
    let places = if cli.step.includes(Step::Enrich) {
        if let Some(key) = &config.google_maps_api_key {
            info!(key = %mask_key(key.expose_secret(), 4), "using places key");
        }
        Some(PlacesService::from_config(&config)?)
    } else {
        None
    };
    let llm = if cli.step.includes(Step::Categorize) {
        Some(LlmService::from_config(&config)?)
    } else {
        None
    };

    if cli.step.includes(Step::Load) {
        let input = pipeline.resolve_input(cli.input.as_deref())?;
        let loaded = pipeline
            .run_load(&input)
            .with_context(|| format!("loading {}", input.display()))?;
        println!("Loaded: {}", loaded.len());
    }

    if let Some(places) = &places {
        let report = pipeline.run_enrich(places).await.context("enriching places")?;
        println!(
            "Enriched: {}, Failed: {}",
            report.enriched.len(),
            report.failed.len()
        );
    }

    if let Some(llm) = llm {
        let records = pipeline
            .run_categorize(Arc::new(llm))
            .await
            .context("categorizing places")?;
        println!("Categorized: {}", records.len());
        for (category, count) in category_counts(&records) {
            println!("  {category}: {count}");
        }
    }

    if cli.step.includes(Step::Icons) {
        let records = pipeline.run_icons().context("assigning icons")?;
        println!("Icons assigned: {}", records.len());
    }

    Ok(())
}
