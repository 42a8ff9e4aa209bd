use crate::config::EtlConfig;
use crate::error::Result;
use crate::loader::{self, Loader};
use crate::transform::{CleanOptions, CleanSummary, Transformer};
use crate::writer::{SaveSummary, SqliteWriter};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, instrument};

/// Result of a complete pipeline run
#[derive(Debug, Serialize)]
pub struct PipelineResult {
    pub messages_path: PathBuf,
    pub categories_path: PathBuf,
    pub database_path: PathBuf,
    pub table: String,
    pub messages_rows: usize,
    pub categories_rows: usize,
    pub joined_rows: usize,
    pub clean: CleanSummary,
    pub saved: SaveSummary,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Load → Clean → Save, each stage finishing before the next starts
pub struct Pipeline {
    config: EtlConfig,
}

impl Pipeline {
    pub fn new(config: EtlConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EtlConfig {
        &self.config
    }

    #[instrument(skip(self), fields(table = %self.config.table_name))]
    pub fn run(&self, messages_path: &Path, categories_path: &Path, database_path: &Path) -> Result<PipelineResult> {
        let started_at = Utc::now();

        // Step 1: Load
        println!(
            "Loading data...\n    MESSAGES: {}\n    CATEGORIES: {}",
            messages_path.display(),
            categories_path.display()
        );
        let t_load = Instant::now();
        let messages = loader::read_csv(messages_path)?;
        let categories = loader::read_csv(categories_path)?;
        let (messages_rows, categories_rows) = (messages.len(), categories.len());
        let joined = Loader::new(self.config.join_key.as_str()).join(messages, categories)?;
        let joined_rows = joined.len();
        crate::metrics::stage_duration("load", t_load.elapsed().as_secs_f64());

        // Step 2: Clean
        println!("Cleaning data...");
        let t_clean = Instant::now();
        let transformer = Transformer::new(CleanOptions::from(&self.config));
        let (cleaned, clean) = transformer.clean(joined)?;
        crate::metrics::stage_duration("clean", t_clean.elapsed().as_secs_f64());

        // Step 3: Save
        println!("Saving data...\n    DATABASE: {}", database_path.display());
        let t_save = Instant::now();
        let saved = SqliteWriter::open(database_path)?.write_table(&cleaned, &self.config.table_name)?;
        crate::metrics::stage_duration("save", t_save.elapsed().as_secs_f64());
        println!("\nSave data to SQL-Table {} successful\n", saved.table);

        let result = PipelineResult {
            messages_path: messages_path.to_path_buf(),
            categories_path: categories_path.to_path_buf(),
            database_path: database_path.to_path_buf(),
            table: saved.table.clone(),
            messages_rows,
            categories_rows,
            joined_rows,
            clean,
            saved,
            started_at,
            finished_at: Utc::now(),
        };

        if let Some(summary_path) = &self.config.summary_path {
            Self::persist_summary(&result, summary_path)?;
        }
        info!(
            "Pipeline finished: {} joined rows, {} saved to {}",
            result.joined_rows, result.saved.rows, result.table
        );
        Ok(result)
    }

    /// Persist the run report as pretty JSON
    fn persist_summary(result: &PipelineResult, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let json_content = serde_json::to_string_pretty(result)?;
        fs::write(path, json_content)?;
        info!("💾 Saved run summary to {}", path.display());
        Ok(())
    }
}
