//! Job Catalog
//!
//! Registers the platform's batch jobs: which table each one walks, which
//! content-service method mutates an item, and when an item still needs
//! work ("missing only" eligibility).

use crate::content_client::ContentServiceProcessor;
use anyhow::Result;
use backfill_core::application::{CheckpointMode, EngineConfig, JobDefinition, JobRegistry};
use backfill_core::domain::{normalize_options, BatchItem};
use backfill_core::port::time_provider::SystemTimeProvider;
use backfill_core::port::EligibilityPredicate;
use backfill_infra_sqlite::{SourceQuery, SqliteCheckpointStore, SqliteRecordSource};
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;

fn text_field_missing(field: &'static str) -> EligibilityPredicate {
    Arc::new(move |item: &BatchItem| {
        item.payload
            .get(field)
            .and_then(|v| v.as_str())
            .map(|s| s.trim().is_empty())
            .unwrap_or(true)
    })
}

/// Eligible when the option-shaped field normalizes to an empty list.
/// An unparseable legacy shape also counts as "needs work".
fn options_field_empty(field: &'static str) -> EligibilityPredicate {
    Arc::new(move |item: &BatchItem| {
        let value = item.payload.get(field).cloned().unwrap_or(serde_json::Value::Null);
        match normalize_options(&value) {
            Ok(entries) => entries.is_empty(),
            Err(_) => true,
        }
    })
}

/// Build the production job registry for the admin platform database
pub fn build_registry(pool: SqlitePool, content_url: &str) -> Result<JobRegistry> {
    let checkpoints = Arc::new(SqliteCheckpointStore::new(
        pool.clone(),
        Arc::new(SystemTimeProvider),
    ));
    let mut registry = JobRegistry::new(checkpoints);

    let throttled = |delay_ms: u64| EngineConfig {
        item_delay: Duration::from_millis(delay_ms),
        missing_only: true,
        ..EngineConfig::default()
    };

    registry.register(JobDefinition {
        job_key: "wiki_content_fill".to_string(),
        description: "Generate missing wiki entry content".to_string(),
        source: Arc::new(SqliteRecordSource::new(
            pool.clone(),
            SourceQuery::new(
                "wiki_entries",
                "id",
                "id",
                vec!["title".to_string(), "content".to_string()],
            )?,
        )),
        processor: Arc::new(ContentServiceProcessor::new(
            content_url,
            "content.fillWikiEntry.v1",
        )?),
        eligibility: Some(text_field_missing("content")),
        config: throttled(2000),
    });

    registry.register(JobDefinition {
        job_key: "social_link_fetch".to_string(),
        description: "Fetch social links for persons without any".to_string(),
        source: Arc::new(SqliteRecordSource::new(
            pool.clone(),
            SourceQuery::new(
                "persons",
                "id",
                "id",
                vec!["name".to_string(), "social_links".to_string()],
            )?,
        )),
        processor: Arc::new(ContentServiceProcessor::new(
            content_url,
            "content.fetchSocialLinks.v1",
        )?),
        eligibility: Some(options_field_empty("social_links")),
        config: throttled(1500),
    });

    registry.register(JobDefinition {
        job_key: "music_chart_fetch".to_string(),
        description: "Fetch chart data for albums missing it".to_string(),
        source: Arc::new(SqliteRecordSource::new(
            pool.clone(),
            SourceQuery::new(
                "albums",
                "id",
                "id",
                vec!["title".to_string(), "chart_data".to_string()],
            )?,
        )),
        processor: Arc::new(ContentServiceProcessor::new(
            content_url,
            "content.fetchChartData.v1",
        )?),
        eligibility: Some(text_field_missing("chart_data")),
        config: throttled(1500),
    });

    registry.register(JobDefinition {
        job_key: "metadata_migration".to_string(),
        description: "Migrate wiki entry metadata to the current schema".to_string(),
        source: Arc::new(SqliteRecordSource::new(
            pool.clone(),
            SourceQuery::new(
                "wiki_entries",
                "id",
                "id",
                vec!["title".to_string(), "metadata_version".to_string()],
            )?,
        )),
        processor: Arc::new(ContentServiceProcessor::new(
            content_url,
            "content.migrateMetadata.v1",
        )?),
        eligibility: Some(Arc::new(|item: &BatchItem| {
            item.payload
                .get("metadata_version")
                .and_then(|v| v.as_str())
                .map(|v| v != "2")
                .unwrap_or(true)
        })),
        config: EngineConfig {
            item_delay: Duration::from_millis(500),
            missing_only: true,
            ..EngineConfig::default()
        },
    });

    registry.register(JobDefinition {
        job_key: "duplicate_removal".to_string(),
        description: "Remove duplicate posts (full scan)".to_string(),
        source: Arc::new(SqliteRecordSource::new(
            pool.clone(),
            SourceQuery::new(
                "posts",
                "id",
                "id",
                vec!["title".to_string(), "content_hash".to_string()],
            )?,
        )),
        processor: Arc::new(ContentServiceProcessor::new(
            content_url,
            "moderation.removeDuplicate.v1",
        )?),
        eligibility: None,
        // Cheap per-item work, so per-page checkpointing is enough here
        config: EngineConfig {
            item_delay: Duration::from_millis(200),
            checkpoint_mode: CheckpointMode::PerPage,
            ..EngineConfig::default()
        },
    });

    registry.register(JobDefinition {
        job_key: "person_detail_fill".to_string(),
        description: "Auto-fill missing person detail sections".to_string(),
        source: Arc::new(SqliteRecordSource::new(
            pool.clone(),
            SourceQuery::new(
                "persons",
                "id",
                "id",
                vec!["name".to_string(), "detail".to_string()],
            )?,
        )),
        processor: Arc::new(ContentServiceProcessor::new(
            content_url,
            "content.fillPersonDetail.v1",
        )?),
        eligibility: Some(text_field_missing("detail")),
        config: throttled(2000),
    });

    Ok(registry)
}
