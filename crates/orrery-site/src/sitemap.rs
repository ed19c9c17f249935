//! Site manifest.

use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Utc};
use orrery_config::EntityType;
use serde::{Deserialize, Serialize};

use crate::page::{Importance, PageConfig, PageMetadata};

/// Manifest schema version.
pub const MANIFEST_VERSION: u32 = 1;

/// Published description of every page of one build.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    pub version: u32,
    /// RFC 3339.
    pub generated_at: String,
    pub pages: Vec<PageSummary>,
    pub statistics: Statistics,
}

impl Manifest {
    /// Pretty JSON with a trailing newline.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        let mut json = serde_json::to_string_pretty(self)?;
        json.push('\n');
        Ok(json)
    }
}

/// Manifest entry for one page.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageSummary {
    pub level: String,
    pub title: String,
    #[serde(rename = "type")]
    pub entity_type: EntityType,
    pub importance: Importance,
    pub url: String,
    pub parent: String,
    pub children: Vec<String>,
    pub metadata: PageMetadata,
    pub validation_errors: Vec<String>,
}

/// Frequency counts over a batch of pages.
///
/// Every kind and importance appears in the maps, with zero when unused.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Statistics {
    pub total: usize,
    pub by_type: BTreeMap<EntityType, usize>,
    pub by_importance: BTreeMap<Importance, usize>,
    pub with_errors: usize,
}

impl Statistics {
    #[must_use]
    pub fn collect(pages: &[PageConfig]) -> Self {
        let mut by_type: BTreeMap<EntityType, usize> =
            EntityType::ALL.into_iter().map(|k| (k, 0)).collect();
        let mut by_importance: BTreeMap<Importance, usize> =
            Importance::ALL.into_iter().map(|i| (i, 0)).collect();
        let mut with_errors = 0;

        for page in pages {
            *by_type.entry(page.entity_type).or_default() += 1;
            *by_importance.entry(page.importance).or_default() += 1;
            if page.has_errors() {
                with_errors += 1;
            }
        }

        Self {
            total: pages.len(),
            by_type,
            by_importance,
            with_errors,
        }
    }
}

/// Aggregates pages into a [`Manifest`].
pub struct SiteMapBuilder;

impl SiteMapBuilder {
    /// Build the manifest for `pages`, in their given order.
    ///
    /// `extension` is the output file extension used for page URLs.
    #[must_use]
    pub fn build(pages: &[PageConfig], extension: &str, generated_at: DateTime<Utc>) -> Manifest {
        let summaries = pages
            .iter()
            .map(|page| PageSummary {
                level: page.level.clone(),
                title: page.title.clone(),
                entity_type: page.entity_type,
                importance: page.importance,
                url: page.url(extension),
                parent: page.parent.clone(),
                children: page.children.clone(),
                metadata: page.metadata.clone(),
                validation_errors: page.validation_errors.clone(),
            })
            .collect();

        Manifest {
            version: MANIFEST_VERSION,
            generated_at: generated_at.to_rfc3339_opts(SecondsFormat::Secs, true),
            pages: summaries,
            statistics: Statistics::collect(pages),
        }
    }
}
