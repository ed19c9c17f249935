//! Page configuration building.
//!
//! [`PageConfigBuilder`] turns one source document into a complete
//! [`PageConfig`]: explicit annotations win, everything else is defaulted from
//! the document's discovery index and the per-type tables. Field validation
//! accumulates human-readable errors on the page instead of failing, so a
//! broken document still yields a (degraded) page.

use std::sync::LazyLock;

use chrono::{DateTime, SecondsFormat, Utc};
use orrery_config::{EntityType, LayoutConfig, TypeTables, is_hex_color};
use regex::Regex;

use crate::metadata::{ExtractedMetadata, extract_metadata};
use crate::page::{Importance, PageConfig, PageMetadata, titlecase_from_slug};

static LEVEL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]+$").expect("valid regex"));

/// A source document read from disk, ready to become a page.
#[derive(Clone, Debug)]
pub struct SourceDocument {
    /// Source filename (ledger key), e.g. `guides/intro.html`.
    pub filename: String,
    pub content: String,
    pub fingerprint: String,
    pub modified: Option<DateTime<Utc>>,
    pub created: Option<DateTime<Utc>>,
}

/// Builds [`PageConfig`]s from source documents.
#[derive(Clone, Debug)]
pub struct PageConfigBuilder {
    types: TypeTables,
    orbit_step: f64,
    primary_slots: usize,
}

impl PageConfigBuilder {
    #[must_use]
    pub fn new(types: TypeTables, layout: &LayoutConfig) -> Self {
        Self {
            types,
            orbit_step: layout.orbit_step,
            primary_slots: layout.primary_slots,
        }
    }

    /// Build the page for `filename` at discovery position `index` of `total`.
    ///
    /// Pure function of its arguments; never fails.
    #[must_use]
    pub fn build(&self, filename: &str, content: &str, index: usize, total: usize) -> PageConfig {
        let meta = extract_metadata(content);
        let mut errors = Vec::new();

        let name = page_name(filename);
        let entity_type = self.resolve_type(&meta, index, &mut errors);
        let style = self.types.style(entity_type);

        let title = meta
            .title()
            .map_or_else(|| titlecase_from_slug(&name), str::to_owned);
        let level = meta.get("level").map_or_else(|| name.clone(), str::to_owned);
        let color = meta.get("color").map_or_else(
            || style.palette[index % style.palette.len()].clone(),
            str::to_owned,
        );

        #[allow(clippy::cast_precision_loss)]
        let default_radius = style.base_radius + index as f64 * self.orbit_step;
        #[allow(clippy::cast_precision_loss)]
        let default_angle = index as f64 * (360.0 / total.max(1) as f64);
        let orbit_radius = parse_number(&meta, "orbit_radius", default_radius, &mut errors);
        let orbit_angle = parse_number(&meta, "orbit_angle", default_angle, &mut errors);
        let orbit_angle = if orbit_angle.is_finite() {
            orbit_angle.rem_euclid(360.0)
        } else {
            orbit_angle
        };
        let size_modifier = parse_number(&meta, "size_modifier", style.size, &mut errors);

        let importance = match meta.get("importance") {
            Some(raw) => raw.parse::<Importance>().unwrap_or_else(|()| {
                errors.push(format!(
                    "invalid importance: {raw:?} (expected high, medium or low)"
                ));
                Importance::from_position(index, total)
            }),
            None => Importance::from_position(index, total),
        };

        let tags = meta
            .get("tags")
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|t| !t.is_empty())
                    .map(str::to_owned)
                    .collect()
            })
            .unwrap_or_default();

        let mut page = PageConfig {
            title,
            level,
            entity_type,
            description: meta.get("description").unwrap_or_default().to_owned(),
            color,
            orbit_radius,
            orbit_angle,
            importance,
            icon: meta.get("icon").unwrap_or(&style.icon).to_owned(),
            size_modifier,
            unlocked: meta
                .get("unlocked")
                .map_or_else(|| "true".to_owned(), str::to_ascii_lowercase),
            parent: meta.get("parent").unwrap_or_default().to_owned(),
            children: Vec::new(),
            metadata: PageMetadata {
                tags,
                created: meta.get("created").unwrap_or_default().to_owned(),
                modified: String::new(),
                fingerprint: orrery_ledger::fingerprint(content.as_bytes()),
                preview: meta
                    .get("preview")
                    .map_or_else(|| format!("previews/{name}.png"), str::to_owned),
            },
            name,
            validation_errors: errors,
        };
        validate(&mut page);
        page
    }

    /// Build the page for a document read from disk, filling in file timestamps.
    #[must_use]
    pub fn build_document(&self, doc: &SourceDocument, index: usize, total: usize) -> PageConfig {
        let mut page = self.build(&doc.filename, &doc.content, index, total);
        page.metadata.fingerprint.clone_from(&doc.fingerprint);
        if let Some(modified) = doc.modified {
            page.metadata.modified = rfc3339(modified);
        }
        if page.metadata.created.is_empty()
            && let Some(created) = doc.created.or(doc.modified)
        {
            page.metadata.created = rfc3339(created);
        }
        page
    }

    /// Explicit type if it names a known kind, otherwise the positional default.
    fn resolve_type(
        &self,
        meta: &ExtractedMetadata,
        index: usize,
        errors: &mut Vec<String>,
    ) -> EntityType {
        if let Some(raw) = meta.get("type") {
            match raw.parse() {
                Ok(kind) => return kind,
                Err(e) => errors.push(format!("{e} (expected one of star, planet, moon, asteroid, comet)")),
            }
        }
        self.infer_type(index)
    }

    /// Deterministic type for the document at `index`.
    ///
    /// The first document is the star, the next `primary_slots` are planets,
    /// and the remainder cycle through the lower ranks.
    #[must_use]
    pub fn infer_type(&self, index: usize) -> EntityType {
        if index == 0 {
            EntityType::Star
        } else if index <= self.primary_slots {
            EntityType::Planet
        } else {
            let pool = EntityType::LOWER_RANKS;
            pool[(index - 1 - self.primary_slots) % pool.len()]
        }
    }
}

/// Page name from a source filename: the file stem of the last path segment.
#[must_use]
pub fn page_name(filename: &str) -> String {
    let base = filename.rsplit(['/', '\\']).next().unwrap_or(filename);
    match base.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem.to_owned(),
        _ => base.to_owned(),
    }
}

fn rfc3339(time: DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Parse a numeric annotation, falling back to `default` on absence or garbage.
fn parse_number(meta: &ExtractedMetadata, key: &str, default: f64, errors: &mut Vec<String>) -> f64 {
    match meta.get(key) {
        Some(raw) => raw.parse::<f64>().unwrap_or_else(|_| {
            errors.push(format!("invalid number for {key}: {raw:?}"));
            default
        }),
        None => default,
    }
}

/// Run every field check, appending all failures to `validation_errors`.
fn validate(page: &mut PageConfig) {
    let errors = &mut page.validation_errors;

    for (field, value) in [("name", &page.name), ("title", &page.title), ("level", &page.level)] {
        if value.trim().is_empty() {
            errors.push(format!("missing required field: {field}"));
        }
    }
    if !page.level.is_empty() && !LEVEL_RE.is_match(&page.level) {
        errors.push(format!(
            "invalid level format: {:?} (allowed: letters, digits, '-', '_')",
            page.level
        ));
    }
    if !page.parent.is_empty() && !LEVEL_RE.is_match(&page.parent) {
        errors.push(format!(
            "invalid parent format: {:?} (allowed: letters, digits, '-', '_')",
            page.parent
        ));
        page.parent.clear();
    }
    if !is_hex_color(&page.color) {
        errors.push(format!(
            "invalid color: {:?} (expected #RGB or #RRGGBB)",
            page.color
        ));
    }
    if !(page.orbit_radius.is_finite() && page.orbit_radius > 0.0) {
        errors.push(format!(
            "orbit radius must be greater than 0 (got {})",
            page.orbit_radius
        ));
    }
    if !page.orbit_angle.is_finite() {
        errors.push(format!("orbit angle must be finite (got {})", page.orbit_angle));
    }
    if !(page.size_modifier.is_finite() && page.size_modifier > 0.0) {
        errors.push(format!(
            "size modifier must be greater than 0 (got {})",
            page.size_modifier
        ));
    }
    if !matches!(page.unlocked.as_str(), "true" | "false") {
        errors.push(format!(
            "invalid unlocked flag: {:?} (expected true or false)",
            page.unlocked
        ));
    }
}
