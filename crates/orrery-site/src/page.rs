//! Page configuration model.
//!
//! [`PageConfig`] is the normalized description of one generated page. It is
//! created by [`PageConfigBuilder`](crate::PageConfigBuilder), has its
//! hierarchy fields repaired by [`HierarchyResolver`](crate::HierarchyResolver),
//! and is read by the renderer and the site map.

use std::fmt;
use std::str::FromStr;

use orrery_config::EntityType;
use serde::{Deserialize, Serialize};

/// Relative prominence of a page.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Importance {
    High,
    Medium,
    Low,
}

impl Importance {
    pub const ALL: [Importance; 3] = [Importance::High, Importance::Medium, Importance::Low];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }

    /// Default importance from a page's position in discovery order.
    ///
    /// The first third of the batch is high, the second third medium, the
    /// rest low.
    #[must_use]
    pub fn from_position(index: usize, total: usize) -> Self {
        let total = total.max(1);
        if index * 3 < total {
            Self::High
        } else if index * 3 < total * 2 {
            Self::Medium
        } else {
            Self::Low
        }
    }
}

impl fmt::Display for Importance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Importance {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|i| i.as_str().eq_ignore_ascii_case(wanted))
            .ok_or(())
    }
}

/// Bookkeeping attached to every page.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMetadata {
    pub tags: Vec<String>,
    /// RFC 3339 creation time.
    pub created: String,
    /// RFC 3339 modification time of the source document.
    pub modified: String,
    /// Content fingerprint of the source document.
    pub fingerprint: String,
    /// Path of the preview image, relative to the site root.
    pub preview: String,
}

/// Canonical description of one output page.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageConfig {
    /// Derived from the source filename, unique within a build.
    pub name: String,
    pub title: String,
    /// Hierarchy key other pages refer to in `parent`.
    pub level: String,
    #[serde(rename = "type")]
    pub entity_type: EntityType,
    pub description: String,
    pub color: String,
    pub orbit_radius: f64,
    pub orbit_angle: f64,
    pub importance: Importance,
    pub icon: String,
    pub size_modifier: f64,
    /// `"true"` or `"false"`.
    pub unlocked: String,
    /// Level of the containing page; empty for roots.
    pub parent: String,
    /// Levels of pages whose parent is this page. Computed.
    pub children: Vec<String>,
    pub metadata: PageMetadata,
    pub validation_errors: Vec<String>,
}

impl PageConfig {
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.parent.is_empty()
    }

    #[must_use]
    pub fn has_errors(&self) -> bool {
        !self.validation_errors.is_empty()
    }

    /// Output file name for this page, e.g. `guide.html`.
    #[must_use]
    pub fn url(&self, extension: &str) -> String {
        format!("{}.{extension}", self.name)
    }
}

/// Convert a slug (kebab-case or `snake_case`) to title case.
///
/// Replaces `-` and `_` with spaces, then capitalizes the first letter of each word.
pub(crate) fn titlecase_from_slug(slug: &str) -> String {
    let mut result = String::with_capacity(slug.len());
    for word in slug.split(['-', '_', ' ']).filter(|w| !w.is_empty()) {
        if !result.is_empty() {
            result.push(' ');
        }
        let mut chars = word.chars();
        if let Some(first) = chars.next() {
            result.extend(first.to_uppercase());
            result.push_str(chars.as_str());
        }
    }
    result
}
