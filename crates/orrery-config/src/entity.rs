//! Entity kinds and their per-kind presentation defaults.
//!
//! Every page is one of a closed set of [`EntityType`]s. Each kind carries a
//! [`TypeStyle`] (color palette, icon, base orbit radius, size) that the page
//! builder falls back to when a document does not set those fields itself.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// Closed enumeration of page kinds, ordered by rank (most prominent first).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityType {
    Star,
    Planet,
    Moon,
    Asteroid,
    Comet,
}

impl EntityType {
    /// All kinds in rank order.
    pub const ALL: [EntityType; 5] = [
        EntityType::Star,
        EntityType::Planet,
        EntityType::Moon,
        EntityType::Asteroid,
        EntityType::Comet,
    ];

    /// Kinds handed out round-robin once the ranked slots are filled.
    pub const LOWER_RANKS: [EntityType; 3] =
        [EntityType::Moon, EntityType::Asteroid, EntityType::Comet];

    /// Rank of this kind (0 is the highest).
    #[must_use]
    pub fn rank(self) -> usize {
        self as usize
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Star => "star",
            Self::Planet => "planet",
            Self::Moon => "moon",
            Self::Asteroid => "asteroid",
            Self::Comet => "comet",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a string does not name an [`EntityType`].
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
#[error("unknown type: {0}")]
pub struct UnknownEntityType(pub String);

impl FromStr for EntityType {
    type Err = UnknownEntityType;

    /// Case-insensitive parse; surrounding whitespace is ignored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| UnknownEntityType(wanted.to_owned()))
    }
}

/// Presentation defaults for one [`EntityType`].
#[derive(Clone, Debug, PartialEq)]
pub struct TypeStyle {
    /// Hex colors; a page picks `palette[index % palette.len()]`.
    pub palette: Vec<String>,
    pub icon: String,
    /// Orbit radius of the first page of this kind.
    pub base_radius: f64,
    /// Default size modifier.
    pub size: f64,
}

impl TypeStyle {
    fn builtin(kind: EntityType) -> Self {
        let (palette, icon, base_radius, size): (&[&str], &str, f64, f64) = match kind {
            EntityType::Star => (&["#FFD166", "#FFB703", "#FB8500"], "☀", 40.0, 2.0),
            EntityType::Planet => (&["#4CC9F0", "#4895EF", "#4361EE", "#3A0CA3"], "🪐", 120.0, 1.4),
            EntityType::Moon => (&["#D9D9D9", "#BFC0C0", "#A5A5A5"], "🌙", 200.0, 0.8),
            EntityType::Asteroid => (&["#9C6644", "#7F5539", "#B08968"], "🪨", 260.0, 0.6),
            EntityType::Comet => (&["#90E0EF", "#48CAE4", "#00B4D8"], "☄", 320.0, 0.7),
        };
        Self {
            palette: palette.iter().map(|c| (*c).to_owned()).collect(),
            icon: icon.to_owned(),
            base_radius,
            size,
        }
    }
}

/// Raw `[types.<kind>]` section; unset keys keep the built-in value.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct TypeStyleRaw {
    palette: Option<Vec<String>>,
    icon: Option<String>,
    base_radius: Option<f64>,
    size: Option<f64>,
}

/// Complete lookup table from [`EntityType`] to [`TypeStyle`].
#[derive(Clone, Debug, PartialEq)]
pub struct TypeTables {
    styles: [TypeStyle; 5],
}

impl Default for TypeTables {
    fn default() -> Self {
        Self {
            styles: EntityType::ALL.map(TypeStyle::builtin),
        }
    }
}

impl TypeTables {
    /// Style for `kind`.
    #[must_use]
    pub fn style(&self, kind: EntityType) -> &TypeStyle {
        &self.styles[kind.rank()]
    }

    /// Built-in tables with the given raw overrides applied.
    pub(crate) fn from_raw(raw: &HashMap<EntityType, TypeStyleRaw>) -> Self {
        let mut tables = Self::default();
        for (kind, overrides) in raw {
            let style = &mut tables.styles[kind.rank()];
            if let Some(palette) = &overrides.palette {
                style.palette.clone_from(palette);
            }
            if let Some(icon) = &overrides.icon {
                style.icon.clone_from(icon);
            }
            if let Some(base_radius) = overrides.base_radius {
                style.base_radius = base_radius;
            }
            if let Some(size) = overrides.size {
                style.size = size;
            }
        }
        tables
    }

    /// Check every style for usable values.
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        for kind in EntityType::ALL {
            let style = self.style(kind);
            if style.palette.is_empty() {
                return Err(ConfigError::Validation(format!(
                    "types.{kind}.palette cannot be empty"
                )));
            }
            if let Some(bad) = style.palette.iter().find(|c| !is_hex_color(c)) {
                return Err(ConfigError::Validation(format!(
                    "types.{kind}.palette contains invalid color {bad:?}"
                )));
            }
            if !(style.base_radius.is_finite() && style.base_radius > 0.0) {
                return Err(ConfigError::Validation(format!(
                    "types.{kind}.base_radius must be greater than 0"
                )));
            }
            if !(style.size.is_finite() && style.size > 0.0) {
                return Err(ConfigError::Validation(format!(
                    "types.{kind}.size must be greater than 0"
                )));
            }
        }
        Ok(())
    }
}

/// `#RGB` or `#RRGGBB`, case-insensitive.
#[must_use]
pub fn is_hex_color(value: &str) -> bool {
    value.strip_prefix('#').is_some_and(|digits| {
        matches!(digits.len(), 3 | 6) && digits.chars().all(|c| c.is_ascii_hexdigit())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_entity_type_case_insensitive() {
        assert_eq!("Planet".parse::<EntityType>(), Ok(EntityType::Planet));
        assert_eq!(" comet ".parse::<EntityType>(), Ok(EntityType::Comet));
        assert_eq!(
            "nebula".parse::<EntityType>(),
            Err(UnknownEntityType("nebula".to_owned()))
        );
    }

    #[test]
    fn test_rank_follows_declaration_order() {
        let ranks: Vec<usize> = EntityType::ALL.iter().map(|k| k.rank()).collect();
        assert_eq!(ranks, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_hex_color() {
        assert!(is_hex_color("#fff"));
        assert!(is_hex_color("#A1b2C3"));
        assert!(!is_hex_color("fff"));
        assert!(!is_hex_color("#ffff"));
        assert!(!is_hex_color("#ggg"));
        assert!(!is_hex_color(""));
    }

    #[test]
    fn test_builtin_tables_are_valid() {
        assert!(TypeTables::default().validate().is_ok());
    }

    #[test]
    fn test_overrides_keep_unset_fields() {
        let mut raw = HashMap::new();
        raw.insert(
            EntityType::Moon,
            TypeStyleRaw {
                icon: Some("M".to_owned()),
                ..Default::default()
            },
        );
        let tables = TypeTables::from_raw(&raw);
        let moon = tables.style(EntityType::Moon);
        assert_eq!(moon.icon, "M");
        assert_eq!(moon.base_radius, 200.0);
        assert_eq!(tables.style(EntityType::Star), &TypeStyle::builtin(EntityType::Star));
    }

    #[test]
    fn test_validate_rejects_bad_palette_color() {
        let mut raw = HashMap::new();
        raw.insert(
            EntityType::Comet,
            TypeStyleRaw {
                palette: Some(vec!["#00B4D8".to_owned(), "teal".to_owned()]),
                ..Default::default()
            },
        );
        let err = TypeTables::from_raw(&raw).validate().unwrap_err();
        assert!(err.to_string().contains("types.comet.palette"));
    }
}
