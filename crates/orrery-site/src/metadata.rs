//! Declarative page annotations.
//!
//! Source documents describe themselves with `key: value` annotations over a
//! restricted key namespace (`[A-Za-z][A-Za-z0-9_-]*`). Two forms are
//! recognised, and later annotations override earlier ones:
//!
//! ```text
//! ---
//! level: billing
//! parent: platform
//! ---
//! <meta name="orrery:type" content="planet">
//! ```
//!
//! 1. A front-matter block delimited by `---` lines at the start of the document.
//! 2. `<meta name="orrery:KEY" content="VALUE">` elements anywhere in the document.
//!
//! Extraction is purely textual. Anything that looks like an annotation but
//! does not parse is reported in [`ExtractedMetadata::diagnostics`] and skipped.
//!
//! Keys are normalized so `orbitRadius`, `orbit-radius` and `orbit_radius`
//! all land on `orbit_radius`.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;

/// Prefix of the `name` attribute of annotation meta elements.
pub const META_PREFIX: &str = "orrery:";

static KEY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9_-]*$").expect("valid regex"));
static META_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<meta\b([^>]*)>").expect("valid regex"));
static ATTR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)([A-Za-z_:][-A-Za-z0-9_:.]*)\s*=\s*(?:"([^"]*)"|'([^']*)')"#)
        .expect("valid regex")
});
static TITLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<title[^>]*>(.*?)</title>").expect("valid regex"));
static H1_TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<h1[^>]*>(.*?)</h1>").expect("valid regex"));
static H1_MD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^#\s+(.+)$").expect("valid regex"));
static TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]*>").expect("valid regex"));

/// Result of scanning one document for annotations.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExtractedMetadata {
    /// Normalized key to raw string value.
    pub fields: BTreeMap<String, String>,
    /// Title scraped from `<title>`, `<h1>` or a markdown `#` heading.
    pub fallback_title: Option<String>,
    /// Annotations that were skipped, in document order.
    pub diagnostics: Vec<String>,
}

impl ExtractedMetadata {
    /// Value for `key`, if present and not blank.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    /// The explicit title annotation, falling back to the scraped title.
    #[must_use]
    pub fn title(&self) -> Option<&str> {
        self.get("title").or(self.fallback_title.as_deref())
    }
}

/// Extract annotations and a fallback title from raw document text. Never fails.
#[must_use]
pub fn extract_metadata(content: &str) -> ExtractedMetadata {
    let mut meta = ExtractedMetadata::default();
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);

    let body_start = extract_front_matter(content, &mut meta);
    extract_meta_elements(content, &mut meta);
    meta.fallback_title = fallback_title(&content[body_start..]);

    meta
}

/// Normalize an annotation key: camelCase and kebab-case become `snake_case`.
#[must_use]
pub fn normalize_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len() + 4);
    let mut prev_lower = false;
    for c in key.trim().chars() {
        if c == '-' {
            out.push('_');
            prev_lower = false;
        } else if c.is_ascii_uppercase() {
            if prev_lower {
                out.push('_');
            }
            out.push(c.to_ascii_lowercase());
            prev_lower = false;
        } else {
            out.push(c);
            prev_lower = c.is_ascii_lowercase() || c.is_ascii_digit();
        }
    }
    out
}

fn insert_field(meta: &mut ExtractedMetadata, raw_key: &str, value: String, origin: &str) {
    let raw_key = raw_key.trim();
    if KEY_RE.is_match(raw_key) {
        meta.fields.insert(normalize_key(raw_key), value);
    } else {
        meta.diagnostics
            .push(format!("{origin}: invalid annotation key {raw_key:?}"));
    }
}

/// Parse a leading front-matter block. Returns the byte offset where the body
/// starts, which is 0 when there is no complete block.
fn extract_front_matter(content: &str, meta: &mut ExtractedMetadata) -> usize {
    let mut lines = content.split_inclusive('\n');
    let first = match lines.next() {
        Some(first) if first.trim_end() == "---" => first,
        _ => return 0,
    };

    let mut block = Vec::new();
    let mut body_start = None;
    let mut offset = first.len();
    for line in lines {
        offset += line.len();
        if line.trim_end() == "---" {
            body_start = Some(offset);
            break;
        }
        block.push(line);
    }
    let Some(body_start) = body_start else {
        meta.diagnostics
            .push("front matter: missing closing '---'".to_owned());
        return 0;
    };

    for (n, line) in block.into_iter().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let origin = format!("front matter line {}", n + 2);
        match trimmed.split_once(':') {
            Some((key, value)) => insert_field(meta, key, unquote(value.trim()).to_owned(), &origin),
            None => meta
                .diagnostics
                .push(format!("{origin}: expected 'key: value'")),
        }
    }
    body_start
}

fn extract_meta_elements(content: &str, meta: &mut ExtractedMetadata) {
    for element in META_RE.captures_iter(content) {
        let mut name = None;
        let mut value = None;
        for attr in ATTR_RE.captures_iter(&element[1]) {
            let attr_value = attr.get(2).or_else(|| attr.get(3)).map_or("", |m| m.as_str());
            match attr[1].to_ascii_lowercase().as_str() {
                "name" => name = Some(attr_value),
                "content" => value = Some(attr_value),
                _ => {}
            }
        }

        let Some(key) = name.and_then(|n| n.strip_prefix(META_PREFIX)) else {
            continue;
        };
        match value {
            Some(value) => insert_field(meta, key, unescape_html(value), "meta element"),
            None => meta
                .diagnostics
                .push(format!("meta element {key:?}: missing content attribute")),
        }
    }
}

fn fallback_title(content: &str) -> Option<String> {
    let candidates = [&*TITLE_RE, &*H1_TAG_RE, &*H1_MD_RE];
    candidates.iter().find_map(|re| {
        let raw = re.captures(content)?.get(1)?.as_str();
        let text = unescape_html(&TAG_RE.replace_all(raw, ""));
        let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
        (!text.is_empty()).then_some(text)
    })
}

/// Strip one pair of matching surrounding quotes.
fn unquote(value: &str) -> &str {
    for quote in ['"', '\''] {
        if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
            return &value[1..value.len() - 1];
        }
    }
    value
}

fn unescape_html(s: &str) -> String {
    html_escape::decode_html_entities(s).into_owned()
}
