//! HTML output for one page.
//!
//! Every field the presentation layer needs is written twice: as an
//! `orrery:` meta element in `<head>` (machine-readable, parsed back by
//! [`extract_metadata`](crate::extract_metadata)) and as visible markup or
//! `data-*` attributes in `<body>`. A rendered page is therefore a valid
//! source document for a later build.

use std::collections::HashMap;
use std::fmt::Write;

use crate::metadata::META_PREFIX;
use crate::page::PageConfig;

/// Renders [`PageConfig`]s to standalone HTML documents.
#[derive(Clone, Debug, Default)]
pub struct TemplateRenderer {
    extension: String,
    /// Level to page URL, for parent and children links.
    urls: HashMap<String, String>,
}

impl TemplateRenderer {
    /// Renderer whose links assume each level's page is `<level>.<extension>`.
    #[must_use]
    pub fn new(extension: &str) -> Self {
        Self {
            extension: extension.to_owned(),
            urls: HashMap::new(),
        }
    }

    /// Renderer that links to the actual output file of each page in `pages`.
    #[must_use]
    pub fn for_batch(pages: &[PageConfig], extension: &str) -> Self {
        let mut urls = HashMap::with_capacity(pages.len());
        for page in pages {
            urls.entry(page.level.clone())
                .or_insert_with(|| page.url(extension));
        }
        Self {
            extension: extension.to_owned(),
            urls,
        }
    }

    fn href(&self, level: &str) -> String {
        self.urls
            .get(level)
            .cloned()
            .unwrap_or_else(|| format!("{level}.{}", self.extension))
    }

    /// Render `page`. Pure function of the page and the renderer's link table.
    #[must_use]
    pub fn render(&self, page: &PageConfig) -> String {
        let mut html = String::with_capacity(4096);

        html.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n");
        html.push_str("<meta charset=\"utf-8\">\n");
        html.push_str(
            "<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n",
        );
        let _ = writeln!(html, "<title>{}</title>", escape_html(&page.title));
        for (key, value) in annotations(page) {
            let _ = writeln!(
                html,
                "<meta name=\"{META_PREFIX}{key}\" content=\"{}\">",
                escape_html(&value)
            );
        }
        html.push_str("</head>\n<body>\n");

        let _ = writeln!(
            html,
            "<main class=\"orrery-page\" data-level=\"{}\" data-type=\"{}\" data-importance=\"{}\" \
             data-color=\"{}\" data-orbit-radius=\"{}\" data-orbit-angle=\"{}\" \
             data-size-modifier=\"{}\" data-unlocked=\"{}\" data-parent=\"{}\">",
            escape_html(&page.level),
            page.entity_type,
            page.importance,
            escape_html(&page.color),
            page.orbit_radius,
            page.orbit_angle,
            page.size_modifier,
            escape_html(&page.unlocked),
            escape_html(&page.parent),
        );

        html.push_str("<header>\n");
        let _ = writeln!(
            html,
            "<span class=\"orrery-icon\" style=\"color: {}\">{}</span>",
            escape_html(&page.color),
            escape_html(&page.icon)
        );
        let _ = writeln!(html, "<h1>{}</h1>", escape_html(&page.title));
        if !page.description.is_empty() {
            let _ = writeln!(
                html,
                "<p class=\"orrery-description\">{}</p>",
                escape_html(&page.description)
            );
        }
        html.push_str("</header>\n");

        if !page.metadata.tags.is_empty() {
            html.push_str("<ul class=\"orrery-tags\">\n");
            for tag in &page.metadata.tags {
                let _ = writeln!(html, "<li>{}</li>", escape_html(tag));
            }
            html.push_str("</ul>\n");
        }

        self.render_relations(&mut html, page);

        if page.has_errors() {
            html.push_str("<ul class=\"orrery-errors\">\n");
            for error in &page.validation_errors {
                let _ = writeln!(html, "<li>{}</li>", escape_html(error));
            }
            html.push_str("</ul>\n");
        }

        html.push_str("</main>\n</body>\n</html>\n");
        html
    }

    fn render_relations(&self, html: &mut String, page: &PageConfig) {
        if page.parent.is_empty() && page.children.is_empty() {
            return;
        }
        html.push_str("<nav class=\"orrery-relations\">\n");
        if !page.parent.is_empty() {
            let _ = writeln!(
                html,
                "<a rel=\"up\" data-level=\"{0}\" href=\"{1}\">{0}</a>",
                escape_html(&page.parent),
                escape_html(&self.href(&page.parent))
            );
        }
        if !page.children.is_empty() {
            html.push_str("<ul class=\"orrery-children\">\n");
            for child in &page.children {
                let _ = writeln!(
                    html,
                    "<li><a data-level=\"{0}\" href=\"{1}\">{0}</a></li>",
                    escape_html(child),
                    escape_html(&self.href(child))
                );
            }
            html.push_str("</ul>\n");
        }
        html.push_str("</nav>\n");
    }
}

/// Annotation key/value pairs written into `<head>`, in a fixed order.
fn annotations(page: &PageConfig) -> Vec<(&'static str, String)> {
    let mut out = vec![
        ("title", page.title.clone()),
        ("level", page.level.clone()),
        ("type", page.entity_type.to_string()),
        ("description", page.description.clone()),
        ("color", page.color.clone()),
        ("orbit_radius", page.orbit_radius.to_string()),
        ("orbit_angle", page.orbit_angle.to_string()),
        ("importance", page.importance.to_string()),
        ("icon", page.icon.clone()),
        ("size_modifier", page.size_modifier.to_string()),
        ("unlocked", page.unlocked.clone()),
        ("parent", page.parent.clone()),
        ("tags", page.metadata.tags.join(", ")),
        ("preview", page.metadata.preview.clone()),
    ];
    if !page.metadata.created.is_empty() {
        out.push(("created", page.metadata.created.clone()));
    }
    out
}

/// Escape text for use in HTML element content and quoted attribute values.
fn escape_html(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => result.push_str("&amp;"),
            '<' => result.push_str("&lt;"),
            '>' => result.push_str("&gt;"),
            '"' => result.push_str("&quot;"),
            '\'' => result.push_str("&#x27;"),
            _ => result.push(c),
        }
    }
    result
}
