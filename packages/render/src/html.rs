//! Low-level HTML assembly helpers.

use std::fmt::Write as _;

/// Leaflet release loaded from the CDN.
pub const LEAFLET_CSS: &str = "https://unpkg.com/leaflet@1.9.4/dist/leaflet.css";
pub const LEAFLET_JS: &str = "https://unpkg.com/leaflet@1.9.4/dist/leaflet.js";

/// Heat overlay plugin for Leaflet.
pub const LEAFLET_HEAT_JS: &str = "https://cdn.jsdelivr.net/npm/leaflet.heat@0.2.0/dist/leaflet-heat.js";

/// An item in the document `<head>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderItem {
    Css(String),
    Script(String),
    Style(String),
}

impl HeaderItem {
    /// Appends this item to `buf`.
    ///
    /// # Errors
    ///
    /// Returns [`std::fmt::Error`] if writing to the buffer fails.
    pub fn append_html(&self, buf: &mut String) -> std::fmt::Result {
        match self {
            Self::Css(uri) => writeln!(buf, "<link rel=\"stylesheet\" href=\"{}\"/>", escape(uri)),
            Self::Script(uri) => writeln!(buf, "<script src=\"{}\"></script>", escape(uri)),
            Self::Style(css) => writeln!(buf, "<style>\n{css}\n</style>"),
        }
    }
}

/// Escapes text for inclusion in HTML element content or attribute values.
#[must_use]
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Serializes `value` as JSON safe to embed inside a `<script>` element.
///
/// # Errors
///
/// Returns [`serde_json::Error`] if serialization fails.
pub fn script_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<String, serde_json::Error> {
    Ok(serde_json::to_string(value)?.replace("</", "<\\/"))
}
