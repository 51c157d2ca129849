//! The legacy `~/.formulary/config` file: one `KEY=VALUE` pair per line

use camino::Utf8PathBuf;
use tracing::warn;

use crate::settings::ConfigFile;

/// Ordered key/value pairs; later duplicates win
pub type KeyValues = Vec<(String, String)>;

/// Parse `KEY=VALUE` lines, skipping blanks, `#` comments and malformed lines
pub fn parse_key_values(content: &str) -> KeyValues {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| match line.split_once('=') {
            Some((key, value)) => Some((key.trim().to_string(), value.trim().to_string())),
            None => {
                warn!(line, "ignoring malformed config line");
                None
            },
        })
        .collect()
}

/// Render pairs back to the file format
pub fn render_key_values(pairs: &KeyValues) -> String {
    pairs
        .iter()
        .map(|(key, value)| format!("{}={}\n", key, value))
        .collect()
}

/// Map `FORMULARY_*` keys onto a configuration layer.
///
/// `FORMULARY_SHEET_URL` is the older name for the workbook location.
pub fn to_layer(pairs: &KeyValues) -> ConfigFile {
    let mut layer = ConfigFile::default();
    for (key, value) in pairs {
        match key.as_str() {
            "FORMULARY_REGISTRY_URL" => layer.registry_url = Some(value.clone()),
            "FORMULARY_CACHE_DIR" => layer.cache_dir = Some(Utf8PathBuf::from(value)),
            "FORMULARY_WORKBOOK" | "FORMULARY_SHEET_URL" => {
                let path = value.strip_prefix("file://").unwrap_or(value);
                layer.workbook = Some(Utf8PathBuf::from(path));
            },
            _ => {},
        }
    }
    layer
}
