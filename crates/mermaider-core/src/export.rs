use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{CoreError, Result};

pub const MERMAID_VERSION: &str = "11.6.0";

/// Browser bundle used by the standalone HTML export.
pub fn cdn_url() -> String {
    format!(
        "https://cdn.jsdelivr.net/npm/mermaid@{}/dist/mermaid.min.js",
        MERMAID_VERSION
    )
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, schemars::JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    /// Raw Mermaid markup
    Mmd,
    /// Markup embedded in a self-rendering HTML page
    Html,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Mmd => "mmd",
            ExportFormat::Html => "html",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            ExportFormat::Mmd => "text/plain",
            ExportFormat::Html => "text/html",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().trim_start_matches('.').to_ascii_lowercase().as_str() {
            "mmd" | "mermaid" | "code" | "text" => Ok(ExportFormat::Mmd),
            "html" | "htm" => Ok(ExportFormat::Html),
            other => Err(CoreError::UnknownFormat(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExportFile {
    pub file_name: String,
    pub mime_type: String,
    pub contents: String,
}

/// Turn a diagram title into a file stem: separators and whitespace become
/// underscores, anything a filesystem might reject is dropped.
pub fn safe_stem(title: &str) -> String {
    let stem: String = title
        .trim()
        .chars()
        .filter_map(|c| match c {
            c if c.is_alphanumeric() || c == '-' || c == '_' || c == '.' => Some(c),
            c if c.is_whitespace() || c == '/' || c == '\\' => Some('_'),
            _ => None,
        })
        .collect();
    let stem = stem.trim_start_matches('.').to_string();
    if stem.is_empty() {
        "diagram".to_string()
    } else {
        stem
    }
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            c => out.push(c),
        }
    }
    out
}

/// Minimal page that renders the markup client-side with the Mermaid CDN bundle.
pub fn render_html(code: &str, title: &str) -> String {
    let title = escape_html(title);
    let code = escape_html(code);
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="UTF-8">
  <meta name="viewport" content="width=device-width, initial-scale=1.0">
  <title>{title}</title>
  <script src="{cdn}"></script>
  <style>
    body {{ font-family: Arial, sans-serif; max-width: 1200px; margin: 0 auto; padding: 20px; background-color: #f5f5f5; }}
    .container {{ background-color: white; padding: 30px; border-radius: 10px; box-shadow: 0 2px 10px rgba(0,0,0,0.1); }}
    h1 {{ color: #333; text-align: center; margin-bottom: 30px; }}
    .mermaid {{ text-align: center; background-color: #fefefe; border: 1px solid #e0e0e0; border-radius: 5px; padding: 20px; }}
  </style>
</head>
<body>
  <div class="container">
    <h1>{title}</h1>
    <pre class="mermaid">
{code}
    </pre>
  </div>
  <script>
    mermaid.initialize({{ startOnLoad: true, theme: 'default', securityLevel: 'strict' }});
  </script>
</body>
</html>
"#,
        cdn = cdn_url(),
    )
}

/// Build the downloadable file for one format.
pub fn export(code: &str, title: &str, format: ExportFormat) -> ExportFile {
    let contents = match format {
        ExportFormat::Mmd => {
            let mut c = code.trim_end().to_string();
            c.push('\n');
            c
        }
        ExportFormat::Html => render_html(code, title),
    };
    ExportFile {
        file_name: format!("{}.{}", safe_stem(title), format.extension()),
        mime_type: format.mime_type().to_string(),
        contents,
    }
}

/// Write an export into `dir` and return its path.
///
/// Uses atomic write (temp file + rename) so a reader never sees a half-written
/// file when the same diagram is exported repeatedly.
pub fn write_export(dir: &Path, file: &ExportFile) -> Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let tmp = dir.join(format!(".{}.tmp", file.file_name));
    let path = dir.join(&file.file_name);
    fs::write(&tmp, &file.contents)?;
    fs::rename(&tmp, &path)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stems_are_sanitized() {
        assert_eq!(safe_stem("Order flow / v2"), "Order_flow___v2");
        assert_eq!(safe_stem("a\\b:c*?"), "a_bc");
        assert_eq!(safe_stem("../../etc/passwd"), "_.._etc_passwd");
        assert_eq!(safe_stem("  "), "diagram");
        assert_eq!(safe_stem("Ünïcode plan"), "Ünïcode_plan");
    }

    #[test]
    fn markup_export_is_plain_text() {
        let f = export("flowchart TD\n    A --> B", "My Flow", ExportFormat::Mmd);
        assert_eq!(f.file_name, "My_Flow.mmd");
        assert_eq!(f.mime_type, "text/plain");
        assert_eq!(f.contents, "flowchart TD\n    A --> B\n");
    }

    #[test]
    fn html_export_escapes_markup_and_loads_cdn() {
        let f = export(
            "flowchart LR\n    A[\"<script>\"] --> B",
            "Tags & <Things>",
            ExportFormat::Html,
        );
        assert_eq!(f.file_name, "Tags__Things.html");
        assert_eq!(f.mime_type, "text/html");
        assert!(f.contents.contains(&cdn_url()));
        assert!(f.contents.contains("<title>Tags &amp; &lt;Things&gt;</title>"));
        assert!(f.contents.contains("A[&quot;&lt;script&gt;&quot;] --&gt; B"));
        assert!(!f.contents.contains("<script>\""));
    }

    #[test]
    fn format_parses_loosely() {
        assert_eq!(".HTML".parse::<ExportFormat>().unwrap(), ExportFormat::Html);
        assert_eq!("mermaid".parse::<ExportFormat>().unwrap(), ExportFormat::Mmd);
        assert!("png".parse::<ExportFormat>().is_err());
    }

    #[test]
    fn write_export_replaces_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let first = export("pie\n    \"A\" : 1", "chart", ExportFormat::Mmd);
        let path = write_export(dir.path(), &first).unwrap();
        let second = export("pie\n    \"B\" : 2", "chart", ExportFormat::Mmd);
        assert_eq!(write_export(dir.path(), &second).unwrap(), path);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), second.contents);
        assert!(!dir.path().join(".chart.mmd.tmp").exists());
    }
}
