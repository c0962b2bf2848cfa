//! Document renderers.

use std::fmt::Write as _;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use quick_xml::escape::escape;
use thiserror::Error;

use crate::report::{ContentBlock, OutputFormat, Page, Report, RowShade};

/// Errors raised while writing a report
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("{} already exists, refusing to overwrite it", .0.display())]
    OutputExists(PathBuf),

    #[error("Failed to write {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to serialize report: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Writes a [`Report`] to exactly one file
///
/// Implementations must never replace an existing file.
pub trait DocumentRenderer: Send + Sync {
    fn name(&self) -> &'static str;

    fn render(&self, report: &Report, path: &Path) -> Result<(), ReportError>;
}

/// Renderer for the given output format
pub fn renderer_for(format: OutputFormat) -> Box<dyn DocumentRenderer> {
    match format {
        OutputFormat::Html => Box::new(HtmlRenderer),
        OutputFormat::Json => Box::new(JsonRenderer),
    }
}

/// Fail early if `path` is already taken
pub fn ensure_writable(path: &Path) -> Result<(), ReportError> {
    if path.exists() {
        return Err(ReportError::OutputExists(path.to_path_buf()));
    }
    Ok(())
}

/// Open `path` for writing, refusing to touch an existing file
fn create_new(path: &Path) -> Result<File, ReportError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| ReportError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .map_err(|source| match source.kind() {
            io::ErrorKind::AlreadyExists => ReportError::OutputExists(path.to_path_buf()),
            _ => ReportError::Io {
                path: path.to_path_buf(),
                source,
            },
        })
}

fn write_all(path: &Path, contents: &[u8]) -> Result<(), ReportError> {
    let mut file = create_new(path)?;
    file.write_all(contents)
        .and_then(|_| file.flush())
        .map_err(|source| ReportError::Io {
            path: path.to_path_buf(),
            source,
        })?;

    tracing::info!("Wrote report to {}", path.display());
    Ok(())
}

/// Self-contained HTML slide deck, one `<section>` per page
#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlRenderer;

const STYLE: &str = "body{font-family:Calibri,Arial,sans-serif;margin:0;background:#eee}\
section{width:13.33in;min-height:7.5in;margin:0.3in auto;padding:0.4in;background:#fff;\
box-sizing:border-box;page-break-after:always}\
h1{font-size:32pt;margin:0 0 0.2in;white-space:pre-wrap}p{margin:0;white-space:pre-wrap}\
table{border-collapse:collapse;width:100%}td{padding:4pt 8pt;font-size:14pt}\
tr.header td{background:#000;color:#fff;font-weight:bold}\
tr.light td{background:rgb(211,211,211)}tr.dark td{background:rgb(169,169,169)}";

impl HtmlRenderer {
    pub fn to_html(&self, report: &Report) -> String {
        let mut html = String::new();
        html.push_str("<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n");
        let _ = writeln!(html, "<title>{}</title>", escape(&report_title(report)));
        let _ = writeln!(html, "<style>{}</style>\n</head>\n<body>", STYLE);

        for page in &report.pages {
            render_page(&mut html, page);
        }

        html.push_str("</body>\n</html>\n");
        html
    }
}

fn report_title(report: &Report) -> String {
    report
        .pages
        .first()
        .and_then(|page| page.blocks.first())
        .and_then(|block| match block {
            ContentBlock::Title { text } => Some(text.clone()),
            _ => None,
        })
        .unwrap_or_else(|| "Journal Lookup".to_string())
}

fn render_page(html: &mut String, page: &Page) {
    html.push_str("<section>\n");
    for block in &page.blocks {
        match block {
            ContentBlock::Title { text } => {
                let _ = writeln!(html, "<h1>{}</h1>", escape(text));
            }
            ContentBlock::ParagraphRun { text, .. } if text.is_empty() => {
                html.push_str("<p>&nbsp;</p>\n");
            }
            ContentBlock::ParagraphRun { text, size_hint } => {
                let _ = writeln!(
                    html,
                    "<p style=\"font-size:{}pt\">{}</p>",
                    size_hint,
                    escape(text)
                );
            }
            ContentBlock::Table { rows } => {
                html.push_str("<table>\n");
                for row in rows {
                    let class = match row.shade {
                        RowShade::Header => "header",
                        RowShade::Light => "light",
                        RowShade::Dark => "dark",
                    };
                    let _ = write!(html, "<tr class=\"{}\">", class);
                    for cell in &row.cells {
                        let _ = write!(html, "<td>{}</td>", escape(cell));
                    }
                    html.push_str("</tr>\n");
                }
                html.push_str("</table>\n");
            }
        }
    }
    html.push_str("</section>\n");
}

impl DocumentRenderer for HtmlRenderer {
    fn name(&self) -> &'static str {
        "html"
    }

    fn render(&self, report: &Report, path: &Path) -> Result<(), ReportError> {
        write_all(path, self.to_html(report).as_bytes())
    }
}

/// Pretty-printed JSON dump of the report model
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonRenderer;

impl DocumentRenderer for JsonRenderer {
    fn name(&self) -> &'static str {
        "json"
    }

    fn render(&self, report: &Report, path: &Path) -> Result<(), ReportError> {
        let json = serde_json::to_vec_pretty(report)?;
        write_all(path, &json)
    }
}
