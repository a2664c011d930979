// src/utils/diagnostics.rs
use std::fs;
use std::path::{Path, PathBuf};

use regex::Regex;

/// Writes post-mortem snapshots (markup, annotated markup, screenshot) for failed scrapes.
///
/// Every write is best-effort: failures are logged and swallowed so a snapshot can never
/// replace the error that triggered it.
#[derive(Debug, Clone)]
pub struct DiagnosticStore {
    base_dir: PathBuf,
}

impl DiagnosticStore {
    /// Creates a store rooted at `base_dir`. The directory is created lazily on first capture.
    pub fn new<P: AsRef<Path>>(base_dir: P) -> Self {
        Self { base_dir: base_dir.as_ref().to_path_buf() }
    }

    /// Saves whatever is available for `domain` and returns the paths actually written.
    ///
    /// `anchors` are `(regex, label)` pairs highlighted in the annotated copy, usually the
    /// structural markers the domain's locators look for.
    pub fn capture(
        &self,
        domain: &str,
        markup: Option<&str>,
        screenshot: Option<&[u8]>,
        anchors: &[(&str, &str)],
    ) -> Vec<PathBuf> {
        let mut written = Vec::new();

        if let Err(e) = fs::create_dir_all(&self.base_dir) {
            tracing::warn!("Could not create diagnostics directory {}: {}", self.base_dir.display(), e);
            return written;
        }

        let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");

        if let Some(html) = markup {
            let source_path = self.base_dir.join(format!("error_page_source_{}_{}.html", domain, timestamp));
            match fs::write(&source_path, html) {
                Ok(()) => written.push(source_path),
                Err(e) => tracing::warn!("Could not save page source for {}: {}", domain, e),
            }

            let annotated_path = self.base_dir.join(format!("error_page_source_{}_{}_annotated.html", domain, timestamp));
            let annotated = annotate_html(html, anchors);
            match fs::write(&annotated_path, annotated) {
                Ok(()) => written.push(annotated_path),
                Err(e) => tracing::warn!("Could not save annotated page source for {}: {}", domain, e),
            }
        }

        if let Some(png) = screenshot {
            let shot_path = self.base_dir.join(format!("error_screenshot_{}_{}.png", domain, timestamp));
            match fs::write(&shot_path, png) {
                Ok(()) => written.push(shot_path),
                Err(e) => tracing::warn!("Could not save screenshot for {}: {}", domain, e),
            }
        }

        if !written.is_empty() {
            tracing::info!("{}: saved {} diagnostic file(s) to {}", domain, written.len(), self.base_dir.display());
        }
        written
    }
}

/// Wraps every match of the anchor patterns in a highlighted span so a reader can see
/// which expected markers were (or were not) present in the failing document.
pub fn annotate_html(html: &str, anchors: &[(&str, &str)]) -> String {
    let mut highlights = Vec::new();

    for (pattern, label) in anchors {
        match Regex::new(pattern) {
            Ok(re) => {
                for mat in re.find_iter(html) {
                    highlights.push((mat.start(), mat.end(), *label));
                }
            }
            Err(e) => tracing::warn!("Skipping invalid anchor pattern '{}': {}", pattern, e),
        }
    }
    highlights.sort_by_key(|h| h.0);

    let mut out = String::from("<!DOCTYPE html>\n<html>\n<head>\n<style>\n");
    out.push_str(".diag-highlight { background-color: #FFFF00; outline: 1px solid #FFA500; }\n");
    out.push_str("</style>\n</head>\n<body>\n");
    out.push_str(&format!("<!-- {} anchor match(es) -->\n", highlights.len()));

    let mut last_pos = 0;
    for (start, end, label) in highlights {
        if start < last_pos {
            continue; // overlapping match
        }
        out.push_str(&html[last_pos..start]);
        out.push_str(&format!(
            "<span class=\"diag-highlight diag-{}\" title=\"Position: {}-{}, Anchor: {}\">",
            label, start, end, label
        ));
        out.push_str(&html[start..end]);
        out.push_str("</span>");
        last_pos = end;
    }
    out.push_str(&html[last_pos..]);

    out.push_str("\n</body>\n</html>");
    out
}
