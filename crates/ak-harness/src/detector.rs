use std::sync::Arc;

use ak_core::types::{Point, Region};
use tracing::{debug, warn};

use crate::command::{CommandRunner, SystemRunner};
use crate::device::{InputDevice, Screenshot};

// ---------------------------------------------------------------------------
// TextDetector trait
// ---------------------------------------------------------------------------

/// Text presence capability over the current screen.
///
/// Implementations may try several internal variants before concluding
/// that none of the keywords is shown; absence is a normal negative result.
pub trait TextDetector: Send + Sync {
    fn detect_presence(&self, keywords: &[String], region: Region) -> bool {
        self.detect_position(keywords, region).is_some()
    }

    /// Center of the first keyword found inside `region`.
    fn detect_position(&self, keywords: &[String], region: Region) -> Option<Point>;
}

#[derive(Debug, thiserror::Error)]
pub enum DetectorError {
    #[error("failed to run tesseract: {0}")]
    Spawn(String),
    #[error("tesseract exited with an error: {0}")]
    Failed(String),
    #[error("malformed tesseract output at line {line}")]
    Malformed { line: usize },
}

// ---------------------------------------------------------------------------
// OCR words
// ---------------------------------------------------------------------------

/// One recognised word with its bounding box.
#[derive(Debug, Clone, PartialEq)]
pub struct OcrWord {
    pub text: String,
    pub bbox: Region,
    pub confidence: f32,
    /// (block, paragraph, line) so phrases never span lines.
    pub line: (u32, u32, u32),
}

/// Parse tesseract `tsv` output into word rows.
///
/// Columns: level page block par line word left top width height conf text.
/// Only level-5 rows with non-blank text are kept.
pub fn parse_tsv(tsv: &str) -> Result<Vec<OcrWord>, DetectorError> {
    let mut words = Vec::new();
    for (idx, row) in tsv.lines().enumerate() {
        if idx == 0 && row.starts_with("level") {
            continue;
        }
        if row.trim().is_empty() {
            continue;
        }
        let cols: Vec<&str> = row.split('\t').collect();
        if cols.len() < 11 {
            return Err(DetectorError::Malformed { line: idx + 1 });
        }
        if cols[0] != "5" {
            continue;
        }
        let text = cols.get(11).map(|t| t.trim()).unwrap_or_default();
        if text.is_empty() {
            continue;
        }
        let int = |i: usize| -> Result<i32, DetectorError> {
            cols[i]
                .trim()
                .parse()
                .map_err(|_| DetectorError::Malformed { line: idx + 1 })
        };
        let bbox = Region::new(int(6)?, int(7)?, int(8)?, int(9)?);
        let line = (int(2)? as u32, int(3)? as u32, int(4)? as u32);
        let confidence = cols[10].trim().parse().unwrap_or(-1.0);
        words.push(OcrWord {
            text: text.to_string(),
            bbox,
            confidence,
            line,
        });
    }
    Ok(words)
}

/// Find the first keyword whose (possibly multi-word) phrase appears in
/// `words`, matching each token case-insensitively as a substring of
/// consecutive words on the same line. Returns the center of the matched
/// span.
pub fn find_keyword(words: &[OcrWord], keywords: &[String]) -> Option<Point> {
    for keyword in keywords {
        let tokens: Vec<String> = keyword
            .split_whitespace()
            .map(|t| t.to_lowercase())
            .collect();
        if tokens.is_empty() || tokens.len() > words.len() {
            continue;
        }
        for start in 0..=(words.len() - tokens.len()) {
            let span = &words[start..start + tokens.len()];
            let same_line = span.iter().all(|w| w.line == span[0].line);
            let matches = span
                .iter()
                .zip(&tokens)
                .all(|(w, t)| w.text.to_lowercase().contains(t.as_str()));
            if same_line && matches {
                return Some(span_bounds(span).center());
            }
        }
    }
    None
}

fn span_bounds(span: &[OcrWord]) -> Region {
    let left = span.iter().map(|w| w.bbox.x).min().unwrap_or(0);
    let top = span.iter().map(|w| w.bbox.y).min().unwrap_or(0);
    let right = span.iter().map(|w| w.bbox.right()).max().unwrap_or(left);
    let bottom = span.iter().map(|w| w.bbox.bottom()).max().unwrap_or(top);
    Region::new(left, top, right - left, bottom - top)
}

// ---------------------------------------------------------------------------
// TesseractDetector
// ---------------------------------------------------------------------------

/// Text detector that captures a frame from the device and runs the
/// `tesseract` CLI over it, once per configured page-segmentation mode.
pub struct TesseractDetector {
    tesseract_path: String,
    page_modes: Vec<u8>,
    device: Arc<dyn InputDevice>,
    runner: Arc<dyn CommandRunner>,
}

impl TesseractDetector {
    pub fn new(tesseract_path: impl Into<String>, page_modes: Vec<u8>, device: Arc<dyn InputDevice>) -> Self {
        Self::with_runner(tesseract_path, page_modes, device, Arc::new(SystemRunner))
    }

    /// Use a custom command runner (for testing).
    pub fn with_runner(
        tesseract_path: impl Into<String>,
        page_modes: Vec<u8>,
        device: Arc<dyn InputDevice>,
        runner: Arc<dyn CommandRunner>,
    ) -> Self {
        let page_modes = if page_modes.is_empty() { vec![6] } else { page_modes };
        Self {
            tesseract_path: tesseract_path.into(),
            page_modes,
            device,
            runner,
        }
    }

    fn recognise(&self, shot: &Screenshot, psm: u8) -> Result<Vec<OcrWord>, DetectorError> {
        let psm = psm.to_string();
        let output = self
            .runner
            .run(
                &self.tesseract_path,
                &["stdin", "stdout", "--psm", psm.as_str(), "tsv"],
                Some(shot.as_bytes()),
            )
            .map_err(DetectorError::Spawn)?;
        if !output.success {
            return Err(DetectorError::Failed(output.stderr.trim().to_string()));
        }
        parse_tsv(&output.stdout_lossy())
    }
}

impl TextDetector for TesseractDetector {
    fn detect_position(&self, keywords: &[String], region: Region) -> Option<Point> {
        let shot = self.device.capture()?;
        for &psm in &self.page_modes {
            let words = match self.recognise(&shot, psm) {
                Ok(words) => words,
                Err(e) => {
                    warn!(psm, error = %e, "ocr pass failed");
                    continue;
                }
            };
            let in_region: Vec<OcrWord> = words
                .into_iter()
                .filter(|w| w.bbox.intersects(&region))
                .collect();
            if let Some(point) = find_keyword(&in_region, keywords) {
                debug!(psm, ?keywords, x = point.x, y = point.y, "text found");
                return Some(point);
            }
        }
        debug!(?keywords, "text not found");
        None
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
