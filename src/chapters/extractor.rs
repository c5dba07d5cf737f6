//! Fixed-stride record walker over EDL lines.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use super::{COLOR_TAG_PREFIX, HEADER_LINES, LISTING_DIVIDER, LISTING_TITLE, MIN_LINES, RECORD_STRIDE};

#[allow(clippy::expect_used)]
static TIMECODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d{2}:\d{2}:\d{2}").expect("timecode pattern is valid"));

#[allow(clippy::expect_used)]
static MARKER_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\|M:(.*?) \|D:").expect("marker name pattern is valid"));

/// A single chapter taken from a marker record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chapter {
    /// Start time as `HH:MM:SS`.
    pub timestamp: String,

    /// Marker name.
    pub label: String,
}

/// Chapters extracted from one EDL file, ready to be rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChapterList {
    separator: String,
    chapters: Vec<Chapter>,
}

impl ChapterList {
    /// Returns the extracted chapters in file order.
    #[must_use]
    pub fn chapters(&self) -> &[Chapter] {
        &self.chapters
    }

    /// Returns the number of chapters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.chapters.len()
    }

    /// Returns true if the list holds no chapter.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.chapters.is_empty()
    }
}

impl fmt::Display for ChapterList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{LISTING_TITLE}\n{LISTING_DIVIDER}")?;
        for chapter in &self.chapters {
            write!(
                f,
                "\n{} {} {}",
                chapter.timestamp, self.separator, chapter.label
            )?;
        }
        Ok(())
    }
}

/// Splits file content into lines ending in `\r\n`, `\n` or a lone `\r`.
///
/// A trailing terminator does not produce an extra empty line.
#[must_use]
pub fn split_lines(content: &str) -> Vec<&str> {
    let mut lines = Vec::new();
    let mut rest = content;

    while let Some(pos) = rest.find(['\r', '\n']) {
        lines.push(&rest[..pos]);
        let terminator = if rest[pos..].starts_with("\r\n") { 2 } else { 1 };
        rest = &rest[pos + terminator..];
    }

    if !rest.is_empty() {
        lines.push(rest);
    }
    lines
}

/// Extracts the chapters whose marker color is `marker_color`.
///
/// Records start at line 3 and repeat every 3 lines: the event line carries
/// the timecode, the next one carries the color tag and marker name, the
/// third is filler. Records with a matching color but no timecode or name
/// are skipped.
///
/// Returns `None` when the input is too short or no record produced a
/// chapter.
pub fn extract_chapters<S: AsRef<str>>(
    lines: &[S],
    marker_color: &str,
    separator: &str,
) -> Option<ChapterList> {
    if lines.len() < MIN_LINES {
        return None;
    }

    let color_tag = format!("{COLOR_TAG_PREFIX}{marker_color}");
    let mut chapters = Vec::new();

    let mut i = HEADER_LINES;
    while i + 1 < lines.len() {
        let event = lines[i].as_ref();
        let metadata = lines[i + 1].as_ref();

        if metadata.contains(&color_tag) {
            match parse_record(event, metadata) {
                Some(chapter) => chapters.push(chapter),
                None => debug!("Skipping malformed marker record at line {}", i + 1),
            }
        }

        i += RECORD_STRIDE;
    }

    if chapters.is_empty() {
        return None;
    }

    Some(ChapterList {
        separator: separator.to_owned(),
        chapters,
    })
}

/// Same as [`extract_chapters`] but renders to text, with an empty string
/// standing for "nothing extracted".
pub fn format_chapters<S: AsRef<str>>(lines: &[S], marker_color: &str, separator: &str) -> String {
    extract_chapters(lines, marker_color, separator)
        .map(|list| list.to_string())
        .unwrap_or_default()
}

fn parse_record(event: &str, metadata: &str) -> Option<Chapter> {
    let timestamp = TIMECODE.find(event)?.as_str();
    let label = MARKER_NAME.captures(metadata)?.get(1)?.as_str();

    Some(Chapter {
        timestamp: timestamp.to_owned(),
        label: label.to_owned(),
    })
}
