//! EDL marker extraction.
//!
//! Turns the marker export of a DaVinci Resolve timeline into a chapter
//! listing, keeping only the markers of one color.

mod extractor;

pub use extractor::{extract_chapters, format_chapters, split_lines, Chapter, ChapterList};

/// Lines at the top of an EDL export that precede the first record.
pub const HEADER_LINES: usize = 3;

/// Distance between the first lines of two consecutive records.
pub const RECORD_STRIDE: usize = 3;

/// Smallest input that can hold one record after the header.
pub const MIN_LINES: usize = HEADER_LINES + RECORD_STRIDE;

/// Title line of every chapter listing.
pub const LISTING_TITLE: &str = "CAPITOLI";

/// Divider printed under the title.
pub const LISTING_DIVIDER: &str = "--------------------";

/// Tag prefix written by Resolve in front of the marker color name.
pub const COLOR_TAG_PREFIX: &str = "C:ResolveColor";
