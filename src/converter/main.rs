//! Standalone EDL to chapter list converter.
//!
//! Runs the same extraction as the bot on a local file, which is handy for
//! checking a marker export before uploading it.

use std::process::ExitCode;

use clap::Parser;

use dv_chapter_bot::chapters::{extract_chapters, split_lines};
use dv_chapter_bot::config::{DEFAULT_MARKER_COLOR, DEFAULT_SEPARATOR, RESOLVE_MARKER_COLORS};

/// EDL marker to chapter list converter.
#[derive(Parser, Debug)]
#[command(name = "edl_chapters")]
#[command(about = "Prints the chapter list of a DaVinci Resolve marker EDL")]
#[command(version)]
struct Args {
    /// Path to the EDL file.
    file: String,

    /// Marker color to keep.
    #[arg(short, long, default_value = DEFAULT_MARKER_COLOR)]
    color: String,

    /// Text placed between chapter time and title.
    #[arg(short, long, default_value = DEFAULT_SEPARATOR, allow_hyphen_values = true)]
    separator: String,
}

fn main() -> ExitCode {
    let args = Args::parse();

    if !RESOLVE_MARKER_COLORS.contains(&args.color.as_str()) {
        eprintln!(
            "⚠ '{}' is not a DaVinci Resolve marker color ({})",
            args.color,
            RESOLVE_MARKER_COLORS.join(", ")
        );
    }

    let content = match std::fs::read_to_string(&args.file) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("✗ Failed to read {}: {e}", args.file);
            return ExitCode::FAILURE;
        }
    };

    let lines = split_lines(&content);

    match extract_chapters(&lines, &args.color, &args.separator) {
        Some(list) => {
            println!("{list}");
            eprintln!("\n✓ {} chapters from {} markers", list.len(), args.color);
            ExitCode::SUCCESS
        }
        None => {
            eprintln!("✗ No {} markers found in {}", args.color, args.file);
            ExitCode::FAILURE
        }
    }
}
