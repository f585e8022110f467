//! Terminal rendering of commentary segments and session summaries.
//! Used by `fragcast run` and the daemon's stdout sink.

use crate::commentary::types::CommentarySegment;
use crate::pipeline::types::SessionStatistics;
use std::io::{self, IsTerminal, Write};

const DIM: &str = "\x1b[2m";
const BOLD: &str = "\x1b[1m";
const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";
const RED: &str = "\x1b[31m";
const RESET: &str = "\x1b[0m";

/// Clear the current terminal line.
pub fn clear_line() {
    eprint!("\r\x1b[2K");
}

/// `mm:ss.ss` for a session offset in seconds.
pub fn format_timestamp(seconds: f64) -> String {
    let seconds = seconds.max(0.0);
    let minutes = (seconds / 60.0).floor() as u64;
    format!("{minutes:02}:{:05.2}", seconds - minutes as f64 * 60.0)
}

fn importance_color(importance: u8) -> &'static str {
    match importance {
        5 => RED,
        4 => YELLOW,
        3 => GREEN,
        _ => "",
    }
}

/// One line per segment: time, importance, style, text and an audio marker.
pub fn format_segment(segment: &CommentarySegment, color: bool) -> String {
    let audio = if segment.audio_ref.is_some() {
        " ♪"
    } else {
        ""
    };
    let stamp = format_timestamp(segment.timestamp);
    if !color {
        return format!(
            "[{stamp}] ({}/{}) {}{audio}",
            segment.importance, segment.style, segment.text
        );
    }
    let tone = importance_color(segment.importance);
    format!(
        "{DIM}[{stamp}]{RESET} {tone}({}/{}){RESET} {}{DIM}{audio}{RESET}",
        segment.importance, segment.style, segment.text
    )
}

/// Print a segment to stdout, colored when stdout is a terminal.
pub fn render_segment(segment: &CommentarySegment) {
    let mut stdout = io::stdout().lock();
    let color = stdout.is_terminal();
    let _ = writeln!(stdout, "{}", format_segment(segment, color));
}

/// Multi-line session summary.
pub fn format_summary(session_id: &str, stats: &SessionStatistics, duration: f64) -> String {
    let mut out = format!(
        "Session {session_id}: {} events, {} commentary segments over {}\n",
        stats.total_events,
        stats.total_commentary,
        format_timestamp(duration)
    );
    out.push_str(&format!(
        "  high impact: {}  suppressed: {}  with audio: {}\n",
        stats.high_impact_events, stats.suppressed_events, stats.audio_segments
    ));
    for (event_type, count) in &stats.event_types {
        out.push_str(&format!("  {event_type:<20} {count}\n"));
    }
    out
}

/// Print the session summary to stderr.
pub fn render_summary(session_id: &str, stats: &SessionStatistics, duration: f64) {
    let summary = format_summary(session_id, stats, duration);
    if io::stderr().is_terminal() {
        eprint!("{BOLD}{summary}{RESET}");
    } else {
        eprint!("{summary}");
    }
}
