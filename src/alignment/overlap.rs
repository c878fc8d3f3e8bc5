/*!
 * Overlap alignment between a source line and a foreign track.
 *
 * A foreign line covers a source line when their intervals overlap:
 * `foreign.start < source.end && foreign.end > source.start`. Touching
 * intervals do not overlap. No timing correction happens here.
 */

use crate::subtitle_processor::{clean_text, SubtitleLine, SubtitleTrack};

/// Foreign text overlapping `source_line`, or an empty string when there is none
///
/// Fragments are cleaned, empty ones dropped, repeats removed keeping first-seen
/// order, and the rest joined with single spaces.
pub fn overlap_text(source_line: &SubtitleLine, foreign_track: Option<&SubtitleTrack>) -> String {
    let Some(track) = foreign_track else {
        return String::new();
    };

    let mut fragments: Vec<String> = Vec::new();
    for line in track.lines_starting_before(source_line.end_time_ms) {
        if !line.overlaps(source_line.start_time_ms, source_line.end_time_ms) {
            continue;
        }
        let text = clean_text(&line.text);
        if !text.is_empty() && !fragments.contains(&text) {
            fragments.push(text);
        }
    }

    fragments.join(" ")
}
