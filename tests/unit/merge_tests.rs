/*!
 * Tests for foreign overlap lookup and dual caption merging
 */

use dualsub::alignment::overlap_text;
use dualsub::merge::DualMerger;
use dualsub::subtitle_processor::{SubtitleFormat, SubtitleLine, SubtitleTrack};

fn foreign_track(cues: &[(u64, u64, &str)]) -> SubtitleTrack {
    let lines = cues
        .iter()
        .enumerate()
        .map(|(i, (start, end, text))| SubtitleLine::new(i + 1, *start, *end, *text))
        .collect();
    SubtitleTrack::new("foreign.srt".into(), lines, SubtitleFormat::Srt)
}

#[test]
fn test_overlap_text_withPartialOverlaps_shouldJoinForeignLines() {
    let foreign = foreign_track(&[(9_000, 11_000, "Hola."), (11_500, 13_000, "¿Adónde vas?"), (20_000, 21_000, "Tarde")]);
    let source = SubtitleLine::new(1, 10_000, 12_000, "Hi. Where are you going?");

    assert_eq!(overlap_text(&source, Some(&foreign)), "Hola. ¿Adónde vas?");
}

#[test]
fn test_overlap_text_withNoOverlap_shouldBeEmpty() {
    let foreign = foreign_track(&[(0, 1_000, "Uno"), (5_000, 6_000, "Dos")]);
    let source = SubtitleLine::new(1, 2_000, 4_000, "Nothing here");

    assert_eq!(overlap_text(&source, Some(&foreign)), "");
}

#[test]
fn test_overlap_text_withMultilineForeign_shouldFlattenBreaks() {
    let foreign = foreign_track(&[(1_000, 3_000, "Primera línea\nsegunda línea")]);
    let source = SubtitleLine::new(1, 1_500, 2_500, "First line second line");

    assert_eq!(overlap_text(&source, Some(&foreign)), "Primera línea segunda línea");
}

#[test]
fn test_merger_overEpisode_shouldSuppressOnlyConsecutiveLongRepeats() {
    let mut merger = DualMerger::new(5);
    let pairs = [
        ("I have to go.", "Me tengo que ir."),
        ("Right now.", "Me tengo que ir."),
        ("Yes.", "Sí."),
        ("Yeah.", "Sí."),
        ("Okay.", ""),
    ];

    let rendered: Vec<String> = pairs
        .iter()
        .map(|(source, candidate)| merger.merge(source, candidate).render(SubtitleFormat::Srt, "#ffff00"))
        .collect();

    assert_eq!(rendered[0], "<font color=\"#ffff00\">I have to go.</font>\nMe tengo que ir.");
    assert_eq!(rendered[1], "<font color=\"#ffff00\">Right now.</font>");
    assert_eq!(rendered[2], "<font color=\"#ffff00\">Yes.</font>\nSí.");
    assert_eq!(rendered[3], "<font color=\"#ffff00\">Yeah.</font>\nSí.");
    assert_eq!(rendered[4], "Okay.");
}

#[test]
fn test_merger_withBlankCandidate_shouldKeepLastEmitted() {
    let mut merger = DualMerger::default();
    merger.merge("Go away now", "Vete ya mismo");
    merger.merge("...", "");
    let repeated = merger.merge("Go away now", "Vete ya mismo");

    assert_eq!(repeated.translation, None);
    assert!(repeated.highlighted);
}
