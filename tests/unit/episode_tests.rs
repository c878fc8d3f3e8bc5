/*!
 * Tests for episode tags, foreign file matching, season selection and naming
 */

use std::path::{Path, PathBuf};

use dualsub::episode::{match_foreign_file, series_slug, EpisodeState, EpisodeTag, EpisodeTask, SeasonSelection};

#[test]
fn test_from_filename_withSxxExx_shouldUppercaseLabel() {
    let tag = EpisodeTag::from_filename(Path::new("Friends.s01e01.The.Pilot.srt"));
    assert_eq!(tag.label, "S01E01");
    assert_eq!(tag.numbers, Some((1, 1)));
}

#[test]
fn test_from_filename_withTagGluedToSeriesName_shouldStillFindIt() {
    let tag = EpisodeTag::from_filename(Path::new("FriendsS04E07.srt"));
    assert_eq!(tag.label, "S04E07");
    assert_eq!(tag.numbers, Some((4, 7)));
}

#[test]
fn test_from_filename_withCrossNotation_shouldParseNumbers() {
    let tag = EpisodeTag::from_filename(Path::new("Friends - 4x07 - The One.srt"));
    assert_eq!(tag.label, "4X07");
    assert_eq!(tag.numbers, Some((4, 7)));
}

#[test]
fn test_from_filename_withoutPattern_shouldUseFirstCharacters() {
    let tag = EpisodeTag::from_filename(Path::new("Pilot episode final.srt"));
    assert_eq!(tag.label, "Pilot epis");
    assert_eq!(tag.numbers, None);
}

#[test]
fn test_match_foreign_file_withMixedNotations_shouldPairSameEpisode() {
    let tag = EpisodeTag::from_filename(Path::new("Show.S02E03.srt"));
    let candidates = vec![
        PathBuf::from("es/Show 2x02.srt"),
        PathBuf::from("es/Show 2x03.srt"),
        PathBuf::from("es/Show 2x04.srt"),
    ];

    assert_eq!(match_foreign_file(&tag, &candidates), Some(PathBuf::from("es/Show 2x03.srt")));
}

#[test]
fn test_match_foreign_file_withNoCandidates_shouldReturnNone() {
    let tag = EpisodeTag::from_filename(Path::new("Show.S02E03.srt"));
    assert_eq!(match_foreign_file(&tag, &[]), None);
}

#[test]
fn test_season_selection_parse_withList_shouldExpand() {
    let selection: SeasonSelection = "3-5, 1".parse().unwrap();
    assert_eq!(selection, SeasonSelection::List(vec![1, 3, 4, 5]));
    assert!(!selection.stops_at_missing());
    assert_eq!(selection.candidates(), vec![1, 3, 4, 5]);
}

#[test]
fn test_season_selection_parse_withAllSpellings_shouldBeOpenEnded() {
    for text in ["all", "ALL", "todas", "n", "1-n"] {
        let selection: SeasonSelection = text.parse().unwrap();
        assert_eq!(selection, SeasonSelection::UntilMissing, "input {}", text);
    }
}

#[test]
fn test_season_selection_parse_withZeroOrReversedRange_shouldFail() {
    assert!("0".parse::<SeasonSelection>().is_err());
    assert!("5-3".parse::<SeasonSelection>().is_err());
    assert!("one".parse::<SeasonSelection>().is_err());
}

#[test]
fn test_season_selection_parse_withHugeRange_shouldFail() {
    assert!("1-4000000000".parse::<SeasonSelection>().is_err());
    assert!("1001".parse::<SeasonSelection>().is_err());
    assert_eq!(
        "999-1000".parse::<SeasonSelection>().unwrap(),
        SeasonSelection::List(vec![999, 1000])
    );
}

#[test]
fn test_output_path_shouldFollowNamingScheme() {
    let task = EpisodeTask::new(
        PathBuf::from("lib/Season 1/en/Friends.S01E01.srt"),
        None,
        PathBuf::from("out/Friends/Season_1"),
        "Friends",
    );

    assert_eq!(task.output_path("srt"), PathBuf::from("out/Friends/Season_1/Friends_S01E01_Dual.srt"));
    assert_eq!(task.display_name(), "Friends S01E01");
}

#[test]
fn test_series_slug_shouldTrimAndReplaceSpaces() {
    assert_eq!(series_slug("  How I Met Your Mother "), "How_I_Met_Your_Mother");
}

#[test]
fn test_episode_state_terminal_shouldOnlyCoverFinalStates() {
    assert!(EpisodeState::Saved.is_terminal());
    assert!(EpisodeState::Failed.is_terminal());
    assert!(EpisodeState::Cancelled.is_terminal());
    assert!(!EpisodeState::Translating.is_terminal());
    assert_eq!(EpisodeState::Aligning.to_string(), "aligning");
}
