/*!
 * Tests for subtitle loading, decoding and rendering
 */

use std::fs;

use dualsub::errors::SubtitleError;
use dualsub::subtitle_processor::{SubtitleFormat, SubtitleLine, SubtitleTrack, TextEncoding};

use crate::common;

const DEFAULT_FPS: f64 = 23.976;

fn all_encodings() -> Vec<TextEncoding> {
    vec![TextEncoding::Utf8, TextEncoding::Windows1252, TextEncoding::Latin1]
}

#[test]
fn test_load_withUtf8Srt_shouldReadAllLines() {
    let temp_dir = common::create_temp_dir().unwrap();
    let path = common::create_test_subtitle(&temp_dir.path().to_path_buf(), "episode.srt").unwrap();

    let track = SubtitleTrack::load(&path, &all_encodings(), DEFAULT_FPS).unwrap();

    assert_eq!(track.len(), 3);
    assert_eq!(track.format, SubtitleFormat::Srt);
    assert_eq!(track.encoding, TextEncoding::Utf8);
    assert_eq!(track.lines[1].text, "It contains multiple entries.");
    assert_eq!(track.lines[2].start_time_ms, 10_000);
    assert_eq!(track.lines[2].end_time_ms, 14_000);
}

#[test]
fn test_load_withWindows1252Bytes_shouldFallBackAndDecode() {
    let temp_dir = common::create_temp_dir().unwrap();
    let path = temp_dir.path().join("legacy.srt");
    // "¿Qué?" with a curly apostrophe line, encoded as Windows-1252
    let mut bytes = b"1\n00:00:01,000 --> 00:00:02,000\n\xBFQu\xE9?\n\n2\n00:00:03,000 --> 00:00:04,000\nIt\x92s me\n".to_vec();
    bytes.push(b'\n');
    fs::write(&path, bytes).unwrap();

    let track = SubtitleTrack::load(&path, &all_encodings(), DEFAULT_FPS).unwrap();

    assert_eq!(track.encoding, TextEncoding::Windows1252);
    assert_eq!(track.lines[0].text, "¿Qué?");
    assert_eq!(track.lines[1].text, "It\u{2019}s me");
}

#[test]
fn test_load_withOnlyUtf8AndLegacyBytes_shouldFailListingEncodings() {
    let temp_dir = common::create_temp_dir().unwrap();
    let path = temp_dir.path().join("legacy.srt");
    fs::write(&path, b"1\n00:00:01,000 --> 00:00:02,000\n\xBFQu\xE9?\n").unwrap();

    match SubtitleTrack::load(&path, &[TextEncoding::Utf8], DEFAULT_FPS) {
        Err(SubtitleError::Load { tried, .. }) => assert_eq!(tried, "utf-8"),
        other => panic!("unexpected result: {:?}", other),
    }
}

#[test]
fn test_load_withUnknownExtension_shouldRejectFormat() {
    let temp_dir = common::create_temp_dir().unwrap();
    let path = common::create_test_file(&temp_dir.path().to_path_buf(), "episode.ass", "[Script Info]").unwrap();

    assert!(matches!(
        SubtitleTrack::load(&path, &all_encodings(), DEFAULT_FPS),
        Err(SubtitleError::UnsupportedFormat(_))
    ));
}

#[test]
fn test_load_withMissingFile_shouldReportIo() {
    let temp_dir = common::create_temp_dir().unwrap();
    let path = temp_dir.path().join("missing.srt");

    assert!(matches!(
        SubtitleTrack::load(&path, &all_encodings(), DEFAULT_FPS),
        Err(SubtitleError::Io { .. })
    ));
}

#[test]
fn test_load_withMicroDvd_shouldConvertFramesAndBreaks() {
    let temp_dir = common::create_temp_dir().unwrap();
    let path = common::create_test_file(
        &temp_dir.path().to_path_buf(),
        "episode.sub",
        "{1}{1}25\n{25}{50}{y:i}Hello|there\n{75}{100}Bye\n",
    )
    .unwrap();

    let track = SubtitleTrack::load(&path, &all_encodings(), DEFAULT_FPS).unwrap();

    assert_eq!(track.format, SubtitleFormat::MicroDvd { fps: 25.0 });
    assert_eq!(track.len(), 2);
    assert_eq!(track.lines[0].start_time_ms, 1_000);
    assert_eq!(track.lines[0].end_time_ms, 2_000);
    assert_eq!(track.lines[0].text, "Hello\nthere");
}

#[test]
fn test_parse_srt_string_withUnorderedCues_shouldSortAndRenumber() {
    let content = "5\n00:00:05,000 --> 00:00:06,000\nSecond\n\n2\n00:00:01,000 --> 00:00:02,000\nFirst\n";

    let lines = SubtitleTrack::parse_srt_string(content).unwrap();

    assert_eq!(lines[0].text, "First");
    assert_eq!(lines[0].seq_num, 1);
    assert_eq!(lines[1].seq_num, 2);
}

#[test]
fn test_parse_srt_string_withEmptyContent_shouldReturnNoLines() {
    assert!(SubtitleTrack::parse_srt_string("  \n").unwrap().is_empty());
}

#[test]
fn test_write_to_file_thenLoad_shouldKeepTimingAndText() {
    let temp_dir = common::create_temp_dir().unwrap();
    let path = temp_dir.path().join("out").join("dual.srt");
    let lines = vec![
        SubtitleLine::new(1, 1_000, 2_000, "<font color=\"#ffff00\">Hello</font>\nHola"),
        SubtitleLine::new(2, 3_500, 4_250, "Bye"),
    ];

    SubtitleTrack::new(path.clone(), lines.clone(), SubtitleFormat::Srt)
        .write_to_file(&path)
        .unwrap();
    let reloaded = SubtitleTrack::load(&path, &[TextEncoding::Utf8], DEFAULT_FPS).unwrap();

    assert_eq!(reloaded.lines, lines);
}

#[test]
fn test_lines_starting_before_shouldStopAtEndTime() {
    let track = SubtitleTrack::new(
        "t.srt".into(),
        vec![
            SubtitleLine::new(1, 0, 1_000, "a"),
            SubtitleLine::new(2, 2_000, 3_000, "b"),
            SubtitleLine::new(3, 5_000, 6_000, "c"),
        ],
        SubtitleFormat::Srt,
    );

    assert_eq!(track.lines_starting_before(2_000).len(), 1);
    assert_eq!(track.lines_starting_before(2_001).len(), 2);
}

#[test]
fn test_overlaps_withTouchingIntervals_shouldBeFalse() {
    let line = SubtitleLine::new(1, 10_000, 12_000, "x");
    assert!(line.overlaps(9_000, 11_000));
    assert!(line.overlaps(11_500, 13_000));
    assert!(!line.overlaps(12_000, 13_000));
    assert!(!line.overlaps(8_000, 10_000));
}

#[test]
fn test_format_timestamp_shouldPadFields() {
    assert_eq!(SubtitleLine::format_timestamp(3_723_004), "01:02:03,004");
}

#[test]
fn test_text_encoding_deserialize_withAliases_shouldResolve() {
    let encodings: Vec<TextEncoding> = serde_json::from_str(r#"["utf8", "cp1252", "iso-8859-1"]"#).unwrap();
    assert_eq!(encodings, all_encodings());
}
