use log::{debug, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::errors::SubtitleError;
use crate::file_utils::FileManager;

// @module: Subtitle loading, parsing and rendering

// @const: SRT timestamp regex
static TIMESTAMP_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\d{1,2}):(\d{2}):(\d{2})[,.](\d{3})\s*-->\s*(\d{1,2}):(\d{2}):(\d{2})[,.](\d{3})")
        .expect("timestamp regex is valid")
});

// @const: MicroDVD cue regex, `{start}{end}text`
static MICRODVD_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\{(\d+)\}\{(\d+)\}(.*)$").expect("microdvd regex is valid")
});

// @const: MicroDVD inline control codes such as `{y:i}` or `{c:$0000FF}`
static MICRODVD_CODE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\{[a-zA-Z]:[^}]*\}").expect("microdvd code regex is valid")
});

static WHITESPACE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\s+").expect("whitespace regex is valid")
});

/// Windows-1252 code points for bytes 0x80..=0x9F; `None` marks undefined bytes
const WINDOWS_1252_HIGH: [Option<char>; 32] = [
    Some('\u{20AC}'), None, Some('\u{201A}'), Some('\u{0192}'),
    Some('\u{201E}'), Some('\u{2026}'), Some('\u{2020}'), Some('\u{2021}'),
    Some('\u{02C6}'), Some('\u{2030}'), Some('\u{0160}'), Some('\u{2039}'),
    Some('\u{0152}'), None, Some('\u{017D}'), None,
    None, Some('\u{2018}'), Some('\u{2019}'), Some('\u{201C}'),
    Some('\u{201D}'), Some('\u{2022}'), Some('\u{2013}'), Some('\u{2014}'),
    Some('\u{02DC}'), Some('\u{2122}'), Some('\u{0161}'), Some('\u{203A}'),
    Some('\u{0153}'), None, Some('\u{017E}'), Some('\u{0178}'),
];

/// Text encodings tried when reading subtitle files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TextEncoding {
    #[serde(rename = "utf-8", alias = "utf8")]
    Utf8,
    #[serde(rename = "windows-1252", alias = "cp1252")]
    Windows1252,
    #[serde(rename = "latin-1", alias = "iso-8859-1", alias = "latin1")]
    Latin1,
}

impl TextEncoding {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Utf8 => "utf-8",
            Self::Windows1252 => "windows-1252",
            Self::Latin1 => "latin-1",
        }
    }

    /// Decode `bytes`, or `None` if they are not valid in this encoding
    pub fn decode(&self, bytes: &[u8]) -> Option<String> {
        match self {
            Self::Utf8 => {
                let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
                std::str::from_utf8(bytes).ok().map(str::to_string)
            }
            Self::Windows1252 => bytes
                .iter()
                .map(|&b| match b {
                    0x80..=0x9F => WINDOWS_1252_HIGH[(b - 0x80) as usize],
                    _ => Some(b as char),
                })
                .collect(),
            // Every byte maps to the code point of the same value
            Self::Latin1 => Some(bytes.iter().map(|&b| b as char).collect()),
        }
    }
}

impl fmt::Display for TextEncoding {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Supported timed-text formats
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SubtitleFormat {
    /// SubRip `.srt`
    Srt,
    /// MicroDVD `.sub`, frame based
    MicroDvd { fps: f64 },
}

impl SubtitleFormat {
    /// Pick the format from a file extension
    pub fn from_path(path: &Path, fps: f64) -> Option<Self> {
        let ext = path.extension()?.to_string_lossy().to_lowercase();
        match ext.as_str() {
            "srt" => Some(Self::Srt),
            "sub" => Some(Self::MicroDvd { fps }),
            _ => None,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Srt => "srt",
            Self::MicroDvd { .. } => "sub",
        }
    }

    /// Render a dual caption: coloured source on the first visual line, translation below
    pub fn compose_dual(&self, source: &str, translation: Option<&str>, color: &str) -> String {
        let colored = match self {
            Self::Srt => format!("<font color=\"{}\">{}</font>", color, source),
            Self::MicroDvd { .. } => format!("{{c:${}}}{}", rgb_to_bgr(color), source),
        };
        match translation {
            Some(t) => format!("{}\n{}", colored, t),
            None => colored,
        }
    }
}

/// `#RRGGBB` to MicroDVD's `BBGGRR`, yellow on malformed input
fn rgb_to_bgr(color: &str) -> String {
    let hex = color.trim_start_matches('#');
    if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return "00FFFF".to_string();
    }
    let hex = hex.to_uppercase();
    format!("{}{}{}", &hex[4..6], &hex[2..4], &hex[0..2])
}

// @struct: Single timed subtitle line
#[derive(Debug, Clone, PartialEq)]
pub struct SubtitleLine {
    // @field: Sequence number
    pub seq_num: usize,

    // @field: Start time in ms
    pub start_time_ms: u64,

    // @field: End time in ms
    pub end_time_ms: u64,

    // @field: Text, visual line breaks stored as '\n'
    pub text: String,
}

impl SubtitleLine {
    pub fn new(seq_num: usize, start_time_ms: u64, end_time_ms: u64, text: impl Into<String>) -> Self {
        SubtitleLine {
            seq_num,
            start_time_ms,
            end_time_ms,
            text: text.into(),
        }
    }

    /// Text with every line-break marker collapsed to a single space
    pub fn clean_text(&self) -> String {
        clean_text(&self.text)
    }

    /// Half-open interval overlap with `[start, end)`
    pub fn overlaps(&self, start_ms: u64, end_ms: u64) -> bool {
        self.start_time_ms < end_ms && self.end_time_ms > start_ms
    }

    /// Format a timestamp in milliseconds to SRT format (HH:MM:SS,mmm)
    pub fn format_timestamp(ms: u64) -> String {
        let hours = ms / 3_600_000;
        let minutes = (ms % 3_600_000) / 60_000;
        let seconds = (ms % 60_000) / 1_000;
        let millis = ms % 1_000;

        format!("{:02}:{:02}:{:02},{:03}", hours, minutes, seconds, millis)
    }
}

impl fmt::Display for SubtitleLine {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "{}", self.seq_num)?;
        writeln!(
            f,
            "{} --> {}",
            Self::format_timestamp(self.start_time_ms),
            Self::format_timestamp(self.end_time_ms)
        )?;
        writeln!(f, "{}", self.text)?;
        writeln!(f)
    }
}

/// Normalize `\N`, `|` and newlines to single spaces and trim
pub fn clean_text(text: &str) -> String {
    let replaced = text.replace("\\N", " ").replace("\\n", " ").replace('|', " ");
    WHITESPACE_REGEX.replace_all(replaced.trim(), " ").into_owned()
}

/// Ordered subtitle lines loaded from one file
#[derive(Debug, Clone)]
pub struct SubtitleTrack {
    /// Source filename
    pub source_file: PathBuf,

    /// Lines ordered by start time
    pub lines: Vec<SubtitleLine>,

    /// Format the track was read from and is written back as
    pub format: SubtitleFormat,

    /// Encoding that decoded the file
    pub encoding: TextEncoding,
}

impl SubtitleTrack {
    pub fn new(source_file: PathBuf, lines: Vec<SubtitleLine>, format: SubtitleFormat) -> Self {
        SubtitleTrack {
            source_file,
            lines,
            format,
            encoding: TextEncoding::Utf8,
        }
    }

    /// Load a file, trying each encoding until one both decodes and parses
    pub fn load(path: &Path, encodings: &[TextEncoding], fps: f64) -> Result<Self, SubtitleError> {
        let format = SubtitleFormat::from_path(path, fps)
            .ok_or_else(|| SubtitleError::UnsupportedFormat(path.to_path_buf()))?;
        let bytes = std::fs::read(path).map_err(|source| SubtitleError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        for encoding in encodings {
            let Some(content) = encoding.decode(&bytes) else {
                debug!("{} is not valid {}", path.display(), encoding);
                continue;
            };
            let format = match format {
                SubtitleFormat::MicroDvd { fps } => SubtitleFormat::MicroDvd {
                    fps: declared_microdvd_fps(&content).unwrap_or(fps),
                },
                other => other,
            };
            match Self::parse(&content, format) {
                Ok(lines) => {
                    debug!("Loaded {} lines from {} as {}", lines.len(), path.display(), encoding);
                    return Ok(SubtitleTrack {
                        source_file: path.to_path_buf(),
                        lines,
                        format,
                        encoding: *encoding,
                    });
                }
                Err(e) => debug!("{} decoded as {} but did not parse: {}", path.display(), encoding, e),
            }
        }

        Err(SubtitleError::Load {
            path: path.to_path_buf(),
            tried: encodings.iter().map(|e| e.label()).collect::<Vec<_>>().join(", "),
        })
    }

    /// Parse decoded content in the given format
    pub fn parse(content: &str, format: SubtitleFormat) -> Result<Vec<SubtitleLine>, SubtitleError> {
        match format {
            SubtitleFormat::Srt => Self::parse_srt_string(content),
            SubtitleFormat::MicroDvd { fps } => Self::parse_microdvd_string(content, fps),
        }
    }

    /// Parse SRT format string into subtitle lines
    pub fn parse_srt_string(content: &str) -> Result<Vec<SubtitleLine>, SubtitleError> {
        let mut lines = Vec::new();

        // State variables for parsing
        let mut current_seq_num: Option<usize> = None;
        let mut current_times: Option<(u64, u64)> = None;
        let mut current_text = String::new();

        for (line_no, line) in content.lines().enumerate() {
            let trimmed = line.trim();

            if trimmed.is_empty() {
                if let (Some(seq), Some(times)) = (current_seq_num, current_times) {
                    push_cue(seq, times, &mut current_text, &mut lines);
                    current_seq_num = None;
                    current_times = None;
                }
                continue;
            }

            if current_seq_num.is_none() {
                if let Ok(num) = trimmed.parse::<usize>() {
                    current_seq_num = Some(num);
                    continue;
                }
                // Some files omit the counter and start with the timing line
                if TIMESTAMP_REGEX.is_match(trimmed) {
                    current_seq_num = Some(lines.len() + 1);
                } else {
                    warn!("Unexpected text at line {} before sequence number: {}", line_no + 1, trimmed);
                    continue;
                }
            }

            if current_times.is_none() {
                match TIMESTAMP_REGEX.captures(trimmed) {
                    Some(caps) => {
                        current_times = Some((captures_to_ms(&caps, 1), captures_to_ms(&caps, 5)));
                    }
                    None => {
                        warn!("Expected timing at line {}: {}", line_no + 1, trimmed);
                        current_seq_num = None;
                    }
                }
                continue;
            }

            if !current_text.is_empty() {
                current_text.push('\n');
            }
            current_text.push_str(trimmed);
        }

        if let (Some(seq), Some(times)) = (current_seq_num, current_times) {
            push_cue(seq, times, &mut current_text, &mut lines);
        }

        finish_parse(content, lines)
    }

    /// Parse MicroDVD content, `{start}{end}text` with `|` line breaks
    pub fn parse_microdvd_string(content: &str, fps: f64) -> Result<Vec<SubtitleLine>, SubtitleError> {
        let mut lines = Vec::new();
        let fps = declared_microdvd_fps(content).unwrap_or(fps);

        for raw in content.lines() {
            let trimmed = raw.trim();
            if trimmed.is_empty() {
                continue;
            }
            let Some(caps) = MICRODVD_REGEX.captures(trimmed) else {
                warn!("Skipping malformed MicroDVD line: {}", trimmed);
                continue;
            };
            let start_frame: u64 = caps[1].parse().unwrap_or(0);
            let end_frame: u64 = caps[2].parse().unwrap_or(0);
            let body = &caps[3];

            if lines.is_empty() && parse_fps_header(start_frame, end_frame, body).is_some() {
                continue;
            }

            let text = MICRODVD_CODE_REGEX.replace_all(body, "").replace('|', "\n");
            lines.push(SubtitleLine::new(
                lines.len() + 1,
                frames_to_ms(start_frame, fps),
                frames_to_ms(end_frame, fps),
                text.trim().to_string(),
            ));
        }

        finish_parse(content, lines)
    }

    /// Serialize in this track's format
    pub fn render(&self) -> String {
        match self.format {
            SubtitleFormat::Srt => self.lines.iter().map(|line| line.to_string()).collect(),
            SubtitleFormat::MicroDvd { fps } => {
                let mut out = format!("{{1}}{{1}}{}\n", fps);
                for line in &self.lines {
                    out.push_str(&format!(
                        "{{{}}}{{{}}}{}\n",
                        ms_to_frames(line.start_time_ms, fps),
                        ms_to_frames(line.end_time_ms, fps),
                        line.text.replace('\n', "|")
                    ));
                }
                out
            }
        }
    }

    /// Write the track as UTF-8, atomically
    pub fn write_to_file(&self, path: &Path) -> anyhow::Result<()> {
        FileManager::write_atomic(path, &self.render())
    }

    /// Lines starting before `end_ms`, the only candidates for overlapping an interval ending there
    pub fn lines_starting_before(&self, end_ms: u64) -> &[SubtitleLine] {
        let idx = self.lines.partition_point(|l| l.start_time_ms < end_ms);
        &self.lines[..idx]
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// Frame rate declared by a leading `{1}{1}23.976` cue
fn declared_microdvd_fps(content: &str) -> Option<f64> {
    let first = content.lines().map(str::trim).find(|l| !l.is_empty())?;
    let caps = MICRODVD_REGEX.captures(first)?;
    parse_fps_header(caps[1].parse().ok()?, caps[2].parse().ok()?, &caps[3])
}

fn parse_fps_header(start_frame: u64, end_frame: u64, body: &str) -> Option<f64> {
    if start_frame > 1 || end_frame > 1 {
        return None;
    }
    body.trim().parse::<f64>().ok().filter(|fps| *fps > 0.0)
}

fn push_cue(seq: usize, (start, end): (u64, u64), text: &mut String, out: &mut Vec<SubtitleLine>) {
    if end < start {
        warn!("Skipping subtitle {} with end before start", seq);
    } else {
        out.push(SubtitleLine::new(seq, start, end, text.trim().to_string()));
    }
    text.clear();
}

fn finish_parse(content: &str, mut lines: Vec<SubtitleLine>) -> Result<Vec<SubtitleLine>, SubtitleError> {
    if lines.is_empty() && !content.trim().is_empty() {
        return Err(SubtitleError::Parse("no subtitle cues found".to_string()));
    }

    // Stable sort keeps authoring order for equal start times
    lines.sort_by_key(|line| line.start_time_ms);
    for (i, line) in lines.iter_mut().enumerate() {
        line.seq_num = i + 1;
    }
    Ok(lines)
}

fn captures_to_ms(caps: &regex::Captures, start_idx: usize) -> u64 {
    let part = |i: usize| -> u64 {
        caps.get(start_idx + i)
            .and_then(|m| m.as_str().parse().ok())
            .unwrap_or(0)
    };
    (part(0) * 3600 + part(1) * 60 + part(2)) * 1000 + part(3)
}

fn frames_to_ms(frame: u64, fps: f64) -> u64 {
    (frame as f64 * 1000.0 / fps).round() as u64
}

fn ms_to_frames(ms: u64, fps: f64) -> u64 {
    (ms as f64 * fps / 1000.0).round() as u64
}
