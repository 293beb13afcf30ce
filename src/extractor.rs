#![forbid(unsafe_code)]

//! Boundary to the media extraction engine.
//!
//! Everything that knows about yt-dlp lives in this module: the command line,
//! the JSON it dumps, and the progress lines it prints while downloading. The
//! rest of the crate only sees [`Extractor`], [`VideoInfo`] and
//! [`ProgressEvent`]s.

use std::{
    collections::VecDeque,
    path::{Path, PathBuf},
    process::Stdio,
};

use async_trait::async_trait;
use serde::Deserialize;
use tokio::{
    io::{AsyncBufReadExt, AsyncRead, BufReader},
    process::Command,
};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::format::FormatRecord;
use crate::progress::{ProgressEvent, ProgressSink};

pub const DEFAULT_YT_DLP_BIN: &str = "yt-dlp";

const PROGRESS_TAG: &str = "[tubefetch:progress]";
const FILE_TAG: &str = "[tubefetch:file]";
const STDERR_TAIL_LINES: usize = 20;
const UNKNOWN: &str = "Unknown";

/// Metadata probed before any bytes are transferred.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoInfo {
    pub title: String,
    pub duration: i64,
    pub uploader: String,
    pub upload_date: Option<String>,
    pub formats: Vec<FormatRecord>,
}

/// Everything the extractor needs to download one item.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub id: String,
    pub url: String,
    pub selector: String,
    pub merge_format: String,
    pub output_dir: PathBuf,
    /// Appended to the file name so concurrent downloads of the same title
    /// do not share a target.
    pub file_suffix: Option<String>,
}

#[async_trait]
pub trait Extractor: Send + Sync {
    async fn extract_metadata(&self, url: &str) -> Result<VideoInfo>;

    /// Downloads the media and returns the path of the finished file.
    /// Progress is reported to `sink` under `request.id`.
    async fn fetch_media(&self, request: &FetchRequest, sink: &dyn ProgressSink) -> Result<PathBuf>;
}

#[derive(Debug, Clone)]
pub struct YtDlpExtractor {
    binary: PathBuf,
}

impl Default for YtDlpExtractor {
    fn default() -> Self {
        Self::new(DEFAULT_YT_DLP_BIN)
    }
}

impl YtDlpExtractor {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    fn download_args(request: &FetchRequest) -> Vec<String> {
        let file_name = match &request.file_suffix {
            Some(suffix) => format!("%(title)s-{}.%(ext)s", suffix.replace('%', "%%")),
            None => "%(title)s.%(ext)s".to_string(),
        };
        let template = request.output_dir.join(file_name);
        vec![
            "-f".into(),
            request.selector.clone(),
            "--merge-output-format".into(),
            request.merge_format.clone(),
            "--no-playlist".into(),
            "--newline".into(),
            "--progress".into(),
            "--no-colors".into(),
            "--progress-template".into(),
            format!(
                "download:{PROGRESS_TAG}%(progress._percent_str)s|%(progress._speed_str)s|%(progress._eta_str)s|%(progress._downloaded_bytes_str)s|%(progress._total_bytes_str)s"
            ),
            "--print".into(),
            format!("after_move:{FILE_TAG}%(filepath)s"),
            "-o".into(),
            template.to_string_lossy().into_owned(),
            request.url.clone(),
        ]
    }
}

#[async_trait]
impl Extractor for YtDlpExtractor {
    async fn extract_metadata(&self, url: &str) -> Result<VideoInfo> {
        let output = Command::new(&self.binary)
            .arg("--dump-single-json")
            .arg("--skip-download")
            .arg("--no-playlist")
            .arg("--no-warnings")
            .arg(url)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|err| {
                Error::upstream(format!("launching {}: {err}", self.binary.display()))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::upstream(format!(
                "metadata lookup failed ({}): {}",
                output.status,
                last_lines(&stderr, STDERR_TAIL_LINES)
            )));
        }

        let raw: RawInfo = serde_json::from_slice(&output.stdout)
            .map_err(|err| Error::upstream(format!("parsing metadata JSON: {err}")))?;
        Ok(raw.into_video_info())
    }

    async fn fetch_media(&self, request: &FetchRequest, sink: &dyn ProgressSink) -> Result<PathBuf> {
        tokio::fs::create_dir_all(&request.output_dir).await?;

        let mut child = Command::new(&self.binary)
            .args(Self::download_args(request))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|err| {
                Error::upstream(format!("launching {}: {err}", self.binary.display()))
            })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::Internal("yt-dlp stdout not captured".into()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| Error::Internal("yt-dlp stderr not captured".into()))?;

        // yt-dlp moves progress to stderr when --print makes it quiet, so both
        // streams are scanned.
        let (out, err) = tokio::join!(
            scan_output(stdout, &request.id, sink),
            scan_output(stderr, &request.id, sink)
        );
        let out = out?;
        let err = err?;
        let status = child.wait().await?;

        if !status.success() {
            return Err(Error::upstream(format!(
                "download failed ({status}): {}",
                err.tail.into_iter().collect::<Vec<_>>().join("\n")
            )));
        }

        let path = out.file.or(err.file).ok_or_else(|| {
            Error::upstream("yt-dlp finished without reporting an output file")
        })?;
        sink.on_event(&request.id, ProgressEvent::Finished);
        Ok(path)
    }
}

#[derive(Default)]
struct ScanResult {
    file: Option<PathBuf>,
    tail: VecDeque<String>,
}

async fn scan_output<R>(reader: R, id: &str, sink: &dyn ProgressSink) -> Result<ScanResult>
where
    R: AsyncRead + Unpin,
{
    let mut result = ScanResult::default();
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf).await? == 0 {
            break;
        }
        // ffmpeg and site messages are not always UTF-8.
        let line = String::from_utf8_lossy(&buf)
            .trim_end_matches(['\n', '\r'])
            .to_string();
        match classify_line(&line) {
            OutputLine::Progress(event) => sink.on_event(id, event),
            OutputLine::File(path) => result.file = Some(path),
            OutputLine::Other => {
                debug!(id, "yt-dlp: {line}");
                if result.tail.len() == STDERR_TAIL_LINES {
                    result.tail.pop_front();
                }
                result.tail.push_back(line);
            }
        }
    }
    Ok(result)
}

#[derive(Debug, PartialEq)]
enum OutputLine {
    Progress(ProgressEvent),
    File(PathBuf),
    Other,
}

fn classify_line(line: &str) -> OutputLine {
    let line = line.trim();
    if let Some(rest) = line.strip_prefix(PROGRESS_TAG) {
        let mut fields = rest.split('|').map(display_field);
        let mut next = || fields.next().unwrap_or_else(|| "N/A".to_string());
        return OutputLine::Progress(ProgressEvent::Downloading {
            percent: next(),
            speed: next(),
            eta: next(),
            downloaded: next(),
            total: next(),
        });
    }
    if let Some(rest) = line.strip_prefix(FILE_TAG) {
        let rest = rest.trim();
        if !rest.is_empty() {
            return OutputLine::File(PathBuf::from(rest));
        }
        warn!("yt-dlp reported an empty output path");
    }
    OutputLine::Other
}

/// yt-dlp renders missing template fields as `NA`.
fn display_field(value: &str) -> String {
    match value.trim() {
        "" | "NA" | "None" => "N/A".to_string(),
        other => other.to_string(),
    }
}

fn last_lines(text: &str, count: usize) -> String {
    let lines: Vec<&str> = text.lines().collect();
    let start = lines.len().saturating_sub(count);
    lines[start..].join("\n")
}

/// Subset of `yt-dlp --dump-single-json` this service reads.
#[derive(Debug, Deserialize)]
struct RawInfo {
    title: Option<String>,
    fulltitle: Option<String>,
    duration: Option<f64>,
    uploader: Option<String>,
    channel: Option<String>,
    upload_date: Option<String>,
    #[serde(default)]
    formats: Vec<RawFormat>,
}

#[derive(Debug, Deserialize)]
struct RawFormat {
    format_id: Option<String>,
    format_note: Option<String>,
    ext: Option<String>,
    vcodec: Option<String>,
    acodec: Option<String>,
    height: Option<i64>,
    abr: Option<f64>,
    url: Option<String>,
    filesize: Option<i64>,
    filesize_approx: Option<f64>,
}

impl RawInfo {
    fn into_video_info(self) -> VideoInfo {
        VideoInfo {
            title: non_blank(self.title)
                .or_else(|| non_blank(self.fulltitle))
                .unwrap_or_else(|| UNKNOWN.to_string()),
            duration: self.duration.map(|value| value.round() as i64).unwrap_or(0),
            uploader: non_blank(self.uploader)
                .or_else(|| non_blank(self.channel))
                .unwrap_or_else(|| UNKNOWN.to_string()),
            upload_date: non_blank(self.upload_date),
            formats: self.formats.into_iter().map(RawFormat::into_record).collect(),
        }
    }
}

impl RawFormat {
    fn into_record(self) -> FormatRecord {
        FormatRecord {
            format_id: self.format_id,
            ext: self.ext,
            codec_video: codec(self.vcodec),
            codec_audio: codec(self.acodec),
            height: self.height,
            bitrate_audio: self.abr,
            url: self.url.unwrap_or_default(),
            size_bytes: self
                .filesize
                .or_else(|| self.filesize_approx.map(|value| value.round() as i64)),
            note: non_blank(self.format_note).unwrap_or_else(|| "Unknown quality".to_string()),
        }
    }
}

/// `"none"` is how yt-dlp says a stream has no video or no audio.
fn codec(value: Option<String>) -> Option<String> {
    value.filter(|codec| !codec.trim().is_empty() && codec != "none")
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.trim().is_empty())
}
