#![forbid(unsafe_code)]

//! Request-level orchestration: probe metadata, pick formats, run background
//! downloads and keep their task handles.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::Arc,
    time::{Duration, Instant},
};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::task::{AbortHandle, JoinHandle};
use tracing::{error, info, warn};

use crate::error::{Error, Result};
use crate::extractor::{Extractor, FetchRequest};
use crate::format::{QualityTier, select};
use crate::progress::{CancelOutcome, ProgressEvent, ProgressState, ProgressTracker};

/// What to do when a new download maps onto an identifier still in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IdPolicy {
    /// Append a short random suffix to the identifier and the file name.
    #[default]
    Disambiguate,
    /// Refuse the second request.
    Reject,
}

impl IdPolicy {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "disambiguate" | "suffix" | "unique" => Some(Self::Disambiguate),
            "reject" | "conflict" => Some(Self::Reject),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ManagerSettings {
    pub download_dir: PathBuf,
    pub id_policy: IdPolicy,
    pub fetch_timeout: Option<Duration>,
    pub progress_ttl: Option<Duration>,
}

/// Response for the direct-link flow.
#[derive(Debug, Clone, Serialize)]
pub struct DirectLink {
    pub success: bool,
    pub title: String,
    pub duration: i64,
    pub uploader: String,
    pub quality: String,
    pub format_note: String,
    pub download_url: String,
    pub file_size: i64,
    pub message: String,
}

/// Response for the background flow.
#[derive(Debug, Clone, Serialize)]
pub struct StartedDownload {
    pub success: bool,
    pub title: String,
    pub duration: i64,
    pub uploader: String,
    pub quality: String,
    #[serde(rename = "downloadId")]
    pub download_id: String,
    pub message: String,
}

struct DownloadJob {
    title: String,
    tier: QualityTier,
    started_at: DateTime<Utc>,
    /// Outlives `handle`, which `wait` takes.
    task: AbortHandle,
    handle: Option<JoinHandle<()>>,
}

/// Summary of a job for diagnostics.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSummary {
    pub id: String,
    pub title: String,
    pub quality: String,
    pub started_at: DateTime<Utc>,
    pub progress: ProgressState,
}

#[derive(Clone)]
pub struct DownloadManager {
    inner: Arc<DownloadManagerInner>,
}

struct DownloadManagerInner {
    extractor: Arc<dyn Extractor>,
    tracker: Arc<ProgressTracker>,
    jobs: Mutex<HashMap<String, DownloadJob>>,
    settings: ManagerSettings,
}

impl DownloadManager {
    pub fn new(extractor: Arc<dyn Extractor>, settings: ManagerSettings) -> Self {
        let tracker = Arc::new(ProgressTracker::new(settings.progress_ttl));
        Self {
            inner: Arc::new(DownloadManagerInner {
                extractor,
                tracker,
                jobs: Mutex::new(HashMap::new()),
                settings,
            }),
        }
    }

    pub fn tracker(&self) -> &Arc<ProgressTracker> {
        &self.inner.tracker
    }

    pub fn download_dir(&self) -> &Path {
        &self.inner.settings.download_dir
    }

    /// Probes `url` and returns a direct link to the best matching stream.
    pub async fn resolve_direct(&self, url: &str, tier: QualityTier) -> Result<DirectLink> {
        let info = self.inner.extractor.extract_metadata(url).await?;
        let format = select(&info.formats, tier)
            .ok_or_else(|| Error::invalid_input("No suitable format found"))?;

        let message = format!("Ready to download: \"{}\" in {}", info.title, format.note);
        Ok(DirectLink {
            success: true,
            duration: info.duration,
            uploader: info.uploader,
            quality: tier.label().to_string(),
            format_note: format.note.clone(),
            download_url: format.url.clone(),
            file_size: format.size_bytes.unwrap_or(0),
            message,
            title: info.title,
        })
    }

    /// Probes `url`, registers a tracker entry and starts the transfer in the
    /// background. Returns as soon as the task is dispatched.
    pub async fn start(&self, url: &str, tier: QualityTier) -> Result<StartedDownload> {
        let info = self.inner.extractor.extract_metadata(url).await?;
        let base = download_id(&info.title, tier);
        let id = self.claim_id(&base)?;
        let file_suffix = id
            .strip_prefix(base.as_str())
            .and_then(|rest| rest.strip_prefix('-'))
            .map(str::to_string);

        let request = FetchRequest {
            id: id.clone(),
            url: url.to_string(),
            selector: tier.format_selector(),
            merge_format: tier.merge_format().to_string(),
            output_dir: self.inner.settings.download_dir.clone(),
            file_suffix,
        };
        let handle = tokio::spawn(run_download(self.inner.clone(), request));
        let task = handle.abort_handle();

        self.inner.jobs.lock().insert(
            id.clone(),
            DownloadJob {
                title: info.title.clone(),
                tier,
                started_at: Utc::now(),
                task,
                handle: Some(handle),
            },
        );
        info!(id = %id, quality = tier.label(), "download started");

        Ok(StartedDownload {
            success: true,
            message: format!(
                "Download started for \"{}\" in {} quality",
                info.title,
                tier.label()
            ),
            title: info.title,
            duration: info.duration,
            uploader: info.uploader,
            quality: tier.label().to_string(),
            download_id: id,
        })
    }

    pub fn progress(&self, id: &str) -> ProgressState {
        self.inner.tracker.get(id)
    }

    pub fn cancel(&self, id: &str) -> Result<CancelOutcome> {
        let outcome = self.inner.tracker.cancel(id)?;
        if outcome == CancelOutcome::Cancelled {
            info!(id, "download cancelled");
        }
        Ok(outcome)
    }

    /// Waits for the background task behind `id` and returns its final state.
    /// Returns `None` when no task is known for the identifier or another
    /// caller is already waiting on it.
    pub async fn wait(&self, id: &str) -> Option<ProgressState> {
        let handle = self.inner.jobs.lock().get_mut(id)?.handle.take()?;
        if let Err(err) = handle.await {
            warn!(id, "download task ended abnormally: {err}");
        }
        Some(self.inner.tracker.get(id))
    }

    pub fn jobs(&self) -> Vec<JobSummary> {
        let mut jobs: Vec<JobSummary> = self
            .inner
            .jobs
            .lock()
            .iter()
            .map(|(id, job)| JobSummary {
                id: id.clone(),
                title: job.title.clone(),
                quality: job.tier.label().to_string(),
                started_at: job.started_at,
                progress: self.inner.tracker.get(id),
            })
            .collect();
        jobs.sort_by(|a, b| a.started_at.cmp(&b.started_at).then_with(|| a.id.cmp(&b.id)));
        jobs
    }

    /// Removes expired tracker entries together with their job records.
    /// Jobs whose task is still running keep their record so the identifier
    /// stays claimed.
    pub fn evict_expired(&self) -> usize {
        let removed = self
            .inner
            .tracker
            .evict_expired(Instant::now());
        if removed > 0 {
            let tracker = &self.inner.tracker;
            self.inner
                .jobs
                .lock()
                .retain(|id, job| tracker.contains(id) || !job.task.is_finished());
        }
        removed
    }

    fn claim_id(&self, base: &str) -> Result<String> {
        match self.try_claim(base) {
            Ok(()) => Ok(base.to_string()),
            Err(Error::Conflict(message)) => match self.inner.settings.id_policy {
                IdPolicy::Reject => Err(Error::Conflict(message)),
                IdPolicy::Disambiguate => loop {
                    let candidate = format!("{base}-{}", short_suffix());
                    match self.try_claim(&candidate) {
                        Ok(()) => break Ok(candidate),
                        Err(Error::Conflict(_)) => continue,
                        Err(err) => break Err(err),
                    }
                },
            },
            Err(err) => Err(err),
        }
    }

    /// A cancelled download is terminal in the tracker but its transfer may
    /// still be emitting events, so the identifier stays taken until the task
    /// itself has ended.
    fn try_claim(&self, id: &str) -> Result<()> {
        let running = self
            .inner
            .jobs
            .lock()
            .get(id)
            .is_some_and(|job| !job.task.is_finished());
        if running {
            return Err(Error::Conflict(format!("download {id} still running")));
        }
        self.inner.tracker.begin(id)
    }
}

/// Background task body. Every failure ends up in the tracker.
async fn run_download(inner: Arc<DownloadManagerInner>, request: FetchRequest) {
    let id = request.id.clone();
    let worker_inner = inner.clone();
    let worker = tokio::spawn(async move {
        let sink = worker_inner.tracker.as_ref();
        let fetch = worker_inner.extractor.fetch_media(&request, sink);
        match worker_inner.settings.fetch_timeout {
            Some(limit) => tokio::time::timeout(limit, fetch)
                .await
                .unwrap_or_else(|_| Err(Error::upstream(format!("timed out after {}s", limit.as_secs())))),
            None => fetch.await,
        }
    });

    let failure = match worker.await {
        Ok(Ok(path)) => {
            info!(id = %id, path = %path.display(), "download finished");
            None
        }
        Ok(Err(err)) => Some(err.to_string()),
        Err(err) => Some(format!("download task failed: {err}")),
    };

    if let Some(message) = failure {
        error!(id = %id, "download error: {message}");
        inner.tracker.apply(&id, ProgressEvent::Error { message });
    }
}

/// Builds the polling identifier from the title and quality tier.
pub fn download_id(title: &str, tier: QualityTier) -> String {
    let cleaned: String = title
        .chars()
        .map(|c| match c {
            '/' | '\\' | '?' | '#' | '%' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let cleaned = cleaned.trim();
    let cleaned = if cleaned.is_empty() { "download" } else { cleaned };
    format!("{cleaned}_{}", tier.label())
}

fn short_suffix() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..8].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::VideoInfo;
    use crate::format::FormatRecord;
    use crate::progress::{ProgressSink, ProgressStatus};
    use async_trait::async_trait;
    use tempfile::tempdir;
    use tokio::sync::watch;

    #[derive(Clone, Copy)]
    enum Behaviour {
        Succeed,
        Fail,
        /// Holds until the gate opens, then fails.
        GatedFail,
        Panic,
        Hang,
    }

    struct FakeExtractor {
        formats: Vec<FormatRecord>,
        behaviour: Behaviour,
        gate: Arc<watch::Sender<bool>>,
        requests: Arc<parking_lot::Mutex<Vec<FetchRequest>>>,
    }

    impl FakeExtractor {
        fn new(behaviour: Behaviour) -> Self {
            Self {
                formats: vec![
                    format_record(Some(720), "https://cdn.test/720", Some(1000)),
                    format_record(Some(1080), "https://cdn.test/1080", None),
                ],
                behaviour,
                gate: Arc::new(watch::channel(false).0),
                requests: Arc::default(),
            }
        }
    }

    fn format_record(height: Option<i64>, url: &str, size: Option<i64>) -> FormatRecord {
        FormatRecord {
            format_id: None,
            ext: Some("mp4".into()),
            codec_video: Some("avc1".into()),
            codec_audio: None,
            height,
            bitrate_audio: None,
            url: url.into(),
            size_bytes: size,
            note: format!("{}p", height.unwrap_or(0)),
        }
    }

    #[async_trait]
    impl Extractor for FakeExtractor {
        async fn extract_metadata(&self, url: &str) -> Result<VideoInfo> {
            if url.contains("broken") {
                return Err(Error::upstream("metadata lookup failed"));
            }
            Ok(VideoInfo {
                title: "Alpha Clip".into(),
                duration: 60,
                uploader: "Channel".into(),
                upload_date: None,
                formats: if url.contains("empty") {
                    vec![]
                } else {
                    self.formats.clone()
                },
            })
        }

        async fn fetch_media(
            &self,
            request: &FetchRequest,
            sink: &dyn ProgressSink,
        ) -> Result<PathBuf> {
            self.requests.lock().push(request.clone());
            sink.on_event(
                &request.id,
                ProgressEvent::Downloading {
                    percent: "50.0%".into(),
                    speed: "1MiB/s".into(),
                    eta: "00:01".into(),
                    downloaded: "1MiB".into(),
                    total: "2MiB".into(),
                },
            );
            match self.behaviour {
                Behaviour::Succeed => {
                    let mut open = self.gate.subscribe();
                    let _ = open.wait_for(|open| *open).await;
                    sink.on_event(&request.id, ProgressEvent::Finished);
                    Ok(request.output_dir.join("Alpha Clip.mp4"))
                }
                Behaviour::Fail => Err(Error::upstream("HTTP Error 403")),
                Behaviour::GatedFail => {
                    let mut open = self.gate.subscribe();
                    let _ = open.wait_for(|open| *open).await;
                    Err(Error::upstream("HTTP Error 403"))
                }
                Behaviour::Panic => panic!("extractor blew up"),
                Behaviour::Hang => std::future::pending().await,
            }
        }
    }

    fn manager_with(extractor: FakeExtractor, settings: ManagerSettings) -> DownloadManager {
        DownloadManager::new(Arc::new(extractor), settings)
    }

    fn settings(dir: &std::path::Path) -> ManagerSettings {
        ManagerSettings {
            download_dir: dir.to_path_buf(),
            ..ManagerSettings::default()
        }
    }

    #[test]
    fn download_id_combines_title_and_tier() {
        assert_eq!(download_id("Alpha Clip", QualityTier::Hd720p), "Alpha Clip_720p");
        assert_eq!(download_id("a/b?c", QualityTier::AudioOnly), "a_b_c_audio");
        assert_eq!(download_id("   ", QualityTier::Highest), "download_highest");
    }

    #[test]
    fn id_policy_parses_known_values() {
        assert_eq!(IdPolicy::parse("Reject"), Some(IdPolicy::Reject));
        assert_eq!(IdPolicy::parse("disambiguate"), Some(IdPolicy::Disambiguate));
        assert_eq!(IdPolicy::parse("maybe"), None);
    }

    #[tokio::test]
    async fn resolve_direct_returns_selected_stream() {
        let dir = tempdir().unwrap();
        let manager = manager_with(FakeExtractor::new(Behaviour::Succeed), settings(dir.path()));
        let link = manager
            .resolve_direct("https://youtu.be/alpha", QualityTier::Hd720p)
            .await
            .unwrap();
        assert_eq!(link.download_url, "https://cdn.test/720");
        assert_eq!(link.file_size, 1000);
        assert_eq!(link.quality, "720p");
        assert_eq!(link.format_note, "720p");
        assert!(link.message.contains("Alpha Clip"));

        let link = manager
            .resolve_direct("https://youtu.be/alpha", QualityTier::Highest)
            .await
            .unwrap();
        assert_eq!(link.download_url, "https://cdn.test/1080");
        assert_eq!(link.file_size, 0);
    }

    #[tokio::test]
    async fn resolve_direct_without_formats_is_invalid_input() {
        let dir = tempdir().unwrap();
        let manager = manager_with(FakeExtractor::new(Behaviour::Succeed), settings(dir.path()));
        let err = manager
            .resolve_direct("https://youtu.be/empty", QualityTier::Highest)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(ref message) if message == "No suitable format found"));
    }

    #[tokio::test]
    async fn start_surfaces_metadata_errors_synchronously() {
        let dir = tempdir().unwrap();
        let manager = manager_with(FakeExtractor::new(Behaviour::Succeed), settings(dir.path()));
        let err = manager
            .start("https://youtu.be/broken", QualityTier::Highest)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Upstream(_)));
        assert!(manager.tracker().is_empty());
    }

    #[tokio::test]
    async fn start_then_wait_reaches_finished() {
        let dir = tempdir().unwrap();
        let extractor = FakeExtractor::new(Behaviour::Succeed);
        let gate = extractor.gate.clone();
        let manager = manager_with(extractor, settings(dir.path()));

        let started = manager
            .start("https://youtu.be/alpha", QualityTier::Fhd1080p)
            .await
            .unwrap();
        assert_eq!(started.download_id, "Alpha Clip_1080p");
        assert_eq!(started.quality, "1080p");
        assert!(started.success);

        gate.send_replace(true);
        let state = manager.wait(&started.download_id).await.unwrap();
        assert_eq!(state.status, ProgressStatus::Finished);
        assert_eq!(state.percent, "100%");
        assert!(manager.wait(&started.download_id).await.is_none());

        let jobs = manager.jobs();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].progress.status, ProgressStatus::Finished);
    }

    #[tokio::test]
    async fn fetch_failure_becomes_error_state() {
        let dir = tempdir().unwrap();
        let manager = manager_with(FakeExtractor::new(Behaviour::Fail), settings(dir.path()));
        let started = manager
            .start("https://youtu.be/alpha", QualityTier::Hd720p)
            .await
            .unwrap();
        let state = manager.wait(&started.download_id).await.unwrap();
        assert_eq!(state.status, ProgressStatus::Error);
        assert_eq!(state.eta, "Failed");
    }

    #[tokio::test]
    async fn panicking_extractor_is_contained() {
        let dir = tempdir().unwrap();
        let manager = manager_with(FakeExtractor::new(Behaviour::Panic), settings(dir.path()));
        let started = manager
            .start("https://youtu.be/alpha", QualityTier::Hd720p)
            .await
            .unwrap();
        let state = manager.wait(&started.download_id).await.unwrap();
        assert_eq!(state.status, ProgressStatus::Error);
    }

    #[tokio::test]
    async fn fetch_timeout_marks_error() {
        let dir = tempdir().unwrap();
        let manager = manager_with(
            FakeExtractor::new(Behaviour::Hang),
            ManagerSettings {
                fetch_timeout: Some(Duration::from_millis(20)),
                ..settings(dir.path())
            },
        );
        let started = manager
            .start("https://youtu.be/alpha", QualityTier::Hd720p)
            .await
            .unwrap();
        let state = manager.wait(&started.download_id).await.unwrap();
        assert_eq!(state.status, ProgressStatus::Error);
    }

    #[tokio::test]
    async fn cancel_is_advisory_and_sticks() {
        let dir = tempdir().unwrap();
        let extractor = FakeExtractor::new(Behaviour::Succeed);
        let gate = extractor.gate.clone();
        let manager = manager_with(extractor, settings(dir.path()));
        let started = manager
            .start("https://youtu.be/alpha", QualityTier::Hd720p)
            .await
            .unwrap();

        assert_eq!(manager.cancel(&started.download_id).unwrap(), CancelOutcome::Cancelled);
        gate.send_replace(true);
        let state = manager.wait(&started.download_id).await.unwrap();
        assert_eq!(state.status, ProgressStatus::Cancelled);

        assert!(matches!(manager.cancel("ghost"), Err(Error::NotFound(_))));
        assert!(!manager.tracker().contains("ghost"));
    }

    #[tokio::test]
    async fn duplicate_in_flight_ids_are_disambiguated() {
        let dir = tempdir().unwrap();
        let extractor = FakeExtractor::new(Behaviour::Succeed);
        let gate = extractor.gate.clone();
        let manager = manager_with(extractor, settings(dir.path()));

        let first = manager
            .start("https://youtu.be/alpha", QualityTier::Hd720p)
            .await
            .unwrap();
        let second = manager
            .start("https://youtu.be/alpha", QualityTier::Hd720p)
            .await
            .unwrap();
        assert_eq!(first.download_id, "Alpha Clip_720p");
        assert!(second.download_id.starts_with("Alpha Clip_720p-"));
        assert_ne!(first.download_id, second.download_id);

        gate.send_replace(true);
        manager.wait(&first.download_id).await.unwrap();
        manager.wait(&second.download_id).await.unwrap();
    }

    #[tokio::test]
    async fn duplicate_in_flight_ids_can_be_rejected() {
        let dir = tempdir().unwrap();
        let manager = manager_with(
            FakeExtractor::new(Behaviour::Hang),
            ManagerSettings {
                id_policy: IdPolicy::Reject,
                ..settings(dir.path())
            },
        );
        manager
            .start("https://youtu.be/alpha", QualityTier::Hd720p)
            .await
            .unwrap();
        let err = manager
            .start("https://youtu.be/alpha", QualityTier::Hd720p)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
    }

    #[tokio::test]
    async fn disambiguated_downloads_write_separate_files() {
        let dir = tempdir().unwrap();
        let extractor = FakeExtractor::new(Behaviour::Succeed);
        let gate = extractor.gate.clone();
        let requests = extractor.requests.clone();
        let manager = manager_with(extractor, settings(dir.path()));

        let first = manager
            .start("https://youtu.be/alpha", QualityTier::Hd720p)
            .await
            .unwrap();
        let second = manager
            .start("https://youtu.be/alpha", QualityTier::Hd720p)
            .await
            .unwrap();
        gate.send_replace(true);
        manager.wait(&first.download_id).await.unwrap();
        manager.wait(&second.download_id).await.unwrap();

        let requests = requests.lock();
        let suffix_for = |id: &str| {
            requests
                .iter()
                .find(|request| request.id == id)
                .map(|request| request.file_suffix.clone())
                .unwrap()
        };
        assert_eq!(suffix_for(&first.download_id), None);
        let suffix = suffix_for(&second.download_id).unwrap();
        assert_eq!(second.download_id, format!("Alpha Clip_720p-{suffix}"));
    }

    #[tokio::test]
    async fn cancelled_transfer_keeps_its_id_until_the_task_ends() {
        let dir = tempdir().unwrap();
        let extractor = FakeExtractor::new(Behaviour::GatedFail);
        let gate = extractor.gate.clone();
        let manager = manager_with(extractor, settings(dir.path()));

        let first = manager
            .start("https://youtu.be/alpha", QualityTier::Hd720p)
            .await
            .unwrap();
        assert_eq!(manager.cancel(&first.download_id).unwrap(), CancelOutcome::Cancelled);

        let second = manager
            .start("https://youtu.be/alpha", QualityTier::Hd720p)
            .await
            .unwrap();
        assert_ne!(second.download_id, first.download_id);
        assert!(!manager.progress(&second.download_id).status.is_terminal());

        gate.send_replace(true);
        let first_state = manager.wait(&first.download_id).await.unwrap();
        assert_eq!(first_state.status, ProgressStatus::Cancelled);
        let second_state = manager.wait(&second.download_id).await.unwrap();
        assert_eq!(second_state.status, ProgressStatus::Error);

        let third = manager
            .start("https://youtu.be/alpha", QualityTier::Hd720p)
            .await
            .unwrap();
        assert_eq!(third.download_id, first.download_id);
        manager.wait(&third.download_id).await.unwrap();
    }

    #[tokio::test]
    async fn cancelled_but_running_id_is_rejected_under_reject_policy() {
        let dir = tempdir().unwrap();
        let extractor = FakeExtractor::new(Behaviour::GatedFail);
        let gate = extractor.gate.clone();
        let manager = manager_with(
            extractor,
            ManagerSettings {
                id_policy: IdPolicy::Reject,
                ..settings(dir.path())
            },
        );

        let first = manager
            .start("https://youtu.be/alpha", QualityTier::Hd720p)
            .await
            .unwrap();
        manager.cancel(&first.download_id).unwrap();
        let err = manager
            .start("https://youtu.be/alpha", QualityTier::Hd720p)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
        assert_eq!(
            manager.progress(&first.download_id).status,
            ProgressStatus::Cancelled
        );

        gate.send_replace(true);
        manager.wait(&first.download_id).await.unwrap();
    }

    #[tokio::test]
    async fn eviction_drops_finished_jobs() {
        let dir = tempdir().unwrap();
        let manager = manager_with(
            FakeExtractor::new(Behaviour::Fail),
            ManagerSettings {
                progress_ttl: Some(Duration::ZERO),
                ..settings(dir.path())
            },
        );
        let started = manager
            .start("https://youtu.be/alpha", QualityTier::Hd720p)
            .await
            .unwrap();
        manager.wait(&started.download_id).await.unwrap();

        assert_eq!(manager.evict_expired(), 1);
        assert!(manager.jobs().is_empty());
        assert_eq!(
            manager.progress(&started.download_id).status,
            ProgressStatus::Unknown
        );
    }
}
