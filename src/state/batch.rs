/// Background legs of the upload workflow
///
/// File loading, the preview fan-out, and the sequential processing run
/// all live here as free async functions. Backend access is injected as
/// async closures, so ordering and failure handling are testable without
/// a server.
use std::future::Future;
use std::num::NonZeroUsize;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use futures::future;
use futures::stream::{self, StreamExt};

use crate::api::types::PreviewData;
use crate::api::ApiError;
use crate::state::data::{ModelDescriptor, PreviewEntry, SegmentationResult, SelectedFile};

/// Everything a batch run needs, snapshotted when the run starts
#[derive(Debug, Clone)]
pub struct BatchPlan {
    /// Correlation id stamped on every log line of the run
    pub batch_id: String,
    pub files: Vec<SelectedFile>,
    pub model: ModelDescriptor,
}

/// How many processing requests may be in flight at once.
///
/// Segmentation is expensive on the backend, so the default is one:
/// each file's request is awaited before the next one starts. Raising
/// this widens the queue without reordering the results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchPolicy {
    pub concurrency: NonZeroUsize,
}

impl Default for BatchPolicy {
    fn default() -> Self {
        BatchPolicy {
            concurrency: NonZeroUsize::MIN,
        }
    }
}

/// Per-file progress of a running batch, delivered to the observer
#[derive(Debug, Clone, PartialEq)]
pub enum BatchEvent {
    FileStarted { filename: String },
    FileCompleted { filename: String, num_cells: u32 },
    FileFailed { filename: String, message: String },
}

/// A file that failed inside an otherwise-continuing batch
#[derive(Debug, Clone, PartialEq)]
pub struct BatchFailure {
    pub filename: String,
    pub message: String,
}

/// Outcome of one whole batch run
#[derive(Debug, Clone)]
pub struct BatchReport {
    pub batch_id: String,
    pub model: ModelDescriptor,
    /// Successful results, in selection order; failed files are absent
    pub results: Vec<SegmentationResult>,
    /// Failed files, in selection order
    pub failures: Vec<BatchFailure>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl BatchReport {
    pub fn attempted(&self) -> usize {
        self.results.len() + self.failures.len()
    }

    pub fn elapsed_seconds(&self) -> f64 {
        (self.finished_at - self.started_at).num_milliseconds() as f64 / 1000.0
    }
}

/// Read the picked files into memory.
///
/// Unreadable files are dropped from the selection with a notice rather
/// than aborting the whole pick; a file outside the supported formats is
/// kept (the backend decides) but logged.
pub async fn load_files(paths: Vec<PathBuf>) -> (Vec<SelectedFile>, Vec<String>) {
    let mut files = Vec::with_capacity(paths.len());
    let mut notices = Vec::new();
    for path in paths {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());
        match tokio::fs::read(&path).await {
            Ok(bytes) => {
                let file = SelectedFile::new(name, bytes);
                if !file.is_supported() {
                    log::warn!("{} has an unexpected extension, sending it anyway", file.name);
                }
                files.push(file);
            }
            Err(err) => {
                log::warn!("Skipping unreadable file {}: {}", path.display(), err);
                notices.push(format!("Could not read {}: {}", name, err));
            }
        }
    }
    (files, notices)
}

/// Request channel previews for every file at once and wait for all of
/// them to settle.
///
/// Entries come back in selection order no matter which response lands
/// first, and a failed request keeps its file in the list with no
/// channels instead of dropping it.
pub async fn fetch_previews<F, Fut>(files: Vec<SelectedFile>, request: F) -> Vec<PreviewEntry>
where
    F: Fn(SelectedFile) -> Fut,
    Fut: Future<Output = Result<PreviewData, ApiError>>,
{
    let request = &request;
    let pending = files.into_iter().map(|file| {
        let name = file.name.clone();
        async move {
            match request(file).await {
                Ok(data) => PreviewEntry::ready(name, data.channels, data.shape),
                Err(err) => {
                    log::warn!("Preview failed for {}: {}", name, err);
                    PreviewEntry::unavailable(name)
                }
            }
        }
    });
    future::join_all(pending).await
}

/// Run one processing batch to completion.
///
/// Files move through an ordered queue bounded by `policy.concurrency`.
/// At the default width of one this is strictly sequential: a file's
/// request is not even built until the previous one has settled. A
/// failed file is reported through the observer and skipped; the run
/// always finishes and always produces a report.
pub async fn run_batch<S, Fut, O>(
    plan: BatchPlan,
    policy: BatchPolicy,
    submit: S,
    observer: O,
) -> BatchReport
where
    S: Fn(SelectedFile, ModelDescriptor) -> Fut,
    Fut: Future<Output = Result<SegmentationResult, ApiError>>,
    O: Fn(&BatchEvent),
{
    let started_at = Utc::now();
    let BatchPlan {
        batch_id,
        files,
        model,
    } = plan;

    let submit = &submit;
    let observer = &observer;
    let request_model = model.clone();
    let request_model = &request_model;

    let mut queue = stream::iter(files.into_iter().map(|file| {
        let filename = file.name.clone();
        async move {
            observer(&BatchEvent::FileStarted {
                filename: filename.clone(),
            });
            let outcome = submit(file, request_model.clone()).await;
            (filename, outcome)
        }
    }))
    .buffered(policy.concurrency.get());

    let mut results = Vec::new();
    let mut failures = Vec::new();
    while let Some((filename, outcome)) = queue.next().await {
        match outcome {
            Ok(result) => {
                observer(&BatchEvent::FileCompleted {
                    filename,
                    num_cells: result.num_cells,
                });
                results.push(result);
            }
            Err(err) => {
                let message = err.to_string();
                observer(&BatchEvent::FileFailed {
                    filename: filename.clone(),
                    message: message.clone(),
                });
                failures.push(BatchFailure { filename, message });
            }
        }
    }

    BatchReport {
        batch_id,
        model,
        results,
        failures,
        started_at,
        finished_at: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tokio::time::sleep;

    use crate::state::data::ChannelPreview;

    fn file(name: &str) -> SelectedFile {
        SelectedFile::new(name.to_string(), vec![1, 2, 3])
    }

    fn plan_for(names: &[&str]) -> BatchPlan {
        BatchPlan {
            batch_id: "batch-under-test".to_string(),
            files: names.iter().map(|n| file(n)).collect(),
            model: ModelDescriptor::fallback(),
        }
    }

    fn segmented(name: &str, num_cells: u32) -> SegmentationResult {
        SegmentationResult {
            filename: name.to_string(),
            model_name: "Cellpose".to_string(),
            num_cells,
            processing_time: "0.01s".to_string(),
            mask_preview: None,
        }
    }

    fn one_channel() -> Vec<ChannelPreview> {
        vec![ChannelPreview {
            channel: 0,
            preview: "data:image/png;base64,AAAA".to_string(),
        }]
    }

    #[tokio::test(start_paused = true)]
    async fn test_previews_keep_selection_order() {
        let files = vec![file("a.tif"), file("b.tif"), file("c.tif")];
        // responses land in the order b, a, c
        let entries = fetch_previews(files, |file| async move {
            let delay = match file.name.as_str() {
                "a.tif" => 20,
                "b.tif" => 5,
                _ => 40,
            };
            sleep(Duration::from_millis(delay)).await;
            Ok(PreviewData {
                channels: one_channel(),
                shape: Some(vec![1, 8, 8]),
            })
        })
        .await;

        let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["a.tif", "b.tif", "c.tif"]);
    }

    #[tokio::test]
    async fn test_failed_preview_keeps_its_file() {
        let files = vec![file("a.tif"), file("bad.tif"), file("c.tif")];
        let entries = fetch_previews(files, |file| async move {
            if file.name == "bad.tif" {
                Err(ApiError::Backend("Unsupported file format".to_string()))
            } else {
                Ok(PreviewData {
                    channels: one_channel(),
                    shape: None,
                })
            }
        })
        .await;

        assert_eq!(entries.len(), 3, "a failure must not shrink the list");
        assert!(!entries[0].is_unavailable());
        assert!(entries[1].is_unavailable());
        assert_eq!(entries[1].name, "bad.tif");
        assert!(!entries[2].is_unavailable());
    }

    #[tokio::test]
    async fn test_batch_skips_failures_and_continues() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();

        let report = run_batch(
            plan_for(&["a.tif", "b.tif", "c.tif"]),
            BatchPolicy::default(),
            |file, _model| async move {
                if file.name == "b.tif" {
                    Err(ApiError::Backend("Segmentation failed".to_string()))
                } else {
                    Ok(segmented(&file.name, 5))
                }
            },
            move |event| sink.lock().unwrap().push(event.clone()),
        )
        .await;

        let names: Vec<&str> = report.results.iter().map(|r| r.filename.as_str()).collect();
        assert_eq!(names, ["a.tif", "c.tif"]);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].filename, "b.tif");
        assert_eq!(report.failures[0].message, "Segmentation failed");
        assert_eq!(report.attempted(), 3);

        // with a queue width of one, events interleave strictly per file
        let events = events.lock().unwrap();
        let expected = [
            BatchEvent::FileStarted {
                filename: "a.tif".to_string(),
            },
            BatchEvent::FileCompleted {
                filename: "a.tif".to_string(),
                num_cells: 5,
            },
            BatchEvent::FileStarted {
                filename: "b.tif".to_string(),
            },
            BatchEvent::FileFailed {
                filename: "b.tif".to_string(),
                message: "Segmentation failed".to_string(),
            },
            BatchEvent::FileStarted {
                filename: "c.tif".to_string(),
            },
            BatchEvent::FileCompleted {
                filename: "c.tif".to_string(),
                num_cells: 5,
            },
        ];
        assert_eq!(events.as_slice(), expected.as_slice());
    }

    #[tokio::test(start_paused = true)]
    async fn test_default_policy_never_overlaps_requests() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let submit = {
            let in_flight = in_flight.clone();
            let peak = peak.clone();
            move |file: SelectedFile, _model: ModelDescriptor| {
                let in_flight = in_flight.clone();
                let peak = peak.clone();
                async move {
                    let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    sleep(Duration::from_millis(10)).await;
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                    Ok(segmented(&file.name, 1))
                }
            }
        };

        let report = run_batch(
            plan_for(&["a.tif", "b.tif", "c.tif", "d.tif"]),
            BatchPolicy::default(),
            submit,
            |_| {},
        )
        .await;

        assert_eq!(report.results.len(), 4);
        assert_eq!(peak.load(Ordering::SeqCst), 1, "requests must not overlap");
    }

    #[tokio::test(start_paused = true)]
    async fn test_wider_policy_overlaps_but_keeps_order() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let submit = {
            let in_flight = in_flight.clone();
            let peak = peak.clone();
            move |file: SelectedFile, _model: ModelDescriptor| {
                let in_flight = in_flight.clone();
                let peak = peak.clone();
                async move {
                    let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    // later files answer faster
                    let delay = match file.name.as_str() {
                        "a.tif" => 30,
                        "b.tif" => 20,
                        _ => 10,
                    };
                    sleep(Duration::from_millis(delay)).await;
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                    Ok(segmented(&file.name, 1))
                }
            }
        };

        let policy = BatchPolicy {
            concurrency: NonZeroUsize::new(2).unwrap(),
        };
        let report = run_batch(plan_for(&["a.tif", "b.tif", "c.tif"]), policy, submit, |_| {}).await;

        assert_eq!(peak.load(Ordering::SeqCst), 2);
        let names: Vec<&str> = report.results.iter().map(|r| r.filename.as_str()).collect();
        assert_eq!(names, ["a.tif", "b.tif", "c.tif"]);
    }

    #[tokio::test]
    async fn test_empty_batch_submits_nothing() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();

        let report = run_batch(
            plan_for(&[]),
            BatchPolicy::default(),
            move |file: SelectedFile, _model: ModelDescriptor| {
                counter.fetch_add(1, Ordering::SeqCst);
                async move { Ok(segmented(&file.name, 0)) }
            },
            |_| {},
        )
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(report.attempted(), 0);
        assert!(report.results.is_empty());
        assert!(report.failures.is_empty());
    }

    #[tokio::test]
    async fn test_load_files_drops_unreadable_with_notice() {
        let dir = std::env::temp_dir().join(format!("cell-annotator-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let good = dir.join("cells.tif");
        std::fs::write(&good, b"not a real tiff").unwrap();
        let missing = dir.join("gone.tif");

        let (files, notices) = load_files(vec![good.clone(), missing]).await;

        assert_eq!(files.len(), 1);
        assert_eq!(files[0].name, "cells.tif");
        assert_eq!(files[0].bytes, b"not a real tiff");
        assert_eq!(notices.len(), 1);
        assert!(notices[0].contains("gone.tif"));

        std::fs::remove_dir_all(&dir).ok();
    }
}
