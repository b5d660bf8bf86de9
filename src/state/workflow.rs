/// Upload workflow controller
///
/// Owns every piece of upload-page state and the transitions between
/// them. The async legs (file loading, preview fetching, the batch run
/// itself) live in `state::batch`; their outcomes re-enter here through
/// the `store_`/`apply_`/`finish_` methods.
///
/// Selection lifecycle, per generation:
///
///   Idle -> FetchingPreviews -> PreviewsReady -> Uploading -> Done
///
/// Picking files again starts a new generation; late results from an
/// older generation are detected and dropped. A batch run is tracked
/// separately from the selection phase, so exactly one batch can be in
/// flight no matter how the selection changes underneath it.
use thiserror::Error;
use uuid::Uuid;

use crate::state::batch::{BatchFailure, BatchPlan, BatchReport};
use crate::state::data::{ModelDescriptor, PreviewEntry, SegmentationResult, SelectedFile};

/// Where the current selection is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    FetchingPreviews,
    PreviewsReady,
    Uploading,
    Done,
}

/// Why a batch could not start
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum WorkflowError {
    #[error("Please select files first!")]
    NoFilesSelected,
    #[error("Previews are still loading")]
    PreviewsPending,
    #[error("A batch is already running")]
    BatchInFlight,
}

pub struct UploadWorkflow {
    phase: Phase,
    generation: u64,
    files: Vec<SelectedFile>,
    previews: Vec<PreviewEntry>,
    models: Vec<ModelDescriptor>,
    selected_model_id: String,
    results: Vec<SegmentationResult>,
    failures: Vec<BatchFailure>,
    /// Id of the batch currently running, if any
    active_batch: Option<String>,
}

impl UploadWorkflow {
    pub fn new() -> Self {
        let fallback = ModelDescriptor::fallback();
        UploadWorkflow {
            phase: Phase::Idle,
            generation: 0,
            files: Vec::new(),
            previews: Vec::new(),
            selected_model_id: fallback.id.clone(),
            models: vec![fallback],
            results: Vec::new(),
            failures: Vec::new(),
            active_batch: None,
        }
    }

    // --- model list ---

    /// Install the fetched model list. A failed fetch or an empty list
    /// leaves the built-in fallback in place; the current selection is
    /// never touched.
    pub fn apply_models(&mut self, outcome: Result<Vec<ModelDescriptor>, String>) {
        match outcome {
            Ok(models) if !models.is_empty() => self.models = models,
            Ok(_) => log::warn!("Backend returned an empty model list, keeping the default"),
            Err(err) => log::warn!("Model list fetch failed: {}", err),
        }
    }

    pub fn models(&self) -> &[ModelDescriptor] {
        &self.models
    }

    /// Record the model for the next batch. Not validated against the
    /// list; the backend is the authority on what it can run.
    pub fn select_model(&mut self, id: impl Into<String>) {
        self.selected_model_id = id.into();
    }

    pub fn selected_model_id(&self) -> &str {
        &self.selected_model_id
    }

    /// The selected model's descriptor, when it is in the current list
    pub fn selected_descriptor(&self) -> Option<ModelDescriptor> {
        self.models
            .iter()
            .find(|m| m.id == self.selected_model_id)
            .cloned()
    }

    // --- file selection ---

    /// Start a new selection cycle. Previous files and previews are
    /// discarded immediately; the returned generation tags the async
    /// loads so stale completions can be recognized.
    pub fn begin_selection(&mut self) -> u64 {
        self.generation += 1;
        self.files.clear();
        self.previews.clear();
        self.phase = Phase::FetchingPreviews;
        self.generation
    }

    /// Install loaded file contents. Returns false, changing nothing,
    /// when the user has already picked a newer selection.
    pub fn store_files(&mut self, generation: u64, files: Vec<SelectedFile>) -> bool {
        if generation != self.generation {
            return false;
        }
        self.files = files;
        true
    }

    /// Install the settled preview entries for a selection. Returns false
    /// for a stale generation.
    pub fn apply_previews(&mut self, generation: u64, entries: Vec<PreviewEntry>) -> bool {
        if generation != self.generation {
            return false;
        }
        // one settled entry per selected file, failed requests included
        debug_assert_eq!(entries.len(), self.files.len());
        self.previews = entries;
        self.phase = Phase::PreviewsReady;
        true
    }

    pub fn files(&self) -> &[SelectedFile] {
        &self.files
    }

    pub fn previews(&self) -> &[PreviewEntry] {
        &self.previews
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    // --- batch runs ---

    /// True while a batch is running; starting another is refused until
    /// the running one delivers its report.
    pub fn is_busy(&self) -> bool {
        self.active_batch.is_some()
    }

    /// Start a batch over the current selection. On success the returned
    /// plan carries everything the runner needs, snapshotted so that
    /// picking new files mid-run cannot disturb it.
    pub fn begin_batch(&mut self) -> Result<BatchPlan, WorkflowError> {
        if self.is_busy() {
            return Err(WorkflowError::BatchInFlight);
        }
        if self.files.is_empty() {
            return Err(WorkflowError::NoFilesSelected);
        }
        if self.phase == Phase::FetchingPreviews {
            return Err(WorkflowError::PreviewsPending);
        }
        let model = self.selected_descriptor().unwrap_or_else(|| ModelDescriptor {
            id: self.selected_model_id.clone(),
            name: self.selected_model_id.clone(),
        });
        let plan = BatchPlan {
            batch_id: Uuid::new_v4().to_string(),
            files: self.files.clone(),
            model,
        };
        self.active_batch = Some(plan.batch_id.clone());
        self.failures.clear();
        self.phase = Phase::Uploading;
        Ok(plan)
    }

    /// Install a finished batch's report. Results replace the previous
    /// run's list wholesale. The busy flag clears only when the report
    /// belongs to the batch actually in flight.
    pub fn finish_batch(&mut self, report: &BatchReport) {
        self.results = report.results.clone();
        self.failures = report.failures.clone();
        if self.active_batch.as_deref() == Some(report.batch_id.as_str()) {
            self.active_batch = None;
            if self.phase == Phase::Uploading {
                self.phase = Phase::Done;
            }
        }
    }

    pub fn results(&self) -> &[SegmentationResult] {
        &self.results
    }

    pub fn failures(&self) -> &[BatchFailure] {
        &self.failures
    }
}
