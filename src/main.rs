use iced::widget::{button, column, horizontal_space, row, text};
use iced::{Alignment, Element, Length, Task, Theme, Vector};
use rfd::FileDialog;

mod api;
mod config;
mod state;
mod ui;

use api::ApiClient;
use config::Config;
use state::batch::{self, BatchEvent, BatchPolicy, BatchReport};
use state::data::{ModelDescriptor, PreviewEntry, SelectedFile, SUPPORTED_EXTENSIONS};
use state::workflow::UploadWorkflow;
use ui::annotation::PolygonShape;
use ui::upload::{PreviewCard, ResultCard};

/// Top-level pages, the desktop stand-in for routes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Page {
    Upload,
    Annotate,
}

/// Application messages (events)
#[derive(Debug, Clone)]
enum Message {
    /// User switched pages via the top bar
    Navigate(Page),
    /// Model list fetch finished
    ModelsLoaded(Result<Vec<ModelDescriptor>, String>),
    /// User clicked the "Select Files" button
    PickFiles,
    /// Picked files were read from disk
    SelectionLoaded {
        generation: u64,
        files: Vec<SelectedFile>,
        notices: Vec<String>,
    },
    /// All preview requests for a selection settled
    PreviewsLoaded {
        generation: u64,
        entries: Vec<PreviewEntry>,
    },
    /// User picked a segmentation model
    ModelPicked(ModelDescriptor),
    /// User clicked "Upload and Process"
    RunUpload,
    /// A processing batch ran to completion
    BatchFinished(BatchReport),
    /// User added a polygon on the annotation canvas
    AddPolygon,
    /// User clicked a shape (or empty canvas, deselecting)
    ShapeSelected(Option<usize>),
    /// User dragged the grabbed shape
    ShapeDragged { index: usize, delta: Vector },
}

/// Main application state
struct CellAnnotator {
    /// Shared backend client, cloned into every async task
    client: ApiClient,
    /// Upload page state machine
    workflow: UploadWorkflow,
    page: Page,
    /// Status message to display to the user
    status: String,
    /// File loading problems from the current selection
    notices: Vec<String>,
    /// Decoded previews, rebuilt whenever the workflow's previews change
    preview_cards: Vec<PreviewCard>,
    /// Decoded results, rebuilt whenever a batch finishes
    result_cards: Vec<ResultCard>,
    /// Annotation shapes, session-only
    shapes: Vec<PolygonShape>,
    selected_shape: Option<usize>,
}

impl CellAnnotator {
    /// Create a new instance of the application
    fn new() -> (Self, Task<Message>) {
        let config = Config::from_env();
        log::info!("Using backend at {}", config.api_base_url);

        // If this fails, we panic because the app cannot talk to the
        // backend without an HTTP client
        let client = ApiClient::new(&config).expect("Failed to initialize the HTTP client.");

        let status = format!("Ready. Backend: {}", config.api_base_url);
        let app = CellAnnotator {
            client: client.clone(),
            workflow: UploadWorkflow::new(),
            page: Page::Upload,
            status,
            notices: Vec::new(),
            preview_cards: Vec::new(),
            result_cards: Vec::new(),
            shapes: Vec::new(),
            selected_shape: None,
        };

        let fetch_models = Task::perform(
            async move { client.fetch_models().await.map_err(|e| e.to_string()) },
            Message::ModelsLoaded,
        );

        (app, fetch_models)
    }

    /// Handle application messages and update state
    fn update(&mut self, message: Message) -> Task<Message> {
        match message {
            Message::Navigate(page) => {
                self.page = page;
                Task::none()
            }

            Message::ModelsLoaded(outcome) => {
                match &outcome {
                    Ok(models) => {
                        log::info!("Backend offers {} segmentation model(s)", models.len());
                        self.status = format!("Loaded {} segmentation model(s)", models.len());
                    }
                    Err(_) => {
                        self.status = "Model list unavailable, using the built-in default".to_string();
                    }
                }
                self.workflow.apply_models(outcome);
                Task::none()
            }

            Message::PickFiles => {
                // Show the native file picker dialog
                let picked = FileDialog::new()
                    .set_title("Select Cell Images")
                    .add_filter("Microscopy images", &SUPPORTED_EXTENSIONS)
                    .pick_files();

                let Some(paths) = picked else {
                    return Task::none();
                };
                if paths.is_empty() {
                    return Task::none();
                }

                let generation = self.workflow.begin_selection();
                self.preview_cards.clear();
                self.notices.clear();
                self.status = format!("Loading {} file(s)...", paths.len());

                Task::perform(batch::load_files(paths), move |(files, notices)| {
                    Message::SelectionLoaded {
                        generation,
                        files,
                        notices,
                    }
                })
            }

            Message::SelectionLoaded {
                generation,
                files,
                notices,
            } => {
                if !self.workflow.store_files(generation, files) {
                    // the user has already picked a newer selection
                    return Task::none();
                }
                self.notices.extend(notices);

                let files = self.workflow.files().to_vec();
                if files.is_empty() {
                    self.status = "No readable files in the selection".to_string();
                    self.workflow.apply_previews(generation, Vec::new());
                    return Task::none();
                }

                self.status = format!("Generating previews for {} file(s)...", files.len());
                let client = self.client.clone();
                Task::perform(
                    async move {
                        batch::fetch_previews(files, move |file| {
                            let client = client.clone();
                            async move { client.render_preview(&file).await }
                        })
                        .await
                    },
                    move |entries| Message::PreviewsLoaded { generation, entries },
                )
            }

            Message::PreviewsLoaded { generation, entries } => {
                if !self.workflow.apply_previews(generation, entries) {
                    return Task::none();
                }
                self.preview_cards = self.workflow.previews().iter().map(ui::upload::preview_card).collect();

                let total = self.workflow.previews().len();
                let unavailable = self
                    .workflow
                    .previews()
                    .iter()
                    .filter(|entry| entry.is_unavailable())
                    .count();
                self.status = if unavailable == 0 {
                    format!("Previews ready for {} file(s)", total)
                } else {
                    format!("Previews ready, {} of {} unavailable", unavailable, total)
                };
                Task::none()
            }

            Message::ModelPicked(model) => {
                self.status = format!("Model: {}", model.name);
                self.workflow.select_model(model.id);
                Task::none()
            }

            Message::RunUpload => match self.workflow.begin_batch() {
                Ok(plan) => {
                    self.status = format!(
                        "Processing {} file(s) with {}...",
                        plan.files.len(),
                        plan.model.name
                    );
                    log::info!(
                        "batch {}: starting, {} file(s), model {}",
                        plan.batch_id,
                        plan.files.len(),
                        plan.model.id
                    );

                    let client = self.client.clone();
                    let batch_id = plan.batch_id.clone();
                    Task::perform(
                        async move {
                            batch::run_batch(
                                plan,
                                BatchPolicy::default(),
                                move |file, model| {
                                    let client = client.clone();
                                    async move { client.process_image(&file, &model.id).await }
                                },
                                move |event| log_batch_event(&batch_id, event),
                            )
                            .await
                        },
                        Message::BatchFinished,
                    )
                }
                Err(refusal) => {
                    self.status = format!("⚠️ {}", refusal);
                    Task::none()
                }
            },

            Message::BatchFinished(report) => {
                self.workflow.finish_batch(&report);
                self.result_cards = self.workflow.results().iter().map(ui::upload::result_card).collect();

                log::info!(
                    "batch {}: finished, {} ok, {} failed, {:.1}s",
                    report.batch_id,
                    report.results.len(),
                    report.failures.len(),
                    report.elapsed_seconds()
                );
                self.status = if report.failures.is_empty() {
                    format!(
                        "✅ Processed {}/{} file(s) in {:.1}s",
                        report.results.len(),
                        report.attempted(),
                        report.elapsed_seconds()
                    )
                } else {
                    format!(
                        "⚠️ Processed {}/{} file(s), {} failed",
                        report.results.len(),
                        report.attempted(),
                        report.failures.len()
                    )
                };
                Task::none()
            }

            Message::AddPolygon => {
                self.shapes.push(PolygonShape::default_square());
                self.selected_shape = Some(self.shapes.len() - 1);
                Task::none()
            }

            Message::ShapeSelected(index) => {
                self.selected_shape = index;
                Task::none()
            }

            Message::ShapeDragged { index, delta } => {
                if let Some(shape) = self.shapes.get_mut(index) {
                    shape.translate(delta);
                }
                Task::none()
            }
        }
    }

    /// Build the user interface
    fn view(&self) -> Element<Message> {
        let top_bar = row![
            text("Cell Annotation Tool").size(22),
            horizontal_space(),
            button("Home").on_press(Message::Navigate(Page::Upload)),
            button("Annotate").on_press(Message::Navigate(Page::Annotate)),
        ]
        .spacing(10)
        .padding(10)
        .align_y(Alignment::Center);

        let content: Element<Message> = match self.page {
            Page::Upload => ui::upload::upload_page(
                &self.workflow,
                &self.preview_cards,
                &self.result_cards,
                &self.notices,
            ),
            Page::Annotate => ui::annotation::annotation_page(
                &self.shapes,
                self.selected_shape,
                self.annotation_target(),
            ),
        };

        column![
            top_bar,
            column![content].height(Length::Fill),
            text(&self.status).size(14),
        ]
        .spacing(5)
        .padding(10)
        .into()
    }

    /// Set the application theme
    fn theme(&self) -> Theme {
        Theme::Light
    }

    /// The image the annotation page works on: the first result of the
    /// latest batch, if there is one
    fn annotation_target(&self) -> Option<&str> {
        self.workflow.results().first().map(|r| r.filename.as_str())
    }
}

/// One log line per batch event, tied together by the batch id
fn log_batch_event(batch_id: &str, event: &BatchEvent) {
    match event {
        BatchEvent::FileStarted { filename } => {
            log::info!("batch {}: processing {}", batch_id, filename);
        }
        BatchEvent::FileCompleted {
            filename,
            num_cells,
        } => {
            log::info!("batch {}: {} done, {} cell(s)", batch_id, filename, num_cells);
        }
        BatchEvent::FileFailed { filename, message } => {
            log::warn!("batch {}: {} failed: {}", batch_id, filename, message);
        }
    }
}

fn main() -> iced::Result {
    // Initialize logger - set RUST_LOG=debug for verbose output
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    log::info!("cell-annotator starting up");

    iced::application("Cell Annotation Tool", CellAnnotator::update, CellAnnotator::view)
        .theme(CellAnnotator::theme)
        .centered()
        .run_with(CellAnnotator::new)
}
