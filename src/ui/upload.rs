/// Upload page widgets
///
/// Builds the whole upload view: model picker, file selection, per-file
/// channel previews, and the results grid. Inline image payloads are
/// decoded once into handles when the state changes (`preview_card`,
/// `result_card`), not on every redraw.
use iced::widget::{button, column, container, image, pick_list, row, scrollable, text, Column, Row};
use iced::{Alignment, Element, Length};

use crate::state::data::{PreviewEntry, SegmentationResult};
use crate::state::workflow::UploadWorkflow;
use crate::Message;

/// Channel images per preview row, same two-column layout as before
const CHANNELS_PER_ROW: usize = 2;
/// Result cards per row
const RESULTS_PER_ROW: usize = 2;
/// Rendered width of preview and mask images
const IMAGE_WIDTH: f32 = 240.0;

/// A preview entry with its channel payloads decoded for display
#[derive(Debug, Clone)]
pub struct PreviewCard {
    pub name: String,
    pub shape_label: Option<String>,
    /// Channel index with its decoded image, None when decoding failed
    pub channels: Vec<(u32, Option<image::Handle>)>,
}

pub fn preview_card(entry: &PreviewEntry) -> PreviewCard {
    PreviewCard {
        name: entry.name.clone(),
        shape_label: entry.shape_label(),
        channels: entry
            .channels
            .iter()
            .map(|channel| {
                (
                    channel.channel,
                    channel.png_bytes().map(image::Handle::from_bytes),
                )
            })
            .collect(),
    }
}

/// A segmentation result with its mask decoded for display
#[derive(Debug, Clone)]
pub struct ResultCard {
    pub filename: String,
    pub model_name: String,
    pub num_cells: u32,
    pub processing_time: String,
    pub mask: Option<image::Handle>,
}

pub fn result_card(result: &SegmentationResult) -> ResultCard {
    ResultCard {
        filename: result.filename.clone(),
        model_name: result.model_name.clone(),
        num_cells: result.num_cells,
        processing_time: result.processing_time.clone(),
        mask: result.mask_bytes().map(image::Handle::from_bytes),
    }
}

/// The whole upload page
pub fn upload_page<'a>(
    workflow: &'a UploadWorkflow,
    previews: &'a [PreviewCard],
    results: &'a [ResultCard],
    notices: &'a [String],
) -> Element<'a, Message> {
    let mut page = column![
        text("Cell Image Annotation").size(32),
        text("Upload your cell images for annotation and AI-assisted segmentation.").size(16),
        controls(workflow),
    ]
    .spacing(15)
    .padding(20);

    if !notices.is_empty() {
        page = page.push(notice_list(notices));
    }

    if !previews.is_empty() {
        page = page.push(previews_section(previews));
        page = page.push(upload_button(workflow));
    }

    if !workflow.failures().is_empty() {
        page = page.push(failure_list(workflow));
    }

    if !results.is_empty() {
        page = page.push(results_section(results));
    }

    scrollable(page).height(Length::Fill).into()
}

fn controls(workflow: &UploadWorkflow) -> Element<'_, Message> {
    let picker = pick_list(
        workflow.models().to_vec(),
        workflow.selected_descriptor(),
        Message::ModelPicked,
    )
    .placeholder("Select Model");

    row![
        text("Select Model").size(16),
        picker,
        button("Select Files").on_press(Message::PickFiles).padding(10),
    ]
    .spacing(10)
    .align_y(Alignment::Center)
    .into()
}

fn upload_button(workflow: &UploadWorkflow) -> Element<'_, Message> {
    let label = if workflow.is_busy() {
        "Processing..."
    } else {
        "Upload and Process"
    };
    button(text(label))
        .on_press_maybe((!workflow.is_busy()).then_some(Message::RunUpload))
        .padding(10)
        .into()
}

fn notice_list(notices: &[String]) -> Element<'_, Message> {
    let mut list = Column::new().spacing(4);
    for notice in notices {
        list = list.push(text(format!("⚠️ {}", notice)).size(14));
    }
    list.into()
}

fn failure_list(workflow: &UploadWorkflow) -> Element<'_, Message> {
    let mut list = Column::new().spacing(4);
    for failure in workflow.failures() {
        list = list.push(
            text(format!(
                "⚠️ Error processing {}: {}",
                failure.filename, failure.message
            ))
            .size(14),
        );
    }
    list.into()
}

fn previews_section(cards: &[PreviewCard]) -> Element<'_, Message> {
    let mut section = Column::new().spacing(15);
    for card in cards {
        section = section.push(preview_card_view(card));
    }
    section.into()
}

fn preview_card_view(card: &PreviewCard) -> Element<'_, Message> {
    let mut body = column![text(&card.name).size(20)].spacing(8);

    if let Some(label) = &card.shape_label {
        body = body.push(text(format!("Shape: {}", label)).size(14));
    }

    if card.channels.is_empty() {
        body = body.push(text("Preview unavailable").size(14));
    }

    for pair in card.channels.chunks(CHANNELS_PER_ROW) {
        let mut channel_row = Row::new().spacing(10);
        for (channel, handle) in pair {
            let cell: Element<Message> = match handle {
                Some(handle) => column![
                    text(format!("Channel {}", channel)).size(14),
                    image(handle.clone()).width(Length::Fixed(IMAGE_WIDTH)),
                ]
                .spacing(4)
                .into(),
                None => column![
                    text(format!("Channel {}", channel)).size(14),
                    text("Preview unavailable").size(12),
                ]
                .spacing(4)
                .into(),
            };
            channel_row = channel_row.push(cell);
        }
        body = body.push(channel_row);
    }

    container(body)
        .padding(10)
        .width(Length::Fill)
        .style(container::bordered_box)
        .into()
}

fn results_section(cards: &[ResultCard]) -> Element<'_, Message> {
    let mut section = column![text("Results").size(24)].spacing(10);
    for pair in cards.chunks(RESULTS_PER_ROW) {
        let mut result_row = Row::new().spacing(15);
        for card in pair {
            result_row = result_row.push(result_card_view(card));
        }
        section = section.push(result_row);
    }
    section.into()
}

fn result_card_view(card: &ResultCard) -> Element<'_, Message> {
    let mut body = column![
        text(&card.filename).size(20),
        text(format!("Model: {}", card.model_name)).size(14),
        text(format!("Cells Detected: {}", card.num_cells)).size(14),
        text(format!("Processing Time: {}", card.processing_time)).size(14),
    ]
    .spacing(4);

    if let Some(mask) = &card.mask {
        body = body.push(text("Segmentation Result:").size(14));
        body = body.push(image(mask.clone()).width(Length::Fixed(IMAGE_WIDTH)));
    }

    container(body)
        .padding(10)
        .style(container::bordered_box)
        .into()
}
