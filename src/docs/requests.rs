//! Remote update requests for the document service.
//!
//! Style events become sparse `updateParagraphStyle` / `updateTextStyle`
//! requests whose `fields` masks name only the attributes that were set.
//! Every buffer offset is shifted by [`ANCHOR_INDEX`] because the body text is
//! inserted at index 1 of the document.

use serde::Serialize;

use super::layout::{Alignment, ImageSlot, NamedStyle, Rgb, Style, StyleEvent};

/// Index the assembled text is inserted at.
pub const ANCHOR_INDEX: usize = 1;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Dimension {
    pub magnitude: f64,
    pub unit: &'static str,
}

impl Dimension {
    pub fn points(magnitude: f64) -> Self {
        Self {
            magnitude,
            unit: "PT",
        }
    }
}

/// Width and height of inserted images, in points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImageSize {
    pub width_pt: f64,
    pub height_pt: f64,
}

impl Default for ImageSize {
    fn default() -> Self {
        Self {
            width_pt: 430.0,
            height_pt: 260.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Location {
    pub index: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Range {
    pub start_index: usize,
    pub end_index: usize,
}

impl Range {
    /// Translate a 0-based buffer range into document indices.
    pub fn shifted(start: usize, end: usize) -> Self {
        Self {
            start_index: start + ANCHOR_INDEX,
            end_index: end + ANCHOR_INDEX,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParagraphStyle {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub named_style_type: Option<NamedStyle>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alignment: Option<Alignment>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub space_above: Option<Dimension>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub space_below: Option<Dimension>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RgbColor {
    pub red: f64,
    pub green: f64,
    pub blue: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Color {
    pub rgb_color: RgbColor,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OptionalColor {
    pub color: Color,
}

impl From<Rgb> for OptionalColor {
    fn from(Rgb(r, g, b): Rgb) -> Self {
        OptionalColor {
            color: Color {
                rgb_color: RgbColor {
                    red: f64::from(r) / 255.0,
                    green: f64::from(g) / 255.0,
                    blue: f64::from(b) / 255.0,
                },
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Link {
    pub url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TextStyle {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub foreground_color: Option<OptionalColor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bold: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub italic: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<Link>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Size {
    pub height: Dimension,
    pub width: Dimension,
}

/// One entry of a `batchUpdate` call.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Request {
    #[serde(rename_all = "camelCase")]
    InsertText { location: Location, text: String },
    #[serde(rename_all = "camelCase")]
    UpdateParagraphStyle {
        range: Range,
        paragraph_style: ParagraphStyle,
        fields: String,
    },
    #[serde(rename_all = "camelCase")]
    UpdateTextStyle {
        range: Range,
        text_style: TextStyle,
        fields: String,
    },
    #[serde(rename_all = "camelCase")]
    InsertInlineImage {
        location: Location,
        uri: String,
        object_size: Size,
    },
}

pub fn insert_text_request(text: &str) -> Request {
    Request::InsertText {
        location: Location {
            index: ANCHOR_INDEX,
        },
        text: text.to_string(),
    }
}

pub fn insert_image_request(slot: &ImageSlot, size: ImageSize) -> Request {
    Request::InsertInlineImage {
        location: Location {
            index: slot.offset + ANCHOR_INDEX,
        },
        uri: slot.url.clone(),
        object_size: Size {
            height: Dimension::points(size.height_pt),
            width: Dimension::points(size.width_pt),
        },
    }
}

fn paragraph_style(style: &Style) -> Option<(ParagraphStyle, String)> {
    if !style.has_paragraph_attributes() {
        return None;
    }
    let mut paragraph = ParagraphStyle::default();
    let mut fields = Vec::new();

    if let Some(named) = style.named_style {
        paragraph.named_style_type = Some(named);
        fields.push("namedStyleType");
    }
    if let Some(alignment) = style.alignment {
        paragraph.alignment = Some(alignment);
        fields.push("alignment");
    }
    if let Some(above) = style.space_above_pt {
        paragraph.space_above = Some(Dimension::points(f64::from(above)));
        fields.push("spaceAbove");
    }
    if let Some(below) = style.space_below_pt {
        paragraph.space_below = Some(Dimension::points(f64::from(below)));
        fields.push("spaceBelow");
    }
    Some((paragraph, fields.join(",")))
}

fn text_style(style: &Style) -> Option<(TextStyle, String)> {
    if !style.has_text_attributes() {
        return None;
    }
    let mut text = TextStyle::default();
    let mut fields = Vec::new();

    if let Some(color) = style.color {
        text.foreground_color = Some(color.into());
        fields.push("foregroundColor");
    }
    if style.bold {
        text.bold = Some(true);
        fields.push("bold");
    }
    if style.italic {
        text.italic = Some(true);
        fields.push("italic");
    }
    if let Some(url) = &style.link_url {
        text.link = Some(Link { url: url.clone() });
        fields.push("link");
    }
    Some((text, fields.join(",")))
}

/// Zero, one or two requests for a single event, paragraph style first.
pub fn style_requests(event: &StyleEvent) -> Vec<Request> {
    let mut requests = Vec::with_capacity(2);
    if let Some((paragraph_style, fields)) = paragraph_style(&event.style) {
        requests.push(Request::UpdateParagraphStyle {
            range: Range::shifted(event.start, event.end),
            paragraph_style,
            fields,
        });
    }
    if let Some((text_style, fields)) = text_style(&event.style) {
        requests.push(Request::UpdateTextStyle {
            range: Range::shifted(event.start, event.end),
            text_style,
            fields,
        });
    }
    requests
}

/// All style requests in event order.
pub fn build_style_requests(events: &[StyleEvent]) -> Vec<Request> {
    events.iter().flat_map(style_requests).collect()
}

/// Split requests into consecutive batches of at most `size` (minimum 1).
pub fn batches(requests: &[Request], size: usize) -> std::slice::Chunks<'_, Request> {
    requests.chunks(size.max(1))
}

/// Slots ordered highest offset first.
///
/// Inserting an inline image shifts everything after it, so going backwards
/// means every pending slot is still at its assembled offset.
pub fn image_insertion_order(slots: &[ImageSlot]) -> Vec<&ImageSlot> {
    let mut ordered: Vec<&ImageSlot> = slots.iter().collect();
    ordered.sort_by(|a, b| b.offset.cmp(&a.offset));
    ordered
}
