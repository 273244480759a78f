//! Text assembly for the weekly document.
//!
//! The whole document body is linearized into one [`TextBuffer`] in a single
//! pass. Every paragraph appended records a [`StyleEvent`] covering exactly the
//! units it added, and image placeholders additionally record an [`ImageSlot`].
//! Offsets are counted in UTF-16 code units because that is how the document
//! service addresses text.
//!
//! # Emission order
//!
//! 1. Title line
//! 2. Filming schedule (image position 0 after the first day)
//! 3. Dutch script (one image after the intro and after each section while URLs remain)
//! 4. English script (same structure, continuing the same image cursor)
//! 5. Editing guide
//! 6. Resources (each list only when non-empty)
//! 7. Reference link line

use chrono::NaiveDate;
use serde::Serialize;
use std::borrow::Cow;

use crate::models::{DayPlan, EditingGuide, Resources, ScriptBody, ScriptPackage};
use crate::utils::week_label;

pub const COLOR_NAVY: Rgb = Rgb(0x1A, 0x35, 0x69);
pub const COLOR_BURGUNDY: Rgb = Rgb(0x61, 0x1E, 0x1E);
pub const COLOR_GREEN: Rgb = Rgb(0x2D, 0x6A, 0x2D);
pub const COLOR_STEEL: Rgb = Rgb(0x1F, 0x5C, 0x99);
pub const COLOR_GREY: Rgb = Rgb(0x55, 0x55, 0x55);

/// Image list position reserved for the filming schedule.
pub const SCHEDULE_IMAGE_POSITION: usize = 0;

const BULLET: &str = "\u{2022}  ";

/// Named paragraph style tiers understood by the document service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum NamedStyle {
    #[serde(rename = "TITLE")]
    Title,
    #[serde(rename = "HEADING_1")]
    Heading1,
    #[serde(rename = "HEADING_2")]
    Heading2,
    #[serde(rename = "NORMAL_TEXT")]
    NormalText,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Alignment {
    Start,
    Center,
    Justified,
}

/// An sRGB colour with 0-255 channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb(pub u8, pub u8, pub u8);

/// Formatting attributes attached to a range.
///
/// Paragraph-level attributes are `named_style`, `alignment` and the two
/// spacings; the rest are character-level. Only attributes that are set end
/// up in a request, so unset ones never overwrite document defaults.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Style {
    pub named_style: Option<NamedStyle>,
    pub alignment: Option<Alignment>,
    pub space_above_pt: Option<u32>,
    pub space_below_pt: Option<u32>,
    pub color: Option<Rgb>,
    pub bold: bool,
    pub italic: bool,
    pub link_url: Option<String>,
}

impl Style {
    pub fn has_paragraph_attributes(&self) -> bool {
        self.named_style.is_some()
            || self.alignment.is_some()
            || self.space_above_pt.is_some()
            || self.space_below_pt.is_some()
    }

    pub fn has_text_attributes(&self) -> bool {
        self.color.is_some() || self.bold || self.italic || self.link_url.is_some()
    }

    fn title() -> Self {
        Style {
            named_style: Some(NamedStyle::Title),
            alignment: Some(Alignment::Center),
            space_below_pt: Some(10),
            ..Style::default()
        }
    }

    fn heading1(color: Rgb) -> Self {
        Style {
            named_style: Some(NamedStyle::Heading1),
            alignment: Some(Alignment::Start),
            space_above_pt: Some(20),
            space_below_pt: Some(6),
            color: Some(color),
            ..Style::default()
        }
    }

    fn heading2(color: Rgb) -> Self {
        Style {
            named_style: Some(NamedStyle::Heading2),
            alignment: Some(Alignment::Start),
            space_above_pt: Some(16),
            space_below_pt: Some(4),
            color: Some(color),
            ..Style::default()
        }
    }

    fn body() -> Self {
        Style {
            named_style: Some(NamedStyle::NormalText),
            alignment: Some(Alignment::Justified),
            space_below_pt: Some(8),
            ..Style::default()
        }
    }

    fn note() -> Self {
        Style {
            italic: true,
            color: Some(COLOR_GREY),
            ..Style::body()
        }
    }

    fn image() -> Self {
        Style {
            named_style: Some(NamedStyle::NormalText),
            alignment: Some(Alignment::Center),
            space_above_pt: Some(10),
            space_below_pt: Some(14),
            ..Style::default()
        }
    }

    fn link(url: &str) -> Self {
        Style {
            named_style: Some(NamedStyle::NormalText),
            space_below_pt: Some(18),
            color: Some(COLOR_STEEL),
            italic: true,
            link_url: Some(url.to_string()),
            ..Style::default()
        }
    }
}

/// A half-open `[start, end)` range of the buffer with its formatting.
#[derive(Debug, Clone, PartialEq)]
pub struct StyleEvent {
    pub start: usize,
    pub end: usize,
    pub style: Style,
}

/// Where an inline image goes: the offset of its empty placeholder paragraph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageSlot {
    pub offset: usize,
    pub url: String,
}

/// Append-only text with its length tracked in UTF-16 code units.
#[derive(Debug, Default)]
pub struct TextBuffer {
    text: String,
    units: usize,
}

impl TextBuffer {
    /// Current length, which is the offset the next fragment will start at.
    pub fn len(&self) -> usize {
        self.units
    }

    /// Append a fragment in the form the document service will store it.
    pub fn push(&mut self, fragment: &str) {
        let fragment = inserted_form(fragment);
        self.units += fragment.encode_utf16().count();
        self.text.push_str(&fragment);
    }

    pub fn into_string(self) -> String {
        self.text
    }
}

/// Control characters dropped by the document service on insert. `\t`, `\n`
/// and `\u{b}` survive.
fn is_stripped(c: char) -> bool {
    matches!(c, '\u{0}'..='\u{8}' | '\u{c}'..='\u{1f}')
}

/// `\r\n` and lone `\r` become `\n`; other stripped characters are removed.
fn inserted_form(fragment: &str) -> Cow<'_, str> {
    if !fragment.chars().any(is_stripped) {
        return Cow::Borrowed(fragment);
    }
    let normalised = fragment.replace("\r\n", "\n").replace('\r', "\n");
    Cow::Owned(normalised.chars().filter(|&c| !is_stripped(c)).collect())
}

/// Position into `image_urls`, passed into each section renderer and handed
/// back advanced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImageCursor {
    position: usize,
}

impl ImageCursor {
    pub fn at(position: usize) -> Self {
        Self { position }
    }

    #[cfg(test)]
    pub fn position(self) -> usize {
        self.position
    }

    /// Consume the current position.
    ///
    /// A missing or blank URL yields `None` but still advances. Past the end
    /// of the list the cursor stays where it is.
    pub fn take(self, urls: &[Option<String>]) -> (Option<&str>, ImageCursor) {
        match urls.get(self.position) {
            Some(url) => {
                let url = url.as_deref().map(str::trim).filter(|u| !u.is_empty());
                (url, ImageCursor::at(self.position + 1))
            }
            None => (None, self),
        }
    }
}

/// The output of assembly: full text plus the events addressing it.
#[derive(Debug, Default)]
pub struct DocumentLayout {
    pub text: String,
    /// Length of `text` in UTF-16 code units.
    pub len: usize,
    pub events: Vec<StyleEvent>,
    pub slots: Vec<ImageSlot>,
}

#[derive(Debug, Default)]
struct LayoutWriter {
    buffer: TextBuffer,
    events: Vec<StyleEvent>,
    slots: Vec<ImageSlot>,
}

impl LayoutWriter {
    /// Append one line and record a single event covering it, newline included.
    fn paragraph(&mut self, content: &str, style: Style) -> usize {
        let start = self.buffer.len();
        self.buffer.push(content);
        self.buffer.push("\n");
        let end = self.buffer.len();
        self.events.push(StyleEvent { start, end, style });
        start
    }

    fn title(&mut self, text: &str) {
        self.paragraph(text, Style::title());
    }

    fn heading1(&mut self, text: &str) {
        self.paragraph(text, Style::heading1(COLOR_NAVY));
    }

    fn heading2(&mut self, text: &str, color: Rgb) {
        self.paragraph(text, Style::heading2(color));
    }

    fn body(&mut self, text: &str) {
        self.paragraph(text, Style::body());
    }

    fn note(&mut self, text: &str) {
        self.paragraph(text, Style::note());
    }

    fn bullet(&mut self, item: &str) {
        self.paragraph(&format!("{BULLET}{item}"), Style::body());
    }

    fn image_placeholder(&mut self, url: &str) {
        let offset = self.paragraph("", Style::image());
        self.slots.push(ImageSlot {
            offset,
            url: url.to_string(),
        });
    }

    fn link_line(&mut self, label: &str, url: &str) {
        self.paragraph(label, Style::link(url));
    }

    fn place_image(&mut self, urls: &[Option<String>], cursor: ImageCursor) -> ImageCursor {
        let (url, next) = cursor.take(urls);
        if let Some(url) = url {
            self.image_placeholder(url);
        }
        next
    }

    fn finish(self) -> DocumentLayout {
        let len = self.buffer.len();
        DocumentLayout {
            text: self.buffer.into_string(),
            len,
            events: self.events,
            slots: self.slots,
        }
    }
}

/// Title shared by the document itself and its first line.
pub fn document_title(channel_name: &str, week_start: NaiveDate, topic: &str) -> String {
    format!(
        "{channel_name} \u{2014} Week of {}: {topic}",
        week_label(week_start)
    )
}

/// Linearize a package into text, style events and image slots.
pub fn assemble(week_start: NaiveDate, package: &ScriptPackage, channel_name: &str) -> DocumentLayout {
    let mut writer = LayoutWriter::default();
    let urls = package.image_urls.as_slice();

    writer.title(&document_title(channel_name, week_start, &package.topic));

    let cursor = render_schedule(&mut writer, &package.shooting_plan, urls);
    let cursor = render_script(&mut writer, "Script \u{2014} Nederlands", &package.script_nl, urls, cursor);
    render_script(&mut writer, "Script \u{2014} English", &package.script_en, urls, cursor);

    render_editing_guide(&mut writer, &package.editing_guide);
    render_resources(&mut writer, &package.resources);

    if let Some(url) = package.wikipedia_url.as_deref().filter(|u| !u.trim().is_empty()) {
        writer.link_line(&format!("Wikipedia: {}", package.topic), url);
    }

    writer.finish()
}

fn render_schedule(writer: &mut LayoutWriter, plan: &[DayPlan], urls: &[Option<String>]) -> ImageCursor {
    writer.heading1("Filming Schedule");

    for (i, day) in plan.iter().enumerate() {
        let temp = day
            .weather
            .temp_c
            .map_or_else(|| "?".to_string(), |t| format!("{t:.1}\u{00b0}C"));
        writer.heading2(
            &format!(
                "{} {} \u{2014} {} \u{2014} {temp}",
                day.day, day.date, day.weather.condition
            ),
            COLOR_GREEN,
        );
        writer.body(&format!("Venue: {}", day.venue));
        writer.body(&format!(
            "Rain: {} mm  |  Recommended: {}",
            day.weather.rain_mm.unwrap_or(0.0),
            if day.recommended { "Yes" } else { "No" }
        ));

        if let Some(alt) = day.indoor_alternative.as_deref().filter(|a| !a.trim().is_empty()) {
            writer.note(&format!("Indoor alternative: {alt}"));
        }

        if !day.shots.is_empty() {
            writer.body("Suggested shots:");
            for shot in &day.shots {
                writer.bullet(shot);
            }
        }

        if i == 0 {
            writer.place_image(urls, ImageCursor::at(SCHEDULE_IMAGE_POSITION));
        }
    }

    ImageCursor::at(SCHEDULE_IMAGE_POSITION + 1)
}

fn render_script(
    writer: &mut LayoutWriter,
    label: &str,
    script: &ScriptBody,
    urls: &[Option<String>],
    mut cursor: ImageCursor,
) -> ImageCursor {
    writer.heading1(label);

    writer.heading2("Intro", COLOR_BURGUNDY);
    writer.body(&script.intro);
    cursor = writer.place_image(urls, cursor);

    for section in &script.sections {
        writer.heading2(&section.title, COLOR_BURGUNDY);
        if !section.location_notes.trim().is_empty() {
            writer.note(&format!("Locatie / Location: {}", section.location_notes));
        }
        writer.body(&section.commentary);
        cursor = writer.place_image(urls, cursor);
    }

    writer.heading2("Outro", COLOR_BURGUNDY);
    writer.body(&script.outro);
    cursor
}

fn render_editing_guide(writer: &mut LayoutWriter, guide: &EditingGuide) {
    writer.heading1("Editing Guide");

    writer.heading2("Structure", COLOR_BURGUNDY);
    writer.body(&guide.structure);

    writer.heading2("Transitions", COLOR_BURGUNDY);
    writer.body(&guide.transitions);

    if !guide.b_roll_suggestions.is_empty() {
        writer.heading2("B-Roll Suggestions", COLOR_BURGUNDY);
        for item in &guide.b_roll_suggestions {
            writer.bullet(item);
        }
    }

    writer.heading2("Music Timing", COLOR_BURGUNDY);
    writer.body(&guide.music_timing);
}

fn render_resources(writer: &mut LayoutWriter, resources: &Resources) {
    writer.heading1("Resources");

    let lists = [
        ("Where to Find Footage", &resources.footage_tips),
        ("Music Suggestions", &resources.music_suggestions),
        ("Quotes and Sources", &resources.quote_sources),
        ("Archives", &resources.archives),
    ];
    for (title, items) in lists {
        if items.is_empty() {
            continue;
        }
        writer.heading2(title, COLOR_BURGUNDY);
        for item in items {
            writer.bullet(item);
        }
    }
}
