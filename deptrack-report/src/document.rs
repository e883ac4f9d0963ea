//! In-memory document model, independent of the package format.

use chrono::{DateTime, Utc};

use crate::branding::BrandingImage;

pub const COLOR_ALERT: &str = "C00000";
pub const COLOR_MUTED: &str = "595959";
pub const COLOR_ACCENT: &str = "1F4E79";

/// Font sizes are in half-points, as WordprocessingML expects.
pub const SIZE_TITLE: u32 = 36;
pub const SIZE_HEADING: u32 = 28;
pub const SIZE_BANNER: u32 = 26;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Align {
    #[default]
    Left,
    Center,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Run {
    pub text: String,
    pub bold: bool,
    pub italic: bool,
    pub color: Option<&'static str>,
    pub size: Option<u32>,
    pub highlight: bool,
}

impl Run {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn bold(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            bold: true,
            ..Self::default()
        }
    }

    pub fn italic(mut self) -> Self {
        self.italic = true;
        self
    }

    pub fn color(mut self, color: &'static str) -> Self {
        self.color = Some(color);
        self
    }

    pub fn size(mut self, half_points: u32) -> Self {
        self.size = Some(half_points);
        self
    }

    pub fn highlighted(mut self) -> Self {
        self.highlight = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Paragraph {
    pub runs: Vec<Run>,
    pub align: Align,
    /// Indentation level; each level is half an inch.
    pub indent: u8,
    /// Extra space before the paragraph, in twentieths of a point.
    pub space_before: u32,
}

impl Paragraph {
    pub fn new(runs: Vec<Run>) -> Self {
        Self {
            runs,
            ..Self::default()
        }
    }

    pub fn centered(mut self) -> Self {
        self.align = Align::Center;
        self
    }

    pub fn indented(mut self, level: u8) -> Self {
        self.indent = level;
        self
    }

    pub fn spaced(mut self, before: u32) -> Self {
        self.space_before = before;
        self
    }

    pub fn text(&self) -> String {
        self.runs.iter().map(|r| r.text.as_str()).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    Image(BrandingImage),
    Paragraph(Paragraph),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub title: String,
    pub created: DateTime<Utc>,
    pub blocks: Vec<Block>,
}

impl Document {
    pub fn new(title: impl Into<String>, created: DateTime<Utc>) -> Self {
        Self {
            title: title.into(),
            created,
            blocks: Vec::new(),
        }
    }

    pub fn image(&mut self, image: BrandingImage) {
        self.blocks.push(Block::Image(image));
    }

    pub fn push(&mut self, paragraph: Paragraph) {
        self.blocks.push(Block::Paragraph(paragraph));
    }

    pub fn line(&mut self, text: impl Into<String>) {
        self.push(Paragraph::new(vec![Run::plain(text)]));
    }

    pub fn heading(&mut self, text: impl Into<String>) {
        self.push(
            Paragraph::new(vec![Run::bold(text).size(SIZE_HEADING).color(COLOR_ACCENT)]).spaced(240),
        );
    }

    /// "Label: value" with a bold label.
    pub fn field(&mut self, label: &str, value: impl Into<String>) {
        self.push(Paragraph::new(vec![
            Run::bold(format!("{label}: ")),
            Run::plain(value),
        ]));
    }

    pub fn bullet(&mut self, level: u8, mut runs: Vec<Run>) {
        runs.insert(0, Run::plain("\u{2022} "));
        self.push(Paragraph::new(runs).indented(level.max(1)));
    }

    /// Text of every block in order; images contribute an empty line.
    pub fn paragraph_texts(&self) -> Vec<String> {
        self.blocks
            .iter()
            .map(|b| match b {
                Block::Image(_) => String::new(),
                Block::Paragraph(p) => p.text(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn field_joins_label_and_value() {
        let mut doc = Document::new("t", Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap());
        doc.field("Priority", "High");
        doc.bullet(0, vec![Run::plain("Draft")]);
        assert_eq!(doc.paragraph_texts(), vec!["Priority: High", "\u{2022} Draft"]);
        match &doc.blocks[1] {
            Block::Paragraph(p) => assert_eq!(p.indent, 1),
            Block::Image(_) => panic!("expected paragraph"),
        }
    }
}
