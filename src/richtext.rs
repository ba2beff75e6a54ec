//! Styled text fragments used by title and paragraph blocks.
//!
//! A [`Span`] is a run of text with a font weight/slant and an optional colour.
//! Spans carry no geometry; they are measured by [`crate::fonts`] and placed by
//! the layout engine.

use std::fmt;

use serde::Deserialize;

/// An sRGB colour with 8-bit channels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Deserialize)]
pub struct Color(pub u8, pub u8, pub u8);

impl Color {
    /// Default text colour.
    pub const BLACK: Color = Color(0, 0, 0);
    /// Capture background and page colour.
    pub const WHITE: Color = Color(255, 255, 255);
    /// Footer and placeholder text.
    pub const GREY: Color = Color(128, 128, 128);
    /// Variance above budget.
    pub const RED: Color = Color(255, 0, 0);
    /// Variance below budget.
    pub const GREEN: Color = Color(0, 128, 0);

    /// Channels as fractions in `0.0..=1.0`, the form PDF colour operators expect.
    pub fn to_unit(self) -> (f64, f64, f64) {
        (
            f64::from(self.0) / 255.0,
            f64::from(self.1) / 255.0,
            f64::from(self.2) / 255.0,
        )
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.0, self.1, self.2)
    }
}

/// Weight/slant combination; maps onto one face of the Helvetica family.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum FontStyle {
    /// Upright regular face.
    #[default]
    Regular,
    /// Upright bold face.
    Bold,
    /// Oblique regular face.
    Italic,
    /// Oblique bold face.
    BoldItalic,
}

/// A slice of text together with inline style attributes.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Span {
    text: String,
    bold: bool,
    italic: bool,
    color: Option<Color>,
}

impl Span {
    /// Creates a new span with the provided text and no styles applied.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    /// Returns the raw text contained in this span.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Returns the configured color for the span, if any.
    pub fn color(&self) -> Option<Color> {
        self.color
    }

    /// Face used to draw this span.
    pub fn font_style(&self) -> FontStyle {
        match (self.bold, self.italic) {
            (false, false) => FontStyle::Regular,
            (true, false) => FontStyle::Bold,
            (false, true) => FontStyle::Italic,
            (true, true) => FontStyle::BoldItalic,
        }
    }

    /// Convenience shorthand that marks the span as bold.
    pub fn bold(mut self) -> Self {
        self.bold = true;
        self
    }

    /// Convenience shorthand that marks the span as italic.
    pub fn italic(mut self) -> Self {
        self.italic = true;
        self
    }

    /// Convenience shorthand that assigns a color to the span.
    pub fn colored(mut self, color: Color) -> Self {
        self.color = Some(color);
        self
    }
}

impl From<&str> for Span {
    fn from(text: &str) -> Self {
        Span::new(text)
    }
}

impl From<String> for Span {
    fn from(text: String) -> Self {
        Span::new(text)
    }
}

/// One line of text made of consecutive spans at a common font size.
#[derive(Clone, Debug, PartialEq)]
pub struct TextLine {
    spans: Vec<Span>,
    font_size_pt: f64,
}

impl TextLine {
    /// Creates a line from spans.
    pub fn new(spans: impl Into<Vec<Span>>, font_size_pt: f64) -> Self {
        Self {
            spans: spans.into(),
            font_size_pt,
        }
    }

    /// Creates a line holding a single span.
    pub fn single(span: impl Into<Span>, font_size_pt: f64) -> Self {
        Self::new(vec![span.into()], font_size_pt)
    }

    /// Spans that make up the line.
    pub fn spans(&self) -> &[Span] {
        &self.spans
    }

    /// Font size shared by all spans of the line.
    pub fn font_size_pt(&self) -> f64 {
        self.font_size_pt
    }

    /// Concatenated text of every span.
    pub fn plain_text(&self) -> String {
        self.spans.iter().map(Span::text).collect()
    }
}
