//! Font handling for the report renderer.
//!
//! Reports use the PDF base-14 Helvetica family, which every viewer ships, so
//! no font files have to be bundled or embedded. Base-14 fonts come without
//! metrics in `printpdf`, so text widths are estimated from the Helvetica AFM
//! advance widths below. The regular table is used for every face; bold glyphs
//! are slightly wider, which only affects centring by a fraction of a
//! millimetre.

use printpdf::{BuiltinFont, IndirectFontRef, PdfDocumentReference};

use crate::error::ReportError;
use crate::richtext::FontStyle;

/// Name of the font family used for all text.
pub const DEFAULT_FONT_FAMILY_NAME: &str = "Helvetica";

const MM_PER_POINT: f64 = 25.4 / 72.0;

/// Fallback advance for characters outside printable ASCII.
const DEFAULT_ADVANCE: u16 = 556;

/// Helvetica advance widths (1/1000 em) for ASCII 32..=126.
const HELVETICA_WIDTHS: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, // ' '..'/'
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, // '0'..'9'
    278, 278, 584, 584, 584, 556, 1015, // ':'..'@'
    667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, // 'A'..'M'
    722, 778, 667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, // 'N'..'Z'
    278, 278, 278, 469, 556, 333, // '['..'`'
    556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, // 'a'..'m'
    556, 556, 556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, // 'n'..'z'
    334, 260, 334, 584, // '{'..'~'
];

fn advance(ch: char) -> u16 {
    let code = ch as u32;
    if (32..=126).contains(&code) {
        HELVETICA_WIDTHS[(code - 32) as usize]
    } else {
        DEFAULT_ADVANCE
    }
}

/// Estimated width of `text` set at `font_size_pt`, in millimetres.
pub fn text_width_mm(text: &str, font_size_pt: f64) -> f64 {
    let units: u32 = text.chars().map(|ch| u32::from(advance(ch))).sum();
    f64::from(units) / 1000.0 * font_size_pt * MM_PER_POINT
}

/// The four Helvetica faces registered with a PDF document.
pub struct FontSet {
    regular: IndirectFontRef,
    bold: IndirectFontRef,
    italic: IndirectFontRef,
    bold_italic: IndirectFontRef,
}

impl FontSet {
    /// Registers the built-in Helvetica faces with `document`.
    pub fn install(document: &PdfDocumentReference) -> Result<Self, ReportError> {
        let load = |font: BuiltinFont| {
            document.add_builtin_font(font).map_err(|err| {
                ReportError::Render(format!(
                    "failed to register {} font: {}",
                    DEFAULT_FONT_FAMILY_NAME, err
                ))
            })
        };
        Ok(Self {
            regular: load(BuiltinFont::Helvetica)?,
            bold: load(BuiltinFont::HelveticaBold)?,
            italic: load(BuiltinFont::HelveticaOblique)?,
            bold_italic: load(BuiltinFont::HelveticaBoldOblique)?,
        })
    }

    /// Face matching `style`.
    pub fn get(&self, style: FontStyle) -> &IndirectFontRef {
        match style {
            FontStyle::Regular => &self.regular,
            FontStyle::Bold => &self.bold,
            FontStyle::Italic => &self.italic,
            FontStyle::BoldItalic => &self.bold_italic,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn width_scales_with_size_and_length() {
        let narrow = text_width_mm("il", 10.0);
        let wide = text_width_mm("WM", 10.0);
        assert!(wide > narrow);
        let single = text_width_mm("Page 1 of 3", 8.0);
        let double = text_width_mm("Page 1 of 3", 16.0);
        assert!((double - 2.0 * single).abs() < 1e-9);
    }

    #[test]
    fn digits_share_one_advance() {
        assert_eq!(text_width_mm("0", 12.0), text_width_mm("8", 12.0));
        // 556/1000 em at 72pt is 0.556 inch.
        assert!((text_width_mm("5", 72.0) - 0.556 * 25.4).abs() < 1e-9);
    }

    #[test]
    fn non_ascii_falls_back_to_default_advance() {
        assert_eq!(text_width_mm("é", 10.0), text_width_mm("5", 10.0));
    }
}
