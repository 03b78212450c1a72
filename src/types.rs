/// Measurement unit for all user-space coordinates. The scale factor converts
/// one user unit into PostScript points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unit {
    Pt,
    Mm,
    Cm,
    In,
}

impl Unit {
    pub fn scale(self) -> f64 {
        match self {
            Unit::Pt => 1.0,
            Unit::Mm => 72.0 / 25.4,
            Unit::Cm => 72.0 / 2.54,
            Unit::In => 72.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    Portrait,
    Landscape,
}

/// Page size in user units, always stored portrait-ordered (width <= height).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    pub(crate) fn normalized(self) -> Self {
        if self.width > self.height {
            Self {
                width: self.height,
                height: self.width,
            }
        } else {
            self
        }
    }
}

/// Standard page formats carry their dimensions in points; `Custom` is given
/// in user units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PageFormat {
    A3,
    A4,
    A5,
    Letter,
    Legal,
    Custom(Size),
}

impl PageFormat {
    /// Resolve to a portrait-ordered size in user units.
    pub(crate) fn size(self, k: f64) -> Size {
        let (w_pt, h_pt) = match self {
            PageFormat::A3 => (841.89, 1190.55),
            PageFormat::A4 => (595.28, 841.89),
            PageFormat::A5 => (420.94, 595.28),
            PageFormat::Letter => (612.0, 792.0),
            PageFormat::Legal => (612.0, 1008.0),
            PageFormat::Custom(size) => return size.normalized(),
        };
        Size {
            width: w_pt / k,
            height: h_pt / k,
        }
    }
}

/// Device color. Inputs are 0-255 component levels; they are emitted as
/// normalized 3-decimal operands (`G`/`RG` for strokes, `g`/`rg` for fills).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Color {
    Gray(u8),
    Rgb(u8, u8, u8),
}

impl Color {
    pub const BLACK: Color = Color::Gray(0);

    pub fn rgb(r: u8, g: u8, b: u8) -> Self {
        Color::Rgb(r, g, b)
    }

    pub fn gray(level: u8) -> Self {
        Color::Gray(level)
    }

    pub(crate) fn stroke_op(self) -> String {
        match self {
            Color::Gray(level) => format!("{:.3} G", f64::from(level) / 255.0),
            Color::Rgb(r, g, b) => format!(
                "{:.3} {:.3} {:.3} RG",
                f64::from(r) / 255.0,
                f64::from(g) / 255.0,
                f64::from(b) / 255.0
            ),
        }
    }

    pub(crate) fn fill_op(self) -> String {
        match self {
            Color::Gray(level) => format!("{:.3} g", f64::from(level) / 255.0),
            Color::Rgb(r, g, b) => format!(
                "{:.3} {:.3} {:.3} rg",
                f64::from(r) / 255.0,
                f64::from(g) / 255.0,
                f64::from(b) / 255.0
            ),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Align {
    #[default]
    Left,
    Center,
    Right,
    Justify,
}

/// Cell border selection. `Frame` draws one rectangle; `Edges` draws each
/// requested side as its own segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Border {
    None,
    Frame,
    Edges {
        left: bool,
        top: bool,
        right: bool,
        bottom: bool,
    },
}

impl Border {
    pub(crate) fn any(self) -> bool {
        !matches!(self, Border::None)
    }
}

/// Rendering mode for a standalone rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RectStyle {
    #[default]
    Draw,
    Fill,
    FillDraw,
}

/// Cursor movement after a cell is drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CellAdvance {
    /// Cursor moves to the right edge of the cell.
    #[default]
    Right,
    /// Cursor moves below the cell, back at the left margin.
    NextLine,
    /// Cursor moves below the cell, keeping its x position.
    Below,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FontStyle {
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
}

impl FontStyle {
    pub const REGULAR: FontStyle = FontStyle {
        bold: false,
        italic: false,
        underline: false,
    };
    pub const BOLD: FontStyle = FontStyle {
        bold: true,
        italic: false,
        underline: false,
    };
    pub const ITALIC: FontStyle = FontStyle {
        bold: false,
        italic: true,
        underline: false,
    };
    pub const BOLD_ITALIC: FontStyle = FontStyle {
        bold: true,
        italic: true,
        underline: false,
    };

    pub fn underlined(mut self) -> Self {
        self.underline = true;
        self
    }

    /// Registry key suffix; underline is a rendering attribute, not a face.
    pub(crate) fn suffix(self) -> &'static str {
        match (self.bold, self.italic) {
            (false, false) => "",
            (true, false) => "B",
            (false, true) => "I",
            (true, true) => "BI",
        }
    }
}

/// Initial viewer zoom, recorded in the catalog's open action.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ZoomMode {
    Fullpage,
    Fullwidth,
    Real,
    Default,
    Percent(f64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageLayout {
    Single,
    Continuous,
    Two,
    Default,
}

/// Document information entries, emitted into the Info dictionary in
/// insertion order.
#[derive(Debug, Clone, Default)]
pub struct Metadata {
    entries: Vec<(String, String)>,
}

impl Metadata {
    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        let value = value.into();
        for entry in &mut self.entries {
            if entry.0 == key {
                entry.1 = value;
                return;
            }
        }
        self.entries.push((key.to_string(), value));
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Construction-time settings. Everything else is adjusted through setters on
/// the live document.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DocumentOptions {
    pub orientation: Orientation,
    pub unit: Unit,
    pub format: PageFormat,
}

impl Default for DocumentOptions {
    fn default() -> Self {
        Self {
            orientation: Orientation::Portrait,
            unit: Unit::Mm,
            format: PageFormat::A4,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_scale_factors() {
        assert_eq!(Unit::Pt.scale(), 1.0);
        assert!((Unit::Mm.scale() - 2.834_645_669_291_339).abs() < 1e-12);
        assert!((Unit::Cm.scale() - 28.346_456_692_913_385).abs() < 1e-12);
        assert_eq!(Unit::In.scale(), 72.0);
    }

    #[test]
    fn format_resolves_in_user_units() {
        let a4 = PageFormat::A4.size(1.0);
        assert_eq!(a4.width, 595.28);
        assert_eq!(a4.height, 841.89);

        let a4_mm = PageFormat::A4.size(Unit::Mm.scale());
        assert!((a4_mm.width - 210.0).abs() < 0.01);
        assert!((a4_mm.height - 297.0).abs() < 0.01);
    }

    #[test]
    fn custom_format_normalizes_orientation() {
        let size = PageFormat::Custom(Size::new(300.0, 200.0)).size(1.0);
        assert_eq!(size.width, 200.0);
        assert_eq!(size.height, 300.0);
    }

    #[test]
    fn color_operator_strings() {
        assert_eq!(Color::rgb(0, 0, 0).stroke_op(), "0.000 0.000 0.000 RG");
        assert_eq!(Color::rgb(255, 0, 0).fill_op(), "1.000 0.000 0.000 rg");
        assert_eq!(Color::gray(128).fill_op(), "0.502 g");
        assert_eq!(Color::gray(0).stroke_op(), "0.000 G");
    }

    #[test]
    fn style_suffix_ignores_underline() {
        assert_eq!(FontStyle::BOLD.suffix(), "B");
        assert_eq!(FontStyle::BOLD.underlined().suffix(), "B");
        assert_eq!(FontStyle::BOLD_ITALIC.suffix(), "BI");
        assert_eq!(FontStyle::REGULAR.suffix(), "");
    }

    #[test]
    fn metadata_upserts_in_place() {
        let mut meta = Metadata::default();
        meta.set("Title", "one");
        meta.set("Author", "me");
        meta.set("Title", "two");
        let collected: Vec<_> = meta.entries().collect();
        assert_eq!(collected, vec![("Title", "two"), ("Author", "me")]);
    }
}
