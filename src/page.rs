use crate::error::FolioError;
use crate::types::{Color, FontStyle, Orientation, Size};

/// Resolved geometry of the page being written: the portrait-normalized
/// sheet size plus how it is turned.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct PageGeometry {
    pub(crate) orientation: Orientation,
    /// Portrait-normalized sheet size in user units.
    pub(crate) sheet: Size,
    pub(crate) rotation: i32,
}

impl PageGeometry {
    pub(crate) fn new(orientation: Orientation, sheet: Size) -> Self {
        Self {
            orientation,
            sheet,
            rotation: 0,
        }
    }

    /// Oriented page size in user units.
    pub(crate) fn user(&self) -> Size {
        match self.orientation {
            Orientation::Portrait => self.sheet,
            Orientation::Landscape => Size {
                width: self.sheet.height,
                height: self.sheet.width,
            },
        }
    }

    pub(crate) fn points(&self, k: f64) -> Size {
        let user = self.user();
        Size {
            width: user.width * k,
            height: user.height * k,
        }
    }
}

/// Current font selection and inter-word spacing.
#[derive(Debug, Clone)]
pub(crate) struct TextState {
    pub(crate) family: String,
    pub(crate) style: FontStyle,
    pub(crate) size_pt: f64,
    /// Registry index of the selected font.
    pub(crate) font: Option<usize>,
    pub(crate) word_spacing: f64,
}

impl Default for TextState {
    fn default() -> Self {
        Self {
            family: String::new(),
            style: FontStyle::REGULAR,
            size_pt: 12.0,
            font: None,
            word_spacing: 0.0,
        }
    }
}

/// Stroke, fill and text colors. `separate_fill` records that fill and text
/// differ, so text runs must switch the fill color around them.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ColorState {
    pub(crate) draw: Color,
    pub(crate) fill: Color,
    pub(crate) text: Color,
    pub(crate) separate_fill: bool,
}

impl Default for ColorState {
    fn default() -> Self {
        Self {
            draw: Color::BLACK,
            fill: Color::BLACK,
            text: Color::BLACK,
            separate_fill: false,
        }
    }
}

/// Destination of a link area: an external URI or a handle obtained from
/// [`crate::Document::add_link`].
#[derive(Debug, Clone, PartialEq)]
pub enum LinkTarget {
    Uri(String),
    Internal(usize),
}

impl From<&str> for LinkTarget {
    fn from(value: &str) -> Self {
        LinkTarget::Uri(value.to_string())
    }
}

impl From<String> for LinkTarget {
    fn from(value: String) -> Self {
        LinkTarget::Uri(value)
    }
}

impl From<usize> for LinkTarget {
    fn from(value: usize) -> Self {
        LinkTarget::Internal(value)
    }
}

/// Internal destinations, addressed by 1-based handle.
#[derive(Debug, Default)]
pub(crate) struct LinkTable {
    targets: Vec<(usize, f64)>,
}

impl LinkTable {
    pub(crate) fn add(&mut self) -> usize {
        self.targets.push((0, 0.0));
        self.targets.len()
    }

    pub(crate) fn set(&mut self, handle: usize, page: usize, y: f64) -> Result<(), FolioError> {
        let slot = handle
            .checked_sub(1)
            .and_then(|index| self.targets.get_mut(index))
            .ok_or(FolioError::UnknownLink(handle))?;
        *slot = (page, y);
        Ok(())
    }

    pub(crate) fn get(&self, handle: usize) -> Result<(usize, f64), FolioError> {
        handle
            .checked_sub(1)
            .and_then(|index| self.targets.get(index))
            .copied()
            .ok_or(FolioError::UnknownLink(handle))
    }
}

/// A clickable area on a page, in device points with y measured from the
/// page bottom.
#[derive(Debug, Clone)]
pub(crate) struct PageLink {
    pub(crate) x: f64,
    pub(crate) y: f64,
    pub(crate) width: f64,
    pub(crate) height: f64,
    pub(crate) target: LinkTarget,
}

/// One page under construction: its content stream plus the page-level
/// records the serializer needs. `size_pt` and `rotation` are only set when
/// they differ from the document defaults.
#[derive(Debug, Default)]
pub(crate) struct PageBuffer {
    pub(crate) content: Vec<u8>,
    pub(crate) links: Vec<PageLink>,
    pub(crate) size_pt: Option<Size>,
    pub(crate) rotation: Option<i32>,
}

impl PageBuffer {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Append one content-stream line, newline-terminated.
    pub(crate) fn append(&mut self, line: &[u8]) {
        self.content.extend_from_slice(line);
        self.content.push(b'\n');
    }
}

/// Replace every occurrence of `needle` in `haystack`.
pub(crate) fn replace_all(haystack: &[u8], needle: &[u8], replacement: &[u8]) -> Vec<u8> {
    if needle.is_empty() {
        return haystack.to_vec();
    }
    let mut out = Vec::with_capacity(haystack.len());
    let mut rest = haystack;
    while let Some(pos) = rest.windows(needle.len()).position(|window| window == needle) {
        out.extend_from_slice(&rest[..pos]);
        out.extend_from_slice(replacement);
        rest = &rest[pos + needle.len()..];
    }
    out.extend_from_slice(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn geometry_orients_sheet() {
        let a4 = Size {
            width: 210.0,
            height: 297.0,
        };
        let portrait = PageGeometry::new(Orientation::Portrait, a4);
        assert_eq!(portrait.user().width, 210.0);
        let landscape = PageGeometry::new(Orientation::Landscape, a4);
        assert_eq!(landscape.user().width, 297.0);
        assert_eq!(landscape.user().height, 210.0);

        let points = portrait.points(72.0 / 25.4);
        assert!((points.width - 595.275_590_551).abs() < 1e-6);
    }

    #[test]
    fn link_handles_are_one_based() {
        let mut table = LinkTable::default();
        let first = table.add();
        let second = table.add();
        assert_eq!(first, 1);
        assert_eq!(second, 2);

        table.set(first, 3, 40.5).unwrap();
        assert_eq!(table.get(first).unwrap(), (3, 40.5));
        assert_eq!(table.get(second).unwrap(), (0, 0.0));

        let err = table.set(0, 1, 0.0).expect_err("zero handle");
        assert!(err.to_string().contains("unknown link handle"));
        assert!(table.get(9).is_err());
    }

    #[test]
    fn link_target_conversions() {
        assert_eq!(
            LinkTarget::from("https://example.org"),
            LinkTarget::Uri("https://example.org".to_string())
        );
        assert_eq!(LinkTarget::from(2usize), LinkTarget::Internal(2));
    }

    #[test]
    fn page_buffer_appends_lines() {
        let mut page = PageBuffer::new();
        page.append(b"BT");
        page.append(b"ET");
        assert_eq!(page.content, b"BT\nET\n");
    }

    #[test]
    fn replace_all_handles_every_case() {
        assert_eq!(replace_all(b"a{nb}b{nb}", b"{nb}", b"12"), b"a12b12");
        assert_eq!(replace_all(b"plain", b"{nb}", b"12"), b"plain");
        assert_eq!(replace_all(b"x{nb}", b"{nb}", b""), b"x");
        assert_eq!(replace_all(b"", b"{nb}", b"12"), b"");
    }
}
