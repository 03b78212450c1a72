use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::core_fonts;
use crate::error::FolioError;
use crate::font::{FontDef, FontRegistry, encode_cp1252, text_width_units, truetype_def};
use crate::image::{self, ImageFormat, ImageRegistry};
use crate::page::{
    ColorState, LinkTable, LinkTarget, PageBuffer, PageGeometry, PageLink, TextState,
};
use crate::pdf::{self, escape_text};
use crate::types::{
    Align, Border, CellAdvance, Color, DocumentOptions, FontStyle, Metadata, Orientation,
    PageFormat, PageLayout, RectStyle, ZoomMode,
};

/// Where the document is in its life cycle. Content can only be emitted
/// while a page is open; a sealed document only hands out its bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DocState {
    Uninitialized,
    PageClosed,
    PageOpen,
    Sealed,
}

type PageHook = Box<dyn FnMut(&mut Document) -> Result<(), FolioError>>;

/// Single-pass PDF builder. Pages are filled top to bottom through cell,
/// text and image placements, then the whole document is sealed into its
/// final byte form by [`Document::output`].
pub struct Document {
    state: DocState,
    pub(crate) pages: Vec<PageBuffer>,
    page: usize,
    pub(crate) fonts: FontRegistry,
    pub(crate) images: ImageRegistry,
    pub(crate) links: LinkTable,
    /// User-unit to point scale factor.
    pub(crate) k: f64,
    pub(crate) default_geometry: PageGeometry,
    geometry: PageGeometry,
    /// Current page size in user units.
    w: f64,
    h: f64,
    x: f64,
    y: f64,
    last_height: f64,
    left_margin: f64,
    top_margin: f64,
    right_margin: f64,
    bottom_margin: f64,
    /// Interior cell padding.
    cell_margin: f64,
    line_width: f64,
    auto_page_break: bool,
    page_break_trigger: f64,
    in_header: bool,
    in_footer: bool,
    text: TextState,
    colors: ColorState,
    pub(crate) compress: bool,
    pub(crate) pdf_version: String,
    pub(crate) zoom: ZoomMode,
    pub(crate) layout: PageLayout,
    pub(crate) metadata: Metadata,
    pub(crate) alias_nb_pages: Option<String>,
    pub(crate) with_alpha: bool,
    creation_date: Option<u64>,
    buffer: Option<Vec<u8>>,
    header_hook: Option<PageHook>,
    footer_hook: Option<PageHook>,
}

impl Document {
    pub fn new(options: DocumentOptions) -> Self {
        let k = options.unit.scale();
        let sheet = options.format.size(k);
        let geometry = PageGeometry::new(options.orientation, sheet);
        let user = geometry.user();
        let margin = 28.35 / k;
        let mut metadata = Metadata::default();
        metadata.set("Producer", concat!("folio ", env!("CARGO_PKG_VERSION")));
        let mut doc = Self {
            state: DocState::Uninitialized,
            pages: Vec::new(),
            page: 0,
            fonts: FontRegistry::new(),
            images: ImageRegistry::new(),
            links: LinkTable::default(),
            k,
            default_geometry: geometry,
            geometry,
            w: user.width,
            h: user.height,
            x: 0.0,
            y: 0.0,
            last_height: 0.0,
            left_margin: 0.0,
            top_margin: 0.0,
            right_margin: 0.0,
            bottom_margin: 0.0,
            cell_margin: margin / 10.0,
            line_width: 0.567 / k,
            auto_page_break: true,
            page_break_trigger: 0.0,
            in_header: false,
            in_footer: false,
            text: TextState::default(),
            colors: ColorState::default(),
            compress: true,
            pdf_version: String::from("1.3"),
            zoom: ZoomMode::Default,
            layout: PageLayout::Default,
            metadata,
            alias_nb_pages: None,
            with_alpha: false,
            creation_date: None,
            buffer: None,
            header_hook: None,
            footer_hook: None,
        };
        doc.set_margins(margin, margin, None);
        doc.set_auto_page_break(true, 2.0 * margin);
        doc
    }

    // Margins and page breaks

    /// Sets the left, top and right margins. The right margin defaults to
    /// the left one.
    pub fn set_margins(&mut self, left: f64, top: f64, right: Option<f64>) {
        self.left_margin = left;
        self.top_margin = top;
        self.right_margin = right.unwrap_or(left);
    }

    pub fn set_left_margin(&mut self, margin: f64) {
        self.left_margin = margin;
        if self.page > 0 && self.x < margin {
            self.x = margin;
        }
    }

    pub fn set_top_margin(&mut self, margin: f64) {
        self.top_margin = margin;
    }

    pub fn set_right_margin(&mut self, margin: f64) {
        self.right_margin = margin;
    }

    /// Enables or disables automatic page breaks, triggered at `margin`
    /// from the bottom of the page.
    pub fn set_auto_page_break(&mut self, auto: bool, margin: f64) {
        self.auto_page_break = auto;
        self.bottom_margin = margin;
        self.page_break_trigger = self.h - margin;
    }

    // Viewer preferences and output options

    pub fn set_display_mode(&mut self, zoom: ZoomMode, layout: PageLayout) {
        self.zoom = zoom;
        self.layout = layout;
    }

    pub fn set_compression(&mut self, compress: bool) {
        self.compress = compress;
    }

    pub fn set_title(&mut self, title: &str) {
        self.metadata.set("Title", title);
    }

    pub fn set_author(&mut self, author: &str) {
        self.metadata.set("Author", author);
    }

    pub fn set_subject(&mut self, subject: &str) {
        self.metadata.set("Subject", subject);
    }

    pub fn set_keywords(&mut self, keywords: &str) {
        self.metadata.set("Keywords", keywords);
    }

    pub fn set_creator(&mut self, creator: &str) {
        self.metadata.set("Creator", creator);
    }

    /// Fixes the creation date to an epoch timestamp instead of the clock
    /// reading taken when the document is closed.
    pub fn set_creation_date(&mut self, epoch_seconds: u64) {
        self.creation_date = Some(epoch_seconds);
    }

    /// Defines the placeholder replaced by the total page count when the
    /// document is serialized. `{nb}` is the conventional choice.
    pub fn alias_nb_pages(&mut self, alias: &str) {
        self.alias_nb_pages = Some(alias.to_string());
    }

    // Page life cycle

    /// Starts a new page with the document defaults.
    pub fn add_page(&mut self) -> Result<(), FolioError> {
        self.add_page_with(None, None, 0)
    }

    /// Starts a new page, optionally overriding the orientation and format
    /// and turning the page by a multiple of 90 degrees. The footer of the
    /// previous page and the header of the new one run in between, and the
    /// font, line width and colors carry over.
    pub fn add_page_with(
        &mut self,
        orientation: Option<Orientation>,
        format: Option<PageFormat>,
        rotation: i32,
    ) -> Result<(), FolioError> {
        if self.state == DocState::Sealed {
            return Err(FolioError::DocumentClosed);
        }
        let family = self.text.family.clone();
        let style = self.text.style;
        let size_pt = self.text.size_pt;
        let line_width = self.line_width;
        let draw = self.colors.draw;
        let fill = self.colors.fill;
        let text_color = self.colors.text;
        let separate_fill = self.colors.separate_fill;
        if self.page > 0 {
            self.run_footer()?;
            self.end_page();
        }
        self.begin_page(orientation, format, rotation)?;
        // Square line caps
        self.out("2 J")?;
        self.line_width = line_width;
        self.out(&format!("{:.2} w", line_width * self.k))?;
        if !family.is_empty() {
            self.set_font(&family, style, size_pt)?;
        }
        self.colors.draw = draw;
        if draw != Color::BLACK {
            self.out(&draw.stroke_op())?;
        }
        self.colors.fill = fill;
        if fill != Color::BLACK {
            self.out(&fill.fill_op())?;
        }
        self.colors.text = text_color;
        self.colors.separate_fill = separate_fill;
        self.run_header()?;
        if self.line_width != line_width {
            self.line_width = line_width;
            self.out(&format!("{:.2} w", line_width * self.k))?;
        }
        if !family.is_empty() {
            self.set_font(&family, style, size_pt)?;
        }
        if self.colors.draw != draw {
            self.colors.draw = draw;
            self.out(&draw.stroke_op())?;
        }
        if self.colors.fill != fill {
            self.colors.fill = fill;
            self.out(&fill.fill_op())?;
        }
        self.colors.text = text_color;
        self.colors.separate_fill = separate_fill;
        Ok(())
    }

    pub fn page_no(&self) -> usize {
        self.page
    }

    /// Current page width in user units.
    pub fn page_width(&self) -> f64 {
        self.w
    }

    /// Current page height in user units.
    pub fn page_height(&self) -> f64 {
        self.h
    }

    /// Whether an automatic page break may happen at the current position.
    pub fn accept_page_break(&self) -> bool {
        self.auto_page_break
    }

    /// Installs a hook that runs at the top of every page. Breaks are
    /// suspended while it draws.
    pub fn set_header(
        &mut self,
        hook: impl FnMut(&mut Document) -> Result<(), FolioError> + 'static,
    ) {
        self.header_hook = Some(Box::new(hook));
    }

    /// Installs a hook that runs at the bottom of every page, right before
    /// it is closed.
    pub fn set_footer(
        &mut self,
        hook: impl FnMut(&mut Document) -> Result<(), FolioError> + 'static,
    ) {
        self.footer_hook = Some(Box::new(hook));
    }

    // Colors and line style

    pub fn set_draw_color(&mut self, color: Color) -> Result<(), FolioError> {
        self.colors.draw = color;
        if self.page > 0 {
            self.out(&color.stroke_op())?;
        }
        Ok(())
    }

    pub fn set_fill_color(&mut self, color: Color) -> Result<(), FolioError> {
        self.colors.fill = color;
        self.colors.separate_fill = self.colors.fill != self.colors.text;
        if self.page > 0 {
            self.out(&color.fill_op())?;
        }
        Ok(())
    }

    /// The text color is not written until text is drawn, so this never
    /// touches the page stream.
    pub fn set_text_color(&mut self, color: Color) {
        self.colors.text = color;
        self.colors.separate_fill = self.colors.fill != self.colors.text;
    }

    pub fn set_line_width(&mut self, width: f64) -> Result<(), FolioError> {
        self.line_width = width;
        if self.page > 0 {
            self.out(&format!("{:.2} w", width * self.k))?;
        }
        Ok(())
    }

    // Measuring and primitives

    /// Width of a string in user units, using the current font.
    pub fn get_string_width(&self, text: &str) -> Result<f64, FolioError> {
        self.string_width(&encode_cp1252(text))
    }

    pub fn line(&mut self, x1: f64, y1: f64, x2: f64, y2: f64) -> Result<(), FolioError> {
        let k = self.k;
        self.out(&format!(
            "{:.2} {:.2} m {:.2} {:.2} l S",
            x1 * k,
            (self.h - y1) * k,
            x2 * k,
            (self.h - y2) * k
        ))
    }

    pub fn rect(
        &mut self,
        x: f64,
        y: f64,
        w: f64,
        h: f64,
        style: RectStyle,
    ) -> Result<(), FolioError> {
        let op = match style {
            RectStyle::Fill => "f",
            RectStyle::FillDraw => "B",
            RectStyle::Draw => "S",
        };
        let k = self.k;
        self.out(&format!(
            "{:.2} {:.2} {:.2} {:.2} re {}",
            x * k,
            (self.h - y) * k,
            w * k,
            -h * k,
            op
        ))
    }

    // Fonts

    /// Registers a font under a family and style key. The first definition
    /// of a key wins.
    pub fn add_font(&mut self, family: &str, style: FontStyle, def: FontDef) {
        let family = family.to_lowercase();
        let key = format!("{}{}", family, style.suffix());
        self.fonts.register(key, def);
    }

    /// Registers a TrueType font from raw bytes and embeds its program.
    pub fn add_truetype_font(
        &mut self,
        family: &str,
        style: FontStyle,
        data: &[u8],
    ) -> Result<(), FolioError> {
        let def = truetype_def(data, Some(family))?;
        self.add_font(family, style, def);
        Ok(())
    }

    /// Selects a font. An empty family keeps the current one, a size of
    /// zero keeps the current size, and `arial` is an alias for
    /// `helvetica`. Built-in families are registered on first use.
    pub fn set_font(
        &mut self,
        family: &str,
        style: FontStyle,
        size: f64,
    ) -> Result<(), FolioError> {
        let mut family = if family.is_empty() {
            self.text.family.clone()
        } else {
            family.to_lowercase()
        };
        let mut style = style;
        self.text.style.underline = style.underline;
        let size = if size == 0.0 { self.text.size_pt } else { size };
        if self.text.family == family
            && self.text.style.bold == style.bold
            && self.text.style.italic == style.italic
            && self.text.size_pt == size
        {
            return Ok(());
        }
        let mut index = self.fonts.find(&format!("{}{}", family, style.suffix()));
        if index.is_none() {
            if family == "arial" {
                family = String::from("helvetica");
            }
            if core_fonts::is_core_family(&family) {
                if family == "symbol" || family == "zapfdingbats" {
                    style.bold = false;
                    style.italic = false;
                }
                index = self.fonts.find(&format!("{}{}", family, style.suffix()));
                if index.is_none() {
                    index = self.fonts.ensure_core(&family, style.suffix());
                }
            }
        }
        let index = match index {
            Some(index) => index,
            None => {
                return Err(FolioError::UndefinedFont(format!(
                    "{} {}",
                    family,
                    style.suffix()
                )));
            }
        };
        self.text.family = family;
        self.text.style.bold = style.bold;
        self.text.style.italic = style.italic;
        self.text.size_pt = size;
        self.text.font = Some(index);
        if self.page > 0 {
            self.out(&format!("BT /F{} {:.2} Tf ET", index + 1, size))?;
        }
        Ok(())
    }

    /// Changes the size of the current font, in points.
    pub fn set_font_size(&mut self, size: f64) -> Result<(), FolioError> {
        self.text.size_pt = size;
        if self.page > 0 {
            if let Some(index) = self.text.font {
                self.out(&format!("BT /F{} {:.2} Tf ET", index + 1, size))?;
            }
        }
        Ok(())
    }

    // Links

    /// Creates an internal destination and returns its handle. The target
    /// is filled in later with [`Document::set_link`].
    pub fn add_link(&mut self) -> usize {
        self.links.add()
    }

    /// Points a link handle at a height on a page. The current page is
    /// used when none is given.
    pub fn set_link(
        &mut self,
        handle: usize,
        y: f64,
        page: Option<usize>,
    ) -> Result<(), FolioError> {
        let page = page.unwrap_or(self.page);
        self.links.set(handle, page, y)
    }

    /// Makes a rectangle of the current page clickable.
    pub fn link(
        &mut self,
        x: f64,
        y: f64,
        w: f64,
        h: f64,
        target: impl Into<LinkTarget>,
    ) -> Result<(), FolioError> {
        self.add_page_link(x, y, w, h, target.into())
    }

    // Text placement

    /// Prints a string at an exact position. Unlike cells this neither
    /// pads nor moves the cursor.
    pub fn text(&mut self, x: f64, y: f64, text: &str) -> Result<(), FolioError> {
        if self.text.font.is_none() {
            return Err(FolioError::NoFontSelected);
        }
        let bytes = encode_cp1252(text);
        let k = self.k;
        let mut op = Vec::new();
        op.extend_from_slice(
            format!("BT {:.2} {:.2} Td (", x * k, (self.h - y) * k).as_bytes(),
        );
        op.extend_from_slice(&escape_text(&bytes));
        op.extend_from_slice(b") Tj ET");
        if self.text.style.underline && !bytes.is_empty() {
            op.push(b' ');
            op.extend_from_slice(self.underline_op(x, y, &bytes)?.as_bytes());
        }
        if self.colors.separate_fill {
            let mut wrapped = Vec::new();
            wrapped.extend_from_slice(format!("q {} ", self.colors.text.fill_op()).as_bytes());
            wrapped.extend_from_slice(&op);
            wrapped.extend_from_slice(b" Q");
            op = wrapped;
        }
        self.out_bytes(&op)
    }

    /// Draws one cell: an optional filled rectangle, border edges and a
    /// line of text, then moves the cursor. A width of zero extends the
    /// cell to the right margin. When the cell does not fit above the
    /// break trigger a new page is started first, keeping the horizontal
    /// position and word spacing.
    pub fn cell(
        &mut self,
        w: f64,
        h: f64,
        text: &str,
        border: Border,
        advance: CellAdvance,
        align: Align,
        fill: bool,
        link: Option<LinkTarget>,
    ) -> Result<(), FolioError> {
        let bytes = encode_cp1252(text);
        self.cell_bytes(w, h, &bytes, border, advance, align, fill, link)
    }

    /// Prints text wrapped into a column of cells. Lines break at spaces
    /// when possible; `Align::Justify` stretches the word spacing of every
    /// full line. The cursor ends below the block at the left margin.
    pub fn multi_cell(
        &mut self,
        w: f64,
        h: f64,
        text: &str,
        border: Border,
        align: Align,
        fill: bool,
    ) -> Result<(), FolioError> {
        let index = self.text.font.ok_or(FolioError::NoFontSelected)?;
        let widths = self.fonts.get(index).def.widths;
        let mut w = w;
        if w == 0.0 {
            w = self.w - self.right_margin - self.x;
        }
        let wmax = (w - 2.0 * self.cell_margin) * 1000.0 / self.font_size();
        let mut bytes = encode_cp1252(text);
        bytes.retain(|&b| b != b'\r');
        let mut nb = bytes.len();
        if nb > 0 && bytes[nb - 1] == b'\n' {
            nb -= 1;
        }
        let (mut b, b2, close_bottom) = match border {
            Border::None => (Border::None, Border::None, false),
            Border::Frame => (
                Border::Edges {
                    left: true,
                    top: true,
                    right: true,
                    bottom: false,
                },
                Border::Edges {
                    left: true,
                    top: false,
                    right: true,
                    bottom: false,
                },
                true,
            ),
            Border::Edges {
                left,
                top,
                right,
                bottom,
            } => (
                Border::Edges {
                    left,
                    top,
                    right,
                    bottom: false,
                },
                Border::Edges {
                    left,
                    top: false,
                    right,
                    bottom: false,
                },
                bottom,
            ),
        };
        let mut sep: Option<usize> = None;
        let mut i = 0;
        let mut j = 0;
        let mut l = 0.0;
        let mut ls = 0.0;
        let mut ns = 0usize;
        let mut nl = 1;
        while i < nb {
            let c = bytes[i];
            if c == b'\n' {
                if self.text.word_spacing > 0.0 {
                    self.text.word_spacing = 0.0;
                    self.out("0 Tw")?;
                }
                self.cell_bytes(w, h, &bytes[j..i], b, CellAdvance::Below, align, fill, None)?;
                i += 1;
                sep = None;
                j = i;
                l = 0.0;
                ns = 0;
                nl += 1;
                if border.any() && nl == 2 {
                    b = b2;
                }
                continue;
            }
            if c == b' ' {
                sep = Some(i);
                ls = l;
                ns += 1;
            }
            l += f64::from(widths[usize::from(c)]);
            if l > wmax {
                // Line is full
                match sep {
                    None => {
                        if i == j {
                            i += 1;
                        }
                        if self.text.word_spacing > 0.0 {
                            self.text.word_spacing = 0.0;
                            self.out("0 Tw")?;
                        }
                        self.cell_bytes(
                            w,
                            h,
                            &bytes[j..i],
                            b,
                            CellAdvance::Below,
                            align,
                            fill,
                            None,
                        )?;
                    }
                    Some(space) => {
                        if align == Align::Justify {
                            let spacing = if ns > 1 {
                                (wmax - ls) / 1000.0 * self.font_size() / (ns as f64 - 1.0)
                            } else {
                                0.0
                            };
                            self.text.word_spacing = spacing;
                            self.out(&format!("{:.3} Tw", spacing * self.k))?;
                        }
                        self.cell_bytes(
                            w,
                            h,
                            &bytes[j..space],
                            b,
                            CellAdvance::Below,
                            align,
                            fill,
                            None,
                        )?;
                        i = space + 1;
                    }
                }
                sep = None;
                j = i;
                l = 0.0;
                ns = 0;
                nl += 1;
                if border.any() && nl == 2 {
                    b = b2;
                }
            } else {
                i += 1;
            }
        }
        // Last chunk
        if self.text.word_spacing > 0.0 {
            self.text.word_spacing = 0.0;
            self.out("0 Tw")?;
        }
        if close_bottom {
            if let Border::Edges { bottom, .. } = &mut b {
                *bottom = true;
            }
        }
        self.cell_bytes(w, h, &bytes[j..i], b, CellAdvance::Below, align, fill, None)?;
        self.x = self.left_margin;
        Ok(())
    }

    /// Prints flowing text from the current position, wrapping at the
    /// right margin and continuing at the left one. Useful for mixed-font
    /// runs and inline links.
    pub fn write(
        &mut self,
        h: f64,
        text: &str,
        link: Option<LinkTarget>,
    ) -> Result<(), FolioError> {
        let index = self.text.font.ok_or(FolioError::NoFontSelected)?;
        let widths = self.fonts.get(index).def.widths;
        let mut w = self.w - self.right_margin - self.x;
        let mut wmax = (w - 2.0 * self.cell_margin) * 1000.0 / self.font_size();
        let mut bytes = encode_cp1252(text);
        bytes.retain(|&b| b != b'\r');
        let nb = bytes.len();
        let mut sep: Option<usize> = None;
        let mut i = 0;
        let mut j = 0;
        let mut l = 0.0;
        let mut nl = 1;
        while i < nb {
            let c = bytes[i];
            if c == b'\n' {
                self.cell_bytes(
                    w,
                    h,
                    &bytes[j..i],
                    Border::None,
                    CellAdvance::Below,
                    Align::Left,
                    false,
                    link.clone(),
                )?;
                i += 1;
                sep = None;
                j = i;
                l = 0.0;
                if nl == 1 {
                    self.x = self.left_margin;
                    w = self.w - self.right_margin - self.x;
                    wmax = (w - 2.0 * self.cell_margin) * 1000.0 / self.font_size();
                }
                nl += 1;
                continue;
            }
            if c == b' ' {
                sep = Some(i);
            }
            l += f64::from(widths[usize::from(c)]);
            if l > wmax {
                match sep {
                    None => {
                        if self.x > self.left_margin {
                            // One word over two lines: move below first
                            self.x = self.left_margin;
                            self.y += h;
                            w = self.w - self.right_margin - self.x;
                            wmax = (w - 2.0 * self.cell_margin) * 1000.0 / self.font_size();
                            i += 1;
                            nl += 1;
                            continue;
                        }
                        if i == j {
                            i += 1;
                        }
                        self.cell_bytes(
                            w,
                            h,
                            &bytes[j..i],
                            Border::None,
                            CellAdvance::Below,
                            Align::Left,
                            false,
                            link.clone(),
                        )?;
                    }
                    Some(space) => {
                        self.cell_bytes(
                            w,
                            h,
                            &bytes[j..space],
                            Border::None,
                            CellAdvance::Below,
                            Align::Left,
                            false,
                            link.clone(),
                        )?;
                        i = space + 1;
                    }
                }
                sep = None;
                j = i;
                l = 0.0;
                if nl == 1 {
                    self.x = self.left_margin;
                    w = self.w - self.right_margin - self.x;
                    wmax = (w - 2.0 * self.cell_margin) * 1000.0 / self.font_size();
                }
                nl += 1;
            } else {
                i += 1;
            }
        }
        // Last chunk stays on the line, cursor to its right
        if i != j {
            self.cell_bytes(
                l / 1000.0 * self.font_size(),
                h,
                &bytes[j..],
                Border::None,
                CellAdvance::Right,
                Align::Left,
                false,
                link,
            )?;
        }
        Ok(())
    }

    /// Moves to the next line. Without a height the last printed cell
    /// height is reused.
    pub fn ln(&mut self, h: Option<f64>) {
        self.x = self.left_margin;
        self.y += h.unwrap_or(self.last_height);
    }

    // Images

    /// Decodes and registers image bytes under a name, so later
    /// placements can refer to them without touching the filesystem.
    /// The format is taken from the leading bytes when not given.
    /// Registering the same name again is a no-op.
    pub fn register_image_bytes(
        &mut self,
        name: &str,
        data: &[u8],
        format: Option<ImageFormat>,
    ) -> Result<(), FolioError> {
        if self.images.find(name).is_some() {
            return Ok(());
        }
        let format = match format {
            Some(format) => format,
            None => ImageFormat::detect(data).ok_or_else(|| {
                FolioError::UnsupportedImage(format!("unrecognized image data: {name}"))
            })?,
        };
        self.register_image(name, data, format)?;
        Ok(())
    }

    /// Places an image. The file is decoded on first use and reused on
    /// later placements. A missing dimension is derived from the other
    /// one; when both are zero the image is put at 96 dpi. Without an
    /// explicit `y` the image flows at the cursor, breaking the page when
    /// it does not fit, and the cursor moves below it.
    pub fn image(
        &mut self,
        path: &str,
        x: Option<f64>,
        y: Option<f64>,
        w: f64,
        h: f64,
        format: Option<ImageFormat>,
        link: Option<LinkTarget>,
    ) -> Result<(), FolioError> {
        if path.is_empty() {
            return Err(FolioError::UnsupportedImage(String::from(
                "empty file name",
            )));
        }
        let index = match self.images.find(path) {
            Some(index) => index,
            None => {
                let format = match format {
                    Some(format) => format,
                    None => ImageFormat::from_path(path).ok_or_else(|| {
                        FolioError::UnsupportedImage(format!(
                            "no extension and no format given: {path}"
                        ))
                    })?,
                };
                let data = std::fs::read(path)?;
                self.register_image(path, &data, format)?
            }
        };
        let (pixel_w, pixel_h) = {
            let descriptor = &self.images.get(index).descriptor;
            (f64::from(descriptor.width), f64::from(descriptor.height))
        };
        let mut w = w;
        let mut h = h;
        if w == 0.0 && h == 0.0 {
            // Put the image at 96 dpi
            w = -96.0;
            h = -96.0;
        }
        if w < 0.0 {
            w = -pixel_w * 72.0 / w / self.k;
        }
        if h < 0.0 {
            h = -pixel_h * 72.0 / h / self.k;
        }
        if w == 0.0 {
            w = h * pixel_w / pixel_h;
        }
        if h == 0.0 {
            h = w * pixel_h / pixel_w;
        }
        let y = match y {
            Some(y) => y,
            None => {
                if self.y + h > self.page_break_trigger
                    && !self.in_header
                    && !self.in_footer
                    && self.accept_page_break()
                {
                    let column = self.x;
                    self.add_page_with(
                        Some(self.geometry.orientation),
                        Some(PageFormat::Custom(self.geometry.sheet)),
                        self.geometry.rotation,
                    )?;
                    self.x = column;
                }
                let y = self.y;
                self.y += h;
                y
            }
        };
        let x = x.unwrap_or(self.x);
        self.out(&format!(
            "q {:.2} 0 0 {:.2} {:.2} {:.2} cm /I{} Do Q",
            w * self.k,
            h * self.k,
            x * self.k,
            (self.h - (y + h)) * self.k,
            index + 1
        ))?;
        if let Some(target) = link {
            self.add_page_link(x, y, w, h, target)?;
        }
        Ok(())
    }

    // Cursor

    pub fn get_x(&self) -> f64 {
        self.x
    }

    /// Sets the horizontal position; a negative value measures from the
    /// right edge.
    pub fn set_x(&mut self, x: f64) {
        self.x = if x >= 0.0 { x } else { self.w + x };
    }

    pub fn get_y(&self) -> f64 {
        self.y
    }

    /// Sets the vertical position; a negative value measures from the
    /// bottom edge.
    pub fn set_y(&mut self, y: f64, reset_x: bool) {
        self.y = if y >= 0.0 { y } else { self.h + y };
        if reset_x {
            self.x = self.left_margin;
        }
    }

    pub fn set_xy(&mut self, x: f64, y: f64) {
        self.set_x(x);
        self.set_y(y, false);
    }

    // Output

    /// Finishes the document: runs the last footer, stamps the creation
    /// date and serializes everything. Further drawing calls fail once the
    /// document is closed.
    pub fn close(&mut self) -> Result<(), FolioError> {
        if self.state == DocState::Sealed {
            return Ok(());
        }
        if self.page == 0 {
            self.add_page()?;
        }
        self.run_footer()?;
        self.end_page();
        log::debug!("closing document with {} pages", self.page);
        let epoch = match self.creation_date {
            Some(epoch) => epoch,
            None => SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|elapsed| elapsed.as_secs())
                .unwrap_or(0),
        };
        self.metadata.set("CreationDate", pdf::pdf_date(epoch));
        let bytes = pdf::serialize(self)?;
        self.buffer = Some(bytes);
        self.state = DocState::Sealed;
        Ok(())
    }

    /// Closes the document if needed and returns its bytes.
    pub fn output(&mut self) -> Result<Vec<u8>, FolioError> {
        self.close()?;
        Ok(self.buffer.clone().unwrap_or_default())
    }

    pub fn output_to_file(&mut self, path: impl AsRef<Path>) -> Result<(), FolioError> {
        let bytes = self.output()?;
        std::fs::write(path, bytes)?;
        Ok(())
    }

    // Internals

    fn out(&mut self, line: &str) -> Result<(), FolioError> {
        self.out_bytes(line.as_bytes())
    }

    fn out_bytes(&mut self, line: &[u8]) -> Result<(), FolioError> {
        match self.state {
            DocState::PageOpen => {
                self.pages[self.page - 1].append(line);
                Ok(())
            }
            DocState::Uninitialized => Err(FolioError::NoPageOpen),
            DocState::PageClosed => Err(FolioError::InvalidCall),
            DocState::Sealed => Err(FolioError::DocumentClosed),
        }
    }

    /// Current font size in user units.
    fn font_size(&self) -> f64 {
        self.text.size_pt / self.k
    }

    fn string_width(&self, bytes: &[u8]) -> Result<f64, FolioError> {
        let index = self.text.font.ok_or(FolioError::NoFontSelected)?;
        let units = text_width_units(&self.fonts.get(index).def, bytes);
        Ok(f64::from(units) * self.font_size() / 1000.0)
    }

    fn underline_op(&self, x: f64, y: f64, bytes: &[u8]) -> Result<String, FolioError> {
        let index = self.text.font.ok_or(FolioError::NoFontSelected)?;
        let def = &self.fonts.get(index).def;
        let spaces = bytes.iter().filter(|&&b| b == b' ').count();
        let width = self.string_width(bytes)? + self.text.word_spacing * spaces as f64;
        Ok(format!(
            "{:.2} {:.2} {:.2} {:.2} re f",
            x * self.k,
            (self.h - (y - f64::from(def.up) / 1000.0 * self.font_size())) * self.k,
            width * self.k,
            f64::from(-def.ut) / 1000.0 * self.text.size_pt
        ))
    }

    #[allow(clippy::too_many_arguments)]
    fn cell_bytes(
        &mut self,
        w: f64,
        h: f64,
        text_bytes: &[u8],
        border: Border,
        advance: CellAdvance,
        align: Align,
        fill: bool,
        link: Option<LinkTarget>,
    ) -> Result<(), FolioError> {
        let k = self.k;
        if self.y + h > self.page_break_trigger
            && !self.in_header
            && !self.in_footer
            && self.accept_page_break()
        {
            // Automatic page break, keeping the column and word spacing
            let column = self.x;
            let spacing = self.text.word_spacing;
            if spacing > 0.0 {
                self.text.word_spacing = 0.0;
                self.out("0 Tw")?;
            }
            self.add_page_with(
                Some(self.geometry.orientation),
                Some(PageFormat::Custom(self.geometry.sheet)),
                self.geometry.rotation,
            )?;
            self.x = column;
            if spacing > 0.0 {
                self.text.word_spacing = spacing;
                self.out(&format!("{:.3} Tw", spacing * k))?;
            }
        }
        let mut w = w;
        if w == 0.0 {
            w = self.w - self.right_margin - self.x;
        }
        let mut op: Vec<u8> = Vec::new();
        if fill || border == Border::Frame {
            let paint = if fill {
                if border == Border::Frame { "B" } else { "f" }
            } else {
                "S"
            };
            op.extend_from_slice(
                format!(
                    "{:.2} {:.2} {:.2} {:.2} re {} ",
                    self.x * k,
                    (self.h - self.y) * k,
                    w * k,
                    -h * k,
                    paint
                )
                .as_bytes(),
            );
        }
        if let Border::Edges {
            left,
            top,
            right,
            bottom,
        } = border
        {
            let x = self.x;
            let y = self.y;
            if left {
                op.extend_from_slice(
                    format!(
                        "{:.2} {:.2} m {:.2} {:.2} l S ",
                        x * k,
                        (self.h - y) * k,
                        x * k,
                        (self.h - (y + h)) * k
                    )
                    .as_bytes(),
                );
            }
            if top {
                op.extend_from_slice(
                    format!(
                        "{:.2} {:.2} m {:.2} {:.2} l S ",
                        x * k,
                        (self.h - y) * k,
                        (x + w) * k,
                        (self.h - y) * k
                    )
                    .as_bytes(),
                );
            }
            if right {
                op.extend_from_slice(
                    format!(
                        "{:.2} {:.2} m {:.2} {:.2} l S ",
                        (x + w) * k,
                        (self.h - y) * k,
                        (x + w) * k,
                        (self.h - (y + h)) * k
                    )
                    .as_bytes(),
                );
            }
            if bottom {
                op.extend_from_slice(
                    format!(
                        "{:.2} {:.2} m {:.2} {:.2} l S ",
                        x * k,
                        (self.h - (y + h)) * k,
                        (x + w) * k,
                        (self.h - (y + h)) * k
                    )
                    .as_bytes(),
                );
            }
        }
        if !text_bytes.is_empty() {
            if self.text.font.is_none() {
                return Err(FolioError::NoFontSelected);
            }
            let dx = match align {
                Align::Right => w - self.cell_margin - self.string_width(text_bytes)?,
                Align::Center => (w - self.string_width(text_bytes)?) / 2.0,
                _ => self.cell_margin,
            };
            if self.colors.separate_fill {
                op.extend_from_slice(format!("q {} ", self.colors.text.fill_op()).as_bytes());
            }
            op.extend_from_slice(
                format!(
                    "BT {:.2} {:.2} Td (",
                    (self.x + dx) * k,
                    (self.h - (self.y + 0.5 * h + 0.3 * self.font_size())) * k
                )
                .as_bytes(),
            );
            op.extend_from_slice(&escape_text(text_bytes));
            op.extend_from_slice(b") Tj ET");
            if self.text.style.underline {
                op.push(b' ');
                op.extend_from_slice(
                    self.underline_op(
                        self.x + dx,
                        self.y + 0.5 * h + 0.3 * self.font_size(),
                        text_bytes,
                    )?
                    .as_bytes(),
                );
            }
            if self.colors.separate_fill {
                op.extend_from_slice(b" Q");
            }
            if let Some(target) = link {
                let width = self.string_width(text_bytes)?;
                let size = self.font_size();
                self.add_page_link(
                    self.x + dx,
                    self.y + 0.5 * h - 0.5 * size,
                    width,
                    size,
                    target,
                )?;
            }
        }
        if !op.is_empty() {
            self.out_bytes(&op)?;
        }
        self.last_height = h;
        match advance {
            CellAdvance::Right => self.x += w,
            CellAdvance::NextLine => {
                self.y += h;
                self.x = self.left_margin;
            }
            CellAdvance::Below => self.y += h,
        }
        Ok(())
    }

    fn register_image(
        &mut self,
        name: &str,
        data: &[u8],
        format: ImageFormat,
    ) -> Result<usize, FolioError> {
        let descriptor = image::decode(name, data, format)?;
        if descriptor.has_alpha() {
            self.with_alpha = true;
            if self.pdf_version.as_str() < "1.4" {
                self.pdf_version = String::from("1.4");
            }
        }
        Ok(self.images.insert(name.to_string(), descriptor))
    }

    fn add_page_link(
        &mut self,
        x: f64,
        y: f64,
        width: f64,
        height: f64,
        target: LinkTarget,
    ) -> Result<(), FolioError> {
        if self.page == 0 {
            return Err(FolioError::NoPageOpen);
        }
        let k = self.k;
        self.pages[self.page - 1].links.push(PageLink {
            x: x * k,
            y: self.h * k - y * k,
            width: width * k,
            height: height * k,
            target,
        });
        Ok(())
    }

    fn begin_page(
        &mut self,
        orientation: Option<Orientation>,
        format: Option<PageFormat>,
        rotation: i32,
    ) -> Result<(), FolioError> {
        self.page += 1;
        self.pages.push(PageBuffer::new());
        self.state = DocState::PageOpen;
        self.x = self.left_margin;
        self.y = self.top_margin;
        self.text.family.clear();
        let orientation = orientation.unwrap_or(self.default_geometry.orientation);
        let sheet = match format {
            Some(format) => format.size(self.k),
            None => self.default_geometry.sheet,
        };
        if orientation != self.geometry.orientation || sheet != self.geometry.sheet {
            self.geometry.orientation = orientation;
            self.geometry.sheet = sheet;
            let user = self.geometry.user();
            self.w = user.width;
            self.h = user.height;
            self.page_break_trigger = self.h - self.bottom_margin;
        }
        if orientation != self.default_geometry.orientation
            || sheet != self.default_geometry.sheet
        {
            self.pages[self.page - 1].size_pt = Some(self.geometry.points(self.k));
        }
        if rotation != 0 {
            if rotation % 90 != 0 {
                return Err(FolioError::InvalidRotation(rotation));
            }
            self.pages[self.page - 1].rotation = Some(rotation);
        }
        self.geometry.rotation = rotation;
        Ok(())
    }

    fn end_page(&mut self) {
        self.state = DocState::PageClosed;
    }

    fn run_header(&mut self) -> Result<(), FolioError> {
        if let Some(mut hook) = self.header_hook.take() {
            self.in_header = true;
            let result = hook(self);
            self.in_header = false;
            if self.header_hook.is_none() {
                self.header_hook = Some(hook);
            }
            result?;
        }
        Ok(())
    }

    fn run_footer(&mut self) -> Result<(), FolioError> {
        if let Some(mut hook) = self.footer_hook.take() {
            self.in_footer = true;
            let result = hook(self);
            self.in_footer = false;
            if self.footer_hook.is_none() {
                self.footer_hook = Some(hook);
            }
            result?;
        }
        Ok(())
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new(DocumentOptions::default())
    }
}
