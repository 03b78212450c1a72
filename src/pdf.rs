use std::collections::HashMap;
use std::io::{self, Read, Write};

use flate2::Compression;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use rayon::prelude::*;

use crate::document::Document;
use crate::error::FolioError;
use crate::font::{FontKind, UnicodeMapping};
use crate::image::{ColorSpace, ImageDescriptor};
use crate::page::{LinkTarget, PageBuffer, replace_all};
use crate::types::{PageLayout, Size, ZoomMode};

/// The page tree root and the shared resource dictionary keep fixed object
/// numbers so pages can reference them before they are written.
pub(crate) const PAGES_OBJ: usize = 1;
pub(crate) const RESOURCES_OBJ: usize = 2;

pub(crate) fn flate_compress(data: &[u8]) -> io::Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    encoder.finish()
}

pub(crate) fn flate_decompress(data: &[u8]) -> io::Result<Vec<u8>> {
    let mut decoder = ZlibDecoder::new(data);
    let mut out = Vec::new();
    decoder.read_to_end(&mut out)?;
    Ok(out)
}

/// Escapes the characters that terminate or confuse a literal string:
/// backslash, both parentheses, and carriage return.
pub(crate) fn escape_text(text: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(text.len());
    for &byte in text {
        match byte {
            b'\\' => out.extend_from_slice(b"\\\\"),
            b'(' => out.extend_from_slice(b"\\("),
            b')' => out.extend_from_slice(b"\\)"),
            b'\r' => out.extend_from_slice(b"\\r"),
            _ => out.push(byte),
        }
    }
    out
}

/// Renders a metadata or URI value as a literal string object. Non-ASCII
/// text is re-encoded as UTF-16BE with a byte order mark.
pub(crate) fn text_string(text: &str) -> Vec<u8> {
    let mut out = vec![b'('];
    if text.is_ascii() {
        out.extend_from_slice(&escape_text(text.as_bytes()));
    } else {
        let mut utf16 = vec![0xFE, 0xFF];
        for unit in text.encode_utf16() {
            utf16.extend_from_slice(&unit.to_be_bytes());
        }
        out.extend_from_slice(&escape_text(&utf16));
    }
    out.push(b')');
    out
}

const CMAP_HEAD: &str = "/CIDInit /ProcSet findresource begin\n\
12 dict begin\n\
begincmap\n\
/CIDSystemInfo\n\
<</Registry (Adobe)\n\
/Ordering (UCS)\n\
/Supplement 0\n\
>> def\n\
/CMapName /Adobe-Identity-UCS def\n\
/CMapType 2 def\n\
1 begincodespacerange\n\
<00> <FF>\n\
endcodespacerange";

const CMAP_TAIL: &str = "\nendcmap\n\
CMapName currentdict /CMap defineresource pop\n\
end\n\
end";

/// Builds the ToUnicode CMap stream for a byte-indexed map. Runs become
/// bfrange entries and isolated code points become bfchar entries.
pub(crate) fn to_unicode_cmap(map: &[(u8, UnicodeMapping)]) -> String {
    let mut ranges = String::new();
    let mut range_count = 0usize;
    let mut chars = String::new();
    let mut char_count = 0usize;
    for &(code, mapping) in map {
        match mapping {
            UnicodeMapping::Range { start, len } => {
                ranges.push_str(&format!(
                    "<{:02X}> <{:02X}> <{:04X}>\n",
                    code,
                    u32::from(code) + len - 1,
                    start
                ));
                range_count += 1;
            }
            UnicodeMapping::Single(value) => {
                chars.push_str(&format!("<{:02X}> <{:04X}>\n", code, value));
                char_count += 1;
            }
        }
    }
    let mut cmap = String::from(CMAP_HEAD);
    if range_count > 0 {
        cmap.push_str(&format!("\n{} beginbfrange\n{}\nendbfrange", range_count, ranges));
    }
    if char_count > 0 {
        cmap.push_str(&format!("\n{} beginbfchar\n{}\nendbfchar", char_count, chars));
    }
    cmap.push_str(CMAP_TAIL);
    cmap
}

/// Formats an epoch timestamp as a PDF date string in UTC.
pub(crate) fn pdf_date(epoch_seconds: u64) -> String {
    let days = (epoch_seconds / 86_400) as i64;
    let seconds = epoch_seconds % 86_400;
    let (year, month, day) = civil_from_days(days);
    format!(
        "D:{:04}{:02}{:02}{:02}{:02}{:02}+00'00'",
        year,
        month,
        day,
        seconds / 3_600,
        (seconds / 60) % 60,
        seconds % 60
    )
}

fn civil_from_days(days: i64) -> (i64, u32, u32) {
    let z = days + 719_468;
    let era = if z >= 0 { z } else { z - 146_096 } / 146_097;
    let doe = (z - era * 146_097) as u64;
    let yoe = (doe - doe / 1_460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = (doy - (153 * mp + 2) / 5 + 1) as u32;
    let month = if mp < 10 { mp + 3 } else { mp - 9 } as u32;
    let year = yoe as i64 + era * 400 + i64::from(month <= 2);
    (year, month, day)
}

/// Serializes a finished document into its final byte form: header, page
/// objects, resources, info, catalog, then the cross-reference table.
pub(crate) fn serialize(doc: &Document) -> Result<Vec<u8>, FolioError> {
    let mut writer = Writer {
        doc,
        buffer: Vec::new(),
        offsets: vec![0; RESOURCES_OBJ + 1],
        n: RESOURCES_OBJ,
        page_numbers: Vec::new(),
        font_numbers: Vec::new(),
        image_numbers: Vec::new(),
    };
    writer.put(&format!("%PDF-{}", doc.pdf_version));
    writer.put_pages()?;
    writer.put_resources()?;
    writer.put_info();
    writer.put_catalog();

    let xref_offset = writer.buffer.len();
    writer.put("xref");
    writer.put(&format!("0 {}", writer.n + 1));
    writer.put("0000000000 65535 f ");
    for id in 1..=writer.n {
        let offset = writer.offsets[id];
        writer.put(&format!("{:010} 00000 n ", offset));
    }
    writer.put("trailer");
    writer.put("<<");
    writer.put(&format!("/Size {}", writer.n + 1));
    writer.put(&format!("/Root {} 0 R", writer.n));
    writer.put(&format!("/Info {} 0 R", writer.n - 1));
    writer.put(">>");
    writer.put("startxref");
    writer.put(&xref_offset.to_string());
    writer.put("%%EOF");
    Ok(writer.buffer)
}

struct Writer<'a> {
    doc: &'a Document,
    buffer: Vec<u8>,
    /// Byte offset of each object, indexed by object number.
    offsets: Vec<usize>,
    /// Highest object number assigned so far.
    n: usize,
    page_numbers: Vec<usize>,
    font_numbers: Vec<usize>,
    image_numbers: Vec<usize>,
}

impl Writer<'_> {
    fn put(&mut self, line: &str) {
        self.put_bytes(line.as_bytes());
    }

    fn put_bytes(&mut self, line: &[u8]) {
        self.buffer.extend_from_slice(line);
        self.buffer.push(b'\n');
    }

    fn new_object(&mut self) -> usize {
        self.n += 1;
        let id = self.n;
        self.new_object_at(id);
        id
    }

    fn new_object_at(&mut self, id: usize) {
        if self.offsets.len() <= id {
            self.offsets.resize(id + 1, 0);
        }
        self.offsets[id] = self.buffer.len();
        self.put(&format!("{} 0 obj", id));
    }

    fn put_stream(&mut self, data: &[u8]) {
        self.put("stream");
        self.put_bytes(data);
        self.put("endstream");
    }

    fn put_stream_object(&mut self, data: &[u8]) -> Result<(), FolioError> {
        let (entries, payload) = if self.doc.compress {
            ("/Filter /FlateDecode ", flate_compress(data)?)
        } else {
            ("", data.to_vec())
        };
        self.new_object();
        self.put(&format!("<<{}/Length {}>>", entries, payload.len()));
        self.put_stream(&payload);
        self.put("endobj");
        Ok(())
    }

    fn put_pages(&mut self) -> Result<(), FolioError> {
        let doc = self.doc;
        let count = doc.pages.len();

        // Object numbers follow emission order: each page dictionary is
        // directly followed by its content stream and link annotations.
        let mut next = self.n;
        for page in &doc.pages {
            self.page_numbers.push(next + 1);
            next += 2 + page.links.len();
        }

        let replacement = count.to_string();
        let alias = doc.alias_nb_pages.as_deref().filter(|alias| !alias.is_empty());
        let compress = doc.compress;
        let prepared = doc
            .pages
            .par_iter()
            .map(|page| {
                let content = match alias {
                    Some(alias) => {
                        replace_all(&page.content, alias.as_bytes(), replacement.as_bytes())
                    }
                    None => page.content.clone(),
                };
                if compress {
                    flate_compress(&content)
                } else {
                    Ok(content)
                }
            })
            .collect::<io::Result<Vec<Vec<u8>>>>()?;

        let default_points = doc.default_geometry.points(doc.k);
        for (index, page) in doc.pages.iter().enumerate() {
            self.put_page(page, &prepared[index], default_points)?;
        }

        self.new_object_at(PAGES_OBJ);
        self.put("<</Type /Pages");
        let mut kids = String::from("/Kids [");
        for number in &self.page_numbers {
            kids.push_str(&format!("{} 0 R ", number));
        }
        kids.push(']');
        self.put(&kids);
        self.put(&format!("/Count {}", count));
        self.put(&format!(
            "/MediaBox [0 0 {:.2} {:.2}]",
            default_points.width, default_points.height
        ));
        self.put(">>");
        self.put("endobj");
        Ok(())
    }

    fn put_page(
        &mut self,
        page: &PageBuffer,
        content: &[u8],
        default_points: Size,
    ) -> Result<(), FolioError> {
        let page_obj = self.new_object();
        self.put("<</Type /Page");
        self.put("/Parent 1 0 R");
        if let Some(size) = page.size_pt {
            self.put(&format!("/MediaBox [0 0 {:.2} {:.2}]", size.width, size.height));
        }
        if let Some(rotation) = page.rotation {
            self.put(&format!("/Rotate {}", rotation));
        }
        self.put("/Resources 2 0 R");
        if !page.links.is_empty() {
            let mut annots = String::from("/Annots [");
            for index in 0..page.links.len() {
                annots.push_str(&format!("{} 0 R ", page_obj + 2 + index));
            }
            annots.push(']');
            self.put(&annots);
        }
        if self.doc.with_alpha {
            self.put("/Group <</Type /Group /S /Transparency /CS /DeviceRGB>>");
        }
        self.put(&format!("/Contents {} 0 R>>", page_obj + 1));
        self.put("endobj");

        let entries = if self.doc.compress {
            "/Filter /FlateDecode "
        } else {
            ""
        };
        self.new_object();
        self.put(&format!("<<{}/Length {}>>", entries, content.len()));
        self.put_stream(content);
        self.put("endobj");

        self.put_page_links(page, default_points)
    }

    fn put_page_links(&mut self, page: &PageBuffer, default_points: Size) -> Result<(), FolioError> {
        let doc = self.doc;
        for link in &page.links {
            self.new_object();
            let mut line = format!(
                "<</Type /Annot /Subtype /Link /Rect [{:.2} {:.2} {:.2} {:.2}] /Border [0 0 0] ",
                link.x,
                link.y,
                link.x + link.width,
                link.y - link.height
            )
            .into_bytes();
            match &link.target {
                LinkTarget::Uri(uri) => {
                    line.extend_from_slice(b"/A <</S /URI /URI ");
                    line.extend_from_slice(&text_string(uri));
                    line.extend_from_slice(b">>>>");
                }
                LinkTarget::Internal(handle) => {
                    let (target_page, y) = doc.links.get(*handle)?;
                    let dest_obj = target_page
                        .checked_sub(1)
                        .and_then(|index| self.page_numbers.get(index))
                        .copied()
                        .ok_or(FolioError::UnknownLink(*handle))?;
                    let height = doc.pages[target_page - 1]
                        .size_pt
                        .map(|size| size.height)
                        .unwrap_or(default_points.height);
                    line.extend_from_slice(
                        format!("/Dest [{} 0 R /XYZ 0 {:.2} null]>>", dest_obj, height - y * doc.k)
                            .as_bytes(),
                    );
                }
            }
            self.put_bytes(&line);
            self.put("endobj");
        }
        Ok(())
    }

    fn put_resources(&mut self) -> Result<(), FolioError> {
        self.put_fonts()?;
        self.put_images()?;
        self.new_object_at(RESOURCES_OBJ);
        self.put("<<");
        self.put("/ProcSet [/PDF /Text /ImageB /ImageC /ImageI]");
        self.put("/Font <<");
        for index in 0..self.font_numbers.len() {
            let number = self.font_numbers[index];
            self.put(&format!("/F{} {} 0 R", index + 1, number));
        }
        self.put(">>");
        self.put("/XObject <<");
        for index in 0..self.image_numbers.len() {
            let number = self.image_numbers[index];
            self.put(&format!("/I{} {} 0 R", index + 1, number));
        }
        self.put(">>");
        self.put(">>");
        self.put("endobj");
        Ok(())
    }

    fn put_fonts(&mut self) -> Result<(), FolioError> {
        let doc = self.doc;

        // Embedded font programs come first so the descriptors can point
        // back at them.
        let mut program_numbers: Vec<Option<usize>> = Vec::with_capacity(doc.fonts.len());
        for font in doc.fonts.iter() {
            let number = match &font.def.program {
                Some(program) => {
                    self.new_object();
                    self.put(&format!("<</Length {}", program.data.len()));
                    if program.compressed {
                        self.put("/Filter /FlateDecode");
                    }
                    self.put(&format!("/Length1 {}", program.length1));
                    if let Some(length2) = program.length2 {
                        self.put(&format!("/Length2 {} /Length3 0", length2));
                    }
                    self.put(">>");
                    self.put_stream(&program.data);
                    self.put("endobj");
                    Some(self.n)
                }
                None => None,
            };
            program_numbers.push(number);
        }

        let mut encodings: HashMap<String, usize> = HashMap::new();
        let mut cmaps: HashMap<String, usize> = HashMap::new();
        for (index, font) in doc.fonts.iter().enumerate() {
            let def = &font.def;
            let share_key = def.encoding.clone().unwrap_or_else(|| def.name.clone());

            let mut diff_number = None;
            if let Some(diff) = &def.encoding_differences {
                diff_number = Some(match encodings.get(&share_key) {
                    Some(number) => *number,
                    None => {
                        self.new_object();
                        self.put(&format!(
                            "<</Type /Encoding /BaseEncoding /WinAnsiEncoding /Differences [{}]>>",
                            diff
                        ));
                        self.put("endobj");
                        encodings.insert(share_key.clone(), self.n);
                        self.n
                    }
                });
            }

            let mut cmap_number = None;
            if let Some(map) = &def.unicode_map {
                cmap_number = Some(match cmaps.get(&share_key) {
                    Some(number) => *number,
                    None => {
                        let cmap = to_unicode_cmap(map);
                        self.put_stream_object(cmap.as_bytes())?;
                        cmaps.insert(share_key.clone(), self.n);
                        self.n
                    }
                });
            }

            let name = if def.subset {
                format!("AAAAAA+{}", def.name)
            } else {
                def.name.clone()
            };
            match def.kind {
                FontKind::Core => {
                    self.new_object();
                    self.font_numbers.push(self.n);
                    self.put("<</Type /Font");
                    self.put(&format!("/BaseFont /{}", name));
                    self.put("/Subtype /Type1");
                    if name != "Symbol" && name != "ZapfDingbats" {
                        self.put("/Encoding /WinAnsiEncoding");
                    }
                    if let Some(number) = cmap_number {
                        self.put(&format!("/ToUnicode {} 0 R", number));
                    }
                    self.put(">>");
                    self.put("endobj");
                }
                FontKind::Type1 | FontKind::TrueType => {
                    let subtype = if def.kind == FontKind::Type1 {
                        "Type1"
                    } else {
                        "TrueType"
                    };
                    self.new_object();
                    self.font_numbers.push(self.n);
                    self.put("<</Type /Font");
                    self.put(&format!("/BaseFont /{}", name));
                    self.put(&format!("/Subtype /{}", subtype));
                    self.put("/FirstChar 32 /LastChar 255");
                    self.put(&format!("/Widths {} 0 R", self.n + 1));
                    self.put(&format!("/FontDescriptor {} 0 R", self.n + 2));
                    match diff_number {
                        Some(number) => self.put(&format!("/Encoding {} 0 R", number)),
                        None => self.put("/Encoding /WinAnsiEncoding"),
                    }
                    if let Some(number) = cmap_number {
                        self.put(&format!("/ToUnicode {} 0 R", number));
                    }
                    self.put(">>");
                    self.put("endobj");

                    self.new_object();
                    let widths: Vec<String> =
                        def.widths[32..].iter().map(|w| w.to_string()).collect();
                    self.put(&format!("[{}]", widths.join(" ")));
                    self.put("endobj");

                    self.new_object();
                    let mut dict = format!("<</Type /FontDescriptor /FontName /{}", name);
                    if let Some(desc) = &def.descriptor {
                        dict.push_str(&format!(" /Ascent {}", desc.ascent));
                        dict.push_str(&format!(" /Descent {}", desc.descent));
                        dict.push_str(&format!(" /CapHeight {}", desc.cap_height));
                        dict.push_str(&format!(" /Flags {}", desc.flags));
                        dict.push_str(&format!(
                            " /FontBBox [{} {} {} {}]",
                            desc.bbox.0, desc.bbox.1, desc.bbox.2, desc.bbox.3
                        ));
                        dict.push_str(&format!(" /ItalicAngle {}", desc.italic_angle));
                        dict.push_str(&format!(" /StemV {}", desc.stem_v));
                        dict.push_str(&format!(" /MissingWidth {}", desc.missing_width));
                    }
                    if let Some(number) = program_numbers[index] {
                        let suffix = if def.kind == FontKind::Type1 { "" } else { "2" };
                        dict.push_str(&format!(" /FontFile{} {} 0 R", suffix, number));
                    }
                    self.put(&format!("{}>>", dict));
                    self.put("endobj");
                }
            }
        }
        Ok(())
    }

    fn put_images(&mut self) -> Result<(), FolioError> {
        let doc = self.doc;
        for image in doc.images.iter() {
            let number = self.put_image(&image.descriptor)?;
            self.image_numbers.push(number);
        }
        Ok(())
    }

    fn put_image(&mut self, info: &ImageDescriptor) -> Result<usize, FolioError> {
        let number = self.new_object();
        self.put("<</Type /XObject");
        self.put("/Subtype /Image");
        self.put(&format!("/Width {}", info.width));
        self.put(&format!("/Height {}", info.height));
        if info.color_space == ColorSpace::Indexed {
            self.put(&format!(
                "/ColorSpace [/Indexed /DeviceRGB {} {} 0 R]",
                info.palette.len() / 3 - 1,
                number + 1
            ));
        } else {
            self.put(&format!("/ColorSpace /{}", info.color_space.pdf_name()));
            if info.color_space == ColorSpace::DeviceCmyk {
                self.put("/Decode [1 0 1 0 1 0 1 0]");
            }
        }
        self.put(&format!("/BitsPerComponent {}", info.bits_per_component));
        if let Some(filter) = info.filter {
            self.put(&format!("/Filter /{}", filter));
        }
        if let Some(parms) = &info.decode_parms {
            self.put(&format!("/DecodeParms <<{}>>", parms));
        }
        if !info.transparency.is_empty() {
            let mut mask = String::new();
            for value in &info.transparency {
                mask.push_str(&format!("{} {} ", value, value));
            }
            self.put(&format!("/Mask [{}]", mask));
        }
        if info.soft_mask.is_some() {
            self.put(&format!("/SMask {} 0 R", number + 1));
        }
        self.put(&format!("/Length {}>>", info.data.len()));
        self.put_stream(&info.data);
        self.put("endobj");

        if let Some(soft_mask) = &info.soft_mask {
            let mask = ImageDescriptor {
                width: info.width,
                height: info.height,
                color_space: ColorSpace::DeviceGray,
                bits_per_component: 8,
                filter: info.filter,
                decode_parms: Some(format!(
                    "/Predictor 15 /Colors 1 /BitsPerComponent 8 /Columns {}",
                    info.width
                )),
                palette: Vec::new(),
                transparency: Vec::new(),
                data: soft_mask.clone(),
                soft_mask: None,
            };
            self.put_image(&mask)?;
        }
        if info.color_space == ColorSpace::Indexed {
            self.put_stream_object(&info.palette)?;
        }
        Ok(number)
    }

    fn put_info(&mut self) {
        let doc = self.doc;
        self.new_object();
        self.put("<<");
        for (key, value) in doc.metadata.entries() {
            let mut line = format!("/{} ", key).into_bytes();
            line.extend_from_slice(&text_string(value));
            self.put_bytes(&line);
        }
        self.put(">>");
        self.put("endobj");
    }

    fn put_catalog(&mut self) {
        let doc = self.doc;
        self.new_object();
        self.put("<<");
        self.put("/Type /Catalog");
        self.put("/Pages 1 0 R");
        let first = self.page_numbers.first().copied();
        if let Some(first) = first {
            match doc.zoom {
                ZoomMode::Fullpage => self.put(&format!("/OpenAction [{} 0 R /Fit]", first)),
                ZoomMode::Fullwidth => self.put(&format!("/OpenAction [{} 0 R /FitH null]", first)),
                ZoomMode::Real => self.put(&format!("/OpenAction [{} 0 R /XYZ null null 1]", first)),
                ZoomMode::Percent(percent) => self.put(&format!(
                    "/OpenAction [{} 0 R /XYZ null null {:.2}]",
                    first,
                    percent / 100.0
                )),
                ZoomMode::Default => {}
            }
        }
        match doc.layout {
            PageLayout::Single => self.put("/PageLayout /SinglePage"),
            PageLayout::Continuous => self.put("/PageLayout /OneColumn"),
            PageLayout::Two => self.put("/PageLayout /TwoColumnLeft"),
            PageLayout::Default => {}
        }
        self.put(">>");
        self.put("endobj");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Align, Border, CellAdvance, DocumentOptions, FontStyle};

    fn count(haystack: &[u8], needle: &[u8]) -> usize {
        if needle.is_empty() {
            return 0;
        }
        let mut total = 0;
        let mut pos = 0;
        while pos + needle.len() <= haystack.len() {
            if &haystack[pos..pos + needle.len()] == needle {
                total += 1;
                pos += needle.len();
            } else {
                pos += 1;
            }
        }
        total
    }

    fn contains(haystack: &[u8], needle: &str) -> bool {
        count(haystack, needle.as_bytes()) > 0
    }

    fn hello_document() -> crate::Document {
        let mut doc = crate::Document::new(DocumentOptions::default());
        doc.set_creation_date(0);
        doc.add_page().unwrap();
        doc.set_font("helvetica", FontStyle::BOLD, 16.0).unwrap();
        doc.cell(
            40.0,
            10.0,
            "Hello World!",
            Border::None,
            CellAdvance::Right,
            Align::Left,
            false,
            None,
        )
        .unwrap();
        doc
    }

    #[test]
    fn escapes_literal_string_delimiters() {
        assert_eq!(escape_text(b"plain"), b"plain");
        assert_eq!(escape_text(b"a(b)c"), b"a\\(b\\)c");
        assert_eq!(escape_text(b"back\\slash"), b"back\\\\slash");
        assert_eq!(escape_text(b"line\rend"), b"line\\rend");
    }

    #[test]
    fn text_string_switches_to_utf16_for_non_ascii() {
        assert_eq!(text_string("Title"), b"(Title)");
        let encoded = text_string("é");
        assert_eq!(encoded[..3], [b'(', 0xFE, 0xFF]);
        assert_eq!(encoded[3..5], [0x00, 0xE9]);
        assert_eq!(*encoded.last().unwrap(), b')');
    }

    #[test]
    fn cmap_lists_ranges_then_chars() {
        let map = [
            (0x20u8, UnicodeMapping::Range { start: 0x0020, len: 1 }),
            (0x80u8, UnicodeMapping::Single(0x20AC)),
        ];
        let cmap = to_unicode_cmap(&map);
        assert!(cmap.starts_with("/CIDInit /ProcSet findresource begin\n"));
        assert!(cmap.contains("\n1 beginbfrange\n<20> <20> <0020>\n\nendbfrange"));
        assert!(cmap.contains("\n1 beginbfchar\n<80> <20AC>\n\nendbfchar"));
        assert!(cmap.ends_with("\nendcmap\nCMapName currentdict /CMap defineresource pop\nend\nend"));
    }

    #[test]
    fn pdf_date_renders_utc() {
        assert_eq!(pdf_date(0), "D:19700101000000+00'00'");
        assert_eq!(pdf_date(1_700_000_000), "D:20231114221320+00'00'");
    }

    #[test]
    fn flate_round_trip() {
        let data = b"stream payload stream payload stream payload".to_vec();
        let packed = flate_compress(&data).unwrap();
        assert_ne!(packed, data);
        assert_eq!(flate_decompress(&packed).unwrap(), data);
    }

    #[test]
    fn serialized_document_frames_and_dates() {
        let mut doc = hello_document();
        let bytes = doc.output().unwrap();
        assert!(bytes.starts_with(b"%PDF-1.3\n"));
        assert!(bytes.ends_with(b"%%EOF\n"));
        assert!(contains(&bytes, "/CreationDate (D:19700101000000+00'00')"));
        assert!(contains(&bytes, "/Producer (folio"));
        assert!(contains(&bytes, "/BaseFont /Helvetica-Bold"));
    }

    #[test]
    fn xref_entries_point_at_their_objects() {
        let mut doc = hello_document();
        doc.set_compression(false);
        let bytes = doc.output().unwrap();
        let text = std::str::from_utf8(&bytes).unwrap();

        let mut tail = text.lines().rev();
        assert_eq!(tail.next(), Some("%%EOF"));
        let xref_offset: usize = tail.next().unwrap().parse().unwrap();
        assert_eq!(tail.next(), Some("startxref"));

        let mut lines = text[xref_offset..].lines();
        assert_eq!(lines.next(), Some("xref"));
        let span = lines.next().unwrap();
        let total: usize = span.strip_prefix("0 ").unwrap().parse().unwrap();
        assert_eq!(lines.next(), Some("0000000000 65535 f "));
        for id in 1..total {
            let entry = lines.next().unwrap();
            let offset: usize = entry[..10].parse().unwrap();
            let expected = format!("{} 0 obj", id);
            assert!(
                text[offset..].starts_with(&expected),
                "object {} not at recorded offset",
                id
            );
        }
    }

    #[test]
    fn uncompressed_page_content_is_readable() {
        let mut doc = hello_document();
        doc.set_compression(false);
        let bytes = doc.output().unwrap();
        assert!(contains(&bytes, "(Hello World!) Tj"));
        assert!(contains(&bytes, "BT /F1 16.00 Tf ET"));
        assert!(!contains(&bytes, "/Filter /FlateDecode"));
    }

    #[test]
    fn jpeg_bytes_are_embedded_verbatim() {
        let mut jpeg = vec![0xFF, 0xD8];
        jpeg.extend_from_slice(&[0xFF, 0xE0, 0x00, 0x04, 0x4A, 0x46]);
        jpeg.extend_from_slice(&[0xFF, 0xC0, 0x00, 0x11, 8, 0x00, 0x20, 0x00, 0x10, 3]);
        jpeg.extend_from_slice(&[1, 0x22, 0, 2, 0x11, 1, 3, 0x11, 1]);
        let mut doc = crate::Document::new(DocumentOptions::default());
        doc.set_creation_date(0);
        doc.register_image_bytes("photo", &jpeg, None).unwrap();
        doc.add_page().unwrap();
        doc.image("photo", Some(10.0), Some(10.0), 0.0, 0.0, None, None)
            .unwrap();
        let bytes = doc.output().unwrap();
        assert!(contains(&bytes, "/Subtype /Image"));
        assert!(contains(&bytes, "/Width 16"));
        assert!(contains(&bytes, "/Height 32"));
        assert!(contains(&bytes, "/ColorSpace /DeviceRGB"));
        assert!(contains(&bytes, "/Filter /DCTDecode"));
        assert_eq!(count(&bytes, &jpeg), 1);
    }

    #[test]
    fn reselecting_a_font_registers_it_once() {
        let mut doc = crate::Document::new(DocumentOptions::default());
        doc.add_page().unwrap();
        doc.set_font("helvetica", FontStyle::REGULAR, 12.0).unwrap();
        doc.set_font("arial", FontStyle::REGULAR, 12.0).unwrap();
        let bytes = doc.output().unwrap();
        assert_eq!(count(&bytes, b"/BaseFont /Helvetica"), 1);
        assert!(contains(&bytes, "/F1 "));
        assert!(!contains(&bytes, "/F2 "));
    }

    #[test]
    fn round_trips_through_lopdf() {
        let mut doc = hello_document();
        let bytes = doc.output().unwrap();
        let parsed = lopdf::Document::load_mem(&bytes).unwrap();
        assert_eq!(parsed.get_pages().len(), 1);
        let catalog = parsed.catalog().unwrap();
        assert!(catalog.get(b"Pages").is_ok());
    }

    #[test]
    fn internal_link_resolves_to_page_object() {
        let mut doc = crate::Document::new(DocumentOptions::default());
        doc.set_compression(false);
        doc.add_page().unwrap();
        doc.set_font("helvetica", FontStyle::REGULAR, 12.0).unwrap();
        let handle = doc.add_link();
        doc.cell(
            40.0,
            10.0,
            "next page",
            Border::None,
            CellAdvance::NextLine,
            Align::Left,
            false,
            Some(LinkTarget::Internal(handle)),
        )
        .unwrap();
        doc.add_page().unwrap();
        doc.set_link(handle, 0.0, None).unwrap();
        let bytes = doc.output().unwrap();
        assert!(contains(&bytes, "/Subtype /Link"));
        assert!(contains(&bytes, "/Dest [6 0 R /XYZ 0 841.89 null]"));
    }

    #[test]
    fn unset_link_target_is_reported() {
        let mut doc = crate::Document::new(DocumentOptions::default());
        doc.add_page().unwrap();
        doc.set_font("helvetica", FontStyle::REGULAR, 12.0).unwrap();
        let handle = doc.add_link();
        doc.cell(
            40.0,
            10.0,
            "dangling",
            Border::None,
            CellAdvance::Right,
            Align::Left,
            false,
            Some(LinkTarget::Internal(handle)),
        )
        .unwrap();
        match doc.output() {
            Err(FolioError::UnknownLink(found)) => assert_eq!(found, handle),
            other => panic!("expected unknown link error, got {:?}", other),
        }
    }
}
