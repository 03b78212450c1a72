use crate::core_fonts;
use crate::error::FolioError;
use crate::pdf::flate_compress;
use std::collections::HashMap;

/// One entry of a byte-to-Unicode map: either a single code point or a run of
/// consecutive code points starting at `start`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnicodeMapping {
    Single(u32),
    Range { start: u32, len: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FontKind {
    Core,
    Type1,
    TrueType,
}

/// FontDescriptor fields for embedded faces, in 1/1000-em units.
#[derive(Debug, Clone, Copy)]
pub struct FontDescriptor {
    pub ascent: i32,
    pub descent: i32,
    pub cap_height: i32,
    pub flags: u32,
    pub bbox: (i32, i32, i32, i32),
    pub italic_angle: i32,
    pub stem_v: i32,
    pub missing_width: u16,
}

/// An embeddable font program, already in its final stream form.
#[derive(Debug, Clone)]
pub struct FontProgram {
    pub data: Vec<u8>,
    pub compressed: bool,
    pub length1: usize,
    /// Second segment length of a Type1 program; absent for TrueType.
    pub length2: Option<usize>,
}

/// The metrics record a font registration supplies. Core faces are built
/// internally; Type1/TrueType registrations provide the full record.
#[derive(Debug, Clone)]
pub struct FontDef {
    pub kind: FontKind,
    pub name: String,
    pub up: i16,
    pub ut: i16,
    pub widths: [u16; 256],
    pub descriptor: Option<FontDescriptor>,
    /// Base encoding name of an embedded face; built-in faces leave it unset
    /// and fall back to the face name when sharing a ToUnicode map.
    pub encoding: Option<String>,
    pub encoding_differences: Option<String>,
    pub unicode_map: Option<Vec<(u8, UnicodeMapping)>>,
    pub program: Option<FontProgram>,
    pub subset: bool,
}

#[derive(Debug)]
pub(crate) struct RegisteredFont {
    pub(crate) key: String,
    pub(crate) def: FontDef,
}

/// Fonts in registration order; the position determines the stable /F index.
#[derive(Debug)]
pub(crate) struct FontRegistry {
    fonts: Vec<RegisteredFont>,
    lookup: HashMap<String, usize>,
}

impl FontRegistry {
    pub(crate) fn new() -> Self {
        Self {
            fonts: Vec::new(),
            lookup: HashMap::new(),
        }
    }

    pub(crate) fn find(&self, key: &str) -> Option<usize> {
        self.lookup.get(key).copied()
    }

    /// Registering an already-known key keeps the first definition.
    pub(crate) fn register(&mut self, key: String, def: FontDef) -> usize {
        if let Some(index) = self.lookup.get(&key) {
            return *index;
        }
        let index = self.fonts.len();
        log::debug!("registering font {} as /F{}", key, index + 1);
        self.lookup.insert(key.clone(), index);
        self.fonts.push(RegisteredFont { key, def });
        index
    }

    /// Register a built-in face on first use.
    pub(crate) fn ensure_core(&mut self, family: &str, suffix: &str) -> Option<usize> {
        let key = format!("{family}{suffix}");
        if let Some(index) = self.lookup.get(&key) {
            return Some(*index);
        }
        let face = core_fonts::lookup(family, suffix)?;
        let def = FontDef {
            kind: FontKind::Core,
            name: face.name.to_string(),
            up: face.up,
            ut: face.ut,
            widths: *face.widths,
            descriptor: None,
            encoding: None,
            encoding_differences: None,
            unicode_map: face.winansi.then(|| core_fonts::CP1252_UNICODE.to_vec()),
            program: None,
            subset: false,
        };
        Some(self.register(key, def))
    }

    pub(crate) fn get(&self, index: usize) -> &RegisteredFont {
        &self.fonts[index]
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &RegisteredFont> {
        self.fonts.iter()
    }

    pub(crate) fn len(&self) -> usize {
        self.fonts.len()
    }
}

/// Sum of character widths in 1/1000-em units for already-encoded text.
pub(crate) fn text_width_units(def: &FontDef, bytes: &[u8]) -> u32 {
    bytes
        .iter()
        .fold(0u32, |acc, &b| acc + u32::from(def.widths[b as usize]))
}

/// Unicode code point for a CP1252 byte. The five unassigned slots map to
/// U+FFFD.
pub(crate) fn cp1252_unicode(byte: u8) -> u32 {
    for &(code, mapping) in core_fonts::CP1252_UNICODE {
        match mapping {
            UnicodeMapping::Single(value) => {
                if code == byte {
                    return value;
                }
            }
            UnicodeMapping::Range { start, len } => {
                let b = u32::from(byte);
                let c = u32::from(code);
                if b >= c && b < c + len {
                    return start + (b - c);
                }
            }
        }
    }
    0xFFFD
}

/// Encode text as CP1252 bytes; unmappable characters degrade to '?'.
pub(crate) fn encode_cp1252(text: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(text.len());
    let mut lossy = false;
    for ch in text.chars() {
        let cp = ch as u32;
        if cp < 0x80 {
            out.push(cp as u8);
            continue;
        }
        match cp1252_byte(cp) {
            Some(byte) => out.push(byte),
            None => {
                lossy = true;
                out.push(b'?');
            }
        }
    }
    if lossy {
        log::debug!("text contains characters outside cp1252; substituted '?'");
    }
    out
}

fn cp1252_byte(cp: u32) -> Option<u8> {
    for &(code, mapping) in core_fonts::CP1252_UNICODE {
        match mapping {
            UnicodeMapping::Single(value) => {
                if value == cp {
                    return Some(code);
                }
            }
            UnicodeMapping::Range { start, len } => {
                if cp >= start && cp < start + len {
                    return Some((u32::from(code) + (cp - start)) as u8);
                }
            }
        }
    }
    None
}

/// Build a TrueType registration record from raw font bytes. Widths cover the
/// CP1252 byte range; the program is embedded zlib-compressed.
pub(crate) fn truetype_def(data: &[u8], name_hint: Option<&str>) -> Result<FontDef, FolioError> {
    let face = ttf_parser::Face::parse(data, 0).map_err(|err| {
        FolioError::FontStyleUnavailable(format!(
            "{}: {err}",
            name_hint.unwrap_or("embedded font")
        ))
    })?;

    let units = i32::from(face.units_per_em().max(1));
    let scale = |value: i32| -> i32 {
        let scaled = i64::from(value) * 1000 + i64::from(units) / 2;
        (scaled / i64::from(units)) as i32
    };

    let missing_width = face
        .glyph_hor_advance(ttf_parser::GlyphId(0))
        .map(|advance| scale(i32::from(advance)).clamp(0, i32::from(u16::MAX)) as u16)
        .unwrap_or(600);

    let mut widths = [missing_width; 256];
    for byte in 32u16..=255 {
        let cp = cp1252_unicode(byte as u8);
        let Some(ch) = char::from_u32(cp) else {
            continue;
        };
        if let Some(advance) = face.glyph_index(ch).and_then(|id| face.glyph_hor_advance(id)) {
            widths[byte as usize] = scale(i32::from(advance)).clamp(0, i32::from(u16::MAX)) as u16;
        }
    }

    let mut flags = 0u32;
    if face.is_monospaced() {
        flags |= 1;
    }
    flags |= 1 << 5;
    let italic_angle = face
        .italic_angle()
        .map(|angle| angle.round() as i32)
        .unwrap_or(0);
    if italic_angle != 0 {
        flags |= 1 << 6;
    }

    let bbox = face.global_bounding_box();
    let ascent = scale(i32::from(face.ascender()));
    let descent = scale(i32::from(face.descender()));
    let cap_height = face
        .capital_height()
        .map(|value| scale(i32::from(value)))
        .unwrap_or(ascent);
    let stem_v = if face.weight().to_number() >= 600 { 120 } else { 70 };

    let (up, ut) = face
        .underline_metrics()
        .map(|metrics| {
            (
                scale(i32::from(metrics.position)).clamp(i32::from(i16::MIN), 0) as i16,
                scale(i32::from(metrics.thickness)).clamp(1, i32::from(i16::MAX)) as i16,
            )
        })
        .unwrap_or((-100, 50));

    let name = postscript_name(&face, name_hint);
    let compressed = flate_compress(data)?;

    Ok(FontDef {
        kind: FontKind::TrueType,
        name,
        up,
        ut,
        widths,
        descriptor: Some(FontDescriptor {
            ascent,
            descent,
            cap_height,
            flags,
            bbox: (
                scale(i32::from(bbox.x_min)),
                scale(i32::from(bbox.y_min)),
                scale(i32::from(bbox.x_max)),
                scale(i32::from(bbox.y_max)),
            ),
            italic_angle,
            stem_v,
            missing_width,
        }),
        encoding: Some("cp1252".to_string()),
        encoding_differences: None,
        unicode_map: Some(core_fonts::CP1252_UNICODE.to_vec()),
        program: Some(FontProgram {
            data: compressed,
            compressed: true,
            length1: data.len(),
            length2: None,
        }),
        subset: false,
    })
}

fn postscript_name(face: &ttf_parser::Face<'_>, hint: Option<&str>) -> String {
    use ttf_parser::name::name_id;

    let mut post = None;
    let mut full = None;
    let mut family = None;
    for entry in face.names() {
        let Some(name) = entry.to_string() else {
            continue;
        };
        match entry.name_id {
            name_id::POST_SCRIPT_NAME => post.get_or_insert(name),
            name_id::FULL_NAME => full.get_or_insert(name),
            name_id::FAMILY => family.get_or_insert(name),
            _ => continue,
        };
    }

    let raw = post
        .or(full)
        .or(family)
        .or_else(|| hint.map(|h| h.to_string()))
        .unwrap_or_else(|| "EmbeddedFont".to_string());
    raw.chars().filter(|ch| !ch.is_whitespace()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain_def(name: &str) -> FontDef {
        FontDef {
            kind: FontKind::Core,
            name: name.to_string(),
            up: -100,
            ut: 50,
            widths: [500; 256],
            descriptor: None,
            encoding: None,
            encoding_differences: None,
            unicode_map: None,
            program: None,
            subset: false,
        }
    }

    #[test]
    fn register_is_idempotent_and_keeps_first() {
        let mut registry = FontRegistry::new();
        let first = registry.register("custom".to_string(), plain_def("One"));
        let second = registry.register("custom".to_string(), plain_def("Two"));
        assert_eq!(first, second);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get(first).def.name, "One");
    }

    #[test]
    fn core_faces_register_on_demand() {
        let mut registry = FontRegistry::new();
        let helvetica = registry.ensure_core("helvetica", "").unwrap();
        let again = registry.ensure_core("helvetica", "").unwrap();
        assert_eq!(helvetica, again);
        assert_eq!(registry.len(), 1);

        let bold = registry.ensure_core("helvetica", "B").unwrap();
        assert_ne!(helvetica, bold);
        assert_eq!(registry.get(bold).def.name, "Helvetica-Bold");
        assert!(registry.ensure_core("symbol", "B").is_none());
        assert!(registry.ensure_core("garamond", "").is_none());
    }

    #[test]
    fn width_sum_uses_byte_table() {
        let mut registry = FontRegistry::new();
        let index = registry.ensure_core("helvetica", "").unwrap();
        let def = &registry.get(index).def;
        // "Hi" = 722 + 222.
        assert_eq!(text_width_units(def, b"Hi"), 944);
    }

    #[test]
    fn cp1252_round_trip() {
        assert_eq!(cp1252_unicode(0x41), 0x41);
        assert_eq!(cp1252_unicode(0x80), 0x20AC);
        assert_eq!(cp1252_unicode(0x93), 0x201C);
        assert_eq!(cp1252_unicode(0xE9), 0xE9);

        assert_eq!(encode_cp1252("A"), vec![0x41]);
        assert_eq!(encode_cp1252("\u{20AC}"), vec![0x80]);
        assert_eq!(encode_cp1252("caf\u{E9}"), vec![b'c', b'a', b'f', 0xE9]);
        assert_eq!(encode_cp1252("\u{4E2D}"), vec![b'?']);
    }

    #[test]
    fn unassigned_cp1252_slots_are_replacement() {
        assert_eq!(cp1252_unicode(0x81), 0xFFFD);
        assert_eq!(cp1252_unicode(0x8D), 0xFFFD);
    }
}
