use std::collections::HashMap;

use crate::error::FolioError;
use crate::pdf::{flate_compress, flate_decompress};

pub(crate) const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

/// Raster formats accepted by [`crate::Document::image`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Png,
    Jpeg,
    Gif,
}

impl ImageFormat {
    /// Infer the format from a file name; requires an extension.
    pub fn from_path(path: &str) -> Option<Self> {
        let (_, extension) = path.rsplit_once('.')?;
        Self::from_extension(extension)
    }

    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension.to_ascii_lowercase().as_str() {
            "png" => Some(Self::Png),
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "gif" => Some(Self::Gif),
            _ => None,
        }
    }

    /// Identify the format from leading magic bytes.
    pub fn detect(data: &[u8]) -> Option<Self> {
        if data.starts_with(&PNG_SIGNATURE) {
            Some(Self::Png)
        } else if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
            Some(Self::Jpeg)
        } else if data.starts_with(b"GIF8") {
            Some(Self::Gif)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ColorSpace {
    DeviceGray,
    DeviceRgb,
    DeviceCmyk,
    Indexed,
}

impl ColorSpace {
    pub(crate) fn pdf_name(self) -> &'static str {
        match self {
            ColorSpace::DeviceGray => "DeviceGray",
            ColorSpace::DeviceRgb => "DeviceRGB",
            ColorSpace::DeviceCmyk => "DeviceCMYK",
            ColorSpace::Indexed => "Indexed",
        }
    }
}

/// Normalized image record: pixel data already in its final stream encoding.
#[derive(Debug, Clone)]
pub(crate) struct ImageDescriptor {
    pub(crate) width: u32,
    pub(crate) height: u32,
    pub(crate) color_space: ColorSpace,
    pub(crate) bits_per_component: u8,
    pub(crate) filter: Option<&'static str>,
    pub(crate) decode_parms: Option<String>,
    /// RGB triples for Indexed images.
    pub(crate) palette: Vec<u8>,
    /// Color-key transparency: one gray level, an RGB triple, or one
    /// palette index.
    pub(crate) transparency: Vec<u8>,
    pub(crate) data: Vec<u8>,
    /// Separated alpha channel, deflate-encoded, 8 bits per sample.
    pub(crate) soft_mask: Option<Vec<u8>>,
}

impl ImageDescriptor {
    pub(crate) fn has_alpha(&self) -> bool {
        self.soft_mask.is_some()
    }
}

pub(crate) fn decode(
    name: &str,
    data: &[u8],
    format: ImageFormat,
) -> Result<ImageDescriptor, FolioError> {
    let descriptor = match format {
        ImageFormat::Png => parse_png(name, data)?,
        ImageFormat::Jpeg => parse_jpeg(name, data)?,
        ImageFormat::Gif => parse_gif(name, data)?,
    };
    if descriptor.width == 0 || descriptor.height == 0 {
        return Err(FolioError::ImageDecode(format!(
            "image with zero dimensions: {}",
            name
        )));
    }
    Ok(descriptor)
}

#[derive(Debug)]
pub(crate) struct RegisteredImage {
    pub(crate) descriptor: ImageDescriptor,
}

/// Images in first-use order; the position determines the stable /I index.
/// A path is decoded once and reused on every later placement.
#[derive(Debug)]
pub(crate) struct ImageRegistry {
    images: Vec<RegisteredImage>,
    lookup: HashMap<String, usize>,
}

impl ImageRegistry {
    pub(crate) fn new() -> Self {
        Self {
            images: Vec::new(),
            lookup: HashMap::new(),
        }
    }

    pub(crate) fn find(&self, key: &str) -> Option<usize> {
        self.lookup.get(key).copied()
    }

    pub(crate) fn insert(&mut self, key: String, descriptor: ImageDescriptor) -> usize {
        let index = self.images.len();
        log::debug!(
            "registering image {} as /I{} ({}x{})",
            key,
            index + 1,
            descriptor.width,
            descriptor.height
        );
        self.lookup.insert(key, index);
        self.images.push(RegisteredImage { descriptor });
        index
    }

    pub(crate) fn get(&self, index: usize) -> &RegisteredImage {
        &self.images[index]
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &RegisteredImage> {
        self.images.iter()
    }
}

struct PngCursor<'a> {
    name: &'a str,
    data: &'a [u8],
    pos: usize,
}

impl<'a> PngCursor<'a> {
    fn take(&mut self, count: usize) -> Result<&'a [u8], FolioError> {
        let end = self
            .pos
            .checked_add(count)
            .filter(|&end| end <= self.data.len())
            .ok_or_else(|| {
                FolioError::ImageDecode(format!("truncated PNG file: {}", self.name))
            })?;
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn read_u32(&mut self) -> Result<u32, FolioError> {
        let bytes = self.take(4)?;
        Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }
}

/// Parse a PNG stream into its PDF-ready form. The deflate-encoded scanline
/// data is reused as-is except for color types 4 and 6, where the alpha
/// samples are split into a separate soft-mask stream.
pub(crate) fn parse_png(name: &str, data: &[u8]) -> Result<ImageDescriptor, FolioError> {
    if !data.starts_with(&PNG_SIGNATURE) {
        return Err(FolioError::ImageDecode(format!("not a PNG file: {name}")));
    }
    let mut cursor = PngCursor {
        name,
        data,
        pos: PNG_SIGNATURE.len(),
    };
    cursor.read_u32()?;
    if cursor.take(4)? != b"IHDR" {
        return Err(FolioError::ImageDecode(format!("incorrect PNG file: {name}")));
    }
    let width = cursor.read_u32()?;
    let height = cursor.read_u32()?;
    let header = cursor.take(5)?;
    let bpc = header[0];
    let color_type = header[1];
    if bpc > 8 {
        return Err(FolioError::UnsupportedImage(format!(
            "16-bit depth not supported: {name}"
        )));
    }
    let color_space = match color_type {
        0 | 4 => ColorSpace::DeviceGray,
        2 | 6 => ColorSpace::DeviceRgb,
        3 => ColorSpace::Indexed,
        other => {
            return Err(FolioError::UnsupportedImage(format!(
                "unknown color type {other}: {name}"
            )));
        }
    };
    if header[2] != 0 {
        return Err(FolioError::UnsupportedImage(format!(
            "unknown compression method: {name}"
        )));
    }
    if header[3] != 0 {
        return Err(FolioError::UnsupportedImage(format!(
            "unknown filter method: {name}"
        )));
    }
    if header[4] != 0 {
        return Err(FolioError::UnsupportedImage(format!(
            "interlacing not supported: {name}"
        )));
    }
    cursor.take(4)?;

    let colors = if color_space == ColorSpace::DeviceRgb { 3 } else { 1 };
    let decode_parms = format!(
        "/Predictor 15 /Colors {colors} /BitsPerComponent {bpc} /Columns {width}"
    );

    let mut palette = Vec::new();
    let mut transparency = Vec::new();
    let mut idat = Vec::new();
    loop {
        let length = cursor.read_u32()? as usize;
        let kind = cursor.take(4)?;
        match kind {
            b"PLTE" => {
                palette = cursor.take(length)?.to_vec();
                cursor.take(4)?;
            }
            b"tRNS" => {
                let chunk = cursor.take(length)?;
                match color_type {
                    0 => {
                        if chunk.len() >= 2 {
                            transparency = vec![chunk[1]];
                        }
                    }
                    2 => {
                        if chunk.len() >= 6 {
                            transparency = vec![chunk[1], chunk[3], chunk[5]];
                        }
                    }
                    _ => {
                        // First fully transparent palette index, if any.
                        if let Some(index) = chunk.iter().position(|&alpha| alpha == 0) {
                            transparency = vec![index as u8];
                        }
                    }
                }
                cursor.take(4)?;
            }
            b"IDAT" => {
                idat.extend_from_slice(cursor.take(length)?);
                cursor.take(4)?;
            }
            b"IEND" => break,
            _ => {
                cursor.take(length)?;
                cursor.take(4)?;
            }
        }
    }

    if color_space == ColorSpace::Indexed {
        if palette.is_empty() {
            return Err(FolioError::ImageDecode(format!("missing palette in {name}")));
        }
        // The writer derives the /Indexed entry count from whole RGB triples.
        if palette.len() % 3 != 0 {
            return Err(FolioError::ImageDecode(format!(
                "malformed palette in {name}"
            )));
        }
    }

    let mut descriptor = ImageDescriptor {
        width,
        height,
        color_space,
        bits_per_component: bpc,
        filter: Some("FlateDecode"),
        decode_parms: Some(decode_parms),
        palette,
        transparency,
        data: idat,
        soft_mask: None,
    };

    if color_type >= 4 {
        let (color, alpha) = split_alpha(name, &descriptor.data, width, height, color_type)?;
        descriptor.data = flate_compress(&color)?;
        descriptor.soft_mask = Some(flate_compress(&alpha)?);
        log::debug!("separated alpha channel of {name} into a soft mask");
    }
    Ok(descriptor)
}

/// De-interleave filtered scanlines into color and alpha streams. The
/// per-row filter byte is replicated into both so each stream stays a valid
/// predictor-15 input.
fn split_alpha(
    name: &str,
    idat: &[u8],
    width: u32,
    height: u32,
    color_type: u8,
) -> Result<(Vec<u8>, Vec<u8>), FolioError> {
    let inflated = flate_decompress(idat)
        .map_err(|err| FolioError::ImageDecode(format!("invalid image data in {name}: {err}")))?;
    let channels = if color_type == 6 { 4 } else { 2 };
    let width = width as usize;
    let height = height as usize;
    let line = 1 + channels * width;
    // Header dimensions are untrusted; an overflowing total can never be
    // backed by real scanlines.
    if line
        .checked_mul(height)
        .is_none_or(|needed| inflated.len() < needed)
    {
        return Err(FolioError::ImageDecode(format!(
            "truncated image data in {name}"
        )));
    }
    let color_channels = channels - 1;
    let mut color = Vec::with_capacity((1 + color_channels * width) * height);
    let mut alpha = Vec::with_capacity((1 + width) * height);
    for row in inflated.chunks_exact(line).take(height) {
        color.push(row[0]);
        alpha.push(row[0]);
        for pixel in row[1..].chunks_exact(channels) {
            color.extend_from_slice(&pixel[..color_channels]);
            alpha.push(pixel[color_channels]);
        }
    }
    Ok((color, alpha))
}

/// Walk JPEG segment markers to the first SOF and read the frame header.
/// The file bytes embed verbatim under a DCTDecode filter.
pub(crate) fn parse_jpeg(name: &str, data: &[u8]) -> Result<ImageDescriptor, FolioError> {
    if data.len() < 4 || data[0] != 0xFF || data[1] != 0xD8 {
        return Err(FolioError::ImageDecode(format!("not a JPEG file: {name}")));
    }
    let mut i = 2usize;
    while i + 9 < data.len() {
        if data[i] != 0xFF {
            break;
        }
        let marker = data[i + 1];
        if marker == 0xDA {
            break;
        }
        if (0xC0..=0xCF).contains(&marker) && !matches!(marker, 0xC4 | 0xC8 | 0xCC) {
            let bpc = data[i + 4];
            let height = u32::from(u16::from_be_bytes([data[i + 5], data[i + 6]]));
            let width = u32::from(u16::from_be_bytes([data[i + 7], data[i + 8]]));
            let color_space = match data[i + 9] {
                3 => ColorSpace::DeviceRgb,
                4 => ColorSpace::DeviceCmyk,
                _ => ColorSpace::DeviceGray,
            };
            return Ok(ImageDescriptor {
                width,
                height,
                color_space,
                bits_per_component: bpc,
                filter: Some("DCTDecode"),
                decode_parms: None,
                palette: Vec::new(),
                transparency: Vec::new(),
                data: data.to_vec(),
                soft_mask: None,
            });
        }
        let length = u16::from_be_bytes([data[i + 2], data[i + 3]]) as usize;
        i += 2 + length;
    }
    Err(FolioError::ImageDecode(format!(
        "unsupported JPEG file: {name}"
    )))
}

/// GIF has no native PDF filter; re-encode the first frame as a
/// non-interlaced PNG in memory and reuse the PNG path.
pub(crate) fn parse_gif(name: &str, data: &[u8]) -> Result<ImageDescriptor, FolioError> {
    let decoded = image::load_from_memory_with_format(data, image::ImageFormat::Gif)
        .map_err(|err| FolioError::ImageDecode(format!("invalid GIF file {name}: {err}")))?;
    let mut png = Vec::new();
    decoded
        .write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png)
        .map_err(|err| {
            FolioError::ImageDecode(format!("GIF conversion failed for {name}: {err}"))
        })?;
    parse_png(name, &png)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(kind: &[u8; 4], payload: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&(payload.len() as u32).to_be_bytes());
        out.extend_from_slice(kind);
        out.extend_from_slice(payload);
        // The parser skips the CRC.
        out.extend_from_slice(&[0; 4]);
        out
    }

    fn ihdr(width: u32, height: u32, bpc: u8, color_type: u8) -> Vec<u8> {
        let mut payload = Vec::new();
        payload.extend_from_slice(&width.to_be_bytes());
        payload.extend_from_slice(&height.to_be_bytes());
        payload.extend_from_slice(&[bpc, color_type, 0, 0, 0]);
        chunk(b"IHDR", &payload)
    }

    fn png(parts: &[Vec<u8>]) -> Vec<u8> {
        let mut out = PNG_SIGNATURE.to_vec();
        for part in parts {
            out.extend_from_slice(part);
        }
        out.extend_from_slice(&chunk(b"IEND", &[]));
        out
    }

    #[test]
    fn test_format_detection() {
        assert_eq!(ImageFormat::detect(&PNG_SIGNATURE), Some(ImageFormat::Png));
        assert_eq!(
            ImageFormat::detect(&[0xFF, 0xD8, 0xFF, 0xE0]),
            Some(ImageFormat::Jpeg)
        );
        assert_eq!(ImageFormat::detect(b"GIF89a"), Some(ImageFormat::Gif));
        assert_eq!(ImageFormat::detect(b"BM1234"), None);
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(ImageFormat::from_path("logo.PNG"), Some(ImageFormat::Png));
        assert_eq!(ImageFormat::from_path("photo.jpeg"), Some(ImageFormat::Jpeg));
        assert_eq!(ImageFormat::from_path("a.b.gif"), Some(ImageFormat::Gif));
        assert_eq!(ImageFormat::from_path("noextension"), None);
        assert_eq!(ImageFormat::from_path("image.bmp"), None);
    }

    #[test]
    fn test_gray_png_keeps_stream() {
        let idat = flate_compress(&[0, 0x7F]).unwrap();
        let bytes = png(&[ihdr(1, 1, 8, 0), chunk(b"IDAT", &idat)]);
        let info = parse_png("gray.png", &bytes).unwrap();
        assert_eq!(info.width, 1);
        assert_eq!(info.height, 1);
        assert_eq!(info.color_space, ColorSpace::DeviceGray);
        assert_eq!(info.filter, Some("FlateDecode"));
        assert_eq!(
            info.decode_parms.as_deref(),
            Some("/Predictor 15 /Colors 1 /BitsPerComponent 8 /Columns 1")
        );
        assert_eq!(info.data, idat);
        assert!(info.soft_mask.is_none());
    }

    #[test]
    fn test_rgba_png_splits_alpha() {
        let raw = [0u8, 10, 20, 30, 40, 0, 50, 60, 70, 80];
        let idat = flate_compress(&raw).unwrap();
        let bytes = png(&[ihdr(1, 2, 8, 6), chunk(b"IDAT", &idat)]);
        let info = parse_png("rgba.png", &bytes).unwrap();
        assert_eq!(info.color_space, ColorSpace::DeviceRgb);
        assert!(info.has_alpha());
        let color = flate_decompress(&info.data).unwrap();
        let alpha = flate_decompress(info.soft_mask.as_deref().unwrap()).unwrap();
        assert_eq!(color, vec![0, 10, 20, 30, 0, 50, 60, 70]);
        assert_eq!(alpha, vec![0, 40, 0, 80]);
    }

    #[test]
    fn test_gray_alpha_png_splits_alpha() {
        let raw = [0u8, 9, 200, 0, 11, 100];
        let idat = flate_compress(&raw).unwrap();
        let bytes = png(&[ihdr(1, 2, 8, 4), chunk(b"IDAT", &idat)]);
        let info = parse_png("ga.png", &bytes).unwrap();
        assert_eq!(info.color_space, ColorSpace::DeviceGray);
        let color = flate_decompress(&info.data).unwrap();
        let alpha = flate_decompress(info.soft_mask.as_deref().unwrap()).unwrap();
        assert_eq!(color, vec![0, 9, 0, 11]);
        assert_eq!(alpha, vec![0, 200, 0, 100]);
    }

    #[test]
    fn test_indexed_png_requires_palette() {
        let idat = flate_compress(&[0, 0]).unwrap();
        let bytes = png(&[ihdr(1, 1, 8, 3), chunk(b"IDAT", &idat)]);
        let err = parse_png("pal.png", &bytes).expect_err("palette missing");
        assert!(err.to_string().contains("missing palette in pal.png"));
    }

    #[test]
    fn test_partial_palette_rejected() {
        let idat = flate_compress(&[0, 0]).unwrap();
        let bytes = png(&[
            ihdr(1, 1, 8, 3),
            chunk(b"PLTE", &[255, 0]),
            chunk(b"IDAT", &idat),
        ]);
        let err = parse_png("pal.png", &bytes).expect_err("palette cut mid-triple");
        assert!(err.to_string().contains("malformed palette in pal.png"));
    }

    #[test]
    fn test_indexed_png_reads_palette_and_transparency() {
        let idat = flate_compress(&[0, 1]).unwrap();
        let palette = [255, 0, 0, 0, 255, 0];
        let bytes = png(&[
            ihdr(1, 1, 8, 3),
            chunk(b"PLTE", &palette),
            chunk(b"tRNS", &[255, 0]),
            chunk(b"IDAT", &idat),
        ]);
        let info = parse_png("pal.png", &bytes).unwrap();
        assert_eq!(info.color_space, ColorSpace::Indexed);
        assert_eq!(info.palette, palette);
        assert_eq!(info.transparency, vec![1]);
    }

    #[test]
    fn test_rgb_color_key_transparency() {
        let idat = flate_compress(&[0, 1, 2, 3]).unwrap();
        let bytes = png(&[
            ihdr(1, 1, 8, 2),
            chunk(b"tRNS", &[0, 10, 0, 20, 0, 30]),
            chunk(b"IDAT", &idat),
        ]);
        let info = parse_png("key.png", &bytes).unwrap();
        assert_eq!(info.transparency, vec![10, 20, 30]);
    }

    #[test]
    fn test_png_rejections() {
        let err = parse_png("x.png", b"not a png").expect_err("bad signature");
        assert!(err.to_string().contains("not a PNG file"));

        let bytes = png(&[ihdr(1, 1, 16, 0)]);
        let err = parse_png("deep.png", &bytes).expect_err("16-bit");
        assert!(err.to_string().contains("16-bit depth not supported"));

        let mut payload = Vec::new();
        payload.extend_from_slice(&1u32.to_be_bytes());
        payload.extend_from_slice(&1u32.to_be_bytes());
        payload.extend_from_slice(&[8, 0, 0, 0, 1]);
        let bytes = png(&[chunk(b"IHDR", &payload)]);
        let err = parse_png("adam7.png", &bytes).expect_err("interlaced");
        assert!(err.to_string().contains("interlacing not supported"));
    }

    #[test]
    fn test_implausible_dimensions_rejected() {
        let idat = flate_compress(&[0, 1, 2, 3, 4]).unwrap();
        let bytes = png(&[ihdr(u32::MAX, u32::MAX, 8, 6), chunk(b"IDAT", &idat)]);
        let err = parse_png("huge.png", &bytes).expect_err("header larger than any buffer");
        assert!(err.to_string().contains("truncated image data in huge.png"));
    }

    #[test]
    fn test_zero_dimensions_rejected() {
        let idat = flate_compress(&[0]).unwrap();
        let bytes = png(&[ihdr(0, 1, 8, 0), chunk(b"IDAT", &idat)]);
        let err = decode("empty.png", &bytes, ImageFormat::Png).expect_err("zero width");
        assert!(err.to_string().contains("zero dimensions: empty.png"));
    }

    #[test]
    fn test_png_skips_unknown_chunks() {
        let idat = flate_compress(&[0, 0x33]).unwrap();
        let bytes = png(&[
            ihdr(1, 1, 8, 0),
            chunk(b"gAMA", &[0, 1, 134, 160]),
            chunk(b"IDAT", &idat),
        ]);
        let info = parse_png("meta.png", &bytes).unwrap();
        assert_eq!(info.data, idat);
    }

    #[test]
    fn test_jpeg_header_scan() {
        let mut data = vec![0xFF, 0xD8];
        data.extend_from_slice(&[0xFF, 0xE0, 0x00, 0x04, 0x4A, 0x46]);
        data.extend_from_slice(&[0xFF, 0xC0, 0x00, 0x11, 8, 0x00, 0x20, 0x00, 0x10, 3]);
        data.extend_from_slice(&[1, 0x22, 0, 2, 0x11, 1, 3, 0x11, 1]);
        let info = parse_jpeg("photo.jpg", &data).unwrap();
        assert_eq!(info.width, 16);
        assert_eq!(info.height, 32);
        assert_eq!(info.bits_per_component, 8);
        assert_eq!(info.color_space, ColorSpace::DeviceRgb);
        assert_eq!(info.filter, Some("DCTDecode"));
        assert_eq!(info.data, data);
    }

    #[test]
    fn test_jpeg_cmyk_and_gray() {
        let mut cmyk = vec![0xFF, 0xD8];
        cmyk.extend_from_slice(&[0xFF, 0xC2, 0x00, 0x0E, 8, 0x00, 0x08, 0x00, 0x08, 4]);
        cmyk.extend_from_slice(&[0; 8]);
        let info = parse_jpeg("press.jpg", &cmyk).unwrap();
        assert_eq!(info.color_space, ColorSpace::DeviceCmyk);

        let mut gray = vec![0xFF, 0xD8];
        gray.extend_from_slice(&[0xFF, 0xC1, 0x00, 0x0B, 8, 0x00, 0x08, 0x00, 0x08, 1]);
        gray.extend_from_slice(&[0; 8]);
        let info = parse_jpeg("mono.jpg", &gray).unwrap();
        assert_eq!(info.color_space, ColorSpace::DeviceGray);
    }

    #[test]
    fn test_jpeg_rejects_other_formats() {
        let err = parse_jpeg("x.jpg", &PNG_SIGNATURE).expect_err("png bytes");
        assert!(err.to_string().contains("not a JPEG file: x.jpg"));
    }

    #[test]
    fn test_gif_reencodes_through_png() {
        let frame = image::RgbaImage::from_pixel(2, 1, image::Rgba([255, 0, 0, 255]));
        let mut gif = Vec::new();
        image::DynamicImage::ImageRgba8(frame)
            .write_to(&mut std::io::Cursor::new(&mut gif), image::ImageFormat::Gif)
            .unwrap();
        let info = decode("dot.gif", &gif, ImageFormat::Gif).unwrap();
        assert_eq!(info.width, 2);
        assert_eq!(info.height, 1);
        assert_eq!(info.filter, Some("FlateDecode"));
    }
}
