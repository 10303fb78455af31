use super::{Result, Error, Image};
use super::chunk::{ChunkType, ChunkWriter};
use super::header::{Header, MAX_DIMENSIONS};
use super::pixel::{ColorMode, Palette, PixelFormat};
use super::scanline::{encode_row, FilterStrategy};
use super::zlib::{self, Compression};

use log::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodeOptions {
    /// `None` picks the smallest mode that holds every pixel exactly
    pub color_mode: Option<ColorMode>,
    pub filter: FilterStrategy,
    pub compression: Compression,
    /// largest payload per data chunk
    pub max_idat_len: usize,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self {
            color_mode: None,
            filter: FilterStrategy::default(),
            compression: Compression::default(),
            max_idat_len: 1 << 16,
        }
    }
}

fn choose_mode(image: &Image, palette: &Option<Palette>) -> ColorMode {
    if palette.is_some() {
        ColorMode::Indexed
    } else if image.pixels.iter().all(|p| p.is_opaque()) {
        ColorMode::Truecolor
    } else {
        ColorMode::TruecolorAlpha
    }
}

/// Serialize the canonical buffer: signature, IHDR, PLTE/tRNS when indexed,
/// one or more IDAT, IEND.
pub fn encode(image: &Image, options: &EncodeOptions) -> Result<Vec<u8>> {
    image.check()?;
    if image.width > MAX_DIMENSIONS as usize || image.height > MAX_DIMENSIONS as usize {
        return Err(Error::too_large(format!("{}x{} exceeds the {} pixel side limit", image.width, image.height, MAX_DIMENSIONS)));
    }
    if options.max_idat_len == 0 {
        return Err(Error::invalid_image("max_idat_len must be positive"));
    }

    let palette = match options.color_mode {
        None | Some(ColorMode::Indexed) => Palette::from_pixels(&image.pixels),
        _ => None,
    };
    let mode = match options.color_mode {
        Some(ColorMode::Indexed) if palette.is_none() => {
            return Err(Error::invalid_image("more than 256 distinct colors for an indexed image"));
        },
        Some(mode) => mode,
        None => choose_mode(image, &palette),
    };
    let header = Header::new(image.width as u32, image.height as u32, mode);
    header.ensure_supported()?;
    let format = PixelFormat::resolve(mode, palette.as_ref(), None)?;

    let bpp = format.bytes_per_pixel();
    let stride = header.stride()?;
    let mut raw = Vec::with_capacity(header.raw_len()?);
    let (mut prev, mut cur) = (vec![0u8; stride], Vec::with_capacity(stride));
    let mut scratch = Vec::with_capacity(stride);
    for (y, row) in image.rows().enumerate() {
        cur.clear();
        format.pack_row(y, row, &mut cur)?;
        encode_row(options.filter, bpp, &prev, &cur, &mut raw, &mut scratch);
        std::mem::swap(&mut prev, &mut cur);
    }

    let compressed = zlib::compress(&raw, options.compression);
    debug!(
        "encoding {}x{} as {:?}: {} scanline bytes -> {} compressed",
        image.width, image.height, mode, raw.len(), compressed.len()
    );

    let mut w = ChunkWriter::with_capacity(compressed.len() + 1024);
    w.write_chunk(ChunkType::IHDR, &header.to_bytes())?;
    if let Some(palette) = format_palette(&format) {
        w.write_chunk(ChunkType::PLTE, &palette.plte_bytes())?;
        if let Some(trns) = palette.trns_bytes() {
            w.write_chunk(ChunkType::TRNS, &trns)?;
        }
    }
    for part in compressed.chunks(options.max_idat_len) {
        w.write_chunk(ChunkType::IDAT, part)?;
    }
    w.write_chunk(ChunkType::IEND, &[])?;
    Ok(w.finish())
}

fn format_palette<'p>(format: &PixelFormat<'p>) -> Option<&'p Palette> {
    match *format {
        PixelFormat::Indexed(palette) => Some(palette),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::chunk::read_chunks;
    use crate::image::scanline::FilterType;
    use crate::image::{ErrorKind, Rgba};

    fn gradient(width: usize, height: usize, alpha: bool) -> Image {
        let pixels = (0..width * height)
            .map(|i| {
                let (x, y) = ((i % width) as u8, (i / width) as u8);
                Rgba::new(x.wrapping_mul(40), y.wrapping_mul(30), x ^ y, if alpha { x.wrapping_mul(60) } else { 255 })
            })
            .collect();
        Image::new(width, height, pixels).unwrap()
    }

    fn kinds(bytes: &[u8]) -> Vec<ChunkType> {
        read_chunks(bytes, true).unwrap().iter().map(|c| c.kind).collect()
    }

    #[test]
    fn auto_mode_prefers_indexed_for_few_colors() {
        let img = Image::filled(3, 2, Rgba::opaque(10, 20, 30));
        let bytes = encode(&img, &EncodeOptions::default()).unwrap();
        assert_eq!(kinds(&bytes), vec![ChunkType::IHDR, ChunkType::PLTE, ChunkType::IDAT, ChunkType::IEND]);
    }

    #[test]
    fn transparent_palette_writes_trns() {
        let mut img = Image::filled(2, 2, Rgba::opaque(1, 2, 3));
        img.pixels[3] = Rgba::new(0, 0, 0, 0);
        let bytes = encode(&img, &EncodeOptions::default()).unwrap();
        assert_eq!(kinds(&bytes), vec![ChunkType::IHDR, ChunkType::PLTE, ChunkType::TRNS, ChunkType::IDAT, ChunkType::IEND]);
    }

    #[test]
    fn forced_modes_round_trip() {
        let img = gradient(7, 5, false);
        for &mode in [ColorMode::Truecolor, ColorMode::TruecolorAlpha, ColorMode::Indexed].iter() {
            let opts = EncodeOptions { color_mode: Some(mode), ..EncodeOptions::default() };
            let bytes = encode(&img, &opts).unwrap();
            let ctx = crate::image::Context::parse(&bytes, Default::default()).unwrap();
            assert_eq!(ctx.header().color_mode, mode);
            assert_eq!(ctx.decode().unwrap(), img);
        }
    }

    #[test]
    fn every_fixed_filter_round_trips() {
        let img = gradient(9, 6, true);
        for &filter in FilterType::ALL.iter() {
            let opts = EncodeOptions {
                color_mode: Some(ColorMode::TruecolorAlpha),
                filter: FilterStrategy::Fixed(filter),
                compression: Compression::Store,
                ..EncodeOptions::default()
            };
            let bytes = encode(&img, &opts).unwrap();
            assert_eq!(Image::decode(&bytes).unwrap(), img, "{:?}", filter);
        }
    }

    #[test]
    fn splits_data_into_several_chunks() {
        let img = gradient(40, 40, true);
        let opts = EncodeOptions { max_idat_len: 100, compression: Compression::Store, ..EncodeOptions::default() };
        let bytes = encode(&img, &opts).unwrap();
        let idats = kinds(&bytes).into_iter().filter(|k| *k == ChunkType::IDAT).count();
        assert!(idats > 1);
        assert_eq!(Image::decode(&bytes).unwrap(), img);
    }

    #[test]
    fn impossible_forced_modes() {
        let img = gradient(4, 4, true);
        let opts = EncodeOptions { color_mode: Some(ColorMode::Truecolor), ..EncodeOptions::default() };
        assert_eq!(encode(&img, &opts).unwrap_err().kind(), ErrorKind::InvalidImage);

        let opts = EncodeOptions { color_mode: Some(ColorMode::GrayscaleAlpha), ..EncodeOptions::default() };
        assert_eq!(encode(&img, &opts).unwrap_err().kind(), ErrorKind::UnsupportedColorMode);

        let many = gradient(20, 20, true);
        let opts = EncodeOptions { color_mode: Some(ColorMode::Indexed), ..EncodeOptions::default() };
        assert_eq!(encode(&many, &opts).unwrap_err().kind(), ErrorKind::InvalidImage);
    }

    #[test]
    fn rejects_empty_image() {
        let img = Image { width: 0, height: 3, pixels: vec![] };
        assert_eq!(encode(&img, &EncodeOptions::default()).unwrap_err().kind(), ErrorKind::InvalidImage);
    }
}
