use super::{Result, Error, Image};
use super::chunk::{ChunkReader, ChunkType};
use super::header::Header;
use super::pixel::{ColorMode, Palette, PixelFormat};
use super::scanline::decode_rows;
use super::zlib;

use log::{debug, trace};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeOptions {
    /// recompute every chunk crc and fail on mismatch
    pub verify_crc: bool,
    /// check the zlib adler-32 trailer of the scanline payload
    pub verify_adler: bool,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self { verify_crc: true, verify_adler: true }
    }
}

/// Everything the chunk walk collects, held read-only for one decode.
#[derive(Debug)]
pub struct Context {
    header: Header,
    palette: Option<Palette>,
    color_key: Option<[u8; 3]>,
    idata: Vec<u8>,
    options: DecodeOptions,
}

impl Context {
    pub fn parse(bytes: &[u8], options: DecodeOptions) -> Result<Self> {
        let mut reader = ChunkReader::new(bytes, options.verify_crc)?;

        let mut header: Option<Header> = None;
        let mut plte: Option<&[u8]> = None;
        let mut trns: Option<&[u8]> = None;
        let mut color_key = None;
        let mut idata = vec![];
        let mut seen_idat = false;
        let mut seen_iend = false;
        let mut last_kind = None;

        for chunk in &mut reader {
            let chunk = chunk?;
            let at = chunk.offset;

            if header.is_none() && chunk.kind != ChunkType::IHDR {
                return Err(Error::malformed(format!("first chunk is {}, not IHDR", chunk.kind)).at(at));
            }

            match chunk.kind {
                ChunkType::IHDR => {
                    if header.is_some() { return Err(Error::malformed("multiple IHDR").at(at)); }
                    let h = Header::parse(chunk.data).map_err(|e| e.at(at))?;
                    h.ensure_supported().map_err(|e| e.at(at))?;
                    debug!("header {}x{} {:?}", h.width, h.height, h.color_mode);
                    header = Some(h);
                },
                ChunkType::PLTE => {
                    if plte.is_some() { return Err(Error::malformed("multiple PLTE").at(at)); }
                    if seen_idat { return Err(Error::malformed("PLTE after IDAT").at(at)); }
                    if chunk.data.is_empty() || chunk.data.len() > 256 * 3 || chunk.data.len() % 3 != 0 {
                        return Err(Error::malformed(format!("invalid PLTE length {}", chunk.data.len())).at(at));
                    }
                    plte = Some(chunk.data);
                },
                ChunkType::TRNS => {
                    if seen_idat { return Err(Error::malformed("tRNS after IDAT").at(at)); }
                    if trns.is_some() || color_key.is_some() { return Err(Error::malformed("multiple tRNS").at(at)); }
                    match header.map(|h| h.color_mode) {
                        Some(ColorMode::Indexed) => {
                            let pal_len = plte.ok_or_else(|| Error::malformed("tRNS before PLTE").at(at))?.len() / 3;
                            if chunk.data.len() > pal_len {
                                return Err(Error::malformed(format!("tRNS has {} entries for {} colors", chunk.data.len(), pal_len)).at(at));
                            }
                            trns = Some(chunk.data);
                        },
                        Some(ColorMode::Truecolor) => {
                            if chunk.data.len() != 6 { return Err(Error::malformed("bad tRNS len").at(at)); }
                            // 16-bit samples; at depth 8 only the low byte is meaningful
                            let d = chunk.data;
                            color_key = Some([d[1], d[3], d[5]]);
                        },
                        _ => return Err(Error::malformed("tRNS with alpha").at(at)),
                    }
                },
                ChunkType::IDAT => {
                    if header.map(|h| h.color_mode) == Some(ColorMode::Indexed) && plte.is_none() {
                        return Err(Error::malformed("no PLTE").at(at));
                    }
                    if seen_idat && last_kind != Some(ChunkType::IDAT) {
                        return Err(Error::malformed("IDAT chunks are not consecutive").at(at));
                    }
                    seen_idat = true;
                    idata.extend_from_slice(chunk.data);
                },
                ChunkType::IEND => {
                    if !chunk.data.is_empty() {
                        return Err(Error::malformed(format!("IEND carries {} bytes", chunk.data.len())).at(at));
                    }
                    seen_iend = true;
                },
                kind if kind.is_ancillary() => {
                    trace!("skipping ancillary chunk {}", kind);
                },
                kind => {
                    return Err(Error::unsupported_chunk(format!("unknown critical chunk {}", kind)).at(at));
                },
            }
            last_kind = Some(chunk.kind);
        }

        if !seen_iend { return Err(Error::malformed("missing IEND").at(reader.offset())); }
        if reader.offset() < bytes.len() {
            debug!("ignoring {} bytes after IEND", bytes.len() - reader.offset());
        }
        let header = header.ok_or_else(|| Error::malformed("missing IHDR"))?;
        if !seen_idat { return Err(Error::malformed("no IDAT")); }

        let palette = match (header.color_mode, plte) {
            (ColorMode::Indexed, Some(plte)) => Some(Palette::from_chunks(plte, trns)?),
            (_, Some(_)) => {
                debug!("ignoring suggested palette on a {:?} image", header.color_mode);
                None
            },
            _ => None,
        };

        Ok(Self { header, palette, color_key, idata, options })
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn palette(&self) -> Option<&Palette> {
        self.palette.as_ref()
    }

    /// Inflate the data payload and reconstruct the canonical buffer.
    pub fn decode(&self) -> Result<Image> {
        let h = &self.header;
        let format = PixelFormat::resolve(h.color_mode, self.palette.as_ref(), self.color_key)?;
        let stride = h.stride()?;
        let raw_len = h.raw_len()?;
        let (width, height) = (h.width as usize, h.height as usize);

        let expanded = zlib::decompress(&self.idata, raw_len, self.options.verify_adler)?;
        debug!("inflated {} -> {} bytes (expected {})", self.idata.len(), expanded.len(), raw_len);
        if expanded.len() < raw_len {
            return Err(Error::truncated(format!(
                "decompressed payload is {} bytes, {}x{} {:?} needs {}", expanded.len(), width, height, h.color_mode, raw_len
            )).at(expanded.len()));
        }

        // payload length now vouches for the header dimensions
        let mut pixels = Vec::with_capacity(width * height);
        decode_rows(&expanded, stride, height, format.bytes_per_pixel(), |y, row| {
            format.unpack_row(y, row, &mut pixels)
        })?;

        Image::new(width, height, pixels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::chunk::ChunkWriter;
    use crate::image::zlib::{compress, Compression};
    use crate::image::{ErrorKind, Rgba};

    fn container(chunks: &[(ChunkType, Vec<u8>)]) -> Vec<u8> {
        let mut w = ChunkWriter::new();
        for (kind, data) in chunks {
            w.write_chunk(*kind, data).unwrap();
        }
        w.finish()
    }

    fn ihdr(width: u32, height: u32, mode: ColorMode) -> (ChunkType, Vec<u8>) {
        (ChunkType::IHDR, Header::new(width, height, mode).to_bytes().to_vec())
    }

    fn idat(raw: &[u8]) -> (ChunkType, Vec<u8>) {
        (ChunkType::IDAT, compress(raw, Compression::Fast))
    }

    fn iend() -> (ChunkType, Vec<u8>) {
        (ChunkType::IEND, vec![])
    }

    #[test]
    fn decodes_truecolor_alpha() {
        let bytes = container(&[
            ihdr(2, 1, ColorMode::TruecolorAlpha),
            idat(&[0, 1, 2, 3, 4, 5, 6, 7, 8]),
            iend(),
        ]);
        let img = Context::parse(&bytes, DecodeOptions::default()).unwrap().decode().unwrap();
        assert_eq!(img.pixels, vec![Rgba::new(1, 2, 3, 4), Rgba::new(5, 6, 7, 8)]);
    }

    #[test]
    fn data_may_span_several_chunks() {
        let z = compress(&[0, 9, 8, 7, 0, 6, 5, 4], Compression::Fast);
        let (a, b) = z.split_at(3);
        let bytes = container(&[
            ihdr(1, 2, ColorMode::Truecolor),
            (ChunkType::IDAT, a.to_vec()),
            (ChunkType::IDAT, b.to_vec()),
            iend(),
        ]);
        let img = Context::parse(&bytes, DecodeOptions::default()).unwrap().decode().unwrap();
        assert_eq!(img.pixels, vec![Rgba::opaque(9, 8, 7), Rgba::opaque(6, 5, 4)]);
    }

    #[test]
    fn truecolor_color_key() {
        let bytes = container(&[
            ihdr(2, 1, ColorMode::Truecolor),
            (ChunkType::TRNS, vec![0, 4, 0, 5, 0, 6]),
            idat(&[0, 1, 2, 3, 4, 5, 6]),
            iend(),
        ]);
        let img = Context::parse(&bytes, DecodeOptions::default()).unwrap().decode().unwrap();
        assert_eq!(img.pixels, vec![Rgba::opaque(1, 2, 3), Rgba::new(4, 5, 6, 0)]);
    }

    #[test]
    fn header_must_come_first() {
        let bytes = container(&[idat(&[0, 0, 0, 0]), ihdr(1, 1, ColorMode::Truecolor), iend()]);
        let err = Context::parse(&bytes, DecodeOptions::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedContainer);
        assert_eq!(err.offset(), Some(8));
    }

    #[test]
    fn palette_after_data_is_rejected() {
        let bytes = container(&[
            ihdr(1, 1, ColorMode::Indexed),
            (ChunkType::PLTE, vec![1, 2, 3]),
            idat(&[0, 0]),
            (ChunkType::PLTE, vec![1, 2, 3]),
            iend(),
        ]);
        assert_eq!(Context::parse(&bytes, DecodeOptions::default()).unwrap_err().kind(), ErrorKind::MalformedContainer);
    }

    #[test]
    fn indexed_without_palette() {
        let bytes = container(&[ihdr(1, 1, ColorMode::Indexed), idat(&[0, 0]), iend()]);
        assert_eq!(Context::parse(&bytes, DecodeOptions::default()).unwrap_err().kind(), ErrorKind::MalformedContainer);
    }

    #[test]
    fn index_past_palette_fails_decode() {
        let bytes = container(&[
            ihdr(2, 1, ColorMode::Indexed),
            (ChunkType::PLTE, vec![1, 2, 3]),
            idat(&[0, 0, 1]),
            iend(),
        ]);
        let ctx = Context::parse(&bytes, DecodeOptions::default()).unwrap();
        assert_eq!(ctx.decode().unwrap_err().kind(), ErrorKind::PaletteIndexOutOfBounds);
    }

    #[test]
    fn grayscale_fails_at_header() {
        let bytes = container(&[ihdr(1, 1, ColorMode::Grayscale), idat(&[0, 0]), iend()]);
        assert_eq!(Context::parse(&bytes, DecodeOptions::default()).unwrap_err().kind(), ErrorKind::UnsupportedColorMode);
    }

    #[test]
    fn unknown_chunks() {
        let ancillary = container(&[
            ihdr(1, 1, ColorMode::Truecolor),
            (ChunkType(*b"gAMA"), vec![0, 0, 0, 1]),
            idat(&[0, 1, 2, 3]),
            iend(),
        ]);
        assert!(Context::parse(&ancillary, DecodeOptions::default()).is_ok());

        let critical = container(&[
            ihdr(1, 1, ColorMode::Truecolor),
            (ChunkType(*b"ZZZZ"), vec![]),
            idat(&[0, 1, 2, 3]),
            iend(),
        ]);
        assert_eq!(Context::parse(&critical, DecodeOptions::default()).unwrap_err().kind(), ErrorKind::UnsupportedChunk);
    }

    #[test]
    fn huge_header_with_tiny_payload() {
        let side = crate::image::header::MAX_DIMENSIONS;
        let bytes = container(&[ihdr(side, side, ColorMode::TruecolorAlpha), idat(&[0; 5]), iend()]);
        let ctx = Context::parse(&bytes, DecodeOptions::default()).unwrap();
        assert_eq!(ctx.decode().unwrap_err().kind(), ErrorKind::TruncatedScanlineData);
    }

    #[test]
    fn payload_larger_than_image_is_rejected() {
        let bytes = container(&[ihdr(1, 1, ColorMode::TruecolorAlpha), idat(&vec![0; 1 << 20]), iend()]);
        let ctx = Context::parse(&bytes, DecodeOptions::default()).unwrap();
        assert_eq!(ctx.decode().unwrap_err().kind(), ErrorKind::MalformedContainer);

        // one byte over is already too much
        let bytes = container(&[ihdr(1, 1, ColorMode::TruecolorAlpha), idat(&[0; 6]), iend()]);
        let ctx = Context::parse(&bytes, DecodeOptions::default()).unwrap();
        assert_eq!(ctx.decode().unwrap_err().kind(), ErrorKind::MalformedContainer);
    }

    #[test]
    fn data_chunks_must_be_consecutive() {
        let z = compress(&[0, 9, 8, 7], Compression::Fast);
        let (a, b) = z.split_at(3);
        let bytes = container(&[
            ihdr(1, 1, ColorMode::Truecolor),
            (ChunkType::IDAT, a.to_vec()),
            (ChunkType(*b"tEXt"), b"k\0v".to_vec()),
            (ChunkType::IDAT, b.to_vec()),
            iend(),
        ]);
        let err = Context::parse(&bytes, DecodeOptions::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedContainer);

        let trailing = container(&[
            ihdr(1, 1, ColorMode::Truecolor),
            idat(&[0, 9, 8, 7]),
            (ChunkType(*b"tEXt"), b"k\0v".to_vec()),
            iend(),
        ]);
        assert!(Context::parse(&trailing, DecodeOptions::default()).is_ok());
    }

    #[test]
    fn end_marker_must_be_empty() {
        let bytes = container(&[ihdr(1, 1, ColorMode::Truecolor), idat(&[0, 1, 2, 3]), (ChunkType::IEND, vec![0])]);
        let err = Context::parse(&bytes, DecodeOptions::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedContainer);
        assert!(err.offset().is_some());
    }

    #[test]
    fn short_payload_is_truncated_scanline_data() {
        let bytes = container(&[ihdr(2, 2, ColorMode::Truecolor), idat(&[0, 1, 2, 3, 4, 5, 6]), iend()]);
        let ctx = Context::parse(&bytes, DecodeOptions::default()).unwrap();
        assert_eq!(ctx.decode().unwrap_err().kind(), ErrorKind::TruncatedScanlineData);
    }
}
