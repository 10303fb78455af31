pub mod error;
pub mod crc;
pub mod zlib;
pub mod chunk;
pub mod header;
pub mod pixel;
pub mod scanline;
pub mod context;
pub mod encoder;

pub use error::{Error, ErrorKind};
pub use context::{Context, DecodeOptions};
pub use encoder::{encode, EncodeOptions};
pub use header::Header;
pub use pixel::{ColorMode, Palette, Rgba};
pub use scanline::{FilterStrategy, FilterType};
pub use zlib::Compression;

use std::io::{Read, Write};
use std::path::Path;

pub type Result<T> = std::result::Result<T, Error>;

/// Canonical pixel buffer: row-major RGBA, `width * height` entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    pub width: usize,
    pub height: usize,
    pub pixels: Vec<Rgba>,
}

impl Image {
    pub fn new(width: usize, height: usize, pixels: Vec<Rgba>) -> Result<Self> {
        let img = Self { width, height, pixels };
        img.check()?;
        Ok(img)
    }

    pub fn filled(width: usize, height: usize, color: Rgba) -> Self {
        Self { width, height, pixels: vec![color; width * height] }
    }

    /// From a flat `r, g, b, a, r, g, ...` byte buffer.
    pub fn from_rgba_bytes(width: usize, height: usize, bytes: &[u8]) -> Result<Self> {
        if bytes.len() % 4 != 0 {
            return Err(Error::invalid_image(format!("{} bytes is not a whole number of RGBA pixels", bytes.len())));
        }
        let pixels = bytes.chunks_exact(4).map(|p| Rgba::new(p[0], p[1], p[2], p[3])).collect();
        Self::new(width, height, pixels)
    }

    pub fn to_rgba_bytes(&self) -> Vec<u8> {
        self.pixels.iter().flat_map(|p| vec![p.r, p.g, p.b, p.a]).collect()
    }

    pub(crate) fn check(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(Error::invalid_image(format!("0-pixel image ({}x{})", self.width, self.height)));
        }
        let expected = self.width.checked_mul(self.height).ok_or_else(|| Error::too_large("pixel count overflows"))?;
        if self.pixels.len() != expected {
            return Err(Error::invalid_image(format!(
                "{}x{} image needs {} pixels, buffer holds {}", self.width, self.height, expected, self.pixels.len()
            )));
        }
        Ok(())
    }

    pub fn get(&self, x: usize, y: usize) -> Option<Rgba> {
        if x >= self.width || y >= self.height { return None; }
        self.pixels.get(y * self.width + x).copied()
    }

    pub fn rows(&self) -> std::slice::ChunksExact<'_, Rgba> {
        self.pixels.chunks_exact(self.width.max(1))
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        Self::decode_with(bytes, DecodeOptions::default())
    }

    pub fn decode_with(bytes: &[u8], options: DecodeOptions) -> Result<Self> {
        Context::parse(bytes, options)?.decode()
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        encode(self, &EncodeOptions::default())
    }

    pub fn encode_with(&self, options: &EncodeOptions) -> Result<Vec<u8>> {
        encode(self, options)
    }

    pub fn load<P: AsRef<Path>>(fname: P) -> Result<Self> {
        let mut bytes = vec![];
        std::fs::File::open(fname)?.read_to_end(&mut bytes)?;
        Self::decode(&bytes)
    }

    pub fn save<P: AsRef<Path>>(&self, fname: P) -> Result<()> {
        let bytes = self.encode()?;
        let mut f = std::fs::File::create(fname)?;
        f.write_all(&bytes)?;
        f.flush()?;
        Ok(())
    }
}
