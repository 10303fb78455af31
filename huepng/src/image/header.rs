use super::{Result, Error};
use super::pixel::ColorMode;

pub const MAX_DIMENSIONS: u32 = 1 << 24;

/// Contents of the header chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub width: u32,
    pub height: u32,
    pub bit_depth: u8,
    pub color_mode: ColorMode,
    pub interlaced: bool,
}

impl Header {
    pub const LEN: usize = 13;

    pub fn new(width: u32, height: u32, color_mode: ColorMode) -> Self {
        Self { width, height, bit_depth: 8, color_mode, interlaced: false }
    }

    /// Parse a header payload. Accepts every combination the container format
    /// allows; whether this codec can decode it is `ensure_supported`'s call.
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() != Self::LEN {
            return Err(Error::malformed(format!("header chunk is {} bytes, expected {}", data.len(), Self::LEN)));
        }
        let width = u32::from_be_bytes([data[0], data[1], data[2], data[3]]);
        let height = u32::from_be_bytes([data[4], data[5], data[6], data[7]]);
        let (bit_depth, color, comp, filter, interlace) = (data[8], data[9], data[10], data[11], data[12]);

        if width == 0 || height == 0 { return Err(Error::malformed(format!("0-pixel image ({}x{})", width, height))); }
        if width > MAX_DIMENSIONS || height > MAX_DIMENSIONS {
            return Err(Error::too_large(format!("{}x{} exceeds the {} pixel side limit", width, height, MAX_DIMENSIONS)));
        }

        let color_mode = ColorMode::from_type_byte(color)
            .ok_or_else(|| Error::malformed(format!("bad color type {}", color)))?;
        let depth_ok = match color_mode {
            ColorMode::Grayscale => [1, 2, 4, 8, 16].contains(&bit_depth),
            ColorMode::Indexed => [1, 2, 4, 8].contains(&bit_depth),
            _ => bit_depth == 8 || bit_depth == 16,
        };
        if !depth_ok { return Err(Error::malformed(format!("bit depth {} invalid for {:?}", bit_depth, color_mode))); }
        if comp != 0 { return Err(Error::malformed(format!("bad compression method {}", comp))); }
        if filter != 0 { return Err(Error::malformed(format!("bad filter method {}", filter))); }
        if interlace > 1 { return Err(Error::malformed(format!("bad interlace method {}", interlace))); }

        Ok(Self { width, height, bit_depth, color_mode, interlaced: interlace == 1 })
    }

    /// Reject headers outside the 8-bit, non-interlaced, colour subset.
    pub fn ensure_supported(&self) -> Result<()> {
        if self.bit_depth != 8 {
            return Err(Error::unsupported_depth(format!("{}-bit samples, only 8-bit is supported", self.bit_depth)));
        }
        if self.interlaced {
            return Err(Error::interlaced("interlaced images are not supported"));
        }
        match self.color_mode {
            ColorMode::Grayscale | ColorMode::GrayscaleAlpha => {
                Err(Error::unsupported_color(format!("{:?} images are not supported", self.color_mode)))
            },
            _ => Ok(()),
        }
    }

    pub fn to_bytes(&self) -> [u8; 13] {
        let mut out = [0u8; 13];
        out[0..4].copy_from_slice(&self.width.to_be_bytes());
        out[4..8].copy_from_slice(&self.height.to_be_bytes());
        out[8] = self.bit_depth;
        out[9] = self.color_mode.type_byte();
        out[12] = self.interlaced as u8;
        out
    }

    pub fn bytes_per_pixel(&self) -> usize {
        self.color_mode.channels()
    }

    /// Bytes in one unfiltered row.
    pub fn stride(&self) -> Result<usize> {
        (self.width as usize)
            .checked_mul(self.bytes_per_pixel())
            .ok_or_else(|| Error::too_large("row size overflows"))
    }

    /// Size of the decompressed payload: every row plus its filter tag.
    pub fn raw_len(&self) -> Result<usize> {
        self.stride()?
            .checked_add(1)
            .and_then(|n| n.checked_mul(self.height as usize))
            .ok_or_else(|| Error::too_large(format!("{}x{} image overflows", self.width, self.height)))
    }
}
