use super::{Result, Error};
use bitflags::bitflags;
use std::collections::{HashMap, HashSet};

bitflags! {
    /// Bits of the header's colour-type byte.
    pub struct ColorBits: u8 {
        const PALETTE = 0b001;
        const COLOR   = 0b010;
        const ALPHA   = 0b100;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColorMode {
    Grayscale,
    Truecolor,
    Indexed,
    GrayscaleAlpha,
    TruecolorAlpha,
}

impl ColorMode {
    pub fn from_type_byte(byte: u8) -> Option<Self> {
        let bits = ColorBits::from_bits(byte)?;
        let mode = match (bits.contains(ColorBits::PALETTE), bits.contains(ColorBits::COLOR), bits.contains(ColorBits::ALPHA)) {
            (false, false, false) => ColorMode::Grayscale,
            (false, true,  false) => ColorMode::Truecolor,
            (true,  true,  false) => ColorMode::Indexed,
            (false, false, true ) => ColorMode::GrayscaleAlpha,
            (false, true,  true ) => ColorMode::TruecolorAlpha,
            _ => return None,
        };
        Some(mode)
    }

    pub fn bits(self) -> ColorBits {
        match self {
            ColorMode::Grayscale      => ColorBits::empty(),
            ColorMode::Truecolor      => ColorBits::COLOR,
            ColorMode::Indexed        => ColorBits::PALETTE | ColorBits::COLOR,
            ColorMode::GrayscaleAlpha => ColorBits::ALPHA,
            ColorMode::TruecolorAlpha => ColorBits::COLOR | ColorBits::ALPHA,
        }
    }

    pub fn type_byte(self) -> u8 {
        self.bits().bits()
    }

    /// Samples per pixel on the wire.
    pub fn channels(self) -> usize {
        match self {
            ColorMode::Grayscale | ColorMode::Indexed => 1,
            ColorMode::GrayscaleAlpha => 2,
            ColorMode::Truecolor => 3,
            ColorMode::TruecolorAlpha => 4,
        }
    }
}

/// One canonical pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub const fn opaque(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub fn is_opaque(&self) -> bool {
        self.a == 255
    }

    pub fn rgb(&self) -> [u8; 3] {
        [self.r, self.g, self.b]
    }
}

/// Indexed colour table with the transparency table folded into each entry.
#[derive(Debug, Clone, PartialEq)]
pub struct Palette {
    colors: Vec<Rgba>,
    lookup: HashMap<Rgba, u8>,
}

impl Palette {
    pub const MAX_ENTRIES: usize = 256;

    pub fn new(colors: Vec<Rgba>) -> Result<Self> {
        if colors.is_empty() || colors.len() > Self::MAX_ENTRIES {
            return Err(Error::malformed(format!("palette must hold 1..=256 entries, got {}", colors.len())));
        }
        let mut lookup = HashMap::with_capacity(colors.len());
        for (i, &c) in colors.iter().enumerate() {
            lookup.entry(c).or_insert(i as u8);
        }
        Ok(Self { colors, lookup })
    }

    /// Build from raw palette and transparency payloads. Entries past the end
    /// of the transparency table stay opaque.
    pub fn from_chunks(plte: &[u8], trns: Option<&[u8]>) -> Result<Self> {
        if plte.len() % 3 != 0 {
            return Err(Error::malformed(format!("palette length {} is not a multiple of 3", plte.len())));
        }
        let trns = trns.unwrap_or(&[]);
        if trns.len() > plte.len() / 3 {
            return Err(Error::malformed(format!("transparency table has {} entries for {} palette colors", trns.len(), plte.len() / 3)));
        }
        let colors = plte
            .chunks_exact(3)
            .enumerate()
            .map(|(i, c)| Rgba::new(c[0], c[1], c[2], trns.get(i).copied().unwrap_or(255)))
            .collect();
        Self::new(colors)
    }

    /// Palette covering every distinct pixel, or `None` past 256 colours.
    /// Non-opaque entries come first so the transparency table stays short.
    pub fn from_pixels(pixels: &[Rgba]) -> Option<Self> {
        let mut seen = HashSet::new();
        let (mut translucent, mut opaque) = (vec![], vec![]);
        for &px in pixels {
            if !seen.insert(px) {
                continue;
            }
            if seen.len() > Self::MAX_ENTRIES {
                return None;
            }
            if px.is_opaque() { opaque.push(px) } else { translucent.push(px) }
        }
        translucent.extend(opaque);
        Self::new(translucent).ok()
    }

    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    pub fn get(&self, index: u8) -> Option<Rgba> {
        self.colors.get(index as usize).copied()
    }

    pub fn index_of(&self, color: Rgba) -> Option<u8> {
        self.lookup.get(&color).copied()
    }

    pub fn plte_bytes(&self) -> Vec<u8> {
        self.colors.iter().flat_map(|c| c.rgb().to_vec()).collect()
    }

    /// Alpha table trimmed of trailing opaque entries; `None` when fully opaque.
    pub fn trns_bytes(&self) -> Option<Vec<u8>> {
        let last = self.colors.iter().rposition(|c| !c.is_opaque())?;
        Some(self.colors[..=last].iter().map(|c| c.a).collect())
    }
}

/// On-wire pixel layout, resolved once per image from the header.
#[derive(Debug, Clone, Copy)]
pub enum PixelFormat<'p> {
    TruecolorAlpha,
    /// optional colour key from the transparency chunk
    Truecolor { key: Option<[u8; 3]> },
    Indexed(&'p Palette),
}

impl<'p> PixelFormat<'p> {
    pub fn resolve(mode: ColorMode, palette: Option<&'p Palette>, key: Option<[u8; 3]>) -> Result<Self> {
        match mode {
            ColorMode::TruecolorAlpha => Ok(PixelFormat::TruecolorAlpha),
            ColorMode::Truecolor => Ok(PixelFormat::Truecolor { key }),
            ColorMode::Indexed => palette
                .map(PixelFormat::Indexed)
                .ok_or_else(|| Error::malformed("indexed image without a palette")),
            ColorMode::Grayscale | ColorMode::GrayscaleAlpha => {
                Err(Error::unsupported_color(format!("{:?} images are not supported", mode)))
            },
        }
    }

    pub fn color_mode(&self) -> ColorMode {
        match self {
            PixelFormat::TruecolorAlpha => ColorMode::TruecolorAlpha,
            PixelFormat::Truecolor { .. } => ColorMode::Truecolor,
            PixelFormat::Indexed(_) => ColorMode::Indexed,
        }
    }

    pub fn bytes_per_pixel(&self) -> usize {
        self.color_mode().channels()
    }

    /// Append the canonical pixels of one reconstructed row to `out`.
    pub fn unpack_row(&self, y: usize, row: &[u8], out: &mut Vec<Rgba>) -> Result<()> {
        match *self {
            PixelFormat::TruecolorAlpha => {
                out.extend(row.chunks_exact(4).map(|p| Rgba::new(p[0], p[1], p[2], p[3])));
            },
            PixelFormat::Truecolor { key } => {
                out.extend(row.chunks_exact(3).map(|p| {
                    let a = if key == Some([p[0], p[1], p[2]]) { 0 } else { 255 };
                    Rgba::new(p[0], p[1], p[2], a)
                }));
            },
            PixelFormat::Indexed(palette) => {
                for (x, &i) in row.iter().enumerate() {
                    let px = palette.get(i).ok_or_else(|| Error::palette_index(format!(
                        "index {} at row {}, column {} but palette has {} entries", i, y, x, palette.len()
                    )))?;
                    out.push(px);
                }
            },
        }
        Ok(())
    }

    /// Append the wire bytes of one row of canonical pixels to `out`.
    pub fn pack_row(&self, y: usize, pixels: &[Rgba], out: &mut Vec<u8>) -> Result<()> {
        match *self {
            PixelFormat::TruecolorAlpha => {
                for px in pixels {
                    out.extend_from_slice(&[px.r, px.g, px.b, px.a]);
                }
            },
            PixelFormat::Truecolor { key } => {
                for (x, px) in pixels.iter().enumerate() {
                    let keyed = px.a == 0 && key == Some(px.rgb());
                    if !px.is_opaque() && !keyed {
                        return Err(Error::invalid_image(format!(
                            "pixel at row {}, column {} has alpha {}, truecolor cannot store it", y, x, px.a
                        )));
                    }
                    out.extend_from_slice(&px.rgb());
                }
            },
            PixelFormat::Indexed(palette) => {
                for (x, &px) in pixels.iter().enumerate() {
                    let i = palette.index_of(px).ok_or_else(|| Error::invalid_image(format!(
                        "pixel at row {}, column {} is not in the palette", y, x
                    )))?;
                    out.push(i);
                }
            },
        }
        Ok(())
    }
}
