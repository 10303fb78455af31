//! Hue-band recolouring of a canonical pixel buffer.
//!
//! Each pixel goes to HSV, its hue is looked up in an ordered list of
//! half-open bands covering `[0, 1)`, saturation gets a capped boost, value
//! and alpha are kept. Transparent, near-gray and near-black pixels pass
//! through untouched so outlines and shadows stay exact.

use crate::image::{Error, Image, Result, Rgba};
use log::debug;

/// Hue, saturation, value, each in `[0, 1]` (hue in `[0, 1)`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hsv {
    pub h: f64,
    pub s: f64,
    pub v: f64,
}

impl Hsv {
    pub fn from_rgb(r: u8, g: u8, b: u8) -> Self {
        let (r, g, b) = (r as f64 / 255.0, g as f64 / 255.0, b as f64 / 255.0);
        let maxc = r.max(g).max(b);
        let minc = r.min(g).min(b);
        let v = maxc;
        if maxc == minc {
            return Self { h: 0.0, s: 0.0, v };
        }
        let delta = maxc - minc;
        let s = delta / maxc;
        let (rc, gc, bc) = ((maxc - r) / delta, (maxc - g) / delta, (maxc - b) / delta);
        let h = if r == maxc {
            bc - gc
        } else if g == maxc {
            2.0 + rc - bc
        } else {
            4.0 + gc - rc
        };
        let mut h = (h / 6.0).rem_euclid(1.0);
        if h >= 1.0 {
            h = 0.0;
        }
        Self { h, s, v }
    }

    pub fn to_rgb(self) -> (u8, u8, u8) {
        let Hsv { h, s, v } = self;
        let to_u8 = |x: f64| (x * 255.0).round().max(0.0).min(255.0) as u8;
        if s == 0.0 {
            let c = to_u8(v);
            return (c, c, c);
        }
        let sector = (h * 6.0).floor();
        let f = h * 6.0 - sector;
        let p = v * (1.0 - s);
        let q = v * (1.0 - s * f);
        let t = v * (1.0 - s * (1.0 - f));
        let (r, g, b) = match (sector as i64).rem_euclid(6) {
            0 => (v, t, p),
            1 => (q, v, p),
            2 => (p, v, t),
            3 => (p, q, v),
            4 => (t, p, v),
            _ => (v, p, q),
        };
        (to_u8(r), to_u8(g), to_u8(b))
    }
}

/// What a band does to the hue of the pixels that fall in it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Target {
    Hue(f64),
    Keep,
}

/// Half-open hue range `[start, end)` and its target.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HueBand {
    pub start: f64,
    pub end: f64,
    pub target: Target,
}

impl HueBand {
    pub fn new(start: f64, end: f64, target: Target) -> Self {
        Self { start, end, target }
    }

    pub fn contains(&self, hue: f64) -> bool {
        self.start <= hue && hue < self.end
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecolorConfig {
    /// checked in order, first match wins; must tile `[0, 1)` exactly
    pub bands: Vec<HueBand>,
    pub min_saturation: f64,
    pub min_value: f64,
    pub saturation_boost: f64,
}

impl RecolorConfig {
    /// Leaves every pixel as it is.
    pub fn identity() -> Self {
        Self {
            bands: vec![HueBand::new(0.0, 1.0, Target::Keep)],
            min_saturation: 0.0,
            min_value: 0.0,
            saturation_boost: 1.0,
        }
    }

    /// Green to purple (#9945FF), blue and red to teal (#14F195),
    /// yellow/orange to cyan (#00D1FF), magenta to purple.
    pub fn solana_palette() -> Self {
        const PURPLE: f64 = 0.75;
        const TEAL: f64 = 0.43;
        const CYAN: f64 = 0.53;
        Self {
            bands: vec![
                HueBand::new(0.00, 0.08, Target::Hue(TEAL)),
                HueBand::new(0.08, 0.22, Target::Hue(CYAN)),
                HueBand::new(0.22, 0.47, Target::Hue(PURPLE)),
                HueBand::new(0.47, 0.75, Target::Hue(TEAL)),
                HueBand::new(0.75, 0.92, Target::Hue(PURPLE)),
                HueBand::new(0.92, 1.00, Target::Hue(TEAL)),
            ],
            min_saturation: 0.08,
            min_value: 0.05,
            saturation_boost: 1.1,
        }
    }

    fn validate(&self) -> Result<()> {
        let unit = |name: &str, x: f64| -> Result<()> {
            if x.is_finite() && (0.0..=1.0).contains(&x) {
                Ok(())
            } else {
                Err(Error::band_config(format!("{} must lie in [0, 1], got {}", name, x)))
            }
        };
        unit("min_saturation", self.min_saturation)?;
        unit("min_value", self.min_value)?;
        if !self.saturation_boost.is_finite() || self.saturation_boost <= 0.0 {
            return Err(Error::band_config(format!("saturation_boost must be positive, got {}", self.saturation_boost)));
        }
        if self.bands.is_empty() {
            return Err(Error::band_config("no hue bands"));
        }

        for (i, band) in self.bands.iter().enumerate() {
            if !(band.start.is_finite() && band.end.is_finite() && 0.0 <= band.start && band.start < band.end && band.end <= 1.0) {
                return Err(Error::band_config(format!("band {} [{}, {}) is not a non-empty range inside [0, 1]", i, band.start, band.end)));
            }
            if let Target::Hue(h) = band.target {
                if !(h.is_finite() && (0.0..1.0).contains(&h)) {
                    return Err(Error::band_config(format!("band {} targets hue {}, outside [0, 1)", i, h)));
                }
            }
        }

        let mut sorted: Vec<&HueBand> = self.bands.iter().collect();
        sorted.sort_by(|a, b| a.start.partial_cmp(&b.start).unwrap_or(std::cmp::Ordering::Equal));
        let mut covered = 0.0;
        for band in sorted {
            if band.start > covered {
                return Err(Error::band_config(format!("hues [{}, {}) fall in no band", covered, band.start)));
            }
            if band.start < covered {
                return Err(Error::band_config(format!("band [{}, {}) overlaps hues below {}", band.start, band.end, covered)));
            }
            covered = band.end;
        }
        if covered < 1.0 {
            return Err(Error::band_config(format!("hues [{}, 1) fall in no band", covered)));
        }
        Ok(())
    }
}

/// A validated recolour transform. Pure per pixel.
#[derive(Debug, Clone)]
pub struct Recolor {
    config: RecolorConfig,
}

impl Recolor {
    pub fn new(config: RecolorConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &RecolorConfig {
        &self.config
    }

    pub fn band_for(&self, hue: f64) -> Option<&HueBand> {
        self.config.bands.iter().find(|b| b.contains(hue))
    }

    pub fn apply_pixel(&self, px: Rgba) -> Rgba {
        if px.a == 0 {
            return px;
        }
        let hsv = Hsv::from_rgb(px.r, px.g, px.b);
        if hsv.s < self.config.min_saturation || hsv.v < self.config.min_value {
            return px;
        }

        let s = (hsv.s * self.config.saturation_boost).min(1.0);
        let target = self.band_for(hsv.h).map(|b| b.target).unwrap_or(Target::Keep);
        let h = match target {
            Target::Hue(h) => h,
            Target::Keep if s == hsv.s => return px,
            Target::Keep => hsv.h,
        };
        let (r, g, b) = Hsv { h, s, v: hsv.v }.to_rgb();
        Rgba::new(r, g, b, px.a)
    }

    /// Recolour in place, returning how many pixels changed.
    pub fn apply_in_place(&self, image: &mut Image) -> usize {
        let mut changed = 0;
        for px in image.pixels.iter_mut() {
            let out = self.apply_pixel(*px);
            if out != *px {
                *px = out;
                changed += 1;
            }
        }
        debug!("recolored {} of {} pixels", changed, image.pixels.len());
        changed
    }

    pub fn apply(&self, mut image: Image) -> Image {
        self.apply_in_place(&mut image);
        image
    }
}
