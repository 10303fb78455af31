//! Lossless PNG-style codec and hue-band recolouring.
//!
//! ```no_run
//! use huepng::image::Image;
//! use huepng::recolor::{Recolor, RecolorConfig};
//!
//! let img = Image::load("logo.png")?;
//! let out = Recolor::new(RecolorConfig::solana_palette())?.apply(img);
//! out.save("logo-solana.png")?;
//! # Ok::<(), huepng::image::Error>(())
//! ```

pub mod image;
pub mod recolor;
