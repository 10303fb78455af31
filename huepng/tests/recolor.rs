use huepng::image::{Image, Rgba};
use huepng::recolor::{HueBand, Recolor, RecolorConfig, Target};
use quickcheck::{quickcheck, Arbitrary, Gen};

/// A valid band set: random cut points tiling `[0, 1)`, random targets.
#[derive(Debug, Clone)]
struct Bands(RecolorConfig);

impl Arbitrary for Bands {
    fn arbitrary(g: &mut Gen) -> Self {
        let mut cuts: Vec<f64> = (0..u8::arbitrary(g) % 6).map(|_| (u16::arbitrary(g) % 999 + 1) as f64 / 1000.0).collect();
        cuts.sort_by(|a, b| a.partial_cmp(b).unwrap());
        cuts.dedup();
        cuts.insert(0, 0.0);
        cuts.push(1.0);

        let bands = cuts
            .windows(2)
            .map(|w| {
                let target = if bool::arbitrary(g) {
                    Target::Hue((u16::arbitrary(g) % 1000) as f64 / 1000.0)
                } else {
                    Target::Keep
                };
                HueBand::new(w[0], w[1], target)
            })
            .collect();
        Bands(RecolorConfig {
            bands,
            min_saturation: (u8::arbitrary(g) % 50) as f64 / 100.0,
            min_value: (u8::arbitrary(g) % 50) as f64 / 100.0,
            saturation_boost: 1.0 + (u8::arbitrary(g) % 100) as f64 / 100.0,
        })
    }
}

quickcheck! {
    fn generated_bands_validate(b: Bands) -> bool {
        Recolor::new(b.0).is_ok()
    }

    fn transparent_and_gray_pass_through(b: Bands, rgb: (u8, u8, u8), level: u8) -> bool {
        let t = Recolor::new(b.0).unwrap();
        let clear = Rgba::new(rgb.0, rgb.1, rgb.2, 0);
        let gray = Rgba::opaque(level, level, level);
        t.apply_pixel(clear) == clear && t.apply_pixel(gray) == gray
    }

    fn deterministic(b: Bands, bytes: Vec<u8>) -> bool {
        let n = bytes.len() / 4;
        if n == 0 {
            return true;
        }
        let img = Image::from_rgba_bytes(n, 1, &bytes[..n * 4]).unwrap();
        let t = Recolor::new(b.0).unwrap();
        t.apply(img.clone()) == t.apply(img)
    }

    fn value_and_alpha_survive(b: Bands, px: (u8, u8, u8, u8)) -> bool {
        let t = Recolor::new(b.0).unwrap();
        let src = Rgba::new(px.0, px.1, px.2, px.3);
        let out = t.apply_pixel(src);
        out.a == src.a && out.r.max(out.g).max(out.b) == src.r.max(src.g).max(src.b)
    }

    fn identity_then_codec_is_lossless(bytes: Vec<u8>) -> bool {
        let n = bytes.len() / 4;
        if n == 0 {
            return true;
        }
        let img = Image::from_rgba_bytes(n, 1, &bytes[..n * 4]).unwrap();
        let out = Recolor::new(RecolorConfig::identity()).unwrap().apply(img.clone());
        Image::decode(&out.encode().unwrap()).unwrap() == img
    }
}
