// cargo r --example pngcheck -- 'tests/pngsuite/**/*.png'
use log::{info, error, trace};
use huepng::image::*;

fn summary(img: &Image) -> String {
    let opaque = img.pixels.iter().filter(|p| p.is_opaque()).count();
    let distinct: std::collections::HashSet<_> = img.pixels.iter().collect();
    format!("{}x{} ({} opaque, {} colors)", img.width, img.height, opaque, distinct.len())
}

pub fn main() {
    dotenv::dotenv().ok();
    env_logger::init();

    let pattern = match std::env::args().nth(1) {
        Some(p) => p,
        None => {
            eprintln!("usage: pngcheck <glob>");
            std::process::exit(2);
        },
    };

    for entry in glob::glob(&pattern).expect("Fail to read glob pattern") {
        let fpath = &entry.expect("entry list failed");
        trace!("check... {}", fpath.display());

        let img1 = match Image::load(fpath) {
            Ok(img) => img,
            Err(e) => {
                info!("SKIP {}: {}", fpath.display(), e);
                continue;
            },
        };
        let img2 = img1.encode().and_then(|bytes| Image::decode(&bytes));

        match &img2 {
            Ok(img2) if *img2 == img1 => {
                info!("EQ {}: {}", fpath.display(), summary(&img1));
            },
            Ok(img2) => {
                error!("NE {}:\n\t(file){}\n\t(again){}", fpath.display(), summary(&img1), summary(img2));
            },
            Err(e) => {
                error!("NE {}: re-encode failed: {}", fpath.display(), e);
            },
        }
    }
}
