// cargo r --example recolor -- logo.png logo-solana.png
use log::info;
use huepng::image::Image;
use huepng::recolor::{Recolor, RecolorConfig};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();
    env_logger::init();

    let mut args = std::env::args().skip(1);
    let (input, output) = match (args.next(), args.next()) {
        (Some(i), Some(o)) => (i, o),
        _ => {
            eprintln!("usage: recolor <input.png> <output.png>");
            std::process::exit(2);
        },
    };

    let mut img = Image::load(&input)?;
    let recolor = Recolor::new(RecolorConfig::solana_palette())?;
    let changed = recolor.apply_in_place(&mut img);
    img.save(&output)?;
    info!("{} -> {}: {} of {} pixels recolored", input, output, changed, img.pixels.len());
    Ok(())
}
