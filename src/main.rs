//! CLI front-end for the tilequant library.
//!
//! Reads an image, palettizes it under the configured tile and palette
//! budget, reports the per-channel PSNR and writes an 8-bit BMP.

use clap::Parser;
use clap::error::ErrorKind;
use tilequant::args::Args;
use tilequant::bitmap;
use tilequant::pipeline;

fn main() {
  env_logger::init();

  let args = match Args::try_parse() {
    Ok(args) => args,
    Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => e.exit(),
    Err(e) => {
      let _ = e.print();
      std::process::exit(1);
    }
  };

  if let Err(e) = run(&args) {
    eprintln!("error: {e}");
    std::process::exit(-1);
  }
}

fn run(args: &Args) -> tilequant::Result<()> {
  let image = bitmap::open_image(&args.in_img)?;
  let output = pipeline::palettize(&image.as_source(), &args.to_config())?;

  let psnr = output.psnr();
  println!(
    "PSNR = {{{:.3}dB, {:.3}dB, {:.3}dB, {:.3}dB}}",
    psnr.b, psnr.g, psnr.r, psnr.a
  );

  bitmap::write_indexed_bmp(
    &args.out_img,
    image.width,
    image.height,
    &output.index_data,
    &output.palette,
  )
}
