//! Command-line argument parsing for the tilequant CLI.

use crate::color::Bgra8;
use crate::dither::DitherMode;
use crate::pipeline::PalettizeConfig;
use clap::Parser;
use std::path::PathBuf;

/// Command-line arguments for the tilequant tool.
///
/// Converts an image into an 8-bit palettized BMP in which every tile
/// addresses one of a small number of hardware palettes.
#[derive(Parser, Debug)]
#[clap(author, version, about)]
pub struct Args {
  /// Input image file path
  pub in_img: PathBuf,

  /// Output BMP file path
  pub out_img: PathBuf,

  /// Number of tile palettes
  #[clap(long = "np", default_value_t = 16)]
  pub n_palettes: usize,

  /// Colours per palette, reserved slots included
  #[clap(long = "ps", default_value_t = 16)]
  pub palette_size: usize,

  /// Leading palette entries pinned to transparent zero
  #[clap(long = "reserved", default_value_t = 1)]
  pub reserved_slots: usize,

  /// Tile width in pixels
  #[clap(long = "tw", default_value_t = 8)]
  pub tile_w: usize,

  /// Tile height in pixels
  #[clap(long = "th", default_value_t = 8)]
  pub tile_h: usize,

  /// Output bit depths as four digits in B,G,R,A order (e.g. 5551)
  #[clap(long = "bgra", default_value = "5551", value_parser = parse_bit_range)]
  pub bit_range: Bgra8,

  /// Dither mode: none, floyd or ordN, with an optional ,LEVEL suffix
  #[clap(long = "dither", default_value = "floyd", value_parser = parse_dither)]
  pub dither: DitherArg,

  /// Refinement passes for tile clustering (0 uses the default)
  #[clap(long = "tilepasses", default_value_t = 0)]
  pub tile_passes: u32,

  /// Refinement passes for colour clustering (0 uses the default)
  #[clap(long = "colourpasses", default_value_t = 0)]
  pub colour_passes: u32,
}

/// A parsed `--dither` value: the mode plus an optional level override.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DitherArg {
  pub mode: DitherMode,
  pub level: Option<f32>,
}

impl Args {
  pub fn to_config(&self) -> PalettizeConfig {
    PalettizeConfig {
      n_palettes: self.n_palettes,
      palette_size: self.palette_size,
      reserved_slots: self.reserved_slots,
      tile_w: self.tile_w,
      tile_h: self.tile_h,
      bit_range: self.bit_range,
      dither: self.dither.mode,
      dither_level: self.dither.level,
      tile_passes: self.tile_passes,
      colour_passes: self.colour_passes,
      dither_no_alpha: false,
    }
  }
}

fn parse_bit_range(s: &str) -> Result<Bgra8, String> {
  let digits: Vec<u32> = s
    .chars()
    .map(|c| c.to_digit(10))
    .collect::<Option<_>>()
    .ok_or_else(|| format!("'{s}' is not a string of digits"))?;
  if digits.len() != 4 {
    return Err(format!("expected four bit-depth digits, got {}", digits.len()));
  }
  for &d in &digits {
    if !(1..=8).contains(&d) {
      return Err(format!("bit depth {d} is outside 1..=8"));
    }
  }
  let max = |d: u32| ((1u32 << d) - 1) as u8;
  Ok(Bgra8::new(max(digits[0]), max(digits[1]), max(digits[2]), max(digits[3])))
}

fn parse_dither(s: &str) -> Result<DitherArg, String> {
  let (mode, level) = match s.split_once(',') {
    Some((m, l)) => (m, Some(l)),
    None => (s, None),
  };

  let mode = match mode {
    "none" => DitherMode::None,
    "floyd" => DitherMode::FloydSteinberg,
    _ => match mode.strip_prefix("ord") {
      Some(n) => {
        let n: u32 = n.parse().map_err(|_| format!("bad ordered dither order '{n}'"))?;
        if !(1..=8).contains(&n) {
          return Err(format!("ordered dither order {n} is outside 1..=8"));
        }
        DitherMode::Ordered(n)
      }
      None => return Err(format!("unknown dither mode '{mode}' (expected none, floyd or ordN)")),
    },
  };

  let level = match level {
    Some(l) => {
      let l: f32 = l.parse().map_err(|_| format!("bad dither level '{l}'"))?;
      if !l.is_finite() || l < 0.0 {
        return Err(format!("dither level {l} must be a non-negative number"));
      }
      Some(l)
    }
    None => None,
  };

  Ok(DitherArg { mode, level })
}
