//! The top-level palettization pipeline: tiles an image, assembles its
//! palettes, dithers every pixel to an index and packs the output palette.

use crate::bitmap::{BMP_PALETTE_COLOURS, SourceImage};
use crate::color::{Bgra8, Colorf};
use crate::dither::{DitherMode, TileTarget, dither_image};
use crate::error::{Result, TilequantError};
use crate::palette::quantize_palettes;
use crate::tiles::{TilesData, try_vec};

/// Parameters of one palettization run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PalettizeConfig {
  /// Number of palette groups the hardware provides.
  pub n_palettes: usize,
  /// Entries per palette group, reserved slots included.
  pub palette_size: usize,
  /// Leading entries of every group pinned to transparent zero.
  pub reserved_slots: usize,
  pub tile_w: usize,
  pub tile_h: usize,
  /// Per-channel output maxima, e.g. 31,31,31,1 for 5-5-5-1.
  pub bit_range: Bgra8,
  pub dither: DitherMode,
  /// Dither strength; `None` picks the mode's default.
  pub dither_level: Option<f32>,
  /// Refinement passes for tile clustering, 0 for the default.
  pub tile_passes: u32,
  /// Refinement passes for colour clustering, 0 for the default.
  pub colour_passes: u32,
  /// Excludes alpha from dither perturbation.
  pub dither_no_alpha: bool,
}

impl Default for PalettizeConfig {
  fn default() -> Self {
    PalettizeConfig {
      n_palettes: 16,
      palette_size: 16,
      reserved_slots: 1,
      tile_w: 8,
      tile_h: 8,
      bit_range: Bgra8::new(31, 31, 31, 1),
      dither: DitherMode::FloydSteinberg,
      dither_level: None,
      tile_passes: 0,
      colour_passes: 0,
      dither_no_alpha: false,
    }
  }
}

impl PalettizeConfig {
  fn validate(&self, img: &SourceImage) -> Result<()> {
    let fail = |msg: String| Err(TilequantError::Config(msg));
    if self.n_palettes == 0 || self.palette_size == 0 {
      return fail("palette count and size must be at least 1".into());
    }
    if self.reserved_slots >= self.palette_size {
      return fail(format!(
        "{} reserved slots leave no usable entries in a palette of {}",
        self.reserved_slots, self.palette_size
      ));
    }
    if self.n_palettes * self.palette_size > BMP_PALETTE_COLOURS {
      return fail(format!(
        "{} palettes of {} entries cannot be addressed by 8-bit indices",
        self.n_palettes, self.palette_size
      ));
    }
    if self.bit_range.b == 0 || self.bit_range.g == 0 || self.bit_range.r == 0 || self.bit_range.a == 0 {
      return fail("every bit-range channel must be non-zero".into());
    }
    if let DitherMode::Ordered(n) = self.dither {
      if !(1..=8).contains(&n) {
        return fail(format!("ordered dither order {n} is outside 1..=8"));
      }
    }
    if let Some(level) = self.dither_level {
      if !level.is_finite() || level < 0.0 {
        return fail(format!("dither level {level} is not a non-negative number"));
      }
    }
    if self.tile_w == 0 || self.tile_h == 0 || img.width % self.tile_w != 0 || img.height % self.tile_h != 0 {
      return Err(TilequantError::TileSize {
        width: img.width,
        height: img.height,
        tile_w: self.tile_w,
        tile_h: self.tile_h,
      });
    }
    Ok(())
  }
}

/// The result of a palettization run.
pub struct PalettizeOutput {
  /// One byte per pixel: `group * palette_size + entry`.
  pub index_data: Vec<u8>,
  /// Output palette, padded to the 256 entries an 8-bit BMP carries.
  pub palette: Vec<Bgra8>,
  /// Palette group per tile, row-major over the tile grid.
  pub tile_palettes: Vec<i32>,
  /// Per-channel root-mean-square error in the working colour space.
  pub rmse: Colorf,
}

impl PalettizeOutput {
  /// Packs the palette as raw bytes: BGRA quads, or RGB triples with the
  /// alpha channel dropped.
  pub fn palette_bytes(&self, rgb24: bool) -> Vec<u8> {
    if rgb24 {
      self.palette.iter().flat_map(|c| [c.r, c.g, c.b]).collect()
    } else {
      bytemuck::cast_slice(&self.palette).to_vec()
    }
  }

  /// Per-channel peak signal-to-noise ratio in dB.
  pub fn psnr(&self) -> Colorf {
    fn ch(rmse: f32) -> f32 {
      -20.0 * (rmse / 255.0).log10()
    }
    Colorf::new(ch(self.rmse.b), ch(self.rmse.g), ch(self.rmse.r), ch(self.rmse.a))
  }
}

/// Runs the whole pipeline over `img`: pre-dither, tile extraction, two-stage
/// palette quantization and the final dither pass.
pub fn palettize(img: &SourceImage, cfg: &PalettizeConfig) -> Result<PalettizeOutput> {
  cfg.validate(img)?;
  let level = cfg.dither_level.unwrap_or_else(|| cfg.dither.default_level());

  let mut tiles = TilesData::from_image(
    img,
    cfg.tile_w,
    cfg.tile_h,
    cfg.bit_range,
    cfg.dither,
    level,
    cfg.dither_no_alpha,
  )?;
  let palette_f = quantize_palettes(
    &mut tiles,
    cfg.n_palettes,
    cfg.palette_size,
    cfg.reserved_slots,
    cfg.tile_passes,
    cfg.colour_passes,
  );

  let mut index_data: Vec<u8> = try_vec(img.pixel_count())?;
  let target = TileTarget {
    tile_w: cfg.tile_w,
    tile_h: cfg.tile_h,
    palette_size: cfg.palette_size,
    reserved: cfg.reserved_slots,
    tile_map: &tiles.tile_pal_idx,
    palette: &palette_f,
  };
  let rmse = dither_image(
    img,
    cfg.bit_range,
    Some(&target),
    Some(&mut index_data),
    None,
    cfg.dither,
    level,
    cfg.dither_no_alpha,
  );

  // rotate the palette back to RGB and push it onto the output bit grid,
  // expanded to 8 bits per channel
  let mut palette = vec![Bgra8::default(); BMP_PALETTE_COLOURS];
  for (dst, &src) in palette.iter_mut().zip(&palette_f) {
    let q = src.yuv_to_rgb().to_bgra8(cfg.bit_range);
    *dst = q.expand(cfg.bit_range);
  }

  log::debug!(
    "palettized {}x{}: {} palettes of {}, rmse {:?}",
    img.width,
    img.height,
    cfg.n_palettes,
    cfg.palette_size,
    rmse
  );
  Ok(PalettizeOutput {
    index_data,
    palette,
    tile_palettes: std::mem::take(&mut tiles.tile_pal_idx),
    rmse,
  })
}
