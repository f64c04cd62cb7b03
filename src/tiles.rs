//! Tile slicing: converts an image into per-tile pixel blocks and the
//! per-tile signatures that drive palette-group clustering.

use crate::bitmap::SourceImage;
use crate::color::{Bgra8, Colorf};
use crate::dither::{DitherMode, dither_image};
use crate::error::{Result, TilequantError};

/// Allocates a zeroed buffer, reporting failure instead of aborting.
pub(crate) fn try_vec<T: Clone + Default>(n: usize) -> Result<Vec<T>> {
  let mut v = Vec::new();
  v.try_reserve_exact(n).map_err(|_| TilequantError::OutOfMemory)?;
  v.resize(n, T::default());
  Ok(v)
}

/// The tiled form of an image: working-space pixels grouped tile by tile,
/// one signature per tile, and the tile-to-palette map filled in by the
/// palette assembler.
pub struct TilesData {
  pub tile_w: usize,
  pub tile_h: usize,
  pub tiles_x: usize,
  pub tiles_y: usize,
  /// One signature per tile, row-major over the tile grid.
  pub tile_value: Vec<Colorf>,
  /// All pixels in YUV, tile-major, row-major within a tile.
  pub px_data: Vec<Colorf>,
  /// Palette group per tile, filled in by the palette assembler.
  pub tile_pal_idx: Vec<i32>,
}

impl TilesData {
  pub fn tile_count(&self) -> usize {
    self.tiles_x * self.tiles_y
  }

  /// The pixel block of tile `t`.
  pub fn tile_pixels(&self, t: usize) -> &[Colorf] {
    let n = self.tile_w * self.tile_h;
    &self.px_data[t * n..(t + 1) * n]
  }

  /// Slices `img` into tiles.
  ///
  /// The image is first pushed through the ditherer's raw mode against the
  /// output bit range (with mode `None` that is a plain range reduction), so
  /// tiles always cluster on colours the output can represent.
  pub fn from_image(
    img: &SourceImage,
    tile_w: usize,
    tile_h: usize,
    range: Bgra8,
    mode: DitherMode,
    level: f32,
    no_alpha: bool,
  ) -> Result<TilesData> {
    if tile_w == 0 || tile_h == 0 || img.width % tile_w != 0 || img.height % tile_h != 0 {
      return Err(TilequantError::TileSize {
        width: img.width,
        height: img.height,
        tile_w,
        tile_h,
      });
    }

    let n_px = img.pixel_count();
    let tiles_x = img.width / tile_w;
    let tiles_y = img.height / tile_h;
    let n_tiles = tiles_x * tiles_y;
    let tile_px = tile_w * tile_h;

    let mut reduced: Vec<Colorf> = try_vec(n_px)?;
    dither_image(img, range, None, None, Some(&mut reduced), mode, level, no_alpha);

    let mut px_data: Vec<Colorf> = try_vec(n_px)?;
    let mut tile_value: Vec<Colorf> = try_vec(n_tiles)?;
    let tile_pal_idx: Vec<i32> = try_vec(n_tiles)?;

    let mut out = 0usize;
    for ty in 0..tiles_y {
      for tx in 0..tiles_x {
        let mut mean = Colorf::ZERO;
        for py in 0..tile_h {
          let row = (ty * tile_h + py) * img.width + tx * tile_w;
          for px in 0..tile_w {
            let p = reduced[row + px];
            px_data[out] = p;
            out += 1;
            mean = mean + p;
          }
        }
        // chroma counts in proportion to the accumulated luma, while luma
        // and alpha average out as independent axes; this biases group
        // clustering toward colour similarity over brightness similarity
        if mean.b > 0.0 {
          let scale = 0.1 / mean.b.sqrt();
          mean.g *= scale;
          mean.r *= scale;
        }
        mean.b /= tile_px as f32;
        mean.a /= tile_px as f32;
        tile_value[ty * tiles_x + tx] = mean;
      }
    }

    log::debug!(
      "tiled {}x{} image into {tiles_x}x{tiles_y} tiles of {tile_w}x{tile_h}",
      img.width,
      img.height
    );
    Ok(TilesData {
      tile_w,
      tile_h,
      tiles_x,
      tiles_y,
      tile_value,
      px_data,
      tile_pal_idx,
    })
  }
}
