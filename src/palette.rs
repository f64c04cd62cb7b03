//! Palette assembly: clusters tile signatures into palette groups, then
//! quantizes each group's pixels into its palette colours.

use crate::color::Colorf;
use crate::quantize::{Cluster, quantize};
use crate::tiles::TilesData;
use rayon::prelude::*;

/// Refinement passes used when the caller asks for zero.
pub const DEFAULT_CLUSTER_PASSES: u32 = 16;

/// Builds the full palette table (`n_palettes * palette_size` entries in the
/// working colour space) and writes every tile's palette group into
/// `tiles.tile_pal_idx`.
///
/// The first `reserved` entries of each sub-palette stay zero. Groups that
/// end up with no pixels keep all entries zero. Fully transparent pixels are
/// left out of colour clustering whenever reserved slots exist to represent
/// them.
pub fn quantize_palettes(
  tiles: &mut TilesData,
  n_palettes: usize,
  palette_size: usize,
  reserved: usize,
  tile_passes: u32,
  colour_passes: u32,
) -> Vec<Colorf> {
  debug_assert!(reserved < palette_size);
  let tile_passes = if tile_passes == 0 { DEFAULT_CLUSTER_PASSES } else { tile_passes };
  let colour_passes = if colour_passes == 0 { DEFAULT_CLUSTER_PASSES } else { colour_passes };
  let live = palette_size - reserved;

  // first stage: tiles into palette groups, by signature
  let mut clusters = vec![Cluster::default(); n_palettes];
  let groups = quantize(&mut clusters, &tiles.tile_value, &mut tiles.tile_pal_idx, tile_passes);
  log::debug!("{} tiles share {groups} of {n_palettes} palettes", tiles.tile_count());

  // second stage: each group's pixels into its own palette; groups write
  // disjoint ranges, so they quantize independently
  let tiles = &*tiles;
  let sub_palettes: Vec<Vec<Colorf>> = (0..n_palettes)
    .into_par_iter()
    .map(|g| {
      let mut pixels = Vec::new();
      for t in 0..tiles.tile_count() {
        if tiles.tile_pal_idx[t] != g as i32 {
          continue;
        }
        for &px in tiles.tile_pixels(t) {
          // transparent pixels belong to the reserved slot, not the palette
          if reserved > 0 && px.a == 0.0 {
            continue;
          }
          pixels.push(px);
        }
      }

      let mut sub = vec![Colorf::ZERO; palette_size];
      if !pixels.is_empty() {
        let mut clusters = vec![Cluster::default(); live];
        let mut assignments = vec![0i32; pixels.len()];
        let resolved = quantize(&mut clusters, &pixels, &mut assignments, colour_passes);
        log::debug!("palette {g}: {} pixels into {resolved} of {live} colours", pixels.len());
        for (slot, c) in sub[reserved..].iter_mut().zip(&clusters) {
          *slot = c.centroid;
        }
      }
      sub
    })
    .collect();

  sub_palettes.concat()
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::bitmap::SourceImage;
  use crate::color::Bgra8;
  use crate::dither::DitherMode;

  const FULL: Bgra8 = Bgra8::FULL_RANGE;

  fn tiles_for(width: usize, height: usize, px: &[Bgra8], tile: usize) -> TilesData {
    let img = SourceImage::from_bgra(width, height, px);
    TilesData::from_image(&img, tile, tile, FULL, DitherMode::None, 0.0, false).unwrap()
  }

  #[test]
  fn test_two_tiles_two_palettes() {
    let red = Bgra8::new(0, 0, 255, 255);
    let blue = Bgra8::new(255, 0, 0, 255);
    let mut px = Vec::new();
    for _y in 0..8 {
      for x in 0..16 {
        px.push(if x < 8 { red } else { blue });
      }
    }
    let mut tiles = tiles_for(16, 8, &px, 8);
    let palette = quantize_palettes(&mut tiles, 2, 2, 0, 8, 8);
    assert_eq!(palette.len(), 4);

    // either labeling is fine, but the tiles must not share a group
    assert_ne!(tiles.tile_pal_idx[0], tiles.tile_pal_idx[1]);
    for &g in &tiles.tile_pal_idx {
      assert!((0..2).contains(&(g as usize)));
    }

    // each group's first entry is its tile's colour
    let red_yuv = Colorf::from_bgra8(red, FULL).rgb_to_yuv();
    let blue_yuv = Colorf::from_bgra8(blue, FULL).rgb_to_yuv();
    let g_red = tiles.tile_pal_idx[0] as usize;
    let g_blue = tiles.tile_pal_idx[1] as usize;
    assert_eq!(palette[g_red * 2], red_yuv);
    assert_eq!(palette[g_blue * 2], blue_yuv);
  }

  #[test]
  fn test_reserved_slots_stay_zero() {
    let px = vec![Bgra8::new(40, 90, 200, 255); 8 * 8];
    let mut tiles = tiles_for(8, 8, &px, 8);
    let palette = quantize_palettes(&mut tiles, 1, 4, 2, 8, 8);
    assert_eq!(palette.len(), 4);
    assert_eq!(palette[0], Colorf::ZERO);
    assert_eq!(palette[1], Colorf::ZERO);
    assert_ne!(palette[2], Colorf::ZERO);
  }

  #[test]
  fn test_empty_groups_left_zero() {
    // one uniform tile cannot fill four palettes
    let px = vec![Bgra8::new(10, 200, 60, 255); 8 * 8];
    let mut tiles = tiles_for(8, 8, &px, 8);
    let palette = quantize_palettes(&mut tiles, 4, 2, 0, 8, 8);
    assert_eq!(palette.len(), 8);

    let used = tiles.tile_pal_idx[0] as usize;
    for g in 0..4 {
      if g == used {
        continue;
      }
      assert_eq!(palette[g * 2], Colorf::ZERO, "unused group {g} should stay zero");
      assert_eq!(palette[g * 2 + 1], Colorf::ZERO);
    }
  }

  #[test]
  fn test_transparent_pixels_skipped_when_reserved() {
    // half the tile is transparent garbage colour, half opaque green
    let opaque = Bgra8::new(0, 200, 0, 255);
    let junk = Bgra8::new(170, 30, 90, 0);
    let px: Vec<Bgra8> = (0..64).map(|i| if i % 2 == 0 { junk } else { opaque }).collect();
    let mut tiles = tiles_for(8, 8, &px, 8);
    let palette = quantize_palettes(&mut tiles, 1, 2, 1, 8, 8);

    let opaque_yuv = Colorf::from_bgra8(opaque, FULL).rgb_to_yuv();
    assert_eq!(palette[0], Colorf::ZERO);
    assert_eq!(palette[1], opaque_yuv, "only the opaque colour should train the palette");
  }

  #[test]
  fn test_transparent_pixels_kept_without_reserved() {
    let opaque = Bgra8::new(0, 200, 0, 255);
    let clear = Bgra8::new(0, 200, 0, 0);
    let px: Vec<Bgra8> = (0..64).map(|i| if i % 2 == 0 { clear } else { opaque }).collect();
    let mut tiles = tiles_for(8, 8, &px, 8);
    let palette = quantize_palettes(&mut tiles, 1, 2, 0, 8, 8);
    // with no reserved slot both alpha levels must be representable
    let alphas: Vec<f32> = palette.iter().map(|c| c.a).collect();
    assert!(alphas.contains(&1.0) && alphas.contains(&0.0), "alphas were {:?}", alphas);
  }

  #[test]
  fn test_default_pass_substitution() {
    let px = vec![Bgra8::new(128, 128, 128, 255); 8 * 8];
    let mut tiles = tiles_for(8, 8, &px, 8);
    // zero pass counts are substituted, not honoured literally
    let palette = quantize_palettes(&mut tiles, 1, 2, 1, 0, 0);
    assert_ne!(palette[1], Colorf::ZERO);
  }
}
