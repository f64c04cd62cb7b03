//! Dithering: maps source pixels to palette entries (or to a reduced bit
//! range) under one of three strategies, returning per-channel RMSE.
//!
//! Floyd-Steinberg diffusion keeps only two scanlines of error, swapped
//! after every row, each padded by one pixel on both ends so the inner loop
//! needs no edge branches. Ordered dithering derives its threshold matrix on
//! the fly by bit interleaving and scales it by a per-palette spread vector.

use crate::bitmap::SourceImage;
use crate::color::{Bgra8, Colorf};

/// Available dithering strategies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DitherMode {
  /// Plain nearest-entry matching.
  None,
  /// Classic error diffusion with the 7/16, 3/16, 5/16, 1/16 kernel.
  #[default]
  FloydSteinberg,
  /// Recursive Bayer matrix of size 2^n x 2^n, n >= 1.
  Ordered(u32),
}

impl DitherMode {
  /// The dither level applied when the caller does not choose one.
  pub fn default_level(self) -> f32 {
    match self {
      DitherMode::None => 0.0,
      DitherMode::FloydSteinberg => 1.0,
      DitherMode::Ordered(_) => 0.5,
    }
  }
}

/// The tile-palette context for the final dither pass: which palette every
/// tile uses and the palette table itself (in the working colour space).
pub struct TileTarget<'a> {
  pub tile_w: usize,
  pub tile_h: usize,
  pub palette_size: usize,
  pub reserved: usize,
  /// Palette group per tile, row-major over the tile grid.
  pub tile_map: &'a [i32],
  /// `n_palettes * palette_size` entries.
  pub palette: &'a [Colorf],
}

/// Bayer threshold for position (x, y) at order `n`, in
/// [-0.5, 0.5 - 4^-n]. The matrix is generated by interleaving the bits of
/// x^y and y; order 1 yields (0,2; 3,1)/4 - 0.5.
pub fn ordered_threshold(x: usize, y: usize, order: u32) -> f32 {
  let mut t = 0u32;
  let mut x_key = y as u32;
  let mut y_key = (x ^ y) as u32;
  for _ in 0..order {
    t = t * 2 + (y_key & 1);
    y_key >>= 1;
    t = t * 2 + (x_key & 1);
    x_key >>= 1;
  }
  t as f32 / (1u64 << (2 * order)) as f32 - 0.5
}

/// Nearest palette entry by perceptual distance. The search starts at
/// `reserved - 1` so the last reserved zero entry stays reachable and fully
/// transparent pixels can snap to it; ties go to the lowest index.
fn nearest_entry(px: Colorf, palette: &[Colorf], reserved: usize) -> usize {
  let start = reserved.saturating_sub(1);
  let mut best = start;
  let mut best_dist = f32::INFINITY;
  for (i, &c) in palette.iter().enumerate().skip(start) {
    let d = px.perceptual_dist2(c);
    if d < best_dist {
      best = i;
      best_dist = d;
    }
  }
  best
}

/// Per-palette spread: the sqrt-weighted mean absolute deviation of the live
/// entries from their mean, premultiplied by the dither level. This is the
/// amplitude the ordered threshold modulates.
fn palette_spread(target: &TileTarget, level: f32, no_alpha: bool) -> Vec<Colorf> {
  let groups = target.palette.len() / target.palette_size;
  let live = target.palette_size - target.reserved;
  (0..groups)
    .map(|g| {
      let pal = &target.palette[g * target.palette_size..][..target.palette_size];
      let mut mean = Colorf::ZERO;
      for &c in &pal[target.reserved..] {
        mean = mean + c;
      }
      let mean = mean / live as f32;

      let mut spread = Colorf::ZERO;
      let mut weight = Colorf::ZERO;
      for &c in &pal[target.reserved..] {
        let d = (c - mean).abs();
        let w = d.sqrt();
        spread = spread + d * w;
        weight = weight + w;
      }
      let mut spread = spread.div_safe(weight, Colorf::ZERO) * level;
      if no_alpha {
        spread.a = 0.0;
      }
      spread
    })
    .collect()
}

/// Runs one dither pass over the whole image and returns the per-channel
/// RMSE against the original, measured in the working colour space.
///
/// With a [`TileTarget`] each pixel is matched against its tile's palette
/// and `index_out` (if given) receives `group * palette_size + entry`.
/// Without one, pixels are rounded through `range` instead; this is the raw
/// mode the tile builder uses as its pre-dither pass. `raw_out` (if given)
/// receives the quantized pixel either way.
pub fn dither_image(
  img: &SourceImage,
  range: Bgra8,
  target: Option<&TileTarget>,
  mut index_out: Option<&mut [u8]>,
  mut raw_out: Option<&mut [Colorf]>,
  mode: DitherMode,
  level: f32,
  no_alpha: bool,
) -> Colorf {
  let (w, h) = (img.width, img.height);
  if w == 0 || h == 0 {
    return Colorf::ZERO;
  }

  // ordered mode modulates a per-palette spread; without tile palettes the
  // amplitude is one bit-range step per channel
  let spread = match (mode, target) {
    (DitherMode::Ordered(_), Some(t)) => palette_spread(t, level, no_alpha),
    (DitherMode::Ordered(_), None) => {
      vec![Colorf::from_bgra8(Bgra8::new(1, 1, 1, 1), range) * level]
    }
    _ => Vec::new(),
  };

  // two rolling lines of diffusion error, one-pixel padding on both ends
  let mut this_line = vec![Colorf::ZERO; w + 2];
  let mut next_line = vec![Colorf::ZERO; w + 2];

  let mut err_acc = Colorf::ZERO;
  for y in 0..h {
    for x in 0..w {
      let i = y * w + x;
      let original = Colorf::from_bgra8(img.pixel(i), Bgra8::FULL_RANGE).rgb_to_yuv();
      let mut px = original;

      let group = match target {
        Some(t) => t.tile_map[(y / t.tile_h) * (w / t.tile_w) + (x / t.tile_w)] as usize,
        None => 0,
      };

      match mode {
        DitherMode::None => {}
        DitherMode::FloydSteinberg => {
          let mut e = this_line[x + 1];
          if no_alpha {
            e.a = 0.0;
          }
          px = px + e * level;
        }
        DitherMode::Ordered(n) => {
          px = px + spread[group] * ordered_threshold(x, y, n);
        }
      }

      let quantized = match target {
        Some(t) => {
          let pal = &t.palette[group * t.palette_size..][..t.palette_size];
          let entry = nearest_entry(px, pal, t.reserved);
          if let Some(out) = index_out.as_deref_mut() {
            out[i] = (group * t.palette_size + entry) as u8;
          }
          pal[entry]
        }
        None => {
          // reduce to the output bit range and back
          let q = px.yuv_to_rgb().to_bgra8(range);
          Colorf::from_bgra8(q, range).rgb_to_yuv()
        }
      };
      if let Some(out) = raw_out.as_deref_mut() {
        out[i] = quantized;
      }

      let error = original - quantized;
      if mode == DitherMode::FloydSteinberg {
        this_line[x + 2] = this_line[x + 2] + error * (7.0 / 16.0);
        next_line[x] = next_line[x] + error * (3.0 / 16.0);
        next_line[x + 1] = next_line[x + 1] + error * (5.0 / 16.0);
        next_line[x + 2] = next_line[x + 2] + error * (1.0 / 16.0);
      }
      err_acc = err_acc + error * error;
    }
    if mode == DitherMode::FloydSteinberg {
      std::mem::swap(&mut this_line, &mut next_line);
      next_line.fill(Colorf::ZERO);
    }
  }

  (err_acc / (w * h) as f32).sqrt()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_order_one_threshold_matrix() {
    // (0,2; 3,1)/4 - 0.5 over the 2x2 cell
    assert_eq!(ordered_threshold(0, 0, 1), -0.5);
    assert_eq!(ordered_threshold(1, 0, 1), 0.0);
    assert_eq!(ordered_threshold(0, 1, 1), 0.25);
    assert_eq!(ordered_threshold(1, 1, 1), -0.25);
  }

  #[test]
  fn test_order_two_thresholds_are_distinct_and_bounded() {
    let mut seen = Vec::new();
    for y in 0..4 {
      for x in 0..4 {
        let t = ordered_threshold(x, y, 2);
        assert!((-0.5..=(0.5 - 1.0 / 16.0)).contains(&t), "threshold {t} out of range");
        let key = ((t + 0.5) * 16.0).round() as i32;
        assert!(!seen.contains(&key), "threshold repeats inside the cell");
        seen.push(key);
      }
    }
    assert_eq!(seen.len(), 16);
  }

  #[test]
  fn test_threshold_tiles_periodically() {
    for y in 0..4 {
      for x in 0..4 {
        assert_eq!(ordered_threshold(x, y, 2), ordered_threshold(x + 4, y + 4, 2));
      }
    }
  }

  #[test]
  fn test_nearest_entry_includes_last_reserved_slot() {
    let palette = [
      Colorf::ZERO,
      Colorf::new(0.5, 0.0, 0.0, 1.0),
      Colorf::new(0.9, 0.0, 0.0, 1.0),
    ];
    // a fully transparent pixel must land on the reserved zero entry
    let transparent = Colorf::new(0.0, 0.0, 0.0, 0.0);
    assert_eq!(nearest_entry(transparent, &palette, 1), 0);
    // an opaque pixel prefers the live entries
    let opaque = Colorf::new(0.55, 0.0, 0.0, 1.0);
    assert_eq!(nearest_entry(opaque, &palette, 1), 1);
  }

  #[test]
  fn test_nearest_entry_skips_all_but_last_reserved() {
    let palette = [
      Colorf::new(0.0, 0.0, 0.0, 0.0),
      Colorf::new(0.0, 0.0, 0.0, 0.0),
      Colorf::new(1.0, 1.0, 1.0, 1.0),
    ];
    // search starts at reserved - 1 = 1, never at 0
    let transparent = Colorf::new(0.0, 0.0, 0.0, 0.0);
    assert_eq!(nearest_entry(transparent, &palette, 2), 1);
  }

  #[test]
  fn test_single_colour_palette_has_zero_spread() {
    let entries = vec![Colorf::new(0.4, 0.1, 0.2, 1.0); 4];
    let map = [0i32];
    let target = TileTarget {
      tile_w: 8,
      tile_h: 8,
      palette_size: 4,
      reserved: 0,
      tile_map: &map,
      palette: &entries,
    };
    let spread = palette_spread(&target, 0.5, false);
    assert_eq!(spread.len(), 1);
    assert_eq!(spread[0], Colorf::ZERO);
  }

  #[test]
  fn test_spread_scales_with_level_and_no_alpha() {
    let entries = vec![
      Colorf::new(0.0, 0.0, 0.0, 0.0),
      Colorf::new(1.0, 0.5, 0.25, 1.0),
    ];
    let map = [0i32];
    let target = TileTarget {
      tile_w: 8,
      tile_h: 8,
      palette_size: 2,
      reserved: 0,
      tile_map: &map,
      palette: &entries,
    };
    let half = palette_spread(&target, 0.5, false)[0];
    let full = palette_spread(&target, 1.0, false)[0];
    assert!((full.b - 2.0 * half.b).abs() < 1e-6);
    let masked = palette_spread(&target, 1.0, true)[0];
    assert_eq!(masked.a, 0.0);
    assert!(masked.b > 0.0);
  }

  #[test]
  fn test_exact_palette_gives_zero_rmse() {
    let a = Bgra8::new(255, 0, 0, 255);
    let b = Bgra8::new(0, 255, 0, 255);
    let px: Vec<Bgra8> = (0..64).map(|i| if i % 2 == 0 { a } else { b }).collect();
    let img = SourceImage::from_bgra(8, 8, &px);
    let palette = vec![
      Colorf::from_bgra8(a, Bgra8::FULL_RANGE).rgb_to_yuv(),
      Colorf::from_bgra8(b, Bgra8::FULL_RANGE).rgb_to_yuv(),
    ];
    let map = [0i32];
    let target = TileTarget {
      tile_w: 8,
      tile_h: 8,
      palette_size: 2,
      reserved: 0,
      tile_map: &map,
      palette: &palette,
    };
    let mut index = vec![0u8; 64];
    let rmse = dither_image(
      &img,
      Bgra8::FULL_RANGE,
      Some(&target),
      Some(&mut index),
      None,
      DitherMode::None,
      0.0,
      false,
    );
    assert!(rmse.len() < 1e-6, "exactly representable image should have zero error");
    assert!(index.iter().enumerate().all(|(i, &e)| e == (i % 2) as u8));
  }

  #[test]
  fn test_raw_floyd_steinberg_preserves_mid_grey_average() {
    // a flat mid grey against a 1-bit range must dither to roughly half
    let grey = Bgra8::new(128, 128, 128, 255);
    let px = vec![grey; 16 * 16];
    let img = SourceImage::from_bgra(16, 16, &px);
    let mut raw = vec![Colorf::ZERO; 16 * 16];
    dither_image(
      &img,
      Bgra8::new(1, 1, 1, 1),
      None,
      None,
      Some(&mut raw),
      DitherMode::FloydSteinberg,
      1.0,
      false,
    );
    let mean_luma: f32 = raw.iter().map(|p| p.b).sum::<f32>() / raw.len() as f32;
    let want = 128.0 / 255.0;
    assert!(
      (mean_luma - want).abs() < 0.05,
      "diffused average {mean_luma} drifted from {want}"
    );
    // every quantized sample is one of the two representable levels
    for p in &raw {
      assert!(p.b.abs() < 1e-6 || (p.b - 1.0).abs() < 1e-6);
    }
  }

  #[test]
  fn test_raw_none_mode_reduces_range() {
    let px = vec![Bgra8::new(100, 160, 220, 255); 4];
    let img = SourceImage::from_bgra(2, 2, &px);
    let range = Bgra8::new(31, 31, 31, 1);
    let mut raw = vec![Colorf::ZERO; 4];
    let rmse = dither_image(&img, range, None, None, Some(&mut raw), DitherMode::None, 0.0, false);
    // the reduced pixel must round-trip through the bit range exactly
    let q = raw[0].yuv_to_rgb().to_bgra8(range);
    let back = Colorf::from_bgra8(q, range).rgb_to_yuv();
    assert!((raw[0].b - back.b).abs() < 1e-5);
    // a small rounding error remains against the 8-bit original
    assert!(rmse.b < 0.05 && rmse.g.abs() < 0.05 && rmse.r.abs() < 0.05);
  }
}
