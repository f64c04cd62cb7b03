//! Colour algebra: packed BGRA pixels, float colour vectors, bit-range
//! conversions and the YUV working space.

use bytemuck::{Pod, Zeroable};
use std::ops::{Add, Div, Mul, Sub};

/// A packed 8-bit BGRA pixel.
///
/// Also doubles as the per-channel bit-range vector (e.g. 31,31,31,1 for
/// 5-5-5-1 output) and as an output palette entry.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct Bgra8 {
  pub b: u8,
  pub g: u8,
  pub r: u8,
  pub a: u8,
}

impl Bgra8 {
  pub const fn new(b: u8, g: u8, r: u8, a: u8) -> Self {
    Bgra8 { b, g, r, a }
  }

  /// Full 8-bit range (255 per channel).
  pub const FULL_RANGE: Bgra8 = Bgra8::new(255, 255, 255, 255);

  /// Expands a value quantized against `range` back to the 8-bit range.
  pub fn expand(self, range: Bgra8) -> Bgra8 {
    fn ch(q: u8, range: u8) -> u8 {
      (q as f32 * 255.0 / range as f32).round() as u8
    }
    Bgra8::new(
      ch(self.b, range.b),
      ch(self.g, range.g),
      ch(self.r, range.r),
      ch(self.a, range.a),
    )
  }
}

/// A colour vector of four independent float channels, ordered B,G,R,A.
///
/// In the working space the same layout carries YUVA: luma in `b`, the two
/// chroma axes in `g` and `r`, alpha in `a`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Colorf {
  pub b: f32,
  pub g: f32,
  pub r: f32,
  pub a: f32,
}

impl Colorf {
  pub const ZERO: Colorf = Colorf::new(0.0, 0.0, 0.0, 0.0);

  pub const fn new(b: f32, g: f32, r: f32, a: f32) -> Self {
    Colorf { b, g, r, a }
  }

  /// Converts a packed pixel to floats normalized against `range`.
  pub fn from_bgra8(px: Bgra8, range: Bgra8) -> Colorf {
    Colorf::new(
      px.b as f32 / range.b as f32,
      px.g as f32 / range.g as f32,
      px.r as f32 / range.r as f32,
      px.a as f32 / range.a as f32,
    )
  }

  /// Quantizes each channel to `clip(round(f * range), 0, range)`.
  pub fn to_bgra8(self, range: Bgra8) -> Bgra8 {
    fn ch(f: f32, range: u8) -> u8 {
      (f * range as f32).round().clamp(0.0, range as f32) as u8
    }
    Bgra8::new(
      ch(self.b, range.b),
      ch(self.g, range.g),
      ch(self.r, range.r),
      ch(self.a, range.a),
    )
  }

  pub fn abs(self) -> Colorf {
    Colorf::new(self.b.abs(), self.g.abs(), self.r.abs(), self.a.abs())
  }

  pub fn sqrt(self) -> Colorf {
    Colorf::new(self.b.sqrt(), self.g.sqrt(), self.r.sqrt(), self.a.sqrt())
  }

  /// Squares each channel, keeping its sign.
  pub fn signed_square(self) -> Colorf {
    self * self.abs()
  }

  /// Square root of each channel's magnitude, keeping its sign.
  pub fn signed_sqrt(self) -> Colorf {
    fn ch(x: f32) -> f32 {
      x.abs().sqrt().copysign(x)
    }
    Colorf::new(ch(self.b), ch(self.g), ch(self.r), ch(self.a))
  }

  /// Elementwise division substituting `fallback` where a divisor channel
  /// is exactly zero.
  pub fn div_safe(self, den: Colorf, fallback: Colorf) -> Colorf {
    fn ch(num: f32, den: f32, fallback: f32) -> f32 {
      if den == 0.0 { fallback } else { num / den }
    }
    Colorf::new(
      ch(self.b, den.b, fallback.b),
      ch(self.g, den.g, fallback.g),
      ch(self.r, den.r, fallback.r),
      ch(self.a, den.a, fallback.a),
    )
  }

  pub fn clip(self, min: f32, max: f32) -> Colorf {
    Colorf::new(
      self.b.clamp(min, max),
      self.g.clamp(min, max),
      self.r.clamp(min, max),
      self.a.clamp(min, max),
    )
  }

  pub fn dot(self, other: Colorf) -> f32 {
    self.b * other.b + self.g * other.g + self.r * other.r + self.a * other.a
  }

  pub fn len2(self) -> f32 {
    self.dot(self)
  }

  pub fn len(self) -> f32 {
    self.len2().sqrt()
  }

  /// Plain squared distance between two colours.
  pub fn dist2(self, other: Colorf) -> f32 {
    (self - other).len2()
  }

  /// Perceptually weighted squared distance, used by all quantization and
  /// palette-matching paths. The difference is scaled by
  /// (1 + |dY|) * (1 + |dA|) before squaring, a tuned weight that makes
  /// luma and alpha mismatches count for more than chroma.
  pub fn perceptual_dist2(self, other: Colorf) -> f32 {
    let d = self - other;
    let d = d * ((1.0 + d.b.abs()) * (1.0 + d.a.abs()));
    d.len2()
  }

  /// Rotates an RGBA colour into YUVA (ITU-R BT.709), alpha untouched.
  /// Luma lands in the `b` lane, U in `g`, V in `r`.
  pub fn rgb_to_yuv(self) -> Colorf {
    Colorf::new(
      0.2126 * self.r + 0.7152 * self.g + 0.0722 * self.b,
      -0.1146 * self.r - 0.3854 * self.g + 0.5 * self.b,
      0.5 * self.r - 0.4542 * self.g - 0.0458 * self.b,
      self.a,
    )
  }

  /// Inverse of [`Colorf::rgb_to_yuv`].
  pub fn yuv_to_rgb(self) -> Colorf {
    let (y, u, v) = (self.b, self.g, self.r);
    Colorf::new(
      y + 1.855609686 * u,
      y - 0.187280216 * u - 0.468124625 * v,
      y + 1.574765276 * v,
      self.a,
    )
  }
}

impl Add for Colorf {
  type Output = Colorf;
  fn add(self, rhs: Colorf) -> Colorf {
    Colorf::new(self.b + rhs.b, self.g + rhs.g, self.r + rhs.r, self.a + rhs.a)
  }
}

impl Add<f32> for Colorf {
  type Output = Colorf;
  fn add(self, rhs: f32) -> Colorf {
    Colorf::new(self.b + rhs, self.g + rhs, self.r + rhs, self.a + rhs)
  }
}

impl Sub for Colorf {
  type Output = Colorf;
  fn sub(self, rhs: Colorf) -> Colorf {
    Colorf::new(self.b - rhs.b, self.g - rhs.g, self.r - rhs.r, self.a - rhs.a)
  }
}

impl Sub<f32> for Colorf {
  type Output = Colorf;
  fn sub(self, rhs: f32) -> Colorf {
    Colorf::new(self.b - rhs, self.g - rhs, self.r - rhs, self.a - rhs)
  }
}

impl Mul for Colorf {
  type Output = Colorf;
  fn mul(self, rhs: Colorf) -> Colorf {
    Colorf::new(self.b * rhs.b, self.g * rhs.g, self.r * rhs.r, self.a * rhs.a)
  }
}

impl Mul<f32> for Colorf {
  type Output = Colorf;
  fn mul(self, rhs: f32) -> Colorf {
    Colorf::new(self.b * rhs, self.g * rhs, self.r * rhs, self.a * rhs)
  }
}

impl Div for Colorf {
  type Output = Colorf;
  fn div(self, rhs: Colorf) -> Colorf {
    Colorf::new(self.b / rhs.b, self.g / rhs.g, self.r / rhs.r, self.a / rhs.a)
  }
}

impl Div<f32> for Colorf {
  type Output = Colorf;
  fn div(self, rhs: f32) -> Colorf {
    Colorf::new(self.b / rhs, self.g / rhs, self.r / rhs, self.a / rhs)
  }
}
