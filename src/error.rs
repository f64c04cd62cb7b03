//! Error types for the tilequant library.

use thiserror::Error;

/// The error type for all fallible tilequant operations.
#[derive(Debug, Error)]
pub enum TilequantError {
  /// Image dimensions are not an exact multiple of the tile size.
  #[error("image dimensions {width}x{height} are not a multiple of the tile size {tile_w}x{tile_h}")]
  TileSize {
    width: usize,
    height: usize,
    tile_w: usize,
    tile_h: usize,
  },

  /// A configuration parameter is out of range or inconsistent.
  #[error("invalid configuration: {0}")]
  Config(String),

  /// A working buffer could not be allocated.
  #[error("out of memory while allocating working buffers")]
  OutOfMemory,

  /// An I/O operation failed.
  #[error("i/o error: {0}")]
  Io(#[from] std::io::Error),

  /// The input image could not be decoded.
  #[error("image error: {0}")]
  Image(#[from] image::ImageError),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, TilequantError>;
