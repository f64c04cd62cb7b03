//! # tilequant
//!
//! Tile-constrained colour quantization for retro display hardware.
//!
//! Given an image, the pipeline assigns every fixed-size tile to one of a
//! small number of palettes, converges the colours of each palette with an
//! LBG vector quantizer, and maps every pixel to its palette entry under an
//! optional dithering strategy (Floyd-Steinberg error diffusion or a
//! recursive Bayer matrix scaled by each palette's colour spread).
//!
//! ## Example
//!
//! ```no_run
//! use std::path::Path;
//! use tilequant::bitmap::{open_image, write_indexed_bmp};
//! use tilequant::{PalettizeConfig, palettize};
//!
//! let image = open_image(Path::new("input.bmp"))?;
//! let output = palettize(&image.as_source(), &PalettizeConfig::default())?;
//! write_indexed_bmp(
//!   Path::new("output.bmp"),
//!   image.width,
//!   image.height,
//!   &output.index_data,
//!   &output.palette,
//! )?;
//! # Ok::<(), tilequant::TilequantError>(())
//! ```

pub mod args;
pub mod bitmap;
pub mod color;
pub mod dither;
pub mod error;
pub mod palette;
pub mod pipeline;
pub mod quantize;
pub mod tiles;

pub use color::{Bgra8, Colorf};
pub use dither::DitherMode;
pub use error::{Result, TilequantError};
pub use pipeline::{PalettizeConfig, PalettizeOutput, palettize};
