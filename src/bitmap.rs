//! Image containers and file I/O.
//!
//! Input images are decoded through the `image` crate; output is always the
//! classic 8-bit palettized BMP (40-byte BITMAPINFOHEADER, 256-entry
//! palette) that palette-based hardware toolchains expect.

use crate::color::Bgra8;
use crate::error::Result;
use byteorder::{LittleEndian, WriteBytesExt};
use image::ImageReader;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// An 8-bit BMP always carries this many palette entries.
pub const BMP_PALETTE_COLOURS: usize = 256;

/// Pixel storage of a source image: direct BGRA, or an index map with its
/// own palette.
pub enum SourcePixels<'a> {
  Bgra(&'a [Bgra8]),
  Indexed { index: &'a [u8], palette: &'a [Bgra8] },
}

/// A borrowed view of a source image handed to the quantization pipeline.
pub struct SourceImage<'a> {
  pub width: usize,
  pub height: usize,
  pub pixels: SourcePixels<'a>,
}

impl<'a> SourceImage<'a> {
  pub fn from_bgra(width: usize, height: usize, pixels: &'a [Bgra8]) -> Self {
    assert_eq!(pixels.len(), width * height, "pixel buffer does not match dimensions");
    SourceImage {
      width,
      height,
      pixels: SourcePixels::Bgra(pixels),
    }
  }

  pub fn from_indexed(width: usize, height: usize, index: &'a [u8], palette: &'a [Bgra8]) -> Self {
    assert_eq!(index.len(), width * height, "index buffer does not match dimensions");
    SourceImage {
      width,
      height,
      pixels: SourcePixels::Indexed { index, palette },
    }
  }

  pub fn pixel_count(&self) -> usize {
    self.width * self.height
  }

  /// Fetches pixel `i` in row-major order, resolving indexed storage
  /// through its palette. Out-of-palette indices read as transparent black.
  #[inline]
  pub fn pixel(&self, i: usize) -> Bgra8 {
    match &self.pixels {
      SourcePixels::Bgra(px) => px[i],
      SourcePixels::Indexed { index, palette } => {
        palette.get(index[i] as usize).copied().unwrap_or_default()
      }
    }
  }
}

/// An image decoded from disk, stored as BGRA.
pub struct LoadedImage {
  pub width: usize,
  pub height: usize,
  pub pixels: Vec<Bgra8>,
}

impl LoadedImage {
  pub fn as_source(&self) -> SourceImage<'_> {
    SourceImage::from_bgra(self.width, self.height, &self.pixels)
  }
}

/// Opens and decodes an image file (any format the `image` crate handles).
pub fn open_image(path: &Path) -> Result<LoadedImage> {
  let decoded = ImageReader::open(path)?.decode()?.into_rgba8();
  let (width, height) = decoded.dimensions();
  let pixels = decoded
    .pixels()
    .map(|p| Bgra8::new(p[2], p[1], p[0], p[3]))
    .collect();
  Ok(LoadedImage {
    width: width as usize,
    height: height as usize,
    pixels,
  })
}

/// Writes an 8-bit palettized BMP.
///
/// The full 256-entry palette is emitted even when fewer colours are used;
/// rows are written bottom-up and padded to four bytes as the format
/// requires.
pub fn write_indexed_bmp(
  path: &Path,
  width: usize,
  height: usize,
  index_data: &[u8],
  palette: &[Bgra8],
) -> Result<()> {
  assert_eq!(index_data.len(), width * height, "index buffer does not match dimensions");

  let stride = (width + 3) & !3;
  let pixel_bytes = stride * height;
  let data_offset = 14 + 40 + 4 * BMP_PALETTE_COLOURS;

  let mut out = BufWriter::new(File::create(path)?);

  // BITMAPFILEHEADER
  out.write_all(b"BM")?;
  out.write_u32::<LittleEndian>((data_offset + pixel_bytes) as u32)?;
  out.write_u16::<LittleEndian>(0)?;
  out.write_u16::<LittleEndian>(0)?;
  out.write_u32::<LittleEndian>(data_offset as u32)?;

  // BITMAPINFOHEADER
  out.write_u32::<LittleEndian>(40)?;
  out.write_i32::<LittleEndian>(width as i32)?;
  out.write_i32::<LittleEndian>(height as i32)?;
  out.write_u16::<LittleEndian>(1)?; // planes
  out.write_u16::<LittleEndian>(8)?; // bits per pixel
  out.write_u32::<LittleEndian>(0)?; // BI_RGB, uncompressed
  out.write_u32::<LittleEndian>(pixel_bytes as u32)?;
  out.write_u32::<LittleEndian>(0)?; // x pixels per metre
  out.write_u32::<LittleEndian>(0)?; // y pixels per metre
  out.write_u32::<LittleEndian>(0)?; // colours used
  out.write_u32::<LittleEndian>(0)?; // colours important

  let mut entries = [Bgra8::default(); BMP_PALETTE_COLOURS];
  let n = palette.len().min(BMP_PALETTE_COLOURS);
  entries[..n].copy_from_slice(&palette[..n]);
  out.write_all(bytemuck::cast_slice(&entries))?;

  let pad = [0u8; 3];
  for y in (0..height).rev() {
    out.write_all(&index_data[y * width..y * width + width])?;
    out.write_all(&pad[..stride - width])?;
  }
  out.flush()?;
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_source_pixel_lookup_direct_and_indexed() {
    let px = [
      Bgra8::new(1, 2, 3, 255),
      Bgra8::new(4, 5, 6, 255),
      Bgra8::new(7, 8, 9, 255),
      Bgra8::new(10, 11, 12, 255),
    ];
    let direct = SourceImage::from_bgra(2, 2, &px);
    assert_eq!(direct.pixel(3), Bgra8::new(10, 11, 12, 255));

    let palette = [Bgra8::new(0, 0, 0, 0), Bgra8::new(255, 0, 0, 255)];
    let index = [0u8, 1, 1, 0];
    let indexed = SourceImage::from_indexed(2, 2, &index, &palette);
    assert_eq!(indexed.pixel(0), palette[0]);
    assert_eq!(indexed.pixel(1), palette[1]);
  }

  #[test]
  fn test_indexed_out_of_palette_reads_transparent() {
    let palette = [Bgra8::new(9, 9, 9, 255)];
    let index = [4u8];
    let img = SourceImage::from_indexed(1, 1, &index, &palette);
    assert_eq!(img.pixel(0), Bgra8::default());
  }

  #[test]
  fn test_bmp_layout_and_row_padding() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out.bmp");

    // 5 wide forces 3 bytes of row padding
    let (w, h) = (5usize, 2usize);
    let index: Vec<u8> = (0..(w * h) as u8).collect();
    let palette = vec![Bgra8::new(10, 20, 30, 255); 2];
    write_indexed_bmp(&path, w, h, &index, &palette).unwrap();

    let bytes = std::fs::read(&path).unwrap();
    let stride = 8;
    let offset = 14 + 40 + 4 * BMP_PALETTE_COLOURS;
    assert_eq!(&bytes[..2], b"BM");
    assert_eq!(bytes.len(), offset + stride * h);
    assert_eq!(u32::from_le_bytes(bytes[10..14].try_into().unwrap()) as usize, offset);
    assert_eq!(u16::from_le_bytes(bytes[28..30].try_into().unwrap()), 8, "bits per pixel");
    // bottom-up: the file's first row is the image's last
    assert_eq!(bytes[offset], index[w]);
    assert_eq!(bytes[offset + stride], index[0]);
    // padding bytes are zero
    assert_eq!(&bytes[offset + w..offset + stride], &[0, 0, 0]);
  }

  #[test]
  fn test_bmp_round_trips_through_image_crate() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("two_colour.bmp");

    let (w, h) = (4usize, 4usize);
    let mut index = vec![0u8; w * h];
    index[5] = 1;
    let mut palette = vec![Bgra8::default(); 2];
    palette[0] = Bgra8::new(0, 0, 0, 255);
    palette[1] = Bgra8::new(30, 60, 200, 255);
    write_indexed_bmp(&path, w, h, &index, &palette).unwrap();

    let back = open_image(&path).unwrap();
    assert_eq!((back.width, back.height), (w, h));
    let px = back.pixels[5];
    assert_eq!((px.b, px.g, px.r), (30, 60, 200));
    let px = back.pixels[0];
    assert_eq!((px.b, px.g, px.r), (0, 0, 0));
  }
}
