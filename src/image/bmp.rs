//! Uncompressed BMP decoding onto a `Gray2` draw target.
//!
//! The frame endpoint serves pre-converted bitmaps, so only the formats a
//! converter plausibly emits are accepted: `BI_RGB` at 1, 4, 8 or 24 bits
//! per pixel, palette-indexed where applicable, bottom-up or top-down rows.
//! Color collapses to luminance; the panel only has four gray levels.

use embedded_graphics::{Pixel, pixelcolor::Gray2, prelude::*};

use crate::error::AppError;

const FILE_HEADER_LEN: usize = 14;
const MIN_DIB_HEADER_LEN: u32 = 40;
const MAX_DIMENSION: u32 = 1024;

/// Parsed view into a BMP byte buffer. Borrows the download buffer, nothing
/// is copied.
pub struct Bmp<'a> {
    pub width: u32,
    pub height: u32,
    bottom_up: bool,
    bits_per_pixel: u16,
    row_stride: usize,
    palette: &'a [u8],
    pixels: &'a [u8],
}

impl<'a> Bmp<'a> {
    pub fn parse(data: &'a [u8]) -> Result<Self, AppError> {
        if data.len() < FILE_HEADER_LEN + MIN_DIB_HEADER_LEN as usize {
            return Err(AppError::Image("truncated header"));
        }
        if &data[0..2] != b"BM" {
            return Err(AppError::Image("missing BM signature"));
        }
        let data_offset = read_u32(data, 10)? as usize;
        let dib_len = read_u32(data, 14)?;
        if dib_len < MIN_DIB_HEADER_LEN {
            return Err(AppError::Image("legacy DIB header"));
        }
        let width = read_u32(data, 18)? as i32;
        let raw_height = read_u32(data, 22)? as i32;
        let planes = read_u16(data, 26)?;
        let bits_per_pixel = read_u16(data, 28)?;
        let compression = read_u32(data, 30)?;

        if planes != 1 || compression != 0 {
            return Err(AppError::Image("compressed BMP"));
        }
        if !matches!(bits_per_pixel, 1 | 4 | 8 | 24) {
            return Err(AppError::Image("unsupported bit depth"));
        }
        // negative height means top-down rows
        let bottom_up = raw_height > 0;
        let height = raw_height.unsigned_abs();
        if width <= 0 || height == 0 || width as u32 > MAX_DIMENSION || height > MAX_DIMENSION {
            return Err(AppError::Image("bad dimensions"));
        }
        let width = width as u32;

        // rows are padded to four bytes
        let row_stride = ((bits_per_pixel as usize * width as usize + 31) / 32) * 4;
        let pixel_len = row_stride * height as usize;
        if data.len() < data_offset.saturating_add(pixel_len) || data_offset < FILE_HEADER_LEN {
            return Err(AppError::Image("truncated pixel data"));
        }

        let palette = if bits_per_pixel <= 8 {
            let colors = match read_u32(data, 46)? {
                0 => 1usize << bits_per_pixel,
                n => n as usize,
            };
            let start = FILE_HEADER_LEN + dib_len as usize;
            data.get(start..start.saturating_add(colors * 4))
                .ok_or(AppError::Image("truncated palette"))?
        } else {
            &[]
        };

        Ok(Self {
            width,
            height,
            bottom_up,
            bits_per_pixel,
            row_stride,
            palette,
            pixels: &data[data_offset..data_offset + pixel_len],
        })
    }

    /// Luminance (0-255) of the pixel at (x, y), origin top-left.
    fn luma(&self, x: u32, y: u32) -> u8 {
        let row = if self.bottom_up { self.height - 1 - y } else { y } as usize;
        let row_bytes = &self.pixels[row * self.row_stride..];
        let x = x as usize;
        match self.bits_per_pixel {
            1 => {
                let index = (row_bytes[x / 8] >> (7 - (x % 8))) & 0x01;
                self.palette_luma(index as usize)
            }
            4 => {
                let byte = row_bytes[x / 2];
                let index = if x % 2 == 0 { byte >> 4 } else { byte & 0x0f };
                self.palette_luma(index as usize)
            }
            8 => self.palette_luma(row_bytes[x] as usize),
            _ => {
                // BGR triplets
                let p = x * 3;
                rgb_luma(row_bytes[p + 2], row_bytes[p + 1], row_bytes[p])
            }
        }
    }

    fn palette_luma(&self, index: usize) -> u8 {
        // BGRA entries; an out-of-palette index renders black
        match self.palette.get(index * 4..index * 4 + 3) {
            Some(bgr) => rgb_luma(bgr[2], bgr[1], bgr[0]),
            None => 0,
        }
    }

    /// Draw the bitmap with its top-left corner at `origin`. Pixels falling
    /// outside the target are clipped by the draw target.
    pub fn draw<D>(&self, origin: Point, target: &mut D) -> Result<(), AppError>
    where
        D: DrawTarget<Color = Gray2>,
    {
        for y in 0..self.height {
            let row = (0..self.width).map(|x| {
                Pixel(
                    Point::new(origin.x + x as i32, origin.y + y as i32),
                    gray2_from_luma(self.luma(x, y)),
                )
            });
            target.draw_iter(row).map_err(|_| AppError::Display)?;
        }
        Ok(())
    }
}

/// ITU-R BT.601 luma, integer approximation.
fn rgb_luma(r: u8, g: u8, b: u8) -> u8 {
    ((77 * r as u32 + 150 * g as u32 + 29 * b as u32) >> 8) as u8
}

fn gray2_from_luma(luma: u8) -> Gray2 {
    Gray2::new(luma >> 6)
}

fn read_u16(data: &[u8], offset: usize) -> Result<u16, AppError> {
    data.get(offset..offset + 2)
        .map(|b| u16::from_le_bytes([b[0], b[1]]))
        .ok_or(AppError::Image("truncated header"))
}

fn read_u32(data: &[u8], offset: usize) -> Result<u32, AppError> {
    data.get(offset..offset + 4)
        .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .ok_or(AppError::Image("truncated header"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_graphics::prelude::Size;

    const HEADER_LEN: usize = FILE_HEADER_LEN + 40;

    /// File + BITMAPINFOHEADER with the given geometry; pixel data starts at
    /// `data_offset`.
    fn header(width: i32, height: i32, bpp: u16, data_offset: u32) -> [u8; HEADER_LEN] {
        let mut h = [0u8; HEADER_LEN];
        h[0] = b'B';
        h[1] = b'M';
        h[10..14].copy_from_slice(&data_offset.to_le_bytes());
        h[14..18].copy_from_slice(&40u32.to_le_bytes());
        h[18..22].copy_from_slice(&width.to_le_bytes());
        h[22..26].copy_from_slice(&height.to_le_bytes());
        h[26..28].copy_from_slice(&1u16.to_le_bytes());
        h[28..30].copy_from_slice(&bpp.to_le_bytes());
        h
    }

    /// Draw target that records every pixel it is handed.
    struct Collector {
        pixels: heapless::Vec<(i32, i32, u8), 64>,
    }

    impl Collector {
        fn new() -> Self {
            Self {
                pixels: heapless::Vec::new(),
            }
        }
    }

    impl DrawTarget for Collector {
        type Color = Gray2;
        type Error = core::convert::Infallible;

        fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
        where
            I: IntoIterator<Item = Pixel<Gray2>>,
        {
            for Pixel(point, color) in pixels {
                let _ = self.pixels.push((point.x, point.y, color.luma()));
            }
            Ok(())
        }
    }

    impl OriginDimensions for Collector {
        fn size(&self) -> Size {
            Size::new(16, 16)
        }
    }

    #[test]
    fn parses_24bpp_bottom_up() {
        // 2x2, stride 8: bottom row first in the file
        let mut data = [0u8; HEADER_LEN + 16];
        data[..HEADER_LEN].copy_from_slice(&header(2, 2, 24, HEADER_LEN as u32));
        // file row 0 = image bottom row: black, white
        data[HEADER_LEN..HEADER_LEN + 6].copy_from_slice(&[0, 0, 0, 255, 255, 255]);
        // file row 1 = image top row: white, black
        data[HEADER_LEN + 8..HEADER_LEN + 14].copy_from_slice(&[255, 255, 255, 0, 0, 0]);

        let bmp = Bmp::parse(&data).unwrap();
        assert_eq!((bmp.width, bmp.height), (2, 2));

        let mut target = Collector::new();
        bmp.draw(Point::zero(), &mut target).unwrap();
        assert_eq!(
            target.pixels.as_slice(),
            &[(0, 0, 3), (1, 0, 0), (0, 1, 0), (1, 1, 3)]
        );
    }

    #[test]
    fn parses_1bpp_with_palette() {
        // 9px wide so the second byte of the row matters; stride 4
        let palette_len = 8;
        let data_offset = HEADER_LEN + palette_len;
        let mut data = [0u8; HEADER_LEN + 8 + 4];
        data[..HEADER_LEN].copy_from_slice(&header(9, 1, 1, data_offset as u32));
        // palette: index 0 white, index 1 black
        data[HEADER_LEN..HEADER_LEN + 8].copy_from_slice(&[255, 255, 255, 0, 0, 0, 0, 0]);
        // pixels: 10000000 1.......
        data[data_offset] = 0b1000_0000;
        data[data_offset + 1] = 0b1000_0000;

        let bmp = Bmp::parse(&data).unwrap();
        let mut target = Collector::new();
        bmp.draw(Point::zero(), &mut target).unwrap();
        let pixels = target.pixels.as_slice();
        assert_eq!(pixels[0], (0, 0, 0)); // black
        assert_eq!(pixels[1], (1, 0, 3)); // white
        assert_eq!(pixels[8], (8, 0, 0)); // black, second byte
    }

    #[test]
    fn draw_applies_origin_offset() {
        let mut data = [0u8; HEADER_LEN + 4];
        data[..HEADER_LEN].copy_from_slice(&header(1, 1, 24, HEADER_LEN as u32));
        data[HEADER_LEN..HEADER_LEN + 3].copy_from_slice(&[255, 255, 255]);

        let bmp = Bmp::parse(&data).unwrap();
        let mut target = Collector::new();
        bmp.draw(Point::new(5, 7), &mut target).unwrap();
        assert_eq!(target.pixels.as_slice(), &[(5, 7, 3)]);
    }

    #[test]
    fn rejects_malformed_headers() {
        assert!(matches!(
            Bmp::parse(b"XX"),
            Err(AppError::Image("truncated header"))
        ));

        let mut data = [0u8; HEADER_LEN + 16];
        data[..HEADER_LEN].copy_from_slice(&header(2, 2, 24, HEADER_LEN as u32));
        data[0] = b'X';
        assert!(Bmp::parse(&data).is_err());

        // RLE compression
        let mut data = [0u8; HEADER_LEN + 16];
        data[..HEADER_LEN].copy_from_slice(&header(2, 2, 24, HEADER_LEN as u32));
        data[30] = 1;
        assert!(Bmp::parse(&data).is_err());

        // 16bpp is not a converter output
        let mut data = [0u8; HEADER_LEN + 16];
        data[..HEADER_LEN].copy_from_slice(&header(2, 2, 16, HEADER_LEN as u32));
        assert!(Bmp::parse(&data).is_err());

        // pixel data longer than the buffer
        let data = header(100, 100, 24, HEADER_LEN as u32);
        assert!(Bmp::parse(&data).is_err());
    }
}
