//! Minimal raster plotting used by the export and display probes.
//!
//! A [`Figure`] is rendered onto an RGB [`Canvas`], which can be encoded as
//! PNG entirely in memory.

use crate::error::{HabitatError, Result};
use flate2::Compression;
use flate2::Crc;
use flate2::write::ZlibEncoder;
use std::fs;
use std::io::Write;
use std::path::Path;

pub const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', b'\r', b'\n', 0x1a, b'\n'];

/// Zero-length IEND chunk including its CRC.
const IEND_TRAILER: [u8; 12] = [0, 0, 0, 0, b'I', b'E', b'N', b'D', 0xae, 0x42, 0x60, 0x82];

const WHITE: [u8; 3] = [0xff, 0xff, 0xff];
const BLACK: [u8; 3] = [0x00, 0x00, 0x00];
const BLUE: [u8; 3] = [0x1f, 0x77, 0xb4];

const MARGIN: u32 = 8;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Canvas {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl Canvas {
    pub fn new(width: u32, height: u32) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(HabitatError::Render(format!(
                "canvas must not be empty ({width}x{height})"
            )));
        }
        let len = (width as usize)
            .checked_mul(height as usize)
            .and_then(|n| n.checked_mul(3))
            .ok_or_else(|| HabitatError::Render(format!("canvas too large ({width}x{height})")))?;

        let mut pixels = Vec::with_capacity(len);
        for _ in 0..(len / 3) {
            pixels.extend_from_slice(&WHITE);
        }
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        let offset = self.offset(x, y)?;
        Some([
            self.pixels[offset],
            self.pixels[offset + 1],
            self.pixels[offset + 2],
        ])
    }

    /// Out-of-bounds writes are clipped.
    pub fn set_pixel(&mut self, x: i64, y: i64, color: [u8; 3]) {
        if x < 0 || y < 0 {
            return;
        }
        if let Some(offset) = self.offset(x as u32, y as u32) {
            self.pixels[offset..offset + 3].copy_from_slice(&color);
        }
    }

    /// Bresenham line between two pixel coordinates.
    pub fn draw_line(&mut self, from: (i64, i64), to: (i64, i64), color: [u8; 3]) {
        let (mut x0, mut y0) = from;
        let (x1, y1) = to;
        let dx = (x1 - x0).abs();
        let dy = -(y1 - y0).abs();
        let sx = if x0 < x1 { 1 } else { -1 };
        let sy = if y0 < y1 { 1 } else { -1 };
        let mut err = dx + dy;

        loop {
            self.set_pixel(x0, y0, color);
            if x0 == x1 && y0 == y1 {
                break;
            }
            let e2 = 2 * err;
            if e2 >= dy {
                err += dy;
                x0 += sx;
            }
            if e2 <= dx {
                err += dx;
                y0 += sy;
            }
        }
    }

    /// 32-bit pixels with an unused pad byte, rows top to bottom.
    ///
    /// Little-endian order is B, G, R, X (X11 LSBFirst ZPixmap, Wayland
    /// `XRGB8888`, a 32bpp GDI DIB); big-endian is X, R, G, B.
    pub fn to_xrgb32(&self, little_endian: bool) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.pixels.len() / 3 * 4);
        for rgb in self.pixels.chunks_exact(3) {
            let (r, g, b) = (rgb[0], rgb[1], rgb[2]);
            if little_endian {
                out.extend_from_slice(&[b, g, r, 0]);
            } else {
                out.extend_from_slice(&[0, r, g, b]);
            }
        }
        out
    }

    fn offset(&self, x: u32, y: u32) -> Option<usize> {
        if x >= self.width || y >= self.height {
            return None;
        }
        Some((y as usize * self.width as usize + x as usize) * 3)
    }

    pub fn encode_png(&self) -> Result<Vec<u8>> {
        let mut png = Vec::new();
        png.extend_from_slice(&PNG_SIGNATURE);

        let mut header = Vec::with_capacity(13);
        header.extend_from_slice(&self.width.to_be_bytes());
        header.extend_from_slice(&self.height.to_be_bytes());
        // 8-bit truecolor, deflate, adaptive filtering, no interlace
        header.extend_from_slice(&[8, 2, 0, 0, 0]);
        write_chunk(&mut png, b"IHDR", &header);

        let row_len = self.width as usize * 3;
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        for row in self.pixels.chunks(row_len) {
            encoder.write_all(&[0])?;
            encoder.write_all(row)?;
        }
        let data = encoder.finish()?;
        write_chunk(&mut png, b"IDAT", &data);
        write_chunk(&mut png, b"IEND", &[]);

        Ok(png)
    }
}

fn write_chunk(out: &mut Vec<u8>, kind: &[u8; 4], data: &[u8]) {
    out.extend_from_slice(&(data.len() as u32).to_be_bytes());
    out.extend_from_slice(kind);
    out.extend_from_slice(data);

    let mut crc = Crc::new();
    crc.update(kind);
    crc.update(data);
    out.extend_from_slice(&crc.sum().to_be_bytes());
}

/// A single line series with axes.
#[derive(Debug, Clone, PartialEq)]
pub struct Figure {
    width: u32,
    height: u32,
    points: Vec<(f64, f64)>,
}

impl Figure {
    pub fn new(width: u32, height: u32, points: Vec<(f64, f64)>) -> Self {
        Self {
            width,
            height,
            points,
        }
    }

    /// One period of a sine wave.
    pub fn sample() -> Self {
        let points = (0..=64)
            .map(|i| {
                let x = f64::from(i) / 64.0 * std::f64::consts::TAU;
                (x, x.sin())
            })
            .collect();
        Self::new(160, 120, points)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn render(&self) -> Result<Canvas> {
        let mut canvas = Canvas::new(self.width, self.height)?;
        if self.width <= 2 * MARGIN || self.height <= 2 * MARGIN {
            return Ok(canvas);
        }

        let left = i64::from(MARGIN);
        let top = i64::from(MARGIN);
        let right = i64::from(self.width - MARGIN - 1);
        let bottom = i64::from(self.height - MARGIN - 1);
        canvas.draw_line((left, bottom), (right, bottom), BLACK);
        canvas.draw_line((left, top), (left, bottom), BLACK);

        let Some(bounds) = Bounds::of(&self.points) else {
            return Ok(canvas);
        };
        let project = |(x, y): (f64, f64)| -> (i64, i64) {
            let px = left as f64 + bounds.scale_x(x) * (right - left) as f64;
            let py = bottom as f64 - bounds.scale_y(y) * (bottom - top) as f64;
            (px.round() as i64, py.round() as i64)
        };

        for pair in self.points.windows(2) {
            canvas.draw_line(project(pair[0]), project(pair[1]), BLUE);
        }
        if let [only] = self.points.as_slice() {
            let (x, y) = project(*only);
            canvas.set_pixel(x, y, BLUE);
        }
        Ok(canvas)
    }
}

struct Bounds {
    min_x: f64,
    max_x: f64,
    min_y: f64,
    max_y: f64,
}

impl Bounds {
    fn of(points: &[(f64, f64)]) -> Option<Self> {
        let finite: Vec<_> = points
            .iter()
            .filter(|(x, y)| x.is_finite() && y.is_finite())
            .collect();
        let first = finite.first()?;
        let mut bounds = Bounds {
            min_x: first.0,
            max_x: first.0,
            min_y: first.1,
            max_y: first.1,
        };
        for (x, y) in finite {
            bounds.min_x = bounds.min_x.min(*x);
            bounds.max_x = bounds.max_x.max(*x);
            bounds.min_y = bounds.min_y.min(*y);
            bounds.max_y = bounds.max_y.max(*y);
        }
        Some(bounds)
    }

    fn scale_x(&self, x: f64) -> f64 {
        scale(x, self.min_x, self.max_x)
    }

    fn scale_y(&self, y: f64) -> f64 {
        scale(y, self.min_y, self.max_y)
    }
}

fn scale(value: f64, min: f64, max: f64) -> f64 {
    if max > min {
        ((value - min) / (max - min)).clamp(0.0, 1.0)
    } else {
        0.5
    }
}

/// Render the sample figure and encode it as PNG in memory.
pub fn export_sample_png() -> Result<Vec<u8>> {
    let png = Figure::sample().render()?.encode_png()?;
    if !png.starts_with(&PNG_SIGNATURE) {
        return Err(HabitatError::Render("encoder produced no PNG signature".to_string()));
    }
    log::debug!("Rendered sample figure to {} PNG bytes", png.len());
    Ok(png)
}

/// Export the sample figure to a PNG file in `dir` and read it back.
///
/// The file is removed when this returns. Fails when the directory is not
/// writable or the bytes on disk are not the PNG that was written.
pub fn export_sample_png_in(dir: &Path) -> Result<usize> {
    let png = export_sample_png()?;

    let mut file = tempfile::Builder::new()
        .prefix("habitat-export-")
        .suffix(".png")
        .tempfile_in(dir)?;
    file.write_all(&png)?;
    file.flush()?;

    let written = fs::read(file.path())?;
    if written != png {
        return Err(HabitatError::Render(format!(
            "{} holds {} bytes, expected {}",
            file.path().display(),
            written.len(),
            png.len()
        )));
    }
    if !written.ends_with(&IEND_TRAILER) {
        return Err(HabitatError::Render("exported PNG has no IEND chunk".to_string()));
    }
    log::debug!("Exported sample figure to {}", file.path().display());
    Ok(written.len())
}
