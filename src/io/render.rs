//! Still frames and the animated sequence shown next to the map

use crate::config::RenderConfig;
use crate::types::{NdviImage, NdviResult, SeriesRow};
use image::codecs::gif::{GifEncoder, Repeat};
use image::{Delay, Frame, Rgba, RgbaImage};
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

/// Turns a clipped NDVI array into an image
pub trait FrameRenderer {
    fn render(&self, data: &NdviImage) -> NdviResult<RgbaImage>;
}

/// Yellow-to-green ramp (ColorBrewer YlGn, 9 classes)
const YLGN: [[u8; 3]; 9] = [
    [255, 255, 229],
    [247, 252, 185],
    [217, 240, 163],
    [173, 221, 142],
    [120, 198, 121],
    [65, 171, 93],
    [35, 132, 67],
    [0, 104, 55],
    [0, 69, 41],
];

const TRANSPARENT: Rgba<u8> = Rgba([0, 0, 0, 0]);

/// Linear colormap renderer; NaN and low values are transparent
#[derive(Debug, Clone)]
pub struct ColormapRenderer {
    config: RenderConfig,
}

impl ColormapRenderer {
    pub fn new(config: RenderConfig) -> Self {
        Self { config }
    }

    fn color(&self, value: f64) -> Rgba<u8> {
        if !value.is_finite() || value < self.config.mask_below {
            return TRANSPARENT;
        }

        let span = (self.config.vmax - self.config.vmin).max(f64::EPSILON);
        let t = ((value - self.config.vmin) / span).clamp(0.0, 1.0);
        let pos = t * (YLGN.len() - 1) as f64;
        let lo = pos.floor() as usize;
        let hi = (lo + 1).min(YLGN.len() - 1);
        let frac = pos - lo as f64;

        let mix = |a: u8, b: u8| (a as f64 + frac * (b as f64 - a as f64)).round() as u8;
        Rgba([
            mix(YLGN[lo][0], YLGN[hi][0]),
            mix(YLGN[lo][1], YLGN[hi][1]),
            mix(YLGN[lo][2], YLGN[hi][2]),
            255,
        ])
    }
}

impl FrameRenderer for ColormapRenderer {
    fn render(&self, data: &NdviImage) -> NdviResult<RgbaImage> {
        let (rows, cols) = data.dim();
        let mut img = RgbaImage::from_pixel(cols as u32, rows as u32, TRANSPARENT);
        for ((row, col), value) in data.indexed_iter() {
            img.put_pixel(col as u32, row as u32, self.color(*value));
        }
        Ok(img)
    }
}

pub fn frame_file_name(row: &SeriesRow) -> String {
    format!("frame_{}.png", row.date_iso)
}

/// Render one PNG per row into `output_dir`, returning the images in row order
pub fn write_frames(
    renderer: &dyn FrameRenderer,
    output_dir: &Path,
    rows: &[SeriesRow],
    frames: &[NdviImage],
) -> NdviResult<(Vec<String>, Vec<RgbaImage>)> {
    std::fs::create_dir_all(output_dir)?;

    let mut names = Vec::with_capacity(rows.len());
    let mut images = Vec::with_capacity(rows.len());
    for (row, data) in rows.iter().zip(frames) {
        let img = renderer.render(data)?;
        let name = frame_file_name(row);
        img.save(output_dir.join(&name))?;
        log::debug!("Rendered {}", name);
        names.push(name);
        images.push(img);
    }

    log::info!("Rendered {} frames into {}", names.len(), output_dir.display());
    Ok((names, images))
}

/// Write an endlessly looping GIF; frames are padded to a common canvas
pub fn write_animation(path: &Path, images: &[RgbaImage], delay_ms: u32) -> NdviResult<()> {
    let width = images.iter().map(|img| img.width()).max().unwrap_or(0);
    let height = images.iter().map(|img| img.height()).max().unwrap_or(0);
    if width == 0 || height == 0 {
        log::warn!("No frames to animate, skipping {}", path.display());
        return Ok(());
    }

    let delay = Delay::from_numer_denom_ms(delay_ms, 1);
    let frames = images.iter().map(|img| {
        let mut canvas = RgbaImage::from_pixel(width, height, TRANSPARENT);
        image::imageops::overlay(&mut canvas, img, 0, 0);
        Frame::from_parts(canvas, 0, 0, delay)
    });

    let mut encoder = GifEncoder::new(BufWriter::new(File::create(path)?));
    encoder.set_repeat(Repeat::Infinite)?;
    encoder.encode_frames(frames)?;

    log::info!("Wrote {} frame animation to {}", images.len(), path.display());
    Ok(())
}
