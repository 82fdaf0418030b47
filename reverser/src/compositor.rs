/*!
    Software render target for produced video frames.

    The canvas is a plain RGBA buffer. Each produced frame is drawn by a
    caller-supplied callback and converted to YUV 4:2:0 for the encoder.
*/

use image::{ImageBuffer, Rgba, RgbaImage, imageops};
use tracing::trace;

use media_transform::{ScaleTarget, Scaler};
use media_types::{Error as MediaError, PixelFormat, Rational, VideoFrame};

use crate::Result;
use crate::frames::FrameProvider;

pub const BLACK: Rgba<u8> = Rgba([0, 0, 0, 255]);

/**
    The canvas a draw callback paints on.
*/
#[derive(Debug)]
pub struct Surface {
    canvas: RgbaImage,
}

impl Surface {
    fn new(width: u32, height: u32) -> Self {
        Self {
            canvas: RgbaImage::from_pixel(width, height, BLACK),
        }
    }

    pub fn width(&self) -> u32 {
        self.canvas.width()
    }

    pub fn height(&self) -> u32 {
        self.canvas.height()
    }

    pub fn clear(&mut self, color: Rgba<u8>) {
        for pixel in self.canvas.pixels_mut() {
            *pixel = color;
        }
    }

    /**
        Copy an RGBA frame onto the canvas with its top-left corner at
        `(x, y)`. Parts outside the canvas are clipped.
    */
    pub fn draw_frame(&mut self, frame: &VideoFrame, x: i64, y: i64) -> Result<()> {
        if frame.format != PixelFormat::Rgba || !frame.is_well_formed() {
            return Err(MediaError::invalid_data(format!(
                "cannot draw {}x{} {:?} frame of {} bytes",
                frame.width,
                frame.height,
                frame.format,
                frame.data.len()
            ))
            .into());
        }
        let image: ImageBuffer<Rgba<u8>, &[u8]> =
            ImageBuffer::from_raw(frame.width, frame.height, frame.data.as_slice())
                .ok_or_else(|| MediaError::invalid_data("frame buffer too small"))?;
        imageops::replace(&mut self.canvas, &image, x, y);
        Ok(())
    }

    /// Fill a rectangle, clipped to the canvas.
    pub fn fill_rect(&mut self, x: u32, y: u32, width: u32, height: u32, color: Rgba<u8>) {
        let right = x.saturating_add(width).min(self.width());
        let bottom = y.saturating_add(height).min(self.height());
        for py in y.min(bottom)..bottom {
            for px in x.min(right)..right {
                self.canvas.put_pixel(px, py, color);
            }
        }
    }

    pub fn image(&self) -> &RgbaImage {
        &self.canvas
    }
}

/**
    One frame handed to the encoder, and whether production goes on.
*/
#[derive(Debug)]
pub struct Produced {
    pub frame: VideoFrame,
    pub more: bool,
}

/**
    Owns the canvas and turns what is drawn on it into encoder input.
*/
pub struct Compositor {
    surface: Option<Surface>,
    converter: Scaler,
    produced: u64,
}

impl Compositor {
    pub fn new(width: u32, height: u32) -> Result<Self> {
        if width == 0 || height == 0 || width % 2 != 0 || height % 2 != 0 {
            return Err(MediaError::invalid_data(format!(
                "compositor size {width}x{height} must be even and non-zero"
            ))
            .into());
        }
        Ok(Self {
            surface: Some(Surface::new(width, height)),
            converter: Scaler::new(ScaleTarget::new(width, height, PixelFormat::Yuv420p)),
            produced: 0,
        })
    }

    /// Frames produced so far; equals the number of draw callback calls.
    pub fn produced(&self) -> u64 {
        self.produced
    }

    /**
        Let `draw` paint the frame presented at `position_micros`, then
        convert the canvas into an encoder-ready frame stamped with that
        position. The frame is returned even when `draw` asks to stop.
    */
    pub fn produce_frame<F>(&mut self, position_micros: i64, draw: F) -> Result<Produced>
    where
        F: FnOnce(&mut Surface, i64) -> Result<bool>,
    {
        let surface = self
            .surface
            .as_mut()
            .ok_or_else(|| MediaError::invalid_state("compositor", "produce_frame", "Released"))?;
        let more = draw(surface, position_micros)?;
        self.produced += 1;

        let canvas = VideoFrame::new(
            surface.width(),
            surface.height(),
            PixelFormat::Rgba,
            surface.canvas.as_raw().clone(),
            Some(position_micros),
            Rational::MICROS,
        );
        let frame = self.converter.convert(&canvas)?;
        trace!(position_micros, more, "frame produced");
        Ok(Produced { frame, more })
    }

    /// Drop the canvas. Idempotent; producing afterwards fails.
    pub fn release(&mut self) {
        self.surface = None;
    }

    pub fn is_released(&self) -> bool {
        self.surface.is_none()
    }
}

/**
    Source of the frames an encoder loop submits.
*/
pub trait FrameProducer {
    fn produce_frame<F>(&mut self, position_micros: i64, draw: F) -> Result<Produced>
    where
        F: FnOnce(&mut Surface, i64) -> Result<bool>;

    fn release(&mut self);
}

impl FrameProducer for Compositor {
    fn produce_frame<F>(&mut self, position_micros: i64, draw: F) -> Result<Produced>
    where
        F: FnOnce(&mut Surface, i64) -> Result<bool>,
    {
        Compositor::produce_frame(self, position_micros, draw)
    }

    fn release(&mut self) {
        Compositor::release(self);
    }
}

impl std::fmt::Debug for Compositor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Compositor")
            .field("target", &self.converter.target())
            .field("produced", &self.produced)
            .field("released", &self.is_released())
            .finish()
    }
}

/**
    The draw callback of a reversal: shows the source frame at
    `duration - position` and keeps going while `position < duration`.
*/
#[derive(Debug)]
pub struct ReverseDrawer<P> {
    frames: P,
    duration_micros: i64,
    progress_bar: bool,
    unavailable: u64,
}

impl<P: FrameProvider> ReverseDrawer<P> {
    pub fn new(frames: P, duration_micros: i64) -> Self {
        Self {
            frames,
            duration_micros,
            progress_bar: false,
            unavailable: 0,
        }
    }

    pub fn with_progress_bar(mut self, enabled: bool) -> Self {
        self.progress_bar = enabled;
        self
    }

    /// Positions for which no source frame was found and a blank frame was drawn.
    pub fn unavailable(&self) -> u64 {
        self.unavailable
    }

    pub fn draw(&mut self, surface: &mut Surface, position_micros: i64) -> Result<bool> {
        surface.clear(BLACK);

        let source_micros = self.duration_micros - position_micros;
        match self.frames.frame_near(source_micros)? {
            Some(frame) => surface.draw_frame(&frame, 0, 0)?,
            None => {
                self.unavailable += 1;
                trace!(source_micros, "no frame near position, drawing blank");
            }
        }

        if self.progress_bar {
            draw_progress(surface, position_micros, self.duration_micros);
        }
        Ok(position_micros < self.duration_micros)
    }
}

/// A bar along the bottom edge, as wide as the elapsed fraction.
fn draw_progress(surface: &mut Surface, position_micros: i64, duration_micros: i64) {
    if duration_micros <= 0 {
        return;
    }
    let fraction = (position_micros as f64 / duration_micros as f64).clamp(0.0, 1.0);
    let bar_height = (surface.height() / 60).max(2);
    let width = (surface.width() as f64 * fraction).round() as u32;
    let y = surface.height() - bar_height;
    surface.fill_rect(0, y, width, bar_height, Rgba([255, 255, 255, 255]));
}
