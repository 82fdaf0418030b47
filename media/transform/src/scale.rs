/*!
    Pixel format conversion and resizing.
*/

use ffmpeg_next::{
    format::Pixel,
    software::scaling::{context::Context as ScalerContext, flag::Flags as ScalerFlags},
    util::frame::video::Video as FfmpegVideo,
};

use media_source::convert::pixel_format_to_ffmpeg;
use media_types::{Error, PixelFormat, Rational, Result, VideoFrame};

use crate::planes::{copy_from_ffmpeg, to_ffmpeg};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ScalingAlgorithm {
    Nearest,
    #[default]
    Bilinear,
    Bicubic,
}

impl ScalingAlgorithm {
    fn flags(self) -> ScalerFlags {
        match self {
            Self::Nearest => ScalerFlags::POINT,
            Self::Bilinear => ScalerFlags::BILINEAR,
            Self::Bicubic => ScalerFlags::BICUBIC,
        }
    }
}

/**
    Output size and format of a [`Scaler`].
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScaleTarget {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub algorithm: ScalingAlgorithm,
}

impl ScaleTarget {
    pub fn new(width: u32, height: u32, format: PixelFormat) -> Self {
        Self {
            width,
            height,
            format,
            algorithm: ScalingAlgorithm::default(),
        }
    }

    pub fn with_algorithm(mut self, algorithm: ScalingAlgorithm) -> Self {
        self.algorithm = algorithm;
        self
    }
}

struct ScalerState {
    context: ScalerContext,
    src_width: u32,
    src_height: u32,
    src_format: Pixel,
}

/**
    Converts frames to a fixed [`ScaleTarget`].

    The swscale context is created on first use and rebuilt whenever the
    input size or format changes.
*/
pub struct Scaler {
    target: ScaleTarget,
    state: Option<ScalerState>,
}

impl Scaler {
    pub fn new(target: ScaleTarget) -> Self {
        Self {
            target,
            state: None,
        }
    }

    pub fn target(&self) -> ScaleTarget {
        self.target
    }

    /**
        Convert a packed frame. Frames already in the target shape are copied
        through without touching swscale.
    */
    pub fn convert(&mut self, frame: &VideoFrame) -> Result<VideoFrame> {
        if frame.width == self.target.width
            && frame.height == self.target.height
            && frame.format == self.target.format
        {
            return Ok(frame.clone());
        }
        let source = to_ffmpeg(frame)?;
        self.convert_ffmpeg(&source, frame.time_base)
    }

    /**
        Convert a frame straight from a decoder, in whatever pixel format the
        decoder produced.
    */
    pub fn convert_ffmpeg(
        &mut self,
        frame: &FfmpegVideo,
        time_base: Rational,
    ) -> Result<VideoFrame> {
        if frame.width() == 0 || frame.height() == 0 {
            return Err(Error::invalid_data("input frame has zero dimensions"));
        }

        let target = self.target;
        let context = self.context_for(frame.width(), frame.height(), frame.format())?;
        let mut output = FfmpegVideo::new(
            pixel_format_to_ffmpeg(target.format),
            target.width,
            target.height,
        );
        context
            .run(frame, &mut output)
            .map_err(|e| Error::codec(format!("scaling failed: {e}")))?;

        Ok(VideoFrame::new(
            target.width,
            target.height,
            target.format,
            copy_from_ffmpeg(&output, target.format)?,
            frame.pts(),
            time_base,
        ))
    }

    fn context_for(
        &mut self,
        width: u32,
        height: u32,
        format: Pixel,
    ) -> Result<&mut ScalerContext> {
        let stale = self.state.as_ref().is_none_or(|state| {
            state.src_width != width || state.src_height != height || state.src_format != format
        });

        if stale {
            let context = ScalerContext::get(
                format,
                width,
                height,
                pixel_format_to_ffmpeg(self.target.format),
                self.target.width,
                self.target.height,
                self.target.algorithm.flags(),
            )
            .map_err(|e| Error::codec(format!("failed to create scaler: {e}")))?;
            self.state = Some(ScalerState {
                context,
                src_width: width,
                src_height: height,
                src_format: format,
            });
        }

        match self.state.as_mut() {
            Some(state) => Ok(&mut state.context),
            None => Err(Error::codec("scaler was not initialized")),
        }
    }
}

impl std::fmt::Debug for Scaler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scaler")
            .field("target", &self.target)
            .field("initialized", &self.state.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid_rgba(width: u32, height: u32, rgba: [u8; 4]) -> VideoFrame {
        let data = rgba.repeat((width * height) as usize);
        VideoFrame::new(width, height, PixelFormat::Rgba, data, Some(3), Rational::MICROS)
    }

    #[test]
    fn identical_shape_passes_through() {
        let frame = solid_rgba(4, 4, [1, 2, 3, 255]);
        let mut scaler = Scaler::new(ScaleTarget::new(4, 4, PixelFormat::Rgba));
        let out = scaler.convert(&frame).unwrap();
        assert_eq!(out.data, frame.data);
        assert!(format!("{scaler:?}").contains("initialized: false"));
    }

    #[test]
    fn rgba_to_yuv_keeps_size_and_pts() {
        let frame = solid_rgba(16, 8, [255, 255, 255, 255]);
        let mut scaler = Scaler::new(ScaleTarget::new(16, 8, PixelFormat::Yuv420p));
        let out = scaler.convert(&frame).unwrap();
        assert!(out.is_well_formed());
        assert_eq!(out.pts, Some(3));
        // white maps to full luma (limited range tops out at 235)
        assert!(out.data[0] >= 230);
    }

    #[test]
    fn resize_rebuilds_context_on_new_input_size() {
        let mut scaler = Scaler::new(ScaleTarget::new(8, 8, PixelFormat::Rgba));
        let a = scaler.convert(&solid_rgba(16, 16, [0, 0, 0, 255])).unwrap();
        let b = scaler.convert(&solid_rgba(4, 4, [0, 0, 0, 255])).unwrap();
        assert_eq!((a.width, a.height), (8, 8));
        assert_eq!(b.data.len(), PixelFormat::Rgba.frame_size(8, 8));
    }
}
