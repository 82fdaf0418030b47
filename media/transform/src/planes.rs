/*!
    Plane layout of packed frames, and copies to and from FFmpeg frames.
*/

use ffmpeg_next::util::frame::video::Video as FfmpegVideo;

use media_source::convert::pixel_format_to_ffmpeg;
use media_types::{Error, PixelFormat, Result, VideoFrame};

/**
    One plane of a packed frame: bytes per row and number of rows.
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Plane {
    pub row_bytes: usize,
    pub rows: usize,
}

impl Plane {
    pub fn len(&self) -> usize {
        self.row_bytes * self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/**
    Plane layout for a frame of the given format and size, in storage order.
    Chroma dimensions round up for odd sizes, matching FFmpeg.
*/
pub fn layout(format: PixelFormat, width: u32, height: u32) -> Vec<Plane> {
    let (w, h) = (width as usize, height as usize);
    let (cw, ch) = (w.div_ceil(2), h.div_ceil(2));
    match format {
        PixelFormat::Yuv420p => vec![
            Plane { row_bytes: w, rows: h },
            Plane { row_bytes: cw, rows: ch },
            Plane { row_bytes: cw, rows: ch },
        ],
        PixelFormat::Nv12 => vec![
            Plane { row_bytes: w, rows: h },
            Plane { row_bytes: cw * 2, rows: ch },
        ],
        PixelFormat::Rgba | PixelFormat::Bgra => vec![Plane { row_bytes: w * 4, rows: h }],
        PixelFormat::Rgb24 => vec![Plane { row_bytes: w * 3, rows: h }],
    }
}

/**
    Copy the visible part of every plane out of an FFmpeg frame, dropping
    stride padding.
*/
pub fn copy_from_ffmpeg(frame: &FfmpegVideo, format: PixelFormat) -> Result<Vec<u8>> {
    let planes = layout(format, frame.width(), frame.height());
    let mut output = Vec::with_capacity(planes.iter().map(Plane::len).sum());

    for (index, plane) in planes.iter().enumerate() {
        let stride = frame.stride(index);
        let data = frame.data(index);
        if plane.rows > 0 && data.len() < (plane.rows - 1) * stride + plane.row_bytes {
            return Err(Error::invalid_data(format!(
                "plane {index} holds {} bytes, too short for {} rows of {}",
                data.len(),
                plane.rows,
                plane.row_bytes
            )));
        }
        for row in 0..plane.rows {
            let start = row * stride;
            output.extend_from_slice(&data[start..start + plane.row_bytes]);
        }
    }

    Ok(output)
}

/**
    Copy a packed frame into an FFmpeg frame of the same format and size.
*/
pub fn copy_into_ffmpeg(dst: &mut FfmpegVideo, src: &VideoFrame) -> Result<()> {
    if !src.is_well_formed() {
        return Err(Error::invalid_data(format!(
            "{:?} frame of {}x{} has {} bytes, expected {}",
            src.format,
            src.width,
            src.height,
            src.data.len(),
            src.format.frame_size(src.width, src.height)
        )));
    }

    let mut offset = 0;
    for (index, plane) in layout(src.format, src.width, src.height).iter().enumerate() {
        let stride = dst.stride(index);
        let data = dst.data_mut(index);
        for row in 0..plane.rows {
            let start = row * stride;
            data[start..start + plane.row_bytes]
                .copy_from_slice(&src.data[offset..offset + plane.row_bytes]);
            offset += plane.row_bytes;
        }
    }

    Ok(())
}

/**
    Allocate an FFmpeg frame holding a copy of `src`, carrying its pts.
*/
pub fn to_ffmpeg(src: &VideoFrame) -> Result<FfmpegVideo> {
    let mut frame = FfmpegVideo::new(pixel_format_to_ffmpeg(src.format), src.width, src.height);
    copy_into_ffmpeg(&mut frame, src)?;
    frame.set_pts(src.pts);
    Ok(frame)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_sums_to_frame_size() {
        for format in [
            PixelFormat::Yuv420p,
            PixelFormat::Nv12,
            PixelFormat::Rgba,
            PixelFormat::Bgra,
            PixelFormat::Rgb24,
        ] {
            for (w, h) in [(1280, 720), (3, 5), (1, 1)] {
                let total: usize = layout(format, w, h).iter().map(Plane::len).sum();
                assert_eq!(total, format.frame_size(w, h), "{format:?} {w}x{h}");
            }
        }
    }

    #[test]
    fn odd_yuv_chroma_rounds_up() {
        let planes = layout(PixelFormat::Yuv420p, 5, 3);
        assert_eq!(planes[1], Plane { row_bytes: 3, rows: 2 });
    }

    #[test]
    fn ffmpeg_copy_preserves_pixels() {
        let data: Vec<u8> = (0..PixelFormat::Yuv420p.frame_size(6, 4))
            .map(|i| i as u8)
            .collect();
        let frame = VideoFrame::new(
            6,
            4,
            PixelFormat::Yuv420p,
            data.clone(),
            Some(7),
            media_types::Rational::MICROS,
        );
        let ffmpeg = to_ffmpeg(&frame).unwrap();
        assert_eq!(ffmpeg.pts(), Some(7));
        assert_eq!(copy_from_ffmpeg(&ffmpeg, PixelFormat::Yuv420p).unwrap(), data);
    }

    #[test]
    fn malformed_frame_is_rejected() {
        let frame = VideoFrame::new(
            2,
            2,
            PixelFormat::Rgba,
            vec![0; 3],
            None,
            media_types::Rational::MICROS,
        );
        let mut dst = FfmpegVideo::new(ffmpeg_next::format::Pixel::RGBA, 2, 2);
        assert!(copy_into_ffmpeg(&mut dst, &frame).is_err());
    }
}
