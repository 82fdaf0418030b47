/*!
    Filling stream codec parameters from a descriptor.
*/

use ffmpeg_next::{codec::Parameters, ffi, format::stream::StreamMut};

use media_source::convert::{codec_id_to_ffmpeg, pixel_format_to_ffmpeg, sample_format_to_ffmpeg};
use media_types::{CodecId, Error, MediaParams, Result, SampleFormat, StreamDescriptor};

/**
    Describe `descriptor` on a freshly added output stream.
*/
pub(crate) fn apply(stream: &mut StreamMut, descriptor: &StreamDescriptor) -> Result<()> {
    let codec_id = codec_id_to_ffmpeg(descriptor.codec_id);
    if codec_id == ffmpeg_next::codec::Id::None {
        return Err(Error::unsupported_format(format!(
            "cannot mux {:?} samples",
            descriptor.codec_id
        )));
    }

    let mut parameters = Parameters::new();
    // SAFETY: `parameters` is freshly allocated and exclusively owned here;
    // extradata is allocated with av_mallocz so FFmpeg can free it.
    unsafe {
        let ptr = parameters.as_mut_ptr();
        (*ptr).codec_id = codec_id.into();
        (*ptr).codec_tag = 0;
        if let Some(bit_rate) = descriptor.bit_rate {
            (*ptr).bit_rate = bit_rate as i64;
        }

        match &descriptor.media {
            MediaParams::Video(video) => {
                (*ptr).codec_type = ffi::AVMediaType::AVMEDIA_TYPE_VIDEO;
                (*ptr).width = video.width as i32;
                (*ptr).height = video.height as i32;
                (*ptr).format =
                    ffi::AVPixelFormat::from(pixel_format_to_ffmpeg(video.pixel_format)) as i32;
            }
            MediaParams::Audio(audio) => {
                (*ptr).codec_type = ffi::AVMediaType::AVMEDIA_TYPE_AUDIO;
                (*ptr).sample_rate = audio.sample_rate as i32;
                ffi::av_channel_layout_default(&mut (*ptr).ch_layout, audio.channels as i32);
                let planar = descriptor.codec_id == CodecId::Aac;
                let format = audio.sample_format.unwrap_or(SampleFormat::F32);
                (*ptr).format =
                    ffi::AVSampleFormat::from(sample_format_to_ffmpeg(format, planar)) as i32;
                if descriptor.codec_id == CodecId::Aac {
                    (*ptr).frame_size = 1024;
                }
                (*ptr).initial_padding = audio.priming as i32;
            }
        }

        if let Some(extradata) = descriptor.extradata.as_deref().filter(|d| !d.is_empty()) {
            let size = extradata.len() + ffi::AV_INPUT_BUFFER_PADDING_SIZE as usize;
            let buf = ffi::av_mallocz(size) as *mut u8;
            if buf.is_null() {
                return Err(Error::codec("out of memory copying extradata"));
            }
            std::ptr::copy_nonoverlapping(extradata.as_ptr(), buf, extradata.len());
            (*ptr).extradata = buf;
            (*ptr).extradata_size = extradata.len() as i32;
        }
    }

    stream.set_parameters(parameters);
    Ok(())
}
