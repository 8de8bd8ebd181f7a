//! Audio decoding via symphonia.
//!
//! Decodes compressed bytes fetched by an `AudioSource` to interleaved
//! float32 PCM at the source's native rate/channel count, probing and
//! decoding straight from an in-memory byte buffer since the download
//! backend hands back bytes rather than a file path. Opus is decoded
//! via `symphonia-adapter-libopus`.

use crate::audio::types::DecodedAudio;
use crate::error::{DecodeError, Result};
use std::io::Cursor;
use std::sync::OnceLock;
use symphonia::core::audio::{AudioBufferRef, Signal};
use symphonia::core::codecs::{CodecRegistry, DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::{MediaSourceStream, MediaSourceStreamOptions};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia_adapter_libopus::OpusDecoder;
use tracing::{debug, warn};

fn codec_registry() -> &'static CodecRegistry {
    static REGISTRY: OnceLock<CodecRegistry> = OnceLock::new();
    REGISTRY.get_or_init(|| {
        let mut registry = CodecRegistry::new();
        registry.register_all::<OpusDecoder>();
        registry.register_all::<symphonia::default::codecs::MpaDecoder>();
        registry.register_all::<symphonia::default::codecs::PcmDecoder>();
        registry.register_all::<symphonia::default::codecs::VorbisDecoder>();
        registry.register_all::<symphonia::default::codecs::FlacDecoder>();
        registry.register_all::<symphonia::default::codecs::AdpcmDecoder>();
        registry.register_all::<symphonia::default::codecs::AacDecoder>();
        registry
    })
}

/// Decode an entire in-memory audio file to interleaved f32 PCM at its
/// native sample rate and channel count. `extension_hint` (e.g. `"mp3"`)
/// helps the format probe when the bytes carry no reliable magic.
pub fn decode_bytes(bytes: Vec<u8>, extension_hint: Option<&str>) -> Result<DecodedAudio> {
    let cursor = Cursor::new(bytes);
    let mss = MediaSourceStream::new(Box::new(cursor), MediaSourceStreamOptions::default());

    let mut hint = Hint::new();
    if let Some(ext) = extension_hint {
        hint.with_extension(ext);
    }

    let format_opts = FormatOptions::default();
    let metadata_opts = MetadataOptions::default();
    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &format_opts, &metadata_opts)
        .map_err(|e| DecodeError::ProbeFailed(e.to_string()))?;
    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or(DecodeError::NoAudioTrack)?;
    let track_id = track.id;
    let codec_params = track.codec_params.clone();

    let sample_rate = codec_params
        .sample_rate
        .ok_or_else(|| DecodeError::UnsupportedFormat("missing sample rate".into()))?;
    let channels = codec_params
        .channels
        .map(|c| c.count() as u16)
        .ok_or_else(|| DecodeError::UnsupportedFormat("missing channel layout".into()))?;

    debug!(sample_rate, channels, "decoding audio");

    let decoder_opts = DecoderOptions::default();
    let mut decoder = codec_registry()
        .make(&codec_params, &decoder_opts)
        .map_err(|e| DecodeError::DecoderInit(e.to_string()))?;

    let mut samples = Vec::new();
    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(symphonia::core::errors::Error::IoError(e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(e) => {
                warn!(error = %e, "error reading packet, stopping decode");
                break;
            }
        };
        if packet.track_id() != track_id {
            continue;
        }
        match decoder.decode(&packet) {
            Ok(decoded) => interleave_to_f32(&decoded, &mut samples),
            Err(e) => {
                warn!(error = %e, "decode error on packet, skipping");
                continue;
            }
        }
    }

    Ok(DecodedAudio {
        samples,
        sample_rate,
        channels,
    })
}

fn interleave_to_f32(decoded: &AudioBufferRef, output: &mut Vec<f32>) {
    macro_rules! push_converted {
        ($buf:expr, |$s:ident| $convert:expr) => {{
            let channels = $buf.spec().channels.count();
            let frames = $buf.frames();
            for frame in 0..frames {
                for ch in 0..channels {
                    let $s = $buf.chan(ch)[frame];
                    output.push($convert);
                }
            }
        }};
    }
    match decoded {
        AudioBufferRef::F32(buf) => push_converted!(buf, |s| s),
        AudioBufferRef::F64(buf) => push_converted!(buf, |s| s as f32),
        AudioBufferRef::S32(buf) => push_converted!(buf, |s| s as f32 / i32::MAX as f32),
        AudioBufferRef::S24(buf) => {
            push_converted!(buf, |s| s.inner() as f32 / (1 << 23) as f32)
        }
        AudioBufferRef::S16(buf) => push_converted!(buf, |s| s as f32 / i16::MAX as f32),
        AudioBufferRef::S8(buf) => push_converted!(buf, |s| s as f32 / i8::MAX as f32),
        AudioBufferRef::U32(buf) => push_converted!(buf, |s| (s as i64 - i32::MAX as i64) as f32 / i32::MAX as f32),
        AudioBufferRef::U24(buf) => {
            push_converted!(buf, |s| (s.inner() as i32 - (1 << 23)) as f32 / (1 << 23) as f32)
        }
        AudioBufferRef::U16(buf) => push_converted!(buf, |s| (s as i32 - 32768) as f32 / 32768.0),
        AudioBufferRef::U8(buf) => push_converted!(buf, |s| (s as i32 - 128) as f32 / 128.0),
    }
}

/// Remix interleaved samples from `from_channels` to `to_channels`.
/// Mono-to-multi duplicates the single channel across every output
/// channel; multi-to-mono averages the source channels; any other
/// mismatch cycles through the source channels to fill the target
/// width. A no-op copy when the counts already match.
pub fn remix_channels(samples: &[f32], from_channels: u16, to_channels: u16) -> Vec<f32> {
    if from_channels == to_channels || samples.is_empty() {
        return samples.to_vec();
    }
    let from = from_channels as usize;
    let to = to_channels as usize;
    let mut out = Vec::with_capacity((samples.len() / from.max(1)) * to);
    for frame in samples.chunks(from) {
        if from == 1 {
            out.extend(std::iter::repeat(frame[0]).take(to));
        } else if to == 1 {
            out.push(frame.iter().sum::<f32>() / from as f32);
        } else {
            for ch in 0..to {
                out.push(frame[ch % from]);
            }
        }
    }
    out
}

/// Trim decoded samples to `[start, start+len)` seconds, clamping to
/// the actual decoded length. Used by the ClipProcessor when a whole
/// song was fetched but only a window is wanted.
pub fn trim_seconds(audio: &DecodedAudio, start_seconds: f64, len_seconds: f64) -> Vec<f32> {
    let channels = audio.channels as usize;
    let start_frame = (start_seconds * audio.sample_rate as f64).round() as usize;
    let frame_count = audio.frame_count();
    let start_frame = start_frame.min(frame_count);
    let end_frame = if len_seconds <= 0.0 {
        frame_count
    } else {
        (start_frame + (len_seconds * audio.sample_rate as f64).round() as usize).min(frame_count)
    };
    audio.samples[start_frame * channels..end_frame * channels].to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remix_mono_to_stereo_duplicates_channel() {
        let mono = vec![0.1, 0.2, 0.3];
        let stereo = remix_channels(&mono, 1, 2);
        assert_eq!(stereo, vec![0.1, 0.1, 0.2, 0.2, 0.3, 0.3]);
    }

    #[test]
    fn remix_stereo_to_mono_averages_channels() {
        let stereo = vec![0.0, 1.0, 0.5, 0.5];
        let mono = remix_channels(&stereo, 2, 1);
        assert_eq!(mono, vec![0.5, 0.5]);
    }

    #[test]
    fn remix_same_channel_count_is_a_no_op_copy() {
        let stereo = vec![0.1, 0.2, 0.3, 0.4];
        assert_eq!(remix_channels(&stereo, 2, 2), stereo);
    }

    #[test]
    fn trim_seconds_clamps_to_decoded_length() {
        let audio = DecodedAudio {
            samples: vec![1.0; 20], // 10 stereo frames
            sample_rate: 10,
            channels: 2,
        };
        // Asking for 2s starting at 0 should yield all 10 frames (20 samples).
        let trimmed = trim_seconds(&audio, 0.0, 5.0);
        assert_eq!(trimmed.len(), 20);
    }
}
