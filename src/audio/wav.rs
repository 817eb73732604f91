//! PCM clips for the command-line producer: decoded WAV files and generated
//! test tones, as interleaved bytes ready to copy into a ring buffer.

use crate::audio::format::SampleFormat;
use crate::error::{Result, VsndError};
use crate::stream::geometry::StreamParams;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use std::time::Duration;

/// Interleaved PCM bytes plus the format needed to play them.
#[derive(Debug, Clone, PartialEq)]
pub struct PcmClip {
    format: SampleFormat,
    rate: u32,
    channels: u32,
    data: Vec<u8>,
}

impl PcmClip {
    /// Decode a WAV stream without converting rate or channel count.
    ///
    /// 8-bit files become `U8`, 16-bit `S16_LE`, 24-bit packed `S24_3LE`,
    /// 32-bit integer `S32_LE` and 32-bit float `FLOAT_LE`.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let wav_reader = hound::WavReader::new(reader).map_err(|e| VsndError::AudioFile {
            message: format!("Failed to parse WAV file: {}", e),
        })?;

        let spec = wav_reader.spec();
        if spec.channels == 0 || spec.sample_rate == 0 {
            return Err(VsndError::AudioFile {
                message: "WAV header has no channels or a zero sample rate".to_string(),
            });
        }

        let (format, data) = match (spec.sample_format, spec.bits_per_sample) {
            (hound::SampleFormat::Int, 8) => (
                SampleFormat::U8,
                collect_bytes(wav_reader.into_samples::<i8>(), |s, out| {
                    out.push((s as i16 + 128) as u8)
                })?,
            ),
            (hound::SampleFormat::Int, 16) => (
                SampleFormat::S16Le,
                collect_bytes(wav_reader.into_samples::<i16>(), |s, out| {
                    out.extend_from_slice(&s.to_le_bytes())
                })?,
            ),
            (hound::SampleFormat::Int, 24) => (
                SampleFormat::S24Packed,
                collect_bytes(wav_reader.into_samples::<i32>(), |s, out| {
                    out.extend_from_slice(&s.to_le_bytes()[..3])
                })?,
            ),
            (hound::SampleFormat::Int, 32) => (
                SampleFormat::S32Le,
                collect_bytes(wav_reader.into_samples::<i32>(), |s, out| {
                    out.extend_from_slice(&s.to_le_bytes())
                })?,
            ),
            (hound::SampleFormat::Float, 32) => (
                SampleFormat::F32Le,
                collect_bytes(wav_reader.into_samples::<f32>(), |s, out| {
                    out.extend_from_slice(&s.to_le_bytes())
                })?,
            ),
            (sample_format, bits) => {
                return Err(VsndError::AudioFile {
                    message: format!("unsupported WAV encoding: {bits}-bit {sample_format:?}"),
                });
            }
        };

        Ok(Self {
            format,
            rate: spec.sample_rate,
            channels: spec.channels as u32,
            data,
        })
    }

    /// Decode the WAV file at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        Self::from_reader(BufReader::new(file))
    }

    /// A mono `S16_LE` sine tone at half amplitude.
    pub fn sine(frequency_hz: f32, duration: Duration, rate: u32) -> Self {
        let frames = (duration.as_secs_f64() * rate as f64).round() as usize;
        let step = std::f64::consts::TAU * frequency_hz as f64 / rate.max(1) as f64;
        let amplitude = i16::MAX as f64 * 0.5;

        let mut data = Vec::with_capacity(frames * 2);
        for n in 0..frames {
            let sample = ((n as f64 * step).sin() * amplitude).round() as i16;
            data.extend_from_slice(&sample.to_le_bytes());
        }

        Self {
            format: SampleFormat::S16Le,
            rate,
            channels: 1,
            data,
        }
    }

    pub fn format(&self) -> SampleFormat {
        self.format
    }

    pub fn rate(&self) -> u32 {
        self.rate
    }

    pub fn channels(&self) -> u32 {
        self.channels
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Play time at the clip's own rate.
    pub fn duration(&self) -> Duration {
        let frame_bytes = self.format.frame_bytes(self.channels) as u64;
        let bytes_per_second = frame_bytes * self.rate as u64;
        if bytes_per_second == 0 {
            return Duration::ZERO;
        }
        let nanos = self.data.len() as u128 * 1_000_000_000 / bytes_per_second as u128;
        Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
    }

    /// Stream parameters for playing this clip with the given buffering.
    pub fn params(&self, buffer_frames: u32, period_frames: u32) -> StreamParams {
        StreamParams {
            format: self.format,
            rate: self.rate,
            channels: self.channels,
            buffer_frames,
            period_frames,
        }
    }
}

fn collect_bytes<S, I>(samples: I, mut push: impl FnMut(S, &mut Vec<u8>)) -> Result<Vec<u8>>
where
    I: Iterator<Item = hound::Result<S>>,
{
    let mut out = Vec::with_capacity(samples.size_hint().0 * 4);
    for sample in samples {
        let sample = sample.map_err(|e| VsndError::AudioFile {
            message: format!("Failed to read WAV samples: {}", e),
        })?;
        push(sample, &mut out);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn make_wav_data(sample_rate: u32, channels: u16, samples: &[i16]) -> Vec<u8> {
        let mut cursor = Cursor::new(Vec::new());
        let spec = hound::WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
        for &sample in samples {
            writer.write_sample(sample).unwrap();
        }
        writer.finalize().unwrap();
        cursor.into_inner()
    }

    #[test]
    fn from_reader_16bit_mono_keeps_little_endian_bytes() {
        let wav_data = make_wav_data(22050, 1, &[1, -1, 256]);
        let clip = PcmClip::from_reader(Cursor::new(wav_data)).unwrap();

        assert_eq!(clip.format(), SampleFormat::S16Le);
        assert_eq!(clip.rate(), 22050);
        assert_eq!(clip.channels(), 1);
        assert_eq!(clip.data(), &[1, 0, 0xff, 0xff, 0, 1]);
    }

    #[test]
    fn from_reader_stereo_stays_interleaved() {
        let wav_data = make_wav_data(48000, 2, &[10, -10, 20, -20]);
        let clip = PcmClip::from_reader(Cursor::new(wav_data)).unwrap();

        assert_eq!(clip.channels(), 2);
        assert_eq!(clip.len(), 8);
        assert_eq!(&clip.data()[..4], &[10, 0, 0xf6, 0xff]);
    }

    #[test]
    fn from_reader_24bit_is_packed() {
        let mut cursor = Cursor::new(Vec::new());
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 8000,
            bits_per_sample: 24,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
        writer.write_sample(0x01_0203i32).unwrap();
        writer.write_sample(-1i32).unwrap();
        writer.finalize().unwrap();

        let clip = PcmClip::from_reader(Cursor::new(cursor.into_inner())).unwrap();
        assert_eq!(clip.format(), SampleFormat::S24Packed);
        assert_eq!(clip.data(), &[3, 2, 1, 0xff, 0xff, 0xff]);
    }

    #[test]
    fn from_reader_float() {
        let mut cursor = Cursor::new(Vec::new());
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 44100,
            bits_per_sample: 32,
            sample_format: hound::SampleFormat::Float,
        };
        let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
        writer.write_sample(0.5f32).unwrap();
        writer.finalize().unwrap();

        let clip = PcmClip::from_reader(Cursor::new(cursor.into_inner())).unwrap();
        assert_eq!(clip.format(), SampleFormat::F32Le);
        assert_eq!(clip.data(), &0.5f32.to_le_bytes());
    }

    #[test]
    fn invalid_wav_data_returns_error() {
        let result = PcmClip::from_reader(Cursor::new(b"not a wav file".to_vec()));
        assert!(matches!(result, Err(VsndError::AudioFile { .. })));
    }

    #[test]
    fn empty_wav_data_returns_error() {
        assert!(PcmClip::from_reader(Cursor::new(Vec::new())).is_err());
    }

    #[test]
    fn open_missing_file_is_io_error() {
        let result = PcmClip::open(Path::new("/nonexistent/vsnd/clip.wav"));
        assert!(matches!(result, Err(VsndError::Io(_))));
    }

    #[test]
    fn sine_has_expected_length_and_starts_at_zero() {
        let clip = PcmClip::sine(440.0, Duration::from_millis(100), 22050);
        assert_eq!(clip.format(), SampleFormat::S16Le);
        assert_eq!(clip.len(), 2205 * 2);
        assert_eq!(&clip.data()[..2], &[0, 0]);
        assert_eq!(clip.duration(), Duration::from_millis(100));
    }

    #[test]
    fn sine_stays_within_half_scale() {
        let clip = PcmClip::sine(1000.0, Duration::from_millis(10), 8000);
        let peak = clip
            .data()
            .chunks_exact(2)
            .map(|b| i16::from_le_bytes([b[0], b[1]]).unsigned_abs())
            .max()
            .unwrap();
        assert!(peak <= (i16::MAX / 2) as u16 + 1);
        assert!(peak > 0);
    }

    #[test]
    fn params_carry_clip_format() {
        let clip = PcmClip::sine(440.0, Duration::from_millis(1), 16000);
        let params = clip.params(4096, 1024);
        assert_eq!(params.rate, 16000);
        assert_eq!(params.channels, 1);
        assert_eq!(params.buffer_frames, 4096);
        assert_eq!(params.period_frames, 1024);
    }
}
