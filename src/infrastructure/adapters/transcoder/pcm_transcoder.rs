//! PCM Transcoder - 原始 PCM → 容器格式
//!
//! 支持：
//! - PCM → Opus (OGG 容器, RFC 7845)
//! - PCM → MP3 (LAME)
//! - PCM → WAV
//! - WAV → PCM 解码（基于 symphonia，用于上游返回 audio/wav 的情况）

use ogg::writing::PacketWriter;
use opus::{Application, Channels, Encoder};
use std::io::Cursor;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::application::ports::{
    AudioFormat, AudioTranscoderPort, TranscodeConfig, TranscodeError, TranscodeResult,
};
use crate::domain::PcmSpec;

/// OGG 逻辑流序列号
const OGG_STREAM_SERIAL: u32 = 0x5245_4c59;

/// Opus 帧长（毫秒）
const OPUS_FRAME_MS: usize = 20;

/// Opus 单包最大字节数
const OPUS_MAX_PACKET: usize = 4000;

/// PCM 转码器
#[derive(Debug, Default, Clone, Copy)]
pub struct PcmTranscoder;

/// 解码后的浮点样本（交错排列）
#[derive(Debug)]
struct DecodedAudio {
    samples: Vec<f32>,
    sample_rate: u32,
    channels: u8,
}

impl DecodedAudio {
    fn frames(&self) -> usize {
        if self.channels == 0 {
            0
        } else {
            self.samples.len() / self.channels as usize
        }
    }

    fn duration_ms(&self) -> u64 {
        if self.sample_rate == 0 {
            return 0;
        }
        self.frames() as u64 * 1000 / self.sample_rate as u64
    }

    fn to_i16(&self) -> Vec<i16> {
        self.samples
            .iter()
            .map(|&s| {
                let clamped = s.clamp(-1.0, 1.0);
                (clamped * 32767.0) as i16
            })
            .collect()
    }
}

impl PcmTranscoder {
    pub fn new() -> Self {
        Self
    }

    /// 将小端 PCM 字节解析为浮点样本
    fn decode_pcm(&self, pcm: &[u8], spec: PcmSpec) -> Result<DecodedAudio, TranscodeError> {
        spec.validate()
            .map_err(|e| TranscodeError::InvalidInput(e.to_string()))?;

        if spec.channels > u8::MAX as u16 {
            return Err(TranscodeError::InvalidInput(format!(
                "Too many channels: {}",
                spec.channels
            )));
        }

        let frame_bytes = spec.frame_bytes();
        if pcm.len() % frame_bytes != 0 {
            return Err(TranscodeError::InvalidInput(format!(
                "PCM length {} is not a multiple of frame size {} (width {} x {} channels)",
                pcm.len(),
                frame_bytes,
                spec.sample_width,
                spec.channels
            )));
        }

        let width = spec.sample_width as usize;
        let samples = pcm
            .chunks_exact(width)
            .map(|b| match width {
                1 => (b[0] as f32 - 128.0) / 128.0,
                2 => i16::from_le_bytes([b[0], b[1]]) as f32 / 32768.0,
                3 => {
                    // 24 位符号扩展
                    let v = i32::from_le_bytes([0, b[0], b[1], b[2]]) >> 8;
                    v as f32 / 8_388_608.0
                }
                _ => i32::from_le_bytes([b[0], b[1], b[2], b[3]]) as f32 / 2_147_483_648.0,
            })
            .collect();

        Ok(DecodedAudio {
            samples,
            sample_rate: spec.sample_rate,
            channels: spec.channels as u8,
        })
    }

    /// 按配置调整声道数
    ///
    /// Opus / MP3 最多支持两个声道，超过时混为单声道
    fn remix(&self, audio: DecodedAudio, config: &TranscodeConfig) -> DecodedAudio {
        let wants_mono = config.channels == Some(1) && audio.channels > 1;
        let codec_limited = config.format != AudioFormat::Wav && audio.channels > 2;
        if !(wants_mono || codec_limited) {
            return audio;
        }

        let channel_count = audio.channels as usize;
        let samples = audio
            .samples
            .chunks_exact(channel_count)
            .map(|frame| frame.iter().sum::<f32>() / channel_count as f32)
            .collect();

        DecodedAudio {
            samples,
            sample_rate: audio.sample_rate,
            channels: 1,
        }
    }

    /// 将浮点样本编码为 WAV
    fn encode_wav(&self, pcm: &DecodedAudio) -> Result<Vec<u8>, TranscodeError> {
        let bits_per_sample: u16 = 16;
        let num_channels = pcm.channels as u16;
        let sample_rate = pcm.sample_rate;
        let byte_rate = sample_rate * num_channels as u32 * (bits_per_sample / 8) as u32;
        let block_align = num_channels * (bits_per_sample / 8);

        let pcm_data = pcm.to_i16();
        let data_size = pcm_data.len() * 2;
        let file_size = 36 + data_size;

        let mut wav = Vec::with_capacity(44 + data_size);

        // RIFF header
        wav.extend_from_slice(b"RIFF");
        wav.extend_from_slice(&(file_size as u32).to_le_bytes());
        wav.extend_from_slice(b"WAVE");

        // fmt chunk
        wav.extend_from_slice(b"fmt ");
        wav.extend_from_slice(&16u32.to_le_bytes()); // chunk size
        wav.extend_from_slice(&1u16.to_le_bytes()); // PCM format
        wav.extend_from_slice(&num_channels.to_le_bytes());
        wav.extend_from_slice(&sample_rate.to_le_bytes());
        wav.extend_from_slice(&byte_rate.to_le_bytes());
        wav.extend_from_slice(&block_align.to_le_bytes());
        wav.extend_from_slice(&bits_per_sample.to_le_bytes());

        // data chunk
        wav.extend_from_slice(b"data");
        wav.extend_from_slice(&(data_size as u32).to_le_bytes());
        for sample in pcm_data {
            wav.extend_from_slice(&sample.to_le_bytes());
        }

        Ok(wav)
    }

    /// 将浮点样本编码为 Opus (OGG 容器)
    ///
    /// 最后一页的 granule position 精确到输入长度，解码端据此裁掉补零的尾帧
    fn encode_opus(&self, pcm: &DecodedAudio, bitrate: u32) -> Result<Vec<u8>, TranscodeError> {
        // Opus 支持的采样率: 8000, 12000, 16000, 24000, 48000
        let target_sample_rate = self.get_opus_compatible_sample_rate(pcm.sample_rate);

        let (samples, sample_rate) = if target_sample_rate != pcm.sample_rate {
            let resampled =
                self.resample(&pcm.samples, pcm.sample_rate, target_sample_rate, pcm.channels);
            (resampled, target_sample_rate)
        } else {
            (pcm.samples.clone(), pcm.sample_rate)
        };

        let (channels, channel_count) = if pcm.channels == 1 {
            (Channels::Mono, 1usize)
        } else {
            (Channels::Stereo, 2usize)
        };

        // Application::Voip 针对语音优化
        let mut encoder = Encoder::new(sample_rate, channels, Application::Voip).map_err(|e| {
            TranscodeError::EncodingError(format!("Failed to create Opus encoder: {}", e))
        })?;

        encoder
            .set_bitrate(opus::Bitrate::Bits(bitrate as i32))
            .map_err(|e| TranscodeError::EncodingError(format!("Failed to set bitrate: {}", e)))?;

        // RFC 7845: granule position 与 pre-skip 都以 48kHz 计
        let granule_scale = 48000 / sample_rate as u64;
        let lookahead = encoder.get_lookahead().map(|l| l as u64).unwrap_or(0);
        let pre_skip_48k = lookahead * granule_scale;

        let pcm_i16: Vec<i16> = samples
            .iter()
            .map(|&s| (s.clamp(-1.0, 1.0) * 32767.0) as i16)
            .collect();

        let frame_size = sample_rate as usize * OPUS_FRAME_MS / 1000;
        let samples_per_frame = frame_size * channel_count;
        let frame_granule = frame_size as u64 * granule_scale;
        let total_frames = (pcm_i16.len() / channel_count) as u64;
        let final_granule = pre_skip_48k + total_frames * granule_scale;

        // 编码器延迟内的样本需要额外的静音帧才能冲出
        let flush_frames = (lookahead as usize).div_ceil(frame_size).max(1);

        let mut frames: Vec<Vec<i16>> = pcm_i16
            .chunks(samples_per_frame)
            .map(|chunk| {
                let mut frame = chunk.to_vec();
                frame.resize(samples_per_frame, 0);
                frame
            })
            .collect();
        frames.extend(std::iter::repeat(vec![0i16; samples_per_frame]).take(flush_frames));

        let mut ogg_data = Vec::new();
        {
            let mut packet_writer = PacketWriter::new(&mut ogg_data);

            let opus_head =
                self.create_opus_head(channel_count as u8, pcm.sample_rate, pre_skip_48k as u16);
            packet_writer
                .write_packet(opus_head, OGG_STREAM_SERIAL, ogg::PacketWriteEndInfo::EndPage, 0)
                .map_err(|e| {
                    TranscodeError::EncodingError(format!("Failed to write Opus head: {}", e))
                })?;

            let opus_tags = self.create_opus_tags();
            packet_writer
                .write_packet(opus_tags, OGG_STREAM_SERIAL, ogg::PacketWriteEndInfo::EndPage, 0)
                .map_err(|e| {
                    TranscodeError::EncodingError(format!("Failed to write Opus tags: {}", e))
                })?;

            let mut output_buf = vec![0u8; OPUS_MAX_PACKET];
            let mut granule_pos = pre_skip_48k;
            let last_idx = frames.len() - 1;

            for (idx, frame) in frames.iter().enumerate() {
                let encoded_len = encoder.encode(frame, &mut output_buf).map_err(|e| {
                    TranscodeError::EncodingError(format!("Opus encode failed: {}", e))
                })?;

                granule_pos = (granule_pos + frame_granule).min(final_granule);
                let end_info = if idx == last_idx {
                    ogg::PacketWriteEndInfo::EndStream
                } else {
                    ogg::PacketWriteEndInfo::NormalPacket
                };

                packet_writer
                    .write_packet(
                        output_buf[..encoded_len].to_vec(),
                        OGG_STREAM_SERIAL,
                        end_info,
                        granule_pos,
                    )
                    .map_err(|e| {
                        TranscodeError::EncodingError(format!("Failed to write Opus packet: {}", e))
                    })?;
            }
        }

        Ok(ogg_data)
    }

    /// 将浮点样本编码为 MP3
    fn encode_mp3(&self, pcm: &DecodedAudio, bitrate: u32) -> Result<Vec<u8>, TranscodeError> {
        use mp3lame_encoder::{Builder, FlushNoGap, InterleavedPcm, MonoPcm};

        let mut builder = Builder::new().ok_or_else(|| {
            TranscodeError::EncodingError("Failed to create LAME encoder".to_string())
        })?;
        builder
            .set_num_channels(pcm.channels)
            .map_err(|e| TranscodeError::EncodingError(format!("LAME channels: {:?}", e)))?;
        builder
            .set_sample_rate(pcm.sample_rate)
            .map_err(|e| TranscodeError::EncodingError(format!("LAME sample rate: {:?}", e)))?;
        builder
            .set_brate(self.lame_bitrate(bitrate))
            .map_err(|e| TranscodeError::EncodingError(format!("LAME bitrate: {:?}", e)))?;
        builder
            .set_quality(mp3lame_encoder::Quality::Good)
            .map_err(|e| TranscodeError::EncodingError(format!("LAME quality: {:?}", e)))?;
        let mut encoder = builder
            .build()
            .map_err(|e| TranscodeError::EncodingError(format!("LAME init: {:?}", e)))?;

        let pcm_i16 = pcm.to_i16();
        let mut mp3_data = Vec::with_capacity(mp3lame_encoder::max_required_buffer_size(
            pcm.frames(),
        ));

        let encoded = if pcm.channels == 1 {
            encoder.encode_to_vec(MonoPcm(&pcm_i16), &mut mp3_data)
        } else {
            encoder.encode_to_vec(InterleavedPcm(&pcm_i16), &mut mp3_data)
        };
        encoded.map_err(|e| TranscodeError::EncodingError(format!("MP3 encode failed: {:?}", e)))?;

        // flush 最多输出 7200 字节
        mp3_data.reserve(7200);
        encoder
            .flush_to_vec::<FlushNoGap>(&mut mp3_data)
            .map_err(|e| TranscodeError::EncodingError(format!("MP3 flush failed: {:?}", e)))?;

        Ok(mp3_data)
    }

    /// 取不超过目标的最近 LAME 比特率
    fn lame_bitrate(&self, bitrate: u32) -> mp3lame_encoder::Bitrate {
        use mp3lame_encoder::Bitrate;
        match bitrate / 1000 {
            0..=15 => Bitrate::Kbps8,
            16..=23 => Bitrate::Kbps16,
            24..=31 => Bitrate::Kbps24,
            32..=39 => Bitrate::Kbps32,
            40..=47 => Bitrate::Kbps40,
            48..=63 => Bitrate::Kbps48,
            64..=79 => Bitrate::Kbps64,
            80..=95 => Bitrate::Kbps80,
            96..=111 => Bitrate::Kbps96,
            112..=127 => Bitrate::Kbps112,
            128..=159 => Bitrate::Kbps128,
            _ => Bitrate::Kbps160,
        }
    }

    /// 获取 Opus 兼容的采样率
    fn get_opus_compatible_sample_rate(&self, sample_rate: u32) -> u32 {
        match sample_rate {
            8000 | 12000 | 16000 | 24000 | 48000 => sample_rate,
            r if r <= 8000 => 8000,
            r if r <= 12000 => 12000,
            r if r <= 16000 => 16000,
            r if r <= 24000 => 24000,
            _ => 48000,
        }
    }

    /// 简单线性重采样
    fn resample(&self, samples: &[f32], from_rate: u32, to_rate: u32, channels: u8) -> Vec<f32> {
        if from_rate == to_rate || samples.is_empty() {
            return samples.to_vec();
        }

        let ratio = to_rate as f64 / from_rate as f64;
        let channel_count = channels as usize;
        let frame_count = samples.len() / channel_count;
        let new_frame_count = (frame_count as f64 * ratio) as usize;
        let mut resampled = Vec::with_capacity(new_frame_count * channel_count);

        for i in 0..new_frame_count {
            let src_pos = i as f64 / ratio;
            let src_idx = src_pos as usize;
            let frac = src_pos - src_idx as f64;

            for ch in 0..channel_count {
                let idx0 = src_idx * channel_count + ch;
                let idx1 = ((src_idx + 1).min(frame_count - 1)) * channel_count + ch;

                let s0 = samples.get(idx0).copied().unwrap_or(0.0);
                let s1 = samples.get(idx1).copied().unwrap_or(s0);

                resampled.push(s0 + (s1 - s0) * frac as f32);
            }
        }

        resampled
    }

    /// 创建 Opus Head 包 (RFC 7845)
    fn create_opus_head(&self, channels: u8, input_sample_rate: u32, pre_skip: u16) -> Vec<u8> {
        let mut head = Vec::with_capacity(19);
        head.extend_from_slice(b"OpusHead");
        head.push(1); // Version
        head.push(channels);
        head.extend_from_slice(&pre_skip.to_le_bytes());
        head.extend_from_slice(&input_sample_rate.to_le_bytes());
        head.extend_from_slice(&0i16.to_le_bytes()); // Output gain
        head.push(0); // Channel mapping family
        head
    }

    /// 创建 Opus Tags 包
    fn create_opus_tags(&self) -> Vec<u8> {
        let vendor = concat!("voice-relay ", env!("CARGO_PKG_VERSION"));
        let mut tags = Vec::new();
        tags.extend_from_slice(b"OpusTags");
        tags.extend_from_slice(&(vendor.len() as u32).to_le_bytes());
        tags.extend_from_slice(vendor.as_bytes());
        tags.extend_from_slice(&0u32.to_le_bytes()); // No user comments
        tags
    }
}

impl AudioTranscoderPort for PcmTranscoder {
    fn pcm_to_container(
        &self,
        pcm: &[u8],
        spec: PcmSpec,
        config: &TranscodeConfig,
    ) -> Result<TranscodeResult, TranscodeError> {
        let original_size = pcm.len();
        let decoded = self.remix(self.decode_pcm(pcm, spec)?, config);

        let audio_data = match config.format {
            AudioFormat::Wav => self.encode_wav(&decoded)?,
            AudioFormat::Opus => self.encode_opus(&decoded, config.bitrate)?,
            AudioFormat::Mp3 => self.encode_mp3(&decoded, config.bitrate)?,
        };

        tracing::debug!(
            format = %config.format,
            original_size = original_size,
            encoded_size = audio_data.len(),
            bitrate = config.bitrate,
            "PCM encoded"
        );

        Ok(TranscodeResult {
            transcoded_size: audio_data.len(),
            audio_data,
            format: config.format,
            duration_ms: decoded.duration_ms(),
            sample_rate: decoded.sample_rate,
            channels: decoded.channels,
            original_size,
        })
    }

    fn supports_format(&self, format: AudioFormat) -> bool {
        matches!(format, AudioFormat::Wav | AudioFormat::Opus | AudioFormat::Mp3)
    }
}

/// 使用 symphonia 解码 WAV，输出 16 位小端 PCM
pub fn decode_wav(data: &[u8]) -> Result<(Vec<u8>, PcmSpec), TranscodeError> {
    let cursor = Cursor::new(data.to_vec());
    let mss = MediaSourceStream::new(Box::new(cursor), Default::default());

    let mut hint = Hint::new();
    hint.with_extension("wav");

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| TranscodeError::DecodingError(format!("Probe failed: {}", e)))?;

    let mut format = probed.format;

    let track = format
        .default_track()
        .ok_or_else(|| TranscodeError::DecodingError("No audio track found".to_string()))?;

    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or_else(|| TranscodeError::DecodingError("Unknown sample rate".to_string()))?;

    let channels = track
        .codec_params
        .channels
        .map(|c| c.count() as u16)
        .ok_or_else(|| TranscodeError::DecodingError("Unknown channel count".to_string()))?;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| TranscodeError::DecodingError(format!("Decoder creation failed: {}", e)))?;

    let track_id = track.id;
    let mut pcm: Vec<u8> = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(p) => p,
            Err(symphonia::core::errors::Error::IoError(e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(e) => {
                return Err(TranscodeError::DecodingError(format!(
                    "Packet read error: {}",
                    e
                )));
            }
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(d) => d,
            Err(e) => {
                tracing::warn!("Decode error (skipping packet): {}", e);
                continue;
            }
        };

        let spec = *decoded.spec();
        let num_frames = decoded.frames();
        let mut sample_buf = SampleBuffer::<i16>::new(num_frames as u64, spec);
        sample_buf.copy_interleaved_ref(decoded);
        let actual_samples = num_frames * spec.channels.count();
        for sample in &sample_buf.samples()[..actual_samples] {
            pcm.extend_from_slice(&sample.to_le_bytes());
        }
    }

    Ok((
        pcm,
        PcmSpec {
            sample_width: 2,
            sample_rate,
            channels,
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn silence(seconds_ms: u64, spec: PcmSpec) -> Vec<u8> {
        let frames = spec.sample_rate as u64 * seconds_ms / 1000;
        vec![0u8; frames as usize * spec.frame_bytes()]
    }

    fn sine(freq: f32, frames: usize, sample_rate: u32) -> Vec<u8> {
        (0..frames)
            .flat_map(|i| {
                let t = i as f32 / sample_rate as f32;
                let v = (t * freq * 2.0 * std::f32::consts::PI).sin() * 0.5;
                ((v * 32767.0) as i16).to_le_bytes()
            })
            .collect()
    }

    fn config(format: AudioFormat) -> TranscodeConfig {
        TranscodeConfig {
            format,
            ..Default::default()
        }
    }

    /// 根据最后一页 granule position 与 pre-skip 计算 OGG/Opus 时长（毫秒）
    fn ogg_opus_duration_ms(data: &[u8]) -> u64 {
        let mut reader = ogg::reading::PacketReader::new(Cursor::new(data.to_vec()));
        let head = reader.read_packet().unwrap().unwrap();
        assert_eq!(&head.data[0..8], b"OpusHead");
        let pre_skip = u16::from_le_bytes([head.data[10], head.data[11]]) as u64;

        let mut last_granule = 0;
        while let Some(packet) = reader.read_packet().unwrap() {
            last_granule = packet.absgp_page();
        }
        (last_granule - pre_skip) * 1000 / 48000
    }

    #[test]
    fn test_ogg_duration_matches_input() {
        let transcoder = PcmTranscoder::new();
        for (duration_ms, rate) in [(1000u64, 16000u32), (250, 16000), (730, 24000), (500, 22050)] {
            let spec = PcmSpec::s16_mono(rate);
            let pcm = silence(duration_ms, spec);

            let result = transcoder
                .pcm_to_container(&pcm, spec, &config(AudioFormat::Opus))
                .unwrap();
            assert_eq!(&result.audio_data[0..4], b"OggS");
            assert_eq!(result.format, AudioFormat::Opus);

            let decoded = ogg_opus_duration_ms(&result.audio_data);
            assert!(
                decoded.abs_diff(duration_ms) <= OPUS_FRAME_MS as u64,
                "rate {}: expected ~{}ms, got {}ms",
                rate,
                duration_ms,
                decoded
            );
        }
    }

    #[test]
    fn test_opus_is_smaller_than_pcm() {
        let transcoder = PcmTranscoder::new();
        let spec = PcmSpec::s16_mono(24000);
        let pcm = sine(440.0, 24000, 24000);

        let result = transcoder
            .pcm_to_container(&pcm, spec, &config(AudioFormat::Opus))
            .unwrap();
        assert!(result.transcoded_size < result.original_size);
        assert_eq!(result.duration_ms, 1000);
        assert_eq!(result.channels, 1);
    }

    #[test]
    fn test_wav_duration_via_symphonia() {
        let transcoder = PcmTranscoder::new();
        let spec = PcmSpec::s16_mono(16000);
        let pcm = sine(220.0, 16000, 16000);

        let result = transcoder
            .pcm_to_container(&pcm, spec, &config(AudioFormat::Wav))
            .unwrap();
        assert_eq!(&result.audio_data[0..4], b"RIFF");
        assert_eq!(result.audio_data.len(), 44 + pcm.len());

        let (decoded, decoded_spec) = decode_wav(&result.audio_data).unwrap();
        assert_eq!(decoded_spec, spec);
        assert_eq!(decoded.len(), pcm.len());
    }

    #[test]
    fn test_mp3_output_has_frame_sync() {
        let transcoder = PcmTranscoder::new();
        let spec = PcmSpec::s16_mono(16000);
        let pcm = sine(440.0, 8000, 16000);

        let result = transcoder
            .pcm_to_container(&pcm, spec, &config(AudioFormat::Mp3))
            .unwrap();
        let data = &result.audio_data;
        assert!(data.len() > 4);
        assert!(data.starts_with(b"ID3") || (data[0] == 0xFF && data[1] & 0xE0 == 0xE0));
        assert_eq!(result.duration_ms, 500);
    }

    #[test]
    fn test_stereo_is_downmixed_when_mono_requested() {
        let transcoder = PcmTranscoder::new();
        let spec = PcmSpec {
            sample_width: 2,
            sample_rate: 16000,
            channels: 2,
        };
        let pcm = silence(100, spec);

        let result = transcoder
            .pcm_to_container(&pcm, spec, &config(AudioFormat::Wav))
            .unwrap();
        assert_eq!(result.channels, 1);
        assert_eq!(result.audio_data.len(), 44 + pcm.len() / 2);
    }

    #[test]
    fn test_misaligned_pcm_is_rejected() {
        let transcoder = PcmTranscoder::new();
        let spec = PcmSpec::s16_mono(16000);
        let err = transcoder
            .pcm_to_container(&[0u8; 7], spec, &config(AudioFormat::Opus))
            .unwrap_err();
        assert!(matches!(err, TranscodeError::InvalidInput(_)));

        let stereo = PcmSpec {
            channels: 2,
            ..spec
        };
        assert!(transcoder
            .pcm_to_container(&[0u8; 6], stereo, &config(AudioFormat::Wav))
            .is_err());
    }

    #[test]
    fn test_unsupported_width_is_rejected() {
        let transcoder = PcmTranscoder::new();
        let spec = PcmSpec {
            sample_width: 8,
            sample_rate: 16000,
            channels: 1,
        };
        assert!(matches!(
            transcoder.pcm_to_container(&[0u8; 16], spec, &config(AudioFormat::Wav)),
            Err(TranscodeError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_sample_widths_decode_to_same_level() {
        let transcoder = PcmTranscoder::new();
        // 半幅正值在各种位宽下
        let cases: Vec<(u16, Vec<u8>)> = vec![
            (1, vec![192]),
            (2, 16384i16.to_le_bytes().to_vec()),
            (3, vec![0x00, 0x00, 0x40]),
            (4, 0x4000_0000i32.to_le_bytes().to_vec()),
        ];
        for (width, bytes) in cases {
            let spec = PcmSpec {
                sample_width: width,
                sample_rate: 8000,
                channels: 1,
            };
            let decoded = transcoder.decode_pcm(&bytes, spec).unwrap();
            assert!((decoded.samples[0] - 0.5).abs() < 1e-3, "width {}", width);
        }
    }

    #[test]
    fn test_empty_pcm_produces_valid_ogg() {
        let transcoder = PcmTranscoder::new();
        let result = transcoder
            .pcm_to_container(&[], PcmSpec::s16_mono(16000), &config(AudioFormat::Opus))
            .unwrap();
        assert_eq!(&result.audio_data[0..4], b"OggS");
        assert_eq!(ogg_opus_duration_ms(&result.audio_data), 0);
    }

    #[test]
    fn test_supports_all_formats() {
        let transcoder = PcmTranscoder::new();
        assert!(transcoder.supports_format(AudioFormat::Wav));
        assert!(transcoder.supports_format(AudioFormat::Opus));
        assert!(transcoder.supports_format(AudioFormat::Mp3));
    }

    #[test]
    fn test_opus_compatible_sample_rate() {
        let transcoder = PcmTranscoder::new();
        assert_eq!(transcoder.get_opus_compatible_sample_rate(16000), 16000);
        assert_eq!(transcoder.get_opus_compatible_sample_rate(22050), 24000);
        assert_eq!(transcoder.get_opus_compatible_sample_rate(44100), 48000);
    }
}
