// FFmpeg 디코더 플러그인 (ffmpeg-next)
// 아키텍처: SourceInput(커스텀 AVIO) → 패킷 분배 → 비디오 RGBA 큐 / 오디오 f32 버퍼
// update()에서 선행 디코딩, get_video_frame()은 큐가 비면 동기 디코딩

use ffmpeg_next as ffmpeg;
use std::collections::VecDeque;

use super::custom_io::SourceInput;
use crate::decoder::{DecoderFactory, SessionId, TextureSize, VideoDecoder};
use crate::error::{Result, StreamError};
use crate::io::ByteSource;
use crate::rendering::{DecodedFrame, FrameQueue};

/// 오디오 버퍼 상한 (초). 초과분은 오래된 샘플부터 버림
const MAX_BUFFERED_AUDIO_SECS: usize = 2;
/// update()가 유지하려는 최소 오디오 선행량 (초)
const AUDIO_LOOKAHEAD_SECS: f64 = 0.1;

/// 비디오 스트림 디코딩 상태
struct VideoStream {
    index: usize,
    decoder: ffmpeg::codec::decoder::Video,
    scaler: ffmpeg::software::scaling::Context,
    time_base: f64,
    size: TextureSize,
}

/// 오디오 스트림 디코딩 상태 (packed f32, 원본 샘플레이트/채널 유지)
struct AudioStream {
    index: usize,
    decoder: ffmpeg::codec::decoder::Audio,
    resampler: ffmpeg::software::resampling::Context,
    time_base: f64,
    channels: usize,
    rate: u32,
}

/// open() 이후에만 존재하는 상태
struct OpenMedia {
    video: VideoStream,
    audio: Option<AudioStream>,
    frames: FrameQueue,
    samples: VecDeque<f32>,
    length: f64,
    /// 디코더들보다 나중에 해제
    input: SourceInput,
}

pub struct FfmpegDecoder {
    owner: SessionId,
    media: Option<OpenMedia>,
    audio_track: usize,
    position: f64,
    decode_time: f64,
    eof: bool,
    /// seek 직후 이 시각 이전 프레임은 버림 (첫 비디오 프레임이 나오면 해제)
    video_skip_before: Option<f64>,
    /// 오디오 쪽 seek 목표. 비디오와 별도로 첫 유효 샘플이 나올 때 해제
    audio_skip_before: Option<f64>,
    current: Vec<u8>,
}

impl FfmpegDecoder {
    pub fn new(owner: SessionId) -> Self {
        Self {
            owner,
            media: None,
            audio_track: 0,
            position: 0.0,
            decode_time: 0.0,
            eof: false,
            video_skip_before: None,
            audio_skip_before: None,
            current: Vec::new(),
        }
    }

    /// 비디오 디코더 생성 (Multi-threading, 디코더당 최대 4스레드)
    fn create_video_decoder(
        params: ffmpeg::codec::Parameters,
    ) -> std::result::Result<ffmpeg::codec::decoder::Video, String> {
        let mut context = ffmpeg::codec::context::Context::from_parameters(params)
            .map_err(|e| format!("Failed to create context: {}", e))?;

        if let Ok(parallelism) = std::thread::available_parallelism() {
            context.set_threading(ffmpeg::threading::Config {
                kind: ffmpeg::threading::Type::Frame,
                count: parallelism.get().min(4),
            });
        }

        context
            .decoder()
            .video()
            .map_err(|e| format!("Failed to get video decoder: {}", e))
    }

    fn open_video(input: &SourceInput) -> std::result::Result<VideoStream, String> {
        let stream = input
            .streams()
            .best(ffmpeg::media::Type::Video)
            .ok_or("No video stream found")?;

        let index = stream.index();
        let time_base = f64::from(stream.time_base());
        let decoder = Self::create_video_decoder(stream.parameters())?;

        let (width, height) = (decoder.width(), decoder.height());
        if width == 0 || height == 0 {
            return Err(format!("Invalid video size: {}x{}", width, height));
        }

        // 원본 해상도 그대로 RGBA 변환
        let scaler = ffmpeg::software::scaling::Context::get(
            decoder.format(),
            width,
            height,
            ffmpeg::format::Pixel::RGBA,
            width,
            height,
            ffmpeg::software::scaling::Flags::BILINEAR,
        )
        .map_err(|e| format!("Failed to create scaler: {}", e))?;

        Ok(VideoStream {
            index,
            decoder,
            scaler,
            time_base,
            size: TextureSize::new(width, height),
        })
    }

    /// track번째 오디오 스트림 (없으면 best 오디오 스트림)
    fn open_audio(input: &SourceInput, track: usize) -> std::result::Result<Option<AudioStream>, String> {
        let stream = match input
            .streams()
            .filter(|s| s.parameters().medium() == ffmpeg::media::Type::Audio)
            .nth(track)
        {
            Some(s) => s,
            None => match input.streams().best(ffmpeg::media::Type::Audio) {
                Some(s) => {
                    log::warn!("Audio track {} not found, using stream {}", track, s.index());
                    s
                }
                None => return Ok(None),
            },
        };

        let index = stream.index();
        let time_base = f64::from(stream.time_base());
        let context = ffmpeg::codec::context::Context::from_parameters(stream.parameters())
            .map_err(|e| format!("Failed to create audio context: {}", e))?;
        let decoder = context
            .decoder()
            .audio()
            .map_err(|e| format!("Failed to get audio decoder: {}", e))?;

        let channels = decoder.channel_layout().channels() as usize;
        let rate = decoder.rate();
        if channels == 0 || rate == 0 {
            return Err(format!("Invalid audio format: {}ch {}Hz", channels, rate));
        }

        // 샘플 포맷만 packed f32로 변환 (채널/샘플레이트 유지)
        let resampler = ffmpeg::software::resampling::Context::get(
            decoder.format(),
            decoder.channel_layout(),
            rate,
            ffmpeg::format::Sample::F32(ffmpeg::format::sample::Type::Packed),
            decoder.channel_layout(),
            rate,
        )
        .map_err(|e| format!("Failed to create resampler: {}", e))?;

        Ok(Some(AudioStream {
            index,
            decoder,
            resampler,
            time_base,
            channels,
            rate,
        }))
    }

    fn open_media(&self, source: Box<dyn ByteSource>) -> std::result::Result<OpenMedia, String> {
        ffmpeg::init().map_err(|e| format!("FFmpeg init failed: {}", e))?;

        let input = SourceInput::open(source)?;
        let video = Self::open_video(&input)?;
        let audio = Self::open_audio(&input, self.audio_track)?;

        let length = if input.duration() > 0 {
            input.duration() as f64 / f64::from(ffmpeg::ffi::AV_TIME_BASE)
        } else {
            0.0
        };

        let samples = match &audio {
            Some(a) => VecDeque::with_capacity(a.rate as usize * a.channels),
            None => VecDeque::new(),
        };

        Ok(OpenMedia {
            video,
            audio,
            frames: FrameQueue::new(),
            samples,
            length,
            input,
        })
    }

    /// 패킷 하나 읽어서 해당 디코더로 전달. EOF면 false
    fn pump(&mut self) -> bool {
        let Some(media) = self.media.as_mut() else {
            return false;
        };
        if self.eof {
            return false;
        }

        let next = media
            .input
            .packets()
            .next()
            .map(|(stream, packet)| (stream.index(), packet));

        match next {
            Some((index, packet)) => {
                if index == media.video.index {
                    if let Err(e) = media.video.decoder.send_packet(&packet) {
                        log::debug!("Video send_packet: {}", e);
                    }
                    Self::drain_video(media, &mut self.video_skip_before);
                } else if media.audio.as_ref().is_some_and(|a| a.index == index) {
                    if let Some(audio) = media.audio.as_mut() {
                        if let Err(e) = audio.decoder.send_packet(&packet) {
                            log::debug!("Audio send_packet: {}", e);
                        }
                    }
                    Self::drain_audio(media, &mut self.audio_skip_before);
                }
                true
            }
            None => {
                // 디코더 내부에 남은 프레임까지 꺼냄
                let _ = media.video.decoder.send_eof();
                Self::drain_video(media, &mut self.video_skip_before);
                if let Some(audio) = media.audio.as_mut() {
                    let _ = audio.decoder.send_eof();
                }
                Self::drain_audio(media, &mut self.audio_skip_before);
                self.eof = true;
                log::debug!("{}: end of stream", self.owner);
                false
            }
        }
    }

    fn drain_video(media: &mut OpenMedia, skip_before: &mut Option<f64>) {
        let video = &mut media.video;
        let mut decoded = ffmpeg::frame::Video::empty();
        while video.decoder.receive_frame(&mut decoded).is_ok() {
            let pts = decoded
                .timestamp()
                .or(decoded.pts())
                .map_or(0.0, |ts| ts as f64 * video.time_base);

            if let Some(target) = *skip_before {
                if pts < target {
                    continue;
                }
                *skip_before = None;
            }

            let mut scaled = ffmpeg::frame::Video::empty();
            if let Err(e) = video.scaler.run(&decoded, &mut scaled) {
                log::warn!("Failed to scale frame: {}", e);
                continue;
            }
            match extract_rgba(&scaled, video.size) {
                Ok(data) => {
                    let evicted = media.frames.push(DecodedFrame { pts, data });
                    if evicted > 0 {
                        log::warn!(
                            "Frame queue overflow ({} queued), dropped {} oldest frame(s)",
                            media.frames.len(),
                            evicted
                        );
                    }
                }
                Err(e) => log::warn!("{}", e),
            }
        }
    }

    fn drain_audio(media: &mut OpenMedia, skip_before: &mut Option<f64>) {
        let Some(audio) = media.audio.as_mut() else {
            return;
        };

        let mut decoded = ffmpeg::frame::Audio::empty();
        while audio.decoder.receive_frame(&mut decoded).is_ok() {
            // seek 직후: 목표 전에 끝나는 프레임은 통째로 건너뛰고
            // 목표에 걸친 첫 프레임은 앞부분만 잘라냄
            let mut lead_frames = 0;
            if let (Some(target), Some(pts)) = (*skip_before, decoded.pts()) {
                let start = pts as f64 * audio.time_base;
                match seek_lead_frames(start, decoded.samples(), audio.rate, target) {
                    Some(lead) => {
                        lead_frames = lead;
                        *skip_before = None;
                    }
                    None => continue,
                }
            }

            let mut resampled = ffmpeg::frame::Audio::empty();
            if let Err(e) = audio.resampler.run(&decoded, &mut resampled) {
                log::warn!("Resample failed: {}", e);
                continue;
            }

            let frame_count = resampled.samples();
            let lead = lead_frames.min(frame_count) * audio.channels;
            let sample_count = frame_count * audio.channels;
            let bytes = resampled.data(0);
            let byte_count = (sample_count * std::mem::size_of::<f32>()).min(bytes.len());
            let lead_bytes = (lead * std::mem::size_of::<f32>()).min(byte_count);
            media.samples.extend(
                bytes[lead_bytes..byte_count]
                    .chunks_exact(4)
                    .map(|b| f32::from_ne_bytes([b[0], b[1], b[2], b[3]])),
            );
        }

        let cap = MAX_BUFFERED_AUDIO_SECS * audio.rate as usize * audio.channels;
        if media.samples.len() > cap {
            let overflow = media.samples.len() - cap;
            media.samples.drain(..overflow);
            log::warn!("Audio buffer overflow, dropped {} samples", overflow);
        }
    }

    /// seek 목표 이전 출력 버리기를 비디오/오디오 각각 설정
    fn arm_seek_skip(&mut self, time: f64) {
        let target = (time > 0.0).then_some(time);
        self.video_skip_before = target;
        self.audio_skip_before = target;
    }

    /// 비디오 큐가 decode_time 을 덮고 오디오 선행량이 충분한지
    fn is_buffered(&self) -> bool {
        let Some(media) = self.media.as_ref() else {
            return true;
        };
        if media.frames.is_full() {
            return true;
        }

        let video_ready = media.frames.back_pts().is_some_and(|pts| pts >= self.decode_time);
        let audio_ready = media.audio.as_ref().map_or(true, |a| {
            media.samples.len() >= (AUDIO_LOOKAHEAD_SECS * f64::from(a.rate)) as usize * a.channels
        });
        video_ready && audio_ready
    }
}

/// seek 직후 오디오 프레임 처리: None = 목표 전에 끝나서 통째로 버림,
/// Some(n) = 앞 n 샘플 프레임만 버리고 나머지 사용
fn seek_lead_frames(start: f64, samples: usize, rate: u32, target: f64) -> Option<usize> {
    let end = start + samples as f64 / f64::from(rate);
    if end <= target {
        return None;
    }
    if target <= start {
        return Some(0);
    }
    let lead = ((target - start) * f64::from(rate)).round() as usize;
    Some(lead.min(samples))
}

/// RGBA 프레임 추출 (stride 제거, 행 단위 복사)
fn extract_rgba(frame: &ffmpeg::frame::Video, size: TextureSize) -> std::result::Result<Vec<u8>, String> {
    let row_size = size.width as usize * 4;
    let height = size.height as usize;
    let src_data = frame.data(0);
    let linesize = frame.stride(0);

    if linesize < row_size {
        return Err(format!("Invalid stride: {} < {} (width * 4)", linesize, row_size));
    }
    let required = (height - 1) * linesize + row_size;
    if src_data.len() < required {
        return Err(format!(
            "Frame data too small: got {} bytes, need {} ({}x{}, stride={})",
            src_data.len(), required, size.width, size.height, linesize
        ));
    }

    let mut data = vec![0u8; size.rgba_len()];
    for (y, dst) in data.chunks_exact_mut(row_size).enumerate() {
        let src_offset = y * linesize;
        dst.copy_from_slice(&src_data[src_offset..src_offset + row_size]);
    }
    Ok(data)
}

impl VideoDecoder for FfmpegDecoder {
    fn plugin_name(&self) -> &str {
        FfmpegDecoderFactory::PLUGIN_NAME
    }

    fn open(&mut self, source: Box<dyn ByteSource>) -> Result<()> {
        let media = self.open_media(source).map_err(|e| {
            log::error!("{}: open failed: {}", self.owner, e);
            StreamError::DecoderRejected(e)
        })?;

        log::info!(
            "{}: opened {}x{}, {:.2}s, audio {}",
            self.owner,
            media.video.size.width,
            media.video.size.height,
            media.length,
            media
                .audio
                .as_ref()
                .map_or("none".to_string(), |a| format!("{}ch {}Hz", a.channels, a.rate)),
        );

        self.current = vec![0u8; media.video.size.rgba_len()];
        self.media = Some(media);
        self.position = 0.0;
        self.decode_time = 0.0;
        self.eof = false;
        self.video_skip_before = None;
        self.audio_skip_before = None;
        Ok(())
    }

    fn update(&mut self, delta: f64) {
        if self.media.is_none() {
            return;
        }
        self.decode_time += delta;
        // 프레임 큐가 차면(is_full) 여기서 멈춤
        while !self.is_buffered() && self.pump() {}
    }

    fn get_audio_frame(&mut self, out: &mut [f32], max_frames: usize) -> usize {
        let Some(media) = self.media.as_mut() else {
            return 0;
        };
        let Some(audio) = media.audio.as_ref() else {
            return 0;
        };

        let channels = audio.channels;
        let frames = max_frames
            .min(out.len() / channels)
            .min(media.samples.len() / channels);
        for (dst, src) in out.iter_mut().zip(media.samples.drain(..frames * channels)) {
            *dst = src;
        }
        frames
    }

    fn get_video_frame(&mut self) -> Option<&[u8]> {
        self.media.as_ref()?;

        loop {
            let queued = self.media.as_mut().and_then(|m| m.frames.pop());
            if let Some(frame) = queued {
                self.position = frame.pts;
                self.decode_time = self.decode_time.max(frame.pts);
                self.current = frame.data;
                return Some(self.current.as_slice());
            }
            if !self.pump() {
                // EOF 후 잔여 프레임이 방금 큐에 들어왔을 수 있음
                let frame = self.media.as_mut().and_then(|m| m.frames.pop())?;
                self.position = frame.pts;
                self.current = frame.data;
                return Some(self.current.as_slice());
            }
        }
    }

    fn playback_position(&self) -> f64 {
        self.position
    }

    fn seek(&mut self, time: f64) {
        let Some(media) = self.media.as_mut() else {
            return;
        };

        // input.seek()은 AV_TIME_BASE(μs) 단위
        let timestamp_us = (time * f64::from(ffmpeg::ffi::AV_TIME_BASE)) as i64;
        if let Err(e) = media.input.seek(timestamp_us, ..timestamp_us) {
            log::warn!("{}: seek to {:.3}s failed: {}", self.owner, time, e);
        }

        media.video.decoder.flush();
        if let Some(audio) = media.audio.as_mut() {
            audio.decoder.flush();
        }
        media.frames.clear();
        media.samples.clear();

        self.eof = false;
        self.position = time;
        self.decode_time = time;
        self.arm_seek_skip(time);
    }

    fn length(&self) -> f64 {
        self.media.as_ref().map_or(0.0, |m| m.length)
    }

    fn channels(&self) -> usize {
        self.media
            .as_ref()
            .and_then(|m| m.audio.as_ref())
            .map_or(0, |a| a.channels)
    }

    fn mix_rate(&self) -> u32 {
        self.media
            .as_ref()
            .and_then(|m| m.audio.as_ref())
            .map_or(0, |a| a.rate)
    }

    fn texture_size(&self) -> TextureSize {
        self.media
            .as_ref()
            .map_or(TextureSize::new(0, 0), |m| m.video.size)
    }

    fn set_audio_track(&mut self, index: usize) {
        self.audio_track = index;

        let Some(media) = self.media.as_mut() else {
            return;
        };
        match Self::open_audio(&media.input, index) {
            Ok(audio) => {
                media.audio = audio;
                media.samples.clear();
                log::info!("{}: audio track {} selected", self.owner, index);
            }
            Err(e) => log::error!("{}: audio track {} unusable: {}", self.owner, index, e),
        }
    }
}

impl Drop for FfmpegDecoder {
    fn drop(&mut self) {
        log::debug!("{}: ffmpeg decoder released", self.owner);
    }
}

/// FFmpeg 디코더 팩토리 (DecoderRegistry 등록용)
#[derive(Debug, Default)]
pub struct FfmpegDecoderFactory;

impl FfmpegDecoderFactory {
    pub const PLUGIN_NAME: &'static str = "ffmpeg";
    const EXTENSIONS: &'static [&'static str] = &["mp4", "mkv", "webm", "mov", "ogv"];

    pub fn new() -> Self {
        Self
    }
}

impl DecoderFactory for FfmpegDecoderFactory {
    fn plugin_name(&self) -> &str {
        Self::PLUGIN_NAME
    }

    fn supported_extensions(&self) -> &[&'static str] {
        Self::EXTENSIONS
    }

    fn construct(&self, owner: SessionId) -> Box<dyn VideoDecoder> {
        Box::new(FfmpegDecoder::new(owner))
    }
}
