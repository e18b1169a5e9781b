// 테스트용 스크립트 디코더 - 고정 fps 프레임 + 프레임 인덱스 값의 PCM 생성
// 샘플 값 = 스트림 시작 기준 오디오 프레임 인덱스 → 중복/누락 검증 가능

use super::{DecoderFactory, SessionId, TextureSize, VideoDecoder};
use crate::error::{Result, StreamError};
use crate::io::ByteSource;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone)]
pub struct ScriptedMedia {
    pub channels: usize,
    pub mix_rate: u32,
    pub size: TextureSize,
    pub length: f64,
    pub fps: f64,
    pub reject_open: bool,
    /// 프레임을 내줘도 재생 위치가 그대로인 디코더 흉내
    pub frozen_position: bool,
    /// 트랙 1 이상의 (채널 수, 샘플레이트). None이면 모든 트랙이 같은 포맷
    pub alt_track_format: Option<(usize, u32)>,
}

impl Default for ScriptedMedia {
    fn default() -> Self {
        Self {
            channels: 2,
            mix_rate: 44100,
            size: TextureSize::new(64, 64),
            length: 5.0,
            fps: 30.0,
            reject_open: false,
            frozen_position: false,
            alt_track_format: None,
        }
    }
}

/// 세션 밖에서 디코더 호출 내역을 관찰
#[derive(Debug, Default)]
pub struct ScriptCalls {
    pub seeks: Vec<f64>,
    pub audio_frames_pulled: u64,
    pub video_frames_served: usize,
    pub audio_track: Option<usize>,
    pub dropped: usize,
}

pub struct ScriptedFactory {
    name: String,
    media: ScriptedMedia,
    calls: Arc<Mutex<ScriptCalls>>,
}

impl ScriptedFactory {
    pub fn new(media: ScriptedMedia) -> Self {
        Self::named("scripted", media)
    }

    pub fn named(name: &str, media: ScriptedMedia) -> Self {
        Self {
            name: name.to_string(),
            media,
            calls: Arc::new(Mutex::new(ScriptCalls::default())),
        }
    }

    pub fn calls(&self) -> Arc<Mutex<ScriptCalls>> {
        Arc::clone(&self.calls)
    }

    pub fn decoder(&self) -> ScriptedDecoder {
        ScriptedDecoder::new(&self.name, self.media.clone(), Arc::clone(&self.calls))
    }
}

impl DecoderFactory for ScriptedFactory {
    fn plugin_name(&self) -> &str {
        &self.name
    }

    fn supported_extensions(&self) -> &[&'static str] {
        &["mp4", "ogv"]
    }

    fn construct(&self, _owner: SessionId) -> Box<dyn VideoDecoder> {
        Box::new(self.decoder())
    }
}

pub struct ScriptedDecoder {
    name: String,
    media: ScriptedMedia,
    calls: Arc<Mutex<ScriptCalls>>,
    source: Option<Box<dyn ByteSource>>,
    next_frame: usize,
    position: f64,
    frame: Vec<u8>,
    decode_time: f64,
    audio_produced: u64,
    audio_cursor: u64,
    track: usize,
}

impl ScriptedDecoder {
    fn new(name: &str, media: ScriptedMedia, calls: Arc<Mutex<ScriptCalls>>) -> Self {
        Self {
            name: name.to_string(),
            frame: vec![0u8; media.size.rgba_len()],
            media,
            calls,
            source: None,
            next_frame: 0,
            position: 0.0,
            decode_time: 0.0,
            audio_produced: 0,
            audio_cursor: 0,
            track: 0,
        }
    }

    fn format(&self) -> (usize, u32) {
        match self.media.alt_track_format {
            Some(alt) if self.track > 0 => alt,
            _ => (self.media.channels, self.media.mix_rate),
        }
    }

    fn frame_count(&self) -> usize {
        (self.media.length * self.media.fps).floor() as usize
    }

    fn audio_frame_at(&self, time: f64) -> u64 {
        (time.clamp(0.0, self.media.length) * self.format().1 as f64).floor() as u64
    }
}

impl VideoDecoder for ScriptedDecoder {
    fn plugin_name(&self) -> &str {
        &self.name
    }

    fn open(&mut self, mut source: Box<dyn ByteSource>) -> Result<()> {
        let mut magic = [0u8; 4];
        let read = source.read(&mut magic)?;
        if self.media.reject_open || read == 0 {
            return Err(StreamError::DecoderRejected("scripted stream rejected".into()));
        }
        self.source = Some(source);
        Ok(())
    }

    fn update(&mut self, delta: f64) {
        self.decode_time += delta;
        self.audio_produced = self.audio_produced.max(self.audio_frame_at(self.decode_time));
    }

    fn get_audio_frame(&mut self, out: &mut [f32], max_frames: usize) -> usize {
        let channels = self.format().0.max(1);
        let available = (self.audio_produced - self.audio_cursor) as usize;
        let frames = available.min(max_frames).min(out.len() / channels);

        for i in 0..frames {
            let value = (self.audio_cursor + i as u64) as f32;
            for c in 0..channels {
                out[i * channels + c] = value;
            }
        }
        self.audio_cursor += frames as u64;

        if let Ok(mut calls) = self.calls.lock() {
            calls.audio_frames_pulled += frames as u64;
        }
        frames
    }

    fn get_video_frame(&mut self) -> Option<&[u8]> {
        if self.source.is_none() || self.next_frame >= self.frame_count() {
            return None;
        }

        if !self.media.frozen_position {
            self.position = self.next_frame as f64 / self.media.fps;
        }
        let fill = (self.next_frame % 256) as u8;
        self.frame.iter_mut().for_each(|b| *b = fill);
        self.next_frame += 1;

        if let Ok(mut calls) = self.calls.lock() {
            calls.video_frames_served += 1;
        }
        Some(&self.frame)
    }

    fn playback_position(&self) -> f64 {
        self.position
    }

    fn seek(&mut self, time: f64) {
        let time = time.clamp(0.0, self.media.length);
        self.next_frame = ((time * self.media.fps).ceil() as usize).min(self.frame_count());
        self.position = time;
        self.decode_time = time;
        self.audio_produced = self.audio_frame_at(time);
        self.audio_cursor = self.audio_produced;

        if let Ok(mut calls) = self.calls.lock() {
            calls.seeks.push(time);
        }
    }

    fn length(&self) -> f64 {
        self.media.length
    }

    fn channels(&self) -> usize {
        self.format().0
    }

    fn mix_rate(&self) -> u32 {
        self.format().1
    }

    fn texture_size(&self) -> TextureSize {
        self.media.size
    }

    fn set_audio_track(&mut self, index: usize) {
        self.track = index;
        if let Ok(mut calls) = self.calls.lock() {
            calls.audio_track = Some(index);
        }
    }
}

impl Drop for ScriptedDecoder {
    fn drop(&mut self) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.dropped += 1;
        }
    }
}
