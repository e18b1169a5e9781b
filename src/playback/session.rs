//! PlaybackSession - 디코더 1개의 재생 타임라인 동기화
//!
//! 호스트가 매 틱 `update(delta)`를 호출하면:
//! 1. 세션 시계 전진 + 디코더 update
//! 2. 오디오: 남은 partial write 재전달, 없으면 새 배치 pull 후 전달
//! 3. 비디오: 디코더 위치가 세션 시계를 따라잡을 때까지 프레임 pull → 텍스처 갱신
//!
//! 단일 스레드 / 단일 소유자 전제. 내부에 락 없음.

use std::path::Path;

use crate::audio::{MixCallback, PendingAudio};
use crate::config::{self, SharedSettings};
use crate::decoder::{SessionId, VideoDecoder};
use crate::error::{Result, StreamError};
use crate::io::{ByteSource, FileByteSource};
use crate::rendering::FrameTexture;

/// 한 틱 안에서 위치 전진 없이 허용하는 연속 프레임 수
const MAX_STALLED_FRAMES: u32 = 8;

/// 세션 상태 (플래그에서 파생)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Idle,
    Opened,
    Playing,
    Paused,
    Stopped,
}

pub struct PlaybackSession {
    id: SessionId,
    decoder: Option<Box<dyn VideoDecoder>>,
    settings: SharedSettings,
    /// 바이트 소스가 열려 디코더에 넘어갔는지
    source_opened: bool,
    /// 세션 시계 (초), 재생 중에만 전진
    clock: f64,
    playing: bool,
    paused: bool,
    /// stop() 또는 스트림 끝으로 멈춘 상태
    stopped: bool,
    audio: PendingAudio,
    texture: FrameTexture,
    channels: usize,
    mix_rate: u32,
    /// play() 시점에 설정에서 읽은 지연 보정 (초)
    delay_compensation: f64,
    mix_callback: Option<MixCallback>,
}

impl PlaybackSession {
    pub fn new(settings: SharedSettings) -> Self {
        Self {
            id: SessionId::next(),
            decoder: None,
            settings,
            source_opened: false,
            clock: 0.0,
            playing: false,
            paused: false,
            stopped: false,
            audio: PendingAudio::new(0, 0),
            texture: FrameTexture::default(),
            channels: 0,
            mix_rate: 0,
            delay_compensation: 0.0,
            mix_callback: None,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    /// 디코더 바인딩. 기존 디코더는 해제(Drop)되고 세션은 Idle로 돌아감
    pub fn set_decoder(&mut self, decoder: Box<dyn VideoDecoder>) {
        if self.decoder.is_some() {
            self.cleanup();
        }
        log::debug!("{} bound to decoder '{}'", self.id, decoder.plugin_name());
        self.decoder = Some(decoder);
    }

    pub fn has_decoder(&self) -> bool {
        self.decoder.is_some()
    }

    fn cleanup(&mut self) {
        self.decoder = None;
        self.source_opened = false;
        self.audio = PendingAudio::new(0, 0);
        self.clock = 0.0;
        self.channels = 0;
        self.mix_rate = 0;
        self.playing = false;
        self.paused = false;
        self.stopped = false;
    }

    /// 파일 열기 (Idle → Opened)
    pub fn open(&mut self, path: &Path) -> Result<()> {
        if self.decoder.is_none() {
            log::error!("{}: open({:?}) without decoder", self.id, path);
            return Err(StreamError::NoDecoder);
        }
        let source = FileByteSource::open(path).map_err(|e| StreamError::SourceOpen {
            path: path.to_path_buf(),
            source: e,
        })?;
        self.open_source(Box::new(source))
    }

    /// 바이트 소스로 열기. 실패 시 재생 불가 상태 유지
    pub fn open_source(&mut self, source: Box<dyn ByteSource>) -> Result<()> {
        let Some(decoder) = self.decoder.as_mut() else {
            log::error!("{}: open_source without decoder", self.id);
            return Err(StreamError::NoDecoder);
        };

        self.source_opened = false;
        self.playing = false;
        decoder.open(source)?;

        self.channels = decoder.channels();
        self.mix_rate = decoder.mix_rate();
        let size = decoder.texture_size();

        let buffer_frames = config::snapshot(&self.settings).audio_buffer_frames;
        self.audio = PendingAudio::new(self.channels, buffer_frames);
        self.texture = FrameTexture::new(size);
        self.clock = 0.0;
        self.stopped = false;
        self.source_opened = true;

        log::info!(
            "{} opened: {}ch {}Hz {}x{}, {:.2}s ({})",
            self.id,
            self.channels,
            self.mix_rate,
            size.width,
            size.height,
            decoder.length(),
            decoder.plugin_name()
        );
        Ok(())
    }

    /// 재생 시작. 재생 중이어도 0초부터 다시 시작
    pub fn play(&mut self) {
        if !self.source_opened {
            log::error!("{}: play() before open", self.id);
            return;
        }
        let was_playing = self.playing;
        self.stop();
        if !was_playing {
            self.seek(0.0);
        }

        self.clock = 0.0;
        self.audio.discard();
        self.stopped = false;
        self.playing = true;

        let delay_ms = config::snapshot(&self.settings).video_delay_compensation_ms;
        self.delay_compensation = delay_ms / 1000.0;
    }

    /// 재생 중이면 0초로 되돌리고 정지
    pub fn stop(&mut self) {
        if self.playing {
            self.seek(0.0);
            self.stopped = true;
        }
        self.playing = false;
    }

    pub fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn state(&self) -> PlaybackState {
        if !self.source_opened {
            PlaybackState::Idle
        } else if self.playing && self.paused {
            PlaybackState::Paused
        } else if self.playing {
            PlaybackState::Playing
        } else if self.stopped {
            PlaybackState::Stopped
        } else {
            PlaybackState::Opened
        }
    }

    /// 디코더 seek + 세션 시계 동기화
    pub fn seek(&mut self, time: f64) {
        let Some(decoder) = self.decoder.as_mut() else {
            log::error!("{}: seek({}) without decoder", self.id, time);
            return;
        };
        decoder.seek(time);
        self.clock = time;
        let dropped = self.audio.discard();
        if dropped > 0 {
            log::debug!("{}: seek dropped {} pending audio frames", self.id, dropped);
        }
    }

    /// 매 틱 호출
    pub fn update(&mut self, delta: f64) {
        if !self.playing || self.paused || !self.source_opened {
            return;
        }
        let Some(decoder) = self.decoder.as_mut() else {
            log::error!("{}: update without decoder", self.id);
            return;
        };

        self.clock += delta;
        decoder.update(delta);

        // 오디오 전달 (믹서 없으면 디코더에 그대로 둠)
        if let Some(mix) = self.mix_callback.as_mut() {
            if self.audio.is_partial() {
                self.audio.deliver(mix);
            }
            if !self.audio.is_partial() && self.audio.pull(&mut **decoder) > 0 {
                self.audio.deliver(mix);
            }
            crate::debug_log!(
                "R: {}\tM {}",
                self.audio.pending_frames(),
                self.audio.write_cursor()
            );
        }

        // 비디오 따라잡기
        let mut stalled = 0;
        loop {
            let position = decoder.playback_position();
            if position >= self.clock {
                break;
            }
            match decoder.get_video_frame() {
                Some(frame) => {
                    self.texture.set_data(frame);
                }
                None => {
                    log::info!("{}: end of stream at {:.3}s", self.id, self.clock);
                    self.playing = false;
                    self.stopped = true;
                    break;
                }
            }
            if decoder.playback_position() > position {
                stalled = 0;
            } else {
                stalled += 1;
                if stalled >= MAX_STALLED_FRAMES {
                    // 위치가 전진하지 않는 프레임이 연속됨 → 이번 틱은 여기까지
                    log::debug!("{}: decoder position stalled at {:.3}s", self.id, position);
                    break;
                }
            }
        }
    }

    pub fn texture(&self) -> &FrameTexture {
        &self.texture
    }

    pub fn length(&self) -> f64 {
        match self.decoder.as_ref() {
            Some(decoder) => decoder.length(),
            None => {
                log::error!("{}: length() without decoder", self.id);
                0.0
            }
        }
    }

    pub fn playback_position(&self) -> f64 {
        match self.decoder.as_ref() {
            Some(decoder) => decoder.playback_position(),
            None => {
                log::error!("{}: playback_position() without decoder", self.id);
                0.0
            }
        }
    }

    /// 루프 재생 미구현
    pub fn has_loop(&self) -> bool {
        false
    }

    pub fn set_loop(&mut self, enable: bool) {
        log::debug!("{}: set_loop({}) ignored, looping not supported", self.id, enable);
    }

    pub fn set_audio_track(&mut self, index: usize) {
        let Some(decoder) = self.decoder.as_mut() else {
            log::error!("{}: set_audio_track({}) without decoder", self.id, index);
            return;
        };
        decoder.set_audio_track(index);

        // 열린 뒤 트랙 교체 → 포맷이 바뀌었으면 전달 버퍼 재구성
        if self.source_opened
            && (decoder.channels() != self.channels || decoder.mix_rate() != self.mix_rate)
        {
            self.channels = decoder.channels();
            self.mix_rate = decoder.mix_rate();
            let buffer_frames = config::snapshot(&self.settings).audio_buffer_frames;
            self.audio = PendingAudio::new(self.channels, buffer_frames);
            log::info!("{}: audio format now {}ch {}Hz", self.id, self.channels, self.mix_rate);
        }
    }

    pub fn set_mix_callback(&mut self, callback: MixCallback) {
        self.mix_callback = Some(callback);
    }

    pub fn clear_mix_callback(&mut self) {
        self.mix_callback = None;
    }

    pub fn channels(&self) -> usize {
        if self.decoder.is_none() {
            log::error!("{}: channels() without decoder", self.id);
            return 0;
        }
        self.channels
    }

    pub fn mix_rate(&self) -> u32 {
        if self.decoder.is_none() {
            log::error!("{}: mix_rate() without decoder", self.id);
            return 0;
        }
        self.mix_rate
    }

    /// 세션 시계 (초)
    pub fn clock(&self) -> f64 {
        self.clock
    }

    /// play() 시점에 캡처된 지연 보정 (초)
    pub fn audio_delay_compensation(&self) -> f64 {
        self.delay_compensation
    }

    pub fn pending_audio(&self) -> &PendingAudio {
        &self.audio
    }
}

impl Drop for PlaybackSession {
    fn drop(&mut self) {
        if let Some(decoder) = &self.decoder {
            log::debug!("{} released (decoder '{}')", self.id, decoder.plugin_name());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineSettings;
    use crate::decoder::scripted::{ScriptCalls, ScriptedFactory, ScriptedMedia};
    use crate::decoder::TextureSize;
    use crate::io::StreamSource;
    use std::cell::RefCell;
    use std::io::Cursor;
    use std::rc::Rc;
    use std::sync::{Arc, Mutex};

    fn memory_source() -> Box<dyn ByteSource> {
        Box::new(StreamSource::new(Cursor::new(vec![0x1Au8; 64])).unwrap())
    }

    fn opened_session(media: ScriptedMedia) -> (PlaybackSession, Arc<Mutex<ScriptCalls>>) {
        let factory = ScriptedFactory::new(media);
        let calls = factory.calls();
        let mut session = PlaybackSession::new(EngineSettings::default().shared());
        session.set_decoder(Box::new(factory.decoder()));
        session.open_source(memory_source()).unwrap();
        (session, calls)
    }

    /// 받은 프레임 수를 기록하고 호출마다 최대 limit 프레임만 소비
    fn counting_mixer(limit: usize, received: Rc<RefCell<Vec<f32>>>) -> MixCallback {
        Box::new(move |pcm: &[f32], frames: usize| {
            let take = frames.min(limit);
            let mut out = received.borrow_mut();
            for i in 0..take {
                out.push(pcm[i * 2]);
            }
            take
        })
    }

    #[test]
    fn test_open_queries_metadata() {
        let (session, _) = opened_session(ScriptedMedia::default());
        assert_eq!(session.state(), PlaybackState::Opened);
        assert_eq!(session.channels(), 2);
        assert_eq!(session.mix_rate(), 44100);
        assert_eq!(session.texture().size(), TextureSize::new(64, 64));
        assert_eq!(session.pending_audio().capacity_frames(), 1024);
        assert_eq!(session.pending_audio().write_cursor(), -1);
        assert!(!session.is_playing());
    }

    #[test]
    fn test_open_rejected_leaves_session_unplayable() {
        let media = ScriptedMedia { reject_open: true, ..Default::default() };
        let factory = ScriptedFactory::new(media);
        let mut session = PlaybackSession::new(EngineSettings::default().shared());
        session.set_decoder(Box::new(factory.decoder()));

        let result = session.open_source(memory_source());
        assert!(matches!(result, Err(StreamError::DecoderRejected(_))));
        assert_eq!(session.state(), PlaybackState::Idle);

        session.play();
        session.update(0.5);
        assert_eq!(session.clock(), 0.0);
    }

    #[test]
    fn test_open_missing_file() {
        let factory = ScriptedFactory::new(ScriptedMedia::default());
        let mut session = PlaybackSession::new(EngineSettings::default().shared());
        session.set_decoder(Box::new(factory.decoder()));

        let result = session.open(Path::new("/nonexistent/clip.mp4"));
        assert!(matches!(result, Err(StreamError::SourceOpen { .. })));
        assert_eq!(session.state(), PlaybackState::Idle);
    }

    #[test]
    fn test_guarded_defaults_without_decoder() {
        let mut session = PlaybackSession::new(EngineSettings::default().shared());

        session.seek(3.0);
        session.set_audio_track(1);
        session.update(0.016);
        assert_eq!(session.length(), 0.0);
        assert_eq!(session.playback_position(), 0.0);
        assert_eq!(session.channels(), 0);
        assert_eq!(session.mix_rate(), 0);
        assert!(!session.has_loop());
        assert!(matches!(session.open_source(memory_source()), Err(StreamError::NoDecoder)));
        assert_eq!(session.state(), PlaybackState::Idle);
    }

    #[test]
    fn test_play_twice_restarts_from_zero() {
        let (mut session, calls) = opened_session(ScriptedMedia::default());

        session.play();
        for _ in 0..30 {
            session.update(0.016);
        }
        assert!(session.playback_position() > 0.4);

        session.play();
        assert!(session.is_playing());
        assert_eq!(session.clock(), 0.0);
        assert_eq!(session.playback_position(), 0.0);
        assert_eq!(calls.lock().unwrap().seeks.last(), Some(&0.0));

        // 처음부터 한 번 재생한 것과 동일하게 진행
        let (mut fresh, _) = opened_session(ScriptedMedia::default());
        fresh.play();
        for _ in 0..10 {
            session.update(0.016);
            fresh.update(0.016);
        }
        assert_eq!(session.playback_position(), fresh.playback_position());
        assert_eq!(session.texture().data(), fresh.texture().data());
    }

    #[test]
    fn test_pause_freezes_clock() {
        let (mut session, _) = opened_session(ScriptedMedia::default());
        session.play();
        session.update(0.1);
        let clock = session.clock();

        session.set_paused(true);
        assert_eq!(session.state(), PlaybackState::Paused);
        session.update(0.1);
        assert_eq!(session.clock(), clock);
        assert!(session.is_playing());

        session.set_paused(false);
        session.update(0.1);
        assert!(session.clock() > clock);
    }

    #[test]
    fn test_stop_seeks_to_zero() {
        let (mut session, calls) = opened_session(ScriptedMedia::default());
        session.play();
        session.update(1.0);
        let seeks_before = calls.lock().unwrap().seeks.len();

        session.stop();
        assert_eq!(session.state(), PlaybackState::Stopped);
        assert_eq!(session.playback_position(), 0.0);
        assert_eq!(calls.lock().unwrap().seeks.len(), seeks_before + 1);

        // 정지 상태에서 stop은 seek하지 않음
        session.stop();
        assert_eq!(calls.lock().unwrap().seeks.len(), seeks_before + 1);
    }

    #[test]
    fn test_seek_moves_clock() {
        let (mut session, _) = opened_session(ScriptedMedia::default());
        session.play();
        session.seek(2.0);
        assert_eq!(session.clock(), 2.0);

        session.update(0.05);
        let position = session.playback_position();
        assert!(position >= 2.0 && position < 2.1, "position={}", position);
    }

    #[test]
    fn test_end_of_stream_stops_once() {
        let (mut session, _) = opened_session(ScriptedMedia::default());
        session.play();

        // 스트림 길이보다 큰 delta
        session.update(6.0);
        assert!(!session.is_playing());
        assert_eq!(session.state(), PlaybackState::Stopped);

        let clock = session.clock();
        let revision = session.texture().revision();
        session.update(6.0);
        session.update(0.016);
        assert_eq!(session.clock(), clock);
        assert_eq!(session.texture().revision(), revision);
    }

    #[test]
    fn test_stalled_position_ends_tick_without_stopping() {
        let media = ScriptedMedia { frozen_position: true, ..Default::default() };
        let (mut session, calls) = opened_session(media);
        session.play();

        session.update(0.5);
        assert!(session.is_playing());
        assert_eq!(session.state(), PlaybackState::Playing);
        assert_eq!(calls.lock().unwrap().video_frames_served, MAX_STALLED_FRAMES as usize);

        // 다음 틱도 같은 한도에서 멈춤
        session.update(0.016);
        assert!(session.is_playing());
        assert_eq!(calls.lock().unwrap().video_frames_served, 2 * MAX_STALLED_FRAMES as usize);
    }

    #[test]
    fn test_track_switch_rebuilds_audio_buffer() {
        let media = ScriptedMedia { alt_track_format: Some((1, 22050)), ..Default::default() };
        let (mut session, calls) = opened_session(media);
        let received = Rc::new(RefCell::new(Vec::new()));
        session.set_mix_callback(counting_mixer(300, received.clone()));
        session.play();

        session.update(0.1);
        assert!(session.pending_audio().is_partial());
        assert_eq!(session.pending_audio().pending_frames(), 1024 - 300);

        session.set_audio_track(1);
        assert_eq!(calls.lock().unwrap().audio_track, Some(1));
        assert_eq!(session.channels(), 1);
        assert_eq!(session.mix_rate(), 22050);

        // 이전 포맷의 남은 배치는 버려지고 새 채널 수로 재구성
        let pending = session.pending_audio();
        assert_eq!(pending.channels(), 1);
        assert_eq!(pending.capacity_frames(), EngineSettings::default().audio_buffer_frames);
        assert!(!pending.is_partial());
        assert_eq!(pending.pending_frames(), 0);
        assert_eq!(pending.write_cursor(), -1);

        // 이후 배치는 모노로 전달
        let shapes = Rc::new(RefCell::new(Vec::new()));
        let seen = shapes.clone();
        session.set_mix_callback(Box::new(move |pcm: &[f32], frames: usize| {
            seen.borrow_mut().push((pcm.len(), frames));
            frames
        }));
        session.update(0.1);
        let shapes = shapes.borrow();
        assert!(!shapes.is_empty());
        assert!(shapes.iter().all(|(len, frames)| len == frames));
    }

    #[test]
    fn test_track_switch_same_format_keeps_partial_write() {
        let (mut session, calls) = opened_session(ScriptedMedia::default());
        let received = Rc::new(RefCell::new(Vec::new()));
        session.set_mix_callback(counting_mixer(300, received.clone()));
        session.play();
        session.update(0.1);

        session.set_audio_track(1);
        assert_eq!(calls.lock().unwrap().audio_track, Some(1));
        assert_eq!(session.channels(), 2);
        assert!(session.pending_audio().is_partial());
        assert_eq!(session.pending_audio().pending_frames(), 1024 - 300);
    }

    #[test]
    fn test_audio_conservation_with_partial_mixer() {
        let (mut session, calls) = opened_session(ScriptedMedia::default());
        let received = Rc::new(RefCell::new(Vec::new()));
        session.set_mix_callback(counting_mixer(300, received.clone()));
        session.play();

        for _ in 0..200 {
            session.update(0.016);
            let pulled = calls.lock().unwrap().audio_frames_pulled;
            let delivered = received.borrow().len() as u64;
            let pending = session.pending_audio().pending_frames() as u64;
            assert!(delivered + pending <= pulled);
            assert_eq!(delivered + pending, pulled);
            assert!(session.pending_audio().pending_frames() <= session.pending_audio().capacity_frames());
        }

        // 중복/누락 없이 연속된 샘플
        let values = received.borrow();
        assert!(!values.is_empty());
        for (i, v) in values.iter().enumerate() {
            assert_eq!(*v, i as f32);
        }
    }

    #[test]
    fn test_no_mixer_leaves_audio_in_decoder() {
        let (mut session, calls) = opened_session(ScriptedMedia::default());
        session.play();
        session.update(0.1);
        assert_eq!(calls.lock().unwrap().audio_frames_pulled, 0);
        assert!(!session.pending_audio().is_partial());
    }

    #[test]
    fn test_delay_compensation_read_at_play() {
        let settings = EngineSettings::default().shared();
        let factory = ScriptedFactory::new(ScriptedMedia::default());
        let mut session = PlaybackSession::new(settings.clone());
        session.set_decoder(Box::new(factory.decoder()));
        session.open_source(memory_source()).unwrap();

        settings.write().unwrap().video_delay_compensation_ms = 250.0;
        assert_eq!(session.audio_delay_compensation(), 0.0);
        session.play();
        assert_eq!(session.audio_delay_compensation(), 0.25);
    }

    #[test]
    fn test_set_loop_is_noop() {
        let (mut session, _) = opened_session(ScriptedMedia::default());
        session.set_loop(true);
        assert!(!session.has_loop());
    }

    #[test]
    fn test_rebinding_decoder_drops_previous() {
        let factory = ScriptedFactory::new(ScriptedMedia::default());
        let calls = factory.calls();
        let mut session = PlaybackSession::new(EngineSettings::default().shared());
        session.set_decoder(Box::new(factory.decoder()));
        session.open_source(memory_source()).unwrap();

        session.set_decoder(Box::new(factory.decoder()));
        assert_eq!(calls.lock().unwrap().dropped, 1);
        assert_eq!(session.state(), PlaybackState::Idle);

        drop(session);
        assert_eq!(calls.lock().unwrap().dropped, 2);
    }

    #[test]
    fn test_end_to_end_five_second_stream() {
        let (mut session, calls) = opened_session(ScriptedMedia::default());
        let received = Rc::new(RefCell::new(Vec::new()));
        session.set_mix_callback(counting_mixer(usize::MAX, received.clone()));
        session.play();

        let mut transitions = 0;
        let mut last_revision = session.texture().revision();
        let mut was_playing = session.is_playing();

        for tick in 0..313 {
            session.update(0.016);

            if session.is_playing() {
                // 재생 중에는 위치가 전진할 때마다 텍스처 갱신
                assert!(session.texture().revision() >= last_revision, "tick {}", tick);
                assert!(session.playback_position() + 1.0 / 30.0 >= session.clock());
            }
            last_revision = session.texture().revision();
            assert!(session.pending_audio().pending_frames() <= session.pending_audio().capacity_frames());

            if was_playing && !session.is_playing() {
                transitions += 1;
            }
            was_playing = session.is_playing();
        }

        assert_eq!(transitions, 1);
        assert!(!session.is_playing());
        // 5초 * 30fps = 150 프레임 전부 표시
        assert_eq!(session.texture().revision(), 150);
        assert_eq!(calls.lock().unwrap().video_frames_served, 150);
        assert!(!received.borrow().is_empty());
    }
}
