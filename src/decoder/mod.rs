//! 디코더 플러그인 인터페이스
//!
//! - `VideoDecoder`: 세션 하나가 수명 동안 소유하는 디코더 인스턴스 (해제 = Drop)
//! - `DecoderFactory`: 구현체 하나를 대표 (construct)
//! - `DecoderRegistry`: 활성 팩토리 1개 보관, 마지막 등록이 우선

use crate::error::Result;
use crate::io::ByteSource;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

#[cfg(test)]
pub(crate) mod scripted;

/// 디코더를 소유한 세션 식별자 (construct 시 owner로 전달)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(u64);

impl SessionId {
    pub fn next() -> Self {
        static NEXT_ID: AtomicU64 = AtomicU64::new(1);
        Self(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session#{}", self.0)
    }
}

/// 비디오 프레임 크기 (픽셀)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TextureSize {
    pub width: u32,
    pub height: u32,
}

impl TextureSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// RGBA8 기준 바이트 수
    pub fn rgba_len(&self) -> usize {
        self.width as usize * self.height as usize * 4
    }
}

/// 세션이 구동하는 디코더 구현 계약
pub trait VideoDecoder {
    fn plugin_name(&self) -> &str;

    /// 바이트 소스 소유권을 넘겨받아 스트림을 연다
    fn open(&mut self, source: Box<dyn ByteSource>) -> Result<()>;

    /// 내부 디코딩 상태를 최대 delta초만큼 전진 (블로킹 금지)
    fn update(&mut self, delta: f64);

    /// interleaved f32 PCM을 out에 최대 max_frames 프레임 기록, 기록한 프레임 수 반환
    fn get_audio_frame(&mut self, out: &mut [f32], max_frames: usize) -> usize;

    /// 다음 RGBA8 프레임. None = 스트림 끝 또는 프레임 없음
    fn get_video_frame(&mut self) -> Option<&[u8]>;

    /// 마지막으로 내보낸 프레임 기준 재생 위치 (초)
    fn playback_position(&self) -> f64;

    fn seek(&mut self, time: f64);

    /// 전체 길이 (초)
    fn length(&self) -> f64;

    fn channels(&self) -> usize;

    fn mix_rate(&self) -> u32;

    fn texture_size(&self) -> TextureSize;

    fn set_audio_track(&mut self, index: usize);
}

/// 디코더 구현체 등록 단위
pub trait DecoderFactory: Send + Sync {
    fn plugin_name(&self) -> &str;

    /// 처리 가능한 확장자 (소문자, 점 없음)
    fn supported_extensions(&self) -> &[&'static str];

    fn construct(&self, owner: SessionId) -> Box<dyn VideoDecoder>;
}

/// 활성 디코더 구현 1개를 보관하는 레지스트리
/// 세션을 조립하는 쪽(호스트)이 소유하고 instantiate 시 명시적으로 넘김
#[derive(Clone, Default)]
pub struct DecoderRegistry {
    active: Option<Arc<dyn DecoderFactory>>,
}

impl DecoderRegistry {
    pub fn new() -> Self {
        Self { active: None }
    }

    /// 디코더 등록 (기존 등록은 대체됨)
    pub fn register(&mut self, factory: Arc<dyn DecoderFactory>) {
        if let Some(previous) = &self.active {
            log::warn!(
                "Decoder interface '{}' replaced by '{}'",
                previous.plugin_name(),
                factory.plugin_name()
            );
        }
        log::info!("Interface registered: {}", factory.plugin_name());
        self.active = Some(factory);
    }

    pub fn active(&self) -> Option<&Arc<dyn DecoderFactory>> {
        self.active.as_ref()
    }

    pub fn is_registered(&self) -> bool {
        self.active.is_some()
    }

    /// 활성 구현으로 새 디코더 생성 (미등록 시 None)
    pub fn construct(&self, owner: SessionId) -> Option<Box<dyn VideoDecoder>> {
        self.active.as_ref().map(|factory| factory.construct(owner))
    }

    pub fn supports_extension(&self, extension: &str) -> bool {
        let ext = extension.to_ascii_lowercase();
        self.active
            .as_ref()
            .map_or(false, |f| f.supported_extensions().iter().any(|e| *e == ext))
    }
}

impl fmt::Debug for DecoderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecoderRegistry")
            .field("active", &self.active.as_ref().map(|a| a.plugin_name().to_string()))
            .finish()
    }
}
