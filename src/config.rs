// 엔진 설정 - TOML 파일 또는 기본값
// video_delay_compensation_ms는 play() 시점에 한 번 읽음

use crate::error::{Result, StreamError};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Arc, RwLock};

/// 세션 간 공유되는 설정 핸들 (호스트가 런타임에 값 변경 가능)
pub type SharedSettings = Arc<RwLock<EngineSettings>>;

/// 믹서 전달용 PCM 버퍼 기본 크기 (채널당 프레임 수)
pub const DEFAULT_AUDIO_BUFFER_FRAMES: usize = 1024;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// 오디오/비디오 지연 보정 (ms)
    pub video_delay_compensation_ms: f64,
    /// 세션당 오디오 버퍼 용량 (채널당 프레임)
    pub audio_buffer_frames: usize,
    /// env_logger 필터 (RUST_LOG가 있으면 그쪽 우선)
    pub log_filter: String,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            video_delay_compensation_ms: 0.0,
            audio_buffer_frames: DEFAULT_AUDIO_BUFFER_FRAMES,
            log_filter: "info".to_string(),
        }
    }
}

impl EngineSettings {
    /// TOML 파일에서 로드
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| StreamError::Config(format!("read {:?}: {}", path, e)))?;
        Self::from_toml_str(&raw)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let settings: Self = toml::from_str(raw)
            .map_err(|e| StreamError::Config(format!("parse settings: {}", e)))?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<()> {
        if self.audio_buffer_frames == 0 {
            return Err(StreamError::Config("audio_buffer_frames must be > 0".into()));
        }
        if !self.video_delay_compensation_ms.is_finite() {
            return Err(StreamError::Config(
                "video_delay_compensation_ms must be finite".into(),
            ));
        }
        Ok(())
    }

    pub fn shared(self) -> SharedSettings {
        Arc::new(RwLock::new(self))
    }
}

/// 공유 설정 스냅샷 (poison 시 복구)
pub fn snapshot(settings: &SharedSettings) -> EngineSettings {
    match settings.read() {
        Ok(guard) => guard.clone(),
        Err(poisoned) => {
            log::warn!("settings lock poisoned, recovering");
            poisoned.into_inner().clone()
        }
    }
}
