// 스트림 디스크립터 - 소스 파일 경로 + 오디오 트랙 선택
// .ffmpegstr (TOML)로 저장, instantiate()마다 독립된 PlaybackSession 생성

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::session::PlaybackSession;
use crate::config::SharedSettings;
use crate::decoder::DecoderRegistry;
use crate::error::{Result, StreamError};

/// 디스크립터 저장 확장자
pub const DESCRIPTOR_EXTENSION: &str = "ffmpegstr";

fn default_import_loop() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamDescriptor {
    file: PathBuf,
    #[serde(default)]
    audio_track: usize,
    /// 임포트 옵션 "loop" (생성 시 고정, 재생 쪽에서는 사용하지 않음)
    #[serde(rename = "loop", default = "default_import_loop")]
    import_loop: bool,
}

impl StreamDescriptor {
    pub fn new(file: impl Into<PathBuf>) -> Self {
        Self {
            file: file.into(),
            audio_track: 0,
            import_loop: true,
        }
    }

    pub(crate) fn with_import_loop(mut self, import_loop: bool) -> Self {
        self.import_loop = import_loop;
        self
    }

    pub fn file(&self) -> &Path {
        &self.file
    }

    pub fn audio_track(&self) -> usize {
        self.audio_track
    }

    pub fn set_audio_track(&mut self, track: usize) {
        self.audio_track = track;
    }

    pub fn import_loop(&self) -> bool {
        self.import_loop
    }

    /// .ffmpegstr 파일에서 로드
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        toml::from_str(&raw)
            .map_err(|e| StreamError::Descriptor(format!("parse {:?}: {}", path, e)))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let raw = toml::to_string(self)
            .map_err(|e| StreamError::Descriptor(format!("serialize {:?}: {}", self.file, e)))?;
        std::fs::write(path, raw)?;
        Ok(())
    }

    /// 새 재생 세션 생성: 디코더 생성 → 오디오 트랙 적용 → 파일 열기
    /// 실패 시 세션을 반환하지 않음
    pub fn instantiate(
        &self,
        registry: &DecoderRegistry,
        settings: SharedSettings,
    ) -> Result<PlaybackSession> {
        let mut session = PlaybackSession::new(settings);
        let decoder = registry.construct(session.id()).ok_or_else(|| {
            log::error!("instantiate({:?}): no decoder registered", self.file);
            StreamError::NoDecoder
        })?;

        session.set_decoder(decoder);
        session.set_audio_track(self.audio_track);
        if let Err(e) = session.open(&self.file) {
            log::error!("instantiate({:?}) failed: {}", self.file, e);
            return Err(e);
        }
        Ok(session)
    }
}
