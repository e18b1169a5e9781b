// 임포터 - 소스 비디오 파일 → .ffmpegstr 디스크립터
// 디코딩 없이 경로와 옵션만 기록

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use crate::error::{Result, StreamError};
use crate::playback::{StreamDescriptor, DESCRIPTOR_EXTENSION};

/// 임포트 옵션
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportOptions {
    /// 반복 재생 (기록만 되고 재생 쪽에서는 사용하지 않음)
    pub loop_playback: bool,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self { loop_playback: true }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct VideoImporter;

impl VideoImporter {
    pub const NAME: &'static str = "FFMPEG";
    pub const VISIBLE_NAME: &'static str = "FFMPEG";
    pub const RESOURCE_TYPE: &'static str = "VideoStreamFFMPEG";

    pub fn new() -> Self {
        Self
    }

    pub fn name(&self) -> &'static str {
        Self::NAME
    }

    pub fn visible_name(&self) -> &'static str {
        Self::VISIBLE_NAME
    }

    pub fn recognized_extensions(&self) -> &'static [&'static str] {
        &["mp4"]
    }

    pub fn save_extension(&self) -> &'static str {
        DESCRIPTOR_EXTENSION
    }

    pub fn resource_type(&self) -> &'static str {
        Self::RESOURCE_TYPE
    }

    /// 프리셋 없음
    pub fn preset_count(&self) -> usize {
        0
    }

    /// 임포트 옵션 이름 (모두 노출)
    pub fn option_names(&self) -> &'static [&'static str] {
        &["loop"]
    }

    pub fn recognizes(&self, source: &Path) -> bool {
        source
            .extension()
            .and_then(|e| e.to_str())
            .map(|ext| {
                self.recognized_extensions()
                    .iter()
                    .any(|known| known.eq_ignore_ascii_case(ext))
            })
            .unwrap_or(false)
    }

    /// 디스크립터를 `save_path.ffmpegstr` 에 기록하고 그 경로 반환
    pub fn import(
        &self,
        source: &Path,
        save_path: &Path,
        options: &ImportOptions,
    ) -> Result<PathBuf> {
        if !self.recognizes(source) {
            log::error!("Import rejected, unrecognized extension: {:?}", source);
            return Err(StreamError::UnsupportedExtension(
                source.display().to_string(),
            ));
        }

        let mut target = OsString::from(save_path.as_os_str());
        target.push(".");
        target.push(self.save_extension());
        let target = PathBuf::from(target);

        StreamDescriptor::new(source)
            .with_import_loop(options.loop_playback)
            .save(&target)?;

        log::info!("Imported {:?} → {:?}", source, target);
        Ok(target)
    }
}
