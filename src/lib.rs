// VideoStream FFmpeg 재생 엔진
// 디코더 플러그인 + 재생 세션(오디오/비디오 동기화) + C ABI

/// 틱 단위 디버그 로그: `cargo build --features debug_log` 시에만 출력
/// 평소 빌드에서는 컴파일 자체에서 제외됨
#[macro_export]
macro_rules! debug_log {
    ($($arg:tt)*) => {
        #[cfg(feature = "debug_log")]
        log::trace!($($arg)*);
    };
}

pub mod audio;
pub mod config;
pub mod decoder;
pub mod error;
pub mod ffi;
pub mod ffmpeg;
pub mod import;
pub mod io;
pub mod playback;
pub mod rendering;

pub use config::{EngineSettings, SharedSettings};
pub use decoder::{DecoderFactory, DecoderRegistry, SessionId, TextureSize, VideoDecoder};
pub use error::{Result, StreamError};
pub use import::{ImportOptions, VideoImporter};
pub use playback::{PlaybackSession, PlaybackState, StreamDescriptor};

// FFI 함수들을 최상위에서 재export
pub use ffi::*;

/// env_logger 초기화 (RUST_LOG가 있으면 settings.log_filter보다 우선)
/// 이미 초기화된 경우 조용히 무시
pub fn init_logging(settings: &EngineSettings) {
    let env = env_logger::Env::default().default_filter_or(settings.log_filter.as_str());
    if env_logger::Builder::from_env(env).try_init().is_ok() {
        log::info!("Logging initialized (filter: {})", settings.log_filter);
    }
}
