// FFmpeg 디코더 플러그인 모듈
// 커스텀 AVIO 입력 + VideoDecoder 구현

pub mod custom_io;
pub mod decoder;

pub use custom_io::SourceInput;
pub use decoder::{FfmpegDecoder, FfmpegDecoderFactory};
