// 에러 타입 - 세션 열기/디스크립터/설정 실패
// 디코더 미바인딩 상태의 조회 계열 함수는 에러 대신 기본값을 반환하므로 여기 없음

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StreamError {
    /// 바이트 소스(파일) 열기 실패
    #[error("Failed to open byte source {path:?}: {source}")]
    SourceOpen {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// 디코더가 스트림을 거부함
    #[error("Decoder rejected stream: {0}")]
    DecoderRejected(String),

    /// 등록된 디코더 없음 / 세션에 디코더가 바인딩되지 않음
    #[error("No decoder bound")]
    NoDecoder,

    #[error("Descriptor error: {0}")]
    Descriptor(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unsupported source extension: {0}")]
    UnsupportedExtension(String),

    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, StreamError>;
