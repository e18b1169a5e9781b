// FFI 모듈 - C ABI 호스트 연동
// 모든 함수는 ErrorCode(i32) 또는 안전한 기본값을 반환

pub mod audio_output;
pub mod host;
pub mod session;
pub mod types;

pub use audio_output::*;
pub use host::*;
pub use session::*;
pub use types::ErrorCode;
