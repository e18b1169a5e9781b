// FFI 공용 타입 - 에러 코드 + C 문자열 변환

use crate::error::StreamError;
use std::ffi::{c_char, CStr};
use std::path::PathBuf;

/// FFI 반환 코드 (호스트는 i32로 받음)
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    Success = 0,
    NullPointer = -1,
    InvalidParam = -2,
    Ffmpeg = -3,
    Io = -4,
    NoDecoder = -5,
    Unknown = -99,
}

impl From<&StreamError> for ErrorCode {
    fn from(err: &StreamError) -> Self {
        match err {
            StreamError::SourceOpen { .. } | StreamError::Io(_) => ErrorCode::Io,
            StreamError::DecoderRejected(_) => ErrorCode::Ffmpeg,
            StreamError::NoDecoder => ErrorCode::NoDecoder,
            StreamError::Descriptor(_)
            | StreamError::Config(_)
            | StreamError::UnsupportedExtension(_) => ErrorCode::InvalidParam,
        }
    }
}

/// UTF-8 C 문자열 → PathBuf (null 또는 잘못된 UTF-8이면 None)
///
/// # Safety
/// ptr는 null이거나 NUL로 끝나는 유효한 문자열이어야 함
pub(crate) unsafe fn path_from_c(ptr: *const c_char) -> Option<PathBuf> {
    if ptr.is_null() {
        return None;
    }
    CStr::from_ptr(ptr).to_str().ok().map(PathBuf::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CString;

    #[test]
    fn test_error_mapping() {
        assert_eq!(ErrorCode::from(&StreamError::NoDecoder), ErrorCode::NoDecoder);
        assert_eq!(
            ErrorCode::from(&StreamError::DecoderRejected("x".into())),
            ErrorCode::Ffmpeg
        );
        assert_eq!(
            ErrorCode::from(&StreamError::UnsupportedExtension("a.avi".into())),
            ErrorCode::InvalidParam
        );
        assert_eq!(ErrorCode::NoDecoder as i32, -5);
    }

    #[test]
    fn test_path_from_c() {
        let raw = CString::new("/videos/a.mp4").unwrap();
        unsafe {
            assert_eq!(path_from_c(raw.as_ptr()), Some(PathBuf::from("/videos/a.mp4")));
            assert_eq!(path_from_c(std::ptr::null()), None);
        }
    }
}
