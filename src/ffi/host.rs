// 호스트 FFI - 디코더 레지스트리 + 설정 핸들, 임포트
// 호스트 하나가 여러 세션을 만든다 (세션은 생성 후 호스트를 참조하지 않음)

use crate::config::{self, EngineSettings, SharedSettings};
use crate::decoder::DecoderRegistry;
use crate::ffi::types::{path_from_c, ErrorCode};
use crate::ffmpeg::FfmpegDecoderFactory;
use crate::import::{ImportOptions, VideoImporter};
use std::ffi::{c_char, c_void, CString};
use std::sync::Arc;

/// FFI 호스트 상태
pub struct StreamHost {
    pub(crate) registry: DecoderRegistry,
    pub(crate) settings: SharedSettings,
}

/// 호스트 생성
/// config_path: 설정 TOML 경로 (null이면 기본값)
/// out_host: StreamHost 핸들 반환
#[no_mangle]
pub extern "C" fn videostream_host_create(config_path: *const c_char, out_host: *mut *mut c_void) -> i32 {
    if out_host.is_null() {
        return ErrorCode::NullPointer as i32;
    }

    unsafe {
        let settings = if config_path.is_null() {
            EngineSettings::default()
        } else {
            let Some(path) = path_from_c(config_path) else {
                return ErrorCode::InvalidParam as i32;
            };
            match EngineSettings::load(&path) {
                Ok(s) => s,
                Err(e) => {
                    log::error!("videostream_host_create: {}", e);
                    *out_host = std::ptr::null_mut();
                    return ErrorCode::from(&e) as i32;
                }
            }
        };

        let host = Box::new(StreamHost {
            registry: DecoderRegistry::new(),
            settings: settings.shared(),
        });
        *out_host = Box::into_raw(host) as *mut c_void;
    }

    ErrorCode::Success as i32
}

/// 호스트 파괴 (이미 만든 세션은 계속 유효)
#[no_mangle]
pub extern "C" fn videostream_host_destroy(host: *mut c_void) -> i32 {
    if host.is_null() {
        return ErrorCode::NullPointer as i32;
    }

    unsafe {
        let _ = Box::from_raw(host as *mut StreamHost);
    }

    ErrorCode::Success as i32
}

/// env_logger 초기화 (호스트 설정의 log_filter 사용, 중복 호출 무시)
#[no_mangle]
pub extern "C" fn videostream_init_logging(host: *mut c_void) -> i32 {
    if host.is_null() {
        return ErrorCode::NullPointer as i32;
    }

    unsafe {
        let host = &*(host as *const StreamHost);
        crate::init_logging(&config::snapshot(&host.settings));
    }

    ErrorCode::Success as i32
}

/// FFmpeg 디코더 등록 (이전 등록을 대체)
#[no_mangle]
pub extern "C" fn videostream_register_ffmpeg(host: *mut c_void) -> i32 {
    if host.is_null() {
        return ErrorCode::NullPointer as i32;
    }

    unsafe {
        let host = &mut *(host as *mut StreamHost);
        host.registry.register(Arc::new(FfmpegDecoderFactory::new()));
    }

    ErrorCode::Success as i32
}

/// 영상 지연 보정값 설정 (이후 play()부터 반영)
#[no_mangle]
pub extern "C" fn videostream_set_delay_compensation_ms(host: *mut c_void, delay_ms: f64) -> i32 {
    if host.is_null() {
        return ErrorCode::NullPointer as i32;
    }
    if !delay_ms.is_finite() {
        return ErrorCode::InvalidParam as i32;
    }

    unsafe {
        let host = &*(host as *const StreamHost);
        match host.settings.write() {
            Ok(mut guard) => guard.video_delay_compensation_ms = delay_ms,
            Err(poisoned) => {
                log::warn!("settings lock poisoned, recovering");
                poisoned.into_inner().video_delay_compensation_ms = delay_ms;
            }
        }
    }

    ErrorCode::Success as i32
}

/// 소스 파일 임포트 → `save_path.ffmpegstr` 기록
/// out_path: 기록된 경로 (videostream_string_free()로 해제)
#[no_mangle]
pub extern "C" fn videostream_import(
    source_path: *const c_char,
    save_path: *const c_char,
    loop_playback: bool,
    out_path: *mut *mut c_char,
) -> i32 {
    if source_path.is_null() || save_path.is_null() || out_path.is_null() {
        return ErrorCode::NullPointer as i32;
    }

    unsafe {
        *out_path = std::ptr::null_mut();
        let (Some(source), Some(save)) = (path_from_c(source_path), path_from_c(save_path)) else {
            return ErrorCode::InvalidParam as i32;
        };

        let options = ImportOptions { loop_playback };
        let written = match VideoImporter::new().import(&source, &save, &options) {
            Ok(p) => p,
            Err(e) => return ErrorCode::from(&e) as i32,
        };

        match CString::new(written.to_string_lossy().into_owned()) {
            Ok(s) => *out_path = s.into_raw(),
            Err(_) => return ErrorCode::InvalidParam as i32,
        }
    }

    ErrorCode::Success as i32
}

/// videostream_import 등이 돌려준 문자열 해제
#[no_mangle]
pub extern "C" fn videostream_string_free(s: *mut c_char) {
    if !s.is_null() {
        unsafe {
            let _ = CString::from_raw(s);
        }
    }
}
