// 오디오 출력 FFI - 세션 오디오를 기본 출력 디바이스로 직접 재생
// 호스트 믹서 대신 cpal 싱크를 세션의 믹스 콜백으로 연결

use crate::audio::playback::{AudioOutput, DEFAULT_CAPACITY_MS};
use crate::ffi::types::ErrorCode;
use crate::playback::PlaybackSession;
use std::ffi::c_void;

/// 세션 포맷으로 출력 스트림을 열고 세션 믹스 콜백으로 연결
/// capacity_ms: 링 버퍼 길이 (0이면 기본값)
/// out_handle: AudioOutput 핸들 반환
#[no_mangle]
pub extern "C" fn videostream_audio_output_attach(
    session: *mut c_void,
    capacity_ms: u32,
    out_handle: *mut *mut c_void,
) -> i32 {
    if session.is_null() || out_handle.is_null() {
        return ErrorCode::NullPointer as i32;
    }

    unsafe {
        *out_handle = std::ptr::null_mut();
        let session = &mut *(session as *mut PlaybackSession);
        let capacity_ms = if capacity_ms == 0 { DEFAULT_CAPACITY_MS } else { capacity_ms };

        match AudioOutput::open(session.channels(), session.mix_rate(), capacity_ms) {
            Ok(output) => {
                session.set_mix_callback(output.mix_callback());
                *out_handle = Box::into_raw(Box::new(output)) as *mut c_void;
                ErrorCode::Success as i32
            }
            Err(e) => {
                log::error!("[AUDIO_FFI] 출력 연결 실패: {}", e);
                ErrorCode::Unknown as i32
            }
        }
    }
}

#[no_mangle]
pub extern "C" fn videostream_audio_output_pause(handle: *mut c_void) -> i32 {
    if handle.is_null() {
        return ErrorCode::NullPointer as i32;
    }
    unsafe { (*(handle as *const AudioOutput)).pause() };
    ErrorCode::Success as i32
}

#[no_mangle]
pub extern "C" fn videostream_audio_output_resume(handle: *mut c_void) -> i32 {
    if handle.is_null() {
        return ErrorCode::NullPointer as i32;
    }
    unsafe { (*(handle as *const AudioOutput)).resume() };
    ErrorCode::Success as i32
}

/// 링 버퍼 비우기 (seek 직후 호출)
#[no_mangle]
pub extern "C" fn videostream_audio_output_clear(handle: *mut c_void) -> i32 {
    if handle.is_null() {
        return ErrorCode::NullPointer as i32;
    }
    unsafe { (*(handle as *const AudioOutput)).clear() };
    ErrorCode::Success as i32
}

/// 출력 파괴. 세션 쪽 믹스 콜백은 남지만 버퍼가 차면 0 프레임만 받음
/// (세션에서 떼려면 videostream_session_set_mix_callback(session, null, null))
#[no_mangle]
pub extern "C" fn videostream_audio_output_destroy(handle: *mut c_void) -> i32 {
    if handle.is_null() {
        return ErrorCode::NullPointer as i32;
    }
    unsafe {
        let _ = Box::from_raw(handle as *mut AudioOutput);
    }
    ErrorCode::Success as i32
}
