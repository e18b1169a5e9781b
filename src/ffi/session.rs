// 재생 세션 FFI - 디스크립터로 세션 생성, 재생 제어, 텍스처/오디오 연결
// 세션 핸들은 호스트의 메인(게임) 스레드에서만 호출 (내부 락 없음)

use crate::ffi::host::StreamHost;
use crate::ffi::types::{path_from_c, ErrorCode};
use crate::playback::{PlaybackSession, StreamDescriptor};
use std::ffi::{c_char, c_int, c_void};

/// 호스트 믹서 콜백: (userdata, interleaved PCM, 프레임 수) → 받아간 프레임 수
pub type MixFn = extern "C" fn(userdata: *mut c_void, pcm: *const f32, frames: c_int) -> c_int;

unsafe fn session_mut<'a>(session: *mut c_void) -> &'a mut PlaybackSession {
    &mut *(session as *mut PlaybackSession)
}

unsafe fn session_ref<'a>(session: *mut c_void) -> &'a PlaybackSession {
    &*(session as *const PlaybackSession)
}

/// .ffmpegstr 디스크립터로 새 세션 생성 (열기까지 완료)
/// out_session: PlaybackSession 핸들 반환
#[no_mangle]
pub extern "C" fn videostream_session_create(
    host: *mut c_void,
    descriptor_path: *const c_char,
    out_session: *mut *mut c_void,
) -> i32 {
    if host.is_null() || descriptor_path.is_null() || out_session.is_null() {
        return ErrorCode::NullPointer as i32;
    }

    unsafe {
        *out_session = std::ptr::null_mut();
        let host = &*(host as *const StreamHost);
        let Some(path) = path_from_c(descriptor_path) else {
            return ErrorCode::InvalidParam as i32;
        };

        let session = StreamDescriptor::load(&path)
            .and_then(|d| d.instantiate(&host.registry, host.settings.clone()));
        match session {
            Ok(session) => {
                *out_session = Box::into_raw(Box::new(session)) as *mut c_void;
                ErrorCode::Success as i32
            }
            Err(e) => {
                log::error!("videostream_session_create({:?}): {}", path, e);
                ErrorCode::from(&e) as i32
            }
        }
    }
}

/// 세션 파괴 (디코더 + 바이트 소스 해제)
#[no_mangle]
pub extern "C" fn videostream_session_destroy(session: *mut c_void) -> i32 {
    if session.is_null() {
        return ErrorCode::NullPointer as i32;
    }

    unsafe {
        let _ = Box::from_raw(session as *mut PlaybackSession);
    }

    ErrorCode::Success as i32
}

#[no_mangle]
pub extern "C" fn videostream_session_play(session: *mut c_void) -> i32 {
    if session.is_null() {
        return ErrorCode::NullPointer as i32;
    }
    unsafe { session_mut(session).play() };
    ErrorCode::Success as i32
}

#[no_mangle]
pub extern "C" fn videostream_session_stop(session: *mut c_void) -> i32 {
    if session.is_null() {
        return ErrorCode::NullPointer as i32;
    }
    unsafe { session_mut(session).stop() };
    ErrorCode::Success as i32
}

#[no_mangle]
pub extern "C" fn videostream_session_set_paused(session: *mut c_void, paused: bool) -> i32 {
    if session.is_null() {
        return ErrorCode::NullPointer as i32;
    }
    unsafe { session_mut(session).set_paused(paused) };
    ErrorCode::Success as i32
}

#[no_mangle]
pub extern "C" fn videostream_session_seek(session: *mut c_void, time: f64) -> i32 {
    if session.is_null() {
        return ErrorCode::NullPointer as i32;
    }
    if !time.is_finite() || time < 0.0 {
        return ErrorCode::InvalidParam as i32;
    }
    unsafe { session_mut(session).seek(time) };
    ErrorCode::Success as i32
}

/// 프레임 틱 (delta: 초)
#[no_mangle]
pub extern "C" fn videostream_session_update(session: *mut c_void, delta: f64) -> i32 {
    if session.is_null() {
        return ErrorCode::NullPointer as i32;
    }
    if !delta.is_finite() {
        return ErrorCode::InvalidParam as i32;
    }
    unsafe { session_mut(session).update(delta) };
    ErrorCode::Success as i32
}

#[no_mangle]
pub extern "C" fn videostream_session_is_playing(session: *mut c_void) -> bool {
    if session.is_null() {
        return false;
    }
    unsafe { session_ref(session).is_playing() }
}

#[no_mangle]
pub extern "C" fn videostream_session_get_length(session: *mut c_void) -> f64 {
    if session.is_null() {
        return 0.0;
    }
    unsafe { session_ref(session).length() }
}

#[no_mangle]
pub extern "C" fn videostream_session_get_position(session: *mut c_void) -> f64 {
    if session.is_null() {
        return 0.0;
    }
    unsafe { session_ref(session).playback_position() }
}

/// 오디오 포맷 조회 (채널 수, 샘플레이트)
#[no_mangle]
pub extern "C" fn videostream_session_get_audio_format(
    session: *mut c_void,
    out_channels: *mut u32,
    out_mix_rate: *mut u32,
) -> i32 {
    if session.is_null() || out_channels.is_null() || out_mix_rate.is_null() {
        return ErrorCode::NullPointer as i32;
    }

    unsafe {
        let session = session_ref(session);
        *out_channels = session.channels() as u32;
        *out_mix_rate = session.mix_rate();
    }

    ErrorCode::Success as i32
}

/// 현재 RGBA 텍스처 (세션 소유, 다음 update/destroy 전까지만 유효)
#[no_mangle]
pub extern "C" fn videostream_session_get_texture(
    session: *mut c_void,
    out_width: *mut u32,
    out_height: *mut u32,
    out_data: *mut *const u8,
    out_data_size: *mut usize,
) -> i32 {
    if session.is_null() || out_width.is_null() || out_height.is_null()
        || out_data.is_null() || out_data_size.is_null() {
        return ErrorCode::NullPointer as i32;
    }

    unsafe {
        let texture = session_ref(session).texture();
        *out_width = texture.width();
        *out_height = texture.height();
        *out_data = texture.data().as_ptr();
        *out_data_size = texture.data().len();
    }

    ErrorCode::Success as i32
}

/// 믹서 콜백 등록 (callback이 null이면 해제)
#[no_mangle]
pub extern "C" fn videostream_session_set_mix_callback(
    session: *mut c_void,
    callback: Option<MixFn>,
    userdata: *mut c_void,
) -> i32 {
    if session.is_null() {
        return ErrorCode::NullPointer as i32;
    }

    unsafe {
        let session = session_mut(session);
        match callback {
            Some(mix) => session.set_mix_callback(Box::new(move |pcm: &[f32], frames: usize| {
                let frames = frames.min(c_int::MAX as usize) as c_int;
                mix(userdata, pcm.as_ptr(), frames).max(0) as usize
            })),
            None => session.clear_mix_callback(),
        }
    }

    ErrorCode::Success as i32
}
