// 커스텀 AVIO 입력
// ByteSource 위에 AVFormatContext를 연다 (파일 경로 대신 read/seek 콜백 사용)
// 해제 순서: Input(avformat_close_input) → AVIO 버퍼 → AVIOContext → ByteSource

use ffmpeg_next as ffmpeg;
use ffmpeg::ffi;
use libc::{c_int, c_void};
use std::mem::ManuallyDrop;
use std::ops::{Deref, DerefMut};
use std::ptr;

use crate::io::{videodecoder_file_read, videodecoder_file_seek, BoxedSource};

/// AVIO 내부 버퍼 크기
const AVIO_BUFFER_SIZE: usize = 32 * 1024;

/// AVIO read 콜백: 0바이트 = EOF → AVERROR_EOF 로 변환
unsafe extern "C" fn avio_read(opaque: *mut c_void, buf: *mut u8, buf_size: c_int) -> c_int {
    match videodecoder_file_read(opaque, buf, buf_size) {
        0 => ffi::AVERROR_EOF,
        n if n < 0 => ffi::AVERROR(libc::EIO),
        n => n,
    }
}

/// AVIO seek 콜백 (AVSEEK_SIZE/AVSEEK_FORCE 처리는 Whence::from_raw 에서)
unsafe extern "C" fn avio_seek(opaque: *mut c_void, offset: i64, whence: c_int) -> i64 {
    videodecoder_file_seek(opaque, offset, whence)
}

/// ByteSource를 소유하는 FFmpeg 입력 컨텍스트
pub struct SourceInput {
    input: ManuallyDrop<ffmpeg::format::context::Input>,
    avio: *mut ffi::AVIOContext,
    opaque: *mut BoxedSource,
}

impl SourceInput {
    /// 바이트 소스로 컨테이너 열기 + 스트림 정보 탐색
    pub fn open(source: BoxedSource) -> Result<Self, String> {
        let opaque = Box::into_raw(Box::new(source));

        unsafe {
            let buffer = ffi::av_malloc(AVIO_BUFFER_SIZE) as *mut u8;
            if buffer.is_null() {
                drop(Box::from_raw(opaque));
                return Err("AVIO buffer allocation failed".to_string());
            }

            let mut avio = ffi::avio_alloc_context(
                buffer,
                AVIO_BUFFER_SIZE as c_int,
                0,
                opaque as *mut c_void,
                Some(avio_read),
                None,
                Some(avio_seek),
            );
            if avio.is_null() {
                let mut buffer = buffer as *mut c_void;
                ffi::av_freep(&mut buffer as *mut *mut c_void as *mut c_void);
                drop(Box::from_raw(opaque));
                return Err("AVIO context allocation failed".to_string());
            }

            let mut ctx = ffi::avformat_alloc_context();
            if ctx.is_null() {
                Self::free_avio(&mut avio);
                drop(Box::from_raw(opaque));
                return Err("Format context allocation failed".to_string());
            }
            (*ctx).pb = avio;
            (*ctx).flags |= ffi::AVFMT_FLAG_CUSTOM_IO as c_int;

            // 실패 시 avformat_open_input 이 ctx 를 해제 (pb 는 우리 소유)
            let ret = ffi::avformat_open_input(&mut ctx, ptr::null(), ptr::null_mut(), ptr::null_mut());
            if ret < 0 {
                Self::free_avio(&mut avio);
                drop(Box::from_raw(opaque));
                return Err(format!("Failed to open input: {}", ffmpeg::Error::from(ret)));
            }

            let ret = ffi::avformat_find_stream_info(ctx, ptr::null_mut());
            if ret < 0 {
                ffi::avformat_close_input(&mut ctx);
                Self::free_avio(&mut avio);
                drop(Box::from_raw(opaque));
                return Err(format!("Failed to read stream info: {}", ffmpeg::Error::from(ret)));
            }

            Ok(Self {
                input: ManuallyDrop::new(ffmpeg::format::context::Input::wrap(ctx)),
                avio,
                opaque,
            })
        }
    }

    unsafe fn free_avio(avio: &mut *mut ffi::AVIOContext) {
        if avio.is_null() {
            return;
        }
        ffi::av_freep(&mut (**avio).buffer as *mut *mut u8 as *mut c_void);
        ffi::avio_context_free(avio);
    }
}

impl Deref for SourceInput {
    type Target = ffmpeg::format::context::Input;

    fn deref(&self) -> &Self::Target {
        &self.input
    }
}

impl DerefMut for SourceInput {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.input
    }
}

impl Drop for SourceInput {
    fn drop(&mut self) {
        unsafe {
            ManuallyDrop::drop(&mut self.input);
            Self::free_avio(&mut self.avio);
            drop(Box::from_raw(self.opaque));
        }
    }
}
