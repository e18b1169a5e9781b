// 바이트 소스 어댑터 - 디코더 플러그인에 read/seek/size 노출
// 플러그인 경계(C ABI)는 videodecoder_file_read / videodecoder_file_seek 두 함수

use std::ffi::{c_int, c_void};
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;

/// seek 실패 sentinel
pub const SEEK_FAILED: i64 = -1;
/// read: 잘못된 핸들 / I/O 에러 sentinel
pub const READ_INVALID: c_int = -1;

/// FFmpeg이 whence에 OR 해서 넘기는 플래그 (무시)
const AVSEEK_FORCE: c_int = 0x20000;

/// seek 기준 위치
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Whence {
    Set,
    Cur,
    End,
    /// 전체 길이 조회 (커서 이동 없음)
    Size,
}

impl Whence {
    /// C의 whence 값 해석. SET/CUR/END 이외는 전부 크기 조회 (AVSEEK_SIZE 포함)
    pub fn from_raw(whence: c_int) -> Self {
        match whence & !AVSEEK_FORCE {
            libc::SEEK_SET => Whence::Set,
            libc::SEEK_CUR => Whence::Cur,
            libc::SEEK_END => Whence::End,
            _ => Whence::Size,
        }
    }
}

/// 디코더가 읽어가는 seek 가능한 바이트 스트림
pub trait ByteSource {
    /// 0 = EOF. 요청보다 적게 읽는 경우는 EOF 직전이나 도중 I/O 에러 (에러는 다음 호출에서)
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// 새 절대 위치 반환, 범위 밖이면 SEEK_FAILED (커서 유지)
    fn seek(&mut self, offset: i64, whence: Whence) -> i64;

    fn len(&self) -> u64;

    fn position(&self) -> u64;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// C 콜백의 opaque 포인터가 가리키는 타입
pub type BoxedSource = Box<dyn ByteSource>;

/// Read + Seek 위의 바이트 소스 (파일, 메모리 버퍼)
pub struct StreamSource<R> {
    inner: R,
    len: u64,
    pos: u64,
}

pub type FileByteSource = StreamSource<File>;

impl FileByteSource {
    pub fn open(path: &Path) -> io::Result<Self> {
        let file = File::open(path)?;
        Self::new(file)
    }
}

impl<R: Read + Seek> StreamSource<R> {
    pub fn new(mut inner: R) -> io::Result<Self> {
        let len = inner.seek(SeekFrom::End(0))?;
        inner.seek(SeekFrom::Start(0))?;
        Ok(Self { inner, len, pos: 0 })
    }

    fn seek_to(&mut self, target: u64) -> i64 {
        match self.inner.seek(SeekFrom::Start(target)) {
            Ok(p) => {
                self.pos = p;
                p as i64
            }
            Err(e) => {
                log::warn!("byte source seek to {} failed: {}", target, e);
                SEEK_FAILED
            }
        }
    }
}

impl<R: Read + Seek> ByteSource for StreamSource<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut total = 0;
        while total < buf.len() {
            match self.inner.read(&mut buf[total..]) {
                Ok(0) => break,
                Ok(n) => total += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    // 이미 읽은 바이트만큼은 커서를 맞춰두고 반환, 에러는 다음 호출에서 보고
                    self.pos += total as u64;
                    if total > 0 {
                        log::debug!("byte source short read ({} bytes): {}", total, e);
                        return Ok(total);
                    }
                    return Err(e);
                }
            }
        }
        self.pos += total as u64;
        Ok(total)
    }

    fn seek(&mut self, offset: i64, whence: Whence) -> i64 {
        let len = self.len as i64;
        let target = match whence {
            Whence::Set => Some(offset),
            Whence::Cur => (self.pos as i64).checked_add(offset),
            Whence::End => len.checked_add(offset),
            Whence::Size => return len,
        };

        // 양 끝 밖으로는 이동하지 않음
        match target {
            Some(t) if (0..=len).contains(&t) => self.seek_to(t as u64),
            _ => SEEK_FAILED,
        }
    }

    fn len(&self) -> u64 {
        self.len
    }

    fn position(&self) -> u64 {
        self.pos
    }
}

/// 플러그인 read 콜백
/// opaque: *mut BoxedSource (세션/디코더 소유, 호출 동안 유효해야 함)
/// 반환: 읽은 바이트 수, EOF=0, 핸들 없음/에러=-1
#[no_mangle]
pub extern "C" fn videodecoder_file_read(opaque: *mut c_void, buf: *mut u8, buf_size: c_int) -> c_int {
    if opaque.is_null() {
        return READ_INVALID;
    }
    if buf.is_null() || buf_size <= 0 {
        return 0;
    }

    unsafe {
        let source = &mut *(opaque as *mut BoxedSource);
        let out = std::slice::from_raw_parts_mut(buf, buf_size as usize);
        match source.read(out) {
            Ok(n) => n as c_int,
            Err(e) => {
                log::error!("videodecoder_file_read: {}", e);
                READ_INVALID
            }
        }
    }
}

/// 플러그인 seek 콜백
/// whence: SEEK_SET/SEEK_CUR/SEEK_END, 그 외는 전체 길이 반환
#[no_mangle]
pub extern "C" fn videodecoder_file_seek(opaque: *mut c_void, offset: i64, whence: c_int) -> i64 {
    if opaque.is_null() {
        return SEEK_FAILED;
    }

    unsafe {
        let source = &mut *(opaque as *mut BoxedSource);
        source.seek(offset, Whence::from_raw(whence))
    }
}
