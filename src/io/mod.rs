// 바이트 소스 모듈 (디코더 플러그인용 read/seek)

pub mod byte_source;

pub use byte_source::{
    videodecoder_file_read, videodecoder_file_seek, BoxedSource, ByteSource, FileByteSource,
    StreamSource, Whence, READ_INVALID, SEEK_FAILED,
};
