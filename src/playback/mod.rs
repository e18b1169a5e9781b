// 재생 모듈 - 스트림 디스크립터 + 재생 세션

pub mod session;
pub mod stream;

pub use session::{PlaybackSession, PlaybackState};
pub use stream::{StreamDescriptor, DESCRIPTOR_EXTENSION};
