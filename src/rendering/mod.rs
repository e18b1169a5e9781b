// 렌더링 모듈 - 세션 텍스처 + 디코더 프레임 큐

pub mod frame_queue;
pub mod texture;

pub use frame_queue::{DecodedFrame, FrameQueue, QUEUE_CAPACITY};
pub use texture::FrameTexture;
