// 오디오 모듈 - 믹서 전달 상태 + cpal 출력 싱크

pub mod pending;
pub mod playback;

pub use pending::PendingAudio;
pub use playback::AudioOutput;

/// 호스트 믹서 콜백: (interleaved PCM, 프레임 수) → 실제로 받아간 프레임 수
/// update() 안에서 동기 호출됨
pub type MixCallback = Box<dyn FnMut(&[f32], usize) -> usize>;
