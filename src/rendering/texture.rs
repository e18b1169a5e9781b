// 프레젠테이션 텍스처 - 세션이 소유하는 RGBA8 표면
// 호스트는 data()/revision()으로 최신 프레임을 가져감

use crate::decoder::TextureSize;

#[derive(Debug, Clone, Default)]
pub struct FrameTexture {
    size: TextureSize,
    data: Vec<u8>,
    /// set_data 성공 횟수 (호스트가 변경 감지용으로 사용)
    revision: u64,
}

impl FrameTexture {
    /// 0으로 채운 표면 생성
    pub fn new(size: TextureSize) -> Self {
        Self {
            size,
            data: vec![0u8; size.rgba_len()],
            revision: 0,
        }
    }

    /// 프레임 내용 교체. 크기가 다르면 무시하고 false
    pub fn set_data(&mut self, rgba: &[u8]) -> bool {
        if rgba.len() != self.data.len() {
            log::warn!(
                "Texture update skipped: got {} bytes, need {} ({}x{})",
                rgba.len(),
                self.data.len(),
                self.size.width,
                self.size.height
            );
            return false;
        }
        self.data.copy_from_slice(rgba);
        self.revision += 1;
        true
    }

    pub fn size(&self) -> TextureSize {
        self.size
    }

    pub fn width(&self) -> u32 {
        self.size.width
    }

    pub fn height(&self) -> u32 {
        self.size.height
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }
}
