//! 디코딩 프레임 큐 (FFmpeg 디코더 내부 선행 디코딩용)
//! update()에서 미리 디코딩한 RGBA 프레임을 pts 순서로 보관

use std::collections::VecDeque;

pub const QUEUE_CAPACITY: usize = 8;
/// is_full() 이후에도 한 패킷에서 나온 프레임은 이 배수까지 받음
const OVERFLOW_FACTOR: usize = 2;

/// 디코딩된 RGBA 프레임
#[derive(Debug, Clone)]
pub struct DecodedFrame {
    /// 표시 시각 (초)
    pub pts: f64,
    pub data: Vec<u8>,
}

pub struct FrameQueue {
    buffer: VecDeque<DecodedFrame>,
    max_len: usize,
}

impl FrameQueue {
    pub fn new() -> Self {
        Self::with_capacity(QUEUE_CAPACITY)
    }

    pub fn with_capacity(max_len: usize) -> Self {
        let max_len = max_len.max(1);
        Self {
            buffer: VecDeque::with_capacity(max_len),
            max_len,
        }
    }

    /// 큐에 프레임 추가. max_len 은 선행 디코딩을 멈추는 기준일 뿐이고
    /// max_len * OVERFLOW_FACTOR 를 넘을 때만 가장 오래된 것 evict (evict 수 반환)
    pub fn push(&mut self, frame: DecodedFrame) -> usize {
        let hard_limit = self.max_len * OVERFLOW_FACTOR;
        let mut evicted = 0;
        while self.buffer.len() >= hard_limit {
            let _ = self.buffer.pop_front();
            evicted += 1;
        }
        self.buffer.push_back(frame);
        evicted
    }

    /// 가장 오래된 프레임 제거 후 반환
    pub fn pop(&mut self) -> Option<DecodedFrame> {
        self.buffer.pop_front()
    }

    /// 가장 마지막에 들어온 프레임의 pts
    pub fn back_pts(&self) -> Option<f64> {
        self.buffer.back().map(|f| f.pts)
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.buffer.len() >= self.max_len
    }
}

impl Default for FrameQueue {
    fn default() -> Self {
        Self::new()
    }
}
