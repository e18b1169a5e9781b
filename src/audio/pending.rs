//! 믹서 부분 전달(partial write) 상태
//!
//! 디코더에서 한 번 가져온 PCM 배치를 믹서가 여러 틱에 걸쳐 나눠 소비할 수 있음.
//! 불변식: 배치가 남아 있는 동안 `cursor + pending == last_pulled` (프레임 단위)

use super::MixCallback;
use crate::decoder::VideoDecoder;

pub struct PendingAudio {
    /// interleaved f32, channels * capacity_frames
    buffer: Vec<f32>,
    channels: usize,
    capacity_frames: usize,
    /// 다음에 믹서로 보낼 프레임 오프셋 (None = 남은 배치 없음)
    cursor: Option<usize>,
    pending: usize,
    last_pulled: usize,
    total_pulled: u64,
    total_delivered: u64,
}

impl PendingAudio {
    pub fn new(channels: usize, capacity_frames: usize) -> Self {
        Self {
            buffer: vec![0.0; channels * capacity_frames],
            channels,
            capacity_frames,
            cursor: None,
            pending: 0,
            last_pulled: 0,
            total_pulled: 0,
            total_delivered: 0,
        }
    }

    /// 남은 배치가 있는지 (write cursor >= 0)
    pub fn is_partial(&self) -> bool {
        self.cursor.is_some()
    }

    /// 호스트 ABI 호환 write cursor (-1 = 비어있음)
    pub fn write_cursor(&self) -> i64 {
        self.cursor.map_or(-1, |c| c as i64)
    }

    pub fn pending_frames(&self) -> usize {
        self.pending
    }

    pub fn capacity_frames(&self) -> usize {
        self.capacity_frames
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn total_pulled(&self) -> u64 {
        self.total_pulled
    }

    pub fn total_delivered(&self) -> u64 {
        self.total_delivered
    }

    /// 남은 배치 폐기 (seek/play 시). 버린 프레임 수 반환
    pub fn discard(&mut self) -> usize {
        let dropped = self.pending;
        self.cursor = None;
        self.pending = 0;
        self.last_pulled = 0;
        dropped
    }

    /// 디코더에서 새 배치 가져오기 (남은 배치가 없을 때만)
    pub fn pull(&mut self, decoder: &mut dyn VideoDecoder) -> usize {
        if self.is_partial() || self.channels == 0 {
            return 0;
        }

        let frames = decoder
            .get_audio_frame(&mut self.buffer, self.capacity_frames)
            .min(self.capacity_frames);

        self.last_pulled = frames;
        self.total_pulled += frames as u64;
        if frames > 0 {
            self.cursor = Some(0);
            self.pending = frames;
        }
        frames
    }

    /// 남은 배치를 믹서로 전달. 이번에 소비된 프레임 수 반환
    /// 믹서가 요청보다 많이 소비했다고 보고해도 pending을 넘지 않게 자름
    pub fn deliver(&mut self, mix: &mut MixCallback) -> usize {
        let Some(cursor) = self.cursor else {
            return 0;
        };

        let start = cursor * self.channels;
        let end = (cursor + self.pending) * self.channels;
        let reported = mix(&self.buffer[start..end], self.pending);
        let mixed = reported.min(self.pending);
        if reported > self.pending {
            log::warn!("Mixer reported {} frames for {} pending, clamped", reported, self.pending);
        }

        self.total_delivered += mixed as u64;
        if mixed == self.pending {
            self.cursor = None;
            self.pending = 0;
        } else {
            self.cursor = Some(cursor + mixed);
            self.pending -= mixed;
        }

        debug_assert!(self.cursor.map_or(true, |c| c + self.pending == self.last_pulled));
        mixed
    }
}
