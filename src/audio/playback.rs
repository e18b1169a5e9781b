// 실시간 오디오 출력 싱크
// cpal로 오디오 출력, 링 버퍼로 샘플 공급, 세션의 MixCallback이 링 버퍼를 채움
// 링 버퍼가 가득 차면 일부만 받아들임 → 세션 쪽 partial write 로 이어짐

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use super::MixCallback;

/// 기본 링 버퍼 용량: 200ms
pub const DEFAULT_CAPACITY_MS: u32 = 200;

/// 실시간 오디오 출력
pub struct AudioOutput {
    /// cpal 출력 스트림 (Drop 시 자동 정지)
    _stream: cpal::Stream,
    /// 링 버퍼 (믹스 콜백 ↔ cpal callback 공유)
    buffer: Arc<Mutex<AudioRingBuffer>>,
    /// 재생 중 플래그
    is_playing: Arc<AtomicBool>,
    channels: usize,
    sample_rate: u32,
}

/// 링 버퍼 (초과분은 버리지 않고 거절)
pub(crate) struct AudioRingBuffer {
    samples: VecDeque<f32>,
    capacity: usize,
}

impl AudioRingBuffer {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// 들어갈 수 있는 만큼만 프레임 단위로 추가, 받아들인 프레임 수 반환
    pub(crate) fn push_frames(&mut self, data: &[f32], frames: usize, channels: usize) -> usize {
        if channels == 0 {
            return 0;
        }
        let free_frames = self.capacity.saturating_sub(self.samples.len()) / channels;
        let offered = frames.min(data.len() / channels);
        let accepted = offered.min(free_frames);
        self.samples.extend(&data[..accepted * channels]);
        accepted
    }

    /// 출력 버퍼에 직접 복사 (할당 없음, cpal 실시간 callback용)
    /// VecDeque::as_slices()로 내부 슬라이스에서 직접 copy_from_slice
    pub(crate) fn fill_output(&mut self, output: &mut [f32]) {
        let available = self.samples.len().min(output.len());

        if available > 0 {
            // VecDeque는 내부적으로 원형 버퍼 → 최대 2개 연속 슬라이스
            let (front, back) = self.samples.as_slices();
            let mut written = 0;

            let front_copy = front.len().min(available);
            if front_copy > 0 {
                output[..front_copy].copy_from_slice(&front[..front_copy]);
                written += front_copy;
            }

            if written < available {
                let back_copy = (available - written).min(back.len());
                if back_copy > 0 {
                    output[written..written + back_copy].copy_from_slice(&back[..back_copy]);
                    written += back_copy;
                }
            }

            self.samples.drain(0..written);
        }

        // 부족분은 무음으로 채움 (underrun 시 클릭 방지)
        for sample in &mut output[available..] {
            *sample = 0.0;
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.samples.len()
    }

    pub(crate) fn clear(&mut self) {
        self.samples.clear();
    }
}

impl AudioOutput {
    /// 기본 출력 디바이스로 스트림 생성
    /// - channels / sample_rate: 세션이 보고한 값 그대로 사용 (리샘플 없음)
    /// - capacity_ms: 링 버퍼 길이
    pub fn open(channels: usize, sample_rate: u32, capacity_ms: u32) -> Result<Self, String> {
        if channels == 0 || sample_rate == 0 {
            return Err(format!(
                "잘못된 오디오 포맷: {}ch {}Hz",
                channels, sample_rate
            ));
        }

        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or("오디오 출력 디바이스를 찾을 수 없습니다")?;

        let config = cpal::StreamConfig {
            channels: channels as u16,
            sample_rate: cpal::SampleRate(sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let capacity = (sample_rate as usize * channels * capacity_ms as usize / 1000).max(channels);
        let buffer = Arc::new(Mutex::new(AudioRingBuffer::new(capacity)));
        let is_playing = Arc::new(AtomicBool::new(true));

        let buffer_for_stream = Arc::clone(&buffer);
        let is_playing_for_stream = Arc::clone(&is_playing);

        let stream = device
            .build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    if !is_playing_for_stream.load(Ordering::Relaxed) {
                        for sample in data.iter_mut() {
                            *sample = 0.0;
                        }
                        return;
                    }

                    // try_lock: 오디오 스레드는 절대 블로킹하면 안 됨
                    match buffer_for_stream.try_lock() {
                        Ok(mut buf) => buf.fill_output(data),
                        Err(_) => {
                            for sample in data.iter_mut() {
                                *sample = 0.0;
                            }
                        }
                    }
                },
                move |err| {
                    log::error!("[AUDIO_OUTPUT] 스트림 에러: {}", err);
                },
                None,
            )
            .map_err(|e| format!("오디오 스트림 생성 실패: {}", e))?;

        stream
            .play()
            .map_err(|e| format!("오디오 스트림 시작 실패: {}", e))?;

        log::info!("Audio output opened: {}ch {}Hz, {}ms buffer", channels, sample_rate, capacity_ms);

        Ok(Self {
            _stream: stream,
            buffer,
            is_playing,
            channels,
            sample_rate,
        })
    }

    /// 세션에 넘길 믹스 콜백 (링 버퍼에 들어간 프레임 수 반환)
    pub fn mix_callback(&self) -> MixCallback {
        let buffer = Arc::clone(&self.buffer);
        let channels = self.channels;
        Box::new(move |pcm: &[f32], frames: usize| match buffer.try_lock() {
            Ok(mut buf) => buf.push_frames(pcm, frames, channels),
            // cpal 콜백이 읽는 중 → 이번 틱은 0 프레임 (세션이 다음 틱에 재전달)
            Err(_) => 0,
        })
    }

    pub fn pause(&self) {
        self.is_playing.store(false, Ordering::Relaxed);
    }

    pub fn resume(&self) {
        self.is_playing.store(true, Ordering::Relaxed);
    }

    /// 버퍼 비우기 (seek 후)
    pub fn clear(&self) {
        if let Ok(mut buf) = self.buffer.lock() {
            buf.clear();
        }
    }

    /// 아직 재생되지 않은 프레임 수
    pub fn buffered_frames(&self) -> usize {
        self.buffer.lock().map_or(0, |b| b.len() / self.channels)
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

impl Drop for AudioOutput {
    fn drop(&mut self) {
        self.is_playing.store(false, Ordering::Relaxed);
    }
}
