// cpal output for rendered periods

use crate::render::PeriodSink;
use chime_audio_api::OutputFormat;
use chime_core::{AudioError, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Stream, StreamConfig};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Periods queued ahead of the device before `write` blocks
const QUEUED_PERIODS: usize = 4;

/// Feeds the default output device through a small sample queue.
/// The device callback drains the queue and pads with silence on underrun.
pub struct DeviceSink {
    queue: Arc<Mutex<VecDeque<f32>>>,
    capacity: usize,
    poll: Duration,
    stop: Arc<AtomicBool>,
    _stream: Stream,
}

impl DeviceSink {
    pub fn open(format: &OutputFormat, period: Duration, stop: Arc<AtomicBool>) -> Result<Self> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| AudioError::DeviceError("No output device available".to_string()))?;

        let config = StreamConfig {
            channels: format.channels,
            sample_rate: cpal::SampleRate(format.sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let period_samples = ((u128::from(format.sample_rate) * period.as_micros()) / 1_000_000)
            .max(1) as usize
            * usize::from(format.channels);
        let capacity = period_samples * QUEUED_PERIODS;
        let queue = Arc::new(Mutex::new(VecDeque::with_capacity(capacity + period_samples)));

        let feed = queue.clone();
        let stream = device
            .build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    let mut queue = feed.lock();
                    for sample in data.iter_mut() {
                        *sample = queue.pop_front().unwrap_or(0.0);
                    }
                },
                |err| {
                    log::error!("Audio stream error: {}", err);
                },
                None,
            )
            .map_err(|e| AudioError::DeviceError(format!("Failed to build output stream: {}", e)))?;

        stream
            .play()
            .map_err(|e| AudioError::DeviceError(format!("Failed to start stream: {}", e)))?;
        log::debug!(
            "Output stream open: {} Hz, {} channel(s)",
            format.sample_rate,
            format.channels
        );

        Ok(Self {
            queue,
            capacity,
            poll: (period / 4).max(Duration::from_millis(1)),
            stop,
            _stream: stream,
        })
    }

    fn wait_while(&self, busy: impl Fn(usize) -> bool) {
        while busy(self.queue.lock().len()) && !self.stop.load(Ordering::Acquire) {
            thread::sleep(self.poll);
        }
    }
}

impl PeriodSink for DeviceSink {
    fn write(&mut self, samples: &[f32]) -> Result<()> {
        self.queue.lock().extend(samples.iter().copied());
        self.wait_while(|queued| queued > self.capacity);
        Ok(())
    }

    fn drain(&mut self) -> Result<()> {
        self.wait_while(|queued| queued > 0);
        Ok(())
    }
}
