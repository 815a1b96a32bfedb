// Render thread: walks a PCM buffer period by period
// Each period is decoded to f32, scaled by the session gain and handed to a
// sink. The sink decides pacing: a wall clock, or a device that drains at
// its own rate.

use crate::dispatch::{Event, EventSender};
use crate::gain::{apply_gain, GainRamp};
use chime_audio_api::{OutputFormat, PcmBuffer, PlaybackEvent};
use chime_core::{AudioError, Result};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Destination for rendered periods
pub trait PeriodSink {
    /// Accept one period of interleaved samples
    fn write(&mut self, samples: &[f32]) -> Result<()>;

    /// Block until everything written has been played
    fn drain(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Opens the sink on the render thread; device streams are not always `Send`
pub type SinkFactory =
    Box<dyn FnOnce(&OutputFormat, Arc<AtomicBool>) -> Result<Box<dyn PeriodSink>> + Send>;

/// Paces periods against the wall clock
pub struct ClockSink {
    period: Duration,
    next: Option<Instant>,
}

impl ClockSink {
    pub fn new(period: Duration) -> Self {
        Self { period, next: None }
    }
}

impl PeriodSink for ClockSink {
    fn write(&mut self, _samples: &[f32]) -> Result<()> {
        // Fixed deadlines so sleep overshoot does not accumulate
        let deadline = self.next.unwrap_or_else(Instant::now) + self.period;
        let now = Instant::now();
        if deadline > now {
            thread::sleep(deadline - now);
        }
        self.next = Some(deadline);
        Ok(())
    }
}

/// Decode interleaved little-endian PCM to f32 in `[-1.0, 1.0)`
pub fn decode_samples(bits_per_sample: u16, bytes: &[u8], out: &mut Vec<f32>) -> Result<()> {
    out.clear();
    match bits_per_sample {
        8 => out.extend(bytes.iter().map(|&b| (f32::from(b) - 128.0) / 128.0)),
        16 => out.extend(
            bytes
                .chunks_exact(2)
                .map(|c| f32::from(i16::from_le_bytes([c[0], c[1]])) / 32_768.0),
        ),
        24 => out.extend(bytes.chunks_exact(3).map(|c| {
            let value = i32::from_le_bytes([0, c[0], c[1], c[2]]) >> 8;
            value as f32 / 8_388_608.0
        })),
        32 => out.extend(
            bytes
                .chunks_exact(4)
                .map(|c| i32::from_le_bytes([c[0], c[1], c[2], c[3]]) as f32 / 2_147_483_648.0),
        ),
        other => {
            return Err(AudioError::UnsupportedFormat(format!(
                "{}-bit samples",
                other
            )))
        }
    }
    Ok(())
}

pub(crate) struct RenderJob {
    pub format: OutputFormat,
    pub pcm: PcmBuffer,
    pub period: Duration,
    pub gain: Arc<Mutex<GainRamp>>,
    pub events: EventSender,
    /// Raised by the event thread when the output is revoked
    pub revoked: Arc<AtomicBool>,
}

/// Handle to a running render thread
pub(crate) struct Renderer {
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl Renderer {
    pub fn spawn(job: RenderJob, open_sink: SinkFactory) -> Result<Self> {
        let stop = Arc::new(AtomicBool::new(false));
        let thread = {
            let stop = stop.clone();
            thread::Builder::new()
                .name("chime-render".to_string())
                .spawn(move || render(job, open_sink, stop))
                .map_err(|e| AudioError::ThreadError(format!("Failed to spawn render thread: {}", e)))?
        };
        Ok(Self {
            stop,
            thread: Some(thread),
        })
    }

    pub fn is_finished(&self) -> bool {
        self.thread.as_ref().map_or(true, |t| t.is_finished())
    }

    /// Stop rendering and wait for the thread; no further events are sent
    pub fn stop(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(handle) = self.thread.take() {
            if handle.join().is_err() {
                log::error!("Render thread panicked");
            }
        }
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        self.stop();
    }
}

fn send(events: &EventSender, event: PlaybackEvent) {
    let _ = events.send(Event::Playback(event));
}

fn render(job: RenderJob, open_sink: SinkFactory, stop: Arc<AtomicBool>) {
    let halted = || stop.load(Ordering::Acquire) || job.revoked.load(Ordering::Acquire);

    match render_periods(&job, open_sink, &stop, &halted) {
        Ok(true) => {
            log::debug!("Render reached end of data");
            send(&job.events, PlaybackEvent::Eof);
        }
        Ok(false) => log::debug!("Render halted"),
        Err(e) => {
            log::error!("Render failed: {}", e);
            if !stop.load(Ordering::Acquire) {
                send(&job.events, PlaybackEvent::Error);
            }
        }
    }
}

/// Returns Ok(true) once every period was rendered, Ok(false) if halted early
fn render_periods(
    job: &RenderJob,
    open_sink: SinkFactory,
    stop: &Arc<AtomicBool>,
    halted: &dyn Fn() -> bool,
) -> Result<bool> {
    let frame_size = job.format.frame_size();
    if frame_size == 0 {
        return Err(AudioError::InvalidParam("zero-sized frames".to_string()));
    }
    let frames_per_period =
        ((u128::from(job.format.sample_rate) * job.period.as_micros()) / 1_000_000).max(1) as usize;
    let period_bytes = frames_per_period * frame_size;

    let mut sink = open_sink(&job.format, stop.clone())?;
    send(&job.events, PlaybackEvent::Ok);

    let data = job.pcm.as_slice();
    let mut samples = Vec::with_capacity(frames_per_period * usize::from(job.format.channels));
    let mut first = true;

    for chunk in data.chunks(period_bytes) {
        if halted() {
            return Ok(false);
        }
        // Trailing partial frame is dropped
        let whole = chunk.len() - chunk.len() % frame_size;
        decode_samples(job.format.bits_per_sample, &chunk[..whole], &mut samples)?;
        let gain = job.gain.lock().advance();
        apply_gain(&mut samples, gain);
        sink.write(&samples)?;

        if first {
            first = false;
            send(&job.events, PlaybackEvent::FirstFrame);
        }
    }

    if halted() {
        return Ok(false);
    }
    sink.drain()?;
    Ok(!halted())
}
