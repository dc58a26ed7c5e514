//! Live microphone capture using cpal
//!
//! Records from the default input device at its native rate, mixes down
//! to mono and stops once the pause detector reports the end of the
//! utterance.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, FromSample, SampleFormat, SizedSample, Stream, StreamConfig};
use tracing::{debug, info, warn};

use super::speech::{ListenState, Microphone, PauseDetector, RecognitionError, Utterance};

/// How often captured audio is inspected for a pause
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Default input device capture
pub struct CpalMicrophone {
    energy_threshold: f32,
}

impl CpalMicrophone {
    pub fn new(energy_threshold: f32) -> Self {
        Self { energy_threshold }
    }
}

impl Microphone for CpalMicrophone {
    fn record(
        &mut self,
        pause_threshold: Duration,
        max_listen: Duration,
    ) -> Result<Utterance, RecognitionError> {
        let device = cpal::default_host()
            .default_input_device()
            .ok_or(RecognitionError::NoDevice)?;
        let supported = device
            .default_input_config()
            .map_err(|e| RecognitionError::Stream(e.to_string()))?;

        let sample_rate = supported.sample_rate().0;
        let channels = supported.channels() as usize;
        let config: StreamConfig = supported.config();
        let captured = Arc::new(Mutex::new(Vec::<f32>::new()));

        let stream = match supported.sample_format() {
            SampleFormat::F32 => build_stream::<f32>(&device, &config, channels, captured.clone()),
            SampleFormat::I16 => build_stream::<i16>(&device, &config, channels, captured.clone()),
            SampleFormat::U16 => build_stream::<u16>(&device, &config, channels, captured.clone()),
            other => Err(RecognitionError::Stream(format!(
                "unsupported sample format {:?}",
                other
            ))),
        }?;
        stream
            .play()
            .map_err(|e| RecognitionError::Stream(e.to_string()))?;
        info!(sample_rate, channels, "listening");

        let mut detector = PauseDetector::new(self.energy_threshold, pause_threshold, max_listen);
        let mut consumed = 0;
        let mut last_poll = Instant::now();

        loop {
            std::thread::sleep(POLL_INTERVAL);
            let frame: Vec<f32> = {
                let guard = captured.lock().unwrap_or_else(|p| p.into_inner());
                guard[consumed..].to_vec()
            };
            consumed += frame.len();

            let state = detector.push(&frame, last_poll.elapsed());
            last_poll = Instant::now();
            match state {
                ListenState::Finished => break,
                ListenState::TimedOut => return Err(RecognitionError::Timeout(max_listen)),
                ListenState::Waiting | ListenState::Speaking => {}
            }
        }

        drop(stream);
        let samples = std::mem::take(&mut *captured.lock().unwrap_or_else(|p| p.into_inner()));
        debug!(samples = samples.len(), "utterance captured");

        Ok(Utterance {
            samples,
            sample_rate,
        })
    }
}

fn build_stream<T>(
    device: &Device,
    config: &StreamConfig,
    channels: usize,
    buffer: Arc<Mutex<Vec<f32>>>,
) -> Result<Stream, RecognitionError>
where
    T: SizedSample,
    f32: FromSample<T>,
{
    let channels = channels.max(1);
    device
        .build_input_stream(
            config,
            move |data: &[T], _: &cpal::InputCallbackInfo| {
                let mut guard = buffer.lock().unwrap_or_else(|p| p.into_inner());
                for frame in data.chunks(channels) {
                    let sum: f32 = frame
                        .iter()
                        .map(|&s| <f32 as FromSample<T>>::from_sample_(s))
                        .sum();
                    guard.push(sum / frame.len() as f32);
                }
            },
            |err| warn!(%err, "audio stream error"),
            None,
        )
        .map_err(|e| RecognitionError::Stream(e.to_string()))
}
