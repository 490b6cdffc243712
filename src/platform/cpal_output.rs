use std::sync::{Arc, Mutex};

use anyhow::anyhow;
use cpal::{
    traits::{DeviceTrait, HostTrait, StreamTrait},
    Device, FromSample, Sample, SizedSample, Stream, StreamConfig,
};
use log::{error, info};

use super::{AudioOutput, BlockSource};

/// Default cpal output device playing a shared `BlockSource`
pub struct CpalOutput {
    stream: Option<Stream>,
    device: Option<Device>,
    config: Option<StreamConfig>,
    sample_format: Option<cpal::SampleFormat>,
    sample_rate: f32,
    is_active: bool,
}

impl CpalOutput {
    pub fn new() -> Self {
        Self {
            stream: None,
            device: None,
            config: None,
            sample_format: None,
            sample_rate: 44100.0,
            is_active: false,
        }
    }

    /// Build the output stream around `source`
    pub fn create_stream<S>(&mut self, source: Arc<Mutex<S>>) -> anyhow::Result<()>
    where
        S: BlockSource + 'static,
    {
        let device = self.device.as_ref().ok_or_else(|| anyhow!("Device not initialized"))?;
        let config = self.config.as_ref().ok_or_else(|| anyhow!("Config not initialized"))?;
        let format = self.sample_format.ok_or_else(|| anyhow!("Sample format not initialized"))?;

        let stream = match format {
            cpal::SampleFormat::I8 => Self::make_stream::<i8, S>(device, config, source)?,
            cpal::SampleFormat::I16 => Self::make_stream::<i16, S>(device, config, source)?,
            cpal::SampleFormat::I32 => Self::make_stream::<i32, S>(device, config, source)?,
            cpal::SampleFormat::I64 => Self::make_stream::<i64, S>(device, config, source)?,
            cpal::SampleFormat::U8 => Self::make_stream::<u8, S>(device, config, source)?,
            cpal::SampleFormat::U16 => Self::make_stream::<u16, S>(device, config, source)?,
            cpal::SampleFormat::U32 => Self::make_stream::<u32, S>(device, config, source)?,
            cpal::SampleFormat::U64 => Self::make_stream::<u64, S>(device, config, source)?,
            cpal::SampleFormat::F32 => Self::make_stream::<f32, S>(device, config, source)?,
            cpal::SampleFormat::F64 => Self::make_stream::<f64, S>(device, config, source)?,
            sample_format => return Err(anyhow!("Unsupported sample format '{}'", sample_format)),
        };

        self.stream = Some(stream);
        Ok(())
    }

    fn setup_host_device(&mut self) -> anyhow::Result<()> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| anyhow!("Default output device is not available"))?;
        info!("output device: {}", device.name()?);

        let supported = device.default_output_config()?;
        info!("default output config: {:?}", supported);

        self.sample_rate = supported.sample_rate().0 as f32;
        self.sample_format = Some(supported.sample_format());
        self.config = Some(supported.into());
        self.device = Some(device);
        Ok(())
    }

    fn make_stream<T, S>(device: &Device, config: &StreamConfig, source: Arc<Mutex<S>>) -> anyhow::Result<Stream>
    where
        T: SizedSample + FromSample<f32>,
        S: BlockSource + 'static,
    {
        let channels = config.channels as usize;
        let err_fn = |err| error!("output stream error: {}", err);
        let mut mono: Vec<f32> = Vec::new();

        let stream = device.build_output_stream(
            config,
            move |output: &mut [T], _: &cpal::OutputCallbackInfo| {
                mono.resize(output.len() / channels, 0.0);
                match source.lock() {
                    Ok(mut source) => source.render(&mut mono),
                    Err(_) => mono.fill(0.0),
                }
                Self::write_frames(output, &mono, channels);
            },
            err_fn,
            None,
        )?;
        Ok(stream)
    }

    /// Copy the mono block to every channel
    fn write_frames<T>(output: &mut [T], mono: &[f32], channels: usize)
    where
        T: Sample + FromSample<f32>,
    {
        for (frame, &value) in output.chunks_mut(channels).zip(mono) {
            let value = T::from_sample(value);
            for sample in frame.iter_mut() {
                *sample = value;
            }
        }
    }
}

impl Default for CpalOutput {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioOutput for CpalOutput {
    fn initialize(&mut self) -> anyhow::Result<()> {
        self.setup_host_device()
    }

    fn start(&mut self) -> anyhow::Result<()> {
        let stream = self
            .stream
            .as_ref()
            .ok_or_else(|| anyhow!("Stream not created. Call create_stream first."))?;
        stream.play()?;
        self.is_active = true;
        info!("audio stream started at {} Hz", self.sample_rate);
        Ok(())
    }

    fn stop(&mut self) -> anyhow::Result<()> {
        if let Some(stream) = &self.stream {
            stream.pause()?;
            self.is_active = false;
            info!("audio stream stopped");
        }
        Ok(())
    }

    fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    fn is_active(&self) -> bool {
        self.is_active
    }
}
