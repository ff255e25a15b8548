//! Spectrum source backed by live capture.

use pulse_viz_core::{
    FrequencyAnalyser, SpectrumError, SpectrumSnapshot, SpectrumSource,
};

use super::SourcePipe;

/// Pulls the newest captured samples into the analyser on every poll.
pub struct LiveSpectrum {
    pipe: SourcePipe,
    analyser: FrequencyAnalyser,
}

impl LiveSpectrum {
    pub fn new(mut pipe: SourcePipe, analyser: FrequencyAnalyser) -> Self {
        pipe.set_capacity(analyser.fft_size());
        Self { pipe, analyser }
    }

    pub fn sample_rate(&self) -> f32 {
        self.pipe.sample_rate()
    }

    pub fn device_name(&self) -> Option<&str> {
        self.pipe.device_name()
    }
}

impl SpectrumSource for LiveSpectrum {
    fn fft_size(&self) -> usize {
        self.analyser.fft_size()
    }

    fn set_fft_size(&mut self, size: usize) -> Result<(), SpectrumError> {
        self.analyser.set_fft_size(size)?;
        self.pipe.set_capacity(size);
        Ok(())
    }

    fn set_smoothing(&mut self, smoothing: f32) {
        self.analyser.set_smoothing(smoothing);
    }

    fn frequency_data(&mut self, out: &mut SpectrumSnapshot) {
        let samples = self.pipe.stream();
        self.analyser.feed(&samples);
        self.analyser.frequency_data(out);
    }
}
