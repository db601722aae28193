use crate::{AnalysisDomain, Analyser, Result, NEUTRAL_SAMPLE};

/// Waveform resolution used while no analyser is attached to a source.
pub const DEFAULT_SEGMENT_COUNT: usize = 64;

/// Per-tick byte buffer pulled from the analyser.
///
/// Until the first refresh the buffer is flat at [`NEUTRAL_SAMPLE`], so the
/// renderer always receives valid input.
#[derive(Debug, Clone)]
pub struct FrequencySampler {
    domain: AnalysisDomain,
    buffer: Vec<u8>,
    attached: bool,
}

impl FrequencySampler {
    pub fn new(bin_count: usize, domain: AnalysisDomain) -> Self {
        Self {
            domain,
            buffer: vec![NEUTRAL_SAMPLE; bin_count.max(1)],
            attached: false,
        }
    }

    pub fn for_analyser(analyser: &Analyser, domain: AnalysisDomain) -> Self {
        Self::new(analyser.frequency_bin_count(), domain)
    }

    /// Most recent buffer.
    pub fn sample(&self) -> &[u8] {
        &self.buffer
    }

    /// Pulls a fresh buffer from the analyser.
    pub fn refresh(&mut self, analyser: &mut Analyser) -> Result<&[u8]> {
        match self.domain {
            AnalysisDomain::TimeDomain => analyser.byte_time_domain_data(&mut self.buffer),
            AnalysisDomain::Frequency => analyser.byte_frequency_data(&mut self.buffer)?,
        }
        Ok(&self.buffer)
    }

    /// Marks that a playback source is feeding the analyser.
    pub fn attach(&mut self) {
        self.attached = true;
    }

    pub fn detach(&mut self) {
        self.attached = false;
    }

    pub fn is_attached(&self) -> bool {
        self.attached
    }

    /// Angular divisions of the waveform: one per analyser bin while a
    /// source is attached, [`DEFAULT_SEGMENT_COUNT`] otherwise.
    pub fn segment_count(&self) -> usize {
        if self.attached {
            self.buffer.len()
        } else {
            DEFAULT_SEGMENT_COUNT
        }
    }

    /// Returns to the flat pre-playback buffer.
    pub fn reset(&mut self) {
        self.buffer.fill(NEUTRAL_SAMPLE);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::AudioConfig;

    #[test]
    fn starts_flat_with_default_segments() {
        let sampler = FrequencySampler::new(128, AnalysisDomain::TimeDomain);
        assert_eq!(sampler.sample().len(), 128);
        assert!(sampler.sample().iter().all(|&b| b == NEUTRAL_SAMPLE));
        assert_eq!(sampler.segment_count(), DEFAULT_SEGMENT_COUNT);
    }

    #[test]
    fn attached_sampler_uses_every_bin() {
        let mut sampler = FrequencySampler::new(128, AnalysisDomain::TimeDomain);
        sampler.attach();
        assert_eq!(sampler.segment_count(), 128);
        sampler.detach();
        assert_eq!(sampler.segment_count(), DEFAULT_SEGMENT_COUNT);
    }

    #[test]
    fn refresh_reads_the_configured_domain() {
        let mut analyser = Analyser::new(&AudioConfig::default()).unwrap();
        analyser.push_samples(&[0.5; 256]);

        let mut waveform = FrequencySampler::for_analyser(&analyser, AnalysisDomain::TimeDomain);
        assert!(waveform.refresh(&mut analyser).unwrap().iter().all(|&b| b == 192));

        let mut spectrum = FrequencySampler::for_analyser(&analyser, AnalysisDomain::Frequency);
        let bins = spectrum.refresh(&mut analyser).unwrap();
        assert!(bins[0] > 0);

        waveform.reset();
        assert!(waveform.sample().iter().all(|&b| b == NEUTRAL_SAMPLE));
    }
}
