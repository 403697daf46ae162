/// Converts device-native float audio into mono 16-bit PCM at the requested
/// rate.
///
/// Used by backends whose hardware cannot deliver the capture format
/// directly: interleaved input is downmixed, resampled by linear
/// interpolation and quantized.
///
/// The converter is a stream processor: feed it consecutive callback chunks
/// in order. Resampling phase and the last input sample carry over between
/// calls, so chunk boundaries neither drop nor repeat output samples.
#[derive(Debug, Clone)]
pub struct PcmConverter {
    pub target_sample_rate: u32,
    source_sample_rate: u32,
    // Input samples consumed and output samples produced since the last
    // rate change. Output n sits at source position n * source / target.
    consumed: u64,
    produced: u64,
    last: Option<f32>,
}

impl PcmConverter {
    pub fn new(target_sample_rate: u32) -> Self {
        Self {
            target_sample_rate,
            source_sample_rate: 0,
            consumed: 0,
            produced: 0,
            last: None,
        }
    }

    /// Forget stream position, e.g. after a pause.
    pub fn reset(&mut self) {
        self.consumed = 0;
        self.produced = 0;
        self.last = None;
    }

    /// Full pipeline: downmix → resample → quantize.
    pub fn convert(&mut self, samples: &[f32], source_sample_rate: u32, channels: usize) -> Vec<i16> {
        let mono = downmix_to_mono(samples, channels);
        let resampled = self.resample(&mono, source_sample_rate);
        to_pcm16(&resampled)
    }

    /// Linear interpolation resampling of the next chunk of a mono stream.
    ///
    /// Returns input unchanged if rates match.
    pub fn resample(&mut self, samples: &[f32], source_sample_rate: u32) -> Vec<f32> {
        if source_sample_rate != self.source_sample_rate {
            self.source_sample_rate = source_sample_rate;
            self.reset();
        }
        if source_sample_rate == self.target_sample_rate
            || source_sample_rate == 0
            || self.target_sample_rate == 0
            || samples.is_empty()
        {
            return samples.to_vec();
        }

        let last_index = (samples.len() - 1) as f64;
        let expected = samples.len() as u64 * self.target_sample_rate as u64
            / source_sample_rate as u64;
        let mut output = Vec::with_capacity(expected as usize + 1);

        loop {
            // Position relative to this chunk; -1.0 is the previous chunk's
            // final sample.
            let offset = self.produced as i128 * source_sample_rate as i128
                - self.consumed as i128 * self.target_sample_rate as i128;
            let position = offset as f64 / self.target_sample_rate as f64;
            if position > last_index {
                break;
            }

            let floor = position.floor();
            let fraction = (position - floor) as f32;
            let sample = if floor < 0.0 {
                let previous = self.last.unwrap_or(samples[0]);
                previous * (1.0 - fraction) + samples[0] * fraction
            } else {
                let index = floor as usize;
                match samples.get(index + 1) {
                    Some(&next) => samples[index] * (1.0 - fraction) + next * fraction,
                    None => samples[index],
                }
            };
            output.push(sample);
            self.produced += 1;
        }

        self.consumed += samples.len() as u64;
        self.last = samples.last().copied();
        output
    }
}

/// Average interleaved channels into one.
pub fn downmix_to_mono(samples: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return samples.to_vec();
    }
    let scale = 1.0 / channels as f32;
    samples
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() * scale)
        .collect()
}

/// Quantize `[-1.0, 1.0]` floats to signed 16-bit samples, clamping
/// out-of-range values.
pub fn to_pcm16(samples: &[f32]) -> Vec<i16> {
    samples
        .iter()
        .map(|&sample| (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16)
        .collect()
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;

    #[test]
    fn quantize_full_scale() {
        assert_eq!(to_pcm16(&[0.0, 1.0, -1.0]), vec![0, i16::MAX, -i16::MAX]);
    }

    #[test]
    fn quantize_clamps_out_of_range() {
        assert_eq!(to_pcm16(&[2.0, -3.0]), vec![i16::MAX, -i16::MAX]);
    }

    #[test]
    fn downmix_stereo_to_mono() {
        let mono = downmix_to_mono(&[1.0, 0.0, 0.25, 0.75], 2);
        assert_eq!(mono.len(), 2);
        assert_abs_diff_eq!(mono[0], 0.5, epsilon = 1e-6);
        assert_abs_diff_eq!(mono[1], 0.5, epsilon = 1e-6);
    }

    #[test]
    fn downmix_drops_incomplete_trailing_frame() {
        assert_eq!(downmix_to_mono(&[1.0, 1.0, 0.5], 2), vec![1.0]);
    }

    #[test]
    fn resample_same_rate_is_passthrough() {
        let mut converter = PcmConverter::new(8000);
        assert_eq!(converter.resample(&[0.1, 0.2], 8000), vec![0.1, 0.2]);
    }

    #[test]
    fn resample_48k_to_8k() {
        let mut converter = PcmConverter::new(8000);
        let samples: Vec<f32> = (0..480).map(|i| i as f32 / 480.0).collect();

        let result = converter.resample(&samples, 48000);

        assert_eq!(result.len(), 80);
        assert_abs_diff_eq!(result[1], samples[6], epsilon = 1e-6);
    }

    #[test]
    fn resample_upsample_2x_interpolates() {
        let mut converter = PcmConverter::new(16000);
        let result = converter.resample(&[0.0, 1.0], 8000);

        assert_eq!(result.len(), 3);
        assert_abs_diff_eq!(result[1], 0.5, epsilon = 1e-6);
        assert_abs_diff_eq!(result[2], 1.0, epsilon = 1e-6);

        // The point between chunks comes out with the next chunk.
        let next = converter.resample(&[0.0, 0.0], 8000);
        assert_abs_diff_eq!(next[0], 0.5, epsilon = 1e-6);
    }

    #[test]
    fn chunked_resampling_keeps_the_output_rate() {
        let mut converter = PcmConverter::new(8000);
        let second: Vec<f32> = vec![0.25; 44_100];

        let produced: usize = second
            .chunks(512)
            .map(|chunk| converter.resample(chunk, 44_100).len())
            .sum();

        assert!(
            (7_999..=8_001).contains(&produced),
            "produced {} samples for 1 s at 8000 Hz",
            produced
        );
    }

    #[test]
    fn chunked_resampling_is_continuous_across_boundaries() {
        let mut converter = PcmConverter::new(8000);
        let ramp: Vec<f32> = (0..4_410).map(|i| i as f32 / 4_410.0).collect();
        let step = 44_100.0 / 8_000.0;

        let mut output = Vec::new();
        for chunk in ramp.chunks(333) {
            output.extend(converter.resample(chunk, 44_100));
        }

        for (n, &sample) in output.iter().enumerate() {
            let expected = (n as f64 * step) as f32 / 4_410.0;
            assert_abs_diff_eq!(sample, expected, epsilon = 1e-4);
        }
    }

    #[test]
    fn rate_change_restarts_the_stream() {
        let mut converter = PcmConverter::new(8000);
        converter.resample(&[0.5; 100], 48_000);

        let result = converter.resample(&[0.0; 480], 16_000);
        assert_eq!(result.len(), 240);
    }

    #[test]
    fn convert_stereo_48k_to_mono_8k_pcm() {
        let mut converter = PcmConverter::new(8000);
        let stereo = vec![0.5f32; 96 * 2];

        let pcm = converter.convert(&stereo, 48000, 2);

        assert_eq!(pcm.len(), 16);
        assert!(pcm.iter().all(|&s| s == (0.5 * i16::MAX as f32) as i16));
    }
}
