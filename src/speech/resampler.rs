//! Sample-rate conversion for captured speech

use crate::{HomeError, Result};
use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};
use tracing::debug;

/// Frames handed to the sinc resampler per call
const CHUNK_FRAMES: usize = 1024;

/// Resample mono audio from `input_rate` to `output_rate`
pub fn resample_mono(input: &[f32], input_rate: u32, output_rate: u32) -> Result<Vec<f32>> {
    if input_rate == 0 || output_rate == 0 {
        return Err(HomeError::AudioProcessingError(
            "Sample rates must be greater than 0".into(),
        ));
    }
    if input_rate == output_rate || input.is_empty() {
        return Ok(input.to_vec());
    }

    let ratio = output_rate as f64 / input_rate as f64;
    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };

    let mut resampler = SincFixedIn::<f32>::new(ratio, 2.0, params, CHUNK_FRAMES, 1)
        .map_err(|e| {
            HomeError::AudioProcessingError(format!("Failed to create resampler: {}", e))
        })?;

    let expected = (input.len() as f64 * ratio).ceil() as usize;
    let mut output = Vec::with_capacity(expected + CHUNK_FRAMES);

    for chunk in input.chunks(CHUNK_FRAMES) {
        // SincFixedIn needs exactly CHUNK_FRAMES per call; the tail is zero-padded
        let mut frame = vec![0.0f32; CHUNK_FRAMES];
        frame[..chunk.len()].copy_from_slice(chunk);

        let processed = resampler
            .process(&[frame], None)
            .map_err(|e| HomeError::AudioProcessingError(format!("Resampling failed: {}", e)))?;
        output.extend_from_slice(&processed[0]);
    }

    // Drop what the zero padding produced
    output.truncate(expected);

    debug!(
        "Resampled {} samples at {} Hz -> {} samples at {} Hz",
        input.len(),
        input_rate,
        output.len(),
        output_rate
    );

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_rates() {
        assert!(resample_mono(&[0.0; 16], 0, 16000).is_err());
        assert!(resample_mono(&[0.0; 16], 48000, 0).is_err());
    }

    #[test]
    fn test_same_rate_is_passthrough() {
        let input = vec![0.1, 0.2, 0.3];
        assert_eq!(resample_mono(&input, 16000, 16000).unwrap(), input);
    }

    #[test]
    fn test_empty_input() {
        assert!(resample_mono(&[], 48000, 16000).unwrap().is_empty());
    }

    #[test]
    fn test_downsample_to_speech_rate() {
        let input: Vec<f32> = (0..4800).map(|i| (i as f32 * 0.01).sin()).collect();
        let output = resample_mono(&input, 48000, 16000).unwrap();
        assert!(!output.is_empty());
        assert!(output.len() <= 1600);
        assert!(output.len() > 1000);
    }
}
