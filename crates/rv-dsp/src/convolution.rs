//! FFT overlap-add convolution
//!
//! Single-partition overlap-add using RealFFT:
//! - Zero latency: each input block produces the same number of output samples
//! - Accepts any block length up to the planned block size
//! - The convolution tail is carried between calls, so it works both for
//!   whole-buffer offline rendering and for block-wise streaming

use std::sync::Arc;

use realfft::{ComplexToReal, RealFftPlanner, RealToComplex};
use rustfft::num_complex::Complex;

use crate::{Processor, Sample};

/// Block size used by live (streaming) graphs
pub const STREAMING_BLOCK_SIZE: usize = 4096;

/// One channel of FFT convolution against a fixed impulse response
pub struct OverlapAddConvolver {
    block_size: usize,
    fft_size: usize,
    /// IR spectrum, pre-scaled by 1/fft_size
    ir_spectrum: Vec<Complex<f64>>,
    forward: Arc<dyn RealToComplex<f64>>,
    inverse: Arc<dyn ComplexToReal<f64>>,
    time_scratch: Vec<f64>,
    spectrum_scratch: Vec<Complex<f64>>,
    /// Pending convolution output beyond the current block (IR length - 1)
    tail: Vec<f64>,
}

impl std::fmt::Debug for OverlapAddConvolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OverlapAddConvolver")
            .field("block_size", &self.block_size)
            .field("fft_size", &self.fft_size)
            .field("tail_len", &self.tail.len())
            .finish()
    }
}

impl OverlapAddConvolver {
    /// Plan a convolver for `ir`, processing at most `block_size` samples per FFT
    pub fn new(ir: &[f64], block_size: usize) -> Self {
        let ir: &[f64] = if ir.is_empty() { &[0.0] } else { ir };
        let block_size = block_size.max(1);
        let fft_size = (block_size + ir.len() - 1).next_power_of_two().max(2);

        let mut planner = RealFftPlanner::<f64>::new();
        let forward = planner.plan_fft_forward(fft_size);
        let inverse = planner.plan_fft_inverse(fft_size);

        let mut padded = vec![0.0; fft_size];
        padded[..ir.len()].copy_from_slice(ir);
        let mut ir_spectrum = forward.make_output_vec();
        if forward.process(&mut padded, &mut ir_spectrum).is_err() {
            log::error!("IR forward FFT failed (fft_size {fft_size})");
            ir_spectrum.fill(Complex::new(0.0, 0.0));
        }
        let norm = 1.0 / fft_size as f64;
        for bin in &mut ir_spectrum {
            *bin *= norm;
        }

        let spectrum_scratch = forward.make_output_vec();

        Self {
            block_size,
            fft_size,
            ir_spectrum,
            forward,
            inverse,
            time_scratch: vec![0.0; fft_size],
            spectrum_scratch,
            tail: vec![0.0; ir.len() - 1],
        }
    }

    /// Convolve `input` into `output` (same length), carrying the tail forward
    pub fn process(&mut self, input: &[Sample], output: &mut [Sample]) {
        debug_assert_eq!(input.len(), output.len());
        for (in_block, out_block) in input
            .chunks(self.block_size)
            .zip(output.chunks_mut(self.block_size))
        {
            self.process_block(in_block, out_block);
        }
    }

    fn process_block(&mut self, input: &[Sample], output: &mut [Sample]) {
        let len = input.len();

        self.time_scratch.fill(0.0);
        self.time_scratch[..len].copy_from_slice(input);

        if self
            .forward
            .process(&mut self.time_scratch, &mut self.spectrum_scratch)
            .is_err()
        {
            log::error!("forward FFT failed (fft_size {})", self.fft_size);
            output.fill(0.0);
            return;
        }

        for (bin, ir_bin) in self.spectrum_scratch.iter_mut().zip(&self.ir_spectrum) {
            *bin *= *ir_bin;
        }

        if self
            .inverse
            .process(&mut self.spectrum_scratch, &mut self.time_scratch)
            .is_err()
        {
            log::error!("inverse FFT failed (fft_size {})", self.fft_size);
            output.fill(0.0);
            return;
        }

        let tail_len = self.tail.len();
        for (i, out) in output.iter_mut().enumerate() {
            let carried = if i < tail_len { self.tail[i] } else { 0.0 };
            *out = self.time_scratch[i] + carried;
        }

        // Shift the tail by one block, then add this block's overhang
        if len < tail_len {
            self.tail.copy_within(len.., 0);
            self.tail[tail_len - len..].fill(0.0);
        } else {
            self.tail.fill(0.0);
        }
        for (k, slot) in self.tail.iter_mut().enumerate() {
            *slot += self.time_scratch[len + k];
        }
    }
}

impl Processor for OverlapAddConvolver {
    fn reset(&mut self) {
        self.tail.fill(0.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn direct_convolution(x: &[f64], h: &[f64], len: usize) -> Vec<f64> {
        (0..len)
            .map(|n| {
                h.iter()
                    .enumerate()
                    .filter(|(k, _)| *k <= n && n - k < x.len())
                    .map(|(k, hk)| hk * x[n - k])
                    .sum()
            })
            .collect()
    }

    #[test]
    fn test_unit_impulse_reproduces_ir() {
        let ir: Vec<f64> = (0..100).map(|i| 1.0 / (i as f64 + 1.0)).collect();
        let mut conv = OverlapAddConvolver::new(&ir, 64);

        let mut input = vec![0.0; 256];
        input[0] = 1.0;
        let mut output = vec![0.0; 256];
        conv.process(&input, &mut output);

        for (i, &expected) in ir.iter().enumerate() {
            assert!((output[i] - expected).abs() < 1e-9, "sample {i}");
        }
        assert!(output[100..].iter().all(|s| s.abs() < 1e-9));
    }

    #[test]
    fn test_matches_direct_convolution_across_uneven_blocks() {
        let ir: Vec<f64> = (0..37).map(|i| ((i * 7 % 11) as f64 - 5.0) / 5.0).collect();
        let input: Vec<f64> = (0..300).map(|i| ((i as f64) * 0.3).sin()).collect();
        let expected = direct_convolution(&input, &ir, input.len());

        let mut conv = OverlapAddConvolver::new(&ir, 32);
        let mut output = Vec::new();
        let mut pos = 0;
        for len in [5, 32, 17, 1, 32, 100, 113] {
            let end = (pos + len).min(input.len());
            let mut block = vec![0.0; end - pos];
            conv.process(&input[pos..end], &mut block);
            output.extend(block);
            pos = end;
        }

        assert_eq!(output.len(), expected.len());
        for (i, (a, b)) in output.iter().zip(&expected).enumerate() {
            assert!((a - b).abs() < 1e-9, "sample {i}: {a} vs {b}");
        }
    }

    #[test]
    fn test_reset_clears_tail() {
        let ir = vec![0.5; 50];
        let mut conv = OverlapAddConvolver::new(&ir, 16);
        let mut out = vec![0.0; 16];
        conv.process(&[1.0; 16], &mut out);
        conv.reset();
        conv.process(&[0.0; 16], &mut out);
        assert!(out.iter().all(|s| *s == 0.0));
    }
}
