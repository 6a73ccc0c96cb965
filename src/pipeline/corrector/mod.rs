//! Adaptive DC offset and I/Q imbalance correction.
//!
//! Per sample, with DC removal enabled:
//!
//! ```text
//! dcI <- I                 dcQ <- Q
//! xi = I - dcI             xq = Q - dcQ
//! ```
//!
//! With imbalance correction on top:
//!
//! ```text
//! avgII <- xi*xi           avgIQ <- xi*xq
//! avgPhi <- avgIQ/avgII                      (skipped while avgII == 0)
//! yi = xi                  yq = xq - avgPhi*xi
//! avgII2 <- yi*yi          avgQQ2 <- yq*yq
//! avgAmp <- sqrt(avgII2/avgQQ2)              (skipped while avgQQ2 == 0)
//! out = (yi, avgAmp*yq)
//! ```
//!
//! `a <- x` feeds `x` into the moving average `a`. Two backends implement
//! the same estimator: [`FloatBackend`] in `f64` and [`FixedBackend`] in
//! Q4.28 integers. The `fixed-point` cargo feature makes the integer one the
//! engine's [`DefaultBackend`].

mod fixed;
mod float;
mod moving_average;

pub use fixed::FixedBackend;
pub use float::FloatBackend;

use crate::{CorrectionConfig, CorrectionSettings, Sample};

/// Backend used by engine streams.
#[cfg(not(feature = "fixed-point"))]
pub type DefaultBackend = FloatBackend;

/// Backend used by engine streams.
#[cfg(feature = "fixed-point")]
pub type DefaultBackend = FixedBackend;

/// Arithmetic behind a [`StreamCorrector`].
pub trait CorrectionBackend: Send {
    /// Creates a backend in its neutral state.
    fn new(config: &CorrectionConfig) -> Self
    where
        Self: Sized;

    /// Returns every average to its neutral state.
    fn reset(&mut self);

    /// Removes DC in place, and imbalance too when `imbalance` is set.
    fn correct(&mut self, samples: &mut [Sample], imbalance: bool);

    /// Current DC estimate.
    fn dc_offset(&self) -> Sample;

    /// Current phase (cross-correlation) estimate.
    fn phase(&self) -> f64;

    /// Current amplitude ratio estimate.
    fn amplitude(&self) -> f64;
}

/// Per-stream adaptive corrector.
///
/// # Example
///
/// ```
/// use sdr_router::{CorrectionConfig, CorrectionSettings, Sample, StreamCorrector};
///
/// let mut corrector: StreamCorrector = StreamCorrector::new(CorrectionConfig::default());
/// corrector.configure(CorrectionSettings::DC_ONLY);
///
/// let mut samples = vec![Sample::new(0.5, -0.5); 64];
/// corrector.process(&mut samples);
/// assert!(samples[63].norm() < 1e-6);
/// ```
#[derive(Debug, Clone)]
pub struct StreamCorrector<B = DefaultBackend> {
    settings: CorrectionSettings,
    backend: B,
}

impl<B: CorrectionBackend> StreamCorrector<B> {
    /// Creates a disabled corrector in its neutral state.
    pub fn new(config: CorrectionConfig) -> Self {
        Self {
            settings: CorrectionSettings::OFF,
            backend: B::new(&config),
        }
    }

    /// Current settings.
    pub fn settings(&self) -> CorrectionSettings {
        self.settings
    }

    /// Applies new settings. Changing either flag resets all estimates.
    ///
    /// Returns true if the settings changed.
    pub fn configure(&mut self, settings: CorrectionSettings) -> bool {
        if settings == self.settings {
            return false;
        }
        self.settings = settings;
        self.backend.reset();
        true
    }

    /// Returns all estimates to their neutral state.
    pub fn reset(&mut self) {
        self.backend.reset();
    }

    /// Returns true when `process` modifies samples.
    pub fn is_active(&self) -> bool {
        self.settings.dc_offset
    }

    /// Corrects `samples` in place. Does nothing while DC removal is off.
    pub fn process(&mut self, samples: &mut [Sample]) {
        if self.is_active() {
            self.backend.correct(samples, self.settings.iq_imbalance);
        }
    }

    /// Current DC estimate of each axis.
    pub fn dc_offset(&self) -> Sample {
        self.backend.dc_offset()
    }

    /// Current phase imbalance estimate.
    pub fn phase_estimate(&self) -> f64 {
        self.backend.phase()
    }

    /// Current amplitude correction factor.
    pub fn amplitude_estimate(&self) -> f64 {
        self.backend.amplitude()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::tone;

    const GAIN: f64 = 1.2;
    const PHASE: f64 = 0.1;

    /// Quarter-rate unit tone with the Q branch scaled by `GAIN` and skewed by `PHASE`.
    fn imbalanced(len: usize) -> Vec<Sample> {
        (0..len)
            .map(|n| {
                let theta = std::f64::consts::FRAC_PI_2 * n as f64;
                Sample::new(theta.cos() as f32, (GAIN * (theta + PHASE).sin()) as f32)
            })
            .collect()
    }

    fn corrector<B: CorrectionBackend>(settings: CorrectionSettings) -> StreamCorrector<B> {
        let mut corrector = StreamCorrector::<B>::new(CorrectionConfig::default());
        corrector.configure(settings);
        corrector
    }

    fn check_dc_convergence<B: CorrectionBackend>() {
        let mut c = corrector::<B>(CorrectionSettings::DC_ONLY);
        let mut samples = tone(8192, 0.25, 0.3, Sample::new(0.1, -0.05));
        c.process(&mut samples);

        let dc = c.dc_offset();
        assert!((dc.re - 0.1).abs() < 0.001, "dc I = {}", dc.re);
        assert!((dc.im + 0.05).abs() < 0.0005, "dc Q = {}", dc.im);

        let tail = &samples[samples.len() - 1024..];
        let mean = tail.iter().sum::<Sample>() / tail.len() as f32;
        assert!(mean.norm() < 0.001);
    }

    fn check_imbalance_convergence<B: CorrectionBackend>() {
        let mut c = corrector::<B>(CorrectionSettings::FULL);
        let mut samples = imbalanced(20_000);
        c.process(&mut samples);

        let expected_phase = GAIN * PHASE.sin();
        let expected_amp = 1.0 / (GAIN * PHASE.cos());
        assert!((c.phase_estimate() - expected_phase).abs() < 0.02);
        assert!((c.amplitude_estimate() - expected_amp).abs() < 0.02);

        // Corrected output is back on the unit circle.
        for sample in &samples[samples.len() - 8..] {
            assert!((sample.norm() - 1.0).abs() < 0.02, "|{sample}| != 1");
        }
    }

    #[test]
    fn test_dc_convergence_float() {
        check_dc_convergence::<FloatBackend>();
    }

    #[test]
    fn test_dc_convergence_fixed() {
        check_dc_convergence::<FixedBackend>();
    }

    #[test]
    fn test_imbalance_convergence_float() {
        check_imbalance_convergence::<FloatBackend>();
    }

    #[test]
    fn test_imbalance_convergence_fixed() {
        check_imbalance_convergence::<FixedBackend>();
    }

    #[test]
    fn test_backends_agree() {
        let mut float = corrector::<FloatBackend>(CorrectionSettings::FULL);
        let mut fixed = corrector::<FixedBackend>(CorrectionSettings::FULL);
        let input = imbalanced(4096);

        let mut a = input.clone();
        let mut b = input;
        float.process(&mut a);
        fixed.process(&mut b);

        assert!((float.phase_estimate() - fixed.phase_estimate()).abs() < 1e-3);
        assert!((float.amplitude_estimate() - fixed.amplitude_estimate()).abs() < 1e-3);
        assert!((float.dc_offset() - fixed.dc_offset()).norm() < 1e-4);
    }

    #[test]
    fn test_zero_input_stays_finite() {
        let mut c = corrector::<FloatBackend>(CorrectionSettings::FULL);
        let mut samples = vec![Sample::new(0.0, 0.0); 1000];
        c.process(&mut samples);
        assert!(samples.iter().all(|s| s.re == 0.0 && s.im == 0.0));
        assert!(c.amplitude_estimate().is_finite());
        assert!((c.amplitude_estimate() - 1.0).abs() < f64::EPSILON);
        assert!(c.phase_estimate().abs() < f64::EPSILON);

        let mut f = corrector::<FixedBackend>(CorrectionSettings::FULL);
        let mut samples = vec![Sample::new(0.0, 0.0); 1000];
        f.process(&mut samples);
        assert!(samples.iter().all(|s| s.re == 0.0 && s.im == 0.0));
    }

    #[test]
    fn test_disabled_is_pass_through() {
        let mut c = corrector::<FloatBackend>(CorrectionSettings::OFF);
        let input = tone(64, 0.1, 1.0, Sample::new(0.3, 0.3));
        let mut samples = input.clone();
        c.process(&mut samples);
        assert_eq!(samples, input);
        assert!(!c.is_active());
    }

    #[test]
    fn test_imbalance_without_dc_has_no_effect() {
        let mut c = corrector::<FloatBackend>(CorrectionSettings {
            dc_offset: false,
            iq_imbalance: true,
        });
        let input = imbalanced(64);
        let mut samples = input.clone();
        c.process(&mut samples);
        assert_eq!(samples, input);
    }

    #[test]
    fn test_configure_resets_estimates() {
        let mut c = corrector::<FloatBackend>(CorrectionSettings::DC_ONLY);
        let mut samples = vec![Sample::new(0.4, 0.2); 256];
        c.process(&mut samples);
        assert!(c.dc_offset().re > 0.3);

        assert!(!c.configure(CorrectionSettings::DC_ONLY));
        assert!(c.dc_offset().re > 0.3);

        assert!(c.configure(CorrectionSettings::FULL));
        assert_eq!(c.dc_offset(), Sample::new(0.0, 0.0));
        assert!((c.amplitude_estimate() - 1.0).abs() < f64::EPSILON);
    }
}
