use super::moving_average::MovingAverage;
use super::CorrectionBackend;
use crate::{CorrectionConfig, Sample};

/// Double-precision estimator.
#[derive(Debug, Clone)]
pub struct FloatBackend {
    dc_i: MovingAverage,
    dc_q: MovingAverage,
    ii: MovingAverage,
    iq: MovingAverage,
    phi: MovingAverage,
    ii2: MovingAverage,
    qq2: MovingAverage,
    amp: MovingAverage,
}

impl CorrectionBackend for FloatBackend {
    fn new(config: &CorrectionConfig) -> Self {
        let imbalance = |initial| MovingAverage::new(config.imbalance_window, initial);
        Self {
            dc_i: MovingAverage::new(config.dc_window, 0.0),
            dc_q: MovingAverage::new(config.dc_window, 0.0),
            ii: imbalance(0.0),
            iq: imbalance(0.0),
            phi: imbalance(0.0),
            ii2: imbalance(0.0),
            qq2: imbalance(0.0),
            amp: imbalance(1.0),
        }
    }

    fn reset(&mut self) {
        for avg in [
            &mut self.dc_i,
            &mut self.dc_q,
            &mut self.ii,
            &mut self.iq,
            &mut self.phi,
            &mut self.ii2,
            &mut self.qq2,
            &mut self.amp,
        ] {
            avg.reset();
        }
    }

    fn correct(&mut self, samples: &mut [Sample], imbalance: bool) {
        for sample in samples {
            let (i, q) = (f64::from(sample.re), f64::from(sample.im));
            self.dc_i.feed(i);
            self.dc_q.feed(q);
            let xi = i - self.dc_i.value();
            let xq = q - self.dc_q.value();

            if !imbalance {
                *sample = Sample::new(xi as f32, xq as f32);
                continue;
            }

            self.ii.feed(xi * xi);
            self.iq.feed(xi * xq);
            if self.ii.value() > 0.0 {
                self.phi.feed(self.iq.value() / self.ii.value());
            }

            let yi = xi;
            let yq = xq - self.phi.value() * xi;
            self.ii2.feed(yi * yi);
            self.qq2.feed(yq * yq);
            if self.qq2.value() > 0.0 {
                self.amp.feed((self.ii2.value() / self.qq2.value()).sqrt());
            }

            *sample = Sample::new(yi as f32, (self.amp.value() * yq) as f32);
        }
    }

    fn dc_offset(&self) -> Sample {
        Sample::new(self.dc_i.value() as f32, self.dc_q.value() as f32)
    }

    fn phase(&self) -> f64 {
        self.phi.value()
    }

    fn amplitude(&self) -> f64 {
        self.amp.value()
    }
}
