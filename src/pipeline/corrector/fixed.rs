use super::moving_average::FixedMovingAverage;
use super::CorrectionBackend;
use crate::{CorrectionConfig, Sample};

/// Fractional bits of the Q-format accumulators.
const FRAC_BITS: u32 = 28;
const ONE: i64 = 1 << FRAC_BITS;

fn to_fixed(x: f32) -> i64 {
    (f64::from(x) * ONE as f64).round() as i64
}

fn to_float(x: i64) -> f64 {
    x as f64 / ONE as f64
}

fn saturate(x: i128) -> i64 {
    x.clamp(i128::from(i64::MIN), i128::from(i64::MAX)) as i64
}

fn mul(a: i64, b: i64) -> i64 {
    saturate((i128::from(a) * i128::from(b)) >> FRAC_BITS)
}

fn div(a: i64, b: i64) -> i64 {
    saturate((i128::from(a) << FRAC_BITS) / i128::from(b))
}

/// Floor of the square root, by Newton iteration from above.
fn isqrt(n: u128) -> u128 {
    if n < 2 {
        return n;
    }
    let bits = 128 - n.leading_zeros();
    let mut x = 1u128 << bits.div_ceil(2);
    loop {
        let y = (x + n / x) / 2;
        if y >= x {
            return x;
        }
        x = y;
    }
}

/// Square root of a non-negative Q-format value.
fn sqrt(x: i64) -> i64 {
    let x = u128::try_from(x).unwrap_or(0);
    saturate(isqrt(x << FRAC_BITS) as i128)
}

/// Integer estimator with Q4.28 accumulators.
///
/// Products and quotients are formed in 128 bits, so samples up to a
/// magnitude of a few thousand stay exact to the last fractional bit.
#[derive(Debug, Clone)]
pub struct FixedBackend {
    dc_i: FixedMovingAverage,
    dc_q: FixedMovingAverage,
    ii: FixedMovingAverage,
    iq: FixedMovingAverage,
    phi: FixedMovingAverage,
    ii2: FixedMovingAverage,
    qq2: FixedMovingAverage,
    amp: FixedMovingAverage,
}

impl CorrectionBackend for FixedBackend {
    fn new(config: &CorrectionConfig) -> Self {
        let imbalance = |initial| FixedMovingAverage::new(config.imbalance_window, initial);
        Self {
            dc_i: FixedMovingAverage::new(config.dc_window, 0),
            dc_q: FixedMovingAverage::new(config.dc_window, 0),
            ii: imbalance(0),
            iq: imbalance(0),
            phi: imbalance(0),
            ii2: imbalance(0),
            qq2: imbalance(0),
            amp: imbalance(ONE),
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
            let (i, q) = (to_fixed(sample.re), to_fixed(sample.im));
            self.dc_i.feed(i);
            self.dc_q.feed(q);
            let xi = i - self.dc_i.value();
            let xq = q - self.dc_q.value();

            if !imbalance {
                *sample = Sample::new(to_float(xi) as f32, to_float(xq) as f32);
                continue;
            }

            self.ii.feed(mul(xi, xi));
            self.iq.feed(mul(xi, xq));
            if self.ii.value() > 0 {
                self.phi.feed(div(self.iq.value(), self.ii.value()));
            }

            let yi = xi;
            let yq = xq - mul(self.phi.value(), xi);
            self.ii2.feed(mul(yi, yi));
            self.qq2.feed(mul(yq, yq));
            if self.qq2.value() > 0 {
                self.amp.feed(sqrt(div(self.ii2.value(), self.qq2.value())));
            }

            let out_q = mul(self.amp.value(), yq);
            *sample = Sample::new(to_float(yi) as f32, to_float(out_q) as f32);
        }
    }

    fn dc_offset(&self) -> Sample {
        Sample::new(
            to_float(self.dc_i.value()) as f32,
            to_float(self.dc_q.value()) as f32,
        )
    }

    fn phase(&self) -> f64 {
        to_float(self.phi.value())
    }

    fn amplitude(&self) -> f64 {
        to_float(self.amp.value())
    }
}
