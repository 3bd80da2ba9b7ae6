use rand::Rng;

use crate::encoder::{Batch, ValueFormatter};

/// Probability that a metric update is transmitted.
///
/// Sampled lines are annotated with `|@<rate>` so the daemon can scale them back up to the true rate.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum SampleRate {
    /// Always transmitted, without annotation.
    #[default]
    Always,

    /// Transmitted with the given probability, which is strictly between zero and one.
    Ratio(f64),

    /// Never transmitted.
    Never,
}

impl SampleRate {
    /// Creates a `SampleRate` from a raw rate.
    ///
    /// Rates of one or more are treated as [`SampleRate::Always`], while zero, negative, and NaN rates are treated as
    /// [`SampleRate::Never`].
    pub fn new(rate: f64) -> Self {
        if rate >= 1.0 {
            SampleRate::Always
        } else if rate > 0.0 {
            SampleRate::Ratio(rate)
        } else {
            SampleRate::Never
        }
    }

    /// Returns the rate as a probability.
    pub fn as_f64(self) -> f64 {
        match self {
            SampleRate::Always => 1.0,
            SampleRate::Ratio(rate) => rate,
            SampleRate::Never => 0.0,
        }
    }

    /// Makes the sampling decision for a single metric.
    ///
    /// Only [`SampleRate::Ratio`] draws from `rng`, and only once per call.
    pub fn should_sample<R>(self, rng: &mut R) -> bool
    where
        R: Rng + ?Sized,
    {
        match self {
            SampleRate::Always => true,
            SampleRate::Ratio(rate) => rng.random::<f64>() <= rate,
            SampleRate::Never => false,
        }
    }
}

impl From<f64> for SampleRate {
    fn from(rate: f64) -> Self {
        SampleRate::new(rate)
    }
}

impl From<f32> for SampleRate {
    fn from(rate: f32) -> Self {
        SampleRate::new(f64::from(rate))
    }
}

/// Applies the sampling decision to every metric in `batch` independently.
///
/// Returns the surviving `(name, value)` pairs in batch order. When sampling at a ratio, each surviving value carries
/// the `|@<rate>` suffix.
pub(crate) fn sample<'a, R>(batch: &'a Batch, rate: SampleRate, rng: &mut R) -> Vec<(&'a str, String)>
where
    R: Rng + ?Sized,
{
    let mut formatter = ValueFormatter::new();
    let mut sampled = Vec::with_capacity(batch.len());

    for (name, value) in batch.iter() {
        if !rate.should_sample(rng) {
            continue;
        }

        let line_value = match rate {
            SampleRate::Ratio(ratio) => {
                let rate_str = formatter.format_rate(ratio);
                let mut buf = String::with_capacity(value.len() + 2 + rate_str.len());
                buf.push_str(value);
                buf.push_str("|@");
                buf.push_str(rate_str);
                buf
            }
            _ => value.to_string(),
        };

        sampled.push((name, line_value));
    }

    sampled
}
