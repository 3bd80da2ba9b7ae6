use std::borrow::Cow;

/// Largest magnitude at which every integer is exactly representable as an `f64`.
const MAX_EXACT_INTEGER: f64 = 9_007_199_254_740_992.0;

/// StatsD metric type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MetricType {
    /// A counter, where each update is a delta.
    Counter,

    /// A timing observation, in milliseconds.
    Timing,

    /// A gauge, where the last written value wins.
    Gauge,

    /// A set, which counts unique values between flushes.
    Set,
}

impl MetricType {
    /// Returns the wire tag for this metric type.
    pub const fn as_str(self) -> &'static str {
        match self {
            MetricType::Counter => "c",
            MetricType::Timing => "ms",
            MetricType::Gauge => "g",
            MetricType::Set => "s",
        }
    }
}

/// The magnitude of a single metric update.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum MetricValue {
    /// An integral value.
    Integer(i64),

    /// A floating-point value.
    Float(f64),
}

impl MetricValue {
    /// Collapses floats holding an exactly-representable integral value into integers.
    ///
    /// This keeps `12.0` on the wire as `12`, matching how integral magnitudes are written everywhere else.
    fn normalize(self) -> Self {
        match self {
            MetricValue::Float(v) if v.is_finite() && v.fract() == 0.0 && v.abs() < MAX_EXACT_INTEGER => {
                MetricValue::Integer(v as i64)
            }
            other => other,
        }
    }

    /// Returns `true` if the value is negative.
    pub fn is_negative(self) -> bool {
        match self {
            MetricValue::Integer(v) => v < 0,
            MetricValue::Float(v) => v.is_sign_negative() && v != 0.0,
        }
    }

    /// Returns the absolute value.
    #[must_use]
    pub fn abs(self) -> Self {
        match self {
            MetricValue::Integer(v) => v
                .checked_abs()
                .map_or(MetricValue::Float((v as f64).abs()), MetricValue::Integer),
            MetricValue::Float(v) => MetricValue::Float(v.abs()),
        }
    }

    /// Returns the negated value.
    #[must_use]
    pub fn negate(self) -> Self {
        match self {
            MetricValue::Integer(v) => v
                .checked_neg()
                .map_or(MetricValue::Float(-(v as f64)), MetricValue::Integer),
            MetricValue::Float(v) => MetricValue::Float(-v),
        }
    }
}

macro_rules! impl_from_lossless_int {
    ($($ty:ty),+) => {
        $(
            impl From<$ty> for MetricValue {
                fn from(value: $ty) -> Self {
                    MetricValue::Integer(i64::from(value))
                }
            }
        )+
    };
}

impl_from_lossless_int!(i8, i16, i32, i64, u8, u16, u32);

impl From<u64> for MetricValue {
    fn from(value: u64) -> Self {
        i64::try_from(value).map_or(MetricValue::Float(value as f64), MetricValue::Integer)
    }
}

impl From<usize> for MetricValue {
    fn from(value: usize) -> Self {
        i64::try_from(value).map_or(MetricValue::Float(value as f64), MetricValue::Integer)
    }
}

impl From<f32> for MetricValue {
    fn from(value: f32) -> Self {
        MetricValue::Float(f64::from(value))
    }
}

impl From<f64> for MetricValue {
    fn from(value: f64) -> Self {
        MetricValue::Float(value)
    }
}

/// Formats metric values without allocating per value.
pub(crate) struct ValueFormatter {
    int_writer: itoa::Buffer,
    float_writer: ryu::Buffer,
}

impl ValueFormatter {
    pub fn new() -> Self {
        Self { int_writer: itoa::Buffer::new(), float_writer: ryu::Buffer::new() }
    }

    pub fn format(&mut self, value: MetricValue) -> &str {
        match value.normalize() {
            MetricValue::Integer(v) => self.int_writer.format(v),
            MetricValue::Float(v) => self.float_writer.format(v),
        }
    }

    /// Formats a sample rate for the `|@<rate>` annotation.
    pub fn format_rate(&mut self, rate: f64) -> &str {
        self.float_writer.format(rate)
    }
}

/// Encodes the prefix-free value part of a line: `<magnitude>|<type>`.
pub fn encode_value(magnitude: MetricValue, metric_type: MetricType) -> String {
    let mut formatter = ValueFormatter::new();
    let magnitude = formatter.format(magnitude);

    let tag = metric_type.as_str();
    let mut buf = String::with_capacity(magnitude.len() + 1 + tag.len());
    buf.push_str(magnitude);
    buf.push('|');
    buf.push_str(tag);
    buf
}

/// Encodes a value part with an explicit leading sign, as used by relative gauge updates.
///
/// Zero is written as `+0`.
pub(crate) fn encode_signed_value(magnitude: MetricValue, metric_type: MetricType) -> String {
    let sign = if magnitude.is_negative() { '-' } else { '+' };
    let unsigned = encode_value(magnitude.abs(), metric_type);

    let mut buf = String::with_capacity(unsigned.len() + 1);
    buf.push(sign);
    buf.push_str(&unsigned);
    buf
}

/// Encodes a full line: `<name>:<magnitude>|<type>`.
///
/// Encoding never fails: every name and value has a textual representation.
pub fn encode(name: &str, magnitude: impl Into<MetricValue>, metric_type: MetricType) -> String {
    let value = encode_value(magnitude.into(), metric_type);

    let mut buf = String::with_capacity(name.len() + 1 + value.len());
    buf.push_str(name);
    buf.push(':');
    buf.push_str(&value);
    buf
}

/// Applies a prefix to a metric name, in the format of `<prefix>.<name>`.
///
/// An absent or empty prefix leaves the name untouched.
pub fn apply_prefix<'a>(name: &'a str, prefix: Option<&str>) -> Cow<'a, str> {
    match prefix {
        Some(prefix) if !prefix.is_empty() => {
            let mut prefixed = String::with_capacity(prefix.len() + 1 + name.len());
            prefixed.push_str(prefix);
            prefixed.push('.');
            prefixed.push_str(name);
            Cow::Owned(prefixed)
        }
        _ => Cow::Borrowed(name),
    }
}

/// An ordered mapping of metric name to its encoded, prefix-free value.
///
/// Names keep the position of their first insertion. Inserting a name again replaces its value, so each name is
/// transmitted at most once per batch.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Batch {
    entries: Vec<(String, String)>,
}

impl Batch {
    /// Creates an empty `Batch`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Encodes and inserts a metric update.
    pub fn insert<N>(&mut self, name: N, magnitude: MetricValue, metric_type: MetricType)
    where
        N: Into<String>,
    {
        self.insert_encoded(name, encode_value(magnitude, metric_type));
    }

    /// Inserts an already-encoded value part (`<magnitude>|<type>`).
    pub fn insert_encoded<N>(&mut self, name: N, encoded: String)
    where
        N: Into<String>,
    {
        let name = name.into();
        match self.entries.iter_mut().find(|(existing, _)| *existing == name) {
            Some((_, value)) => *value = encoded,
            None => self.entries.push((name, encoded)),
        }
    }

    /// Returns the number of metrics in the batch.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the batch holds no metrics.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over `(name, encoded value)` pairs in insertion order.
    pub fn iter(&self) -> impl ExactSizeIterator<Item = (&str, &str)> {
        self.entries.iter().map(|(name, value)| (name.as_str(), value.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::{apply_prefix, encode, encode_signed_value, encode_value, Batch, MetricType, MetricValue};

    #[test]
    fn type_tags() {
        let cases = [
            (MetricType::Counter, "c"),
            (MetricType::Timing, "ms"),
            (MetricType::Gauge, "g"),
            (MetricType::Set, "s"),
        ];

        for (metric_type, expected) in cases {
            assert_eq!(metric_type.as_str(), expected);
        }
    }

    #[test]
    fn lines() {
        // Cases are defined as: metric name, metric value, metric type, expected output.
        let cases = [
            ("foo", MetricValue::from(5), MetricType::Counter, "foo:5|c"),
            ("bar", MetricValue::from(12.5), MetricType::Timing, "bar:12.5|ms"),
            ("x", MetricValue::from(-1), MetricType::Counter, "x:-1|c"),
            ("temp", MetricValue::from(42.0), MetricType::Gauge, "temp:42|g"),
            ("temp", MetricValue::from(-3.25), MetricType::Gauge, "temp:-3.25|g"),
            ("uniques", MetricValue::from(1234u32), MetricType::Set, "uniques:1234|s"),
            ("big", MetricValue::from(u64::MAX), MetricType::Counter, "big:1.8446744073709552e19|c"),
            ("zero", MetricValue::from(-0.0), MetricType::Gauge, "zero:0|g"),
        ];

        for (name, value, metric_type, expected) in cases {
            assert_eq!(encode(name, value, metric_type), expected);
        }
    }

    #[test]
    fn non_finite_values_still_encode() {
        assert_eq!(encode("nan", f64::NAN, MetricType::Gauge), "nan:NaN|g");
        assert_eq!(encode("inf", f64::INFINITY, MetricType::Gauge), "inf:inf|g");
    }

    #[test]
    fn signed_values() {
        assert_eq!(encode_signed_value(MetricValue::from(3.5), MetricType::Gauge), "+3.5|g");
        assert_eq!(encode_signed_value(MetricValue::from(-2), MetricType::Gauge), "-2|g");
        assert_eq!(encode_signed_value(MetricValue::from(0), MetricType::Gauge), "+0|g");
    }

    #[test]
    fn extreme_integers_negate_without_overflow() {
        assert_eq!(MetricValue::Integer(i64::MIN).abs(), MetricValue::Float(9_223_372_036_854_775_808.0));
        assert_eq!(MetricValue::Integer(i64::MIN).negate(), MetricValue::Float(9_223_372_036_854_775_808.0));
        assert_eq!(MetricValue::Integer(7).negate(), MetricValue::Integer(-7));
    }

    #[test]
    fn prefixes() {
        assert_eq!(apply_prefix("requests", Some("myapp")), "myapp.requests");
        assert_eq!(apply_prefix("requests", Some("")), "requests");
        assert_eq!(apply_prefix("requests", None), "requests");
    }

    #[test]
    fn batch_keeps_first_position_and_last_value() {
        let mut batch = Batch::new();
        batch.insert("a", MetricValue::from(1), MetricType::Counter);
        batch.insert("b", MetricValue::from(2), MetricType::Counter);
        batch.insert("a", MetricValue::from(3), MetricType::Counter);

        let entries = batch.iter().collect::<Vec<_>>();
        assert_eq!(entries, vec![("a", "3|c"), ("b", "2|c")]);
    }

    proptest! {
        #[test]
        fn integral_values_never_carry_a_decimal_point(value in any::<i32>()) {
            let encoded = encode_value(MetricValue::from(f64::from(value)), MetricType::Gauge);
            prop_assert_eq!(encoded, format!("{}|g", value));
        }

        #[test]
        fn floats_round_trip_through_the_wire(value in -1.0e12f64..1.0e12f64) {
            let encoded = encode_value(MetricValue::from(value), MetricType::Timing);
            let magnitude = encoded.strip_suffix("|ms").unwrap();
            prop_assert_eq!(magnitude.parse::<f64>().unwrap(), value);
        }
    }
}
