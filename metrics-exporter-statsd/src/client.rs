use std::{fmt, io, time::Duration};

use rand::Rng;
use tracing::{debug, trace};

use crate::{
    config::Configuration,
    encoder::{apply_prefix, encode_value, Batch, MetricType, MetricValue},
    sampler::{self, SampleRate},
    transport::{Channel as _, Transport, UdpTransport},
};

/// One or more metric names sharing a single update.
///
/// Implemented for single names (`&str`, `String`) and for ordered collections of names (slices, arrays, and vectors
/// of anything that is `AsRef<str>`).
pub trait Names {
    /// Calls `f` with each name, in order.
    fn each_name(&self, f: &mut dyn FnMut(&str));
}

impl Names for &str {
    fn each_name(&self, f: &mut dyn FnMut(&str)) {
        f(*self);
    }
}

impl Names for String {
    fn each_name(&self, f: &mut dyn FnMut(&str)) {
        f(self.as_str());
    }
}

impl Names for &String {
    fn each_name(&self, f: &mut dyn FnMut(&str)) {
        f(self.as_str());
    }
}

impl<S: AsRef<str>> Names for &[S] {
    fn each_name(&self, f: &mut dyn FnMut(&str)) {
        for name in *self {
            f(name.as_ref());
        }
    }
}

impl<S: AsRef<str>, const N: usize> Names for [S; N] {
    fn each_name(&self, f: &mut dyn FnMut(&str)) {
        self.as_slice().each_name(f);
    }
}

impl<S: AsRef<str>, const N: usize> Names for &[S; N] {
    fn each_name(&self, f: &mut dyn FnMut(&str)) {
        self.as_slice().each_name(f);
    }
}

impl<S: AsRef<str>> Names for Vec<S> {
    fn each_name(&self, f: &mut dyn FnMut(&str)) {
        self.as_slice().each_name(f);
    }
}

impl<S: AsRef<str>> Names for &Vec<S> {
    fn each_name(&self, f: &mut dyn FnMut(&str)) {
        self.as_slice().each_name(f);
    }
}

/// What happened to a batch of metrics.
///
/// None of these are errors from the caller's point of view: metrics are simply absent from the daemon when they
/// weren't sent.
#[derive(Debug)]
pub enum SendOutcome {
    /// A channel was opened and every surviving line was attempted.
    Sent {
        /// Number of datagrams written.
        written: usize,

        /// Number of datagrams that failed to write.
        failed: usize,
    },

    /// Sending is disabled, so nothing was sampled or sent.
    Disabled,

    /// No metric survived sampling, so no channel was opened.
    SampledOut,

    /// The channel to the daemon could not be opened, so nothing was sent.
    Unreachable(io::Error),
}

impl SendOutcome {
    /// Returns `true` if every surviving line was written.
    pub fn is_complete(&self) -> bool {
        matches!(self, SendOutcome::Sent { failed: 0, .. })
    }
}

/// A fire-and-forget StatsD client.
///
/// Every metric operation runs on the calling thread: the update is encoded, sampled, and written to a freshly opened
/// channel which is released before returning. Failures at any step are logged at `debug` level and otherwise
/// swallowed, so instrumentation calls never need error handling.
///
/// Clients are immutable once built. Use [`StatsdBuilder`][crate::StatsdBuilder] to create one.
pub struct StatsdClient<T = UdpTransport> {
    config: Configuration,
    transport: T,
}

impl<T> StatsdClient<T>
where
    T: Transport,
{
    pub(crate) fn new(config: Configuration, transport: T) -> Self {
        StatsdClient { config, transport }
    }

    /// Returns the configuration of this client.
    pub fn configuration(&self) -> &Configuration {
        &self.config
    }

    /// Returns a reference to the transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Increments one or more counters by one.
    pub fn increment<N: Names>(&self, names: N) {
        self.increment_by(names, 1, SampleRate::Always);
    }

    /// Increments one or more counters by `delta`, at the given sample rate.
    pub fn increment_by<N, V, R>(&self, names: N, delta: V, sample_rate: R)
    where
        N: Names,
        V: Into<MetricValue>,
        R: Into<SampleRate>,
    {
        self.update(names, delta.into(), MetricType::Counter, sample_rate.into());
    }

    /// Decrements one or more counters by one.
    pub fn decrement<N: Names>(&self, names: N) {
        self.decrement_by(names, -1, SampleRate::Always);
    }

    /// Adjusts one or more counters by `delta`, at the given sample rate.
    ///
    /// `delta` is sent exactly as given, so it should be negative to bring the counter down: `decrement_by("x", -3,
    /// 1.0)` sends `x:-3|c`, while a positive delta increments the counter.
    pub fn decrement_by<N, V, R>(&self, names: N, delta: V, sample_rate: R)
    where
        N: Names,
        V: Into<MetricValue>,
        R: Into<SampleRate>,
    {
        self.update(names, delta.into(), MetricType::Counter, sample_rate.into());
    }

    /// Records an elapsed time, in milliseconds, for one or more timers.
    pub fn timing<N, V, R>(&self, names: N, elapsed_ms: V, sample_rate: R)
    where
        N: Names,
        V: Into<MetricValue>,
        R: Into<SampleRate>,
    {
        self.update(names, elapsed_ms.into(), MetricType::Timing, sample_rate.into());
    }

    /// Records an elapsed time for one or more timers.
    ///
    /// Sub-millisecond precision is kept as a fractional number of milliseconds.
    pub fn timing_duration<N, R>(&self, names: N, elapsed: Duration, sample_rate: R)
    where
        N: Names,
        R: Into<SampleRate>,
    {
        let elapsed_ms = elapsed.as_nanos() as f64 / 1_000_000.0;
        self.update(names, MetricValue::Float(elapsed_ms), MetricType::Timing, sample_rate.into());
    }

    /// Sets one or more gauges to `value`.
    ///
    /// Most daemons treat a negative gauge value as a decrement of the current value rather than an absolute value.
    pub fn gauge<N, V, R>(&self, names: N, value: V, sample_rate: R)
    where
        N: Names,
        V: Into<MetricValue>,
        R: Into<SampleRate>,
    {
        self.update(names, value.into(), MetricType::Gauge, sample_rate.into());
    }

    /// Adds `value` to one or more sets, which count unique values between flushes.
    pub fn set<N, V, R>(&self, names: N, value: V, sample_rate: R)
    where
        N: Names,
        V: Into<MetricValue>,
        R: Into<SampleRate>,
    {
        self.update(names, value.into(), MetricType::Set, sample_rate.into());
    }

    fn update<N: Names>(&self, names: N, magnitude: MetricValue, metric_type: MetricType, sample_rate: SampleRate) {
        let encoded = encode_value(magnitude, metric_type);
        let mut batch = Batch::new();
        names.each_name(&mut |name| batch.insert_encoded(name, encoded.clone()));

        self.send(&batch, sample_rate);
    }

    /// Sends a batch of encoded metrics.
    ///
    /// The sampling decision is made independently for every metric in the batch. Surviving lines are prefixed and
    /// written as one datagram each, or packed into as few datagrams as possible when a maximum payload length is
    /// configured. The channel is released on every path out of this function.
    pub fn send<R>(&self, batch: &Batch, sample_rate: R) -> SendOutcome
    where
        R: Into<SampleRate>,
    {
        self.send_with_rng(batch, sample_rate.into(), &mut rand::rng())
    }

    pub(crate) fn send_with_rng<G>(&self, batch: &Batch, sample_rate: SampleRate, rng: &mut G) -> SendOutcome
    where
        G: Rng + ?Sized,
    {
        if !self.config.enabled {
            return SendOutcome::Disabled;
        }

        let sampled = sampler::sample(batch, sample_rate, rng);
        if sampled.is_empty() {
            trace!(metrics = batch.len(), "All metrics sampled out.");
            return SendOutcome::SampledOut;
        }

        let endpoint = &self.config.endpoint;
        let mut channel = match self.transport.open(endpoint) {
            Ok(channel) => channel,
            Err(e) => {
                debug!(error = %e, %endpoint, "Failed to open channel to StatsD daemon.");
                return SendOutcome::Unreachable(e);
            }
        };

        let prefix = self.config.prefix();
        let lines = sampled.iter().map(|(name, value)| {
            let name = apply_prefix(name, prefix);
            let mut line = String::with_capacity(name.len() + 1 + value.len());
            line.push_str(&name);
            line.push(':');
            line.push_str(value);
            line
        });

        let payloads = match self.config.max_payload_len {
            Some(max_payload_len) => pack(lines, max_payload_len),
            None => lines.collect(),
        };

        let mut written = 0;
        let mut failed = 0;
        for payload in &payloads {
            match channel.send(payload.as_bytes()) {
                Ok(_) => written += 1,
                Err(e) => {
                    debug!(error = %e, %endpoint, payload_len = payload.len(), "Failed to send payload.");
                    failed += 1;
                }
            }
        }

        if let Err(e) = channel.close() {
            debug!(error = %e, %endpoint, "Failed to close channel.");
        }

        trace!(written, failed, "Finished sending payloads.");
        SendOutcome::Sent { written, failed }
    }
}

impl<T> fmt::Debug for StatsdClient<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StatsdClient").field("config", &self.config).finish_non_exhaustive()
    }
}

/// Packs newline-delimited lines into payloads no longer than `max_payload_len`.
///
/// Lines are never split: a line that is longer than the limit by itself becomes its own payload.
fn pack<I>(lines: I, max_payload_len: usize) -> Vec<String>
where
    I: Iterator<Item = String>,
{
    let mut payloads = Vec::new();
    let mut current = String::new();

    for line in lines {
        if !current.is_empty() && current.len() + 1 + line.len() > max_payload_len {
            payloads.push(std::mem::take(&mut current));
        }

        if current.is_empty() {
            current = line;
        } else {
            current.push('\n');
            current.push_str(&line);
        }
    }

    if !current.is_empty() {
        payloads.push(current);
    }

    payloads
}
