use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use metrics::{
    Counter, CounterFn, Gauge, GaugeFn, Histogram, HistogramFn, Key, KeyName, Metadata, Recorder, SharedString, Unit,
};
use metrics_util::registry::{Registry, Storage};

use crate::{
    client::StatsdClient,
    encoder::{encode_signed_value, Batch, MetricType, MetricValue},
    sampler::SampleRate,
    transport::{Transport, UdpTransport},
};

/// A recorder that forwards every update straight to a StatsD daemon.
///
/// Nothing is aggregated locally: each counter increment, gauge update, and histogram sample becomes one line, sent
/// synchronously through the underlying [`StatsdClient`]. Histogram samples are sent as timings, in whatever unit they
/// were recorded in.
///
/// Handles are registered once per key, so every lookup of the same metric shares its state.
///
/// Plain StatsD has no notion of tags, so metric labels are dropped.
pub struct StatsdRecorder<T = UdpTransport>
where
    T: Transport + 'static,
{
    client: Arc<StatsdClient<T>>,
    registry: Registry<Key, HandleStorage<T>>,
}

impl<T> StatsdRecorder<T>
where
    T: Transport + 'static,
{
    /// Creates a new `StatsdRecorder` sending through `client`.
    pub fn new(client: Arc<StatsdClient<T>>) -> Self {
        let registry = Registry::new(HandleStorage { client: Arc::clone(&client) });
        StatsdRecorder { client, registry }
    }

    /// Returns the client this recorder sends through.
    pub fn client(&self) -> &Arc<StatsdClient<T>> {
        &self.client
    }
}

impl<T> Recorder for StatsdRecorder<T>
where
    T: Transport + 'static,
{
    fn describe_counter(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}
    fn describe_gauge(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}
    fn describe_histogram(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}

    fn register_counter(&self, key: &Key, _: &Metadata<'_>) -> Counter {
        self.registry.get_or_create_counter(key, |existing| Counter::from_arc(Arc::clone(existing)))
    }

    fn register_gauge(&self, key: &Key, _: &Metadata<'_>) -> Gauge {
        self.registry.get_or_create_gauge(key, |existing| Gauge::from_arc(Arc::clone(existing)))
    }

    fn register_histogram(&self, key: &Key, _: &Metadata<'_>) -> Histogram {
        self.registry.get_or_create_histogram(key, |existing| Histogram::from_arc(Arc::clone(existing)))
    }
}

struct HandleStorage<T> {
    client: Arc<StatsdClient<T>>,
}

impl<T> HandleStorage<T> {
    fn handle(&self, key: &Key) -> Arc<Handle<T>> {
        Arc::new(Handle {
            client: Arc::clone(&self.client),
            name: key.name().to_string(),
            last_absolute: AtomicU64::new(0),
        })
    }
}

impl<T> Storage<Key> for HandleStorage<T>
where
    T: Transport + 'static,
{
    type Counter = Arc<Handle<T>>;
    type Gauge = Arc<Handle<T>>;
    type Histogram = Arc<Handle<T>>;

    fn counter(&self, key: &Key) -> Self::Counter {
        self.handle(key)
    }

    fn gauge(&self, key: &Key) -> Self::Gauge {
        self.handle(key)
    }

    fn histogram(&self, key: &Key) -> Self::Histogram {
        self.handle(key)
    }
}

struct Handle<T> {
    client: Arc<StatsdClient<T>>,
    name: String,
    last_absolute: AtomicU64,
}

impl<T> Handle<T>
where
    T: Transport,
{
    fn adjust_gauge(&self, delta: MetricValue) {
        let mut batch = Batch::new();
        batch.insert_encoded(self.name.as_str(), encode_signed_value(delta, MetricType::Gauge));
        self.client.send(&batch, SampleRate::Always);
    }
}

impl<T> CounterFn for Handle<T>
where
    T: Transport,
{
    fn increment(&self, value: u64) {
        self.client.increment_by(self.name.as_str(), value, SampleRate::Always);
    }

    fn absolute(&self, value: u64) {
        // StatsD counters only carry deltas, so send the distance travelled since the last absolute value.
        let previous = self.last_absolute.swap(value, Ordering::AcqRel);
        if value > previous {
            self.client.increment_by(self.name.as_str(), value - previous, SampleRate::Always);
        }
    }
}

impl<T> GaugeFn for Handle<T>
where
    T: Transport,
{
    fn increment(&self, value: f64) {
        self.adjust_gauge(MetricValue::Float(value));
    }

    fn decrement(&self, value: f64) {
        self.adjust_gauge(MetricValue::Float(value).negate());
    }

    fn set(&self, value: f64) {
        self.client.gauge(self.name.as_str(), value, SampleRate::Always);
    }
}

impl<T> HistogramFn for Handle<T>
where
    T: Transport,
{
    fn record(&self, value: f64) {
        self.client.timing(self.name.as_str(), value, SampleRate::Always);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use metrics::{counter, gauge, histogram};

    use super::StatsdRecorder;
    use crate::{builder::StatsdBuilder, debugging::DebuggingTransport};

    fn recorder(prefix: Option<&str>) -> (StatsdRecorder<DebuggingTransport>, DebuggingTransport) {
        let transport = DebuggingTransport::new();
        let mut builder = StatsdBuilder::default();
        if let Some(prefix) = prefix {
            builder = builder.with_prefix(prefix);
        }

        let client = builder.build_with_transport(transport.clone());
        (StatsdRecorder::new(Arc::new(client)), transport)
    }

    #[test]
    fn counters() {
        let (recorder, transport) = recorder(None);

        metrics::with_local_recorder(&recorder, || {
            let hits = counter!("hits", "route" => "/index");
            hits.increment(1);
            hits.increment(3);
        });

        assert_eq!(transport.datagrams(), vec!["hits:1|c", "hits:3|c"]);
    }

    #[test]
    fn absolute_counters_send_deltas() {
        let (recorder, transport) = recorder(None);

        metrics::with_local_recorder(&recorder, || {
            let total = counter!("bytes_total");
            total.absolute(10);
            total.absolute(10);
            total.absolute(25);
        });

        assert_eq!(transport.datagrams(), vec!["bytes_total:10|c", "bytes_total:15|c"]);
    }

    #[test]
    fn repeated_lookups_share_absolute_state() {
        let (recorder, transport) = recorder(None);

        metrics::with_local_recorder(&recorder, || {
            counter!("bytes_total").absolute(10);
            counter!("bytes_total").absolute(10);
            counter!("bytes_total").absolute(25);
        });

        assert_eq!(transport.datagrams(), vec!["bytes_total:10|c", "bytes_total:15|c"]);
    }

    #[test]
    fn labelled_keys_keep_separate_state() {
        let (recorder, transport) = recorder(None);

        metrics::with_local_recorder(&recorder, || {
            counter!("requests", "route" => "/a").absolute(5);
            counter!("requests", "route" => "/a").absolute(7);
            counter!("requests", "route" => "/b").absolute(3);
        });

        // Each labelled key keeps its own absolute state, even though labels never reach the wire.
        assert_eq!(transport.datagrams(), vec!["requests:5|c", "requests:2|c", "requests:3|c"]);
    }

    #[test]
    fn gauges() {
        let (recorder, transport) = recorder(Some("myapp"));

        metrics::with_local_recorder(&recorder, || {
            let depth = gauge!("queue_depth");
            depth.set(42.0);
            depth.increment(2.5);
            depth.decrement(1.0);
        });

        assert_eq!(
            transport.datagrams(),
            vec!["myapp.queue_depth:42|g", "myapp.queue_depth:+2.5|g", "myapp.queue_depth:-1|g"]
        );
    }

    #[test]
    fn histograms_are_timings() {
        let (recorder, transport) = recorder(None);

        metrics::with_local_recorder(&recorder, || {
            histogram!("render_ms").record(12.5);
        });

        assert_eq!(transport.datagrams(), vec!["render_ms:12.5|ms"]);
    }
}
