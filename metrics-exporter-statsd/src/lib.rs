//! A fire-and-forget client for sending metrics to a [StatsD][statsd]-compatible daemon.
//!
//! [statsd]: https://github.com/statsd/statsd
//!
//! # Usage
//!
//! Build a client once, then record metrics from anywhere:
//!
//! ```no_run
//! # use metrics_exporter_statsd::StatsdBuilder;
//! // The builder reads `STATSD_ENABLED`, `STATSD_PREFIX`, and `STATSD_ADDR` from the environment. Anything set
//! // explicitly on the builder wins over the environment.
//! let client = StatsdBuilder::from_env()
//!     .expect("invalid StatsD environment")
//!     .with_prefix("myapp")
//!     .build();
//!
//! client.increment("requests");
//! client.increment_by(["requests.get", "requests.total"], 1, 0.1);
//! client.timing("render", 12.5, 1.0);
//! client.gauge("queue_depth", 42, 1.0);
//! client.set("uniques", 1234, 1.0);
//! ```
//!
//! For applications already instrumented with [`metrics`], the client can also be installed as the global recorder:
//!
//! ```no_run
//! # use metrics_exporter_statsd::StatsdBuilder;
//! StatsdBuilder::default().install().expect("failed to install recorder");
//!
//! metrics::counter!("requests").increment(1);
//! ```
//!
//! # Behavior
//!
//! ## Fire and forget
//!
//! Metric operations never return errors. Every call opens a channel to the daemon, writes its lines, and releases the
//! channel before returning. If sending is disabled, the daemon can't be reached, or a write fails, the metric is
//! simply dropped. Failures are logged through [`tracing`] at `debug` level for anyone who wants to look.
//!
//! Callers that want to know what happened can build a [`Batch`] and call [`StatsdClient::send`], which reports a
//! [`SendOutcome`].
//!
//! ## Sampling
//!
//! Every operation takes a sample rate. At a rate below one, each metric independently has that probability of being
//! sent, and sent lines carry a `|@<rate>` annotation so the daemon can scale counts back up. A rate of one never
//! samples and never annotates.
//!
//! ## Wire format
//!
//! ```text
//! [<prefix>.]<name>:<value>|<type>[|@<rate>]
//! ```
//!
//! where `<type>` is `c` for counters, `ms` for timings, `g` for gauges, and `s` for sets. Each metric name is sent as
//! its own datagram, unless a maximum payload length is configured with
//! [`StatsdBuilder::with_maximum_payload_length`], in which case lines are packed together, newline-delimited.

#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::module_name_repetitions)]
#![deny(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg), deny(rustdoc::broken_intra_doc_links))]

mod builder;
pub use self::builder::{BuildError, StatsdBuilder};

mod client;
pub use self::client::{Names, SendOutcome, StatsdClient};

mod config;
pub use self::config::{ConfigOverrides, Configuration, ENV_ADDR, ENV_ENABLED, ENV_PREFIX};

pub mod debugging;

mod encoder;
pub use self::encoder::{apply_prefix, encode, encode_value, Batch, MetricType, MetricValue};

mod recorder;
pub use self::recorder::StatsdRecorder;

mod sampler;
pub use self::sampler::SampleRate;

mod transport;
pub use self::transport::{Channel, Endpoint, Transport, UdpChannel, UdpTransport};
