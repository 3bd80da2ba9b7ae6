use std::time::{Duration, Instant};

use metrics::{counter, gauge, histogram};
use metrics_exporter_statsd::StatsdBuilder;

fn main() {
    tracing_subscriber::fmt::init();

    StatsdBuilder::default()
        .with_remote_address("localhost:9125")
        .expect("failed to parse remote address")
        .with_maximum_payload_length(1432)
        .install()
        .expect("failed to install StatsD recorder");

    counter!("idle_metric").increment(1);
    gauge!("idle_gauge").set(1.0);

    // Loop over and over, incrementing our counter every 10 seconds or so.
    let mut last_update = Instant::now();
    loop {
        let elapsed = last_update.elapsed();
        if elapsed > Duration::from_secs(10) {
            counter!("idle_metric").increment(1);
            gauge!("idle_gauge").increment(1.0);
            histogram!("idle_loop_ms").record(elapsed.as_secs_f64() * 1000.0);
            last_update = Instant::now();
        }

        std::thread::sleep(Duration::from_secs(1));
    }
}
