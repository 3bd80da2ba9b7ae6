use std::time::{Duration, Instant};

use metrics_exporter_statsd::StatsdBuilder;
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256StarStar;

fn main() {
    tracing_subscriber::fmt::init();

    let client = StatsdBuilder::from_env()
        .expect("failed to read StatsD environment")
        .with_remote_address("localhost:9125")
        .expect("failed to parse remote address")
        .with_prefix("example")
        .build();

    client.increment("startups");
    client.gauge("testing", 42, 1.0);

    let mut rng = Xoshiro256StarStar::from_rng(&mut rand::rng());

    // Loop over and over, pretending to do some work.
    loop {
        let started = Instant::now();
        std::thread::sleep(Duration::from_millis(rng.random_range(1..50)));

        client.increment_by(["server_loops", "server_loops.foo"], 1, 1.0);
        client.timing_duration("server_loop_delta", started.elapsed(), 0.25);
        client.set("lucky_numbers", rng.random_range(0..100), 1.0);

        if rand::random_bool(0.75) {
            client.increment("lucky_iterations");
        } else {
            client.decrement("lucky_iterations");
        }
    }
}
