//! Ticks once per second until interrupted with Ctrl-C, then shuts down.
//!
//! ```sh
//! RUST_LOG=debug cargo run -p kestrel --example shutdown
//! ```

use kestrel::task;
use kestrel::time::sleep;

use std::time::Duration;
use tracing_subscriber::EnvFilter;

extern "C" fn on_interrupt(_: libc::c_int) {
    kestrel::stop();
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    unsafe {
        libc::signal(
            libc::SIGINT,
            on_interrupt as extern "C" fn(libc::c_int) as libc::sighandler_t,
        );
    }

    kestrel::init();

    let ticker = task::spawn(async {
        let mut ticks = 0u64;
        while !task::cancelled() {
            sleep(Duration::from_secs(1)).await;
            ticks += 1;
            tracing::info!(ticks, "tick");
        }
        ticks
    });

    kestrel::run();

    tracing::info!(finished = ticker.is_finished(), "event loop stopped");
}
