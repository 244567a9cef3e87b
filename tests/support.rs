//! Shared test fixtures. `init_tracing` is safe to call from every test
//! function; only the first call in a given process installs a subscriber.

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
