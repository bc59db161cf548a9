#![allow(dead_code)]

use std::sync::Once;

use campus_dues::database::MemoryStore;
use campus_dues::testing::TestContext;
use tracing_subscriber::EnvFilter;

static TRACING: Once = Once::new();

/// Route job logs to the test harness; `RUST_LOG=debug` shows per-pair detail
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
            .with_test_writer()
            .try_init();
    });
}

pub fn context() -> TestContext {
    init_tracing();
    TestContext::new()
}

pub fn context_without_transactions() -> TestContext {
    init_tracing();
    TestContext::with_store(MemoryStore::without_transactions())
}
