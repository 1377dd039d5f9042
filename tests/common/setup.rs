use std::sync::Once;

static INIT: Once = Once::new();

/// Route `log` output through env_logger once per test binary.
/// Set `RUST_LOG=debug` to see adapter and client logging.
pub fn init_logging() {
    INIT.call_once(|| {
        let _ = env_logger::builder().is_test(true).try_init();
    });
}
