use jsbox::{Error, EvalOpts, LimitsError};

#[test]
fn timeout_trips_on_long_running_loop() {
    let script = jsbox::parse("let i = 0; while (true) { i = i + 1; }", "spin.js").unwrap();
    let opts = EvalOpts { max_ops: u64::MAX, timeout_ms: 50, ..EvalOpts::default() };
    match script.eval(&opts).unwrap_err() {
        Error::Limits(LimitsError::Timeout) => {}
        other => panic!("expected timeout, got {other:?}"),
    }
}
