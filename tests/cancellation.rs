use std::sync::atomic::Ordering;
use std::thread;
use std::time::Duration;

use jsbox::{CancelHandle, Error, EvalOpts, LimitsError};

#[test]
fn another_thread_can_cancel_a_running_eval() {
    let script = jsbox::parse("let i = 0; while (true) { i = i + 1; }", "spin.js").unwrap();
    let cancel: CancelHandle = Default::default();

    let opts = EvalOpts { max_ops: u64::MAX, timeout_ms: 60_000, cancel: Some(cancel.clone()), ..EvalOpts::default() };

    let canceller = thread::spawn(move || {
        thread::sleep(Duration::from_millis(50));
        cancel.store(true, Ordering::Relaxed);
    });

    let result = script.eval(&opts);
    canceller.join().unwrap();

    match result.unwrap_err() {
        Error::Limits(LimitsError::Timeout) => {}
        other => panic!("expected the cancel flag to surface as a limit error, got {other:?}"),
    }
}
