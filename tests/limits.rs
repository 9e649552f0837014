use jsbox::{parse, Error, EvalOpts, LimitsError};

#[test]
fn ops_budget_trips_on_infinite_loop() {
    let script = parse("while (true) { }", "loop.js").unwrap();
    let opts = EvalOpts { max_ops: 10_000, timeout_ms: 60_000, ..EvalOpts::default() };
    match script.eval(&opts).unwrap_err() {
        Error::Limits(LimitsError::Ops) => {}
        other => panic!("expected ops limit, got {other:?}"),
    }
}

#[test]
fn memory_budget_trips_on_large_repeat() {
    let script = parse("'x'.repeat(1000000)", "mem.js").unwrap();
    let opts = EvalOpts { max_mem_bytes: 1 << 16, ..EvalOpts::default() };
    match script.eval(&opts).unwrap_err() {
        Error::Limits(LimitsError::Memory) => {}
        other => panic!("expected memory limit, got {other:?}"),
    }
}

#[test]
fn call_depth_cap_trips_on_recursion() {
    let script = parse("function f(n) { return f(n + 1); } f(0);", "recurse.js").unwrap();
    let opts = EvalOpts { max_call_depth: 10, ..EvalOpts::default() };
    match script.eval(&opts).unwrap_err() {
        Error::Limits(LimitsError::CallDepth) => {}
        other => panic!("expected call-depth limit, got {other:?}"),
    }
}

#[test]
fn repeated_eval_on_same_parsed_script_is_consistent() {
    let script = parse("let x = 1; ++x", "pp.js").unwrap();
    let opts = EvalOpts::default();
    let (r1, stats1) = script.eval_and_get_details(&opts).unwrap();
    let (r2, stats2) = script.eval_and_get_details(&opts).unwrap();
    assert!(matches!(r1, jsbox::Value::Number(n) if n == 2.0));
    assert!(matches!(r2, jsbox::Value::Number(n) if n == 2.0));
    assert_eq!(stats1.ops, stats2.ops);
    assert_eq!(stats1.mem_bytes, stats2.mem_bytes);
}

#[test]
fn custom_globals_are_bound() {
    let script = parse("X + Y", "xy.js").unwrap();
    let mut opts = EvalOpts::default();
    opts.custom_globals.push(("X".to_string(), jsbox::HostValue::Long(100)));
    opts.custom_globals.push(("Y".to_string(), jsbox::HostValue::Long(200)));
    let result = script.eval(&opts).unwrap();
    assert!(matches!(result, jsbox::Value::Number(n) if n == 300.0));
}

#[test]
fn basic_arithmetic_eval_reports_stats() {
    let (result, stats) = jsbox::parse("20 + 30", "add.js").unwrap().eval_and_get_details(&EvalOpts::default()).unwrap();
    assert!(matches!(result, jsbox::Value::Number(n) if n == 50.0));
    assert!(stats.ops > 0);
    assert!(stats.mem_bytes > 0);
}

#[test]
fn regex_literal_is_rejected() {
    let err = match jsbox::parse("/a/.test('a')", "re.js") {
        Err(e) => e,
        Ok(_) => panic!("expected a parse error"),
    };
    assert_eq!(err.message, "Regular expression literals are not supported");
}
