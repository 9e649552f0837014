use jsbox::{Error, EvalOpts};

#[test]
fn json_stringify_rejects_cyclic_objects() {
    let script = jsbox::parse("let a = {}; a.self = a; JSON.stringify(a);", "cycle.js").unwrap();
    match script.eval(&EvalOpts::default()).unwrap_err() {
        Error::Eval(e) => assert!(e.message.contains("circular"), "expected a circular-structure error, got {e:?}"),
        other => panic!("expected an eval error, got {other:?}"),
    }
}

#[test]
fn json_stringify_rejects_cyclic_arrays() {
    let script = jsbox::parse("let a = []; a.push(a); JSON.stringify(a);", "cycle_arr.js").unwrap();
    match script.eval(&EvalOpts::default()).unwrap_err() {
        Error::Eval(e) => assert!(e.message.contains("circular"), "expected a circular-structure error, got {e:?}"),
        other => panic!("expected an eval error, got {other:?}"),
    }
}

#[test]
fn json_parse_stringify_roundtrips_structurally() {
    let script = jsbox::parse(
        "
        let original = { name: 'Ada', age: 36, tags: ['math', 'engine'], active: true, note: null };
        let parsed = JSON.parse(JSON.stringify(original));
        JSON.stringify(parsed) === JSON.stringify(original);
        ",
        "roundtrip.js",
    )
    .unwrap();
    let result = script.eval(&EvalOpts::default()).unwrap();
    assert!(matches!(result, jsbox::Value::Bool(true)), "expected round-trip equality, got {result:?}");
}
