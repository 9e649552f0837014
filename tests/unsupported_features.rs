use jsbox::{Error, EvalOpts};

#[test]
fn string_match_is_rejected_as_unsupported() {
    let script = jsbox::parse("'x'.match('x');", "match.js").unwrap();
    match script.eval(&EvalOpts::default()).unwrap_err() {
        Error::Eval(e) => assert_eq!(e.message, "String.prototype.match is not supported"),
        other => panic!("expected an eval error, got {other:?}"),
    }
}

#[test]
fn string_coercion_rejects_cyclic_arrays() {
    let script = jsbox::parse("let a = []; a.push(a); String(a);", "cycle_str.js").unwrap();
    match script.eval(&EvalOpts::default()).unwrap_err() {
        Error::Eval(e) => assert!(e.message.contains("circular"), "expected a circular-structure error, got {e:?}"),
        other => panic!("expected an eval error, got {other:?}"),
    }
}

#[test]
fn string_concat_rejects_cyclic_arrays() {
    let script = jsbox::parse("let a = []; a.push(a); a + '';", "cycle_concat.js").unwrap();
    match script.eval(&EvalOpts::default()).unwrap_err() {
        Error::Eval(e) => assert!(e.message.contains("circular"), "expected a circular-structure error, got {e:?}"),
        other => panic!("expected an eval error, got {other:?}"),
    }
}
