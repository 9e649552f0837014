use jsbox::{parse, EvalOpts, Error};

#[test]
fn uncaught_type_error_carries_exact_stack() {
    let src = "function a(foo){foo.x=1}\nfunction b(x){a(x)}\nb(null)\n";
    // line numbers: 1: function a..., 2: function b..., 3: b(null)
    let script = parse(src, "my-script.js").unwrap();
    let opts = EvalOpts::default();
    let err = script.eval(&opts).unwrap_err();
    match err {
        Error::Eval(e) => {
            assert_eq!(e.message, "Type NULL has no properties");
            let frames: Vec<String> = e.stack.iter().map(|f| f.to_string()).collect();
            assert_eq!(
                frames,
                vec![
                    "foo.x = 1 (my-script.js:1)".to_string(),
                    "a(x) (my-script.js:2)".to_string(),
                    "b(null) (my-script.js:3)".to_string(),
                ]
            );
        }
        other => panic!("expected EvalError, got {other:?}"),
    }
}
