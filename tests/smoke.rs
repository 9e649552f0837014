use jsbox::{parse, EvalOpts};

#[test]
fn end_to_end_smoke() {
    let script = parse(
        "
        let sum = 0;
        for (let i = 0; i < 10; i = i + 1) { sum = sum + i; }
        function greet(name) { return 'hi ' + name; }
        let xs = [1, 2, 3].map(x => x * 2).filter(x => x > 2);
        let obj = { a: 1, b: sum, c: greet('world') };
        JSON.stringify(obj) + '|' + xs.join(',');
        ",
        "smoke.js",
    )
    .unwrap();
    let opts = EvalOpts::default();
    let result = script.eval(&opts).unwrap();
    let jsbox::Value::Str(s) = result else { panic!("expected string, got {result:?}") };
    assert_eq!(s.as_ref(), "{\"a\":1,\"b\":45,\"c\":\"hi world\"}|4,6");
}
