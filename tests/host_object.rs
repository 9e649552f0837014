use jsbox::{as_long, as_str, get_value, EvalOpts, HostHandle, HostObjectBuilder, HostValue};

#[test]
fn host_object_methods_extract_typed_arguments() {
    let script = jsbox::parse(
        "
        let total = calculator.add(20, 30);
        let greeting = calculator.greet('Ada');
        let doubled = calculator.double(21.5);
        total + '|' + greeting + '|' + doubled;
        ",
        "calc.js",
    )
    .unwrap();

    let opts = EvalOpts {
        custom_definitions: Some(Box::new(|ctx| {
            let calculator = HostObjectBuilder::new()
                .method(ctx, "add", 2, |ctx, args| {
                    let a = as_long(ctx, &args[0])?;
                    let b = as_long(ctx, &args[1])?;
                    ctx.make_string((a + b).to_string())
                })?
                .method(ctx, "greet", 1, |ctx, args| {
                    let name = as_str(ctx, &args[0])?;
                    ctx.make_string(format!("hi {name}"))
                })?
                .method(ctx, "double", 1, |ctx, args| {
                    let n = get_value(ctx, &args[0])?;
                    ctx.make_string((n * 2.0).to_string())
                })?
                .build(ctx)?;
            Ok(vec![("calculator".to_string(), calculator)])
        })),
        ..EvalOpts::default()
    };

    let result = script.eval(&opts).unwrap();
    let jsbox::Value::Str(s) = result else { panic!("expected string, got {result:?}") };
    assert_eq!(s.as_ref(), "50|hi Ada|43");
}

#[test]
fn host_map_marshals_to_a_real_script_object() {
    let script = jsbox::parse("JSON.stringify(config)", "map.js").unwrap();
    let mut opts = EvalOpts::default();
    opts.custom_globals.push((
        "config".to_string(),
        HostValue::Map(vec![("host".to_string(), HostValue::Str("db".to_string())), ("port".to_string(), HostValue::Long(5432))]),
    ));
    let result = script.eval(&opts).unwrap();
    let jsbox::Value::Str(s) = result else { panic!("expected string, got {result:?}") };
    assert_eq!(s.as_ref(), r#"{"host":"db","port":5432}"#);
}

#[test]
fn host_opaque_handle_preserves_identity_across_marshalling() {
    let script = jsbox::parse("handle1 === handle2", "identity.js").unwrap();
    let handle = HostHandle::new(42i64);
    let mut opts = EvalOpts::default();
    opts.custom_globals.push(("handle1".to_string(), HostValue::Opaque(handle.clone())));
    opts.custom_globals.push(("handle2".to_string(), HostValue::Opaque(handle)));
    let result = script.eval(&opts).unwrap();
    assert!(matches!(result, jsbox::Value::Bool(true)), "expected same opaque handle to marshal to the same object, got {result:?}");
}

#[test]
fn host_opaque_handle_is_not_a_plain_enumerable_object() {
    let script = jsbox::parse("JSON.stringify(conn)", "opaque.js").unwrap();
    let mut opts = EvalOpts::default();
    opts.custom_globals.push(("conn".to_string(), HostValue::Opaque(HostHandle::new("db-connection"))));
    let result = script.eval(&opts).unwrap();
    let jsbox::Value::Str(s) = result else { panic!("expected string, got {result:?}") };
    assert_eq!(s.as_ref(), "{}");
}
