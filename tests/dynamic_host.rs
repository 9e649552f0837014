use std::cell::RefCell;
use std::rc::Rc;

use jsbox::{make_dynamic_host, DynamicPropResolver, EvalCtx, EvalOpts, RunResult, Value};

struct Env {
    first_name: RefCell<String>,
    last_name: RefCell<String>,
}

impl DynamicPropResolver for Env {
    fn get(&self, ctx: &mut EvalCtx, name: &str) -> RunResult<Option<Value>> {
        match name {
            "firstName" => Ok(Some(ctx.make_string(self.first_name.borrow().clone())?)),
            "lastName" => Ok(Some(ctx.make_string(self.last_name.borrow().clone())?)),
            "fullName" => {
                let full = format!("{} {}", self.first_name.borrow(), self.last_name.borrow());
                Ok(Some(ctx.make_string(full)?))
            }
            _ => Ok(None),
        }
    }

    fn set(&self, _ctx: &mut EvalCtx, name: &str, value: Value) -> RunResult<bool> {
        let Value::Str(s) = &value else { return Ok(false) };
        match name {
            "firstName" => {
                *self.first_name.borrow_mut() = s.to_string();
                Ok(true)
            }
            "lastName" => {
                *self.last_name.borrow_mut() = s.to_string();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn delete(&self, _ctx: &mut EvalCtx, _name: &str) -> RunResult<bool> {
        Ok(false)
    }

    fn enumerate(&self, ctx: &mut EvalCtx) -> RunResult<Vec<(String, Value)>> {
        Ok(vec![
            ("firstName".to_string(), ctx.make_string(self.first_name.borrow().clone())?),
            ("lastName".to_string(), ctx.make_string(self.last_name.borrow().clone())?),
        ])
    }
}

#[test]
fn dynamic_host_object_dispatches_through_resolver() {
    let script = jsbox::parse(
        "
        env.lastName = 'Hopper';
        let before = env.fullName;
        let keys = Object.keys(env);
        before + '|' + env.firstName + '|' + keys.join(',');
        ",
        "env.js",
    )
    .unwrap();

    let env = Rc::new(Env { first_name: RefCell::new("Grace".to_string()), last_name: RefCell::new("".to_string()) });

    let opts = EvalOpts {
        custom_definitions: Some(Box::new(move |ctx| {
            let host = make_dynamic_host(ctx, env.clone())?;
            Ok(vec![("env".to_string(), host)])
        })),
        ..EvalOpts::default()
    };

    let result = script.eval(&opts).unwrap();
    let Value::Str(s) = result else { panic!("expected string, got {result:?}") };
    assert_eq!(s.as_ref(), "Grace Hopper|Grace|firstName,lastName");
}
