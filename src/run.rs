//! Public façade (`spec.md` §6 "External interfaces").
//!
//! `parse` produces a [`ParsedScript`] once; [`ParsedScript::eval`] runs it
//! as many times as the host likes, each run against a fresh [`EvalCtx`]
//! that shares nothing with any other run beyond the immutable
//! [`crate::ast::Program`] (`spec.md` §3 "Two invocations against the same
//! parsed AST share nothing beyond the immutable AST").

use std::rc::Rc;
use std::time::Duration;

use crate::{
    ast::Program,
    error::{Error, EvalError},
    host::HostValue,
    interpreter::{run_program, EvalCtx},
    resource::{LimitedTracker, ResourceLimits},
    scope::BindingKind,
    tracer::{NoopTracer, VmTracer},
    value::Value,
};

pub use crate::lexer::SyntaxError;

/// A handle another thread can set to cancel an in-flight evaluation
/// (`spec.md` §5 "Cancellation"). Obtain one with [`CancelHandle::new`]
/// before starting the eval you want to be able to cancel.
pub type CancelHandle = std::sync::Arc<std::sync::atomic::AtomicBool>;

/// A host hook run once after globals are installed, returning additional
/// name/value bindings to declare before the script body executes.
pub type CustomDefinitions = dyn Fn(&mut EvalCtx) -> crate::interpreter::RunResult<Vec<(String, Value)>>;

/// Per-evaluation configuration (`spec.md` §6 "EvalOpts").
pub struct EvalOpts {
    pub custom_globals: Vec<(String, HostValue)>,
    pub max_ops: u64,
    pub max_mem_bytes: usize,
    pub timeout_ms: u64,
    pub max_call_depth: usize,
    pub custom_definitions: Option<Box<CustomDefinitions>>,
    /// Shared with the caller so another thread can request cancellation
    /// mid-execution; `None` builds a private flag nobody outside this
    /// invocation can observe or set.
    pub cancel: Option<CancelHandle>,
}

impl Default for EvalOpts {
    fn default() -> Self {
        let limits = ResourceLimits::default();
        Self {
            custom_globals: Vec::new(),
            max_ops: limits.max_ops,
            max_mem_bytes: limits.max_mem_bytes,
            timeout_ms: limits.timeout.as_millis() as u64,
            max_call_depth: limits.max_call_depth,
            custom_definitions: None,
            cancel: None,
        }
    }
}

impl EvalOpts {
    fn limits(&self) -> ResourceLimits {
        ResourceLimits {
            max_ops: self.max_ops,
            max_mem_bytes: self.max_mem_bytes,
            timeout: Duration::from_millis(self.timeout_ms),
            max_call_depth: self.max_call_depth,
        }
    }
}

/// Execution statistics returned alongside a result (`spec.md` §6
/// "ParsedScript.evalAndGetDetails").
#[derive(Debug, Clone, Copy, Default)]
pub struct ExecutionStats {
    pub ops: u64,
    pub mem_bytes: usize,
}

/// A script that has already been lexed and parsed; cheap to evaluate
/// repeatedly (`spec.md` §6 "parse/eval split").
pub struct ParsedScript {
    program: Program,
}

impl ParsedScript {
    pub fn eval(&self, opts: &EvalOpts) -> Result<Value, Error> {
        Ok(self.eval_and_get_details(opts)?.0)
    }

    pub fn eval_and_get_details(&self, opts: &EvalOpts) -> Result<(Value, ExecutionStats), Error> {
        let tracker = Box::new(match &opts.cancel {
            Some(cancel) => LimitedTracker::with_cancel(opts.limits(), cancel.clone()),
            None => LimitedTracker::new(opts.limits()),
        });
        let mut ctx = EvalCtx::new(self.program.filename.clone(), tracker, Box::new(NoopTracer) as Box<dyn VmTracer>);
        install_custom_globals(&mut ctx, opts)?;

        crate::builtins::install_globals(&mut ctx).map_err(|sig| to_error(&ctx, sig))?;

        if let Some(definitions) = &opts.custom_definitions {
            let defined = definitions(&mut ctx).map_err(|sig| to_error(&ctx, sig))?;
            for (name, value) in defined {
                ctx.global.borrow_mut().declare(Rc::from(name.as_str()), BindingKind::Var, value);
            }
        }

        let result = run_program(&mut ctx, &self.program).map_err(|sig| to_error(&ctx, sig))?;
        let stats = ExecutionStats { ops: ctx.ops_count(), mem_bytes: ctx.allocated_bytes() };
        Ok((result, stats))
    }
}

fn install_custom_globals(ctx: &mut EvalCtx, opts: &EvalOpts) -> Result<(), Error> {
    for (name, host_value) in &opts.custom_globals {
        let value = crate::host::to_script_value(ctx, host_value.clone()).map_err(|sig| to_error(ctx, sig))?;
        ctx.global.borrow_mut().declare(Rc::from(name.as_str()), BindingKind::Var, value);
    }
    Ok(())
}

fn to_error(ctx: &EvalCtx, signal: crate::interpreter::Signal) -> Error {
    match signal {
        crate::interpreter::Signal::Limits(e) => Error::Limits(e),
        crate::interpreter::Signal::Throw(value) => {
            let message = describe_thrown(value);
            Error::Eval(EvalError { message, stack: ctx.last_throw_stack().to_vec() })
        }
    }
}

fn describe_thrown(value: Value) -> String {
    match value {
        Value::Str(s) => s.to_string(),
        Value::Number(n) => crate::value::number_to_string(n),
        Value::Bool(b) => b.to_string(),
        Value::Null => "null".to_string(),
        Value::Undefined => "undefined".to_string(),
        Value::Object(_) => "[object Object]".to_string(),
    }
}

/// Parses `source` into a reusable [`ParsedScript`] (`spec.md` §6
/// "parse(source, [script_info]) -> ParsedScript or SyntaxError").
pub fn parse(source: &str, filename: &str) -> Result<ParsedScript, SyntaxError> {
    let program = crate::parse::parse(source, filename)?;
    Ok(ParsedScript { program })
}

/// Equivalent to `parse(source, filename).eval(opts)` (`spec.md` §6).
pub fn eval(source: &str, filename: &str, opts: &EvalOpts) -> Result<Value, Error> {
    parse(source, filename)?.eval(opts)
}
