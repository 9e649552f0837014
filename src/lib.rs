#![doc = include_str!("../SPEC_FULL.md")]

mod ast;
mod builtins;
mod diagnostics;
mod error;
mod heap;
mod host;
mod intern;
mod interpreter;
mod lexer;
mod object;
mod parse;
mod resource;
mod run;
mod scope;
mod source;
mod tracer;
mod value;

pub use error::{EvalError, Error, StackFrame};
pub use host::{as_long, as_str, get_value, make_dynamic_host, to_script_value, HostObjectBuilder, HostValue};
pub use interpreter::{EvalCtx, RunResult, Signal};
pub use lexer::SyntaxError;
pub use object::{DynamicPropResolver, HostHandle};
pub use resource::{LimitsError, ResourceLimits};
pub use run::{eval, parse, CancelHandle, EvalOpts, ExecutionStats, ParsedScript};
pub use tracer::{NoopTracer, RecordingTracer, TraceEvent, VmTracer};
pub use value::Value;
