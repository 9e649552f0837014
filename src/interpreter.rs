//! Tree-walking evaluator (`spec.md` §4.5).
//!
//! Every statement/expression is evaluated directly against the AST — no
//! bytecode compilation step, by design (`spec.md` §1 "Non-goals": smaller
//! attack surface). Control flow propagates as explicit [`Completion`]
//! values; a script `throw` or an uncatchable [`LimitsError`] propagates as
//! `Err(Signal)` through ordinary `?`, which is still "explicit completion
//! propagation" in spirit (`spec.md` §9 "Design notes") since every call site
//! inspects it rather than relying on a host-language panic/unwind.

use std::rc::Rc;

use crate::{
    ast::{
        ArrayElement, ArrayPatternElement, ArrowBody, AssignOp, BinOp, CatchClause, DeclKind, Expr, ExprKind, ForInit,
        FunctionDef, Literal, LogicalOp, ObjectPatternProp, ObjectProp, Param, Pattern, Program, PropertyKey, Stmt,
        StmtKind, SwitchCase, UnOp, UpdateOp,
    },
    diagnostics::render_stmt,
    error::StackFrame,
    heap::{Heap, HeapId},
    intern::Interner,
    object::{BuiltinMethod, FunctionData, HostMethod, Object, ObjectClass, ScriptFunction},
    resource::{LimitsError, ResourceTracker},
    scope::{self, BindingKind, Scope, ScopeRef},
    source::CodeLoc,
    tracer::VmTracer,
    value::{number_to_string, string_to_number, to_int32, to_uint32, Value},
};

/// Fixed per-allocation overhead charged in addition to the payload size
/// (`spec.md` §4.6). Values are implementation-defined; only their
/// monotonic accumulation is load-bearing for the metering invariants.
const STRING_HEADER_BYTES: usize = 24;
const OBJECT_HEADER_BYTES: usize = 48;
const PROPERTY_SLOT_BYTES: usize = 48;
const ELEMENT_SLOT_BYTES: usize = 16;
const CLOSURE_HEADER_BYTES: usize = 64;

/// A script-level `throw` or an uncatchable resource-limit failure
/// (`spec.md` §4.8, §7).
#[derive(Debug, Clone)]
pub enum Signal {
    Throw(Value),
    Limits(LimitsError),
}

impl From<LimitsError> for Signal {
    fn from(e: LimitsError) -> Self {
        Signal::Limits(e)
    }
}

pub type RunResult<T> = Result<T, Signal>;

/// Result of evaluating a statement (`spec.md` §4.5 "Completion").
#[derive(Debug, Clone)]
pub enum Completion {
    Normal,
    Break(Option<String>),
    Continue(Option<String>),
    Return(Value),
}

struct CallFrame {
    current_text: Rc<str>,
    current_loc: CodeLoc,
}

/// Well-known built-in constructors, recorded once at global setup so `new`
/// can dispatch to native construction without reflection (`spec.md` §4.7).
#[derive(Debug, Default, Clone, Copy)]
pub struct WellKnown {
    pub object_ctor: Option<HeapId>,
    pub array_ctor: Option<HeapId>,
    pub string_ctor: Option<HeapId>,
    pub number_ctor: Option<HeapId>,
    pub boolean_ctor: Option<HeapId>,
    pub date_ctor: Option<HeapId>,
    pub error_ctor: Option<HeapId>,
    pub type_error_ctor: Option<HeapId>,
    pub range_error_ctor: Option<HeapId>,
}

/// A single script execution's runtime state (`spec.md` §3 "EvalCtx").
///
/// Created per `eval` invocation and discarded whole at the end of it; two
/// executions of the same [`Program`] share nothing beyond the AST itself.
pub struct EvalCtx {
    pub heap: Heap,
    pub global: ScopeRef,
    pub interner: Interner,
    pub filename: Rc<str>,
    pub well_known: WellKnown,
    tracker: Box<dyn ResourceTracker>,
    tracer: Box<dyn VmTracer>,
    call_stack: Vec<CallFrame>,
    last_throw_stack: Vec<StackFrame>,
}

impl EvalCtx {
    pub fn new(filename: Rc<str>, tracker: Box<dyn ResourceTracker>, tracer: Box<dyn VmTracer>) -> Self {
        let global = Scope::new_global();
        global.borrow_mut().declare(Rc::from("this"), BindingKind::Var, Value::Undefined);
        Self {
            heap: Heap::new(),
            global,
            interner: Interner::new(),
            filename: filename.clone(),
            well_known: WellKnown::default(),
            tracker,
            tracer,
            call_stack: vec![CallFrame { current_text: Rc::from(""), current_loc: CodeLoc::new(filename, 1, 1) }],
            last_throw_stack: Vec::new(),
        }
    }

    pub fn ops_count(&self) -> u64 {
        self.tracker.ops_count()
    }

    pub fn allocated_bytes(&self) -> usize {
        self.tracker.allocated_bytes()
    }

    pub fn last_throw_stack(&self) -> &[StackFrame] {
        &self.last_throw_stack
    }

    fn step(&mut self) -> RunResult<()> {
        self.tracker.on_step()?;
        Ok(())
    }

    fn charge(&mut self, bytes: usize) -> RunResult<()> {
        self.tracker.on_allocate(bytes)?;
        Ok(())
    }

    /// Allocates a script string, charging its bytes + header (`spec.md`
    /// §4.6).
    pub fn alloc_str(&mut self, s: impl Into<Rc<str>>) -> RunResult<Rc<str>> {
        let rc: Rc<str> = s.into();
        self.charge(STRING_HEADER_BYTES + rc.len())?;
        Ok(rc)
    }

    pub fn alloc_object(&mut self, obj: Object) -> RunResult<HeapId> {
        let n_props = obj.props.len();
        let n_elems = obj.elements.len();
        self.charge(OBJECT_HEADER_BYTES + n_props * PROPERTY_SLOT_BYTES + n_elems * ELEMENT_SLOT_BYTES)?;
        Ok(self.heap.allocate(obj))
    }

    /// Host-facing factory for host-interop value marshalling (`spec.md`
    /// §4.7 "the `ctx.make()` factory").
    pub fn make_object(&mut self) -> RunResult<HeapId> {
        self.alloc_object(Object::plain())
    }

    pub fn make_array(&mut self, elements: Vec<Value>) -> RunResult<HeapId> {
        self.alloc_object(Object::array(elements))
    }

    pub fn make_string(&mut self, s: impl Into<Rc<str>>) -> RunResult<Value> {
        Ok(Value::Str(self.alloc_str(s)?))
    }

    pub(crate) fn set_property(&mut self, id: HeapId, key: Rc<str>, value: Value) -> RunResult<()> {
        let is_new = !self.heap.get(id).props.contains_key(&key);
        if is_new {
            self.charge(PROPERTY_SLOT_BYTES + key.len())?;
        }
        self.heap.get_mut(id).props.insert(key, value);
        Ok(())
    }

    pub(crate) fn push_element(&mut self, id: HeapId, value: Value) -> RunResult<()> {
        self.charge(ELEMENT_SLOT_BYTES)?;
        self.heap.get_mut(id).elements.push(value);
        Ok(())
    }

    pub(crate) fn raise_str(&mut self, message: impl Into<String>) -> Signal {
        let value = match self.alloc_str(message.into()) {
            Ok(s) => Value::Str(s),
            Err(sig) => return sig,
        };
        self.raise(value)
    }

    /// Raises a script-visible throw, snapshotting the current call stack
    /// (`spec.md` §7 "EvalError... call stack captured at the throw site").
    fn raise(&mut self, value: Value) -> Signal {
        self.last_throw_stack = self
            .call_stack
            .iter()
            .rev()
            .map(|f| StackFrame { text: f.current_text.clone(), filename: self.filename.clone(), line: f.current_loc.line })
            .collect();
        Signal::Throw(value)
    }

    fn update_current(&mut self, stmt: &Stmt) {
        self.tracer.on_step(&stmt.loc, "stmt");
        if let Some(frame) = self.call_stack.last_mut() {
            frame.current_text = Rc::from(render_stmt(stmt));
            frame.current_loc = stmt.loc.clone();
        }
    }

    fn call_depth(&self) -> usize {
        self.call_stack.len() - 1
    }
}

// ---------------------------------------------------------------------
// Top-level program evaluation
// ---------------------------------------------------------------------

pub fn run_program(ctx: &mut EvalCtx, program: &Program) -> RunResult<Value> {
    let scope = ctx.global.clone();
    hoist(ctx, &program.body, &scope, true)?;
    let mut last = Value::Undefined;
    exec_stmts(ctx, &program.body, &scope, &mut last)?;
    Ok(last)
}

/// Hoists `var`/`function` declarations to the nearest function/global
/// boundary before the body executes (`spec.md` §4.4). Declares `let`/`const`
/// bindings in the temporal-dead-zone state. Does not descend into nested
/// function bodies — those hoist into their own call frame.
fn hoist(ctx: &mut EvalCtx, stmts: &[Stmt], scope: &ScopeRef, is_top: bool) -> RunResult<()> {
    for stmt in stmts {
        hoist_stmt(ctx, stmt, scope, is_top)?;
    }
    Ok(())
}

fn hoist_stmt(ctx: &mut EvalCtx, stmt: &Stmt, scope: &ScopeRef, top: bool) -> RunResult<()> {
    match &stmt.kind {
        StmtKind::VarDecl(DeclKind::Var, decls) => {
            for d in decls {
                hoist_pattern_var(&d.pattern, scope);
            }
        }
        StmtKind::VarDecl(kind, decls) if top => {
            let binding_kind = if *kind == DeclKind::Const { BindingKind::Const } else { BindingKind::Let };
            for d in decls {
                declare_pattern_tdz(&d.pattern, scope, binding_kind);
            }
        }
        StmtKind::FunctionDecl(def) => {
            if let Some(name) = &def.name {
                let func = make_function_value(ctx, def.clone(), scope, false)?;
                scope::hoist_function(scope, Rc::from(name.as_str()), func);
            }
        }
        StmtKind::Block(body) => hoist(ctx, body, scope, false)?,
        StmtKind::If { consequent, alternate, .. } => {
            hoist_stmt(ctx, consequent, scope, false)?;
            if let Some(alt) = alternate {
                hoist_stmt(ctx, alt, scope, false)?;
            }
        }
        StmtKind::For { init, body, .. } => {
            if let Some(ForInit::Decl(DeclKind::Var, decls)) = init {
                for d in decls {
                    hoist_pattern_var(&d.pattern, scope);
                }
            }
            hoist_stmt(ctx, body, scope, false)?;
        }
        StmtKind::ForIn { decl_kind: Some(DeclKind::Var), pattern, body, .. }
        | StmtKind::ForOf { decl_kind: Some(DeclKind::Var), pattern, body, .. } => {
            hoist_pattern_var(pattern, scope);
            hoist_stmt(ctx, body, scope, false)?;
        }
        StmtKind::ForIn { body, .. } | StmtKind::ForOf { body, .. } => hoist_stmt(ctx, body, scope, false)?,
        StmtKind::While { body, .. } | StmtKind::DoWhile { body, .. } => hoist_stmt(ctx, body, scope, false)?,
        StmtKind::Try { block, handler, finalizer } => {
            hoist(ctx, block, scope, false)?;
            if let Some(h) = handler {
                hoist(ctx, &h.body, scope, false)?;
            }
            if let Some(f) = finalizer {
                hoist(ctx, f, scope, false)?;
            }
        }
        StmtKind::Switch { cases, .. } => {
            for c in cases {
                hoist(ctx, &c.body, scope, false)?;
            }
        }
        StmtKind::Labeled(_, inner) => hoist_stmt(ctx, inner, scope, false)?,
        _ => {}
    }
    Ok(())
}

fn hoist_pattern_var(pattern: &Pattern, scope: &ScopeRef) {
    for name in pattern_names(pattern) {
        scope::hoist_var(scope, Rc::from(name.as_str()));
    }
}

fn declare_pattern_tdz(pattern: &Pattern, scope: &ScopeRef, kind: BindingKind) {
    for name in pattern_names(pattern) {
        scope.borrow_mut().declare_tdz(Rc::from(name.as_str()), kind);
    }
}

fn pattern_names(pattern: &Pattern) -> Vec<String> {
    let mut out = Vec::new();
    collect_pattern_names(pattern, &mut out);
    out
}

fn collect_pattern_names(pattern: &Pattern, out: &mut Vec<String>) {
    match pattern {
        Pattern::Identifier(name) => out.push(name.clone()),
        Pattern::Array(elems) => {
            for elem in elems.iter().flatten() {
                collect_pattern_names(&elem.pattern, out);
            }
        }
        Pattern::Object(props, rest) => {
            for p in props {
                collect_pattern_names(&p.pattern, out);
            }
            if let Some(r) = rest {
                out.push(r.clone());
            }
        }
    }
}

fn make_function_value(ctx: &mut EvalCtx, def: Rc<FunctionDef>, scope: &ScopeRef, is_arrow: bool) -> RunResult<Value> {
    ctx.charge(CLOSURE_HEADER_BYTES)?;
    let func = ScriptFunction { def, closure: scope.clone(), is_arrow };
    let id = ctx.alloc_object(Object::function(FunctionData::Script(func)))?;
    Ok(Value::Object(id))
}

// ---------------------------------------------------------------------
// Statements
// ---------------------------------------------------------------------

fn exec_stmts(ctx: &mut EvalCtx, stmts: &[Stmt], scope: &ScopeRef, last: &mut Value) -> RunResult<Completion> {
    for stmt in stmts {
        match exec_stmt(ctx, stmt, scope, last)? {
            Completion::Normal => {}
            other => return Ok(other),
        }
    }
    Ok(Completion::Normal)
}

fn exec_stmt(ctx: &mut EvalCtx, stmt: &Stmt, scope: &ScopeRef, last: &mut Value) -> RunResult<Completion> {
    ctx.step()?;
    ctx.update_current(stmt);
    match &stmt.kind {
        StmtKind::Program(body) | StmtKind::Block(body) => {
            let child = Scope::child(scope, false);
            hoist(ctx, body, &child, false)?;
            exec_stmts(ctx, body, &child, last)
        }
        StmtKind::Empty | StmtKind::FunctionDecl(_) => Ok(Completion::Normal),
        StmtKind::VarDecl(kind, decls) => {
            for d in decls {
                let value = match &d.init {
                    Some(e) => eval_expr(ctx, e, scope)?,
                    None => Value::Undefined,
                };
                bind_pattern(ctx, &d.pattern, value, scope, *kind)?;
            }
            Ok(Completion::Normal)
        }
        StmtKind::Expr(e) => {
            *last = eval_expr(ctx, e, scope)?;
            Ok(Completion::Normal)
        }
        StmtKind::If { test, consequent, alternate } => {
            if eval_expr(ctx, test, scope)?.to_boolean() {
                exec_stmt(ctx, consequent, scope, last)
            } else if let Some(alt) = alternate {
                exec_stmt(ctx, alt, scope, last)
            } else {
                Ok(Completion::Normal)
            }
        }
        StmtKind::While { test, body } => exec_while(ctx, test, body, scope, last, None),
        StmtKind::DoWhile { body, test } => exec_do_while(ctx, body, test, scope, last, None),
        StmtKind::For { init, test, update, body } => exec_for(ctx, init, test, update, body, scope, last, None),
        StmtKind::ForIn { decl_kind, pattern, object, body } => {
            exec_for_in(ctx, *decl_kind, pattern, object, body, scope, last, None)
        }
        StmtKind::ForOf { decl_kind, pattern, iterable, body } => {
            exec_for_of(ctx, *decl_kind, pattern, iterable, body, scope, last, None)
        }
        StmtKind::Break(label) => Ok(Completion::Break(label.clone())),
        StmtKind::Continue(label) => Ok(Completion::Continue(label.clone())),
        StmtKind::Return(value) => {
            let v = match value {
                Some(e) => eval_expr(ctx, e, scope)?,
                None => Value::Undefined,
            };
            Ok(Completion::Return(v))
        }
        StmtKind::Throw(e) => {
            let v = eval_expr(ctx, e, scope)?;
            Err(ctx.raise(v))
        }
        StmtKind::Switch { discriminant, cases } => exec_switch(ctx, discriminant, cases, scope, last),
        StmtKind::Try { block, handler, finalizer } => exec_try(ctx, block, handler.as_ref(), finalizer.as_deref(), scope, last),
        StmtKind::Labeled(label, inner) => exec_labeled(ctx, label, inner, scope, last),
    }
}

fn exec_labeled(ctx: &mut EvalCtx, label: &str, inner: &Stmt, scope: &ScopeRef, last: &mut Value) -> RunResult<Completion> {
    let completion = match &inner.kind {
        StmtKind::While { test, body } => exec_while(ctx, test, body, scope, last, Some(label))?,
        StmtKind::DoWhile { body, test } => exec_do_while(ctx, body, test, scope, last, Some(label))?,
        StmtKind::For { init, test, update, body } => exec_for(ctx, init, test, update, body, scope, last, Some(label))?,
        StmtKind::ForIn { decl_kind, pattern, object, body } => {
            exec_for_in(ctx, *decl_kind, pattern, object, body, scope, last, Some(label))?
        }
        StmtKind::ForOf { decl_kind, pattern, iterable, body } => {
            exec_for_of(ctx, *decl_kind, pattern, iterable, body, scope, last, Some(label))?
        }
        _ => exec_stmt(ctx, inner, scope, last)?,
    };
    match completion {
        Completion::Break(Some(l)) if l == label => Ok(Completion::Normal),
        other => Ok(other),
    }
}

fn loop_should_stop(completion: Completion, label: Option<&str>) -> RunResult<Option<Completion>> {
    match completion {
        Completion::Normal | Completion::Continue(None) => Ok(None),
        Completion::Continue(Some(l)) if Some(l.as_str()) == label => Ok(None),
        Completion::Break(None) => Ok(Some(Completion::Normal)),
        Completion::Break(Some(l)) if Some(l.as_str()) == label => Ok(Some(Completion::Normal)),
        other => Ok(Some(other)),
    }
}

fn exec_while(
    ctx: &mut EvalCtx,
    test: &Expr,
    body: &Stmt,
    scope: &ScopeRef,
    last: &mut Value,
    label: Option<&str>,
) -> RunResult<Completion> {
    loop {
        ctx.step()?;
        if !eval_expr(ctx, test, scope)?.to_boolean() {
            return Ok(Completion::Normal);
        }
        let completion = exec_stmt(ctx, body, scope, last)?;
        if let Some(result) = loop_should_stop(completion, label)? {
            return Ok(result);
        }
    }
}

fn exec_do_while(
    ctx: &mut EvalCtx,
    body: &Stmt,
    test: &Expr,
    scope: &ScopeRef,
    last: &mut Value,
    label: Option<&str>,
) -> RunResult<Completion> {
    loop {
        ctx.step()?;
        let completion = exec_stmt(ctx, body, scope, last)?;
        if let Some(result) = loop_should_stop(completion, label)? {
            return Ok(result);
        }
        if !eval_expr(ctx, test, scope)?.to_boolean() {
            return Ok(Completion::Normal);
        }
    }
}

fn exec_for(
    ctx: &mut EvalCtx,
    init: &Option<ForInit>,
    test: &Option<Expr>,
    update: &Option<Expr>,
    body: &Stmt,
    scope: &ScopeRef,
    last: &mut Value,
    label: Option<&str>,
) -> RunResult<Completion> {
    let loop_scope = Scope::child(scope, false);
    match init {
        Some(ForInit::Decl(kind, decls)) => {
            for d in decls {
                let value = match &d.init {
                    Some(e) => eval_expr(ctx, e, &loop_scope)?,
                    None => Value::Undefined,
                };
                bind_pattern(ctx, &d.pattern, value, &loop_scope, *kind)?;
            }
        }
        Some(ForInit::Expr(e)) => {
            eval_expr(ctx, e, &loop_scope)?;
        }
        None => {}
    }
    loop {
        ctx.step()?;
        if let Some(t) = test {
            if !eval_expr(ctx, t, &loop_scope)?.to_boolean() {
                return Ok(Completion::Normal);
            }
        }
        let completion = exec_stmt(ctx, body, &loop_scope, last)?;
        if let Some(result) = loop_should_stop(completion, label)? {
            return Ok(result);
        }
        if let Some(u) = update {
            eval_expr(ctx, u, &loop_scope)?;
        }
    }
}

fn exec_for_in(
    ctx: &mut EvalCtx,
    decl_kind: Option<DeclKind>,
    pattern: &Pattern,
    object: &Expr,
    body: &Stmt,
    scope: &ScopeRef,
    last: &mut Value,
    label: Option<&str>,
) -> RunResult<Completion> {
    let obj_value = eval_expr(ctx, object, scope)?;
    let keys = enumerate_keys(ctx, &obj_value)?;
    for key in keys {
        ctx.step()?;
        let iter_scope = Scope::child(scope, false);
        let key_value = Value::Str(ctx.alloc_str(key)?);
        bind_for_target(ctx, decl_kind, pattern, key_value, scope, &iter_scope)?;
        let completion = exec_stmt(ctx, body, &iter_scope, last)?;
        if let Some(result) = loop_should_stop(completion, label)? {
            return Ok(result);
        }
    }
    Ok(Completion::Normal)
}

fn exec_for_of(
    ctx: &mut EvalCtx,
    decl_kind: Option<DeclKind>,
    pattern: &Pattern,
    iterable: &Expr,
    body: &Stmt,
    scope: &ScopeRef,
    last: &mut Value,
    label: Option<&str>,
) -> RunResult<Completion> {
    let iterable_value = eval_expr(ctx, iterable, scope)?;
    let items = iterate_values(ctx, &iterable_value)?;
    for item in items {
        ctx.step()?;
        let iter_scope = Scope::child(scope, false);
        bind_for_target(ctx, decl_kind, pattern, item, scope, &iter_scope)?;
        let completion = exec_stmt(ctx, body, &iter_scope, last)?;
        if let Some(result) = loop_should_stop(completion, label)? {
            return Ok(result);
        }
    }
    Ok(Completion::Normal)
}

fn bind_for_target(
    ctx: &mut EvalCtx,
    decl_kind: Option<DeclKind>,
    pattern: &Pattern,
    value: Value,
    outer_scope: &ScopeRef,
    iter_scope: &ScopeRef,
) -> RunResult<()> {
    match decl_kind {
        Some(kind) => bind_pattern(ctx, pattern, value, iter_scope, kind),
        None => assign_pattern(ctx, pattern, value, outer_scope),
    }
}

pub(crate) fn enumerate_keys(ctx: &mut EvalCtx, value: &Value) -> RunResult<Vec<String>> {
    let Value::Object(id) = value else { return Ok(Vec::new()) };
    if let ObjectClass::DynamicHost(resolver) = &ctx.heap.get(*id).class {
        let resolver = resolver.clone();
        return Ok(resolver.enumerate(ctx)?.into_iter().map(|(k, _)| k).collect());
    }
    let obj = ctx.heap.get(*id);
    let mut keys: Vec<String> = (0..obj.elements.len()).map(|i| i.to_string()).collect();
    keys.extend(obj.props.keys().map(|k| k.to_string()));
    Ok(keys)
}

pub(crate) fn iterate_values(ctx: &mut EvalCtx, value: &Value) -> RunResult<Vec<Value>> {
    match value {
        Value::Str(s) => Ok(s.chars().map(|c| Value::Str(Rc::from(c.to_string().as_str()))).collect()),
        Value::Object(id) => {
            let obj = ctx.heap.get(*id);
            if obj.is_array() {
                return Ok(obj.elements.clone());
            }
            if let ObjectClass::StringBox(s) = &obj.class {
                return Ok(s.chars().map(|c| Value::Str(Rc::from(c.to_string().as_str()))).collect());
            }
            Err(ctx.raise_str("Value is not iterable"))
        }
        _ => Err(ctx.raise_str("Value is not iterable")),
    }
}

fn exec_switch(ctx: &mut EvalCtx, discriminant: &Expr, cases: &[SwitchCase], scope: &ScopeRef, last: &mut Value) -> RunResult<Completion> {
    let disc = eval_expr(ctx, discriminant, scope)?;
    let switch_scope = Scope::child(scope, false);
    for case in cases {
        hoist(ctx, &case.body, &switch_scope, false)?;
    }
    let mut matched_index = None;
    for (i, case) in cases.iter().enumerate() {
        if let Some(test) = &case.test {
            let test_value = eval_expr(ctx, test, &switch_scope)?;
            if strict_equals(ctx, &disc, &test_value) {
                matched_index = Some(i);
                break;
            }
        }
    }
    let start = match matched_index {
        Some(i) => i,
        None => match cases.iter().position(|c| c.test.is_none()) {
            Some(i) => i,
            None => return Ok(Completion::Normal),
        },
    };
    for case in &cases[start..] {
        match exec_stmts(ctx, &case.body, &switch_scope, last)? {
            Completion::Normal => {}
            Completion::Break(None) => return Ok(Completion::Normal),
            other => return Ok(other),
        }
    }
    Ok(Completion::Normal)
}

fn exec_try(
    ctx: &mut EvalCtx,
    block: &[Stmt],
    handler: Option<&CatchClause>,
    finalizer: Option<&[Stmt]>,
    scope: &ScopeRef,
    last: &mut Value,
) -> RunResult<Completion> {
    let block_scope = Scope::child(scope, false);
    hoist(ctx, block, &block_scope, false)?;
    let result = exec_stmts(ctx, block, &block_scope, last);

    let after_catch: RunResult<Completion> = match result {
        Err(Signal::Throw(value)) if handler.is_some() => {
            let h = handler.unwrap();
            let catch_scope = Scope::child(scope, false);
            if let Some(param) = &h.param {
                bind_pattern(ctx, param, value, &catch_scope, DeclKind::Let)?;
            }
            hoist(ctx, &h.body, &catch_scope, false)?;
            exec_stmts(ctx, &h.body, &catch_scope, last)
        }
        other => other,
    };

    // Limits errors skip all pending `finally` blocks (`spec.md` §7).
    if let Err(Signal::Limits(e)) = &after_catch {
        return Err(Signal::Limits(e.clone()));
    }

    match finalizer {
        None => after_catch,
        Some(fin) => {
            let fin_scope = Scope::child(scope, false);
            hoist(ctx, fin, &fin_scope, false)?;
            match exec_stmts(ctx, fin, &fin_scope, last)? {
                Completion::Normal => after_catch,
                abrupt => Ok(abrupt),
            }
        }
    }
}

// ---------------------------------------------------------------------
// Pattern binding
// ---------------------------------------------------------------------

fn bind_pattern(ctx: &mut EvalCtx, pattern: &Pattern, value: Value, scope: &ScopeRef, kind: DeclKind) -> RunResult<()> {
    let binding_kind = match kind {
        DeclKind::Var => BindingKind::Var,
        DeclKind::Let => BindingKind::Let,
        DeclKind::Const => BindingKind::Const,
    };
    bind_pattern_inner(ctx, pattern, value, scope, binding_kind)
}

fn bind_pattern_inner(ctx: &mut EvalCtx, pattern: &Pattern, value: Value, scope: &ScopeRef, kind: BindingKind) -> RunResult<()> {
    match pattern {
        Pattern::Identifier(name) => {
            if kind == BindingKind::Var {
                scope::set(scope, name, value).map_err(|_| ctx.raise_str(format!("{name} is not defined")))?;
            } else {
                scope.borrow_mut().declare(Rc::from(name.as_str()), kind, value);
            }
            Ok(())
        }
        Pattern::Array(elems) => bind_array_pattern(ctx, elems, value, scope, kind),
        Pattern::Object(props, rest) => bind_object_pattern(ctx, props, rest.as_deref(), value, scope, kind),
    }
}

fn bind_array_pattern(
    ctx: &mut EvalCtx,
    elems: &[Option<ArrayPatternElement>],
    value: Value,
    scope: &ScopeRef,
    kind: BindingKind,
) -> RunResult<()> {
    let items = iterate_values(ctx, &value)?;
    let mut idx = 0;
    for elem in elems {
        let Some(elem) = elem else {
            idx += 1;
            continue;
        };
        if elem.rest {
            let rest_items: Vec<Value> = items[idx.min(items.len())..].to_vec();
            let id = ctx.make_array(rest_items)?;
            bind_pattern_inner(ctx, &elem.pattern, Value::Object(id), scope, kind)?;
            break;
        }
        let item = items.get(idx).cloned().unwrap_or(Value::Undefined);
        let item = apply_default(ctx, item, &elem.default, scope)?;
        bind_pattern_inner(ctx, &elem.pattern, item, scope, kind)?;
        idx += 1;
    }
    Ok(())
}

fn bind_object_pattern(
    ctx: &mut EvalCtx,
    props: &[ObjectPatternProp],
    rest: Option<&str>,
    value: Value,
    scope: &ScopeRef,
    kind: BindingKind,
) -> RunResult<()> {
    let mut taken: Vec<String> = Vec::new();
    for p in props {
        let key = property_key_name(ctx, &p.key, scope)?;
        let item = get_property(ctx, &value, &key)?.unwrap_or(Value::Undefined);
        let item = apply_default(ctx, item, &p.default, scope)?;
        bind_pattern_inner(ctx, &p.pattern, item, scope, kind)?;
        taken.push(key);
    }
    if let Some(rest_name) = rest {
        let id = ctx.make_object()?;
        if let Value::Object(src) = &value {
            let src_obj = ctx.heap.get(*src);
            let remaining: Vec<(Rc<str>, Value)> =
                src_obj.props.iter().filter(|(k, _)| !taken.iter().any(|t| t.as_str() == k.as_ref())).map(|(k, v)| (k.clone(), v.clone())).collect();
            for (k, v) in remaining {
                ctx.set_property(id, k, v)?;
            }
        }
        bind_pattern_inner(ctx, &Pattern::Identifier(rest_name.to_string()), Value::Object(id), scope, kind)?;
    }
    Ok(())
}

fn apply_default(ctx: &mut EvalCtx, value: Value, default: &Option<Expr>, scope: &ScopeRef) -> RunResult<Value> {
    if value.is_nullish() {
        if let Some(d) = default {
            if matches!(value, Value::Undefined) {
                return eval_expr(ctx, d, scope);
            }
        }
    }
    Ok(value)
}

fn property_key_name(ctx: &mut EvalCtx, key: &PropertyKey, scope: &ScopeRef) -> RunResult<String> {
    match key {
        PropertyKey::Ident(name) => Ok(name.clone()),
        PropertyKey::Computed(e) => {
            let v = eval_expr(ctx, e, scope)?;
            Ok(to_property_key(ctx, &v)?.to_string())
        }
    }
}

/// Assigns to an existing target for a destructuring assignment context
/// (used by `for (x of xs)` without a declaration).
fn assign_pattern(ctx: &mut EvalCtx, pattern: &Pattern, value: Value, scope: &ScopeRef) -> RunResult<()> {
    match pattern {
        Pattern::Identifier(name) => {
            scope::set(scope, name, value).map_err(|e| scope_error_to_signal(ctx, e))?;
            Ok(())
        }
        _ => bind_pattern_inner(ctx, pattern, value, scope, BindingKind::Var),
    }
}

// ---------------------------------------------------------------------
// Expressions
// ---------------------------------------------------------------------

fn eval_expr(ctx: &mut EvalCtx, expr: &Expr, scope: &ScopeRef) -> RunResult<Value> {
    ctx.step()?;
    match &expr.kind {
        ExprKind::Literal(lit) => eval_literal(ctx, lit),
        ExprKind::Identifier(name) => scope::get(scope, name).map_err(|e| scope_error_to_signal(ctx, e)),
        ExprKind::This => Ok(scope::get(scope, "this").unwrap_or(Value::Undefined)),
        ExprKind::Array(elems) => eval_array_literal(ctx, elems, scope),
        ExprKind::Object(props) => eval_object_literal(ctx, props, scope),
        ExprKind::Template(parts) => eval_template(ctx, parts, scope),
        ExprKind::Function(def) => make_function_value(ctx, def.clone(), scope, false),
        ExprKind::Arrow { params, body } => {
            let def = Rc::new(FunctionDef { name: None, params: params.clone(), body: arrow_body_stmts(body) });
            make_function_value(ctx, def, scope, true)
        }
        ExprKind::Unary(op, e) => eval_unary(ctx, *op, e, scope),
        ExprKind::Update { op, prefix, target } => eval_update(ctx, *op, *prefix, target, scope),
        ExprKind::Binary(op, l, r) => {
            let lv = eval_expr(ctx, l, scope)?;
            let rv = eval_expr(ctx, r, scope)?;
            eval_binary(ctx, *op, lv, rv)
        }
        ExprKind::Logical(op, l, r) => eval_logical(ctx, *op, l, r, scope),
        ExprKind::Assign(op, l, r) => eval_assign(ctx, *op, l, r, scope),
        ExprKind::Conditional { test, consequent, alternate } => {
            if eval_expr(ctx, test, scope)?.to_boolean() {
                eval_expr(ctx, consequent, scope)
            } else {
                eval_expr(ctx, alternate, scope)
            }
        }
        ExprKind::Call { callee, args, optional } => eval_call(ctx, callee, args, *optional, scope),
        ExprKind::New { callee, args } => eval_new(ctx, callee, args, scope),
        ExprKind::Member { object, property, optional } => {
            let obj = eval_expr(ctx, object, scope)?;
            if *optional && obj.is_nullish() {
                return Ok(Value::Undefined);
            }
            get_property_checked(ctx, &obj, property)
        }
        ExprKind::ComputedMember { object, property, optional } => {
            let obj = eval_expr(ctx, object, scope)?;
            if *optional && obj.is_nullish() {
                return Ok(Value::Undefined);
            }
            let key_value = eval_expr(ctx, property, scope)?;
            let key = to_property_key(ctx, &key_value)?;
            get_property_checked(ctx, &obj, &key)
        }
        ExprKind::Sequence(parts) => {
            let mut result = Value::Undefined;
            for p in parts {
                result = eval_expr(ctx, p, scope)?;
            }
            Ok(result)
        }
        ExprKind::Spread(e) => eval_expr(ctx, e, scope),
    }
}

fn arrow_body_stmts(body: &ArrowBody) -> Vec<Stmt> {
    match body {
        ArrowBody::Block(stmts) => stmts.clone(),
        ArrowBody::Expr(e) => vec![Rc::new(crate::ast::Node::new(e.loc.clone(), StmtKind::Return(Some(e.clone()))))],
    }
}

fn eval_literal(ctx: &mut EvalCtx, lit: &Literal) -> RunResult<Value> {
    Ok(match lit {
        Literal::Number(n) => Value::Number(*n),
        Literal::Str(s) => Value::Str(ctx.alloc_str(s.as_str())?),
        Literal::Bool(b) => Value::Bool(*b),
        Literal::Null => Value::Null,
        Literal::Undefined => Value::Undefined,
    })
}

fn eval_array_literal(ctx: &mut EvalCtx, elems: &[Option<ArrayElement>], scope: &ScopeRef) -> RunResult<Value> {
    let mut out = Vec::with_capacity(elems.len());
    for elem in elems {
        match elem {
            None => out.push(Value::Undefined),
            Some(ArrayElement::Item(e)) => out.push(eval_expr(ctx, e, scope)?),
            Some(ArrayElement::Spread(e)) => {
                let v = eval_expr(ctx, e, scope)?;
                out.extend(iterate_values(ctx, &v)?);
            }
        }
    }
    let id = ctx.make_array(out)?;
    Ok(Value::Object(id))
}

fn eval_object_literal(ctx: &mut EvalCtx, props: &[ObjectProp], scope: &ScopeRef) -> RunResult<Value> {
    let id = ctx.make_object()?;
    for prop in props {
        match prop {
            ObjectProp::KeyValue { key, value, .. } => {
                let name = property_key_name(ctx, key, scope)?;
                let v = eval_expr(ctx, value, scope)?;
                set_indexed_or_prop(ctx, id, &name, v)?;
            }
            ObjectProp::Shorthand(name) => {
                let v = scope::get(scope, name).map_err(|e| scope_error_to_signal(ctx, e))?;
                set_indexed_or_prop(ctx, id, name, v)?;
            }
            ObjectProp::Spread(e) => {
                let v = eval_expr(ctx, e, scope)?;
                if let Value::Object(src) = v {
                    let entries: Vec<(Rc<str>, Value)> = ctx.heap.get(src).props.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
                    let elem_entries: Vec<Value> = ctx.heap.get(src).elements.clone();
                    for (i, ev) in elem_entries.into_iter().enumerate() {
                        set_indexed_or_prop(ctx, id, &i.to_string(), ev)?;
                    }
                    for (k, pv) in entries {
                        ctx.set_property(id, k, pv)?;
                    }
                }
            }
            ObjectProp::Method { key, func, .. } => {
                let name = property_key_name(ctx, key, scope)?;
                let v = make_function_value(ctx, func.clone(), scope, false)?;
                set_indexed_or_prop(ctx, id, &name, v)?;
            }
        }
    }
    Ok(Value::Object(id))
}

fn eval_template(ctx: &mut EvalCtx, parts: &[crate::ast::TemplatePart], scope: &ScopeRef) -> RunResult<Value> {
    let mut out = String::new();
    for part in parts {
        match part {
            crate::ast::TemplatePart::Str(s) => out.push_str(s),
            crate::ast::TemplatePart::Expr(e) => {
                let v = eval_expr(ctx, e, scope)?;
                out.push_str(&to_display_string(ctx, &v)?);
            }
        }
    }
    Ok(Value::Str(ctx.alloc_str(out)?))
}

fn eval_unary(ctx: &mut EvalCtx, op: UnOp, e: &Expr, scope: &ScopeRef) -> RunResult<Value> {
    if op == UnOp::Typeof {
        if let ExprKind::Identifier(name) = &e.kind {
            if !scope::has(scope, name) {
                return Ok(Value::Str(Rc::from("undefined")));
            }
        }
        let v = eval_expr(ctx, e, scope)?;
        return Ok(Value::Str(Rc::from(v.type_of(&ctx.heap))));
    }
    if op == UnOp::Delete {
        return eval_delete(ctx, e, scope);
    }
    let v = eval_expr(ctx, e, scope)?;
    Ok(match op {
        UnOp::Neg => Value::Number(-to_number(ctx, &v)?),
        UnOp::Plus => Value::Number(to_number(ctx, &v)?),
        UnOp::Not => Value::Bool(!v.to_boolean()),
        UnOp::BitNot => Value::Number(!to_int32_value(ctx, &v)? as f64),
        UnOp::Void => Value::Undefined,
        UnOp::Typeof | UnOp::Delete => unreachable!(),
    })
}

fn eval_delete(ctx: &mut EvalCtx, e: &Expr, scope: &ScopeRef) -> RunResult<Value> {
    match &e.kind {
        ExprKind::Member { object, property, .. } => {
            let obj = eval_expr(ctx, object, scope)?;
            Ok(Value::Bool(delete_property(ctx, &obj, property)?))
        }
        ExprKind::ComputedMember { object, property, .. } => {
            let obj = eval_expr(ctx, object, scope)?;
            let key_value = eval_expr(ctx, property, scope)?;
            let key = to_property_key(ctx, &key_value)?;
            Ok(Value::Bool(delete_property(ctx, &obj, &key)?))
        }
        _ => Ok(Value::Bool(true)),
    }
}

pub(crate) fn delete_property(ctx: &mut EvalCtx, obj: &Value, key: &str) -> RunResult<bool> {
    let Value::Object(id) = obj else { return Ok(true) };
    if let ObjectClass::DynamicHost(resolver) = &ctx.heap.get(*id).class {
        let resolver = resolver.clone();
        return resolver.delete(ctx, key);
    }
    if let Ok(idx) = key.parse::<usize>() {
        let elements = &mut ctx.heap.get_mut(*id).elements;
        if idx < elements.len() {
            elements[idx] = Value::Undefined;
            return Ok(true);
        }
    }
    Ok(ctx.heap.get_mut(*id).props.shift_remove(key).is_some())
}

fn eval_update(ctx: &mut EvalCtx, op: UpdateOp, prefix: bool, target: &Expr, scope: &ScopeRef) -> RunResult<Value> {
    let old = eval_expr(ctx, target, scope)?;
    let old_num = to_number(ctx, &old)?;
    let new_num = match op {
        UpdateOp::Increment => old_num + 1.0,
        UpdateOp::Decrement => old_num - 1.0,
    };
    assign_to_target(ctx, target, Value::Number(new_num), scope)?;
    Ok(Value::Number(if prefix { new_num } else { old_num }))
}

fn eval_logical(ctx: &mut EvalCtx, op: LogicalOp, l: &Expr, r: &Expr, scope: &ScopeRef) -> RunResult<Value> {
    let lv = eval_expr(ctx, l, scope)?;
    match op {
        LogicalOp::And => {
            if lv.to_boolean() {
                eval_expr(ctx, r, scope)
            } else {
                Ok(lv)
            }
        }
        LogicalOp::Or => {
            if lv.to_boolean() {
                Ok(lv)
            } else {
                eval_expr(ctx, r, scope)
            }
        }
        LogicalOp::NullishCoalesce => {
            if lv.is_nullish() {
                eval_expr(ctx, r, scope)
            } else {
                Ok(lv)
            }
        }
    }
}

fn eval_assign(ctx: &mut EvalCtx, op: AssignOp, l: &Expr, r: &Expr, scope: &ScopeRef) -> RunResult<Value> {
    if op == AssignOp::Assign {
        let v = eval_expr(ctx, r, scope)?;
        assign_to_target(ctx, l, v.clone(), scope)?;
        return Ok(v);
    }
    if matches!(op, AssignOp::And | AssignOp::Or | AssignOp::NullishCoalesce) {
        let lv = eval_expr(ctx, l, scope)?;
        let should_assign = match op {
            AssignOp::And => lv.to_boolean(),
            AssignOp::Or => !lv.to_boolean(),
            AssignOp::NullishCoalesce => lv.is_nullish(),
            _ => unreachable!(),
        };
        if !should_assign {
            return Ok(lv);
        }
        let rv = eval_expr(ctx, r, scope)?;
        assign_to_target(ctx, l, rv.clone(), scope)?;
        return Ok(rv);
    }
    let lv = eval_expr(ctx, l, scope)?;
    let rv = eval_expr(ctx, r, scope)?;
    let bin_op = compound_binop(op);
    let result = eval_binary(ctx, bin_op, lv, rv)?;
    assign_to_target(ctx, l, result.clone(), scope)?;
    Ok(result)
}

fn compound_binop(op: AssignOp) -> BinOp {
    match op {
        AssignOp::Add => BinOp::Add,
        AssignOp::Sub => BinOp::Sub,
        AssignOp::Mul => BinOp::Mul,
        AssignOp::Div => BinOp::Div,
        AssignOp::Mod => BinOp::Mod,
        AssignOp::Pow => BinOp::Pow,
        AssignOp::BitAnd => BinOp::BitAnd,
        AssignOp::BitOr => BinOp::BitOr,
        AssignOp::BitXor => BinOp::BitXor,
        AssignOp::Shl => BinOp::Shl,
        AssignOp::Shr => BinOp::Shr,
        AssignOp::UShr => BinOp::UShr,
        _ => unreachable!("logical compound ops handled separately"),
    }
}

fn assign_to_target(ctx: &mut EvalCtx, target: &Expr, value: Value, scope: &ScopeRef) -> RunResult<()> {
    match &target.kind {
        ExprKind::Identifier(name) => scope::set(scope, name, value).map_err(|e| scope_error_to_signal(ctx, e)),
        ExprKind::Member { object, property, .. } => {
            let obj = eval_expr(ctx, object, scope)?;
            set_property_checked(ctx, &obj, property, value)
        }
        ExprKind::ComputedMember { object, property, .. } => {
            let obj = eval_expr(ctx, object, scope)?;
            let key_value = eval_expr(ctx, property, scope)?;
            let key = to_property_key(ctx, &key_value)?;
            set_property_checked(ctx, &obj, &key, value)
        }
        _ => Err(ctx.raise_str("Invalid assignment target")),
    }
}

fn scope_error_to_signal(ctx: &mut EvalCtx, e: scope::ScopeError) -> Signal {
    match e {
        scope::ScopeError::TemporalDeadZone(name) => ctx.raise_str(format!("Cannot access '{name}' before initialization")),
        scope::ScopeError::NotDefined(name) => ctx.raise_str(format!("{name} is not defined")),
        scope::ScopeError::AssignToConst(name) => ctx.raise_str(format!("Assignment to constant variable '{name}'")),
    }
}

// ---------------------------------------------------------------------
// Property access
// ---------------------------------------------------------------------

pub(crate) fn set_indexed_or_prop(ctx: &mut EvalCtx, id: HeapId, key: &str, value: Value) -> RunResult<()> {
    if let Ok(idx) = key.parse::<usize>() {
        let elements = &mut ctx.heap.get_mut(id).elements;
        if idx < elements.len() {
            elements[idx] = value;
            return Ok(());
        }
    }
    let key_rc = ctx.interner_intern(key);
    ctx.set_property(id, key_rc, value)
}

impl EvalCtx {
    pub(crate) fn interner_intern(&mut self, s: &str) -> Rc<str> {
        self.interner.intern(s)
    }
}

pub(crate) fn get_property_checked(ctx: &mut EvalCtx, obj: &Value, key: &str) -> RunResult<Value> {
    if obj.is_nullish() {
        let kind = if matches!(obj, Value::Null) { "NULL" } else { "UNDEFINED" };
        return Err(ctx.raise_str(format!("Type {kind} has no properties")));
    }
    Ok(get_property(ctx, obj, key)?.unwrap_or(Value::Undefined))
}

/// Reads a property, auto-boxing primitives (`spec.md` §4.3). Returns `None`
/// only when the key genuinely does not resolve to anything (used by
/// destructuring, which treats a missing key as `undefined` explicitly).
pub fn get_property(ctx: &mut EvalCtx, obj: &Value, key: &str) -> RunResult<Option<Value>> {
    match obj {
        Value::Str(s) => Ok(Some(string_property(ctx, s.clone(), key)?)),
        Value::Object(id) => {
            if let ObjectClass::DynamicHost(resolver) = &ctx.heap.get(*id).class {
                let resolver = resolver.clone();
                return resolver.get(ctx, key);
            }
            if key == "length" {
                let obj_ref = ctx.heap.get(*id);
                if obj_ref.is_array() {
                    return Ok(Some(Value::Number(obj_ref.elements.len() as f64)));
                }
                if let ObjectClass::StringBox(s) = &obj_ref.class {
                    return Ok(Some(Value::Number(s.chars().count() as f64)));
                }
            }
            if let Ok(idx) = key.parse::<usize>() {
                let obj_ref = ctx.heap.get(*id);
                if obj_ref.is_array() {
                    return Ok(Some(obj_ref.elements.get(idx).cloned().unwrap_or(Value::Undefined)));
                }
            }
            if let Some(v) = ctx.heap.get(*id).props.get(key).cloned() {
                return Ok(Some(v));
            }
            if let ObjectClass::StringBox(s) = &ctx.heap.get(*id).class {
                let s = s.clone();
                return Ok(Some(string_property(ctx, s, key)?));
            }
            let class_builtin = {
                let obj_ref = ctx.heap.get(*id);
                crate::builtins::class_builtin_method(&obj_ref.class, key)
            };
            if let Some(func) = class_builtin {
                let method = crate::object::BuiltinMethod { name: Rc::from(key), func, bound_this: obj.clone() };
                let method_id = ctx.alloc_object(Object::function(FunctionData::Builtin(Rc::new(method))))?;
                return Ok(Some(Value::Object(method_id)));
            }
            Ok(None)
        }
        _ => {
            if let Some(func) = crate::builtins::primitive_builtin_method(obj, key) {
                let method = BuiltinMethod { name: Rc::from(key), func, bound_this: obj.clone() };
                let method_id = ctx.alloc_object(Object::function(FunctionData::Builtin(Rc::new(method))))?;
                return Ok(Some(Value::Object(method_id)));
            }
            Ok(None)
        }
    }
}

fn string_property(ctx: &mut EvalCtx, s: Rc<str>, key: &str) -> RunResult<Value> {
    if key == "length" {
        return Ok(Value::Number(s.chars().count() as f64));
    }
    if let Ok(idx) = key.parse::<usize>() {
        return Ok(match s.chars().nth(idx) {
            Some(c) => Value::Str(ctx.alloc_str(c.to_string())?),
            None => Value::Undefined,
        });
    }
    if let Some(func) = crate::builtins::string_builtin_method(key) {
        let method = BuiltinMethod { name: Rc::from(key), func, bound_this: Value::Str(s) };
        let method_id = ctx.alloc_object(Object::function(FunctionData::Builtin(Rc::new(method))))?;
        return Ok(Value::Object(method_id));
    }
    Ok(Value::Undefined)
}

pub(crate) fn set_property_checked(ctx: &mut EvalCtx, obj: &Value, key: &str, value: Value) -> RunResult<()> {
    let Value::Object(id) = obj else {
        if obj.is_nullish() {
            let kind = if matches!(obj, Value::Null) { "NULL" } else { "UNDEFINED" };
            return Err(ctx.raise_str(format!("Type {kind} has no properties")));
        }
        return Ok(()); // writes to primitives are silently dropped, as in non-strict coercion boxing
    };
    let id = *id;
    if ctx.heap.get(id).frozen {
        return Ok(());
    }
    if let ObjectClass::DynamicHost(resolver) = &ctx.heap.get(id).class {
        let resolver = resolver.clone();
        resolver.set(ctx, key, value)?;
        return Ok(());
    }
    if ctx.heap.get(id).is_array() {
        if key == "length" {
            let new_len = to_number(ctx, &value)? as usize;
            let elements = &mut ctx.heap.get_mut(id).elements;
            elements.resize(new_len, Value::Undefined);
            return Ok(());
        }
        if let Ok(idx) = key.parse::<usize>() {
            let cur_len = ctx.heap.get(id).elements.len();
            if idx >= cur_len {
                ctx.charge((idx + 1 - cur_len) * ELEMENT_SLOT_BYTES)?;
                ctx.heap.get_mut(id).elements.resize(idx + 1, Value::Undefined);
            }
            ctx.heap.get_mut(id).elements[idx] = value;
            return Ok(());
        }
    }
    let key_rc = ctx.interner_intern(key);
    ctx.set_property(id, key_rc, value)
}

pub(crate) fn to_property_key(ctx: &mut EvalCtx, value: &Value) -> RunResult<String> {
    to_display_string(ctx, value)
}

// ---------------------------------------------------------------------
// Coercions that may need to run script code (object → primitive)
// ---------------------------------------------------------------------

pub fn to_number(ctx: &mut EvalCtx, value: &Value) -> RunResult<f64> {
    match value {
        Value::Object(id) => {
            let obj = ctx.heap.get(*id);
            Ok(match &obj.class {
                ObjectClass::NumberBox(n) => *n,
                ObjectClass::BooleanBox(b) => {
                    if *b {
                        1.0
                    } else {
                        0.0
                    }
                }
                ObjectClass::StringBox(s) => string_to_number(s),
                ObjectClass::Date(millis) => *millis,
                ObjectClass::Array => {
                    let elems = obj.elements.clone();
                    match elems.len() {
                        0 => 0.0,
                        1 => to_number(ctx, &elems[0])?,
                        _ => f64::NAN,
                    }
                }
                _ => f64::NAN,
            })
        }
        other => Ok(other.to_number_primitive()),
    }
}

fn to_int32_value(ctx: &mut EvalCtx, value: &Value) -> RunResult<i32> {
    Ok(to_int32(to_number(ctx, value)?))
}

fn to_uint32_value(ctx: &mut EvalCtx, value: &Value) -> RunResult<u32> {
    Ok(to_uint32(to_number(ctx, value)?))
}

/// `ToString` for display contexts (template literals, `+`, `JSON`-adjacent
/// coercions, property-key coercion) (`spec.md` §4.3).
pub fn to_display_string(ctx: &mut EvalCtx, value: &Value) -> RunResult<String> {
    to_display_string_inner(ctx, value, &mut Vec::new())
}

fn to_display_string_inner(ctx: &mut EvalCtx, value: &Value, seen: &mut Vec<HeapId>) -> RunResult<String> {
    Ok(match value {
        Value::Undefined => "undefined".to_string(),
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => number_to_string(*n),
        Value::Str(s) => s.to_string(),
        Value::Object(id) => {
            let class_name = {
                let obj = ctx.heap.get(*id);
                match &obj.class {
                    ObjectClass::Array => None,
                    ObjectClass::StringBox(s) => return Ok(s.to_string()),
                    ObjectClass::NumberBox(n) => return Ok(number_to_string(*n)),
                    ObjectClass::BooleanBox(b) => return Ok(b.to_string()),
                    ObjectClass::Date(millis) => return Ok(crate::builtins::format_date(*millis)),
                    ObjectClass::Function(_) => return Ok("function () { [native code] }".to_string()),
                    _ => Some(()),
                }
            };
            if class_name.is_none() {
                if seen.contains(id) {
                    return Err(ctx.raise_str("Cannot convert circular structure to a string"));
                }
                seen.push(*id);
                let elems = ctx.heap.get(*id).elements.clone();
                let mut parts = Vec::with_capacity(elems.len());
                let result: RunResult<()> = (|| {
                    for e in &elems {
                        parts.push(if e.is_nullish() { String::new() } else { to_display_string_inner(ctx, e, seen)? });
                    }
                    Ok(())
                })();
                seen.pop();
                result?;
                return Ok(parts.join(","));
            }
            if let Some(to_string_fn) = ctx.heap.get(*id).props.get("toString").cloned() {
                if let Value::Object(_) = &to_string_fn {
                    let result = call_value(ctx, to_string_fn, value.clone(), Vec::new())?;
                    return to_display_string_inner(ctx, &result, seen);
                }
            }
            "[object Object]".to_string()
        }
    })
}

// ---------------------------------------------------------------------
// Equality / relational / arithmetic
// ---------------------------------------------------------------------

pub fn strict_equals(_ctx: &EvalCtx, a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::Number(x), Value::Number(y)) => x == y,
        (Value::Str(x), Value::Str(y)) => x == y,
        (Value::Object(x), Value::Object(y)) => x == y,
        _ => false,
    }
}

fn loose_equals(ctx: &mut EvalCtx, a: &Value, b: &Value) -> RunResult<bool> {
    use Value::*;
    Ok(match (a, b) {
        (Undefined | Null, Undefined | Null) => true,
        (Number(x), Number(y)) => x == y,
        (Str(x), Str(y)) => x == y,
        (Bool(x), Bool(y)) => x == y,
        (Object(x), Object(y)) => x == y,
        (Number(_), Str(_)) | (Str(_), Number(_)) => to_number(ctx, a)? == to_number(ctx, b)?,
        (Bool(_), _) => {
            let na = Value::Number(to_number(ctx, a)?);
            loose_equals(ctx, &na, b)?
        }
        (_, Bool(_)) => {
            let nb = Value::Number(to_number(ctx, b)?);
            loose_equals(ctx, a, &nb)?
        }
        (Object(_), Number(_) | Str(_)) => {
            let prim = Value::Number(to_number(ctx, a)?);
            loose_equals(ctx, &prim, b)?
        }
        (Number(_) | Str(_), Object(_)) => {
            let prim = Value::Number(to_number(ctx, b)?);
            loose_equals(ctx, a, &prim)?
        }
        _ => false,
    })
}

fn eval_binary(ctx: &mut EvalCtx, op: BinOp, l: Value, r: Value) -> RunResult<Value> {
    Ok(match op {
        BinOp::Add => eval_add(ctx, l, r)?,
        BinOp::Sub => Value::Number(to_number(ctx, &l)? - to_number(ctx, &r)?),
        BinOp::Mul => Value::Number(to_number(ctx, &l)? * to_number(ctx, &r)?),
        BinOp::Div => Value::Number(to_number(ctx, &l)? / to_number(ctx, &r)?),
        BinOp::Mod => Value::Number(to_number(ctx, &l)? % to_number(ctx, &r)?),
        BinOp::Pow => Value::Number(to_number(ctx, &l)?.powf(to_number(ctx, &r)?)),
        BinOp::Eq => Value::Bool(loose_equals(ctx, &l, &r)?),
        BinOp::NotEq => Value::Bool(!loose_equals(ctx, &l, &r)?),
        BinOp::StrictEq => Value::Bool(strict_equals(ctx, &l, &r)),
        BinOp::StrictNotEq => Value::Bool(!strict_equals(ctx, &l, &r)),
        BinOp::Lt => eval_relational(ctx, &l, &r, |o| o == std::cmp::Ordering::Less)?,
        BinOp::Gt => eval_relational(ctx, &l, &r, |o| o == std::cmp::Ordering::Greater)?,
        BinOp::LtEq => eval_relational(ctx, &l, &r, |o| o != std::cmp::Ordering::Greater)?,
        BinOp::GtEq => eval_relational(ctx, &l, &r, |o| o != std::cmp::Ordering::Less)?,
        BinOp::BitAnd => Value::Number((to_int32_value(ctx, &l)? & to_int32_value(ctx, &r)?) as f64),
        BinOp::BitOr => Value::Number((to_int32_value(ctx, &l)? | to_int32_value(ctx, &r)?) as f64),
        BinOp::BitXor => Value::Number((to_int32_value(ctx, &l)? ^ to_int32_value(ctx, &r)?) as f64),
        BinOp::Shl => Value::Number(((to_int32_value(ctx, &l)?) << (to_uint32_value(ctx, &r)? & 31)) as f64),
        BinOp::Shr => Value::Number(((to_int32_value(ctx, &l)?) >> (to_uint32_value(ctx, &r)? & 31)) as f64),
        BinOp::UShr => Value::Number(((to_uint32_value(ctx, &l)?) >> (to_uint32_value(ctx, &r)? & 31)) as f64),
        BinOp::Instanceof => Value::Bool(eval_instanceof(ctx, &l, &r)?),
        BinOp::In => Value::Bool(eval_in(ctx, &l, &r)?),
    })
}

fn eval_add(ctx: &mut EvalCtx, l: Value, r: Value) -> RunResult<Value> {
    let l_is_stringy = matches!(l, Value::Str(_)) || is_stringy_object(ctx, &l);
    let r_is_stringy = matches!(r, Value::Str(_)) || is_stringy_object(ctx, &r);
    if l_is_stringy || r_is_stringy {
        let mut s = to_display_string(ctx, &l)?;
        s.push_str(&to_display_string(ctx, &r)?);
        return Ok(Value::Str(ctx.alloc_str(s)?));
    }
    Ok(Value::Number(to_number(ctx, &l)? + to_number(ctx, &r)?))
}

fn is_stringy_object(ctx: &EvalCtx, v: &Value) -> bool {
    matches!(v, Value::Object(id) if !ctx.heap.get(*id).is_callable())
        && matches!(v, Value::Object(id) if matches!(ctx.heap.get(*id).class, ObjectClass::Plain | ObjectClass::Array | ObjectClass::StringBox(_) | ObjectClass::Host | ObjectClass::OpaqueHost(_) | ObjectClass::DynamicHost(_)))
}

fn eval_relational(ctx: &mut EvalCtx, l: &Value, r: &Value, pred: impl Fn(std::cmp::Ordering) -> bool) -> RunResult<Value> {
    if let (Value::Str(a), Value::Str(b)) = (l, r) {
        return Ok(Value::Bool(a.as_ref().partial_cmp(b.as_ref()).is_some_and(&pred)));
    }
    let a = to_number(ctx, l)?;
    let b = to_number(ctx, r)?;
    Ok(Value::Bool(a.partial_cmp(&b).is_some_and(&pred)))
}

fn eval_instanceof(ctx: &mut EvalCtx, l: &Value, r: &Value) -> RunResult<bool> {
    let Value::Object(ctor_id) = r else {
        return Err(ctx.raise_str("Right-hand side of 'instanceof' is not callable"));
    };
    if !ctx.heap.get(*ctor_id).is_callable() {
        return Err(ctx.raise_str("Right-hand side of 'instanceof' is not callable"));
    }
    let Value::Object(obj_id) = l else { return Ok(false) };
    Ok(ctx.heap.get(*obj_id).props.get("__ctor__").is_some_and(|v| matches!(v, Value::Object(id) if id == ctor_id)))
}

fn eval_in(ctx: &mut EvalCtx, l: &Value, r: &Value) -> RunResult<bool> {
    let key = to_property_key(ctx, l)?;
    let Value::Object(id) = r else {
        return Err(ctx.raise_str("Cannot use 'in' operator on a non-object"));
    };
    if let Ok(idx) = key.parse::<usize>() {
        if idx < ctx.heap.get(*id).elements.len() {
            return Ok(true);
        }
    }
    Ok(ctx.heap.get(*id).props.contains_key(key.as_str()))
}

// ---------------------------------------------------------------------
// Calls
// ---------------------------------------------------------------------

fn eval_call(ctx: &mut EvalCtx, callee: &Expr, args: &[ArrayElement], optional: bool, scope: &ScopeRef) -> RunResult<Value> {
    let (this_value, func_value) = match &callee.kind {
        ExprKind::Member { object, property, optional: member_optional } => {
            let obj = eval_expr(ctx, object, scope)?;
            if *member_optional && obj.is_nullish() {
                return Ok(Value::Undefined);
            }
            let func = get_property_checked(ctx, &obj, property)?;
            (obj, func)
        }
        ExprKind::ComputedMember { object, property, optional: member_optional } => {
            let obj = eval_expr(ctx, object, scope)?;
            if *member_optional && obj.is_nullish() {
                return Ok(Value::Undefined);
            }
            let key_value = eval_expr(ctx, property, scope)?;
            let key = to_property_key(ctx, &key_value)?;
            let func = get_property_checked(ctx, &obj, &key)?;
            (obj, func)
        }
        _ => {
            let func = eval_expr(ctx, callee, scope)?;
            (Value::Undefined, func)
        }
    };
    if optional && func_value.is_nullish() {
        return Ok(Value::Undefined);
    }
    let arg_values = eval_args(ctx, args, scope)?;
    call_value(ctx, func_value, this_value, arg_values)
}

fn eval_args(ctx: &mut EvalCtx, args: &[ArrayElement], scope: &ScopeRef) -> RunResult<Vec<Value>> {
    let mut out = Vec::with_capacity(args.len());
    for a in args {
        match a {
            ArrayElement::Item(e) => out.push(eval_expr(ctx, e, scope)?),
            ArrayElement::Spread(e) => {
                let v = eval_expr(ctx, e, scope)?;
                out.extend(iterate_values(ctx, &v)?);
            }
        }
    }
    Ok(out)
}

/// Invokes a callable value, handling script functions, embedder-registered
/// [`HostMethod`]s, and built-in prototype methods uniformly.
pub fn call_value(ctx: &mut EvalCtx, func_value: Value, this_value: Value, args: Vec<Value>) -> RunResult<Value> {
    let Value::Object(func_id) = &func_value else {
        return Err(ctx.raise_str("Value is not callable"));
    };
    let data = match &ctx.heap.get(*func_id).class {
        ObjectClass::Function(data) => data,
        _ => return Err(ctx.raise_str("Value is not callable")),
    };
    match data {
        FunctionData::Native(method) => {
            let method = method.clone();
            invoke_host_method(ctx, &method, &args)
        }
        FunctionData::Builtin(method) => {
            let method = method.clone();
            (method.func)(ctx, &method.bound_this, &args)
        }
        FunctionData::Script(func) => {
            let func = func.clone();
            invoke_script_function(ctx, &func, this_value, args)
        }
    }
}

fn invoke_host_method(ctx: &mut EvalCtx, method: &HostMethod, args: &[Value]) -> RunResult<Value> {
    if let Some(arity) = method.arity {
        if args.len() < arity {
            let mut padded = args.to_vec();
            padded.resize(arity, Value::Undefined);
            return (method.func)(ctx, &padded);
        }
    }
    (method.func)(ctx, args)
}

fn invoke_script_function(ctx: &mut EvalCtx, func: &ScriptFunction, this_value: Value, args: Vec<Value>) -> RunResult<Value> {
    ctx.tracker.on_call(ctx.call_depth())?;
    let call_loc = ctx.call_stack.last().map(|f| f.current_loc.clone()).unwrap_or_else(|| CodeLoc::new(ctx.filename.clone(), 1, 1));
    ctx.tracer.on_call(func.def.name.as_deref().unwrap_or("<anonymous>"), &call_loc);
    let call_scope = Scope::child(&func.closure, true);
    if !func.is_arrow {
        call_scope.borrow_mut().declare(Rc::from("this"), BindingKind::Var, this_value);
        let arguments_id = ctx.make_array(args.clone())?;
        call_scope.borrow_mut().declare(Rc::from("arguments"), BindingKind::Var, Value::Object(arguments_id));
    }
    bind_params(ctx, &func.def.params, &args, &call_scope)?;
    ctx.call_stack.push(CallFrame {
        current_text: Rc::from(""),
        current_loc: CodeLoc::new(ctx.filename.clone(), 1, 1),
    });
    hoist(ctx, &func.def.body, &call_scope, true)?;
    let mut last = Value::Undefined;
    let result = exec_stmts(ctx, &func.def.body, &call_scope, &mut last);
    ctx.call_stack.pop();
    match result? {
        Completion::Return(v) => Ok(v),
        _ => Ok(Value::Undefined),
    }
}

fn bind_params(ctx: &mut EvalCtx, params: &[Param], args: &[Value], scope: &ScopeRef) -> RunResult<()> {
    for (idx, param) in params.iter().enumerate() {
        if param.rest {
            let rest: Vec<Value> = args.get(idx..).unwrap_or(&[]).to_vec();
            let id = ctx.make_array(rest)?;
            bind_pattern_inner(ctx, &param.pattern, Value::Object(id), scope, BindingKind::Let)?;
            break;
        }
        let value = args.get(idx).cloned().unwrap_or(Value::Undefined);
        let value = apply_default(ctx, value, &param.default, scope)?;
        bind_pattern_inner(ctx, &param.pattern, value, scope, BindingKind::Let)?;
    }
    Ok(())
}

/// Whether a callable is a user function or one of the engine's own
/// constructors (`Array`, `String`, `Date`, ...), pulled out of the match on
/// `ctor_id`'s class before any further `ctx` borrow is needed.
enum Constructible {
    Script(ScriptFunction),
    Builtin(Rc<BuiltinMethod>),
}

fn eval_new(ctx: &mut EvalCtx, callee: &Expr, args: &[ArrayElement], scope: &ScopeRef) -> RunResult<Value> {
    let callee_value = eval_expr(ctx, callee, scope)?;
    let arg_values = eval_args(ctx, args, scope)?;
    let Value::Object(ctor_id) = &callee_value else {
        return Err(ctx.raise_str("Value is not a constructor"));
    };
    let constructible = match &ctx.heap.get(*ctor_id).class {
        ObjectClass::Function(FunctionData::Script(func)) => Constructible::Script(func.clone()),
        ObjectClass::Function(FunctionData::Builtin(method)) => Constructible::Builtin(method.clone()),
        _ => return Err(ctx.raise_str("Value is not a constructor")),
    };
    match constructible {
        Constructible::Script(func) => {
            let this_id = ctx.make_object()?;
            let ctor_key = ctx.interner_intern("__ctor__");
            ctx.set_property(this_id, ctor_key, callee_value.clone())?;
            let result = invoke_script_function(ctx, &func, Value::Object(this_id), arg_values)?;
            Ok(match result {
                Value::Object(_) => result,
                _ => Value::Object(this_id),
            })
        }
        Constructible::Builtin(method) => {
            let placeholder_id = ctx.make_object()?;
            let result = (method.func)(ctx, &Value::Object(placeholder_id), &arg_values)?;
            if let Value::Object(result_id) = &result {
                let ctor_key = ctx.interner_intern("__ctor__");
                ctx.set_property(*result_id, ctor_key, callee_value.clone())?;
            }
            Ok(result)
        }
    }
}
