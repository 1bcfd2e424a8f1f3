//! Tree-walking evaluator.
//!
//! Statements produce a [`Completion`]; abrupt exits that cross function
//! boundaries (throw, resource halts, suspended awaits) travel as
//! [`Abort`] through `Result`. Free identifiers that no scope binds are
//! resolved against the namespace handed in by the embedder and nothing
//! else.
//!
//! Async functions run synchronously up to their first unsettled `await`,
//! which drives the job queue and the virtual timer clock until the awaited
//! promise settles.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use indexmap::IndexMap;
use tracing::{debug, warn};

use super::ast::*;
use super::builtins::{self, promise, regexp, Realm};
use super::error::{Abort, Flow, ScriptError};
use super::lower;
use super::scope::{self, AssignOutcome, Frame, FrameRef, ScopeRef};
use super::value::*;
use super::ExecutionLimits;
use crate::console::{self, Severity};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    Error,
    Type,
    Range,
    Syntax,
    Reference,
}

enum Completion {
    Normal,
    Return(Value),
    Break,
    Continue,
}

#[derive(Clone, Copy)]
enum BindMode {
    Declare(VarKind),
    Assign,
}

enum Reference {
    Binding(Rc<str>),
    Property(Value, Rc<str>),
}

struct Timer {
    id: u32,
    due: f64,
    seq: u64,
    callback: Value,
    args: Vec<Value>,
    repeat: Option<f64>,
}

/// A timer still pending when the run ended past the horizon.
#[derive(Clone, Debug, PartialEq)]
pub struct DiscardedTimer {
    pub id: u32,
    /// Virtual milliseconds since the run started.
    pub due_ms: f64,
    pub repeating: bool,
}

type UncaughtFormat = Box<dyn Fn(&str) -> String>;

pub struct Interpreter {
    pub realm: Realm,
    global: ScopeRef,
    namespace: IndexMap<Rc<str>, Value>,
    limits: ExecutionLimits,
    steps: u64,
    depth: usize,
    jobs: VecDeque<promise::Job>,
    timers: Vec<Timer>,
    next_timer_id: u32,
    timer_seq: u64,
    /// Virtual milliseconds elapsed since the run started.
    clock: f64,
    /// Wall-clock epoch (ms) at start; `Date.now()` is `epoch + clock`.
    epoch: f64,
    rejections: Vec<ObjRef>,
    discarded: Vec<DiscardedTimer>,
    uncaught_format: UncaughtFormat,
}

impl Interpreter {
    pub fn new(limits: ExecutionLimits) -> Self {
        let mut interp = Self {
            realm: Realm::new(),
            global: scope::root(),
            namespace: IndexMap::new(),
            limits,
            steps: 0,
            depth: 0,
            jobs: VecDeque::new(),
            timers: Vec::new(),
            next_timer_id: 1,
            timer_seq: 0,
            clock: 0.0,
            epoch: chrono::Utc::now().timestamp_millis() as f64,
            rejections: Vec::new(),
            discarded: Vec::new(),
            uncaught_format: Box::new(|m: &str| m.to_string()),
        };
        builtins::init_prototypes(&mut interp);
        interp
    }

    /// Makes `value` resolvable as the free identifier `name`.
    pub fn expose(&mut self, name: &str, value: Value) {
        self.namespace.insert(name.into(), value);
    }

    pub fn exposed(&self) -> impl Iterator<Item = &str> {
        self.namespace.keys().map(|k| &**k)
    }

    /// Rewrites the error lines emitted for exceptions thrown from timers
    /// and for unhandled rejections.
    pub fn format_uncaught(&mut self, f: impl Fn(&str) -> String + 'static) {
        self.uncaught_format = Box::new(f);
    }

    /// Timers dropped by the last run because they fell past the horizon.
    pub fn discarded_timers(&self) -> &[DiscardedTimer] {
        &self.discarded
    }

    fn emit_uncaught(&self, message: String) {
        console::emit(Severity::Error, (self.uncaught_format)(&message));
    }

    pub fn now(&self) -> f64 {
        self.epoch + self.clock
    }

    /// Parses and runs `src`, then drains queued jobs and due timers.
    pub fn run(&mut self, src: &str) -> Result<(), ScriptError> {
        let program = lower::parse(src)?;
        debug!(statements = program.len(), "program parsed");

        let global = self.global.clone();
        let outcome = self.exec_program(&program, &global).and_then(|_| self.drain());
        debug!(steps = self.steps, clock_ms = self.clock, "program finished");
        match outcome {
            Ok(()) | Err(Abort::Suspend) => {
                self.report_rejections();
                Ok(())
            }
            Err(Abort::Throw(v)) => Err(ScriptError::Uncaught(self.describe_thrown(&v))),
            Err(Abort::Halt(message)) => Err(ScriptError::Halted(message)),
        }
    }

    // ─── Limits ───────────────────────────────────────────────────────────

    pub(crate) fn tick(&mut self) -> Flow<()> {
        self.steps += 1;
        if self.steps > self.limits.max_steps {
            return Err(Abort::Halt("Execution step budget exhausted".to_string()));
        }
        Ok(())
    }

    fn enter(&mut self) -> Flow<()> {
        if self.depth >= self.limits.max_call_depth {
            return Err(self.throw(ErrorKind::Range, "Maximum call stack size exceeded"));
        }
        self.depth += 1;
        Ok(())
    }

    fn leave(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    // ─── Job queue & timers ───────────────────────────────────────────────

    pub(crate) fn enqueue_job(&mut self, job: promise::Job) {
        self.jobs.push_back(job);
    }

    pub(crate) fn track_rejection(&mut self, promise: &ObjRef) {
        self.rejections.push(promise.clone());
    }

    pub(crate) fn add_timer(&mut self, callback: Value, delay: f64, args: Vec<Value>, repeat: bool) -> u32 {
        let delay = if delay.is_finite() && delay > 0.0 { delay } else { 0.0 };
        let id = self.next_timer_id;
        self.next_timer_id += 1;
        self.timer_seq += 1;
        self.timers.push(Timer {
            id,
            due: self.clock + delay,
            seq: self.timer_seq,
            callback,
            args,
            repeat: repeat.then(|| delay.max(1.0)),
        });
        id
    }

    pub(crate) fn clear_timer(&mut self, id: u32) {
        self.timers.retain(|t| t.id != id);
    }

    /// Runs one microtask, or failing that the earliest timer inside the
    /// horizon. Returns `false` when there is nothing left to run.
    pub(crate) fn run_one_task(&mut self) -> Flow<bool> {
        if let Some(job) = self.jobs.pop_front() {
            promise::run_job(self, job)?;
            return Ok(true);
        }

        let next = self
            .timers
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| a.due.total_cmp(&b.due).then(a.seq.cmp(&b.seq)))
            .map(|(i, _)| i);
        let Some(index) = next else {
            return Ok(false);
        };
        if self.timers[index].due > self.limits.timer_horizon_ms as f64 {
            return Ok(false);
        }

        let timer = self.timers.remove(index);
        self.clock = self.clock.max(timer.due);
        if let Some(interval) = timer.repeat {
            self.timer_seq += 1;
            self.timers.push(Timer {
                id: timer.id,
                due: self.clock + interval,
                seq: self.timer_seq,
                callback: timer.callback.clone(),
                args: timer.args.clone(),
                repeat: timer.repeat,
            });
        }

        match self.call_function(&timer.callback, Value::Undefined, &timer.args) {
            Ok(_) | Err(Abort::Suspend) => {}
            Err(Abort::Throw(v)) => {
                let message = self.describe_thrown(&v);
                self.emit_uncaught(format!("Uncaught {}", message));
            }
            Err(halt) => return Err(halt),
        }
        Ok(true)
    }

    fn drain(&mut self) -> Flow<()> {
        while self.run_one_task()? {}
        if !self.timers.is_empty() {
            warn!(
                discarded = self.timers.len(),
                horizon_ms = self.limits.timer_horizon_ms,
                "timers beyond the horizon were discarded"
            );
            let mut timers = std::mem::take(&mut self.timers);
            timers.sort_by(|a, b| a.due.total_cmp(&b.due).then(a.seq.cmp(&b.seq)));
            self.discarded = timers
                .into_iter()
                .map(|t| DiscardedTimer {
                    id: t.id,
                    due_ms: t.due,
                    repeating: t.repeat.is_some(),
                })
                .collect();
        }
        Ok(())
    }

    fn report_rejections(&mut self) {
        let rejected = std::mem::take(&mut self.rejections);
        for p in rejected {
            let reason = match &p.borrow().kind {
                ObjectKind::Promise(PromiseCell {
                    state: PromiseState::Rejected(reason),
                    handled: false,
                }) => Some(reason.clone()),
                _ => None,
            };
            if let Some(reason) = reason {
                let message = self.describe_thrown(&reason);
                self.emit_uncaught(format!("Uncaught (in promise) {}", message));
            }
        }
    }

    // ─── Errors ───────────────────────────────────────────────────────────

    pub fn new_error(&mut self, kind: ErrorKind, message: &str) -> Value {
        let proto = self.realm.error_proto_for(kind);
        let obj = new_object(ObjectKind::Error, Some(proto));
        {
            let mut o = obj.borrow_mut();
            o.define_hidden("message", Value::str(message));
            o.define_hidden("stack", Value::Str(format!("{}: {}\n    at <anonymous>", kind.name(), message).into()));
        }
        obj.into()
    }

    /// Builds a thrown error of the given kind.
    pub fn throw(&mut self, kind: ErrorKind, message: impl AsRef<str>) -> Abort {
        Abort::Throw(self.new_error(kind, message.as_ref()))
    }

    pub fn type_error(&mut self, message: impl AsRef<str>) -> Abort {
        self.throw(ErrorKind::Type, message)
    }

    /// Checks a requested array length: a non-negative integer below 2^32
    /// that also fits `max_array_length`.
    pub fn array_length(&mut self, n: f64) -> Flow<usize> {
        if n < 0.0 || n.fract() != 0.0 || n > u32::MAX as f64 || n.is_nan() {
            return Err(self.throw(ErrorKind::Range, "Invalid array length"));
        }
        let len = n as usize;
        if len > self.limits.max_array_length {
            let max = self.limits.max_array_length;
            return Err(self.throw(
                ErrorKind::Range,
                format!("Invalid array length: {} exceeds the sandbox limit of {}", len, max),
            ));
        }
        Ok(len)
    }

    /// Fails when a string of `bytes` would exceed `max_string_bytes`.
    pub fn string_room(&mut self, bytes: f64) -> Flow<()> {
        if bytes > self.limits.max_string_bytes as f64 {
            return Err(self.throw(ErrorKind::Range, "Invalid string length"));
        }
        Ok(())
    }

    /// `Name: message` for error objects, the string form of anything else.
    pub fn describe_thrown(&mut self, v: &Value) -> String {
        if let Value::Object(o) = v {
            if matches!(o.borrow().kind, ObjectKind::Error) {
                let name = lookup(o, "name").map(|n| self.display_lossy(&n)).unwrap_or_else(|| "Error".into());
                let message = lookup(o, "message").map(|m| self.display_lossy(&m)).unwrap_or_default();
                return if message.is_empty() {
                    name
                } else {
                    format!("{}: {}", name, message)
                };
            }
        }
        self.display_lossy(v)
    }

    /// `to_string` that never fails.
    pub fn display_lossy(&mut self, v: &Value) -> String {
        match self.to_string(v) {
            Ok(s) => s.to_string(),
            Err(_) => format!("[object {}]", v.as_object().map_or("Object", |o| o.borrow().class_name())),
        }
    }

    // ─── Statements ───────────────────────────────────────────────────────

    fn exec_program(&mut self, program: &[Stmt], scope: &ScopeRef) -> Flow<()> {
        let mut vars = Vec::new();
        collect_vars(program, &mut vars);
        for name in &vars {
            scope::declare_var(scope, name, None);
        }
        self.exec_block(program, scope)?;
        Ok(())
    }

    fn hoist_functions(&mut self, stmts: &[Stmt], scope: &ScopeRef) {
        for stmt in stmts {
            if let Stmt::Function(def) = stmt {
                let f = self.make_function(def.clone(), scope, None, None);
                if let Some(name) = &def.name {
                    scope::declare(scope, name, f.into(), true);
                }
            }
        }
    }

    fn exec_block(&mut self, stmts: &[Stmt], scope: &ScopeRef) -> Flow<Completion> {
        self.hoist_functions(stmts, scope);
        for stmt in stmts {
            match self.exec_stmt(stmt, scope)? {
                Completion::Normal => {}
                other => return Ok(other),
            }
        }
        Ok(Completion::Normal)
    }

    fn exec_scoped(&mut self, stmts: &[Stmt], scope: &ScopeRef) -> Flow<Completion> {
        let inner = scope::child(scope);
        self.exec_block(stmts, &inner)
    }

    fn exec_stmt(&mut self, stmt: &Stmt, scope: &ScopeRef) -> Flow<Completion> {
        self.tick()?;
        match stmt {
            Stmt::Expr(e) => {
                self.eval(e, scope)?;
            }
            Stmt::Var(kind, decls) => self.exec_declarations(*kind, decls, scope)?,
            Stmt::Function(_) | Stmt::Empty => {}
            Stmt::Class(def) => {
                let class = self.eval_class(def, None, scope)?;
                if let Some(name) = &def.name {
                    scope::declare(scope, name, class, true);
                }
            }
            Stmt::Return(e) => {
                let v = match e {
                    Some(e) => self.eval(e, scope)?,
                    None => Value::Undefined,
                };
                return Ok(Completion::Return(v));
            }
            Stmt::If {
                test,
                consequent,
                alternate,
            } => {
                if self.eval(test, scope)?.truthy() {
                    return self.exec_stmt(consequent, scope);
                } else if let Some(alt) = alternate {
                    return self.exec_stmt(alt, scope);
                }
            }
            Stmt::Block(stmts) => return self.exec_scoped(stmts, scope),
            Stmt::For {
                init,
                test,
                update,
                body,
            } => return self.exec_for(init.as_ref(), test.as_ref(), update.as_ref(), body, scope),
            Stmt::ForIn { binding, object, body } => {
                let target = self.eval(object, scope)?;
                let keys: Vec<Value> = self.for_in_keys(&target).into_iter().map(Value::Str).collect();
                return self.exec_for_each(binding, keys, body, scope);
            }
            Stmt::ForOf {
                binding,
                iterable,
                body,
            } => {
                let target = self.eval(iterable, scope)?;
                let items = self.iterate(&target)?;
                return self.exec_for_each(binding, items, body, scope);
            }
            Stmt::While { test, body } => {
                while self.eval(test, scope)?.truthy() {
                    self.tick()?;
                    match self.exec_stmt(body, scope)? {
                        Completion::Break => break,
                        Completion::Return(v) => return Ok(Completion::Return(v)),
                        _ => {}
                    }
                }
            }
            Stmt::DoWhile { body, test } => loop {
                self.tick()?;
                match self.exec_stmt(body, scope)? {
                    Completion::Break => break,
                    Completion::Return(v) => return Ok(Completion::Return(v)),
                    _ => {}
                }
                if !self.eval(test, scope)?.truthy() {
                    break;
                }
            },
            Stmt::Break => return Ok(Completion::Break),
            Stmt::Continue => return Ok(Completion::Continue),
            Stmt::Throw(e) => {
                let v = self.eval(e, scope)?;
                return Err(Abort::Throw(v));
            }
            Stmt::Try {
                block,
                handler,
                finalizer,
            } => return self.exec_try(block, handler.as_ref(), finalizer.as_deref(), scope),
            Stmt::Switch { discriminant, cases } => return self.exec_switch(discriminant, cases, scope),
        }
        Ok(Completion::Normal)
    }

    fn exec_declarations(&mut self, kind: VarKind, decls: &[Declarator], scope: &ScopeRef) -> Flow<()> {
        for d in decls {
            match (&d.init, kind) {
                (None, VarKind::Var) => {
                    if let Pattern::Ident(name) = &d.target {
                        scope::declare_var(scope, name, None);
                    }
                }
                (None, _) => self.bind_pattern(&d.target, Value::Undefined, scope, BindMode::Declare(kind))?,
                (Some(init), _) => {
                    let v = self.eval_named(init, pattern_ident(&d.target), scope)?;
                    self.bind_pattern(&d.target, v, scope, BindMode::Declare(kind))?;
                }
            }
        }
        Ok(())
    }

    fn exec_for(
        &mut self,
        init: Option<&ForInit>,
        test: Option<&Expr>,
        update: Option<&Expr>,
        body: &Stmt,
        scope: &ScopeRef,
    ) -> Flow<Completion> {
        let loop_scope = scope::child(scope);
        let mut per_iteration = Vec::new();
        match init {
            Some(ForInit::Var(kind, decls)) => {
                self.exec_declarations(*kind, decls, &loop_scope)?;
                if *kind != VarKind::Var {
                    for d in decls {
                        pattern_names(&d.target, &mut per_iteration);
                    }
                }
            }
            Some(ForInit::Expr(e)) => {
                self.eval(e, &loop_scope)?;
            }
            None => {}
        }

        let mut iter_scope = if per_iteration.is_empty() {
            loop_scope.clone()
        } else {
            scope::copy_bindings(&loop_scope, &per_iteration, scope)
        };
        loop {
            self.tick()?;
            if let Some(test) = test {
                if !self.eval(test, &iter_scope)?.truthy() {
                    break;
                }
            }
            match self.exec_stmt(body, &iter_scope)? {
                Completion::Break => break,
                Completion::Return(v) => return Ok(Completion::Return(v)),
                _ => {}
            }
            if !per_iteration.is_empty() {
                iter_scope = scope::copy_bindings(&iter_scope, &per_iteration, scope);
            }
            if let Some(update) = update {
                self.eval(update, &iter_scope)?;
            }
        }
        Ok(Completion::Normal)
    }

    fn exec_for_each(&mut self, binding: &ForBinding, items: Vec<Value>, body: &Stmt, scope: &ScopeRef) -> Flow<Completion> {
        for item in items {
            self.tick()?;
            let iter_scope = scope::child(scope);
            match binding {
                ForBinding::Decl(kind, pattern) => {
                    self.bind_pattern(pattern, item, &iter_scope, BindMode::Declare(*kind))?
                }
                ForBinding::Assign(pattern) => self.bind_pattern(pattern, item, scope, BindMode::Assign)?,
            }
            match self.exec_stmt(body, &iter_scope)? {
                Completion::Break => break,
                Completion::Return(v) => return Ok(Completion::Return(v)),
                _ => {}
            }
        }
        Ok(Completion::Normal)
    }

    fn exec_try(
        &mut self,
        block: &[Stmt],
        handler: Option<&CatchClause>,
        finalizer: Option<&[Stmt]>,
        scope: &ScopeRef,
    ) -> Flow<Completion> {
        let mut result = self.exec_scoped(block, scope);
        if let (Err(Abort::Throw(thrown)), Some(handler)) = (&result, handler) {
            let thrown = thrown.clone();
            let catch_scope = scope::child(scope);
            result = match &handler.param {
                Some(param) => self
                    .bind_pattern(param, thrown, &catch_scope, BindMode::Declare(VarKind::Let))
                    .and_then(|_| self.exec_block(&handler.body, &catch_scope)),
                None => self.exec_block(&handler.body, &catch_scope),
            };
        }
        if matches!(result, Err(Abort::Halt(_)) | Err(Abort::Suspend)) {
            return result;
        }
        if let Some(finalizer) = finalizer {
            match self.exec_scoped(finalizer, scope)? {
                Completion::Normal => {}
                other => return Ok(other),
            }
        }
        result
    }

    fn exec_switch(&mut self, discriminant: &Expr, cases: &[SwitchCase], scope: &ScopeRef) -> Flow<Completion> {
        let value = self.eval(discriminant, scope)?;
        let switch_scope = scope::child(scope);
        for case in cases {
            self.hoist_functions(&case.body, &switch_scope);
        }

        let mut start = None;
        for (i, case) in cases.iter().enumerate() {
            if let Some(test) = &case.test {
                let candidate = self.eval(test, &switch_scope)?;
                if strict_equals(&value, &candidate) {
                    start = Some(i);
                    break;
                }
            }
        }
        let start = start.or_else(|| cases.iter().position(|c| c.test.is_none()));
        let Some(start) = start else {
            return Ok(Completion::Normal);
        };

        for case in &cases[start..] {
            for stmt in &case.body {
                match self.exec_stmt(stmt, &switch_scope)? {
                    Completion::Normal => {}
                    Completion::Break => return Ok(Completion::Normal),
                    other => return Ok(other),
                }
            }
        }
        Ok(Completion::Normal)
    }

    fn for_in_keys(&mut self, target: &Value) -> Vec<Rc<str>> {
        match target {
            Value::Str(s) => (0..s.chars().count()).map(|i| Rc::from(i.to_string())).collect(),
            Value::Object(o) => {
                let mut keys: Vec<Rc<str>> = Vec::new();
                let mut current = Some(o.clone());
                while let Some(obj) = current {
                    let (own, next) = {
                        let b = obj.borrow();
                        (b.own_keys(true), b.proto.clone())
                    };
                    for k in own {
                        if !keys.contains(&k) {
                            keys.push(k);
                        }
                    }
                    current = next;
                }
                keys
            }
            _ => Vec::new(),
        }
    }

    // ─── Bindings ─────────────────────────────────────────────────────────

    fn lookup_ident(&mut self, name: &str, scope: &ScopeRef) -> Flow<Value> {
        if let Some(v) = scope::lookup(scope, name) {
            return Ok(v);
        }
        if let Some(v) = self.namespace.get(name) {
            return Ok(v.clone());
        }
        match name {
            "undefined" => Ok(Value::Undefined),
            "NaN" => Ok(Value::Number(f64::NAN)),
            "Infinity" => Ok(Value::Number(f64::INFINITY)),
            _ => Err(self.throw(ErrorKind::Reference, format!("{} is not defined", name))),
        }
    }

    fn is_resolvable(&self, name: &str, scope: &ScopeRef) -> bool {
        scope::lookup(scope, name).is_some()
            || self.namespace.contains_key(name)
            || matches!(name, "undefined" | "NaN" | "Infinity")
    }

    fn assign_name(&mut self, name: &Rc<str>, value: Value, scope: &ScopeRef) -> Flow<()> {
        match scope::assign(scope, name, value.clone()) {
            AssignOutcome::Assigned => Ok(()),
            AssignOutcome::Constant => Err(self.type_error("Assignment to constant variable.")),
            AssignOutcome::Missing => {
                let global = self.global.clone();
                scope::declare_var(&global, name, Some(value));
                Ok(())
            }
        }
    }

    fn bind_pattern(&mut self, pattern: &Pattern, value: Value, scope: &ScopeRef, mode: BindMode) -> Flow<()> {
        match pattern {
            Pattern::Ident(name) => match mode {
                BindMode::Declare(VarKind::Var) => {
                    scope::declare_var(scope, name, Some(value));
                    Ok(())
                }
                BindMode::Declare(kind) => {
                    scope::declare(scope, name, value, kind != VarKind::Const);
                    Ok(())
                }
                BindMode::Assign => self.assign_name(name, value, scope),
            },
            Pattern::Default(inner, default) => {
                let value = if matches!(value, Value::Undefined) {
                    self.eval_named(default, pattern_ident(inner), scope)?
                } else {
                    value
                };
                self.bind_pattern(inner, value, scope, mode)
            }
            Pattern::Object { props, rest } => {
                if value.is_nullish() {
                    let shown = if matches!(value, Value::Null) { "null" } else { "undefined" };
                    return Err(self.type_error(format!("Cannot destructure '{}' as it is {}.", shown, shown)));
                }
                let mut used = Vec::with_capacity(props.len());
                for prop in props {
                    let key = self.prop_key(&prop.key, scope)?;
                    let v = self.get_value(&value, &key)?;
                    used.push(key);
                    self.bind_pattern(&prop.value, v, scope, mode)?;
                }
                if let Some(rest) = rest {
                    let remaining = self.new_plain();
                    if let Value::Object(src) = &value {
                        for (k, v) in self.own_entries(src) {
                            if !used.contains(&k) {
                                remaining.borrow_mut().set_own(&k, v);
                            }
                        }
                    }
                    self.bind_pattern(rest, remaining.into(), scope, mode)?;
                }
                Ok(())
            }
            Pattern::Array { elems, rest } => {
                let items = self.iterate(&value)?;
                for (i, elem) in elems.iter().enumerate() {
                    if let Some(elem) = elem {
                        let v = items.get(i).cloned().unwrap_or(Value::Undefined);
                        self.bind_pattern(elem, v, scope, mode)?;
                    }
                }
                if let Some(rest) = rest {
                    let remaining = items.get(elems.len()..).map(<[Value]>::to_vec).unwrap_or_default();
                    let arr = self.new_array(remaining);
                    self.bind_pattern(rest, arr.into(), scope, mode)?;
                }
                Ok(())
            }
            Pattern::Member(target) => {
                let r = self.reference(target, scope)?;
                self.put_reference(&r, value, scope)
            }
        }
    }

    fn reference(&mut self, expr: &Expr, scope: &ScopeRef) -> Flow<Reference> {
        match expr {
            Expr::Ident(name) => Ok(Reference::Binding(name.clone())),
            Expr::Member { object, property, .. } => {
                let target = if matches!(**object, Expr::Super) {
                    self.this_value(scope)?
                } else {
                    self.eval(object, scope)?
                };
                let key = self.member_key(property, scope)?;
                Ok(Reference::Property(target, key))
            }
            _ => Err(self.throw(ErrorKind::Syntax, "Invalid left-hand side in assignment")),
        }
    }

    fn pattern_reference(&mut self, pattern: &Pattern, scope: &ScopeRef) -> Flow<Reference> {
        match pattern {
            Pattern::Ident(name) => Ok(Reference::Binding(name.clone())),
            Pattern::Member(expr) => self.reference(expr, scope),
            _ => Err(self.throw(ErrorKind::Syntax, "Invalid left-hand side in assignment")),
        }
    }

    fn get_reference(&mut self, r: &Reference, scope: &ScopeRef) -> Flow<Value> {
        match r {
            Reference::Binding(name) => self.lookup_ident(name, scope),
            Reference::Property(target, key) => self.get_value(target, key),
        }
    }

    fn put_reference(&mut self, r: &Reference, value: Value, scope: &ScopeRef) -> Flow<()> {
        match r {
            Reference::Binding(name) => self.assign_name(name, value, scope),
            Reference::Property(target, key) => self.set_value(target, key, value),
        }
    }

    fn this_value(&mut self, scope: &ScopeRef) -> Flow<Value> {
        let this = scope::frame(scope).and_then(|f| f.borrow().this.clone());
        this.ok_or_else(|| {
            self.throw(
                ErrorKind::Reference,
                "Must call super constructor in derived class before accessing 'this' or returning from derived constructor",
            )
        })
    }

    // ─── Expressions ──────────────────────────────────────────────────────

    pub(crate) fn eval(&mut self, expr: &Expr, scope: &ScopeRef) -> Flow<Value> {
        match expr {
            Expr::Number(n) => Ok(Value::Number(*n)),
            Expr::Str(s) => Ok(Value::Str(s.clone())),
            Expr::Bool(b) => Ok(Value::Bool(*b)),
            Expr::Null => Ok(Value::Null),
            Expr::Template(segments) => {
                let mut out = String::new();
                for segment in segments {
                    match segment {
                        TemplateSegment::Text(t) => out.push_str(t),
                        TemplateSegment::Expr(e) => {
                            let v = self.eval(e, scope)?;
                            out.push_str(&self.to_string(&v)?);
                        }
                    }
                }
                Ok(out.into())
            }
            Expr::Regex { pattern, flags } => regexp::create(self, pattern, flags),
            Expr::Ident(name) => self.lookup_ident(name, scope),
            Expr::This => self.this_value(scope),
            Expr::Super => Err(self.throw(ErrorKind::Syntax, "'super' keyword unexpected here")),
            Expr::Array(elems) => {
                let mut items = Vec::with_capacity(elems.len());
                for elem in elems {
                    match elem {
                        ArrayElem::Item(e) => items.push(self.eval(e, scope)?),
                        ArrayElem::Spread(e) => {
                            let v = self.eval(e, scope)?;
                            items.extend(self.iterate(&v)?);
                        }
                        ArrayElem::Hole => items.push(Value::Undefined),
                    }
                }
                Ok(self.new_array(items).into())
            }
            Expr::Object(props) => self.eval_object(props, scope),
            Expr::Function(def) => {
                if def.is_arrow || def.name.is_none() {
                    return Ok(self.make_function(def.clone(), scope, None, None).into());
                }
                // A named function expression sees its own name.
                let own = scope::child(scope);
                let f = self.make_function(def.clone(), &own, None, None);
                if let Some(name) = &def.name {
                    scope::declare(&own, name, f.clone().into(), false);
                }
                Ok(f.into())
            }
            Expr::Class(def) => self.eval_class(def, None, scope),
            Expr::Unary(op, arg) => self.eval_unary(*op, arg, scope),
            Expr::Update {
                increment,
                prefix,
                target,
            } => {
                let r = self.reference(target, scope)?;
                let old = self.get_reference(&r, scope)?;
                let old = self.to_number(&old)?;
                let new = if *increment { old + 1.0 } else { old - 1.0 };
                self.put_reference(&r, Value::Number(new), scope)?;
                Ok(Value::Number(if *prefix { new } else { old }))
            }
            Expr::Binary(op, left, right) => {
                let a = self.eval(left, scope)?;
                let b = self.eval(right, scope)?;
                self.binary_op(*op, &a, &b)
            }
            Expr::Logical(op, left, right) => {
                let a = self.eval(left, scope)?;
                let short_circuit = match op {
                    LogicalOp::And => !a.truthy(),
                    LogicalOp::Or => a.truthy(),
                    LogicalOp::Nullish => !a.is_nullish(),
                };
                if short_circuit {
                    Ok(a)
                } else {
                    self.eval(right, scope)
                }
            }
            Expr::Assign { op, target, value } => self.eval_assign(*op, target, value, scope),
            Expr::Conditional {
                test,
                consequent,
                alternate,
            } => {
                if self.eval(test, scope)?.truthy() {
                    self.eval(consequent, scope)
                } else {
                    self.eval(alternate, scope)
                }
            }
            Expr::Member { .. } | Expr::Call { .. } => Ok(self.eval_chain(expr, scope)?.unwrap_or(Value::Undefined)),
            Expr::OptionalChain(inner) => Ok(self.eval_chain(inner, scope)?.unwrap_or(Value::Undefined)),
            Expr::New { callee, args } => {
                let target = self.eval(callee, scope)?;
                let args = self.eval_args(args, scope)?;
                match target.as_object() {
                    Some(ctor) if self.is_constructor(ctor) => {
                        let ctor = ctor.clone();
                        self.construct(&ctor, &args, &ctor)
                    }
                    _ => Err(self.type_error(format!("{} is not a constructor", describe(callee)))),
                }
            }
            Expr::Sequence(exprs) => {
                let mut last = Value::Undefined;
                for e in exprs {
                    last = self.eval(e, scope)?;
                }
                Ok(last)
            }
            Expr::Await(arg) => {
                let v = self.eval(arg, scope)?;
                self.await_value(v)
            }
        }
    }

    /// Evaluates an initializer, naming anonymous functions and classes
    /// after the binding they are assigned to.
    fn eval_named(&mut self, expr: &Expr, name: Option<&Rc<str>>, scope: &ScopeRef) -> Flow<Value> {
        match (expr, name) {
            (Expr::Function(def), Some(name)) if def.name.is_none() => {
                Ok(self.make_function(def.clone(), scope, None, Some(name.clone())).into())
            }
            (Expr::Class(def), Some(name)) if def.name.is_none() => self.eval_class(def, Some(name.clone()), scope),
            _ => self.eval(expr, scope),
        }
    }

    fn eval_object(&mut self, props: &[PropDef], scope: &ScopeRef) -> Flow<Value> {
        let obj = self.new_plain();
        for prop in props {
            match prop {
                PropDef::KeyValue(key, value) => {
                    let key = self.prop_key(key, scope)?;
                    let v = self.eval_named(value, Some(&key), scope)?;
                    obj.borrow_mut().set_own(&key, v);
                }
                PropDef::Shorthand(name) => {
                    let v = self.lookup_ident(name, scope)?;
                    obj.borrow_mut().set_own(name, v);
                }
                PropDef::Method(key, def) => {
                    let key = self.prop_key(key, scope)?;
                    let f = self.make_function(def.clone(), scope, Some(obj.clone()), Some(key.clone()));
                    obj.borrow_mut().set_own(&key, f.into());
                }
                PropDef::Spread(e) => {
                    let source = self.eval(e, scope)?;
                    match &source {
                        Value::Object(src) => {
                            for (k, v) in self.own_entries(src) {
                                obj.borrow_mut().set_own(&k, v);
                            }
                        }
                        Value::Str(s) => {
                            for (i, c) in s.chars().enumerate() {
                                obj.borrow_mut().set_own(&i.to_string(), Value::from(c.to_string()));
                            }
                        }
                        _ => {}
                    }
                }
            }
        }
        Ok(obj.into())
    }

    fn eval_unary(&mut self, op: UnaryOp, arg: &Expr, scope: &ScopeRef) -> Flow<Value> {
        match op {
            UnaryOp::Typeof => {
                if let Expr::Ident(name) = arg {
                    if !self.is_resolvable(name, scope) {
                        return Ok(Value::str("undefined"));
                    }
                }
                let v = self.eval(arg, scope)?;
                Ok(Value::str(v.type_of()))
            }
            UnaryOp::Delete => match arg {
                Expr::Member { .. } => match self.reference(arg, scope)? {
                    Reference::Property(Value::Object(o), key) => Ok(Value::Bool(o.borrow_mut().delete(&key))),
                    _ => Ok(Value::Bool(true)),
                },
                Expr::Ident(_) => Ok(Value::Bool(false)),
                other => {
                    self.eval(other, scope)?;
                    Ok(Value::Bool(true))
                }
            },
            UnaryOp::Void => {
                self.eval(arg, scope)?;
                Ok(Value::Undefined)
            }
            UnaryOp::Not => Ok(Value::Bool(!self.eval(arg, scope)?.truthy())),
            UnaryOp::Neg => {
                let v = self.eval(arg, scope)?;
                Ok(Value::Number(-self.to_number(&v)?))
            }
            UnaryOp::Plus => {
                let v = self.eval(arg, scope)?;
                Ok(Value::Number(self.to_number(&v)?))
            }
            UnaryOp::BitNot => {
                let v = self.eval(arg, scope)?;
                let n = self.to_number(&v)?;
                Ok(Value::Number(!super::format::to_int32(n) as f64))
            }
        }
    }

    fn eval_assign(&mut self, op: AssignOp, target: &Pattern, value: &Expr, scope: &ScopeRef) -> Flow<Value> {
        match op {
            AssignOp::Assign => {
                let v = self.eval_named(value, pattern_ident(target), scope)?;
                self.bind_pattern(target, v.clone(), scope, BindMode::Assign)?;
                Ok(v)
            }
            AssignOp::Arith(bop) => {
                let r = self.pattern_reference(target, scope)?;
                let current = self.get_reference(&r, scope)?;
                let rhs = self.eval(value, scope)?;
                let result = self.binary_op(bop, &current, &rhs)?;
                self.put_reference(&r, result.clone(), scope)?;
                Ok(result)
            }
            AssignOp::Logical(lop) => {
                let r = self.pattern_reference(target, scope)?;
                let current = self.get_reference(&r, scope)?;
                let keep = match lop {
                    LogicalOp::And => !current.truthy(),
                    LogicalOp::Or => current.truthy(),
                    LogicalOp::Nullish => !current.is_nullish(),
                };
                if keep {
                    return Ok(current);
                }
                let v = self.eval_named(value, pattern_ident(target), scope)?;
                self.put_reference(&r, v.clone(), scope)?;
                Ok(v)
            }
        }
    }

    fn prop_key(&mut self, key: &PropKey, scope: &ScopeRef) -> Flow<Rc<str>> {
        match key {
            PropKey::Name(name) => Ok(name.clone()),
            PropKey::Computed(e) => {
                let v = self.eval(e, scope)?;
                self.to_property_key(&v)
            }
        }
    }

    fn member_key(&mut self, prop: &MemberProp, scope: &ScopeRef) -> Flow<Rc<str>> {
        match prop {
            MemberProp::Name(name) => Ok(name.clone()),
            MemberProp::Computed(e) => {
                let v = self.eval(e, scope)?;
                self.to_property_key(&v)
            }
        }
    }

    /// Evaluates a member/call chain. `None` means an optional link
    /// short-circuited and the enclosing chain yields `undefined`.
    fn eval_chain(&mut self, expr: &Expr, scope: &ScopeRef) -> Flow<Option<Value>> {
        match expr {
            Expr::Member {
                object,
                property,
                optional,
            } => {
                if matches!(**object, Expr::Super) {
                    let key = self.member_key(property, scope)?;
                    return self.super_get(&key, scope).map(Some);
                }
                let Some(target) = self.eval_chain(object, scope)? else {
                    return Ok(None);
                };
                if *optional && target.is_nullish() {
                    return Ok(None);
                }
                let key = self.member_key(property, scope)?;
                self.get_value(&target, &key).map(Some)
            }
            Expr::Call {
                callee,
                args,
                optional,
            } => {
                if matches!(**callee, Expr::Super) {
                    let args = self.eval_args(args, scope)?;
                    return self.super_call(&args, scope).map(Some);
                }
                let Some((this, func)) = self.eval_callee(callee, scope)? else {
                    return Ok(None);
                };
                if *optional && func.is_nullish() {
                    return Ok(None);
                }
                let args = self.eval_args(args, scope)?;
                if !func.is_callable() {
                    return Err(self.type_error(format!("{} is not a function", describe(callee))));
                }
                self.call_function(&func, this, &args).map(Some)
            }
            other => self.eval(other, scope).map(Some),
        }
    }

    /// Resolves a callee together with its `this` value.
    fn eval_callee(&mut self, callee: &Expr, scope: &ScopeRef) -> Flow<Option<(Value, Value)>> {
        match callee {
            Expr::Member {
                object,
                property,
                optional,
            } => {
                if matches!(**object, Expr::Super) {
                    let key = self.member_key(property, scope)?;
                    let this = self.this_value(scope)?;
                    let func = self.super_get(&key, scope)?;
                    return Ok(Some((this, func)));
                }
                let Some(target) = self.eval_chain(object, scope)? else {
                    return Ok(None);
                };
                if *optional && target.is_nullish() {
                    return Ok(None);
                }
                let key = self.member_key(property, scope)?;
                let func = self.get_value(&target, &key)?;
                Ok(Some((target, func)))
            }
            other => Ok(self.eval_chain(other, scope)?.map(|f| (Value::Undefined, f))),
        }
    }

    fn eval_args(&mut self, args: &[Arg], scope: &ScopeRef) -> Flow<Vec<Value>> {
        let mut out = Vec::with_capacity(args.len());
        for arg in args {
            match arg {
                Arg::Plain(e) => out.push(self.eval(e, scope)?),
                Arg::Spread(e) => {
                    let v = self.eval(e, scope)?;
                    out.extend(self.iterate(&v)?);
                }
            }
        }
        Ok(out)
    }

    fn await_value(&mut self, v: Value) -> Flow<Value> {
        let p = promise::promise_resolve(self, v)?;
        loop {
            let settled = match &mut p.borrow_mut().kind {
                ObjectKind::Promise(cell) => match &cell.state {
                    PromiseState::Pending(_) => None,
                    PromiseState::Fulfilled(v) => Some(Ok(v.clone())),
                    PromiseState::Rejected(e) => {
                        cell.handled = true;
                        Some(Err(e.clone()))
                    }
                },
                _ => Some(Ok(Value::Undefined)),
            };
            match settled {
                Some(Ok(v)) => return Ok(v),
                Some(Err(e)) => return Err(Abort::Throw(e)),
                None => {
                    if !self.run_one_task()? {
                        return Err(Abort::Suspend);
                    }
                }
            }
        }
    }

    // ─── Functions ────────────────────────────────────────────────────────

    pub(crate) fn make_function(
        &mut self,
        def: Rc<FunctionDef>,
        env: &ScopeRef,
        home: Option<ObjRef>,
        name_hint: Option<Rc<str>>,
    ) -> ObjRef {
        let name = def.name.clone().or(name_hint).unwrap_or_else(|| "".into());
        let constructable = !def.is_arrow && !def.is_async && home.is_none();
        let arity = def.arity();
        let func = new_object(
            ObjectKind::Function(FuncKind::User(Rc::new(UserFunction {
                def,
                env: env.clone(),
                home,
                class: None,
            }))),
            Some(self.realm.function_proto.clone()),
        );
        {
            let mut f = func.borrow_mut();
            f.define_hidden("name", Value::Str(name));
            f.define_hidden("length", arity.into());
        }
        if constructable {
            let proto = self.new_plain();
            proto.borrow_mut().define_hidden("constructor", func.clone().into());
            func.borrow_mut().define_hidden("prototype", proto.into());
        }
        func
    }

    /// Calls any callable value.
    pub fn call_function(&mut self, func: &Value, this: Value, args: &[Value]) -> Flow<Value> {
        self.tick()?;
        let Some(obj) = func.as_object().filter(|o| o.borrow().is_callable()).cloned() else {
            let shown = self.display_lossy(func);
            return Err(self.type_error(format!("{} is not a function", shown)));
        };
        let Some(kind) = function_kind(&obj) else {
            return Ok(Value::Undefined);
        };

        self.enter()?;
        let result = match kind {
            FuncKind::Native { f, .. } => f(self, &this, args),
            FuncKind::Closure { f, captured } => f(self, &captured, args),
            FuncKind::Bound {
                target,
                this: bound_this,
                args: bound_args,
            } => {
                let mut all = bound_args;
                all.extend_from_slice(args);
                self.call_function(&target.into(), bound_this, &all)
            }
            FuncKind::User(uf) => match &uf.class {
                Some(info) => Err(self.type_error(format!(
                    "Class constructor {} cannot be invoked without 'new'",
                    info.name
                ))),
                None => self.invoke_user(&uf, &obj, Some(this), args, None).map(|(v, _)| v),
            },
        };
        self.leave();
        result
    }

    fn invoke_user(
        &mut self,
        uf: &Rc<UserFunction>,
        callee: &ObjRef,
        this: Option<Value>,
        args: &[Value],
        new_target: Option<ObjRef>,
    ) -> Flow<(Value, Option<FrameRef>)> {
        let def = uf.def.clone();
        let frame = (!def.is_arrow).then(|| {
            Rc::new(RefCell::new(Frame {
                this,
                home: uf.home.clone(),
                new_target,
                callee: Some(callee.clone()),
            }))
        });
        let fscope = scope::function(&uf.env, frame.clone());
        let result = if def.is_async {
            self.run_async(&def, &fscope, args)?
        } else {
            self.run_body(&def, &fscope, args)?
        };
        Ok((result, frame))
    }

    fn run_body(&mut self, def: &FunctionDef, fscope: &ScopeRef, args: &[Value]) -> Flow<Value> {
        if !def.is_arrow {
            let arguments = self.new_array(args.to_vec());
            scope::declare(fscope, &Rc::from("arguments"), arguments.into(), true);
        }
        for (i, param) in def.params.iter().enumerate() {
            let v = args.get(i).cloned().unwrap_or(Value::Undefined);
            self.bind_pattern(param, v, fscope, BindMode::Declare(VarKind::Let))?;
        }
        if let Some(rest) = &def.rest {
            let extra = args.get(def.params.len()..).map(<[Value]>::to_vec).unwrap_or_default();
            let arr = self.new_array(extra);
            self.bind_pattern(rest, arr.into(), fscope, BindMode::Declare(VarKind::Let))?;
        }
        match &def.body {
            FunctionBody::Expr(e) => self.eval(e, fscope),
            FunctionBody::Block(stmts) => {
                let mut vars = Vec::new();
                collect_vars(stmts, &mut vars);
                for name in &vars {
                    scope::declare_var(fscope, name, None);
                }
                match self.exec_block(stmts, fscope)? {
                    Completion::Return(v) => Ok(v),
                    _ => Ok(Value::Undefined),
                }
            }
        }
    }

    fn run_async(&mut self, def: &FunctionDef, fscope: &ScopeRef, args: &[Value]) -> Flow<Value> {
        let p = promise::new_promise(self);
        match self.run_body(def, fscope, args) {
            Ok(v) => promise::resolve_promise(self, &p, v)?,
            Err(Abort::Throw(e)) => promise::reject_promise(self, &p, e),
            // Stays pending forever.
            Err(Abort::Suspend) => {}
            Err(halt) => return Err(halt),
        }
        Ok(p.into())
    }

    pub fn is_constructor(&self, obj: &ObjRef) -> bool {
        match function_kind(obj) {
            Some(FuncKind::Native { ctor, .. }) => ctor.is_some(),
            Some(FuncKind::Bound { target, .. }) => self.is_constructor(&target),
            Some(FuncKind::User(uf)) => {
                uf.class.is_some() || (!uf.def.is_arrow && !uf.def.is_async && uf.home.is_none())
            }
            _ => false,
        }
    }

    /// The object `new target(...)` should inherit from.
    fn instance_proto(&mut self, new_target: &ObjRef) -> Flow<Option<ObjRef>> {
        let proto = self.get_value(&Value::Object(new_target.clone()), "prototype")?;
        Ok(Some(match proto {
            Value::Object(p) => p,
            _ => self.realm.object_proto.clone(),
        }))
    }

    /// `new ctor(...args)` with an explicit `new.target`.
    pub fn construct(&mut self, ctor: &ObjRef, args: &[Value], new_target: &ObjRef) -> Flow<Value> {
        self.tick()?;
        match function_kind(ctor) {
            Some(FuncKind::Native { ctor: Some(c), .. }) => {
                self.enter()?;
                let result = c(self, &Value::Object(new_target.clone()), args);
                self.leave();
                let result = result?;
                if !Rc::ptr_eq(ctor, new_target) {
                    if let Value::Object(o) = &result {
                        let proto = self.instance_proto(new_target)?;
                        o.borrow_mut().proto = proto;
                    }
                }
                Ok(result)
            }
            Some(FuncKind::Bound {
                target,
                args: bound_args,
                ..
            }) => {
                let mut all = bound_args;
                all.extend_from_slice(args);
                let new_target = if Rc::ptr_eq(ctor, new_target) {
                    target.clone()
                } else {
                    new_target.clone()
                };
                self.construct(&target, &all, &new_target)
            }
            Some(FuncKind::User(uf)) if self.is_constructor(ctor) => {
                self.enter()?;
                let result = self.construct_user(&uf, ctor, args, new_target);
                self.leave();
                result
            }
            _ => {
                let name = lookup(ctor, "name")
                    .map(|n| self.display_lossy(&n))
                    .filter(|n| !n.is_empty())
                    .unwrap_or_else(|| "anonymous".into());
                Err(self.type_error(format!("{} is not a constructor", name)))
            }
        }
    }

    fn construct_user(&mut self, uf: &Rc<UserFunction>, ctor: &ObjRef, args: &[Value], new_target: &ObjRef) -> Flow<Value> {
        let derived = uf.class.as_ref().map_or(false, |info| info.parent.is_some());
        if derived {
            let (result, frame) = self.invoke_user(uf, ctor, None, args, Some(new_target.clone()))?;
            if let Value::Object(_) = result {
                return Ok(result);
            }
            let this = frame.and_then(|f| f.borrow().this.clone());
            return this.ok_or_else(|| {
                self.throw(
                    ErrorKind::Reference,
                    "Must call super constructor in derived class before accessing 'this' or returning from derived constructor",
                )
            });
        }

        let proto = self.instance_proto(new_target)?;
        let this = new_object(ObjectKind::Plain, proto);
        if let Some(info) = &uf.class {
            self.init_fields(info, &this, uf.home.clone())?;
        }
        let (result, _) = self.invoke_user(uf, ctor, Some(this.clone().into()), args, Some(new_target.clone()))?;
        Ok(match result {
            Value::Object(_) => result,
            _ => this.into(),
        })
    }

    fn super_call(&mut self, args: &[Value], scope: &ScopeRef) -> Flow<Value> {
        let frame = scope::frame(scope);
        let (callee, new_target) = match &frame {
            Some(f) => {
                let f = f.borrow();
                (f.callee.clone(), f.new_target.clone())
            }
            None => (None, None),
        };
        let uf = callee.as_ref().and_then(|c| match function_kind(c) {
            Some(FuncKind::User(uf)) => Some(uf),
            _ => None,
        });
        let (Some(frame), Some(uf), Some(new_target)) = (frame, uf, new_target) else {
            return Err(self.throw(ErrorKind::Syntax, "'super' keyword unexpected here"));
        };
        let Some(info) = uf.class.clone() else {
            return Err(self.throw(ErrorKind::Syntax, "'super' keyword unexpected here"));
        };
        let Some(parent) = info.parent.clone() else {
            return Err(self.throw(ErrorKind::Syntax, "'super' keyword unexpected here"));
        };
        if frame.borrow().this.is_some() {
            return Err(self.throw(ErrorKind::Reference, "Super constructor may only be called once"));
        }

        let this = self.construct(&parent, args, &new_target)?;
        frame.borrow_mut().this = Some(this.clone());
        if let Value::Object(o) = &this {
            self.init_fields(&info, o, uf.home.clone())?;
        }
        Ok(Value::Undefined)
    }

    fn super_get(&mut self, key: &str, scope: &ScopeRef) -> Flow<Value> {
        let home = scope::frame(scope).and_then(|f| f.borrow().home.clone());
        let parent = home.and_then(|h| h.borrow().proto.clone());
        match parent {
            Some(p) => Ok(lookup(&p, key).unwrap_or(Value::Undefined)),
            None => Err(self.throw(ErrorKind::Syntax, "'super' keyword unexpected here")),
        }
    }

    fn init_fields(&mut self, info: &ClassInfo, obj: &ObjRef, home: Option<ObjRef>) -> Flow<()> {
        for (key, init) in &info.fields {
            let value = match init {
                Some(expr) => {
                    let frame = Rc::new(RefCell::new(Frame {
                        this: Some(obj.clone().into()),
                        home: home.clone(),
                        new_target: None,
                        callee: None,
                    }));
                    let field_scope = scope::function(&info.env, Some(frame));
                    self.eval_named(expr, Some(key), &field_scope)?
                }
                None => Value::Undefined,
            };
            self.check_array_growth(obj, key, &value)?;
            let mut o = obj.borrow_mut();
            if key.starts_with('#') {
                o.define_hidden(key, value);
            } else {
                o.set_own(key, value);
            }
        }
        Ok(())
    }

    // ─── Classes ──────────────────────────────────────────────────────────

    fn eval_class(&mut self, def: &ClassDef, name_hint: Option<Rc<str>>, scope: &ScopeRef) -> Flow<Value> {
        let parent = match &def.superclass {
            Some(expr) => match self.eval(expr, scope)? {
                Value::Object(o) if self.is_constructor(&o) => Some(o),
                other => {
                    let shown = self.display_lossy(&other);
                    return Err(self.type_error(format!(
                        "Class extends value {} is not a constructor or null",
                        shown
                    )));
                }
            },
            None => None,
        };
        let name: Rc<str> = def.name.clone().or(name_hint).unwrap_or_else(|| "".into());
        let class_scope = scope::child(scope);

        let proto_parent = match &parent {
            Some(p) => self.instance_proto(p)?,
            None => Some(self.realm.object_proto.clone()),
        };
        let proto = new_object(ObjectKind::Plain, proto_parent);
        let ctor_def = match &def.constructor {
            Some(c) => c.clone(),
            None => Rc::new(default_constructor(&name, parent.is_some(), &def.source)),
        };

        let mut fields = Vec::new();
        let mut statics = Vec::new();
        let mut methods = Vec::new();
        for member in &def.members {
            let key = self.prop_key(&member.key, &class_scope)?;
            match &member.kind {
                ClassMemberKind::Method(m) => methods.push((member.is_static, key, m.clone())),
                ClassMemberKind::Field(init) if member.is_static => statics.push((key, init.clone())),
                ClassMemberKind::Field(init) => fields.push((key, init.clone())),
            }
        }

        let arity = ctor_def.arity();
        let info = Rc::new(ClassInfo {
            name: name.clone(),
            parent: parent.clone(),
            fields,
            env: class_scope.clone(),
            source: def.source.clone(),
        });
        let ctor = new_object(
            ObjectKind::Function(FuncKind::User(Rc::new(UserFunction {
                def: ctor_def,
                env: class_scope.clone(),
                home: Some(proto.clone()),
                class: Some(info),
            }))),
            Some(parent.clone().unwrap_or_else(|| self.realm.function_proto.clone())),
        );
        {
            let mut c = ctor.borrow_mut();
            c.define_hidden("prototype", proto.clone().into());
            c.define_hidden("name", Value::Str(name.clone()));
            c.define_hidden("length", arity.into());
        }
        proto.borrow_mut().define_hidden("constructor", ctor.clone().into());
        if let Some(own_name) = &def.name {
            scope::declare(&class_scope, own_name, ctor.clone().into(), false);
        }

        for (is_static, key, method) in methods {
            let target = if is_static { ctor.clone() } else { proto.clone() };
            let f = self.make_function(method, &class_scope, Some(target.clone()), Some(key.clone()));
            target.borrow_mut().define_hidden(&key, f.into());
        }

        let static_info = ClassInfo {
            name,
            parent: None,
            fields: statics,
            env: class_scope,
            source: def.source.clone(),
        };
        self.init_fields(&static_info, &ctor, Some(ctor.clone()))?;

        Ok(ctor.into())
    }

    // ─── Allocation helpers ───────────────────────────────────────────────

    pub fn new_plain(&self) -> ObjRef {
        new_object(ObjectKind::Plain, Some(self.realm.object_proto.clone()))
    }

    pub fn new_array(&self, items: Vec<Value>) -> ObjRef {
        new_object(ObjectKind::Array(items), Some(self.realm.array_proto.clone()))
    }
}

impl Drop for Interpreter {
    fn drop(&mut self) {
        self.namespace.clear();
        self.jobs.clear();
        self.timers.clear();
        sweep_heap();
    }
}

impl ErrorKind {
    pub fn name(self) -> &'static str {
        match self {
            ErrorKind::Error => "Error",
            ErrorKind::Type => "TypeError",
            ErrorKind::Range => "RangeError",
            ErrorKind::Syntax => "SyntaxError",
            ErrorKind::Reference => "ReferenceError",
        }
    }
}

pub(crate) fn function_kind(obj: &ObjRef) -> Option<FuncKind> {
    match &obj.borrow().kind {
        ObjectKind::Function(kind) => Some(kind.clone()),
        _ => None,
    }
}

fn default_constructor(name: &Rc<str>, derived: bool, source: &Rc<str>) -> FunctionDef {
    let args: Rc<str> = "args".into();
    let body = if derived {
        vec![Stmt::Expr(Expr::Call {
            callee: Box::new(Expr::Super),
            args: vec![Arg::Spread(Expr::Ident(args.clone()))],
            optional: false,
        })]
    } else {
        Vec::new()
    };
    FunctionDef {
        name: Some(name.clone()),
        params: Vec::new(),
        rest: derived.then(|| Pattern::Ident(args)),
        body: FunctionBody::Block(body),
        is_arrow: false,
        is_async: false,
        source: source.clone(),
    }
}

fn pattern_ident(p: &Pattern) -> Option<&Rc<str>> {
    match p {
        Pattern::Ident(name) => Some(name),
        _ => None,
    }
}

fn pattern_names(p: &Pattern, out: &mut Vec<Rc<str>>) {
    match p {
        Pattern::Ident(name) => out.push(name.clone()),
        Pattern::Default(inner, _) => pattern_names(inner, out),
        Pattern::Object { props, rest } => {
            for prop in props {
                pattern_names(&prop.value, out);
            }
            if let Some(rest) = rest {
                pattern_names(rest, out);
            }
        }
        Pattern::Array { elems, rest } => {
            for elem in elems.iter().flatten() {
                pattern_names(elem, out);
            }
            if let Some(rest) = rest {
                pattern_names(rest, out);
            }
        }
        Pattern::Member(_) => {}
    }
}

/// `var` names declared anywhere in `stmts` outside nested functions.
fn collect_vars(stmts: &[Stmt], out: &mut Vec<Rc<str>>) {
    for stmt in stmts {
        collect_vars_stmt(stmt, out);
    }
}

fn collect_vars_stmt(stmt: &Stmt, out: &mut Vec<Rc<str>>) {
    match stmt {
        Stmt::Var(VarKind::Var, decls) => {
            for d in decls {
                pattern_names(&d.target, out);
            }
        }
        Stmt::If {
            consequent,
            alternate,
            ..
        } => {
            collect_vars_stmt(consequent, out);
            if let Some(alt) = alternate {
                collect_vars_stmt(alt, out);
            }
        }
        Stmt::Block(stmts) => collect_vars(stmts, out),
        Stmt::For { init, body, .. } => {
            if let Some(ForInit::Var(VarKind::Var, decls)) = init {
                for d in decls {
                    pattern_names(&d.target, out);
                }
            }
            collect_vars_stmt(body, out);
        }
        Stmt::ForIn { binding, body, .. } | Stmt::ForOf { binding, body, .. } => {
            if let ForBinding::Decl(VarKind::Var, p) = binding {
                pattern_names(p, out);
            }
            collect_vars_stmt(body, out);
        }
        Stmt::While { body, .. } | Stmt::DoWhile { body, .. } => collect_vars_stmt(body, out),
        Stmt::Try {
            block,
            handler,
            finalizer,
        } => {
            collect_vars(block, out);
            if let Some(h) = handler {
                collect_vars(&h.body, out);
            }
            if let Some(f) = finalizer {
                collect_vars(f, out);
            }
        }
        Stmt::Switch { cases, .. } => {
            for case in cases {
                collect_vars(&case.body, out);
            }
        }
        _ => {}
    }
}

/// Short source-like rendering of a callee for error messages.
fn describe(expr: &Expr) -> String {
    match expr {
        Expr::Ident(name) => name.to_string(),
        Expr::This => "this".into(),
        Expr::Super => "super".into(),
        Expr::Member {
            object,
            property: MemberProp::Name(name),
            ..
        } => format!("{}.{}", describe(object), name),
        Expr::Member { object, .. } => format!("{}[...]", describe(object)),
        Expr::Call { callee, .. } => format!("{}(...)", describe(callee)),
        Expr::OptionalChain(inner) => describe(inner),
        Expr::Str(s) => format!("\"{}\"", s),
        Expr::Number(n) => super::format::number_to_string(*n),
        _ => "expression".into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::console::{capture, Severity};
    use crate::script::on_engine_thread;

    fn run_with(limits: ExecutionLimits, src: &str) -> (Result<(), ScriptError>, Vec<(Severity, String)>) {
        let src = src.to_string();
        let (result, records) = capture(move || {
            on_engine_thread(move || {
                let mut interp = Interpreter::new(limits);
                crate::sandbox::namespace::install(&mut interp);
                interp.run(&src)
            })
            .expect("engine thread")
        });
        (result, records.into_iter().map(|r| (r.severity, r.message)).collect())
    }

    fn run(src: &str) -> (Result<(), ScriptError>, Vec<(Severity, String)>) {
        run_with(ExecutionLimits::default(), src)
    }

    fn logs(src: &str) -> Vec<String> {
        let (result, records) = run(src);
        if let Err(e) = result {
            panic!("script failed: {}", e);
        }
        records.into_iter().map(|(_, m)| m).collect()
    }

    #[test]
    fn closures_capture_per_iteration_bindings() {
        let out = logs(
            "const fns = [];\n\
             for (let i = 0; i < 3; i++) { fns.push(() => i); }\n\
             console.log(fns.map(f => f()).join(','));",
        );
        assert_eq!(out, vec!["0,1,2"]);
    }

    #[test]
    fn classes_with_inheritance_and_super() {
        let out = logs(
            "class Animal {\n\
               constructor(name) { this.name = name; }\n\
               speak() { return `${this.name} makes a sound`; }\n\
             }\n\
             class Dog extends Animal {\n\
               tricks = 0;\n\
               speak() { return super.speak() + ' (woof)'; }\n\
             }\n\
             const d = new Dog('Rex');\n\
             console.log(d.speak(), d instanceof Animal, d.tricks);",
        );
        assert_eq!(out, vec!["Rex makes a sound (woof) true 0"]);
    }

    #[test]
    fn destructuring_defaults_and_rest() {
        let out = logs(
            "const { a, b = 2, ...rest } = { a: 1, c: 3, d: 4 };\n\
             const [x, , y = 9, ...tail] = [10, 20, undefined, 40, 50];\n\
             console.log(a, b, Object.keys(rest).join(''), x, y, tail.length);",
        );
        assert_eq!(out, vec!["1 2 cd 10 9 2"]);
    }

    #[test]
    fn try_catch_finally_ordering() {
        let out = logs(
            "function f() {\n\
               try { throw new TypeError('bad'); }\n\
               catch (e) { console.log(e.name, e.message); return 1; }\n\
               finally { console.log('finally'); }\n\
             }\n\
             console.log(f());",
        );
        assert_eq!(out, vec!["TypeError bad", "finally", "1"]);
    }

    #[test]
    fn optional_chaining_and_nullish() {
        let out = logs(
            "const o = { a: { b: null } };\n\
             console.log(o?.a?.b?.c, o.x?.y.z, o.a.b ?? 'fallback', o.missing?.());",
        );
        assert_eq!(out, vec!["undefined undefined fallback undefined"]);
    }

    #[test]
    fn uncaught_errors_are_described() {
        let (result, _) = run("const x = null;\nx.foo;");
        match result {
            Err(ScriptError::Uncaught(message)) => {
                assert_eq!(message, "TypeError: Cannot read properties of null (reading 'foo')")
            }
            other => panic!("unexpected {:?}", other),
        }
        let (result, _) = run("undefinedThing + 1");
        assert!(matches!(result, Err(ScriptError::Uncaught(m)) if m == "ReferenceError: undefinedThing is not defined"));
    }

    #[test]
    fn infinite_loop_is_halted() {
        let limits = ExecutionLimits {
            max_steps: 10_000,
            ..ExecutionLimits::default()
        };
        let (result, _) = run_with(limits, "while (true) {}");
        assert!(matches!(result, Err(ScriptError::Halted(_))));
    }

    #[test]
    fn runaway_recursion_is_a_range_error() {
        let (result, _) = run("function f() { return f(); }\nf();");
        assert!(matches!(result, Err(ScriptError::Uncaught(m)) if m.starts_with("RangeError")));
    }

    fn caught(src: &str) -> String {
        let out = logs(&format!("try {{ {} }} catch (e) {{ console.log(e.name + ': ' + e.message); }}", src));
        out.join("\n")
    }

    #[test]
    fn oversized_arrays_throw_range_errors() {
        assert!(caught("new Array(4294967295);").starts_with("RangeError: Invalid array length"));
        assert!(caught("const a = []; a.length = 1e9;").starts_with("RangeError: Invalid array length"));
        assert!(caught("const a = []; a[1e9] = 1;").starts_with("RangeError: Invalid array length"));
        assert!(caught("Array.from({ length: 1e9 });").starts_with("RangeError: Invalid array length"));
        assert!(caught("Reflect.set([], '999999999', 1);").starts_with("RangeError: Invalid array length"));
        assert_eq!(caught("const a = [1, 2]; a.length = 5; console.log(a.length);"), "5");
    }

    #[test]
    fn array_limit_follows_the_configuration() {
        let limits = ExecutionLimits {
            max_array_length: 10,
            ..ExecutionLimits::default()
        };
        let (result, _) = run_with(limits.clone(), "const a = []; for (let i = 0; i < 11; i++) a.push(i);");
        assert!(matches!(result, Err(ScriptError::Uncaught(m)) if m.starts_with("RangeError: Invalid array length")));
        let (result, _) = run_with(limits.clone(), "const a = []; a[9] = 0;");
        assert!(result.is_ok());
        let (result, _) = run_with(limits, "const a = []; a[10] = 0;");
        assert!(matches!(result, Err(ScriptError::Uncaught(m)) if m.starts_with("RangeError: Invalid array length")));
    }

    #[test]
    fn oversized_strings_throw_range_errors() {
        assert_eq!(caught("'a'.padStart(1e10);"), "RangeError: Invalid string length");
        assert_eq!(caught("'a'.padEnd(1e10, 'xy');"), "RangeError: Invalid string length");
        assert_eq!(caught("'ab'.repeat(1e9);"), "RangeError: Invalid string length");
        assert_eq!(caught("let s = 'x'; for (;;) s += s;"), "RangeError: Invalid string length");
        assert_eq!(caught("console.log('7'.padStart(3, '0'));"), "007");
    }

    #[test]
    fn timers_run_in_virtual_time_order() {
        let out = logs(
            "setTimeout(() => console.log('late'), 500);\n\
             setTimeout(() => console.log('early'), 10);\n\
             Promise.resolve().then(() => console.log('micro'));\n\
             console.log('sync');",
        );
        assert_eq!(out, vec!["sync", "micro", "early", "late"]);
    }

    #[test]
    fn async_await_resolves_through_timers() {
        let out = logs(
            "const wait = ms => new Promise(r => setTimeout(r, ms));\n\
             async function load() { await wait(100); return 'data'; }\n\
             load().then(v => console.log('got', v));\n\
             console.log('after');",
        );
        assert_eq!(out, vec!["after", "got data"]);
    }

    #[test]
    fn interval_stops_after_clear() {
        let out = logs(
            "let n = 0;\n\
             const id = setInterval(() => { n++; if (n === 3) { clearInterval(id); console.log('done', n); } }, 100);",
        );
        assert_eq!(out, vec!["done 3"]);
    }

    #[test]
    fn timer_errors_and_rejections_are_reported() {
        let (result, records) = run(
            "setTimeout(() => { throw new Error('boom'); }, 0);\n\
             Promise.reject(new RangeError('nope'));",
        );
        assert!(result.is_ok());
        let messages: Vec<&str> = records.iter().map(|(_, m)| m.as_str()).collect();
        assert!(messages.contains(&"Uncaught Error: boom"));
        assert!(messages.contains(&"Uncaught (in promise) RangeError: nope"));
        assert!(records.iter().all(|(s, _)| *s == Severity::Error));
    }

    #[test]
    fn const_reassignment_throws() {
        let (result, _) = run("const a = 1;\na = 2;");
        assert!(matches!(result, Err(ScriptError::Uncaught(m)) if m == "TypeError: Assignment to constant variable."));
    }

    #[test]
    fn calling_class_without_new_fails() {
        let (result, _) = run("class A {}\nA();");
        assert!(matches!(result, Err(ScriptError::Uncaught(m)) if m.contains("cannot be invoked without 'new'")));
    }

    #[test]
    fn not_a_function_names_the_callee() {
        let (result, _) = run("const arr = [1];\narr.foo();");
        assert!(matches!(result, Err(ScriptError::Uncaught(m)) if m == "TypeError: arr.foo is not a function"));
    }

    #[test]
    fn switch_falls_through_until_break() {
        let out = logs(
            "function grade(n) {\n\
               switch (n) { case 1: case 2: return 'low'; case 3: { return 'mid'; } default: return 'high'; }\n\
             }\n\
             console.log(grade(2), grade(3), grade(7));",
        );
        assert_eq!(out, vec!["low mid high"]);
    }

    #[test]
    fn extending_error_keeps_name_and_message() {
        let out = logs(
            "class ValidationError extends Error {\n\
               constructor(msg) { super(msg); this.name = 'ValidationError'; }\n\
             }\n\
             try { throw new ValidationError('empty'); } catch (e) {\n\
               console.log(e instanceof ValidationError, e instanceof Error, String(e));\n\
             }",
        );
        assert_eq!(out, vec!["true true ValidationError: empty"]);
    }
}
