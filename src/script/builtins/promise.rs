//! Promises and the job queue they feed.

use std::rc::Rc;

use super::{arg, closure, constructor, method, Facility};
use crate::script::error::{Abort, Flow};
use crate::script::interpreter::Interpreter;
use crate::script::value::*;

/// Work queued for the microtask checkpoint.
pub enum Job {
    Reaction {
        reaction: Reaction,
        outcome: Result<Value, Value>,
    },
    /// Adopt the state of a foreign thenable by calling its `then`.
    ResolveThenable {
        promise: ObjRef,
        thenable: Value,
        then: Value,
    },
}

pub fn new_promise(interp: &Interpreter) -> ObjRef {
    new_object(
        ObjectKind::Promise(PromiseCell {
            state: PromiseState::Pending(Vec::new()),
            handled: false,
        }),
        Some(interp.realm.promise_proto.clone()),
    )
}

fn is_promise(v: &Value) -> Option<&ObjRef> {
    v.as_object().filter(|o| matches!(o.borrow().kind, ObjectKind::Promise(_)))
}

fn is_pending(p: &ObjRef) -> bool {
    matches!(
        &p.borrow().kind,
        ObjectKind::Promise(PromiseCell {
            state: PromiseState::Pending(_),
            ..
        })
    )
}

/// `Promise.resolve(v)`: promises pass through, anything else is wrapped.
pub fn promise_resolve(interp: &mut Interpreter, v: Value) -> Flow<ObjRef> {
    if let Some(p) = is_promise(&v) {
        return Ok(p.clone());
    }
    let p = new_promise(interp);
    resolve_promise(interp, &p, v)?;
    Ok(p)
}

pub fn resolve_promise(interp: &mut Interpreter, p: &ObjRef, v: Value) -> Flow<()> {
    if !is_pending(p) {
        return Ok(());
    }
    if let Value::Object(o) = &v {
        if Rc::ptr_eq(o, p) {
            let err = interp.new_error(
                crate::script::interpreter::ErrorKind::Type,
                "Chaining cycle detected for promise #<Promise>",
            );
            reject_promise(interp, p, err);
            return Ok(());
        }
        if is_promise(&v).is_some() {
            then_internal(interp, o, None, None, Some(p.clone()));
            return Ok(());
        }
        let then = match interp.get_value(&v, "then") {
            Ok(then) => then,
            Err(Abort::Throw(e)) => {
                reject_promise(interp, p, e);
                return Ok(());
            }
            Err(other) => return Err(other),
        };
        if then.is_callable() {
            interp.enqueue_job(Job::ResolveThenable {
                promise: p.clone(),
                thenable: v.clone(),
                then,
            });
            return Ok(());
        }
    }
    settle(interp, p, Ok(v));
    Ok(())
}

pub fn reject_promise(interp: &mut Interpreter, p: &ObjRef, reason: Value) {
    settle(interp, p, Err(reason));
}

fn settle(interp: &mut Interpreter, p: &ObjRef, outcome: Result<Value, Value>) {
    let (reactions, unhandled) = {
        let mut obj = p.borrow_mut();
        let ObjectKind::Promise(cell) = &mut obj.kind else {
            return;
        };
        let PromiseState::Pending(reactions) = &mut cell.state else {
            return;
        };
        let reactions = std::mem::take(reactions);
        cell.state = match &outcome {
            Ok(v) => PromiseState::Fulfilled(v.clone()),
            Err(e) => PromiseState::Rejected(e.clone()),
        };
        (reactions, outcome.is_err() && !cell.handled)
    };
    if unhandled {
        interp.track_rejection(p);
    }
    for reaction in reactions {
        interp.enqueue_job(Job::Reaction {
            reaction,
            outcome: outcome.clone(),
        });
    }
}

/// Attaches handlers; settles `derived` with their result.
pub fn then_internal(
    interp: &mut Interpreter,
    p: &ObjRef,
    on_fulfilled: Option<Value>,
    on_rejected: Option<Value>,
    derived: Option<ObjRef>,
) {
    let reaction = Reaction {
        on_fulfilled,
        on_rejected,
        derived,
    };
    let settled = {
        let mut obj = p.borrow_mut();
        let ObjectKind::Promise(cell) = &mut obj.kind else {
            return;
        };
        cell.handled = true;
        match &mut cell.state {
            PromiseState::Pending(reactions) => {
                reactions.push(reaction.clone());
                None
            }
            PromiseState::Fulfilled(v) => Some(Ok(v.clone())),
            PromiseState::Rejected(e) => Some(Err(e.clone())),
        }
    };
    if let Some(outcome) = settled {
        interp.enqueue_job(Job::Reaction { reaction, outcome });
    }
}

pub fn run_job(interp: &mut Interpreter, job: Job) -> Flow<()> {
    match job {
        Job::Reaction { reaction, outcome } => {
            let handler = match &outcome {
                Ok(_) => reaction.on_fulfilled,
                Err(_) => reaction.on_rejected,
            };
            let result = match handler {
                Some(h) => {
                    let input = match &outcome {
                        Ok(v) | Err(v) => v.clone(),
                    };
                    match interp.call_function(&h, Value::Undefined, &[input]) {
                        Ok(v) => Ok(v),
                        Err(Abort::Throw(e)) => Err(e),
                        Err(Abort::Suspend) => return Ok(()),
                        Err(halt) => return Err(halt),
                    }
                }
                None => outcome,
            };
            if let Some(derived) = reaction.derived {
                match result {
                    Ok(v) => resolve_promise(interp, &derived, v)?,
                    Err(e) => reject_promise(interp, &derived, e),
                }
            }
            Ok(())
        }
        Job::ResolveThenable {
            promise,
            thenable,
            then,
        } => {
            let (resolve, reject) = resolving_functions(interp, &promise);
            match interp.call_function(&then, thenable, &[resolve.into(), reject.clone().into()]) {
                Ok(_) | Err(Abort::Suspend) => Ok(()),
                Err(Abort::Throw(e)) => {
                    interp.call_function(&reject.into(), Value::Undefined, &[e])?;
                    Ok(())
                }
                Err(halt) => Err(halt),
            }
        }
    }
}

/// The `resolve`/`reject` pair handed to executors. Only the first call of
/// either has any effect.
pub fn resolving_functions(interp: &mut Interpreter, p: &ObjRef) -> (ObjRef, ObjRef) {
    let done = interp.new_array(Vec::new());
    let captured = vec![p.clone().into(), done.into()];
    let resolve = closure(interp, resolve_once, captured.clone(), 1);
    let reject = closure(interp, reject_once, captured, 1);
    (resolve, reject)
}

fn first_call(captured: &[Value]) -> Option<ObjRef> {
    let done = captured.get(1)?.as_object()?;
    let mut flag = done.borrow_mut();
    let ObjectKind::Array(items) = &mut flag.kind else {
        return None;
    };
    if !items.is_empty() {
        return None;
    }
    items.push(Value::Bool(true));
    captured.first()?.as_object().cloned()
}

fn resolve_once(interp: &mut Interpreter, captured: &[Value], args: &[Value]) -> Flow<Value> {
    if let Some(p) = first_call(captured) {
        resolve_promise(interp, &p, arg(args, 0))?;
    }
    Ok(Value::Undefined)
}

fn reject_once(interp: &mut Interpreter, captured: &[Value], args: &[Value]) -> Flow<Value> {
    if let Some(p) = first_call(captured) {
        reject_promise(interp, &p, arg(args, 0));
    }
    Ok(Value::Undefined)
}

// ─── Prototype ────────────────────────────────────────────────────────────────

pub fn init(interp: &mut Interpreter) {
    let proto = interp.realm.promise_proto.clone();
    method(interp, &proto, "then", 2, proto_then);
    method(interp, &proto, "catch", 1, proto_catch);
    method(interp, &proto, "finally", 1, proto_finally);
}

fn this_promise(interp: &mut Interpreter, this: &Value, name: &str) -> Flow<ObjRef> {
    match is_promise(this) {
        Some(p) => Ok(p.clone()),
        None => Err(interp.type_error(format!(
            "Method Promise.prototype.{} called on incompatible receiver",
            name
        ))),
    }
}

fn callable(v: Value) -> Option<Value> {
    v.is_callable().then_some(v)
}

fn proto_then(interp: &mut Interpreter, this: &Value, args: &[Value]) -> Flow<Value> {
    let p = this_promise(interp, this, "then")?;
    let derived = new_promise(interp);
    then_internal(
        interp,
        &p,
        callable(arg(args, 0)),
        callable(arg(args, 1)),
        Some(derived.clone()),
    );
    Ok(derived.into())
}

fn proto_catch(interp: &mut Interpreter, this: &Value, args: &[Value]) -> Flow<Value> {
    let p = this_promise(interp, this, "catch")?;
    let derived = new_promise(interp);
    then_internal(interp, &p, None, callable(arg(args, 0)), Some(derived.clone()));
    Ok(derived.into())
}

fn proto_finally(interp: &mut Interpreter, this: &Value, args: &[Value]) -> Flow<Value> {
    let p = this_promise(interp, this, "finally")?;
    let derived = new_promise(interp);
    let Some(f) = callable(arg(args, 0)) else {
        then_internal(interp, &p, None, None, Some(derived.clone()));
        return Ok(derived.into());
    };
    let on_fulfilled = closure(interp, finally_pass, vec![f.clone()], 1);
    let on_rejected = closure(interp, finally_rethrow, vec![f], 1);
    then_internal(
        interp,
        &p,
        Some(on_fulfilled.into()),
        Some(on_rejected.into()),
        Some(derived.clone()),
    );
    Ok(derived.into())
}

fn finally_pass(interp: &mut Interpreter, captured: &[Value], args: &[Value]) -> Flow<Value> {
    interp.call_function(&arg(captured, 0), Value::Undefined, &[])?;
    Ok(arg(args, 0))
}

fn finally_rethrow(interp: &mut Interpreter, captured: &[Value], args: &[Value]) -> Flow<Value> {
    interp.call_function(&arg(captured, 0), Value::Undefined, &[])?;
    Err(Abort::Throw(arg(args, 0)))
}

// ─── Constructor & combinators ────────────────────────────────────────────────

fn promise_call(interp: &mut Interpreter, _this: &Value, _args: &[Value]) -> Flow<Value> {
    Err(interp.type_error("Promise constructor cannot be invoked without 'new'"))
}

fn promise_construct(interp: &mut Interpreter, _new_target: &Value, args: &[Value]) -> Flow<Value> {
    let executor = arg(args, 0);
    if !executor.is_callable() {
        let shown = interp.display_lossy(&executor);
        return Err(interp.type_error(format!("Promise resolver {} is not a function", shown)));
    }
    let p = new_promise(interp);
    let (resolve, reject) = resolving_functions(interp, &p);
    match interp.call_function(&executor, Value::Undefined, &[resolve.into(), reject.clone().into()]) {
        Ok(_) | Err(Abort::Suspend) => {}
        Err(Abort::Throw(e)) => {
            interp.call_function(&reject.into(), Value::Undefined, &[e])?;
        }
        Err(halt) => return Err(halt),
    }
    Ok(p.into())
}

fn static_resolve(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> Flow<Value> {
    Ok(promise_resolve(interp, arg(args, 0))?.into())
}

fn static_reject(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> Flow<Value> {
    let p = new_promise(interp);
    reject_promise(interp, &p, arg(args, 0));
    Ok(p.into())
}

#[derive(Clone, Copy)]
enum Combinator {
    All,
    AllSettled,
    Any,
}

/// Shared state for `all`/`allSettled`/`any`: `[result, values, remaining]`.
fn combinator(interp: &mut Interpreter, args: &[Value], kind: Combinator) -> Flow<Value> {
    let items = interp.iterate(&arg(args, 0))?;
    let result = new_promise(interp);
    let values = interp.new_array(vec![Value::Undefined; items.len()]);
    let remaining = interp.new_array(vec![Value::Number(items.len() as f64)]);

    if items.is_empty() {
        match kind {
            Combinator::Any => {
                let err = interp.new_error(
                    crate::script::interpreter::ErrorKind::Error,
                    "All promises were rejected",
                );
                reject_promise(interp, &result, err);
            }
            _ => resolve_promise(interp, &result, values.into())?,
        }
        return Ok(result.into());
    }

    for (i, item) in items.into_iter().enumerate() {
        let p = promise_resolve(interp, item)?;
        let captured = vec![
            result.clone().into(),
            values.clone().into(),
            remaining.clone().into(),
            Value::Number(i as f64),
        ];
        let (on_fulfilled, on_rejected) = match kind {
            Combinator::All => (
                closure(interp, all_element, captured.clone(), 1),
                closure(interp, reject_result, captured, 1),
            ),
            Combinator::AllSettled => (
                closure(interp, settled_fulfilled, captured.clone(), 1),
                closure(interp, settled_rejected, captured, 1),
            ),
            Combinator::Any => (
                closure(interp, resolve_result, captured.clone(), 1),
                closure(interp, any_element, captured, 1),
            ),
        };
        then_internal(interp, &p, Some(on_fulfilled.into()), Some(on_rejected.into()), None);
    }
    Ok(result.into())
}

/// Stores `value` at the captured index; returns the result promise once
/// every slot has been filled.
fn record(captured: &[Value], value: Value) -> Option<(ObjRef, ObjRef)> {
    let result = captured.first()?.as_object()?.clone();
    let values = captured.get(1)?.as_object()?.clone();
    let remaining = captured.get(2)?.as_object()?.clone();
    let index = match captured.get(3)? {
        Value::Number(n) => *n as usize,
        _ => return None,
    };
    if let ObjectKind::Array(items) = &mut values.borrow_mut().kind {
        if let Some(slot) = items.get_mut(index) {
            *slot = value;
        }
    }
    let left = match &mut remaining.borrow_mut().kind {
        ObjectKind::Array(counter) => match counter.first_mut() {
            Some(Value::Number(n)) => {
                *n -= 1.0;
                *n
            }
            _ => return None,
        },
        _ => return None,
    };
    (left <= 0.0).then_some((result, values))
}

fn all_element(interp: &mut Interpreter, captured: &[Value], args: &[Value]) -> Flow<Value> {
    if let Some((result, values)) = record(captured, arg(args, 0)) {
        resolve_promise(interp, &result, values.into())?;
    }
    Ok(Value::Undefined)
}

fn settled_entry(interp: &mut Interpreter, status: &str, key: &str, value: Value) -> Value {
    let entry = interp.new_plain();
    {
        let mut e = entry.borrow_mut();
        e.set_own("status", Value::str(status));
        e.set_own(key, value);
    }
    entry.into()
}

fn settled_fulfilled(interp: &mut Interpreter, captured: &[Value], args: &[Value]) -> Flow<Value> {
    let entry = settled_entry(interp, "fulfilled", "value", arg(args, 0));
    if let Some((result, values)) = record(captured, entry) {
        resolve_promise(interp, &result, values.into())?;
    }
    Ok(Value::Undefined)
}

fn settled_rejected(interp: &mut Interpreter, captured: &[Value], args: &[Value]) -> Flow<Value> {
    let entry = settled_entry(interp, "rejected", "reason", arg(args, 0));
    if let Some((result, values)) = record(captured, entry) {
        resolve_promise(interp, &result, values.into())?;
    }
    Ok(Value::Undefined)
}

fn any_element(interp: &mut Interpreter, captured: &[Value], args: &[Value]) -> Flow<Value> {
    if let Some((result, _)) = record(captured, arg(args, 0)) {
        let err = interp.new_error(crate::script::interpreter::ErrorKind::Error, "All promises were rejected");
        reject_promise(interp, &result, err);
    }
    Ok(Value::Undefined)
}

fn resolve_result(interp: &mut Interpreter, captured: &[Value], args: &[Value]) -> Flow<Value> {
    if let Some(result) = captured.first().and_then(Value::as_object).cloned() {
        resolve_promise(interp, &result, arg(args, 0))?;
    }
    Ok(Value::Undefined)
}

fn reject_result(interp: &mut Interpreter, captured: &[Value], args: &[Value]) -> Flow<Value> {
    if let Some(result) = captured.first().and_then(Value::as_object).cloned() {
        reject_promise(interp, &result, arg(args, 0));
    }
    Ok(Value::Undefined)
}

fn static_all(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> Flow<Value> {
    combinator(interp, args, Combinator::All)
}

fn static_all_settled(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> Flow<Value> {
    combinator(interp, args, Combinator::AllSettled)
}

fn static_any(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> Flow<Value> {
    combinator(interp, args, Combinator::Any)
}

fn static_race(interp: &mut Interpreter, _this: &Value, args: &[Value]) -> Flow<Value> {
    let items = interp.iterate(&arg(args, 0))?;
    let result = new_promise(interp);
    for item in items {
        let p = promise_resolve(interp, item)?;
        let captured = vec![result.clone().into()];
        let on_fulfilled = closure(interp, resolve_result, captured.clone(), 1);
        let on_rejected = closure(interp, reject_result, captured, 1);
        then_internal(interp, &p, Some(on_fulfilled.into()), Some(on_rejected.into()), None);
    }
    Ok(result.into())
}

fn install(interp: &mut Interpreter) -> Value {
    let proto = interp.realm.promise_proto.clone();
    let ctor = constructor(interp, "Promise", 1, promise_call, promise_construct, &proto);
    method(interp, &ctor, "resolve", 1, static_resolve);
    method(interp, &ctor, "reject", 1, static_reject);
    method(interp, &ctor, "all", 1, static_all);
    method(interp, &ctor, "allSettled", 1, static_all_settled);
    method(interp, &ctor, "any", 1, static_any);
    method(interp, &ctor, "race", 1, static_race);
    ctor.into()
}

inventory::submit! {
    Facility { name: "Promise", install }
}

#[cfg(test)]
mod tests {
    use crate::script::builtins::test_support::run_logs;

    #[test]
    fn then_chains_run_after_synchronous_code() {
        let out = run_logs(
            "Promise.resolve(1)\n\
               .then(v => v + 1)\n\
               .then(v => { throw new Error('at ' + v); })\n\
               .catch(e => e.message)\n\
               .finally(() => console.log('cleanup'))\n\
               .then(v => console.log(v));\n\
             console.log('first');",
        );
        assert_eq!(out, vec!["first", "cleanup", "at 2"]);
    }

    #[test]
    fn all_and_all_settled_collect_in_order() {
        let out = run_logs(
            "const later = (v, ms) => new Promise(r => setTimeout(() => r(v), ms));\n\
             Promise.all([later('a', 30), later('b', 10), 'c']).then(v => console.log(v.join('')));\n\
             Promise.allSettled([Promise.reject(new Error('x')), 1])\n\
               .then(r => console.log(r.map(e => e.status).join(',')));",
        );
        assert_eq!(out, vec!["rejected,fulfilled", "abc"]);
    }

    #[test]
    fn race_settles_with_the_first() {
        let out = run_logs(
            "const later = (v, ms) => new Promise(r => setTimeout(() => r(v), ms));\n\
             Promise.race([later('slow', 50), later('fast', 5)]).then(v => console.log(v));",
        );
        assert_eq!(out, vec!["fast"]);
    }

    #[test]
    fn executor_errors_reject() {
        let out = run_logs(
            "new Promise(() => { throw new TypeError('nope'); })\n\
               .catch(e => console.log(e.name, e.message));",
        );
        assert_eq!(out, vec!["TypeError nope"]);
    }

    #[test]
    fn awaiting_a_rejection_throws_into_the_async_function() {
        let out = run_logs(
            "async function f() {\n\
               try { await Promise.reject(new Error('bad')); } catch (e) { return 'caught ' + e.message; }\n\
             }\n\
             f().then(console.log);",
        );
        assert_eq!(out, vec!["caught bad"]);
    }
}
