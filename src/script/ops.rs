//! Type conversions, operators and property access.

use std::rc::Rc;

use super::ast::BinaryOp;
use super::error::Flow;
use super::format::{number_to_string, string_to_number, to_int32, to_uint32};
use super::interpreter::{function_kind, ErrorKind, Interpreter};
use super::value::*;

#[derive(Clone, Copy, PartialEq, Eq)]
pub enum Hint {
    Default,
    Number,
    String,
}

impl Interpreter {
    // ─── Conversions ──────────────────────────────────────────────────────

    pub fn to_primitive(&mut self, v: &Value, hint: Hint) -> Flow<Value> {
        let Value::Object(o) = v else {
            return Ok(v.clone());
        };
        let is_date = matches!(o.borrow().kind, ObjectKind::Date(_));
        let order = match hint {
            Hint::String => ["toString", "valueOf"],
            Hint::Default if is_date => ["toString", "valueOf"],
            _ => ["valueOf", "toString"],
        };
        for name in order {
            let method = self.get_value(v, name)?;
            if method.is_callable() {
                let result = self.call_function(&method, v.clone(), &[])?;
                if !matches!(result, Value::Object(_)) {
                    return Ok(result);
                }
            }
        }
        Err(self.type_error("Cannot convert object to primitive value"))
    }

    pub fn to_number(&mut self, v: &Value) -> Flow<f64> {
        Ok(match v {
            Value::Undefined => f64::NAN,
            Value::Null => 0.0,
            Value::Bool(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            Value::Number(n) => *n,
            Value::Str(s) => string_to_number(s),
            Value::Object(_) => {
                let prim = self.to_primitive(v, Hint::Number)?;
                return self.to_number(&prim);
            }
        })
    }

    pub fn to_string(&mut self, v: &Value) -> Flow<Rc<str>> {
        Ok(match v {
            Value::Undefined => "undefined".into(),
            Value::Null => "null".into(),
            Value::Bool(b) => if *b { "true" } else { "false" }.into(),
            Value::Number(n) => number_to_string(*n).into(),
            Value::Str(s) => s.clone(),
            Value::Object(_) => {
                let prim = self.to_primitive(v, Hint::String)?;
                return self.to_string(&prim);
            }
        })
    }

    pub fn to_property_key(&mut self, v: &Value) -> Flow<Rc<str>> {
        match v {
            Value::Str(s) => Ok(s.clone()),
            other => self.to_string(other),
        }
    }

    // ─── Property access ──────────────────────────────────────────────────

    pub fn get_value(&mut self, target: &Value, key: &str) -> Flow<Value> {
        match target {
            Value::Undefined | Value::Null => Err(self.type_error(format!(
                "Cannot read properties of {} (reading '{}')",
                if matches!(target, Value::Null) { "null" } else { "undefined" },
                key
            ))),
            Value::Str(s) => {
                if key == "length" {
                    return Ok(s.chars().count().into());
                }
                if let Some(i) = array_index(key) {
                    return Ok(s.chars().nth(i).map_or(Value::Undefined, |c| c.to_string().into()));
                }
                Ok(lookup(&self.realm.string_proto, key).unwrap_or(Value::Undefined))
            }
            Value::Number(_) => Ok(lookup(&self.realm.number_proto, key).unwrap_or(Value::Undefined)),
            Value::Bool(_) => Ok(lookup(&self.realm.boolean_proto, key).unwrap_or(Value::Undefined)),
            Value::Object(o) => {
                if let Some(v) = intrinsic_property(&o.borrow(), key) {
                    return Ok(v);
                }
                Ok(lookup(o, key).unwrap_or(Value::Undefined))
            }
        }
    }

    /// Property write. Writes to primitives and refused writes on frozen
    /// objects are ignored.
    pub fn set_value(&mut self, target: &Value, key: &str, value: Value) -> Flow<()> {
        match target {
            Value::Undefined | Value::Null => Err(self.type_error(format!(
                "Cannot set properties of {} (setting '{}')",
                if matches!(target, Value::Null) { "null" } else { "undefined" },
                key
            ))),
            Value::Object(o) => {
                self.check_array_growth(o, key, &value)?;
                let mut obj = o.borrow_mut();
                if let (ObjectKind::RegExp(re), "lastIndex") = (&mut obj.kind, key) {
                    if let Value::Number(n) = value {
                        re.last_index = if n.is_finite() && n > 0.0 { n as usize } else { 0 };
                    }
                    return Ok(());
                }
                obj.set_own(key, value);
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Own enumerable `(key, value)` pairs in enumeration order.
    pub fn own_entries(&self, obj: &ObjRef) -> Vec<(Rc<str>, Value)> {
        let o = obj.borrow();
        o.own_keys(true)
            .into_iter()
            .filter_map(|k| o.get_own(&k).map(|v| (k, v)))
            .collect()
    }

    /// Materializes an iterable into its items.
    pub fn iterate(&mut self, v: &Value) -> Flow<Vec<Value>> {
        match v {
            Value::Str(s) => Ok(s.chars().map(|c| Value::from(c.to_string())).collect()),
            Value::Object(o) => {
                let pairs: Option<Vec<(Value, Value)>> = match &o.borrow().kind {
                    ObjectKind::Array(items) => return Ok(items.clone()),
                    ObjectKind::Set(items) => return Ok(items.values().cloned().collect()),
                    ObjectKind::Map(entries) => Some(entries.values().cloned().collect()),
                    _ => None,
                };
                let Some(pairs) = pairs else {
                    return Err(self.type_error("object is not iterable"));
                };
                Ok(pairs
                    .into_iter()
                    .map(|(k, v)| self.new_array(vec![k, v]).into())
                    .collect())
            }
            other => {
                let shown = match other {
                    Value::Undefined => "undefined".to_string(),
                    Value::Null => "null".to_string(),
                    _ => self.display_lossy(other),
                };
                Err(self.type_error(format!("{} is not iterable", shown)))
            }
        }
    }

    // ─── Operators ────────────────────────────────────────────────────────

    pub fn loose_equals(&mut self, a: &Value, b: &Value) -> Flow<bool> {
        Ok(match (a, b) {
            (x, y) if x.is_nullish() || y.is_nullish() => x.is_nullish() && y.is_nullish(),
            (Value::Number(_), Value::Number(_))
            | (Value::Str(_), Value::Str(_))
            | (Value::Bool(_), Value::Bool(_))
            | (Value::Object(_), Value::Object(_)) => strict_equals(a, b),
            (Value::Number(n), Value::Str(s)) | (Value::Str(s), Value::Number(n)) => *n == string_to_number(s),
            (Value::Bool(x), other) | (other, Value::Bool(x)) => {
                let n = Value::Number(if *x { 1.0 } else { 0.0 });
                return self.loose_equals(&n, other);
            }
            (Value::Object(_), prim) | (prim, Value::Object(_)) => {
                let obj = if matches!(a, Value::Object(_)) { a } else { b };
                let converted = self.to_primitive(obj, Hint::Default)?;
                return self.loose_equals(&converted, prim);
            }
            _ => false,
        })
    }

    /// Abstract relational comparison; `None` when either side is NaN.
    fn less_than(&mut self, a: &Value, b: &Value) -> Flow<Option<bool>> {
        let pa = self.to_primitive(a, Hint::Number)?;
        let pb = self.to_primitive(b, Hint::Number)?;
        if let (Value::Str(x), Value::Str(y)) = (&pa, &pb) {
            return Ok(Some(x < y));
        }
        let x = self.to_number(&pa)?;
        let y = self.to_number(&pb)?;
        if x.is_nan() || y.is_nan() {
            return Ok(None);
        }
        Ok(Some(x < y))
    }

    pub fn binary_op(&mut self, op: BinaryOp, a: &Value, b: &Value) -> Flow<Value> {
        use BinaryOp::*;
        Ok(match op {
            Add => {
                let pa = self.to_primitive(a, Hint::Default)?;
                let pb = self.to_primitive(b, Hint::Default)?;
                if matches!(pa, Value::Str(_)) || matches!(pb, Value::Str(_)) {
                    let left = self.to_string(&pa)?;
                    let right = self.to_string(&pb)?;
                    self.string_room((left.len() + right.len()) as f64)?;
                    let mut s = left.to_string();
                    s.push_str(&right);
                    Value::from(s)
                } else {
                    Value::Number(self.to_number(&pa)? + self.to_number(&pb)?)
                }
            }
            Sub | Mul | Div | Mod | Exp => {
                let x = self.to_number(a)?;
                let y = self.to_number(b)?;
                Value::Number(match op {
                    Sub => x - y,
                    Mul => x * y,
                    Div => x / y,
                    Mod => x % y,
                    _ => power(x, y),
                })
            }
            Eq => Value::Bool(self.loose_equals(a, b)?),
            NotEq => Value::Bool(!self.loose_equals(a, b)?),
            StrictEq => Value::Bool(strict_equals(a, b)),
            StrictNotEq => Value::Bool(!strict_equals(a, b)),
            Lt => Value::Bool(self.less_than(a, b)? == Some(true)),
            Gt => Value::Bool(self.less_than(b, a)? == Some(true)),
            LtEq => Value::Bool(self.less_than(b, a)? == Some(false)),
            GtEq => Value::Bool(self.less_than(a, b)? == Some(false)),
            BitAnd | BitOr | BitXor | Shl | Shr => {
                let x = to_int32(self.to_number(a)?);
                let y = to_int32(self.to_number(b)?);
                Value::Number(match op {
                    BitAnd => (x & y) as f64,
                    BitOr => (x | y) as f64,
                    BitXor => (x ^ y) as f64,
                    Shl => x.wrapping_shl(y as u32 & 31) as f64,
                    _ => (x >> (y as u32 & 31)) as f64,
                })
            }
            UShr => {
                let x = to_uint32(self.to_number(a)?);
                let y = to_uint32(self.to_number(b)?);
                Value::Number((x >> (y & 31)) as f64)
            }
            In => {
                let Value::Object(o) = b else {
                    let key = self.display_lossy(a);
                    let shown = self.display_lossy(b);
                    return Err(self.type_error(format!(
                        "Cannot use 'in' operator to search for '{}' in {}",
                        key, shown
                    )));
                };
                let key = self.to_property_key(a)?;
                Value::Bool(intrinsic_property(&o.borrow(), &key).is_some() || has_property(o, &key))
            }
            InstanceOf => Value::Bool(self.instance_of(a, b)?),
        })
    }

    pub fn instance_of(&mut self, v: &Value, ctor: &Value) -> Flow<bool> {
        let Some(ctor_obj) = ctor.as_object().filter(|o| o.borrow().is_callable()) else {
            return Err(self.type_error("Right-hand side of 'instanceof' is not callable"));
        };
        if let Some(FuncKind::Bound { target, .. }) = function_kind(ctor_obj) {
            return self.instance_of(v, &target.into());
        }
        let Value::Object(o) = v else {
            return Ok(false);
        };
        let Value::Object(proto) = self.get_value(ctor, "prototype")? else {
            return Ok(false);
        };
        let mut current = o.borrow().proto.clone();
        while let Some(p) = current {
            if Rc::ptr_eq(&p, &proto) {
                return Ok(true);
            }
            current = p.borrow().proto.clone();
        }
        Ok(false)
    }

    /// Rejects writes that would grow an array past `max_array_length`,
    /// either through `length` or through an index.
    pub fn check_array_growth(&mut self, o: &ObjRef, key: &str, value: &Value) -> Flow<()> {
        let current = match &o.borrow().kind {
            ObjectKind::Array(items) => items.len(),
            _ => return Ok(()),
        };
        if key == "length" {
            if let Value::Number(n) = value {
                self.array_length(*n)?;
            }
        } else if let Some(i) = array_index(key) {
            if i >= current {
                self.array_length(i as f64 + 1.0)?;
            }
        }
        Ok(())
    }

    pub fn range_error(&mut self, message: impl AsRef<str>) -> super::error::Abort {
        self.throw(ErrorKind::Range, message)
    }
}

/// `**` with the cases where JavaScript and `powf` disagree.
pub(crate) fn power(x: f64, y: f64) -> f64 {
    if y.is_nan() || (x.abs() == 1.0 && y.is_infinite()) {
        f64::NAN
    } else {
        x.powf(y)
    }
}

/// Properties backed by internal slots rather than the property map.
fn intrinsic_property(obj: &Object, key: &str) -> Option<Value> {
    match (&obj.kind, key) {
        (ObjectKind::Map(m), "size") => Some(m.len().into()),
        (ObjectKind::Set(s), "size") => Some(s.len().into()),
        (ObjectKind::RegExp(re), _) => match key {
            "lastIndex" => Some(re.last_index.into()),
            "source" => Some(Value::Str(re.source.clone())),
            "flags" => Some(Value::Str(re.flags.clone())),
            "global" => Some(re.global().into()),
            "ignoreCase" => Some(re.flags.contains('i').into()),
            "multiline" => Some(re.flags.contains('m').into()),
            "sticky" => Some(re.sticky().into()),
            _ => None,
        },
        _ => None,
    }
}
