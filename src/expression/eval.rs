use super::ast::Expr;
use super::{ExpressionError, Scope};
use crate::value::Value;
use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, FixedOffset};
use std::fmt::Write as _;

type Result<T> = std::result::Result<T, ExpressionError>;

/// Intermediate result: a value or one of the callables the sandbox exposes.
enum Term {
    Value(Value),
    Time,
    Str,
    Method(Receiver, Method),
}

enum Receiver {
    Time,
    String(String),
}

#[derive(Clone, Copy)]
enum Method {
    Upper,
    Lower,
    Strip,
    Replace,
    Strftime,
    Time,
}

impl Method {
    fn for_string(name: &str) -> Option<Method> {
        match name {
            "upper" => Some(Method::Upper),
            "lower" => Some(Method::Lower),
            "strip" => Some(Method::Strip),
            "replace" => Some(Method::Replace),
            _ => None,
        }
    }

    fn for_time(name: &str) -> Option<Method> {
        match name {
            "strftime" => Some(Method::Strftime),
            "time" => Some(Method::Time),
            _ => None,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Method::Upper => "upper",
            Method::Lower => "lower",
            Method::Strip => "strip",
            Method::Replace => "replace",
            Method::Strftime => "strftime",
            Method::Time => "time",
        }
    }

    fn arity(self) -> usize {
        match self {
            Method::Upper | Method::Lower | Method::Strip | Method::Time => 0,
            Method::Strftime => 1,
            Method::Replace => 2,
        }
    }
}

impl Term {
    fn type_name(&self) -> String {
        match self {
            Term::Value(Value::Record(record)) => record.model().to_string(),
            Term::Value(value) => value.type_name().to_string(),
            Term::Time => "module".to_string(),
            Term::Str | Term::Method(..) => "builtin_function_or_method".to_string(),
        }
    }
}

pub(crate) fn evaluate(expr: &Expr, scope: &Scope) -> Result<Value> {
    match eval(expr, scope)? {
        Term::Value(value) => Ok(value),
        Term::Time => Err(ExpressionError::Type("module 'time' is not a value".to_string())),
        Term::Str | Term::Method(..) => Err(ExpressionError::Type("function is not a value; call it".to_string())),
    }
}

fn eval(expr: &Expr, scope: &Scope) -> Result<Term> {
    let value = match expr {
        Expr::None => Value::None,
        Expr::Boolean(value) => Value::Boolean(*value),
        Expr::Integer(value) => Value::Integer(*value),
        Expr::Real(value) => Value::Real(*value),
        Expr::String(text) => Value::String(text.clone()),
        Expr::Name(name) => {
            return match name.as_str() {
                "object" => Ok(Term::Value(scope.object())),
                "time" => Ok(Term::Time),
                "str" => Ok(Term::Str),
                _ => Err(ExpressionError::UnknownName(name.clone())),
            };
        }
        Expr::Attribute { target, name } => {
            if name.starts_with('_') {
                return Err(ExpressionError::ForbiddenAttribute(name.clone()));
            }
            return attribute(eval(target, scope)?, name);
        }
        Expr::Call { callee, args } => {
            let callee = eval(callee, scope)?;
            let args = args.iter().map(|arg| evaluate(arg, scope)).collect::<Result<Vec<_>>>()?;
            return call(callee, args, scope).map(Term::Value);
        }
        Expr::Index { target, index } => {
            let target = evaluate(target, scope)?;
            let index = evaluate(index, scope)?;
            match (target, index) {
                (Value::String(text), Value::Integer(index)) => index_string(&text, index)?,
                (Value::String(_), index) => {
                    return Err(ExpressionError::Type(format!(
                        "string indices must be integers, not '{}'",
                        index.type_name()
                    )));
                }
                (target, _) => {
                    return Err(ExpressionError::Type(format!(
                        "'{}' object is not subscriptable",
                        target.type_name()
                    )));
                }
            }
        }
        Expr::Slice { target, start, end } => {
            let target = evaluate(target, scope)?;
            let start = slice_bound(start.as_deref(), scope)?;
            let end = slice_bound(end.as_deref(), scope)?;
            match target {
                Value::String(text) => Value::String(slice_string(&text, start, end)),
                target => {
                    return Err(ExpressionError::Type(format!(
                        "'{}' object is not subscriptable",
                        target.type_name()
                    )));
                }
            }
        }
        Expr::Negate(operand) => match evaluate(operand, scope)? {
            Value::Integer(value) => Value::Integer(value.checked_neg().ok_or(ExpressionError::Overflow)?),
            Value::Real(value) => Value::Real(-value),
            operand => {
                return Err(ExpressionError::Type(format!(
                    "bad operand type for unary -: '{}'",
                    operand.type_name()
                )));
            }
        },
        Expr::Add(lhs, rhs) => add(evaluate(lhs, scope)?, evaluate(rhs, scope)?)?,
        Expr::And(lhs, rhs) => {
            let lhs = evaluate(lhs, scope)?;
            if lhs.is_truthy() { evaluate(rhs, scope)? } else { lhs }
        }
        Expr::Or(lhs, rhs) => {
            let lhs = evaluate(lhs, scope)?;
            if lhs.is_truthy() { lhs } else { evaluate(rhs, scope)? }
        }
    };
    Ok(Term::Value(value))
}

fn attribute(target: Term, name: &str) -> Result<Term> {
    let unknown = |target: &Term| ExpressionError::UnknownAttribute {
        type_name: target.type_name(),
        name: name.to_string(),
    };

    match target {
        Term::Time => Method::for_time(name)
            .map(|method| Term::Method(Receiver::Time, method))
            .ok_or_else(|| unknown(&Term::Time)),
        // Fields of a missing record, or of an unset relation stored as
        // `false`, read as empty.
        Term::Value(Value::None | Value::Boolean(false)) => Ok(Term::Value(Value::None)),
        Term::Value(Value::Record(record)) => {
            if name == "id" {
                return Ok(Term::Value(Value::Integer(record.id())));
            }
            match record.field(name) {
                Some(value) => Ok(Term::Value(value)),
                None => Err(unknown(&Term::Value(Value::Record(record)))),
            }
        }
        Term::Value(Value::String(text)) => match Method::for_string(name) {
            Some(method) => Ok(Term::Method(Receiver::String(text), method)),
            None => Err(unknown(&Term::Value(Value::String(text)))),
        },
        other => Err(unknown(&other)),
    }
}

fn call(callee: Term, mut args: Vec<Value>, scope: &Scope) -> Result<Value> {
    let (receiver, method) = match callee {
        Term::Str => {
            if args.len() != 1 {
                return Err(ExpressionError::Arity {
                    name: "str",
                    expected: 1,
                    found: args.len(),
                });
            }
            return Ok(Value::String(args[0].to_string()));
        }
        Term::Method(receiver, method) => (receiver, method),
        other => return Err(ExpressionError::NotCallable(other.type_name())),
    };

    if args.len() != method.arity() {
        return Err(ExpressionError::Arity {
            name: method.name(),
            expected: method.arity(),
            found: args.len(),
        });
    }

    let value = match (receiver, method) {
        (Receiver::String(text), Method::Upper) => Value::String(text.to_uppercase()),
        (Receiver::String(text), Method::Lower) => Value::String(text.to_lowercase()),
        (Receiver::String(text), Method::Strip) => Value::String(text.trim().to_string()),
        (Receiver::String(text), Method::Replace) => {
            let replacement = args.pop();
            let pattern = args.pop();
            match (pattern, replacement) {
                (Some(Value::String(pattern)), Some(Value::String(replacement))) => {
                    Value::String(text.replace(&pattern, &replacement))
                }
                _ => return Err(ExpressionError::Type("replace() arguments must be str".to_string())),
            }
        }
        (Receiver::Time, Method::Strftime) => match args.pop() {
            Some(Value::String(format)) => Value::String(strftime(&scope.now(), &format)?),
            _ => return Err(ExpressionError::Type("strftime() argument must be str".to_string())),
        },
        (Receiver::Time, Method::Time) => Value::Real(scope.now().timestamp_millis() as f64 / 1000.0),
        (_, method) => {
            return Err(ExpressionError::NotCallable(method.name().to_string()));
        }
    };
    Ok(value)
}

fn add(lhs: Value, rhs: Value) -> Result<Value> {
    match (lhs, rhs) {
        (Value::Integer(a), Value::Integer(b)) => a.checked_add(b).map(Value::Integer).ok_or(ExpressionError::Overflow),
        (Value::Integer(a), Value::Real(b)) => Ok(Value::Real(a as f64 + b)),
        (Value::Real(a), Value::Integer(b)) => Ok(Value::Real(a + b as f64)),
        (Value::Real(a), Value::Real(b)) => Ok(Value::Real(a + b)),
        (Value::String(mut a), Value::String(b)) => {
            a.push_str(&b);
            Ok(Value::String(a))
        }
        (Value::String(_), rhs) => Err(ExpressionError::Type(format!(
            "can only concatenate str (not \"{}\") to str",
            rhs.type_name()
        ))),
        (lhs, rhs) => Err(ExpressionError::Type(format!(
            "unsupported operand type(s) for +: '{}' and '{}'",
            lhs.type_name(),
            rhs.type_name()
        ))),
    }
}

fn slice_bound(bound: Option<&Expr>, scope: &Scope) -> Result<Option<i64>> {
    match bound.map(|expr| evaluate(expr, scope)).transpose()? {
        None | Some(Value::None) => Ok(None),
        Some(Value::Integer(value)) => Ok(Some(value)),
        Some(_) => Err(ExpressionError::Type("slice indices must be integers or None".to_string())),
    }
}

fn index_string(text: &str, index: i64) -> Result<Value> {
    let chars: Vec<char> = text.chars().collect();
    let len = chars.len() as i64;
    let position = if index < 0 { index + len } else { index };
    if position < 0 || position >= len {
        return Err(ExpressionError::IndexOutOfRange);
    }
    Ok(Value::String(chars[position as usize].to_string()))
}

fn slice_string(text: &str, start: Option<i64>, end: Option<i64>) -> String {
    let chars: Vec<char> = text.chars().collect();
    let len = chars.len() as i64;
    let clamp = |bound: i64| -> usize {
        let bound = if bound < 0 { (bound + len).max(0) } else { bound.min(len) };
        bound as usize
    };

    let start = start.map_or(0, clamp);
    let end = end.map_or(chars.len(), clamp);
    if start >= end {
        return String::new();
    }
    chars[start..end].iter().collect()
}

fn strftime(now: &DateTime<FixedOffset>, format: &str) -> Result<String> {
    let items: Vec<Item> = StrftimeItems::new(format).collect();
    if items.iter().any(|item| matches!(item, Item::Error)) {
        return Err(ExpressionError::Format(format.to_string()));
    }

    let mut text = String::new();
    write!(text, "{}", now.format_with_items(items.iter()))
        .map_err(|_| ExpressionError::Format(format.to_string()))?;
    Ok(text)
}
