//! Constant-expression evaluation of literal text.
//!
//! Validators for the object-like tags read their literal as an expression
//! of the checked language. Only side-effect free constant expressions
//! evaluate; anything referring to outside state yields `None`.

use crate::checker::ast::{BinaryOp, Element, Expr, ExprKind, LogicalOp, PropKey, Property, UnaryOp};
use crate::checker::parser::parse_expression;

use super::value::Value;

/// Evaluates `text` as a constant expression.
pub fn eval_constant(text: &str) -> Option<Value> {
    let expr = match parse_expression("<literal>", text.trim()) {
        Ok(expr) => expr,
        Err(err) => {
            tracing::trace!(%err, "literal is not an expression");
            return None;
        }
    };
    eval(&expr)
}

fn eval(expr: &Expr) -> Option<Value> {
    let value = match &expr.kind {
        ExprKind::Number(n) => Value::Number(*n),
        ExprKind::BigInt(digits) => Value::BigInt(digits.clone()),
        ExprKind::Str(s) => Value::String(s.clone()),
        ExprKind::Bool(b) => Value::Bool(*b),
        ExprKind::Null => Value::Null,
        ExprKind::Regex { pattern, flags } => Value::Regex {
            pattern: pattern.clone(),
            flags: flags.clone(),
        },
        ExprKind::Template(template) => {
            let mut text = String::new();
            for (i, quasi) in template.quasis.iter().enumerate() {
                text.push_str(&quasi.cooked);
                if let Some(expr) = template.expressions.get(i) {
                    text.push_str(&eval(expr)?.to_string());
                }
            }
            Value::String(text)
        }
        ExprKind::Ident(ident) => match ident.name.as_str() {
            "undefined" => Value::Undefined,
            "NaN" => Value::Number(f64::NAN),
            "Infinity" => Value::Number(f64::INFINITY),
            _ => return None,
        },
        ExprKind::Array(elements) => {
            let mut items = Vec::with_capacity(elements.len());
            for element in elements {
                match element {
                    None => items.push(Value::Undefined),
                    Some(Element::Expr(expr)) => items.push(eval(expr)?),
                    Some(Element::Spread(spread)) => match eval(&spread.argument)? {
                        Value::Array(inner) => items.extend(inner),
                        Value::String(s) => items.extend(s.chars().map(|c| Value::String(c.to_string()))),
                        _ => return None,
                    },
                }
            }
            Value::Array(items)
        }
        ExprKind::Object(props) => {
            let mut entries: Vec<(String, Value)> = Vec::new();
            for prop in props {
                let (key, value) = match prop {
                    Property::KeyValue { key, value, .. } => (prop_key(key)?, eval(value)?),
                    Property::Method { key, function } => (
                        prop_key(key)?,
                        Value::Function(function.name.as_ref().map(|n| n.name.clone())),
                    ),
                    Property::Spread(spread) => {
                        match eval(&spread.argument)? {
                            Value::Object(inner) => {
                                for (key, value) in inner {
                                    set_entry(&mut entries, key, value);
                                }
                            }
                            Value::Undefined | Value::Null => {}
                            _ => return None,
                        }
                        continue;
                    }
                };
                set_entry(&mut entries, key, value);
            }
            Value::Object(entries)
        }
        ExprKind::Function(function) => Value::Function(function.name.as_ref().map(|n| n.name.clone())),
        ExprKind::Unary { op, argument } => unary(*op, eval(argument)?)?,
        ExprKind::Binary { op, left, right } => binary(*op, eval(left)?, eval(right)?)?,
        ExprKind::Logical { op, left, right } => {
            let left = eval(left)?;
            match (op, left.truthy()) {
                (LogicalOp::And, true) | (LogicalOp::Or, false) => eval(right)?,
                _ => left,
            }
        }
        ExprKind::Conditional {
            test,
            consequent,
            alternate,
        } => {
            if eval(test)?.truthy() {
                eval(consequent)?
            } else {
                eval(alternate)?
            }
        }
        ExprKind::Sequence(exprs) => {
            let mut last = Value::Undefined;
            for expr in exprs {
                last = eval(expr)?;
            }
            last
        }
        ExprKind::Call { callee, arguments } => {
            let name = &callee.as_ident()?.name;
            let mut args = Vec::with_capacity(arguments.len());
            for argument in arguments {
                match argument {
                    Element::Expr(expr) => args.push(eval(expr)?),
                    Element::Spread(_) => return None,
                }
            }
            call(name, args)?
        }
        _ => return None,
    };
    Some(value)
}

fn prop_key(key: &PropKey) -> Option<String> {
    match key {
        PropKey::Name(name) => Some(name.clone()),
        PropKey::Computed(expr) => Some(eval(expr)?.to_string()),
    }
}

fn set_entry(entries: &mut Vec<(String, Value)>, key: String, value: Value) {
    match entries.iter_mut().find(|(k, _)| *k == key) {
        Some(entry) => entry.1 = value,
        None => entries.push((key, value)),
    }
}

fn negate_bigint(digits: &str) -> String {
    match digits.strip_prefix('-') {
        Some(abs) => abs.to_string(),
        None if digits == "0" => digits.to_string(),
        None => format!("-{}", digits),
    }
}

fn unary(op: UnaryOp, value: Value) -> Option<Value> {
    let result = match (op, value) {
        (UnaryOp::Minus, Value::BigInt(digits)) => Value::BigInt(negate_bigint(&digits)),
        (UnaryOp::Plus | UnaryOp::Minus | UnaryOp::BitNot, Value::BigInt(_) | Value::Symbol(_)) => {
            return None;
        }
        (UnaryOp::Plus, value) => Value::Number(value.to_number()),
        (UnaryOp::Minus, value) => Value::Number(-value.to_number()),
        (UnaryOp::BitNot, value) => Value::Number(f64::from(!to_int32(value.to_number()))),
        (UnaryOp::Not, value) => Value::Bool(!value.truthy()),
        (UnaryOp::Typeof, value) => Value::String(value.type_name().to_string()),
        (UnaryOp::Void, _) => Value::Undefined,
        (UnaryOp::Delete, _) => return None,
    };
    Some(result)
}

fn to_int32(n: f64) -> i32 {
    if !n.is_finite() {
        return 0;
    }
    (n.trunc() as i64 & 0xffff_ffff) as u32 as i32
}

fn binary(op: BinaryOp, left: Value, right: Value) -> Option<Value> {
    if let (Value::BigInt(a), Value::BigInt(b)) = (&left, &right) {
        let a: i128 = a.parse().ok()?;
        let b: i128 = b.parse().ok()?;
        let result = match op {
            BinaryOp::Add => a.checked_add(b)?,
            BinaryOp::Sub => a.checked_sub(b)?,
            BinaryOp::Mul => a.checked_mul(b)?,
            BinaryOp::Div => a.checked_div(b)?,
            BinaryOp::Mod => a.checked_rem(b)?,
            _ => return None,
        };
        return Some(Value::BigInt(result.to_string()));
    }
    if matches!(left, Value::BigInt(_) | Value::Symbol(_)) || matches!(right, Value::BigInt(_) | Value::Symbol(_)) {
        return None;
    }

    let result = match op {
        BinaryOp::Add => {
            let concat = |v: &Value| matches!(v, Value::String(_) | Value::Array(_) | Value::Object(_));
            if concat(&left) || concat(&right) {
                Value::String(format!("{}{}", left, right))
            } else {
                Value::Number(left.to_number() + right.to_number())
            }
        }
        BinaryOp::Sub => Value::Number(left.to_number() - right.to_number()),
        BinaryOp::Mul => Value::Number(left.to_number() * right.to_number()),
        BinaryOp::Div => Value::Number(left.to_number() / right.to_number()),
        BinaryOp::Mod => Value::Number(left.to_number() % right.to_number()),
        _ => return None,
    };
    Some(result)
}

fn call(name: &str, args: Vec<Value>) -> Option<Value> {
    let first = args.into_iter().next();
    let value = match name {
        "Symbol" => Value::Symbol(match first {
            None | Some(Value::Undefined) => None,
            Some(value) => Some(value.to_string()),
        }),
        "String" => Value::String(first.map(|v| v.to_string()).unwrap_or_default()),
        "Number" => Value::Number(first.map_or(0.0, |v| v.to_number())),
        "Boolean" => Value::Bool(first.is_some_and(|v| v.truthy())),
        "BigInt" => match first? {
            Value::BigInt(digits) => Value::BigInt(digits),
            Value::Number(n) if n.fract() == 0.0 && n.is_finite() => Value::BigInt(format!("{}", n as i128)),
            Value::String(s) => {
                let n: i128 = s.trim().parse().ok()?;
                Value::BigInt(n.to_string())
            }
            Value::Bool(b) => Value::BigInt(u8::from(b).to_string()),
            _ => return None,
        },
        _ => return None,
    };
    Some(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literals() {
        assert_eq!(eval_constant("42"), Some(Value::Number(42.0)));
        assert_eq!(eval_constant(" 'hi' "), Some(Value::String("hi".into())));
        assert_eq!(eval_constant("12n"), Some(Value::BigInt("12".into())));
        assert_eq!(eval_constant("-12n"), Some(Value::BigInt("-12".into())));
        assert_eq!(eval_constant("null"), Some(Value::Null));
        assert_eq!(eval_constant("undefined"), Some(Value::Undefined));
    }

    #[test]
    fn test_arrays_and_objects() {
        assert_eq!(
            eval_constant("[1, 'a', [true]]"),
            Some(Value::Array(vec![
                Value::Number(1.0),
                Value::String("a".into()),
                Value::Array(vec![Value::Bool(true)]),
            ]))
        );
        assert_eq!(
            eval_constant("[...[1, 2], 3]"),
            Some(Value::Array(vec![Value::Number(1.0), Value::Number(2.0), Value::Number(3.0)]))
        );
        assert_eq!(
            eval_constant("{ a: 1, ['b']: 2, a: 3 }"),
            Some(Value::Object(vec![
                ("a".into(), Value::Number(3.0)),
                ("b".into(), Value::Number(2.0)),
            ]))
        );
        assert_eq!(eval_constant("{}"), Some(Value::Object(vec![])));
    }

    #[test]
    fn test_functions_symbols_regex() {
        assert_eq!(eval_constant("()=>void 0"), Some(Value::Function(None)));
        assert_eq!(
            eval_constant("function foo(x) { return x; }"),
            Some(Value::Function(Some("foo".into())))
        );
        assert_eq!(eval_constant("Symbol()"), Some(Value::Symbol(None)));
        assert_eq!(eval_constant("Symbol('x')"), Some(Value::Symbol(Some("x".into()))));
        assert_eq!(
            eval_constant("/(?:)/"),
            Some(Value::Regex { pattern: "(?:)".into(), flags: String::new() })
        );
    }

    #[test]
    fn test_operators() {
        assert_eq!(eval_constant("1 + 2 * 3"), Some(Value::Number(7.0)));
        assert_eq!(eval_constant("'a' + 1"), Some(Value::String("a1".into())));
        assert_eq!(eval_constant("2n * 3n"), Some(Value::BigInt("6".into())));
        assert_eq!(eval_constant("typeof 1"), Some(Value::String("number".into())));
        assert_eq!(eval_constant("!0"), Some(Value::Bool(true)));
        assert_eq!(eval_constant("~5"), Some(Value::Number(-6.0)));
        assert_eq!(eval_constant("0 || 'x'"), Some(Value::String("x".into())));
        assert_eq!(eval_constant("1n + 1"), None);
    }

    #[test]
    fn test_non_constant() {
        assert_eq!(eval_constant("arrs"), None);
        assert_eq!(eval_constant("foo()"), None);
        assert_eq!(eval_constant("[1, x]"), None);
        assert_eq!(eval_constant("1 +"), None);
        assert_eq!(eval_constant(""), None);
    }
}
