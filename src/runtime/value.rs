//! Values produced by the value-level validators.

use std::fmt;

/// A value of the checked language, as far as constant literals go.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    /// Decimal digits, with a leading `-` when negative.
    BigInt(String),
    String(String),
    /// A symbol and its description.
    Symbol(Option<String>),
    Array(Vec<Value>),
    Object(Vec<(String, Value)>),
    /// A function and its name, if it has one.
    Function(Option<String>),
    Regex {
        pattern: String,
        flags: String,
    },
}

impl Value {
    /// `typeof` of the value.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null | Value::Array(_) | Value::Object(_) | Value::Regex { .. } => "object",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::BigInt(_) => "bigint",
            Value::String(_) => "string",
            Value::Symbol(_) => "symbol",
            Value::Function(_) => "function",
        }
    }

    /// Non-null objects, arrays and regular expressions included.
    pub fn is_object(&self) -> bool {
        matches!(self, Value::Array(_) | Value::Object(_) | Value::Regex { .. })
    }

    pub fn is_finite(&self) -> bool {
        matches!(self, Value::Number(n) if n.is_finite())
    }

    pub fn is_safe_integer(&self) -> bool {
        matches!(self, Value::Number(n) if n.fract() == 0.0 && n.abs() <= MAX_SAFE_INTEGER)
    }

    /// Truthiness.
    pub fn truthy(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::BigInt(digits) => digits.trim_start_matches('-') != "0",
            Value::String(s) => !s.is_empty(),
            _ => true,
        }
    }

    /// Numeric conversion. Objects other than arrays convert to NaN.
    pub fn to_number(&self) -> f64 {
        match self {
            Value::Undefined => f64::NAN,
            Value::Null => 0.0,
            Value::Bool(b) => f64::from(u8::from(*b)),
            Value::Number(n) => *n,
            Value::String(s) => to_number(s),
            Value::Array(_) => to_number(&self.to_string()),
            _ => f64::NAN,
        }
    }
}

/// String conversion, the way the checked language converts values to text.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => write!(f, "undefined"),
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Number(n) => write!(f, "{}", js_number(*n)),
            Value::BigInt(digits) => write!(f, "{}", digits),
            Value::String(s) => write!(f, "{}", s),
            Value::Symbol(desc) => write!(f, "Symbol({})", desc.as_deref().unwrap_or_default()),
            Value::Array(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    match item {
                        Value::Undefined | Value::Null => {}
                        item => write!(f, "{}", item)?,
                    }
                }
                Ok(())
            }
            Value::Object(_) => write!(f, "[object Object]"),
            Value::Function(name) => {
                write!(f, "function {}() {{ [code] }}", name.as_deref().unwrap_or_default())
            }
            Value::Regex { pattern, flags } => write!(f, "/{}/{}", pattern, flags),
        }
    }
}

/// Largest integer `n` such that `n` and `n + 1` are both exact doubles.
pub const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

/// Formats a number the way the checked language prints it: no trailing
/// `.0` on integers, exponent notation outside `[1e-6, 1e21)`.
pub fn js_number(n: f64) -> String {
    if n.is_nan() {
        return "NaN".to_string();
    }
    if n.is_infinite() {
        return if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    if n == 0.0 {
        return "0".to_string();
    }

    let abs = n.abs();
    if (1e-6..1e21).contains(&abs) {
        return format!("{}", n);
    }

    let text = format!("{:e}", n);
    match text.split_once('e') {
        Some((mantissa, exp)) if !exp.starts_with('-') => format!("{}e+{}", mantissa, exp),
        _ => text,
    }
}

/// Converts a string to a number: surrounding whitespace is ignored, the
/// empty string is 0, `0x`/`0o`/`0b` prefixes are read in their radix,
/// anything that is not a complete numeric literal is NaN.
pub fn to_number(text: &str) -> f64 {
    let text = text.trim();
    if text.is_empty() {
        return 0.0;
    }

    match text {
        "Infinity" | "+Infinity" => return f64::INFINITY,
        "-Infinity" => return f64::NEG_INFINITY,
        _ => {}
    }

    let radix = match text.get(..2) {
        Some("0x" | "0X") => Some(16),
        Some("0o" | "0O") => Some(8),
        Some("0b" | "0B") => Some(2),
        _ => None,
    };
    if let Some(radix) = radix {
        let digits = &text[2..];
        if digits.is_empty() {
            return f64::NAN;
        }
        return digits.chars().try_fold(0.0_f64, |acc, c| {
            c.to_digit(radix).map(|d| acc * f64::from(radix) + f64::from(d))
        })
        .unwrap_or(f64::NAN);
    }

    let well_formed = text.chars().any(|c| c.is_ascii_digit())
        && text
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '+' | '-'));
    if !well_formed {
        return f64::NAN;
    }
    text.parse().unwrap_or(f64::NAN)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_js_number() {
        assert_eq!(js_number(3.0), "3");
        assert_eq!(js_number(-0.0), "0");
        assert_eq!(js_number(1.5), "1.5");
        assert_eq!(js_number(0.1), "0.1");
        assert_eq!(js_number(f64::NAN), "NaN");
        assert_eq!(js_number(f64::NEG_INFINITY), "-Infinity");
        assert_eq!(js_number(1e21), "1e+21");
        assert_eq!(js_number(1.5e22), "1.5e+22");
        assert_eq!(js_number(1e-7), "1e-7");
        assert_eq!(js_number(123456789.0), "123456789");
    }

    #[test]
    fn test_to_number() {
        assert_eq!(to_number("  42 "), 42.0);
        assert_eq!(to_number(""), 0.0);
        assert_eq!(to_number("-1.5e3"), -1500.0);
        assert_eq!(to_number(".5"), 0.5);
        assert_eq!(to_number("0x1F"), 31.0);
        assert_eq!(to_number("0b101"), 5.0);
        assert_eq!(to_number("-Infinity"), f64::NEG_INFINITY);
        assert!(to_number("abc").is_nan());
        assert!(to_number("inf").is_nan());
        assert!(to_number("NaN").is_nan());
        assert!(to_number("1e").is_nan());
        assert!(to_number("0x").is_nan());
    }

    #[test]
    fn test_display() {
        let array = Value::Array(vec![
            Value::Number(1.0),
            Value::Null,
            Value::Array(vec![Value::String("a".into()), Value::Bool(true)]),
        ]);
        assert_eq!(array.to_string(), "1,,a,true");
        assert_eq!(Value::Object(vec![]).to_string(), "[object Object]");
        assert_eq!(Value::Symbol(Some("x".into())).to_string(), "Symbol(x)");
        assert_eq!(Value::Symbol(None).to_string(), "Symbol()");
        assert_eq!(
            Value::Regex { pattern: "a+".into(), flags: "g".into() }.to_string(),
            "/a+/g"
        );
    }

    #[test]
    fn test_predicates() {
        assert!(Value::Number(3.0).is_safe_integer());
        assert!(!Value::Number(3.5).is_safe_integer());
        assert!(!Value::Number(1e300).is_safe_integer());
        assert!(!Value::Number(f64::INFINITY).is_finite());
        assert!(Value::Regex { pattern: String::new(), flags: String::new() }.is_object());
        assert!(!Value::Null.is_object());
        assert_eq!(Value::Null.type_name(), "object");
        assert!(!Value::BigInt("0".into()).truthy());
        assert!(Value::BigInt("-3".into()).truthy());
    }
}
