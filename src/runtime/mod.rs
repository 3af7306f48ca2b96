//! Value-level validators, one per type tag.
//!
//! A tag receives a template: literal strings around interpolated values.
//! Apart from `any`, `string` and `regex`, a tag takes exactly one input:
//! either a single literal (trimmed) or a single interpolated value with
//! nothing but whitespace around it.

pub mod eval;
pub mod value;

pub use eval::eval_constant;
pub use value::{Value, js_number, to_number};

use std::collections::HashMap;

use thiserror::Error;

use crate::checker::descriptor::{DescriptorError, parse_shape};
use crate::checker::shape::{ArrayShape, Contents, Member, TypeName};
use crate::checker::types::TypeId;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("No default for type: {0}")]
    NoDefault(&'static str),

    #[error("{value} is not type: {expected}")]
    NotType { value: String, expected: String },

    #[error(transparent)]
    Shape(#[from] DescriptorError),

    #[error("unknown type: {0}")]
    UnknownType(String),
}

/// Literal strings and interpolated values of a tagged template.
///
/// There is always one more string than there are values.
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateInput {
    pub strings: Vec<String>,
    pub values: Vec<Value>,
}

impl TemplateInput {
    /// A template with no interpolations.
    pub fn literal(text: &str) -> Self {
        Self {
            strings: vec![text.to_string()],
            values: Vec::new(),
        }
    }

    /// A template that is a single interpolated value.
    pub fn value(value: Value) -> Self {
        Self {
            strings: vec![String::new(), String::new()],
            values: vec![value],
        }
    }

    /// Strings and values interleaved and converted to text.
    fn concat(&self) -> String {
        let mut text = String::new();
        for (i, s) in self.strings.iter().enumerate() {
            text.push_str(s);
            if let Some(value) = self.values.get(i) {
                text.push_str(&value.to_string());
            }
        }
        text
    }
}

/// Trimmed, with line breaks escaped.
fn prepare_str(s: &str) -> String {
    s.trim().replace('\n', "\\n").replace('\r', "\\r")
}

fn is_non_trivial(s: &str) -> bool {
    s.chars().any(|c| !c.is_whitespace())
}

/// The one input of a single-input tag. A literal arrives as its trimmed text.
fn single_input(input: &TemplateInput) -> Result<Value, ValidationError> {
    let strings = &input.strings;
    if strings.len() > 2 || (strings.len() == 2 && strings.iter().any(|s| is_non_trivial(s))) {
        return Err(ValidationError::InvalidInput(prepare_str(&input.concat())));
    }

    match strings.as_slice() {
        [] => Ok(Value::String(String::new())),
        [only] => Ok(Value::String(only.trim().to_string())),
        _ => Ok(input.values.first().cloned().unwrap_or(Value::Undefined)),
    }
}

fn failed(value: &Value, expected: &str) -> ValidationError {
    let text = match value {
        Value::String(s) => format!("'{}'", s),
        value => value.to_string(),
    };
    ValidationError::NotType {
        value: prepare_str(&text),
        expected: expected.to_string(),
    }
}

fn failed_text(text: &str, expected: &str) -> ValidationError {
    failed(&Value::String(text.to_string()), expected)
}

/// Runs the validator for `tag` on a template input.
pub fn validate(tag: TypeId, input: &TemplateInput) -> Result<Value, ValidationError> {
    tracing::trace!(tag = tag.name(), strings = input.strings.len(), "validating");
    match tag {
        TypeId::Any => Ok(any(input)),
        TypeId::String => string(input),
        TypeId::Regex => regex(input),
        TypeId::Unknown => Err(ValidationError::UnknownType(tag.name().to_string())),
        _ => single(tag, single_input(input)?),
    }
}

/// Validates a template with no interpolations. An array shape, when given,
/// is checked against the resulting array.
pub fn validate_literal(tag: TypeId, text: &str, shape: Option<&ArrayShape>) -> Result<Value, ValidationError> {
    let value = validate(tag, &TemplateInput::literal(text))?;
    if let Some(shape) = shape {
        Validators::new().check_array(&value, shape)?;
    }
    Ok(value)
}

fn any(input: &TemplateInput) -> Value {
    match input.strings.as_slice() {
        [] => Value::Undefined,
        [only] if only.is_empty() => Value::Undefined,
        [only] => Value::String(only.clone()),
        [first, second] if first.is_empty() && second.is_empty() => {
            input.values.first().cloned().unwrap_or(Value::Undefined)
        }
        _ => Value::String(input.concat()),
    }
}

fn string(input: &TemplateInput) -> Result<Value, ValidationError> {
    if let [only] = input.strings.as_slice() {
        return Ok(Value::String(only.clone()));
    }
    if let Some(value) = input.values.iter().find(|v| !matches!(v, Value::String(_))) {
        return Err(failed(value, "string"));
    }
    Ok(any(input))
}

fn regex(input: &TemplateInput) -> Result<Value, ValidationError> {
    let value = match input.strings.as_slice() {
        [first, second] if first.is_empty() && second.is_empty() => {
            input.values.first().cloned().unwrap_or(Value::Undefined)
        }
        _ => {
            let text = match any(input) {
                Value::Undefined => String::new(),
                value => value.to_string(),
            };
            let text = if text.is_empty() { "/(?:)/" } else { text.trim() };
            match eval_constant(text) {
                Some(value) => value,
                None => return Err(failed_text(text, "regular expression")),
            }
        }
    };
    match value {
        Value::Regex { .. } => Ok(value),
        value => Err(failed(&value, "regular expression")),
    }
}

/// Evaluates a literal for the tags whose values are written as
/// expressions, with `fallback` standing in for an empty literal.
fn eval_text(text: &str, fallback: &str, expected: &str) -> Result<Value, ValidationError> {
    let text = if text.is_empty() { fallback } else { text };
    eval_constant(text).ok_or_else(|| failed_text(text, expected))
}

/// Text inputs are coerced to the tag's type first; other values are
/// checked as they are.
fn single(tag: TypeId, input: Value) -> Result<Value, ValidationError> {
    let value = match (tag, input) {
        (TypeId::Undef, Value::String(text)) => match text.as_str() {
            "" | "undefined" => Value::Undefined,
            _ => Value::String(text),
        },
        (TypeId::Nul, Value::String(text)) => match text.as_str() {
            "" | "null" => Value::Null,
            _ => Value::String(text),
        },
        (TypeId::Bool, Value::String(text)) => match text.as_str() {
            "" => return Err(ValidationError::NoDefault("boolean")),
            "true" => Value::Bool(true),
            "false" => Value::Bool(false),
            _ => Value::String(text),
        },
        (TypeId::Number, Value::String(text)) => match text.as_str() {
            "" => return Err(ValidationError::NoDefault("number")),
            "NaN" => Value::Number(f64::NAN),
            _ => numeric(text),
        },
        (TypeId::Finite, Value::String(text)) => {
            if text.is_empty() {
                return Err(ValidationError::NoDefault("finite number"));
            }
            numeric(text)
        }
        (TypeId::Int, Value::String(text)) => {
            if text.is_empty() {
                return Err(ValidationError::NoDefault("integer"));
            }
            numeric(text)
        }
        (TypeId::Bint, Value::String(text)) => {
            if text.is_empty() {
                return Err(ValidationError::NoDefault("bigint"));
            }
            eval_text(&text, "", "bigint")?
        }
        (TypeId::Symb, Value::String(text)) => eval_text(&text, "Symbol()", "symbol")?,
        (TypeId::Array, Value::String(text)) => eval_text(&text, "[]", "array")?,
        (TypeId::Object, Value::String(text)) => eval_text(&text, "{}", "object")?,
        (TypeId::Func, Value::String(text)) => eval_text(&text, "()=>void 0", "function")?,
        (_, value) => value,
    };

    let (ok, expected) = match tag {
        TypeId::Undef => (value == Value::Undefined, "undefined"),
        TypeId::Nul => (value == Value::Null, "null"),
        TypeId::Bool => (matches!(value, Value::Bool(_)), "boolean"),
        TypeId::Number => (matches!(value, Value::Number(_)), "number"),
        TypeId::Finite => (value.is_finite(), "finite number"),
        TypeId::Int => (value.is_safe_integer(), "integer"),
        TypeId::Bint => (matches!(value, Value::BigInt(_)), "bigint"),
        TypeId::Symb => (matches!(value, Value::Symbol(_)), "symbol"),
        TypeId::Array => (matches!(value, Value::Array(_)), "array"),
        TypeId::Object => (value.is_object(), "object"),
        TypeId::Func => (matches!(value, Value::Function(_)), "function"),
        _ => (true, tag.name()),
    };
    if ok { Ok(value) } else { Err(failed(&value, expected)) }
}

/// Numeric text converts unless it reads as NaN; the text is kept otherwise.
fn numeric(text: String) -> Value {
    let n = to_number(&text);
    if n.is_nan() { Value::String(text) } else { Value::Number(n) }
}

/// Whether a value belongs to a recognized type, without coercion.
pub fn value_has_type(value: &Value, ty: TypeId) -> bool {
    match ty {
        TypeId::Any => true,
        TypeId::Undef => *value == Value::Undefined,
        TypeId::Nul => *value == Value::Null,
        TypeId::String => matches!(value, Value::String(_)),
        TypeId::Bool => matches!(value, Value::Bool(_)),
        TypeId::Number => matches!(value, Value::Number(_)),
        TypeId::Finite => value.is_finite(),
        TypeId::Int => value.is_safe_integer(),
        TypeId::Bint => matches!(value, Value::BigInt(_)),
        TypeId::Symb => matches!(value, Value::Symbol(_)),
        TypeId::Array => matches!(value, Value::Array(_)),
        TypeId::Object => value.is_object(),
        TypeId::Func => matches!(value, Value::Function(_)),
        TypeId::Regex => matches!(value, Value::Regex { .. }),
        TypeId::Unknown => false,
    }
}

type CustomValidator = Box<dyn Fn(&Value) -> bool + Send + Sync>;

/// Element validators for array shapes, keyed by type name.
///
/// Recognized type ids are always available; other names must be
/// registered before a shape naming them can be checked.
#[derive(Default)]
pub struct Validators {
    custom: HashMap<String, CustomValidator>,
}

impl Validators {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a validator for a name that is not a recognized type id.
    pub fn register<F>(&mut self, name: &str, validator: F)
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        self.custom.insert(name.to_string(), Box::new(validator));
    }

    pub fn has_type(&self, value: &Value, name: &TypeName) -> Result<bool, ValidationError> {
        match name {
            TypeName::Builtin(id) => Ok(value_has_type(value, *id)),
            TypeName::Named(name) => match self.custom.get(name) {
                Some(validator) => Ok(validator(value)),
                None => Err(ValidationError::UnknownType(name.clone())),
            },
        }
    }

    /// Parses `descriptor` and checks `value` against it.
    pub fn check(&self, value: &Value, descriptor: &str) -> Result<(), ValidationError> {
        let shape = parse_shape(descriptor)?;
        self.check_array(value, &shape)
    }

    /// Checks an array value against an array shape.
    pub fn check_array(&self, value: &Value, shape: &ArrayShape) -> Result<(), ValidationError> {
        if self.matches(value, shape)? {
            Ok(())
        } else {
            Err(failed(value, &shape.description))
        }
    }

    fn matches(&self, value: &Value, shape: &ArrayShape) -> Result<bool, ValidationError> {
        let Value::Array(items) = value else {
            return Ok(false);
        };
        if shape.non_empty && items.is_empty() {
            return Ok(false);
        }

        match &shape.contains {
            Contents::Simple(name) => {
                for item in items {
                    if !self.has_type(item, name)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            Contents::Tuple(members) => {
                if items.len() != members.len() {
                    return Ok(false);
                }
                for (item, member) in items.iter().zip(members) {
                    let ok = match member {
                        Member::Simple(name) => self.has_type(item, name)?,
                        Member::Shape(inner) => self.matches(item, inner)?,
                    };
                    if !ok {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            Contents::Nested(inner) => {
                for item in items {
                    if !self.matches(item, inner)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
        }
    }
}
