//! Runtime schemas for principal and resource attribute bags.
//!
//! A [`Schema`] describes the shape of a `serde_json::Value`. Validation returns a
//! normalized copy of the input: unknown object fields are stripped unless the
//! object schema says otherwise, and optional fields that are absent stay absent.

use serde_json::{Map, Value};
use std::fmt;
use thiserror::Error;

/// Attribute bag shared by principals and resources.
pub type Attributes = Map<String, Value>;

/// First schema violation found while validating a value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{path}: {message}")]
pub struct ValidationError {
    /// JSON path of the offending value, rooted at `$`.
    pub path: String,
    /// Description of the violation.
    pub message: String,
}

impl ValidationError {
    /// Creates a validation error at `path`.
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Value shape.
#[derive(Debug, Clone, PartialEq)]
pub enum Schema {
    /// Any value, including `null`.
    Any,
    /// A string.
    String,
    /// A boolean.
    Bool,
    /// An integral number.
    Integer,
    /// Any number.
    Number,
    /// One of a fixed set of strings.
    OneOf(Vec<String>),
    /// An array whose items share one schema.
    Array(Box<Schema>),
    /// An object with declared fields.
    Object(ObjectSchema),
    /// The inner schema, or `null`, or absent when used as an object field.
    Optional(Box<Schema>),
}

impl Schema {
    /// Shorthand for [`Schema::Optional`].
    pub fn optional(inner: Schema) -> Self {
        Self::Optional(Box::new(inner))
    }

    /// Shorthand for [`Schema::Array`].
    pub fn array(items: Schema) -> Self {
        Self::Array(Box::new(items))
    }

    /// Shorthand for [`Schema::OneOf`].
    pub fn one_of<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::OneOf(values.into_iter().map(Into::into).collect())
    }

    /// Validates `raw` and returns the normalized value.
    pub fn validate(&self, raw: &Value) -> Result<Value, ValidationError> {
        self.validate_at(raw, "$")
    }

    fn validate_at(&self, raw: &Value, path: &str) -> Result<Value, ValidationError> {
        match self {
            Schema::Any => Ok(raw.clone()),
            Schema::String => match raw {
                Value::String(_) => Ok(raw.clone()),
                other => Err(type_error(path, "string", other)),
            },
            Schema::Bool => match raw {
                Value::Bool(_) => Ok(raw.clone()),
                other => Err(type_error(path, "boolean", other)),
            },
            Schema::Integer => match raw {
                Value::Number(n) if n.is_i64() || n.is_u64() => Ok(raw.clone()),
                other => Err(type_error(path, "integer", other)),
            },
            Schema::Number => match raw {
                Value::Number(_) => Ok(raw.clone()),
                other => Err(type_error(path, "number", other)),
            },
            Schema::OneOf(allowed) => match raw {
                Value::String(s) if allowed.iter().any(|a| a == s) => Ok(raw.clone()),
                Value::String(s) => Err(ValidationError::new(
                    path,
                    format!("`{s}` is not one of [{}]", allowed.join(", ")),
                )),
                other => Err(type_error(path, "string", other)),
            },
            Schema::Array(items) => match raw {
                Value::Array(values) => values
                    .iter()
                    .enumerate()
                    .map(|(i, v)| items.validate_at(v, &format!("{path}[{i}]")))
                    .collect::<Result<Vec<_>, _>>()
                    .map(Value::Array),
                other => Err(type_error(path, "array", other)),
            },
            Schema::Object(object) => object.validate_at(raw, path).map(Value::Object),
            Schema::Optional(inner) => match raw {
                Value::Null => Ok(Value::Null),
                other => inner.validate_at(other, path),
            },
        }
    }

    fn is_optional(&self) -> bool {
        matches!(self, Schema::Optional(_))
    }
}

impl From<ObjectSchema> for Schema {
    fn from(value: ObjectSchema) -> Self {
        Self::Object(value)
    }
}

/// Policy for object fields that the schema does not declare.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UnknownFields {
    /// Drop undeclared fields from the validated output.
    #[default]
    Strip,
    /// Keep undeclared fields as-is.
    Allow,
    /// Fail validation on undeclared fields.
    Reject,
}

/// Object shape: an ordered list of named fields.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObjectSchema {
    fields: Vec<(String, Schema)>,
    unknown: UnknownFields,
}

impl ObjectSchema {
    /// Creates an empty object schema.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a field. A later field with the same name replaces the earlier one.
    pub fn field(mut self, name: impl Into<String>, schema: Schema) -> Self {
        let name = name.into();
        self.fields.retain(|(existing, _)| existing != &name);
        self.fields.push((name, schema));
        self
    }

    /// Sets the unknown-field policy.
    pub fn unknown_fields(mut self, policy: UnknownFields) -> Self {
        self.unknown = policy;
        self
    }

    /// Returns declared fields in declaration order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &Schema)> {
        self.fields.iter().map(|(name, schema)| (name.as_str(), schema))
    }

    /// Validates `raw` as an object and returns the normalized attribute bag.
    pub fn validate(&self, raw: &Value) -> Result<Attributes, ValidationError> {
        self.validate_at(raw, "$")
    }

    fn validate_at(&self, raw: &Value, path: &str) -> Result<Attributes, ValidationError> {
        let Value::Object(input) = raw else {
            return Err(type_error(path, "object", raw));
        };

        let mut output = Map::new();
        for (name, schema) in &self.fields {
            let field_path = format!("{path}.{name}");
            match input.get(name) {
                Some(value) => {
                    output.insert(name.clone(), schema.validate_at(value, &field_path)?);
                }
                None if schema.is_optional() => {}
                None => {
                    return Err(ValidationError::new(field_path, "required field is missing"));
                }
            }
        }

        for (name, value) in input {
            if self.fields.iter().any(|(declared, _)| declared == name) {
                continue;
            }
            match self.unknown {
                UnknownFields::Strip => {}
                UnknownFields::Allow => {
                    output.insert(name.clone(), value.clone());
                }
                UnknownFields::Reject => {
                    return Err(ValidationError::new(
                        format!("{path}.{name}"),
                        "unknown field",
                    ));
                }
            }
        }

        Ok(output)
    }
}

fn type_error(path: &str, expected: &str, found: &Value) -> ValidationError {
    ValidationError::new(path, format!("expected {expected}, found {}", Kind(found)))
}

struct Kind<'a>(&'a Value);

impl fmt::Display for Kind<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self.0 {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
        })
    }
}
