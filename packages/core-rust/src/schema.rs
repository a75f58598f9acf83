//! Object schemas used to validate request parameters and command arguments.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::ApplicationError;

/// Primitive value kinds a property can be declared with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TypeCode {
    /// Any JSON value, including null.
    Any,
    String,
    /// Whole number (signed or unsigned 64-bit).
    Integer,
    /// Any JSON number.
    Number,
    Boolean,
    /// Any JSON object, without further checks.
    Object,
    /// Any JSON array, without further checks.
    Array,
}

impl TypeCode {
    fn matches(self, value: &Value) -> bool {
        match self {
            Self::Any => true,
            Self::String => value.is_string(),
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::Number => value.is_number(),
            Self::Boolean => value.is_boolean(),
            Self::Object => value.is_object(),
            Self::Array => value.is_array(),
        }
    }

    fn name(self) -> &'static str {
        match self {
            Self::Any => "any",
            Self::String => "string",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Object => "object",
            Self::Array => "array",
        }
    }
}

/// Declared type of a property: a primitive, a nested object, or an array.
#[derive(Debug, Clone)]
pub enum PropertyType {
    Type(TypeCode),
    Object(ObjectSchema),
    ArrayOf(Box<PropertyType>),
}

impl PropertyType {
    /// Array whose every element must match `item`.
    pub fn array_of(item: impl Into<PropertyType>) -> Self {
        Self::ArrayOf(Box::new(item.into()))
    }
}

impl From<TypeCode> for PropertyType {
    fn from(code: TypeCode) -> Self {
        Self::Type(code)
    }
}

impl From<ObjectSchema> for PropertyType {
    fn from(schema: ObjectSchema) -> Self {
        Self::Object(schema)
    }
}

/// Single property definition within an object schema.
#[derive(Debug, Clone)]
pub struct PropertySchema {
    /// Name of the property.
    pub name: String,
    /// Whether the property must be present and non-null.
    pub required: bool,
    /// Expected type of the property value.
    pub value_type: PropertyType,
}

/// Result of validating a value against a schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationResult {
    /// The value conforms to the schema.
    Valid,
    /// The value violates one or more schema constraints.
    Invalid {
        /// Human-readable descriptions of each validation failure.
        errors: Vec<String>,
    },
}

impl ValidationResult {
    #[must_use]
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid)
    }
}

/// Schema for a JSON object.
///
/// ```
/// use serde_json::json;
/// use svcwire_core::{ObjectSchema, TypeCode};
///
/// let schema = ObjectSchema::new()
///     .with_required_property("key", TypeCode::String)
///     .with_optional_property("content", TypeCode::String);
/// assert!(schema.validate(&json!({"key": "k"})).is_valid());
/// assert!(!schema.validate(&json!({"content": "c"})).is_valid());
/// ```
#[derive(Debug, Clone, Default)]
pub struct ObjectSchema {
    properties: Vec<PropertySchema>,
    allow_undefined: bool,
}

impl ObjectSchema {
    /// Creates a schema that rejects undeclared properties.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Controls whether properties not declared in the schema are accepted.
    #[must_use]
    pub fn allow_undefined(mut self, allow: bool) -> Self {
        self.allow_undefined = allow;
        self
    }

    #[must_use]
    pub fn with_required_property(
        mut self,
        name: impl Into<String>,
        value_type: impl Into<PropertyType>,
    ) -> Self {
        self.properties.push(PropertySchema {
            name: name.into(),
            required: true,
            value_type: value_type.into(),
        });
        self
    }

    #[must_use]
    pub fn with_optional_property(
        mut self,
        name: impl Into<String>,
        value_type: impl Into<PropertyType>,
    ) -> Self {
        self.properties.push(PropertySchema {
            name: name.into(),
            required: false,
            value_type: value_type.into(),
        });
        self
    }

    #[must_use]
    pub fn properties(&self) -> &[PropertySchema] {
        &self.properties
    }

    /// Validates `value`, collecting every violation.
    ///
    /// A `null` value is treated as an empty object so that required
    /// properties are still reported.
    #[must_use]
    pub fn validate(&self, value: &Value) -> ValidationResult {
        let mut errors = Vec::new();
        self.collect_errors("", value, &mut errors);
        if errors.is_empty() {
            ValidationResult::Valid
        } else {
            ValidationResult::Invalid { errors }
        }
    }

    /// Validates `value` and converts violations into a `BadRequest` error
    /// with code `INVALID_DATA`.
    ///
    /// # Errors
    ///
    /// Returns the validation error when the value does not conform.
    pub fn validate_and_fail(
        &self,
        correlation_id: Option<&str>,
        value: &Value,
    ) -> Result<(), ApplicationError> {
        match self.validate(value) {
            ValidationResult::Valid => Ok(()),
            ValidationResult::Invalid { errors } => {
                let message = format!("Validation failed: {}", errors.join("; "));
                Err(
                    ApplicationError::bad_request(correlation_id, "INVALID_DATA", message)
                        .with_details("errors", errors),
                )
            }
        }
    }

    fn collect_errors(&self, path: &str, value: &Value, errors: &mut Vec<String>) {
        let empty = serde_json::Map::new();
        let object = match value {
            Value::Null => &empty,
            Value::Object(map) => map,
            _ => {
                errors.push(format!("{} must be an object", display_path(path)));
                return;
            }
        };

        for prop in &self.properties {
            let prop_path = join_path(path, &prop.name);
            match object.get(&prop.name) {
                None | Some(Value::Null) => {
                    if prop.required {
                        errors.push(format!("{prop_path} is required"));
                    }
                }
                Some(v) => check_type(&prop_path, &prop.value_type, v, errors),
            }
        }

        if !self.allow_undefined {
            for key in object.keys() {
                if !self.properties.iter().any(|p| &p.name == key) {
                    errors.push(format!("{} is not allowed", join_path(path, key)));
                }
            }
        }
    }
}

fn check_type(path: &str, expected: &PropertyType, value: &Value, errors: &mut Vec<String>) {
    match expected {
        PropertyType::Type(code) => {
            if !code.matches(value) {
                errors.push(format!("{path} must be of type {}", code.name()));
            }
        }
        PropertyType::Object(schema) => {
            if value.is_object() {
                schema.collect_errors(path, value, errors);
            } else {
                errors.push(format!("{path} must be an object"));
            }
        }
        PropertyType::ArrayOf(item) => match value {
            Value::Array(items) => {
                for (i, v) in items.iter().enumerate() {
                    check_type(&format!("{path}[{i}]"), item, v, errors);
                }
            }
            _ => errors.push(format!("{path} must be an array")),
        },
    }
}

fn join_path(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{parent}.{name}")
    }
}

fn display_path(path: &str) -> &str {
    if path.is_empty() {
        "value"
    } else {
        path
    }
}
