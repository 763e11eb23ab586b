//! Schema checks for the TOML tables that configure pluggable backends.
//!
//! Backends such as the sampler transport or the pool fetcher receive a raw
//! `toml::Value`. Each one describes the shape it accepts with a [`Schema`] and
//! exposes it through [`ConfigSchema`] so the loader can reject bad tables
//! before anything is constructed.

use alloy_primitives::Address;
use std::str::FromStr;
use thiserror::Error;

/// Errors that can occur while validating a configuration table.
#[derive(Debug, Error)]
pub enum ValidationError {
	/// A required key is absent.
	#[error("Missing required field: {0}")]
	MissingField(String),
	/// A key is present but its value is out of range or malformed.
	#[error("Invalid value for field '{field}': {message}")]
	InvalidValue { field: String, message: String },
	/// A key holds a value of the wrong TOML type.
	#[error("Type mismatch for field '{field}': expected {expected}, got {actual}")]
	TypeMismatch {
		field: String,
		expected: String,
		actual: String,
	},
	/// The table could not be turned into the backend's settings type.
	#[error("Failed to deserialize config: {0}")]
	DeserializationError(String),
}

impl ValidationError {
	fn nested(self, parent: &str) -> Self {
		match self {
			ValidationError::MissingField(f) => ValidationError::MissingField(format!("{parent}.{f}")),
			ValidationError::InvalidValue { field, message } => ValidationError::InvalidValue {
				field: format!("{parent}.{field}"),
				message,
			},
			ValidationError::TypeMismatch {
				field,
				expected,
				actual,
			} => ValidationError::TypeMismatch {
				field: format!("{parent}.{field}"),
				expected,
				actual,
			},
			other => other,
		}
	}
}

/// Accepted type of a configuration value.
#[derive(Debug)]
pub enum FieldType {
	String,
	/// A `0x`-prefixed 20-byte hex string.
	Address,
	Integer { min: Option<i64>, max: Option<i64> },
	/// A float; integers are accepted as well.
	Float { min: Option<f64>, max: Option<f64> },
	Boolean,
	Array(Box<FieldType>),
	Table(Schema),
}

/// Extra check run after the type check passes.
pub type FieldValidator = Box<dyn Fn(&toml::Value) -> Result<(), String> + Send + Sync>;

/// A named key with its accepted type.
pub struct Field {
	pub name: String,
	pub field_type: FieldType,
	pub validator: Option<FieldValidator>,
}

impl std::fmt::Debug for Field {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Field")
			.field("name", &self.name)
			.field("field_type", &self.field_type)
			.field("validator", &self.validator.is_some())
			.finish()
	}
}

impl Field {
	pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
		Self {
			name: name.into(),
			field_type,
			validator: None,
		}
	}

	/// Attaches a custom check to this field.
	pub fn with_validator<F>(mut self, validator: F) -> Self
	where
		F: Fn(&toml::Value) -> Result<(), String> + Send + Sync + 'static,
	{
		self.validator = Some(Box::new(validator));
		self
	}

	fn check(&self, value: &toml::Value) -> Result<(), ValidationError> {
		check_type(&self.name, value, &self.field_type)?;
		if let Some(validator) = &self.validator {
			validator(value).map_err(|message| ValidationError::InvalidValue {
				field: self.name.clone(),
				message,
			})?;
		}
		Ok(())
	}
}

/// Required and optional keys of a table.
#[derive(Debug)]
pub struct Schema {
	pub required: Vec<Field>,
	pub optional: Vec<Field>,
}

impl Schema {
	pub fn new(required: Vec<Field>, optional: Vec<Field>) -> Self {
		Self { required, optional }
	}

	/// Validates `config` against this schema. Unknown keys are ignored.
	pub fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let table = config
			.as_table()
			.ok_or_else(|| mismatch("root", "table", config))?;

		for field in &self.required {
			let value = table
				.get(&field.name)
				.ok_or_else(|| ValidationError::MissingField(field.name.clone()))?;
			field.check(value)?;
		}

		for field in &self.optional {
			if let Some(value) = table.get(&field.name) {
				field.check(value)?;
			}
		}

		Ok(())
	}
}

fn mismatch(field: &str, expected: &str, value: &toml::Value) -> ValidationError {
	ValidationError::TypeMismatch {
		field: field.to_string(),
		expected: expected.to_string(),
		actual: value.type_str().to_string(),
	}
}

fn out_of_range(field: &str, message: String) -> ValidationError {
	ValidationError::InvalidValue {
		field: field.to_string(),
		message,
	}
}

fn check_type(name: &str, value: &toml::Value, expected: &FieldType) -> Result<(), ValidationError> {
	match expected {
		FieldType::String => {
			value.as_str().ok_or_else(|| mismatch(name, "string", value))?;
		}
		FieldType::Address => {
			let s = value.as_str().ok_or_else(|| mismatch(name, "address", value))?;
			Address::from_str(s)
				.map_err(|e| out_of_range(name, format!("'{s}' is not an address: {e}")))?;
		}
		FieldType::Integer { min, max } => {
			let v = value
				.as_integer()
				.ok_or_else(|| mismatch(name, "integer", value))?;
			if let Some(min) = min.filter(|m| v < *m) {
				return Err(out_of_range(name, format!("Value {v} is less than minimum {min}")));
			}
			if let Some(max) = max.filter(|m| v > *m) {
				return Err(out_of_range(name, format!("Value {v} is greater than maximum {max}")));
			}
		}
		FieldType::Float { min, max } => {
			let v = value
				.as_float()
				.or_else(|| value.as_integer().map(|i| i as f64))
				.ok_or_else(|| mismatch(name, "float", value))?;
			if let Some(min) = min.filter(|m| v < *m) {
				return Err(out_of_range(name, format!("Value {v} is less than minimum {min}")));
			}
			if let Some(max) = max.filter(|m| v > *m) {
				return Err(out_of_range(name, format!("Value {v} is greater than maximum {max}")));
			}
		}
		FieldType::Boolean => {
			value.as_bool().ok_or_else(|| mismatch(name, "boolean", value))?;
		}
		FieldType::Array(inner) => {
			let items = value.as_array().ok_or_else(|| mismatch(name, "array", value))?;
			for (i, item) in items.iter().enumerate() {
				check_type(&format!("{name}[{i}]"), item, inner)?;
			}
		}
		FieldType::Table(schema) => {
			schema.validate(value).map_err(|e| e.nested(name))?;
		}
	}

	Ok(())
}

/// Implemented by every backend that is configured from a TOML table.
pub trait ConfigSchema: Send + Sync {
	/// Checks required keys, value types and ranges of `config`.
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError>;
}
