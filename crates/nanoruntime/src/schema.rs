use jsonschema::Validator;
use nanocore::NodeError;
use serde_json::{json, Value};
use std::fmt;

/// A node's input/output schema pair, compiled once
pub struct Schemas {
    input: Value,
    output: Value,
    input_validator: Validator,
    output_validator: Validator,
}

impl Schemas {
    pub fn new(input: Value, output: Value) -> Result<Self, NodeError> {
        Ok(Self {
            input_validator: compile(&input)?,
            output_validator: compile(&output)?,
            input,
            output,
        })
    }

    /// Schemas that accept anything.
    pub fn permissive() -> Result<Self, NodeError> {
        Self::new(json!({}), json!({}))
    }

    pub fn input(&self) -> &Value {
        &self.input
    }

    pub fn output(&self) -> &Value {
        &self.output
    }

    pub fn validate_input(&self, instance: &Value) -> Result<(), NodeError> {
        check(&self.input_validator, instance)
    }

    pub fn validate_output(&self, instance: &Value) -> Result<(), NodeError> {
        check(&self.output_validator, instance)
    }
}

impl fmt::Debug for Schemas {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Schemas")
            .field("input", &self.input)
            .field("output", &self.output)
            .finish()
    }
}

fn compile(schema: &Value) -> Result<Validator, NodeError> {
    jsonschema::draft7::new(schema).map_err(|e| NodeError::InvalidSchema(e.to_string()))
}

/// Collect every violation, formatted `<path> <message>`, sorted and joined.
fn check(validator: &Validator, instance: &Value) -> Result<(), NodeError> {
    let mut violations: Vec<String> = validator
        .iter_errors(instance)
        .map(|error| {
            let path = error.instance_path.to_string();
            let path = if path.is_empty() { "/".to_string() } else { path };
            format!("{} {}", path, error)
        })
        .collect();

    if violations.is_empty() {
        return Ok(());
    }
    violations.sort();
    Err(NodeError::Validation(violations.join(", ")))
}
