//! Parameter validation against a tool's declared JSON Schema

use super::result::ValidationError;
use jsonschema::JSONSchema;
use serde_json::Value;

/// Compiled validator for a tool's parameter schema
pub struct ParameterValidator {
    compiled: JSONSchema,
}

impl std::fmt::Debug for ParameterValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParameterValidator").finish_non_exhaustive()
    }
}

impl ParameterValidator {
    /// Compile a JSON Schema document
    pub fn compile(schema: &Value) -> Result<Self, String> {
        let compiled = JSONSchema::options()
            .compile(schema)
            .map_err(|e| e.to_string())?;
        Ok(Self { compiled })
    }

    /// Validate a parameter object, collecting every violation
    pub fn validate(&self, parameters: &Value) -> Result<(), Vec<ValidationError>> {
        self.compiled.validate(parameters).map_err(|errors| {
            errors
                .map(|e| ValidationError::new(e.instance_path.to_string(), e.to_string()))
                .collect()
        })
    }
}
