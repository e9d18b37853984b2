//! Operator schemas: arity bounds and in-place rules.
//!
//! A schema is registered per operator type and checked by dispatch before
//! any implementation is constructed. Types without a schema are not checked.
//!
//! ```rust
//! use briny_net::schema::OpSchema;
//! use briny_net::definition::OperatorDef;
//!
//! let schema = OpSchema::new("JustTest").num_inputs(0, 1).num_outputs(0, 1);
//! assert!(schema.verify(&OperatorDef::new("JustTest", "", ["a"], ["b"])).is_ok());
//! assert!(schema.verify(&OperatorDef::new("JustTest", "", ["a", "c"], ["b"])).is_err());
//! ```

use briny::prelude::{Validate, ValidationError};

use crate::definition::OperatorDef;
use crate::error::{Error, Result};

/// Arity and aliasing constraints for one operator type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpSchema {
    op_type: String,
    min_inputs: usize,
    max_inputs: usize,
    min_outputs: usize,
    max_outputs: usize,
    allow_inplace: Vec<(usize, usize)>,
    enforce_inplace: Vec<(usize, usize)>,
}

impl OpSchema {
    /// A schema with unbounded arity and no in-place pairs.
    pub fn new(op_type: impl Into<String>) -> Self {
        Self {
            op_type: op_type.into(),
            min_inputs: 0,
            max_inputs: usize::MAX,
            min_outputs: 0,
            max_outputs: usize::MAX,
            allow_inplace: Vec::new(),
            enforce_inplace: Vec::new(),
        }
    }

    pub fn op_type(&self) -> &str {
        &self.op_type
    }

    /// Inclusive input count bounds.
    #[must_use]
    pub fn num_inputs(mut self, min: usize, max: usize) -> Self {
        self.min_inputs = min;
        self.max_inputs = max;
        self
    }

    /// Inclusive output count bounds.
    #[must_use]
    pub fn num_outputs(mut self, min: usize, max: usize) -> Self {
        self.min_outputs = min;
        self.max_outputs = max;
        self
    }

    /// `(input, output)` index pairs that may share a blob name.
    #[must_use]
    pub fn allow_inplace(mut self, pairs: impl IntoIterator<Item = (usize, usize)>) -> Self {
        self.allow_inplace.extend(pairs);
        self
    }

    /// `(input, output)` index pairs that must share a blob name.
    #[must_use]
    pub fn enforce_inplace(mut self, pairs: impl IntoIterator<Item = (usize, usize)>) -> Self {
        self.enforce_inplace.extend(pairs);
        self
    }

    pub fn input_bounds(&self) -> (usize, usize) {
        (self.min_inputs, self.max_inputs)
    }

    pub fn output_bounds(&self) -> (usize, usize) {
        (self.min_outputs, self.max_outputs)
    }

    /// Checks a definition against this schema.
    ///
    /// # Errors
    /// - [`Error::Arity`] when the input or output count is out of bounds.
    /// - [`Error::InPlace`] when an output reuses an input's blob without an
    ///   allowing pair, or an enforced pair does not share its blob.
    pub fn verify(&self, def: &OperatorDef) -> Result<()> {
        self.check_count("input", def.inputs.len(), self.min_inputs, self.max_inputs)?;
        self.check_count("output", def.outputs.len(), self.min_outputs, self.max_outputs)?;

        for (i, input) in def.inputs.iter().enumerate() {
            for (o, output) in def.outputs.iter().enumerate() {
                if input == output
                    && !self.allow_inplace.contains(&(i, o))
                    && !self.enforce_inplace.contains(&(i, o))
                {
                    return Err(self.inplace_error(i, o, input, "may not be computed in place"));
                }
            }
        }

        for &(i, o) in &self.enforce_inplace {
            if let (Some(input), Some(output)) = (def.inputs.get(i), def.outputs.get(o)) {
                if input != output {
                    return Err(self.inplace_error(i, o, output, "must be computed in place"));
                }
            }
        }

        Ok(())
    }

    fn check_count(&self, what: &'static str, got: usize, min: usize, max: usize) -> Result<()> {
        if got < min || got > max {
            return Err(Error::Arity {
                op_type: self.op_type.clone(),
                what,
                got,
                min,
                max,
            });
        }
        Ok(())
    }

    fn inplace_error(&self, input: usize, output: usize, blob: &str, reason: &'static str) -> Error {
        Error::InPlace {
            op_type: self.op_type.clone(),
            input,
            output,
            blob: blob.to_string(),
            reason,
        }
    }
}

impl Validate for OpSchema {
    /// A schema is well formed when both ranges are non-empty and every
    /// in-place pair lies within the maximum arity.
    fn validate(&self) -> core::result::Result<(), ValidationError> {
        if self.op_type.is_empty()
            || self.min_inputs > self.max_inputs
            || self.min_outputs > self.max_outputs
        {
            return Err(ValidationError);
        }
        let in_range = |&(i, o): &(usize, usize)| i < self.max_inputs && o < self.max_outputs;
        if !self.allow_inplace.iter().all(in_range) || !self.enforce_inplace.iter().all(in_range) {
            return Err(ValidationError);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn just_test() -> OpSchema {
        OpSchema::new("JustTest").num_inputs(0, 1).num_outputs(0, 1)
    }

    #[test]
    fn arity_bounds_are_inclusive() {
        let schema = just_test();
        assert!(schema.verify(&OperatorDef::new("JustTest", "", Vec::<String>::new(), Vec::<String>::new())).is_ok());
        let err = schema
            .verify(&OperatorDef::new("JustTest", "", ["a"], ["b", "c"]))
            .unwrap_err();
        assert!(matches!(err, Error::Arity { what: "output", got: 2, min: 0, max: 1, .. }));
    }

    #[test]
    fn inplace_requires_permission() {
        let def = OperatorDef::new("Relu", "", ["x"], ["x"]);
        assert!(matches!(
            OpSchema::new("Relu").verify(&def),
            Err(Error::InPlace { .. })
        ));
        assert!(OpSchema::new("Relu").allow_inplace([(0, 0)]).verify(&def).is_ok());
    }

    #[test]
    fn enforced_inplace_must_share_blob() {
        let schema = OpSchema::new("Update").enforce_inplace([(0, 0)]);
        assert!(schema.verify(&OperatorDef::new("Update", "", ["w"], ["w"])).is_ok());
        assert!(schema.verify(&OperatorDef::new("Update", "", ["w"], ["w2"])).is_err());
    }

    #[test]
    fn malformed_schema_fails_validation() {
        assert!(just_test().validate().is_ok());
        assert!(OpSchema::new("Bad").num_inputs(2, 1).validate().is_err());
        assert!(OpSchema::new("Bad").num_outputs(0, 1).allow_inplace([(0, 3)]).validate().is_err());
    }
}
