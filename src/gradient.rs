//! Gradient operator registry.
//!
//! # Deriving Backward Operators
//!
//! For each forward operator type a [`GradientMaker`] is registered. Given a
//! forward [`OperatorDef`] and the gradients available for its outputs, the
//! maker emits the backward operator definitions and records which blob holds
//! the gradient of each forward input.
//!
//! ## Naming
//!
//! - A blob `X` has the canonical dense gradient `X_grad`.
//! - Sparse gradients are split into `X_grad_indices` and `X_grad_values`.
//! - Makers refer to blobs by position through [`GradientContext`]
//!   (`input(i)`, `grad_output(i)`, `grad_input(i)`, ...) and never hardcode
//!   names; a maker may still override a gradient name with
//!   [`GradientContext::set_dense`] or [`GradientContext::set_sparse`].
//!
//! ## Inherited Fields
//!
//! Unless the maker opts out, each generated definition inherits the forward
//! definition's device option and engine, and gets the forward arguments
//! appended to its own.
//!
//! # Example
//!
//! ```rust
//! use briny_net::definition::OperatorDef;
//! use briny_net::gradient::{GradientRegistry, GradientWrapper};
//!
//! let mut gradients = GradientRegistry::new();
//! gradients.register_fn("Foo", |cx| {
//!     Ok(vec![OperatorDef::new("FooGradient", "", [cx.grad_output(0)?], [cx.grad_input(0)])])
//! });
//!
//! let def = OperatorDef::new("Foo", "", ["in"], ["out"]);
//! let meta = gradients.gradient_for_op(&def, &[GradientWrapper::dense("out_grad")]).unwrap();
//! assert_eq!(meta.ops[0].inputs, ["out_grad"]);
//! assert_eq!(meta.ops[0].outputs, ["in_grad"]);
//! assert_eq!(meta.g_input[0], GradientWrapper::dense("in_grad"));
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use crate::definition::OperatorDef;
use crate::error::{Error, Result};

/// Suffix appended to a blob name to form its gradient's name.
pub const GRADIENT_SUFFIX: &str = "_grad";

/// Canonical dense gradient name of `name`.
pub fn gradient_name(name: &str) -> String {
    format!("{name}{GRADIENT_SUFFIX}")
}

/// Where the gradient of one blob lives.
///
/// Empty means no gradient is required or produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GradientWrapper {
    pub dense: String,
    pub indices: String,
    pub values: String,
}

impl GradientWrapper {
    pub fn dense(name: impl Into<String>) -> Self {
        Self {
            dense: name.into(),
            ..Self::default()
        }
    }

    pub fn sparse(indices: impl Into<String>, values: impl Into<String>) -> Self {
        Self {
            dense: String::new(),
            indices: indices.into(),
            values: values.into(),
        }
    }

    pub fn is_dense(&self) -> bool {
        !self.dense.is_empty()
    }

    pub fn is_sparse(&self) -> bool {
        !self.indices.is_empty() && !self.values.is_empty()
    }

    pub fn is_empty(&self) -> bool {
        !self.is_dense() && !self.is_sparse()
    }
}

/// Backward operators plus the gradient of each forward input.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GradientOpsMeta {
    pub ops: Vec<OperatorDef>,
    /// One entry per forward input, in input order.
    pub g_input: Vec<GradientWrapper>,
}

/// What a [`GradientMaker`] sees while generating backward operators.
#[derive(Debug)]
pub struct GradientContext<'a> {
    def: &'a OperatorDef,
    g_output: &'a [GradientWrapper],
    g_input: Vec<GradientWrapper>,
}

impl<'a> GradientContext<'a> {
    fn new(def: &'a OperatorDef, g_output: &'a [GradientWrapper]) -> Self {
        Self {
            def,
            g_output,
            g_input: vec![GradientWrapper::default(); def.inputs.len()],
        }
    }

    /// The forward definition.
    pub fn def(&self) -> &'a OperatorDef {
        self.def
    }

    /// Name of forward input `i`.
    ///
    /// # Panics
    /// Panics if `i` is out of range, as do all positional accessors.
    pub fn input(&self, i: usize) -> String {
        self.def.inputs[i].clone()
    }

    /// Name of forward output `i`.
    pub fn output(&self, i: usize) -> String {
        self.def.outputs[i].clone()
    }

    /// Marks input `i` as having the dense gradient `<input>_grad` and returns
    /// that name.
    pub fn grad_input(&mut self, i: usize) -> String {
        let name = gradient_name(&self.def.inputs[i]);
        self.g_input[i] = GradientWrapper::dense(name.clone());
        name
    }

    /// Marks input `i` as having a sparse gradient and returns its
    /// `(indices, values)` names.
    pub fn grad_input_sparse(&mut self, i: usize) -> (String, String) {
        let base = gradient_name(&self.def.inputs[i]);
        let indices = format!("{base}_indices");
        let values = format!("{base}_values");
        self.g_input[i] = GradientWrapper::sparse(indices.clone(), values.clone());
        (indices, values)
    }

    /// Overrides the gradient of input `i` with a dense blob.
    pub fn set_dense(&mut self, i: usize, name: impl Into<String>) {
        self.g_input[i] = GradientWrapper::dense(name);
    }

    /// Overrides the gradient of input `i` with a sparse pair.
    pub fn set_sparse(&mut self, i: usize, indices: impl Into<String>, values: impl Into<String>) {
        self.g_input[i] = GradientWrapper::sparse(indices, values);
    }

    /// Whether output `i` has any gradient flowing back.
    pub fn has_grad_output(&self, i: usize) -> bool {
        !self.g_output[i].is_empty()
    }

    /// Dense gradient of output `i`.
    ///
    /// # Errors
    /// [`Error::GradientMismatch`] if that gradient is not dense.
    pub fn grad_output(&self, i: usize) -> Result<String> {
        let g = &self.g_output[i];
        if !g.is_dense() {
            return Err(self.mismatch(format!("gradient of output {i} is not dense")));
        }
        Ok(g.dense.clone())
    }

    /// Indices blob of the sparse gradient of output `i`.
    ///
    /// # Errors
    /// [`Error::GradientMismatch`] if that gradient is not sparse.
    pub fn grad_output_indices(&self, i: usize) -> Result<String> {
        Ok(self.sparse_output(i)?.indices.clone())
    }

    /// Values blob of the sparse gradient of output `i`.
    ///
    /// # Errors
    /// [`Error::GradientMismatch`] if that gradient is not sparse.
    pub fn grad_output_values(&self, i: usize) -> Result<String> {
        Ok(self.sparse_output(i)?.values.clone())
    }

    fn sparse_output(&self, i: usize) -> Result<&GradientWrapper> {
        let g = &self.g_output[i];
        if !g.is_sparse() {
            return Err(self.mismatch(format!("gradient of output {i} is not sparse")));
        }
        Ok(g)
    }

    fn mismatch(&self, message: String) -> Error {
        Error::GradientMismatch {
            op_type: self.def.op_type.clone(),
            message,
        }
    }
}

/// Generates the backward operators of one forward operator type.
pub trait GradientMaker: Send + Sync {
    fn gradient_defs(&self, cx: &mut GradientContext<'_>) -> Result<Vec<OperatorDef>>;

    /// Whether generated defs take the forward device option.
    fn copy_device_option(&self) -> bool {
        true
    }

    /// Whether generated defs take the forward engine.
    fn copy_engine(&self) -> bool {
        true
    }

    /// Whether the forward arguments are appended to generated defs.
    fn copy_arguments(&self) -> bool {
        true
    }
}

impl<F> GradientMaker for F
where
    F: Fn(&mut GradientContext<'_>) -> Result<Vec<OperatorDef>> + Send + Sync,
{
    fn gradient_defs(&self, cx: &mut GradientContext<'_>) -> Result<Vec<OperatorDef>> {
        self(cx)
    }
}

#[derive(Clone)]
enum Entry {
    Maker(Arc<dyn GradientMaker>),
    NoGradient,
}

/// Forward operator type to gradient maker.
#[derive(Default)]
pub struct GradientRegistry {
    makers: HashMap<String, Entry>,
}

impl GradientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the maker for `op_type`.
    ///
    /// Returns `false` (keeping the first maker) if one was already there.
    pub fn register<M: GradientMaker + 'static>(&mut self, op_type: &str, maker: M) -> bool {
        self.insert(op_type, Entry::Maker(Arc::new(maker)))
    }

    /// Registers a closure as the maker for `op_type`.
    pub fn register_fn<F>(&mut self, op_type: &str, maker: F) -> bool
    where
        F: Fn(&mut GradientContext<'_>) -> Result<Vec<OperatorDef>> + Send + Sync + 'static,
    {
        self.register(op_type, maker)
    }

    /// Declares that `op_type` has no gradient; asking for one yields no
    /// backward operators and no input gradients.
    pub fn register_no_gradient(&mut self, op_type: &str) -> bool {
        self.insert(op_type, Entry::NoGradient)
    }

    fn insert(&mut self, op_type: &str, entry: Entry) -> bool {
        if self.makers.contains_key(op_type) {
            tracing::warn!(op_type, "gradient already registered, keeping the first maker");
            return false;
        }
        self.makers.insert(op_type.to_string(), entry);
        true
    }

    pub fn contains(&self, op_type: &str) -> bool {
        self.makers.contains_key(op_type)
    }

    /// Derives the backward operators of `def`.
    ///
    /// `g_output` holds one wrapper per forward output.
    ///
    /// # Errors
    /// - [`Error::NoGradient`] if nothing is registered for `def.op_type`.
    /// - [`Error::GradientMismatch`] if `g_output` does not match the output
    ///   count or the maker rejects the gradients it was given.
    pub fn gradient_for_op(&self, def: &OperatorDef, g_output: &[GradientWrapper]) -> Result<GradientOpsMeta> {
        let entry = self
            .makers
            .get(&def.op_type)
            .ok_or_else(|| Error::NoGradient(def.op_type.clone()))?;

        if g_output.len() != def.outputs.len() {
            return Err(Error::GradientMismatch {
                op_type: def.op_type.clone(),
                message: format!(
                    "expected {} output gradients, got {}",
                    def.outputs.len(),
                    g_output.len()
                ),
            });
        }

        let maker = match entry {
            Entry::NoGradient => {
                return Ok(GradientOpsMeta {
                    ops: Vec::new(),
                    g_input: vec![GradientWrapper::default(); def.inputs.len()],
                });
            }
            Entry::Maker(maker) => maker,
        };

        let mut cx = GradientContext::new(def, g_output);
        let mut ops = maker.gradient_defs(&mut cx)?;
        for op in &mut ops {
            if maker.copy_device_option() {
                op.device_option = def.device_option;
            }
            if maker.copy_engine() {
                op.engine.clone_from(&def.engine);
            }
            if maker.copy_arguments() {
                op.args.extend(def.args.iter().cloned());
            }
        }

        tracing::debug!(op_type = %def.op_type, generated = ops.len(), "gradient operators generated");
        Ok(GradientOpsMeta {
            ops,
            g_input: cx.g_input,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct SparseLookupGradient;

    impl GradientMaker for SparseLookupGradient {
        fn gradient_defs(&self, cx: &mut GradientContext<'_>) -> Result<Vec<OperatorDef>> {
            let (indices, values) = cx.grad_input_sparse(0);
            Ok(vec![OperatorDef::new(
                "LookupGradient",
                "",
                [cx.input(1), cx.grad_output(0)?],
                [indices, values],
            )])
        }

        fn copy_arguments(&self) -> bool {
            false
        }
    }

    #[test]
    fn sparse_input_gradient_is_recorded() {
        let mut gradients = GradientRegistry::new();
        gradients.register("Lookup", SparseLookupGradient);
        let def = OperatorDef::new("Lookup", "", ["table", "ids"], ["rows"])
            .with_arg(crate::definition::Argument::int("dim", 4));

        let meta = gradients
            .gradient_for_op(&def, &[GradientWrapper::dense("rows_grad")])
            .unwrap();
        assert_eq!(meta.ops[0].outputs, ["table_grad_indices", "table_grad_values"]);
        assert!(meta.ops[0].args.is_empty());
        assert!(meta.g_input[0].is_sparse());
        assert!(meta.g_input[1].is_empty());
    }

    #[test]
    fn output_gradient_count_must_match() {
        let mut gradients = GradientRegistry::new();
        gradients.register("Lookup", SparseLookupGradient);
        let def = OperatorDef::new("Lookup", "", ["table", "ids"], ["rows"]);
        assert!(matches!(
            gradients.gradient_for_op(&def, &[]),
            Err(Error::GradientMismatch { .. })
        ));
    }

    #[test]
    fn sparse_output_gradient_where_dense_is_needed_fails() {
        let mut gradients = GradientRegistry::new();
        gradients.register("Lookup", SparseLookupGradient);
        let def = OperatorDef::new("Lookup", "", ["table", "ids"], ["rows"]);
        let g = [GradientWrapper::sparse("i", "v")];
        assert!(matches!(
            gradients.gradient_for_op(&def, &g),
            Err(Error::GradientMismatch { .. })
        ));
    }

    #[test]
    fn no_gradient_yields_empty_meta() {
        let mut gradients = GradientRegistry::new();
        assert!(gradients.register_no_gradient("Shape"));
        assert!(!gradients.register_no_gradient("Shape"));
        let def = OperatorDef::new("Shape", "", ["x"], ["s"]);
        let meta = gradients
            .gradient_for_op(&def, &[GradientWrapper::default()])
            .unwrap();
        assert!(meta.ops.is_empty());
        assert_eq!(meta.g_input, vec![GradientWrapper::default()]);
    }
}
