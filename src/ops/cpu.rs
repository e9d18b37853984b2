//! Built-in CPU utility operators
//!
//! # CPU Operators
//!
//! Numeric kernels are supplied by whoever populates the registry; this module
//! only ships the handful of structural operators every net runtime needs.
//!
//! ## Implemented Ops
//!
//! - `NoOp`: any inputs, any outputs, does nothing. Handy as a
//!   synchronization point in DAG nets.
//! - `Copy`: makes its output share its input's payload (no data copy).
//!   Fails if the input blob is still empty.
//!
//! ## Gradients
//!
//! - `NoOp` has no gradient.
//! - `Copy` back-propagates with another `Copy`, from `Y_grad` to `X_grad`.

use crate::definition::OperatorDef;
use crate::error::Result;
use crate::gradient::GradientRegistry;
use crate::operator::{CpuContext, DeviceKernel, Operator, OperatorBase};
use crate::registry::OperatorRegistry;
use crate::schema::OpSchema;

/// An operator that does nothing.
#[derive(Debug)]
pub struct NoOp {
    base: OperatorBase,
}

impl NoOp {
    pub fn new(base: OperatorBase) -> Self {
        Self { base }
    }
}

impl Operator for NoOp {
    fn base(&self) -> &OperatorBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut OperatorBase {
        &mut self.base
    }

    fn run(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Shares the input payload into the output blob.
#[derive(Debug, Default, Clone, Copy)]
pub struct CopyKernel;

impl DeviceKernel<CpuContext> for CopyKernel {
    fn run_on_device(&mut self, base: &OperatorBase, _context: &mut CpuContext) -> Result<()> {
        let input = base.input(0);
        if input.is_empty() {
            return Err(base.execution_error(format!(
                "input blob {} is empty",
                base.def().inputs[0]
            )));
        }
        base.output(0).share_from(input);
        Ok(())
    }
}

/// Registers `NoOp` and `Copy` (schemas and default CPU factories).
///
/// # Errors
/// Only fails if a built-in schema is malformed.
pub fn register_cpu_operators(registry: &mut OperatorRegistry) -> Result<()> {
    registry.register_schema(
        OpSchema::new("Copy")
            .num_inputs(1, 1)
            .num_outputs(1, 1)
            .allow_inplace([(0, 0)]),
    )?;

    registry.register_cpu("NoOp", |base| Ok(Box::new(NoOp::new(base))));
    registry.register_kernel::<CpuContext, _, _>("Copy", None, |_| Ok(CopyKernel));
    Ok(())
}

/// Registers the gradients of the built-in operators.
pub fn register_gradients(gradients: &mut GradientRegistry) {
    gradients.register_no_gradient("NoOp");
    gradients.register_fn("Copy", |cx| {
        let grad_out = cx.grad_output(0)?;
        let grad_in = cx.grad_input(0);
        Ok(vec![OperatorDef::new("Copy", "", [grad_out], [grad_in])])
    });
}
