//! The operator execution unit.
//!
//! # Anatomy
//!
//! - [`OperatorBase`] holds what every operator shares: its definition, the
//!   blob handles its inputs and outputs resolve to, the engine that built it
//!   and its lifecycle [`OperatorState`].
//! - [`Operator`] is the runnable interface handed out by dispatch.
//! - [`DeviceOperator`] adapts a [`DeviceKernel`] to [`Operator`], wrapping each
//!   run with the device [`Context`] set-up and synchronization.
//!
//! Building an [`OperatorBase`] resolves every input to an existing blob (a
//! never-created input is an error) and creates every output blob, so outputs
//! exist in the workspace before anything runs.
//!
//! # Failure
//!
//! A failed run may leave partially written outputs behind; restoring them
//! is the caller's business.

use std::sync::Arc;

use crate::argument::{ArgType, ArgumentHelper};
use crate::definition::OperatorDef;
use crate::device::{DeviceOption, DeviceType};
use crate::error::{Error, Result};
use crate::workspace::{Blob, Workspace};

/// Lifecycle of an operator instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OperatorState {
    /// Blobs are bound; dispatch has not finished with it yet.
    #[default]
    Constructed,
    /// Returned by dispatch and runnable.
    Ready,
    Running,
    Completed,
    Failed,
}

/// State shared by every operator implementation.
#[derive(Debug)]
pub struct OperatorBase {
    def: Arc<OperatorDef>,
    inputs: Vec<Arc<Blob>>,
    outputs: Vec<Arc<Blob>>,
    engine: String,
    state: OperatorState,
}

impl OperatorBase {
    /// Binds `def` to blobs in `ws`.
    ///
    /// # Errors
    /// [`Error::BlobNotFound`] if an input blob has never been created.
    pub fn new(def: Arc<OperatorDef>, ws: &Workspace) -> Result<Self> {
        let inputs = def
            .inputs
            .iter()
            .map(|name| ws.get_blob(name))
            .collect::<Result<Vec<_>>>()?;
        let outputs = def.outputs.iter().map(|name| ws.create_blob(name)).collect();

        Ok(Self {
            def,
            inputs,
            outputs,
            engine: String::new(),
            state: OperatorState::Constructed,
        })
    }

    pub fn def(&self) -> &OperatorDef {
        &self.def
    }

    /// Shared handle to the definition.
    pub fn def_arc(&self) -> &Arc<OperatorDef> {
        &self.def
    }

    pub fn name(&self) -> &str {
        &self.def.name
    }

    pub fn op_type(&self) -> &str {
        &self.def.op_type
    }

    pub fn device_option(&self) -> DeviceOption {
        self.def.device_option
    }

    pub fn device_type(&self) -> DeviceType {
        self.def.device_option.device_type
    }

    /// Engine whose factory built this operator; empty for the default one.
    pub fn engine(&self) -> &str {
        &self.engine
    }

    pub(crate) fn set_engine(&mut self, engine: &str) {
        self.engine = engine.to_string();
    }

    pub fn state(&self) -> OperatorState {
        self.state
    }

    pub(crate) fn set_state(&mut self, state: OperatorState) {
        self.state = state;
    }

    pub fn input(&self, idx: usize) -> &Arc<Blob> {
        &self.inputs[idx]
    }

    pub fn output(&self, idx: usize) -> &Arc<Blob> {
        &self.outputs[idx]
    }

    pub fn inputs(&self) -> &[Arc<Blob>] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[Arc<Blob>] {
        &self.outputs
    }

    pub fn input_size(&self) -> usize {
        self.inputs.len()
    }

    pub fn output_size(&self) -> usize {
        self.outputs.len()
    }

    pub fn args(&self) -> ArgumentHelper<'_> {
        ArgumentHelper::new(&self.def.args)
    }

    pub fn has_argument(&self, name: &str) -> bool {
        self.args().has_argument(name)
    }

    /// See [`ArgumentHelper::single_argument`].
    ///
    /// # Panics
    /// Panics if the argument exists with a different kind.
    pub fn single_argument<T: ArgType>(&self, name: &str, default: T) -> T {
        self.args().single_argument(name, default)
    }

    /// See [`ArgumentHelper::repeated_argument`].
    ///
    /// # Panics
    /// Panics if the argument exists with a different kind.
    pub fn repeated_argument<T: ArgType>(&self, name: &str) -> Vec<T> {
        self.args().repeated_argument(name)
    }

    /// See [`ArgumentHelper::try_single_argument`].
    pub fn try_single_argument<T: ArgType>(&self, name: &str, default: T) -> Result<T> {
        self.args().try_single_argument(name, default)
    }

    /// See [`ArgumentHelper::try_repeated_argument`].
    pub fn try_repeated_argument<T: ArgType>(&self, name: &str) -> Result<Vec<T>> {
        self.args().try_repeated_argument(name)
    }

    /// An [`Error::Execution`] tagged with this operator's type and name.
    pub fn execution_error(&self, message: impl Into<String>) -> Error {
        Error::Execution {
            op_type: self.def.op_type.clone(),
            name: self.def.name.clone(),
            message: message.into(),
        }
    }
}

/// A runnable operator.
pub trait Operator: Send {
    fn base(&self) -> &OperatorBase;

    fn base_mut(&mut self) -> &mut OperatorBase;

    /// Runs to completion.
    fn run(&mut self) -> Result<()>;

    /// Runs on the device's own concurrency model.
    ///
    /// Completion is still reported through the returned result. The default
    /// simply runs synchronously.
    fn run_async(&mut self) -> Result<()> {
        self.run()
    }
}

impl dyn Operator {
    /// Runs synchronously, tracking [`OperatorState`] and tagging errors
    /// with the operator's identity.
    pub fn execute(&mut self) -> Result<()> {
        self.execute_with(|op| op.run())
    }

    /// Like [`execute`](Self::execute) but through [`Operator::run_async`].
    pub fn execute_async(&mut self) -> Result<()> {
        self.execute_with(|op| op.run_async())
    }

    fn execute_with(&mut self, f: impl FnOnce(&mut Self) -> Result<()>) -> Result<()> {
        self.base_mut().set_state(OperatorState::Running);
        match f(self) {
            Ok(()) => {
                self.base_mut().set_state(OperatorState::Completed);
                Ok(())
            }
            Err(e) => {
                self.base_mut().set_state(OperatorState::Failed);
                Err(match e {
                    e @ Error::Execution { .. } => e,
                    other => self.base().execution_error(other.to_string()),
                })
            }
        }
    }
}

/// Device-side state an operator runs against.
pub trait Context: Send + 'static {
    /// The device kind this context drives.
    const DEVICE: DeviceType;

    /// Creates the context for the given device option.
    fn new(option: &DeviceOption) -> Self
    where
        Self: Sized;

    /// Makes this context's device current for the calling thread.
    fn switch_to_device(&mut self) {}

    /// Blocks until work queued on the device has finished.
    fn finish_device_computation(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Host execution context.
#[derive(Debug, Clone, Copy, Default)]
pub struct CpuContext;

impl Context for CpuContext {
    const DEVICE: DeviceType = DeviceType::Cpu;

    fn new(_option: &DeviceOption) -> Self {
        CpuContext
    }
}

/// Device-bound body of an operator.
pub trait DeviceKernel<C: Context>: Send {
    fn run_on_device(&mut self, base: &OperatorBase, context: &mut C) -> Result<()>;
}

/// An [`Operator`] made from a [`DeviceKernel`] and its [`Context`].
pub struct DeviceOperator<C: Context, K: DeviceKernel<C>> {
    base: OperatorBase,
    context: C,
    kernel: K,
}

impl<C: Context, K: DeviceKernel<C>> DeviceOperator<C, K> {
    pub fn new(base: OperatorBase, kernel: K) -> Self {
        let context = C::new(&base.device_option());
        Self {
            base,
            context,
            kernel,
        }
    }

    pub fn context(&self) -> &C {
        &self.context
    }

    pub fn kernel(&self) -> &K {
        &self.kernel
    }
}

impl<C: Context, K: DeviceKernel<C>> Operator for DeviceOperator<C, K> {
    fn base(&self) -> &OperatorBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut OperatorBase {
        &mut self.base
    }

    fn run(&mut self) -> Result<()> {
        self.context.switch_to_device();
        self.kernel.run_on_device(&self.base, &mut self.context)?;
        self.context.finish_device_computation()
    }

    fn run_async(&mut self) -> Result<()> {
        self.context.switch_to_device();
        self.kernel.run_on_device(&self.base, &mut self.context)
    }
}

/// CPU operator built from a [`DeviceKernel`].
pub type CpuOperator<K> = DeviceOperator<CpuContext, K>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::Argument;

    struct Fails;

    impl DeviceKernel<CpuContext> for Fails {
        fn run_on_device(&mut self, _base: &OperatorBase, _context: &mut CpuContext) -> Result<()> {
            Err(Error::msg("Throwing an exception."))
        }
    }

    #[test]
    fn base_requires_inputs_and_creates_outputs() {
        let ws = Workspace::new();
        let def = Arc::new(OperatorDef::new("T", "t", ["input"], ["output"]));
        assert!(matches!(
            OperatorBase::new(Arc::clone(&def), &ws),
            Err(Error::BlobNotFound(_))
        ));
        ws.create_blob("input");
        let base = OperatorBase::new(def, &ws).unwrap();
        assert!(ws.has_blob("output"));
        assert_eq!(base.state(), OperatorState::Constructed);
        assert_eq!(base.input_size(), 1);
    }

    #[test]
    fn execute_tags_errors_and_tracks_state() {
        let ws = Workspace::new();
        let def = OperatorDef::new("ThrowException", "thrower", Vec::<String>::new(), Vec::<String>::new())
            .with_arg(Argument::int("n", 1));
        let base = OperatorBase::new(Arc::new(def), &ws).unwrap();
        let mut op: Box<dyn Operator> = Box::new(CpuOperator::new(base, Fails));

        let err = op.execute().unwrap_err();
        assert!(matches!(
            &err,
            Error::Execution { op_type, name, message }
                if op_type == "ThrowException" && name == "thrower" && message.contains("Throwing")
        ));
        assert_eq!(op.base().state(), OperatorState::Failed);
        assert!(op.execute_async().is_err());
        assert_eq!(op.base().single_argument::<i64>("n", 0), 1);
    }
}
