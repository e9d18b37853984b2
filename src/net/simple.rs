//! Sequential net: operators run one after another in definition order.
//!
//! Operator `i + 1` never starts before operator `i` has completed, and the
//! first failure stops the run.

use tracing::info_span;

use super::{instantiate, Net};
use crate::definition::NetDef;
use crate::error::Result;
use crate::operator::Operator;
use crate::registry::OperatorRegistry;
use crate::workspace::Workspace;

pub struct SimpleNet {
    name: String,
    ops: Vec<Box<dyn Operator>>,
}

impl SimpleNet {
    /// Dispatches every operator of `def` against `ws`.
    ///
    /// # Errors
    /// See [`create_net`](super::create_net).
    pub fn new(registry: &OperatorRegistry, def: &NetDef, ws: &Workspace) -> Result<Self> {
        Ok(Self {
            name: def.name.clone(),
            ops: instantiate(registry, def, ws)?,
        })
    }

    /// The operators, in execution order.
    pub fn operators(&self) -> &[Box<dyn Operator>] {
        &self.ops
    }

    fn run_with(&mut self, run_async: bool) -> Result<()> {
        let span = info_span!("simple_net_run", net = %self.name, ops = self.ops.len());
        let _guard = span.enter();

        for (idx, op) in self.ops.iter_mut().enumerate() {
            let result = if run_async {
                op.execute_async()
            } else {
                op.execute()
            };
            if let Err(e) = result {
                tracing::error!(op = idx, op_type = op.base().op_type(), error = %e, "operator failed, aborting net");
                return Err(e);
            }
        }
        Ok(())
    }
}

impl Net for SimpleNet {
    fn name(&self) -> &str {
        &self.name
    }

    fn run(&mut self) -> Result<()> {
        self.run_with(false)
    }

    fn run_async(&mut self) -> Result<()> {
        self.run_with(true)
    }

    fn len(&self) -> usize {
        self.ops.len()
    }
}
