//! # Net Execution Models
//!
//! A net is an ordered list of operator definitions bound to a workspace and
//! run under one of two scheduling models:
//!
//! - [`simple`]: strict definition order on the calling thread.
//! - [`dag`]: dependency-driven parallel execution on a bounded worker pool.
//!
//! ## Construction
//!
//! [`create_net`] picks the model from [`NetDef::net_type`], creates the
//! declared external inputs and every blob an operator reads, dispatches
//! every operator definition in order (so each operator sees the outputs of
//! the ones before it), and checks that every declared external output ended
//! up in the workspace.
//!
//! ## Failure
//!
//! A net either completes or fails as a whole. After a failure the contents
//! of the workspace are unspecified and should not be used.
//!
//! ## Example
//!
//! ```rust
//! use briny_net::definition::{NetDef, OperatorDef};
//! use briny_net::net::create_net;
//! use briny_net::ops::cpu;
//! use briny_net::registry::OperatorRegistry;
//! use briny_net::workspace::Workspace;
//!
//! let mut registry = OperatorRegistry::new();
//! cpu::register_cpu_operators(&mut registry).unwrap();
//!
//! let net_def = NetDef::new("copy_chain")
//!     .with_type("dag")
//!     .with_workers(2)
//!     .with_external_input("x")
//!     .with_op(OperatorDef::new("Copy", "", ["x"], ["hidden"]))
//!     .with_op(OperatorDef::new("Copy", "", ["hidden"], ["y"]));
//!
//! let ws = Workspace::new();
//! let mut net = create_net(&registry, &net_def, &ws).unwrap();
//! ws.feed("x", 42_u32);
//! net.run().unwrap();
//! assert_eq!(*ws.fetch::<u32>("y").unwrap(), 42);
//! ```

pub mod dag;
pub mod simple;

use crate::definition::NetDef;
use crate::error::{Error, Result};
use crate::operator::Operator;
use crate::ops::dispatch::create_operator;
use crate::registry::OperatorRegistry;
use crate::workspace::Workspace;

pub use dag::DagNet;
pub use simple::SimpleNet;

/// A constructed, runnable net.
pub trait Net: Send {
    fn name(&self) -> &str;

    /// Runs every operator once.
    ///
    /// # Errors
    /// The first operator failure, tagged with the operator's identity.
    fn run(&mut self) -> Result<()>;

    /// Runs every operator once through [`Operator::run_async`].
    fn run_async(&mut self) -> Result<()> {
        self.run()
    }

    /// Number of operators in the net.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Scheduling model named by [`NetDef::net_type`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NetKind {
    /// `"simple"` or empty.
    #[default]
    Simple,
    /// `"dag"`.
    Dag,
}

impl NetKind {
    /// Parses a net type name.
    ///
    /// # Errors
    /// [`Error::UnknownNetType`] for anything but `""`, `"simple"` or `"dag"`.
    pub fn parse(net_type: &str) -> Result<Self> {
        match net_type {
            "" | "simple" => Ok(Self::Simple),
            "dag" => Ok(Self::Dag),
            other => Err(Error::UnknownNetType(other.to_string())),
        }
    }
}

/// Builds the net described by `def` over `ws`.
///
/// # Errors
/// - [`Error::UnknownNetType`] for an unsupported `net_type`
/// - any dispatch error of any operator
/// - [`Error::BlobNotFound`] if a declared external output is never produced
pub fn create_net(registry: &OperatorRegistry, def: &NetDef, ws: &Workspace) -> Result<Box<dyn Net>> {
    Ok(match NetKind::parse(&def.net_type)? {
        NetKind::Simple => Box::new(SimpleNet::new(registry, def, ws)?),
        NetKind::Dag => Box::new(DagNet::new(registry, def, ws)?),
    })
}

/// Creates every input blob the net references, then dispatches every
/// operator in order.
fn instantiate(registry: &OperatorRegistry, def: &NetDef, ws: &Workspace) -> Result<Vec<Box<dyn Operator>>> {
    let op_inputs = def.ops.iter().flat_map(|op| &op.inputs);
    for input in def.external_inputs.iter().chain(op_inputs) {
        ws.create_blob(input);
    }

    let ops = def
        .ops
        .iter()
        .map(|op_def| create_operator(registry, op_def, ws))
        .collect::<Result<Vec<_>>>()?;

    if let Some(missing) = def.external_outputs.iter().find(|name| !ws.has_blob(name)) {
        return Err(Error::BlobNotFound(missing.clone()));
    }

    tracing::debug!(net = %def.name, ops = ops.len(), "net instantiated");
    Ok(ops)
}
