//! briny_net: operator dispatch and net scheduling for computation graphs.
//!
//! A computation graph is described as plain data ([`definition::NetDef`],
//! [`definition::OperatorDef`]) and turned into runnable operators by looking
//! implementations up in an [`registry::OperatorRegistry`], keyed by operator
//! type, device and engine.
//!
//! # Features
//!
//! - Per-device operator registry with named engine variants and automatic
//!   fallback to the default implementation.
//! - Typed access to operator arguments.
//! - Schema checks (arity, in-place rules) at construction time.
//! - Gradient registry producing the backward operators of an operator.
//! - Two net execution models: sequential and dependency-driven parallel.
//!
//! # Modules
//!
//! - [`definition`]: Operator and net definitions.
//! - [`argument`]: Typed argument helpers.
//! - [`device`]: Device kinds and device options.
//! - [`schema`]: Arity and in-place constraints.
//! - [`workspace`]: Named, type-erased blob storage.
//! - [`operator`]: The operator execution unit and device contexts.
//! - [`registry`]: Factories, schemas and engine preferences.
//! - [`ops`]: Dispatch and built-in CPU operators.
//! - [`gradient`]: Gradient generator registry.
//! - [`net`]: Simple and DAG nets.
//! - [`error`]: Error taxonomy.
//!
//! # Example
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
//! let net_def = NetDef::new("example")
//!     .with_external_input("in")
//!     .with_op(OperatorDef::new("Copy", "copy", ["in"], ["out"]))
//!     .with_external_output("out");
//!
//! let ws = Workspace::new();
//! ws.feed("in", vec![1.0_f32, 2.0]);
//! let mut net = create_net(&registry, &net_def, &ws).unwrap();
//! net.run().unwrap();
//! assert_eq!(*ws.fetch::<Vec<f32>>("out").unwrap(), vec![1.0, 2.0]);
//! ```

pub mod argument;
pub mod definition;
pub mod device;
pub mod error;
pub mod gradient;
pub mod net;
pub mod operator;
pub mod ops;
pub mod registry;
pub mod schema;
pub mod workspace;

pub use error::{ConstructError, Error, Result};
