//! # Operator Dispatch Layer
//!
//! Turns operator definitions into runnable operators by picking an
//! implementation from the [`OperatorRegistry`](crate::registry::OperatorRegistry),
//! and provides the handful of built-in CPU operators.
//!
//! ## Submodules
//!
//! - [`dispatch`]: Engine selection with fallback to the default implementation
//! - [`cpu`]: Built-in CPU operators (`NoOp`, `Copy`) and their gradients
//!
//! ## Engine Selection
//!
//! An operator type may have several implementations per device, keyed by
//! engine name. Callers ask for engines through the definition, per-type
//! preferences, or device-wide preferences; an engine that is missing or
//! declines the definition is skipped, and the default implementation is the
//! last resort.
//!
//! Example:
//! ```rust
//! use briny_net::definition::OperatorDef;
//! use briny_net::ops::{cpu, dispatch::create_operator};
//! use briny_net::registry::OperatorRegistry;
//! use briny_net::workspace::Workspace;
//!
//! let mut registry = OperatorRegistry::new();
//! cpu::register_cpu_operators(&mut registry).unwrap();
//!
//! let ws = Workspace::new();
//! let def = OperatorDef::new("NoOp", "", Vec::<String>::new(), ["out"]).with_engine("FAST");
//! let op = create_operator(&registry, &def, &ws).unwrap();
//! assert_eq!(op.base().engine(), ""); // no FAST engine, default used
//! assert!(ws.has_blob("out"));
//! ```
//!
//! ## Extending
//!
//! 1. Implement [`Operator`](crate::operator::Operator) directly, or a
//!    [`DeviceKernel`](crate::operator::DeviceKernel) for a device context
//! 2. Register a factory under the operator type, device and (optionally) engine
//! 3. Register an [`OpSchema`](crate::schema::OpSchema) to get arity and
//!    in-place checks at construction

pub mod cpu;
pub mod dispatch;
