//! Operator Dispatch Layer
//!
//! This module turns an [`OperatorDef`] into a runnable [`Operator`] by
//! consulting the [`OperatorRegistry`] for the definition's type and device.
//!
//! Each definition attempts implementations in priority order:
//! 1. The engines listed in the definition's `engine` field, left to right
//! 2. The registry's per-operator engine preference for the device
//! 3. The registry's global engine preference for the device
//! 4. Falls back to the engine-less default implementation
//!
//! # Design Highlights
//! - **First success, not first match**: an engine that is registered but
//!   declines the configuration (by returning
//!   [`ConstructError::Unsupported`]) is skipped, and the next candidate is
//!   tried without the caller knowing.
//! - **Missing routes are not failures**: an engine with no factory for this
//!   type and device is silently skipped.
//! - **Everything else is fatal**: arity violations, unreadable inputs and
//!   genuine construction failures abort dispatch immediately.
//!
//! # Example
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
//! ws.feed("x", 1.5_f32);
//! let def = OperatorDef::new("Copy", "", ["x"], ["y"]).with_engine("CUDNN,FAST");
//! let mut op = create_operator(&registry, &def, &ws).unwrap(); // neither engine exists: default
//! assert_eq!(op.base().engine(), "");
//! op.execute().unwrap();
//! assert_eq!(*ws.fetch::<f32>("y").unwrap(), 1.5);
//! ```

use std::sync::Arc;

use crate::definition::OperatorDef;
use crate::error::{ConstructError, Error, Result};
use crate::operator::{Operator, OperatorBase, OperatorState};
use crate::registry::{OperatorFactory, OperatorRegistry};
use crate::workspace::Workspace;

/// Builds an operator for `def`, falling back across engines.
///
/// # Errors
/// - [`Error::Arity`] / [`Error::InPlace`] if the definition breaks its schema
/// - [`Error::BlobNotFound`] if an input blob was never created
/// - [`Error::Construction`] if a factory fails for a reason other than
///   declining the configuration
/// - [`Error::NotRegistered`] if nothing could build it
pub fn create_operator(
    registry: &OperatorRegistry,
    def: &OperatorDef,
    ws: &Workspace,
) -> Result<Box<dyn Operator>> {
    create_operator_shared(registry, Arc::new(def.clone()), ws)
}

/// Like [`create_operator`] but reuses an already shared definition.
pub fn create_operator_shared(
    registry: &OperatorRegistry,
    def: Arc<OperatorDef>,
    ws: &Workspace,
) -> Result<Box<dyn Operator>> {
    let device = def.device_option.device_type;

    if let Some(schema) = registry.schema(&def.op_type) {
        schema.verify(&def)?;
    }

    let candidates = candidate_engines(registry, &def);
    for engine in &candidates {
        let Some(factory) = registry.lookup(&def.op_type, device, engine) else {
            tracing::trace!(op_type = %def.op_type, %device, engine, "engine not registered, skipping");
            continue;
        };
        if let Some(op) = try_build(&factory, &def, ws, engine)? {
            return Ok(op);
        }
    }

    let Some(factory) = registry.lookup_default(&def.op_type, device) else {
        return Err(Error::NotRegistered {
            op_type: def.op_type.clone(),
            device,
            engines: candidates.join(","),
        });
    };
    match try_build(&factory, &def, ws, "")? {
        Some(op) => Ok(op),
        None => Err(Error::Construction {
            op_type: def.op_type.clone(),
            engine: String::new(),
            source: Box::new(Error::msg("default implementation declined the configuration")),
        }),
    }
}

/// The definition's engines followed by the registry's preferences, without
/// repeats.
fn candidate_engines<'a>(registry: &'a OperatorRegistry, def: &'a OperatorDef) -> Vec<&'a str> {
    let mut engines: Vec<&str> = Vec::new();
    let preferred = registry.engine_preference(&def.op_type, def.device_option.device_type);
    for engine in def.engines().chain(preferred) {
        if !engines.contains(&engine) {
            engines.push(engine);
        }
    }
    engines
}

/// One construction attempt.
///
/// Returns `Ok(None)` when the factory declines the configuration.
fn try_build(
    factory: &OperatorFactory,
    def: &Arc<OperatorDef>,
    ws: &Workspace,
    engine: &str,
) -> Result<Option<Box<dyn Operator>>> {
    let base = OperatorBase::new(Arc::clone(def), ws)?;

    match factory(base) {
        Ok(mut op) => {
            for output in &def.outputs {
                ws.create_blob(output);
            }
            let base = op.base_mut();
            base.set_engine(engine);
            base.set_state(OperatorState::Ready);
            tracing::debug!(op_type = %def.op_type, name = %def.name, engine, "operator constructed");
            Ok(Some(op))
        }
        Err(ConstructError::Unsupported(reason)) => {
            tracing::debug!(op_type = %def.op_type, engine, %reason, "engine declined, falling back");
            Ok(None)
        }
        Err(ConstructError::Failed(source)) => Err(Error::Construction {
            op_type: def.op_type.clone(),
            engine: engine.to_string(),
            source: Box::new(source),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::DeviceType;
    use crate::ops::cpu::NoOp;

    #[test]
    fn candidates_keep_definition_order_then_preferences() {
        let mut registry = OperatorRegistry::new();
        registry.register_cpu("T", |base| Ok(Box::new(NoOp::new(base))));
        registry.set_global_engine_pref(DeviceType::Cpu, ["G", "A"]);
        registry.set_per_op_engine_pref("T", DeviceType::Cpu, ["P"]).unwrap();

        let def = OperatorDef::new("T", "", Vec::<String>::new(), Vec::<String>::new()).with_engine("A,B");
        assert_eq!(candidate_engines(&registry, &def), ["A", "B", "P", "G"]);
    }

    #[test]
    fn per_op_preference_requires_registration() {
        let mut registry = OperatorRegistry::new();
        assert!(matches!(
            registry.set_per_op_engine_pref("Missing", DeviceType::Cuda, ["X"]),
            Err(Error::NotRegistered { .. })
        ));
    }

    #[test]
    fn preference_selects_engine_without_definition_hint() {
        let mut registry = OperatorRegistry::new();
        registry.register_cpu("T", |base| Ok(Box::new(NoOp::new(base))));
        registry.register("T", DeviceType::Cpu, Some("FAST"), |base| Ok(Box::new(NoOp::new(base))));
        registry.set_global_engine_pref(DeviceType::Cpu, ["FAST"]);

        let ws = Workspace::new();
        let def = OperatorDef::new("T", "", Vec::<String>::new(), ["out"]);
        let op = create_operator(&registry, &def, &ws).unwrap();
        assert_eq!(op.base().engine(), "FAST");
        assert_eq!(op.base().state(), OperatorState::Ready);
    }

    #[test]
    fn failed_construction_is_fatal_even_with_a_default() {
        let mut registry = OperatorRegistry::new();
        registry.register_cpu("T", |base| Ok(Box::new(NoOp::new(base))));
        registry.register("T", DeviceType::Cpu, Some("BROKEN"), |_| {
            Err(ConstructError::Failed(Error::msg("out of handles")))
        });

        let ws = Workspace::new();
        let def = OperatorDef::new("T", "", Vec::<String>::new(), Vec::<String>::new()).with_engine("BROKEN");
        assert!(matches!(
            create_operator(&registry, &def, &ws),
            Err(Error::Construction { engine, .. }) if engine == "BROKEN"
        ));
    }
}
