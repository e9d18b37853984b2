//! Operator registry.
//!
//! Maps `(operator type, device)` to a default factory plus any number of
//! engine-specific factories, and keeps the operator schemas and engine
//! preferences dispatch consults.
//!
//! The registry is an ordinary value: build one, populate it in whatever
//! order the program (or test) wants, and pass it by reference to
//! [`create_operator`](crate::ops::dispatch::create_operator) and
//! [`create_net`](crate::net::create_net).
//!
//! # Registration Semantics
//!
//! - Registration is additive; an entry is never replaced.
//! - Registering the same key twice is not an error. The first factory stays
//!   and the call returns `false`.
//!
//! # Example
//!
//! ```rust
//! use briny_net::registry::OperatorRegistry;
//! use briny_net::ops::cpu::NoOp;
//! use briny_net::device::DeviceType;
//!
//! let mut registry = OperatorRegistry::new();
//! assert!(registry.register_cpu("NoOp", |base| Ok(Box::new(NoOp::new(base)))));
//! assert!(registry.lookup_default("NoOp", DeviceType::Cpu).is_some());
//! assert!(registry.lookup("NoOp", DeviceType::Cpu, "FAST").is_none());
//! ```

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use briny::prelude::Validate;

use crate::device::DeviceType;
use crate::error::{ConstructError, Error, Result};
use crate::operator::{Context, DeviceKernel, DeviceOperator, Operator, OperatorBase};
use crate::schema::OpSchema;

/// Builds an operator from its bound [`OperatorBase`].
pub type OperatorFactory = Arc<
    dyn Fn(OperatorBase) -> core::result::Result<Box<dyn Operator>, ConstructError> + Send + Sync,
>;

#[derive(Default)]
struct DeviceEntry {
    default: Option<OperatorFactory>,
    engines: BTreeMap<String, OperatorFactory>,
}

/// Factories, schemas and engine preferences for every operator type.
#[derive(Default)]
pub struct OperatorRegistry {
    factories: HashMap<(String, DeviceType), DeviceEntry>,
    schemas: HashMap<String, OpSchema>,
    global_engine_pref: HashMap<DeviceType, Vec<String>>,
    per_op_engine_pref: HashMap<(String, DeviceType), Vec<String>>,
}

impl OperatorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `factory` for `(op_type, device)`, under `engine` when given
    /// or as the default implementation otherwise.
    ///
    /// Returns `false` if the key was already registered; the existing
    /// factory is kept.
    pub fn register<F>(
        &mut self,
        op_type: &str,
        device: DeviceType,
        engine: Option<&str>,
        factory: F,
    ) -> bool
    where
        F: Fn(OperatorBase) -> core::result::Result<Box<dyn Operator>, ConstructError>
            + Send
            + Sync
            + 'static,
    {
        let entry = self
            .factories
            .entry((op_type.to_string(), device))
            .or_default();
        let taken = match engine {
            Some(engine) => match entry.engines.entry(engine.to_string()) {
                Entry::Occupied(_) => true,
                Entry::Vacant(slot) => {
                    slot.insert(Arc::new(factory));
                    false
                }
            },
            None if entry.default.is_some() => true,
            None => {
                entry.default = Some(Arc::new(factory));
                false
            }
        };

        if taken {
            tracing::warn!(op_type, %device, engine, "operator already registered, keeping the first factory");
            return false;
        }
        true
    }

    /// Registers the default CPU implementation.
    pub fn register_cpu<F>(&mut self, op_type: &str, factory: F) -> bool
    where
        F: Fn(OperatorBase) -> core::result::Result<Box<dyn Operator>, ConstructError>
            + Send
            + Sync
            + 'static,
    {
        self.register(op_type, DeviceType::Cpu, None, factory)
    }

    /// Registers the default CUDA implementation.
    pub fn register_cuda<F>(&mut self, op_type: &str, factory: F) -> bool
    where
        F: Fn(OperatorBase) -> core::result::Result<Box<dyn Operator>, ConstructError>
            + Send
            + Sync
            + 'static,
    {
        self.register(op_type, DeviceType::Cuda, None, factory)
    }

    /// Registers a [`DeviceKernel`] on its context's device.
    ///
    /// `make` builds the kernel from the bound base and may decline the
    /// configuration with [`ConstructError::Unsupported`].
    pub fn register_kernel<C, K, F>(&mut self, op_type: &str, engine: Option<&str>, make: F) -> bool
    where
        C: Context,
        K: DeviceKernel<C> + 'static,
        F: Fn(&OperatorBase) -> core::result::Result<K, ConstructError> + Send + Sync + 'static,
    {
        self.register(op_type, C::DEVICE, engine, move |base| {
            let kernel = make(&base)?;
            Ok(Box::new(DeviceOperator::<C, K>::new(base, kernel)))
        })
    }

    /// The factory registered for `engine`, if any.
    pub fn lookup(&self, op_type: &str, device: DeviceType, engine: &str) -> Option<OperatorFactory> {
        self.entry(op_type, device)?.engines.get(engine).cloned()
    }

    /// The engine-less factory, if any.
    pub fn lookup_default(&self, op_type: &str, device: DeviceType) -> Option<OperatorFactory> {
        self.entry(op_type, device)?.default.clone()
    }

    /// Whether any implementation (default or engine) exists.
    pub fn contains(&self, op_type: &str, device: DeviceType) -> bool {
        self.entry(op_type, device)
            .is_some_and(|e| e.default.is_some() || !e.engines.is_empty())
    }

    /// Registered operator types for `device`, sorted.
    pub fn keys(&self, device: DeviceType) -> Vec<&str> {
        let mut keys: Vec<&str> = self
            .factories
            .keys()
            .filter(|(_, d)| *d == device)
            .map(|(t, _)| t.as_str())
            .collect();
        keys.sort_unstable();
        keys
    }

    /// Engines registered for `(op_type, device)`, sorted.
    pub fn engines(&self, op_type: &str, device: DeviceType) -> Vec<&str> {
        self.entry(op_type, device)
            .map(|e| e.engines.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }

    fn entry(&self, op_type: &str, device: DeviceType) -> Option<&DeviceEntry> {
        self.factories.get(&(op_type.to_string(), device))
    }

    /// Registers the schema for its operator type.
    ///
    /// Returns `false` if the type already had one (the first stays).
    ///
    /// # Errors
    /// Fails if the schema is malformed (empty type, inverted bounds, in-place
    /// pairs outside the arity).
    pub fn register_schema(&mut self, schema: OpSchema) -> Result<bool> {
        let op_type = schema.op_type().to_string();
        schema
            .validate()
            .map_err(|_| Error::msg(format!("malformed schema for operator {op_type:?}")))?;

        if self.schemas.contains_key(&op_type) {
            tracing::warn!(op_type, "schema already registered, keeping the first one");
            return Ok(false);
        }
        self.schemas.insert(op_type, schema);
        Ok(true)
    }

    pub fn schema(&self, op_type: &str) -> Option<&OpSchema> {
        self.schemas.get(op_type)
    }

    /// Engines tried, after the definition's own, for every operator on
    /// `device`.
    pub fn set_global_engine_pref<S: Into<String>>(
        &mut self,
        device: DeviceType,
        engines: impl IntoIterator<Item = S>,
    ) {
        self.global_engine_pref
            .insert(device, engines.into_iter().map(Into::into).collect());
    }

    /// Engines tried, after the definition's own and before the global
    /// preference, for `op_type` on `device`.
    ///
    /// # Errors
    /// [`Error::NotRegistered`] if `op_type` has no implementation on `device`.
    pub fn set_per_op_engine_pref<S: Into<String>>(
        &mut self,
        op_type: &str,
        device: DeviceType,
        engines: impl IntoIterator<Item = S>,
    ) -> Result<()> {
        if !self.contains(op_type, device) {
            return Err(Error::NotRegistered {
                op_type: op_type.to_string(),
                device,
                engines: String::new(),
            });
        }
        self.per_op_engine_pref.insert(
            (op_type.to_string(), device),
            engines.into_iter().map(Into::into).collect(),
        );
        Ok(())
    }

    /// Preferred engines for `(op_type, device)`: per-op first, then global.
    pub fn engine_preference(&self, op_type: &str, device: DeviceType) -> impl Iterator<Item = &str> {
        let per_op = self
            .per_op_engine_pref
            .get(&(op_type.to_string(), device))
            .into_iter()
            .flatten();
        let global = self.global_engine_pref.get(&device).into_iter().flatten();
        per_op.chain(global).map(String::as_str)
    }
}
