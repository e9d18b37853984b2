//! Operator, argument and net definitions.
//!
//! These are the already-parsed descriptions the runtime consumes. Reading
//! them from a wire format is left to the caller; this module only provides
//! the in-memory structures and a few builders to assemble them in code.
//!
//! # Example
//!
//! ```rust
//! use briny_net::definition::{Argument, OperatorDef};
//! use briny_net::device::DeviceOption;
//!
//! let def = OperatorDef::new("Foo", "", ["in"], ["out"])
//!     .with_arg(Argument::int("axis", 1))
//!     .with_device(DeviceOption::cpu())
//!     .with_engine("FAST,SLOW");
//! assert_eq!(def.engines().collect::<Vec<_>>(), ["FAST", "SLOW"]);
//! ```

use crate::device::DeviceOption;

/// Separator between engine names in [`OperatorDef::engine`].
pub const ENGINE_SEPARATOR: char = ',';

/// The payload of an [`Argument`]; exactly one kind is populated.
#[derive(Debug, Clone, PartialEq)]
pub enum ArgValue {
    Float(f32),
    Int(i64),
    Str(String),
    Floats(Vec<f32>),
    Ints(Vec<i64>),
    Strings(Vec<String>),
}

impl ArgValue {
    /// Name of the populated field, as used in diagnostics.
    pub fn field_name(&self) -> &'static str {
        match self {
            Self::Float(_) => "f",
            Self::Int(_) => "i",
            Self::Str(_) => "s",
            Self::Floats(_) => "floats",
            Self::Ints(_) => "ints",
            Self::Strings(_) => "strings",
        }
    }
}

/// A named, typed operator parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct Argument {
    pub name: String,
    pub value: ArgValue,
}

impl Argument {
    pub fn new(name: impl Into<String>, value: ArgValue) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }

    pub fn float(name: impl Into<String>, v: f32) -> Self {
        Self::new(name, ArgValue::Float(v))
    }

    pub fn int(name: impl Into<String>, v: i64) -> Self {
        Self::new(name, ArgValue::Int(v))
    }

    pub fn string(name: impl Into<String>, v: impl Into<String>) -> Self {
        Self::new(name, ArgValue::Str(v.into()))
    }

    pub fn floats(name: impl Into<String>, v: impl Into<Vec<f32>>) -> Self {
        Self::new(name, ArgValue::Floats(v.into()))
    }

    pub fn ints(name: impl Into<String>, v: impl Into<Vec<i64>>) -> Self {
        Self::new(name, ArgValue::Ints(v.into()))
    }

    pub fn strings<S: Into<String>>(name: impl Into<String>, v: impl IntoIterator<Item = S>) -> Self {
        Self::new(name, ArgValue::Strings(v.into_iter().map(Into::into).collect()))
    }
}

/// Description of a single operator.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct OperatorDef {
    /// Optional instance name; may be empty.
    pub name: String,
    /// Registry key.
    pub op_type: String,
    pub device_option: DeviceOption,
    /// Comma-separated engine preference list, most preferred first.
    pub engine: String,
    pub inputs: Vec<String>,
    pub outputs: Vec<String>,
    pub args: Vec<Argument>,
}

impl OperatorDef {
    /// Creates a CPU operator definition with no engine and no arguments.
    pub fn new<I, O>(
        op_type: impl Into<String>,
        name: impl Into<String>,
        inputs: I,
        outputs: O,
    ) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
        O: IntoIterator,
        O::Item: Into<String>,
    {
        Self {
            name: name.into(),
            op_type: op_type.into(),
            device_option: DeviceOption::default(),
            engine: String::new(),
            inputs: inputs.into_iter().map(Into::into).collect(),
            outputs: outputs.into_iter().map(Into::into).collect(),
            args: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_arg(mut self, arg: Argument) -> Self {
        self.args.push(arg);
        self
    }

    #[must_use]
    pub fn with_args(mut self, args: impl IntoIterator<Item = Argument>) -> Self {
        self.args.extend(args);
        self
    }

    #[must_use]
    pub fn with_device(mut self, device_option: impl Into<DeviceOption>) -> Self {
        self.device_option = device_option.into();
        self
    }

    #[must_use]
    pub fn with_engine(mut self, engine: impl Into<String>) -> Self {
        self.engine = engine.into();
        self
    }

    /// Engine names in preference order.
    ///
    /// The engine field is split on [`ENGINE_SEPARATOR`]; each entry is
    /// trimmed and empty entries are dropped, so `""`, `","` and `" "` all
    /// mean "no engine preference".
    pub fn engines(&self) -> impl Iterator<Item = &str> {
        parse_engines(&self.engine)
    }
}

/// Splits an engine preference string into its non-empty, trimmed entries.
pub fn parse_engines(engine: &str) -> impl Iterator<Item = &str> {
    engine
        .split(ENGINE_SEPARATOR)
        .map(str::trim)
        .filter(|e| !e.is_empty())
}

/// Description of a net: an ordered operator list plus a scheduling model.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NetDef {
    pub name: String,
    /// Scheduling model: `"simple"` (or empty) or `"dag"`.
    pub net_type: String,
    /// Worker count hint for the DAG model.
    pub num_workers: usize,
    pub ops: Vec<OperatorDef>,
    /// Blobs fed from outside the net; created before any operator is built.
    pub external_inputs: Vec<String>,
    /// Blobs the caller expects to read after a run.
    pub external_outputs: Vec<String>,
}

impl NetDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_type(mut self, net_type: impl Into<String>) -> Self {
        self.net_type = net_type.into();
        self
    }

    #[must_use]
    pub fn with_workers(mut self, num_workers: usize) -> Self {
        self.num_workers = num_workers;
        self
    }

    #[must_use]
    pub fn with_op(mut self, op: OperatorDef) -> Self {
        self.ops.push(op);
        self
    }

    #[must_use]
    pub fn with_external_input(mut self, name: impl Into<String>) -> Self {
        self.external_inputs.push(name.into());
        self
    }

    #[must_use]
    pub fn with_external_output(mut self, name: impl Into<String>) -> Self {
        self.external_outputs.push(name.into());
        self
    }
}
