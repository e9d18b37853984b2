//! Device kinds and per-operator device options.
//!
//! Operators are registered per [`DeviceType`], and every
//! [`OperatorDef`](crate::definition::OperatorDef) carries a [`DeviceOption`]
//! naming where it should run.
//!
//! # Supported Devices
//!
//! - `Cpu`: host execution (default).
//! - `Cuda`: an accelerator. The runtime only routes on it; kernels and
//!   memory management for it are supplied by whoever registers operators.
//!
//! Engine names are free-form strings and are only meaningful relative to what
//! was registered for a given type and device.

use core::convert::TryFrom;
use core::fmt;

/// Enumeration of supported device kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
#[repr(u8)]
pub enum DeviceType {
    /// Host CPU (default).
    #[default]
    Cpu = 0,
    /// CUDA-style accelerator.
    Cuda,
}

impl DeviceType {
    /// All device kinds, in registry order.
    pub const ALL: [DeviceType; 2] = [DeviceType::Cpu, DeviceType::Cuda];

    /// Short lowercase name, as used in log output.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cpu => "cpu",
            Self::Cuda => "cuda",
        }
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<u8> for DeviceType {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Cpu),
            1 => Ok(Self::Cuda),
            _ => Err(()),
        }
    }
}

/// Where an operator should run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct DeviceOption {
    /// Kind of device.
    pub device_type: DeviceType,
    /// Index of the device among devices of the same kind.
    pub device_id: u32,
}

impl DeviceOption {
    /// Device option for the host CPU.
    pub const fn cpu() -> Self {
        Self {
            device_type: DeviceType::Cpu,
            device_id: 0,
        }
    }

    /// Device option for the accelerator with the given index.
    pub const fn cuda(device_id: u32) -> Self {
        Self {
            device_type: DeviceType::Cuda,
            device_id,
        }
    }
}

impl From<DeviceType> for DeviceOption {
    fn from(device_type: DeviceType) -> Self {
        Self {
            device_type,
            device_id: 0,
        }
    }
}
