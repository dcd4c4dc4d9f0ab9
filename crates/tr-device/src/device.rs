use std::fmt;
use std::str::FromStr;

use tr_dispatch::{BackendComponent, DispatchKeySet};

use crate::error::{DeviceError, Result};

/// Index of a device within its type. `-1` means "the current device".
pub type DeviceIndex = i8;

/// Supported device families.
#[allow(clippy::upper_case_acronyms)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(i8)]
pub enum DeviceType {
    CPU = 0,
    CUDA = 1,
}

impl DeviceType {
    pub const COUNT: usize = 2;

    pub const ALL: [DeviceType; Self::COUNT] = [DeviceType::CPU, DeviceType::CUDA];

    pub const fn ordinal(self) -> usize {
        self as usize
    }

    pub const fn from_ordinal(ordinal: usize) -> Option<DeviceType> {
        match ordinal {
            0 => Some(DeviceType::CPU),
            1 => Some(DeviceType::CUDA),
            _ => None,
        }
    }

    pub const fn name(self, lower_case: bool) -> &'static str {
        match (self, lower_case) {
            (DeviceType::CPU, true) => "cpu",
            (DeviceType::CPU, false) => "CPU",
            (DeviceType::CUDA, true) => "cuda",
            (DeviceType::CUDA, false) => "CUDA",
        }
    }

    /// Look up a device type by its lower-case name.
    pub fn from_name(name: &str) -> Result<DeviceType> {
        Self::ALL
            .into_iter()
            .find(|t| t.name(true) == name)
            .ok_or_else(|| DeviceError::InvalidDeviceName(name.to_string()))
    }

    pub const fn backend_component(self) -> BackendComponent {
        match self {
            DeviceType::CPU => BackendComponent::CPUBit,
            DeviceType::CUDA => BackendComponent::CUDABit,
        }
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name(false))
    }
}

/// A device: a type plus an optional index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Device {
    device_type: DeviceType,
    index: DeviceIndex,
}

impl Device {
    /// # Errors
    /// The index must be -1 or non-negative, and at most 0 for CPU.
    pub fn new(device_type: DeviceType, index: DeviceIndex) -> Result<Device> {
        let device = Device { device_type, index };
        device.validate()?;
        Ok(device)
    }

    /// The CPU device without an index.
    pub const fn cpu() -> Device {
        Device {
            device_type: DeviceType::CPU,
            index: -1,
        }
    }

    /// A device of `device_type` meaning "whichever one is current".
    pub const fn current_of(device_type: DeviceType) -> Device {
        Device {
            device_type,
            index: -1,
        }
    }

    fn validate(&self) -> Result<()> {
        if self.index < -1 {
            return Err(DeviceError::NegativeDeviceIndex(self.index));
        }
        if self.is_cpu() && self.index > 0 {
            return Err(DeviceError::InvalidCpuIndex(self.index));
        }
        Ok(())
    }

    pub fn device_type(&self) -> DeviceType {
        self.device_type
    }

    pub fn index(&self) -> DeviceIndex {
        self.index
    }

    pub fn has_index(&self) -> bool {
        self.index != -1
    }

    pub fn is_cpu(&self) -> bool {
        self.device_type == DeviceType::CPU
    }

    pub fn is_cuda(&self) -> bool {
        self.device_type == DeviceType::CUDA
    }

    /// The backend bit operations on this device dispatch through.
    pub fn dispatch_key_set(&self) -> DispatchKeySet {
        DispatchKeySet::from(self.device_type.backend_component())
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.device_type.name(true))?;
        if self.has_index() {
            write!(f, ":{}", self.index)?;
        }
        Ok(())
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum ParseState {
    Start,
    IndexStart,
    IndexRest,
    Error,
}

/// Parses `name` or `name:index`, e.g. `cpu`, `cuda:1`.
///
/// The name is ASCII letters or `_`. The index is decimal without a leading
/// zero (`cuda:0` is fine, `cuda:01` is not).
impl FromStr for Device {
    type Err = DeviceError;

    fn from_str(s: &str) -> Result<Device> {
        if s.is_empty() {
            return Err(DeviceError::EmptyDeviceString);
        }

        let mut name = String::new();
        let mut index = String::new();
        let mut state = ParseState::Start;
        for ch in s.chars() {
            state = match state {
                ParseState::Start if ch == ':' => ParseState::IndexStart,
                ParseState::Start if ch.is_ascii_alphabetic() || ch == '_' => {
                    name.push(ch);
                    ParseState::Start
                }
                ParseState::IndexStart | ParseState::IndexRest
                    if ch.is_ascii_digit() && !index.starts_with('0') =>
                {
                    index.push(ch);
                    ParseState::IndexRest
                }
                _ => ParseState::Error,
            };
            if state == ParseState::Error {
                break;
            }
        }

        if name.is_empty() || state == ParseState::Error || state == ParseState::IndexStart {
            return Err(DeviceError::InvalidDeviceString(s.to_string()));
        }

        let device_type = DeviceType::from_name(&name)?;
        let index = if index.is_empty() {
            -1
        } else {
            index
                .parse::<DeviceIndex>()
                .map_err(|_| DeviceError::InvalidDeviceIndex {
                    index: index.clone(),
                    device: s.to_string(),
                })?
        };
        Device::new(device_type, index)
    }
}
