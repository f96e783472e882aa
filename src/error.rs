//! Crate-level error types.

use std::fmt;

use crate::descriptor::allocator::AllocationError;
use crate::device::DeviceError;
use crate::upload::UploadError;

/// Errors produced by the kiln crate.
#[derive(Debug)]
pub enum KilnError {
    /// Descriptor allocation failure.
    Allocation(AllocationError),
    /// Device backend failure outside an allocation.
    Device(DeviceError),
    /// Staging upload failure.
    Upload(UploadError),
    /// TOML options parsing/serialization failure.
    OptionsParse(String),
    /// Generic I/O failure.
    Io(std::io::Error),
}

impl fmt::Display for KilnError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Allocation(e) => {
                write!(f, "descriptor allocation error: {e}")
            }
            Self::Device(e) => write!(f, "device error: {e}"),
            Self::Upload(e) => write!(f, "upload error: {e}"),
            Self::OptionsParse(msg) => {
                write!(f, "options parse error: {msg}")
            }
            Self::Io(e) => write!(f, "I/O error: {e}"),
        }
    }
}

impl std::error::Error for KilnError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Allocation(e) => Some(e),
            Self::Device(e) => Some(e),
            Self::Upload(e) => Some(e),
            Self::Io(e) => Some(e),
            Self::OptionsParse(_) => None,
        }
    }
}

impl From<AllocationError> for KilnError {
    fn from(e: AllocationError) -> Self {
        Self::Allocation(e)
    }
}

impl From<DeviceError> for KilnError {
    fn from(e: DeviceError) -> Self {
        Self::Device(e)
    }
}

impl From<UploadError> for KilnError {
    fn from(e: UploadError) -> Self {
        Self::Upload(e)
    }
}

impl From<std::io::Error> for KilnError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}
