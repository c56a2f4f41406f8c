//! Language model for JVM-level call sites
//!
//! Class names, type and method descriptors, invocation sites and the
//! call-site record that drives adapter generation. Everything here is
//! immutable once constructed and validated on construction.

pub mod class_name;
pub mod descriptor;
pub mod invocation;
pub mod record;

pub use class_name::*;
pub use descriptor::*;
pub use invocation::*;
pub use record::*;

use std::fmt;

/// Errors raised while parsing names and descriptors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DescriptorError {
    InvalidClassName(String),
    InvalidMethodName(String),
    UnexpectedChar {
        descriptor: String,
        position: usize,
        found: char,
    },
    UnexpectedEnd(String),
    TrailingCharacters(String),
    /// `V` used where a value type is required.
    VoidValue(String),
    TooManyDimensions(String),
    /// Parameters need more than 255 local slots.
    TooManyArgumentSlots(String),
}

impl fmt::Display for DescriptorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DescriptorError::InvalidClassName(name) => write!(f, "Invalid class name '{}'", name),
            DescriptorError::InvalidMethodName(name) => write!(f, "Invalid method name '{}'", name),
            DescriptorError::UnexpectedChar {
                descriptor,
                position,
                found,
            } => write!(
                f,
                "Unexpected '{}' at offset {} in descriptor '{}'",
                found, position, descriptor
            ),
            DescriptorError::UnexpectedEnd(d) => write!(f, "Descriptor '{}' ends unexpectedly", d),
            DescriptorError::TrailingCharacters(d) => {
                write!(f, "Trailing characters in descriptor '{}'", d)
            }
            DescriptorError::VoidValue(d) => write!(f, "'V' is not a value type in '{}'", d),
            DescriptorError::TooManyDimensions(d) => {
                write!(f, "Array descriptor '{}' exceeds 255 dimensions", d)
            }
            DescriptorError::TooManyArgumentSlots(d) => {
                write!(f, "Method descriptor '{}' needs more than 255 argument slots", d)
            }
        }
    }
}

impl std::error::Error for DescriptorError {}
