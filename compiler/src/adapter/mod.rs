//! Adapter class generation
//!
//! Given the call sites that desugared code cannot make directly (because
//! their signatures use built-in types the desugaring mirrored), this module
//! synthesizes static bridge methods that convert mirrored arguments,
//! forward to the original target, and convert the result back. Bridges are
//! grouped into one synthetic class per adapter owner:
//!
//! - `resolver`: site → adapter site, type classification, converter lookup
//! - `class_builder`: per-owner class lifecycle
//! - `emitter`: bridge method bodies and their stack bookkeeping
//! - `generator`: the run itself
//! - `artifact`: lazily serialized output

pub mod artifact;
pub mod class_builder;
pub mod emitter;
pub mod generator;
pub mod resolver;

pub use artifact::GeneratedArtifact;
pub use class_builder::{AdapterClassBuilder, BridgeMethodSpec, BuilderState, ClosedAdapterClass};
pub use emitter::{emit_bridge_method, EmittedBridge, StackTracker};
pub use generator::{
    generate_adapter_classes, generate_with_summary, AdapterGenerator, ClosedAdapters,
    EmittedAdapters, GenerationSummary,
};
pub use resolver::{AdapterResolver, DesugarAdapterResolver, ResolveError, TypeClass};

use crate::classfile::ClassFileError;
use crate::langmodel::ClassName;
use std::fmt;

/// Errors that abort a generation run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdapterGenError {
    /// A site resolved to an owner that was not seen while grouping.
    MissingAdapterOwner {
        owner: ClassName,
        available: Vec<ClassName>,
    },
    DuplicateBridgeMethod {
        owner: ClassName,
        name: String,
        descriptor: String,
    },
    /// Adapter arguments or return do not line up with the original call.
    DescriptorMismatch { original: String, adapter: String },
    Resolve(ResolveError),
    ClassFile(ClassFileError),
}

impl AdapterGenError {
    /// Whether the error reveals inconsistent input from upstream (as
    /// opposed to a collaborator or encoding failure).
    pub fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            AdapterGenError::MissingAdapterOwner { .. }
                | AdapterGenError::DuplicateBridgeMethod { .. }
                | AdapterGenError::DescriptorMismatch { .. }
        )
    }
}

impl fmt::Display for AdapterGenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdapterGenError::MissingAdapterOwner { owner, available } => {
                let names: Vec<&str> = available.iter().map(ClassName::binary_name).collect();
                write!(
                    f,
                    "No adapter class builder for owner '{}' (known owners: [{}])",
                    owner,
                    names.join(", ")
                )
            }
            AdapterGenError::DuplicateBridgeMethod {
                owner,
                name,
                descriptor,
            } => write!(f, "Duplicate bridge method {}.{}{}", owner, name, descriptor),
            AdapterGenError::DescriptorMismatch { original, adapter } => write!(
                f,
                "Adapter method {} does not match the stack shape of {}",
                adapter, original
            ),
            AdapterGenError::Resolve(e) => write!(f, "{}", e),
            AdapterGenError::ClassFile(e) => write!(f, "Class file error: {}", e),
        }
    }
}

impl std::error::Error for AdapterGenError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AdapterGenError::Resolve(e) => Some(e),
            AdapterGenError::ClassFile(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ResolveError> for AdapterGenError {
    fn from(e: ResolveError) -> Self {
        AdapterGenError::Resolve(e)
    }
}

impl From<ClassFileError> for AdapterGenError {
    fn from(e: ClassFileError) -> Self {
        AdapterGenError::ClassFile(e)
    }
}
