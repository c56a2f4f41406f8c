//! Shadowed-API adapter generation
//!
//! Synthesizes JVM adapter classes whose static bridge methods let desugared
//! code (which sees mirrored `j$/...` types) call platform APIs that still
//! take and return the built-in `java/...` types.
//!
//! ```rust,ignore
//! use compiler::adapter::{generate_adapter_classes, DesugarAdapterResolver};
//! use compiler::classfile::ClassFileOptions;
//! use compiler::langmodel::InvocationSiteRecord;
//!
//! let record = InvocationSiteRecord::load("sites.json")?;
//! let artifacts = generate_adapter_classes(
//!     &record,
//!     &DesugarAdapterResolver::default(),
//!     &ClassFileOptions::default(),
//! )?;
//! compiler::deliver::write_to_dir(&artifacts, "out".as_ref())?;
//! ```

pub mod adapter;
pub mod classfile;
pub mod config;
pub mod deliver;
pub mod langmodel;
pub mod logging;
