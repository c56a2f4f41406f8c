//! Per-owner adapter class accumulation
//!
//! An [`AdapterClassBuilder`] owns the in-progress class for one adapter
//! owner. Closing it is a consuming conversion into [`ClosedAdapterClass`],
//! which only exposes read access, so a closed class cannot receive methods.

use super::resolver::TypeClass;
use super::AdapterGenError;
use crate::classfile::access::{ACC_ABSTRACT, ACC_PUBLIC, ACC_STATIC, ACC_SYNTHETIC};
use crate::classfile::{ClassFileOptions, ClassWriter, MethodWriter};
use crate::langmodel::{ClassName, FieldType, MethodDescriptor, MethodInvocationSite};
use std::path::PathBuf;
use tracing::debug;

/// `public abstract synthetic`
pub const ADAPTER_CLASS_ACCESS: u16 = ACC_PUBLIC | ACC_ABSTRACT | ACC_SYNTHETIC;

/// `public static`
pub const BRIDGE_METHOD_ACCESS: u16 = ACC_PUBLIC | ACC_STATIC;

/// Shape of one bridge method, derived from its adapter call site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeMethodSpec {
    pub name: String,
    pub descriptor: MethodDescriptor,
    pub access: u16,
    /// Classification of each argument, in descriptor order.
    pub arguments: Vec<TypeClass>,
    /// `None` for void.
    pub return_class: Option<TypeClass>,
}

impl BridgeMethodSpec {
    pub fn from_adapter_site(
        adapter: &MethodInvocationSite,
        classify: impl Fn(&FieldType) -> TypeClass,
    ) -> Self {
        let descriptor = adapter.descriptor().clone();
        let arguments = descriptor.arguments().iter().map(&classify).collect();
        let return_class = descriptor.return_type().as_field_type().map(&classify);
        Self {
            name: adapter.name().to_string(),
            descriptor,
            access: BRIDGE_METHOD_ACCESS,
            arguments,
            return_class,
        }
    }

    pub fn conversion_count(&self) -> usize {
        let arguments = self.arguments.iter().filter(|c| c.is_mirrored()).count();
        let returned = self.return_class.as_ref().map_or(false, TypeClass::is_mirrored);
        arguments + usize::from(returned)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuilderState {
    /// Header written, no methods yet.
    Created,
    /// At least one bridge method finished.
    Emitting,
}

/// In-progress adapter class for a single owner.
#[derive(Debug)]
pub struct AdapterClassBuilder {
    owner: ClassName,
    writer: ClassWriter,
}

impl AdapterClassBuilder {
    pub fn new(owner: ClassName, options: ClassFileOptions) -> Result<Self, AdapterGenError> {
        let writer = ClassWriter::new(
            options,
            ADAPTER_CLASS_ACCESS,
            &owner,
            &ClassName::java_lang_object(),
            &[],
        )?;
        debug!("created adapter class {}", owner);
        Ok(Self {
            owner,
            writer,
        })
    }

    pub fn owner(&self) -> &ClassName {
        &self.owner
    }

    pub fn state(&self) -> BuilderState {
        if self.writer.method_count() == 0 {
            BuilderState::Created
        } else {
            BuilderState::Emitting
        }
    }

    /// Bridges whose bodies have been finished.
    pub fn method_count(&self) -> usize {
        self.writer.method_count()
    }

    /// Open the body of a new bridge method. Two bridges with the same name
    /// and descriptor cannot coexist in one class. The bridge only counts
    /// once its body is finished.
    pub fn begin_method(&mut self, spec: &BridgeMethodSpec) -> Result<MethodWriter<'_>, AdapterGenError> {
        if self.writer.has_method(&spec.name, &spec.descriptor) {
            return Err(AdapterGenError::DuplicateBridgeMethod {
                owner: self.owner.clone(),
                name: spec.name.clone(),
                descriptor: spec.descriptor.to_string(),
            });
        }
        debug!("  bridge {}.{}{}", self.owner, spec.name, spec.descriptor);

        Ok(self.writer.method(spec.access, &spec.name, &spec.descriptor, &[])?)
    }

    /// Finalize the class. No methods can be added afterwards.
    pub fn close(self) -> ClosedAdapterClass {
        debug!(
            "closed adapter class {} with {} method(s)",
            self.owner,
            self.writer.method_count()
        );
        ClosedAdapterClass {
            owner: self.owner,
            method_count: self.writer.method_count(),
            writer: self.writer,
        }
    }
}

/// A finished adapter class, ready for serialization.
#[derive(Debug, Clone)]
pub struct ClosedAdapterClass {
    owner: ClassName,
    method_count: usize,
    writer: ClassWriter,
}

impl ClosedAdapterClass {
    pub fn owner(&self) -> &ClassName {
        &self.owner
    }

    pub fn method_count(&self) -> usize {
        self.method_count
    }

    /// Relative class-file path, e.g. `i__typeadapter/a/BAdapter.class`.
    pub fn path(&self) -> PathBuf {
        self.owner.class_file_path()
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.writer.to_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::resolver::{AdapterResolver, DesugarAdapterResolver};
    use crate::classfile::{opcodes, ClassFileError, ClassReader};
    use crate::langmodel::{InvocationKind, MethodKey};

    fn spec(name: &str, desc: &str) -> BridgeMethodSpec {
        let resolver = DesugarAdapterResolver::default();
        let site = MethodInvocationSite::new(
            InvocationKind::Static,
            MethodKey::parse("i__typeadapter/a/BAdapter", name, desc).unwrap(),
            false,
        );
        BridgeMethodSpec::from_adapter_site(&site, |ty| resolver.classify(ty))
    }

    fn builder() -> AdapterClassBuilder {
        AdapterClassBuilder::new(
            ClassName::new("i__typeadapter/a/BAdapter").unwrap(),
            ClassFileOptions::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_spec_classification() {
        let bridge = spec("m", "(Lj$/time/Instant;ILjava/lang/String;)Lj$/time/Duration;");
        assert_eq!(bridge.access, 0x0009);
        assert_eq!(bridge.arguments.len(), 3);
        assert!(bridge.arguments[0].is_mirrored());
        assert!(!bridge.arguments[1].is_mirrored());
        assert!(!bridge.arguments[2].is_mirrored());
        assert_eq!(bridge.conversion_count(), 2);
        assert!(spec("v", "()V").return_class.is_none());
    }

    #[test]
    fn test_lifecycle() {
        let mut builder = builder();
        assert_eq!(builder.state(), BuilderState::Created);

        let mut method = builder.begin_method(&spec("m", "()V")).unwrap();
        method.insn(opcodes::RETURN);
        method.finish(0, 0).unwrap();
        assert_eq!(builder.state(), BuilderState::Emitting);
        assert_eq!(builder.method_count(), 1);

        let closed = builder.close();
        assert_eq!(closed.method_count(), 1);
        assert_eq!(closed.path(), PathBuf::from("i__typeadapter/a/BAdapter.class"));

        let parsed = ClassReader::parse(&closed.to_bytes()).unwrap();
        assert_eq!(parsed.access, 0x1401);
        assert_eq!(parsed.name, "i__typeadapter/a/BAdapter");
        assert_eq!(parsed.super_name.as_deref(), Some("java/lang/Object"));
        assert!(parsed.interfaces.is_empty());
    }

    #[test]
    fn test_duplicate_method_rejected() {
        let mut builder = builder();
        let mut method = builder.begin_method(&spec("m", "()V")).unwrap();
        method.insn(opcodes::RETURN);
        method.finish(0, 0).unwrap();

        let err = builder.begin_method(&spec("m", "()V")).unwrap_err();
        assert!(matches!(err, AdapterGenError::DuplicateBridgeMethod { .. }));
        assert!(err.is_contract_violation());

        // Same name, different descriptor is an overload.
        assert!(builder.begin_method(&spec("m", "(I)V")).is_ok());
    }

    #[test]
    fn test_failed_or_abandoned_bodies_are_not_counted() {
        let mut builder = builder();
        let mut too_wide = spec("wide", &format!("({})V", "I".repeat(255)));
        too_wide.descriptor = too_wide
            .descriptor
            .with_leading_argument(FieldType::object(ClassName::new("a/Target").unwrap()));
        let err = builder.begin_method(&too_wide).unwrap_err();
        assert!(matches!(
            err,
            AdapterGenError::ClassFile(ClassFileError::TooManyArgumentSlots(_))
        ));
        assert_eq!(builder.method_count(), 0);
        assert_eq!(builder.state(), BuilderState::Created);

        // Dropped without `finish`: nothing recorded, the signature stays free.
        drop(builder.begin_method(&spec("m", "()V")).unwrap());
        assert_eq!(builder.method_count(), 0);

        let mut method = builder.begin_method(&spec("m", "()V")).unwrap();
        method.insn(opcodes::RETURN);
        method.finish(0, 0).unwrap();
        assert_eq!(builder.method_count(), 1);
        assert_eq!(builder.state(), BuilderState::Emitting);
        assert_eq!(builder.close().method_count(), 1);
    }
}
