//! Method keys and invocation sites

use super::{ClassName, DescriptorError, MethodDescriptor};
use crate::classfile::opcodes;
use std::fmt;

/// How a call site dispatches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InvocationKind {
    Static,
    Virtual,
    Interface,
    Special,
}

impl InvocationKind {
    pub fn opcode(self) -> u8 {
        match self {
            InvocationKind::Static => opcodes::INVOKESTATIC,
            InvocationKind::Virtual => opcodes::INVOKEVIRTUAL,
            InvocationKind::Interface => opcodes::INVOKEINTERFACE,
            InvocationKind::Special => opcodes::INVOKESPECIAL,
        }
    }

    pub fn from_opcode(opcode: u8) -> Option<Self> {
        match opcode {
            opcodes::INVOKESTATIC => Some(InvocationKind::Static),
            opcodes::INVOKEVIRTUAL => Some(InvocationKind::Virtual),
            opcodes::INVOKEINTERFACE => Some(InvocationKind::Interface),
            opcodes::INVOKESPECIAL => Some(InvocationKind::Special),
            _ => None,
        }
    }

    /// Instruction mnemonic, also used as the record's `kind` value.
    pub fn mnemonic(self) -> &'static str {
        match self {
            InvocationKind::Static => "invokestatic",
            InvocationKind::Virtual => "invokevirtual",
            InvocationKind::Interface => "invokeinterface",
            InvocationKind::Special => "invokespecial",
        }
    }

    /// Accepts the full mnemonic or its short form (`static`, `virtual`, ...).
    pub fn from_mnemonic(name: &str) -> Option<Self> {
        match name {
            "invokestatic" | "static" => Some(InvocationKind::Static),
            "invokevirtual" | "virtual" => Some(InvocationKind::Virtual),
            "invokeinterface" | "interface" => Some(InvocationKind::Interface),
            "invokespecial" | "special" => Some(InvocationKind::Special),
            _ => None,
        }
    }

    /// Whether the call has no receiver on the operand stack.
    pub fn is_static(self) -> bool {
        self == InvocationKind::Static
    }
}

impl fmt::Display for InvocationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}

/// A method identified by owner, name and descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodKey {
    owner: ClassName,
    name: String,
    descriptor: MethodDescriptor,
}

impl MethodKey {
    pub fn new(
        owner: ClassName,
        name: impl Into<String>,
        descriptor: MethodDescriptor,
    ) -> Result<Self, DescriptorError> {
        let name = name.into();
        validate_method_name(&name)?;
        Ok(Self {
            owner,
            name,
            descriptor,
        })
    }

    /// Parse owner, name and descriptor from their string forms.
    pub fn parse(owner: &str, name: &str, descriptor: &str) -> Result<Self, DescriptorError> {
        Self::new(
            ClassName::new(owner)?,
            name,
            MethodDescriptor::parse(descriptor)?,
        )
    }

    pub fn owner(&self) -> &ClassName {
        &self.owner
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn descriptor(&self) -> &MethodDescriptor {
        &self.descriptor
    }

    pub fn is_constructor(&self) -> bool {
        self.name == "<init>"
    }

    pub fn is_static_initializer(&self) -> bool {
        self.name == "<clinit>"
    }
}

impl fmt::Display for MethodKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}{}", self.owner, self.name, self.descriptor)
    }
}

/// An immutable reference to one method call.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodInvocationSite {
    kind: InvocationKind,
    method: MethodKey,
    is_interface: bool,
}

impl MethodInvocationSite {
    /// `invokeinterface` always refers to an interface owner, so the flag is
    /// forced on for that kind.
    pub fn new(kind: InvocationKind, method: MethodKey, is_interface: bool) -> Self {
        Self {
            kind,
            method,
            is_interface: is_interface || kind == InvocationKind::Interface,
        }
    }

    pub fn kind(&self) -> InvocationKind {
        self.kind
    }

    pub fn method(&self) -> &MethodKey {
        &self.method
    }

    pub fn owner(&self) -> &ClassName {
        self.method.owner()
    }

    pub fn name(&self) -> &str {
        self.method.name()
    }

    pub fn descriptor(&self) -> &MethodDescriptor {
        self.method.descriptor()
    }

    /// Whether the owner is an interface (selects `InterfaceMethodref`).
    pub fn is_interface(&self) -> bool {
        self.is_interface
    }

    pub fn is_static_invocation(&self) -> bool {
        self.kind.is_static()
    }

    /// Operand-stack words consumed by the call: receiver plus arguments.
    pub fn consumed_stack_words(&self) -> u16 {
        let receiver = if self.kind.is_static() { 0 } else { 1 };
        self.descriptor().argument_slots().saturating_add(receiver)
    }

    /// Operand-stack words produced by the call.
    pub fn produced_stack_words(&self) -> u16 {
        self.descriptor().return_type().stack_width()
    }
}

impl fmt::Display for MethodInvocationSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.method)
    }
}

fn validate_method_name(name: &str) -> Result<(), DescriptorError> {
    if name == "<init>" || name == "<clinit>" {
        return Ok(());
    }
    if name.is_empty() || name.contains(['.', ';', '[', '/', '<', '>']) {
        return Err(DescriptorError::InvalidMethodName(name.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn site(kind: InvocationKind, owner: &str, name: &str, desc: &str) -> MethodInvocationSite {
        MethodInvocationSite::new(kind, MethodKey::parse(owner, name, desc).unwrap(), false)
    }

    #[test]
    fn test_stack_words() {
        let virtual_call = site(InvocationKind::Virtual, "android/app/Activity", "foo", "(JI)D");
        assert_eq!(virtual_call.consumed_stack_words(), 1 + 2 + 1);
        assert_eq!(virtual_call.produced_stack_words(), 2);

        let static_call = site(InvocationKind::Static, "android/os/SystemClock", "now", "()V");
        assert_eq!(static_call.consumed_stack_words(), 0);
        assert_eq!(static_call.produced_stack_words(), 0);
    }

    #[test]
    fn test_interface_kind_forces_flag() {
        let call = site(InvocationKind::Interface, "android/os/Parcelable", "describeContents", "()I");
        assert!(call.is_interface());
        assert_eq!(call.to_string(), "invokeinterface android/os/Parcelable#describeContents()I");
    }

    #[test]
    fn test_kind_mnemonics() {
        for kind in [
            InvocationKind::Static,
            InvocationKind::Virtual,
            InvocationKind::Interface,
            InvocationKind::Special,
        ] {
            assert_eq!(InvocationKind::from_mnemonic(kind.mnemonic()), Some(kind));
            assert_eq!(InvocationKind::from_opcode(kind.opcode()), Some(kind));
        }
        assert_eq!(InvocationKind::from_mnemonic("virtual"), Some(InvocationKind::Virtual));
        assert_eq!(InvocationKind::from_mnemonic("invokedynamic"), None);
    }

    #[test]
    fn test_method_names() {
        assert!(MethodKey::parse("a/B", "<init>", "()V").unwrap().is_constructor());
        assert!(MethodKey::parse("a/B", "<clinit>", "()V").unwrap().is_static_initializer());
        assert!(MethodKey::parse("a/B", "<foo>", "()V").is_err());
        assert!(MethodKey::parse("a/B", "", "()V").is_err());
        assert!(MethodKey::parse("a/B", "a.b", "()V").is_err());
    }
}
