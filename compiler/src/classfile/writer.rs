//! Class and method writers
//!
//! A small, ASM-like emission API: a [`ClassWriter`] owns the constant pool
//! and the finished methods, and hands out one [`MethodWriter`] at a time
//! (the method writer borrows the class mutably, so bodies cannot
//! interleave). Serialization with [`ClassWriter::to_bytes`] is infallible:
//! every size limit is checked while entries are added.
//!
//! ```text
//! ClassFile {
//!     u4 magic; u2 minor_version; u2 major_version;
//!     u2 constant_pool_count; cp_info constant_pool[..];
//!     u2 access_flags; u2 this_class; u2 super_class;
//!     u2 interfaces_count; u2 fields_count;
//!     u2 methods_count; method_info methods[..];
//!     u2 attributes_count;
//! }
//! ```

use super::opcodes::{self, ILOAD_0, WIDE};
use super::{ClassFileError, ConstantPool, CLASS_MAGIC};
use crate::langmodel::{ClassName, MethodDescriptor, MAX_ARGUMENT_SLOTS};
use log::trace;

/// Java 7 (`V1_7`); straight-line code at this version needs no StackMapTable.
pub const DEFAULT_MAJOR_VERSION: u16 = 51;

/// Oldest class-file version (JDK 1.0.2).
pub const MIN_MAJOR_VERSION: u16 = 45;

const MAX_CODE_LENGTH: usize = u16::MAX as usize;

/// Format-level options applied to every generated class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassFileOptions {
    pub major_version: u16,
    pub minor_version: u16,
}

impl Default for ClassFileOptions {
    fn default() -> Self {
        Self {
            major_version: DEFAULT_MAJOR_VERSION,
            minor_version: 0,
        }
    }
}

/// A finished `method_info` with its `Code` attribute.
#[derive(Debug, Clone)]
struct MethodInfo {
    access: u16,
    name_index: u16,
    descriptor_index: u16,
    max_stack: u16,
    max_locals: u16,
    code: Vec<u8>,
    exception_indices: Vec<u16>,
}

/// Builds one class file.
#[derive(Debug, Clone)]
pub struct ClassWriter {
    options: ClassFileOptions,
    pool: ConstantPool,
    access: u16,
    this_class: u16,
    super_class: u16,
    interfaces: Vec<u16>,
    methods: Vec<MethodInfo>,
    // Attribute name indices, interned on first use.
    code_attribute: Option<u16>,
    exceptions_attribute: Option<u16>,
}

impl ClassWriter {
    /// Start a class: the header (version, access, names, interfaces) is
    /// fixed from here on.
    pub fn new(
        options: ClassFileOptions,
        access: u16,
        name: &ClassName,
        super_name: &ClassName,
        interfaces: &[ClassName],
    ) -> Result<Self, ClassFileError> {
        let mut pool = ConstantPool::new();
        let this_class = pool.class(name.binary_name())?;
        let super_class = pool.class(super_name.binary_name())?;
        let interfaces = interfaces
            .iter()
            .map(|i| pool.class(i.binary_name()))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            options,
            pool,
            access,
            this_class,
            super_class,
            interfaces,
            methods: Vec::new(),
            code_attribute: None,
            exceptions_attribute: None,
        })
    }

    pub fn options(&self) -> ClassFileOptions {
        self.options
    }

    pub fn method_count(&self) -> usize {
        self.methods.len()
    }

    /// Whether a finished method already has this name and descriptor.
    pub fn has_method(&self, name: &str, descriptor: &MethodDescriptor) -> bool {
        let (Some(name_index), Some(descriptor_index)) = (
            self.pool.find_utf8(name),
            self.pool.find_utf8(&descriptor.to_string()),
        ) else {
            return false;
        };
        self.methods
            .iter()
            .any(|m| m.name_index == name_index && m.descriptor_index == descriptor_index)
    }

    /// Open a method body. The returned writer must be [`finish`]ed for the
    /// method to be recorded.
    ///
    /// [`finish`]: MethodWriter::finish
    pub fn method(
        &mut self,
        access: u16,
        name: &str,
        descriptor: &MethodDescriptor,
        exceptions: &[ClassName],
    ) -> Result<MethodWriter<'_>, ClassFileError> {
        if self.methods.len() >= u16::MAX as usize {
            return Err(ClassFileError::TooManyMethods);
        }
        if descriptor.argument_slots() > MAX_ARGUMENT_SLOTS {
            return Err(ClassFileError::TooManyArgumentSlots(descriptor.to_string()));
        }

        let name_index = self.pool.utf8(name)?;
        let descriptor_index = self.pool.utf8(&descriptor.to_string())?;
        let exception_indices = exceptions
            .iter()
            .map(|e| self.pool.class(e.binary_name()))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(MethodWriter {
            class: self,
            access,
            name_index,
            descriptor_index,
            exception_indices,
            code: Vec::new(),
        })
    }

    /// Serialize the class.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(256);
        out.extend_from_slice(&CLASS_MAGIC.to_be_bytes());
        out.extend_from_slice(&self.options.minor_version.to_be_bytes());
        out.extend_from_slice(&self.options.major_version.to_be_bytes());
        self.pool.write_to(&mut out);

        out.extend_from_slice(&self.access.to_be_bytes());
        out.extend_from_slice(&self.this_class.to_be_bytes());
        out.extend_from_slice(&self.super_class.to_be_bytes());

        out.extend_from_slice(&(self.interfaces.len() as u16).to_be_bytes());
        for interface in &self.interfaces {
            out.extend_from_slice(&interface.to_be_bytes());
        }

        // fields_count
        out.extend_from_slice(&0u16.to_be_bytes());

        out.extend_from_slice(&(self.methods.len() as u16).to_be_bytes());
        for method in &self.methods {
            self.write_method(method, &mut out);
        }

        // attributes_count
        out.extend_from_slice(&0u16.to_be_bytes());
        out
    }

    fn write_method(&self, method: &MethodInfo, out: &mut Vec<u8>) {
        out.extend_from_slice(&method.access.to_be_bytes());
        out.extend_from_slice(&method.name_index.to_be_bytes());
        out.extend_from_slice(&method.descriptor_index.to_be_bytes());

        let has_exceptions = !method.exception_indices.is_empty();
        let attribute_count: u16 = if has_exceptions { 2 } else { 1 };
        out.extend_from_slice(&attribute_count.to_be_bytes());

        // Code attribute: max_stack(2) max_locals(2) code_length(4) code
        // exception_table_length(2) attributes_count(2)
        let code_attribute_length = 2 + 2 + 4 + method.code.len() + 2 + 2;
        // Both attribute name indices are interned in MethodWriter::finish.
        out.extend_from_slice(&self.code_attribute.unwrap_or_default().to_be_bytes());
        out.extend_from_slice(&(code_attribute_length as u32).to_be_bytes());
        out.extend_from_slice(&method.max_stack.to_be_bytes());
        out.extend_from_slice(&method.max_locals.to_be_bytes());
        out.extend_from_slice(&(method.code.len() as u32).to_be_bytes());
        out.extend_from_slice(&method.code);
        out.extend_from_slice(&0u16.to_be_bytes());
        out.extend_from_slice(&0u16.to_be_bytes());

        if has_exceptions {
            let length = 2 + 2 * method.exception_indices.len();
            out.extend_from_slice(&self.exceptions_attribute.unwrap_or_default().to_be_bytes());
            out.extend_from_slice(&(length as u32).to_be_bytes());
            out.extend_from_slice(&(method.exception_indices.len() as u16).to_be_bytes());
            for index in &method.exception_indices {
                out.extend_from_slice(&index.to_be_bytes());
            }
        }
    }
}

/// Emits the body of one method into its [`ClassWriter`].
#[derive(Debug)]
pub struct MethodWriter<'a> {
    class: &'a mut ClassWriter,
    access: u16,
    name_index: u16,
    descriptor_index: u16,
    exception_indices: Vec<u16>,
    code: Vec<u8>,
}

impl<'a> MethodWriter<'a> {
    /// Emit a zero-operand instruction such as `areturn`.
    pub fn insn(&mut self, opcode: u8) {
        trace!("  {}", opcodes::mnemonic(opcode).unwrap_or("?"));
        self.code.push(opcode);
    }

    /// Emit a local-variable load. Slots 0-3 use the one-byte short forms,
    /// slots above 255 use the `wide` prefix.
    pub fn var_insn(&mut self, opcode: u8, slot: u16) -> Result<(), ClassFileError> {
        if !opcodes::is_load(opcode) {
            return Err(ClassFileError::InvalidOpcode(opcode));
        }
        trace!("  {} {}", opcodes::mnemonic(opcode).unwrap_or("?"), slot);

        if slot <= 3 {
            self.code.push(ILOAD_0 + (opcode - opcodes::ILOAD) * 4 + slot as u8);
        } else if slot <= u8::MAX as u16 {
            self.code.push(opcode);
            self.code.push(slot as u8);
        } else {
            self.code.push(WIDE);
            self.code.push(opcode);
            self.code.extend_from_slice(&slot.to_be_bytes());
        }
        Ok(())
    }

    /// Emit `invokestatic`/`invokevirtual`/`invokespecial`/`invokeinterface`.
    pub fn method_insn(
        &mut self,
        opcode: u8,
        owner: &ClassName,
        name: &str,
        descriptor: &MethodDescriptor,
        is_interface: bool,
    ) -> Result<(), ClassFileError> {
        if !opcodes::is_invoke(opcode) {
            return Err(ClassFileError::InvalidOpcode(opcode));
        }
        trace!(
            "  {} {}.{}{}",
            opcodes::mnemonic(opcode).unwrap_or("?"),
            owner,
            name,
            descriptor
        );

        // invokeinterface carries count = receiver + argument slots
        let interface_count = if opcode == opcodes::INVOKEINTERFACE {
            let count = descriptor.argument_slots().saturating_add(1);
            let count = u8::try_from(count)
                .map_err(|_| ClassFileError::TooManyArgumentSlots(descriptor.to_string()))?;
            Some(count)
        } else {
            None
        };

        let is_interface = is_interface || opcode == opcodes::INVOKEINTERFACE;
        let index = self.class.pool.method_ref(
            owner.binary_name(),
            name,
            &descriptor.to_string(),
            is_interface,
        )?;
        self.code.push(opcode);
        self.code.extend_from_slice(&index.to_be_bytes());
        if let Some(count) = interface_count {
            // followed by a reserved zero byte
            self.code.push(count);
            self.code.push(0);
        }
        Ok(())
    }

    pub fn code_len(&self) -> usize {
        self.code.len()
    }

    /// Record the method with its computed limits.
    pub fn finish(self, max_stack: u16, max_locals: u16) -> Result<(), ClassFileError> {
        if self.code.is_empty() || self.code.len() > MAX_CODE_LENGTH {
            return Err(ClassFileError::InvalidCodeLength(self.code.len()));
        }

        let class = self.class;
        if class.code_attribute.is_none() {
            class.code_attribute = Some(class.pool.utf8("Code")?);
        }
        if !self.exception_indices.is_empty() && class.exceptions_attribute.is_none() {
            class.exceptions_attribute = Some(class.pool.utf8("Exceptions")?);
        }

        class.methods.push(MethodInfo {
            access: self.access,
            name_index: self.name_index,
            descriptor_index: self.descriptor_index,
            max_stack,
            max_locals,
            code: self.code,
            exception_indices: self.exception_indices,
        });
        Ok(())
    }
}
