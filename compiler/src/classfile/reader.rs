//! Class-file reader and disassembler
//!
//! Reads back the classes produced by [`ClassWriter`](super::ClassWriter).
//! The constant pool parser understands every standard tag so foreign class
//! files can be inspected, but code disassembly only covers the instruction
//! set adapter bodies use.

use super::constant_pool::decode_modified_utf8;
use super::opcodes::{self, ALOAD_3, ILOAD_0, WIDE};
use super::{ClassFileError, CLASS_MAGIC};
use crate::langmodel::{InvocationKind, ValueKind};
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
enum PoolEntry {
    Utf8(String),
    Class(u16),
    NameAndType(u16, u16),
    MethodRef { class: u16, name_and_type: u16, interface: bool },
    /// Entries we parse but never resolve (numbers, strings, handles, ...).
    Other,
    /// Second slot of a long/double.
    Unusable,
}

/// One decoded instruction of an adapter body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instruction {
    Load {
        kind: ValueKind,
        slot: u16,
    },
    Invoke {
        kind: InvocationKind,
        owner: String,
        name: String,
        descriptor: String,
        interface: bool,
    },
    /// `None` for a void `return`.
    Return(Option<ValueKind>),
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instruction::Load { kind, slot } => write!(f, "{}load {}", kind, slot),
            Instruction::Invoke {
                kind,
                owner,
                name,
                descriptor,
                ..
            } => write!(f, "{} {}.{}{}", kind, owner, name, descriptor),
            Instruction::Return(None) => f.write_str("return"),
            Instruction::Return(Some(kind)) => write!(f, "{}return", kind),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedCode {
    pub max_stack: u16,
    pub max_locals: u16,
    pub instructions: Vec<Instruction>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedMethod {
    pub access: u16,
    pub name: String,
    pub descriptor: String,
    pub exceptions: Vec<String>,
    pub code: Option<ParsedCode>,
}

impl ParsedMethod {
    /// Instructions of the body, empty for abstract/native methods.
    pub fn instructions(&self) -> &[Instruction] {
        self.code.as_ref().map_or(&[], |c| c.instructions.as_slice())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedClass {
    pub minor_version: u16,
    pub major_version: u16,
    pub access: u16,
    pub name: String,
    pub super_name: Option<String>,
    pub interfaces: Vec<String>,
    pub field_count: u16,
    pub methods: Vec<ParsedMethod>,
}

impl ParsedClass {
    pub fn method(&self, name: &str, descriptor: &str) -> Option<&ParsedMethod> {
        self.methods
            .iter()
            .find(|m| m.name == name && m.descriptor == descriptor)
    }
}

/// Reader over the bytes of one class file.
pub struct ClassReader<'a> {
    data: &'a [u8],
    offset: usize,
    pool: Vec<PoolEntry>,
}

impl<'a> ClassReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            offset: 0,
            pool: Vec::new(),
        }
    }

    /// Convenience wrapper: parse a whole class.
    pub fn parse(data: &'a [u8]) -> Result<ParsedClass, ClassFileError> {
        ClassReader::new(data).read_class()
    }

    pub fn read_class(&mut self) -> Result<ParsedClass, ClassFileError> {
        if self.read_u32()? != CLASS_MAGIC {
            return Err(ClassFileError::InvalidMagic);
        }
        let minor_version = self.read_u16()?;
        let major_version = self.read_u16()?;
        self.read_constant_pool()?;

        let access = self.read_u16()?;
        let this_class = self.read_u16()?;
        let name = self.class_name(this_class)?;
        let super_index = self.read_u16()?;
        let super_name = if super_index == 0 {
            None
        } else {
            Some(self.class_name(super_index)?)
        };

        let interface_count = self.read_u16()?;
        let mut interfaces = Vec::with_capacity(interface_count as usize);
        for _ in 0..interface_count {
            let index = self.read_u16()?;
            interfaces.push(self.class_name(index)?);
        }

        let field_count = self.read_u16()?;
        for _ in 0..field_count {
            // access, name, descriptor
            self.read_bytes(6)?;
            self.skip_attributes()?;
        }

        let method_count = self.read_u16()?;
        let mut methods = Vec::with_capacity(method_count as usize);
        for _ in 0..method_count {
            methods.push(self.read_method()?);
        }

        self.skip_attributes()?;
        if self.offset != self.data.len() {
            return Err(ClassFileError::TrailingBytes(self.data.len() - self.offset));
        }

        Ok(ParsedClass {
            minor_version,
            major_version,
            access,
            name,
            super_name,
            interfaces,
            field_count,
            methods,
        })
    }

    fn read_constant_pool(&mut self) -> Result<(), ClassFileError> {
        let count = self.read_u16()?;
        // Index 0 is unused; keep it so pool indices map directly.
        self.pool = vec![PoolEntry::Unusable];
        while self.pool.len() < count as usize {
            let tag = self.read_u8()?;
            let entry = match tag {
                1 => {
                    let len = self.read_u16()? as usize;
                    let bytes = self.read_bytes(len)?;
                    PoolEntry::Utf8(decode_modified_utf8(bytes).ok_or(ClassFileError::InvalidUtf8)?)
                }
                3 | 4 => {
                    self.read_bytes(4)?;
                    PoolEntry::Other
                }
                5 | 6 => {
                    self.read_bytes(8)?;
                    self.pool.push(PoolEntry::Other);
                    PoolEntry::Unusable
                }
                7 => PoolEntry::Class(self.read_u16()?),
                8 | 16 | 19 | 20 => {
                    self.read_u16()?;
                    PoolEntry::Other
                }
                9 | 17 | 18 => {
                    self.read_bytes(4)?;
                    PoolEntry::Other
                }
                10 | 11 => PoolEntry::MethodRef {
                    class: self.read_u16()?,
                    name_and_type: self.read_u16()?,
                    interface: tag == 11,
                },
                12 => PoolEntry::NameAndType(self.read_u16()?, self.read_u16()?),
                15 => {
                    self.read_bytes(3)?;
                    PoolEntry::Other
                }
                _ => return Err(ClassFileError::UnknownConstantTag(tag)),
            };
            self.pool.push(entry);
        }
        Ok(())
    }

    fn entry(&self, index: u16) -> Result<&PoolEntry, ClassFileError> {
        self.pool
            .get(index as usize)
            .filter(|e| !matches!(e, PoolEntry::Unusable))
            .ok_or(ClassFileError::BadConstantIndex(index))
    }

    fn utf8(&self, index: u16) -> Result<String, ClassFileError> {
        match self.entry(index)? {
            PoolEntry::Utf8(s) => Ok(s.clone()),
            _ => Err(ClassFileError::BadConstantIndex(index)),
        }
    }

    fn class_name(&self, index: u16) -> Result<String, ClassFileError> {
        match self.entry(index)? {
            PoolEntry::Class(name) => self.utf8(*name),
            _ => Err(ClassFileError::BadConstantIndex(index)),
        }
    }

    /// (owner, name, descriptor, interface) of a method reference.
    fn method_ref(&self, index: u16) -> Result<(String, String, String, bool), ClassFileError> {
        match self.entry(index)? {
            PoolEntry::MethodRef {
                class,
                name_and_type,
                interface,
            } => {
                let owner = self.class_name(*class)?;
                match self.entry(*name_and_type)? {
                    PoolEntry::NameAndType(name, descriptor) => {
                        Ok((owner, self.utf8(*name)?, self.utf8(*descriptor)?, *interface))
                    }
                    _ => Err(ClassFileError::BadConstantIndex(*name_and_type)),
                }
            }
            _ => Err(ClassFileError::BadConstantIndex(index)),
        }
    }

    fn read_method(&mut self) -> Result<ParsedMethod, ClassFileError> {
        let access = self.read_u16()?;
        let name_index = self.read_u16()?;
        let name = self.utf8(name_index)?;
        let descriptor_index = self.read_u16()?;
        let descriptor = self.utf8(descriptor_index)?;
        let mut exceptions = Vec::new();
        let mut code = None;

        let attribute_count = self.read_u16()?;
        for _ in 0..attribute_count {
            let attribute_index = self.read_u16()?;
            let attribute_name = self.utf8(attribute_index)?;
            let length = self.read_u32()? as usize;
            let end = self.offset + length;
            match attribute_name.as_str() {
                "Code" => {
                    let max_stack = self.read_u16()?;
                    let max_locals = self.read_u16()?;
                    let code_length = self.read_u32()? as usize;
                    let bytes = self.read_bytes(code_length)?;
                    let instructions = self.disassemble(bytes)?;
                    code = Some(ParsedCode {
                        max_stack,
                        max_locals,
                        instructions,
                    });
                }
                "Exceptions" => {
                    let count = self.read_u16()?;
                    for _ in 0..count {
                        let index = self.read_u16()?;
                        exceptions.push(self.class_name(index)?);
                    }
                }
                _ => {}
            }
            if end > self.data.len() || end < self.offset {
                return Err(ClassFileError::UnexpectedEof);
            }
            self.offset = end;
        }

        Ok(ParsedMethod {
            access,
            name,
            descriptor,
            exceptions,
            code,
        })
    }

    /// Decode an adapter body.
    pub fn disassemble(&self, code: &[u8]) -> Result<Vec<Instruction>, ClassFileError> {
        let mut instructions = Vec::new();
        let mut pc = 0;
        let byte_at = |i: usize| code.get(i).copied().ok_or(ClassFileError::UnexpectedEof);
        let u16_at = |i: usize| -> Result<u16, ClassFileError> {
            Ok(u16::from_be_bytes([byte_at(i)?, byte_at(i + 1)?]))
        };

        while pc < code.len() {
            let opcode = code[pc];
            let instruction = match opcode {
                ILOAD_0..=ALOAD_3 => {
                    let relative = opcode - ILOAD_0;
                    pc += 1;
                    Instruction::Load {
                        kind: family(relative / 4, opcode)?,
                        slot: (relative % 4) as u16,
                    }
                }
                op if opcodes::is_load(op) => {
                    let slot = byte_at(pc + 1)? as u16;
                    pc += 2;
                    Instruction::Load {
                        kind: family(op - opcodes::ILOAD, op)?,
                        slot,
                    }
                }
                WIDE => {
                    let op = byte_at(pc + 1)?;
                    if !opcodes::is_load(op) {
                        return Err(ClassFileError::InvalidOpcode(op));
                    }
                    let slot = u16_at(pc + 2)?;
                    pc += 4;
                    Instruction::Load {
                        kind: family(op - opcodes::ILOAD, op)?,
                        slot,
                    }
                }
                op if opcodes::is_invoke(op) => {
                    let (owner, name, descriptor, interface) = self.method_ref(u16_at(pc + 1)?)?;
                    pc += if op == opcodes::INVOKEINTERFACE { 5 } else { 3 };
                    Instruction::Invoke {
                        kind: InvocationKind::from_opcode(op).ok_or(ClassFileError::InvalidOpcode(op))?,
                        owner,
                        name,
                        descriptor,
                        interface,
                    }
                }
                opcodes::RETURN => {
                    pc += 1;
                    Instruction::Return(None)
                }
                op @ opcodes::IRETURN..=opcodes::ARETURN => {
                    pc += 1;
                    Instruction::Return(Some(family(op - opcodes::IRETURN, op)?))
                }
                op => return Err(ClassFileError::InvalidOpcode(op)),
            };
            instructions.push(instruction);
        }
        Ok(instructions)
    }

    fn skip_attributes(&mut self) -> Result<(), ClassFileError> {
        let count = self.read_u16()?;
        for _ in 0..count {
            self.read_u16()?;
            let length = self.read_u32()? as usize;
            self.read_bytes(length)?;
        }
        Ok(())
    }

    fn read_bytes(&mut self, count: usize) -> Result<&'a [u8], ClassFileError> {
        if self.offset + count > self.data.len() {
            return Err(ClassFileError::UnexpectedEof);
        }
        let bytes = &self.data[self.offset..self.offset + count];
        self.offset += count;
        Ok(bytes)
    }

    fn read_u8(&mut self) -> Result<u8, ClassFileError> {
        Ok(self.read_bytes(1)?[0])
    }

    fn read_u16(&mut self) -> Result<u16, ClassFileError> {
        let bytes = self.read_bytes(2)?;
        Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    fn read_u32(&mut self) -> Result<u32, ClassFileError> {
        let bytes = self.read_bytes(4)?;
        Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }
}

fn family(offset: u8, opcode: u8) -> Result<ValueKind, ClassFileError> {
    ValueKind::from_family_offset(offset).ok_or(ClassFileError::InvalidOpcode(opcode))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classfile::access::*;
    use crate::classfile::{ClassFileOptions, ClassWriter};
    use crate::langmodel::{ClassName, MethodDescriptor};

    #[test]
    fn test_read_back_written_class() {
        let owner = ClassName::new("x/Adapter").unwrap();
        let mut class = ClassWriter::new(
            ClassFileOptions::default(),
            ACC_PUBLIC | ACC_ABSTRACT | ACC_SYNTHETIC,
            &owner,
            &ClassName::java_lang_object(),
            &[],
        )
        .unwrap();

        let desc = MethodDescriptor::parse("(Lx/Thing;J)J").unwrap();
        let target = MethodDescriptor::parse("(J)J").unwrap();
        let mut method = class
            .method(ACC_PUBLIC | ACC_STATIC, "call", &desc, &[ClassName::new("java/io/IOException").unwrap()])
            .unwrap();
        method.var_insn(opcodes::ALOAD, 0).unwrap();
        method.var_insn(opcodes::LLOAD, 1).unwrap();
        method
            .method_insn(opcodes::INVOKEVIRTUAL, &ClassName::new("x/Thing").unwrap(), "call", &target, false)
            .unwrap();
        method.insn(opcodes::LRETURN);
        method.finish(3, 3).unwrap();

        let bytes = class.to_bytes();
        let parsed = ClassReader::parse(&bytes).unwrap();
        assert_eq!(parsed.name, "x/Adapter");
        assert_eq!(parsed.super_name.as_deref(), Some("java/lang/Object"));
        assert_eq!(parsed.access, 0x1401);
        assert!(parsed.interfaces.is_empty());

        let method = parsed.method("call", "(Lx/Thing;J)J").unwrap();
        assert_eq!(method.access, ACC_PUBLIC | ACC_STATIC);
        assert_eq!(method.exceptions, vec!["java/io/IOException".to_string()]);
        let code = method.code.as_ref().unwrap();
        assert_eq!((code.max_stack, code.max_locals), (3, 3));
        assert_eq!(
            code.instructions,
            vec![
                Instruction::Load { kind: ValueKind::Reference, slot: 0 },
                Instruction::Load { kind: ValueKind::Long, slot: 1 },
                Instruction::Invoke {
                    kind: InvocationKind::Virtual,
                    owner: "x/Thing".to_string(),
                    name: "call".to_string(),
                    descriptor: "(J)J".to_string(),
                    interface: false,
                },
                Instruction::Return(Some(ValueKind::Long)),
            ]
        );
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(matches!(ClassReader::parse(b"nope"), Err(ClassFileError::InvalidMagic)));
        assert!(matches!(
            ClassReader::parse(&[0xca, 0xfe, 0xba, 0xbe, 0, 0]),
            Err(ClassFileError::UnexpectedEof)
        ));
    }

    #[test]
    fn test_instruction_display() {
        let load = Instruction::Load { kind: ValueKind::Double, slot: 2 };
        assert_eq!(load.to_string(), "dload 2");
        assert_eq!(Instruction::Return(None).to_string(), "return");
    }
}
