//! JVM class-file encoding
//!
//! Just enough of the class-file format to emit adapter classes (abstract
//! holders of static, straight-line methods) and to read them back for
//! inspection:
//! - `constant_pool`: interned constants and modified UTF-8
//! - `writer`: class and method writers
//! - `reader`: parser and disassembler for the emitted subset
//! - `opcodes`: the instruction set adapter bodies use

pub mod constant_pool;
pub mod opcodes;
pub mod reader;
pub mod writer;

pub use constant_pool::ConstantPool;
pub use reader::{ClassReader, Instruction, ParsedClass, ParsedCode, ParsedMethod};
pub use writer::{ClassFileOptions, ClassWriter, MethodWriter, DEFAULT_MAJOR_VERSION, MIN_MAJOR_VERSION};

use std::fmt;

/// `0xCAFEBABE`
pub const CLASS_MAGIC: u32 = 0xCAFE_BABE;

/// Access flags for classes and methods.
pub mod access {
    pub const ACC_PUBLIC: u16 = 0x0001;
    pub const ACC_STATIC: u16 = 0x0008;
    pub const ACC_ABSTRACT: u16 = 0x0400;
    pub const ACC_SYNTHETIC: u16 = 0x1000;
}

/// Errors from encoding or decoding class files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClassFileError {
    ConstantPoolOverflow,
    StringTooLong(usize),
    TooManyMethods,
    TooManyArgumentSlots(String),
    /// Empty body or more than 65535 bytes of code.
    InvalidCodeLength(usize),
    InvalidOpcode(u8),
    InvalidMagic,
    UnexpectedEof,
    TrailingBytes(usize),
    UnknownConstantTag(u8),
    BadConstantIndex(u16),
    InvalidUtf8,
}

impl fmt::Display for ClassFileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClassFileError::ConstantPoolOverflow => write!(f, "Constant pool exceeds 65535 entries"),
            ClassFileError::StringTooLong(len) => {
                write!(f, "String constant of {} bytes exceeds the 65535-byte limit", len)
            }
            ClassFileError::TooManyMethods => write!(f, "Class exceeds 65535 methods"),
            ClassFileError::TooManyArgumentSlots(d) => {
                write!(f, "Method descriptor '{}' exceeds 255 argument slots", d)
            }
            ClassFileError::InvalidCodeLength(len) => write!(f, "Invalid code length: {}", len),
            ClassFileError::InvalidOpcode(op) => write!(f, "Invalid or unsupported opcode 0x{:02x}", op),
            ClassFileError::InvalidMagic => write!(f, "Invalid magic number in class file"),
            ClassFileError::UnexpectedEof => write!(f, "Unexpected end of class file"),
            ClassFileError::TrailingBytes(n) => write!(f, "{} trailing bytes after class file", n),
            ClassFileError::UnknownConstantTag(tag) => write!(f, "Unknown constant pool tag: {}", tag),
            ClassFileError::BadConstantIndex(i) => write!(f, "Bad constant pool index: {}", i),
            ClassFileError::InvalidUtf8 => write!(f, "Invalid modified UTF-8 in constant pool"),
        }
    }
}

impl std::error::Error for ClassFileError {}
