//! JVM type and method descriptors
//!
//! Descriptors are parsed into closed enums so that everything downstream
//! (slot accounting, opcode selection, mirrored-type classification) works on
//! typed values instead of re-scanning strings.

use super::{ClassName, DescriptorError};
use smallvec::SmallVec;
use std::fmt;

/// Maximum array dimensions permitted by the class-file format.
const MAX_ARRAY_DIMENSIONS: usize = 255;

/// Maximum local slots a method's parameters may occupy.
pub const MAX_ARGUMENT_SLOTS: u16 = 255;

/// Primitive value types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveType {
    Boolean,
    Byte,
    Char,
    Short,
    Int,
    Long,
    Float,
    Double,
}

impl PrimitiveType {
    fn from_descriptor_char(c: u8) -> Option<Self> {
        match c {
            b'Z' => Some(PrimitiveType::Boolean),
            b'B' => Some(PrimitiveType::Byte),
            b'C' => Some(PrimitiveType::Char),
            b'S' => Some(PrimitiveType::Short),
            b'I' => Some(PrimitiveType::Int),
            b'J' => Some(PrimitiveType::Long),
            b'F' => Some(PrimitiveType::Float),
            b'D' => Some(PrimitiveType::Double),
            _ => None,
        }
    }

    pub fn descriptor_char(self) -> char {
        match self {
            PrimitiveType::Boolean => 'Z',
            PrimitiveType::Byte => 'B',
            PrimitiveType::Char => 'C',
            PrimitiveType::Short => 'S',
            PrimitiveType::Int => 'I',
            PrimitiveType::Long => 'J',
            PrimitiveType::Float => 'F',
            PrimitiveType::Double => 'D',
        }
    }

    /// Computational kind used by the load/return instructions.
    pub fn value_kind(self) -> ValueKind {
        match self {
            PrimitiveType::Boolean
            | PrimitiveType::Byte
            | PrimitiveType::Char
            | PrimitiveType::Short
            | PrimitiveType::Int => ValueKind::Int,
            PrimitiveType::Long => ValueKind::Long,
            PrimitiveType::Float => ValueKind::Float,
            PrimitiveType::Double => ValueKind::Double,
        }
    }
}

/// Computational category of a value on the operand stack / in a local slot.
///
/// Selects between the `i`/`l`/`f`/`d`/`a` instruction families and decides
/// the slot width (long and double take two slots).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Int,
    Long,
    Float,
    Double,
    Reference,
}

impl ValueKind {
    /// Number of local-variable slots / operand-stack words.
    pub fn width(self) -> u16 {
        match self {
            ValueKind::Long | ValueKind::Double => 2,
            _ => 1,
        }
    }

    /// Offset from the int form of an instruction family (`iload` → `lload` ...).
    fn family_offset(self) -> u8 {
        match self {
            ValueKind::Int => 0,
            ValueKind::Long => 1,
            ValueKind::Float => 2,
            ValueKind::Double => 3,
            ValueKind::Reference => 4,
        }
    }

    /// `iload`, `lload`, `fload`, `dload` or `aload`.
    pub fn load_opcode(self) -> u8 {
        crate::classfile::opcodes::ILOAD + self.family_offset()
    }

    /// `ireturn`, `lreturn`, `freturn`, `dreturn` or `areturn`.
    pub fn return_opcode(self) -> u8 {
        crate::classfile::opcodes::IRETURN + self.family_offset()
    }

    /// Inverse of the family offset, used when decoding instructions.
    pub(crate) fn from_family_offset(offset: u8) -> Option<Self> {
        match offset {
            0 => Some(ValueKind::Int),
            1 => Some(ValueKind::Long),
            2 => Some(ValueKind::Float),
            3 => Some(ValueKind::Double),
            4 => Some(ValueKind::Reference),
            _ => None,
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix = match self {
            ValueKind::Int => "i",
            ValueKind::Long => "l",
            ValueKind::Float => "f",
            ValueKind::Double => "d",
            ValueKind::Reference => "a",
        };
        f.write_str(prefix)
    }
}

/// Declared type of a field, argument or non-void return value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FieldType {
    Primitive(PrimitiveType),
    Object(ClassName),
    /// Array with the given component type.
    Array(Box<FieldType>),
}

impl FieldType {
    /// Parse a complete field descriptor such as `I` or `[Ljava/lang/String;`.
    pub fn parse(descriptor: &str) -> Result<Self, DescriptorError> {
        let mut parser = DescriptorParser::new(descriptor);
        let ty = parser.field_type()?;
        parser.expect_end()?;
        Ok(ty)
    }

    pub fn object(name: ClassName) -> Self {
        FieldType::Object(name)
    }

    pub fn value_kind(&self) -> ValueKind {
        match self {
            FieldType::Primitive(p) => p.value_kind(),
            FieldType::Object(_) | FieldType::Array(_) => ValueKind::Reference,
        }
    }

    pub fn slot_width(&self) -> u16 {
        self.value_kind().width()
    }

    /// The class name if this is a plain (non-array) object type.
    pub fn as_object(&self) -> Option<&ClassName> {
        match self {
            FieldType::Object(name) => Some(name),
            _ => None,
        }
    }

    pub fn descriptor(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldType::Primitive(p) => write!(f, "{}", p.descriptor_char()),
            FieldType::Object(name) => write!(f, "L{};", name),
            FieldType::Array(component) => write!(f, "[{}", component),
        }
    }
}

/// Return type of a method.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ReturnType {
    Void,
    Value(FieldType),
}

impl ReturnType {
    /// `None` for void.
    pub fn value_kind(&self) -> Option<ValueKind> {
        match self {
            ReturnType::Void => None,
            ReturnType::Value(ty) => Some(ty.value_kind()),
        }
    }

    /// Operand-stack words left behind by a call returning this type.
    pub fn stack_width(&self) -> u16 {
        self.value_kind().map_or(0, ValueKind::width)
    }

    pub fn as_field_type(&self) -> Option<&FieldType> {
        match self {
            ReturnType::Void => None,
            ReturnType::Value(ty) => Some(ty),
        }
    }
}

impl fmt::Display for ReturnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReturnType::Void => f.write_str("V"),
            ReturnType::Value(ty) => write!(f, "{}", ty),
        }
    }
}

/// Parsed method descriptor, e.g. `(ILjava/time/Instant;)J`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodDescriptor {
    arguments: SmallVec<[FieldType; 4]>,
    return_type: ReturnType,
}

impl MethodDescriptor {
    pub fn new(arguments: impl IntoIterator<Item = FieldType>, return_type: ReturnType) -> Self {
        Self {
            arguments: arguments.into_iter().collect(),
            return_type,
        }
    }

    pub fn parse(descriptor: &str) -> Result<Self, DescriptorError> {
        let mut parser = DescriptorParser::new(descriptor);
        let parsed = parser.method_descriptor()?;
        parser.expect_end()?;
        Ok(parsed)
    }

    pub fn arguments(&self) -> &[FieldType] {
        &self.arguments
    }

    pub fn return_type(&self) -> &ReturnType {
        &self.return_type
    }

    /// Total local slots taken by the arguments (long/double count twice).
    /// Saturates at `u16::MAX` for descriptors built outside [`Self::parse`].
    pub fn argument_slots(&self) -> u16 {
        self.arguments
            .iter()
            .fold(0u16, |slots, arg| slots.saturating_add(arg.slot_width()))
    }

    /// Copy of this descriptor with `first` inserted before the other
    /// arguments; used to turn a receiver into an explicit parameter.
    pub fn with_leading_argument(&self, first: FieldType) -> Self {
        let mut arguments = SmallVec::with_capacity(self.arguments.len() + 1);
        arguments.push(first);
        arguments.extend(self.arguments.iter().cloned());
        Self {
            arguments,
            return_type: self.return_type.clone(),
        }
    }

    /// Rewrite every argument and the return type through `f`.
    pub fn map_types(&self, mut f: impl FnMut(&FieldType) -> FieldType) -> Self {
        Self {
            arguments: self.arguments.iter().map(&mut f).collect(),
            return_type: match &self.return_type {
                ReturnType::Void => ReturnType::Void,
                ReturnType::Value(ty) => ReturnType::Value(f(ty)),
            },
        }
    }

    pub fn descriptor(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for MethodDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        for arg in &self.arguments {
            write!(f, "{}", arg)?;
        }
        write!(f, "){}", self.return_type)
    }
}

/// Cursor over a descriptor string.
struct DescriptorParser<'a> {
    source: &'a str,
    offset: usize,
}

impl<'a> DescriptorParser<'a> {
    fn new(source: &'a str) -> Self {
        Self { source, offset: 0 }
    }

    fn peek(&self) -> Option<u8> {
        self.source.as_bytes().get(self.offset).copied()
    }

    fn next(&mut self) -> Result<u8, DescriptorError> {
        let byte = self
            .peek()
            .ok_or_else(|| DescriptorError::UnexpectedEnd(self.source.to_string()))?;
        self.offset += 1;
        Ok(byte)
    }

    fn unexpected(&self, position: usize) -> DescriptorError {
        let found = self.source[position..].chars().next().unwrap_or('?');
        DescriptorError::UnexpectedChar {
            descriptor: self.source.to_string(),
            position,
            found,
        }
    }

    fn expect_end(&self) -> Result<(), DescriptorError> {
        if self.offset == self.source.len() {
            Ok(())
        } else {
            Err(DescriptorError::TrailingCharacters(self.source.to_string()))
        }
    }

    fn field_type(&mut self) -> Result<FieldType, DescriptorError> {
        let mut dimensions = 0usize;
        while self.peek() == Some(b'[') {
            self.offset += 1;
            dimensions += 1;
        }
        if dimensions > MAX_ARRAY_DIMENSIONS {
            return Err(DescriptorError::TooManyDimensions(self.source.to_string()));
        }

        let start = self.offset;
        let mut ty = match self.next()? {
            b'L' => {
                let rest = &self.source[self.offset..];
                let end = rest
                    .find(';')
                    .ok_or_else(|| DescriptorError::UnexpectedEnd(self.source.to_string()))?;
                let name = ClassName::new(&rest[..end])?;
                self.offset += end + 1;
                FieldType::Object(name)
            }
            b'V' => return Err(DescriptorError::VoidValue(self.source.to_string())),
            c => PrimitiveType::from_descriptor_char(c)
                .map(FieldType::Primitive)
                .ok_or_else(|| self.unexpected(start))?,
        };

        for _ in 0..dimensions {
            ty = FieldType::Array(Box::new(ty));
        }
        Ok(ty)
    }

    fn method_descriptor(&mut self) -> Result<MethodDescriptor, DescriptorError> {
        if self.next()? != b'(' {
            return Err(self.unexpected(0));
        }

        let mut arguments = SmallVec::new();
        let mut slots = 0u16;
        loop {
            match self.peek() {
                Some(b')') => {
                    self.offset += 1;
                    break;
                }
                Some(_) => {
                    let argument = self.field_type()?;
                    slots += argument.slot_width();
                    if slots > MAX_ARGUMENT_SLOTS {
                        return Err(DescriptorError::TooManyArgumentSlots(self.source.to_string()));
                    }
                    arguments.push(argument);
                }
                None => return Err(DescriptorError::UnexpectedEnd(self.source.to_string())),
            }
        }

        let return_type = if self.peek() == Some(b'V') {
            self.offset += 1;
            ReturnType::Void
        } else {
            ReturnType::Value(self.field_type()?)
        };

        Ok(MethodDescriptor {
            arguments,
            return_type,
        })
    }
}
