//! Constant pool with interning
//!
//! Entries are deduplicated so that identical names/refs share one index,
//! which keeps generated classes small and byte-for-byte reproducible.

use super::ClassFileError;
use fxhash::FxHashMap;

const TAG_UTF8: u8 = 1;
const TAG_CLASS: u8 = 7;
const TAG_METHODREF: u8 = 10;
const TAG_INTERFACE_METHODREF: u8 = 11;
const TAG_NAME_AND_TYPE: u8 = 12;

/// Largest index a `u2` constant-pool reference can hold.
const MAX_POOL_INDEX: usize = u16::MAX as usize;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Constant {
    Utf8(String),
    Class(u16),
    NameAndType { name: u16, descriptor: u16 },
    Methodref { class: u16, name_and_type: u16 },
    InterfaceMethodref { class: u16, name_and_type: u16 },
}

/// Constant pool under construction.
#[derive(Debug, Clone, Default)]
pub struct ConstantPool {
    entries: Vec<Constant>,
    index: FxHashMap<Constant, u16>,
}

impl ConstantPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// `constant_pool_count` as written to the class file (entries + 1).
    pub fn count(&self) -> u16 {
        // `intern` never lets the pool grow past MAX_POOL_INDEX - 1 entries.
        (self.entries.len() + 1) as u16
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn intern(&mut self, constant: Constant) -> Result<u16, ClassFileError> {
        if let Some(&index) = self.index.get(&constant) {
            return Ok(index);
        }
        let index = self.entries.len() + 1;
        if index >= MAX_POOL_INDEX {
            return Err(ClassFileError::ConstantPoolOverflow);
        }
        let index = index as u16;
        self.entries.push(constant.clone());
        self.index.insert(constant, index);
        Ok(index)
    }

    pub fn utf8(&mut self, value: &str) -> Result<u16, ClassFileError> {
        if encode_modified_utf8(value).len() > u16::MAX as usize {
            return Err(ClassFileError::StringTooLong(value.len()));
        }
        self.intern(Constant::Utf8(value.to_string()))
    }

    /// Index of an already interned Utf8 entry.
    pub fn find_utf8(&self, value: &str) -> Option<u16> {
        self.index.get(&Constant::Utf8(value.to_string())).copied()
    }

    pub fn class(&mut self, binary_name: &str) -> Result<u16, ClassFileError> {
        let name = self.utf8(binary_name)?;
        self.intern(Constant::Class(name))
    }

    pub fn name_and_type(&mut self, name: &str, descriptor: &str) -> Result<u16, ClassFileError> {
        let name = self.utf8(name)?;
        let descriptor = self.utf8(descriptor)?;
        self.intern(Constant::NameAndType { name, descriptor })
    }

    /// `Methodref` or, for interface owners, `InterfaceMethodref`.
    pub fn method_ref(
        &mut self,
        owner: &str,
        name: &str,
        descriptor: &str,
        is_interface: bool,
    ) -> Result<u16, ClassFileError> {
        let class = self.class(owner)?;
        let name_and_type = self.name_and_type(name, descriptor)?;
        let constant = if is_interface {
            Constant::InterfaceMethodref {
                class,
                name_and_type,
            }
        } else {
            Constant::Methodref {
                class,
                name_and_type,
            }
        };
        self.intern(constant)
    }

    /// Serialize `constant_pool_count` followed by every entry.
    pub fn write_to(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.count().to_be_bytes());
        for constant in &self.entries {
            match constant {
                Constant::Utf8(value) => {
                    let bytes = encode_modified_utf8(value);
                    out.push(TAG_UTF8);
                    out.extend_from_slice(&(bytes.len() as u16).to_be_bytes());
                    out.extend_from_slice(&bytes);
                }
                Constant::Class(name) => {
                    out.push(TAG_CLASS);
                    out.extend_from_slice(&name.to_be_bytes());
                }
                Constant::NameAndType { name, descriptor } => {
                    out.push(TAG_NAME_AND_TYPE);
                    out.extend_from_slice(&name.to_be_bytes());
                    out.extend_from_slice(&descriptor.to_be_bytes());
                }
                Constant::Methodref {
                    class,
                    name_and_type,
                } => {
                    out.push(TAG_METHODREF);
                    out.extend_from_slice(&class.to_be_bytes());
                    out.extend_from_slice(&name_and_type.to_be_bytes());
                }
                Constant::InterfaceMethodref {
                    class,
                    name_and_type,
                } => {
                    out.push(TAG_INTERFACE_METHODREF);
                    out.extend_from_slice(&class.to_be_bytes());
                    out.extend_from_slice(&name_and_type.to_be_bytes());
                }
            }
        }
    }
}

/// Encode a string in the class-file "modified UTF-8" form: NUL becomes the
/// two-byte sequence `C0 80` and supplementary characters are written as
/// surrogate pairs, each encoded on three bytes.
pub fn encode_modified_utf8(value: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(value.len());
    for unit in value.encode_utf16() {
        match unit {
            0x0001..=0x007f => out.push(unit as u8),
            0x0000 | 0x0080..=0x07ff => {
                out.push(0xc0 | ((unit >> 6) & 0x1f) as u8);
                out.push(0x80 | (unit & 0x3f) as u8);
            }
            _ => {
                out.push(0xe0 | ((unit >> 12) & 0x0f) as u8);
                out.push(0x80 | ((unit >> 6) & 0x3f) as u8);
                out.push(0x80 | (unit & 0x3f) as u8);
            }
        }
    }
    out
}

/// Inverse of [`encode_modified_utf8`].
pub fn decode_modified_utf8(bytes: &[u8]) -> Option<String> {
    let mut units = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let b0 = bytes[i] as u16;
        if b0 & 0x80 == 0 {
            if b0 == 0 {
                return None;
            }
            units.push(b0);
            i += 1;
        } else if b0 & 0xe0 == 0xc0 {
            let b1 = *bytes.get(i + 1)? as u16;
            if b1 & 0xc0 != 0x80 {
                return None;
            }
            units.push(((b0 & 0x1f) << 6) | (b1 & 0x3f));
            i += 2;
        } else if b0 & 0xf0 == 0xe0 {
            let b1 = *bytes.get(i + 1)? as u16;
            let b2 = *bytes.get(i + 2)? as u16;
            if b1 & 0xc0 != 0x80 || b2 & 0xc0 != 0x80 {
                return None;
            }
            units.push(((b0 & 0x0f) << 12) | ((b1 & 0x3f) << 6) | (b2 & 0x3f));
            i += 3;
        } else {
            return None;
        }
    }
    String::from_utf16(&units).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interning_shares_indices() {
        let mut pool = ConstantPool::new();
        let a = pool.class("java/lang/Object").unwrap();
        let b = pool.class("java/lang/Object").unwrap();
        assert_eq!(a, b);
        // Utf8 + Class
        assert_eq!(pool.count(), 3);

        let m1 = pool.method_ref("a/B", "run", "()V", false).unwrap();
        let m2 = pool.method_ref("a/B", "run", "()V", true).unwrap();
        assert_ne!(m1, m2, "Methodref and InterfaceMethodref are distinct entries");
    }

    #[test]
    fn test_indices_start_at_one() {
        let mut pool = ConstantPool::new();
        assert!(pool.is_empty());
        assert_eq!(pool.utf8("Code").unwrap(), 1);
        assert_eq!(pool.utf8("Other").unwrap(), 2);
    }

    #[test]
    fn test_overflow() {
        let mut pool = ConstantPool::new();
        for i in 0..(MAX_POOL_INDEX - 1) {
            pool.utf8(&format!("s{}", i)).unwrap();
        }
        assert!(matches!(pool.utf8("one-too-many"), Err(ClassFileError::ConstantPoolOverflow)));
        // Existing entries are still resolvable.
        assert_eq!(pool.utf8("s0").unwrap(), 1);
    }

    #[test]
    fn test_modified_utf8() {
        assert_eq!(encode_modified_utf8("abc"), b"abc".to_vec());
        assert_eq!(encode_modified_utf8("\0"), vec![0xc0, 0x80]);
        // U+1F600 is written as a surrogate pair, three bytes each.
        let emoji = encode_modified_utf8("\u{1F600}");
        assert_eq!(emoji.len(), 6);

        for s in ["j$/time/Instant", "\0x", "é", "\u{1F600}z"] {
            assert_eq!(decode_modified_utf8(&encode_modified_utf8(s)).as_deref(), Some(s));
        }
        assert_eq!(decode_modified_utf8(&[0x00]), None);
        assert_eq!(decode_modified_utf8(&[0xc0]), None);
    }

    #[test]
    fn test_serialized_layout() {
        let mut pool = ConstantPool::new();
        pool.class("A").unwrap();
        let mut out = Vec::new();
        pool.write_to(&mut out);
        assert_eq!(out, vec![0, 3, TAG_UTF8, 0, 1, b'A', TAG_CLASS, 0, 1]);
    }
}
