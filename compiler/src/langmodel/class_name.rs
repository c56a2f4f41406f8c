//! Binary class names
//!
//! Class names are kept in their internal (slash-separated) binary form, e.g.
//! `java/time/Instant`, which is what appears in class files and descriptors.

use super::DescriptorError;
use std::fmt;
use std::path::PathBuf;

/// Internal binary name of a class, e.g. `android/app/Activity`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClassName(String);

impl ClassName {
    /// Create a class name from its binary form, validating it.
    pub fn new(binary_name: impl Into<String>) -> Result<Self, DescriptorError> {
        let binary_name = binary_name.into();
        validate_binary_name(&binary_name)?;
        Ok(Self(binary_name))
    }

    /// `java/lang/Object`, the implicit superclass of every adapter class.
    pub fn java_lang_object() -> Self {
        Self("java/lang/Object".to_string())
    }

    pub fn binary_name(&self) -> &str {
        &self.0
    }

    /// Dotted source-level name, e.g. `java.time.Instant`.
    pub fn qualified_name(&self) -> String {
        self.0.replace('/', ".")
    }

    /// Name without its package, e.g. `Instant`.
    pub fn simple_name(&self) -> &str {
        match self.0.rfind('/') {
            Some(pos) => &self.0[pos + 1..],
            None => &self.0,
        }
    }

    /// Package part including the trailing slash, or `""` for the default package.
    pub fn package_prefix(&self) -> &str {
        match self.0.rfind('/') {
            Some(pos) => &self.0[..=pos],
            None => "",
        }
    }

    /// Whether the name lives under `prefix` (which must end with `/`).
    pub fn has_package_prefix(&self, prefix: &str) -> bool {
        self.0.starts_with(prefix)
    }

    /// Swap a leading package prefix, e.g. `java/` to `j$/`.
    ///
    /// Returns `None` if the name does not start with `from`.
    pub fn replace_package_prefix(&self, from: &str, to: &str) -> Option<ClassName> {
        self.0
            .strip_prefix(from)
            .map(|rest| ClassName(format!("{}{}", to, rest)))
    }

    /// Nest the whole name under another package root, e.g.
    /// `android/app/Activity` under `i__typeadapter/`.
    pub fn with_package_prefix(&self, prefix: &str) -> ClassName {
        ClassName(format!("{}{}", prefix, self.0))
    }

    pub fn with_simple_name_suffix(&self, suffix: &str) -> ClassName {
        ClassName(format!("{}{}", self.0, suffix))
    }

    /// Object type descriptor, e.g. `Ljava/time/Instant;`.
    pub fn type_descriptor(&self) -> String {
        format!("L{};", self.0)
    }

    /// Relative path of the class file for this class, e.g. `java/time/Instant.class`.
    pub fn class_file_path(&self) -> PathBuf {
        let mut path: PathBuf = self.0.split('/').collect();
        path.set_extension("class");
        path
    }
}

impl fmt::Display for ClassName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<&str> for ClassName {
    type Error = DescriptorError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        ClassName::new(value)
    }
}

fn validate_binary_name(name: &str) -> Result<(), DescriptorError> {
    let invalid = || DescriptorError::InvalidClassName(name.to_string());

    if name.is_empty() {
        return Err(invalid());
    }
    // Segments must be non-empty and free of the characters the JVM reserves
    // in binary names.
    for segment in name.split('/') {
        if segment.is_empty() || segment.contains(['.', ';', '[', '<', '>']) {
            return Err(invalid());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_parts() {
        let name = ClassName::new("java/time/Instant").unwrap();
        assert_eq!(name.simple_name(), "Instant");
        assert_eq!(name.package_prefix(), "java/time/");
        assert_eq!(name.qualified_name(), "java.time.Instant");
        assert_eq!(name.type_descriptor(), "Ljava/time/Instant;");
    }

    #[test]
    fn test_default_package() {
        let name = ClassName::new("Main").unwrap();
        assert_eq!(name.simple_name(), "Main");
        assert_eq!(name.package_prefix(), "");
    }

    #[test]
    fn test_prefix_rewrites() {
        let name = ClassName::new("java/time/Instant").unwrap();
        assert!(name.has_package_prefix("java/time/"));
        assert!(!name.has_package_prefix("java/util/"));
        assert_eq!(
            name.replace_package_prefix("java/", "j$/").unwrap().binary_name(),
            "j$/time/Instant"
        );
        assert!(name.replace_package_prefix("android/", "x/").is_none());

        let adapter = ClassName::new("android/app/Activity")
            .unwrap()
            .with_package_prefix("i__typeadapter/")
            .with_simple_name_suffix("Adapter");
        assert_eq!(adapter.binary_name(), "i__typeadapter/android/app/ActivityAdapter");
    }

    #[test]
    fn test_class_file_path() {
        let name = ClassName::new("i__typeadapter/android/app/ActivityAdapter").unwrap();
        assert_eq!(
            name.class_file_path(),
            PathBuf::from("i__typeadapter/android/app/ActivityAdapter.class")
        );
    }

    #[test]
    fn test_rejects_malformed_names() {
        for bad in ["", "java.lang.Object", "java//Object", "/Object", "java/", "[I", "Ljava/lang/Object;"] {
            assert!(ClassName::new(bad).is_err(), "accepted {:?}", bad);
        }
        assert!(ClassName::new("j$/time/Instant").is_ok());
        assert!(ClassName::new("Outer$Inner").is_ok());
    }
}
