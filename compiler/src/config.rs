//! `shadowgen.toml` parsing.
//!
//! Every section and key is optional; missing values fall back to the
//! defaults below.
//!
//! ```toml
//! [classfile]
//! major-version = 51
//!
//! [types]
//! shadowed-packages = ["java/time/"]
//! shadowed-root = "java/"
//! mirrored-root = "j$/"
//!
//! [adapters]
//! package-root = "i__typeadapter/"
//! adapter-suffix = "Adapter"
//! converter-suffix = "Converter"
//! to-shadowed-method = "to"
//! to-mirrored-method = "from"
//! ```

use crate::classfile::{ClassFileOptions, DEFAULT_MAJOR_VERSION, MIN_MAJOR_VERSION};
use serde::Deserialize;
use std::fmt;
use std::path::Path;

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ShadowgenConfig {
    pub classfile: ClassFileConfig,
    pub types: TypeMappingConfig,
    pub adapters: AdapterNamingConfig,
}

/// `[classfile]` section.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct ClassFileConfig {
    pub major_version: u16,
}

impl Default for ClassFileConfig {
    fn default() -> Self {
        Self {
            major_version: DEFAULT_MAJOR_VERSION,
        }
    }
}

/// `[types]` section: which built-in types are shadowed, and where their
/// mirrored counterparts live.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct TypeMappingConfig {
    /// Package prefixes of shadowed built-in types
    pub shadowed_packages: Vec<String>,
    /// Root prefix replaced when mirroring (`java/time/X` → `j$/time/X`)
    pub shadowed_root: String,
    /// Root prefix of mirrored types
    pub mirrored_root: String,
}

impl Default for TypeMappingConfig {
    fn default() -> Self {
        Self {
            shadowed_packages: vec!["java/time/".to_string()],
            shadowed_root: "java/".to_string(),
            mirrored_root: "j$/".to_string(),
        }
    }
}

/// `[adapters]` section: naming of generated adapter and converter classes.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct AdapterNamingConfig {
    /// Package under which adapter and converter classes are nested
    pub package_root: String,
    /// Appended to the original owner name to form the adapter class
    pub adapter_suffix: String,
    /// Appended to a mirrored type name to form its converter class
    pub converter_suffix: String,
    /// Converter method turning a mirrored value into its shadowed form
    pub to_shadowed_method: String,
    /// Converter method turning a shadowed value into its mirrored form
    pub to_mirrored_method: String,
}

impl Default for AdapterNamingConfig {
    fn default() -> Self {
        Self {
            package_root: "i__typeadapter/".to_string(),
            adapter_suffix: "Adapter".to_string(),
            converter_suffix: "Converter".to_string(),
            to_shadowed_method: "to".to_string(),
            to_mirrored_method: "from".to_string(),
        }
    }
}

impl ShadowgenConfig {
    /// Parse and validate a configuration string.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: ShadowgenConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn class_file_options(&self) -> ClassFileOptions {
        ClassFileOptions {
            major_version: self.classfile.major_version,
            ..ClassFileOptions::default()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.classfile.major_version < MIN_MAJOR_VERSION {
            return Err(ConfigError::Invalid(format!(
                "classfile.major-version must be at least {}, got {}",
                MIN_MAJOR_VERSION, self.classfile.major_version
            )));
        }

        let types = &self.types;
        require_package_prefix("types.shadowed-root", &types.shadowed_root)?;
        require_package_prefix("types.mirrored-root", &types.mirrored_root)?;
        if types.shadowed_root == types.mirrored_root {
            return Err(ConfigError::Invalid(
                "types.shadowed-root and types.mirrored-root must differ".to_string(),
            ));
        }
        for package in &types.shadowed_packages {
            require_package_prefix("types.shadowed-packages", package)?;
            if !package.starts_with(&types.shadowed_root) {
                return Err(ConfigError::Invalid(format!(
                    "shadowed package '{}' is not under shadowed root '{}'",
                    package, types.shadowed_root
                )));
            }
        }

        let adapters = &self.adapters;
        require_package_prefix("adapters.package-root", &adapters.package_root)?;
        for (key, value) in [
            ("adapters.to-shadowed-method", &adapters.to_shadowed_method),
            ("adapters.to-mirrored-method", &adapters.to_mirrored_method),
        ] {
            if value.is_empty() || value.contains(['.', ';', '[', '/', '<', '>']) {
                return Err(ConfigError::Invalid(format!("{} '{}' is not a method name", key, value)));
            }
        }
        if adapters.adapter_suffix.contains('/') || adapters.converter_suffix.contains('/') {
            return Err(ConfigError::Invalid(
                "adapter and converter suffixes may not contain '/'".to_string(),
            ));
        }
        Ok(())
    }
}

fn require_package_prefix(key: &str, value: &str) -> Result<(), ConfigError> {
    if value.is_empty() || !value.ends_with('/') || value.starts_with('/') || value.contains("//") {
        return Err(ConfigError::Invalid(format!(
            "{} must be a package prefix ending in '/', got '{}'",
            key, value
        )));
    }
    Ok(())
}

/// Errors raised while loading the configuration.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Invalid(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "Failed to read shadowgen.toml: {}", e),
            ConfigError::Parse(e) => write!(f, "Failed to parse shadowgen.toml: {}", e),
            ConfigError::Invalid(msg) => write!(f, "Invalid configuration: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        ConfigError::Io(e)
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(e: toml::de::Error) -> Self {
        ConfigError::Parse(e)
    }
}
