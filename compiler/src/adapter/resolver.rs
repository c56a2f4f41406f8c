//! Adapter resolution
//!
//! The resolver decides, for an original call site, which adapter method the
//! desugared caller will invoke instead, and which converter calls translate
//! between a mirrored type and the built-in type it shadows. Generation only
//! talks to it through [`AdapterResolver`], so tests can plug in their own
//! mappings.

use crate::config::{AdapterNamingConfig, ShadowgenConfig, TypeMappingConfig};
use crate::langmodel::{
    ClassName, DescriptorError, FieldType, InvocationKind, MethodDescriptor, MethodInvocationSite,
    MethodKey, PrimitiveType, ReturnType,
};
use std::fmt;

/// Classification of a declared value type for conversion decisions.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeClass {
    Primitive(PrimitiveType),
    /// Desugared stand-in for a built-in type; converted at the bridge boundary.
    Mirrored(ClassName),
    /// The built-in type itself.
    Shadowed(ClassName),
    /// Any other object or array type; passed through untouched.
    OtherReference,
}

impl TypeClass {
    pub fn is_mirrored(&self) -> bool {
        matches!(self, TypeClass::Mirrored(_))
    }
}

/// Maps original call sites to adapter call sites, and mirrored types to
/// their conversion calls. Implementations must be pure: the same input
/// always yields the same result.
pub trait AdapterResolver {
    /// The static adapter call that replaces `original` in desugared code.
    fn adapter_site(&self, original: &MethodInvocationSite) -> Result<MethodInvocationSite, ResolveError>;

    fn classify(&self, ty: &FieldType) -> TypeClass;

    /// The built-in type a mirrored type stands in for.
    fn mirrored_to_shadowed_type(&self, mirrored: &ClassName) -> Result<ClassName, ResolveError>;

    /// Call converting a value of `mirrored` type into its shadowed form.
    fn mirrored_to_shadowed(&self, mirrored: &ClassName) -> Result<MethodInvocationSite, ResolveError>;

    /// Call converting a value of `shadowed` type into its mirrored form.
    fn shadowed_to_mirrored(&self, shadowed: &ClassName) -> Result<MethodInvocationSite, ResolveError>;
}

impl<R: AdapterResolver + ?Sized> AdapterResolver for &R {
    fn adapter_site(&self, original: &MethodInvocationSite) -> Result<MethodInvocationSite, ResolveError> {
        (**self).adapter_site(original)
    }

    fn classify(&self, ty: &FieldType) -> TypeClass {
        (**self).classify(ty)
    }

    fn mirrored_to_shadowed_type(&self, mirrored: &ClassName) -> Result<ClassName, ResolveError> {
        (**self).mirrored_to_shadowed_type(mirrored)
    }

    fn mirrored_to_shadowed(&self, mirrored: &ClassName) -> Result<MethodInvocationSite, ResolveError> {
        (**self).mirrored_to_shadowed(mirrored)
    }

    fn shadowed_to_mirrored(&self, shadowed: &ClassName) -> Result<MethodInvocationSite, ResolveError> {
        (**self).shadowed_to_mirrored(shadowed)
    }
}

/// Resolver following the desugaring naming scheme:
///
/// - `java/time/Instant` is shadowed, `j$/time/Instant` mirrors it;
/// - calls on `android/app/Activity` are bridged through
///   `i__typeadapter/android/app/ActivityAdapter`;
/// - `j$/time/Instant` values convert through
///   `i__typeadapter/j$/time/InstantConverter.to/from`.
#[derive(Debug, Clone)]
pub struct DesugarAdapterResolver {
    types: TypeMappingConfig,
    naming: AdapterNamingConfig,
    // Shadowed packages re-rooted under the mirrored root.
    mirrored_packages: Vec<String>,
}

impl DesugarAdapterResolver {
    pub fn new(types: TypeMappingConfig, naming: AdapterNamingConfig) -> Self {
        let mirrored_packages = types
            .shadowed_packages
            .iter()
            .filter_map(|package| {
                package
                    .strip_prefix(types.shadowed_root.as_str())
                    .map(|rest| format!("{}{}", types.mirrored_root, rest))
            })
            .collect();
        Self {
            types,
            naming,
            mirrored_packages,
        }
    }

    pub fn from_config(config: &ShadowgenConfig) -> Self {
        Self::new(config.types.clone(), config.adapters.clone())
    }

    pub fn is_shadowed(&self, name: &ClassName) -> bool {
        self.types
            .shadowed_packages
            .iter()
            .any(|package| name.has_package_prefix(package))
    }

    pub fn is_mirrored(&self, name: &ClassName) -> bool {
        self.mirrored_packages
            .iter()
            .any(|package| name.has_package_prefix(package))
    }

    fn mirror_of(&self, shadowed: &ClassName) -> Option<ClassName> {
        if !self.is_shadowed(shadowed) {
            return None;
        }
        shadowed.replace_package_prefix(&self.types.shadowed_root, &self.types.mirrored_root)
    }

    /// Only plain object types are rewritten; arrays pass through as-is since
    /// no converter exists for them.
    fn mirror_field_type(&self, ty: &FieldType) -> FieldType {
        match ty.as_object().and_then(|name| self.mirror_of(name)) {
            Some(mirrored) => FieldType::Object(mirrored),
            None => ty.clone(),
        }
    }

    pub fn adapter_owner(&self, original_owner: &ClassName) -> ClassName {
        original_owner
            .with_package_prefix(&self.naming.package_root)
            .with_simple_name_suffix(&self.naming.adapter_suffix)
    }

    pub fn converter_owner(&self, mirrored: &ClassName) -> ClassName {
        mirrored
            .with_package_prefix(&self.naming.package_root)
            .with_simple_name_suffix(&self.naming.converter_suffix)
    }

    fn converter_site(
        &self,
        mirrored: &ClassName,
        name: &str,
        from: &ClassName,
        to: &ClassName,
    ) -> Result<MethodInvocationSite, ResolveError> {
        let descriptor = MethodDescriptor::new(
            [FieldType::Object(from.clone())],
            ReturnType::Value(FieldType::Object(to.clone())),
        );
        let method = MethodKey::new(self.converter_owner(mirrored), name, descriptor)?;
        Ok(MethodInvocationSite::new(InvocationKind::Static, method, false))
    }
}

impl Default for DesugarAdapterResolver {
    fn default() -> Self {
        Self::new(TypeMappingConfig::default(), AdapterNamingConfig::default())
    }
}

impl AdapterResolver for DesugarAdapterResolver {
    fn adapter_site(&self, original: &MethodInvocationSite) -> Result<MethodInvocationSite, ResolveError> {
        let method = original.method();
        if method.is_constructor() || method.is_static_initializer() {
            return Err(ResolveError::UnsupportedSite {
                site: original.to_string(),
                reason: "initializers cannot be bridged by a static adapter",
            });
        }
        if self.is_mirrored(original.owner()) {
            return Err(ResolveError::UnsupportedSite {
                site: original.to_string(),
                reason: "owner is already a mirrored type",
            });
        }

        let descriptor = if original.is_static_invocation() {
            original.descriptor().clone()
        } else {
            original
                .descriptor()
                .with_leading_argument(FieldType::Object(original.owner().clone()))
        };
        let descriptor = descriptor.map_types(|ty| self.mirror_field_type(ty));

        let adapter = MethodKey::new(self.adapter_owner(original.owner()), method.name(), descriptor)?;
        Ok(MethodInvocationSite::new(InvocationKind::Static, adapter, false))
    }

    fn classify(&self, ty: &FieldType) -> TypeClass {
        match ty {
            FieldType::Primitive(p) => TypeClass::Primitive(*p),
            FieldType::Object(name) if self.is_mirrored(name) => TypeClass::Mirrored(name.clone()),
            FieldType::Object(name) if self.is_shadowed(name) => TypeClass::Shadowed(name.clone()),
            FieldType::Object(_) | FieldType::Array(_) => TypeClass::OtherReference,
        }
    }

    fn mirrored_to_shadowed_type(&self, mirrored: &ClassName) -> Result<ClassName, ResolveError> {
        if !self.is_mirrored(mirrored) {
            return Err(ResolveError::NotMirrored(mirrored.clone()));
        }
        mirrored
            .replace_package_prefix(&self.types.mirrored_root, &self.types.shadowed_root)
            .ok_or_else(|| ResolveError::NotMirrored(mirrored.clone()))
    }

    fn mirrored_to_shadowed(&self, mirrored: &ClassName) -> Result<MethodInvocationSite, ResolveError> {
        let shadowed = self.mirrored_to_shadowed_type(mirrored)?;
        self.converter_site(mirrored, &self.naming.to_shadowed_method, mirrored, &shadowed)
    }

    fn shadowed_to_mirrored(&self, shadowed: &ClassName) -> Result<MethodInvocationSite, ResolveError> {
        let mirrored = self
            .mirror_of(shadowed)
            .ok_or_else(|| ResolveError::NotShadowed(shadowed.clone()))?;
        self.converter_site(&mirrored, &self.naming.to_mirrored_method, shadowed, &mirrored)
    }
}

/// Failure of the resolver for one site or type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    UnsupportedSite { site: String, reason: &'static str },
    NotMirrored(ClassName),
    NotShadowed(ClassName),
    InvalidDescriptor(DescriptorError),
}

impl fmt::Display for ResolveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolveError::UnsupportedSite { site, reason } => {
                write!(f, "Cannot adapt '{}': {}", site, reason)
            }
            ResolveError::NotMirrored(name) => write!(f, "'{}' is not a mirrored type", name),
            ResolveError::NotShadowed(name) => write!(f, "'{}' is not a shadowed type", name),
            ResolveError::InvalidDescriptor(e) => write!(f, "Invalid adapter descriptor: {}", e),
        }
    }
}

impl std::error::Error for ResolveError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ResolveError::InvalidDescriptor(e) => Some(e),
            _ => None,
        }
    }
}

impl From<DescriptorError> for ResolveError {
    fn from(e: DescriptorError) -> Self {
        ResolveError::InvalidDescriptor(e)
    }
}
