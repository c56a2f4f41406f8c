//! Generated class-file artifacts

use super::class_builder::ClosedAdapterClass;
use crate::langmodel::ClassName;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// One generated adapter class: its relative output path and its bytes,
/// serialized on first access.
pub struct GeneratedArtifact {
    path: PathBuf,
    class: ClosedAdapterClass,
    content: OnceLock<Vec<u8>>,
}

impl GeneratedArtifact {
    pub fn new(class: ClosedAdapterClass) -> Self {
        Self {
            path: class.path(),
            class,
            content: OnceLock::new(),
        }
    }

    /// Relative path, e.g. `i__typeadapter/android/app/ActivityAdapter.class`.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn owner(&self) -> &ClassName {
        self.class.owner()
    }

    pub fn method_count(&self) -> usize {
        self.class.method_count()
    }

    pub fn content(&self) -> &[u8] {
        self.content.get_or_init(|| self.class.to_bytes())
    }

    /// Whether [`content`](Self::content) has been produced yet.
    pub fn is_materialized(&self) -> bool {
        self.content.get().is_some()
    }

    pub fn into_content(self) -> Vec<u8> {
        match self.content.into_inner() {
            Some(bytes) => bytes,
            None => self.class.to_bytes(),
        }
    }
}

impl fmt::Debug for GeneratedArtifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeneratedArtifact")
            .field("path", &self.path)
            .field("methods", &self.class.method_count())
            .field("materialized", &self.is_materialized())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::class_builder::AdapterClassBuilder;
    use crate::classfile::ClassFileOptions;

    fn artifact() -> GeneratedArtifact {
        let builder = AdapterClassBuilder::new(
            ClassName::new("i__typeadapter/x/YAdapter").unwrap(),
            ClassFileOptions::default(),
        )
        .unwrap();
        GeneratedArtifact::new(builder.close())
    }

    #[test]
    fn test_content_is_lazy_and_cached() {
        let artifact = artifact();
        assert_eq!(artifact.path(), Path::new("i__typeadapter/x/YAdapter.class"));
        assert!(!artifact.is_materialized());

        let first = artifact.content().as_ptr();
        assert!(artifact.is_materialized());
        assert_eq!(artifact.content().as_ptr(), first);
        assert_eq!(&artifact.content()[..4], &[0xca, 0xfe, 0xba, 0xbe]);
    }

    #[test]
    fn test_into_content_matches_content() {
        let eager = artifact();
        let expected = eager.content().to_vec();
        assert_eq!(eager.into_content(), expected);
        assert_eq!(artifact().into_content(), expected);
    }
}
