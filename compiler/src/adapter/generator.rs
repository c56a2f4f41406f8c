//! Generation run
//!
//! A run moves through three typed stages, so the order of operations is
//! enforced by the compiler:
//!
//! ```text
//! AdapterGenerator::group      one empty builder per distinct adapter owner
//!   .emit_adapter_methods()    one bridge per record entry, in record order
//!   .close_class_builders()    every builder closed, all at once
//!   .provide_file_contents()   one lazily serialized artifact per owner
//! ```

use super::artifact::GeneratedArtifact;
use super::class_builder::{AdapterClassBuilder, ClosedAdapterClass};
use super::emitter::emit_bridge_method;
use super::resolver::AdapterResolver;
use super::AdapterGenError;
use crate::classfile::ClassFileOptions;
use crate::langmodel::{ClassName, InvocationSiteRecord, MethodInvocationSite};
use indexmap::IndexMap;
use log::{debug, info};
use std::fmt;

/// Counts for one completed run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GenerationSummary {
    pub owners: usize,
    pub bridge_methods: usize,
    pub conversions: usize,
}

impl fmt::Display for GenerationSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} adapter class(es), {} bridge method(s), {} conversion(s)",
            self.owners, self.bridge_methods, self.conversions
        )
    }
}

/// Grouped stage: builders exist for every owner, none has methods.
pub struct AdapterGenerator<'a, R: AdapterResolver + ?Sized> {
    record: &'a InvocationSiteRecord,
    resolver: &'a R,
    builders: IndexMap<ClassName, AdapterClassBuilder>,
}

impl<'a, R: AdapterResolver + ?Sized> AdapterGenerator<'a, R> {
    /// Resolve every record entry once and create one builder per distinct
    /// adapter owner, in first-seen order.
    pub fn group(
        record: &'a InvocationSiteRecord,
        resolver: &'a R,
        options: ClassFileOptions,
    ) -> Result<Self, AdapterGenError> {
        let mut builders = IndexMap::new();
        for site in record {
            let adapter = resolver.adapter_site(site)?;
            if !builders.contains_key(adapter.owner()) {
                let builder = AdapterClassBuilder::new(adapter.owner().clone(), options)?;
                builders.insert(adapter.owner().clone(), builder);
            }
        }
        debug!(
            "grouped {} call site(s) into {} adapter owner(s)",
            record.len(),
            builders.len()
        );
        Ok(Self {
            record,
            resolver,
            builders,
        })
    }

    pub fn owners(&self) -> impl Iterator<Item = &ClassName> {
        self.builders.keys()
    }

    /// Emit one bridge method per record entry into its owner's builder.
    pub fn emit_adapter_methods(mut self) -> Result<EmittedAdapters, AdapterGenError> {
        let mut summary = GenerationSummary {
            owners: self.builders.len(),
            ..GenerationSummary::default()
        };

        for original in self.record {
            let adapter = self.resolver.adapter_site(original)?;
            let builder = lookup_builder(&mut self.builders, &adapter)?;
            let emitted = emit_bridge_method(builder, self.resolver, original, &adapter)?;
            summary.bridge_methods += 1;
            summary.conversions += emitted.conversions;
        }

        Ok(EmittedAdapters {
            builders: self.builders,
            summary,
        })
    }
}

fn lookup_builder<'b>(
    builders: &'b mut IndexMap<ClassName, AdapterClassBuilder>,
    adapter: &MethodInvocationSite,
) -> Result<&'b mut AdapterClassBuilder, AdapterGenError> {
    match builders.get_index_of(adapter.owner()) {
        Some(index) => Ok(&mut builders[index]),
        None => Err(AdapterGenError::MissingAdapterOwner {
            owner: adapter.owner().clone(),
            available: builders.keys().cloned().collect(),
        }),
    }
}

/// Every bridge has been written; builders are still open.
pub struct EmittedAdapters {
    builders: IndexMap<ClassName, AdapterClassBuilder>,
    summary: GenerationSummary,
}

impl EmittedAdapters {
    pub fn summary(&self) -> GenerationSummary {
        self.summary
    }

    pub fn close_class_builders(self) -> ClosedAdapters {
        let classes = self
            .builders
            .into_iter()
            .map(|(owner, builder)| (owner, builder.close()))
            .collect();
        ClosedAdapters {
            classes,
            summary: self.summary,
        }
    }
}

/// All classes closed and ready to be packaged.
pub struct ClosedAdapters {
    classes: IndexMap<ClassName, ClosedAdapterClass>,
    summary: GenerationSummary,
}

impl ClosedAdapters {
    pub fn summary(&self) -> GenerationSummary {
        self.summary
    }

    pub fn classes(&self) -> impl Iterator<Item = &ClosedAdapterClass> {
        self.classes.values()
    }

    pub fn provide_file_contents(self) -> Vec<GeneratedArtifact> {
        self.classes.into_values().map(GeneratedArtifact::new).collect()
    }
}

/// Generate one adapter class per distinct adapter owner in `record`.
///
/// Any failure aborts the whole run; no artifacts are returned.
pub fn generate_adapter_classes<R: AdapterResolver + ?Sized>(
    record: &InvocationSiteRecord,
    resolver: &R,
    options: &ClassFileOptions,
) -> Result<Vec<GeneratedArtifact>, AdapterGenError> {
    generate_with_summary(record, resolver, options).map(|(artifacts, _)| artifacts)
}

/// Same as [`generate_adapter_classes`], also returning the run's counts.
pub fn generate_with_summary<R: AdapterResolver + ?Sized>(
    record: &InvocationSiteRecord,
    resolver: &R,
    options: &ClassFileOptions,
) -> Result<(Vec<GeneratedArtifact>, GenerationSummary), AdapterGenError> {
    info!("Generating adapters for {} call site(s)", record.len());

    let closed = AdapterGenerator::group(record, resolver, *options)?
        .emit_adapter_methods()?
        .close_class_builders();
    let summary = closed.summary();
    let artifacts = closed.provide_file_contents();

    info!("Generated {}", summary);
    Ok((artifacts, summary))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::resolver::DesugarAdapterResolver;
    use crate::langmodel::{InvocationKind, MethodKey};

    fn site(owner: &str, name: &str, desc: &str) -> MethodInvocationSite {
        MethodInvocationSite::new(
            InvocationKind::Virtual,
            MethodKey::parse(owner, name, desc).unwrap(),
            false,
        )
    }

    #[test]
    fn test_grouping_first_seen_order() {
        let record: InvocationSiteRecord = [
            site("b/Second", "m", "()V"),
            site("a/First", "m", "()V"),
            site("b/Second", "n", "()V"),
        ]
        .into_iter()
        .collect();
        let resolver = DesugarAdapterResolver::default();
        let generator = AdapterGenerator::group(&record, &resolver, ClassFileOptions::default()).unwrap();
        let owners: Vec<_> = generator.owners().map(ClassName::binary_name).collect();
        assert_eq!(
            owners,
            vec!["i__typeadapter/b/SecondAdapter", "i__typeadapter/a/FirstAdapter"]
        );
    }

    #[test]
    fn test_summary_counts() {
        let record: InvocationSiteRecord = [
            site("a/B", "set", "(Ljava/time/Instant;)Ljava/time/Instant;"),
            site("a/B", "count", "()I"),
        ]
        .into_iter()
        .collect();
        let (artifacts, summary) =
            generate_with_summary(&record, &DesugarAdapterResolver::default(), &ClassFileOptions::default())
                .unwrap();
        assert_eq!(artifacts.len(), 1);
        assert_eq!(
            summary,
            GenerationSummary {
                owners: 1,
                bridge_methods: 2,
                conversions: 2,
            }
        );
        assert_eq!(artifacts[0].method_count(), 2);
    }

    #[test]
    fn test_empty_record() {
        let record = InvocationSiteRecord::new();
        let artifacts =
            generate_adapter_classes(&record, &DesugarAdapterResolver::default(), &ClassFileOptions::default())
                .unwrap();
        assert!(artifacts.is_empty());
    }
}
