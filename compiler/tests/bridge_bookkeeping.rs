//! max_stack / max_locals of emitted bridges, argument-slot limits, and
//! runs driven by resolvers that break the generator's assumptions.

use compiler::adapter::{
    generate_adapter_classes, AdapterGenError, AdapterResolver, DesugarAdapterResolver, ResolveError,
    TypeClass,
};
use compiler::classfile::{ClassFileError, ClassFileOptions, ClassReader, Instruction, ParsedCode};
use compiler::langmodel::{
    ClassName, DescriptorError, FieldType, InvocationKind, InvocationSiteRecord, MethodInvocationSite, MethodKey,
    RecordError, ValueKind,
};
use std::cell::Cell;

fn site(kind: InvocationKind, owner: &str, name: &str, desc: &str) -> MethodInvocationSite {
    MethodInvocationSite::new(kind, MethodKey::parse(owner, name, desc).unwrap(), false)
}

fn single_bridge_code(original: MethodInvocationSite) -> ParsedCode {
    let record: InvocationSiteRecord = std::iter::once(original).collect();
    let artifacts = generate_adapter_classes(
        &record,
        &DesugarAdapterResolver::default(),
        &ClassFileOptions::default(),
    )
    .unwrap();
    let class = ClassReader::parse(artifacts[0].content()).unwrap();
    class.methods[0].code.clone().expect("bridge has a Code attribute")
}

/// Single bound for both limits: the final argument-slot cursor.
fn cursor_bound(original: &MethodInvocationSite) -> u16 {
    original.consumed_stack_words()
}

#[test]
fn test_limits_for_common_shapes() {
    // (descriptor, kind, max_stack, max_locals)
    let cases = [
        ("()V", InvocationKind::Static, 0, 0),
        ("()J", InvocationKind::Static, 2, 0),
        ("(I)J", InvocationKind::Static, 2, 1),
        ("()Ljava/lang/Object;", InvocationKind::Virtual, 1, 1),
        ("(JI)V", InvocationKind::Static, 3, 3),
        ("(DLjava/time/Instant;)D", InvocationKind::Virtual, 4, 4),
        ("()Ljava/time/Instant;", InvocationKind::Static, 1, 0),
    ];
    for (descriptor, kind, max_stack, max_locals) in cases {
        let original = site(kind, "a/Target", "call", descriptor);
        let code = single_bridge_code(original.clone());
        assert_eq!(code.max_stack, max_stack, "max_stack for {}", original);
        assert_eq!(code.max_locals, max_locals, "max_locals for {}", original);

        // Locals equal the cursor; the stack also covers the return width.
        assert_eq!(code.max_locals, cursor_bound(&original));
        assert_eq!(
            code.max_stack,
            cursor_bound(&original).max(original.produced_stack_words())
        );
    }
}

#[test]
fn test_cursor_bound_is_too_small_for_wide_returns() {
    let original = site(InvocationKind::Static, "a/Target", "now", "()J");
    let code = single_bridge_code(original.clone());
    assert!(code.max_stack > cursor_bound(&original));
}

#[test]
fn test_highest_argument_slot() {
    let descriptor = format!("({})V", "I".repeat(255));
    let code = single_bridge_code(site(InvocationKind::Static, "a/Target", "many", &descriptor));
    assert_eq!(code.max_locals, 255);
    assert_eq!(code.max_stack, 255);
    assert_eq!(
        code.instructions[254],
        Instruction::Load {
            kind: ValueKind::Int,
            slot: 254
        }
    );
}

#[test]
fn test_receiver_overflowing_argument_slots() {
    // 255 argument slots plus the receiver the static bridge must take.
    let descriptor = format!("({})V", "I".repeat(255));
    let record: InvocationSiteRecord =
        std::iter::once(site(InvocationKind::Virtual, "a/Target", "many", &descriptor)).collect();
    let err = generate_adapter_classes(
        &record,
        &DesugarAdapterResolver::default(),
        &ClassFileOptions::default(),
    )
    .unwrap_err();
    assert!(matches!(
        err,
        AdapterGenError::ClassFile(ClassFileError::TooManyArgumentSlots(_))
    ));
}

fn record_json(descriptor: &str) -> String {
    format!(
        r#"[{{ "kind": "invokestatic", "owner": "a/Target", "name": "many", "descriptor": "{}" }}]"#,
        descriptor
    )
}

#[test]
fn test_record_rejects_oversized_argument_lists() {
    // 32768 longs would overflow a 16-bit slot count; 128 longs is one slot too many.
    for count in [128, 32768, 32769] {
        let json = record_json(&format!("({})V", "J".repeat(count)));
        let err = InvocationSiteRecord::from_json_str(&json).unwrap_err();
        assert!(
            matches!(
                err,
                RecordError::InvalidSite {
                    index: 0,
                    source: DescriptorError::TooManyArgumentSlots(_)
                }
            ),
            "{} longs: {}",
            count,
            err
        );
    }
}

#[test]
fn test_record_at_slot_limit_generates() {
    let json = record_json(&format!("({}I)J", "J".repeat(127)));
    let record = InvocationSiteRecord::from_json_str(&json).unwrap();
    let artifacts = generate_adapter_classes(
        &record,
        &DesugarAdapterResolver::default(),
        &ClassFileOptions::default(),
    )
    .unwrap();
    let class = ClassReader::parse(artifacts[0].content()).unwrap();
    let code = class.methods[0].code.as_ref().unwrap();
    assert_eq!(code.max_locals, 255);
    assert_eq!(code.max_stack, 255);
}

/// Resolves to a different owner once grouping is over.
struct ShiftingOwnerResolver {
    inner: DesugarAdapterResolver,
    calls: Cell<usize>,
    grouping_calls: usize,
}

impl AdapterResolver for ShiftingOwnerResolver {
    fn adapter_site(&self, original: &MethodInvocationSite) -> Result<MethodInvocationSite, ResolveError> {
        let call = self.calls.get();
        self.calls.set(call + 1);
        let adapter = self.inner.adapter_site(original)?;
        if call < self.grouping_calls {
            return Ok(adapter);
        }
        let method = MethodKey::new(
            ClassName::new("i__typeadapter/Elsewhere").unwrap(),
            adapter.name(),
            adapter.descriptor().clone(),
        )?;
        Ok(MethodInvocationSite::new(InvocationKind::Static, method, false))
    }

    fn classify(&self, ty: &FieldType) -> TypeClass {
        self.inner.classify(ty)
    }

    fn mirrored_to_shadowed_type(&self, mirrored: &ClassName) -> Result<ClassName, ResolveError> {
        self.inner.mirrored_to_shadowed_type(mirrored)
    }

    fn mirrored_to_shadowed(&self, mirrored: &ClassName) -> Result<MethodInvocationSite, ResolveError> {
        self.inner.mirrored_to_shadowed(mirrored)
    }

    fn shadowed_to_mirrored(&self, shadowed: &ClassName) -> Result<MethodInvocationSite, ResolveError> {
        self.inner.shadowed_to_mirrored(shadowed)
    }
}

#[test]
fn test_owner_missing_from_grouping_is_a_contract_violation() {
    let record: InvocationSiteRecord = vec![
        site(InvocationKind::Virtual, "a/A", "m", "()V"),
        site(InvocationKind::Virtual, "b/B", "n", "()V"),
    ]
    .into_iter()
    .collect();
    let resolver = ShiftingOwnerResolver {
        inner: DesugarAdapterResolver::default(),
        calls: Cell::new(0),
        grouping_calls: record.len(),
    };
    let err = generate_adapter_classes(&record, &resolver, &ClassFileOptions::default()).unwrap_err();
    match &err {
        AdapterGenError::MissingAdapterOwner { owner, available } => {
            assert_eq!(owner.binary_name(), "i__typeadapter/Elsewhere");
            assert_eq!(available.len(), 2);
        }
        other => panic!("unexpected error: {}", other),
    }
    assert!(err.is_contract_violation());
}

/// Forgets to turn the receiver into an argument.
struct NoReceiverResolver(DesugarAdapterResolver);

impl AdapterResolver for NoReceiverResolver {
    fn adapter_site(&self, original: &MethodInvocationSite) -> Result<MethodInvocationSite, ResolveError> {
        let owner = self.0.adapter_owner(original.owner());
        let method = MethodKey::new(owner, original.name(), original.descriptor().clone())?;
        Ok(MethodInvocationSite::new(InvocationKind::Static, method, false))
    }

    fn classify(&self, ty: &FieldType) -> TypeClass {
        self.0.classify(ty)
    }

    fn mirrored_to_shadowed_type(&self, mirrored: &ClassName) -> Result<ClassName, ResolveError> {
        self.0.mirrored_to_shadowed_type(mirrored)
    }

    fn mirrored_to_shadowed(&self, mirrored: &ClassName) -> Result<MethodInvocationSite, ResolveError> {
        self.0.mirrored_to_shadowed(mirrored)
    }

    fn shadowed_to_mirrored(&self, shadowed: &ClassName) -> Result<MethodInvocationSite, ResolveError> {
        self.0.shadowed_to_mirrored(shadowed)
    }
}

#[test]
fn test_stack_shape_mismatch_is_a_contract_violation() {
    let record: InvocationSiteRecord =
        std::iter::once(site(InvocationKind::Virtual, "a/A", "m", "(I)V")).collect();
    let err = generate_adapter_classes(
        &record,
        &NoReceiverResolver(DesugarAdapterResolver::default()),
        &ClassFileOptions::default(),
    )
    .unwrap_err();
    assert!(matches!(err, AdapterGenError::DescriptorMismatch { .. }));
    assert!(err.is_contract_violation());
}

/// Knows mirrored types but has no converters for them.
struct NoConverterResolver(DesugarAdapterResolver);

impl AdapterResolver for NoConverterResolver {
    fn adapter_site(&self, original: &MethodInvocationSite) -> Result<MethodInvocationSite, ResolveError> {
        self.0.adapter_site(original)
    }

    fn classify(&self, ty: &FieldType) -> TypeClass {
        self.0.classify(ty)
    }

    fn mirrored_to_shadowed_type(&self, mirrored: &ClassName) -> Result<ClassName, ResolveError> {
        self.0.mirrored_to_shadowed_type(mirrored)
    }

    fn mirrored_to_shadowed(&self, mirrored: &ClassName) -> Result<MethodInvocationSite, ResolveError> {
        Err(ResolveError::NotMirrored(mirrored.clone()))
    }

    fn shadowed_to_mirrored(&self, shadowed: &ClassName) -> Result<MethodInvocationSite, ResolveError> {
        Err(ResolveError::NotShadowed(shadowed.clone()))
    }
}

#[test]
fn test_converter_failure_propagates() {
    let record: InvocationSiteRecord = vec![
        site(InvocationKind::Static, "a/A", "ok", "()V"),
        site(InvocationKind::Static, "a/A", "m", "(Ljava/time/Instant;)V"),
    ]
    .into_iter()
    .collect();
    let err = generate_adapter_classes(
        &record,
        &NoConverterResolver(DesugarAdapterResolver::default()),
        &ClassFileOptions::default(),
    )
    .unwrap_err();
    assert_eq!(
        err,
        AdapterGenError::Resolve(ResolveError::NotMirrored(ClassName::new("j$/time/Instant").unwrap()))
    );
    assert!(!err.is_contract_violation());
}
