//! Bridge method emission
//!
//! For one original call site this writes a straight-line static method:
//!
//! ```text
//! load arg0            ; converted right away if mirrored
//! [invokestatic Converter.to]
//! load arg1
//! ...
//! invoke<kind> original target
//! [invokestatic Converter.from]   ; if the return type is mirrored
//! <x>return
//! ```

use super::class_builder::{AdapterClassBuilder, BridgeMethodSpec};
use super::resolver::{AdapterResolver, TypeClass};
use super::AdapterGenError;
use crate::classfile::{opcodes, MethodWriter};
use crate::langmodel::{MethodInvocationSite, ReturnType};
use log::debug;

/// Running operand-stack depth and local-slot cursor for one method body.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StackTracker {
    depth: u16,
    max_depth: u16,
    next_slot: u16,
}

impl StackTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the next argument of the given width: reserve its slots and push it.
    pub fn load_argument(&mut self, width: u16) -> u16 {
        let slot = self.next_slot;
        self.next_slot = self.next_slot.saturating_add(width);
        self.push(width);
        slot
    }

    pub fn push(&mut self, words: u16) {
        self.depth = self.depth.saturating_add(words);
        self.max_depth = self.max_depth.max(self.depth);
    }

    pub fn pop(&mut self, words: u16) {
        debug_assert!(self.depth >= words, "operand stack underflow");
        self.depth = self.depth.saturating_sub(words);
    }

    /// A call popping `consumed` words and pushing `produced`.
    pub fn invoke(&mut self, consumed: u16, produced: u16) {
        self.pop(consumed);
        self.push(produced);
    }

    pub fn depth(&self) -> u16 {
        self.depth
    }

    pub fn max_stack(&self) -> u16 {
        self.max_depth
    }

    /// Slots spanned by the arguments loaded so far.
    pub fn max_locals(&self) -> u16 {
        self.next_slot
    }
}

/// Per-method emission outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmittedBridge {
    pub conversions: usize,
    pub max_stack: u16,
    pub max_locals: u16,
}

/// Emit the bridge for `original` (resolved to `adapter`) into `builder`.
///
/// Every converter call is resolved before the method is opened, so a
/// resolver failure leaves no half-written body behind.
pub fn emit_bridge_method<R: AdapterResolver + ?Sized>(
    builder: &mut AdapterClassBuilder,
    resolver: &R,
    original: &MethodInvocationSite,
    adapter: &MethodInvocationSite,
) -> Result<EmittedBridge, AdapterGenError> {
    let spec = BridgeMethodSpec::from_adapter_site(adapter, |ty| resolver.classify(ty));
    check_shapes(original, &spec)?;

    let argument_conversions = spec
        .arguments
        .iter()
        .map(|class| match class {
            TypeClass::Mirrored(mirrored) => resolver.mirrored_to_shadowed(mirrored).map(Some),
            _ => Ok(None),
        })
        .collect::<Result<Vec<_>, _>>()?;

    let return_conversion = match &spec.return_class {
        Some(TypeClass::Mirrored(mirrored)) => {
            let shadowed = resolver.mirrored_to_shadowed_type(mirrored)?;
            Some(resolver.shadowed_to_mirrored(&shadowed)?)
        }
        _ => None,
    };

    let mut method = builder.begin_method(&spec)?;
    let mut stack = StackTracker::new();

    for (argument, conversion) in spec.descriptor.arguments().iter().zip(&argument_conversions) {
        let kind = argument.value_kind();
        let slot = stack.load_argument(kind.width());
        method.var_insn(kind.load_opcode(), slot)?;
        if let Some(conversion) = conversion {
            emit_invoke(&mut method, &mut stack, conversion)?;
        }
    }

    emit_invoke(&mut method, &mut stack, original)?;

    if let Some(conversion) = &return_conversion {
        emit_invoke(&mut method, &mut stack, conversion)?;
    }

    match spec.descriptor.return_type() {
        ReturnType::Void => method.insn(opcodes::RETURN),
        ReturnType::Value(ty) => {
            let kind = ty.value_kind();
            stack.pop(kind.width());
            method.insn(kind.return_opcode());
        }
    }

    let (max_stack, max_locals) = (stack.max_stack(), stack.max_locals());
    method.finish(max_stack, max_locals)?;

    let conversions = spec.conversion_count();
    debug!(
        "bridged {} as {}.{}{} ({} conversion(s), stack {}, locals {})",
        original,
        adapter.owner(),
        spec.name,
        spec.descriptor,
        conversions,
        max_stack,
        max_locals
    );
    Ok(EmittedBridge {
        conversions,
        max_stack,
        max_locals,
    })
}

fn emit_invoke(
    method: &mut MethodWriter<'_>,
    stack: &mut StackTracker,
    site: &MethodInvocationSite,
) -> Result<(), AdapterGenError> {
    method.method_insn(
        site.kind().opcode(),
        site.owner(),
        site.name(),
        site.descriptor(),
        site.is_interface(),
    )?;
    stack.invoke(site.consumed_stack_words(), site.produced_stack_words());
    Ok(())
}

/// The adapter's arguments must fill exactly the stack the original call
/// consumes, and its return must match what the original leaves behind.
fn check_shapes(original: &MethodInvocationSite, spec: &BridgeMethodSpec) -> Result<(), AdapterGenError> {
    let loaded = spec.descriptor.argument_slots();
    let consumed = original.consumed_stack_words();
    let returned = spec.descriptor.return_type().stack_width();
    let produced = original.produced_stack_words();
    if loaded != consumed || returned != produced {
        return Err(AdapterGenError::DescriptorMismatch {
            original: original.to_string(),
            adapter: format!("{}{}", spec.name, spec.descriptor),
        });
    }
    Ok(())
}
