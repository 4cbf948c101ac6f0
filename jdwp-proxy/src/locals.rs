// Local-variable recovery
//
// Combines the instruction decoder's slot observations with the declared
// parameter layout (from the method's JNI signature) and an optional
// symbolic name table to produce an ordered list of variable descriptors
// for a code-offset range.

use crate::bytecode::{scan_slot_access, SlotAccess};
use jdwp_transport::method::VariableTable;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// A recovered local variable.
///
/// Immutable once built. `sig` is the one-character JDWP type signature,
/// absent when nothing in the stream or the tables pinned the type down.
/// `names` holds zero or more symbolic candidates; more than one means
/// static analysis found ambiguous matches (shadowing across scopes).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalVariableDescriptor {
    pub slot: u32,
    pub is_param: bool,
    pub sig: Option<u8>,
    pub names: BTreeSet<String>,
}

impl LocalVariableDescriptor {
    pub fn new(slot: u32, is_param: bool, sig: Option<u8>) -> Self {
        Self {
            slot,
            is_param,
            sig,
            names: BTreeSet::new(),
        }
    }
}

/// Candidate symbolic names per slot, from an external best-effort source.
/// Fully empty is a valid state (no source available).
#[derive(Debug, Clone, Default)]
pub struct SlotNameTable {
    candidates: HashMap<u32, BTreeSet<String>>,
    sigs: HashMap<u32, u8>,
}

impl SlotNameTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, slot: u32, name: impl Into<String>) {
        self.candidates.entry(slot).or_default().insert(name.into());
    }

    pub fn candidates(&self, slot: u32) -> Option<&BTreeSet<String>> {
        self.candidates.get(&slot)
    }

    /// Slots the table knows anything about.
    pub fn slots(&self) -> impl Iterator<Item = u32> + '_ {
        self.candidates.keys().copied()
    }

    /// Declared type of a slot, when the source table carried one.
    pub fn signature_hint(&self, slot: u32) -> Option<u8> {
        self.sigs.get(&slot).copied()
    }

    /// Build a table from a JDWP variable table, keeping only entries
    /// visible at the given code offset.
    pub fn from_variable_table(table: &VariableTable, code_index: u64) -> Self {
        let mut names = Self::new();
        for var in &table.variables {
            if var.is_visible_at(code_index) {
                names.add(var.slot, var.name.clone());
                if let Some(&sig) = var.signature.as_bytes().first() {
                    names.sigs.entry(var.slot).or_insert(sig);
                }
            }
        }
        names
    }
}

/// Iterator over the parameter type signatures of a JNI method signature,
/// e.g. `(I[JLjava/lang/String;)V` yields "I", "[J", "Ljava/lang/String;".
fn parameter_signatures(signature: &str) -> Vec<&str> {
    let mut params = Vec::new();
    let Some(inner) = signature
        .strip_prefix('(')
        .and_then(|rest| rest.split_once(')'))
        .map(|(params, _ret)| params)
    else {
        return params;
    };

    let bytes = inner.as_bytes();
    let mut at = 0;
    while at < bytes.len() {
        let start = at;
        while bytes.get(at) == Some(&b'[') {
            at += 1;
        }
        match bytes.get(at) {
            Some(b'L') => {
                while at < bytes.len() && bytes[at] != b';' {
                    at += 1;
                }
                at += 1; // consume ';'
            }
            Some(_) => at += 1,
            None => break,
        }
        if at > bytes.len() {
            break;
        }
        params.push(&inner[start..at.min(inner.len())]);
    }
    params
}

/// Slot width of one parameter: long and double consume two consecutive
/// slots, everything else one.
fn slot_width(param_sig: &str) -> u32 {
    match param_sig.as_bytes().first() {
        Some(b'J') | Some(b'D') => 2,
        _ => 1,
    }
}

/// First slot index available to user-declared locals: immediately after
/// the implicit receiver slot (instance methods only) and the declared
/// parameter slots.
pub fn first_local_slot(signature: &str, is_static: bool) -> u32 {
    let mut slot = u32::from(!is_static);
    for param in parameter_signatures(signature) {
        slot += slot_width(param);
    }
    slot
}

/// Descriptors for the declared parameters, slots assigned left to right.
pub fn parameter_descriptors(signature: &str, is_static: bool) -> Vec<LocalVariableDescriptor> {
    let mut descriptors = Vec::new();
    let mut slot = u32::from(!is_static);
    for param in parameter_signatures(signature) {
        let sig = param.as_bytes().first().copied();
        descriptors.push(LocalVariableDescriptor::new(slot, true, sig));
        slot += slot_width(param);
    }
    descriptors
}

/// Recover the full descriptor list for a method at a given code offset:
/// declared parameters plus every local slot the instruction stream
/// touches in `[0, stop]`.
///
/// Per slot the first-seen type wins; a later observation with a
/// different type code appends a second descriptor for the same slot
/// (slot reuse across lexical scopes), so the result is an ordered list,
/// not a map. An empty instruction stream yields just the parameters:
/// "no extra locals" is valid output, never an error.
pub fn recover_descriptors(
    code: &[u8],
    stop: u64,
    signature: &str,
    is_static: bool,
    names: &SlotNameTable,
) -> Vec<LocalVariableDescriptor> {
    let mut descriptors = parameter_descriptors(signature, is_static);
    let first_local = first_local_slot(signature, is_static);

    let stop = usize::try_from(stop).unwrap_or(usize::MAX);
    scan_slot_access(code, stop, |access: SlotAccess| {
        let slot = u32::from(access.slot);
        if slot < first_local {
            return; // parameter slots are already covered
        }
        let seen_with_same_type = descriptors
            .iter()
            .any(|d| d.slot == slot && d.sig == Some(access.type_sig));
        if !seen_with_same_type {
            descriptors.push(LocalVariableDescriptor::new(
                slot,
                false,
                Some(access.type_sig),
            ));
        }
    });

    for descriptor in &mut descriptors {
        if let Some(candidates) = names.candidates(descriptor.slot) {
            descriptor.names = candidates.clone();
        }
    }

    // Deterministic output: by slot, decode order within a slot (stable)
    descriptors.sort_by_key(|d| d.slot);
    descriptors
}
