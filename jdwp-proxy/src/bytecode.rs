// JVM instruction-stream decoder
//
// Walks one method's instruction stream and reports every load, store, or
// increment of a local-variable slot, together with the one-character type
// signature implied by the opcode family. Everything else is skipped using
// a static operand-shape classification.
//
// This is the hottest path in the crate: no per-instruction allocation,
// no validation. The stream's total length is already known and trusted,
// so malformed input inside those bounds simply ends the walk (the
// decoder's job is to extract information, not to verify the stream).

/// Operand-encoding shape of an opcode. Decides how many bytes follow the
/// opcode; the two switch forms read their own length from the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Shape {
    NoOperand,
    ByteImm,            // bipush, newarray
    ShortImm,           // sipush
    CpByte,             // ldc
    CpShort,            // ldc_w, ldc2_w
    TypeRef,            // new, anewarray, checkcast, instanceof
    FieldMethodRef,     // get/putstatic, get/putfield, invokevirtual/special/static
    InterfaceMethodRef, // invokeinterface: 2-byte ref + count + zero byte
    InvokeDynamic,      // 2-byte ref + two zero bytes
    BranchShort,
    BranchLong,         // goto_w, jsr_w
    SlotByte,           // iload..aload, istore..astore with explicit slot byte
    SlotImplicit,       // the hard-coded _0.._3 variants
    RetSlot,            // ret: slot operand, returnAddress type (not reported)
    Iinc,               // slot byte + signed const byte
    TableSwitch,
    LookupSwitch,
    Wide,               // widens the following instruction's operands
    MultiANewArray,     // 2-byte type ref + dimensions byte
    Unrecognized,       // reserved/breakpoint opcodes: length unknowable
}

/// Static shape table keyed by opcode.
fn shape(op: u8) -> Shape {
    match op {
        0x00..=0x0f => Shape::NoOperand, // nop, consts
        0x10 => Shape::ByteImm,          // bipush
        0x11 => Shape::ShortImm,         // sipush
        0x12 => Shape::CpByte,           // ldc
        0x13 | 0x14 => Shape::CpShort,   // ldc_w, ldc2_w
        0x15..=0x19 => Shape::SlotByte,  // iload..aload
        0x1a..=0x2d => Shape::SlotImplicit, // iload_0..aload_3
        0x2e..=0x35 => Shape::NoOperand, // array loads
        0x36..=0x3a => Shape::SlotByte,  // istore..astore
        0x3b..=0x4e => Shape::SlotImplicit, // istore_0..astore_3
        0x4f..=0x56 => Shape::NoOperand, // array stores
        0x57..=0x5f => Shape::NoOperand, // stack ops
        0x60..=0x83 => Shape::NoOperand, // arithmetic, shifts, logic
        0x84 => Shape::Iinc,
        0x85..=0x98 => Shape::NoOperand, // conversions, comparisons
        0x99..=0xa8 => Shape::BranchShort, // ifeq..jsr
        0xa9 => Shape::RetSlot,
        0xaa => Shape::TableSwitch,
        0xab => Shape::LookupSwitch,
        0xac..=0xb1 => Shape::NoOperand, // returns
        0xb2..=0xb8 => Shape::FieldMethodRef,
        0xb9 => Shape::InterfaceMethodRef,
        0xba => Shape::InvokeDynamic,
        0xbb => Shape::TypeRef,     // new
        0xbc => Shape::ByteImm,     // newarray
        0xbd => Shape::TypeRef,     // anewarray
        0xbe | 0xbf => Shape::NoOperand, // arraylength, athrow
        0xc0 | 0xc1 => Shape::TypeRef, // checkcast, instanceof
        0xc2 | 0xc3 => Shape::NoOperand, // monitorenter/exit
        0xc4 => Shape::Wide,
        0xc5 => Shape::MultiANewArray,
        0xc6 | 0xc7 => Shape::BranchShort, // ifnull, ifnonnull
        0xc8 | 0xc9 => Shape::BranchLong,  // goto_w, jsr_w
        _ => Shape::Unrecognized,
    }
}

/// Fixed operand byte count for shapes that have one.
fn fixed_operand_len(shape: Shape) -> Option<usize> {
    match shape {
        Shape::NoOperand | Shape::SlotImplicit => Some(0),
        Shape::ByteImm | Shape::CpByte | Shape::SlotByte | Shape::RetSlot => Some(1),
        Shape::ShortImm
        | Shape::CpShort
        | Shape::TypeRef
        | Shape::FieldMethodRef
        | Shape::BranchShort
        | Shape::Iinc => Some(2),
        Shape::MultiANewArray => Some(3),
        Shape::InterfaceMethodRef | Shape::InvokeDynamic | Shape::BranchLong => Some(4),
        Shape::TableSwitch | Shape::LookupSwitch | Shape::Wide | Shape::Unrecognized => None,
    }
}

fn read_i32_at(code: &[u8], at: usize) -> Option<i32> {
    let bytes = code.get(at..at + 4)?;
    Some(i32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

/// Total length in bytes of the instruction starting at `at`, including
/// the opcode itself. `None` when the length cannot be determined (stream
/// truncated mid-instruction, reserved opcode, nonsense switch bounds).
pub fn instruction_length(code: &[u8], at: usize) -> Option<usize> {
    let op = *code.get(at)?;
    match shape(op) {
        Shape::Wide => {
            // wide prefixes one load/store/ret (2-byte slot) or iinc
            // (2-byte slot + 2-byte const)
            let widened = *code.get(at + 1)?;
            let len = match shape(widened) {
                Shape::Iinc => 6,
                Shape::SlotByte | Shape::RetSlot => 4,
                _ => return None,
            };
            (at + len <= code.len()).then_some(len)
        }
        Shape::TableSwitch => {
            // 0-3 alignment pad so the default operand is 4-byte aligned
            // relative to the start of the code array
            let pad = (4 - ((at + 1) % 4)) % 4;
            let base = at + 1 + pad;
            let low = read_i32_at(code, base + 4)?;
            let high = read_i32_at(code, base + 8)?;
            if high < low {
                return None;
            }
            let entries = (high as i64 - low as i64 + 1) as usize;
            let len = 1 + pad + 12 + entries * 4;
            (at + len <= code.len()).then_some(len)
        }
        Shape::LookupSwitch => {
            let pad = (4 - ((at + 1) % 4)) % 4;
            let base = at + 1 + pad;
            let npairs = read_i32_at(code, base + 4)?;
            if npairs < 0 {
                return None;
            }
            let len = 1 + pad + 8 + npairs as usize * 8;
            (at + len <= code.len()).then_some(len)
        }
        Shape::Unrecognized => None,
        other => {
            let len = 1 + fixed_operand_len(other)?;
            (at + len <= code.len()).then_some(len)
        }
    }
}

/// What an instruction does to a local-variable slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessKind {
    Load,
    Store,
    Increment,
}

/// One observed touch of a local-variable slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotAccess {
    pub kind: AccessKind,
    pub slot: u16,
    /// One of I/J/F/D/L, derived strictly from the opcode family.
    pub type_sig: u8,
}

// Family order shared by the explicit and implicit load/store blocks:
// int, long, float, double, reference.
const FAMILY_SIGS: [u8; 5] = [b'I', b'J', b'F', b'D', b'L'];

/// Classify a slot-touching opcode; `None` for everything else.
/// The `_0.._3` aliases map back to the canonical family and slot number.
/// `slot_byte_count` is 1 normally and 2 under a wide prefix.
fn slot_access(code: &[u8], at: usize, op: u8, wide: bool) -> Option<SlotAccess> {
    let read_slot = |operand_at: usize| -> Option<u16> {
        if wide {
            let bytes = code.get(operand_at..operand_at + 2)?;
            Some(u16::from_be_bytes([bytes[0], bytes[1]]))
        } else {
            code.get(operand_at).map(|b| u16::from(*b))
        }
    };

    match op {
        0x15..=0x19 => Some(SlotAccess {
            kind: AccessKind::Load,
            slot: read_slot(at + 1)?,
            type_sig: FAMILY_SIGS[(op - 0x15) as usize],
        }),
        0x36..=0x3a => Some(SlotAccess {
            kind: AccessKind::Store,
            slot: read_slot(at + 1)?,
            type_sig: FAMILY_SIGS[(op - 0x36) as usize],
        }),
        0x1a..=0x2d => {
            let idx = (op - 0x1a) as usize;
            Some(SlotAccess {
                kind: AccessKind::Load,
                slot: (idx % 4) as u16,
                type_sig: FAMILY_SIGS[idx / 4],
            })
        }
        0x3b..=0x4e => {
            let idx = (op - 0x3b) as usize;
            Some(SlotAccess {
                kind: AccessKind::Store,
                slot: (idx % 4) as u16,
                type_sig: FAMILY_SIGS[idx / 4],
            })
        }
        0x84 => Some(SlotAccess {
            kind: AccessKind::Increment,
            slot: read_slot(at + 1)?,
            type_sig: b'I',
        }),
        // ret touches a returnAddress slot; not part of the recoverable
        // type set, so it is skipped (its length is still honored)
        _ => None,
    }
}

/// Walk the instruction stream and report every slot access at or before
/// `stop` (a code offset, usually the frame's current instruction index).
///
/// Never fails: an instruction that cannot be classified ends the walk,
/// which for recovery purposes just means "no further slots observed".
pub fn scan_slot_access(code: &[u8], stop: usize, mut visit: impl FnMut(SlotAccess)) {
    let mut at = 0usize;

    while at < code.len() && at <= stop {
        let op = code[at];

        if shape(op) == Shape::Wide {
            let Some(len) = instruction_length(code, at) else {
                return;
            };
            if let Some(widened) = code.get(at + 1) {
                if let Some(access) = slot_access(code, at + 1, *widened, true) {
                    visit(access);
                }
            }
            at += len;
            continue;
        }

        let Some(len) = instruction_length(code, at) else {
            return;
        };
        if let Some(access) = slot_access(code, at, op, false) {
            visit(access);
        }
        at += len;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(code: &[u8], stop: usize) -> Vec<SlotAccess> {
        let mut out = Vec::new();
        scan_slot_access(code, stop, |access| out.push(access));
        out
    }

    fn walk_lengths(code: &[u8]) -> Vec<usize> {
        let mut lengths = Vec::new();
        let mut at = 0;
        while at < code.len() {
            let len = instruction_length(code, at).expect("well-formed stream");
            lengths.push(len);
            at += len;
        }
        lengths
    }

    #[test]
    fn test_explicit_slot_store() {
        // [nop, istore 2, nop]
        let code = [0x00, 0x36, 0x02, 0x00];
        let touches = collect(&code, code.len() - 1);

        assert_eq!(
            touches,
            vec![SlotAccess {
                kind: AccessKind::Store,
                slot: 2,
                type_sig: b'I',
            }]
        );
    }

    #[test]
    fn test_implicit_slot_aliases_map_to_canonical() {
        // aload_1, lload_3, dstore_0, fstore_2
        let code = [0x2b, 0x21, 0x47, 0x45];
        let touches = collect(&code, 3);

        assert_eq!(touches.len(), 4);
        assert_eq!((touches[0].kind, touches[0].slot, touches[0].type_sig), (AccessKind::Load, 1, b'L'));
        assert_eq!((touches[1].kind, touches[1].slot, touches[1].type_sig), (AccessKind::Load, 3, b'J'));
        assert_eq!((touches[2].kind, touches[2].slot, touches[2].type_sig), (AccessKind::Store, 0, b'D'));
        assert_eq!((touches[3].kind, touches[3].slot, touches[3].type_sig), (AccessKind::Store, 2, b'F'));
    }

    #[test]
    fn test_iinc_reports_increment() {
        let code = [0x84, 0x05, 0xff]; // iinc slot 5 by -1
        let touches = collect(&code, 2);
        assert_eq!(
            touches,
            vec![SlotAccess {
                kind: AccessKind::Increment,
                slot: 5,
                type_sig: b'I',
            }]
        );
    }

    #[test]
    fn test_wide_prefix_widens_slot_operand() {
        // wide istore 0x0102; wide iinc 0x0203 by 1
        let code = [0xc4, 0x36, 0x01, 0x02, 0xc4, 0x84, 0x02, 0x03, 0x00, 0x01];
        let touches = collect(&code, code.len() - 1);

        assert_eq!(touches.len(), 2);
        assert_eq!((touches[0].kind, touches[0].slot), (AccessKind::Store, 0x0102));
        assert_eq!((touches[1].kind, touches[1].slot), (AccessKind::Increment, 0x0203));
    }

    #[test]
    fn test_ret_slot_consumed_but_not_reported() {
        let code = [0xa9, 0x04, 0x3b]; // ret 4, istore_0
        let touches = collect(&code, 2);
        assert_eq!(touches.len(), 1);
        assert_eq!(touches[0].kind, AccessKind::Store);
        assert_eq!(touches[0].slot, 0);
    }

    #[test]
    fn test_stop_offset_bounds_the_walk() {
        // istore_0 at 0, istore_1 at 1, istore_2 at 2
        let code = [0x3b, 0x3c, 0x3d];
        assert_eq!(collect(&code, 0).len(), 1);
        assert_eq!(collect(&code, 1).len(), 2);
        assert_eq!(collect(&code, 2).len(), 3);
    }

    #[test]
    fn test_prefix_scan_matches_prefix_of_full_scan() {
        let code = [
            0x10, 0x07, // bipush 7
            0x3b, // istore_0
            0x12, 0x01, // ldc #1
            0x36, 0x04, // istore 4
            0xb6, 0x00, 0x05, // invokevirtual #5
            0x19, 0x06, // aload 6
            0xb1, // return
        ];
        let full = collect(&code, code.len() - 1);

        let mut at = 0;
        while at < code.len() {
            let prefix = collect(&code, at);
            assert_eq!(prefix[..], full[..prefix.len()]);
            at += instruction_length(&code, at).unwrap();
        }
        assert_eq!(full.len(), 3);
    }

    #[test]
    fn test_lengths_sum_exactly_to_stream_end() {
        let code = [
            0x00, // nop
            0x10, 0x2a, // bipush 42
            0x11, 0x01, 0x00, // sipush 256
            0x13, 0x00, 0x09, // ldc_w
            0xb9, 0x00, 0x02, 0x01, 0x00, // invokeinterface
            0xba, 0x00, 0x03, 0x00, 0x00, // invokedynamic
            0xc5, 0x00, 0x04, 0x02, // multianewarray dims=2
            0xc8, 0x00, 0x00, 0x00, 0x08, // goto_w
            0xb1, // return
        ];
        let lengths = walk_lengths(&code);
        assert_eq!(lengths, vec![1, 2, 3, 3, 5, 5, 4, 5, 1]);
        assert_eq!(lengths.iter().sum::<usize>(), code.len());
    }

    #[test]
    fn test_tableswitch_padding_at_every_alignment() {
        // A tableswitch with low=0, high=1 (two entries), preceded by
        // 0..3 nops to hit each alignment of the pad calculation.
        for nops in 0..4usize {
            let mut code = vec![0x00; nops];
            let at = code.len();
            code.push(0xaa);
            let pad = (4 - ((at + 1) % 4)) % 4;
            code.extend(std::iter::repeat(0u8).take(pad));
            code.extend_from_slice(&0i32.to_be_bytes()); // default
            code.extend_from_slice(&0i32.to_be_bytes()); // low
            code.extend_from_slice(&1i32.to_be_bytes()); // high
            code.extend_from_slice(&8i32.to_be_bytes()); // entry 0
            code.extend_from_slice(&12i32.to_be_bytes()); // entry 1
            code.push(0x3c); // istore_1 after the switch

            let expected = 1 + pad + 12 + 2 * 4;
            assert_eq!(instruction_length(&code, at), Some(expected), "nops={nops}");

            let touches = collect(&code, code.len() - 1);
            assert_eq!(touches.len(), 1, "nops={nops}");
            assert_eq!(touches[0].slot, 1);
        }
    }

    #[test]
    fn test_lookupswitch_length() {
        // lookupswitch at offset 0: pad=3, default, npairs=1, one pair
        let mut code = vec![0xab, 0x00, 0x00, 0x00];
        code.extend_from_slice(&0i32.to_be_bytes()); // default
        code.extend_from_slice(&1i32.to_be_bytes()); // npairs
        code.extend_from_slice(&7i32.to_be_bytes()); // match
        code.extend_from_slice(&16i32.to_be_bytes()); // offset
        assert_eq!(instruction_length(&code, 0), Some(code.len()));
    }

    #[test]
    fn test_malformed_input_ends_walk_silently() {
        // istore_0 then a truncated explicit store: one touch, no panic
        let truncated = [0x3b, 0x36];
        assert_eq!(collect(&truncated, 1).len(), 1);

        // reserved opcode: length unknowable, walk stops
        let reserved = [0x3b, 0xca, 0x3c];
        assert_eq!(collect(&reserved, 2).len(), 1);

        // tableswitch with high < low
        let mut bad_switch = vec![0xaa];
        bad_switch.extend_from_slice(&[0, 0, 0]); // pad for offset 0
        bad_switch.extend_from_slice(&0i32.to_be_bytes());
        bad_switch.extend_from_slice(&5i32.to_be_bytes()); // low
        bad_switch.extend_from_slice(&1i32.to_be_bytes()); // high < low
        assert_eq!(instruction_length(&bad_switch, 0), None);
        assert!(collect(&bad_switch, bad_switch.len() - 1).is_empty());
    }
}
