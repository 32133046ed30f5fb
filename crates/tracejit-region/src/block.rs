use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use tracejit_bytecode::{
    instr_allows_fallthrough, instr_is_non_call_control_flow, DecodeError, Func, Instr, Offset,
    SrcPos, Type, Unit,
};

use crate::location::{Location, ParamByRef, ReffinessPred, TypePred};

/// Whether [`Block::check_invariants`] does anything. Release builds skip the checker entirely.
pub const CHECK_INVARIANTS: bool = cfg!(debug_assertions);

/// A single-entry, single-exit run of instructions, plus the guards attached to them.
///
/// Invariants (checked after every mutation when [`CHECK_INVARIANTS`] is set):
/// 1. Only the last instruction may be a non-fallthrough instruction or control flow (calls
///    don't count as control flow).
/// 2. Every position carrying a type prediction, by-ref flag or reffiness prediction is one of
///    the block's instructions.
/// 3. Every local referenced by a type prediction exists in the function. Stack offsets are not
///    checked.
#[derive(Clone, Debug)]
pub struct Block {
    func: Arc<Func>,
    start: SrcPos,
    length: u32,
    type_preds: BTreeMap<SrcPos, Vec<TypePred>>,
    by_refs: BTreeMap<SrcPos, ParamByRef>,
    ref_preds: BTreeMap<SrcPos, Vec<ReffinessPred>>,
}

impl Block {
    pub fn new(func: Arc<Func>, start: Offset, length: u32) -> Self {
        let start = func.src_pos(start);
        let block = Self {
            func,
            start,
            length,
            type_preds: BTreeMap::new(),
            by_refs: BTreeMap::new(),
            ref_preds: BTreeMap::new(),
        };
        block.check_invariants();
        block
    }

    pub fn func(&self) -> &Arc<Func> {
        &self.func
    }

    pub fn unit(&self) -> &Unit {
        self.func.unit()
    }

    pub fn start(&self) -> SrcPos {
        self.start
    }

    pub fn length(&self) -> u32 {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    pub fn add_instruction(&mut self) {
        self.length += 1;
        self.check_invariants();
    }

    pub fn add_predicted(&mut self, pos: SrcPos, pred: TypePred) {
        debug_assert!(
            pred.ty.subtype_of(Type::GEN | Type::CLS),
            "type prediction {pred} is outside the Gen|Cls domain"
        );
        self.type_preds.entry(pos).or_default().push(pred);
        self.check_invariants();
    }

    pub fn set_param_by_ref(&mut self, pos: SrcPos, by_ref: ParamByRef) {
        debug_assert!(
            !self.by_refs.contains_key(&pos),
            "parameter reference flag already set at {pos}"
        );
        self.by_refs.entry(pos).or_insert(by_ref);
        self.check_invariants();
    }

    pub fn add_reffiness_pred(&mut self, pos: SrcPos, pred: ReffinessPred) {
        self.ref_preds.entry(pos).or_default().push(pred);
        self.check_invariants();
    }

    /// Type predictions ordered by position; predictions sharing a position keep insertion
    /// order.
    pub fn type_preds(&self) -> impl Iterator<Item = (SrcPos, &TypePred)> + '_ {
        self.type_preds
            .iter()
            .flat_map(|(pos, preds)| preds.iter().map(move |pred| (*pos, pred)))
    }

    pub fn type_preds_at(&self, pos: SrcPos) -> &[TypePred] {
        self.type_preds.get(&pos).map_or(&[], Vec::as_slice)
    }

    pub fn param_by_refs(&self) -> &BTreeMap<SrcPos, ParamByRef> {
        &self.by_refs
    }

    pub fn param_by_ref_at(&self, pos: SrcPos) -> Option<ParamByRef> {
        self.by_refs.get(&pos).copied()
    }

    pub fn reffiness_preds(&self) -> impl Iterator<Item = (SrcPos, &ReffinessPred)> + '_ {
        self.ref_preds
            .iter()
            .flat_map(|(pos, preds)| preds.iter().map(move |pred| (*pos, pred)))
    }

    pub fn reffiness_preds_at(&self, pos: SrcPos) -> &[ReffinessPred] {
        self.ref_preds.get(&pos).map_or(&[], Vec::as_slice)
    }

    /// Decode the block's instructions in order.
    pub fn instrs(&self) -> BlockInstrs<'_> {
        BlockInstrs {
            unit: self.unit(),
            next: Some(Ok(self.start)),
            remaining: self.length,
        }
    }

    /// Positions of the block's instructions.
    pub fn positions(&self) -> Result<Vec<SrcPos>, DecodeError> {
        self.instrs().map(|step| step.map(|(pos, _)| pos)).collect()
    }

    /// Panics if the block violates one of its invariants. No-op unless [`CHECK_INVARIANTS`].
    pub fn check_invariants(&self) {
        if !CHECK_INVARIANTS {
            return;
        }

        let last_index = (self.length as usize).saturating_sub(1);
        let mut in_range = BTreeSet::new();
        for (i, step) in self.instrs().enumerate() {
            let (pos, instr) = match step {
                Ok(step) => step,
                Err(err) => panic!("bad block: {err}\n{self}"),
            };
            if i != last_index {
                assert!(
                    instr_allows_fallthrough(instr.op),
                    "block may not contain non-fallthrough instruction `{instr}` at {pos} \
                     unless it is last\n{self}"
                );
                assert!(
                    !instr_is_non_call_control_flow(instr.op),
                    "block may not contain control flow instruction `{instr}` at {pos} \
                     unless it is last\n{self}"
                );
            }
            in_range.insert(pos);
        }
        assert_eq!(in_range.len(), self.length as usize);

        // Empty blocks have no positions, so any key is out of range.
        let range = match (in_range.first(), in_range.last()) {
            (Some(first), Some(last)) => format!("[{first}, {last}]"),
            _ => "[] of empty block".to_owned(),
        };
        let range_check = |kind: &str, pos: &SrcPos| {
            assert!(
                in_range.contains(pos),
                "{kind} at {pos} outside range {range}\n{self}"
            );
        };

        for (pos, preds) in &self.type_preds {
            range_check("type prediction", pos);
            for pred in preds {
                match pred.location {
                    Location::Local { id } => assert!(
                        id < self.func.num_locals(),
                        "type prediction {pred} at {pos} names a local outside {} (has {} locals)",
                        self.func.full_name(),
                        self.func.num_locals()
                    ),
                    // Unchecked.
                    Location::Stack { .. } => {}
                }
            }
        }
        for pos in self.by_refs.keys() {
            range_check("parameter reference flag", pos);
        }
        for pos in self.ref_preds.keys() {
            range_check("reffiness prediction", pos);
        }
    }
}

impl PartialEq for Block {
    fn eq(&self, other: &Self) -> bool {
        self.func.id() == other.func.id()
            && self.start == other.start
            && self.length == other.length
            && self.type_preds == other.type_preds
            && self.by_refs == other.by_refs
            && self.ref_preds == other.ref_preds
    }
}

impl Eq for Block {}

/// Iterator over a block's `(position, instruction)` pairs; see [`Block::instrs`].
pub struct BlockInstrs<'a> {
    unit: &'a Unit,
    next: Option<Result<SrcPos, DecodeError>>,
    remaining: u32,
}

impl Iterator for BlockInstrs<'_> {
    type Item = Result<(SrcPos, Instr), DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let pos = match self.next.take()? {
            Ok(pos) => pos,
            Err(err) => {
                self.remaining = 0;
                return Some(Err(err));
            }
        };
        self.remaining -= 1;

        match self.unit.decode(pos.offset()) {
            Ok(instr) => {
                self.next = Some(
                    instr
                        .next_offset()
                        .map(|offset| SrcPos::new(pos.func(), offset))
                        .ok_or(DecodeError::UnexpectedEof {
                            offset: pos.offset(),
                        }),
                );
                Some(Ok((pos, instr)))
            }
            Err(err) => {
                self.remaining = 0;
                Some(Err(err))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracejit_bytecode::{FuncId, Imm, Op, UnitEmitter};

    // 0: Int 1 (9 bytes), 9: SetL 0 (5), 14: FPassL 0 L:1 (9), 23: FCall 1 (5), 28: RetC (1)
    fn func() -> Arc<Func> {
        let mut e = UnitEmitter::new();
        e.emit(Op::Int, &[Imm::Int64(1)]);
        e.emit(Op::SetL, &[Imm::LocalId(0)]);
        e.emit(Op::FPassL, &[Imm::ParamId(0), Imm::LocalId(1)]);
        e.emit(Op::FCall, &[Imm::ArgCount(1)]);
        e.emit(Op::RetC, &[]);
        Arc::new(Func::new(FuncId(1), "f", Arc::new(e.finish())).with_locals(2))
    }

    #[test]
    fn instructions_walk_from_start() {
        let func = func();
        let block = Block::new(func.clone(), 9, 4);
        let offsets: Vec<_> = block
            .positions()
            .unwrap()
            .into_iter()
            .map(|pos| pos.offset())
            .collect();
        assert_eq!(offsets, vec![9, 14, 23, 28]);
    }

    #[test]
    fn calls_may_sit_mid_block() {
        let func = func();
        let mut block = Block::new(func, 0, 0);
        for _ in 0..5 {
            block.add_instruction();
        }
        assert_eq!(block.length(), 5);
    }

    #[test]
    fn predictions_sharing_a_position_keep_insertion_order() {
        let func = func();
        let mut block = Block::new(func.clone(), 0, 2);
        let at = func.src_pos(0);
        block.add_predicted(at, TypePred::new(Location::Stack { offset: -1 }, Type::INT));
        block.add_predicted(at, TypePred::new(Location::Local { id: 1 }, Type::STR));
        block.add_predicted(
            func.src_pos(9),
            TypePred::new(Location::Local { id: 0 }, Type::DBL),
        );

        let got: Vec<_> = block
            .type_preds()
            .map(|(pos, pred)| (pos.offset(), pred.location))
            .collect();
        assert_eq!(
            got,
            vec![
                (0, Location::Stack { offset: -1 }),
                (0, Location::Local { id: 1 }),
                (9, Location::Local { id: 0 }),
            ]
        );
        assert_eq!(block.type_preds_at(at).len(), 2);
        assert!(block.type_preds_at(func.src_pos(28)).is_empty());
    }

    #[test]
    fn stack_offsets_are_never_rejected() {
        let func = func();
        let mut block = Block::new(func.clone(), 0, 1);
        block.add_predicted(
            func.src_pos(0),
            TypePred::new(Location::Stack { offset: i32::MIN }, Type::GEN),
        );
        block.add_predicted(
            func.src_pos(0),
            TypePred::new(Location::Stack { offset: 1 << 20 }, Type::CLS),
        );
        assert_eq!(block.type_preds().count(), 2);
    }

    #[test]
    fn empty_blocks_without_guards_are_valid() {
        let func = func();
        let block = Block::new(func.clone(), 28, 0);
        block.check_invariants();
        assert!(block.positions().unwrap().is_empty());
    }

    #[cfg(debug_assertions)]
    #[test]
    #[should_panic(expected = "reffiness prediction at F1@0 outside range [] of empty block")]
    fn guards_on_empty_blocks_are_fatal() {
        let func = func();
        let mut block = Block::new(func.clone(), 0, 0);
        block.add_reffiness_pred(
            func.src_pos(0),
            ReffinessPred {
                mask: vec![true],
                vals: vec![false],
                ar_sp_offset: 0,
            },
        );
    }

    #[cfg(debug_assertions)]
    #[test]
    #[should_panic(expected = "type prediction at F1@14 outside range")]
    fn out_of_range_type_prediction_is_fatal() {
        let func = func();
        let mut block = Block::new(func.clone(), 0, 2);
        block.add_predicted(func.src_pos(14), TypePred::new(Location::Local { id: 0 }, Type::INT));
    }

    #[cfg(debug_assertions)]
    #[test]
    #[should_panic(expected = "parameter reference flag at F1@23 outside range")]
    fn out_of_range_by_ref_flag_is_fatal() {
        let func = func();
        let mut block = Block::new(func.clone(), 9, 2);
        block.set_param_by_ref(func.src_pos(23), ParamByRef::Yes);
    }

    #[cfg(debug_assertions)]
    #[test]
    #[should_panic(expected = "reffiness prediction at F1@0 outside range")]
    fn out_of_range_reffiness_prediction_is_fatal() {
        let func = func();
        let mut block = Block::new(func.clone(), 9, 1);
        block.add_reffiness_pred(
            func.src_pos(0),
            ReffinessPred {
                mask: vec![true],
                vals: vec![true],
                ar_sp_offset: 1,
            },
        );
    }

    #[cfg(debug_assertions)]
    #[test]
    #[should_panic(expected = "outside range")]
    fn positions_between_instructions_are_out_of_range() {
        let func = func();
        let mut block = Block::new(func.clone(), 0, 3);
        block.set_param_by_ref(func.src_pos(15), ParamByRef::No);
    }

    #[cfg(debug_assertions)]
    #[test]
    #[should_panic(expected = "names a local outside f")]
    fn local_past_num_locals_is_fatal() {
        let func = func();
        let mut block = Block::new(func.clone(), 0, 1);
        block.add_predicted(func.src_pos(0), TypePred::new(Location::Local { id: 2 }, Type::INT));
    }

    #[cfg(debug_assertions)]
    #[test]
    #[should_panic(expected = "already set")]
    fn duplicate_by_ref_flag_is_fatal() {
        let func = func();
        let mut block = Block::new(func.clone(), 14, 1);
        block.set_param_by_ref(func.src_pos(14), ParamByRef::No);
        block.set_param_by_ref(func.src_pos(14), ParamByRef::Yes);
    }

    #[cfg(debug_assertions)]
    #[test]
    #[should_panic(expected = "outside the Gen|Cls domain")]
    fn non_value_type_prediction_is_fatal() {
        let func = func();
        let mut block = Block::new(func.clone(), 0, 1);
        block.add_predicted(
            func.src_pos(0),
            TypePred::new(Location::Stack { offset: 0 }, Type::FRAME_PTR),
        );
    }

    #[cfg(debug_assertions)]
    #[test]
    #[should_panic(expected = "non-fallthrough instruction `RetC`")]
    fn instructions_after_a_terminal_are_fatal() {
        let mut e = UnitEmitter::new();
        e.emit(Op::RetC, &[]);
        e.emit(Op::Nop, &[]);
        let func = Arc::new(Func::new(FuncId(2), "g", Arc::new(e.finish())));
        Block::new(func, 0, 2);
    }

    #[cfg(debug_assertions)]
    #[test]
    #[should_panic(expected = "control flow instruction `JmpZ +6`")]
    fn conditional_branch_mid_block_is_fatal() {
        let mut e = UnitEmitter::new();
        e.emit(Op::True, &[]);
        e.emit(Op::JmpZ, &[Imm::BranchOffset(6)]);
        e.emit(Op::Nop, &[]);
        e.emit(Op::RetC, &[]);
        let func = Arc::new(Func::new(FuncId(3), "h", Arc::new(e.finish())));
        let mut block = Block::new(func, 0, 2);
        block.add_instruction();
    }
}
