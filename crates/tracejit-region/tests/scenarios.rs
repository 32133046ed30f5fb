mod common;

use pretty_assertions::assert_eq;
use tracejit_bytecode::{DataType, Imm, Op, RuntimeType, Type};
use tracejit_region::{
    region_from_tracelet, Location, RegionContext, RegionSelector, RegionSelectorConfig,
    TraceLocation, TraceletRecorder, TypePred,
};

use common::{emitter_at, func, init_tracing};

#[test]
fn straight_trace_guards_stack_dependency_at_entry() {
    init_tracing();
    let mut e = emitter_at(10);
    e.emit(Op::Null, &[]); // 10
    e.emit(Op::Not, &[]); // 11
    e.emit(Op::Print, &[]); // 12
    e.emit(Op::RetC, &[]); // 13
    let f = func(1, "F", e, 0);

    let mut tlet = TraceletRecorder::new(f.clone(), 10).record(3).unwrap();
    tlet.add_dependency(TraceLocation::stack(0), RuntimeType::Value(DataType::Int64));
    let region = region_from_tracelet(&tlet).unwrap();

    assert_eq!(region.blocks().len(), 1);
    let block = &region.blocks()[0];
    assert_eq!(block.start(), f.src_pos(10));
    assert_eq!(block.length(), 3);
    let preds: Vec<_> = block.type_preds().collect();
    assert_eq!(
        preds,
        vec![(
            f.src_pos(10),
            &TypePred::new(Location::Stack { offset: -1 }, Type::INT)
        )]
    );
}

#[test]
fn traced_through_jump_starts_a_new_block() {
    init_tracing();
    let mut e = emitter_at(10);
    e.emit(Op::Nop, &[]); // 10
    e.emit(Op::Jmp, &[Imm::BranchOffset(20)]); // 11
    while e.offset() < 31 {
        e.emit(Op::Print, &[]);
    }
    e.emit(Op::RetC, &[]); // 31
    let f = func(1, "F", e, 0);

    let tlet = TraceletRecorder::new(f.clone(), 10).record(3).unwrap();
    let region = region_from_tracelet(&tlet).unwrap();

    let shape: Vec<_> = region
        .blocks()
        .iter()
        .map(|b| (b.start().offset(), b.length()))
        .collect();
    assert_eq!(shape, vec![(10, 2), (31, 1)]);
}

#[test]
fn vague_dependency_is_not_guarded() {
    let mut e = emitter_at(0);
    e.emit(Op::CGetL, &[Imm::LocalId(0)]);
    e.emit(Op::RetC, &[]);
    let f = func(1, "F", e, 1);

    let mut tlet = TraceletRecorder::new(f, 0).record(8).unwrap();
    tlet.add_dependency(TraceLocation::local(0), RuntimeType::Vague);
    tlet.add_dependency(TraceLocation::stack(1), RuntimeType::Value(DataType::String));
    let region = region_from_tracelet(&tlet).unwrap();

    let preds: Vec<_> = region.blocks()[0].type_preds().map(|(_, p)| *p).collect();
    assert_eq!(
        preds,
        vec![TypePred::new(Location::Stack { offset: -2 }, Type::STR)]
    );
}

#[test]
fn unset_configuration_selects_no_region() {
    init_tracing();
    let selector = RegionSelector::new(RegionSelectorConfig::default());
    let ctx = RegionContext::new(common::diamond(), 0);
    assert_eq!(selector.select_region(&ctx, None), None);
}

#[test]
#[should_panic(expected = "requires a tracelet")]
fn tracelet_mode_never_silently_skips_a_missing_tracelet() {
    let selector = RegionSelector::new(RegionSelectorConfig::new("tracelet"));
    let ctx = RegionContext::new(common::diamond(), 0);
    selector.select_region(&ctx, None);
}

#[test]
fn tracelet_mode_reffiness_guards_sit_on_the_first_block() {
    init_tracing();
    let mut e = emitter_at(0);
    e.emit(Op::FPushFuncD, &[Imm::ArgCount(1), Imm::LitStr(0)]); // 0
    e.emit(Op::Jmp, &[Imm::BranchOffset(6)]); // 9
    e.emit(Op::Throw, &[]); // 14
    e.emit(Op::FPassL, &[Imm::ParamId(0), Imm::LocalId(0)]); // 15
    e.emit(Op::FCall, &[Imm::ArgCount(1)]); // 24
    e.emit(Op::RetC, &[]); // 29
    let f = func(1, "F", e, 1);

    let mut tlet = TraceletRecorder::new(f.clone(), 0)
        .with_by_ref_params([0])
        .record(16)
        .unwrap();
    tlet.ref_deps.add_dep(0, 0, true);

    let selector = RegionSelector::new(RegionSelectorConfig::new("tracelet"));
    let region = selector
        .select_region(&RegionContext::new(f.clone(), 0), Some(&tlet))
        .unwrap();

    assert_eq!(region.blocks().len(), 2);
    assert_eq!(region.blocks()[0].reffiness_preds().count(), 1);
    assert_eq!(region.blocks()[1].reffiness_preds().count(), 0);
    assert_eq!(
        region.to_string(),
        "Region (2 blocks):\n\
         Block F1@0 (F) length 2\n\
         \x20 predict reffiness: offset: 0 mask: 1 vals: 1\n\
         \x20   0  FPushFuncD 1 S:0\n\
         \x20   9  Jmp +6\n\
         Block F1@15 (F) length 3\n\
         \x20   15  FPassL 0 L:0 (passed by reference)\n\
         \x20   24  FCall 1\n\
         \x20   29  RetC\n"
    );
}
