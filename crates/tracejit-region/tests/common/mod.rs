#![allow(dead_code)]

use std::sync::Arc;

use tracejit_bytecode::{Func, FuncId, Imm, Offset, Op, UnitEmitter};

/// Route `tracing` output through the test harness so it shows up for failing tests only.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::TRACE)
        .with_test_writer()
        .try_init();
}

/// Emitter pre-filled with `n` one-byte `Nop`s, so the next instruction lands at offset `n`.
pub fn emitter_at(n: Offset) -> UnitEmitter {
    let mut e = UnitEmitter::new();
    while e.offset() < n {
        e.emit(Op::Nop, &[]);
    }
    e
}

pub fn func(id: u32, name: &str, e: UnitEmitter, locals: u32) -> Arc<Func> {
    Arc::new(Func::new(FuncId(id), name, Arc::new(e.finish())).with_locals(locals))
}

/// `if ($0) { print 1; } return null;` with two locals.
pub fn diamond() -> Arc<Func> {
    let mut e = UnitEmitter::new();
    e.emit(Op::CGetL, &[Imm::LocalId(0)]); // 0
    let br = e.emit(Op::JmpZ, &[Imm::BranchOffset(0)]); // 5
    e.emit(Op::Int, &[Imm::Int64(1)]); // 10
    e.emit(Op::Print, &[]); // 19
    e.emit(Op::PopC, &[]); // 20
    let join = e.emit(Op::Null, &[]); // 21
    e.emit(Op::RetC, &[]); // 22
    e.patch_branch(br, join);
    func(2, "diamond", e, 2)
}
