//! Tracer output consumed by the region builder.
//!
//! A [`Tracelet`] is one concrete path through a function: the instructions executed (in
//! order, possibly continuing through taken forward `Jmp`s) plus the facts the tracer relied
//! on while recording them. [`TraceletRecorder`] produces the instruction stream directly from
//! bytecode; dependency and reffiness facts are attached by the caller.

use core::fmt;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use tracejit_bytecode::{
    instr_allows_fallthrough, instr_is_non_call_control_flow, is_fpass, DecodeError, Func, Instr,
    Offset, Op, RuntimeType, SrcPos,
};

/// An instruction as the tracer saw it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NormalizedInstruction {
    pub source: SrcPos,
    pub instr: Instr,
    /// The tracer proved the instruction has no effect on this path.
    pub no_op: bool,
    /// For `FPass*`: the callee takes this argument by reference.
    pub prepped_by_ref: bool,
}

impl NormalizedInstruction {
    pub fn new(source: SrcPos, instr: Instr) -> Self {
        debug_assert_eq!(source.offset(), instr.offset);
        Self {
            source,
            instr,
            no_op: false,
            prepped_by_ref: false,
        }
    }

    pub fn op(&self) -> Op {
        self.instr.op
    }

    pub fn offset(&self) -> Offset {
        self.instr.offset
    }
}

/// Location spaces the tracer tracks values in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LocationSpace {
    Invalid,
    Stack,
    Local,
    Iter,
    Litstr,
    Litint,
    This,
}

/// A location in tracer coordinates. Stack offsets grow downwards from the stack pointer at
/// trace entry: `0` is the top of the stack, `1` the slot below it, and so on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TraceLocation {
    pub space: LocationSpace,
    pub offset: i64,
}

impl TraceLocation {
    pub fn new(space: LocationSpace, offset: i64) -> Self {
        Self { space, offset }
    }

    pub fn stack(offset: i64) -> Self {
        Self::new(LocationSpace::Stack, offset)
    }

    pub fn local(id: i64) -> Self {
        Self::new(LocationSpace::Local, id)
    }

    pub fn this() -> Self {
        Self::new(LocationSpace::This, 0)
    }

    pub fn is_this(&self) -> bool {
        self.space == LocationSpace::This
    }
}

impl fmt::Display for TraceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.space {
            LocationSpace::This => f.write_str("This"),
            space => write!(f, "{space:?}{{{}}}", self.offset),
        }
    }
}

/// A followed location and the type the trace depends on it having.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DynLocation {
    pub location: TraceLocation,
    pub rtt: RuntimeType,
}

/// Expected by-reference bits for the parameters of one pending call.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RefDepsRecord {
    pub mask: Vec<bool>,
    pub vals: Vec<bool>,
}

/// Reffiness facts keyed by the stack offset of each pending activation record.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RefDeps {
    pub ar_map: BTreeMap<i32, RefDepsRecord>,
}

impl RefDeps {
    /// Record that argument `arg` of the call pending at `ar_sp_offset` is (or isn't) passed by
    /// reference.
    pub fn add_dep(&mut self, ar_sp_offset: i32, arg: usize, by_ref: bool) {
        let record = self.ar_map.entry(ar_sp_offset).or_default();
        if record.mask.len() <= arg {
            record.mask.resize(arg + 1, false);
            record.vals.resize(arg + 1, false);
        }
        record.mask[arg] = true;
        record.vals[arg] = by_ref;
    }

    pub fn is_empty(&self) -> bool {
        self.ar_map.is_empty()
    }
}

#[derive(Clone, Debug)]
pub struct Tracelet {
    pub func: Arc<Func>,
    pub start: SrcPos,
    pub instrs: Vec<NormalizedInstruction>,
    pub dependencies: BTreeMap<TraceLocation, DynLocation>,
    pub ref_deps: RefDeps,
}

impl Tracelet {
    pub fn new(func: Arc<Func>, start: Offset) -> Self {
        let start = func.src_pos(start);
        Self {
            func,
            start,
            instrs: Vec::new(),
            dependencies: BTreeMap::new(),
            ref_deps: RefDeps::default(),
        }
    }

    pub fn len(&self) -> usize {
        self.instrs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instrs.is_empty()
    }

    pub fn add_dependency(&mut self, location: TraceLocation, rtt: RuntimeType) {
        self.dependencies
            .insert(location, DynLocation { location, rtt });
    }
}

impl fmt::Display for Tracelet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Tracelet {}@{} ({} instrs)",
            self.func.full_name(),
            self.start.offset(),
            self.instrs.len()
        )?;
        for ni in &self.instrs {
            let mut notes = String::new();
            if ni.no_op {
                notes.push_str(" (no-op)");
            }
            if ni.prepped_by_ref {
                notes.push_str(" (by ref)");
            }
            writeln!(f, "    {}  {}{notes}", ni.offset(), ni.instr)?;
        }
        for (loc, dep) in &self.dependencies {
            writeln!(f, "  dep {loc}: {}", dep.rtt)?;
        }
        for (ar, record) in &self.ref_deps.ar_map {
            let bits = |v: &[bool]| v.iter().map(|b| if *b { '1' } else { '0' }).collect::<String>();
            writeln!(
                f,
                "  ref dep AR@{ar}: mask {} vals {}",
                bits(record.mask.as_slice()),
                bits(record.vals.as_slice())
            )?;
        }
        Ok(())
    }
}

/// Records a tracelet's instruction stream straight from bytecode.
///
/// Recording stops after `max_instrs` instructions, at the end of the function, or after any
/// control-flow instruction other than a forward `Jmp` (which is traced through) or a call.
#[derive(Debug)]
pub struct TraceletRecorder {
    tracelet: Tracelet,
    by_ref_params: BTreeSet<u32>,
}

impl TraceletRecorder {
    pub fn new(func: Arc<Func>, start: Offset) -> Self {
        Self {
            tracelet: Tracelet::new(func, start),
            by_ref_params: BTreeSet::new(),
        }
    }

    /// Parameters of pending calls that take their argument by reference.
    pub fn with_by_ref_params(mut self, params: impl IntoIterator<Item = u32>) -> Self {
        self.by_ref_params.extend(params);
        self
    }

    pub fn record(mut self, max_instrs: usize) -> Result<Tracelet, DecodeError> {
        let func = self.tracelet.func.clone();
        let unit = func.unit();
        let mut pos = self.tracelet.start;

        while self.tracelet.instrs.len() < max_instrs && func.contains(pos.offset()) {
            let instr = unit.decode(pos.offset())?;
            let op = instr.op;
            let forward_target = instr.branch_target().filter(|t| *t > instr.offset);
            let next = instr.next_offset();

            let mut ni = NormalizedInstruction::new(pos, instr);
            if is_fpass(op) {
                ni.prepped_by_ref = ni
                    .instr
                    .param_id()
                    .is_some_and(|param| self.by_ref_params.contains(&param));
            }
            self.tracelet.instrs.push(ni);

            let more = self.tracelet.instrs.len() < max_instrs;
            match (op, forward_target) {
                (Op::Jmp, Some(target)) if more && func.contains(target) => {
                    pos.set_offset(target)
                }
                _ if !instr_allows_fallthrough(op) || instr_is_non_call_control_flow(op) => break,
                _ => match next {
                    Some(next) => pos.set_offset(next),
                    None => break,
                },
            }
        }

        Ok(self.tracelet)
    }
}
