//! Value type lattice used by guards and predictions.
//!
//! [`Type`] is a set of primitive kinds; `a.subtype_of(b)` is set inclusion. [`RuntimeType`] is
//! what the tracer observed for a location while recording, which may be vague.

use core::fmt;

use bitflags::bitflags;

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct Type: u32 {
        const UNINIT = 1 << 0;
        const INIT_NULL = 1 << 1;
        const BOOL = 1 << 2;
        const INT = 1 << 3;
        const DBL = 1 << 4;
        const STATIC_STR = 1 << 5;
        const COUNTED_STR = 1 << 6;
        const ARR = 1 << 7;
        const OBJ = 1 << 8;
        const RES = 1 << 9;
        const BOXED_CELL = 1 << 10;
        const CLS = 1 << 11;
        // Not values: frame and stack pointers produced by the code generator.
        const STK_PTR = 1 << 12;
        const FRAME_PTR = 1 << 13;

        const NULL = Self::UNINIT.bits() | Self::INIT_NULL.bits();
        const STR = Self::STATIC_STR.bits() | Self::COUNTED_STR.bits();
        const CELL = Self::NULL.bits()
            | Self::BOOL.bits()
            | Self::INT.bits()
            | Self::DBL.bits()
            | Self::STR.bits()
            | Self::ARR.bits()
            | Self::OBJ.bits()
            | Self::RES.bits();
        const GEN = Self::CELL.bits() | Self::BOXED_CELL.bits();
    }
}

// Wider names first so unions render compactly.
const NAMES: &[(Type, &str)] = &[
    (Type::GEN, "Gen"),
    (Type::CELL, "Cell"),
    (Type::NULL, "Null"),
    (Type::STR, "Str"),
    (Type::UNINIT, "Uninit"),
    (Type::INIT_NULL, "InitNull"),
    (Type::BOOL, "Bool"),
    (Type::INT, "Int"),
    (Type::DBL, "Dbl"),
    (Type::STATIC_STR, "StaticStr"),
    (Type::COUNTED_STR, "CountedStr"),
    (Type::ARR, "Arr"),
    (Type::OBJ, "Obj"),
    (Type::RES, "Res"),
    (Type::BOXED_CELL, "BoxedCell"),
    (Type::CLS, "Cls"),
    (Type::STK_PTR, "StkPtr"),
    (Type::FRAME_PTR, "FramePtr"),
];

impl Type {
    pub fn subtype_of(self, other: Type) -> bool {
        other.contains(self)
    }

    pub fn from_data_type(dt: DataType) -> Type {
        match dt {
            DataType::Uninit => Type::UNINIT,
            DataType::Null => Type::INIT_NULL,
            DataType::Boolean => Type::BOOL,
            DataType::Int64 => Type::INT,
            DataType::Double => Type::DBL,
            DataType::StaticString => Type::STATIC_STR,
            DataType::String => Type::STR,
            DataType::Array => Type::ARR,
            DataType::Object => Type::OBJ,
            DataType::Resource => Type::RES,
        }
    }

    pub fn from_runtime_type(rtt: RuntimeType) -> Type {
        match rtt {
            RuntimeType::Vague => Type::GEN,
            RuntimeType::Value(dt) => Type::from_data_type(dt),
            RuntimeType::Ref(_) => Type::BOXED_CELL,
            RuntimeType::Class => Type::CLS,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("Bottom");
        }
        let mut rest = *self;
        let mut first = true;
        for (ty, name) in NAMES {
            if rest.contains(*ty) {
                if !first {
                    f.write_str("|")?;
                }
                f.write_str(name)?;
                rest.remove(*ty);
                first = false;
            }
        }
        Ok(())
    }
}

/// Runtime tag of a value as seen by the interpreter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DataType {
    Uninit,
    Null,
    Boolean,
    Int64,
    Double,
    StaticString,
    String,
    Array,
    Object,
    Resource,
}

/// Type observed by the tracer at a traced location.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RuntimeType {
    /// Nothing is known about the value.
    Vague,
    Value(DataType),
    /// A reference cell whose inner value had the given type.
    Ref(DataType),
    Class,
}

impl RuntimeType {
    pub fn is_vague(&self) -> bool {
        matches!(self, RuntimeType::Vague)
    }
}

impl fmt::Display for RuntimeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuntimeType::Vague => f.write_str("Vague"),
            RuntimeType::Value(dt) => write!(f, "{}", Type::from_data_type(*dt)),
            RuntimeType::Ref(dt) => write!(f, "Ref<{}>", Type::from_data_type(*dt)),
            RuntimeType::Class => f.write_str("Cls"),
        }
    }
}
