//! The semantic type model.
//!
//! Types are nominal: a [`TypeRef`] either names a type or is an array of an
//! element type. Conformance is identity plus a small set of built-in
//! primitive widenings (integer to wider integer of the same signedness,
//! integer to float). Arrays are covariant only in identity.

use std::fmt;

/// A resolved type reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeRef {
    /// A named type: a primitive or a declared struct.
    Named(String),
    /// An array of an element type.
    Array(Box<TypeRef>),
}

impl TypeRef {
    /// Create a named type reference.
    pub fn named(name: impl Into<String>) -> Self {
        TypeRef::Named(name.into())
    }

    /// Create an array type reference.
    pub fn array_of(elem: TypeRef) -> Self {
        TypeRef::Array(Box::new(elem))
    }

    /// The `void` type.
    pub fn void() -> Self {
        TypeRef::named("void")
    }

    /// The `bool` type.
    pub fn bool() -> Self {
        TypeRef::named("bool")
    }

    /// The type name, if this is a named type.
    pub fn name(&self) -> Option<&str> {
        match self {
            TypeRef::Named(name) => Some(name),
            TypeRef::Array(_) => None,
        }
    }

    /// Whether this is an array type.
    pub fn is_array(&self) -> bool {
        matches!(self, TypeRef::Array(_))
    }

    /// The element type, if this is an array.
    pub fn elem(&self) -> Option<&TypeRef> {
        match self {
            TypeRef::Array(elem) => Some(elem),
            TypeRef::Named(_) => None,
        }
    }

    /// Look up the primitive description of this type, if it is one.
    pub fn primitive(&self) -> Option<&'static Primitive> {
        self.name().and_then(primitive)
    }

    /// Whether this is a primitive integer type.
    pub fn is_integer(&self) -> bool {
        self.primitive().map(|p| p.is_integer()).unwrap_or(false)
    }

    /// Whether this is a primitive float type.
    pub fn is_float(&self) -> bool {
        self.primitive().map(|p| p.float).unwrap_or(false)
    }

    /// Whether this is `bool`.
    pub fn is_bool(&self) -> bool {
        self.name() == Some("bool")
    }

    /// Whether this is `void`.
    pub fn is_void(&self) -> bool {
        self.name() == Some("void")
    }

    /// Whether a value of this type is accepted where `expected` is required.
    ///
    /// Identity always conforms. Otherwise only primitive widenings apply:
    /// integer to a wider integer of the same signedness, or integer to any
    /// float. Arrays conform only to an identical array type.
    pub fn conforms_to(&self, expected: &TypeRef) -> bool {
        if self == expected {
            return true;
        }
        match (self.primitive(), expected.primitive()) {
            (Some(from), Some(to)) => widens(from, to),
            _ => false,
        }
    }

    /// The deterministic string used in mangled names.
    ///
    /// Named types use their name; arrays append `[]` to the element
    /// fingerprint.
    pub fn fingerprint(&self) -> String {
        match self {
            TypeRef::Named(name) => name.clone(),
            TypeRef::Array(elem) => format!("{}[]", elem.fingerprint()),
        }
    }

    /// The size in bytes used for struct field offsets.
    ///
    /// Primitives take their bit width; arrays and declared types occupy one
    /// reference slot.
    pub fn size_in_bytes(&self) -> u32 {
        match self.primitive() {
            Some(p) => (p.bits as u32) / 8,
            None => 8,
        }
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeRef::Named(name) => write!(f, "{}", name),
            TypeRef::Array(elem) => write!(f, "[{}]", elem),
        }
    }
}

/// Description of a built-in primitive type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Primitive {
    /// Source-level name.
    pub name: &'static str,
    /// Bit width.
    pub bits: u8,
    /// Whether the type is signed (integers only).
    pub signed: bool,
    /// Whether the type is a float.
    pub float: bool,
}

impl Primitive {
    /// Whether this primitive is an integer type.
    pub fn is_integer(&self) -> bool {
        !self.float && self.name != "bool" && self.name != "str" && self.name != "void"
    }
}

/// The built-in primitive table.
pub static PRIMITIVES: &[Primitive] = &[
    Primitive { name: "i8", bits: 8, signed: true, float: false },
    Primitive { name: "i16", bits: 16, signed: true, float: false },
    Primitive { name: "i32", bits: 32, signed: true, float: false },
    Primitive { name: "i64", bits: 64, signed: true, float: false },
    Primitive { name: "u8", bits: 8, signed: false, float: false },
    Primitive { name: "u16", bits: 16, signed: false, float: false },
    Primitive { name: "u32", bits: 32, signed: false, float: false },
    Primitive { name: "u64", bits: 64, signed: false, float: false },
    Primitive { name: "f32", bits: 32, signed: true, float: true },
    Primitive { name: "f64", bits: 64, signed: true, float: true },
    Primitive { name: "bool", bits: 8, signed: false, float: false },
    Primitive { name: "str", bits: 64, signed: false, float: false },
    Primitive { name: "void", bits: 0, signed: false, float: false },
];

/// Look up a primitive by its source-level name.
pub fn primitive(name: &str) -> Option<&'static Primitive> {
    PRIMITIVES.iter().find(|p| p.name == name)
}

/// Whether `from` widens to `to` under the built-in rules.
fn widens(from: &Primitive, to: &Primitive) -> bool {
    if from.is_integer() && to.is_integer() {
        return from.signed == to.signed && to.bits > from.bits;
    }
    if from.is_integer() && to.float {
        return true;
    }
    if from.float && to.float {
        return to.bits > from.bits;
    }
    false
}
