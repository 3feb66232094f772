//! Value types and identifier properties.
//!
//! A `ValType` is a base scalar type plus two orthogonal flags: `ARRAY`
//! marks a one-dimensional array of the base scalar, `CALLABLE` marks an
//! identifier that names a subroutine (whose base/array bits then encode the
//! return type; a pure procedure has base `Void`).

use bitflags::bitflags;
use std::fmt;

/// Base scalar types. `Void` only occurs as the return "type" of a pure
/// procedure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BaseType {
    Boolean,
    Integer,
    Void,
}

bitflags! {
    /// Orthogonal type flags over a [`BaseType`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct TypeFlags: u8 {
        const ARRAY = 1;
        const CALLABLE = 1 << 1;
    }
}

/// The type of a bound identifier or of an expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValType {
    base: BaseType,
    flags: TypeFlags,
}

impl ValType {
    pub const BOOLEAN: ValType = ValType::new(BaseType::Boolean);
    pub const INTEGER: ValType = ValType::new(BaseType::Integer);

    pub const fn new(base: BaseType) -> Self {
        ValType {
            base,
            flags: TypeFlags::empty(),
        }
    }

    /// The type of a procedure binding: callable, returning nothing.
    pub const fn procedure() -> Self {
        ValType {
            base: BaseType::Void,
            flags: TypeFlags::CALLABLE,
        }
    }

    pub fn base(&self) -> BaseType {
        self.base
    }

    pub fn is_variable(&self) -> bool {
        !self.flags.contains(TypeFlags::CALLABLE)
    }

    pub fn is_array(&self) -> bool {
        self.flags.contains(TypeFlags::ARRAY)
    }

    pub fn is_boolean(&self) -> bool {
        self.base == BaseType::Boolean
    }

    pub fn is_integer(&self) -> bool {
        self.base == BaseType::Integer
    }

    pub fn is_callable(&self) -> bool {
        self.flags.contains(TypeFlags::CALLABLE)
    }

    pub fn set_as_array(&mut self) {
        self.flags.insert(TypeFlags::ARRAY);
    }

    pub fn set_as_callable(&mut self) {
        self.flags.insert(TypeFlags::CALLABLE);
    }

    /// Clear the callable flag, exposing the return type of a subroutine
    /// binding as a plain value type.
    pub fn set_return_type(&mut self) {
        self.flags.remove(TypeFlags::CALLABLE);
    }

    /// Non-mutating form of [`set_return_type`](Self::set_return_type).
    pub fn return_type(&self) -> ValType {
        let mut t = *self;
        t.set_return_type();
        t
    }
}

impl fmt::Display for ValType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let base = match self.base {
            BaseType::Boolean => "boolean",
            BaseType::Integer => "integer",
            BaseType::Void => "void",
        };
        f.write_str(base)?;
        if self.is_array() {
            f.write_str(" array")?;
        }
        Ok(())
    }
}

/// Properties of a bound identifier.
///
/// For variables, `offset` is the local-frame slot index and `params` is
/// empty. For subroutines, `offset` is unused and `params` records the
/// parameter types in declaration order.
#[derive(Debug, Clone)]
pub struct IdProp {
    pub typ: ValType,
    pub offset: u32,
    pub params: Vec<ValType>,
}

impl IdProp {
    pub fn variable(typ: ValType, offset: u32) -> Self {
        IdProp {
            typ,
            offset,
            params: Vec::new(),
        }
    }

    pub fn callable(typ: ValType, params: Vec<ValType>) -> Self {
        IdProp {
            typ,
            offset: 0,
            params,
        }
    }

    pub fn nparams(&self) -> usize {
        self.params.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_predicates() {
        let t = ValType::INTEGER;
        assert!(t.is_variable());
        assert!(t.is_integer());
        assert!(!t.is_boolean());
        assert!(!t.is_array());
        assert!(!t.is_callable());
    }

    #[test]
    fn test_array_flag() {
        let mut t = ValType::BOOLEAN;
        t.set_as_array();
        assert!(t.is_array());
        assert!(t.is_boolean());
        assert!(t.is_variable());
        assert_eq!(t.to_string(), "boolean array");
    }

    #[test]
    fn test_callable_return_type() {
        let mut t = ValType::INTEGER;
        t.set_as_array();
        t.set_as_callable();
        assert!(t.is_callable());
        assert!(!t.is_variable());

        let ret = t.return_type();
        assert!(ret.is_variable());
        assert!(ret.is_integer());
        assert!(ret.is_array());
        // The array flag survives clearing the callable flag.
        t.set_return_type();
        assert_eq!(t, ret);
    }

    #[test]
    fn test_procedure_type() {
        let t = ValType::procedure();
        assert!(t.is_callable());
        assert_eq!(t.base(), BaseType::Void);
        assert_eq!(t.to_string(), "void");
    }

    #[test]
    fn test_idprop_shapes() {
        let v = IdProp::variable(ValType::INTEGER, 3);
        assert_eq!(v.offset, 3);
        assert_eq!(v.nparams(), 0);

        let f = IdProp::callable(ValType::procedure(), vec![ValType::INTEGER, ValType::BOOLEAN]);
        assert_eq!(f.nparams(), 2);
    }
}
