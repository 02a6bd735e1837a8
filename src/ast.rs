//! This module defines the value representation shared by the reader and the
//! evaluator. A [`Value`] is exactly one of four variants: a pair, an integer,
//! an interned symbol or a primitive function. Pairs are the only compound
//! structure; lists are chains of pairs ending in the `nil` symbol, and a chain
//! ending in anything else is an improper list.
//!
//! Pairs and function records are reference counted and immutable once built.
//! Symbols carry only their [`SymbolId`], so rendering a value as text needs the
//! [`SymbolTable`] that issued those identifiers; see [`Value::display`].

use crate::Error;
use crate::symbols::{SymbolId, SymbolTable};
use std::fmt;
use std::sync::Arc;

/// Type alias for number values in interpreter
pub type NumberType = i64;

/// Bits of a machine word reserved for the variant tag in a packed encoding
pub const TAG_BITS: u32 = 2;

/// Largest integer payload (host word width minus the tag bits)
pub const FIXNUM_MAX: NumberType = NumberType::MAX >> TAG_BITS;

/// Smallest integer payload (host word width minus the tag bits)
pub const FIXNUM_MIN: NumberType = NumberType::MIN >> TAG_BITS;

/// Wrap an integer into the payload range.
///
/// Equivalent to encoding with a left shift by [`TAG_BITS`] and decoding with
/// an arithmetic right shift: in-range values round-trip exactly, anything
/// else loses its top bits and wraps around.
pub(crate) fn wrap_fixnum(n: NumberType) -> NumberType {
    n.wrapping_shl(TAG_BITS) >> TAG_BITS
}

/// Canonical erased primitive signature: one argument list in, one value out.
pub type OperationFn = dyn Fn(&Value) -> Result<Value, Error> + Send + Sync;

/// Discriminant of a [`Value`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tag {
    Pair,
    Number,
    Symbol,
    Function,
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Tag::Pair => "pair",
            Tag::Number => "number",
            Tag::Symbol => "symbol",
            Tag::Function => "function",
        };
        write!(f, "{name}")
    }
}

/// An immutable (first, rest) cell.
pub struct Pair {
    first: Value,
    rest: Value,
}

impl Pair {
    pub fn first(&self) -> &Value {
        &self.first
    }

    pub fn rest(&self) -> &Value {
        &self.rest
    }
}

impl Drop for Pair {
    // Unlink the rest chain iteratively so dropping a long list does not
    // recurse once per element.
    fn drop(&mut self) {
        let mut next = std::mem::replace(&mut self.rest, Value::nil());
        while let Value::Pair(pair) = next {
            match Arc::try_unwrap(pair) {
                Ok(mut owned) => next = std::mem::replace(&mut owned.rest, Value::nil()),
                Err(_) => break,
            }
        }
    }
}

/// Core value type in interpreter
///
/// Build values through the constructors ([`Value::number`], [`Value::cons`],
/// [`Value::list`], ...) rather than the variants directly: [`Value::number`]
/// keeps integers inside the payload range.
#[derive(Clone)]
pub enum Value {
    /// Cons cell; the only compound structure
    Pair(Arc<Pair>),
    /// Integer payload in `FIXNUM_MIN..=FIXNUM_MAX`
    Number(NumberType),
    /// Interned symbol
    Symbol(SymbolId),
    /// Primitive function. `id` names the binding it was registered under and
    /// is used for equality instead of the function pointer.
    Function {
        id: SymbolId,
        func: Arc<OperationFn>,
    },
}

impl Value {
    /// The `nil` symbol: empty list and the only false value
    pub const fn nil() -> Value {
        Value::Symbol(SymbolId::NIL)
    }

    /// Integer, wrapped into the payload range
    pub fn number(n: NumberType) -> Value {
        Value::Number(wrap_fixnum(n))
    }

    pub fn symbol(id: SymbolId) -> Value {
        Value::Symbol(id)
    }

    pub fn cons(first: Value, rest: Value) -> Value {
        Value::Pair(Arc::new(Pair { first, rest }))
    }

    /// Wrap a closure as a primitive function value.
    pub fn function<F>(id: SymbolId, func: F) -> Value
    where
        F: Fn(&Value) -> Result<Value, Error> + Send + Sync + 'static,
    {
        Value::Function {
            id,
            func: Arc::new(func),
        }
    }

    /// Build a list from `items` ending in `tail`.
    ///
    /// A `nil` tail yields a proper list; any other non-pair tail yields an
    /// improper one. No items yields `tail` itself.
    pub fn list<I>(items: I, tail: Value) -> Value
    where
        I: IntoIterator<Item = Value>,
        I::IntoIter: DoubleEndedIterator,
    {
        items
            .into_iter()
            .rev()
            .fold(tail, |rest, first| Value::cons(first, rest))
    }

    pub fn tag(&self) -> Tag {
        match self {
            Value::Pair(_) => Tag::Pair,
            Value::Number(_) => Tag::Number,
            Value::Symbol(_) => Tag::Symbol,
            Value::Function { .. } => Tag::Function,
        }
    }

    pub fn is_pair(&self) -> bool {
        matches!(self, Value::Pair(_))
    }

    pub fn is_number(&self) -> bool {
        matches!(self, Value::Number(_))
    }

    pub fn is_symbol(&self) -> bool {
        matches!(self, Value::Symbol(_))
    }

    pub fn is_function(&self) -> bool {
        matches!(self, Value::Function { .. })
    }

    /// Check if a value is the `nil` symbol
    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Symbol(id) if *id == SymbolId::NIL)
    }

    pub fn as_number(&self) -> Option<NumberType> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_symbol(&self) -> Option<SymbolId> {
        match self {
            Value::Symbol(id) => Some(*id),
            _ => None,
        }
    }

    pub fn as_pair(&self) -> Option<&Pair> {
        match self {
            Value::Pair(pair) => Some(pair),
            _ => None,
        }
    }

    /// First slot of a pair; `TypeError` for any other variant
    pub fn first(&self) -> Result<&Value, Error> {
        self.as_pair()
            .map(Pair::first)
            .ok_or_else(|| Error::TypeError(format!("first of non-pair ({})", self.tag())))
    }

    /// Rest slot of a pair; `TypeError` for any other variant
    pub fn rest(&self) -> Result<&Value, Error> {
        self.as_pair()
            .map(Pair::rest)
            .ok_or_else(|| Error::TypeError(format!("rest of non-pair ({})", self.tag())))
    }

    /// Number of elements in a proper list, `None` if the chain does not end
    /// in `nil`. A bare `nil` has length 0.
    pub fn list_length(&self) -> Option<usize> {
        let mut items = self.iter();
        let count = items.by_ref().count();
        items.tail().is_nil().then_some(count)
    }

    pub fn is_proper_list(&self) -> bool {
        self.list_length().is_some()
    }

    /// Iterate the first slots along the rest chain.
    ///
    /// Iteration stops at the first non-pair; [`ListIter::tail`] then returns
    /// it, so callers can tell a proper list from an improper one.
    pub fn iter(&self) -> ListIter<'_> {
        ListIter { current: self }
    }

    /// The `n`th element of a list, if the chain is that long
    pub fn nth(&self, n: usize) -> Option<&Value> {
        self.iter().nth(n)
    }

    /// Call a function value with an argument list.
    pub fn call(&self, args: &Value) -> Result<Value, Error> {
        match self {
            Value::Function { func, .. } => func(args),
            other => Err(Error::TypeError(format!(
                "calling a non-function ({})",
                other.tag()
            ))),
        }
    }

    /// Render this value with symbol names from `symbols`.
    pub fn display<'a>(&'a self, symbols: &'a SymbolTable) -> DisplayValue<'a> {
        DisplayValue {
            value: self,
            symbols,
        }
    }
}

/// Textual form of `value`: decimal integers, symbol names, `(a b . c)` lists
/// and `<fn>` for functions. Integers, symbols and proper lists read back to
/// an equal value.
pub fn to_display_string(value: &Value, symbols: &SymbolTable) -> String {
    value.display(symbols).to_string()
}

/// Iterator over list elements, see [`Value::iter`]
#[derive(Clone)]
pub struct ListIter<'a> {
    current: &'a Value,
}

impl<'a> ListIter<'a> {
    /// What remains of the chain: `nil` after a proper list, the dotted tail
    /// after an improper one.
    pub fn tail(&self) -> &'a Value {
        self.current
    }
}

impl<'a> Iterator for ListIter<'a> {
    type Item = &'a Value;

    fn next(&mut self) -> Option<Self::Item> {
        match self.current {
            Value::Pair(pair) => {
                self.current = &pair.rest;
                Some(&pair.first)
            }
            _ => None,
        }
    }
}

impl std::iter::FusedIterator for ListIter<'_> {}

/// Display adapter returned by [`Value::display`]
pub struct DisplayValue<'a> {
    value: &'a Value,
    symbols: &'a SymbolTable,
}

impl fmt::Display for DisplayValue<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.value {
            Value::Number(n) => write!(f, "{n}"),
            Value::Symbol(id) => write!(f, "{}", self.symbols.display_name(*id)),
            Value::Function { .. } => write!(f, "<fn>"),
            Value::Pair(_) => {
                let mut items = self.value.iter();
                write!(f, "(")?;
                for (i, elem) in items.by_ref().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{}", elem.display(self.symbols))?;
                }
                let tail = items.tail();
                if !tail.is_nil() {
                    write!(f, " . {}", tail.display(self.symbols))?;
                }
                write!(f, ")")
            }
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => write!(f, "Number({n})"),
            Value::Symbol(id) => write!(f, "Symbol(#{})", id.index()),
            Value::Function { id, .. } => write!(f, "Function(#{})", id.index()),
            Value::Pair(_) => {
                let mut items = self.iter();
                write!(f, "List(")?;
                for (i, v) in items.by_ref().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{v:?}")?;
                }
                let tail = items.tail();
                if !tail.is_nil() {
                    write!(f, " . {tail:?}")?;
                }
                write!(f, ")")
            }
        }
    }
}

impl PartialEq for Value {
    // Structural equality; walks the rest chain iteratively.
    fn eq(&self, other: &Self) -> bool {
        let (mut left, mut right) = (self, other);
        loop {
            match (left, right) {
                (Value::Pair(a), Value::Pair(b)) => {
                    if Arc::ptr_eq(a, b) {
                        return true;
                    }
                    if a.first != b.first {
                        return false;
                    }
                    left = &a.rest;
                    right = &b.rest;
                }
                (Value::Number(a), Value::Number(b)) => return a == b,
                (Value::Symbol(a), Value::Symbol(b)) => return a == b,
                // Compare functions by registered id, not function pointer
                (Value::Function { id: a, .. }, Value::Function { id: b, .. }) => return a == b,
                _ => return false, // Different variants are never equal
            }
        }
    }
}

macro_rules! impl_from_integer {
    ($int_type:ty) => {
        impl From<$int_type> for Value {
            fn from(n: $int_type) -> Self {
                Value::number(NumberType::from(n))
            }
        }
    };
}

impl_from_integer!(i8);
impl_from_integer!(i16);
impl_from_integer!(i32);
impl_from_integer!(NumberType);
impl_from_integer!(u8);
impl_from_integer!(u16);
impl_from_integer!(u32);

impl From<SymbolId> for Value {
    fn from(id: SymbolId) -> Self {
        Value::Symbol(id)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::list(v.into_iter().map(Into::into), Value::nil())
    }
}

impl<T: Into<Value>, const N: usize> From<[T; N]> for Value {
    fn from(arr: [T; N]) -> Self {
        Value::list(arr.into_iter().map(Into::into), Value::nil())
    }
}

/// Helper function for creating Values - works great in mixed lists!
#[cfg_attr(not(test), expect(dead_code))]
pub(crate) fn val<T: Into<Value>>(value: T) -> Value {
    value.into()
}
