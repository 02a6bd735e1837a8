//! Symbol interning.
//!
//! Every symbol name read from source or bound at bootstrap is interned once
//! and afterwards referred to by a [`SymbolId`], so symbol equality is a plain
//! integer comparison. Identifiers are assigned sequentially in first-seen
//! order and never change for the lifetime of the table.
//!
//! The name `nil` is always the first entry, which lets [`SymbolId::NIL`] be a
//! constant shared by every table.

use string_interner::{DefaultBackend, DefaultSymbol, StringInterner, Symbol};
use tracing::trace;

/// Name interned at table construction; doubles as the empty list and false.
pub(crate) const NIL_NAME: &str = "nil";

/// Placeholder printed for identifiers that this table never issued
const UNKNOWN_SYMBOL: &str = "#<unknown-symbol>";

/// Stable identifier of an interned symbol name.
///
/// An identifier is only meaningful together with the [`SymbolTable`] that
/// issued it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SymbolId(u32);

impl SymbolId {
    /// Identifier of `nil`, the first name interned by every table
    pub const NIL: SymbolId = SymbolId(0);

    /// Sequential index of this identifier (0 for `nil`, 1 for the next name, ...)
    pub fn index(self) -> usize {
        self.0 as usize
    }

    fn from_interned(symbol: DefaultSymbol) -> Self {
        // DefaultSymbol is backed by a u32, so the index always fits
        SymbolId(symbol.to_usize() as u32)
    }

    fn to_interned(self) -> Option<DefaultSymbol> {
        DefaultSymbol::try_from_usize(self.index())
    }
}

/// Process- or session-wide table mapping names to [`SymbolId`]s.
#[derive(Debug, Clone)]
pub struct SymbolTable {
    interner: StringInterner<DefaultBackend>,
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

impl SymbolTable {
    /// Create a table holding only `nil`.
    pub fn new() -> Self {
        let mut table = SymbolTable {
            interner: StringInterner::new(),
        };
        let nil = table.intern(NIL_NAME);
        debug_assert_eq!(nil, SymbolId::NIL);
        table
    }

    /// Return the identifier for `name`, assigning the next sequential one if
    /// the name has not been seen before.
    pub fn intern(&mut self, name: &str) -> SymbolId {
        if let Some(existing) = self.lookup(name) {
            return existing;
        }
        let id = SymbolId::from_interned(self.interner.get_or_intern(name));
        trace!(symbol = name, id = id.index(), "interned symbol");
        id
    }

    /// Identifier for `name` if it has already been interned.
    pub fn lookup(&self, name: &str) -> Option<SymbolId> {
        self.interner.get(name).map(SymbolId::from_interned)
    }

    /// Original name of an interned identifier.
    ///
    /// Returns `None` for identifiers this table never issued.
    pub fn name_of(&self, id: SymbolId) -> Option<&str> {
        id.to_interned()
            .and_then(|symbol| self.interner.resolve(symbol))
    }

    /// Name for display purposes, with a visible placeholder for foreign ids
    pub(crate) fn display_name(&self, id: SymbolId) -> &str {
        self.name_of(id).unwrap_or(UNKNOWN_SYMBOL)
    }

    /// Number of interned names (never zero, `nil` is always present)
    pub fn len(&self) -> usize {
        self.interner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.interner.is_empty()
    }
}
