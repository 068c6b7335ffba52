use std::{collections::HashMap, fmt};

use crate::codegen::vm::Segment;

/// Storage classes of a table. Each scope admits exactly two of them.
pub trait StorageClass: Copy + Eq + fmt::Debug {
    /// Position of this storage class in the table's counter array.
    fn slot(self) -> usize;

    /// The memory segment symbols of this storage class live in.
    fn segment(self) -> Segment;
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ClassStorage {
    Static,
    Field,
}

impl StorageClass for ClassStorage {
    fn slot(self) -> usize {
        match self {
            ClassStorage::Static => 0,
            ClassStorage::Field => 1,
        }
    }

    fn segment(self) -> Segment {
        match self {
            ClassStorage::Static => Segment::Static,
            ClassStorage::Field => Segment::This,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum SubroutineStorage {
    Argument,
    Local,
}

impl StorageClass for SubroutineStorage {
    fn slot(self) -> usize {
        match self {
            SubroutineStorage::Argument => 0,
            SubroutineStorage::Local => 1,
        }
    }

    fn segment(self) -> Segment {
        match self {
            SubroutineStorage::Argument => Segment::Argument,
            SubroutineStorage::Local => Segment::Local,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Symbol<'src, S> {
    pub name: &'src str,
    /// Declared type, either a primitive (`int`, `char`, `boolean`) or a class
    /// name.
    pub ty: &'src str,
    pub storage: S,
    /// Position among the symbols of the same storage class in the table.
    pub index: u16,
}

impl<S: StorageClass> Symbol<'_, S> {
    pub fn segment(&self) -> Segment {
        self.storage.segment()
    }
}

/// Number of symbols a single storage class of a table can hold.
pub const MAX_SYMBOLS: u16 = u16::MAX;

pub struct SymbolTable<'src, S> {
    map: HashMap<&'src str, Symbol<'src, S>>,
    counts: [u16; 2],
}

/// Statics and fields. Lives for the compilation of one class.
pub type ClassTable<'src> = SymbolTable<'src, ClassStorage>;

/// Arguments and locals. Reset at every subroutine declaration.
pub type SubroutineTable<'src> = SymbolTable<'src, SubroutineStorage>;

impl<'src, S: StorageClass> SymbolTable<'src, S> {
    pub fn with_capacity(capacity: usize) -> Self {
        SymbolTable {
            map: HashMap::with_capacity(capacity),
            counts: [0; 2],
        }
    }

    /// Defines a symbol with the next ordinal of its storage class.
    ///
    /// Redefining a name silently replaces the previous symbol. The ordinal
    /// counter still advances. Returns `None`, leaving the table untouched, once
    /// the storage class holds [`MAX_SYMBOLS`] symbols.
    pub fn define(
        &mut self,
        name: &'src str,
        ty: &'src str,
        storage: S,
    ) -> Option<Symbol<'src, S>> {
        let count = &mut self.counts[storage.slot()];
        let symbol = Symbol {
            name,
            ty,
            storage,
            index: *count,
        };
        *count = count.checked_add(1)?;
        self.map.insert(name, symbol);
        Some(symbol)
    }

    pub fn lookup(&self, name: &str) -> Option<Symbol<'src, S>> {
        self.map.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.map.contains_key(name)
    }

    /// Number of symbols defined so far with the given storage class.
    pub fn count(&self, storage: S) -> u16 {
        self.counts[storage.slot()]
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Forgets every symbol and restarts all ordinals from zero.
    pub fn reset(&mut self) {
        self.map.clear();
        self.counts = [0; 2];
    }
}

impl ClassTable<'_> {
    /// Number of words an instance of the class occupies.
    pub fn field_count(&self) -> u16 {
        self.count(ClassStorage::Field)
    }
}

impl<S: StorageClass> Default for SymbolTable<'_, S> {
    fn default() -> Self {
        Self::with_capacity(16)
    }
}

impl<S: StorageClass> fmt::Debug for SymbolTable<'_, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut symbols: Vec<_> = self.map.values().collect();
        symbols.sort_by_key(|s| (s.storage.slot(), s.index));
        f.debug_list().entries(symbols).finish()
    }
}

/// A name resolved against both scopes.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Resolved<'src> {
    pub ty: &'src str,
    pub segment: Segment,
    pub index: u16,
}

impl<'src, S: StorageClass> From<Symbol<'src, S>> for Resolved<'src> {
    fn from(symbol: Symbol<'src, S>) -> Self {
        Resolved {
            ty: symbol.ty,
            segment: symbol.segment(),
            index: symbol.index,
        }
    }
}

/// Looks `name` up in the subroutine scope first, then in the class scope.
pub fn resolve<'src>(
    subroutine: &SubroutineTable<'src>,
    class: &ClassTable<'src>,
    name: &str,
) -> Option<Resolved<'src>> {
    subroutine
        .lookup(name)
        .map(Resolved::from)
        .or_else(|| class.lookup(name).map(Resolved::from))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordinals_are_contiguous_per_storage_class() {
        let mut class = ClassTable::default();
        let names = ["a", "b", "c", "d", "e"];
        for name in names {
            class.define(name, "int", ClassStorage::Field);
        }
        class.define("s", "int", ClassStorage::Static);
        class.define("t", "int", ClassStorage::Static);

        for (i, name) in names.iter().enumerate() {
            let symbol = class.lookup(name).unwrap();
            assert_eq!(usize::from(symbol.index), i);
            assert_eq!(symbol.storage, ClassStorage::Field);
        }
        assert_eq!(class.lookup("s").unwrap().index, 0);
        assert_eq!(class.lookup("t").unwrap().index, 1);
        assert_eq!(class.field_count(), 5);
        assert_eq!(class.count(ClassStorage::Static), 2);
    }

    #[test]
    fn interleaved_kinds_count_independently() {
        let mut sub = SubroutineTable::default();
        let x = sub.define("x", "int", SubroutineStorage::Argument).unwrap();
        let i = sub.define("i", "int", SubroutineStorage::Local).unwrap();
        let y = sub.define("y", "Array", SubroutineStorage::Argument).unwrap();
        let j = sub.define("j", "char", SubroutineStorage::Local).unwrap();

        assert_eq!((x.index, y.index), (0, 1));
        assert_eq!((i.index, j.index), (0, 1));
        assert_eq!(y.ty, "Array");
        assert_eq!(y.segment(), Segment::Argument);
        assert_eq!(j.segment(), Segment::Local);
    }

    #[test]
    fn lookup_and_contains() {
        let mut class = ClassTable::default();
        assert!(class.is_empty());
        assert!(!class.contains("x"));
        assert_eq!(class.lookup("x"), None);

        class.define("x", "int", ClassStorage::Static);
        assert!(class.contains("x"));
        assert_eq!(class.lookup("x").unwrap().segment(), Segment::Static);
        assert_eq!(class.len(), 1);
    }

    #[test]
    fn redefinition_overwrites_silently() {
        let mut sub = SubroutineTable::default();
        sub.define("x", "int", SubroutineStorage::Local);
        sub.define("x", "boolean", SubroutineStorage::Local);

        let x = sub.lookup("x").unwrap();
        assert_eq!(x.ty, "boolean");
        assert_eq!(x.index, 1);
        assert_eq!(sub.len(), 1);
    }

    #[test]
    fn reset_restarts_ordinals() {
        let mut sub = SubroutineTable::default();
        sub.define("a", "int", SubroutineStorage::Argument);
        sub.define("b", "int", SubroutineStorage::Argument);
        sub.reset();

        assert!(sub.is_empty());
        assert_eq!(sub.count(SubroutineStorage::Argument), 0);
        let c = sub.define("c", "int", SubroutineStorage::Argument).unwrap();
        assert_eq!(c.index, 0);
    }

    #[test]
    fn ordinals_are_bounded() {
        let mut sub = SubroutineTable::default();
        for _ in 0..MAX_SYMBOLS {
            assert!(sub.define("v", "int", SubroutineStorage::Local).is_some());
        }
        assert_eq!(sub.count(SubroutineStorage::Local), MAX_SYMBOLS);
        assert_eq!(sub.lookup("v").unwrap().index, MAX_SYMBOLS - 1);

        assert_eq!(sub.define("w", "int", SubroutineStorage::Local), None);
        assert!(!sub.contains("w"));
        // Other storage classes are counted on their own.
        assert!(sub.define("w", "int", SubroutineStorage::Argument).is_some());
    }

    #[test]
    fn subroutine_scope_shadows_class_scope() {
        let mut class = ClassTable::default();
        let mut sub = SubroutineTable::default();
        class.define("size", "int", ClassStorage::Field);
        class.define("total", "int", ClassStorage::Static);
        sub.define("size", "char", SubroutineStorage::Local);

        assert_eq!(
            resolve(&sub, &class, "size"),
            Some(Resolved {
                ty: "char",
                segment: Segment::Local,
                index: 0,
            })
        );
        assert_eq!(
            resolve(&sub, &class, "total"),
            Some(Resolved {
                ty: "int",
                segment: Segment::Static,
                index: 0,
            })
        );
        assert_eq!(resolve(&sub, &class, "missing"), None);
    }
}
