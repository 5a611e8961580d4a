//! VM strings and interning
//!
//! [`VmString`] carries its grapheme storage together with a hash computed
//! once at construction, so every table that keys on strings reads a cached
//! hash rather than re-hashing. Equality is length-first, then grapheme by
//! grapheme.
//!
//! [`StringHeap`] is the interner: a list of shared strings plus an
//! [`IndexHashTable`] mapping content back to list position, so interning
//! the same content twice yields the same id.

use std::fmt;
use std::hash::Hasher;
use std::rc::Rc;

use crate::hash::IndexHashTable;

/// An immutable VM string with a cached hash code
pub struct VmString {
    graphemes: Box<[char]>,
    hash: u64,
}

impl VmString {
    /// Create a string, computing and caching its hash
    pub fn new(s: &str) -> Self {
        let mut hasher = rustc_hash::FxHasher::default();
        hasher.write(s.as_bytes());
        Self {
            graphemes: s.chars().collect(),
            hash: hasher.finish(),
        }
    }

    /// Number of graphemes
    pub fn grapheme_count(&self) -> usize {
        self.graphemes.len()
    }

    /// The cached hash code
    #[inline]
    pub fn hash_code(&self) -> u64 {
        self.hash
    }

    /// Content equality: length first, then grapheme by grapheme
    pub fn equals(&self, other: &VmString) -> bool {
        if self.graphemes.len() != other.graphemes.len() {
            return false;
        }
        self.graphemes
            .iter()
            .zip(other.graphemes.iter())
            .all(|(a, b)| a == b)
    }
}

impl fmt::Display for VmString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for g in self.graphemes.iter() {
            write!(f, "{}", g)?;
        }
        Ok(())
    }
}

impl fmt::Debug for VmString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VmString({:?})", self.to_string())
    }
}

/// A string id: the position of an interned string in the heap's list
pub type StringId = u32;

/// The string interner
#[derive(Default)]
pub struct StringHeap {
    list: Vec<Rc<VmString>>,
    index: IndexHashTable,
}

impl StringHeap {
    /// Create an empty string heap
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern a string, returning its id; the same content always yields
    /// the same id
    pub fn intern(&mut self, s: &str) -> StringId {
        let candidate = VmString::new(s);
        if let Some(id) = self.index.fetch(&self.list, &candidate) {
            return id;
        }
        let id = self.list.len() as StringId;
        self.list.push(Rc::new(candidate));
        self.index.insert(&self.list, id);
        id
    }

    /// Look up a string's id without interning it
    pub fn lookup(&self, s: &str) -> Option<StringId> {
        self.index.fetch(&self.list, &VmString::new(s))
    }

    /// The interned string for an id
    pub fn get(&self, id: StringId) -> &Rc<VmString> {
        &self.list[id as usize]
    }

    /// The interned list, for table operations that need it
    pub fn list(&self) -> &[Rc<VmString>] {
        &self.list
    }

    /// Number of interned strings
    pub fn len(&self) -> usize {
        self.list.len()
    }

    /// Whether nothing has been interned
    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intern_returns_same_id() {
        let mut heap = StringHeap::new();
        let a = heap.intern("invoke");
        let b = heap.intern("invoke");
        assert_eq!(a, b);
        assert_eq!(heap.len(), 1);
    }

    #[test]
    fn test_different_strings_different_ids() {
        let mut heap = StringHeap::new();
        let a = heap.intern("push");
        let b = heap.intern("pop");
        assert_ne!(a, b);
    }

    #[test]
    fn test_lookup_without_interning() {
        let mut heap = StringHeap::new();
        heap.intern("present");
        assert!(heap.lookup("present").is_some());
        assert!(heap.lookup("absent").is_none());
        assert_eq!(heap.len(), 1);
    }

    #[test]
    fn test_equality_is_content_based() {
        let a = VmString::new("naïve");
        let b = VmString::new("naïve");
        let c = VmString::new("naive");
        assert!(a.equals(&b));
        assert!(!a.equals(&c));
        assert_eq!(a.grapheme_count(), 5);
    }

    #[test]
    fn test_display_round_trips() {
        let s = VmString::new("hello");
        assert_eq!(s.to_string(), "hello");
    }

    #[test]
    fn test_many_interned_strings() {
        let mut heap = StringHeap::new();
        let ids: Vec<StringId> = (0..500).map(|i| heap.intern(&format!("s{}", i))).collect();
        for (i, id) in ids.iter().enumerate() {
            assert_eq!(heap.get(*id).to_string(), format!("s{}", i));
            assert_eq!(heap.lookup(&format!("s{}", i)), Some(*id));
        }
    }
}
