/// String Interner for categorical columns
///
/// Student datasets repeat the same handful of school names, teacher
/// identifiers and grades across thousands of rows. The interner stores each
/// distinct string once and hands out integer IDs, so string columns hold
/// `StringId`s and categorical comparisons become integer comparisons.
///
/// The dataset is immutable after load, so IDs are never released or reused.
/// The interner keeps an occurrence count per ID instead, which answers
/// "how many rows carry this value" without scanning.
///
/// # Examples
///
/// ```
/// use mapscope::StringInterner;
///
/// let mut interner = StringInterner::new();
///
/// let a = interner.intern("Lincoln Elementary");
/// let b = interner.intern("Roosevelt Middle");
/// let c = interner.intern("Lincoln Elementary");
///
/// assert_eq!(a, c);
/// assert_ne!(a, b);
/// assert_eq!(interner.resolve(a), Some("Lincoln Elementary"));
/// assert_eq!(interner.lookup("Roosevelt Middle"), Some(b));
/// ```

use std::collections::HashMap;

/// Interned string ID type
pub type StringId = u32;

#[derive(Debug, Clone, Default)]
pub struct StringInterner {
    string_to_id: HashMap<String, StringId>,
    /// Stores strings by ID (index = ID)
    id_to_string: Vec<String>,
    /// Number of times each string was interned
    occurrences: Vec<u32>,
}

impl StringInterner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern a string, returning its ID.
    /// Repeated strings return the existing ID and bump its occurrence count.
    pub fn intern(&mut self, s: &str) -> StringId {
        if let Some(&id) = self.string_to_id.get(s) {
            self.occurrences[id as usize] += 1;
            return id;
        }

        let id = self.id_to_string.len() as StringId;
        self.id_to_string.push(s.to_string());
        self.occurrences.push(1);
        self.string_to_id.insert(s.to_string(), id);
        id
    }

    /// Find the ID of an already-interned string without interning it.
    pub fn lookup(&self, s: &str) -> Option<StringId> {
        self.string_to_id.get(s).copied()
    }

    pub fn resolve(&self, id: StringId) -> Option<&str> {
        self.id_to_string.get(id as usize).map(|s| s.as_str())
    }

    pub fn occurrences(&self, id: StringId) -> u32 {
        self.occurrences.get(id as usize).copied().unwrap_or(0)
    }

    /// Number of distinct strings
    pub fn len(&self) -> usize {
        self.id_to_string.len()
    }

    pub fn is_empty(&self) -> bool {
        self.id_to_string.is_empty()
    }

    /// Approximate memory used by the interned strings and lookup tables
    pub fn memory_usage(&self) -> usize {
        let string_bytes: usize = self
            .id_to_string
            .iter()
            .map(|s| s.len() + std::mem::size_of::<String>())
            .sum();

        let map_overhead = self.string_to_id.capacity()
            * (std::mem::size_of::<String>() + std::mem::size_of::<StringId>());

        string_bytes + map_overhead + self.occurrences.capacity() * std::mem::size_of::<u32>()
    }

    pub fn stats(&self) -> InternerStats {
        InternerStats {
            unique_strings: self.len(),
            total_references: self.occurrences.iter().map(|&n| n as u64).sum(),
            memory_bytes: self.memory_usage(),
        }
    }
}

/// Statistics about the string interner
#[derive(Debug, Clone, PartialEq)]
pub struct InternerStats {
    pub unique_strings: usize,
    /// Total number of interned cells across all string columns
    pub total_references: u64,
    /// Approximate memory usage in bytes
    pub memory_bytes: usize,
}
