//! String interning for snapshot labels.

use std::collections::HashMap;

/// Assigns small, stable ids to label strings.
///
/// Ids are dense (`0..len`) and stay valid until [`StringInterner::clear`].
#[derive(Debug, Clone, Default)]
pub struct StringInterner {
    ids: HashMap<String, u32>,
    strings: Vec<String>,
}

impl StringInterner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Id for `s`, assigning the next free one on first sight.
    pub fn intern(&mut self, s: &str) -> u32 {
        if let Some(&id) = self.ids.get(s) {
            return id;
        }
        let id = self.strings.len() as u32;
        self.ids.insert(s.to_owned(), id);
        self.strings.push(s.to_owned());
        id
    }

    /// Existing id for `s`, without assigning one.
    pub fn get(&self, s: &str) -> Option<u32> {
        self.ids.get(s).copied()
    }

    /// String for `id`.
    pub fn resolve(&self, id: u32) -> Option<&str> {
        self.strings.get(id as usize).map(String::as_str)
    }

    /// The id → string table, indexed by id.
    pub fn strings(&self) -> &[String] {
        &self.strings
    }

    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }

    pub fn clear(&mut self) {
        self.ids.clear();
        self.strings.clear();
    }
}
