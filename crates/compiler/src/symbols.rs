//! Two-level scoped symbol table.
//!
//! The global scope is always active and holds the subroutine bindings plus
//! the top-level program's variables; at most one subroutine scope exists at
//! a time, holding the parameters and locals of the subroutine currently
//! being parsed. Lookups search the subroutine scope first and fall back to
//! the global scope, but the fallback only resolves callables, so a
//! subroutine can never see the top-level variables.
//!
//! Each scope tracks the next free local-variable slot. The global scope
//! starts at offset 1 (slot 0 belongs to `main`'s argument vector); a
//! subroutine scope starts at 0 so its parameters occupy the first slots.

use crate::types::IdProp;

/// Bucket counts for the chained hash table: the largest prime below each
/// power of two. Growth walks this sequence.
const TABLE_SIZES: [usize; 10] = [31, 61, 127, 251, 509, 1021, 2039, 4093, 8191, 16381];

/// Cyclic-shift string mixer. Rotating before folding in each byte spreads
/// anagrams and common prefixes across the table.
fn hash_name(name: &str) -> u32 {
    name.bytes().fold(0u32, |h, b| h.rotate_left(5) ^ u32::from(b))
}

/// A chained hash table from identifier names to their properties.
struct HashTab {
    buckets: Vec<Vec<(String, IdProp)>>,
    len: usize,
    size_index: usize,
}

impl HashTab {
    fn new() -> Self {
        HashTab {
            buckets: (0..TABLE_SIZES[0]).map(|_| Vec::new()).collect(),
            len: 0,
            size_index: 0,
        }
    }

    fn bucket_of(&self, name: &str) -> usize {
        hash_name(name) as usize % self.buckets.len()
    }

    fn find(&self, name: &str) -> Option<&IdProp> {
        self.buckets[self.bucket_of(name)]
            .iter()
            .find(|(bound, _)| bound == name)
            .map(|(_, prop)| prop)
    }

    /// Insert a binding. The caller has already checked for duplicates.
    fn insert(&mut self, name: String, prop: IdProp) {
        if self.len * 4 >= self.buckets.len() * 3 {
            self.grow();
        }
        let bucket = self.bucket_of(&name);
        self.buckets[bucket].push((name, prop));
        self.len += 1;
    }

    fn grow(&mut self) {
        if self.size_index + 1 >= TABLE_SIZES.len() {
            return;
        }
        self.size_index += 1;
        let mut buckets: Vec<Vec<(String, IdProp)>> =
            (0..TABLE_SIZES[self.size_index]).map(|_| Vec::new()).collect();
        for (name, prop) in self.buckets.drain(..).flatten() {
            let bucket = hash_name(&name) as usize % buckets.len();
            buckets[bucket].push((name, prop));
        }
        self.buckets = buckets;
    }
}

/// One level of the symbol table with its local-slot counter.
struct Scope {
    names: HashTab,
    next_offset: u32,
}

impl Scope {
    fn new(first_offset: u32) -> Self {
        Scope {
            names: HashTab::new(),
            next_offset: first_offset,
        }
    }
}

/// The two-level symbol table.
pub struct SymbolTable {
    global: Scope,
    subroutine: Option<Scope>,
}

impl SymbolTable {
    pub fn new() -> Self {
        SymbolTable {
            global: Scope::new(1),
            subroutine: None,
        }
    }

    /// Bind `name` in the global scope and open a fresh subroutine scope
    /// whose offsets start at zero. Returns `false` if the name is already
    /// bound globally.
    pub fn open_subroutine(&mut self, name: &str, prop: IdProp) -> bool {
        if self.global.names.find(name).is_some() {
            return false;
        }
        self.global.names.insert(name.to_string(), prop);
        self.subroutine = Some(Scope::new(0));
        true
    }

    /// Discard the subroutine scope, restoring the global scope as active.
    pub fn close_subroutine(&mut self) {
        self.subroutine = None;
    }

    /// Bind `name` in the active scope. Returns `false` if the name is
    /// already reachable (which makes the definition a duplicate). Variable
    /// bindings advance the active scope's slot counter.
    pub fn insert_name(&mut self, name: &str, prop: IdProp) -> bool {
        if self.find_name(name).is_some() {
            return false;
        }
        let is_variable = prop.typ.is_variable();
        let scope = self.subroutine.as_mut().unwrap_or(&mut self.global);
        scope.names.insert(name.to_string(), prop);
        if is_variable {
            scope.next_offset += 1;
        }
        true
    }

    /// Look up `name`. Inside a subroutine the global scope only resolves
    /// callables; top-level variables stay invisible.
    pub fn find_name(&self, name: &str) -> Option<&IdProp> {
        match &self.subroutine {
            Some(scope) => scope
                .names
                .find(name)
                .or_else(|| self.global.names.find(name).filter(|p| p.typ.is_callable())),
            None => self.global.names.find(name),
        }
    }

    /// The next free slot of the active scope; after a body has been parsed
    /// this is the frame's local-variable width.
    pub fn get_variables_width(&self) -> u32 {
        match &self.subroutine {
            Some(scope) => scope.next_offset,
            None => self.global.next_offset,
        }
    }
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}
