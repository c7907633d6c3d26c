use rustc_hash::FxHashMap;

/// Interned identifier for fast comparison between AST nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NameId(pub u32);

/// A simple string interner shared by the front end and the C backend.
///
/// The backend only ever borrows it immutably: `resolve` turns an id back
/// into its text, and `get` looks up an already-interned name. A name that
/// was never interned cannot appear in the AST either, so `get` returning
/// `None` means "this package never mentions that name".
pub struct Interner {
    map: FxHashMap<String, NameId>,
    names: Vec<String>,
}

impl Interner {
    pub fn new() -> Self {
        Self {
            map: FxHashMap::default(),
            names: Vec::new(),
        }
    }

    /// Intern a string, returning its unique ID.
    pub fn intern(&mut self, s: &str) -> NameId {
        if let Some(&id) = self.map.get(s) {
            return id;
        }
        let id = NameId(self.names.len() as u32);
        self.names.push(s.to_string());
        self.map.insert(s.to_string(), id);
        id
    }

    /// Look up the string for a given ID.
    pub fn resolve(&self, id: NameId) -> &str {
        &self.names[id.0 as usize]
    }

    /// Look up the ID for a string without interning it.
    pub fn get(&self, s: &str) -> Option<NameId> {
        self.map.get(s).copied()
    }
}

impl Default for Interner {
    fn default() -> Self {
        Self::new()
    }
}
