use std::collections::BTreeMap;

/// Something occupying a contiguous range of addresses in a loaded binary.
pub trait AddressRange {
    /// Lowest address of the range (inclusive).
    fn low(&self) -> u64;

    /// Highest address of the range (exclusive).
    fn high(&self) -> u64;

    /// Returns whether `other` lies entirely within this range.
    fn contains_range(&self, other: &impl AddressRange) -> bool {
        self.low() <= other.low() && other.high() <= self.high()
    }

    /// Returns whether `addr` lies within this range.
    fn contains_addr(&self, addr: u64) -> bool {
        self.low() <= addr && addr < self.high()
    }

    /// Size of the range in bytes.
    fn size(&self) -> u64 {
        self.high().saturating_sub(self.low())
    }
}

/// Function compiled into a binary.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompiledFunction {
    /// Name of the function.
    pub name: String,

    /// Address of the first instruction.
    pub low_pc: u64,

    /// Address right after the last instruction.
    pub high_pc: u64,

    /// Source line the function is declared on.
    pub decl_line: u64,
}

impl CompiledFunction {
    /// Entry address of the function.
    pub const fn address(&self) -> u64 {
        self.low_pc
    }
}

impl AddressRange for CompiledFunction {
    fn low(&self) -> u64 {
        self.low_pc
    }

    fn high(&self) -> u64 {
        self.high_pc
    }
}

/// Source file (compilation unit) compiled into a binary.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompiledFile {
    /// Name of the source file, as recorded by the compiler.
    pub name: String,

    /// Lowest address of code generated from this file.
    pub low_pc: u64,

    /// Address right after the code generated from this file.
    pub high_pc: u64,

    /// Functions defined in this file, by name.
    pub functions: BTreeMap<String, CompiledFunction>,
}

impl CompiledFile {
    /// Creates a file without functions.
    pub fn new(name: impl Into<String>, low_pc: u64, high_pc: u64) -> Self {
        Self {
            name: name.into(),
            low_pc,
            high_pc,
            functions: BTreeMap::new(),
        }
    }

    /// Returns the function with the given name.
    pub fn function(&self, name: &str) -> Option<&CompiledFunction> {
        self.functions.get(name)
    }

    /// Returns the functions whose declaration starts on `line`, lowest
    /// address first.
    pub fn functions_at_line(&self, line: u64) -> Vec<&CompiledFunction> {
        let mut funcs = self
            .functions
            .values()
            .filter(|f| f.decl_line == line)
            .collect::<Vec<_>>();

        funcs.sort_by_key(|f| f.low_pc);
        funcs
    }
}

impl AddressRange for CompiledFile {
    fn low(&self) -> u64 {
        self.low_pc
    }

    fn high(&self) -> u64 {
        self.high_pc
    }
}

/// Symbol table of a binary: source files and the functions they define.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SymbolTable {
    files: BTreeMap<String, CompiledFile>,
}

impl SymbolTable {
    /// Creates an empty symbol table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns whether the table holds no file at all.
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Iterates over the files of the table, sorted by name.
    pub fn files(&self) -> impl Iterator<Item = &CompiledFile> {
        self.files.values()
    }

    /// Adds a file to the table, replacing any file with the same name.
    ///
    /// Files with an empty name are ignored.
    pub fn insert_file(&mut self, file: CompiledFile) {
        if file.name.is_empty() {
            return;
        }

        self.files.insert(file.name.clone(), file);
    }

    /// Assigns a function to the file whose address range contains it.
    ///
    /// When several files match, the narrowest one wins. Returns `false`
    /// (and drops the function) when no file contains it.
    pub fn insert_function(&mut self, func: CompiledFunction) -> bool {
        let owner = self
            .files
            .values_mut()
            .filter(|file| file.contains_range(&func))
            .min_by_key(|file| file.size());

        match owner {
            Some(file) => {
                file.functions.insert(func.name.clone(), func);
                true
            }
            None => {
                tracing::trace!(
                    function = func.name,
                    addr = format_args!("{:#x}", func.low_pc),
                    "function outside of any file"
                );
                false
            }
        }
    }

    /// Looks up a file by name.
    ///
    /// The exact name is tried first. Otherwise `name` may be the trailing
    /// path components of a single file (e.g. `foo.c` for `src/foo.c`).
    pub fn file(&self, name: &str) -> Option<&CompiledFile> {
        if let Some(file) = self.files.get(name) {
            return Some(file);
        }

        let suffix = format!("/{}", name.trim_start_matches('/'));

        let mut candidates = self.files.values().filter(|f| f.name.ends_with(&suffix));

        match (candidates.next(), candidates.next()) {
            (Some(file), None) => Some(file),
            _ => None,
        }
    }

    /// Returns the function containing `addr`, with its file.
    pub fn function_at(&self, addr: u64) -> Option<(&CompiledFile, &CompiledFunction)> {
        self.files
            .values()
            .filter(|file| file.contains_addr(addr))
            .find_map(|file| {
                file.functions
                    .values()
                    .find(|f| f.contains_addr(addr))
                    .map(|f| (file, f))
            })
    }
}
