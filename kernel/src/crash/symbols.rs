//! Symbol Resolution
//!
//! Resolves return addresses to function names for backtraces. The table is
//! populated once from the application image and read-only afterwards.

use alloc::string::String;
use alloc::vec::Vec;

use crate::config::{MAX_ELF_SYMBOLS, MAX_SYMBOL_NAME_LEN};
use crate::loader::elf::Elf64Symbol;

const NAME_CAPACITY: usize = MAX_SYMBOL_NAME_LEN - 1;

/// Inline, fixed-capacity symbol name.
///
/// Longer names are truncated to `MAX_SYMBOL_NAME_LEN - 1` bytes.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct SymbolName {
    len: u8,
    bytes: [u8; NAME_CAPACITY],
}

impl SymbolName {
    /// Empty name
    pub const EMPTY: Self = Self {
        len: 0,
        bytes: [0; NAME_CAPACITY],
    };

    /// Build a name from raw bytes, truncating to capacity.
    pub fn from_bytes(raw: &[u8]) -> Self {
        let len = core::cmp::min(raw.len(), NAME_CAPACITY);
        let mut bytes = [0u8; NAME_CAPACITY];
        bytes[..len].copy_from_slice(&raw[..len]);
        Self {
            len: len as u8,
            bytes,
        }
    }

    /// Stored bytes, without terminator.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..usize::from(self.len)]
    }

    /// Name length in bytes
    pub fn len(&self) -> usize {
        usize::from(self.len)
    }

    /// Is empty
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Name as text, replacing invalid UTF-8.
    pub fn to_string_lossy(&self) -> String {
        String::from_utf8_lossy(self.as_bytes()).into_owned()
    }
}

impl Default for SymbolName {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl core::fmt::Display for SymbolName {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match core::str::from_utf8(self.as_bytes()) {
            Ok(s) => f.write_str(s),
            Err(_) => f.write_str(&self.to_string_lossy()),
        }
    }
}

impl core::fmt::Debug for SymbolName {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{:?}", self.to_string_lossy())
    }
}

/// Resolved function record, parallel to the raw symbol entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FunctionName {
    /// Function name
    pub name: SymbolName,
    /// Start address
    pub addr: u64,
}

/// Function symbol table
///
/// `symbols[i]` and `names[i]` always describe the same function.
#[derive(Debug, Clone)]
pub struct SymbolTable {
    symbols: Vec<Elf64Symbol>,
    names: Vec<FunctionName>,
}

impl SymbolTable {
    /// Create an empty table with room for `MAX_ELF_SYMBOLS` functions.
    pub fn new() -> Self {
        Self {
            symbols: Vec::with_capacity(MAX_ELF_SYMBOLS),
            names: Vec::with_capacity(MAX_ELF_SYMBOLS),
        }
    }

    /// Append a function. Returns `false` once the table is full.
    pub fn push(&mut self, symbol: Elf64Symbol, name: SymbolName) -> bool {
        if self.is_full() {
            return false;
        }
        self.names.push(FunctionName {
            name,
            addr: symbol.st_value,
        });
        self.symbols.push(symbol);
        true
    }

    /// Whether `MAX_ELF_SYMBOLS` functions are stored
    pub fn is_full(&self) -> bool {
        self.symbols.len() >= MAX_ELF_SYMBOLS
    }

    /// Symbol count
    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    /// Is empty
    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// Raw entry at `idx`
    pub fn symbol(&self, idx: usize) -> Option<&Elf64Symbol> {
        self.symbols.get(idx)
    }

    /// Resolved record at `idx`
    pub fn name(&self, idx: usize) -> Option<&FunctionName> {
        self.names.get(idx)
    }

    /// Iterate `(entry, record)` pairs in table order.
    pub fn entries(&self) -> impl Iterator<Item = (&Elf64Symbol, &FunctionName)> {
        self.symbols.iter().zip(self.names.iter())
    }

    /// Find the function an address belongs to.
    ///
    /// Only symbols with a non-zero start at or below `addr` qualify. A
    /// symbol whose `[start, start + size)` range covers `addr` beats any
    /// that does not; within each group the greatest start wins and equal
    /// starts keep the earliest index.
    pub fn resolve(&self, addr: u64) -> Option<usize> {
        let mut covering: Option<(usize, u64)> = None;
        let mut nearest: Option<(usize, u64)> = None;

        for (idx, sym) in self.symbols.iter().enumerate() {
            let start = sym.st_value;
            if start == 0 || start > addr {
                continue;
            }

            if nearest.map_or(true, |(_, best)| start > best) {
                nearest = Some((idx, start));
            }

            let covers = sym.st_size != 0 && addr - start < sym.st_size;
            if covers && covering.map_or(true, |(_, best)| start > best) {
                covering = Some((idx, start));
            }
        }

        covering.or(nearest).map(|(idx, _)| idx)
    }

    /// Resolve straight to the function record.
    pub fn lookup(&self, addr: u64) -> Option<&FunctionName> {
        self.resolve(addr).and_then(|idx| self.name(idx))
    }
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}
