//! Watchlist
//!
//! The set of symbols the relay asks the upstream to stream. Insertion
//! order is preserved and duplicates are ignored, so subscribe directives
//! sent after a reconnect always go out in the same stable order.
//!
//! Reads vastly outnumber writes: the connection manager snapshots the
//! list on every (re)connect, while edits arrive only from a management
//! surface and take effect on the next reconnect.

use parking_lot::RwLock;

/// Ordered, deduplicated set of watched symbols.
#[derive(Debug, Default)]
pub struct Watchlist {
    symbols: RwLock<Vec<String>>,
}

impl Watchlist {
    /// Create a watchlist from an initial symbol list.
    ///
    /// Blank entries are dropped and duplicates keep their first position.
    pub fn new<I, S>(initial: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let list = Self::default();
        for symbol in initial {
            list.add(symbol);
        }
        list
    }

    /// Snapshot of the watched symbols, in insertion order.
    #[must_use]
    pub fn current(&self) -> Vec<String> {
        self.symbols.read().clone()
    }

    /// Add a symbol. Returns `false` if it was blank or already present.
    ///
    /// The upstream subscription picks the symbol up on the next
    /// reconnect; the live stream is not renegotiated.
    pub fn add<S: Into<String>>(&self, symbol: S) -> bool {
        let symbol = symbol.into();
        let trimmed = symbol.trim();
        if trimmed.is_empty() {
            return false;
        }
        let mut symbols = self.symbols.write();
        if symbols.iter().any(|s| s == trimmed) {
            return false;
        }
        symbols.push(trimmed.to_string());
        true
    }

    /// Remove a symbol. Returns `false` if it was not present.
    pub fn remove(&self, symbol: &str) -> bool {
        let mut symbols = self.symbols.write();
        let before = symbols.len();
        symbols.retain(|s| s != symbol);
        symbols.len() != before
    }

    /// Number of watched symbols.
    #[must_use]
    pub fn len(&self) -> usize {
        self.symbols.read().len()
    }

    /// Whether the watchlist is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.symbols.read().is_empty()
    }
}
