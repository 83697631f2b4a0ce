use tokio::sync::watch;

use crate::models::symbol::Symbol;

/// The set of symbols the user is interested in.
///
/// Source of truth for what the live feeds subscribe to. Every mutation is
/// published on a `watch` channel, so a feed always reads the *current* set
/// when it (re)subscribes instead of a list captured at connect time.
///
/// Consumers look symbols up by value, never by index: a full refresh from
/// the server may reorder the list.
pub struct SymbolRegistry {
    symbols: Vec<Symbol>,
    publisher: watch::Sender<Vec<Symbol>>,
}

impl SymbolRegistry {
    pub fn new() -> Self {
        let (publisher, _) = watch::channel(Vec::new());
        Self {
            symbols: Vec::new(),
            publisher,
        }
    }

    /// Append a symbol. Idempotent: returns `false` and publishes nothing
    /// if it is already present.
    pub fn add(&mut self, symbol: Symbol) -> bool {
        if self.contains(&symbol) {
            return false;
        }
        self.symbols.push(symbol);
        self.publish();
        true
    }

    /// Remove a symbol. Returns `false` if it was not present.
    pub fn remove(&mut self, symbol: &Symbol) -> bool {
        let before = self.symbols.len();
        self.symbols.retain(|s| s != symbol);
        if self.symbols.len() == before {
            return false;
        }
        self.publish();
        true
    }

    /// Replace the whole set (e.g. with the server's persisted interest
    /// list). Duplicates are dropped, first occurrence wins. Returns `true`
    /// if the set actually changed.
    pub fn replace_all(&mut self, symbols: impl IntoIterator<Item = Symbol>) -> bool {
        let mut next: Vec<Symbol> = Vec::new();
        for symbol in symbols {
            if !next.contains(&symbol) {
                next.push(symbol);
            }
        }
        if next == self.symbols {
            return false;
        }
        self.symbols = next;
        self.publish();
        true
    }

    #[must_use]
    pub fn symbols(&self) -> &[Symbol] {
        &self.symbols
    }

    #[must_use]
    pub fn contains(&self, symbol: &Symbol) -> bool {
        self.symbols.contains(symbol)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// A receiver that always holds the current symbol set.
    pub fn subscribe(&self) -> watch::Receiver<Vec<Symbol>> {
        self.publisher.subscribe()
    }

    fn publish(&self) {
        // send_replace stores the value even with no live receivers.
        self.publisher.send_replace(self.symbols.clone());
    }
}

impl Default for SymbolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SymbolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SymbolRegistry")
            .field("symbols", &self.symbols)
            .finish()
    }
}
