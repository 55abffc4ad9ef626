//! Store open options.

/// Controls how [`Store::open`](super::Store::open) treats a missing or
/// pre-existing store directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreOptions {
    /// Create the store when the path holds none.
    pub create_if_missing: bool,
    /// Refuse to open a store that already exists.
    pub error_if_exists: bool,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            create_if_missing: false,
            error_if_exists: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_opens_existing_only() {
        let options = StoreOptions::default();
        assert!(!options.create_if_missing);
        assert!(!options.error_if_exists);
    }
}
