//! Destination family assignment.

/// Cycling index assignor.
///
/// Walks the indexes `0..length` forever, advancing before it yields. The
/// first index out is therefore `1 % length`, and `0` comes up only after
/// the first wrap. Each source partition owns one assignor, so partitions
/// with identical contents produce identical assignment sequences.
#[derive(Debug)]
pub struct RoundRobin {
    length: u32,
    position: u32,
}

impl RoundRobin {
    /// New assignor cycling over `length` families.
    ///
    /// # Panics
    ///
    /// Panics when `length` is zero.
    pub fn new(length: u32) -> Self {
        assert!(length > 0, "assignor needs at least one family");
        Self {
            length,
            position: 0,
        }
    }

    /// Advances the cycle and returns the new index.
    pub fn next_index(&mut self) -> u32 {
        self.position = (self.position + 1) % self.length;
        self.position
    }

    /// Number of families the cycle walks.
    pub fn length(&self) -> u32 {
        self.length
    }
}
