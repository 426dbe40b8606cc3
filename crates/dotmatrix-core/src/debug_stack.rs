//! Shadow stack used to catch stack corruption in tests.
//!
//! Every value the CPU pushes is mirrored here; every pop must return the
//! most recently mirrored value. A mismatch means something wrote over the
//! stack between the push and the pop, or the program popped more than it
//! pushed.

use log::error;

#[derive(Debug, Default)]
pub struct ShadowStack {
    values: Vec<u16>,
    mismatches: usize,
}

impl ShadowStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, val: u16) {
        self.values.push(val);
    }

    /// Check `val` against the mirrored top. Returns false on mismatch.
    pub fn pop(&mut self, val: u16) -> bool {
        match self.values.pop() {
            Some(expected) if expected == val => true,
            Some(expected) => {
                error!("stack corruption: popped {val:04X}, expected {expected:04X}");
                self.mismatches += 1;
                false
            }
            None => {
                error!("stack underflow: popped {val:04X} with nothing pushed");
                self.mismatches += 1;
                false
            }
        }
    }

    pub fn depth(&self) -> usize {
        self.values.len()
    }

    pub fn mismatches(&self) -> usize {
        self.mismatches
    }
}
