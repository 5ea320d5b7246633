use std::sync::PoisonError;

use crate::sync::{self, Mutex};
use crate::types::Address;

/// A memory location whose reads and writes go through a [Detector](crate::Detector).
///
/// Each read or write is individually atomic, so an unprotected read-modify-write sequence still
/// loses updates the way the equivalent plain memory accesses would. The location is identified by
/// its own address, which stays stable as long as the cell is not moved (for example while it is
/// borrowed or behind an `Arc`).
#[derive(Debug)]
pub struct Monitored<T> {
    value: Mutex<T>,
}

impl<T: Copy> Monitored<T> {
    pub fn new(value: T) -> Self {
        Self {
            value: Mutex::new(value),
        }
    }

    pub fn address(&self) -> Address {
        self as *const Self as Address
    }

    pub fn into_inner(self) -> T {
        self.value
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn load(&self) -> T {
        *sync::lock(&self.value)
    }

    pub(crate) fn store(&self, value: T) {
        *sync::lock(&self.value) = value;
    }
}
