//! Mutually exclusive value wrapper.

#![allow(clippy::unwrap_used)] // Tests use unwrap for brevity

use parking_lot::Mutex;
use std::fmt;

/// A value whose reads and writes are strictly serialized.
///
/// Every access takes the same lock, so readers never observe a
/// partially written value and concurrent writers never lose updates.
/// Calling back into the same `ProtectedValue` from inside a `write`
/// closure deadlocks.
pub struct ProtectedValue<T> {
    value: Mutex<T>,
}

impl<T> ProtectedValue<T> {
    pub fn new(value: T) -> Self {
        Self {
            value: Mutex::new(value),
        }
    }

    /// Mutate the value in place.
    pub fn write<F>(&self, mutator: F)
    where
        F: FnOnce(&mut T),
    {
        mutator(&mut self.value.lock());
    }

    /// Mutate the value and return something derived from it.
    pub fn update<R, F>(&self, mutator: F) -> R
    where
        F: FnOnce(&mut T) -> R,
    {
        mutator(&mut self.value.lock())
    }

    /// Inspect the value without cloning it.
    pub fn with<R, F>(&self, reader: F) -> R
    where
        F: FnOnce(&T) -> R,
    {
        reader(&self.value.lock())
    }

    /// Replace the value, returning the previous one.
    pub fn replace(&self, value: T) -> T {
        std::mem::replace(&mut *self.value.lock(), value)
    }

    pub fn into_inner(self) -> T {
        self.value.into_inner()
    }
}

impl<T: Clone> ProtectedValue<T> {
    /// Snapshot of the current value.
    pub fn read(&self) -> T {
        self.value.lock().clone()
    }
}

impl<T: Default> Default for ProtectedValue<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: fmt::Debug> fmt::Debug for ProtectedValue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProtectedValue")
            .field("value", &*self.value.lock())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_no_lost_increments() {
        let counter = Arc::new(ProtectedValue::new(0usize));
        let threads = 16;
        let per_thread = 5_000;

        let handles: Vec<_> = (0..threads)
            .map(|_| {
                let counter = counter.clone();
                thread::spawn(move || {
                    for _ in 0..per_thread {
                        let _ = counter.read();
                        counter.write(|v| *v += 1);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(counter.read(), threads * per_thread);
    }

    #[test]
    fn test_concurrent_overwrites_leave_a_written_value() {
        let value = Arc::new(ProtectedValue::new(String::from("initial")));

        let handles: Vec<_> = (0..100)
            .map(|i| {
                let value = value.clone();
                thread::spawn(move || {
                    let _ = value.read();
                    value.write(|v| *v = i.to_string());
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        let last = value.read();
        assert_ne!(last, "initial");
        assert!(last.parse::<usize>().unwrap() < 100);
    }

    #[test]
    fn test_update_and_replace() {
        let value = ProtectedValue::new(vec![1, 2]);
        let len = value.update(|v| {
            v.push(3);
            v.len()
        });
        assert_eq!(len, 3);
        assert_eq!(value.replace(Vec::new()), vec![1, 2, 3]);
        assert!(value.with(Vec::is_empty));
    }
}
