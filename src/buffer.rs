// ImpactWatch — Fixed-capacity sample stream
//
// Entries are kept newest-first: index 0 is the most recent sample. The
// backing store is a ring over a fixed array, so prepend and pop-front never
// move data. Out-of-range reads clamp to the last valid entry instead of
// failing, and inserting into a full stream sheds the oldest entry.

use crate::config::STREAM_CAPACITY;
use crate::events::Sample3;

pub type ScalarStream = BoundedSampleBuffer<f64, STREAM_CAPACITY>;
pub type VectorStream = BoundedSampleBuffer<Sample3, STREAM_CAPACITY>;

#[derive(Debug, Clone)]
pub struct BoundedSampleBuffer<T, const N: usize> {
    data: [T; N],
    head: usize,
    len: usize,
    header: String,
    initialized: bool,
}

impl<T: Copy + Default, const N: usize> BoundedSampleBuffer<T, N> {
    pub fn new() -> Self {
        assert!(N > 0, "stream capacity must be non-zero");
        Self {
            data: [T::default(); N],
            head: 0,
            len: 0,
            header: String::new(),
            initialized: false,
        }
    }

    pub fn with_header(header: impl Into<String>) -> Self {
        let mut stream = Self::new();
        stream.set_header(header);
        stream
    }

    #[inline]
    fn slot(&self, index: usize) -> usize {
        (self.head + index) % N
    }

    /// Insert at index 0. A full stream drops its oldest entry.
    pub fn prepend(&mut self, item: T) {
        self.head = (self.head + N - 1) % N;
        self.data[self.head] = item;
        if self.len < N {
            self.len += 1;
        }
    }

    /// Insert at `index` (clamped to `[0, len]`), shifting later entries
    /// toward the tail. Anything pushed past capacity is dropped.
    pub fn insert(&mut self, item: T, index: usize) {
        let index = index.min(self.len);
        if index == 0 {
            self.prepend(item);
            return;
        }
        if index >= N {
            // Full and appending at the tail: the new item is the overflow.
            return;
        }
        if self.len < N {
            self.len += 1;
        }
        for i in (index + 1..self.len).rev() {
            let from = self.slot(i - 1);
            let to = self.slot(i);
            self.data[to] = self.data[from];
        }
        let at = self.slot(index);
        self.data[at] = item;
    }

    /// Non-destructive read. Out-of-range indices return the last entry;
    /// only an empty stream yields `None`.
    pub fn peek(&self, index: usize) -> Option<T> {
        if self.len == 0 {
            return None;
        }
        Some(self.data[self.slot(index.min(self.len - 1))])
    }

    /// Destructive read. Out-of-range indices pop the last entry.
    pub fn pop(&mut self, index: usize) -> Option<T> {
        if self.len == 0 {
            return None;
        }
        let index = index.min(self.len - 1);
        let item = self.data[self.slot(index)];
        if index == 0 {
            self.head = (self.head + 1) % N;
        } else {
            for i in index..self.len - 1 {
                let from = self.slot(i + 1);
                let to = self.slot(i);
                self.data[to] = self.data[from];
            }
        }
        self.len -= 1;
        Some(item)
    }

    pub fn pop_front(&mut self) -> Option<T> {
        self.pop(0)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub const fn capacity(&self) -> usize {
        N
    }

    pub fn clear(&mut self) {
        self.head = 0;
        self.len = 0;
    }

    /// Newest-first iteration.
    pub fn iter(&self) -> impl Iterator<Item = T> + '_ {
        (0..self.len).map(move |i| self.data[self.slot(i)])
    }

    pub fn set_header(&mut self, header: impl Into<String>) {
        self.header = header.into();
    }

    pub fn header(&self) -> &str {
        &self.header
    }

    pub fn set_initialized(&mut self, initialized: bool) {
        self.initialized = initialized;
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }
}

impl<T: Copy + Default, const N: usize> Default for BoundedSampleBuffer<T, N> {
    fn default() -> Self {
        Self::new()
    }
}
