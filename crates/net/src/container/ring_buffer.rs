use std::fmt;
use std::iter::{Chain, FusedIterator};
use std::ops::{Index, IndexMut};
use std::slice;

pub const DEFAULT_CAPACITY: usize = 1;

/// Stable handle to a position inside a [`RingBuffer`].
///
/// A cursor stores an absolute element position together with the storage
/// generation it was taken from. Front evictions advance the buffer's head
/// without touching the generation, so cursors survive rotation; anything
/// that moves surviving elements (reallocation, middle erase, `push_front`,
/// truncation) bumps the generation and invalidates every older cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Cursor {
    generation: u64,
    position: u64,
}

impl Cursor {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn offset(self, count: usize) -> Self {
        Self {
            generation: self.generation,
            position: self.position + count as u64,
        }
    }
}

/// Fixed-capacity circular container.
///
/// Storage is a single allocation of `capacity + 1` slots. Logical index 0
/// lives at physical slot `offset`; the write cursor is `offset + len`
/// wrapped around the slot count.
pub struct RingBuffer<T> {
    slots: Vec<T>,
    offset: usize,
    size: usize,
    head: u64,
    generation: u64,
}

impl<T: Default> Default for RingBuffer<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Default> RingBuffer<T> {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: empty_slots(capacity),
            offset: 0,
            size: 0,
            head: 0,
            generation: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len().saturating_sub(1)
    }

    pub fn len(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    pub fn is_full(&self) -> bool {
        self.size == self.capacity()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    #[inline]
    fn wrap(&self, index: usize) -> usize {
        let slot_count = self.slots.len();
        if index < slot_count {
            index
        } else {
            index - slot_count
        }
    }

    #[inline]
    fn physical(&self, index: usize) -> usize {
        self.wrap(self.offset + index)
    }

    fn ensure_storage(&mut self) {
        if self.capacity() == 0 {
            self.relinearize(DEFAULT_CAPACITY);
        }
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        if index < self.size {
            Some(&self.slots[self.physical(index)])
        } else {
            None
        }
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        if index < self.size {
            let slot = self.physical(index);
            Some(&mut self.slots[slot])
        } else {
            None
        }
    }

    pub fn front(&self) -> Option<&T> {
        self.get(0)
    }

    pub fn back(&self) -> Option<&T> {
        self.size.checked_sub(1).and_then(|last| self.get(last))
    }

    pub fn push_back(&mut self, value: T) {
        self.ensure_storage();
        if self.is_full() {
            self.pop_front();
        }
        let slot = self.physical(self.size);
        self.slots[slot] = value;
        self.size += 1;
    }

    pub fn push_front(&mut self, value: T) {
        self.ensure_storage();
        if self.is_full() {
            self.pop_back();
        }
        self.offset = if self.offset == 0 {
            self.slots.len() - 1
        } else {
            self.offset - 1
        };
        self.slots[self.offset] = value;
        self.size += 1;
        self.generation += 1;
    }

    pub fn pop_front(&mut self) -> Option<T> {
        if self.size == 0 {
            return None;
        }
        let value = std::mem::take(&mut self.slots[self.offset]);
        self.offset = self.wrap(self.offset + 1);
        self.size -= 1;
        self.head += 1;
        Some(value)
    }

    pub fn pop_back(&mut self) -> Option<T> {
        if self.size == 0 {
            return None;
        }
        let slot = self.physical(self.size - 1);
        let value = std::mem::take(&mut self.slots[slot]);
        self.size -= 1;
        self.generation += 1;
        Some(value)
    }

    /// Pops the front element, or yields `T::default()` when empty.
    pub fn read(&mut self) -> T {
        self.pop_front().unwrap_or_default()
    }

    /// Pops up to `count` elements from the front, oldest first.
    pub fn read_buffer(&mut self, count: usize) -> Vec<T> {
        let count = count.min(self.size);
        let mut out = Vec::with_capacity(count);
        for _ in 0..count {
            if let Some(value) = self.pop_front() {
                out.push(value);
            }
        }
        out
    }

    fn discard_front(&mut self, count: usize) {
        for _ in 0..count.min(self.size) {
            self.pop_front();
        }
    }

    pub fn clear(&mut self) {
        self.discard_front(self.size);
    }

    /// Removes the logical range `[from, to)`.
    ///
    /// When `from > to` the range wraps past the back: `[from, len)` and then
    /// `[0, to)` are removed. Out-of-range bounds leave the buffer untouched.
    /// Returns the number of removed elements.
    pub fn erase(&mut self, from: usize, to: usize) -> usize {
        if from >= self.size || to > self.size || from == to {
            return 0;
        }
        if from < to {
            self.erase_span(from, to - from)
        } else {
            let tail = self.erase_span(from, self.size - from);
            tail + self.erase_span(0, to)
        }
    }

    pub fn erase_count(&mut self, from: usize, count: usize) -> usize {
        if from >= self.size {
            return 0;
        }
        let count = count.min(self.size - from);
        self.erase_span(from, count)
    }

    fn erase_span(&mut self, at: usize, count: usize) -> usize {
        if count == 0 {
            return 0;
        }
        if at == 0 {
            self.discard_front(count);
            return count;
        }

        for index in at..at + count {
            let slot = self.physical(index);
            self.slots[slot] = T::default();
        }

        let leading = at;
        let trailing = self.size - at - count;
        if leading <= trailing {
            for index in (0..leading).rev() {
                let from = self.physical(index);
                let to = self.physical(index + count);
                self.slots[to] = std::mem::take(&mut self.slots[from]);
            }
            self.offset = self.wrap(self.offset + count);
        } else {
            for index in at + count..self.size {
                let from = self.physical(index);
                let to = self.physical(index - count);
                self.slots[to] = std::mem::take(&mut self.slots[from]);
            }
        }

        self.size -= count;
        self.generation += 1;
        count
    }

    pub fn truncate(&mut self, len: usize) {
        while self.size > len {
            self.pop_back();
        }
    }

    /// Grows the capacity to at least `capacity`, re-linearizing storage.
    pub fn reserve(&mut self, capacity: usize) {
        if capacity > self.capacity() {
            self.relinearize(capacity);
        }
    }

    /// Shrinks the capacity to the current length; an empty buffer releases
    /// its storage entirely.
    pub fn shrink_to_fit(&mut self) {
        if self.size != self.capacity() {
            self.relinearize(self.size);
        }
    }

    pub fn resize_with(&mut self, len: usize, mut fill: impl FnMut() -> T) {
        if len > self.capacity() {
            self.reserve(len);
        }
        if len < self.size {
            self.truncate(len);
        } else {
            while self.size < len {
                self.push_back(fill());
            }
        }
    }

    fn relinearize(&mut self, capacity: usize) {
        let mut slots = if capacity == 0 {
            Vec::new()
        } else {
            Vec::with_capacity(capacity + 1)
        };
        let keep = self.size.min(capacity);
        let skipped = self.size - keep;
        for index in skipped..self.size {
            let slot = self.physical(index);
            slots.push(std::mem::take(&mut self.slots[slot]));
        }
        if capacity > 0 {
            slots.resize_with(capacity + 1, T::default);
        }

        self.slots = slots;
        self.head += skipped as u64;
        self.offset = 0;
        self.size = keep;
        self.generation += 1;
    }

    pub fn as_slices(&self) -> (&[T], &[T]) {
        if self.size == 0 {
            return (&[], &[]);
        }
        let end = self.offset + self.size;
        if end <= self.slots.len() {
            (&self.slots[self.offset..end], &[])
        } else {
            let wrapped = end - self.slots.len();
            (&self.slots[self.offset..], &self.slots[..wrapped])
        }
    }

    pub fn iter(&self) -> Iter<'_, T> {
        let (first, second) = self.as_slices();
        Iter {
            inner: first.iter().chain(second.iter()),
        }
    }

    pub fn begin(&self) -> Cursor {
        Cursor {
            generation: self.generation,
            position: self.head,
        }
    }

    pub fn end(&self) -> Cursor {
        Cursor {
            generation: self.generation,
            position: self.head + self.size as u64,
        }
    }

    /// Cursor for logical `index`; `index == len()` yields [`Self::end`].
    pub fn cursor_at(&self, index: usize) -> Option<Cursor> {
        if index <= self.size {
            Some(self.begin().offset(index))
        } else {
            None
        }
    }

    /// Logical index the cursor refers to, if it is still valid.
    pub fn cursor_index(&self, cursor: Cursor) -> Option<usize> {
        if cursor.generation != self.generation || cursor.position < self.head {
            return None;
        }
        let index = (cursor.position - self.head) as usize;
        if index <= self.size { Some(index) } else { None }
    }

    pub fn contains_range(&self, begin: Cursor, end: Cursor) -> bool {
        matches!(
            (self.cursor_index(begin), self.cursor_index(end)),
            (Some(first), Some(last)) if first <= last
        )
    }
}

impl<T: Default + Clone> RingBuffer<T> {
    /// Appends `items` at the back, evicting from the front to make room.
    ///
    /// At most `capacity()` elements are kept from `items` (its tail). The
    /// copy is performed as one or two contiguous slice writes split at the
    /// physical wrap point. Returns the cursor of the first element written.
    pub fn append(&mut self, items: &[T]) -> Cursor {
        self.ensure_storage();
        let capacity = self.capacity();
        let items = if items.len() > capacity {
            &items[items.len() - capacity..]
        } else {
            items
        };

        let overflow = (self.size + items.len()).saturating_sub(capacity);
        self.discard_front(overflow);

        let start = self.physical(self.size);
        let first_len = items.len().min(self.slots.len() - start);
        let (first, second) = items.split_at(first_len);
        self.slots[start..start + first_len].clone_from_slice(first);
        self.slots[..second.len()].clone_from_slice(second);

        self.size += items.len();
        self.begin().offset(self.size - items.len())
    }

    pub fn resize(&mut self, len: usize, value: T) {
        self.resize_with(len, || value.clone());
    }

    /// Copies the elements between two cursors, or `None` when either cursor
    /// is stale or the range is inverted.
    pub fn copy_range(&self, begin: Cursor, end: Cursor) -> Option<Vec<T>> {
        let first = self.cursor_index(begin)?;
        let last = self.cursor_index(end)?;
        if first > last {
            return None;
        }
        Some(self.iter().skip(first).take(last - first).cloned().collect())
    }
}

fn empty_slots<T: Default>(capacity: usize) -> Vec<T> {
    let mut slots = Vec::with_capacity(capacity + 1);
    slots.resize_with(capacity + 1, T::default);
    slots
}

impl<T: Default> Index<usize> for RingBuffer<T> {
    type Output = T;

    fn index(&self, index: usize) -> &T {
        assert!(
            index < self.size,
            "ring buffer index {index} out of range for length {}",
            self.size
        );
        &self.slots[self.physical(index)]
    }
}

impl<T: Default> IndexMut<usize> for RingBuffer<T> {
    fn index_mut(&mut self, index: usize) -> &mut T {
        assert!(
            index < self.size,
            "ring buffer index {index} out of range for length {}",
            self.size
        );
        let slot = self.physical(index);
        &mut self.slots[slot]
    }
}

impl<T: Default> Extend<T> for RingBuffer<T> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for value in iter {
            self.push_back(value);
        }
    }
}

impl<T: Default + fmt::Debug> fmt::Debug for RingBuffer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

pub struct Iter<'a, T> {
    inner: Chain<slice::Iter<'a, T>, slice::Iter<'a, T>>,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<&'a T> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<T> DoubleEndedIterator for Iter<'_, T> {
    fn next_back(&mut self) -> Option<Self::Item> {
        self.inner.next_back()
    }
}

impl<T> FusedIterator for Iter<'_, T> {}

impl<'a, T: Default> IntoIterator for &'a RingBuffer<T> {
    type Item = &'a T;
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Iter<'a, T> {
        self.iter()
    }
}
