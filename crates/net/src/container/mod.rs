mod ring_buffer;

pub use ring_buffer::{Cursor, DEFAULT_CAPACITY, Iter, RingBuffer};
