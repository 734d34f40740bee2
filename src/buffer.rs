//! Fixed-capacity circular byte store between the feed and decode
//! sides of a [`Context`](crate::Context).
//!
//! `bytes_available` bytes starting at `read_pos` (wrapping at the end
//! of the backing storage) are valid, unread data. Writes are
//! all-or-nothing and reads never go beyond the valid region.

/// Errors returned by [`RingBuffer`](RingBuffer) operations. Neither
/// condition mutates the buffer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BufferError {
    /// Not enough free space to write all of the given bytes.
    #[error("cannot write {length} bytes: only {free} bytes free")]
    Full { length: usize, free: usize },

    /// Fewer bytes are buffered than the operation needs.
    #[error("cannot access {length} bytes at offset {offset}: only {available} bytes available")]
    InsufficientData {
        length: usize,
        offset: usize,
        available: usize,
    },
}

/// Backing storage: either allocated by the buffer itself or borrowed
/// from the caller for the lifetime of the buffer.
enum Storage<'a> {
    Owned(Vec<u8>),
    Borrowed(&'a mut [u8]),
}

impl<'a> Storage<'a> {
    fn as_slice(&self) -> &[u8] {
        match self {
            Storage::Owned(v) => v,
            Storage::Borrowed(s) => s,
        }
    }

    fn as_mut_slice(&mut self) -> &mut [u8] {
        match self {
            Storage::Owned(v) => v,
            Storage::Borrowed(s) => s,
        }
    }
}

/// Circular byte buffer with explicit write/peek/read/remove/flush.
pub struct RingBuffer<'a> {
    storage: Storage<'a>,
    read_pos: usize,
    write_pos: usize,
    bytes_available: usize,
}

impl RingBuffer<'static> {
    /// Allocates a buffer of `capacity` bytes.
    ///
    /// Returns `None` if the allocation fails. `capacity` must be
    /// non-zero; the caller checks this.
    pub(crate) fn with_capacity(capacity: usize) -> Option<Self> {
        let mut storage = Vec::new();
        storage.try_reserve_exact(capacity).ok()?;
        storage.resize(capacity, 0);

        Some(RingBuffer::from_storage(Storage::Owned(storage)))
    }
}

impl<'a> RingBuffer<'a> {
    /// Wraps caller-supplied memory. The memory is only borrowed and is
    /// handed back untouched apart from its contents when the buffer
    /// is dropped.
    pub(crate) fn with_storage(storage: &'a mut [u8]) -> Self {
        RingBuffer::from_storage(Storage::Borrowed(storage))
    }

    fn from_storage(storage: Storage<'a>) -> Self {
        RingBuffer {
            storage,
            read_pos: 0,
            write_pos: 0,
            bytes_available: 0,
        }
    }

    /// Total number of bytes the buffer can hold.
    pub fn capacity(&self) -> usize {
        self.storage.as_slice().len()
    }

    /// Number of buffered, unread bytes.
    pub fn bytes_available(&self) -> usize {
        self.bytes_available
    }

    /// Number of bytes that can be written before the buffer is full.
    pub fn free(&self) -> usize {
        self.capacity() - self.bytes_available
    }

    pub fn is_empty(&self) -> bool {
        self.bytes_available == 0
    }

    /// Current read position within the backing storage.
    #[cfg(test)]
    pub fn read_pos(&self) -> usize {
        self.read_pos
    }

    /// Current write position within the backing storage.
    #[cfg(test)]
    pub fn write_pos(&self) -> usize {
        self.write_pos
    }

    /// Appends `data`. Fails without writing anything if `data` does
    /// not fit into the free space.
    pub fn write(&mut self, data: &[u8]) -> Result<(), BufferError> {
        let free = self.free();
        if data.len() > free {
            return Err(BufferError::Full {
                length: data.len(),
                free,
            });
        }

        let size = self.capacity();
        let write_pos = self.write_pos;
        let storage = self.storage.as_mut_slice();

        if write_pos + data.len() > size {
            let (head, tail) = data.split_at(size - write_pos);
            storage[write_pos..].copy_from_slice(head);
            storage[..tail.len()].copy_from_slice(tail);
        } else {
            storage[write_pos..write_pos + data.len()].copy_from_slice(data);
        }

        self.write_pos = (write_pos + data.len()) % size;
        self.bytes_available += data.len();

        Ok(())
    }

    /// Copies `dest.len()` bytes starting `offset` bytes past the read
    /// position into `dest`, without consuming them. Data wrapping
    /// around the end of the storage is handled transparently.
    pub fn peek(&self, dest: &mut [u8], offset: usize) -> Result<(), BufferError> {
        if dest.len() + offset > self.bytes_available {
            return Err(BufferError::InsufficientData {
                length: dest.len(),
                offset,
                available: self.bytes_available,
            });
        }

        let size = self.capacity();
        let storage = self.storage.as_slice();
        let start = (self.read_pos + offset) % size;

        if start + dest.len() > size {
            let (head, tail) = dest.split_at_mut(size - start);
            head.copy_from_slice(&storage[start..]);
            tail.copy_from_slice(&storage[..tail.len()]);
        } else {
            dest.copy_from_slice(&storage[start..start + dest.len()]);
        }

        Ok(())
    }

    /// Returns the byte `offset` bytes past the read position, if
    /// buffered.
    pub fn peek_byte(&self, offset: usize) -> Option<u8> {
        if offset >= self.bytes_available {
            return None;
        }

        Some(self.storage.as_slice()[(self.read_pos + offset) % self.capacity()])
    }

    /// Consumes `length` bytes without copying them anywhere.
    pub fn remove(&mut self, length: usize) -> Result<(), BufferError> {
        if length > self.bytes_available {
            return Err(BufferError::InsufficientData {
                length,
                offset: 0,
                available: self.bytes_available,
            });
        }

        self.bytes_available -= length;
        self.read_pos = (self.read_pos + length) % self.capacity();

        Ok(())
    }

    /// Copies `dest.len()` bytes into `dest` and consumes them.
    pub fn read(&mut self, dest: &mut [u8]) -> Result<(), BufferError> {
        self.peek(dest, 0)?;
        self.remove(dest.len())
    }

    /// Discards all buffered data.
    pub fn flush(&mut self) {
        self.read_pos = 0;
        self.write_pos = 0;
        self.bytes_available = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(b: &RingBuffer) -> (usize, usize, usize) {
        (b.read_pos(), b.write_pos(), b.bytes_available())
    }

    #[test]
    fn write_is_all_or_nothing() {
        let mut b = RingBuffer::with_capacity(4).unwrap();
        b.write(&[1, 2, 3]).unwrap();

        assert_eq!(
            b.write(&[4, 5]),
            Err(BufferError::Full { length: 2, free: 1 })
        );
        assert_eq!(state(&b), (0, 3, 3));

        b.write(&[4]).unwrap();
        assert_eq!(b.free(), 0);
        assert_eq!(state(&b), (0, 0, 4));
    }

    #[test]
    fn peek_is_idempotent() {
        let mut b = RingBuffer::with_capacity(8).unwrap();
        b.write(&[0x10, 0x20, 0x30, 0x40]).unwrap();
        let before = state(&b);

        let mut first = [0; 2];
        let mut second = [0; 2];
        b.peek(&mut first, 1).unwrap();
        b.peek(&mut second, 1).unwrap();

        assert_eq!(first, [0x20, 0x30]);
        assert_eq!(first, second);
        assert_eq!(state(&b), before);
    }

    #[test]
    fn peek_beyond_available() {
        let mut b = RingBuffer::with_capacity(8).unwrap();
        b.write(&[1, 2]).unwrap();

        let mut dest = [0; 2];
        assert_eq!(
            b.peek(&mut dest, 1),
            Err(BufferError::InsufficientData {
                length: 2,
                offset: 1,
                available: 2,
            })
        );
        assert_eq!(b.peek_byte(1), Some(2));
        assert_eq!(b.peek_byte(2), None);
    }

    #[test]
    fn wrapping_write_and_peek() {
        let mut b = RingBuffer::with_capacity(5).unwrap();
        b.write(&[0, 0, 0, 0]).unwrap();
        b.remove(3).unwrap();

        // Write position is 4; this write wraps around.
        b.write(&[1, 2, 3, 4]).unwrap();
        assert_eq!(state(&b), (3, 3, 5));

        let mut dest = [0; 5];
        b.peek(&mut dest, 0).unwrap();
        assert_eq!(dest, [0, 1, 2, 3, 4]);

        // Offset alone crosses the wrap point.
        let mut dest = [0; 2];
        b.peek(&mut dest, 3).unwrap();
        assert_eq!(dest, [3, 4]);
        assert_eq!(b.peek_byte(4), Some(4));
    }

    #[test]
    fn read_and_remove() {
        let mut b = RingBuffer::with_capacity(4).unwrap();
        b.write(&[9, 8, 7]).unwrap();

        let mut dest = [0; 2];
        b.read(&mut dest).unwrap();
        assert_eq!(dest, [9, 8]);
        assert_eq!(b.bytes_available(), 1);

        assert!(b.remove(2).is_err());
        assert_eq!(b.bytes_available(), 1);
        b.remove(1).unwrap();
        assert!(b.is_empty());
    }

    #[test]
    fn flush() {
        let mut b = RingBuffer::with_capacity(4).unwrap();
        b.write(&[1, 2, 3]).unwrap();
        b.remove(1).unwrap();
        b.flush();

        assert_eq!(state(&b), (0, 0, 0));
        b.write(&[5, 6, 7, 8]).unwrap();
        assert_eq!(b.peek_byte(0), Some(5));
    }

    #[test]
    fn borrowed_storage() {
        let mut memory = [0u8; 3];
        {
            let mut b = RingBuffer::with_storage(&mut memory);
            assert_eq!(b.capacity(), 3);
            b.write(&[0xaa, 0xbb]).unwrap();
        }
        assert_eq!(memory, [0xaa, 0xbb, 0]);
    }
}
