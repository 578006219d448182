use std::io;

/// Fixed-capacity byte storage handed out by an allocator.
///
/// A block never grows on its own: writes past [`Block::capacity`] are
/// refused, so every growth has to go back through the allocator that owns
/// the block. Blocks must be returned to the allocator that produced them.
pub struct Block {
    buf: Vec<u8>,
    capacity: usize,
}

impl Block {
    /// Create an empty block able to hold `capacity` bytes.
    ///
    /// Intended for allocator backends; clients obtain blocks through an
    /// [`Allocator`](super::Allocator).
    pub fn with_capacity(capacity: usize) -> Self {
        Self { buf: Vec::with_capacity(capacity), capacity }
    }

    /// Maximum number of bytes this block holds.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Bytes written so far.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Whether nothing has been written.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Free space left.
    pub fn remaining(&self) -> usize {
        self.capacity - self.buf.len()
    }

    /// Written bytes.
    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    /// Written bytes, mutably.
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.buf
    }

    /// Discard written bytes, keeping the capacity.
    pub fn clear(&mut self) {
        self.buf.clear();
    }

    /// Append `bytes`, or leave the block untouched and return `false` if
    /// they do not fit.
    pub fn try_extend(&mut self, bytes: &[u8]) -> bool {
        if bytes.len() > self.remaining() {
            return false;
        }
        self.buf.extend_from_slice(bytes);
        true
    }

    /// Copy as much of `source` as fits into this (cleared) block.
    pub fn copy_from(&mut self, source: &Block) {
        self.buf.clear();
        let keep = source.len().min(self.capacity);
        self.buf.extend_from_slice(&source.buf[..keep]);
    }
}

impl io::Write for Block {
    /// Writes as much as fits. Returns `Ok(0)` once full, which `write_all`
    /// reports as [`io::ErrorKind::WriteZero`].
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = buf.len().min(self.remaining());
        self.buf.extend_from_slice(&buf[..n]);
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl std::fmt::Debug for Block {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Block").field("len", &self.len()).field("capacity", &self.capacity).finish()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn writes_stop_at_capacity() {
        let mut block = Block::with_capacity(4);

        let err = block.write_all(&[1, 2, 3, 4, 5]).expect_err("should not fit");
        assert_eq!(err.kind(), io::ErrorKind::WriteZero);
        assert_eq!(block.as_slice(), &[1, 2, 3, 4]);
    }

    #[test]
    fn try_extend_is_all_or_nothing() {
        let mut block = Block::with_capacity(4);

        assert!(block.try_extend(&[1, 2]));
        assert!(!block.try_extend(&[3, 4, 5]));
        assert_eq!(block.as_slice(), &[1, 2]);
        assert_eq!(block.remaining(), 2);
    }

    #[test]
    fn copy_from_keeps_prefix_that_fits() {
        let mut source = Block::with_capacity(8);
        assert!(source.try_extend(&[1, 2, 3, 4, 5, 6]));

        let mut smaller = Block::with_capacity(3);
        smaller.copy_from(&source);
        assert_eq!(smaller.as_slice(), &[1, 2, 3]);

        let mut larger = Block::with_capacity(16);
        larger.copy_from(&source);
        assert_eq!(larger.as_slice(), source.as_slice());
    }
}
