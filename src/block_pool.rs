use std::{cell::RefCell, mem::MaybeUninit, ptr::NonNull};

use crate::error::{Error, Result};

/// Every block the pool hands out is aligned to this many bytes.
pub const BLOCK_ALIGN: usize = 16;

const WORD_SIZE: usize = std::mem::size_of::<u128>();
const BLOCK_RESERVE: usize = 128;
const MIN_GROW_BLOCKS: usize = 8;

struct PoolInner {
    stride: usize,
    max_alloc: usize,
    allocated: usize,
    free: Vec<NonNull<u8>>,
    chunks: Vec<Box<[MaybeUninit<u128>]>>,
    next: NonNull<u8>,
    remaining: usize,
    mem_usage: usize,
}

impl PoolInner {
    fn acquire(&mut self) -> Result<NonNull<u8>> {
        if let Some(block) = self.free.pop() {
            return Ok(block);
        }
        if self.max_alloc > 0 && self.allocated >= self.max_alloc {
            return Err(Error::out_of_capacity("block pool exhausted"));
        }
        Ok(self.carve())
    }

    fn carve(&mut self) -> NonNull<u8> {
        if self.remaining == 0 {
            self.grow(1);
        }
        let block = self.next;
        self.next = unsafe { NonNull::new_unchecked(block.as_ptr().add(self.stride)) };
        self.remaining -= 1;
        self.allocated += 1;
        block
    }

    fn grow(&mut self, at_least: usize) {
        let mut blocks = at_least.max(MIN_GROW_BLOCKS).max(self.allocated);
        if self.max_alloc > 0 {
            blocks = blocks.min(self.max_alloc - self.allocated);
        }

        let words = blocks * (self.stride / WORD_SIZE);
        let mut chunk: Box<[MaybeUninit<u128>]> = Box::new_uninit_slice(words);
        let base = chunk.as_mut_ptr() as *mut u8;

        self.chunks.push(chunk);
        self.mem_usage += words * WORD_SIZE;
        unsafe {
            self.next = NonNull::new_unchecked(base);
        }
        self.remaining = blocks;

        tracing::debug!(
            "block pool grew: +{} blocks, {} bytes owned",
            blocks,
            self.mem_usage
        );
    }
}

/// Fixed-size block pool. Single thread only.
///
/// Blocks are carved from pool-owned arena chunks and handed out by address.
/// Dropping the pool frees the whole arena, blocks still outstanding
/// included, so every block must be out of use by then.
pub struct BlockPool {
    block_size: usize,
    inner: RefCell<PoolInner>,
}

impl BlockPool {
    /// Unbounded pool with nothing carved up front.
    pub fn new(block_size: usize) -> Self {
        PoolOptions::new(block_size).build()
    }

    /// Pops the most recently released block, or carves a new one while
    /// under the cap. Fails with `OutOfCapacity` once the cap is reached
    /// and the free list is empty, leaving the pool untouched.
    pub fn acquire(&self) -> Result<NonNull<u8>> {
        self.inner.borrow_mut().acquire()
    }

    /// Parks `block` on the free list. O(1), no origin check.
    ///
    /// # Safety
    ///
    /// `block` must have come from [`BlockPool::acquire`] on this pool and
    /// must not already be on the free list.
    pub unsafe fn release(&self, block: NonNull<u8>) {
        self.inner.borrow_mut().free.push(block);
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Blocks ever carved, free and outstanding together. Never decreases.
    pub fn allocated(&self) -> usize {
        self.inner.borrow().allocated
    }

    pub fn available(&self) -> usize {
        self.inner.borrow().free.len()
    }

    /// Total bytes of arena memory the pool owns.
    pub fn mem_usage(&self) -> usize {
        self.inner.borrow().mem_usage
    }
}

/// Pool construction options.
#[derive(Debug, Clone)]
pub struct PoolOptions {
    block_size: usize,
    pre_alloc: usize,
    max_alloc: usize,
}

impl PoolOptions {
    pub fn new(block_size: usize) -> Self {
        Self {
            block_size,
            pre_alloc: 0,
            max_alloc: 0,
        }
    }

    /// Blocks carved eagerly at build time and parked on the free list.
    pub fn pre_alloc(&mut self, blocks: usize) -> &mut Self {
        self.pre_alloc = blocks;
        self
    }

    /// Hard cap on blocks ever carved. Zero means unbounded.
    pub fn max_alloc(&mut self, blocks: usize) -> &mut Self {
        self.max_alloc = blocks;
        self
    }

    pub fn build(&self) -> BlockPool {
        assert!(self.block_size > 0, "block_size must be greater than 0.");
        assert!(
            self.max_alloc == 0 || self.max_alloc >= self.pre_alloc,
            "max_alloc must be 0 or at least pre_alloc."
        );

        let mut reserve = BLOCK_RESERVE.max(self.pre_alloc);
        if self.max_alloc > 0 && self.max_alloc < reserve {
            reserve = self.max_alloc;
        }

        let mut inner = PoolInner {
            stride: self.block_size.div_ceil(BLOCK_ALIGN) * BLOCK_ALIGN,
            max_alloc: self.max_alloc,
            allocated: 0,
            free: Vec::with_capacity(reserve),
            chunks: Vec::new(),
            next: NonNull::dangling(),
            remaining: 0,
            mem_usage: 0,
        };

        if self.pre_alloc > 0 {
            inner.grow(self.pre_alloc);
            for _ in 0..self.pre_alloc {
                let block = inner.carve();
                inner.free.push(block);
            }
        }

        tracing::debug!(
            "block pool created: block_size={} pre_alloc={} max_alloc={}",
            self.block_size,
            self.pre_alloc,
            self.max_alloc
        );

        BlockPool {
            block_size: self.block_size,
            inner: RefCell::new(inner),
        }
    }
}
