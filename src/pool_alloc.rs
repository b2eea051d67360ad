use std::{marker::PhantomData, mem, ptr, ptr::NonNull, rc::Rc};

use crate::{
    block_pool::{BLOCK_ALIGN, BlockPool, PoolOptions},
    error::{Error, Result},
};

/// Single-object allocation contract node containers draw from.
pub trait ContainerAlloc {
    /// The type requests are sized for.
    type Elem;

    fn allocate(&self, n: usize) -> Result<NonNull<Self::Elem>>;

    /// # Safety
    ///
    /// Same contract as [`PoolAlloc::deallocate`]: a non-null `ptr` must be
    /// an undeallocated result of `allocate` on this allocator.
    unsafe fn deallocate(&self, ptr: *mut Self::Elem, n: usize);

    /// # Safety
    ///
    /// `ptr` must point at an allocated slot holding no live value.
    unsafe fn construct(&self, ptr: NonNull<Self::Elem>, value: Self::Elem);

    /// # Safety
    ///
    /// `ptr` must point at a live value previously placed with `construct`.
    unsafe fn destroy(&self, ptr: NonNull<Self::Elem>);

    fn max_size(&self) -> usize;
}

/// Pool-backed single-object allocator for node containers.
///
/// `T` only fixes the block size; it need not be the type a container
/// actually stores, since containers rebind to their own node type. The
/// backing pool holds exactly `SLOTS` blocks, all carved up front, and
/// never grows past them.
pub struct PoolAlloc<T, const SLOTS: usize> {
    pool: Rc<BlockPool>,
    _marker: PhantomData<T>,
}

impl<T, const SLOTS: usize> PoolAlloc<T, SLOTS> {
    pub fn new() -> Self {
        assert!(mem::size_of::<T>() > 0, "element type must have a size.");
        assert!(
            mem::align_of::<T>() <= BLOCK_ALIGN,
            "element alignment above {BLOCK_ALIGN} is not supported."
        );

        let pool = PoolOptions::new(mem::size_of::<T>())
            .pre_alloc(SLOTS)
            .max_alloc(SLOTS)
            .build();
        Self {
            pool: Rc::new(pool),
            _marker: PhantomData,
        }
    }

    /// Fresh allocator for `U` with the same slot count, backed by its own
    /// pool sized for `U`.
    pub fn rebind<U>(&self) -> PoolAlloc<U, SLOTS> {
        PoolAlloc::new()
    }

    /// Hands out one block as an uninitialized `T` slot. Only `n == 1` is
    /// served; anything else fails with `InvalidRequestSize` before the
    /// pool is touched, and an exhausted pool surfaces `OutOfCapacity`.
    pub fn allocate(&self, n: usize) -> Result<NonNull<T>> {
        if n != 1 {
            return Err(Error::invalid_request_size(format!(
                "single element requests only, got {n}"
            )));
        }
        let block = self.pool.acquire()?;
        Ok(block.cast())
    }

    /// Returns the block under `ptr` to the pool. A null `ptr` is a no-op;
    /// `n` is ignored.
    ///
    /// # Safety
    ///
    /// A non-null `ptr` must have come from [`PoolAlloc::allocate`] on this
    /// allocator (or a clone sharing its pool) and must not have been
    /// deallocated since. Any value in the slot must already be destroyed.
    pub unsafe fn deallocate(&self, ptr: *mut T, _n: usize) {
        let Some(block) = NonNull::new(ptr) else {
            return;
        };
        unsafe { self.pool.release(block.cast()) };
    }

    /// Writes `value` into the slot at `ptr`.
    ///
    /// # Safety
    ///
    /// `ptr` must point at an allocated slot holding no live value.
    pub unsafe fn construct(&self, ptr: NonNull<T>, value: T) {
        unsafe { ptr.as_ptr().write(value) };
    }

    /// Drops the value at `ptr` in place. The block itself stays allocated.
    ///
    /// # Safety
    ///
    /// `ptr` must point at a live value previously placed with
    /// [`PoolAlloc::construct`], and that value must not be used again.
    pub unsafe fn destroy(&self, ptr: NonNull<T>) {
        unsafe { ptr::drop_in_place(ptr.as_ptr()) };
    }

    /// Largest supported request, always 1.
    pub fn max_size(&self) -> usize {
        1
    }

    pub fn block_size(&self) -> usize {
        self.pool.block_size()
    }

    pub fn allocated(&self) -> usize {
        self.pool.allocated()
    }

    pub fn available(&self) -> usize {
        self.pool.available()
    }

    pub fn mem_usage(&self) -> usize {
        self.pool.mem_usage()
    }
}

impl<T, const SLOTS: usize> Default for PoolAlloc<T, SLOTS> {
    fn default() -> Self {
        Self::new()
    }
}

/// Clones share the backing pool; only `new` and `rebind` build fresh ones.
impl<T, const SLOTS: usize> Clone for PoolAlloc<T, SLOTS> {
    fn clone(&self) -> Self {
        Self {
            pool: Rc::clone(&self.pool),
            _marker: PhantomData,
        }
    }
}

/// Allocators compare equal exactly when they share a pool, which is when
/// one may release blocks the other handed out.
impl<T, const SLOTS: usize> PartialEq for PoolAlloc<T, SLOTS> {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.pool, &other.pool)
    }
}

impl<T, const SLOTS: usize> Eq for PoolAlloc<T, SLOTS> {}

impl<T, const SLOTS: usize> ContainerAlloc for PoolAlloc<T, SLOTS> {
    type Elem = T;

    fn allocate(&self, n: usize) -> Result<NonNull<T>> {
        PoolAlloc::allocate(self, n)
    }

    unsafe fn deallocate(&self, ptr: *mut T, n: usize) {
        unsafe { PoolAlloc::deallocate(self, ptr, n) }
    }

    unsafe fn construct(&self, ptr: NonNull<T>, value: T) {
        unsafe { PoolAlloc::construct(self, ptr, value) }
    }

    unsafe fn destroy(&self, ptr: NonNull<T>) {
        unsafe { PoolAlloc::destroy(self, ptr) }
    }

    fn max_size(&self) -> usize {
        PoolAlloc::max_size(self)
    }
}
