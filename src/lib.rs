pub mod block_pool;
pub mod error;
pub mod list_map;
pub mod pool_alloc;

pub mod prelude {
    #![allow(unused)]

    pub use crate::block_pool::{BlockPool, PoolOptions};
    pub use crate::error::{Descriptor, Error, Result};
    pub use crate::list_map::ListMap;
    pub use crate::pool_alloc::{ContainerAlloc, PoolAlloc};
}
