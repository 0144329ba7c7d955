mod buffer_pool;
mod eviction_list;
mod frame;
mod frame_index;

pub use buffer_pool::*;
pub use eviction_list::*;
pub use frame::*;
pub use frame_index::*;
