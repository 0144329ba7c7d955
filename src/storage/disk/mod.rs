mod disk_space_manager;

pub use disk_space_manager::*;
