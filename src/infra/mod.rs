// Object store adapters

pub mod fs_object_store;
pub mod in_memory_store;

pub use fs_object_store::FsObjectStore;
pub use in_memory_store::InMemoryObjectStore;
