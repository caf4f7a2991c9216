pub mod fs_store;
pub mod http_store;
