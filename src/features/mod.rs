pub mod expenses;
pub mod server;
pub mod sync;
