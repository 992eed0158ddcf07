pub mod base;
pub mod file;
pub mod message;
pub mod room;

pub use base::BaseDao;
