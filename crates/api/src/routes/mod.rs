pub mod file;
pub mod room;
