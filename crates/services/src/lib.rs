pub mod auth;
pub mod code_editor;
pub mod crypto;
pub mod dao;
pub mod error;
pub mod file_registry;
pub mod membership;
pub mod messaging;
pub mod presence;
pub mod rooms;
pub mod store;
pub mod video;
pub mod whiteboard;

pub use error::EngineError;
