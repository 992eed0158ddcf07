mod chat_message;
mod room;
mod uploaded_file;

pub use chat_message::ChatMessage;
pub use room::{Room, RoomType};
pub use uploaded_file::UploadedFile;
