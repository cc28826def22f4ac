pub mod chat;

pub use chat::{ ChatMode, ChatRequest, ChatResponse, Message, MessageError, Role, UserSession };
