mod message_service;


pub use message_service::{
    MessageService, MessageServiceDependencies, SendMessageRequest, MAX_HISTORY_LIMIT,
};
