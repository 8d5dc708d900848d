pub mod config;
pub mod controller;
pub mod conversation;
pub mod endpoint;
pub mod error;
pub mod state;

// Re-export main types for convenience
pub use async_trait::async_trait;
pub use config::Config;
pub use controller::ConversationController;
pub use conversation::{Conversation, PendingSend, RequestToken, SendOutcome};
pub use endpoint::{ChatEndpoint, HttpChatEndpoint};
pub use error::{ConfigError, SendFailure, SendFailureKind};
pub use state::{Message, Role, FALLBACK_TEXT, GREETING};
