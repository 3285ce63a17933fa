pub mod errors;
pub mod id;
pub mod notifications;

pub use errors::{ChatError, ConfigError, TransportError};
pub use id::{new_client_id, new_id};
pub use notifications::{Notice, NoticeLevel, NoticeQueue};

pub type Result<T> = std::result::Result<T, ChatError>;
