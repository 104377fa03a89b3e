pub mod errors;
pub mod events;
pub mod id;
pub mod notifications;
pub mod types;

pub use errors::{ConfigError, ParameterError, ParleyError};
pub use events::{EventBus, SessionEvent};
pub use id::{new_correlation_id, SessionId};
pub use notifications::{Notification, NotificationLevel, NotificationQueue};
pub use types::{ConversationEntry, InferenceParameters, Sender, SessionStatus, MAX_TEMPERATURE};

pub type Result<T> = std::result::Result<T, ParleyError>;
