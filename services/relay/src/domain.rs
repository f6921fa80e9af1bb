// Domain layer modules
pub mod author;
pub mod canonical;
pub mod event;
pub mod event_kind;
pub mod event_validator;
pub mod filter;
pub mod limitation_config;
pub mod relay_message;
pub mod signature;
pub mod validation;

// Re-exports
pub use author::{Author, Follow, RelayUsage};
pub use event::{Event, SignedEvent};
pub use event_kind::EventKind;
pub use event_validator::{EventValidator, VerifyError};
pub use filter::{Filter, FilterError};
pub use limitation_config::LimitationConfig;
pub use relay_message::{RelayMessage, RelayMessageError};
pub use signature::{Keys, SecretKey};
pub use validation::{EventId, PublicKey, Signature, ValidationError};
