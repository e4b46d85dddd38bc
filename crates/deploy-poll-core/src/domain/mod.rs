//! Domain model (messages, requests, states, errors).

pub mod errors;
pub mod message;
pub mod request;
pub mod state;

pub use self::errors::{LaunchError, QueueError, Rejection};
pub use self::message::{QueueMessage, ReceiptHandle, SENDER_IP_ATTRIBUTE};
pub use self::request::{DeployRequest, RequiredParameters, ValidatedMessage};
pub use self::state::{Disposition, PollState};
