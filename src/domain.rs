mod email_address;
mod role;
mod subscriber;
mod token;

pub use email_address::EmailAddress;
pub use role::Role;
pub use subscriber::{Subscriber, SubscriberState};
pub use token::{SubscriberToken, TokenPolicy, VerificationToken, DEFAULT_VERIFICATION_TTL_HOURS};
