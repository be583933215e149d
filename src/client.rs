mod email_client;
mod recaptcha;

pub use email_client::{Email, EmailClient, EmailSender};
pub use recaptcha::{HumanVerifier, RecaptchaClient, DEFAULT_SCORE_THRESHOLD};
