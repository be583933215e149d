mod links;
mod newsletters;
mod subscriptions;

#[cfg(test)]
pub(crate) mod fakes;

pub use links::SubscriptionLinks;
pub use newsletters::{DeliveryReport, NewsletterService};
pub use subscriptions::{
    SubscribeOutcome, SubscriptionError, SubscriptionResult, SubscriptionService,
};
