use std::sync::Arc;

use serde::Serialize;

use crate::client::{Email, EmailSender};
use crate::domain::Subscriber;
use crate::repo::{
    NewNewsletter, NewsletterStore, NewsletterTemplate, NewsletterTemplateStore, StoreResult,
    SubscriberStore,
};

use super::SubscriptionLinks;

/// Per-issue delivery counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DeliveryReport {
    pub delivered: usize,
    pub failed: usize,
}

/// Archives newsletter issues, mails them to verified subscribers and keeps the draft template
#[derive(Clone)]
pub struct NewsletterService {
    subscribers: Arc<dyn SubscriberStore>,
    newsletters: Arc<dyn NewsletterStore>,
    templates: Arc<dyn NewsletterTemplateStore>,
    email_sender: Arc<dyn EmailSender>,
    links: SubscriptionLinks,
}

impl NewsletterService {
    pub fn new(
        subscribers: Arc<dyn SubscriberStore>,
        newsletters: Arc<dyn NewsletterStore>,
        templates: Arc<dyn NewsletterTemplateStore>,
        email_sender: Arc<dyn EmailSender>,
        links: SubscriptionLinks,
    ) -> Self {
        Self {
            subscribers,
            newsletters,
            templates,
            email_sender,
            links,
        }
    }

    /// The saved template, blank until an administrator saves one
    #[tracing::instrument(name = "Get newsletter template", skip(self))]
    pub async fn template(&self) -> StoreResult<NewsletterTemplate> {
        Ok(self.templates.fetch_template().await?.unwrap_or_default())
    }

    #[tracing::instrument(name = "Update newsletter template", skip(self, template))]
    pub async fn update_template(&self, template: NewsletterTemplate) -> StoreResult<()> {
        self.templates.save_template(&template).await?;
        tracing::info!("Newsletter template updated");
        Ok(())
    }

    /// Store the issue, then send it to every verified subscriber.
    /// A failed recipient is logged and counted; it does not stop the broadcast.
    #[tracing::instrument(name = "Publish newsletter", skip(self, newsletter), fields(subject = %newsletter.subject))]
    pub async fn publish(&self, newsletter: NewNewsletter) -> StoreResult<DeliveryReport> {
        let newsletter = self.newsletters.insert(&newsletter).await?;
        tracing::info!(newsletter_id = %newsletter.id, "Stored newsletter");

        let mut report = DeliveryReport::default();
        for subscriber in self.subscribers.find_all_verified().await? {
            let email = match self.issue_for(&subscriber, &newsletter.subject, &newsletter.content) {
                Some(email) => email,
                None => continue,
            };

            match self.email_sender.send(&subscriber.email, &email).await {
                Ok(()) => report.delivered += 1,
                Err(error) => {
                    tracing::warn!(
                        error.cause_chain = ?error,
                        subscriber_id = %subscriber.id,
                        "Failed to deliver newsletter"
                    );
                    report.failed += 1;
                }
            }
        }
        tracing::info!(
            delivered = report.delivered,
            failed = report.failed,
            "Newsletter broadcast finished"
        );

        Ok(report)
    }

    fn issue_for(&self, subscriber: &Subscriber, subject: &str, content: &str) -> Option<Email> {
        let unsubscribe_token = subscriber.unsubscribe_token()?;
        let link = self.links.unsubscribe(unsubscribe_token.as_ref());

        Some(Email {
            subject: subject.to_string(),
            html_body: format!(
                "<html><body>\
                 <div>{content}</div>\
                 <hr>\
                 <p style='font-size:12px;color:gray;'>\
                 If you no longer wish to receive our newsletter, \
                 <a href=\"{link}\">click here to unsubscribe</a>.\
                 </p>\
                 </body></html>"
            ),
            text_body: format!(
                "{content}\n\n--\nIf you no longer wish to receive our newsletter, unsubscribe here: {link}"
            ),
        })
    }
}
