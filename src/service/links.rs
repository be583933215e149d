use url::Url;

/// Builds the public links embedded in outgoing emails
#[derive(Debug, Clone)]
pub struct SubscriptionLinks {
    base_url: Url,
}

impl SubscriptionLinks {
    /// `base_url` is the externally reachable root of this service
    pub fn new(base_url: Url) -> anyhow::Result<Self> {
        if base_url.cannot_be_a_base() {
            anyhow::bail!("{} cannot be used as a base URL", base_url);
        }
        Ok(Self { base_url })
    }

    pub fn verify(&self, token: &str) -> Url {
        self.link(&["subscriptions", "verify"], token)
    }

    pub fn unsubscribe(&self, token: &str) -> Url {
        self.link(&["subscriptions", "unsubscribe"], token)
    }

    fn link(&self, path: &[&str], token: &str) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().extend(path);
        }
        url.query_pairs_mut().clear().append_pair("token", token);
        url
    }
}
