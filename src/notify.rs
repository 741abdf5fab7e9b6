//! Push group updates to member devices.

use serde::Serialize;

use crate::config::Push;
use crate::error::Result;
use crate::user::UserRepository;

/// What changed, as advertised to clients.
#[derive(Clone, Copy, Debug, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Event {
    GroupDataChanged,
    GroupNewMember,
    GroupMemberLeft,
    ShoppingListChanged,
    BillsChanged,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    registration_ids: &'a [String],
    data: Payload,
}

#[derive(Debug, Serialize)]
struct Payload {
    event: Event,
}

/// Push gateway client.
///
/// Unconfigured instances silently drop every event, so handlers never
/// need to care whether push is set up.
#[derive(Clone, Debug, Default)]
pub struct Notifier {
    endpoint: Option<String>,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl Notifier {
    /// Create a new [`Notifier`].
    pub fn new(config: &Push) -> Self {
        Self {
            endpoint: Some(config.endpoint.clone()),
            api_key: Some(config.api_key.clone()),
            client: reqwest::Client::new(),
        }
    }

    /// Notify every user in `user_ids` that has a registered device.
    ///
    /// Delivery is best effort. Callers log failures instead of
    /// propagating them into the originating request.
    pub async fn send(
        &self,
        users: &UserRepository,
        user_ids: &[String],
        event: Event,
    ) -> Result<()> {
        let (Some(endpoint), Some(api_key)) = (&self.endpoint, &self.api_key)
        else {
            tracing::trace!(?event, "push not configured, event dropped");
            return Ok(());
        };

        let tokens = users.push_tokens(user_ids).await?;
        if tokens.is_empty() {
            return Ok(());
        }

        self.client
            .post(endpoint)
            .bearer_auth(api_key)
            .json(&Message {
                registration_ids: &tokens,
                data: Payload { event },
            })
            .send()
            .await?
            .error_for_status()?;

        tracing::trace!(?event, recipients = tokens.len(), "event sent");

        Ok(())
    }
}
