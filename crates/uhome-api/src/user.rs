// Account endpoints (`Uhome.User` and `Uhome.Configure` namespaces)

use secrecy::{ExposeSecret, SecretString};
use serde_json::json;
use tracing::info;

use crate::client::UhomeClient;
use crate::envelope::{Namespace, Operation};
use crate::error::Error;
use crate::models::UserInfo;

impl UhomeClient {
    /// Fetch the authorized account's profile.
    pub async fn get_user(&self) -> Result<UserInfo, Error> {
        let payload = self
            .request(Namespace::User, Operation::Get, json!({}))
            .await?;
        let user = payload.get("user").cloned().unwrap_or(payload);
        let body = user.to_string();
        serde_json::from_value(user).map_err(|e| Error::Deserialization {
            message: e.to_string(),
            body,
        })
    }

    /// Register the webhook URL the vendor pushes device updates to.
    ///
    /// `access_token` is echoed back by the vendor on each push so the
    /// receiver can authenticate it.
    pub async fn set_notification_url(
        &self,
        url: &str,
        access_token: &SecretString,
    ) -> Result<(), Error> {
        self.request(
            Namespace::Configure,
            Operation::Set,
            json!({
                "configure": {
                    "notification": {
                        "access_token": access_token.expose_secret(),
                        "url": url,
                    }
                }
            }),
        )
        .await?;
        info!(url, "push notification url registered");
        Ok(())
    }
}
