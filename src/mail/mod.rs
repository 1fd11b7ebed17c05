//! This module holds the outgoing mail integration.
//!
//! Login codes are delivered by mail. Delivery is best effort: a failed send
//! is logged but never fails the request that triggered it, as the code can
//! simply be requested again.

use log::{error, info};

use crate::config::{Config, MailProvider};
use crate::mail::mailgun::MailgunClient;

pub mod mailgun;

/// The configured mail backend
#[derive(Clone)]
pub enum MailClient {
    /// Deliver through the Mailgun HTTP API
    Mailgun(MailgunClient),
    /// Log the mail instead of sending it, for local development
    Log,
}

impl MailClient {
    /// Construct the backend selected in the config
    pub fn from_config(config: &Config) -> Self {
        match config.mail.provider {
            MailProvider::Mailgun => MailClient::Mailgun(MailgunClient::new(
                config.mail.mailgun_api_key.clone(),
                config.mail.mailgun_domain.clone(),
                config.mail.mailgun_base_url.clone(),
                config.mail.from_address.clone(),
            )),
            MailProvider::Log => MailClient::Log,
        }
    }

    /// Send a login code to `email`.
    ///
    /// Failures are logged and swallowed.
    pub async fn send_code(&self, email: &str, code: &str) {
        match self {
            MailClient::Mailgun(client) => {
                if let Err(err) = client.send_code(email, code).await {
                    error!("Could not send login code to {email}: {err}");
                }
            }
            MailClient::Log => {
                info!("Login code for {email}: {code}");
            }
        }
    }
}
