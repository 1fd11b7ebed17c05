//! The Mailgun HTTP API client

use std::fmt::{Display, Formatter};

use log::debug;

/// The errors that can occur while talking to Mailgun
#[derive(Debug)]
pub enum MailError {
    /// The request could not be sent or the response not be read
    Transport(reqwest::Error),
    /// Mailgun answered with a non-success status
    Rejected(u16, String),
}

impl Display for MailError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            MailError::Transport(err) => write!(f, "{err}"),
            MailError::Rejected(status, body) => {
                write!(f, "Mailgun rejected the message: {status}: {body}")
            }
        }
    }
}

impl From<reqwest::Error> for MailError {
    fn from(value: reqwest::Error) -> Self {
        Self::Transport(value)
    }
}

/// A client for the Mailgun messages API
#[derive(Clone)]
pub struct MailgunClient {
    client: reqwest::Client,
    api_key: String,
    domain: String,
    base_url: String,
    from_address: String,
}

impl MailgunClient {
    /// Construct a new client for the given Mailgun domain
    pub fn new(api_key: String, domain: String, base_url: String, from_address: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            domain,
            base_url,
            from_address,
        }
    }

    /// Deliver a login code to `email`
    pub async fn send_code(&self, email: &str, code: &str) -> Result<(), MailError> {
        let url = format!("{}/v3/{}/messages", self.base_url, self.domain);

        let text = format!("Your login code is {code}. It expires in a few minutes.");
        let html = format!(
            "<p>Your login code is <strong>{code}</strong>. It expires in a few minutes.</p>"
        );

        let params = [
            ("from", self.from_address.as_str()),
            ("to", email),
            ("subject", "Your login code"),
            ("text", text.as_str()),
            ("html", html.as_str()),
        ];

        let response = self
            .client
            .post(&url)
            .basic_auth("api", Some(&self.api_key))
            .form(&params)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MailError::Rejected(status.as_u16(), body));
        }

        debug!("Delivered login code to {email}");

        Ok(())
    }
}
