//! This module holds the configuration for the server

use std::net::IpAddr;

use actix_toolbox::logging::LoggingConfig;
use serde::{Deserialize, Serialize};

/// Configuration regarding the server
#[derive(Deserialize, Serialize, Debug)]
#[serde(rename_all = "PascalCase")]
pub struct ServerConfig {
    /// The address the server should bind to
    pub listen_address: IpAddr,
    /// The port the server should bind to
    pub listen_port: u16,
    /// The key session cookies are signed with, at least 64 bytes
    pub secret_key: String,
}

/// Configuration regarding the database
#[derive(Deserialize, Serialize, Debug)]
#[serde(rename_all = "PascalCase")]
pub struct DBConfig {
    /// The host the database is running on
    pub host: String,
    /// The port the database is running on
    pub port: u16,
    /// The name of the database to use
    pub name: String,
    /// The user to use to connect to the database
    pub user: String,
    /// The password of the database user
    pub password: String,
}

/// The available providers for sending login codes
#[derive(Deserialize, Serialize, Debug, Copy, Clone, Eq, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum MailProvider {
    /// Deliver mails through the Mailgun HTTP API
    Mailgun,
    /// Don't deliver mails, only write the code to the server log.
    ///
    /// Intended for development setups.
    Log,
}

/// Configuration regarding the delivery of login codes
#[derive(Deserialize, Serialize, Debug)]
#[serde(rename_all = "PascalCase")]
pub struct MailConfig {
    /// The provider to deliver mails with
    pub provider: MailProvider,
    /// The address mails are sent from
    pub from_address: String,
    /// API key of the mailgun account
    #[serde(default)]
    pub mailgun_api_key: String,
    /// The mailgun domain to send from
    #[serde(default)]
    pub mailgun_domain: String,
    /// Base url of the mailgun API
    #[serde(default = "default_mailgun_base_url")]
    pub mailgun_base_url: String,
}

fn default_mailgun_base_url() -> String {
    String::from("https://api.mailgun.net")
}

/// Configuration regarding login codes
#[derive(Deserialize, Serialize, Debug)]
#[serde(rename_all = "PascalCase")]
pub struct AuthConfig {
    /// Minutes until an issued login code expires
    #[serde(default = "default_code_expiry_minutes")]
    pub code_expiry_minutes: i64,
}

fn default_code_expiry_minutes() -> i64 {
    5
}

/// This struct can be parsed from the configuration file
#[derive(Deserialize, Serialize, Debug)]
#[serde(rename_all = "PascalCase")]
pub struct Config {
    /// Configuration regarding the server
    pub server: ServerConfig,
    /// Configuration regarding the database
    pub database: DBConfig,
    /// Configuration regarding the delivery of login codes
    pub mail: MailConfig,
    /// Configuration regarding login codes
    pub auth: AuthConfig,
    /// The logging configuration
    pub logging: LoggingConfig,
}
