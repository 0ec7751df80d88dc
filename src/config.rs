/*
 * Copyright Stalwart Labs Ltd. See the COPYING
 * file at the top-level directory of this distribution.
 *
 * Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
 * https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
 * <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
 * option. This file may not be copied, modified, or distributed
 * except according to those terms.
 */

//! Transport settings read from a key/value property store.

use std::{
    collections::{BTreeMap, HashMap},
    fmt::Display,
    hash::BuildHasher,
    str::FromStr,
    time::Duration,
};

use crate::smtp::auth::Credentials;

pub const MAIL_SMTP_HOST: &str = "mail.smtp.host";
pub const MAIL_SMTP_AUTH: &str = "mail.smtp.auth";
pub const MAIL_AUTH_USER: &str = "mail.auth.user";
pub const MAIL_AUTH_PASSWORD: &str = "mail.auth.password";
pub const MAIL_SMTP_PORT: &str = "mail.smtp.port";
pub const MAIL_SMTP_SECURITY: &str = "mail.smtp.security";
pub const MAIL_SMTP_TIMEOUT: &str = "mail.smtp.timeout";

const DEFAULT_PORT: u16 = 25;
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60 * 60);

/// Key/value store the transport settings are looked up in.
pub trait PropertySource {
    fn property(&self, key: &str) -> Option<String>;
}

impl<S: BuildHasher> PropertySource for HashMap<String, String, S> {
    fn property(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

impl PropertySource for BTreeMap<String, String> {
    fn property(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

/// How the connection to the SMTP server is secured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Security {
    /// Clear text.
    #[default]
    None,
    /// Clear text upgraded with STARTTLS.
    StartTls,
    /// TLS from the first byte.
    Tls,
}

/// Immutable snapshot of the transport settings.
///
/// Credentials are present exactly when authentication is enabled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportConfig {
    pub host: String,
    pub port: u16,
    pub security: Security,
    pub timeout: Duration,
    pub credentials: Option<Credentials<'static>>,
}

impl TransportConfig {
    pub fn new(host: impl Into<String>) -> Self {
        TransportConfig {
            host: host.into(),
            port: DEFAULT_PORT,
            security: Security::None,
            timeout: DEFAULT_TIMEOUT,
            credentials: None,
        }
    }

    /// Reads the settings from `properties`.
    ///
    /// Fails when the host is missing, when authentication is enabled without
    /// both a user and a password, or when a supplied value does not parse.
    pub fn from_properties(properties: &impl PropertySource) -> crate::Result<Self> {
        let host = lookup(properties, MAIL_SMTP_HOST).ok_or_else(|| {
            crate::Error::Configuration(format!("{MAIL_SMTP_HOST} is not set"))
        })?;

        let mut config = TransportConfig::new(host);

        if let Some(port) = lookup(properties, MAIL_SMTP_PORT) {
            config.port = parse_value(MAIL_SMTP_PORT, &port)?;
        }
        if let Some(security) = lookup(properties, MAIL_SMTP_SECURITY) {
            config.security = parse_value(MAIL_SMTP_SECURITY, &security)?;
        }
        if let Some(timeout) = lookup(properties, MAIL_SMTP_TIMEOUT) {
            config.timeout = Duration::from_secs(parse_value(MAIL_SMTP_TIMEOUT, &timeout)?);
        }

        let use_auth = properties
            .property(MAIL_SMTP_AUTH)
            .map_or(false, |value| value.eq_ignore_ascii_case("true"));
        if use_auth {
            match (
                lookup(properties, MAIL_AUTH_USER),
                properties.property(MAIL_AUTH_PASSWORD),
            ) {
                (Some(user), Some(password)) => {
                    config.credentials = Some(Credentials::new(user, password));
                }
                _ => {
                    return Err(crate::Error::Configuration(format!(
                        "{MAIL_SMTP_AUTH} is enabled but {MAIL_AUTH_USER} or {MAIL_AUTH_PASSWORD} is not set"
                    )));
                }
            }
        }

        Ok(config)
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn security(mut self, security: Security) -> Self {
        self.security = security;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Enables authentication with the given username and password.
    pub fn credentials(mut self, credentials: impl Into<Credentials<'static>>) -> Self {
        self.credentials = Some(credentials.into());
        self
    }

    pub fn use_authentication(&self) -> bool {
        self.credentials.is_some()
    }
}

// Blank values count as missing.
fn lookup(properties: &impl PropertySource, key: &str) -> Option<String> {
    properties
        .property(key)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_value<T: FromStr>(key: &str, value: &str) -> crate::Result<T> {
    value
        .parse()
        .map_err(|_| crate::Error::Configuration(format!("invalid value {value:?} for {key}")))
}

impl FromStr for Security {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" | "plain" => Ok(Security::None),
            "starttls" => Ok(Security::StartTls),
            "tls" | "ssl" => Ok(Security::Tls),
            _ => Err(()),
        }
    }
}

impl Display for Security {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Security::None => write!(f, "none"),
            Security::StartTls => write!(f, "starttls"),
            Security::Tls => write!(f, "tls"),
        }
    }
}

#[cfg(test)]
mod test {
    use std::{collections::HashMap, time::Duration};

    use super::{Security, TransportConfig};

    fn properties(entries: &[(&str, &str)]) -> HashMap<String, String> {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn defaults() {
        let config =
            TransportConfig::from_properties(&properties(&[("mail.smtp.host", "mx.example.com")]))
                .unwrap();
        assert_eq!(config, TransportConfig::new("mx.example.com"));
        assert_eq!(config.port, 25);
        assert_eq!(config.security, Security::None);
        assert!(!config.use_authentication());
    }

    #[test]
    fn missing_host() {
        for props in [
            properties(&[]),
            properties(&[("mail.smtp.host", "  ")]),
            properties(&[("mail.smtp.auth", "true")]),
        ] {
            assert!(matches!(
                TransportConfig::from_properties(&props),
                Err(crate::Error::Configuration(_))
            ));
        }
    }

    #[test]
    fn authentication_flag() {
        let config = TransportConfig::from_properties(&properties(&[
            ("mail.smtp.host", "mx.example.com"),
            ("mail.smtp.auth", "TRUE"),
            ("mail.auth.user", "reports"),
            ("mail.auth.password", "s3cr3t"),
        ]))
        .unwrap();
        assert_eq!(
            config.credentials.as_ref().map(|c| c.pair()),
            Some(("reports", "s3cr3t"))
        );

        // Anything but "true" leaves authentication off, credentials are ignored
        for flag in ["false", "yes", "1", ""] {
            let config = TransportConfig::from_properties(&properties(&[
                ("mail.smtp.host", "mx.example.com"),
                ("mail.smtp.auth", flag),
                ("mail.auth.user", "reports"),
                ("mail.auth.password", "s3cr3t"),
            ]))
            .unwrap();
            assert!(!config.use_authentication(), "flag {flag:?}");
        }

        assert!(matches!(
            TransportConfig::from_properties(&properties(&[
                ("mail.smtp.host", "mx.example.com"),
                ("mail.smtp.auth", "true"),
                ("mail.auth.user", "reports"),
            ])),
            Err(crate::Error::Configuration(_))
        ));
    }

    #[test]
    fn transport_settings() {
        let config = TransportConfig::from_properties(&properties(&[
            ("mail.smtp.host", "mx.example.com"),
            ("mail.smtp.port", "465"),
            ("mail.smtp.security", "TLS"),
            ("mail.smtp.timeout", "30"),
        ]))
        .unwrap();
        assert_eq!(config.port, 465);
        assert_eq!(config.security, Security::Tls);
        assert_eq!(config.timeout, Duration::from_secs(30));

        for (key, value) in [
            ("mail.smtp.port", "smtp"),
            ("mail.smtp.port", "70000"),
            ("mail.smtp.security", "maybe"),
            ("mail.smtp.timeout", "-1"),
        ] {
            assert!(
                matches!(
                    TransportConfig::from_properties(&properties(&[
                        ("mail.smtp.host", "mx.example.com"),
                        (key, value),
                    ])),
                    Err(crate::Error::Configuration(_))
                ),
                "{key}={value}"
            );
        }
    }
}
