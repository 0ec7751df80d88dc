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

use std::time::Duration;

use crate::{config::Security, smtp::auth::Credentials, TransportConfig};

/// Whether sessions authenticate against the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthStrategy {
    Anonymous,
    Authenticated(Credentials<'static>),
}

/// Settings for a single delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub host: String,
    pub port: u16,
    pub security: Security,
    pub timeout: Duration,
    credentials: Option<Credentials<'static>>,
}

impl AuthStrategy {
    pub fn from_config(config: &TransportConfig) -> Self {
        match &config.credentials {
            Some(credentials) => AuthStrategy::Authenticated(credentials.clone()),
            None => AuthStrategy::Anonymous,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, AuthStrategy::Authenticated(_))
    }

    /// Creates a session for `config`, carrying credentials only when authenticated.
    pub fn session(&self, config: &TransportConfig) -> Session {
        Session {
            host: config.host.clone(),
            port: config.port,
            security: config.security,
            timeout: config.timeout,
            credentials: match self {
                AuthStrategy::Authenticated(credentials) => Some(credentials.clone()),
                AuthStrategy::Anonymous => None,
            },
        }
    }
}

impl Session {
    /// Username and password captured when the session was created.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        self.credentials.as_ref().map(Credentials::pair)
    }

    pub(crate) fn smtp_credentials(&self) -> Option<&Credentials<'static>> {
        self.credentials.as_ref()
    }
}

#[cfg(test)]
mod test {
    use crate::{config::Security, TransportConfig};

    use super::AuthStrategy;

    #[test]
    fn anonymous_session() {
        let config = TransportConfig::new("mx.example.com")
            .port(2525)
            .security(Security::StartTls);
        let strategy = AuthStrategy::from_config(&config);
        assert_eq!(strategy, AuthStrategy::Anonymous);

        let session = strategy.session(&config);
        assert_eq!(session.host, "mx.example.com");
        assert_eq!(session.port, 2525);
        assert_eq!(session.security, Security::StartTls);
        assert_eq!(session.credentials(), None);
    }

    #[test]
    fn authenticated_session() {
        let config = TransportConfig::new("mx.example.com").credentials(("user", "pass"));
        let strategy = AuthStrategy::from_config(&config);
        assert!(strategy.is_authenticated());
        assert_eq!(
            strategy.session(&config).credentials(),
            Some(("user", "pass"))
        );

        // Captured at construction time
        let replaced = TransportConfig::new("mx.example.com").credentials(("other", "secret"));
        assert_eq!(
            strategy.session(&replaced).credentials(),
            Some(("user", "pass"))
        );
    }

    #[test]
    fn session_debug_hides_password() {
        let config = TransportConfig::new("mx.example.com").credentials(("user", "hunter2"));
        let session = AuthStrategy::from_config(&config).session(&config);
        let debug = format!("{session:?}");
        assert!(debug.contains("user"));
        assert!(!debug.contains("hunter2"));
    }
}
