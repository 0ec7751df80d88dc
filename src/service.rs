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

use std::{
    fmt::Display,
    sync::{Arc, PoisonError, RwLock},
};

use tracing::{instrument::WithSubscriber, Dispatch};

use crate::{
    attachment::resolve_all,
    compose::compose,
    config::{PropertySource, TransportConfig},
    dispatch::{dispatch, SmtpTransport, Transport},
    message::MailMessage,
    session::AuthStrategy,
    Error,
};

/// Composes and sends report messages with the current transport settings.
///
/// Settings are held as an immutable snapshot. [`MailService::reconfigure`]
/// replaces the snapshot for later sends, a send already in progress keeps
/// the one it started with.
pub struct MailService<T: Transport = SmtpTransport> {
    config: RwLock<Arc<TransportConfig>>,
    transport: T,
    dispatch: Dispatch,
}

/// Failure of a single send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailError {
    kind: ErrorKind,
    message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    AttachmentNotFound,
    InvalidAddress,
    TransportFailure,
}

impl MailService<SmtpTransport> {
    /// Reads the transport settings from `properties`.
    ///
    /// Events are sent to `dispatch`, the global subscriber is left alone.
    pub fn new(properties: &impl PropertySource, dispatch: Dispatch) -> Result<Self, MailError> {
        let config = tracing::dispatcher::with_default(&dispatch, || {
            TransportConfig::from_properties(properties).map_err(|err| {
                tracing::error!(error = %err, "Invalid mail transport settings");
                MailError::from(err)
            })
        })?;
        Ok(MailService::with_transport(
            config,
            SmtpTransport::new(),
            dispatch,
        ))
    }
}

impl<T: Transport> MailService<T> {
    pub fn with_transport(config: TransportConfig, transport: T, dispatch: Dispatch) -> Self {
        log_config(&dispatch, &config);
        MailService {
            config: RwLock::new(Arc::new(config)),
            transport,
            dispatch,
        }
    }

    /// Current settings snapshot.
    pub fn config(&self) -> Arc<TransportConfig> {
        self.config
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replaces the settings used by subsequent sends.
    pub fn reconfigure(&self, config: TransportConfig) {
        log_config(&self.dispatch, &config);
        *self.config.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(config);
    }

    /// Re-reads the settings from `properties`.
    ///
    /// The current settings stay in place when the new ones are invalid.
    pub fn reload(&self, properties: &impl PropertySource) -> Result<(), MailError> {
        let config = tracing::dispatcher::with_default(&self.dispatch, || {
            TransportConfig::from_properties(properties).map_err(|err| {
                tracing::error!(error = %err, "Invalid mail transport settings, keeping current ones");
                MailError::from(err)
            })
        })?;
        self.reconfigure(config);
        Ok(())
    }

    /// Resolves attachments, composes the message and makes one delivery attempt.
    pub async fn send_mail(&self, message: &MailMessage) -> Result<(), MailError> {
        let config = self.config();
        async move {
            self.send(&config, message).await.map_err(|err| {
                let err = MailError::from(err);
                tracing::error!(kind = ?err.kind, error = %err.message, "Failed to send mail");
                err
            })
        }
        .with_subscriber(self.dispatch.clone())
        .await
    }

    async fn send(&self, config: &TransportConfig, message: &MailMessage) -> crate::Result<()> {
        let attachments = resolve_all(&message.attachments).await?;
        let body = compose(message, attachments);
        let session = AuthStrategy::from_config(config).session(config);
        dispatch(&self.transport, &session, message, body).await?;
        tracing::info!(
            from = %message.sender,
            recipients = message.recipients.len(),
            "Mail sent"
        );
        Ok(())
    }
}

fn log_config(dispatch: &Dispatch, config: &TransportConfig) {
    tracing::dispatcher::with_default(dispatch, || {
        tracing::info!(
            host = %config.host,
            port = config.port,
            security = %config.security,
            authenticated = config.use_authentication(),
            "Mail transport configured"
        );
    });
}

impl MailError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        MailError {
            kind,
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<Error> for MailError {
    fn from(err: Error) -> Self {
        let kind = match &err {
            Error::Configuration(_) => ErrorKind::Configuration,
            Error::AttachmentNotFound { .. } => ErrorKind::AttachmentNotFound,
            Error::InvalidAddress(_) => ErrorKind::InvalidAddress,
            _ => ErrorKind::TransportFailure,
        };
        MailError::new(kind, err.to_string())
    }
}

impl Display for MailError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for MailError {}
