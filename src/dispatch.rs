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

use std::{future::Future, str::FromStr};

use mail_builder::{headers::address::Address, MessageBuilder};
use tokio::io::{AsyncRead, AsyncWrite};

use crate::{
    compose::Multipart, config::Security, message::MailMessage, session::Session, smtp,
    SmtpClient, SmtpClientBuilder,
};

/// Delivers a serialized message.
pub trait Transport: Send + Sync {
    fn deliver(
        &self,
        session: &Session,
        message: &smtp::Message<'_>,
    ) -> impl Future<Output = crate::Result<()>> + Send;
}

/// Delivers over SMTP, one connection per message.
#[derive(Debug, Clone, Default)]
pub struct SmtpTransport {
    helo_host: Option<String>,
}

/// Validated `local@domain` address with an optional display name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mailbox {
    pub name: Option<String>,
    pub email: String,
}

impl SmtpTransport {
    pub fn new() -> Self {
        SmtpTransport::default()
    }

    /// Sets the EHLO hostname, the local host name is used otherwise.
    pub fn helo_host(mut self, host: impl Into<String>) -> Self {
        self.helo_host = Some(host.into());
        self
    }
}

impl Transport for SmtpTransport {
    async fn deliver(&self, session: &Session, message: &smtp::Message<'_>) -> crate::Result<()> {
        let mut builder = SmtpClientBuilder::new(session.host.as_str(), session.port)
            .implicit_tls(session.security == Security::Tls)
            .timeout(session.timeout);
        if let Some(credentials) = session.smtp_credentials() {
            builder = builder.credentials(credentials.clone());
        }
        if let Some(host) = &self.helo_host {
            builder = builder.helo_host(host);
        }

        match session.security {
            Security::None => transaction(builder.connect_plain().await?, message).await,
            Security::StartTls | Security::Tls => {
                transaction(builder.connect().await?, message).await
            }
        }
    }
}

async fn transaction<T: AsyncRead + AsyncWrite + Unpin>(
    mut client: SmtpClient<T>,
    message: &smtp::Message<'_>,
) -> crate::Result<()> {
    client.send(message).await?;
    tracing::debug!(recipients = message.rcpt_to.len(), "Message accepted");

    // The message is already queued by the server at this point
    if let Err(err) = client.quit().await {
        tracing::warn!(error = %err, "QUIT failed after delivery");
    }
    Ok(())
}

/// Validates the addresses of `message` and serializes it with `body`.
pub fn envelope(message: &MailMessage, body: Multipart) -> crate::Result<smtp::Message<'static>> {
    let from = message.sender.parse::<Mailbox>()?;
    let to = message
        .recipients
        .iter()
        .map(|recipient| recipient.parse::<Mailbox>())
        .collect::<crate::Result<Vec<_>>>()?;

    let mut builder = MessageBuilder::new().from(from.to_header());
    if !to.is_empty() {
        builder = builder.to(Address::new_list(to.iter().map(Mailbox::to_header).collect()));
    }
    if let Some(subject) = &message.subject {
        // Line breaks would start a new header
        builder = builder.subject(subject.replace(['\r', '\n'], " "));
    }
    let body = builder.body(body.into_mime()).write_to_vec()?;

    Ok(smtp::Message {
        mail_from: from.email.into(),
        rcpt_to: to.into_iter().map(|mailbox| mailbox.email.into()).collect(),
        body: body.into(),
    })
}

/// Serializes the composed tree and hands it to `transport`.
///
/// Address errors are returned before the transport is touched.
pub async fn dispatch<T: Transport>(
    transport: &T,
    session: &Session,
    message: &MailMessage,
    body: Multipart,
) -> crate::Result<()> {
    let wire = envelope(message, body)?;
    tracing::debug!(
        host = %session.host,
        from = %wire.mail_from.email,
        recipients = wire.rcpt_to.len(),
        size = wire.body.len(),
        "Dispatching message"
    );
    transport.deliver(session, &wire).await
}

impl Mailbox {
    fn to_header(&self) -> Address<'_> {
        Address::new_address(self.name.as_deref(), self.email.as_str())
    }
}

impl FromStr for Mailbox {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || crate::Error::InvalidAddress(s.to_string());
        let value = s.trim();

        let (name, email) = match value.rfind('<') {
            Some(start) if value.ends_with('>') => {
                let name = value[..start].trim().trim_matches('"').trim();
                (
                    (!name.is_empty()).then(|| name.to_string()),
                    &value[start + 1..value.len() - 1],
                )
            }
            _ => (None, value),
        };

        let (local, domain) = email.rsplit_once('@').ok_or_else(invalid)?;
        let quoted = local.len() > 2 && local.starts_with('"') && local.ends_with('"');
        let local_valid = if quoted {
            // Quoted local parts may hold spaces and '@'
            local[1..local.len() - 1]
                .chars()
                .all(|c| !c.is_control() && c != '"' && c != '\\')
        } else {
            !local.is_empty() && local.chars().all(is_atom_char)
        };
        if !local_valid
            || domain.is_empty()
            || domain.split('.').any(str::is_empty)
            || !domain.chars().all(is_atom_char)
        {
            return Err(invalid());
        }

        Ok(Mailbox {
            name,
            email: email.to_string(),
        })
    }
}

fn is_atom_char(c: char) -> bool {
    !(c.is_whitespace() || c.is_control() || matches!(c, '<' | '>' | '@' | '"' | '\\'))
}
