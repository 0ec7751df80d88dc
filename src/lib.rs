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

//! # report-mailer
//!
//! _report-mailer_ composes multipart e-mail messages out of report output and delivers them
//! over SMTP. It includes the following features:
//!
//! - A plain message description ([`MailMessage`]) holding sender, recipients, subject, a
//!   plain-text body, file attachments and an optional rich body with inline media.
//! - Deterministic **MIME** tree composition (_RFC 2045 - 2049_): a `multipart/mixed` root with
//!   an optional nested `multipart/related` container when the rich body is HTML
//!   (_RFC 2387_), inline parts referenced through `Content-ID`.
//! - Simple Mail Transfer Protocol (**SMTP**; _RFC 5321_) delivery in plain text, over
//!   **STARTTLS** (_RFC 3207_) or implicit TLS.
//! - SMTP Service Extension for Authentication (_RFC 4954_) with automatic mechanism
//!   negotiation (from most secure to least secure):
//!   - CRAM-MD5 (_RFC 2195_)
//!   - DIGEST-MD5 (_RFC 2831_; obsolete but still supported)
//!   - LOGIN
//!   - PLAIN
//! - A single error type at the API boundary ([`MailError`]) that still tells the caller which
//!   class of failure stopped the send.
//! - Full async (requires Tokio).
//!
//! ## Usage Example
//!
//! Read the transport settings from a key/value store and mail a generated report:
//!
//! ```rust
//!     let mut properties = HashMap::new();
//!     properties.insert("mail.smtp.host".to_string(), "smtp.example.com".to_string());
//!     properties.insert("mail.smtp.auth".to_string(), "true".to_string());
//!     properties.insert("mail.auth.user".to_string(), "reports".to_string());
//!     properties.insert("mail.auth.password".to_string(), "s3cr3t".to_string());
//!
//!     let service = MailService::new(&properties, tracing::Dispatch::none()).unwrap();
//!
//!     let message = MailMessage::new("reports@example.com")
//!         .to("jane@example.com")
//!         .subject("Monthly sales")
//!         .text("The monthly sales report is attached.")
//!         .attachment("/var/reports/sales.pdf");
//!
//!     service.send_mail(&message).await.unwrap();
//! ```
//!
//! Send an HTML report with an embedded chart:
//!
//! ```rust
//!     let message = MailMessage::new("reports@example.com")
//!         .to("jane@example.com")
//!         .subject("Dashboard")
//!         .rich_body(DataSource::new(
//!             "dashboard.html",
//!             "text/html",
//!             r#"<img src="cid:chart.png">"#,
//!         ))
//!         .inline_media(DataSource::new("chart.png", "image/png", chart_png));
//!
//!     service.send_mail(&message).await.unwrap();
//! ```
//!
//! ## Testing
//!
//! To run the testsuite:
//!
//! ```bash
//!  $ cargo test --all-features
//! ```
//!
//! ## License
//!
//! Licensed under either of
//!
//!  * Apache License, Version 2.0 ([LICENSE-APACHE](LICENSE-APACHE) or <http://www.apache.org/licenses/LICENSE-2.0>)
//!  * MIT license ([LICENSE-MIT](LICENSE-MIT) or <http://opensource.org/licenses/MIT>)
//!
//! at your option.
//!

pub mod attachment;
pub mod compose;
pub mod config;
pub mod dispatch;
pub mod message;
pub mod service;
pub mod session;
#[forbid(unsafe_code)]
pub mod smtp;

use std::{fmt::Display, hash::Hash, time::Duration};

use smtp_proto::Response;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_rustls::TlsConnector;

pub use compose::{compose, Multipart, MultipartKind, Part};
pub use config::{PropertySource, Security, TransportConfig};
pub use dispatch::{SmtpTransport, Transport};
pub use mail_builder;
pub use message::{output::ReportOutput, DataSource, MailMessage};
pub use service::{ErrorKind, MailError, MailService};
pub use session::{AuthStrategy, Session};
pub use smtp::auth::Credentials;

#[derive(Debug)]
pub enum Error {
    /// I/O error
    Io(std::io::Error),

    /// TLS error
    Tls(Box<rustls::Error>),

    /// Base64 decode error
    Base64(base64::DecodeError),

    // SMTP authentication error.
    Auth(smtp::auth::Error),

    /// Failure parsing SMTP reply
    UnparseableReply,

    /// Unexpected SMTP reply.
    UnexpectedReply(Response<String>),

    /// SMTP authentication failure.
    AuthenticationFailed(Response<String>),

    /// Invalid TLS name provided.
    InvalidTLSName,

    /// The server does no support any of the available authentication methods.
    UnsupportedAuthMechanism,

    /// STARTTLS not available
    MissingStartTls,

    /// Connection timeout.
    Timeout,

    /// Required transport setting missing or malformed.
    Configuration(String),

    /// Attachment file could not be read.
    AttachmentNotFound { path: String, err: std::io::Error },

    /// Sender or recipient failed to parse.
    InvalidAddress(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// SMTP client connected to a server.
pub struct SmtpClient<T: AsyncRead + AsyncWrite> {
    pub stream: T,
    pub timeout: Duration,
}

/// Connection settings for an [`SmtpClient`].
#[derive(Clone)]
pub struct SmtpClientBuilder<T: AsRef<str> + PartialEq + Eq + Hash> {
    pub timeout: Duration,
    pub tls_connector: TlsConnector,
    pub tls_hostname: T,
    pub tls_implicit: bool,
    pub credentials: Option<Credentials<'static>>,
    pub addr: String,
    pub local_host: String,
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(err) => err.source(),
            Error::Tls(err) => err.source(),
            Error::Base64(err) => err.source(),
            Error::AttachmentNotFound { err, .. } => Some(err),
            _ => None,
        }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Io(e) => write!(f, "I/O error: {e}"),
            Error::Tls(e) => write!(f, "TLS error: {e}"),
            Error::Base64(e) => write!(f, "Base64 decode error: {e}"),
            Error::Auth(e) => write!(f, "SMTP authentication error: {e}"),
            Error::UnparseableReply => write!(f, "Unparseable SMTP reply"),
            Error::UnexpectedReply(e) => {
                write!(f, "Unexpected reply: {} {}", e.code, e.message)
            }
            Error::AuthenticationFailed(e) => {
                write!(f, "Authentication failed: {} {}", e.code, e.message)
            }
            Error::InvalidTLSName => write!(f, "Invalid TLS name provided"),
            Error::UnsupportedAuthMechanism => write!(
                f,
                "The server does no support any of the available authentication methods"
            ),
            Error::MissingStartTls => write!(f, "STARTTLS extension unavailable"),
            Error::Timeout => write!(f, "Connection timeout"),
            Error::Configuration(e) => write!(f, "Configuration error: {e}"),
            Error::AttachmentNotFound { path, err } => {
                write!(f, "Attachment {path:?} could not be read: {err}")
            }
            Error::InvalidAddress(e) => write!(f, "Invalid address: {e}"),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<base64::DecodeError> for Error {
    fn from(err: base64::DecodeError) -> Self {
        Error::Base64(err)
    }
}

impl From<smtp::auth::Error> for Error {
    fn from(err: smtp::auth::Error) -> Self {
        Error::Auth(err)
    }
}
