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

use std::{convert::TryFrom, io, sync::Arc};

use rustls::{ClientConfig, RootCertStore};
use rustls_pki_types::{ServerName, TrustAnchor};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_rustls::{client::TlsStream, TlsConnector};

use crate::{Error, SmtpClient};

use super::AssertReply;

impl<T: AsyncRead + AsyncWrite + Unpin> SmtpClient<T> {
    /// Upgrade the connection to TLS.
    pub async fn start_tls(
        mut self,
        tls_connector: &TlsConnector,
        hostname: &str,
    ) -> crate::Result<SmtpClient<TlsStream<T>>> {
        // Send STARTTLS command
        self.cmd(b"STARTTLS\r\n")
            .await?
            .assert_positive_completion()?;

        self.into_tls(tls_connector, hostname).await
    }

    pub async fn into_tls(
        self,
        tls_connector: &TlsConnector,
        hostname: &str,
    ) -> crate::Result<SmtpClient<TlsStream<T>>> {
        let server_name = ServerName::try_from(hostname)
            .map_err(|_| crate::Error::InvalidTLSName)?
            .to_owned();

        tokio::time::timeout(self.timeout, async {
            Ok(SmtpClient {
                stream: tls_connector
                    .connect(server_name, self.stream)
                    .await
                    .map_err(|err| {
                        let kind = err.kind();
                        if let Some(inner) = err.into_inner() {
                            match inner.downcast::<rustls::Error>() {
                                Ok(error) => Error::Tls(error),
                                Err(error) => Error::Io(io::Error::new(kind, error)),
                            }
                        } else {
                            Error::Io(io::Error::new(kind, "Unspecified"))
                        }
                    })?,
                timeout: self.timeout,
            })
        })
        .await
        .map_err(|_| crate::Error::Timeout)?
    }
}

pub fn build_tls_connector() -> TlsConnector {
    let mut root_cert_store = RootCertStore::empty();

    root_cert_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().map(|ta| TrustAnchor {
        subject: ta.subject.clone(),
        subject_public_key_info: ta.subject_public_key_info.clone(),
        name_constraints: ta.name_constraints.clone(),
    }));

    let config = ClientConfig::builder()
        .with_root_certificates(root_cert_store)
        .with_no_client_auth();

    TlsConnector::from(Arc::new(config))
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use tokio_test::io::Builder;

    use crate::SmtpClient;

    use super::build_tls_connector;

    #[tokio::test]
    async fn invalid_tls_name() {
        let client = SmtpClient {
            stream: Builder::new().build(),
            timeout: Duration::from_secs(30),
        };

        assert!(matches!(
            client
                .into_tls(&build_tls_connector(), "not a host name")
                .await,
            Err(crate::Error::InvalidTLSName)
        ));
    }

    #[tokio::test]
    async fn starttls_refused() {
        let client = SmtpClient {
            stream: Builder::new()
                .write(b"STARTTLS\r\n")
                .read(b"454 4.7.0 TLS not available\r\n")
                .build(),
            timeout: Duration::from_secs(30),
        };

        match client
            .start_tls(&build_tls_connector(), "mx.example.com")
            .await
        {
            Err(crate::Error::UnexpectedReply(reply)) => assert_eq!(reply.code, 454),
            Err(err) => panic!("unexpected error {err}"),
            Ok(_) => panic!("STARTTLS should have been refused"),
        }
    }
}
