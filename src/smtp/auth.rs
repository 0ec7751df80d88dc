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

use std::{borrow::Cow, fmt::Display};

use base64::{engine::general_purpose::STANDARD, Engine};
use smtp_proto::{EhloResponse, AUTH_CRAM_MD5, AUTH_DIGEST_MD5, AUTH_LOGIN, AUTH_PLAIN};
use tokio::io::{AsyncRead, AsyncWrite};

use crate::SmtpClient;

/// Username and password handed to the server during `AUTH`.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials<'x> {
    username: Cow<'x, str>,
    secret: Cow<'x, str>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    InvalidChallenge,
}

/// Mechanisms tried against the server, most secure first.
const PREFERRED_MECHANISMS: [u64; 4] = [AUTH_CRAM_MD5, AUTH_DIGEST_MD5, AUTH_LOGIN, AUTH_PLAIN];

impl<T: AsyncRead + AsyncWrite + Unpin> SmtpClient<T> {
    /// Authenticates with the strongest mechanism both sides support.
    pub async fn authenticate(
        &mut self,
        credentials: &Credentials<'_>,
        capabilities: &EhloResponse<String>,
    ) -> crate::Result<&mut Self> {
        let mechanisms = capabilities.auth_mechanisms;
        let mut has_err = None;

        for mechanism in PREFERRED_MECHANISMS {
            if mechanisms & mechanism == 0 || !is_supported(mechanism) {
                continue;
            }
            match self.auth(mechanism, credentials).await {
                Ok(_) => return Ok(self),
                Err(crate::Error::UnexpectedReply(reply)) => {
                    tracing::debug!(
                        mechanism = mechanism_name(mechanism),
                        code = reply.code,
                        "Mechanism refused, trying the next one"
                    );
                    has_err = Some(reply);
                }
                Err(err) => return Err(err),
            }
        }

        if let Some(reply) = has_err {
            Err(crate::Error::AuthenticationFailed(reply))
        } else {
            Err(crate::Error::UnsupportedAuthMechanism)
        }
    }

    pub(crate) async fn auth(
        &mut self,
        mechanism: u64,
        credentials: &Credentials<'_>,
    ) -> crate::Result<()> {
        tracing::debug!(mechanism = mechanism_name(mechanism), "Authenticating");

        let mut reply = if mechanism == AUTH_PLAIN {
            self.cmd(
                format!(
                    "AUTH {} {}\r\n",
                    mechanism_name(mechanism),
                    credentials.encode(mechanism, "")?
                )
                .as_bytes(),
            )
            .await?
        } else {
            self.cmd(format!("AUTH {}\r\n", mechanism_name(mechanism)).as_bytes())
                .await?
        };

        for _ in 0..3 {
            match reply.code {
                334 => {
                    reply = self
                        .cmd(
                            format!("{}\r\n", credentials.encode(mechanism, &reply.message)?)
                                .as_bytes(),
                        )
                        .await?;
                }
                235 => {
                    return Ok(());
                }
                _ => {
                    return Err(crate::Error::UnexpectedReply(reply));
                }
            }
        }

        match reply.code {
            235 => Ok(()),
            334 => {
                // Server still expects a response, cancel the exchange
                self.cmd(b"*\r\n").await?;
                Err(crate::Error::UnexpectedReply(reply))
            }
            _ => Err(crate::Error::UnexpectedReply(reply)),
        }
    }
}

fn is_supported(mechanism: u64) -> bool {
    match mechanism {
        AUTH_PLAIN | AUTH_LOGIN => true,
        #[cfg(feature = "digest-md5")]
        AUTH_DIGEST_MD5 => true,
        #[cfg(feature = "cram-md5")]
        AUTH_CRAM_MD5 => true,
        _ => false,
    }
}

fn mechanism_name(mechanism: u64) -> &'static str {
    match mechanism {
        AUTH_PLAIN => "PLAIN",
        AUTH_LOGIN => "LOGIN",
        AUTH_DIGEST_MD5 => "DIGEST-MD5",
        AUTH_CRAM_MD5 => "CRAM-MD5",
        _ => "UNKNOWN",
    }
}

impl<'x> Credentials<'x> {
    /// Creates a new `Credentials` instance.
    pub fn new(
        username: impl Into<Cow<'x, str>>,
        secret: impl Into<Cow<'x, str>>,
    ) -> Credentials<'x> {
        Credentials {
            username: username.into(),
            secret: secret.into(),
        }
    }

    /// Returns the `(username, password)` pair.
    pub fn pair(&self) -> (&str, &str) {
        (&self.username, &self.secret)
    }

    pub(crate) fn encode(&self, mechanism: u64, challenge: &str) -> crate::Result<String> {
        Ok(STANDARD.encode(
            match mechanism {
                AUTH_PLAIN => {
                    format!("\u{0}{}\u{0}{}", self.username, self.secret)
                }

                AUTH_LOGIN => {
                    let challenge = STANDARD.decode(challenge)?;

                    if b"user name"
                        .eq_ignore_ascii_case(challenge.get(0..9).ok_or(Error::InvalidChallenge)?)
                        || b"username".eq_ignore_ascii_case(
                            // Because Google makes its own standards
                            challenge.get(0..8).ok_or(Error::InvalidChallenge)?,
                        )
                    {
                        &self.username
                    } else if b"password"
                        .eq_ignore_ascii_case(challenge.get(0..8).ok_or(Error::InvalidChallenge)?)
                    {
                        &self.secret
                    } else {
                        return Err(Error::InvalidChallenge.into());
                    }
                    .to_string()
                }

                #[cfg(feature = "digest-md5")]
                AUTH_DIGEST_MD5 => {
                    let challenge = STANDARD.decode(challenge)?;

                    // Second round: the server proves it knows the secret, answer empty
                    if challenge.starts_with(b"rspauth=") {
                        return Ok(String::new());
                    }

                    let mut values = parse_digest_challenge(&challenge)?;
                    let nonce = values.remove("nonce").ok_or(Error::InvalidChallenge)?;
                    let realm = values.remove("realm").unwrap_or_default();
                    let digest_uri = if realm.is_empty() {
                        "smtp/localhost".to_string()
                    } else {
                        format!("smtp/{realm}")
                    };
                    let charset = values
                        .remove("charset")
                        .unwrap_or_else(|| "utf-8".to_string());

                    #[allow(unused_variables)]
                    let cnonce = {
                        use rand::RngCore;
                        let mut buf = [0u8; 16];
                        rand::thread_rng().fill_bytes(&mut buf);
                        STANDARD.encode(buf)
                    };

                    #[cfg(test)]
                    let cnonce = "OA6MHXh6VqTrRk".to_string();

                    let response = digest_response(
                        &self.username,
                        &realm,
                        &self.secret,
                        &nonce,
                        &cnonce,
                        &digest_uri,
                    );

                    format!(
                        concat!(
                            "charset={},username=\"{}\",realm=\"{}\",nonce=\"{}\",nc=00000001,",
                            "cnonce=\"{}\",digest-uri=\"{}\",response={},qop=auth"
                        ),
                        charset, self.username, realm, nonce, cnonce, digest_uri, response
                    )
                }

                #[cfg(feature = "cram-md5")]
                AUTH_CRAM_MD5 => {
                    let mut secret_opad: Vec<u8> = vec![0x5c; 64];
                    let mut secret_ipad: Vec<u8> = vec![0x36; 64];

                    if self.secret.len() < 64 {
                        for (pos, byte) in self.secret.as_bytes().iter().enumerate() {
                            secret_opad[pos] = *byte ^ 0x5c;
                            secret_ipad[pos] = *byte ^ 0x36;
                        }
                    } else {
                        for (pos, byte) in md5::compute(self.secret.as_bytes()).iter().enumerate() {
                            secret_opad[pos] = *byte ^ 0x5c;
                            secret_ipad[pos] = *byte ^ 0x36;
                        }
                    }

                    secret_ipad.extend_from_slice(&STANDARD.decode(challenge)?);
                    secret_opad.extend_from_slice(&md5::compute(&secret_ipad).0);

                    format!("{} {:x}", self.username, md5::compute(&secret_opad))
                }

                _ => return Err(crate::Error::UnsupportedAuthMechanism),
            }
            .as_bytes(),
        ))
    }
}

/// Splits a DIGEST-MD5 challenge into its `key=value` directives.
#[cfg(feature = "digest-md5")]
fn parse_digest_challenge(
    challenge: &[u8],
) -> crate::Result<std::collections::HashMap<String, String>> {
    let mut values = std::collections::HashMap::new();
    let mut buf = Vec::with_capacity(10);
    let mut key = None;
    let mut in_quote = false;

    for (pos, &byte) in challenge.iter().enumerate() {
        let end_of_value = match byte {
            b'=' if !in_quote && key.is_none() => {
                if buf.is_empty() {
                    return Err(Error::InvalidChallenge.into());
                }
                key = Some(String::from_utf8_lossy(&buf).trim().to_string());
                buf.clear();
                false
            }
            b',' if !in_quote => true,
            b'"' => {
                in_quote = !in_quote;
                false
            }
            _ => {
                buf.push(byte);
                false
            }
        };

        if end_of_value || pos == challenge.len() - 1 {
            if let Some(key) = key.take() {
                values.insert(key, String::from_utf8_lossy(&buf).into_owned());
            }
            buf.clear();
        }
    }

    Ok(values)
}

/// RFC 2831 `response` value for `qop=auth` and `algorithm=md5-sess`.
#[cfg(feature = "digest-md5")]
fn digest_response(
    username: &str,
    realm: &str,
    secret: &str,
    nonce: &str,
    cnonce: &str,
    digest_uri: &str,
) -> String {
    let mut a1 = md5::compute(format!("{username}:{realm}:{secret}")).0.to_vec();
    a1.extend_from_slice(format!(":{nonce}:{cnonce}").as_bytes());
    let a2 = md5::compute(format!("AUTHENTICATE:{digest_uri}"));

    format!(
        "{:x}",
        md5::compute(format!(
            "{:x}:{nonce}:00000001:{cnonce}:auth:{a2:x}",
            md5::compute(&a1)
        ))
    )
}

impl<'x> From<(&'x str, &'x str)> for Credentials<'x> {
    fn from(credentials: (&'x str, &'x str)) -> Self {
        Credentials::new(credentials.0, credentials.1)
    }
}

impl From<(String, String)> for Credentials<'static> {
    fn from(credentials: (String, String)) -> Self {
        Credentials::new(credentials.0, credentials.1)
    }
}

impl std::fmt::Debug for Credentials<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("secret", &"<redacted>")
            .finish()
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::InvalidChallenge => write!(f, "Invalid challenge received."),
        }
    }
}
