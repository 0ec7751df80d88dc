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

use tokio::io::{AsyncRead, AsyncWrite};

use crate::SmtpClient;

use super::AssertReply;

impl<T: AsyncRead + AsyncWrite + Unpin> SmtpClient<T> {
    /// Sends a MAIL FROM command to the server.
    pub async fn mail_from(&mut self, addr: &str) -> crate::Result<()> {
        self.cmd(format!("MAIL FROM:<{addr}>\r\n").as_bytes())
            .await?
            .assert_positive_completion()
    }

    /// Sends a RCPT TO command to the server.
    pub async fn rcpt_to(&mut self, addr: &str) -> crate::Result<()> {
        self.cmd(format!("RCPT TO:<{addr}>\r\n").as_bytes())
            .await?
            .assert_positive_completion()
    }

    /// Sends a DATA command to the server.
    pub async fn data(&mut self, message: impl AsRef<[u8]>) -> crate::Result<()> {
        self.cmd(b"DATA\r\n").await?.assert_code(354)?;
        tokio::time::timeout(self.timeout, async {
            // Write message
            self.write_message(message.as_ref()).await?;
            self.read().await
        })
        .await
        .map_err(|_| crate::Error::Timeout)??
        .assert_positive_completion()
    }

    /// Sends a QUIT command to the server.
    pub async fn quit(mut self) -> crate::Result<()> {
        self.cmd(b"QUIT\r\n").await?.assert_positive_completion()
    }
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use tokio_test::io::Builder;

    use crate::SmtpClient;

    #[tokio::test]
    async fn data_refused() {
        let mut client = SmtpClient {
            stream: Builder::new()
                .write(b"MAIL FROM:<reports@example.com>\r\n")
                .read(b"250 2.1.0 OK\r\n")
                .write(b"DATA\r\n")
                .read(b"554 5.5.1 No valid recipients\r\n")
                .build(),
            timeout: Duration::from_secs(30),
        };

        client.mail_from("reports@example.com").await.unwrap();
        match client.data(b"Subject: x\r\n\r\nx").await {
            Err(crate::Error::UnexpectedReply(reply)) => assert_eq!(reply.code, 554),
            other => panic!("unexpected result {other:?}"),
        }
    }
}
