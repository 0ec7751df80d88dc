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

use smtp_proto::{response::parser::ResponseReceiver, Response};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::SmtpClient;

impl<T: AsyncRead + AsyncWrite + Unpin> SmtpClient<T> {
    pub(crate) async fn read(&mut self) -> crate::Result<Response<String>> {
        let mut buf = vec![0u8; 1024];
        let mut parser = ResponseReceiver::default();

        loop {
            let br = self.stream.read(&mut buf).await?;

            if br == 0 {
                return Err(crate::Error::UnparseableReply);
            }

            match parser.parse(&mut buf[..br].iter()) {
                Ok(reply) => return Ok(reply),
                Err(err) => match err {
                    smtp_proto::Error::NeedsMoreData { .. } => (),
                    _ => {
                        return Err(crate::Error::UnparseableReply);
                    }
                },
            }
        }
    }

    /// Sends a command to the SMTP server and waits for a reply.
    pub async fn cmd(&mut self, cmd: impl AsRef<[u8]>) -> crate::Result<Response<String>> {
        tokio::time::timeout(self.timeout, async {
            self.stream.write_all(cmd.as_ref()).await?;
            self.stream.flush().await?;
            self.read().await
        })
        .await
        .map_err(|_| crate::Error::Timeout)?
    }
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use tokio_test::io::Builder;

    use crate::{smtp::AssertReply, SmtpClient};

    #[tokio::test]
    async fn multiline_reply() {
        let mut client = SmtpClient {
            stream: Builder::new()
                .write(b"NOOP\r\n")
                .read(b"250-first line\r\n250-second")
                .read(b" line\r\n250 last line\r\n")
                .build(),
            timeout: Duration::from_secs(30),
        };

        let reply = client.cmd(b"NOOP\r\n").await.unwrap();
        assert_eq!(reply.code, 250);
        assert!(reply.message.contains("first line"));
        assert!(reply.message.contains("last line"));
        reply.assert_positive_completion().unwrap();
    }

    #[tokio::test]
    async fn closed_connection() {
        let mut client = SmtpClient {
            stream: Builder::new().write(b"NOOP\r\n").build(),
            timeout: Duration::from_secs(30),
        };

        assert!(matches!(
            client.cmd(b"NOOP\r\n").await,
            Err(crate::Error::UnparseableReply)
        ));
    }
}
