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

pub mod output;

/// Description of one outbound message.
///
/// Nothing is validated or read from disk until the message is sent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MailMessage {
    pub sender: String,
    pub recipients: Vec<String>,
    pub subject: Option<String>,
    pub text: Option<String>,
    /// File paths, resolved at send time.
    pub attachments: Vec<String>,
    pub rich_body: Option<DataSource>,
    /// Only used when the rich body is `text/html`.
    pub inline_media: Vec<DataSource>,
}

/// Named in-memory buffer with a content type label.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DataSource {
    pub name: String,
    pub content_type: String,
    pub contents: Vec<u8>,
}

impl MailMessage {
    /// Create a new message
    pub fn new(sender: impl Into<String>) -> Self {
        MailMessage {
            sender: sender.into(),
            ..Default::default()
        }
    }

    /// Add a message recipient.
    pub fn to(mut self, recipient: impl Into<String>) -> Self {
        self.recipients.push(recipient.into());
        self
    }

    /// Set the message subject.
    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    /// Set the plain text body.
    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Attach the file at `path`.
    pub fn attachment(mut self, path: impl Into<String>) -> Self {
        self.attachments.push(path.into());
        self
    }

    /// Set the rich body.
    pub fn rich_body(mut self, source: DataSource) -> Self {
        self.rich_body = Some(source);
        self
    }

    /// Add a media part referenced from an HTML rich body.
    pub fn inline_media(mut self, source: DataSource) -> Self {
        self.inline_media.push(source);
        self
    }
}

impl DataSource {
    pub fn new(
        name: impl Into<String>,
        content_type: impl Into<String>,
        contents: impl Into<Vec<u8>>,
    ) -> Self {
        DataSource {
            name: name.into(),
            content_type: content_type.into(),
            contents: contents.into(),
        }
    }

    pub fn is_html(&self) -> bool {
        self.content_type == "text/html"
    }
}
