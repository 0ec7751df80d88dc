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

//! Builds the multipart content tree of an outbound message.
//!
//! The root is always `multipart/mixed`. An HTML rich body and its inline
//! media are grouped in a nested `multipart/related` container, any other
//! rich body is appended to the root as a single attachment.

use std::fmt::Display;

use mail_builder::{
    headers::{content_type::ContentType, raw::Raw, text::Text},
    mime::{BodyPart, MimePart},
};

use crate::{
    attachment::{resolve_source, ContentPart},
    message::MailMessage,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MultipartKind {
    Mixed,
    Related,
}

/// Container holding an ordered list of parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Multipart {
    pub kind: MultipartKind,
    pub parts: Vec<Part>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Part {
    Leaf(Leaf),
    Nested(Multipart),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Inline,
    Attachment,
}

/// Part without sub-parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Leaf {
    pub content_type: String,
    pub contents: Vec<u8>,
    pub filename: Option<String>,
    pub disposition: Option<Disposition>,
    /// Full header value, angle brackets included.
    pub content_id: Option<String>,
    /// Textual fallback for clients that cannot render the part.
    pub description: Option<String>,
}

/// Assembles the content tree for `message`.
///
/// `attachments` are the resolved file attachments, in the order they were
/// listed on the message. An empty tree is returned as is.
pub fn compose(message: &MailMessage, attachments: Vec<ContentPart>) -> Multipart {
    let mut root = Multipart::new(MultipartKind::Mixed);

    if let Some(text) = &message.text {
        root.push(Leaf::new("text/plain", text.as_bytes().to_vec()));
    }

    for attachment in attachments {
        root.push(Leaf::attachment(attachment));
    }

    if let Some(rich_body) = &message.rich_body {
        if rich_body.is_html() {
            let mut related = Multipart::new(MultipartKind::Related);
            related.push(Leaf::new("text/html", rich_body.contents.clone()));
            for media in &message.inline_media {
                related.push(Leaf::inline(resolve_source(media)));
            }
            root.parts.push(Part::Nested(related));
        } else {
            root.push(Leaf::attachment(resolve_source(rich_body)));
        }
    }

    root
}

impl Multipart {
    pub fn new(kind: MultipartKind) -> Self {
        Multipart {
            kind,
            parts: Vec::new(),
        }
    }

    fn push(&mut self, leaf: Leaf) {
        self.parts.push(Part::Leaf(leaf));
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// Converts the tree into a MIME part ready to be used as a message body.
    pub fn into_mime(self) -> MimePart<'static> {
        MimePart::new(
            ContentType::new(format!("multipart/{}", self.kind)),
            BodyPart::Multipart(self.parts.into_iter().map(Part::into_mime).collect()),
        )
    }
}

impl Part {
    pub fn into_mime(self) -> MimePart<'static> {
        match self {
            Part::Leaf(leaf) => leaf.into_mime(),
            Part::Nested(multipart) => multipart.into_mime(),
        }
    }
}

impl Leaf {
    fn new(content_type: impl Into<String>, contents: Vec<u8>) -> Self {
        Leaf {
            content_type: content_type.into(),
            contents,
            filename: None,
            disposition: None,
            content_id: None,
            description: None,
        }
    }

    fn attachment(part: ContentPart) -> Self {
        Leaf {
            filename: Some(part.name),
            disposition: Some(Disposition::Attachment),
            ..Leaf::new(part.content_type, part.contents)
        }
    }

    fn inline(part: ContentPart) -> Self {
        Leaf {
            content_id: Some(format!("<{}>", part.name)),
            description: Some(part.name.clone()),
            filename: Some(part.name),
            disposition: Some(Disposition::Inline),
            ..Leaf::new(part.content_type, part.contents)
        }
    }

    pub fn into_mime(self) -> MimePart<'static> {
        let content_type = if self.content_type.trim().is_empty() {
            "application/octet-stream".to_string()
        } else {
            self.content_type
        };

        let (content_type, body) = if content_type.starts_with("text/") {
            match String::from_utf8(self.contents) {
                // Labels that already carry parameters are kept as given
                Ok(text) if content_type.contains(';') => {
                    (ContentType::new(content_type), BodyPart::Text(text.into()))
                }
                Ok(text) => (
                    ContentType::new(content_type).attribute("charset", "utf-8"),
                    BodyPart::Text(text.into()),
                ),
                Err(err) => (
                    ContentType::new(content_type),
                    BodyPart::Binary(err.into_bytes().into()),
                ),
            }
        } else {
            (
                ContentType::new(content_type),
                BodyPart::Binary(self.contents.into()),
            )
        };

        let mut part = MimePart::new(content_type, body);

        if let Some(disposition) = self.disposition {
            let mut value = ContentType::new(disposition.to_string());
            if let Some(filename) = self.filename {
                value = value.attribute("filename", filename);
            }
            part = part.header("Content-Disposition", value);
        }
        if let Some(content_id) = self.content_id {
            part = part.header("Content-ID", Raw::new(content_id));
        }
        if let Some(description) = self.description {
            part = part.header("Content-Description", Text::new(description));
        }

        part
    }
}

impl Display for MultipartKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MultipartKind::Mixed => write!(f, "mixed"),
            MultipartKind::Related => write!(f, "related"),
        }
    }
}

impl Display for Disposition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Disposition::Inline => write!(f, "inline"),
            Disposition::Attachment => write!(f, "attachment"),
        }
    }
}

#[cfg(test)]
mod test {
    use mail_builder::MessageBuilder;

    use crate::{
        attachment::ContentPart,
        message::{DataSource, MailMessage},
    };

    use super::{compose, Disposition, Leaf, Multipart, MultipartKind, Part};

    fn leaf(part: &Part) -> &Leaf {
        match part {
            Part::Leaf(leaf) => leaf,
            Part::Nested(_) => panic!("expected a leaf part"),
        }
    }

    fn content_part(name: &str) -> ContentPart {
        ContentPart {
            name: name.to_string(),
            content_type: "application/pdf".to_string(),
            contents: name.as_bytes().to_vec(),
        }
    }

    fn html_message(media: &[&str]) -> MailMessage {
        media.iter().fold(
            MailMessage::new("reports@example.com").rich_body(DataSource::new(
                "report.html",
                "text/html",
                "<img src=\"cid:chart.png\">",
            )),
            |message, name| message.inline_media(DataSource::new(*name, "image/png", vec![0x89])),
        )
    }

    #[test]
    fn text_only() {
        let tree = compose(
            &MailMessage::new("reports@example.com").text("Hello,\r\n\r\nréport attached."),
            vec![],
        );

        assert_eq!(tree.kind, MultipartKind::Mixed);
        assert_eq!(tree.parts.len(), 1);
        let text = leaf(&tree.parts[0]);
        assert_eq!(text.content_type, "text/plain");
        assert_eq!(text.contents, "Hello,\r\n\r\nréport attached.".as_bytes());
        assert_eq!(text.disposition, None);
    }

    #[test]
    fn attachment_order() {
        let message = MailMessage::new("reports@example.com")
            .text("body")
            .attachment("/tmp/a.pdf")
            .attachment("/tmp/b.pdf")
            .attachment("/tmp/c.pdf");
        let tree = compose(
            &message,
            vec![content_part("a.pdf"), content_part("b.pdf"), content_part("c.pdf")],
        );

        assert_eq!(tree.parts.len(), 4);
        assert_eq!(leaf(&tree.parts[0]).content_type, "text/plain");
        for (part, name) in tree.parts[1..].iter().zip(["a.pdf", "b.pdf", "c.pdf"]) {
            let part = leaf(part);
            assert_eq!(part.filename.as_deref(), Some(name));
            assert_eq!(part.disposition, Some(Disposition::Attachment));
            assert_eq!(part.contents, name.as_bytes());
        }
    }

    #[test]
    fn html_with_inline_media() {
        let tree = compose(&html_message(&["chart.png", "logo.png", "chart.png"]), vec![]);

        assert_eq!(tree.parts.len(), 1);
        let related = match &tree.parts[0] {
            Part::Nested(related) => related,
            Part::Leaf(_) => panic!("expected a related container"),
        };
        assert_eq!(related.kind, MultipartKind::Related);
        assert_eq!(related.parts.len(), 4);

        let html = leaf(&related.parts[0]);
        assert_eq!(html.content_type, "text/html");
        assert_eq!(html.contents, b"<img src=\"cid:chart.png\">");
        assert_eq!(html.content_id, None);

        for (part, name) in related.parts[1..]
            .iter()
            .zip(["chart.png", "logo.png", "chart.png"])
        {
            let part = leaf(part);
            assert_eq!(part.content_id, Some(format!("<{name}>")));
            assert_eq!(part.filename.as_deref(), Some(name));
            assert_eq!(part.description.as_deref(), Some(name));
            assert_eq!(part.disposition, Some(Disposition::Inline));
            assert_eq!(part.content_type, "image/png");
            assert_eq!(part.contents, [0x89]);
        }
    }

    #[test]
    fn non_html_rich_body() {
        for label in ["text/html; charset=utf-8", "Text/HTML", "application/pdf", ""] {
            let message = MailMessage::new("reports@example.com")
                .rich_body(DataSource::new("report.bin", label, vec![1, 2, 3]))
                .inline_media(DataSource::new("chart.png", "image/png", vec![0x89]));
            let tree = compose(&message, vec![]);

            assert_eq!(tree.parts.len(), 1, "{label:?}");
            let part = leaf(&tree.parts[0]);
            assert_eq!(part.content_type, label);
            assert_eq!(part.filename.as_deref(), Some("report.bin"));
            assert_eq!(part.disposition, Some(Disposition::Attachment));
            assert_eq!(part.contents, [1, 2, 3]);
        }
    }

    #[test]
    fn inline_media_without_rich_body() {
        let message = MailMessage::new("reports@example.com")
            .inline_media(DataSource::new("chart.png", "image/png", vec![0x89]));
        let tree = compose(&message, vec![]);
        assert!(tree.is_empty());
        assert_eq!(tree, Multipart::new(MultipartKind::Mixed));
    }

    #[test]
    fn serialize_tree() {
        let message = html_message(&["chart.png"])
            .text("Plain text")
            .attachment("/tmp/a.pdf");
        let body = compose(&message, vec![content_part("a.pdf")]).into_mime();

        let bytes = MessageBuilder::new()
            .from("reports@example.com")
            .to("jane@example.com")
            .subject("Dashboard")
            .body(body)
            .write_to_vec()
            .unwrap();
        let text = String::from_utf8(bytes).unwrap();

        assert!(text.contains("multipart/mixed"), "{text}");
        assert!(text.contains("multipart/related"), "{text}");
        assert!(text.contains("Content-ID: <chart.png>"), "{text}");
        assert!(text.contains("Content-Disposition: inline; filename=\"chart.png\""), "{text}");
        assert!(text.contains("Content-Description: chart.png"), "{text}");
        assert!(
            text.contains("Content-Disposition: attachment; filename=\"a.pdf\""),
            "{text}"
        );
        assert!(text.contains("Plain text"), "{text}");

        let mixed = text.find("multipart/mixed").unwrap();
        let related = text.find("multipart/related").unwrap();
        assert!(mixed < related);
    }

    #[test]
    fn serialize_unlabelled_body() {
        let message = MailMessage::new("reports@example.com")
            .rich_body(DataSource::new("report.bin", "", vec![1, 2, 3]));
        let tree = compose(&message, vec![]);
        assert_eq!(leaf(&tree.parts[0]).content_type, "");

        let bytes = MessageBuilder::new()
            .from("reports@example.com")
            .body(tree.into_mime())
            .write_to_vec()
            .unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.contains("application/octet-stream"), "{text}");
    }

    #[test]
    fn serialize_labelled_charset() {
        let message = MailMessage::new("reports@example.com").rich_body(DataSource::new(
            "report.html",
            "text/html; charset=utf-8",
            "<p>Sales</p>",
        ));
        let bytes = MessageBuilder::new()
            .from("reports@example.com")
            .body(compose(&message, vec![]).into_mime())
            .write_to_vec()
            .unwrap();
        let text = String::from_utf8(bytes).unwrap();

        assert!(text.contains("text/html; charset=utf-8"), "{text}");
        assert_eq!(text.matches("charset").count(), 1, "{text}");
        assert!(
            text.contains("Content-Disposition: attachment; filename=\"report.html\""),
            "{text}"
        );
    }
}
