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

//! Turns file paths and in-memory data sources into content parts.

use std::path::Path;

use crate::message::DataSource;

/// Resolved bytes plus the metadata needed to place them in a MIME tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentPart {
    pub name: String,
    pub content_type: String,
    pub contents: Vec<u8>,
}

/// Reads the file at `path` in full.
///
/// The media type is guessed from the file extension, falling back to
/// `application/octet-stream`. The display name is the file's base name.
pub async fn resolve_path(path: &str) -> crate::Result<ContentPart> {
    let contents =
        tokio::fs::read(path)
            .await
            .map_err(|err| crate::Error::AttachmentNotFound {
                path: path.to_string(),
                err,
            })?;

    let name = Path::new(path)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string());

    tracing::debug!(path, size = contents.len(), "Resolved attachment");

    Ok(ContentPart {
        content_type: mime_guess::from_path(path)
            .first_or_octet_stream()
            .essence_str()
            .to_string(),
        name,
        contents,
    })
}

/// Resolves every path in order, stopping at the first unreadable one.
pub async fn resolve_all(paths: &[String]) -> crate::Result<Vec<ContentPart>> {
    let mut parts = Vec::with_capacity(paths.len());
    for path in paths {
        parts.push(resolve_path(path).await?);
    }
    Ok(parts)
}

/// Carries a data source over unchanged.
pub fn resolve_source(source: &DataSource) -> ContentPart {
    ContentPart {
        name: source.name.clone(),
        content_type: source.content_type.clone(),
        contents: source.contents.clone(),
    }
}

#[cfg(test)]
mod test {
    use std::path::PathBuf;

    use crate::message::DataSource;

    use super::{resolve_all, resolve_path, resolve_source};

    fn temp_file(name: &str, contents: &[u8]) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("report-mailer-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[tokio::test]
    async fn resolve_file() {
        let path = temp_file("quarterly.pdf", b"%PDF-1.4");
        let part = resolve_path(path.to_str().unwrap()).await.unwrap();

        assert_eq!(part.name, "quarterly.pdf");
        assert_eq!(part.content_type, "application/pdf");
        assert_eq!(part.contents, b"%PDF-1.4");

        let path = temp_file("data.unknownext", b"\x00\x01");
        let part = resolve_path(path.to_str().unwrap()).await.unwrap();
        assert_eq!(part.content_type, "application/octet-stream");
    }

    #[tokio::test]
    async fn missing_file() {
        let path = std::env::temp_dir().join("report-mailer-does-not-exist.csv");
        let path = path.to_str().unwrap().to_string();

        match resolve_path(&path).await {
            Err(crate::Error::AttachmentNotFound { path: failed, .. }) => {
                assert_eq!(failed, path)
            }
            other => panic!("unexpected result {other:?}"),
        }
    }

    #[tokio::test]
    async fn resolve_in_order() {
        let a = temp_file("a.txt", b"a");
        let b = temp_file("b.csv", b"b");
        let paths = vec![
            b.to_str().unwrap().to_string(),
            a.to_str().unwrap().to_string(),
        ];

        let parts = resolve_all(&paths).await.unwrap();
        assert_eq!(
            parts.iter().map(|p| p.name.as_str()).collect::<Vec<_>>(),
            ["b.csv", "a.txt"]
        );

        let mut paths = paths;
        paths.insert(1, "/nonexistent/report-mailer/missing.pdf".to_string());
        assert!(matches!(
            resolve_all(&paths).await,
            Err(crate::Error::AttachmentNotFound { .. })
        ));
    }

    #[test]
    fn data_source_unchanged() {
        let source = DataSource::new("chart", "", vec![9, 8, 7]);
        let part = resolve_source(&source);
        assert_eq!(part.name, "chart");
        assert_eq!(part.content_type, "");
        assert_eq!(part.contents, [9, 8, 7]);
    }
}
