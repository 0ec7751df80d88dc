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

use super::DataSource;

/// Generated report output as handed over by the report pipeline.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReportOutput {
    pub content_type: String,
    pub content_extension: String,
    pub content_message: String,
    pub content: Vec<u8>,
}

impl ReportOutput {
    /// File name for the output, `base` plus the content extension.
    pub fn file_name(&self, base: &str) -> String {
        let extension = self.content_extension.trim_start_matches('.');
        if extension.is_empty() {
            base.to_string()
        } else {
            format!("{base}.{extension}")
        }
    }

    pub fn into_data_source(self, name: impl Into<String>) -> DataSource {
        DataSource {
            name: name.into(),
            content_type: self.content_type,
            contents: self.content,
        }
    }
}
