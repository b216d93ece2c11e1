// src/units/sourcemap.rs

//! Source map v3 documents.

use anyhow::{Context, Result};
use serde::Serialize;

const BASE64: &[u8; 64] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceMap {
    pub version: u8,
    pub file: String,
    pub sources: Vec<String>,
    pub sources_content: Vec<String>,
    pub names: Vec<String>,
    pub mappings: String,
}

impl SourceMap {
    pub fn new(file: impl Into<String>) -> Self {
        Self {
            version: 3,
            file: file.into(),
            sources: Vec::new(),
            sources_content: Vec::new(),
            names: Vec::new(),
            mappings: String::new(),
        }
    }

    /// Register a source and return its index.
    pub fn add_source(&mut self, name: impl Into<String>, content: impl Into<String>) -> usize {
        self.sources.push(name.into());
        self.sources_content.push(content.into());
        self.sources.len() - 1
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).context("serializing source map")
    }
}

/// Builds the `mappings` field one generated line at a time.
///
/// Every mapped line gets a single segment at column 0 pointing to column 0
/// of a source line.
#[derive(Debug, Default)]
pub struct LineMappings {
    lines: Vec<String>,
    prev_source: i64,
    prev_line: i64,
}

impl LineMappings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn map_line(&mut self, source: usize, source_line: usize) {
        let source = source as i64;
        let source_line = source_line as i64;

        let mut segment = String::new();
        encode_vlq(0, &mut segment);
        encode_vlq(source - self.prev_source, &mut segment);
        encode_vlq(source_line - self.prev_line, &mut segment);
        encode_vlq(0, &mut segment);

        self.prev_source = source;
        self.prev_line = source_line;
        self.lines.push(segment);
    }

    pub fn unmapped_line(&mut self) {
        self.lines.push(String::new());
    }

    pub fn finish(self) -> String {
        self.lines.join(";")
    }
}

/// Append the Base64 VLQ encoding of `value`.
pub fn encode_vlq(value: i64, out: &mut String) {
    let mut vlq: u64 = if value < 0 {
        (value.unsigned_abs() << 1) | 1
    } else {
        (value as u64) << 1
    };

    loop {
        let mut digit = (vlq & 0b1_1111) as usize;
        vlq >>= 5;
        if vlq > 0 {
            digit |= 0b10_0000;
        }
        out.push(BASE64[digit] as char);
        if vlq == 0 {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vlq(value: i64) -> String {
        let mut s = String::new();
        encode_vlq(value, &mut s);
        s
    }

    #[test]
    fn vlq_known_values() {
        assert_eq!(vlq(0), "A");
        assert_eq!(vlq(1), "C");
        assert_eq!(vlq(-1), "D");
        assert_eq!(vlq(15), "e");
        assert_eq!(vlq(16), "gB");
    }

    #[test]
    fn mappings_are_relative_to_previous_segment() {
        let mut m = LineMappings::new();
        m.map_line(0, 0);
        m.map_line(0, 1);
        m.unmapped_line();
        m.map_line(1, 0);
        assert_eq!(m.finish(), "AAAA;AACA;;ACDA");
    }

    #[test]
    fn json_uses_camel_case() {
        let mut map = SourceMap::new("main.js");
        map.add_source("src/js/main.js", "let a = 1;");
        let json = map.to_json().unwrap();
        assert!(json.contains("\"sourcesContent\":[\"let a = 1;\"]"));
        assert!(json.contains("\"version\":3"));
    }
}
