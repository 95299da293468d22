//! IPsec configuration document handling
//!
//! The configuration is held as an ordered sequence of lines and directives
//! are located by substring match, not by a grammar parse. Line count and
//! order are preserved by every operation except the targeted endpoint
//! rewrite.

use crate::error::Result;
use std::fs;
use std::path::Path;

/// Token marking a connection section header
const CONN_TOKEN: &str = "conn";
/// Endpoint marker used when reading the current server
const ENDPOINT_READ_MARKER: &str = "nordvpn.com";
/// Endpoint marker used when rewriting; the leading dot keeps bare mentions
/// of the domain out of the replacement
const ENDPOINT_WRITE_MARKER: &str = ".nordvpn.com";

/// An IPsec configuration document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IpsecConf {
    lines: Vec<String>,
}

impl IpsecConf {
    /// Load the configuration from disk
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(Self::from_content(&content))
    }

    /// Build a document from raw file content
    pub fn from_content(content: &str) -> Self {
        IpsecConf {
            lines: content.split('\n').map(str::to_string).collect(),
        }
    }

    /// Name of the managed connection: the text after the first space on the
    /// last line containing `conn`. Last match wins, since later directives
    /// override earlier ones (e.g. `conn %default` followed by `conn vpn1`).
    pub fn connection_name(&self) -> Option<String> {
        self.value_after_last(CONN_TOKEN, ' ')
    }

    /// Currently configured endpoint, read from the last line mentioning the
    /// endpoint domain (text after the first `=`).
    pub fn current_endpoint(&self) -> Option<String> {
        self.value_after_last(ENDPOINT_READ_MARKER, '=')
    }

    fn value_after_last(&self, marker: &str, separator: char) -> Option<String> {
        self.lines
            .iter()
            .rev()
            .find(|line| line.contains(marker))
            .and_then(|line| line.split_once(separator))
            .map(|(_, rest)| rest.to_string())
            .filter(|rest| !rest.is_empty())
    }

    /// Replace every endpoint line with `  right=<server>`, preserving the
    /// two-space indentation the directive carries inside a conn section.
    /// Returns the number of lines replaced; the file is expected to contain
    /// exactly one live directive, but none of the callers rely on that.
    pub fn rewrite_endpoint(&mut self, server: &str) -> usize {
        let mut replaced = 0;
        for line in &mut self.lines {
            if line.contains(ENDPOINT_WRITE_MARKER) {
                *line = format!("  right={server}");
                replaced += 1;
            }
        }
        replaced
    }

    /// Write the document back to disk. Plain overwrite; partial writes on
    /// failure are not guarded against.
    pub fn persist<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        fs::write(path, self.lines.join("\n"))?;
        Ok(())
    }

    /// The document's lines, in file order
    pub fn lines(&self) -> &[String] {
        &self.lines
    }
}
