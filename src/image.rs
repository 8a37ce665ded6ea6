//! Image reference (tag) parsing.
//!
//! Accepts `[registry[:port]/]repository[:tag]`. The fully-qualified form
//! always carries a tag; `latest` is assumed when none is given. This is
//! the subset of registry reference syntax that image tags use, not a
//! full registry reference grammar.

use anyhow::{bail, Result};
use std::fmt;

/// A parsed image reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    repository: String,
    tag: String,
}

impl Reference {
    /// Parse an image reference string.
    pub fn parse(s: &str) -> Result<Reference> {
        let s = s.trim();
        if s.is_empty() {
            bail!("empty image reference");
        }

        // A trailing ':tag' never contains '/'; a ':' followed by '/' is a
        // registry port.
        let (repository, tag) = match s.rfind(':') {
            Some(i) if !s[i + 1..].contains('/') => (&s[..i], &s[i + 1..]),
            _ => (s, "latest"),
        };

        if repository.is_empty() {
            bail!("missing repository in image reference: {:?}", s);
        }
        if tag.is_empty() {
            bail!("empty tag in image reference: {:?}", s);
        }
        if tag.len() > 128 {
            bail!("tag longer than 128 characters in image reference: {:?}", s);
        }

        for part in repository.split('/') {
            if part.is_empty() {
                bail!("empty path component in image reference: {:?}", s);
            }
        }
        if let Some(c) = repository
            .chars()
            .find(|c| !c.is_ascii_lowercase() && !c.is_ascii_digit() && !"./-_:".contains(*c))
        {
            bail!("invalid character {:?} in repository: {:?}", c, s);
        }
        if let Some(c) = tag
            .chars()
            .find(|c| !c.is_ascii_alphanumeric() && !"._-".contains(*c))
        {
            bail!("invalid character {:?} in tag: {:?}", c, s);
        }

        Ok(Reference {
            repository: repository.to_string(),
            tag: tag.to_string(),
        })
    }

    /// The bare tag string.
    pub fn tag_str(&self) -> &str {
        &self.tag
    }

    /// The repository part, without the tag.
    pub fn repository(&self) -> &str {
        &self.repository
    }
}

impl fmt::Display for Reference {
    /// The fully-qualified form, always including the tag.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.repository, self.tag)
    }
}
