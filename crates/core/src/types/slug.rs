//! URL slugs for catalog entries.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Slug used when a title contains nothing slug-worthy.
const FALLBACK_SLUG: &str = "product";

/// A URL-safe product identifier derived from its title.
///
/// Slugs contain only lowercase ASCII letters, digits, `-` and `_`, never
/// start or end with a separator, and are never empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Slug(String);

impl Slug {
    /// Derive a slug from a product title.
    ///
    /// ```
    /// # use evault_core::Slug;
    /// assert_eq!(Slug::from_title("Brake Pad (Front) - Swift").as_str(), "brake-pad-front-swift");
    /// ```
    #[must_use]
    pub fn from_title(title: &str) -> Self {
        let slug = slugify(title);
        if slug.is_empty() {
            Self(FALLBACK_SLUG.to_owned())
        } else {
            Self(slug)
        }
    }

    /// Wrap a slug that was already stored.
    #[must_use]
    pub fn from_stored(slug: String) -> Self {
        Self(slug)
    }

    /// The `n`th collision candidate: `base-n`.
    #[must_use]
    pub fn with_suffix(&self, n: u32) -> Self {
        Self(format!("{}-{n}", self.0))
    }

    /// Returns the slug as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the slug and returns its inner string.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for Slug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Slug {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Lowercase, drop anything that isn't a word character, whitespace or `-`,
/// then collapse whitespace and dash runs into a single `-`.
///
/// Non-ASCII characters are dropped rather than transliterated.
#[must_use]
pub fn slugify(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut pending_dash = false;

    for c in input.chars() {
        if c.is_ascii_alphanumeric() || c == '_' {
            if pending_dash && !out.is_empty() {
                out.push('-');
            }
            pending_dash = false;
            out.push(c.to_ascii_lowercase());
        } else if c.is_whitespace() || c == '-' {
            pending_dash = true;
        }
    }

    out.trim_matches(|c| c == '-' || c == '_').to_owned()
}
