//! Entry URL handling: pulling the one-shot `code` parameter out of the
//! location a guest landed on and producing the clean URL to show instead.

use std::sync::Mutex;

use url::Url;

use crate::services::artifacts::CODE_PARAM;

// Base used to resolve relative locations such as `/?code=...`.
const RELATIVE_BASE: &str = "http://localhost/";

/// A parsed entry location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryUrl {
    url: Url,
    relative: bool,
}

impl EntryUrl {
    /// Parse an absolute URL or a path-and-query relative to the site root.
    pub fn parse(location: &str) -> Result<Self, url::ParseError> {
        match Url::parse(location) {
            Ok(url) => Ok(Self {
                url,
                relative: false,
            }),
            Err(url::ParseError::RelativeUrlWithoutBase) => {
                let base = Url::parse(RELATIVE_BASE)?;
                Ok(Self {
                    url: base.join(location)?,
                    relative: true,
                })
            }
            Err(err) => Err(err),
        }
    }

    /// Trimmed `code` parameter, when present and non-empty.
    pub fn code(&self) -> Option<String> {
        self.url
            .query_pairs()
            .find(|(key, _)| key == CODE_PARAM)
            .map(|(_, value)| value.trim().to_owned())
            .filter(|code| !code.is_empty())
    }

    /// Same location with every `code` parameter removed and the others kept
    /// in order. Relative input yields a relative result.
    pub fn without_code(&self) -> String {
        let kept: Vec<(String, String)> = self
            .url
            .query_pairs()
            .filter(|(key, _)| key != CODE_PARAM)
            .map(|(key, value)| (key.into_owned(), value.into_owned()))
            .collect();

        let mut clean = self.url.clone();
        if kept.is_empty() {
            clean.set_query(None);
        } else {
            clean.query_pairs_mut().clear().extend_pairs(kept);
        }

        if self.relative {
            let mut out = clean.path().to_owned();
            if let Some(query) = clean.query() {
                out.push('?');
                out.push_str(query);
            }
            if let Some(fragment) = clean.fragment() {
                out.push('#');
                out.push_str(fragment);
            }
            out
        } else {
            clean.into()
        }
    }
}

/// Where a client currently is and how to move it without a new history entry.
pub trait Navigator: Send + Sync {
    /// Current location (absolute URL or path-and-query).
    fn location(&self) -> String;
    /// Replace the current location in place.
    fn replace(&self, location: String);
}

/// In-memory [`Navigator`] used by the HTTP entry route and tests.
#[derive(Debug, Default)]
pub struct MemoryNavigator {
    location: Mutex<String>,
}

impl MemoryNavigator {
    /// Start at `location`.
    pub fn new(location: impl Into<String>) -> Self {
        Self {
            location: Mutex::new(location.into()),
        }
    }
}

impl Navigator for MemoryNavigator {
    fn location(&self) -> String {
        match self.location.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn replace(&self, location: String) {
        match self.location.lock() {
            Ok(mut guard) => *guard = location,
            Err(poisoned) => *poisoned.into_inner() = location,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_entry_keeps_other_params() {
        let entry = EntryUrl::parse("/?lang=fr&code=%20WED-ABCDE%20&table=4").unwrap();
        assert_eq!(entry.code().as_deref(), Some("WED-ABCDE"));
        assert_eq!(entry.without_code(), "/?lang=fr&table=4");
    }

    #[test]
    fn absolute_entry_drops_empty_query() {
        let entry = EntryUrl::parse("https://party.example/reveal?code=WED-ABCDE").unwrap();
        assert_eq!(entry.without_code(), "https://party.example/reveal");
    }

    #[test]
    fn blank_code_is_absent() {
        assert_eq!(EntryUrl::parse("/?code=").unwrap().code(), None);
        assert_eq!(EntryUrl::parse("/").unwrap().code(), None);
        assert_eq!(EntryUrl::parse("/").unwrap().without_code(), "/");
    }

    #[test]
    fn memory_navigator_replaces_location() {
        let navigator = MemoryNavigator::new("/?code=X");
        navigator.replace("/".into());
        assert_eq!(navigator.location(), "/");
    }
}
