//! Bearer token sources.
//!
//! A [`TokenProvider`] is asked for a credential before every outgoing
//! request. An empty token means "send no `Authorization` header".

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use crate::Result;

/// Produces the bearer token attached to outgoing requests.
pub trait TokenProvider: Send + Sync + fmt::Debug {
    /// Obtain the current token. Empty means no authentication.
    fn get(&self) -> Result<String>;
}

/// Sends no credential.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpToken;

impl TokenProvider for NoOpToken {
    fn get(&self) -> Result<String> {
        Ok(String::new())
    }
}

/// A fixed token supplied on the command line.
#[derive(Clone)]
pub struct StaticToken {
    token: String,
}

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

impl fmt::Debug for StaticToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticToken").finish_non_exhaustive()
    }
}

impl TokenProvider for StaticToken {
    fn get(&self) -> Result<String> {
        Ok(self.token.clone())
    }
}

/// A token re-read from disk on every request, so rotated credentials are
/// picked up without a restart.
#[derive(Debug, Clone)]
pub struct FileToken {
    path: PathBuf,
}

impl FileToken {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl TokenProvider for FileToken {
    fn get(&self) -> Result<String> {
        let content = std::fs::read_to_string(&self.path)?;
        Ok(content.trim().to_string())
    }
}

/// Pick a token source: an explicit token wins over a token file; with
/// neither, requests are unauthenticated.
pub fn provider(token: Option<&str>, token_file: Option<PathBuf>) -> Arc<dyn TokenProvider> {
    match (token.filter(|t| !t.is_empty()), token_file) {
        (Some(token), _) => Arc::new(StaticToken::new(token)),
        (None, Some(path)) => Arc::new(FileToken::new(path)),
        (None, None) => Arc::new(NoOpToken),
    }
}

/// Format the `Authorization` header value for `token`, if any.
pub(crate) fn bearer(provider: &dyn TokenProvider) -> Result<Option<String>> {
    let token = provider.get()?;
    Ok((!token.is_empty()).then(|| format!("Bearer {token}")))
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::UpError;

    #[test]
    fn noop_is_empty() {
        assert_eq!(NoOpToken.get().unwrap(), "");
        assert_eq!(bearer(&NoOpToken).unwrap(), None);
    }

    #[test]
    fn static_token_is_returned_verbatim() {
        let token = StaticToken::new("abc");
        assert_eq!(token.get().unwrap(), "abc");
        assert_eq!(bearer(&token).unwrap().as_deref(), Some("Bearer abc"));
    }

    #[test]
    fn static_token_is_redacted_in_debug() {
        let rendered = format!("{:?}", StaticToken::new("secret"));
        assert!(!rendered.contains("secret"));
    }

    #[test]
    fn file_token_is_reread_each_time() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "first").unwrap();
        let token = FileToken::new(file.path());
        assert_eq!(token.get().unwrap(), "first");

        std::fs::write(file.path(), "second\n").unwrap();
        assert_eq!(token.get().unwrap(), "second");
    }

    #[test]
    fn missing_token_file_is_io_error() {
        let token = FileToken::new("/nonexistent/token");
        assert!(matches!(token.get(), Err(UpError::Io(_))));
    }

    #[test]
    fn explicit_token_takes_precedence() {
        let p = provider(Some("tok"), Some(PathBuf::from("/nonexistent")));
        assert_eq!(p.get().unwrap(), "tok");
    }

    #[test]
    fn falls_back_to_file_then_noop() {
        let p = provider(Some(""), Some(PathBuf::from("/nonexistent")));
        assert!(p.get().is_err());
        let p = provider(None, None);
        assert_eq!(p.get().unwrap(), "");
    }
}
