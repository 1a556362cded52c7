use async_trait::async_trait;
use url::Url;

use crate::error::{ProgressError, RawProgressError};

/// Supplies bearer tokens for requests against the reading service.
///
/// Implementations typically return a cached token and only refresh it when it has expired. The
/// engine never stores the returned credentials, it asks for them again before every write.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Returns credentials for the next request, or `None` if no user is signed in.
    ///
    /// A missing token is not fatal: the pending write is abandoned with an
    /// [crate::error::ProgressErrorKind::Unauthenticated] error and the next page change will try
    /// again.
    async fn fetch_credentials(&self) -> Result<Option<ApiCredentials>, ProgressError>;
}

#[derive(Clone, Debug)]
pub struct ApiCredentials {
    /// Base URL of the reading service, e.g. `https://api.example.com/`.
    pub endpoint: String,
    /// The bearer token used to authenticate against the reading service.
    pub token: String,
}

impl ApiCredentials {
    pub fn parsed_endpoint(&self) -> Result<Url, ProgressError> {
        let url = Url::parse(&self.endpoint)
            .map_err(|e| RawProgressError::InvalidEndpoint { inner: e })?;
        if url.cannot_be_a_base() {
            return Err(ProgressError::argument_error(format!(
                "URL {} must be a valid base URL",
                self.endpoint
            )));
        }

        Ok(url)
    }

    /// Resolves `path` against the [Self::endpoint].
    pub(crate) fn resolve(&self, path: &str) -> Result<Url, ProgressError> {
        self.parsed_endpoint()?
            .join(path)
            .map_err(|e| RawProgressError::InvalidEndpoint { inner: e }.into())
    }
}

#[cfg(test)]
mod test {
    use super::ApiCredentials;

    fn credentials(endpoint: &str) -> ApiCredentials {
        ApiCredentials {
            token: "".to_string(),
            endpoint: endpoint.to_string(),
        }
    }

    fn is_endpoint_valid(endpoint: &str) -> bool {
        credentials(endpoint).parsed_endpoint().is_ok()
    }

    #[test]
    fn endpoint_validation() {
        assert!(!is_endpoint_valid("localhost:8080"));
        assert!(!is_endpoint_valid("mailto:reader@example.com"));

        assert!(is_endpoint_valid("http://localhost:8080"));
        assert!(is_endpoint_valid("http://localhost:8080/"));
        assert!(is_endpoint_valid("http://localhost:8080/api/"));
    }

    #[test]
    fn resolves_paths() {
        let url = credentials("https://books.example.com/api/")
            .resolve("progress/update-progress")
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://books.example.com/api/progress/update-progress"
        );

        let url = credentials("https://books.example.com")
            .resolve("shelves")
            .unwrap();
        assert_eq!(url.as_str(), "https://books.example.com/shelves");
    }
}
