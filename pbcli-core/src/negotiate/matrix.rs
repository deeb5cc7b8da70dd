//! # Support Matrix
//!
//! The support matrix is a small INI document published next to the API:
//!
//! ```ini
//! [2.0]
//! 1.2=https://api.example.com/1.2
//! 1.3=https://api.example.com/1.3
//!
//! [2.1]
//! 1.4=https://api.example.com/1.4
//! ```
//!
//! Each section names a client version; each key is an API (protocol) version whose value
//! is the endpoint serving it.
use super::version::{Version, VersionParseError};
use std::time::Duration;

/// Where the support matrix is published.
pub const SUPPORT_MATRIX_URL: &str = "https://api.profitbricks.com/support_matrix.ini";

#[derive(Debug, thiserror::Error)]
pub enum SupportMatrixError {
    #[error("Could not download the support matrix from '{url}': {source}")]
    Fetch {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error(
        "Failed to parse {url} ({reason}). This file is malformed. Please contact support. \
         You can work around this issue by specifying an endpoint with --endpoint."
    )]
    Malformed { url: String, reason: String },
}

/// One `protocol version -> endpoint` line of a client version section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupportMatrixEntry {
    /// The section header, as written.
    pub client_version: String,
    pub client: Version,
    /// The key, as written.
    pub protocol_version: String,
    pub protocol: Version,
    pub endpoint: String,
}

/// The parsed support matrix, entries in document order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SupportMatrix {
    entries: Vec<SupportMatrixEntry>,
}

impl SupportMatrix {
    pub fn entries(&self) -> &[SupportMatrixEntry] {
        &self.entries
    }

    /// Downloads and parses the matrix published at `url`.
    pub async fn fetch(url: &str, timeout: Duration) -> Result<Self, SupportMatrixError> {
        let fetch_error = |source| SupportMatrixError::Fetch {
            url: url.to_string(),
            source,
        };

        tracing::debug!(url, "downloading support matrix");

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(fetch_error)?;

        let text = client
            .get(url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(fetch_error)?
            .text()
            .await
            .map_err(fetch_error)?;

        Self::parse(&text, url)
    }

    /// Parses the INI `text`; `source` names the document in error messages.
    pub fn parse(text: &str, source: &str) -> Result<Self, SupportMatrixError> {
        let malformed = |line_number: usize, reason: String| SupportMatrixError::Malformed {
            url: source.to_string(),
            reason: format!("line {line_number}: {reason}"),
        };
        let version = |line_number: usize, raw: &str| {
            raw.parse::<Version>()
                .map_err(|VersionParseError(v)| malformed(line_number, format!("invalid version '{v}'")))
        };

        let mut entries = Vec::new();
        let mut section: Option<(String, Version)> = None;
        let mut seen_sections: Vec<String> = Vec::new();

        for (index, raw_line) in text.lines().enumerate() {
            let line_number = index + 1;
            let line = raw_line.trim();

            if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }

            if let Some(header) = line.strip_prefix('[') {
                let name = header
                    .strip_suffix(']')
                    .ok_or_else(|| malformed(line_number, "unterminated section header".into()))?
                    .trim();
                if seen_sections.iter().any(|s| s == name) {
                    return Err(malformed(line_number, format!("duplicate section '{name}'")));
                }
                seen_sections.push(name.to_string());
                section = Some((name.to_string(), version(line_number, name)?));
                continue;
            }

            let Some((client_version, client)) = &section else {
                return Err(malformed(line_number, "missing section header".into()));
            };

            let (key, value) = line
                .split_once(['=', ':'])
                .ok_or_else(|| malformed(line_number, format!("expected 'key = value', got '{line}'")))?;
            let key = key.trim();

            entries.push(SupportMatrixEntry {
                client_version: client_version.clone(),
                client: client.clone(),
                protocol_version: key.to_string(),
                protocol: version(line_number, key)?,
                endpoint: value.trim().to_string(),
            });
        }

        Ok(Self { entries })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MATRIX: &str = "
# published by the API team
[2.0]
1.2=https://api.profitbricks.com/1.2/wsdl
1.3 = https://api.profitbricks.com/1.3/wsdl

[2.1]
; colons work as well
1.4: https://api.profitbricks.com/1.4/wsdl
";

    #[test]
    fn parses_sections_and_keys_in_order() {
        let matrix = SupportMatrix::parse(MATRIX, "test").unwrap();
        let entries: Vec<_> = matrix
            .entries()
            .iter()
            .map(|e| {
                (
                    e.client_version.as_str(),
                    e.protocol_version.as_str(),
                    e.endpoint.as_str(),
                )
            })
            .collect();

        assert_eq!(
            entries,
            [
                ("2.0", "1.2", "https://api.profitbricks.com/1.2/wsdl"),
                ("2.0", "1.3", "https://api.profitbricks.com/1.3/wsdl"),
                ("2.1", "1.4", "https://api.profitbricks.com/1.4/wsdl"),
            ]
        );
    }

    #[test]
    fn keys_before_any_section_are_malformed() {
        let err = SupportMatrix::parse("1.2=https://example.com\n[2.0]\n", "matrix.ini")
            .unwrap_err();

        assert!(matches!(err, SupportMatrixError::Malformed { .. }));
        let message = err.to_string();
        assert!(message.starts_with("Failed to parse matrix.ini (line 1: missing section header)."));
        assert!(message.ends_with("specifying an endpoint with --endpoint."));
    }

    #[test]
    fn garbage_lines_and_versions_are_malformed() {
        for text in [
            "[2.0]\nnot a key value pair\n",
            "[two]\n1.2=https://example.com\n",
            "[2.0]\nlatest=https://example.com\n",
            "[2.0\n",
            "[2.0]\n[2.0]\n",
        ] {
            assert!(
                matches!(
                    SupportMatrix::parse(text, "test"),
                    Err(SupportMatrixError::Malformed { .. })
                ),
                "expected {text:?} to be rejected"
            );
        }
    }

    #[test]
    fn an_empty_document_has_no_entries() {
        assert!(SupportMatrix::parse("", "test").unwrap().entries().is_empty());
    }

    /// Answers a single HTTP request with `body` and returns the URL to fetch it from.
    async fn serve_once(body: &'static str) -> String {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = [0u8; 4096];
            let _ = socket.read(&mut request).await.unwrap();
            let response = format!(
                "HTTP/1.1 200 OK\r\ncontent-type: text/plain\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
        });

        format!("http://{addr}/support_matrix.ini")
    }

    #[tokio::test]
    async fn fetched_matrices_are_parsed() {
        let url = serve_once("[2.0]\n1.3=https://api.example.com/1.3\n").await;

        let matrix = SupportMatrix::fetch(&url, Duration::from_secs(5)).await.unwrap();

        assert_eq!(matrix.entries().len(), 1);
        assert_eq!(matrix.entries()[0].endpoint, "https://api.example.com/1.3");
    }

    #[tokio::test]
    async fn malformed_fetched_matrices_name_their_url() {
        let url = serve_once("this is not a support matrix\n").await;

        let err = SupportMatrix::fetch(&url, Duration::from_secs(5))
            .await
            .unwrap_err();

        assert!(matches!(&err, SupportMatrixError::Malformed { url: source, .. } if *source == url));
        assert!(err.to_string().starts_with(&format!("Failed to parse {url} (line 1:")));
    }

    #[tokio::test]
    async fn unreachable_servers_are_fetch_errors() {
        let result =
            SupportMatrix::fetch("http://127.0.0.1:1/support_matrix.ini", Duration::from_secs(5))
                .await;

        assert!(matches!(result, Err(SupportMatrixError::Fetch { .. })));
    }
}
