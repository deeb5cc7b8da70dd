//! Resolution of a requested API version to an endpoint.
use super::{
    matrix::{SupportMatrix, SupportMatrixEntry},
    version::{Version, VersionParseError},
};
use std::{collections::BTreeMap, fmt, str::FromStr};

/// The API version a caller asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtocolRequest {
    /// The greatest API version the running client supports.
    Latest,
    Version(String),
}

impl FromStr for ProtocolRequest {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Ok(if s.eq_ignore_ascii_case("latest") {
            Self::Latest
        } else {
            Self::Version(s.to_string())
        })
    }
}

impl fmt::Display for ProtocolRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Latest => f.write_str("latest"),
            Self::Version(v) => f.write_str(v),
        }
    }
}

/// The client doing the negotiation, e.g. `pbcli 2.0`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunningClient {
    program: String,
    raw_version: String,
    key: Version,
}

impl RunningClient {
    /// Only the major and minor components of `version` take part in the comparison.
    pub fn new(program: impl Into<String>, version: &str) -> Result<Self, VersionParseError> {
        let key = version.parse::<Version>()?.truncated(2);
        Ok(Self {
            program: program.into(),
            raw_version: version.trim().to_string(),
            key,
        })
    }

    /// Classifies one matrix entry relative to this client.
    pub fn classify(&self, entry: &SupportMatrixEntry) -> Compatibility {
        if entry.client > self.key {
            Compatibility::RequiresNewerClient {
                minimum: entry.client_version.clone(),
            }
        } else if entry.client.major() == self.key.major() {
            Compatibility::Supported {
                endpoint: entry.endpoint.clone(),
            }
        } else {
            Compatibility::RequiresOlderClient {
                maximum: entry.client_version.clone(),
                major: entry.client.major(),
            }
        }
    }
}

impl fmt::Display for RunningClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.program, self.raw_version)
    }
}

/// How one matrix entry relates to the running client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Compatibility {
    /// Same major version, not newer: the entry's endpoint can be used.
    Supported { endpoint: String },
    /// The API version needs at least client version `minimum`.
    RequiresNewerClient { minimum: String },
    /// The API version is only served to clients up to `maximum`, of major version `major`.
    RequiresOlderClient { maximum: String, major: u64 },
}

impl Compatibility {
    /// Lower wins when one API version is listed in several sections.
    fn precedence(&self) -> u8 {
        match self {
            Self::Supported { .. } => 0,
            Self::RequiresNewerClient { .. } => 1,
            Self::RequiresOlderClient { .. } => 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClientTooOld {
    #[error("{client} is too old and not supported any more. Please upgrade to a newer version.")]
    General { client: String },
    #[error(
        "{client} is too old for API version {protocol}. Please upgrade the client to version {minimum} or later."
    )]
    ForProtocol {
        client: String,
        protocol: String,
        minimum: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClientTooNew {
    #[error("{client} is too new and not tested against the API.")]
    General { client: String },
    #[error(
        "{client} is too new for API version {protocol}. Please downgrade the client to version {maximum} or any later {major}.x version."
    )]
    ForProtocol {
        client: String,
        protocol: String,
        maximum: String,
        major: u64,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VersionError {
    #[error(transparent)]
    TooOld(#[from] ClientTooOld),
    #[error(transparent)]
    TooNew(#[from] ClientTooNew),
    #[error("The specified API version {requested} is not known. Supported API versions by {client}: {supported}")]
    UnknownProtocolVersion {
        client: String,
        requested: String,
        supported: String,
    },
    #[error(
        "The given endpoint \"{given}\" does not match the endpoint \"{resolved}\" for API version {protocol}."
    )]
    EndpointMismatch {
        given: String,
        resolved: String,
        protocol: String,
    },
}

/// Every API version of the matrix with its winning classification.
fn classify_matrix(
    client: &RunningClient,
    matrix: &SupportMatrix,
) -> BTreeMap<String, (Version, Compatibility)> {
    let mut table: BTreeMap<String, (Version, Compatibility)> = BTreeMap::new();

    for entry in matrix.entries() {
        let compatibility = client.classify(entry);
        match table.get(&entry.protocol_version) {
            Some((_, current)) if current.precedence() < compatibility.precedence() => {}
            _ => {
                table.insert(
                    entry.protocol_version.clone(),
                    (entry.protocol.clone(), compatibility),
                );
            }
        }
    }

    table
}

/// Resolves `request` to an endpoint for `client` according to `matrix`.
pub fn resolve_endpoint(
    client: &RunningClient,
    request: &ProtocolRequest,
    matrix: &SupportMatrix,
) -> Result<String, VersionError> {
    let table = classify_matrix(client, matrix);

    let mut supported: Vec<(&Version, &str, &str)> = table
        .iter()
        .filter_map(|(key, (version, compatibility))| match compatibility {
            Compatibility::Supported { endpoint } => Some((version, key.as_str(), endpoint.as_str())),
            _ => None,
        })
        .collect();
    supported.sort_by(|a, b| a.0.cmp(b.0));

    let requested = match request {
        ProtocolRequest::Latest => {
            let Some((_, protocol, endpoint)) = supported.last() else {
                let any_newer = table
                    .values()
                    .any(|(_, c)| matches!(c, Compatibility::RequiresNewerClient { .. }));
                let client = client.to_string();
                return Err(if any_newer {
                    ClientTooOld::General { client }.into()
                } else {
                    ClientTooNew::General { client }.into()
                });
            };
            tracing::debug!(protocol, endpoint, "selected latest API version");
            return Ok(endpoint.to_string());
        }
        ProtocolRequest::Version(requested) => requested,
    };

    match table.get(requested.as_str()).map(|(_, c)| c) {
        Some(Compatibility::Supported { endpoint }) => Ok(endpoint.clone()),
        Some(Compatibility::RequiresNewerClient { minimum }) => Err(ClientTooOld::ForProtocol {
            client: client.to_string(),
            protocol: requested.clone(),
            minimum: minimum.clone(),
        }
        .into()),
        Some(Compatibility::RequiresOlderClient { maximum, major }) => Err(ClientTooNew::ForProtocol {
            client: client.to_string(),
            protocol: requested.clone(),
            maximum: maximum.clone(),
            major: *major,
        }
        .into()),
        None => Err(VersionError::UnknownProtocolVersion {
            client: client.to_string(),
            requested: requested.clone(),
            supported: supported
                .iter()
                .map(|(_, key, _)| *key)
                .collect::<Vec<_>>()
                .join(", "),
        }),
    }
}

/// Picks the endpoint to talk to.
///
/// An explicit `endpoint` without an API version is used as is. Otherwise the API version
/// (`latest` when absent) is resolved through `matrix`, and an explicit endpoint must agree
/// with the resolved one.
pub fn select_endpoint(
    endpoint: Option<&str>,
    api_version: Option<&ProtocolRequest>,
    client: &RunningClient,
    matrix: &SupportMatrix,
) -> Result<String, VersionError> {
    let request = match (endpoint, api_version) {
        (Some(endpoint), None) => return Ok(endpoint.to_string()),
        (_, Some(request)) => request.clone(),
        (None, None) => ProtocolRequest::Latest,
    };

    let resolved = resolve_endpoint(client, &request, matrix)?;

    match endpoint {
        Some(given) if given != resolved => Err(VersionError::EndpointMismatch {
            given: given.to_string(),
            resolved,
            protocol: request.to_string(),
        }),
        _ => Ok(resolved),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MATRIX: &str = "
[2.0]
1.2=urlA
1.3=urlB

[2.1]
1.4=urlC

[3.0]
1.5=urlD
1.6=urlE
";

    fn matrix() -> SupportMatrix {
        SupportMatrix::parse(MATRIX, "test").unwrap()
    }

    fn resolve(client: &str, request: &str) -> Result<String, VersionError> {
        let client = RunningClient::new("pbcli", client).unwrap();
        resolve_endpoint(&client, &request.parse().unwrap(), &matrix())
    }

    #[test]
    fn latest_picks_the_greatest_supported_version() {
        assert_eq!(resolve("2.0", "latest").unwrap(), "urlB");
        assert_eq!(resolve("2.1.3", "latest").unwrap(), "urlC");
        assert_eq!(resolve("2.5", "latest").unwrap(), "urlC");
        assert_eq!(resolve("3.0", "latest").unwrap(), "urlE");
    }

    #[test]
    fn latest_without_supported_versions_reports_direction() {
        assert_eq!(
            resolve("1.0", "latest").unwrap_err(),
            VersionError::TooOld(ClientTooOld::General {
                client: "pbcli 1.0".to_string()
            })
        );
        assert_eq!(
            resolve("4.1", "latest").unwrap_err().to_string(),
            "pbcli 4.1 is too new and not tested against the API."
        );
    }

    #[test]
    fn explicit_versions_resolve_to_their_endpoint() {
        assert_eq!(resolve("2.0", "1.2").unwrap(), "urlA");
        assert_eq!(resolve("2.3", "1.3").unwrap(), "urlB");
    }

    #[test]
    fn unknown_versions_list_the_supported_ones() {
        let err = resolve("2.0", "1.1").unwrap_err();

        assert!(matches!(
            &err,
            VersionError::UnknownProtocolVersion { supported, .. } if supported == "1.2, 1.3"
        ));
        assert_eq!(
            err.to_string(),
            "The specified API version 1.1 is not known. Supported API versions by pbcli 2.0: 1.2, 1.3"
        );
    }

    #[test]
    fn supported_versions_are_listed_in_numeric_order() {
        let matrix = SupportMatrix::parse("[2.0]\n1.10=ten\n1.9=nine\n1.2=two\n", "test").unwrap();
        let client = RunningClient::new("pbcli", "2.0").unwrap();

        assert_eq!(
            resolve_endpoint(&client, &ProtocolRequest::Version("1.1".to_string()), &matrix)
                .unwrap_err()
                .to_string(),
            "The specified API version 1.1 is not known. Supported API versions by pbcli 2.0: 1.2, 1.9, 1.10"
        );
    }

    #[test]
    fn older_client_entries_carry_their_major_version() {
        let client = RunningClient::new("pbcli", "3.1").unwrap();
        let matrix = SupportMatrix::parse("[2.1.7]\n1.3=urlB\n", "test").unwrap();

        assert_eq!(
            client.classify(&matrix.entries()[0]),
            Compatibility::RequiresOlderClient {
                maximum: "2.1.7".to_string(),
                major: 2,
            }
        );
    }

    #[test]
    fn versions_of_newer_clients_ask_for_an_upgrade() {
        assert_eq!(
            resolve("2.0", "1.4").unwrap_err().to_string(),
            "pbcli 2.0 is too old for API version 1.4. Please upgrade the client to version 2.1 or later."
        );
    }

    #[test]
    fn versions_of_older_clients_ask_for_a_downgrade() {
        assert_eq!(
            resolve("3.1", "1.3").unwrap_err(),
            VersionError::TooNew(ClientTooNew::ForProtocol {
                client: "pbcli 3.1".to_string(),
                protocol: "1.3".to_string(),
                maximum: "2.0".to_string(),
                major: 2,
            })
        );
        assert_eq!(
            resolve("3.1", "1.3").unwrap_err().to_string(),
            "pbcli 3.1 is too new for API version 1.3. Please downgrade the client to version 2.0 or any later 2.x version."
        );
    }

    #[test]
    fn latest_compares_versions_numerically() {
        let matrix = SupportMatrix::parse("[2.0]\n1.2=old\n1.10=new\n1.9=middle\n", "test").unwrap();
        let client = RunningClient::new("pbcli", "2.0").unwrap();

        assert_eq!(
            resolve_endpoint(&client, &ProtocolRequest::Latest, &matrix).unwrap(),
            "new"
        );
    }

    #[test]
    fn supported_entries_take_precedence_over_other_sections() {
        let matrix = SupportMatrix::parse("[2.0]\n1.3=two\n[3.0]\n1.3=three\n", "test").unwrap();

        let two = RunningClient::new("pbcli", "2.0").unwrap();
        let three = RunningClient::new("pbcli", "3.0").unwrap();
        let request = ProtocolRequest::Version("1.3".to_string());

        assert_eq!(resolve_endpoint(&two, &request, &matrix).unwrap(), "two");
        assert_eq!(resolve_endpoint(&three, &request, &matrix).unwrap(), "three");
    }

    #[test]
    fn an_explicit_endpoint_alone_skips_resolution() {
        let client = RunningClient::new("pbcli", "9.0").unwrap();

        assert_eq!(
            select_endpoint(Some("http://local"), None, &client, &SupportMatrix::default()).unwrap(),
            "http://local"
        );
    }

    #[test]
    fn no_preference_means_latest() {
        let client = RunningClient::new("pbcli", "2.0").unwrap();

        assert_eq!(select_endpoint(None, None, &client, &matrix()).unwrap(), "urlB");
    }

    #[test]
    fn an_explicit_endpoint_must_match_the_resolved_one() {
        let client = RunningClient::new("pbcli", "2.0").unwrap();
        let request = ProtocolRequest::Version("1.2".to_string());

        assert_eq!(
            select_endpoint(Some("urlA"), Some(&request), &client, &matrix()).unwrap(),
            "urlA"
        );
        assert_eq!(
            select_endpoint(Some("urlB"), Some(&request), &client, &matrix())
                .unwrap_err()
                .to_string(),
            "The given endpoint \"urlB\" does not match the endpoint \"urlA\" for API version 1.2."
        );
    }

    #[test]
    fn latest_is_case_insensitive() {
        assert_eq!("Latest".parse::<ProtocolRequest>().unwrap(), ProtocolRequest::Latest);
        assert_eq!(
            " 1.3 ".parse::<ProtocolRequest>().unwrap(),
            ProtocolRequest::Version("1.3".to_string())
        );
    }
}
