//! GitHub destination resolution.

use crate::error::{MigrationError, Result};
use crate::types::{DestinationConfig, DestinationRepository, Visibility};

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Ensures a destination repository exists for a project.
#[async_trait]
pub trait DestinationResolver: Send + Sync {
    /// Find or create the destination repository called `name`.
    async fn resolve(&self, name: &str, description: &str) -> Result<DestinationRepository>;
}

/// GitHub API response types
#[derive(Debug, Deserialize)]
struct GitHubRepo {
    clone_url: String,
}

#[derive(Debug, Serialize)]
struct CreateRepoRequest<'a> {
    name: &'a str,
    description: &'a str,
    private: bool,
}

enum Creation {
    Created(String),
    /// 422 with the response body. Usually the name is taken, but GitHub also
    /// uses 422 for validation errors.
    Unprocessable(String),
}

/// Resolves destinations through the GitHub REST API.
pub struct GitHubResolver {
    client: Client,
    api_url: String,
    owner: String,
    token: String,
    visibility: Visibility,
}

impl GitHubResolver {
    /// Create a new GitHub resolver.
    pub fn new(config: &DestinationConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("hoist-migrate/", env!("CARGO_PKG_VERSION")))
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| MigrationError::Configuration(format!("HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            owner: config.owner.clone(),
            token: config.token.clone(),
            visibility: config.visibility,
        })
    }

    fn request(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder
            .header("Authorization", format!("token {}", self.token))
            .header("Accept", "application/vnd.github+json")
    }

    /// Look up `owner/name`. `None` means the repository does not exist.
    async fn probe(&self, name: &str) -> Result<Option<String>> {
        let url = format!("{}/repos/{}/{name}", self.api_url, self.owner);
        let response = self
            .request(self.client.get(&url))
            .send()
            .await
            .map_err(|e| MigrationError::creation(name, format!("probe failed: {e}")))?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                let repo: GitHubRepo = response.json().await.map_err(|e| {
                    MigrationError::creation(name, format!("unexpected probe response: {e}"))
                })?;
                Ok(Some(repo.clone_url))
            }
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(MigrationError::creation(
                    name,
                    format!("probe returned {status}: {body}"),
                ))
            }
        }
    }

    async fn create(&self, name: &str, description: &str) -> Result<Creation> {
        let url = format!("{}/user/repos", self.api_url);
        let body = CreateRepoRequest {
            name,
            description,
            private: self.visibility.is_private(),
        };
        let response = self
            .request(self.client.post(&url))
            .json(&body)
            .send()
            .await
            .map_err(|e| MigrationError::creation(name, format!("create failed: {e}")))?;

        match response.status() {
            StatusCode::UNPROCESSABLE_ENTITY => {
                Ok(Creation::Unprocessable(response.text().await.unwrap_or_default()))
            }
            status if status.is_success() => {
                let repo: GitHubRepo = response.json().await.map_err(|e| {
                    MigrationError::creation(name, format!("unexpected create response: {e}"))
                })?;
                Ok(Creation::Created(repo.clone_url))
            }
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(MigrationError::creation(
                    name,
                    format!("create returned {status}: {body}"),
                ))
            }
        }
    }

    /// Clone URL derived from the host's naming convention.
    fn conventional_locator(&self, name: &str) -> String {
        let web = match self.api_url.strip_suffix("/api/v3") {
            Some(base) => base.to_string(),
            None => self.api_url.replacen("://api.", "://", 1),
        };
        format!("{web}/{}/{name}.git", self.owner)
    }
}

#[async_trait]
impl DestinationResolver for GitHubResolver {
    async fn resolve(&self, name: &str, description: &str) -> Result<DestinationRepository> {
        if let Some(clone_locator) = self.probe(name).await? {
            debug!(project = %name, "Destination repository already exists");
            return Ok(DestinationRepository {
                clone_locator,
                existed: true,
            });
        }

        match self.create(name, description).await? {
            Creation::Created(clone_locator) => {
                info!(project = %name, visibility = ?self.visibility, "Created destination repository");
                Ok(DestinationRepository {
                    clone_locator,
                    existed: false,
                })
            }
            Creation::Unprocessable(body) => {
                // Either created by someone else between probe and create, or
                // rejected outright. Only a second probe can tell them apart.
                let clone_locator = match self.probe(name).await {
                    Ok(Some(locator)) => locator,
                    Ok(None) => {
                        return Err(MigrationError::creation(
                            name,
                            format!("create returned 422 Unprocessable Entity: {body}"),
                        ));
                    }
                    Err(e) => {
                        debug!(project = %name, error = %e, "Re-probe failed");
                        self.conventional_locator(name)
                    }
                };
                warn!(
                    project = %name,
                    locator = %clone_locator,
                    "Repository appeared during creation; pushing into it"
                );
                Ok(DestinationRepository {
                    clone_locator,
                    existed: true,
                })
            }
        }
    }
}
