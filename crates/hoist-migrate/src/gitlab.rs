//! GitLab project enumeration.

use crate::error::{MigrationError, Result};
use crate::types::{CloneProtocol, ProjectDescriptor, SourceConfig};

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::collections::HashMap;
use tracing::{debug, info};

/// Projects requested per page.
pub const PAGE_SIZE: usize = 100;

/// Lists the projects to migrate.
#[async_trait]
pub trait SourceEnumerator: Send + Sync {
    /// Return every project, in listing order.
    ///
    /// Either the complete set is returned or an error; never a partial set.
    async fn list_projects(&self) -> Result<Vec<ProjectDescriptor>>;
}

/// GitLab API response types
#[derive(Debug, Deserialize)]
struct GitLabProject {
    path: String,
    path_with_namespace: Option<String>,
    description: Option<String>,
    http_url_to_repo: Option<String>,
    ssh_url_to_repo: Option<String>,
}

/// Enumerates projects through the GitLab v4 REST API.
pub struct GitLabEnumerator {
    client: Client,
    base_url: String,
    token: String,
    username: Option<String>,
    protocol: CloneProtocol,
}

impl GitLabEnumerator {
    /// Create a new GitLab enumerator.
    pub fn new(config: &SourceConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("hoist-migrate/", env!("CARGO_PKG_VERSION")))
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| MigrationError::Configuration(format!("HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            token: config.token.clone(),
            username: config.username.clone(),
            protocol: config.protocol,
        })
    }

    fn listing_path(&self) -> String {
        match &self.username {
            Some(username) => format!("/users/{username}/projects"),
            None => "/projects?owned=true".to_string(),
        }
    }

    async fn fetch_page(&self, page: usize) -> Result<Vec<GitLabProject>> {
        let path = self.listing_path();
        let separator = if path.contains('?') { '&' } else { '?' };
        let url = format!(
            "{}/api/v4{path}{separator}page={page}&per_page={PAGE_SIZE}",
            self.base_url
        );

        let response = self
            .client
            .get(&url)
            .header("PRIVATE-TOKEN", &self.token)
            .send()
            .await
            .map_err(|e| MigrationError::RemoteListing(format!("page {page}: {e}")))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(MigrationError::RemoteListing(format!(
                "authentication rejected by GitLab ({status})"
            )));
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MigrationError::RemoteListing(format!(
                "GitLab API error on page {page} ({status}): {body}"
            )));
        }

        response
            .json()
            .await
            .map_err(|e| MigrationError::RemoteListing(format!("page {page}: {e}")))
    }

    fn describe(&self, project: GitLabProject) -> Result<ProjectDescriptor> {
        let locator = match self.protocol {
            CloneProtocol::Http => project.http_url_to_repo,
            CloneProtocol::Ssh => project.ssh_url_to_repo,
        };
        let locator = locator.filter(|l| !l.is_empty()).ok_or_else(|| {
            MigrationError::RemoteListing(format!(
                "project {} has no {:?} clone URL",
                project.path, self.protocol
            ))
        })?;

        Ok(ProjectDescriptor::new(project.path, locator)
            .with_description(project.description.unwrap_or_default()))
    }
}

#[async_trait]
impl SourceEnumerator for GitLabEnumerator {
    async fn list_projects(&self) -> Result<Vec<ProjectDescriptor>> {
        let mut projects = Vec::new();
        // Destination name -> full GitLab path of the project that claimed it.
        let mut claimed: HashMap<String, String> = HashMap::new();
        let mut page = 1;

        loop {
            let items = self.fetch_page(page).await?;
            debug!(page, count = items.len(), "Fetched project page");

            if items.is_empty() {
                break;
            }

            for item in items {
                let full_path = item
                    .path_with_namespace
                    .clone()
                    .unwrap_or_else(|| item.path.clone());
                if let Some(first) = claimed.get(&item.path) {
                    return Err(MigrationError::RemoteListing(format!(
                        "projects {first} and {full_path} would both migrate to {}",
                        item.path
                    )));
                }
                claimed.insert(item.path.clone(), full_path);
                projects.push(self.describe(item)?);
            }
            page += 1;
        }

        info!(count = projects.len(), "Listed GitLab projects");
        Ok(projects)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn project_json(name: &str) -> serde_json::Value {
        json!({
            "id": 1,
            "path": name,
            "description": format!("{name} project"),
            "http_url_to_repo": format!("https://gitlab.example/octo/{name}.git"),
            "ssh_url_to_repo": format!("git@gitlab.example:octo/{name}.git"),
        })
    }

    async fn mount_page(server: &MockServer, route: &str, page: &str, body: serde_json::Value) {
        Mock::given(method("GET"))
            .and(path(route))
            .and(query_param("page", page))
            .and(query_param("per_page", "100"))
            .and(header("PRIVATE-TOKEN", "glpat-test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(server)
            .await;
    }

    fn enumerator(server: &MockServer, username: Option<&str>) -> GitLabEnumerator {
        let mut config = SourceConfig::new(server.uri(), "glpat-test");
        if let Some(username) = username {
            config = config.with_username(username);
        }
        GitLabEnumerator::new(&config).unwrap()
    }

    #[tokio::test]
    async fn test_pages_are_concatenated_in_order() {
        let server = MockServer::start().await;
        let route = "/api/v4/users/octo/projects";
        let first: Vec<_> = (0..100).map(|i| project_json(&format!("p{i:03}"))).collect();
        mount_page(&server, route, "1", json!(first)).await;
        mount_page(&server, route, "2", json!([project_json("tail")])).await;
        mount_page(&server, route, "3", json!([])).await;

        let projects = enumerator(&server, Some("octo")).list_projects().await.unwrap();

        assert_eq!(projects.len(), 101);
        assert_eq!(projects[0].name, "p000");
        assert_eq!(projects[99].name, "p099");
        assert_eq!(projects[100].name, "tail");
        assert_eq!(
            projects[100].source_clone_locator,
            "https://gitlab.example/octo/tail.git"
        );
    }

    #[tokio::test]
    async fn test_short_page_still_requests_next() {
        let server = MockServer::start().await;
        let route = "/api/v4/users/octo/projects";
        mount_page(&server, route, "1", json!([project_json("alpha")])).await;
        mount_page(&server, route, "2", json!([project_json("beta")])).await;
        mount_page(&server, route, "3", json!([])).await;

        let projects = enumerator(&server, Some("octo")).list_projects().await.unwrap();
        let names: Vec<_> = projects.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["alpha", "beta"]);
    }

    #[tokio::test]
    async fn test_owned_projects_without_username() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v4/projects"))
            .and(query_param("owned", "true"))
            .and(query_param("page", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([project_json("alpha")])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v4/projects"))
            .and(query_param("owned", "true"))
            .and(query_param("page", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;

        let projects = enumerator(&server, None).list_projects().await.unwrap();
        assert_eq!(projects.len(), 1);
        assert_eq!(projects[0].description, "alpha project");
    }

    #[tokio::test]
    async fn test_same_path_in_two_namespaces_fails_listing() {
        let server = MockServer::start().await;
        let route = "/api/v4/projects";
        mount_page(
            &server,
            route,
            "1",
            json!([
                {
                    "path": "tools",
                    "path_with_namespace": "group-a/tools",
                    "http_url_to_repo": "https://gitlab.example/group-a/tools.git",
                },
                project_json("alpha"),
            ]),
        )
        .await;
        mount_page(
            &server,
            route,
            "2",
            json!([{
                "path": "tools",
                "path_with_namespace": "group-b/tools",
                "http_url_to_repo": "https://gitlab.example/group-b/tools.git",
            }]),
        )
        .await;
        mount_page(&server, route, "3", json!([])).await;

        let err = enumerator(&server, None).list_projects().await.unwrap_err();
        assert!(matches!(
            err,
            MigrationError::RemoteListing(ref m)
                if m.contains("group-a/tools") && m.contains("group-b/tools")
        ));
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn test_failing_page_discards_earlier_pages() {
        let server = MockServer::start().await;
        let route = "/api/v4/users/octo/projects";
        mount_page(&server, route, "1", json!([project_json("alpha")])).await;
        Mock::given(method("GET"))
            .and(path(route))
            .and(query_param("page", "2"))
            .respond_with(ResponseTemplate::new(500).set_body_string("upstream down"))
            .mount(&server)
            .await;

        let err = enumerator(&server, Some("octo"))
            .list_projects()
            .await
            .unwrap_err();
        assert!(matches!(err, MigrationError::RemoteListing(ref m) if m.contains("upstream down")));
    }

    #[tokio::test]
    async fn test_unauthorized_is_listing_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let err = enumerator(&server, Some("octo"))
            .list_projects()
            .await
            .unwrap_err();
        assert!(matches!(err, MigrationError::RemoteListing(ref m) if m.contains("authentication")));
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn test_ssh_protocol_and_missing_description() {
        let server = MockServer::start().await;
        let route = "/api/v4/users/octo/projects";
        mount_page(
            &server,
            route,
            "1",
            json!([{
                "path": "alpha",
                "description": null,
                "http_url_to_repo": "https://gitlab.example/octo/alpha.git",
                "ssh_url_to_repo": "git@gitlab.example:octo/alpha.git",
            }]),
        )
        .await;
        mount_page(&server, route, "2", json!([])).await;

        let config = SourceConfig::new(server.uri(), "glpat-test")
            .with_username("octo")
            .with_protocol(CloneProtocol::Ssh);
        let projects = GitLabEnumerator::new(&config)
            .unwrap()
            .list_projects()
            .await
            .unwrap();

        assert_eq!(projects[0].source_clone_locator, "git@gitlab.example:octo/alpha.git");
        assert_eq!(projects[0].description, "");
    }

    #[tokio::test]
    async fn test_missing_clone_url_fails_listing() {
        let server = MockServer::start().await;
        let route = "/api/v4/users/octo/projects";
        mount_page(&server, route, "1", json!([{ "path": "alpha" }])).await;
        mount_page(&server, route, "2", json!([])).await;

        let result = enumerator(&server, Some("octo")).list_projects().await;
        assert!(matches!(result, Err(MigrationError::RemoteListing(_))));
    }
}
