// SPDX-FileCopyrightText: 2026 Sephyi <me@sephy.io>
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Commercial

use std::borrow::Cow;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use reqwest::{Client, Method, RequestBuilder, Response, StatusCode, header};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::task::yield_now;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::config::GithubConfig;
use crate::domain::Repo;
use crate::error::{Error, Result};

#[derive(Deserialize)]
struct GitHubErrorBody {
    message: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Node {
    pub path: String,
}

#[derive(Debug, Deserialize)]
pub struct GithubTree {
    pub tree: Vec<Node>,
}

#[derive(Debug, Deserialize)]
pub struct RestRepository {
    pub id: usize,
    pub full_name: String,
    pub node_id: String,
    pub fork: bool,
}

#[derive(Deserialize)]
struct GraphResponse<T> {
    data: Option<T>,
}

#[derive(Deserialize)]
struct GraphRateLimit {
    cost: u16,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GraphRepositories {
    nodes: Vec<Option<GraphRepository>>,
    rate_limit: Option<GraphRateLimit>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphRepository {
    pub id: String,
    pub name_with_owner: String,
    pub languages: GraphLanguages,
}

impl GraphRepository {
    pub fn has_language(&self, language: &str) -> bool {
        self.languages
            .nodes
            .iter()
            .filter_map(Option::as_ref)
            .any(|el| el.name == language)
    }

    pub fn into_repo(self) -> Repo {
        Repo {
            id: self.id,
            name: self.name_with_owner,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct GraphLanguages {
    pub nodes: Vec<Option<GraphLanguage>>,
}

#[derive(Debug, Deserialize)]
pub struct GraphLanguage {
    pub name: String,
}

const GRAPHQL_QUERY_REPOSITORIES: &str = "
query($ids: [ID!]!) {
    nodes(ids: $ids) {
        ... on Repository {
            id
            nameWithOwner
            languages(first: 100, orderBy: { field: SIZE, direction: DESC }) {
                nodes {
                    name
                }
            }
        }
    }

    rateLimit {
        cost
    }
}
";

/// GitHub REST/GraphQL client rotating through several tokens
#[derive(Debug)]
pub struct Github {
    client: Client,
    tokens: Vec<SecretString>,
    current_token_index: AtomicUsize,
    api_url: String,
    raw_url: String,
    user_agent: String,
    rate_limit_wait: Duration,
}

impl Github {
    pub fn new(tokens: Vec<SecretString>, config: &GithubConfig) -> Result<Self> {
        if tokens.is_empty() {
            return Err(Error::MissingTokens);
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            tokens,
            current_token_index: AtomicUsize::new(0),
            // Sanitize: remove trailing slashes to avoid //repositories
            api_url: config.api_url.trim_end_matches('/').to_string(),
            raw_url: config.raw_url.trim_end_matches('/').to_string(),
            user_agent: config.user_agent.clone(),
            rate_limit_wait: Duration::from_secs(config.rate_limit_wait_secs),
        })
    }

    #[inline]
    fn token(&self) -> &str {
        let index = self.current_token_index.load(Ordering::Relaxed) % self.tokens.len();
        self.tokens[index].expose_secret()
    }

    fn build_request(&self, method: Method, url: &str) -> RequestBuilder {
        let url = if url.starts_with("https://") || url.starts_with("http://") {
            Cow::from(url)
        } else {
            Cow::from(format!("{}/{}", self.api_url, url.trim_start_matches('/')))
        };
        self.client
            .request(method, url.as_ref())
            .header(header::AUTHORIZATION, format!("token {}", self.token()))
            .header(header::USER_AGENT, &self.user_agent)
    }

    async fn graphql<T: DeserializeOwned, V: Serialize>(&self, query: &str, variables: V) -> Result<T> {
        let resp = self
            .build_request(Method::POST, "graphql")
            .json(&json!({
                "query": query,
                "variables": variables,
            }))
            .send()
            .await?;

        let data: GraphResponse<T> = handle_response_json(resp).await?;

        data.data.ok_or(Error::EmptyResponse)
    }

    /// Loads name and languages for up to 100 repository node ids
    pub async fn load_repositories(&self, node_ids: &[String]) -> Result<Vec<GraphRepository>> {
        let data: GraphRepositories = self
            .retry(|| async {
                self.graphql(GRAPHQL_QUERY_REPOSITORIES, json!({ "ids": node_ids }))
                    .await
            })
            .await?;

        if let Some(cost) = data.rate_limit.map(|r| r.cost) {
            if cost > 1 {
                warn!(cost, ids = node_ids.len(), "load repositories query more costly than expected");
            }
        }

        Ok(data.nodes.into_iter().flatten().collect())
    }

    /// gets the recursive file tree of a repository's default branch
    pub async fn tree(&self, repo: &Repo) -> Result<GithubTree> {
        self.retry(|| async {
            let resp = self
                .build_request(
                    Method::GET,
                    &format!("repos/{}/git/trees/HEAD?recursive=1", repo.name),
                )
                .send()
                .await?;

            handle_response_json(resp).await
        })
        .await
    }

    /// lists public repositories created after `since` (paginated by id)
    pub async fn scrape_repositories(&self, since: usize) -> Result<Vec<RestRepository>> {
        self.retry(|| async {
            let resp = self
                .build_request(Method::GET, &format!("repositories?since={since}"))
                .send()
                .await?;

            handle_response_json(resp).await
        })
        .await
    }

    /// downloads a file from the default branch of a repository
    ///
    /// path being the path inside the repo
    pub async fn download_file(&self, repo: &Repo, path: &str) -> Result<Vec<u8>> {
        let url = format!("{}/{}/HEAD/{}", self.raw_url, repo.name, path);

        self.retry(|| async {
            let resp = self.build_request(Method::GET, &url).send().await?;
            let bytes = handle_response(resp).await?.bytes().await?;
            Ok(bytes.to_vec())
        })
        .await
    }

    /// retry a request, rotating tokens to get around rate limits
    async fn retry<F, Fu, R>(&self, fun: F) -> Result<R>
    where
        F: Fn() -> Fu,
        Fu: Future<Output = Result<R>>,
    {
        loop {
            match fun().await {
                Err(Error::RateLimited { status }) => {
                    let len = self.tokens.len();
                    let previous = self
                        .current_token_index
                        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |old| {
                            Some((old + 1) % len)
                        })
                        .unwrap_or_else(|old| old);

                    if previous + 1 >= len {
                        warn!(
                            status,
                            wait_secs = self.rate_limit_wait.as_secs(),
                            "tokens wrapped around, sleeping"
                        );
                        sleep(self.rate_limit_wait).await;
                    } else {
                        debug!(token = previous + 1, "rate limited, switching token");
                    }
                }
                other => return other,
            }
            yield_now().await
        }
    }
}

async fn handle_response_json<T: DeserializeOwned>(resp: Response) -> Result<T> {
    let res = handle_response(resp).await?.json().await?;
    Ok(res)
}

/// Maps GitHub responses onto the errors `retry` distinguishes
async fn handle_response(resp: Response) -> Result<Response> {
    let status = resp.status();
    if status.is_success() {
        Ok(resp)
    } else if status == StatusCode::TOO_MANY_REQUESTS || status == StatusCode::UNPROCESSABLE_ENTITY
    {
        warn!(status = status.as_u16(), "rate limit hit");
        Err(Error::RateLimited {
            status: status.as_u16(),
        })
    } else if let Ok(error) = resp.json::<GitHubErrorBody>().await {
        if error.message.contains("abuse") || error.message.contains("rate limit") {
            warn!(status = status.as_u16(), message = %error.message, "rate limit hit");
            Err(Error::RateLimited {
                status: status.as_u16(),
            })
        } else {
            debug!(status = status.as_u16(), message = %error.message, "http error");
            Err(Error::HttpStatus {
                status: status.as_u16(),
            })
        }
    } else {
        Err(Error::HttpStatus {
            status: status.as_u16(),
        })
    }
}
