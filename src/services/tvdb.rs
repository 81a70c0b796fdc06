// TVDB provider service with bearer-token lifecycle.
// API Documentation: https://thetvdb.github.io/v4-api/
//
// The token manager has two states: no token (the cache namespace is
// empty or expired) and have-token. A cache miss triggers one blocking
// login before the dependent call proceeds; the token is stored with a
// 29-day ttl and re-login happens lazily on the next natural miss.
// Concurrent callers that both miss may both log in; the race is
// tolerated (logins are idempotent, last stored token wins).

use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

use crate::cache::TtlCache;
use crate::error::{ProviderError, ProviderResult};
use crate::services::retry::{send_with_retry, BASE_DELAY, MAX_ATTEMPTS};

const TVDB_API_BASE: &str = "https://api4.thetvdb.com/v4";
pub const TVDB_IMAGE_BASE: &str = "https://thetvdb.com";

const TOKEN_TTL: Duration = Duration::from_secs(29 * 24 * 60 * 60);
const TOKEN_KEY: &str = "token";

pub struct TvdbClient {
    client: Client,
    api_key: String,
    user: Option<String>,
    token_cache: TtlCache<String>,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    data: LoginData,
}

#[derive(Debug, Deserialize)]
struct LoginData {
    token: String,
}

#[derive(Debug, Deserialize)]
pub struct SeriesExtendedResponse {
    pub data: SeriesExtended,
}

/// Series record with the full episode list and season typing, used to
/// reconcile anime season accounting against TMDB's.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SeriesExtended {
    pub seasons: Vec<TvdbSeason>,
    pub episodes: Vec<TvdbEpisode>,
}

#[derive(Debug, Deserialize)]
pub struct TvdbSeason {
    #[serde(rename = "type")]
    pub season_type: Option<SeasonType>,
}

#[derive(Debug, Deserialize)]
pub struct SeasonType {
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TvdbEpisode {
    pub id: i64,
    pub name: Option<String>,
    #[serde(rename = "seasonNumber")]
    pub season_number: i32,
    pub number: i32,
    pub aired: Option<String>,
    pub overview: Option<String>,
    pub image: Option<String>,
}

impl SeriesExtended {
    /// Seasons in the "official" ordering; specials and alternate orders
    /// are excluded when comparing against TMDB's season count.
    pub fn official_season_count(&self) -> usize {
        self.seasons
            .iter()
            .filter(|s| {
                s.season_type
                    .as_ref()
                    .and_then(|t| t.kind.as_deref())
                    .map(|k| k == "official")
                    .unwrap_or(false)
            })
            .count()
    }
}

impl TvdbClient {
    pub fn new(client: Client, api_key: String, user: Option<String>) -> Self {
        let token_cache = TtlCache::new("tvdb/token", TOKEN_TTL);
        // Never trust a token persisted by a prior run
        token_cache.clear();
        Self {
            client,
            api_key,
            user,
            token_cache,
        }
    }

    /// Cached bearer token, logging in on a miss. Login is issued once,
    /// not retried: a rejection means misconfiguration, and the caller's
    /// own budget governs transient failures.
    async fn token(&self) -> ProviderResult<String> {
        if let Some(token) = self.token_cache.get(TOKEN_KEY) {
            return Ok(token);
        }
        self.login().await
    }

    async fn login(&self) -> ProviderResult<String> {
        tracing::info!("logging in to TVDB");
        let payload = serde_json::json!({
            "apikey": self.api_key,
            "pin": null,
            "user": self.user,
        });

        let resp = self
            .client
            .post(format!("{TVDB_API_BASE}/login"))
            .json(&payload)
            .send()
            .await
            .map_err(|e| ProviderError::AuthFailed(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(ProviderError::AuthFailed(format!(
                "TVDB login returned {}",
                resp.status()
            )));
        }

        let login: LoginResponse = resp
            .json()
            .await
            .map_err(|e| ProviderError::AuthFailed(e.to_string()))?;
        self.token_cache.set(TOKEN_KEY, login.data.token.clone());
        Ok(login.data.token)
    }

    /// Series record with episodes, under the shared retry/backoff budget.
    pub async fn series_extended(&self, tvdb_id: i64) -> ProviderResult<SeriesExtended> {
        let token = self.token().await?;
        let url = format!("{TVDB_API_BASE}/series/{tvdb_id}/extended");

        let resp = send_with_retry(
            || {
                self.client
                    .get(&url)
                    .bearer_auth(&token)
                    .query(&[("meta", "episodes"), ("short", "true")])
            },
            MAX_ATTEMPTS,
            BASE_DELAY,
        )
        .await?;

        let body: SeriesExtendedResponse = resp
            .json()
            .await
            .map_err(|e| ProviderError::InvalidPayload(e.to_string()))?;
        Ok(body.data)
    }
}
