// TMDB metadata provider service
// API Documentation: https://developer.themoviedb.org/reference/intro/getting-started

use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::error::{ProviderError, ProviderResult};
use crate::models::MediaKind;

const TMDB_API_BASE: &str = "https://api.themoviedb.org/3";
pub const TMDB_POSTER_URL: &str = "https://image.tmdb.org/t/p/w500";
pub const TMDB_BACK_URL: &str = "https://image.tmdb.org/t/p/original";

/// TMDB API client. Auth is an API-key query parameter; every call takes
/// the target language so titles and overviews come back localized.
pub struct TmdbClient {
    client: Client,
    api_key: String,
}

/// External id schemes TMDB can convert from.
#[derive(Debug, Clone, Copy)]
pub enum ExternalSource {
    ImdbId,
    TvdbId,
}

impl ExternalSource {
    fn as_str(&self) -> &'static str {
        match self {
            ExternalSource::ImdbId => "imdb_id",
            ExternalSource::TvdbId => "tvdb_id",
        }
    }
}

/// Response of the /find endpoint.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct FindResults {
    pub movie_results: Vec<FindEntry>,
    pub tv_results: Vec<FindEntry>,
    pub tv_episode_results: Vec<EpisodeEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FindEntry {
    pub id: i64,
    pub title: Option<String>,
    pub name: Option<String>,
    pub overview: Option<String>,
    pub poster_path: Option<String>,
    pub backdrop_path: Option<String>,
}

impl FindEntry {
    /// Movies carry `title`, shows carry `name`.
    pub fn display_name(&self) -> Option<&str> {
        self.title.as_deref().or(self.name.as_deref())
    }
}

/// Localized episode entry from /find with a TVDB external id.
#[derive(Debug, Clone, Deserialize)]
pub struct EpisodeEntry {
    pub name: Option<String>,
    pub overview: Option<String>,
    pub still_path: Option<String>,
}

/// Detailed movie info (with credits, videos and logo images appended)
#[derive(Debug, Deserialize)]
pub struct MovieDetails {
    pub id: i64,
    pub title: Option<String>,
    pub overview: Option<String>,
    pub release_date: Option<String>,
    pub poster_path: Option<String>,
    pub backdrop_path: Option<String>,
    pub vote_average: Option<f64>,
    pub runtime: Option<i32>,
    pub imdb_id: Option<String>,
    #[serde(default)]
    pub origin_country: Vec<String>,
    #[serde(default)]
    pub genres: Vec<Genre>,
    pub credits: Option<Credits>,
    pub videos: Option<VideoResults>,
    pub images: Option<Images>,
}

/// Detailed TV show info (with external ids, credits, videos and images)
#[derive(Debug, Deserialize)]
pub struct TvDetails {
    pub id: i64,
    pub name: Option<String>,
    pub overview: Option<String>,
    pub first_air_date: Option<String>,
    pub last_air_date: Option<String>,
    pub status: Option<String>,
    pub poster_path: Option<String>,
    pub backdrop_path: Option<String>,
    pub vote_average: Option<f64>,
    #[serde(default)]
    pub episode_run_time: Vec<i32>,
    pub last_episode_to_air: Option<LastEpisode>,
    #[serde(default)]
    pub origin_country: Vec<String>,
    #[serde(default)]
    pub genres: Vec<Genre>,
    #[serde(default)]
    pub seasons: Vec<SeasonSummary>,
    pub external_ids: Option<ExternalIds>,
    pub credits: Option<Credits>,
    pub videos: Option<VideoResults>,
    pub images: Option<Images>,
}

#[derive(Debug, Deserialize)]
pub struct LastEpisode {
    pub runtime: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct SeasonSummary {
    pub season_number: i32,
}

/// Season details including the episode list
#[derive(Debug, Deserialize)]
pub struct SeasonDetails {
    pub season_number: i32,
    #[serde(default)]
    pub episodes: Vec<EpisodeInfo>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EpisodeInfo {
    pub name: Option<String>,
    pub overview: Option<String>,
    pub season_number: i32,
    pub episode_number: i32,
    pub air_date: Option<String>,
    pub still_path: Option<String>,
    pub vote_average: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct Genre {
    pub name: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ExternalIds {
    pub imdb_id: Option<String>,
    pub tvdb_id: Option<i64>,
}

/// Credits response (cast and crew)
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Credits {
    pub cast: Vec<CastMember>,
    pub crew: Vec<CrewMember>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CastMember {
    pub name: String,
    pub known_for_department: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CrewMember {
    pub name: String,
    pub job: Option<String>,
    pub department: Option<String>,
    pub known_for_department: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct VideoResults {
    pub results: Vec<TmdbVideo>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TmdbVideo {
    pub name: String,
    pub key: String,
    pub site: String,
    #[serde(rename = "type")]
    pub video_type: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Images {
    pub logos: Vec<ImageAsset>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ImageAsset {
    pub file_path: String,
}

impl TmdbClient {
    pub fn new(client: Client, api_key: String) -> Self {
        Self { client, api_key }
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> ProviderResult<T> {
        let resp = self.client.get(url).send().await?;
        match resp.status() {
            status if status.is_success() => Ok(resp.json().await?),
            reqwest::StatusCode::NOT_FOUND => Err(ProviderError::Empty),
            reqwest::StatusCode::TOO_MANY_REQUESTS => Err(ProviderError::RateLimited),
            status => Err(ProviderError::Unavailable(format!(
                "TMDB returned {status}"
            ))),
        }
    }

    /// Convert an external identifier into TMDB-native search results.
    /// Also used for catalog localization: the results already carry the
    /// target-language title and overview.
    pub async fn find_by_external(
        &self,
        external_id: &str,
        source: ExternalSource,
        language: &str,
    ) -> ProviderResult<FindResults> {
        let url = format!(
            "{}/find/{}?api_key={}&external_source={}&language={}",
            TMDB_API_BASE,
            urlencoding::encode(external_id),
            self.api_key,
            source.as_str(),
            language
        );
        self.get_json(&url).await
    }

    /// External id -> TMDB-native id for the given kind.
    /// A valid response with no matching record is `Empty`.
    pub async fn resolve_tmdb_id(
        &self,
        imdb_id: &str,
        kind: MediaKind,
        language: &str,
    ) -> ProviderResult<i64> {
        let found = self
            .find_by_external(imdb_id, ExternalSource::ImdbId, language)
            .await?;
        let entry = match kind {
            MediaKind::Movie => found.movie_results.first(),
            MediaKind::Series => found.tv_results.first(),
        };
        entry.map(|e| e.id).ok_or(ProviderError::Empty)
    }

    pub async fn movie_details(
        &self,
        tmdb_id: i64,
        language: &str,
    ) -> ProviderResult<MovieDetails> {
        let url = format!(
            "{}/movie/{}?api_key={}&language={}&append_to_response=credits,videos,images&include_image_language={},en,null",
            TMDB_API_BASE,
            tmdb_id,
            self.api_key,
            language,
            short_language(language)
        );
        self.get_json(&url).await
    }

    pub async fn tv_details(&self, tmdb_id: i64, language: &str) -> ProviderResult<TvDetails> {
        let url = format!(
            "{}/tv/{}?api_key={}&language={}&append_to_response=external_ids,credits,videos,images&include_image_language={},en,null",
            TMDB_API_BASE,
            tmdb_id,
            self.api_key,
            language,
            short_language(language)
        );
        self.get_json(&url).await
    }

    pub async fn season_details(
        &self,
        tv_id: i64,
        season_number: i32,
        language: &str,
    ) -> ProviderResult<SeasonDetails> {
        let url = format!(
            "{}/tv/{}/season/{}?api_key={}&language={}",
            TMDB_API_BASE, tv_id, season_number, self.api_key, language
        );
        self.get_json(&url).await
    }
}

/// `it-IT` -> `it`; TMDB image filters want the bare language code.
pub fn short_language(language: &str) -> &str {
    language.split('-').next().unwrap_or(language)
}
