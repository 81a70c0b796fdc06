// Fanart.tv artwork provider service
// API Documentation: https://fanarttv.docs.apiary.io/

use reqwest::Client;
use serde::Deserialize;

use crate::error::{ProviderError, ProviderResult};
use crate::models::MediaKind;

const FANART_API_BASE: &str = "http://webservice.fanart.tv/v3";

pub struct FanartClient {
    client: Client,
    api_key: String,
}

/// Logo assets for one title, split by definition. Lists the title does
/// not have simply come back empty.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ImageAssets {
    pub hdmovielogo: Vec<LogoAsset>,
    pub movielogo: Vec<LogoAsset>,
    pub hdtvlogo: Vec<LogoAsset>,
    pub clearlogo: Vec<LogoAsset>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogoAsset {
    pub url: String,
    pub lang: String,
}

impl ImageAssets {
    /// High-definition logo list for the given kind.
    pub fn hd_logos(&self, kind: MediaKind) -> &[LogoAsset] {
        match kind {
            MediaKind::Movie => &self.hdmovielogo,
            MediaKind::Series => &self.hdtvlogo,
        }
    }

    /// Standard-definition fallback list for the given kind.
    pub fn sd_logos(&self, kind: MediaKind) -> &[LogoAsset] {
        match kind {
            MediaKind::Movie => &self.movielogo,
            MediaKind::Series => &self.clearlogo,
        }
    }
}

impl FanartClient {
    pub fn new(client: Client, api_key: String) -> Self {
        Self { client, api_key }
    }

    /// Artwork for one title. The id scheme follows the upstream: TMDB id
    /// for movies, TVDB id for shows.
    pub async fn images(&self, kind: MediaKind, id: &str) -> ProviderResult<ImageAssets> {
        let path = match kind {
            MediaKind::Movie => "movies",
            MediaKind::Series => "tv",
        };
        let url = format!("{FANART_API_BASE}/{path}/{id}?api_key={}", self.api_key);

        let resp = self.client.get(&url).send().await?;
        match resp.status() {
            status if status.is_success() => Ok(resp.json().await?),
            reqwest::StatusCode::NOT_FOUND => Err(ProviderError::Empty),
            reqwest::StatusCode::TOO_MANY_REQUESTS => Err(ProviderError::RateLimited),
            status => Err(ProviderError::Unavailable(format!(
                "fanart.tv returned {status}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assets_default_to_empty_lists() {
        let assets: ImageAssets = serde_json::from_str(r#"{"name":"The Matrix"}"#).unwrap();
        assert!(assets.hd_logos(MediaKind::Movie).is_empty());
        assert!(assets.sd_logos(MediaKind::Series).is_empty());
    }

    #[test]
    fn test_logo_lists_by_kind() {
        let assets: ImageAssets = serde_json::from_str(
            r#"{
                "hdmovielogo": [{"url": "https://a/movie-hd.png", "lang": "en"}],
                "hdtvlogo": [{"url": "https://a/tv-hd.png", "lang": "it"}]
            }"#,
        )
        .unwrap();
        assert_eq!(assets.hd_logos(MediaKind::Movie)[0].url, "https://a/movie-hd.png");
        assert_eq!(assets.hd_logos(MediaKind::Series)[0].lang, "it");
    }
}
