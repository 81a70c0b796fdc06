// Stremio wire types: the canonical merged record served to clients and
// the catalog shapes passed through from upstream addons.

use serde::{Deserialize, Serialize};

/// Media kind. Immutable after creation, like the identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    #[default]
    Movie,
    Series,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Movie => "movie",
            MediaKind::Series => "series",
        }
    }

    /// Parse the path segment of a meta/catalog request.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "movie" => Some(MediaKind::Movie),
            "series" => Some(MediaKind::Series),
            _ => None,
        }
    }
}

/// Canonical output unit: one merged metadata record.
///
/// `id` and `kind` are fixed at creation; every other field may be
/// overwritten during merge or translation.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct MetaRecord {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: MediaKind,
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(rename = "imdb_id", skip_serializing_if = "String::is_empty")]
    pub imdb_id: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub cast: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub director: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub writer: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub genres: Vec<String>,
    #[serde(rename = "imdbRating", skip_serializing_if = "String::is_empty")]
    pub imdb_rating: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub country: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub released: Option<String>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub slug: String,
    /// Four-digit year for movies, `first[-last]` range for series.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub year: String,
    #[serde(rename = "releaseInfo", skip_serializing_if = "String::is_empty")]
    pub release_info: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub runtime: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub poster: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub background: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub logo: String,
    #[serde(rename = "trailerStreams", skip_serializing_if = "Vec::is_empty")]
    pub trailer_streams: Vec<Trailer>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub links: Vec<MetaLink>,
    /// Anime addons tag their records `TV`, `movie`, `OVA`, `ONA`,
    /// `special`; absent everywhere else.
    #[serde(rename = "animeType", skip_serializing_if = "Option::is_none")]
    pub anime_type: Option<String>,
    #[serde(rename = "behaviorHints", skip_serializing_if = "Option::is_none")]
    pub behavior_hints: Option<BehaviorHints>,
    /// Ordered episode sequence, series only. Ordering invariant:
    /// (season, episode) ascending, composite ids unique.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub videos: Vec<Episode>,
}

/// One episode of a series. The composite id is derived as
/// `{series_id}:{season}:{episode}` and is unique within the sequence.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct Episode {
    pub id: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub name: String,
    pub season: i32,
    pub episode: i32,
    /// Stremio clients read both `episode` and `number`.
    pub number: i32,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub overview: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
    #[serde(rename = "firstAired", skip_serializing_if = "Option::is_none")]
    pub first_aired: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub released: Option<String>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub rating: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tvdb_id: Option<i64>,
}

impl Episode {
    /// The (season, episode-number) pair used to reconcile episode lists
    /// across sources.
    pub fn identity(&self) -> (i32, i32) {
        (self.season, self.episode)
    }

    pub fn composite_id(series_id: &str, season: i32, episode: i32) -> String {
        format!("{series_id}:{season}:{episode}")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Trailer {
    pub title: String,
    #[serde(rename = "ytId")]
    pub yt_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct MetaLink {
    pub name: String,
    pub category: String,
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct BehaviorHints {
    #[serde(rename = "defaultVideoId", skip_serializing_if = "Option::is_none")]
    pub default_video_id: Option<String>,
    #[serde(rename = "hasScheduledVideos")]
    pub has_scheduled_videos: bool,
}

/// Envelope every meta endpoint answers with. An unresolvable title is an
/// empty envelope, never an error page: catalog availability survives
/// individual entry failures.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct MetaResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<MetaRecord>,
}

impl MetaResponse {
    pub fn empty() -> Self {
        Self { meta: None }
    }

    pub fn of(meta: MetaRecord) -> Self {
        Self { meta: Some(meta) }
    }

    pub fn is_empty(&self) -> bool {
        match &self.meta {
            None => true,
            Some(m) => m.name.is_empty() && m.videos.is_empty(),
        }
    }
}

/// One catalog page from an upstream addon. Unknown fields are preserved
/// verbatim through `extra` so pass-through stays lossless.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct CatalogPage {
    pub metas: Vec<CatalogItem>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct CatalogItem {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub poster: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub background: Option<String>,
    /// Canonical identifier once resolved; anime catalogs ship without it.
    #[serde(rename = "imdb_id", skip_serializing_if = "Option::is_none")]
    pub imdb_id: Option<String>,
    /// Anime catalogs tag entries `TV`, `movie`, `OVA`, `ONA`, `special`.
    #[serde(rename = "animeType", skip_serializing_if = "Option::is_none")]
    pub anime_type: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_composite_id_format() {
        assert_eq!(Episode::composite_id("tt0903747", 2, 13), "tt0903747:2:13");
    }

    #[test]
    fn test_media_kind_parse() {
        assert_eq!(MediaKind::parse("movie"), Some(MediaKind::Movie));
        assert_eq!(MediaKind::parse("series"), Some(MediaKind::Series));
        assert_eq!(MediaKind::parse("anime"), None);
    }

    #[test]
    fn test_empty_meta_serializes_to_bare_object() {
        let json = serde_json::to_string(&MetaResponse::empty()).unwrap();
        assert_eq!(json, "{}");
    }

    #[test]
    fn test_meta_record_skips_empty_fields() {
        let record = MetaRecord {
            id: "tt0111161".into(),
            kind: MediaKind::Movie,
            name: "The Shawshank Redemption".into(),
            ..Default::default()
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["type"], "movie");
        assert!(json.get("description").is_none());
        assert!(json.get("videos").is_none());
    }

    #[test]
    fn test_catalog_item_preserves_unknown_fields() {
        let raw = r#"{"id":"kitsu:1","type":"series","name":"Show","animeType":"TV","genres":["Action"]}"#;
        let item: CatalogItem = serde_json::from_str(raw).unwrap();
        assert_eq!(item.anime_type.as_deref(), Some("TV"));
        let back = serde_json::to_value(&item).unwrap();
        assert_eq!(back["genres"][0], "Action");
    }
}
