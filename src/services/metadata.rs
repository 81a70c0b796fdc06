// Resolution pipeline: one entry point per meta request, fanning out to
// the primary (TMDB or addon mirror) and secondary (Cinemeta) providers,
// merging, translating, and caching the result per (language, id).

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use reqwest::Client;

use crate::anime::AnimeIndex;
use crate::cache::TtlCache;
use crate::error::ProviderError;
use crate::models::{CatalogItem, Episode, MediaKind, MetaRecord, MetaResponse};
use crate::pool::AddonPool;
use crate::services::addon::TmdbAddonClient;
use crate::services::builder;
use crate::services::cinemeta::StremioClient;
use crate::services::fanart::{FanartClient, ImageAssets};
use crate::services::merge;
use crate::services::tmdb::{ExternalSource, TmdbClient};
use crate::services::translate::Translator;
use crate::services::tvdb::TvdbClient;

pub struct MetadataService {
    client: Client,
    tmdb: TmdbClient,
    tvdb: TvdbClient,
    fanart: FanartClient,
    cinemeta: StremioClient,
    kitsu: StremioClient,
    addon: Option<TmdbAddonClient>,
    translator: Translator,
    anime: Arc<AnimeIndex>,
    languages: Vec<String>,
    /// One meta namespace per language; entries are full responses.
    meta_caches: HashMap<String, TtlCache<MetaResponse>>,
}

pub struct MetadataServiceConfig {
    pub tmdb_api_key: String,
    pub tvdb_api_key: String,
    pub tvdb_user: Option<String>,
    pub fanart_api_key: String,
    pub languages: Vec<String>,
    pub meta_ttl: Duration,
    pub translation_ttl: Duration,
    pub addon_pool: Option<Arc<AddonPool>>,
}

impl MetadataService {
    pub fn new(client: Client, config: MetadataServiceConfig) -> Self {
        let meta_caches = config
            .languages
            .iter()
            .map(|lang| {
                let cache = TtlCache::with_spill_dir(
                    format!("meta/{lang}"),
                    config.meta_ttl,
                    format!("./cache/{lang}/meta").into(),
                );
                cache.clear();
                (lang.clone(), cache)
            })
            .collect();

        Self {
            tmdb: TmdbClient::new(client.clone(), config.tmdb_api_key),
            tvdb: TvdbClient::new(client.clone(), config.tvdb_api_key, config.tvdb_user),
            fanart: FanartClient::new(client.clone(), config.fanart_api_key),
            cinemeta: StremioClient::cinemeta(client.clone()),
            kitsu: StremioClient::kitsu(client.clone()),
            addon: config
                .addon_pool
                .map(|pool| TmdbAddonClient::new(client.clone(), pool)),
            translator: Translator::new(
                client.clone(),
                &config.languages,
                config.translation_ttl,
            ),
            anime: Arc::new(AnimeIndex::new()),
            languages: config.languages,
            meta_caches,
            client,
        }
    }

    pub fn anime(&self) -> &AnimeIndex {
        &self.anime
    }

    pub fn translator(&self) -> &Translator {
        &self.translator
    }

    /// Download (or re-download) the anime mapping tables.
    pub async fn reload_anime_maps(&self) -> anyhow::Result<usize> {
        self.anime.download(&self.client).await
    }

    /// Eagerly sweep expired entries from every cache namespace.
    pub fn expire_caches(&self) -> usize {
        let mut reclaimed = 0;
        for cache in self.meta_caches.values() {
            reclaimed += cache.expire();
        }
        for lang in &self.languages {
            if let Some(cache) = self.translator.cache(lang) {
                reclaimed += cache.expire();
            }
        }
        reclaimed
    }

    /// Resolve one title into its merged, translated record.
    ///
    /// `kind_label` is the raw request type (`movie`/`series`/`anime`);
    /// it is forwarded verbatim to the anime addon, while the typed kind
    /// drives the provider calls.
    ///
    /// Never errors: any combination of provider failures degrades to an
    /// empty response.
    pub async fn resolve_meta(
        &self,
        kind: MediaKind,
        kind_label: &str,
        id: &str,
        language: &str,
    ) -> MetaResponse {
        if let Some(cache) = self.meta_caches.get(language) {
            if let Some(hit) = cache.get(id) {
                return hit;
            }
        }

        let response = if AnimeIndex::is_alias(id) {
            self.resolve_alias(kind, kind_label, id, language).await
        } else {
            self.resolve_canonical(kind, id, language).await
        };

        // Only real records are cached: a transient all-provider failure
        // must not pin the title empty for the full ttl.
        if response.meta.is_some() {
            if let Some(cache) = self.meta_caches.get(language) {
                cache.set(id, response.clone());
            }
        }
        response
    }

    /// Alias path. The anime addon's record is fetched first because its
    /// type tag gates conversion: TV series and movies with a canonical
    /// id delegate to the canonical pipeline and get re-addressed under
    /// the alias; OVAs, specials and unresolved aliases keep the addon's
    /// own record, translated in place.
    async fn resolve_alias(
        &self,
        kind: MediaKind,
        kind_label: &str,
        id: &str,
        language: &str,
    ) -> MetaResponse {
        let kitsu_response = match self.kitsu.meta(kind_label, id).await {
            Ok(response) => Some(response),
            Err(e) => {
                if !matches!(e, ProviderError::Empty) {
                    tracing::warn!(id, error = %e, "anime addon lookup failed");
                }
                None
            }
        };

        let (canonical, _) = self.anime.resolve(id);
        let convertible = kitsu_response
            .as_ref()
            .and_then(|r| r.meta.as_ref())
            .and_then(|m| m.anime_type.as_deref())
            .map_or(true, |t| t == "TV" || t == "movie");

        if let Some(imdb_id) = canonical.clone().filter(|_| convertible) {
            let resolved = self.resolve_canonical(kind, &imdb_id, language).await;
            if let Some(record) = resolved.meta {
                return MetaResponse::of(readdress_record(record, id));
            }
        }

        let Some(mut response) = kitsu_response else {
            return MetaResponse::empty();
        };
        if let Some(record) = response.meta.as_mut() {
            if let Some(imdb_id) = canonical {
                record.imdb_id = imdb_id;
            }
            record.description = self
                .translator
                .translate_text(&record.description, language)
                .await;
            self.translator
                .translate_episode_batch(&mut record.videos, language)
                .await;
        }
        response
    }

    /// Canonical (IMDb-identified) path: concurrent primary + secondary
    /// fetch, merge, targeted translation of whatever arrived in English.
    async fn resolve_canonical(&self, kind: MediaKind, id: &str, language: &str) -> MetaResponse {
        let (primary, secondary) = futures::join!(
            self.fetch_primary(kind, id, language),
            self.fetch_secondary(kind, id),
        );

        match (primary, secondary) {
            (Some(primary), Some(mut secondary)) => {
                let description_missing = primary.description.is_empty();
                self.translate_secondary_only_episodes(&primary, &mut secondary, language)
                    .await;
                let mut merged = merge::merge(primary, secondary).record;
                if description_missing && !merged.description.is_empty() {
                    merged.description = self
                        .translator
                        .translate_text(&merged.description, language)
                        .await;
                }
                MetaResponse::of(merged)
            }
            (Some(primary), None) => MetaResponse::of(primary),
            (None, Some(mut secondary)) => {
                secondary.description = self
                    .translator
                    .translate_text(&secondary.description, language)
                    .await;
                self.translator
                    .translate_episode_batch(&mut secondary.videos, language)
                    .await;
                MetaResponse::of(secondary)
            }
            (None, None) => MetaResponse::empty(),
        }
    }

    /// Episodes Cinemeta knows about but the primary source does not are
    /// the only ones still carrying English text; translate just those
    /// before the merge so localized names are never re-translated.
    async fn translate_secondary_only_episodes(
        &self,
        primary: &MetaRecord,
        secondary: &mut MetaRecord,
        language: &str,
    ) {
        let primary_ids: HashSet<(i32, i32)> =
            primary.videos.iter().map(Episode::identity).collect();
        let mut extra: Vec<Episode> = Vec::new();
        secondary.videos.retain(|ep| {
            if primary_ids.contains(&ep.identity()) {
                true
            } else {
                extra.push(ep.clone());
                false
            }
        });
        if extra.is_empty() {
            return;
        }
        self.translator
            .translate_episode_batch(&mut extra, language)
            .await;
        secondary.videos.extend(extra);
    }

    async fn fetch_primary(
        &self,
        kind: MediaKind,
        id: &str,
        language: &str,
    ) -> Option<MetaRecord> {
        let result = match &self.addon {
            Some(addon) => self.fetch_from_addon(addon, kind, id, language).await,
            None => self.build_from_providers(kind, id, language).await,
        };
        match result {
            Ok(record) => Some(record),
            Err(ProviderError::Empty) => None,
            Err(e) if !e.is_absorbable() => {
                tracing::error!(id, error = %e, "primary provider auth failure");
                None
            }
            Err(e) => {
                tracing::warn!(id, error = %e, "primary provider failed");
                None
            }
        }
    }

    async fn fetch_secondary(&self, kind: MediaKind, id: &str) -> Option<MetaRecord> {
        match self.cinemeta.meta(kind.as_str(), id).await {
            Ok(response) => response.meta,
            Err(ProviderError::Empty) => None,
            Err(e) => {
                tracing::warn!(id, error = %e, "secondary provider failed");
                None
            }
        }
    }

    async fn fetch_from_addon(
        &self,
        addon: &TmdbAddonClient,
        kind: MediaKind,
        id: &str,
        language: &str,
    ) -> Result<MetaRecord, ProviderError> {
        let tmdb_id = self.tmdb.resolve_tmdb_id(id, kind, language).await?;
        let response = addon.meta(kind, tmdb_id).await?;
        response.meta.ok_or(ProviderError::Empty)
    }

    async fn build_from_providers(
        &self,
        kind: MediaKind,
        id: &str,
        language: &str,
    ) -> Result<MetaRecord, ProviderError> {
        let tmdb_id = self.tmdb.resolve_tmdb_id(id, kind, language).await?;
        match kind {
            MediaKind::Movie => self.build_movie(id, tmdb_id, language).await,
            MediaKind::Series => self.build_series(id, tmdb_id, language).await,
        }
    }

    async fn build_movie(
        &self,
        id: &str,
        tmdb_id: i64,
        language: &str,
    ) -> Result<MetaRecord, ProviderError> {
        let fanart_id = tmdb_id.to_string();
        let (details, art) = futures::join!(
            self.tmdb.movie_details(tmdb_id, language),
            self.fanart.images(MediaKind::Movie, &fanart_id),
        );
        let details = details?;
        let art = unwrap_art(art);
        Ok(builder::build_movie_meta(id, &details, &art, language))
    }

    async fn build_series(
        &self,
        id: &str,
        tmdb_id: i64,
        language: &str,
    ) -> Result<MetaRecord, ProviderError> {
        let details = self.tmdb.tv_details(tmdb_id, language).await?;
        let tvdb_id = details.external_ids.as_ref().and_then(|e| e.tvdb_id);

        // Fanart keys shows by TVDB id
        let art = match tvdb_id {
            Some(tvdb_id) => unwrap_art(
                self.fanart
                    .images(MediaKind::Series, &tvdb_id.to_string())
                    .await,
            ),
            None => ImageAssets::default(),
        };

        let mut record = builder::build_series_meta(id, &details, &art, language);
        record.videos = self
            .fetch_episodes(id, tmdb_id, &details, tvdb_id, language)
            .await;
        Ok(record)
    }

    /// Episode sequence for a show. The TMDB season fan-out is the normal
    /// path; for anime whose TMDB and TVDB season accounting disagree, the
    /// TVDB official episode list wins and gets localized per episode.
    async fn fetch_episodes(
        &self,
        id: &str,
        tmdb_id: i64,
        details: &crate::services::tmdb::TvDetails,
        tvdb_id: Option<i64>,
        language: &str,
    ) -> Vec<Episode> {
        if let Some(tvdb_id) = tvdb_id {
            if self.anime.is_anime_canonical(id) {
                match self.tvdb.series_extended(tvdb_id).await {
                    Ok(series) => {
                        let tmdb_seasons = details
                            .seasons
                            .iter()
                            .filter(|s| s.season_number > 0)
                            .count();
                        if series.official_season_count() != tmdb_seasons {
                            let mut episodes = builder::episodes_from_tvdb(id, &series);
                            self.localize_tvdb_episodes(&mut episodes, language).await;
                            return episodes;
                        }
                    }
                    Err(e) => {
                        tracing::warn!(id, error = %e, "TVDB reconciliation failed, keeping TMDB episodes");
                    }
                }
            }
        }

        let season_futures: Vec<_> = details
            .seasons
            .iter()
            .map(|s| self.tmdb.season_details(tmdb_id, s.season_number, language))
            .collect();
        let seasons: Vec<_> = join_all(season_futures)
            .await
            .into_iter()
            .filter_map(|r| match r {
                Ok(season) => Some(season),
                Err(e) => {
                    tracing::warn!(id, error = %e, "season fetch failed");
                    None
                }
            })
            .collect();
        builder::episodes_from_seasons(id, &seasons)
    }

    /// Overwrite TVDB-sourced episode text with the localized TMDB entry
    /// found via the episode's external id. All lookups run concurrently;
    /// misses leave the TVDB text in place.
    async fn localize_tvdb_episodes(&self, episodes: &mut [Episode], language: &str) {
        let lookups: Vec<_> = episodes
            .iter()
            .map(|ep| async move {
                match ep.tvdb_id {
                    Some(tvdb_id) => self
                        .tmdb
                        .find_by_external(&tvdb_id.to_string(), ExternalSource::TvdbId, language)
                        .await
                        .ok(),
                    None => None,
                }
            })
            .collect();
        let found = join_all(lookups).await;

        for (episode, found) in episodes.iter_mut().zip(found) {
            let Some(entry) = found.and_then(|f| f.tv_episode_results.into_iter().next()) else {
                continue;
            };
            if let Some(name) = entry.name.filter(|n| !n.is_empty()) {
                episode.name = name;
            }
            if let Some(overview) = entry.overview.filter(|o| !o.is_empty()) {
                episode.overview = overview.clone();
                episode.description = overview;
            }
            if let Some(still) = entry.still_path {
                episode.thumbnail = Some(format!(
                    "{}{still}",
                    crate::services::tmdb::TMDB_BACK_URL
                ));
            }
        }
    }

    /// Localized lookup results for a catalog page, one concurrent /find
    /// per entry that has a canonical id.
    pub async fn catalog_lookups(
        &self,
        items: &[CatalogItem],
        language: &str,
    ) -> Vec<Option<crate::services::tmdb::FindResults>> {
        let futures: Vec<_> = items
            .iter()
            .map(|item| async move {
                let imdb_id = catalog_canonical_id(item)?;
                self.tmdb
                    .find_by_external(&imdb_id, ExternalSource::ImdbId, language)
                    .await
                    .ok()
            })
            .collect();
        join_all(futures).await
    }
}

/// IMDb id of a catalog entry, either native or filled in by dedup.
fn catalog_canonical_id(item: &CatalogItem) -> Option<String> {
    if let Some(ref imdb_id) = item.imdb_id {
        return Some(imdb_id.clone());
    }
    if item.id.starts_with("tt") {
        return Some(item.id.clone());
    }
    None
}

/// Re-address a canonical record under an alias id: the record id, every
/// episode's composite id, and a movie's default video id all move to the
/// alias so the serving addon's stream matching keeps working.
fn readdress_record(mut record: MetaRecord, alias: &str) -> MetaRecord {
    let canonical = record.id.clone();
    record.id = alias.to_string();
    for episode in &mut record.videos {
        if let Some(rest) = episode.id.strip_prefix(&canonical) {
            episode.id = format!("{alias}{rest}");
        }
    }
    if let Some(hints) = record.behavior_hints.as_mut() {
        if hints.default_video_id.as_deref() == Some(canonical.as_str()) {
            hints.default_video_id = Some(alias.to_string());
        }
    }
    record
}

fn unwrap_art(result: Result<ImageAssets, ProviderError>) -> ImageAssets {
    match result {
        Ok(art) => art,
        Err(ProviderError::Empty) => ImageAssets::default(),
        Err(e) => {
            tracing::warn!(error = %e, "artwork fetch failed");
            ImageAssets::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BehaviorHints;

    #[test]
    fn test_readdress_moves_record_and_episode_ids() {
        let record = MetaRecord {
            id: "tt0988824".into(),
            kind: MediaKind::Series,
            videos: vec![
                Episode {
                    id: "tt0988824:1:1".into(),
                    season: 1,
                    episode: 1,
                    number: 1,
                    ..Default::default()
                },
                Episode {
                    id: "tt0988824:1:2".into(),
                    season: 1,
                    episode: 2,
                    number: 2,
                    ..Default::default()
                },
            ],
            ..Default::default()
        };
        let out = readdress_record(record, "kitsu:1555");
        assert_eq!(out.id, "kitsu:1555");
        assert_eq!(out.videos[0].id, "kitsu:1555:1:1");
        assert_eq!(out.videos[1].id, "kitsu:1555:1:2");
    }

    #[test]
    fn test_readdress_moves_default_video_id() {
        let record = MetaRecord {
            id: "tt2560140".into(),
            kind: MediaKind::Movie,
            behavior_hints: Some(BehaviorHints {
                default_video_id: Some("tt2560140".into()),
                has_scheduled_videos: false,
            }),
            ..Default::default()
        };
        let out = readdress_record(record, "mal:28851");
        assert_eq!(
            out.behavior_hints.unwrap().default_video_id.as_deref(),
            Some("mal:28851")
        );
    }

    fn service_without_credentials() -> MetadataService {
        MetadataService::new(
            Client::new(),
            MetadataServiceConfig {
                tmdb_api_key: String::new(),
                tvdb_api_key: String::new(),
                tvdb_user: None,
                fanart_api_key: String::new(),
                languages: vec!["it-IT".into()],
                meta_ttl: Duration::from_secs(3600),
                translation_ttl: Duration::from_secs(3600),
                addon_pool: None,
            },
        )
    }

    #[tokio::test]
    async fn test_failed_resolution_is_not_cached() {
        let service = service_without_credentials();
        // An alias no source knows about: the anime addon has nothing
        // under id 0 and the mapping tables were never downloaded, so
        // every path degrades to the empty response.
        let response = service
            .resolve_meta(MediaKind::Series, "anime", "kitsu:0", "it-IT")
            .await;
        assert!(response.meta.is_none());
        // The miss is not pinned for the cache ttl; the next request
        // retries the providers.
        assert!(service.meta_caches["it-IT"].get("kitsu:0").is_none());
    }

    #[tokio::test]
    async fn test_cached_record_short_circuits_resolution() {
        let service = service_without_credentials();
        let record = MetaRecord {
            id: "tt0111161".into(),
            kind: MediaKind::Movie,
            name: "Le ali della libert\u{e0}".into(),
            ..Default::default()
        };
        service.meta_caches["it-IT"].set("tt0111161", MetaResponse::of(record));

        // No credentials are configured; a provider round trip would
        // come back empty, so a named record proves the cache answered.
        let response = service
            .resolve_meta(MediaKind::Movie, "movie", "tt0111161", "it-IT")
            .await;
        assert_eq!(
            response.meta.unwrap().name,
            "Le ali della libert\u{e0}"
        );
    }

    #[test]
    fn test_catalog_canonical_id_sources() {
        let native = CatalogItem {
            id: "tt0903747".into(),
            ..Default::default()
        };
        assert_eq!(catalog_canonical_id(&native).as_deref(), Some("tt0903747"));

        let resolved = CatalogItem {
            id: "kitsu:1".into(),
            imdb_id: Some("tt0988824".into()),
            ..Default::default()
        };
        assert_eq!(
            catalog_canonical_id(&resolved).as_deref(),
            Some("tt0988824")
        );

        let unresolved = CatalogItem {
            id: "kitsu:9".into(),
            ..Default::default()
        };
        assert!(catalog_canonical_id(&unresolved).is_none());
    }
}
