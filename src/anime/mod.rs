// Anime identifier resolution and catalog deduplication.
//
// Kitsu and MAL catalogs address shows by their own id schemes and split
// one show into per-season entries. The index maps those aliases to the
// canonical IMDb identifier using the Fribb/anime-lists cross-reference
// table, downloaded at startup and rebuilt on demand by the admin reload.

use anyhow::{Context, Result};
use reqwest::Client;
use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use crate::models::CatalogItem;

const MAPPING_URL: &str =
    "https://raw.githubusercontent.com/Fribb/anime-lists/master/anime-list-full.json";

#[derive(Debug, serde::Deserialize)]
struct MappingEntry {
    #[serde(default)]
    kitsu_id: Option<i64>,
    #[serde(default)]
    mal_id: Option<i64>,
    #[serde(default)]
    imdb_id: Option<String>,
}

/// Best-effort static mapping of anime aliases to canonical ids.
/// Unresolved aliases are passed through untranslated, never treated as
/// errors.
pub struct AnimeIndex {
    kitsu_to_imdb: RwLock<HashMap<i64, String>>,
    mal_to_imdb: RwLock<HashMap<i64, String>>,
    /// Canonical ids known to belong to anime. Records resolved through
    /// here skip the generic merge path.
    anime_imdb_ids: RwLock<HashSet<String>>,
}

impl AnimeIndex {
    pub fn new() -> Self {
        Self {
            kitsu_to_imdb: RwLock::new(HashMap::new()),
            mal_to_imdb: RwLock::new(HashMap::new()),
            anime_imdb_ids: RwLock::new(HashSet::new()),
        }
    }

    /// Download the cross-reference table and rebuild the maps.
    /// Returns the number of aliases with a canonical id.
    pub async fn download(&self, client: &Client) -> Result<usize> {
        let entries: Vec<MappingEntry> = client
            .get(MAPPING_URL)
            .send()
            .await
            .context("failed to download anime mapping table")?
            .error_for_status()
            .context("anime mapping table request rejected")?
            .json()
            .await
            .context("failed to parse anime mapping table")?;

        let mut kitsu = HashMap::new();
        let mut mal = HashMap::new();
        let mut imdb_ids = HashSet::new();
        for entry in entries {
            let Some(imdb_id) = entry.imdb_id.filter(|id| id.starts_with("tt")) else {
                continue;
            };
            if let Some(id) = entry.kitsu_id {
                kitsu.insert(id, imdb_id.clone());
            }
            if let Some(id) = entry.mal_id {
                mal.insert(id, imdb_id.clone());
            }
            imdb_ids.insert(imdb_id);
        }

        let mapped = kitsu.len() + mal.len();
        *self.kitsu_to_imdb.write().unwrap() = kitsu;
        *self.mal_to_imdb.write().unwrap() = mal;
        *self.anime_imdb_ids.write().unwrap() = imdb_ids;
        tracing::info!(aliases = mapped, "anime mapping tables loaded");
        Ok(mapped)
    }

    /// Resolve an alias identifier (`kitsu:123` / `mal:456`, `_` accepted
    /// as separator) to its canonical id. Returns `(canonical, converted)`;
    /// unresolved aliases yield `(None, false)`.
    pub fn resolve(&self, alias: &str) -> (Option<String>, bool) {
        let normalized = alias.replace('_', ":");
        let canonical = match normalized.split_once(':') {
            Some(("kitsu", rest)) => rest
                .split(':')
                .next()
                .and_then(|n| n.parse::<i64>().ok())
                .and_then(|id| self.kitsu_to_imdb.read().unwrap().get(&id).cloned()),
            Some(("mal", rest)) => rest
                .split(':')
                .next()
                .and_then(|n| n.parse::<i64>().ok())
                .and_then(|id| self.mal_to_imdb.read().unwrap().get(&id).cloned()),
            _ => None,
        };
        let converted = canonical.is_some();
        (canonical, converted)
    }

    pub fn is_alias(id: &str) -> bool {
        id.starts_with("kitsu") || id.starts_with("mal")
    }

    /// Whether a canonical id is a known anime (its episode accounting may
    /// need the TVDB reconciliation path and skips the generic merge).
    pub fn is_anime_canonical(&self, imdb_id: &str) -> bool {
        self.anime_imdb_ids.read().unwrap().contains(imdb_id)
    }

    /// Collapse per-season catalog rows for the same show into a single
    /// representative entry.
    ///
    /// Items with no canonical identifier, or that are not TV series
    /// (movies, OVAs, ONAs, specials), are always kept. Resolved TV
    /// entries are kept only on first occurrence of their canonical id;
    /// input order is otherwise preserved, so the pass is idempotent.
    pub fn deduplicate_catalog(&self, items: Vec<CatalogItem>) -> Vec<CatalogItem> {
        let mut seen: HashSet<String> = HashSet::new();
        let mut unique = Vec::with_capacity(items.len());

        for mut item in items {
            let (canonical, _) = self.resolve(&item.id);
            if let Some(ref id) = canonical {
                item.imdb_id = Some(id.clone());
            }
            let is_tv = item.anime_type.as_deref() == Some("TV");

            match canonical {
                Some(id) if is_tv => {
                    if seen.insert(id) {
                        unique.push(item);
                    }
                }
                _ => unique.push(item),
            }
        }

        unique
    }
}

impl Default for AnimeIndex {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index_with(kitsu: &[(i64, &str)], mal: &[(i64, &str)]) -> AnimeIndex {
        let index = AnimeIndex::new();
        {
            let mut map = index.kitsu_to_imdb.write().unwrap();
            for (id, imdb) in kitsu {
                map.insert(*id, imdb.to_string());
            }
        }
        {
            let mut map = index.mal_to_imdb.write().unwrap();
            for (id, imdb) in mal {
                map.insert(*id, imdb.to_string());
            }
        }
        index
    }

    fn tv_item(id: &str) -> CatalogItem {
        CatalogItem {
            id: id.to_string(),
            kind: "series".to_string(),
            anime_type: Some("TV".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_resolve_known_aliases() {
        let index = index_with(&[(1, "tt0111161")], &[(5, "tt0111161")]);
        assert_eq!(
            index.resolve("kitsu:1"),
            (Some("tt0111161".to_string()), true)
        );
        assert_eq!(index.resolve("mal:5"), (Some("tt0111161".to_string()), true));
        // Underscore separator from some upstreams
        assert_eq!(
            index.resolve("mal_5"),
            (Some("tt0111161".to_string()), true)
        );
    }

    #[test]
    fn test_unresolved_alias_passes_through() {
        let index = index_with(&[], &[]);
        assert_eq!(index.resolve("kitsu:999"), (None, false));
        assert_eq!(index.resolve("tt0111161"), (None, false));
    }

    #[test]
    fn test_dedup_collapses_season_entries() {
        // Same show surfaced by both alias providers
        let index = index_with(&[(1, "tt0111161")], &[(5, "tt0111161")]);
        let items = vec![tv_item("kitsu:1"), tv_item("mal:5")];
        let out = index.deduplicate_catalog(items);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].id, "kitsu:1");
        assert_eq!(out[0].imdb_id.as_deref(), Some("tt0111161"));
    }

    #[test]
    fn test_dedup_keeps_movies_and_specials() {
        let index = index_with(&[(1, "tt0111161"), (2, "tt0111161")], &[]);
        let mut movie = tv_item("kitsu:1");
        movie.anime_type = Some("movie".to_string());
        let mut ova = tv_item("kitsu:2");
        ova.anime_type = Some("OVA".to_string());
        let out = index.deduplicate_catalog(vec![movie, ova]);
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn test_dedup_keeps_unresolved_and_preserves_order() {
        let index = index_with(&[(1, "tt0111161"), (3, "tt0111161")], &[]);
        let items = vec![tv_item("kitsu:1"), tv_item("kitsu:999"), tv_item("kitsu:3")];
        let out = index.deduplicate_catalog(items);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].id, "kitsu:1");
        assert_eq!(out[1].id, "kitsu:999");
    }

    #[test]
    fn test_dedup_is_idempotent() {
        let index = index_with(&[(1, "tt1"), (2, "tt1"), (3, "tt2")], &[]);
        let items = vec![tv_item("kitsu:1"), tv_item("kitsu:2"), tv_item("kitsu:3")];
        let once = index.deduplicate_catalog(items);
        let twice = index.deduplicate_catalog(once.clone());
        assert_eq!(once.len(), twice.len());
        let ids: Vec<_> = once.iter().map(|i| i.id.clone()).collect();
        let ids_twice: Vec<_> = twice.iter().map(|i| i.id.clone()).collect();
        assert_eq!(ids, ids_twice);
    }
}
