// Translation orchestrator.
//
// Delegates actual translation to the Lingva API and keeps one cache
// namespace per target language, keyed by the exact source text: identical
// strings across different titles are translated at most once per language
// for the lifetime of the cache ttl.

use futures::future::join_all;
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

use crate::cache::TtlCache;
use crate::models::{CatalogItem, Episode};
use crate::services::tmdb::{short_language, FindResults, TMDB_BACK_URL, TMDB_POSTER_URL};

const LINGVA_API_BASE: &str = "https://lingva-translate-azure.vercel.app/api/v1";
const SOURCE_LANGUAGE: &str = "en";

#[derive(Debug, Deserialize)]
struct LingvaResponse {
    #[serde(default)]
    translation: String,
}

pub struct Translator {
    client: Client,
    /// One namespace per target language; a language never sees another
    /// language's entries.
    caches: HashMap<String, TtlCache<String>>,
    /// Artificial per-text completion delay, to exercise out-of-order
    /// completion in batch tests.
    #[cfg(test)]
    delays: HashMap<String, Duration>,
}

impl Translator {
    pub fn new(client: Client, languages: &[String], ttl: Duration) -> Self {
        let caches = languages
            .iter()
            .map(|lang| {
                let cache = TtlCache::with_spill_dir(
                    format!("translation/{lang}"),
                    ttl,
                    format!("./cache/{lang}/translation").into(),
                );
                cache.clear();
                (lang.clone(), cache)
            })
            .collect();
        Self {
            client,
            caches,
            #[cfg(test)]
            delays: HashMap::new(),
        }
    }

    pub fn cache(&self, language: &str) -> Option<&TtlCache<String>> {
        self.caches.get(language)
    }

    /// Translate one string into the target language.
    ///
    /// Empty input passes through unchanged with no cache entry and no
    /// API call. A cache hit short-circuits the network entirely. On a
    /// transport failure the original text is returned untranslated and
    /// nothing is cached, so the next request tries again.
    pub async fn translate_text(&self, text: &str, language: &str) -> String {
        if text.is_empty() {
            return String::new();
        }

        #[cfg(test)]
        if let Some(delay) = self.delays.get(text) {
            tokio::time::sleep(*delay).await;
        }

        let Some(cache) = self.caches.get(language) else {
            tracing::warn!(language, "no translation namespace for language");
            return text.to_string();
        };

        if let Some(hit) = cache.get(text) {
            return hit;
        }

        let url = format!(
            "{LINGVA_API_BASE}/{SOURCE_LANGUAGE}/{}/{}",
            short_language(language),
            urlencoding::encode(text)
        );

        match self.fetch_translation(&url).await {
            Some(translated) => {
                cache.set(text, translated.clone());
                translated
            }
            None => {
                tracing::warn!(language, "translation call failed, passing text through");
                text.to_string()
            }
        }
    }

    async fn fetch_translation(&self, url: &str) -> Option<String> {
        let resp = self.client.get(url).send().await.ok()?;
        if !resp.status().is_success() {
            return None;
        }
        // An absent `translation` field means "no translation available"
        // and comes back as the empty string.
        let body: LingvaResponse = resp.json().await.ok()?;
        Some(body.translation)
    }

    /// Translate name and overview of every episode, all calls launched
    /// concurrently. Results are written back positionally: output order
    /// equals input order regardless of completion order.
    pub async fn translate_episode_batch(&self, episodes: &mut [Episode], language: &str) {
        let futures: Vec<_> = episodes
            .iter()
            .flat_map(|ep| {
                [
                    self.translate_text(&ep.name, language),
                    self.translate_text(&ep.overview, language),
                ]
            })
            .collect();

        let translations = join_all(futures).await;

        for (i, episode) in episodes.iter_mut().enumerate() {
            episode.name = translations[2 * i].clone();
            episode.overview = translations[2 * i + 1].clone();
            episode.description = episode.overview.clone();
        }
    }
}

/// Overwrite catalog entries with localized TMDB data. `details` is
/// positional: one lookup result per item, `None` where the item had no
/// canonical id to look up.
pub fn localize_catalog(
    items: &mut [CatalogItem],
    details: &[Option<FindResults>],
    skip_posters: bool,
) {
    for (item, found) in items.iter_mut().zip(details.iter()) {
        let Some(found) = found else { continue };
        let entry = if item.kind == "movie" {
            found.movie_results.first()
        } else {
            found.tv_results.first()
        };
        let Some(entry) = entry else { continue };

        if let Some(name) = entry.display_name() {
            if !name.is_empty() {
                item.name = name.to_string();
            }
        }
        if let Some(ref overview) = entry.overview {
            if !overview.is_empty() {
                item.description = overview.clone();
            }
        }
        if let Some(ref backdrop) = entry.backdrop_path {
            item.background = Some(format!("{TMDB_BACK_URL}{backdrop}"));
        }
        if !skip_posters {
            if let Some(ref poster) = entry.poster_path {
                item.poster = Some(format!("{TMDB_POSTER_URL}{poster}"));
            }
        }
    }
}

/// Flag emoji appended to translated manifests.
pub fn language_flag(language: &str) -> &'static str {
    match language {
        "it-IT" => "\u{1F1EE}\u{1F1F9}",
        "es-ES" => "\u{1F1EA}\u{1F1F8}",
        "fr-FR" => "\u{1F1EB}\u{1F1F7}",
        "de-DE" => "\u{1F1E9}\u{1F1EA}",
        "pt-PT" => "\u{1F1F5}\u{1F1F9}",
        "pt-BR" => "\u{1F1E7}\u{1F1F7}",
        "ru-RU" => "\u{1F1F7}\u{1F1FA}",
        "ja-JP" => "\u{1F1EF}\u{1F1F5}",
        "zh-CN" => "\u{1F1E8}\u{1F1F3}",
        "ko-KR" => "\u{1F1F0}\u{1F1F7}",
        "ar-SA" => "\u{1F1F8}\u{1F1E6}",
        "hi-IN" => "\u{1F1EE}\u{1F1F3}",
        _ => "\u{1F310}",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn translator_for(language: &str) -> Translator {
        Translator::new(
            Client::new(),
            &[language.to_string()],
            Duration::from_secs(3600),
        )
    }

    #[tokio::test]
    async fn test_cache_hit_issues_no_network_call() {
        let translator = translator_for("it-IT");
        translator
            .cache("it-IT")
            .unwrap()
            .set("Pilot", "Episodio pilota".to_string());

        // A network call would fail in the test environment; a hit never
        // reaches the network.
        let out = translator.translate_text("Pilot", "it-IT").await;
        assert_eq!(out, "Episodio pilota");
    }

    #[tokio::test]
    async fn test_empty_input_passes_through_without_cache_entry() {
        let translator = translator_for("it-IT");
        let out = translator.translate_text("", "it-IT").await;
        assert_eq!(out, "");
        assert!(translator.cache("it-IT").unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_language_passes_through() {
        let translator = translator_for("it-IT");
        let out = translator.translate_text("Hello", "xx-XX").await;
        assert_eq!(out, "Hello");
    }

    #[tokio::test]
    async fn test_episode_batch_preserves_order() {
        let translator = translator_for("it-IT");
        let cache = translator.cache("it-IT").unwrap();
        cache.set("B", "B-translated".to_string());
        cache.set("A", "A-translated".to_string());
        cache.set("C", "C-translated".to_string());
        cache.set("ov-B", "ov-B-t".to_string());
        cache.set("ov-A", "ov-A-t".to_string());
        cache.set("ov-C", "ov-C-t".to_string());

        let mut episodes: Vec<Episode> = ["B", "A", "C"]
            .iter()
            .enumerate()
            .map(|(i, name)| Episode {
                id: format!("tt1:1:{}", i + 1),
                name: name.to_string(),
                overview: format!("ov-{name}"),
                season: 1,
                episode: i as i32 + 1,
                number: i as i32 + 1,
                ..Default::default()
            })
            .collect();

        translator.translate_episode_batch(&mut episodes, "it-IT").await;

        assert_eq!(episodes[0].name, "B-translated");
        assert_eq!(episodes[1].name, "A-translated");
        assert_eq!(episodes[2].name, "C-translated");
        assert_eq!(episodes[1].overview, "ov-A-t");
        assert_eq!(episodes[1].description, "ov-A-t");
        // Identity order untouched
        assert_eq!(episodes[2].id, "tt1:1:3");
    }

    #[tokio::test]
    async fn test_episode_batch_order_survives_staggered_completion() {
        let mut translator = translator_for("it-IT");
        // Earlier entries finish last: completion order is the reverse of
        // input order.
        for (text, ms) in [("B", 40), ("ov-B", 35), ("A", 25), ("ov-A", 20), ("C", 5), ("ov-C", 1)] {
            translator
                .delays
                .insert(text.to_string(), Duration::from_millis(ms));
        }
        let cache = translator.cache("it-IT").unwrap();
        cache.set("B", "B-translated".to_string());
        cache.set("A", "A-translated".to_string());
        cache.set("C", "C-translated".to_string());
        cache.set("ov-B", "ov-B-t".to_string());
        cache.set("ov-A", "ov-A-t".to_string());
        cache.set("ov-C", "ov-C-t".to_string());

        let mut episodes: Vec<Episode> = ["B", "A", "C"]
            .iter()
            .enumerate()
            .map(|(i, name)| Episode {
                id: format!("tt1:1:{}", i + 1),
                name: name.to_string(),
                overview: format!("ov-{name}"),
                season: 1,
                episode: i as i32 + 1,
                number: i as i32 + 1,
                ..Default::default()
            })
            .collect();

        translator.translate_episode_batch(&mut episodes, "it-IT").await;

        // Write-back is positional, so the reversed completion order
        // never permutes the results.
        assert_eq!(episodes[0].name, "B-translated");
        assert_eq!(episodes[0].overview, "ov-B-t");
        assert_eq!(episodes[1].name, "A-translated");
        assert_eq!(episodes[1].overview, "ov-A-t");
        assert_eq!(episodes[2].name, "C-translated");
        assert_eq!(episodes[2].overview, "ov-C-t");
    }

    #[test]
    fn test_localize_catalog_overwrites_from_lookup() {
        let mut items = vec![CatalogItem {
            id: "tt0133093".to_string(),
            kind: "movie".to_string(),
            name: "The Matrix".to_string(),
            ..Default::default()
        }];
        let found: FindResults = serde_json::from_str(
            r#"{"movie_results":[{"id":603,"title":"Matrix","overview":"Un hacker...","poster_path":"/p.jpg","backdrop_path":"/b.jpg"}]}"#,
        )
        .unwrap();

        localize_catalog(&mut items, &[Some(found)], false);
        assert_eq!(items[0].name, "Matrix");
        assert_eq!(items[0].description, "Un hacker...");
        assert_eq!(
            items[0].poster.as_deref(),
            Some("https://image.tmdb.org/t/p/w500/p.jpg")
        );
    }

    #[test]
    fn test_localize_catalog_skips_missing_lookups() {
        let mut items = vec![CatalogItem {
            id: "kitsu:1".to_string(),
            kind: "series".to_string(),
            name: "Original".to_string(),
            ..Default::default()
        }];
        localize_catalog(&mut items, &[None], false);
        assert_eq!(items[0].name, "Original");
    }
}
