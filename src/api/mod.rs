// HTTP layer: the addon-in-front-of-an-addon surface. Every wrapped
// route carries the upstream addon URL (base64) and the user settings as
// path segments, so one deployment serves any number of upstream addons.

use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::get;
use axum::{Json, Router};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::models::{CatalogPage, MediaKind};
use crate::services::translate::{language_flag, localize_catalog};
use crate::AppState;

const DEFAULT_LANGUAGE: &str = "it-IT";

/// Id prefixes this addon can resolve; anything else redirects upstream.
const COMPATIBLE_PREFIXES: &[&str] = &["tt", "kitsu", "mal"];

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(home))
        .route("/manifest.json", get(own_manifest))
        .route("/admin/reload_maps", get(reload_maps))
        .route("/admin/clean_cache", get(clean_cache))
        .route("/:addon/:settings/manifest.json", get(wrapped_manifest))
        .route("/:addon/:settings/configure", get(configure_redirect))
        .route("/:addon/:settings/catalog/:kind/*path", get(wrapped_catalog))
        .route("/:addon/:settings/meta/:kind/:id", get(wrapped_meta))
        .route("/:addon/:settings/stream/*path", get(stream_redirect))
        .route("/:addon/:settings/subtitles/*path", get(subtitles_redirect))
}

/// Per-user options packed into one path segment as `key=value,key=value`.
#[derive(Debug, Clone, PartialEq)]
pub struct UserSettings {
    pub language: String,
    pub skip_posters: bool,
}

impl Default for UserSettings {
    fn default() -> Self {
        Self {
            language: DEFAULT_LANGUAGE.to_string(),
            skip_posters: false,
        }
    }
}

pub fn parse_user_settings(raw: &str) -> UserSettings {
    let mut settings = UserSettings::default();
    for pair in raw.split(',') {
        let Some((key, value)) = pair.split_once('=') else {
            continue;
        };
        match key {
            "language" => settings.language = value.to_string(),
            "sp" => settings.skip_posters = value == "1",
            _ => {}
        }
    }
    settings
}

/// Decode the base64 upstream addon URL, tolerating stripped padding.
pub fn decode_base64_url(encoded: &str) -> Option<String> {
    let mut padded = encoded.to_string();
    while padded.len() % 4 != 0 {
        padded.push('=');
    }
    let bytes = BASE64.decode(padded).ok()?;
    String::from_utf8(bytes).ok()
}

/// Stremio clients aggressively cache addon responses; everything we
/// serve is already cached server-side, so tell them not to.
fn no_cache_json(value: Value) -> Response {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static("no-cache, no-store, must-revalidate"),
    );
    headers.insert(header::PRAGMA, HeaderValue::from_static("no-cache"));
    headers.insert(header::EXPIRES, HeaderValue::from_static("0"));
    (headers, Json(value)).into_response()
}

async fn home() -> &'static str {
    "Meta Translator"
}

/// GET /manifest.json
/// This service's own addon manifest.
async fn own_manifest() -> Response {
    no_cache_json(json!({
        "id": "org.meta-translator",
        "version": env!("CARGO_PKG_VERSION"),
        "name": "Meta Translator",
        "description": "Localized metadata for any Stremio addon",
        "types": ["movie", "series", "anime"],
        "resources": ["meta"],
        "idPrefixes": COMPATIBLE_PREFIXES,
        "catalogs": [],
    }))
}

/// GET /:addon/:settings/manifest.json
/// Fetch the upstream manifest and mark it as translated: language tag,
/// flag suffix on the name, attribution in the description.
async fn wrapped_manifest(
    State(state): State<Arc<AppState>>,
    Path((addon, settings)): Path<(String, String)>,
) -> Response {
    let Some(addon_url) = decode_base64_url(&addon) else {
        return StatusCode::BAD_REQUEST.into_response();
    };
    let settings = parse_user_settings(&settings);

    let manifest = match fetch_json(&state, &format!("{addon_url}/manifest.json")).await {
        Some(v) => v,
        None => return no_cache_json(json!({})),
    };
    let mut manifest = manifest;

    let already_translated = manifest
        .get("translated")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    if !already_translated {
        manifest["translated"] = json!(true);
        manifest["t_language"] = json!(settings.language);
        if let Some(name) = manifest.get("name").and_then(Value::as_str) {
            manifest["name"] = json!(format!("{name} {}", language_flag(&settings.language)));
        }
        let attribution = format!("Translated by Meta Translator v{}", env!("CARGO_PKG_VERSION"));
        manifest["description"] = match manifest.get("description").and_then(Value::as_str) {
            Some(description) => json!(format!("{description} | {attribution}")),
            None => json!(attribution),
        };
    }

    no_cache_json(manifest)
}

/// GET /:addon/:settings/configure
async fn configure_redirect(Path((addon, _settings)): Path<(String, String)>) -> Response {
    match decode_base64_url(&addon) {
        Some(url) => Redirect::temporary(&format!("{url}/configure")).into_response(),
        None => StatusCode::BAD_REQUEST.into_response(),
    }
}

/// GET /:addon/:settings/catalog/:kind/*path
/// Pass the upstream catalog through with localized names, overviews
/// and artwork. Anime catalogs are deduplicated first.
async fn wrapped_catalog(
    State(state): State<Arc<AppState>>,
    Path((addon, settings, kind, path)): Path<(String, String, String, String)>,
) -> Response {
    let Some(addon_url) = decode_base64_url(&addon) else {
        return StatusCode::BAD_REQUEST.into_response();
    };
    let settings = parse_user_settings(&settings);

    let raw = match fetch_json(&state, &format!("{addon_url}/catalog/{kind}/{path}")).await {
        Some(v) => v,
        None => return no_cache_json(json!({})),
    };

    // Cinemeta's last-videos and calendar feeds are not catalogs
    if path.contains("last-videos") || path.contains("calendar-videos") {
        return no_cache_json(raw);
    }

    let mut page: CatalogPage = match serde_json::from_value(raw) {
        Ok(page) => page,
        Err(e) => {
            tracing::warn!(error = %e, "upstream catalog has unexpected shape");
            return no_cache_json(json!({}));
        }
    };

    if kind == "anime" {
        page.metas = state.metadata.anime().deduplicate_catalog(page.metas);
    }

    let lookups = state
        .metadata
        .catalog_lookups(&page.metas, &settings.language)
        .await;
    localize_catalog(&mut page.metas, &lookups, settings.skip_posters);

    match serde_json::to_value(&page) {
        Ok(value) => no_cache_json(value),
        Err(e) => {
            tracing::error!(error = %e, "failed to serialize catalog");
            no_cache_json(json!({}))
        }
    }
}

/// GET /:addon/:settings/meta/:kind/:id.json
/// The resolution pipeline. Ids outside the compatible prefixes redirect
/// to the unmodified upstream.
async fn wrapped_meta(
    State(state): State<Arc<AppState>>,
    Path((addon, settings, kind, id)): Path<(String, String, String, String)>,
) -> Response {
    let Some(addon_url) = decode_base64_url(&addon) else {
        return StatusCode::BAD_REQUEST.into_response();
    };
    let settings = parse_user_settings(&settings);
    let mut id = id.trim_end_matches(".json").to_string();
    // Some upstreams emit `mal_123` instead of `mal:123`
    if crate::anime::AnimeIndex::is_alias(&id) {
        id = id.replace('_', ":");
    }

    if !COMPATIBLE_PREFIXES.iter().any(|p| id.starts_with(p)) {
        return Redirect::temporary(&format!("{addon_url}/meta/{kind}/{id}.json"))
            .into_response();
    }

    // Anime-typed requests behave as series unless explicitly movies
    let typed_kind = MediaKind::parse(&kind).unwrap_or(MediaKind::Series);

    let mut response = state
        .metadata
        .resolve_meta(typed_kind, &kind, &id, &settings.language)
        .await;
    if let Some(record) = response.meta.as_mut() {
        record.id = id;
    }

    match serde_json::to_value(&response) {
        Ok(value) => no_cache_json(value),
        Err(e) => {
            tracing::error!(error = %e, "failed to serialize meta");
            no_cache_json(json!({}))
        }
    }
}

/// GET /:addon/:settings/stream/*path
async fn stream_redirect(Path((addon, _settings, path)): Path<(String, String, String)>) -> Response {
    match decode_base64_url(&addon) {
        Some(url) => Redirect::temporary(&format!("{url}/stream/{path}")).into_response(),
        None => StatusCode::BAD_REQUEST.into_response(),
    }
}

/// GET /:addon/:settings/subtitles/*path
async fn subtitles_redirect(
    Path((addon, _settings, path)): Path<(String, String, String)>,
) -> Response {
    match decode_base64_url(&addon) {
        Some(url) => Redirect::temporary(&format!("{url}/subtitles/{path}")).into_response(),
        None => StatusCode::BAD_REQUEST.into_response(),
    }
}

#[derive(Debug, Deserialize)]
struct AdminQuery {
    password: String,
}

fn admin_authorized(state: &AppState, query: &AdminQuery) -> bool {
    state
        .config
        .admin_password
        .as_deref()
        .is_some_and(|expected| expected == query.password)
}

/// GET /admin/reload_maps?password=
async fn reload_maps(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AdminQuery>,
) -> Response {
    if !admin_authorized(&state, &query) {
        return (StatusCode::FORBIDDEN, Json(json!({"error": "access denied"}))).into_response();
    }
    match state.metadata.reload_anime_maps().await {
        Ok(aliases) => no_cache_json(json!({"status": "anime maps updated", "aliases": aliases})),
        Err(e) => {
            tracing::error!(error = %e, "anime map reload failed");
            (
                StatusCode::BAD_GATEWAY,
                Json(json!({"error": "reload failed"})),
            )
                .into_response()
        }
    }
}

/// GET /admin/clean_cache?password=
async fn clean_cache(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AdminQuery>,
) -> Response {
    if !admin_authorized(&state, &query) {
        return (StatusCode::FORBIDDEN, Json(json!({"error": "access denied"}))).into_response();
    }
    let reclaimed = state.metadata.expire_caches();
    no_cache_json(json!({"status": "cache cleaned", "reclaimed": reclaimed}))
}

async fn fetch_json(state: &AppState, url: &str) -> Option<Value> {
    let resp = match state.client.get(url).send().await {
        Ok(resp) => resp,
        Err(e) => {
            tracing::warn!(url, error = %e, "upstream fetch failed");
            return None;
        }
    };
    if !resp.status().is_success() {
        tracing::warn!(url, status = %resp.status(), "upstream returned error");
        return None;
    }
    match resp.json().await {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!(url, error = %e, "upstream body is not JSON");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_user_settings() {
        let settings = parse_user_settings("language=es-ES,sp=1");
        assert_eq!(settings.language, "es-ES");
        assert!(settings.skip_posters);
    }

    #[test]
    fn test_parse_user_settings_defaults() {
        assert_eq!(parse_user_settings(""), UserSettings::default());
        assert_eq!(parse_user_settings("garbage"), UserSettings::default());
        // Unknown keys are ignored
        let settings = parse_user_settings("language=it-IT,tr=1");
        assert_eq!(settings.language, "it-IT");
        assert!(!settings.skip_posters);
    }

    #[test]
    fn test_decode_base64_url_with_and_without_padding() {
        let encoded = BASE64.encode("https://v3-cinemeta.strem.io");
        assert_eq!(
            decode_base64_url(&encoded).as_deref(),
            Some("https://v3-cinemeta.strem.io")
        );
        let stripped = encoded.trim_end_matches('=');
        assert_eq!(
            decode_base64_url(stripped).as_deref(),
            Some("https://v3-cinemeta.strem.io")
        );
        assert!(decode_base64_url("!!not-base64!!").is_none());
    }
}
