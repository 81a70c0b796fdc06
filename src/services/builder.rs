// Builds the canonical MetaRecord from typed TMDB details plus Fanart
// artwork. Pure functions over already-fetched payloads: no suspension
// points in here, the orchestrator does all the fetching.

use crate::models::{BehaviorHints, Episode, MediaKind, MetaLink, MetaRecord, Trailer};
use crate::services::fanart::ImageAssets;
use crate::services::tmdb::{
    short_language, Credits, Images, MovieDetails, SeasonDetails, TvDetails, TMDB_BACK_URL,
    TMDB_POSTER_URL,
};
use crate::services::tvdb::{SeriesExtended, TVDB_IMAGE_BASE};

/// Top-billed cast entries considered for the cast list.
const MAX_CAST: usize = 3;

pub fn build_movie_meta(
    id: &str,
    details: &MovieDetails,
    art: &ImageAssets,
    language: &str,
) -> MetaRecord {
    let title = details.title.clone().unwrap_or_default();
    let imdb_id = details.imdb_id.clone().unwrap_or_default();
    let slug = slugify(MediaKind::Movie, &title, &imdb_id);
    let (directors, writers) = extract_crew(details.credits.as_ref());
    let cast = extract_cast(details.credits.as_ref());
    let genres = extract_genres(details);
    let year = movie_year(details.release_date.as_deref());
    let rating = format_rating(details.vote_average);
    let links = build_links(&imdb_id, &title, &slug, &rating, &cast, &writers, &directors, &genres);

    MetaRecord {
        id: id.to_string(),
        kind: MediaKind::Movie,
        name: title,
        description: details.overview.clone().unwrap_or_default(),
        imdb_id,
        cast,
        director: directors,
        writer: writers,
        genres,
        imdb_rating: rating,
        country: details.origin_country.first().cloned().unwrap_or_default(),
        released: details
            .release_date
            .as_deref()
            .filter(|d| !d.is_empty())
            .map(release_timestamp),
        slug,
        release_info: year.clone(),
        year,
        runtime: details
            .runtime
            .map(|m| format!("{m} min"))
            .unwrap_or_default(),
        poster: image_url(TMDB_POSTER_URL, details.poster_path.as_deref()),
        background: image_url(TMDB_BACK_URL, details.backdrop_path.as_deref()),
        logo: extract_logo(details.images.as_ref(), art, MediaKind::Movie, language),
        trailer_streams: extract_trailers(details.videos.as_ref().map(|v| v.results.as_slice())),
        links,
        anime_type: None,
        behavior_hints: Some(BehaviorHints {
            default_video_id: Some(id.to_string()),
            has_scheduled_videos: false,
        }),
        videos: Vec::new(),
    }
}

/// Series record without its episode sequence; the orchestrator fans out
/// to season details and attaches episodes afterwards.
pub fn build_series_meta(
    id: &str,
    details: &TvDetails,
    art: &ImageAssets,
    language: &str,
) -> MetaRecord {
    let title = details.name.clone().unwrap_or_default();
    let imdb_id = details
        .external_ids
        .as_ref()
        .and_then(|e| e.imdb_id.clone())
        .unwrap_or_default();
    let slug = slugify(MediaKind::Series, &title, &imdb_id);
    let (directors, writers) = extract_crew(details.credits.as_ref());
    let cast = extract_cast(details.credits.as_ref());
    let genres: Vec<String> = details.genres.iter().map(|g| g.name.clone()).collect();
    let year = series_year(
        details.first_air_date.as_deref(),
        details.last_air_date.as_deref(),
        details.status.as_deref(),
    );
    let rating = format_rating(details.vote_average);
    let links = build_links(&imdb_id, &title, &slug, &rating, &cast, &writers, &directors, &genres);

    MetaRecord {
        id: id.to_string(),
        kind: MediaKind::Series,
        name: title,
        description: details.overview.clone().unwrap_or_default(),
        imdb_id,
        cast,
        director: directors,
        writer: writers,
        genres,
        imdb_rating: rating,
        country: details.origin_country.first().cloned().unwrap_or_default(),
        released: details
            .first_air_date
            .as_deref()
            .filter(|d| !d.is_empty())
            .map(release_timestamp),
        slug,
        release_info: year.clone(),
        year,
        runtime: series_runtime(details),
        poster: image_url(TMDB_POSTER_URL, details.poster_path.as_deref()),
        background: image_url(TMDB_BACK_URL, details.backdrop_path.as_deref()),
        logo: extract_logo(details.images.as_ref(), art, MediaKind::Series, language),
        trailer_streams: extract_trailers(details.videos.as_ref().map(|v| v.results.as_slice())),
        links,
        anime_type: None,
        behavior_hints: Some(BehaviorHints {
            default_video_id: None,
            has_scheduled_videos: true,
        }),
        videos: Vec::new(),
    }
}

/// Episode sequence from TMDB season payloads. Numbering is positional
/// within each season; ordering is (season, episode) ascending.
pub fn episodes_from_seasons(series_id: &str, seasons: &[SeasonDetails]) -> Vec<Episode> {
    let mut videos = Vec::new();
    for season in seasons {
        for (idx, ep) in season.episodes.iter().enumerate() {
            let number = idx as i32 + 1;
            let aired = ep
                .air_date
                .as_deref()
                .filter(|d| !d.is_empty())
                .map(air_timestamp);
            videos.push(Episode {
                id: Episode::composite_id(series_id, ep.season_number, number),
                name: ep.name.clone().unwrap_or_default(),
                season: ep.season_number,
                episode: number,
                number,
                overview: ep.overview.clone().unwrap_or_default(),
                description: ep.overview.clone().unwrap_or_default(),
                thumbnail: ep
                    .still_path
                    .as_deref()
                    .map(|p| format!("{TMDB_BACK_URL}{p}")),
                first_aired: aired.clone(),
                released: aired,
                rating: ep
                    .vote_average
                    .map(|v| format!("{v}"))
                    .unwrap_or_default(),
                tvdb_id: None,
            });
        }
    }
    videos.sort_by_key(Episode::identity);
    videos
}

/// Episode sequence from the TVDB record, used when the TMDB and TVDB
/// season accounting for an anime disagree.
pub fn episodes_from_tvdb(series_id: &str, series: &SeriesExtended) -> Vec<Episode> {
    let mut videos: Vec<Episode> = series
        .episodes
        .iter()
        .map(|ep| {
            let aired = ep
                .aired
                .as_deref()
                .filter(|d| !d.is_empty())
                .map(air_timestamp);
            Episode {
                id: Episode::composite_id(series_id, ep.season_number, ep.number),
                name: ep.name.clone().unwrap_or_default(),
                season: ep.season_number,
                episode: ep.number,
                number: ep.number,
                overview: ep.overview.clone().unwrap_or_default(),
                description: ep.overview.clone().unwrap_or_default(),
                // TVDB v4 mixes absolute artwork URLs and bare paths
                thumbnail: ep.image.as_deref().map(|p| {
                    if p.starts_with("http") {
                        p.to_string()
                    } else {
                        format!("{TVDB_IMAGE_BASE}{p}")
                    }
                }),
                first_aired: aired.clone(),
                released: aired,
                rating: "0".to_string(),
                tvdb_id: Some(ep.id),
            }
        })
        .collect();
    videos.sort_by_key(Episode::identity);
    videos
}

/// Logo preference order: the primary provider's first logo asset, then
/// the secondary's HD list (exact target-language match, else English),
/// then the SD list under the same language preference.
pub fn extract_logo(
    images: Option<&Images>,
    art: &ImageAssets,
    kind: MediaKind,
    language: &str,
) -> String {
    if let Some(logo) = images.and_then(|i| i.logos.first()) {
        return format!("{TMDB_POSTER_URL}{}", logo.file_path);
    }

    let target = short_language(language);
    for list in [art.hd_logos(kind), art.sd_logos(kind)] {
        if let Some(hit) = list.iter().find(|l| l.lang == target) {
            return hit.url.clone();
        }
        if let Some(en) = list.iter().find(|l| l.lang == "en") {
            return en.url.clone();
        }
    }
    String::new()
}

/// At most three top-billed people whose primary known department is
/// acting.
pub fn extract_cast(credits: Option<&Credits>) -> Vec<String> {
    let Some(credits) = credits else {
        return Vec::new();
    };
    credits
        .cast
        .iter()
        .take(MAX_CAST)
        .filter(|p| p.known_for_department.as_deref() == Some("Acting"))
        .map(|p| p.name.clone())
        .collect()
}

/// Directors and writers. A person directs only when their department is
/// `Directing` and their job is exactly `Director`; a person writes when
/// their department is `Writing`. Both lists dedupe by name, first wins.
pub fn extract_crew(credits: Option<&Credits>) -> (Vec<String>, Vec<String>) {
    let mut directors: Vec<String> = Vec::new();
    let mut writers: Vec<String> = Vec::new();
    let Some(credits) = credits else {
        return (directors, writers);
    };

    for person in &credits.crew {
        match person.department.as_deref() {
            Some("Writing") => {
                if !writers.contains(&person.name) {
                    writers.push(person.name.clone());
                }
            }
            Some("Directing") if person.job.as_deref() == Some("Director") => {
                if !directors.contains(&person.name) {
                    directors.push(person.name.clone());
                }
            }
            _ => {}
        }
    }

    (directors, writers)
}

fn extract_genres(details: &MovieDetails) -> Vec<String> {
    details.genres.iter().map(|g| g.name.clone()).collect()
}

/// Four-digit year prefix of the release date; empty on missing or
/// malformed input rather than an error.
pub fn movie_year(release_date: Option<&str>) -> String {
    parse_year(release_date).map(|y| y.to_string()).unwrap_or_default()
}

/// `first` while the show is running, `first-last` once it has ended.
pub fn series_year(
    first_air: Option<&str>,
    last_air: Option<&str>,
    status: Option<&str>,
) -> String {
    let Some(first) = parse_year(first_air) else {
        return String::new();
    };
    if status == Some("Ended") {
        if let Some(last) = parse_year(last_air) {
            return format!("{first}-{last}");
        }
    }
    first
}

fn parse_year(date: Option<&str>) -> Option<String> {
    let year = date?.split('-').next()?;
    if year.len() == 4 && year.chars().all(|c| c.is_ascii_digit()) {
        Some(year.to_string())
    } else {
        None
    }
}

/// YouTube-hosted trailers only.
pub fn extract_trailers(videos: Option<&[crate::services::tmdb::TmdbVideo]>) -> Vec<Trailer> {
    videos
        .unwrap_or_default()
        .iter()
        .filter(|v| v.video_type == "Trailer" && v.site == "YouTube")
        .map(|v| Trailer {
            title: v.name.clone(),
            yt_id: v.key.clone(),
        })
        .collect()
}

/// Movie runtime comes straight off the record; a series falls back from
/// `episode_run_time` to the last aired episode's runtime, and defaults
/// to empty when neither is present.
fn series_runtime(details: &TvDetails) -> String {
    let minutes = details
        .episode_run_time
        .first()
        .copied()
        .or_else(|| details.last_episode_to_air.as_ref().and_then(|e| e.runtime));
    minutes.map(|m| format!("{m} min")).unwrap_or_default()
}

fn format_rating(vote_average: Option<f64>) -> String {
    match vote_average {
        Some(v) if v > 0.0 => format!("{v:.1}"),
        _ => String::new(),
    }
}

fn release_timestamp(date: &str) -> String {
    format!("{date}T00:00:00.000Z")
}

fn air_timestamp(date: &str) -> String {
    format!("{date}T05:00:00.000Z")
}

fn image_url(base: &str, path: Option<&str>) -> String {
    path.map(|p| format!("{base}{p}")).unwrap_or_default()
}

fn slugify(kind: MediaKind, title: &str, imdb_id: &str) -> String {
    format!(
        "{}/{}-{}",
        kind.as_str(),
        title.to_lowercase().replace(' ', "-"),
        imdb_id.trim_start_matches("tt")
    )
}

#[allow(clippy::too_many_arguments)]
fn build_links(
    imdb_id: &str,
    title: &str,
    slug: &str,
    rating: &str,
    cast: &[String],
    writers: &[String],
    directors: &[String],
    genres: &[String],
) -> Vec<MetaLink> {
    let mut links = vec![
        MetaLink {
            name: rating.to_string(),
            category: "imdb".to_string(),
            url: format!("https://imdb.com/title/{imdb_id}"),
        },
        MetaLink {
            name: title.to_string(),
            category: "share".to_string(),
            url: format!("https://www.strem.io/s/movie/{slug}"),
        },
    ];

    for genre in genres {
        links.push(MetaLink {
            name: genre.clone(),
            category: "Genres".to_string(),
            url: format!(
                "stremio:///discover/https%3A%2F%2FPLACEHOLDER%2Fmanifest.json/movie/top?genre={}",
                urlencoding::encode(genre)
            ),
        });
    }
    for (people, category) in [
        (cast, "Cast"),
        (writers, "Writers"),
        (directors, "Directors"),
    ] {
        for name in people {
            links.push(MetaLink {
                name: name.clone(),
                category: category.to_string(),
                url: format!("stremio:///search?search={}", urlencoding::encode(name)),
            });
        }
    }

    links
}
