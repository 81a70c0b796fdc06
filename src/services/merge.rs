// Two-source merge: the primary (TMDB-derived) record wins wherever it
// has content, the secondary (Cinemeta) record fills the holes. Identity
// fields never move.

use std::collections::BTreeMap;

use crate::models::{Episode, MetaRecord};

/// Result of merging two records. `secondary_only_episodes` counts the
/// episodes that came exclusively from the secondary source; those still
/// carry untranslated text and need a translation pass.
pub struct MergeOutcome {
    pub record: MetaRecord,
    pub secondary_only_episodes: usize,
}

/// Merge `secondary` into `primary`.
///
/// Scalars and lists: primary wins when non-empty, secondary fills
/// otherwise. Episodes: union keyed on (season, episode), primary wins on
/// collision, output ascending by that key.
pub fn merge(primary: MetaRecord, secondary: MetaRecord) -> MergeOutcome {
    let mut out = primary;

    fill_string(&mut out.name, secondary.name);
    fill_string(&mut out.description, secondary.description);
    fill_string(&mut out.imdb_id, secondary.imdb_id);
    fill_string(&mut out.imdb_rating, secondary.imdb_rating);
    fill_string(&mut out.country, secondary.country);
    fill_string(&mut out.slug, secondary.slug);
    fill_string(&mut out.year, secondary.year);
    fill_string(&mut out.release_info, secondary.release_info);
    fill_string(&mut out.runtime, secondary.runtime);
    fill_string(&mut out.poster, secondary.poster);
    fill_string(&mut out.background, secondary.background);
    fill_string(&mut out.logo, secondary.logo);

    fill_vec(&mut out.cast, secondary.cast);
    fill_vec(&mut out.director, secondary.director);
    fill_vec(&mut out.writer, secondary.writer);
    fill_vec(&mut out.genres, secondary.genres);
    fill_vec(&mut out.trailer_streams, secondary.trailer_streams);
    fill_vec(&mut out.links, secondary.links);

    if out.released.is_none() {
        out.released = secondary.released;
    }
    if out.behavior_hints.is_none() {
        out.behavior_hints = secondary.behavior_hints;
    }

    let primary_keys: std::collections::BTreeSet<(i32, i32)> =
        out.videos.iter().map(Episode::identity).collect();

    let mut by_identity: BTreeMap<(i32, i32), Episode> = BTreeMap::new();
    let mut secondary_only = 0usize;
    for ep in secondary.videos {
        let identity = ep.identity();
        // Count fresh identities once even if the secondary list repeats one
        if by_identity.insert(identity, ep).is_none() && !primary_keys.contains(&identity) {
            secondary_only += 1;
        }
    }
    // Primary overwrites on shared identities
    for ep in std::mem::take(&mut out.videos) {
        by_identity.insert(ep.identity(), ep);
    }
    out.videos = by_identity.into_values().collect();

    MergeOutcome {
        record: out,
        secondary_only_episodes: secondary_only,
    }
}

fn fill_string(target: &mut String, fallback: String) {
    if target.is_empty() {
        *target = fallback;
    }
}

fn fill_vec<T>(target: &mut Vec<T>, fallback: Vec<T>) {
    if target.is_empty() {
        *target = fallback;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MediaKind;

    fn episode(season: i32, number: i32, name: &str) -> Episode {
        Episode {
            id: Episode::composite_id("tt1", season, number),
            name: name.to_string(),
            season,
            episode: number,
            number,
            ..Default::default()
        }
    }

    #[test]
    fn test_primary_scalar_wins() {
        let primary = MetaRecord {
            id: "tt1".into(),
            kind: MediaKind::Movie,
            name: "Localized".into(),
            description: "Descrizione".into(),
            ..Default::default()
        };
        let secondary = MetaRecord {
            id: "tt1".into(),
            kind: MediaKind::Movie,
            name: "English".into(),
            description: "Description".into(),
            runtime: "120 min".into(),
            ..Default::default()
        };
        let out = merge(primary, secondary).record;
        assert_eq!(out.name, "Localized");
        assert_eq!(out.description, "Descrizione");
        // Hole filled from secondary
        assert_eq!(out.runtime, "120 min");
    }

    #[test]
    fn test_identity_fields_never_move() {
        let primary = MetaRecord {
            id: "tt1".into(),
            kind: MediaKind::Series,
            ..Default::default()
        };
        let secondary = MetaRecord {
            id: "tt2".into(),
            kind: MediaKind::Movie,
            ..Default::default()
        };
        let out = merge(primary, secondary).record;
        assert_eq!(out.id, "tt1");
        assert_eq!(out.kind, MediaKind::Series);
    }

    #[test]
    fn test_list_fill_is_all_or_nothing() {
        let primary = MetaRecord {
            genres: vec!["Drama".into()],
            ..Default::default()
        };
        let secondary = MetaRecord {
            genres: vec!["Crime".into(), "Thriller".into()],
            cast: vec!["Bryan Cranston".into()],
            ..Default::default()
        };
        let out = merge(primary, secondary).record;
        // No element-wise mixing
        assert_eq!(out.genres, vec!["Drama"]);
        assert_eq!(out.cast, vec!["Bryan Cranston"]);
    }

    #[test]
    fn test_episode_union_primary_wins() {
        let primary = MetaRecord {
            videos: vec![episode(1, 1, "Pilota"), episode(1, 2, "Il gatto")],
            ..Default::default()
        };
        let secondary = MetaRecord {
            videos: vec![episode(1, 2, "Cat's in the Bag"), episode(1, 3, "Bag's in the River")],
            ..Default::default()
        };
        let out = merge(primary, secondary);
        let names: Vec<_> = out.record.videos.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["Pilota", "Il gatto", "Bag's in the River"]);
        assert_eq!(out.secondary_only_episodes, 1);
    }

    #[test]
    fn test_merged_identity_set_is_union_and_sorted() {
        let primary = MetaRecord {
            videos: vec![episode(2, 1, "a"), episode(1, 1, "b")],
            ..Default::default()
        };
        let secondary = MetaRecord {
            videos: vec![episode(1, 2, "c"), episode(3, 1, "d")],
            ..Default::default()
        };
        let out = merge(primary, secondary).record;
        let identities: Vec<_> = out.videos.iter().map(Episode::identity).collect();
        assert_eq!(identities, vec![(1, 1), (1, 2), (2, 1), (3, 1)]);
    }

    #[test]
    fn test_repeated_secondary_identity_counts_once() {
        let primary = MetaRecord {
            videos: vec![episode(1, 1, "Pilota")],
            ..Default::default()
        };
        // Upstream catalogs occasionally repeat an episode entry
        let secondary = MetaRecord {
            videos: vec![episode(1, 2, "first copy"), episode(1, 2, "second copy")],
            ..Default::default()
        };
        let out = merge(primary, secondary);
        assert_eq!(out.secondary_only_episodes, 1);
        assert_eq!(out.record.videos.len(), 2);
        assert_eq!(out.record.videos[1].name, "second copy");
    }

    #[test]
    fn test_empty_secondary_is_identity() {
        let primary = MetaRecord {
            id: "tt1".into(),
            name: "Show".into(),
            videos: vec![episode(1, 1, "Pilot")],
            ..Default::default()
        };
        let out = merge(primary.clone(), MetaRecord::default());
        assert_eq!(out.record.name, primary.name);
        assert_eq!(out.record.videos, primary.videos);
        assert_eq!(out.secondary_only_episodes, 0);
    }
}
