//! Track queue resolution.

use std::collections::HashSet;

use tracing::{debug, warn};

use crate::catalog::Catalog;
use crate::error::{Result, SessionError};
use crate::model::{SearchHit, Track};

/// How many search hits are considered when resolving a query.
pub const SEARCH_LIMIT: usize = 10;

/// Resolves a free-text query into a playback queue.
///
/// Track hits are taken as-is; album hits are expanded into their tracks.
/// The result is deduplicated by normalized title, keeping the first
/// occurrence, so a single that also appears on a matched album is not
/// queued twice. An album lookup failure drops that album with a warning
/// rather than failing the whole queue.
pub async fn resolve_queue(catalog: &dyn Catalog, query: &str) -> Result<Vec<Track>> {
    let hits = catalog
        .search(query, SEARCH_LIMIT)
        .await
        .map_err(|e| SessionError::Catalog(e.to_string()))?;

    let mut seen = HashSet::new();
    let mut queue = Vec::new();

    let mut push = |track: Track, seen: &mut HashSet<String>, queue: &mut Vec<Track>| {
        let key = normalize_title(&track.title);
        if seen.insert(key) {
            queue.push(track);
        } else {
            debug!("Dropping duplicate track '{}'", track.title);
        }
    };

    for hit in hits {
        match hit {
            SearchHit::Track(track) => push(track, &mut seen, &mut queue),
            SearchHit::Album { id, title } => match catalog.album_tracks(&id).await {
                Ok(tracks) => {
                    for track in tracks {
                        push(track, &mut seen, &mut queue);
                    }
                }
                Err(e) => warn!("Skipping album '{}': {}", title, e),
            },
        }
    }

    if queue.is_empty() {
        return Err(SessionError::EmptyQueue);
    }
    Ok(queue)
}

/// Case-folded, whitespace-collapsed title used as the dedup key.
fn normalize_title(title: &str) -> String {
    title
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    use anyhow::{Result, anyhow};
    use async_trait::async_trait;

    fn track(id: &str, title: &str) -> Track {
        Track {
            id: id.to_string(),
            title: title.to_string(),
            artist: None,
            album: None,
            artwork_url: None,
        }
    }

    struct FakeCatalog {
        hits: Vec<SearchHit>,
        album: Vec<Track>,
    }

    #[async_trait]
    impl Catalog for FakeCatalog {
        async fn search(&self, _query: &str, _limit: usize) -> Result<Vec<SearchHit>> {
            Ok(self.hits.clone())
        }

        async fn album_tracks(&self, album_id: &str) -> Result<Vec<Track>> {
            if album_id == "missing" {
                return Err(anyhow!("album not found"));
            }
            Ok(self.album.clone())
        }

        async fn stream_url(&self, _track_id: &str) -> Result<String> {
            unreachable!("not used in queue resolution")
        }
    }

    #[test]
    fn normalize_folds_case_and_whitespace() {
        assert_eq!(normalize_title("  Song   A "), "song a");
        assert_eq!(normalize_title("SONG A"), "song a");
    }

    #[tokio::test]
    async fn albums_expand_and_duplicates_are_dropped() {
        let catalog = FakeCatalog {
            hits: vec![
                SearchHit::Track(track("t1", "Song A")),
                SearchHit::Album {
                    id: "al1".to_string(),
                    title: "The Album".to_string(),
                },
            ],
            album: vec![track("t2", "song  a"), track("t3", "Song B")],
        };

        let queue = resolve_queue(&catalog, "song").await.unwrap();

        let titles: Vec<&str> = queue.iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, vec!["Song A", "Song B"]);
        // The single wins over the album copy.
        assert_eq!(queue[0].id, "t1");
    }

    #[tokio::test]
    async fn a_failed_album_lookup_does_not_fail_the_queue() {
        let catalog = FakeCatalog {
            hits: vec![
                SearchHit::Album {
                    id: "missing".to_string(),
                    title: "Gone".to_string(),
                },
                SearchHit::Track(track("t1", "Song A")),
            ],
            album: vec![],
        };

        let queue = resolve_queue(&catalog, "song").await.unwrap();
        assert_eq!(queue.len(), 1);
    }

    #[tokio::test]
    async fn an_empty_resolution_is_an_error() {
        let catalog = FakeCatalog {
            hits: vec![],
            album: vec![],
        };

        let err = resolve_queue(&catalog, "nothing").await.unwrap_err();
        assert!(matches!(err, SessionError::EmptyQueue));
    }
}
