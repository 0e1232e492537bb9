// Release selection against a quality profile.
//
// A candidate is acceptable iff its quality is in the profile and its size
// falls inside that quality's band. Among acceptable candidates the highest
// ranked quality wins; ties break toward the size closest to the band's
// preferred size. Profile items are ordered lowest rank first, so rank is
// the item index.

use crate::db::quality::QualityProfile;
use crate::remote::Release;

const BYTES_PER_MEGABYTE: f64 = 1024.0 * 1024.0;

/// Position of a quality name in the profile's ordering, if present.
fn rank(profile: &QualityProfile, quality: &str) -> Option<usize> {
    profile.items.iter().position(|d| d.name == quality)
}

/// True when the entity's existing file already satisfies the profile's
/// cutoff, which with upgrades disabled means no further searching.
pub fn cutoff_satisfied(profile: &QualityProfile, current_quality: &str) -> bool {
    let cutoff = match profile.cutoff_quality_id {
        Some(id) => id,
        None => return false,
    };
    let cutoff_rank = match profile.items.iter().position(|d| d.id == cutoff) {
        Some(r) => r,
        None => return false,
    };
    match rank(profile, current_quality) {
        Some(current_rank) => current_rank >= cutoff_rank,
        None => false,
    }
}

/// Whether reconciliation should search for this entity at all, given the
/// quality of the file it already has (if any).
pub fn should_search(profile: &QualityProfile, current_quality: Option<&str>) -> bool {
    match current_quality {
        Some(quality) if !profile.upgrade_allowed => !cutoff_satisfied(profile, quality),
        _ => true,
    }
}

/// Pick the best acceptable release, or None when nothing qualifies.
pub fn select_release<'a>(
    profile: &QualityProfile,
    candidates: &'a [Release],
) -> Option<&'a Release> {
    let mut best: Option<(&Release, usize, f64)> = None;
    for candidate in candidates {
        let quality_rank = match rank(profile, &candidate.quality) {
            Some(r) => r,
            None => continue,
        };
        let definition = &profile.items[quality_rank];
        let size_mb = candidate.size as f64 / BYTES_PER_MEGABYTE;
        if size_mb < definition.min_size || size_mb > definition.max_size {
            continue;
        }
        let distance = (size_mb - definition.preferred_size).abs();
        let better = match best {
            None => true,
            Some((_, best_rank, best_distance)) => {
                quality_rank > best_rank
                    || (quality_rank == best_rank && distance < best_distance)
            }
        };
        if better {
            best = Some((candidate, quality_rank, distance));
        }
    }
    best.map(|(release, _, _)| release)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::quality::QualityDefinition;

    fn definition(id: i64, name: &str, preferred: f64, min: f64, max: f64) -> QualityDefinition {
        QualityDefinition {
            id,
            name: name.to_string(),
            media_type: "movie".to_string(),
            preferred_size: preferred,
            min_size: min,
            max_size: max,
        }
    }

    fn profile(cutoff: Option<i64>, upgrade_allowed: bool) -> QualityProfile {
        QualityProfile {
            id: 1,
            name: "HD".to_string(),
            cutoff_quality_id: cutoff,
            upgrade_allowed,
            items: vec![
                definition(1, "HDTV-720p", 1500.0, 300.0, 3000.0),
                definition(2, "WEBDL-1080p", 3000.0, 500.0, 6000.0),
                definition(3, "Bluray-1080p", 6000.0, 1500.0, 12000.0),
            ],
        }
    }

    fn release(quality: &str, size_mb: i64) -> Release {
        Release {
            indexer_id: 1,
            title: format!("{} {}", quality, size_mb),
            size: size_mb * 1024 * 1024,
            quality: quality.to_string(),
            download_uri: "magnet:?test".to_string(),
            protocol: "torrent".to_string(),
        }
    }

    #[test]
    fn rejects_unknown_quality_and_out_of_band_sizes() {
        let p = profile(None, true);
        let candidates = vec![
            release("CAM", 700),             // not in profile
            release("HDTV-720p", 100),       // below min
            release("WEBDL-1080p", 9000),    // above max
        ];
        assert!(select_release(&p, &candidates).is_none());
    }

    #[test]
    fn highest_ranked_quality_wins() {
        let p = profile(None, true);
        let candidates = vec![
            release("HDTV-720p", 1500),
            release("Bluray-1080p", 6000),
            release("WEBDL-1080p", 3000),
        ];
        let pick = select_release(&p, &candidates).unwrap();
        assert_eq!(pick.quality, "Bluray-1080p");
    }

    #[test]
    fn ties_break_toward_preferred_size() {
        let p = profile(None, true);
        let candidates = vec![
            release("WEBDL-1080p", 5500),
            release("WEBDL-1080p", 2900), // closer to preferred 3000
            release("WEBDL-1080p", 700),
        ];
        let pick = select_release(&p, &candidates).unwrap();
        assert_eq!(pick.size, 2900 * 1024 * 1024);
    }

    #[test]
    fn cutoff_blocks_search_when_upgrades_disabled() {
        // cutoff at WEBDL-1080p (id 2)
        let p = profile(Some(2), false);
        assert!(!should_search(&p, Some("WEBDL-1080p")));
        assert!(!should_search(&p, Some("Bluray-1080p")));
        assert!(should_search(&p, Some("HDTV-720p")));
        assert!(should_search(&p, None));
    }

    #[test]
    fn upgrades_enabled_keeps_searching_past_cutoff() {
        let p = profile(Some(2), true);
        assert!(should_search(&p, Some("Bluray-1080p")));
    }

    #[test]
    fn no_cutoff_never_blocks() {
        let p = profile(None, false);
        assert!(should_search(&p, Some("Bluray-1080p")));
    }
}
