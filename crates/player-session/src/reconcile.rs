//! Saved manual selections versus the engine's reported tracks.
//!
//! Tracks are matched by `TrackIndices` alone. The triple is assumed stable for the same
//! media across engine restarts; a matched entry whose media kind changed is still applied
//! but logged.

use player_session_types::TrackInfo;

/// Split of saved selections against one tracks-changed report.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Reconciliation {
    /// Fresh engine entries (marked manual) for saved selections present in the report.
    pub settable: Vec<TrackInfo>,
    /// Saved selections the report does not contain yet. These stay pending.
    pub unsettable: Vec<TrackInfo>,
}

impl Reconciliation {
    /// `true` when the pending list differs from `saved_manual`.
    pub fn changes_pending(&self, saved_manual: &[TrackInfo]) -> bool {
        self.unsettable.as_slice() != saved_manual
    }
}

/// Match `saved_manual` against `reported`. Returns `None` for an empty report, which
/// carries no information about availability.
pub fn reconcile(saved_manual: &[TrackInfo], reported: &[TrackInfo]) -> Option<Reconciliation> {
    if reported.is_empty() {
        return None;
    }

    let mut settable: Vec<TrackInfo> = Vec::new();
    let mut unsettable: Vec<TrackInfo> = Vec::new();
    for saved in saved_manual {
        match reported.iter().find(|fresh| fresh.same_slot(saved)) {
            Some(fresh) => {
                if fresh.track_type != saved.track_type {
                    tracing::warn!(
                        indices = ?saved.indices,
                        saved = ?saved.track_type,
                        reported = ?fresh.track_type,
                        "restored track changed kind at the same indices"
                    );
                }
                if !settable.iter().any(|track| track.same_slot(fresh)) {
                    settable.push(fresh.clone().manually_selected());
                }
            }
            None => {
                if !unsettable.iter().any(|track| track.same_slot(saved)) {
                    unsettable.push(saved.clone());
                }
            }
        }
    }

    Some(Reconciliation {
        settable,
        unsettable,
    })
}

/// Union of the engine's manual tracks and still-pending saved ones. Engine entries win on
/// an indices collision.
pub fn merge_manual(engine_tracks: &[TrackInfo], pending: &[TrackInfo]) -> Vec<TrackInfo> {
    let mut merged: Vec<TrackInfo> = engine_tracks
        .iter()
        .filter(|track| track.is_manually_set)
        .cloned()
        .collect();
    for track in pending {
        if !merged.iter().any(|existing| existing.same_slot(track)) {
            merged.push(track.clone());
        }
    }
    merged
}

/// Drop pending selections that target any of `renderers`.
pub fn drop_pending_for_renderers(pending: &[TrackInfo], renderers: &[u32]) -> Vec<TrackInfo> {
    pending
        .iter()
        .filter(|track| !renderers.contains(&track.indices.renderer_index))
        .cloned()
        .collect()
}

/// Renderer indices touched by a set of tracks, without duplicates.
pub fn renderers_of(tracks: &[TrackInfo]) -> Vec<u32> {
    let mut renderers = Vec::new();
    for track in tracks {
        let renderer = track.indices.renderer_index;
        if !renderers.contains(&renderer) {
            renderers.push(renderer);
        }
    }
    renderers
}

#[cfg(test)]
mod tests {
    use super::*;
    use player_session_types::{TrackIndices, TrackType};

    fn track(kind: TrackType, index: u32, renderer: u32) -> TrackInfo {
        TrackInfo::new(kind, TrackIndices::new(index, 0, renderer))
    }

    #[test]
    fn empty_report_is_ignored() {
        let saved = vec![track(TrackType::Audio, 1, 1).manually_selected()];
        assert_eq!(reconcile(&saved, &[]), None);
    }

    #[test]
    fn partial_report_splits_saved_selections() {
        let a = track(TrackType::Audio, 1, 1).manually_selected();
        let b = track(TrackType::Text, 0, 2).manually_selected();
        let reported = vec![
            track(TrackType::Video, 0, 0),
            track(TrackType::Audio, 0, 1),
            track(TrackType::Audio, 1, 1).with_name("Deutsch"),
        ];

        let result = reconcile(&[a.clone(), b.clone()], &reported).expect("non-empty report");
        assert_eq!(
            result.settable,
            vec![
                track(TrackType::Audio, 1, 1)
                    .with_name("Deutsch")
                    .manually_selected()
            ]
        );
        assert_eq!(result.unsettable, vec![b]);
        assert!(result.changes_pending(&[a, track(TrackType::Text, 0, 2).manually_selected()]));
    }

    #[test]
    fn reconciling_again_is_idempotent() {
        let a = track(TrackType::Audio, 1, 1).manually_selected();
        let b = track(TrackType::Text, 0, 2).manually_selected();
        let reported = vec![track(TrackType::Audio, 1, 1)];

        let first = reconcile(&[a, b], &reported).expect("non-empty report");
        let second = reconcile(&first.unsettable, &reported).expect("non-empty report");
        assert!(second.settable.is_empty());
        assert_eq!(second.unsettable, first.unsettable);
        assert!(!second.changes_pending(&first.unsettable));
    }

    #[test]
    fn nothing_saved_means_nothing_to_do() {
        let result = reconcile(&[], &[track(TrackType::Video, 0, 0)]).expect("non-empty report");
        assert_eq!(result, Reconciliation::default());
        assert!(!result.changes_pending(&[]));
    }

    #[test]
    fn duplicate_saved_entries_collapse() {
        let a = track(TrackType::Audio, 1, 1).manually_selected();
        let result = reconcile(&[a.clone(), a], &[track(TrackType::Audio, 1, 1)])
            .expect("non-empty report");
        assert_eq!(result.settable.len(), 1);
    }

    #[test]
    fn kind_mismatch_still_matches_by_indices() {
        let saved = track(TrackType::Text, 1, 1).manually_selected();
        let result =
            reconcile(&[saved], &[track(TrackType::Audio, 1, 1)]).expect("non-empty report");
        assert_eq!(result.settable[0].track_type, TrackType::Audio);
    }

    #[test]
    fn merge_prefers_engine_entries() {
        let engine = vec![
            track(TrackType::Audio, 1, 1).with_name("live").manually_selected(),
            track(TrackType::Video, 0, 0),
        ];
        let pending = vec![
            track(TrackType::Audio, 1, 1).with_name("stale").manually_selected(),
            track(TrackType::Text, 0, 2).manually_selected(),
        ];
        let merged = merge_manual(&engine, &pending);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].name.as_deref(), Some("live"));
        assert_eq!(merged[1].indices.renderer_index, 2);
    }

    #[test]
    fn pending_for_touched_renderers_is_dropped() {
        let pending = vec![
            track(TrackType::Audio, 1, 1).manually_selected(),
            track(TrackType::Text, 0, 2).manually_selected(),
        ];
        let renderers = renderers_of(&[track(TrackType::Text, 3, 2), track(TrackType::Text, 4, 2)]);
        assert_eq!(renderers, vec![2]);
        let kept = drop_pending_for_renderers(&pending, &renderers);
        assert_eq!(kept, vec![pending[0].clone()]);
    }
}
