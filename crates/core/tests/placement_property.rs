use cutdraft_core::document::{Document, VersionTag};
use cutdraft_core::material::{FadeMaterial, Material, MaterialPayload};
use cutdraft_core::segment::{Segment, SegmentCompat};
use cutdraft_core::time::{TimeRange, SEC};
use cutdraft_core::track::{Placement, Track, TrackKind};
use cutdraft_core::DraftError;
use proptest::prelude::*;

const CEILING: u64 = 60 * SEC;

fn placement() -> impl Strategy<Value = Placement> {
    let duration = 1u64..10 * SEC;
    prop_oneof![
        (0u64..50 * SEC, duration.clone()).prop_map(|(start, d)| Placement::At(TimeRange::new(start, d))),
        (0u64..50 * SEC, duration).prop_map(|(earliest, d)| Placement::After { earliest, duration: d }),
    ]
}

fn segment() -> Segment {
    Segment::new("material", SegmentCompat::current(0))
}

fn assert_disjoint(track: &Track) {
    for (i, a) in track.segments.iter().enumerate() {
        for b in &track.segments[i + 1..] {
            assert!(
                !a.target_range.overlaps(&b.target_range),
                "{} overlaps {}",
                a.target_range,
                b.target_range
            );
        }
    }
}

/// The lowest start at or after `earliest` where `duration` fits between
/// the `occupied` ranges. Only `earliest` and segment ends can be the
/// first free start, so those are the only candidates tried.
fn earliest_gap(occupied: &[TimeRange], earliest: u64, duration: u64) -> u64 {
    std::iter::once(earliest)
        .chain(occupied.iter().map(TimeRange::end).filter(|end| *end >= earliest))
        .filter(|start| {
            let candidate = TimeRange::new(*start, duration);
            occupied.iter().all(|range| !candidate.overlaps(range))
        })
        .min()
        .unwrap_or(u64::MAX)
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 256,
        .. ProptestConfig::default()
    })]

    #[test]
    fn placed_segments_never_overlap(placements in prop::collection::vec(placement(), 1..40)) {
        let mut track = Track::new(TrackKind::Video, "video", 0);
        for placement in placements {
            let occupied: Vec<TimeRange> = track.segments.iter().map(|s| s.target_range).collect();
            let expected = match placement {
                Placement::After { earliest, duration } => Some(earliest_gap(&occupied, earliest, duration)),
                Placement::At(_) => None,
            };
            match track.place(segment(), placement, CEILING) {
                Ok(placed) => {
                    if let Placement::After { duration, .. } = placement {
                        prop_assert_eq!(Some(placed.target_range.start), expected);
                        prop_assert_eq!(placed.target_range.duration, duration);
                    }
                }
                Err(DraftError::OverlappingSegment { requested, existing }) => {
                    prop_assert!(requested.overlaps(&existing));
                }
                Err(DraftError::PlacementExhausted { duration, .. }) => {
                    // Only when the earliest free slot would cross the ceiling.
                    let start = expected.unwrap_or(u64::MAX);
                    prop_assert!(start.saturating_add(duration) > CEILING);
                }
                Err(other) => prop_assert!(false, "unexpected error {other:?}"),
            }
            assert_disjoint(&track);
        }
        let starts: Vec<u64> = track.segments.iter().map(|s| s.target_range.start).collect();
        let mut sorted = starts.clone();
        sorted.sort_unstable();
        prop_assert_eq!(starts, sorted);
    }

    #[test]
    fn duration_is_the_latest_segment_end(
        placements in prop::collection::vec((0usize..3, placement()), 0..30),
    ) {
        let mut document = Document::new(Default::default(), 30.0, VersionTag::Current);
        let material = document
            .materials
            .insert(Material::new(MaterialPayload::Fade(FadeMaterial {
                fade_in_duration: 0,
                fade_out_duration: 0,
            })))
            .unwrap();
        let tracks = [(TrackKind::Video, "video"), (TrackKind::Audio, "audio"), (TrackKind::Text, "text")];
        for (kind, name) in tracks {
            document.ensure_track(kind, name, None);
        }

        for (track, placement) in placements {
            let (kind, name) = tracks[track];
            let segment = Segment::new(material.clone(), document.compat_for(kind, 0));
            let _ = document.add_segment(kind, name, segment, placement, CEILING);
        }

        let latest = document
            .tracks
            .iter()
            .flat_map(|track| track.segments.iter())
            .map(|segment| segment.target_range.end())
            .max()
            .unwrap_or(0);
        prop_assert_eq!(document.duration(), latest);
    }
}

#[test]
fn empty_document_has_zero_duration() {
    let document = Document::default();
    assert_eq!(document.duration(), 0);
    assert_eq!(document.segment_count(), 0);
}

#[test]
fn auto_placement_skips_past_adjacent_segments() {
    let mut track = Track::new(TrackKind::Video, "video", 0);
    track.place(segment(), Placement::At(TimeRange::new(0, 5 * SEC)), CEILING).unwrap();
    track.place(segment(), Placement::At(TimeRange::new(5 * SEC, 3 * SEC)), CEILING).unwrap();
    let placed = track
        .place(segment(), Placement::After { earliest: 0, duration: 3 * SEC }, CEILING)
        .unwrap();
    assert_eq!(placed.target_range, TimeRange::new(8 * SEC, 3 * SEC));
}

#[test]
fn auto_placement_takes_the_first_gap_that_fits() {
    let mut track = Track::new(TrackKind::Video, "video", 0);
    for (start, duration) in [(0, 2), (3, 2), (9, 1)] {
        track
            .place(segment(), Placement::At(TimeRange::new(start * SEC, duration * SEC)), CEILING)
            .unwrap();
    }
    // [2s, 3s) is too short for 2s; [5s, 9s) is the first gap that fits.
    let placed = track
        .place(segment(), Placement::After { earliest: SEC, duration: 2 * SEC }, CEILING)
        .unwrap();
    assert_eq!(placed.target_range, TimeRange::new(5 * SEC, 2 * SEC));
    let placed = track
        .place(segment(), Placement::After { earliest: 0, duration: SEC }, CEILING)
        .unwrap();
    assert_eq!(placed.target_range, TimeRange::new(2 * SEC, SEC));
}
