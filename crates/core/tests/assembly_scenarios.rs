use cutdraft_core::assembler::{DraftAssembler, ItemStatus, AUDIO_TRACK, EFFECT_TRACK, VIDEO_TRACK};
use cutdraft_core::catalog::{AssetCatalog, AssetCategory};
use cutdraft_core::material::{MaterialKind, MaterialPayload};
use cutdraft_core::reconcile::{dangling_refs, LegacyProfile, SchemaReconciler};
use cutdraft_core::request::{
    AudioItem, DraftRequest, EffectItem, TextItem, VideoEffectItem, VideoItem, DEFAULT_TEXT_TRACK,
};
use cutdraft_core::source::PassThrough;
use cutdraft_core::time::{TimeRange, SEC};
use cutdraft_core::track::TrackKind;
use cutdraft_core::DraftError;

const EMPTY_TEMPLATE: &[u8] = br#"{"materials": {}, "tracks": []}"#;

fn assembler() -> DraftAssembler {
    DraftAssembler::new(AssetCatalog::builtin()).with_resolver(PassThrough)
}

fn video(start: &str, duration: &str) -> VideoItem {
    VideoItem {
        start: Some(start.into()),
        duration: Some(duration.into()),
        ..VideoItem::new("/media/clip.mp4")
    }
}

fn effect(name: &str) -> EffectItem {
    EffectItem {
        name: name.to_string(),
        start: Some("0s".into()),
        duration: Some("2s".into()),
        target_start: None,
        params: Vec::new(),
    }
}

fn mixed_request() -> DraftRequest {
    let mut request = DraftRequest::named("scenario");
    request.videos = vec![video("0s", "5s")];
    request.audios = vec![AudioItem {
        start: Some("0s".into()),
        duration: Some("5s".into()),
        fade_in: Some("1s".into()),
        ..AudioItem::new("/media/track.mp3")
    }];
    request.texts = vec![TextItem {
        start: Some("0s".into()),
        duration: Some("2s".into()),
        ..TextItem::new("Hi")
    }];
    request
}

#[test]
fn one_of_each_item_fills_three_tracks() {
    let assembly = assembler().assemble(&mixed_request()).expect("assembly should succeed");
    let document = &assembly.document;

    let videos = document.track(TrackKind::Video, VIDEO_TRACK).unwrap();
    assert_eq!(videos.segments.len(), 1);
    assert_eq!(videos.segments[0].target_range.end(), 5_000_000);

    let audios = document.track(TrackKind::Audio, AUDIO_TRACK).unwrap();
    assert_eq!(audios.segments.len(), 1);
    let fades: Vec<_> = audios.segments[0]
        .extra_refs
        .iter()
        .filter(|id| {
            document.materials.get(id).map(|m| m.kind() == MaterialKind::Fade).unwrap_or(false)
        })
        .collect();
    assert_eq!(fades.len(), 1);

    let texts = document.track(TrackKind::Text, DEFAULT_TEXT_TRACK).unwrap();
    assert_eq!(texts.segments.len(), 1);

    assert_eq!(document.duration(), 5_000_000);
    assert_eq!(assembly.report.placed(), 3);
    assert!(assembly.report.warnings.is_empty());
}

#[test]
fn overlapping_explicit_video_is_dropped_and_assembly_continues() {
    let mut request = DraftRequest::named("overlap");
    request.videos = vec![
        video("0s", "5s"),
        VideoItem { target_start: Some("2s".into()), ..video("0s", "5s") },
        video("0s", "1s"),
    ];
    request.texts = vec![TextItem::new("after the overlap")];

    let assembly = assembler().assemble(&request).expect("overlap is not fatal");
    let track = assembly.document.track(TrackKind::Video, VIDEO_TRACK).unwrap();
    let ranges: Vec<TimeRange> = track.segments.iter().map(|s| s.target_range).collect();
    assert_eq!(ranges, vec![TimeRange::new(0, 5 * SEC), TimeRange::new(5 * SEC, SEC)]);

    let skipped: Vec<_> = assembly.report.skipped().collect();
    assert_eq!(skipped.len(), 1);
    assert_eq!(skipped[0].item, "videos[1]");
    let expected = DraftError::OverlappingSegment {
        requested: TimeRange::new(2 * SEC, 5 * SEC),
        existing: TimeRange::new(0, 5 * SEC),
    };
    assert_eq!(skipped[0].status, ItemStatus::Skipped { reason: expected.to_string() });

    assert!(assembly.document.track(TrackKind::Text, DEFAULT_TEXT_TRACK).is_ok());
    // Only the two placed clips own a video material.
    assert_eq!(assembly.document.materials.of_kind(MaterialKind::Video).count(), 2);
}

#[test]
fn unknown_effect_falls_back_to_the_default_with_a_warning() {
    let catalog = AssetCatalog::builtin();
    let default = catalog.default_for(AssetCategory::Effects).unwrap().clone();

    let mut request = DraftRequest::named("fallback");
    request.effects = vec![effect("does-not-exist")];
    let assembly = assembler().assemble(&request).expect("fallback is not fatal");

    let track = assembly.document.track(TrackKind::Effect, EFFECT_TRACK).unwrap();
    assert_eq!(track.segments.len(), 1);
    let material = assembly.document.materials.get(&track.segments[0].material_id).unwrap();
    match &material.payload {
        MaterialPayload::Effect(asset) => {
            assert_eq!(asset.resource_id, default.resource_id);
            assert_eq!(asset.name, default.name);
        }
        other => panic!("expected an effect material, got {other:?}"),
    }

    assert_eq!(assembly.report.warnings.len(), 1);
    assert_eq!(assembly.report.warnings[0].item, "effects[0]");
    assert!(assembly.report.warnings[0].message.contains("does-not-exist"));
}

#[test]
fn merged_documents_have_no_dangling_references() {
    let mut request = mixed_request();
    request.videos[0].transition = Some("叠化".into());
    request.videos[0].animation = Some("渐显".into());
    request.videos[0].effects = vec![VideoEffectItem { name: "负片频闪".into() }];
    request.videos.push(video("0s", "3s"));
    request.texts[0].intro_animation = Some("渐显".into());
    request.texts[0].outro_animation = Some("渐隐".into());
    request.effects = vec![effect("模糊")];

    let catalog = AssetCatalog::builtin();
    let assembly = assembler().assemble(&request).unwrap();
    assert!(!assembly.pending.is_empty());

    for legacy in [false, true] {
        let reconciled = SchemaReconciler::new(LegacyProfile::default(), &catalog)
            .merge(&assembly.document, &assembly.pending, EMPTY_TEMPLATE, legacy)
            .expect("merge should succeed");
        assert_eq!(dangling_refs(&reconciled.content), Vec::new());
        assert_eq!(reconciled.content["duration"], 8 * SEC);
    }
}
