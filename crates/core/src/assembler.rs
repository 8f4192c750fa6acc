// Turns a draft request into a document, one best-effort item at a time.

use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::catalog::{AssetCatalog, AssetCategory, AssetDescriptor};
use crate::document::{Canvas, Document, VersionTag};
use crate::error::DraftError;
use crate::material::{
    AdjustParam, Animation, AnimationSet, AssetMaterial, FadeMaterial, Material, MaterialPayload,
    MediaSource, TextMaterial, TextStyle,
};
use crate::request::{
    AudioItem, DraftRequest, EffectItem, FilterItem, ImageItem, MosaicItem, TextItem,
    TextStyleSpec, TextTrackSpec, VideoItem,
};
use crate::segment::{Clip, InlineAsset, Point, Segment, TextAnimation};
use crate::source::{LocalSources, MediaProbe, NoProbe, SourceResolver};
use crate::text::{self, LinebreakRule};
use crate::time::{TimeRange, TimeValue, SEC};
use crate::track::{Placement, Track, TrackKind, DEFAULT_PLACEMENT_CEILING};

pub const VIDEO_TRACK: &str = "video";
pub const GIF_TRACK: &str = "gif";
pub const IMAGE_TRACK: &str = "image";
pub const AUDIO_TRACK: &str = "audio";
pub const FILTER_TRACK: &str = "filter";
pub const EFFECT_TRACK: &str = "effect";
pub const MOSAIC_EFFECT: &str = "马赛克";

const DEFAULT_ANIMATION_DURATION: u64 = 500_000;
/// Source length the editor records for still images (three hours).
const PHOTO_DURATION: u64 = 10_800 * SEC;

#[derive(Debug, Clone, PartialEq)]
pub struct AssemblyOptions {
    /// Auto placement rejects slots ending after this point.
    pub placement_ceiling: u64,
    /// Item duration when neither the request nor a probe gives one.
    pub default_duration: u64,
    pub linebreak: LinebreakRule,
    pub default_font: String,
    pub default_text_intro: Option<String>,
    pub default_text_outro: Option<String>,
    pub canvas: Canvas,
    pub fps: f64,
    pub legacy: bool,
}

impl Default for AssemblyOptions {
    fn default() -> Self {
        Self {
            placement_ceiling: DEFAULT_PLACEMENT_CEILING,
            default_duration: 5 * SEC,
            linebreak: LinebreakRule::default(),
            default_font: "后现代体".to_string(),
            default_text_intro: None,
            default_text_outro: None,
            canvas: Canvas::default(),
            fps: 30.0,
            legacy: false,
        }
    }
}

// ── Report ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AssemblyReport {
    pub items: Vec<ItemOutcome>,
    pub warnings: Vec<AssemblyWarning>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemOutcome {
    /// Request path of the item, e.g. `videos[1]` or `texts[title][0]`.
    pub item: String,
    #[serde(flatten)]
    pub status: ItemStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ItemStatus {
    Placed { track: String, range: TimeRange },
    Skipped { reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssemblyWarning {
    pub item: String,
    pub message: String,
}

impl AssemblyReport {
    pub fn placed(&self) -> usize {
        self.items.iter().filter(|o| matches!(o.status, ItemStatus::Placed { .. })).count()
    }

    pub fn skipped(&self) -> impl Iterator<Item = &ItemOutcome> {
        self.items.iter().filter(|o| matches!(o.status, ItemStatus::Skipped { .. }))
    }

    fn warn(&mut self, item: &str, message: String) {
        warn!(item, %message, "assembly warning");
        self.warnings.push(AssemblyWarning { item: item.to_string(), message });
    }
}

/// A finished document plus the secondary materials (video effects) that
/// reconciliation must merge into whatever document gets serialized.
#[derive(Debug, Clone)]
pub struct Assembly {
    pub document: Document,
    pub pending: Vec<Material>,
    pub report: AssemblyReport,
}

// ── Assembler ──────────────────────────────────────────────────────

#[derive(Clone)]
pub struct DraftAssembler {
    catalog: Arc<AssetCatalog>,
    resolver: Arc<dyn SourceResolver + Send + Sync>,
    probe: Arc<dyn MediaProbe + Send + Sync>,
    options: AssemblyOptions,
}

impl DraftAssembler {
    pub fn new(catalog: AssetCatalog) -> Self {
        Self {
            catalog: Arc::new(catalog),
            resolver: Arc::new(LocalSources::default()),
            probe: Arc::new(NoProbe),
            options: AssemblyOptions::default(),
        }
    }

    pub fn with_resolver(mut self, resolver: impl SourceResolver + Send + Sync + 'static) -> Self {
        self.resolver = Arc::new(resolver);
        self
    }

    pub fn with_probe(mut self, probe: impl MediaProbe + Send + Sync + 'static) -> Self {
        self.probe = Arc::new(probe);
        self
    }

    pub fn with_options(mut self, options: AssemblyOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &AssemblyOptions {
        &self.options
    }

    pub fn catalog(&self) -> &AssetCatalog {
        &self.catalog
    }

    /// Assemble `request` into a fresh document.
    ///
    /// Items that cannot be placed or sourced are dropped and reported;
    /// malformed times and dangling material references abort the run.
    pub fn assemble(&self, request: &DraftRequest) -> Result<Assembly, DraftError> {
        let legacy = request.legacy.unwrap_or(self.options.legacy);
        let version = if legacy { VersionTag::Legacy } else { VersionTag::Current };
        let canvas = request.canvas.clone().unwrap_or_else(|| self.options.canvas.clone());
        let fps = request.fps.unwrap_or(self.options.fps);

        let mut run = Run {
            assembler: self,
            doc: Document::new(canvas, fps, version),
            pending: Vec::new(),
            report: AssemblyReport::default(),
        };

        for (i, item) in request.videos.iter().enumerate() {
            let label = format!("videos[{i}]");
            let outcome = run.video(item, &label, VIDEO_TRACK);
            run.settle(label, outcome)?;
        }
        for (i, item) in request.gifs.iter().enumerate() {
            let label = format!("gifs[{i}]");
            let outcome = run.video(item, &label, GIF_TRACK);
            run.settle(label, outcome)?;
        }
        for (i, item) in request.images.iter().enumerate() {
            let label = format!("images[{i}]");
            let outcome = run.image(item, &label);
            run.settle(label, outcome)?;
        }
        for (i, item) in request.audios.iter().enumerate() {
            let label = format!("audios[{i}]");
            if !item.enabled {
                debug!(item = %label, "audio disabled");
                run.report.items.push(ItemOutcome {
                    item: label,
                    status: ItemStatus::Skipped { reason: "disabled".to_string() },
                });
                continue;
            }
            let outcome = run.audio(item, &label);
            run.settle(label, outcome)?;
        }
        for group in request.text_groups() {
            for (i, item) in group.texts.iter().enumerate() {
                let label = format!("texts[{}][{i}]", group.name);
                let outcome = run.text(&group, item, &label);
                run.settle(label, outcome)?;
            }
        }
        for (i, item) in request.filters.iter().enumerate() {
            let label = format!("filters[{i}]");
            let outcome = run.filter(item, &label);
            run.settle(label, outcome)?;
        }
        for (i, item) in request.effects.iter().enumerate() {
            let label = format!("effects[{i}]");
            let outcome = run.effect(item, &label);
            run.settle(label, outcome)?;
        }
        for (i, item) in request.mosaics.iter().enumerate() {
            let label = format!("mosaics[{i}]");
            let outcome = run.mosaic(item, &label);
            run.settle(label, outcome)?;
        }

        let Run { doc, pending, report, .. } = run;
        info!(
            draft = %request.draft_name,
            placed = report.placed(),
            skipped = report.skipped().count(),
            warnings = report.warnings.len(),
            duration = doc.duration(),
            "assembly finished"
        );
        Ok(Assembly { document: doc, pending, report })
    }
}

/// Where one item ended up.
struct Placed {
    track: String,
    range: TimeRange,
}

/// State for a single `assemble` call.
struct Run<'a> {
    assembler: &'a DraftAssembler,
    doc: Document,
    pending: Vec<Material>,
    report: AssemblyReport,
}

impl Run<'_> {
    fn options(&self) -> &AssemblyOptions {
        &self.assembler.options
    }

    fn catalog(&self) -> &AssetCatalog {
        &self.assembler.catalog
    }

    fn legacy(&self) -> bool {
        self.doc.version_tag == VersionTag::Legacy
    }

    /// Record an item's outcome. Item-level failures become skips; anything
    /// else aborts the assembly.
    fn settle(
        &mut self,
        item: String,
        outcome: Result<Placed, DraftError>,
    ) -> Result<(), DraftError> {
        let status = match outcome {
            Ok(Placed { track, range }) => ItemStatus::Placed { track, range },
            Err(err) if err.is_item_level() => {
                warn!(item = %item, error = %err, "item skipped");
                ItemStatus::Skipped { reason: err.to_string() }
            }
            Err(err) => return Err(err),
        };
        self.report.items.push(ItemOutcome { item, status });
        Ok(())
    }

    /// Resolve a placement without touching the document, so a rejected
    /// item leaves neither materials nor an empty track behind.
    fn check(
        &self,
        kind: TrackKind,
        name: &str,
        placement: Placement,
    ) -> Result<TimeRange, DraftError> {
        let ceiling = self.options().placement_ceiling;
        match self.doc.track(kind, name) {
            Ok(track) => track.resolve(placement, ceiling),
            Err(_) => Track::new(kind, name, 0).resolve(placement, ceiling),
        }
    }

    fn place(
        &mut self,
        kind: TrackKind,
        name: &str,
        relative_index: Option<i32>,
        segment: Segment,
        range: TimeRange,
    ) -> Result<String, DraftError> {
        self.doc.ensure_track(kind, name, relative_index);
        let ceiling = self.options().placement_ceiling;
        let placed = self.doc.add_segment(kind, name, segment, Placement::At(range), ceiling)?;
        Ok(placed.id.clone())
    }

    /// A segment whose format fields match the track it will land on,
    /// including a track `place` has yet to create with `requested` index.
    fn new_segment(
        &self,
        kind: TrackKind,
        name: &str,
        requested: Option<i32>,
        material_id: &str,
    ) -> Segment {
        let relative_index = match self.doc.track(kind, name) {
            Ok(track) => track.relative_index,
            Err(_) => requested.unwrap_or_else(|| self.doc.next_relative_index(kind)),
        };
        Segment::new(material_id, self.doc.compat_for(kind, relative_index))
    }

    fn segment_mut(&mut self, kind: TrackKind, name: &str, id: &str) -> Option<&mut Segment> {
        self.doc.track_mut(kind, name).ok()?.segment_mut(id)
    }

    fn resolve_source(&self, source: &str) -> Result<(String, Option<u64>), DraftError> {
        let path = self.assembler.resolver.resolve(source).map_err(|reason| {
            DraftError::UnresolvedSource { source_ref: source.to_string(), reason }
        })?;
        let probed = self.assembler.probe.duration(&path);
        Ok((path.to_string_lossy().into_owned(), probed))
    }

    fn media_duration(
        &self,
        requested: Option<u64>,
        probed: Option<u64>,
        source_start: u64,
    ) -> u64 {
        requested
            .or_else(|| probed.map(|d| d.saturating_sub(source_start)).filter(|d| *d > 0))
            .unwrap_or(self.options().default_duration)
    }

    /// Catalog lookup for an attachment: unknown names fall back to the
    /// category default or, without one, skip the attachment.
    fn lookup(
        &mut self,
        item: &str,
        category: AssetCategory,
        name: &str,
    ) -> Option<AssetDescriptor> {
        match self.assembler.catalog.resolve(category, name) {
            Ok(resolved) => {
                if let Some(requested) = &resolved.substituted_for {
                    let message = format!(
                        "unknown {category} `{requested}`, substituted `{}`",
                        resolved.descriptor.name
                    );
                    let descriptor = resolved.descriptor.clone();
                    self.report.warn(item, message);
                    return Some(descriptor);
                }
                Some(resolved.descriptor.clone())
            }
            Err(err) => {
                self.report.warn(item, format!("{err}, skipped"));
                None
            }
        }
    }

    fn asset_material(
        &self,
        category: AssetCategory,
        descriptor: &AssetDescriptor,
    ) -> AssetMaterial {
        let adjust_params = self
            .catalog()
            .table(category)
            .map(|table| table.adjust_params.clone())
            .unwrap_or_default();
        AssetMaterial {
            name: descriptor.name.clone(),
            resource_id: descriptor.resource_id.clone(),
            effect_id: descriptor.effect_id.clone(),
            duration: descriptor.duration,
            value: None,
            adjust_params,
        }
    }

    // ── Items ──────────────────────────────────────────────────────

    fn video(&mut self, item: &VideoItem, label: &str, track: &str) -> Result<Placed, DraftError> {
        let source_start = micros(&item.start)?.unwrap_or(0);
        let target_start = micros(&item.target_start)?;
        let requested = micros(&item.duration)?;
        let (path, probed) = self.resolve_source(&item.file_path)?;
        let duration = self.media_duration(requested, probed, source_start);

        let placement = match target_start {
            Some(start) => Placement::At(TimeRange::new(start, duration)),
            None => Placement::After { earliest: 0, duration },
        };
        let range = self.check(TrackKind::Video, track, placement)?;

        let source = MediaSource {
            material_name: file_name(&path),
            duration: probed.unwrap_or_else(|| source_start.saturating_add(duration)),
            path,
        };
        let material_id =
            self.doc.materials.insert(Material::new(MaterialPayload::Video(source)))?;
        let segment = self
            .new_segment(TrackKind::Video, track, None, &material_id)
            .with_source(TimeRange::new(source_start, duration))
            .with_volume(item.volume);
        let segment_id = self.place(TrackKind::Video, track, None, segment, range)?;

        if let Some(name) = &item.transition {
            self.attach_transition(label, track, &segment_id, name)?;
        }
        if let Some(name) = &item.animation {
            self.attach_video_intro(label, track, &segment_id, name, duration)?;
        }
        for effect in &item.effects {
            self.attach_video_effect(label, track, &segment_id, &effect.name)?;
        }

        Ok(Placed { track: track.to_string(), range })
    }

    fn image(&mut self, item: &ImageItem, label: &str) -> Result<Placed, DraftError> {
        let target_start = micros(&item.target_start)?;
        let duration = micros(&item.duration)?.unwrap_or(self.options().default_duration);
        let (path, _) = self.resolve_source(&item.file_path)?;

        let placement = match target_start {
            Some(start) => Placement::At(TimeRange::new(start, duration)),
            None => Placement::After { earliest: 0, duration },
        };
        let range = self.check(TrackKind::Video, IMAGE_TRACK, placement)?;

        let source = MediaSource { material_name: file_name(&path), duration: PHOTO_DURATION, path };
        let material_id =
            self.doc.materials.insert(Material::new(MaterialPayload::Photo(source)))?;
        let mut clip = match item.position {
            Some(position) => {
                let (x, y) = text::normalize_position(position, &self.doc.canvas);
                Clip::at(x, y)
            }
            None => Clip::default(),
        };
        if let Some(scale) = item.scale {
            clip.scale = Point { x: scale, y: scale };
        }
        let segment = self
            .new_segment(TrackKind::Video, IMAGE_TRACK, None, &material_id)
            .with_source(TimeRange::new(0, duration))
            .with_clip(clip);
        self.place(TrackKind::Video, IMAGE_TRACK, None, segment, range)?;
        debug!(item = label, track = IMAGE_TRACK, "image placed");
        Ok(Placed { track: IMAGE_TRACK.to_string(), range })
    }

    fn attach_transition(
        &mut self,
        label: &str,
        track: &str,
        segment_id: &str,
        name: &str,
    ) -> Result<(), DraftError> {
        let Some(descriptor) = self.lookup(label, AssetCategory::Transitions, name) else {
            return Ok(());
        };
        let material = self.asset_material(AssetCategory::Transitions, &descriptor);
        let id = self.doc.materials.insert(Material::new(MaterialPayload::Transition(material)))?;
        self.doc.attach(TrackKind::Video, track, segment_id, &id)?;
        if let Some(fields) =
            self.segment_mut(TrackKind::Video, track, segment_id).and_then(|s| s.compat.legacy_mut())
        {
            fields.transition = Some(inline(&id, &descriptor));
        }
        Ok(())
    }

    fn attach_video_intro(
        &mut self,
        label: &str,
        track: &str,
        segment_id: &str,
        name: &str,
        segment_duration: u64,
    ) -> Result<(), DraftError> {
        let Some(descriptor) = self.lookup(label, AssetCategory::VideoIntros, name) else {
            return Ok(());
        };
        let duration =
            descriptor.duration.unwrap_or(DEFAULT_ANIMATION_DURATION).min(segment_duration);
        let set = AnimationSet { animations: vec![animation(&descriptor, "in", 0, duration)] };
        let id = self.doc.materials.insert(Material::new(MaterialPayload::Animation(set)))?;
        self.doc.attach(TrackKind::Video, track, segment_id, &id)?;
        if let Some(fields) =
            self.segment_mut(TrackKind::Video, track, segment_id).and_then(|s| s.compat.legacy_mut())
        {
            fields.animation = Some(InlineAsset { duration, ..inline(&id, &descriptor) });
        }
        Ok(())
    }

    /// Video effects live outside the document until reconciliation; the
    /// segment only carries the reserved id.
    fn attach_video_effect(
        &mut self,
        label: &str,
        track: &str,
        segment_id: &str,
        name: &str,
    ) -> Result<(), DraftError> {
        let Some(descriptor) = self.lookup(label, AssetCategory::VideoEffects, name) else {
            return Ok(());
        };
        let material = self.asset_material(AssetCategory::VideoEffects, &descriptor);
        let pending =
            self.doc.materials.defer(Material::new(MaterialPayload::VideoEffect(material)))?;
        self.doc.attach(TrackKind::Video, track, segment_id, &pending.id)?;
        debug!(item = label, id = %pending.id, effect = %descriptor.name, "video effect pending");
        self.pending.push(pending);
        Ok(())
    }

    fn audio(&mut self, item: &AudioItem, label: &str) -> Result<Placed, DraftError> {
        let source_start = micros(&item.start)?.unwrap_or(0);
        let target_start = micros(&item.target_start)?;
        let requested = micros(&item.duration)?;
        let fade_in = micros(&item.fade_in)?.filter(|d| *d > 0);
        let fade_out = micros(&item.fade_out)?.filter(|d| *d > 0);
        let (path, probed) = self.resolve_source(&item.file_path)?;
        let duration = self.media_duration(requested, probed, source_start);

        let placement = match target_start {
            Some(start) => Placement::At(TimeRange::new(start, duration)),
            None => Placement::After { earliest: 0, duration },
        };
        let range = self.check(TrackKind::Audio, AUDIO_TRACK, placement)?;

        let source = MediaSource {
            material_name: file_name(&path),
            duration: probed.unwrap_or_else(|| source_start.saturating_add(duration)),
            path,
        };
        let material_id =
            self.doc.materials.insert(Material::new(MaterialPayload::Audio(source)))?;
        let segment = self
            .new_segment(TrackKind::Audio, AUDIO_TRACK, None, &material_id)
            .with_source(TimeRange::new(source_start, duration))
            .with_volume(item.volume);
        let segment_id = self.place(TrackKind::Audio, AUDIO_TRACK, None, segment, range)?;

        // Only one fade is honored; fade_in wins.
        let fade = match (fade_in, fade_out) {
            (Some(fade_in), fade_out) => {
                if fade_out.is_some() {
                    self.report.warn(label, "fade_out ignored because fade_in is set".to_string());
                }
                Some(FadeMaterial { fade_in_duration: fade_in, fade_out_duration: 0 })
            }
            (None, Some(fade_out)) => {
                Some(FadeMaterial { fade_in_duration: 0, fade_out_duration: fade_out })
            }
            (None, None) => None,
        };
        if let Some(fade) = fade {
            let id = self.doc.materials.insert(Material::new(MaterialPayload::Fade(fade)))?;
            self.doc.attach(TrackKind::Audio, AUDIO_TRACK, &segment_id, &id)?;
        }

        Ok(Placed { track: AUDIO_TRACK.to_string(), range })
    }

    fn text(
        &mut self,
        group: &TextTrackSpec,
        item: &TextItem,
        label: &str,
    ) -> Result<Placed, DraftError> {
        let explicit = match micros(&item.target_start)? {
            Some(start) => Some(start),
            None => micros(&item.start)?,
        };
        let duration = micros(&item.duration)?.unwrap_or(self.options().default_duration);
        let placement = match explicit {
            Some(start) => Placement::At(TimeRange::new(start, duration)),
            None => Placement::After { earliest: 0, duration },
        };
        let range = self.check(TrackKind::Text, &group.name, placement)?;

        let rule = item.linebreak.unwrap_or(self.options().linebreak);
        let wrapped = text::wrap(&item.text, &rule);
        let content = if self.legacy() { wrapped } else { json!({ "text": wrapped }).to_string() };
        let material = TextMaterial {
            content,
            font: item.font.clone().unwrap_or_else(|| self.options().default_font.clone()),
            style: merge_style(item.style.as_ref()),
        };
        let material_id =
            self.doc.materials.insert(Material::new(MaterialPayload::TextStyle(material)))?;

        let mut segment =
            self.new_segment(TrackKind::Text, &group.name, group.relative_index, &material_id);
        if let Some(position) = item.position {
            let (x, y) = text::normalize_position(position, &self.doc.canvas);
            segment = segment.with_clip(Clip::at(x, y));
        }
        let segment_id =
            self.place(TrackKind::Text, &group.name, group.relative_index, segment, range)?;

        self.attach_text_animations(label, &group.name, &segment_id, item, duration)?;
        self.attach_text_decorations(label, &group.name, &segment_id, item)?;
        Ok(Placed { track: group.name.clone(), range })
    }

    /// Bubble and text effect. Neither table has a default, so unknown
    /// names are dropped with a warning.
    fn attach_text_decorations(
        &mut self,
        label: &str,
        track: &str,
        segment_id: &str,
        item: &TextItem,
    ) -> Result<(), DraftError> {
        let decorations = [
            (AssetCategory::TextBubbles, item.bubble.as_deref()),
            (AssetCategory::TextEffects, item.effect.as_deref()),
        ];
        for (category, name) in decorations {
            let Some(name) = name else { continue };
            let Some(descriptor) = self.lookup(label, category, name) else { continue };
            let material = self.asset_material(category, &descriptor);
            let payload = match category {
                AssetCategory::TextBubbles => MaterialPayload::TextShape(material),
                _ => MaterialPayload::TextEffect(material),
            };
            let id = self.doc.materials.insert(Material::new(payload))?;
            self.doc.attach(TrackKind::Text, track, segment_id, &id)?;
        }
        Ok(())
    }

    fn attach_text_animations(
        &mut self,
        label: &str,
        track: &str,
        segment_id: &str,
        item: &TextItem,
        segment_duration: u64,
    ) -> Result<(), DraftError> {
        let intro =
            item.intro_animation.clone().or_else(|| self.options().default_text_intro.clone());
        let outro =
            item.outro_animation.clone().or_else(|| self.options().default_text_outro.clone());
        let intro = intro.and_then(|name| self.lookup(label, AssetCategory::TextIntros, &name));
        let outro = outro.and_then(|name| self.lookup(label, AssetCategory::TextOutros, &name));
        let looped = item
            .loop_animation
            .as_ref()
            .and_then(|name| self.lookup(label, AssetCategory::TextLoops, name));

        let mut animations = Vec::new();
        let mut intro_end = 0;
        let mut outro_start = segment_duration;
        if let Some(descriptor) = &intro {
            let duration =
                descriptor.duration.unwrap_or(DEFAULT_ANIMATION_DURATION).min(segment_duration);
            animations.push(animation(descriptor, "in", 0, duration));
            intro_end = duration;
        }
        if let Some(descriptor) = &outro {
            let duration = descriptor
                .duration
                .unwrap_or(DEFAULT_ANIMATION_DURATION)
                .min(segment_duration.saturating_sub(intro_end));
            outro_start = segment_duration - duration;
            animations.push(animation(descriptor, "out", outro_start, duration));
        }
        if let Some(descriptor) = &looped {
            let span = outro_start.saturating_sub(intro_end);
            if span > 0 {
                animations.push(animation(descriptor, "loop", intro_end, span));
            }
        }
        if animations.is_empty() {
            return Ok(());
        }

        let inline_animation = animations
            .iter()
            .find(|a| a.kind == "out")
            .or_else(|| animations.first())
            .map(|a| (a.kind.clone(), a.duration));
        let set = AnimationSet { animations };
        let id = self.doc.materials.insert(Material::new(MaterialPayload::Animation(set)))?;
        self.doc.attach(TrackKind::Text, track, segment_id, &id)?;
        if let (Some((kind, duration)), Some(fields)) = (
            inline_animation,
            self.segment_mut(TrackKind::Text, track, segment_id).and_then(|s| s.compat.legacy_mut()),
        ) {
            fields.text_animation = Some(TextAnimation { id, kind, duration });
        }
        Ok(())
    }

    fn filter(&mut self, item: &FilterItem, label: &str) -> Result<Placed, DraftError> {
        let range = self.timeline_range(
            TrackKind::Filter,
            FILTER_TRACK,
            &item.start,
            &item.duration,
            &item.target_start,
        )?;
        let Some(descriptor) = self.lookup(label, AssetCategory::Filters, &item.name) else {
            return Err(DraftError::UnknownAssetName {
                category: AssetCategory::Filters,
                name: item.name.clone(),
            });
        };
        let mut material = self.asset_material(AssetCategory::Filters, &descriptor);
        material.value = Some((item.intensity / 100.0).clamp(0.0, 1.0));
        let material_id = self.doc.materials.insert(Material::new(MaterialPayload::Filter(material)))?;
        let segment = self.new_segment(TrackKind::Filter, FILTER_TRACK, None, &material_id);
        self.place(TrackKind::Filter, FILTER_TRACK, None, segment, range)?;
        Ok(Placed { track: FILTER_TRACK.to_string(), range })
    }

    fn effect(&mut self, item: &EffectItem, label: &str) -> Result<Placed, DraftError> {
        let range = self.timeline_range(
            TrackKind::Effect,
            EFFECT_TRACK,
            &item.start,
            &item.duration,
            &item.target_start,
        )?;
        self.place_effect(label, &item.name, &item.params, range)
    }

    fn mosaic(&mut self, item: &MosaicItem, label: &str) -> Result<Placed, DraftError> {
        let range =
            self.timeline_range(TrackKind::Effect, EFFECT_TRACK, &item.start, &item.duration, &None)?;
        self.place_effect(label, MOSAIC_EFFECT, &item.region, range)
    }

    fn place_effect(
        &mut self,
        label: &str,
        name: &str,
        params: &[f64],
        range: TimeRange,
    ) -> Result<Placed, DraftError> {
        let Some(descriptor) = self.lookup(label, AssetCategory::Effects, name) else {
            return Err(DraftError::UnknownAssetName {
                category: AssetCategory::Effects,
                name: name.to_string(),
            });
        };
        let mut material = self.asset_material(AssetCategory::Effects, &descriptor);
        material.duration = Some(range.duration);
        material.adjust_params.extend(
            params.iter().enumerate().map(|(i, value)| AdjustParam::new(format!("param_{i}"), *value)),
        );
        let material_id = self.doc.materials.insert(Material::new(MaterialPayload::Effect(material)))?;
        let segment = self.new_segment(TrackKind::Effect, EFFECT_TRACK, None, &material_id);
        self.place(TrackKind::Effect, EFFECT_TRACK, None, segment, range)?;
        Ok(Placed { track: EFFECT_TRACK.to_string(), range })
    }

    /// Filters and effects have no source media: `target_start` pins them,
    /// otherwise they auto-advance from `start`.
    fn timeline_range(
        &self,
        kind: TrackKind,
        track: &str,
        start: &Option<TimeValue>,
        duration: &Option<TimeValue>,
        target_start: &Option<TimeValue>,
    ) -> Result<TimeRange, DraftError> {
        let duration = micros(duration)?.unwrap_or(self.options().default_duration);
        let placement = match micros(target_start)? {
            Some(start) => Placement::At(TimeRange::new(start, duration)),
            None => Placement::After { earliest: micros(start)?.unwrap_or(0), duration },
        };
        self.check(kind, track, placement)
    }
}

fn micros(value: &Option<TimeValue>) -> Result<Option<u64>, DraftError> {
    value.as_ref().map(TimeValue::micros).transpose()
}

fn file_name(path: &str) -> String {
    Path::new(path)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string())
}

fn animation(descriptor: &AssetDescriptor, kind: &str, start: u64, duration: u64) -> Animation {
    Animation {
        name: descriptor.name.clone(),
        kind: kind.to_string(),
        resource_id: descriptor.resource_id.clone(),
        effect_id: descriptor.effect_id.clone(),
        start,
        duration,
    }
}

fn inline(id: &str, descriptor: &AssetDescriptor) -> InlineAsset {
    InlineAsset {
        id: id.to_string(),
        name: descriptor.name.clone(),
        resource_id: descriptor.resource_id.clone(),
        duration: descriptor.duration.unwrap_or(DEFAULT_ANIMATION_DURATION),
    }
}

fn merge_style(spec: Option<&TextStyleSpec>) -> TextStyle {
    let mut style = TextStyle::default();
    let Some(spec) = spec else {
        return style;
    };
    if let Some(color) = spec.color.as_ref().and_then(|color| color.to_rgb()) {
        style.color = color;
    }
    style.size = spec.size.unwrap_or(style.size);
    style.bold = spec.bold.unwrap_or(style.bold);
    style.italic = spec.italic.unwrap_or(style.italic);
    style.underline = spec.underline.unwrap_or(style.underline);
    style.alpha = spec.alpha.unwrap_or(style.alpha);
    style.align = spec.align.unwrap_or(style.align);
    style.vertical = spec.vertical.unwrap_or(style.vertical);
    style.letter_spacing = spec.letter_spacing.unwrap_or(style.letter_spacing);
    style.line_spacing = spec.line_spacing.unwrap_or(style.line_spacing);
    style
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::material::MaterialKind;
    use crate::request::{PositionSpec, VideoEffectItem};
    use crate::segment::SegmentCompat;
    use crate::source::PassThrough;

    fn assembler() -> DraftAssembler {
        DraftAssembler::new(AssetCatalog::builtin()).with_resolver(PassThrough)
    }

    fn clip(start: &str, duration: &str) -> VideoItem {
        VideoItem {
            start: Some(start.into()),
            duration: Some(duration.into()),
            ..VideoItem::new("clip.mp4")
        }
    }

    #[test]
    fn videos_without_target_start_run_back_to_back() {
        let mut request = DraftRequest::named("seq");
        request.videos = vec![clip("0s", "5s"), clip("2s", "3s")];
        let assembly = assembler().assemble(&request).unwrap();

        let track = assembly.document.track(TrackKind::Video, VIDEO_TRACK).unwrap();
        let ranges: Vec<TimeRange> = track.segments.iter().map(|s| s.target_range).collect();
        assert_eq!(ranges, vec![TimeRange::new(0, 5 * SEC), TimeRange::new(5 * SEC, 3 * SEC)]);
        assert_eq!(track.segments[1].source_range(), TimeRange::new(2 * SEC, 3 * SEC));
    }

    struct FixedDuration(u64);

    impl MediaProbe for FixedDuration {
        fn duration(&self, _path: &Path) -> Option<u64> {
            Some(self.0)
        }
    }

    #[test]
    fn source_start_at_the_end_of_time_saturates() {
        let mut request = DraftRequest::named("far");
        request.videos = vec![clip("18446744073709551615", "1s")];
        request.audios = vec![AudioItem {
            start: Some(u64::MAX.into()),
            duration: Some("1s".into()),
            ..AudioItem::new("bgm.mp3")
        }];

        let assembly = assembler().assemble(&request).unwrap();
        assert_eq!(assembly.report.placed(), 2);
        let video = assembly.document.materials.of_kind(MaterialKind::Video).next().unwrap();
        let MaterialPayload::Video(source) = &video.payload else { panic!("not a video") };
        assert_eq!(source.duration, u64::MAX);
        let segment = &assembly.document.track(TrackKind::Video, VIDEO_TRACK).unwrap().segments[0];
        assert_eq!(segment.target_range, TimeRange::new(0, SEC));
        assert_eq!(segment.source_range().start, u64::MAX);

        // A probed duration is used as-is.
        let assembly = assembler().with_probe(FixedDuration(7 * SEC)).assemble(&request).unwrap();
        let audio = assembly.document.materials.of_kind(MaterialKind::Audio).next().unwrap();
        let MaterialPayload::Audio(source) = &audio.payload else { panic!("not audio") };
        assert_eq!(source.duration, 7 * SEC);
    }

    #[test]
    fn invalid_time_aborts_the_assembly() {
        let mut request = DraftRequest::named("bad");
        request.videos = vec![clip("0s", "five seconds")];
        let err = assembler().assemble(&request).unwrap_err();
        assert_eq!(err, DraftError::InvalidTimeFormat("five seconds".into()));
    }

    #[test]
    fn unresolvable_source_skips_only_that_item() {
        let assembler = DraftAssembler::new(AssetCatalog::builtin());
        let mut request = DraftRequest::named("remote");
        request.videos = vec![VideoItem::new("https://cdn.example/a.mp4")];
        request.texts = vec![TextItem::new("still here")];
        let assembly = assembler.assemble(&request).unwrap();

        assert_eq!(assembly.report.skipped().count(), 1);
        assert!(assembly.document.track(TrackKind::Video, VIDEO_TRACK).is_err());
        assert!(assembly.document.materials.of_kind(MaterialKind::Video).next().is_none());
        assert_eq!(assembly.document.track(TrackKind::Text, "text").unwrap().segments.len(), 1);
    }

    #[test]
    fn exhausted_placement_leaves_no_orphans() {
        let options = AssemblyOptions { placement_ceiling: 6 * SEC, ..AssemblyOptions::default() };
        let mut request = DraftRequest::named("full");
        request.filters = vec![
            FilterItem {
                name: "中性".into(),
                start: None,
                duration: Some("4s".into()),
                target_start: None,
                intensity: 100.0,
            };
            2
        ];
        let assembly = assembler().with_options(options).assemble(&request).unwrap();

        assert_eq!(assembly.report.placed(), 1);
        assert_eq!(assembly.document.materials.of_kind(MaterialKind::Filter).count(), 1);
    }

    #[test]
    fn filter_intensity_is_scaled() {
        let mut request = DraftRequest::named("filter");
        request.filters = vec![FilterItem {
            name: "中性".into(),
            start: Some("1s".into()),
            duration: Some("2s".into()),
            target_start: None,
            intensity: 80.0,
        }];
        let assembly = assembler().assemble(&request).unwrap();
        let material = assembly.document.materials.of_kind(MaterialKind::Filter).next().unwrap();
        let MaterialPayload::Filter(filter) = &material.payload else { panic!("not a filter") };
        assert_eq!(filter.value, Some(0.8));
        let track = assembly.document.track(TrackKind::Filter, FILTER_TRACK).unwrap();
        assert_eq!(track.segments[0].target_range, TimeRange::new(SEC, 2 * SEC));
    }

    #[test]
    fn fade_in_wins_over_fade_out() {
        let mut request = DraftRequest::named("fade");
        request.audios = vec![AudioItem {
            duration: Some("5s".into()),
            fade_in: Some("1s".into()),
            fade_out: Some("2s".into()),
            ..AudioItem::new("bgm.mp3")
        }];
        let assembly = assembler().assemble(&request).unwrap();

        let fade = assembly.document.materials.of_kind(MaterialKind::Fade).next().unwrap();
        assert_eq!(
            fade.payload,
            MaterialPayload::Fade(FadeMaterial { fade_in_duration: SEC, fade_out_duration: 0 })
        );
        assert_eq!(assembly.report.warnings.len(), 1);
        assert!(assembly.report.warnings[0].message.contains("fade_out"));
    }

    #[test]
    fn disabled_audio_creates_no_track() {
        let mut request = DraftRequest::named("mute");
        request.audios = vec![AudioItem { enabled: false, ..AudioItem::new("bgm.mp3") }];
        let assembly = assembler().assemble(&request).unwrap();
        assert!(assembly.document.tracks.is_empty());
        assert_eq!(assembly.report.skipped().count(), 1);
    }

    #[test]
    fn unknown_transition_is_skipped_with_a_warning() {
        let mut request = DraftRequest::named("tr");
        request.videos = vec![VideoItem { transition: Some("no such".into()), ..clip("0s", "2s") }];
        let assembly = assembler().assemble(&request).unwrap();
        let segment = &assembly.document.track(TrackKind::Video, VIDEO_TRACK).unwrap().segments[0];
        assert!(segment.extra_refs.is_empty());
        assert_eq!(assembly.report.warnings.len(), 1);
    }

    #[test]
    fn legacy_segments_carry_inline_fields() {
        let mut request = DraftRequest::named("legacy");
        request.legacy = Some(true);
        request.videos = vec![VideoItem {
            transition: Some("叠化".into()),
            animation: Some("渐显".into()),
            ..clip("0s", "2s")
        }];
        request.texts = vec![TextItem {
            duration: Some("2s".into()),
            outro_animation: Some("渐隐".into()),
            ..TextItem::new("bye")
        }];
        let assembly = assembler().assemble(&request).unwrap();

        let video = &assembly.document.track(TrackKind::Video, VIDEO_TRACK).unwrap().segments[0];
        let value = serde_json::to_value(video).unwrap();
        assert_eq!(value["transition"]["name"], "叠化");
        assert_eq!(value["animation"]["name"], "渐显");

        let text = &assembly.document.track(TrackKind::Text, "text").unwrap().segments[0];
        let value = serde_json::to_value(text).unwrap();
        assert_eq!(value["text_animation"]["type"], "out");
        assert_eq!(value["text_animation"]["duration"], 500_000);
    }

    #[test]
    fn text_animations_split_the_segment() {
        let mut request = DraftRequest::named("anim");
        request.texts = vec![TextItem {
            duration: Some("4s".into()),
            intro_animation: Some("渐显".into()),
            outro_animation: Some("渐隐".into()),
            loop_animation: Some("跳动".into()),
            ..TextItem::new("hello")
        }];
        let assembly = assembler().assemble(&request).unwrap();
        let set = assembly.document.materials.of_kind(MaterialKind::Animation).next().unwrap();
        let MaterialPayload::Animation(set) = &set.payload else { panic!("not an animation") };
        let spans: Vec<(&str, u64, u64)> =
            set.animations.iter().map(|a| (a.kind.as_str(), a.start, a.duration)).collect();
        assert_eq!(
            spans,
            vec![("in", 0, 500_000), ("out", 3_500_000, 500_000), ("loop", 500_000, 3_000_000)]
        );
    }

    #[test]
    fn text_is_wrapped_and_positioned() {
        let options =
            AssemblyOptions { linebreak: LinebreakRule::wrapping(2, 3), ..AssemblyOptions::default() };
        let mut request = DraftRequest::named("caption");
        request.texts = vec![TextItem {
            position: Some(PositionSpec { x: 960.0, y: 1080.0 }),
            ..TextItem::new("你好世界")
        }];
        let assembly = assembler().with_options(options).assemble(&request).unwrap();

        let material = assembly.document.materials.of_kind(MaterialKind::TextStyle).next().unwrap();
        let MaterialPayload::TextStyle(text) = &material.payload else { panic!("not text") };
        let content: serde_json::Value = serde_json::from_str(&text.content).unwrap();
        assert_eq!(content["text"], "你好\n世界");
        assert_eq!(text.font, "后现代体");

        let segment = &assembly.document.track(TrackKind::Text, "text").unwrap().segments[0];
        assert_eq!(segment.clip.unwrap().transform.y, -1.0);
    }

    #[test]
    fn video_effects_are_pending_and_referenced() {
        let mut request = DraftRequest::named("fx");
        request.videos = vec![VideoItem {
            effects: vec![VideoEffectItem { name: "故障".into() }],
            ..clip("0s", "2s")
        }];
        let assembly = assembler().assemble(&request).unwrap();

        assert_eq!(assembly.pending.len(), 1);
        let segment = &assembly.document.track(TrackKind::Video, VIDEO_TRACK).unwrap().segments[0];
        assert_eq!(segment.extra_refs, vec![assembly.pending[0].id.clone()]);
        assert!(assembly.document.materials.of_kind(MaterialKind::VideoEffect).next().is_none());
    }

    fn render_indices(track: &Track) -> Vec<i64> {
        track
            .segments
            .iter()
            .map(|segment| match &segment.compat {
                SegmentCompat::Current(fields) => fields.render_index,
                SegmentCompat::Legacy(_) => panic!("legacy segment"),
            })
            .collect()
    }

    #[test]
    fn captions_share_their_track_render_index() {
        let mut request = DraftRequest::named("layers");
        request.text_tracks = vec![
            TextTrackSpec {
                name: "title".into(),
                relative_index: Some(5),
                texts: vec![TextItem::new("one"), TextItem::new("two")],
            },
            TextTrackSpec {
                name: "subs".into(),
                relative_index: None,
                texts: vec![TextItem::new("a"), TextItem::new("b")],
            },
        ];
        let assembly = assembler().assemble(&request).unwrap();

        let title = assembly.document.track(TrackKind::Text, "title").unwrap();
        assert_eq!(title.relative_index, 5);
        assert_eq!(render_indices(title), vec![14_005, 14_005]);
        let subs = assembly.document.track(TrackKind::Text, "subs").unwrap();
        assert_eq!(subs.relative_index, 6);
        assert_eq!(render_indices(subs), vec![14_006, 14_006]);
    }

    #[test]
    fn images_land_on_their_own_track() {
        let mut request = DraftRequest::named("stills");
        request.videos = vec![clip("0s", "4s")];
        request.images = vec![
            ImageItem {
                duration: Some("2s".into()),
                scale: Some(0.5),
                position: Some(PositionSpec { x: 0.5, y: 0.0 }),
                ..ImageItem::new("cover.png")
            },
            ImageItem { duration: Some("3s".into()), ..ImageItem::new("logo.png") },
        ];
        let assembly = assembler().assemble(&request).unwrap();

        let images = assembly.document.track(TrackKind::Video, IMAGE_TRACK).unwrap();
        let ranges: Vec<TimeRange> = images.segments.iter().map(|s| s.target_range).collect();
        assert_eq!(ranges, vec![TimeRange::new(0, 2 * SEC), TimeRange::new(2 * SEC, 3 * SEC)]);
        let clip = images.segments[0].clip.unwrap();
        assert_eq!(clip.scale, Point { x: 0.5, y: 0.5 });
        assert_eq!(clip.transform.x, 0.5);

        let material = assembly.document.materials.get(&images.segments[0].material_id).unwrap();
        assert_eq!(material.kind(), MaterialKind::Video);
        let value = serde_json::to_value(material).unwrap();
        assert_eq!(value["type"], "photo");
        assert_eq!(value["material_name"], "cover.png");
        assert_eq!(assembly.document.duration(), 5 * SEC);
    }

    #[test]
    fn caption_bubble_and_effect_are_referenced() {
        let mut request = DraftRequest::named("bubble");
        request.texts = vec![
            TextItem {
                bubble: Some("对话框".into()),
                effect: Some("霓虹".into()),
                ..TextItem::new("hi")
            },
            TextItem { bubble: Some("no such".into()), ..TextItem::new("plain") },
        ];
        let assembly = assembler().assemble(&request).unwrap();

        let track = assembly.document.track(TrackKind::Text, "text").unwrap();
        let kinds: Vec<String> = track.segments[0]
            .extra_refs
            .iter()
            .map(|id| {
                let material = assembly.document.materials.get(id).unwrap();
                serde_json::to_value(material).unwrap()["type"].as_str().unwrap().to_string()
            })
            .collect();
        assert_eq!(kinds, vec!["text_shape", "text_effect"]);
        assert!(track.segments[1].extra_refs.is_empty());
        assert_eq!(assembly.report.warnings.len(), 1);
        assert!(assembly.report.warnings[0].message.contains("no such"));

        let content = assembly.document.to_value().unwrap();
        assert_eq!(content["materials"]["effects"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn mosaics_auto_advance_on_the_effect_track() {
        let mut request = DraftRequest::named("mosaic");
        request.mosaics = vec![
            MosaicItem {
                region: [0.1, 0.1, 0.5, 0.5],
                start: Some("3s".into()),
                duration: Some("2s".into()),
            },
            MosaicItem {
                region: [0.2, 0.2, 0.4, 0.4],
                start: Some("4s".into()),
                duration: Some("2s".into()),
            },
        ];
        let assembly = assembler().assemble(&request).unwrap();
        let track = assembly.document.track(TrackKind::Effect, EFFECT_TRACK).unwrap();
        let starts: Vec<u64> = track.segments.iter().map(|s| s.target_range.start).collect();
        assert_eq!(starts, vec![3 * SEC, 5 * SEC]);
    }
}
