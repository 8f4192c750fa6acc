// In-memory registry of drafts being built up item by item.

use std::collections::HashMap;

use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use crate::assembler::{Assembly, DraftAssembler};
use crate::document::Canvas;
use crate::error::DraftError;
use crate::request::{
    AudioItem, DraftRequest, ImageItem, TextItem, TextTrackSpec, VideoItem, DEFAULT_TEXT_TRACK,
};
use crate::time::TimeRange;
use crate::track::TrackKind;

struct ManagedDraft {
    request: DraftRequest,
    /// Last assembly; cleared whenever the request changes.
    assembly: Option<Assembly>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DraftSummary {
    pub id: Uuid,
    pub name: String,
    pub items: usize,
    /// Duration of the last assembly in microseconds; 0 if never assembled.
    pub duration: u64,
}

/// A segment of the last assembly that covers a queried instant.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimelineHit {
    pub kind: TrackKind,
    pub track: String,
    pub segment_id: String,
    pub material_id: String,
    pub range: TimeRange,
}

/// Owns every draft a caller is working on, keyed by generated id.
#[derive(Default)]
pub struct DraftManager {
    drafts: HashMap<Uuid, ManagedDraft>,
}

impl DraftManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&mut self, name: impl Into<String>, canvas: Canvas) -> Uuid {
        let id = Uuid::new_v4();
        let request = DraftRequest { canvas: Some(canvas), ..DraftRequest::named(name) };
        debug!(%id, name = %request.draft_name, "draft created");
        self.drafts.insert(id, ManagedDraft { request, assembly: None });
        id
    }

    pub fn get(&self, id: Uuid) -> Result<&DraftRequest, DraftError> {
        self.entry(id).map(|draft| &draft.request)
    }

    /// Mutable access to the request. Any previous assembly is discarded.
    pub fn get_mut(&mut self, id: Uuid) -> Result<&mut DraftRequest, DraftError> {
        let draft = self.entry_mut(id)?;
        draft.assembly = None;
        Ok(&mut draft.request)
    }

    pub fn remove(&mut self, id: Uuid) -> Result<DraftRequest, DraftError> {
        self.drafts.remove(&id).map(|draft| draft.request).ok_or(DraftError::DraftNotFound(id))
    }

    pub fn contains(&self, id: Uuid) -> bool {
        self.drafts.contains_key(&id)
    }

    /// Summaries ordered by name, then id.
    pub fn list(&self) -> Vec<DraftSummary> {
        let mut summaries: Vec<DraftSummary> = self
            .drafts
            .iter()
            .map(|(id, draft)| DraftSummary {
                id: *id,
                name: draft.request.draft_name.clone(),
                items: draft.request.item_count(),
                duration: draft.assembly.as_ref().map_or(0, |a| a.document.duration()),
            })
            .collect();
        summaries.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        summaries
    }

    // ── Items ──────────────────────────────────────────────────────

    pub fn add_video(&mut self, id: Uuid, item: VideoItem) -> Result<(), DraftError> {
        self.get_mut(id)?.videos.push(item);
        Ok(())
    }

    /// Replace the video at `index`, returning the old one.
    pub fn update_video(
        &mut self,
        id: Uuid,
        index: usize,
        item: VideoItem,
    ) -> Result<VideoItem, DraftError> {
        self.edit(id, |request| replace_at(id, "videos", &mut request.videos, index, item))
    }

    pub fn remove_video(&mut self, id: Uuid, index: usize) -> Result<VideoItem, DraftError> {
        self.edit(id, |request| remove_at(id, "videos", &mut request.videos, index))
    }

    pub fn add_audio(&mut self, id: Uuid, item: AudioItem) -> Result<(), DraftError> {
        self.get_mut(id)?.audios.push(item);
        Ok(())
    }

    pub fn update_audio(
        &mut self,
        id: Uuid,
        index: usize,
        item: AudioItem,
    ) -> Result<AudioItem, DraftError> {
        self.edit(id, |request| replace_at(id, "audios", &mut request.audios, index, item))
    }

    pub fn remove_audio(&mut self, id: Uuid, index: usize) -> Result<AudioItem, DraftError> {
        self.edit(id, |request| remove_at(id, "audios", &mut request.audios, index))
    }

    pub fn add_image(&mut self, id: Uuid, item: ImageItem) -> Result<(), DraftError> {
        self.get_mut(id)?.images.push(item);
        Ok(())
    }

    pub fn remove_image(&mut self, id: Uuid, index: usize) -> Result<ImageItem, DraftError> {
        self.edit(id, |request| remove_at(id, "images", &mut request.images, index))
    }

    /// Add a caption to the named text track, creating the track with the
    /// next relative index on first use.
    pub fn add_text(&mut self, id: Uuid, track: &str, item: TextItem) -> Result<(), DraftError> {
        let request = self.get_mut(id)?;
        match request.text_tracks.iter_mut().find(|spec| spec.name == track) {
            Some(spec) => spec.texts.push(item),
            None => {
                let relative_index = request.text_tracks.len() as i32 + 1;
                request.text_tracks.push(TextTrackSpec {
                    name: track.to_string(),
                    relative_index: Some(relative_index),
                    texts: vec![item],
                });
            }
        }
        Ok(())
    }

    pub fn update_text(
        &mut self,
        id: Uuid,
        track: &str,
        index: usize,
        item: TextItem,
    ) -> Result<TextItem, DraftError> {
        self.edit(id, |request| {
            let texts = texts_mut(request, track)?;
            replace_at(id, &format!("texts[{track}]"), texts, index, item)
        })
    }

    /// Remove a caption. The track itself stays, even when emptied.
    pub fn remove_text(
        &mut self,
        id: Uuid,
        track: &str,
        index: usize,
    ) -> Result<TextItem, DraftError> {
        self.edit(id, |request| {
            let texts = texts_mut(request, track)?;
            remove_at(id, &format!("texts[{track}]"), texts, index)
        })
    }

    /// Segments of the last assembly covering `at` microseconds.
    pub fn items_at(&self, id: Uuid, at: u64) -> Result<Vec<TimelineHit>, DraftError> {
        let assembly = self.entry(id)?.assembly.as_ref().ok_or(DraftError::NotAssembled(id))?;
        Ok(assembly
            .document
            .segments_at(at)
            .map(|(track, segment)| TimelineHit {
                kind: track.kind,
                track: track.name.clone(),
                segment_id: segment.id.clone(),
                material_id: segment.material_id.clone(),
                range: segment.target_range,
            })
            .collect())
    }

    /// Assemble the draft and keep the result for later retrieval.
    pub fn assemble(&mut self, id: Uuid, assembler: &DraftAssembler) -> Result<&Assembly, DraftError> {
        let draft = self.entry_mut(id)?;
        let assembly = assembler.assemble(&draft.request)?;
        Ok(draft.assembly.insert(assembly))
    }

    pub fn assembly(&self, id: Uuid) -> Result<Option<&Assembly>, DraftError> {
        self.entry(id).map(|draft| draft.assembly.as_ref())
    }

    /// Apply `change` to the request; the stored assembly is dropped only
    /// when the change succeeds.
    fn edit<T>(
        &mut self,
        id: Uuid,
        change: impl FnOnce(&mut DraftRequest) -> Result<T, DraftError>,
    ) -> Result<T, DraftError> {
        let draft = self.entry_mut(id)?;
        let result = change(&mut draft.request)?;
        draft.assembly = None;
        Ok(result)
    }

    fn entry(&self, id: Uuid) -> Result<&ManagedDraft, DraftError> {
        self.drafts.get(&id).ok_or(DraftError::DraftNotFound(id))
    }

    fn entry_mut(&mut self, id: Uuid) -> Result<&mut ManagedDraft, DraftError> {
        self.drafts.get_mut(&id).ok_or(DraftError::DraftNotFound(id))
    }
}

/// The caption list behind `track`: a named text track, or the flat
/// `texts` list for the default track name.
fn texts_mut<'a>(
    request: &'a mut DraftRequest,
    track: &str,
) -> Result<&'a mut Vec<TextItem>, DraftError> {
    if let Some(position) = request.text_tracks.iter().position(|spec| spec.name == track) {
        return Ok(&mut request.text_tracks[position].texts);
    }
    if track == DEFAULT_TEXT_TRACK {
        return Ok(&mut request.texts);
    }
    Err(DraftError::TrackNotFound { kind: TrackKind::Text, name: track.to_string() })
}

fn replace_at<T>(
    draft: Uuid,
    list: &str,
    items: &mut [T],
    index: usize,
    item: T,
) -> Result<T, DraftError> {
    match items.get_mut(index) {
        Some(slot) => Ok(std::mem::replace(slot, item)),
        None => Err(DraftError::ItemNotFound { draft, item: format!("{list}[{index}]") }),
    }
}

fn remove_at<T>(draft: Uuid, list: &str, items: &mut Vec<T>, index: usize) -> Result<T, DraftError> {
    if index >= items.len() {
        return Err(DraftError::ItemNotFound { draft, item: format!("{list}[{index}]") });
    }
    Ok(items.remove(index))
}
