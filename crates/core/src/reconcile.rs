// Merges an assembled document into a template's content tree and repairs
// dangling references so the result always loads.

use std::collections::{HashMap, HashSet};

use serde::Serialize;
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};

use crate::catalog::{AssetCatalog, AssetCategory, AssetDescriptor};
use crate::document::{
    random_hex, random_mac, Canvas, Document, CONTENT_VERSION, LEGACY_NEW_VERSION,
};
use crate::error::DraftError;
use crate::material::{
    AnimationSet, AssetMaterial, FadeMaterial, Material, MaterialKind, MaterialPayload,
    TextMaterial, TextStyle,
};

/// Compatibility values forced onto documents for the legacy consumer.
#[derive(Debug, Clone, PartialEq)]
pub struct LegacyProfile {
    pub version: u64,
    pub new_version: String,
    pub canvas: Canvas,
    pub color_space: i64,
    pub app_id: u32,
    pub app_version: String,
    pub os: String,
    pub os_version: String,
    pub app_source: String,
    /// Material collections the legacy consumer fails to parse.
    pub denylist: Vec<String>,
}

impl Default for LegacyProfile {
    fn default() -> Self {
        Self {
            version: CONTENT_VERSION,
            new_version: LEGACY_NEW_VERSION.to_string(),
            canvas: Canvas::new(1920, 1080),
            color_space: 0,
            app_id: 3704,
            app_version: "3.1.0-beta7".to_string(),
            os: "mac".to_string(),
            os_version: "15.4.1".to_string(),
            app_source: "lv".to_string(),
            denylist: [
                "ai_translates",
                "digital_humans",
                "flowers",
                "green_screens",
                "log_color_wheels",
                "manual_deformations",
                "material_colors",
                "multi_language_refs",
                "plugin_effects",
                "primary_color_wheels",
                "shapes",
                "smart_crops",
                "smart_relights",
                "time_marks",
                "vocal_beautifys",
                "vocal_separations",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Repair {
    pub segment_id: String,
    pub material_id: String,
    pub collection: String,
    pub action: RepairAction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RepairAction {
    /// Pulled from the assembler's pending side list.
    FromPending,
    /// Replaced by a default material of the expected kind.
    Synthesized,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DanglingRef {
    pub track_type: String,
    pub segment_id: String,
    pub material_id: String,
}

#[derive(Debug, Clone)]
pub struct Reconciled {
    pub content: Value,
    pub repairs: Vec<Repair>,
}

pub struct SchemaReconciler<'a> {
    profile: LegacyProfile,
    catalog: &'a AssetCatalog,
}

impl<'a> SchemaReconciler<'a> {
    pub fn new(profile: LegacyProfile, catalog: &'a AssetCatalog) -> Self {
        Self { profile, catalog }
    }

    /// Merge `produced` into a parsed copy of `template`.
    ///
    /// Tracks, duration and every produced material collection replace the
    /// template's; anything else in the template is kept untouched.
    pub fn merge(
        &self,
        produced: &Document,
        pending: &[Material],
        template: &[u8],
        legacy: bool,
    ) -> Result<Reconciled, DraftError> {
        let mut content: Value = serde_json::from_slice(template).map_err(|err| {
            DraftError::SchemaMergeFailure(format!("template is not valid JSON: {err}"))
        })?;
        require_shape(&content)?;
        let produced_value = produced.to_value()?;

        let root = as_object_mut(&mut content)?;
        root.insert("tracks".into(), produced_value["tracks"].clone());
        root.insert("duration".into(), produced_value["duration"].clone());
        if !root.contains_key("id") {
            root.insert("id".into(), produced_value["id"].clone());
        }
        if let Some(collections) = produced_value["materials"].as_object() {
            let materials = materials_mut(root)?;
            for (collection, list) in collections {
                materials.insert(collection.clone(), list.clone());
            }
        }

        if legacy {
            self.force_legacy(root, &produced.id);
        } else {
            root.insert("canvas_config".into(), produced_value["canvas_config"].clone());
            root.insert("fps".into(), produced_value["fps"].clone());
        }

        let repairs = self.repair(root, pending)?;

        if legacy {
            inline_legacy_fields(root);
        }

        info!(
            legacy,
            repairs = repairs.len(),
            tracks = produced.tracks.len(),
            duration = produced.duration(),
            "document merged into template"
        );
        Ok(Reconciled { content, repairs })
    }

    fn force_legacy(&self, root: &mut Map<String, Value>, draft_id: &str) {
        let profile = &self.profile;
        root.insert("id".into(), Value::String(draft_id.to_string()));
        root.insert("version".into(), json!(profile.version));
        root.insert("new_version".into(), json!(profile.new_version));
        root.insert(
            "canvas_config".into(),
            json!({
                "width": profile.canvas.width,
                "height": profile.canvas.height,
                "ratio": profile.canvas.ratio,
            }),
        );
        root.insert("color_space".into(), json!(profile.color_space));

        // Device identity comes from the template when it has one.
        let previous = root.get("platform").and_then(Value::as_object);
        let keep = |key: &str, fallback: String| {
            previous
                .and_then(|platform| platform.get(key))
                .and_then(Value::as_str)
                .filter(|value| !value.is_empty())
                .map(String::from)
                .unwrap_or(fallback)
        };
        let platform = json!({
            "app_id": profile.app_id,
            "app_source": keep("app_source", profile.app_source.clone()),
            "app_version": profile.app_version,
            "device_id": keep("device_id", random_hex(16)),
            "hard_disk_id": keep("hard_disk_id", random_hex(16)),
            "mac_address": keep("mac_address", random_mac()),
            "os": profile.os,
            "os_version": profile.os_version,
        });
        root.insert("last_modified_platform".into(), platform.clone());
        root.insert("platform".into(), platform);

        if !root.contains_key("keyframes") {
            let empty: Map<String, Value> = [
                "adjusts",
                "audios",
                "effects",
                "filters",
                "handwrites",
                "stickers",
                "texts",
                "videos",
            ]
            .into_iter()
            .map(|key| (key.to_string(), Value::Array(Vec::new())))
            .collect();
            root.insert("keyframes".into(), Value::Object(empty));
        }

        if let Some(materials) = root.get_mut("materials").and_then(Value::as_object_mut) {
            for collection in &profile.denylist {
                if materials.remove(collection).is_some() {
                    debug!(%collection, "removed collection unsupported by legacy format");
                }
            }
            if let Some(texts) = materials.get_mut("texts").and_then(Value::as_array_mut) {
                texts.iter_mut().for_each(flatten_text);
            }
        }
    }

    /// Make every segment reference resolve: first from `pending`, then by
    /// synthesizing a default of the kind the track implies.
    fn repair(
        &self,
        root: &mut Map<String, Value>,
        pending: &[Material],
    ) -> Result<Vec<Repair>, DraftError> {
        let dangling = dangling_in(root);
        if dangling.is_empty() {
            return Ok(Vec::new());
        }

        let pending: HashMap<&str, &Material> =
            pending.iter().map(|material| (material.id.as_str(), material)).collect();
        let materials = materials_mut(root)?;
        let mut repairs = Vec::new();
        let mut repaired: HashSet<String> = HashSet::new();

        for reference in dangling {
            if !repaired.insert(reference.material_id.clone()) {
                continue;
            }
            let (material, action) = match pending.get(reference.material_id.as_str()) {
                Some(material) => ((*material).clone(), RepairAction::FromPending),
                None => {
                    let material = self.synthesize(&reference)?;
                    warn!(
                        segment = %reference.segment_id,
                        material = %reference.material_id,
                        kind = %material.kind(),
                        "dangling reference replaced with a default material"
                    );
                    (material, RepairAction::Synthesized)
                }
            };
            let collection = material.kind().collection().to_string();
            let value = serde_json::to_value(&material)
                .map_err(|err| DraftError::SchemaMergeFailure(err.to_string()))?;
            push_material(materials, &collection, value);
            repairs.push(Repair {
                segment_id: reference.segment_id,
                material_id: reference.material_id,
                collection,
                action,
            });
        }
        Ok(repairs)
    }

    fn synthesize(&self, reference: &DanglingReference) -> Result<Material, DraftError> {
        let id = reference.material_id.clone();
        let payload = match (reference.track_type.as_str(), reference.primary) {
            ("effect", true) => MaterialPayload::Effect(self.default_asset(AssetCategory::Effects)),
            ("filter", true) => {
                let mut filter = self.default_asset(AssetCategory::Filters);
                filter.value = Some(1.0);
                MaterialPayload::Filter(filter)
            }
            ("text", true) => MaterialPayload::TextStyle(TextMaterial {
                content: String::new(),
                font: String::new(),
                style: TextStyle::default(),
            }),
            (_, true) => {
                return Err(DraftError::SchemaMergeFailure(format!(
                    "{} segment {} references missing media material {}",
                    reference.track_type, reference.segment_id, reference.material_id
                )))
            }
            ("video", false) => {
                MaterialPayload::VideoEffect(self.default_asset(AssetCategory::VideoEffects))
            }
            ("audio", false) => {
                MaterialPayload::Fade(FadeMaterial { fade_in_duration: 0, fade_out_duration: 0 })
            }
            (_, false) => MaterialPayload::Animation(AnimationSet::default()),
        };
        Ok(Material::with_id(id, payload))
    }

    fn default_asset(&self, category: AssetCategory) -> AssetMaterial {
        let descriptor =
            self.catalog.default_for(category).cloned().unwrap_or_else(|| fallback(category));
        let adjust_params = self
            .catalog
            .table(category)
            .map(|table| table.adjust_params.clone())
            .unwrap_or_default();
        AssetMaterial {
            name: descriptor.name,
            resource_id: descriptor.resource_id,
            effect_id: descriptor.effect_id,
            duration: descriptor.duration,
            value: None,
            adjust_params,
        }
    }
}

/// Built-in defaults for catalogs that carry none.
fn fallback(category: AssetCategory) -> AssetDescriptor {
    let (name, resource_id, effect_id) = match category {
        AssetCategory::Filters => ("中性", "1001", "1001"),
        AssetCategory::VideoEffects => ("负片频闪", "7153575555554611720", "5155369"),
        _ => ("胶片闪切", "7207212289348166686", "7207212289348166686"),
    };
    AssetDescriptor {
        name: name.to_string(),
        resource_id: resource_id.to_string(),
        effect_id: effect_id.to_string(),
        duration: None,
    }
}

/// Every segment reference in `content` that no material collection holds.
pub fn dangling_refs(content: &Value) -> Vec<DanglingRef> {
    content
        .as_object()
        .map(dangling_in)
        .unwrap_or_default()
        .into_iter()
        .map(|reference| DanglingRef {
            track_type: reference.track_type,
            segment_id: reference.segment_id,
            material_id: reference.material_id,
        })
        .collect()
}

struct DanglingReference {
    track_type: String,
    segment_id: String,
    material_id: String,
    primary: bool,
}

fn dangling_in(root: &Map<String, Value>) -> Vec<DanglingReference> {
    let known = material_ids(root);
    let mut dangling = Vec::new();
    for track in root.get("tracks").and_then(Value::as_array).into_iter().flatten() {
        let track_type = track.get("type").and_then(Value::as_str).unwrap_or_default();
        for segment in track.get("segments").and_then(Value::as_array).into_iter().flatten() {
            let segment_id = segment.get("id").and_then(Value::as_str).unwrap_or_default();
            let primary = segment.get("material_id").and_then(Value::as_str).map(|id| (id, true));
            let extras = segment
                .get("extra_material_refs")
                .and_then(Value::as_array)
                .into_iter()
                .flatten()
                .filter_map(Value::as_str)
                .map(|id| (id, false));
            for (material_id, primary) in primary.into_iter().chain(extras) {
                if !material_id.is_empty() && !known.contains(material_id) {
                    dangling.push(DanglingReference {
                        track_type: track_type.to_string(),
                        segment_id: segment_id.to_string(),
                        material_id: material_id.to_string(),
                        primary,
                    });
                }
            }
        }
    }
    dangling
}

fn material_ids(root: &Map<String, Value>) -> HashSet<String> {
    root.get("materials")
        .and_then(Value::as_object)
        .into_iter()
        .flat_map(|materials| materials.values())
        .filter_map(Value::as_array)
        .flatten()
        .filter_map(|material| material.get("id").and_then(Value::as_str))
        .map(String::from)
        .collect()
}

fn push_material(materials: &mut Map<String, Value>, collection: &str, value: Value) {
    let list = materials.entry(collection.to_string()).or_insert_with(|| Value::Array(Vec::new()));
    if !list.is_array() {
        *list = Value::Array(Vec::new());
    }
    if let Some(list) = list.as_array_mut() {
        list.push(value);
    }
}

/// Legacy text materials hold plain text, not the `{"text": ..}` JSON form.
fn flatten_text(material: &mut Value) {
    let Some(material) = material.as_object_mut() else {
        return;
    };
    let flattened = material
        .get("content")
        .and_then(Value::as_str)
        .and_then(|content| serde_json::from_str::<Value>(content).ok())
        .and_then(|parsed| parsed.get("text").and_then(Value::as_str).map(String::from));
    if let Some(text) = flattened {
        material.insert("content".into(), Value::String(text));
    }
    material.insert("content_format".into(), json!(0));
}

/// Derive the inline `transition`/`animation`/`text_animation` fields legacy
/// consumers read from the segment's referenced materials.
fn inline_legacy_fields(root: &mut Map<String, Value>) {
    let mut by_id: HashMap<String, Value> = HashMap::new();
    for (collection, list) in root.get("materials").and_then(Value::as_object).into_iter().flatten() {
        if !matches!(
            MaterialKind::from_collection(collection),
            Some(MaterialKind::Transition | MaterialKind::Animation)
        ) {
            continue;
        }
        for material in list.as_array().into_iter().flatten() {
            if let Some(id) = material.get("id").and_then(Value::as_str) {
                by_id.insert(id.to_string(), material.clone());
            }
        }
    }
    if by_id.is_empty() {
        return;
    }

    let Some(tracks) = root.get_mut("tracks").and_then(Value::as_array_mut) else {
        return;
    };
    for track in tracks {
        let track_type = track.get("type").and_then(Value::as_str).unwrap_or_default().to_string();
        let Some(segments) = track.get_mut("segments").and_then(Value::as_array_mut) else {
            continue;
        };
        for segment in segments.iter_mut().filter_map(Value::as_object_mut) {
            let refs: Vec<String> = segment
                .get("extra_material_refs")
                .and_then(Value::as_array)
                .into_iter()
                .flatten()
                .filter_map(Value::as_str)
                .map(String::from)
                .collect();
            for id in refs {
                let Some(material) = by_id.get(&id) else {
                    continue;
                };
                inline_one(segment, &track_type, &id, material);
            }
        }
    }
}

fn inline_one(segment: &mut Map<String, Value>, track_type: &str, id: &str, material: &Value) {
    let kind = material.get("type").and_then(Value::as_str).unwrap_or_default();
    let first_animation =
        || material.get("animations").and_then(Value::as_array).and_then(|list| list.first());
    let field = match (kind, track_type) {
        ("transition", _) => Some((
            "transition",
            json!({
                "id": id,
                "name": material.get("name").cloned().unwrap_or(Value::Null),
                "resource_id": material.get("resource_id").cloned().unwrap_or(Value::Null),
                "duration": material.get("duration").cloned().unwrap_or(json!(0)),
            }),
        )),
        ("sticker_animation", "text") => first_animation().map(|animation| {
            (
                "text_animation",
                json!({
                    "id": id,
                    "type": animation.get("type").cloned().unwrap_or(json!("out")),
                    "duration": animation.get("duration").cloned().unwrap_or(json!(0)),
                }),
            )
        }),
        ("sticker_animation", _) => first_animation().map(|animation| {
            (
                "animation",
                json!({
                    "id": id,
                    "name": animation.get("name").cloned().unwrap_or(Value::Null),
                    "resource_id": animation.get("resource_id").cloned().unwrap_or(Value::Null),
                    "duration": animation.get("duration").cloned().unwrap_or(json!(0)),
                }),
            )
        }),
        _ => None,
    };
    if let Some((key, value)) = field {
        if segment.get(key).map_or(true, Value::is_null) {
            segment.insert(key.to_string(), value);
        }
    }
}

fn require_shape(content: &Value) -> Result<(), DraftError> {
    let Some(root) = content.as_object() else {
        return Err(DraftError::SchemaMergeFailure("template root is not an object".into()));
    };
    if !root.get("materials").is_some_and(Value::is_object) {
        return Err(DraftError::SchemaMergeFailure("template has no `materials` object".into()));
    }
    if !root.get("tracks").is_some_and(Value::is_array) {
        return Err(DraftError::SchemaMergeFailure("template has no `tracks` array".into()));
    }
    Ok(())
}

fn as_object_mut(content: &mut Value) -> Result<&mut Map<String, Value>, DraftError> {
    content
        .as_object_mut()
        .ok_or_else(|| DraftError::SchemaMergeFailure("template root is not an object".into()))
}

fn materials_mut(root: &mut Map<String, Value>) -> Result<&mut Map<String, Value>, DraftError> {
    root.get_mut("materials")
        .and_then(Value::as_object_mut)
        .ok_or_else(|| DraftError::SchemaMergeFailure("template has no `materials` object".into()))
}
