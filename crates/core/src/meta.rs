// Field rules for the draft folder's meta files.

use serde_json::{json, Map, Value};

pub const META_INFO_FILE: &str = "draft_meta_info.json";
pub const META_FILE: &str = "draft_meta.json";
pub const CONTENT_FILE: &str = "draft_content.json";

/// Material type codes the legacy meta table lists, each with an empty value list.
const LEGACY_MATERIAL_TYPES: [u8; 7] = [0, 1, 2, 3, 6, 7, 8];

#[derive(Debug, Clone, PartialEq)]
pub struct MetaInfo {
    pub draft_id: String,
    pub draft_name: String,
    pub draft_fold_path: String,
    pub draft_root_path: String,
    /// Microseconds since the Unix epoch.
    pub created_us: i64,
    pub modified_us: i64,
    pub duration: u64,
    /// Set for legacy drafts; carries the forced `draft_new_version`.
    pub legacy_version: Option<String>,
}

/// Apply `info` to a parsed meta file. Fields the editor owns are kept.
pub fn update_meta(meta: &mut Value, info: &MetaInfo) {
    if !meta.is_object() {
        *meta = Value::Object(Map::new());
    }
    let Some(root) = meta.as_object_mut() else {
        return;
    };

    root.insert("draft_id".into(), json!(info.draft_id));
    root.insert("draft_name".into(), json!(info.draft_name));
    root.insert("draft_fold_path".into(), json!(info.draft_fold_path));
    root.insert("draft_root_path".into(), json!(info.draft_root_path));
    root.insert("tm_draft_create".into(), json!(info.created_us));
    root.insert("tm_draft_modified".into(), json!(info.modified_us));
    root.insert("tm_duration".into(), json!(info.duration));

    let Some(version) = &info.legacy_version else {
        return;
    };
    root.insert("draft_new_version".into(), json!(version));
    root.insert("draft_cloud_last_action_download".into(), json!(false));
    root.entry("draft_timeline_materials_size_").or_insert_with(|| json!(0));
    if !root.get("draft_materials").is_some_and(Value::is_array) {
        let table: Vec<Value> = LEGACY_MATERIAL_TYPES
            .iter()
            .map(|kind| json!({ "type": kind, "value": [] }))
            .collect();
        root.insert("draft_materials".into(), Value::Array(table));
    }
}

/// A fresh meta document for folders that ship without one.
pub fn new_meta(info: &MetaInfo) -> Value {
    let mut meta = Value::Object(Map::new());
    update_meta(&mut meta, info);
    meta
}
