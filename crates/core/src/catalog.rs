// Name → resource id tables for effects, filters, transitions, animations
// and caption decorations.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::error::DraftError;
use crate::material::AdjustParam;

const BUILTIN_CATALOG: &str = include_str!("../assets/catalog.json");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetCategory {
    VideoEffects,
    Effects,
    Filters,
    Transitions,
    VideoIntros,
    TextIntros,
    TextOutros,
    TextLoops,
    TextBubbles,
    TextEffects,
}

impl AssetCategory {
    pub const ALL: [AssetCategory; 10] = [
        AssetCategory::VideoEffects,
        AssetCategory::Effects,
        AssetCategory::Filters,
        AssetCategory::Transitions,
        AssetCategory::VideoIntros,
        AssetCategory::TextIntros,
        AssetCategory::TextOutros,
        AssetCategory::TextLoops,
        AssetCategory::TextBubbles,
        AssetCategory::TextEffects,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::VideoEffects => "video_effects",
            Self::Effects => "effects",
            Self::Filters => "filters",
            Self::Transitions => "transitions",
            Self::VideoIntros => "video_intros",
            Self::TextIntros => "text_intros",
            Self::TextOutros => "text_outros",
            Self::TextLoops => "text_loops",
            Self::TextBubbles => "text_bubbles",
            Self::TextEffects => "text_effects",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|category| category.as_str() == name)
    }
}

impl fmt::Display for AssetCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetDescriptor {
    pub name: String,
    pub resource_id: String,
    pub effect_id: String,
    /// Natural length in microseconds (transitions, animations).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CategoryTable {
    /// Entry substituted for unknown names. Without one, unknown names are skipped.
    #[serde(default)]
    pub default: Option<String>,
    #[serde(default)]
    pub category_id: Option<String>,
    #[serde(default)]
    pub category_name: Option<String>,
    /// Adjust parameters every material of this category starts with.
    #[serde(default)]
    pub adjust_params: Vec<AdjustParam>,
    #[serde(default)]
    pub entries: Vec<AssetDescriptor>,
}

impl CategoryTable {
    pub fn lookup(&self, name: &str) -> Option<&AssetDescriptor> {
        self.entries.iter().find(|entry| entry.name == name)
    }

    pub fn default_entry(&self) -> Option<&AssetDescriptor> {
        self.default.as_deref().and_then(|name| self.lookup(name))
    }
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("catalog is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("default `{name}` of {category} has no entry")]
    MissingDefault { category: AssetCategory, name: String },
}

/// The outcome of a name lookup that may fall back to the category default.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved<'a> {
    pub descriptor: &'a AssetDescriptor,
    /// The requested name when the default stood in for it.
    pub substituted_for: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetCatalog {
    tables: BTreeMap<AssetCategory, CategoryTable>,
}

impl AssetCatalog {
    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        let catalog: Self = serde_json::from_str(json)?;
        for (category, table) in &catalog.tables {
            if let Some(name) = &table.default {
                if table.lookup(name).is_none() {
                    return Err(CatalogError::MissingDefault {
                        category: *category,
                        name: name.clone(),
                    });
                }
            }
        }
        Ok(catalog)
    }

    /// The sample catalog compiled into the crate.
    pub fn builtin() -> Self {
        // The bundled file is covered by `builtin_catalog_parses`.
        Self::from_json(BUILTIN_CATALOG).unwrap_or_default()
    }

    pub fn table(&self, category: AssetCategory) -> Option<&CategoryTable> {
        self.tables.get(&category)
    }

    pub fn lookup(&self, category: AssetCategory, name: &str) -> Option<&AssetDescriptor> {
        self.table(category).and_then(|table| table.lookup(name))
    }

    pub fn default_for(&self, category: AssetCategory) -> Option<&AssetDescriptor> {
        self.table(category).and_then(CategoryTable::default_entry)
    }

    /// Look `name` up, substituting the category default when it is unknown.
    /// Fails with `UnknownAssetName` only when the category has no default.
    pub fn resolve(&self, category: AssetCategory, name: &str) -> Result<Resolved<'_>, DraftError> {
        if let Some(descriptor) = self.lookup(category, name) {
            return Ok(Resolved { descriptor, substituted_for: None });
        }
        match self.default_for(category) {
            Some(descriptor) => {
                warn!(%category, requested = name, substitute = %descriptor.name, "unknown asset, using default");
                Ok(Resolved { descriptor, substituted_for: Some(name.to_string()) })
            }
            None => Err(DraftError::UnknownAssetName { category, name: name.to_string() }),
        }
    }

    pub fn categories(&self) -> impl Iterator<Item = (AssetCategory, &CategoryTable)> {
        self.tables.iter().map(|(category, table)| (*category, table))
    }
}
