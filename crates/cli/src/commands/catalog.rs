// `cutdraft catalog`: list asset catalog entries.

use anyhow::anyhow;
use clap::Args;
use serde::Serialize;

use cutdraft_core::catalog::{AssetCatalog, AssetCategory, AssetDescriptor};

use crate::commands::load_catalog;
use crate::config::GlobalConfig;
use crate::output::{self, OutputFormat};

#[derive(Debug, Args)]
pub struct CatalogArgs {
    /// Only this category (e.g. `filters`, `text_intros`).
    category: Option<String>,
    /// Force JSON output.
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct CatalogListing {
    pub categories: Vec<CategoryListing>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CategoryListing {
    pub category: AssetCategory,
    pub default: Option<String>,
    pub entries: Vec<AssetDescriptor>,
}

pub fn run(args: CatalogArgs, config: &GlobalConfig) -> anyhow::Result<()> {
    let format = OutputFormat::detect(args.json);
    let result = load_catalog(config).and_then(|catalog| listing(&catalog, args.category.as_deref()));
    match result {
        Ok(listing) => {
            output::print_output(format, &listing, format_human)?;
            Ok(())
        }
        Err(e) => {
            output::print_anyhow_error(format, &e);
            Err(e)
        }
    }
}

fn listing(catalog: &AssetCatalog, category: Option<&str>) -> anyhow::Result<CatalogListing> {
    let wanted = match category {
        Some(name) => Some(AssetCategory::parse(name).ok_or_else(|| {
            let known: Vec<&str> = AssetCategory::ALL.iter().map(|c| c.as_str()).collect();
            anyhow!("unknown category `{name}`; expected one of {}", known.join(", "))
        })?),
        None => None,
    };
    let categories = catalog
        .categories()
        .filter(|(category, _)| wanted.map_or(true, |w| w == *category))
        .map(|(category, table)| CategoryListing {
            category,
            default: table.default.clone(),
            entries: table.entries.clone(),
        })
        .collect();
    Ok(CatalogListing { categories })
}

fn format_human(listing: &CatalogListing) -> String {
    if listing.categories.is_empty() {
        return "Catalog is empty.".into();
    }
    let mut lines = Vec::new();
    for category in &listing.categories {
        lines.push(format!("{} ({})", category.category, category.entries.len()));
        for entry in &category.entries {
            let marker = if category.default.as_deref() == Some(entry.name.as_str()) {
                " (default)"
            } else {
                ""
            };
            lines.push(format!("  {}  {}{marker}", entry.name, entry.resource_id));
        }
    }
    lines.join("\n")
}
