// cutdraft-core: draft document model, assembly, and template reconciliation.

pub mod assembler;
pub mod catalog;
pub mod document;
pub mod error;
pub mod manager;
pub mod material;
pub mod meta;
pub mod reconcile;
pub mod request;
pub mod segment;
pub mod source;
pub mod subtitle;
pub mod text;
pub mod time;
pub mod track;

pub use error::DraftError;
