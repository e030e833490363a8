//! Scene catalogs and export sinks

pub mod catalog;
pub mod manifest;
pub mod export;
#[cfg(feature = "gdal")]
pub mod local;

pub use catalog::{CatalogQuery, InMemoryCatalog, SceneCatalog};
pub use manifest::CatalogManifest;
pub use export::{ExportReceipt, ExportRequest, Exporter};
#[cfg(feature = "gdal")]
pub use export::GeoTiffExporter;
#[cfg(feature = "gdal")]
pub use local::LocalCatalog;
