//! Pipeline registry: filesystem-backed creation/listing/loading of
//! pipelines, and the in-process module-builder table that stands in for
//! dynamic module import.

mod error;
mod module_registry;
mod pipeline;
mod registry;

pub use error::RegistryError;
pub use module_registry::{ModuleBuilder, PipelineModuleRegistry};
pub use pipeline::{Pipeline, ProjectContext};
pub use registry::{PipelineRegistry, PipelineRegistrySummary, PipelineSummary, PipelineSummaryDetail};
