pub mod error;
pub mod realize;
pub mod transformations;

pub use realize::{EntityId, RealizationCache, RealizationKey, RealizedClass, RealizedFunction};
pub use transformations::ast_to_hir::Transformer;
pub use transformations::hir_to_ir::CodegenVisitor;
