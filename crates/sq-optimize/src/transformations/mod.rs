pub mod ast_to_hir;
pub mod hir_to_ir;
