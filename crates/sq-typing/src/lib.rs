pub mod unify;

pub use unify::{instance_name, is_generic, substitute, unify, Substitution, UnifyError};
