use sq_core::error::Error;
use sq_core::span::Span;
use sq_core::types::Type;
use sq_typing::UnifyError;

/// Converts a unification failure at `span` into a user-facing mismatch.
pub fn unify_error(span: Span, context: &str, err: UnifyError) -> Error {
    Error::type_mismatch(span, format!("{}: {}", context, err))
}

pub fn expected_type(span: Span, context: &str, expected: &Type, found: &Type) -> Error {
    Error::type_mismatch(
        span,
        format!("{}: expected `{}`, found `{}`", context, expected, found),
    )
}

pub fn argument_count(span: Span, what: &str, expected: usize, found: usize) -> Error {
    Error::arity(
        span,
        format!(
            "{} expects {} argument{}, found {}",
            what,
            expected,
            if expected == 1 { "" } else { "s" },
            found
        ),
    )
}

/// Returns a mismatch unless `found` is exactly `expected`.
pub fn ensure_type(span: Span, context: &str, expected: &Type, found: &Type) -> sq_core::Result<()> {
    if expected == found {
        Ok(())
    } else {
        Err(expected_type(span, context, expected, found))
    }
}
