/// Backend failure taxonomy. Every error aborts the current invocation and
/// is surfaced to the caller; nothing is retried or recovered locally, and
/// no partial output is written on failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenError {
    /// A status message is malformed, or an assumption about the shape of
    /// the checked AST does not hold.
    BadSourceForm(String),
    /// The struct topological sort reported a cycle.
    CyclicStructs,
    /// A language feature the backend does not yet implement.
    Unsupported(String),
    /// Statement nesting exceeds `ast::MAX_BODY_DEPTH`.
    BodyTooDeep,
    /// Expression nesting exceeds `ast::MAX_EXPR_DEPTH`.
    ExprTooDeep,
    /// An if/else-if chain nests more than 1,000 deep.
    TooDeep,
    /// A function contains more than 1,000,000 break/continue targets.
    TooManyJumpTargets,
    /// A function requires more than `codegen::MAX_TEMP` hoisted temporaries.
    TooManyTemporaries,
    /// A type nests more than `c_types::MAX_NUM_POINTERS` pointers.
    TooManyPointers(String),
    /// An internal bookkeeping invariant was violated.
    InternalInvariant(String),
    /// The external C formatter could not be spawned or exited non-zero.
    FormatterFailed(String),
}

impl std::fmt::Display for GenError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GenError::BadSourceForm(msg) => write!(f, "bad source form: {msg}"),
            GenError::CyclicStructs => write!(f, "cyclical struct definitions"),
            GenError::Unsupported(msg) => write!(f, "unsupported: {msg}"),
            GenError::BodyTooDeep => write!(f, "body recursion depth too large"),
            GenError::ExprTooDeep => write!(f, "expression recursion depth too large"),
            GenError::TooDeep => write!(f, "too many nested if's"),
            GenError::TooManyJumpTargets => write!(f, "too many jump targets"),
            GenError::TooManyTemporaries => {
                write!(f, "too many temporary variables required")
            }
            GenError::TooManyPointers(t) => {
                write!(f, "cannot convert type \"{t}\" to C: too many ptr's")
            }
            GenError::InternalInvariant(msg) => write!(f, "internal error: {msg}"),
            GenError::FormatterFailed(msg) => write!(f, "C formatter failed: {msg}"),
        }
    }
}

impl std::error::Error for GenError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages() {
        assert_eq!(
            GenError::CyclicStructs.to_string(),
            "cyclical struct definitions"
        );
        assert_eq!(GenError::TooDeep.to_string(), "too many nested if's");
        assert_eq!(
            GenError::TooManyPointers("ptr ptr u8".to_string()).to_string(),
            "cannot convert type \"ptr ptr u8\" to C: too many ptr's"
        );
    }
}
