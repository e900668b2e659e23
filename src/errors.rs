use itertools::Itertools;
use thiserror::Error; // Import the `Error` derive macro from the `thiserror` crate

// Define an enum to represent every way an evaluation can fail
#[derive(Debug, Error)] // Automatically implement `Debug` and `Error` traits for the enum
pub enum EvalError {
    // No resolver, property or method of the model could handle one segment of the path
    #[error("type [{model}] can't resolve the segment [{segment}] in {{{path}}}{}", at_file(.file))]
    Unresolved {
        path: String,
        segment: String,
        model: String,
        file: Option<String>,
    },

    // Every model of the context failed; one line per distinct failure
    #[error("there are several problems with the expression {{{path}}}{}{}", at_file(.file), bullet_list(.problems))]
    Several {
        path: String,
        problems: Vec<String>,
        file: Option<String>,
    },

    // A numeric or temporal literal (or the operation it drives) is unusable
    #[error("malformed literal in segment [{segment}]: {reason}")]
    Malformed { segment: String, reason: String },

    // A `$name` segment that no built-in variable provider accepts
    #[error("can't resolve the built-in variable {{${name}}}{}", at_file(.file))]
    UnknownVariable { name: String, file: Option<String> },

    // Syntax errors inside a single segment, e.g. an unbalanced argument list
    #[error("parse error: {0}")]
    Parse(String),

    // A region marker opened while another region is still open
    #[error("region {{{directive}}} starts while another region is still open")]
    NestedRegion { directive: String },

    // Template shapes the block machine cannot handle
    #[error("structural inconsistency: {0}")]
    Structure(String),
}

impl EvalError {
    /// True for the UnresolvedExpression family: nothing in the model context
    /// (or the variable registry) could produce a value for the path.
    pub fn is_unresolved(&self) -> bool {
        matches!(
            self,
            EvalError::Unresolved { .. } | EvalError::Several { .. } | EvalError::UnknownVariable { .. }
        )
    }

    pub(crate) fn malformed(segment: &str, reason: impl Into<String>) -> Self {
        EvalError::Malformed {
            segment: segment.to_string(),
            reason: reason.into(),
        }
    }
}

fn at_file(file: &Option<String>) -> String {
    match file {
        Some(name) => format!(" at file [{name}]"),
        None => String::new(),
    }
}

fn bullet_list(problems: &[String]) -> String {
    problems.iter().map(|p| format!("\n\t{p}")).join("")
}

// Type alias for results that use `EvalError` as the error type
pub type Result<T> = std::result::Result<T, EvalError>;
