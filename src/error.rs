//! Error Module for the Script Compiler
//!
//! Every failure in the pipeline is a `CompileError`. Low-level failures are
//! annotated at each compilation boundary with `ResultExt::context`, so the
//! rendered message reads from the outermost script down to the innermost cause.

use thiserror::Error;

// ═══════════════════════════════════════════════════════════════════════════════
// ERROR CODES
// ═══════════════════════════════════════════════════════════════════════════════

pub const ERR_MISSING_VALUE: &str = "SC-ERR-MISSING-001";
pub const ERR_MISSING_CODE: &str = "SC-ERR-MISSING-002";
pub const ERR_MISSING_PIPELINE: &str = "SC-ERR-MISSING-003";
pub const ERR_MISSING_RULES: &str = "SC-ERR-MISSING-004";
pub const ERR_MISSING_SEGMENTS: &str = "SC-ERR-MISSING-005";
pub const ERR_MISSING_PARAMETER_NAME: &str = "SC-ERR-MISSING-006";
pub const ERR_MISSING_FUNCTION_NAME: &str = "SC-ERR-MISSING-007";
pub const ERR_INVALID_PIPELINE_FORMAT: &str = "SC-ERR-PIPE-001";
pub const ERR_UNKNOWN_PIPE: &str = "SC-ERR-PIPE-002";
pub const ERR_DUPLICATE_PIPE: &str = "SC-ERR-PIPE-003";
pub const ERR_INVALID_PIPE_NAME: &str = "SC-ERR-PIPE-004";
pub const ERR_DUPLICATE_PARAMETER: &str = "SC-ERR-ARG-001";
pub const ERR_PARAMETER_NOT_FOUND: &str = "SC-ERR-ARG-002";
pub const ERR_MISSING_REQUIRED_PARAMETER_VALUE: &str = "SC-ERR-ARG-003";
pub const ERR_UNEXPECTED_PARAMETERS: &str = "SC-ERR-ARG-004";
pub const ERR_INVALID_PARAMETER_NAME: &str = "SC-ERR-ARG-005";
pub const ERR_FUNCTION_NOT_FOUND: &str = "SC-ERR-FUNC-001";
pub const ERR_DUPLICATE_FUNCTION: &str = "SC-ERR-FUNC-002";
pub const ERR_INVALID_FUNCTION_DEFINITION: &str = "SC-ERR-FUNC-003";
pub const ERR_CIRCULAR_FUNCTION_REFERENCE: &str = "SC-ERR-FUNC-004";
pub const ERR_DUPLICATE_CALL: &str = "SC-ERR-FUNC-005";
pub const ERR_INVALID_EXPRESSION: &str = "SC-ERR-EXPR-001";
pub const ERR_INVALID_SCRIPT_DEFINITION: &str = "SC-ERR-SCRIPT-001";
pub const ERR_UNKNOWN_RECOMMENDATION_LEVEL: &str = "SC-ERR-SCRIPT-002";
pub const ERR_CODE_VALIDATION_FAILURE: &str = "SC-ERR-CODE-001";
pub const ERR_UNKNOWN_VALIDATION_RULE: &str = "SC-ERR-CODE-002";
pub const ERR_DATA: &str = "SC-ERR-DATA-001";

// ═══════════════════════════════════════════════════════════════════════════════
// COMPILE ERROR
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Error)]
pub enum CompileError {
    #[error("missing value: {0}")]
    MissingValue(String),

    #[error("missing code")]
    MissingCode,

    #[error("missing pipeline")]
    MissingPipeline,

    #[error("missing rules")]
    MissingRules,

    #[error("missing segments")]
    MissingSegments,

    #[error("missing parameter name")]
    MissingParameterName,

    #[error("missing function name")]
    MissingFunctionName,

    #[error("pipeline \"{0}\" must start with \"|\"")]
    InvalidPipelineFormat(String),

    #[error("unknown pipe: \"{0}\"")]
    UnknownPipe(String),

    #[error("pipe name must be unique: \"{0}\"")]
    DuplicatePipe(String),

    #[error("pipe name must be camelCase: \"{0}\"")]
    InvalidPipeName(String),

    #[error("argument value for parameter \"{0}\" is already provided")]
    DuplicateParameter(String),

    #[error("parameter does not exist: \"{0}\"")]
    ParameterNotFound(String),

    #[error("Compilation resulted in empty value for required parameter: \"{0}\"")]
    MissingRequiredParameterValue(String),

    #[error(
        "Function \"{function}\" has unexpected parameter(s) provided: {unexpected}. Expected parameter(s): {expected}"
    )]
    UnexpectedParameters {
        function: String,
        unexpected: String,
        expected: String,
    },

    #[error("invalid parameter name: \"{0}\", only alphanumeric characters are allowed")]
    InvalidParameterName(String),

    #[error("called function is not defined: \"{0}\"")]
    FunctionNotFound(String),

    #[error("duplicate function name: {0}")]
    DuplicateFunction(String),

    #[error("{0}")]
    InvalidFunctionDefinition(String),

    #[error("circular function reference: {0}")]
    CircularFunctionReference(String),

    #[error("duplicate function calls: {0}")]
    DuplicateCall(String),

    #[error("{0}")]
    InvalidExpression(String),

    #[error("{0}")]
    InvalidScriptDefinition(String),

    #[error("unknown recommendation level: \"{0}\", expected one of: standard, strict")]
    UnknownRecommendationLevel(String),

    #[error("Errors with the code.\n{0}")]
    CodeValidationFailure(String),

    #[error("unknown validation rule: \"{0}\"")]
    UnknownValidationRule(String),

    #[error("invalid YAML data: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid JSON data: {0}")]
    Json(#[from] serde_json::Error),

    /// Renders the whole chain itself, so it exposes no `source()`.
    #[error("{context}\n{cause}")]
    Context {
        context: String,
        cause: Box<CompileError>,
    },
}

impl CompileError {
    /// Stable machine-readable code. Context layers report the code of their innermost cause.
    pub fn code(&self) -> &'static str {
        match self {
            CompileError::MissingValue(_) => ERR_MISSING_VALUE,
            CompileError::MissingCode => ERR_MISSING_CODE,
            CompileError::MissingPipeline => ERR_MISSING_PIPELINE,
            CompileError::MissingRules => ERR_MISSING_RULES,
            CompileError::MissingSegments => ERR_MISSING_SEGMENTS,
            CompileError::MissingParameterName => ERR_MISSING_PARAMETER_NAME,
            CompileError::MissingFunctionName => ERR_MISSING_FUNCTION_NAME,
            CompileError::InvalidPipelineFormat(_) => ERR_INVALID_PIPELINE_FORMAT,
            CompileError::UnknownPipe(_) => ERR_UNKNOWN_PIPE,
            CompileError::DuplicatePipe(_) => ERR_DUPLICATE_PIPE,
            CompileError::InvalidPipeName(_) => ERR_INVALID_PIPE_NAME,
            CompileError::DuplicateParameter(_) => ERR_DUPLICATE_PARAMETER,
            CompileError::ParameterNotFound(_) => ERR_PARAMETER_NOT_FOUND,
            CompileError::MissingRequiredParameterValue(_) => {
                ERR_MISSING_REQUIRED_PARAMETER_VALUE
            }
            CompileError::UnexpectedParameters { .. } => ERR_UNEXPECTED_PARAMETERS,
            CompileError::InvalidParameterName(_) => ERR_INVALID_PARAMETER_NAME,
            CompileError::FunctionNotFound(_) => ERR_FUNCTION_NOT_FOUND,
            CompileError::DuplicateFunction(_) => ERR_DUPLICATE_FUNCTION,
            CompileError::InvalidFunctionDefinition(_) => ERR_INVALID_FUNCTION_DEFINITION,
            CompileError::CircularFunctionReference(_) => ERR_CIRCULAR_FUNCTION_REFERENCE,
            CompileError::DuplicateCall(_) => ERR_DUPLICATE_CALL,
            CompileError::InvalidExpression(_) => ERR_INVALID_EXPRESSION,
            CompileError::InvalidScriptDefinition(_) => ERR_INVALID_SCRIPT_DEFINITION,
            CompileError::UnknownRecommendationLevel(_) => ERR_UNKNOWN_RECOMMENDATION_LEVEL,
            CompileError::CodeValidationFailure(_) => ERR_CODE_VALIDATION_FAILURE,
            CompileError::UnknownValidationRule(_) => ERR_UNKNOWN_VALIDATION_RULE,
            CompileError::Yaml(_) | CompileError::Json(_) => ERR_DATA,
            CompileError::Context { cause, .. } => cause.code(),
        }
    }

    /// The innermost error of a context chain.
    pub fn root_cause(&self) -> &CompileError {
        match self {
            CompileError::Context { cause, .. } => cause.root_cause(),
            other => other,
        }
    }

    /// Context layers, outermost first. Does not include the root cause message.
    pub fn contexts(&self) -> Vec<&str> {
        let mut layers = Vec::new();
        let mut current = self;
        while let CompileError::Context { context, cause } = current {
            layers.push(context.as_str());
            current = cause;
        }
        layers
    }

    pub fn with_context(self, context: impl Into<String>) -> Self {
        CompileError::Context {
            context: context.into(),
            cause: Box::new(self),
        }
    }
}

pub type Result<T> = std::result::Result<T, CompileError>;

/// Annotates failures crossing a compilation boundary.
pub trait ResultExt<T> {
    fn context(self, context: impl Into<String>) -> Result<T>;

    fn with_context<C, F>(self, f: F) -> Result<T>
    where
        C: Into<String>,
        F: FnOnce() -> C;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }

    fn with_context<C, F>(self, f: F) -> Result<T>
    where
        C: Into<String>,
        F: FnOnce() -> C,
    {
        self.map_err(|e| e.with_context(f()))
    }
}
