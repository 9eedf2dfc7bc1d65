//! Typed error handling for the JSON:API pipeline
//!
//! Every failure in the request → constraint → document pipeline is one of the
//! categories below. Each category knows its HTTP status code, a stable error
//! code and how to render itself as JSON:API error objects.
//!
//! # Error Categories
//!
//! - [`ParseError`]: malformed query string or request body (400)
//! - [`ValidationError`]: well-formed but semantically invalid input (400/403/415/422)
//! - [`NotFoundError`]: resource, resource type or relationship target absent (404)
//! - [`ConflictError`]: id or type mismatch between path and body (409)
//! - [`DataSourceError`]: failure of the underlying store (500)
//! - [`ConfigurationError`]: resource graph or options misconfiguration (startup only)
//!
//! # Example
//!
//! ```rust,ignore
//! match service.get_by_id("articles", "42", &query).await {
//!     Ok(document) => render(document),
//!     Err(JsonApiError::NotFound(NotFoundError::Resource { id, .. })) => {
//!         println!("article {} does not exist", id);
//!     }
//!     Err(e) => eprintln!("{}", e),
//! }
//! ```

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use indexmap::IndexMap;
use serde_json::Value;
use std::fmt;

use crate::config::JsonApiOptions;
use crate::serialization::objects::{Document, ErrorObject, ErrorSource, MEDIA_TYPE};

/// The main error type of the framework
#[derive(Debug)]
pub enum JsonApiError {
    /// Malformed query string parameter or request body
    Parse(ParseError),

    /// Semantically invalid input
    Validation(ValidationError),

    /// Resource, type or relationship target absent
    NotFound(NotFoundError),

    /// Path and body disagree
    Conflict(ConflictError),

    /// Underlying store failure
    DataSource(DataSourceError),

    /// Resource graph or options misconfiguration
    Configuration(ConfigurationError),
}

impl fmt::Display for JsonApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JsonApiError::Parse(e) => write!(f, "{}", e),
            JsonApiError::Validation(e) => write!(f, "{}", e),
            JsonApiError::NotFound(e) => write!(f, "{}", e),
            JsonApiError::Conflict(e) => write!(f, "{}", e),
            JsonApiError::DataSource(e) => write!(f, "{}", e),
            JsonApiError::Configuration(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for JsonApiError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            JsonApiError::Parse(e) => Some(e),
            JsonApiError::Validation(e) => Some(e),
            JsonApiError::NotFound(e) => Some(e),
            JsonApiError::Conflict(e) => Some(e),
            JsonApiError::DataSource(e) => Some(e),
            JsonApiError::Configuration(e) => Some(e),
        }
    }
}

impl JsonApiError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            JsonApiError::Parse(_) => StatusCode::BAD_REQUEST,
            JsonApiError::Validation(e) => e.status_code(),
            JsonApiError::NotFound(_) => StatusCode::NOT_FOUND,
            JsonApiError::Conflict(_) => StatusCode::CONFLICT,
            JsonApiError::DataSource(_) => StatusCode::INTERNAL_SERVER_ERROR,
            JsonApiError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error code for this error
    pub fn error_code(&self) -> &'static str {
        match self {
            JsonApiError::Parse(e) => e.error_code(),
            JsonApiError::Validation(e) => e.error_code(),
            JsonApiError::NotFound(e) => e.error_code(),
            JsonApiError::Conflict(e) => e.error_code(),
            JsonApiError::DataSource(_) => "DATA_SOURCE_ERROR",
            JsonApiError::Configuration(_) => "CONFIGURATION_ERROR",
        }
    }

    /// Short, occurrence-independent summary of the problem
    pub fn title(&self) -> &'static str {
        match self {
            JsonApiError::Parse(ParseError::QueryString { .. }) => {
                "The specified query string parameter is invalid."
            }
            JsonApiError::Parse(_) => "Failed to deserialize request body.",
            JsonApiError::Validation(e) => e.title(),
            JsonApiError::NotFound(_) => "The requested resource does not exist.",
            JsonApiError::Conflict(ConflictError::AlreadyExists { .. }) => {
                "Another resource with the specified ID already exists."
            }
            JsonApiError::Conflict(_) => "The request body conflicts with the request path.",
            JsonApiError::DataSource(_) => {
                "An unhandled error occurred while processing this request."
            }
            JsonApiError::Configuration(_) => "The API is misconfigured.",
        }
    }

    fn source_location(&self) -> Option<ErrorSource> {
        let (pointer, parameter) = match self {
            JsonApiError::Parse(ParseError::QueryString { parameter, .. }) => {
                (None, Some(parameter.clone()))
            }
            JsonApiError::Validation(e) => (e.pointer(), e.parameter()),
            JsonApiError::Conflict(ConflictError::TypeMismatch { pointer, .. }) => {
                (Some(pointer.clone()), None)
            }
            JsonApiError::Conflict(ConflictError::IdMismatch { .. }) => {
                (Some("/data/id".to_string()), None)
            }
            _ => (None, None),
        };

        if pointer.is_none() && parameter.is_none() {
            None
        } else {
            Some(ErrorSource { pointer, parameter })
        }
    }

    /// Render this error as one or more JSON:API error objects
    ///
    /// Stack traces are attached as `meta.stackTrace` only when the options
    /// ask for them.
    pub fn to_error_objects(&self, options: &JsonApiOptions) -> Vec<ErrorObject> {
        let status = self.status_code().as_u16().to_string();

        let details: Vec<String> = match self {
            JsonApiError::NotFound(NotFoundError::RelatedResources {
                resource_type,
                relationship,
                ids,
            }) => ids
                .iter()
                .map(|id| {
                    format!(
                        "Related resource of type '{}' with ID '{}' in relationship '{}' does not exist.",
                        resource_type, id, relationship
                    )
                })
                .collect(),
            _ => vec![self.to_string()],
        };

        let meta = options
            .include_exception_stack_trace
            .then(|| self.stack_trace_meta());

        details
            .into_iter()
            .map(|detail| ErrorObject {
                id: None,
                status: status.clone(),
                code: Some(self.error_code().to_string()),
                title: self.title().to_string(),
                detail: Some(detail),
                source: self.source_location(),
                meta: meta.clone(),
            })
            .collect()
    }

    /// Render this error as a complete error document
    pub fn to_document(&self, options: &JsonApiOptions) -> Document {
        Document::from_errors(self.to_error_objects(options))
    }

    fn stack_trace_meta(&self) -> IndexMap<String, Value> {
        let mut lines = Vec::new();
        let mut current: Option<&(dyn std::error::Error + 'static)> = Some(self);
        while let Some(err) = current {
            lines.push(Value::String(err.to_string()));
            current = err.source();
        }

        if let JsonApiError::DataSource(e) = self {
            lines.extend(
                format!("{:?}", e.inner())
                    .split('\n')
                    .filter(|line| !line.trim().is_empty())
                    .map(|line| Value::String(line.to_string())),
            );
        }

        let mut meta = IndexMap::new();
        meta.insert("stackTrace".to_string(), Value::Array(lines));
        meta
    }
}

impl IntoResponse for JsonApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let document = self.to_document(&JsonApiOptions::default());
        let body = serde_json::to_vec(&document).unwrap_or_default();
        (
            status,
            [(axum::http::header::CONTENT_TYPE, MEDIA_TYPE)],
            body,
        )
            .into_response()
    }
}

// =============================================================================
// Parse Errors
// =============================================================================

/// Malformed input: syntax errors in query strings or request bodies
#[derive(Debug, Clone, thiserror::Error)]
pub enum ParseError {
    /// Syntax error inside a query string parameter value
    #[error("{message} Failed at position {position}: {marked_value}")]
    QueryString {
        parameter: String,
        position: usize,
        message: String,
        marked_value: String,
    },

    /// Request body is not valid JSON
    #[error("Invalid JSON at line {line}, column {column}: {message}")]
    InvalidJson {
        line: usize,
        column: usize,
        message: String,
    },

    /// Request body is missing where one is required
    #[error("Missing request body.")]
    MissingBody,
}

impl ParseError {
    /// Build a query string error at a zero-based character offset
    ///
    /// The reported position is one-based and the value is echoed with a `^`
    /// marker in front of the offending character.
    pub fn query_string(
        parameter: impl Into<String>,
        value: &str,
        offset: usize,
        message: impl Into<String>,
    ) -> Self {
        let split = value
            .char_indices()
            .nth(offset)
            .map(|(index, _)| index)
            .unwrap_or(value.len());
        let marked_value = format!("{}^{}", &value[..split], &value[split..]);

        ParseError::QueryString {
            parameter: parameter.into(),
            position: offset + 1,
            message: message.into(),
            marked_value,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            ParseError::QueryString { .. } => "INVALID_QUERY_STRING_PARAMETER",
            ParseError::InvalidJson { .. } => "INVALID_JSON",
            ParseError::MissingBody => "MISSING_REQUEST_BODY",
        }
    }
}

impl From<ParseError> for JsonApiError {
    fn from(err: ParseError) -> Self {
        JsonApiError::Parse(err)
    }
}

impl From<serde_json::Error> for JsonApiError {
    fn from(err: serde_json::Error) -> Self {
        JsonApiError::Parse(ParseError::InvalidJson {
            line: err.line(),
            column: err.column(),
            message: err.to_string(),
        })
    }
}

// =============================================================================
// Validation Errors
// =============================================================================

/// Well-formed input that violates the resource graph or the options
#[derive(Debug, Clone, thiserror::Error)]
pub enum ValidationError {
    /// Query string parameter that no reader understands
    #[error("Query string parameter '{parameter}' is unknown.")]
    UnknownQueryParameter { parameter: String },

    /// The same query string parameter was given twice
    #[error("Query string parameter '{parameter}' can only occur once.")]
    DuplicateQueryParameter { parameter: String },

    /// Parameter understood but not usable at this endpoint
    #[error("{message}")]
    UnsupportedQueryParameter { parameter: String, message: String },

    /// Parameter syntactically valid but semantically wrong
    #[error("{message}")]
    InvalidQueryParameter { parameter: String, message: String },

    /// Include chain deeper than the configured maximum
    #[error("Including '{chain}' exceeds the maximum inclusion depth of {maximum}.")]
    IncludeDepthExceeded {
        parameter: String,
        chain: String,
        maximum: usize,
    },

    /// Request body violates the document structure or the resource graph
    #[error("{message}")]
    InvalidDocument { pointer: String, message: String },

    /// Attribute may not be set in this operation
    #[error("{message}")]
    FieldNotAllowed { pointer: String, message: String },

    /// Client supplied an id on create while that is disabled
    #[error("Specifying the resource ID in POST requests is not allowed.")]
    ClientGeneratedIdNotAllowed { pointer: String },

    /// Identifier does not match the identifier format of its type
    #[error("The value '{value}' is not a valid identifier for resource type '{resource_type}'.")]
    InvalidId {
        resource_type: String,
        value: String,
        pointer: Option<String>,
    },

    /// Write operation that the relationship kind does not support
    #[error("{message}")]
    UnsupportedOperation { message: String },

    /// Content-Type header is not the JSON:API media type
    #[error("Content-Type '{content_type}' is not supported. Please specify '{MEDIA_TYPE}' instead.")]
    UnsupportedMediaType { content_type: String },
}

impl ValidationError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ValidationError::InvalidDocument { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            ValidationError::FieldNotAllowed { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            ValidationError::ClientGeneratedIdNotAllowed { .. } => StatusCode::FORBIDDEN,
            ValidationError::UnsupportedOperation { .. } => StatusCode::FORBIDDEN,
            ValidationError::UnsupportedMediaType { .. } => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            _ => StatusCode::BAD_REQUEST,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            ValidationError::UnknownQueryParameter { .. } => "UNKNOWN_QUERY_STRING_PARAMETER",
            ValidationError::DuplicateQueryParameter { .. } => "DUPLICATE_QUERY_STRING_PARAMETER",
            ValidationError::UnsupportedQueryParameter { .. } => {
                "UNSUPPORTED_QUERY_STRING_PARAMETER"
            }
            ValidationError::InvalidQueryParameter { .. } => "INVALID_QUERY_STRING_PARAMETER",
            ValidationError::IncludeDepthExceeded { .. } => "INCLUDE_DEPTH_EXCEEDED",
            ValidationError::InvalidDocument { .. } => "INVALID_REQUEST_BODY",
            ValidationError::FieldNotAllowed { .. } => "FIELD_NOT_ALLOWED",
            ValidationError::ClientGeneratedIdNotAllowed { .. } => {
                "CLIENT_GENERATED_ID_NOT_ALLOWED"
            }
            ValidationError::InvalidId { .. } => "INVALID_RESOURCE_ID",
            ValidationError::UnsupportedOperation { .. } => "UNSUPPORTED_OPERATION",
            ValidationError::UnsupportedMediaType { .. } => "UNSUPPORTED_MEDIA_TYPE",
        }
    }

    fn title(&self) -> &'static str {
        match self {
            ValidationError::UnknownQueryParameter { .. } => "Unknown query string parameter.",
            ValidationError::DuplicateQueryParameter { .. } => "Duplicate query string parameter.",
            ValidationError::UnsupportedQueryParameter { .. } => {
                "Usage of one or more query string parameters is not allowed at the requested endpoint."
            }
            ValidationError::InvalidQueryParameter { .. } => {
                "The specified query string parameter is invalid."
            }
            ValidationError::IncludeDepthExceeded { .. } => "The specified include is invalid.",
            ValidationError::InvalidDocument { .. } => "Failed to deserialize request body.",
            ValidationError::FieldNotAllowed { .. } => "Failed to deserialize request body.",
            ValidationError::ClientGeneratedIdNotAllowed { .. } => {
                "Failed to deserialize request body."
            }
            ValidationError::InvalidId { .. } => "The specified resource identifier is invalid.",
            ValidationError::UnsupportedOperation { .. } => {
                "The requested operation is not supported."
            }
            ValidationError::UnsupportedMediaType { .. } => {
                "The specified Content-Type header value is not supported."
            }
        }
    }

    fn pointer(&self) -> Option<String> {
        match self {
            ValidationError::InvalidDocument { pointer, .. }
            | ValidationError::FieldNotAllowed { pointer, .. }
            | ValidationError::ClientGeneratedIdNotAllowed { pointer } => Some(pointer.clone()),
            ValidationError::InvalidId { pointer, .. } => pointer.clone(),
            _ => None,
        }
    }

    fn parameter(&self) -> Option<String> {
        match self {
            ValidationError::UnknownQueryParameter { parameter }
            | ValidationError::DuplicateQueryParameter { parameter }
            | ValidationError::UnsupportedQueryParameter { parameter, .. }
            | ValidationError::InvalidQueryParameter { parameter, .. }
            | ValidationError::IncludeDepthExceeded { parameter, .. } => Some(parameter.clone()),
            _ => None,
        }
    }
}

impl From<ValidationError> for JsonApiError {
    fn from(err: ValidationError) -> Self {
        JsonApiError::Validation(err)
    }
}

// =============================================================================
// Not Found Errors
// =============================================================================

/// Something the request refers to does not exist
#[derive(Debug, Clone, thiserror::Error)]
pub enum NotFoundError {
    /// Resource with the given id does not exist
    #[error("Resource of type '{resource_type}' with ID '{id}' does not exist.")]
    Resource { resource_type: String, id: String },

    /// No resource type is registered under this name
    #[error("Resource type '{resource_type}' does not exist.")]
    ResourceType { resource_type: String },

    /// The resource type has no relationship with this name
    #[error("Resource type '{resource_type}' does not contain a relationship named '{relationship}'.")]
    Relationship {
        resource_type: String,
        relationship: String,
    },

    /// Relationship assignment references resources that do not exist
    #[error("Related resources of type '{resource_type}' in relationship '{relationship}' do not exist: {}.", ids.join(", "))]
    RelatedResources {
        resource_type: String,
        relationship: String,
        ids: Vec<String>,
    },
}

impl NotFoundError {
    pub fn error_code(&self) -> &'static str {
        match self {
            NotFoundError::Resource { .. } => "RESOURCE_NOT_FOUND",
            NotFoundError::ResourceType { .. } => "RESOURCE_TYPE_NOT_FOUND",
            NotFoundError::Relationship { .. } => "RELATIONSHIP_NOT_FOUND",
            NotFoundError::RelatedResources { .. } => "RELATED_RESOURCE_NOT_FOUND",
        }
    }
}

impl From<NotFoundError> for JsonApiError {
    fn from(err: NotFoundError) -> Self {
        JsonApiError::NotFound(err)
    }
}

// =============================================================================
// Conflict Errors
// =============================================================================

/// The request body disagrees with the request path
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConflictError {
    /// Body id differs from the id in the URL
    #[error("The resource ID '{body_id}' in the request body does not match the ID '{path_id}' in the request URL.")]
    IdMismatch { path_id: String, body_id: String },

    /// Body type differs from the type served by the endpoint
    #[error("Expected resource of type '{expected}' instead of '{actual}'.")]
    TypeMismatch {
        expected: String,
        actual: String,
        pointer: String,
    },

    /// Client-generated id already taken
    #[error("Another resource of type '{resource_type}' with ID '{id}' already exists.")]
    AlreadyExists { resource_type: String, id: String },
}

impl ConflictError {
    pub fn error_code(&self) -> &'static str {
        match self {
            ConflictError::IdMismatch { .. } => "RESOURCE_ID_MISMATCH",
            ConflictError::TypeMismatch { .. } => "RESOURCE_TYPE_MISMATCH",
            ConflictError::AlreadyExists { .. } => "RESOURCE_ALREADY_EXISTS",
        }
    }
}

impl From<ConflictError> for JsonApiError {
    fn from(err: ConflictError) -> Self {
        JsonApiError::Conflict(err)
    }
}

// =============================================================================
// Data Source Errors
// =============================================================================

/// Failure reported by the data-source collaborator
#[derive(Debug, thiserror::Error)]
pub enum DataSourceError {
    /// A read query failed
    #[error("Failed to query resources of type '{resource_type}': {source}")]
    Query {
        resource_type: String,
        source: anyhow::Error,
    },

    /// A write inside a unit of work failed
    #[error("Failed to {operation} resource of type '{resource_type}': {source}")]
    Write {
        operation: String,
        resource_type: String,
        source: anyhow::Error,
    },

    /// Beginning, committing or rolling back the unit of work failed
    #[error("Transaction failure: {source}")]
    Transaction { source: anyhow::Error },
}

impl DataSourceError {
    /// The underlying store error
    pub fn inner(&self) -> &anyhow::Error {
        match self {
            DataSourceError::Query { source, .. }
            | DataSourceError::Write { source, .. }
            | DataSourceError::Transaction { source } => source,
        }
    }
}

impl From<DataSourceError> for JsonApiError {
    fn from(err: DataSourceError) -> Self {
        JsonApiError::DataSource(err)
    }
}

// =============================================================================
// Configuration Errors
// =============================================================================

/// Resource graph or options misconfiguration, raised at startup
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigurationError {
    #[error("Resource type '{resource_type}' is registered more than once.")]
    DuplicateResourceType { resource_type: String },

    #[error("Resource type '{resource_type}' declares field '{field}' more than once.")]
    DuplicateField { resource_type: String, field: String },

    #[error("Resource type '{resource_type}' cannot declare a field named '{field}'.")]
    ReservedFieldName { resource_type: String, field: String },

    #[error("Relationship '{relationship}' on resource type '{resource_type}' targets unregistered type '{target}'.")]
    UnknownRelationshipTarget {
        resource_type: String,
        relationship: String,
        target: String,
    },

    #[error("Relationship '{relationship}' on resource type '{resource_type}' has an invalid inverse: {message}")]
    InvalidInverse {
        resource_type: String,
        relationship: String,
        message: String,
    },

    #[error("Invalid value for option '{option}': {message}")]
    InvalidOption { option: String, message: String },

    #[error("Failed to load configuration: {message}")]
    Load { message: String },

    #[error("Missing required component: {component}")]
    MissingComponent { component: String },
}

impl From<ConfigurationError> for JsonApiError {
    fn from(err: ConfigurationError) -> Self {
        JsonApiError::Configuration(err)
    }
}

impl From<serde_yaml::Error> for ConfigurationError {
    fn from(err: serde_yaml::Error) -> Self {
        ConfigurationError::Load {
            message: err.to_string(),
        }
    }
}

impl From<std::io::Error> for ConfigurationError {
    fn from(err: std::io::Error) -> Self {
        ConfigurationError::Load {
            message: err.to_string(),
        }
    }
}

// =============================================================================
// Result type alias
// =============================================================================

/// A specialized Result type for JSON:API operations
pub type JsonApiResult<T> = Result<T, JsonApiError>;
