/// Span attribute keys written by interceptors.
/// Keep these stable; changing them is a breaking change for dashboards.
pub const KEY_SDK_NAME: &str = "sdk.name";
pub const KEY_SERVICE_NAME: &str = "service.name";
pub const KEY_SERVICE_TYPE: &str = "service.type";
pub const KEY_SERVICE_VERSION: &str = "service.version";
pub const KEY_SDK_VERSION: &str = "sdk.version";
pub const KEY_TASK_NAME: &str = "task.name";

pub const KEY_REQUEST_MODEL: &str = "request.model";
pub const KEY_REQUEST_MAX_TOKENS: &str = "request.max_tokens";
pub const KEY_REQUEST_TOP_K: &str = "request.top_k";
pub const KEY_REQUEST_TOP_P: &str = "request.top_p";
pub const KEY_REQUEST_TEMPERATURE: &str = "request.temperature";

pub const KEY_USAGE_PROMPT_TOKENS: &str = "usage.prompt_tokens";
pub const KEY_USAGE_COMPLETION_TOKENS: &str = "usage.completion_tokens";

/// JSON-encoded blobs
pub const KEY_CALL_INPUTS: &str = "call.inputs";
pub const KEY_CALL_METADATA: &str = "call.metadata";
pub const KEY_CALL_OUTPUTS: &str = "call.outputs";

/// Ambient extra attribute that prefixes span names (`"{prefix}-{method}"`).
pub const KEY_SPAN_NAME: &str = "span.name";

/// Exception event fields
pub const KEY_EXCEPTION_TYPE: &str = "exception.type";
pub const KEY_EXCEPTION_MESSAGE: &str = "exception.message";

pub const SERVICE_TYPE_FRAMEWORK: &str = "framework";
