/// Default base URL for Gemini transport requests.
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Build the `generateContent` endpoint for a model.
///
/// Normalization rules:
/// 1) blank base falls back to [`DEFAULT_GEMINI_BASE_URL`]
/// 2) trailing slashes on the base are dropped
/// 3) a leading `models/` on the model id is not duplicated
pub fn generate_content_url(base_url: &str, model: &str) -> String {
    let base = if base_url.trim().is_empty() {
        DEFAULT_GEMINI_BASE_URL
    } else {
        base_url.trim()
    };

    let base = base.trim_end_matches('/');
    let model = sanitize_model(model);
    format!("{base}/models/{model}:generateContent")
}

/// Strip whitespace and any `models/` prefix from a model id.
pub fn sanitize_model(model: &str) -> String {
    let trimmed = model.trim();
    trimmed
        .strip_prefix("models/")
        .unwrap_or(trimmed)
        .to_string()
}
