//! User-facing messages surfaced through `TryOnSession::error`.

pub const CREDENTIAL_REJECTED: &str =
    "The API key was rejected. Please choose a key from a project with billing enabled.";

pub const GENERATION_FAILED: &str =
    "The AI could not generate the image. Please try a different photo.";

pub const FILE_READ_FAILED: &str = "Could not read the file.";

/// Where the credential screen sends users for billing setup.
pub const BILLING_INFO_URL: &str = "https://ai.google.dev/gemini-api/docs/billing";
