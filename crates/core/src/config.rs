//! Global configuration constants for DevCamper.
//!
//! Query limits, validation bounds, and server defaults are defined here.
//! These are compile-time constants; runtime configuration is handled via CLI
//! arguments and environment variables in the server binaries.

/// Query parameters reserved for the query translator. They are never
/// interpreted as filters.
pub const CONTROL_KEYS: [&str; 4] = ["select", "sort", "page", "limit"];

/// Page number used when `page` is missing or not a positive integer.
pub const DEFAULT_PAGE: usize = 1;

/// Page size used when `limit` is missing or not a positive integer.
pub const DEFAULT_LIMIT: usize = 25;

/// Largest page size a client may request. Larger values are clamped.
pub const MAX_LIMIT: usize = 1_000;

/// Sort applied when the client does not send `sort`: newest first.
pub const DEFAULT_SORT: &str = "-createdAt";

/// Maximum number of filter conditions kept from a single request.
pub const MAX_FILTER_CONDITIONS: usize = 32;

/// Maximum length of a filter or sort field path in bytes.
pub const MAX_FIELD_PATH_LEN: usize = 64;

/// Earth's mean radius in miles, used to turn a distance into an angular radius.
pub const EARTH_RADIUS_MILES: f64 = 3963.0;

/// Name of the field holding the creation timestamp of every document.
pub const CREATED_AT_FIELD: &str = "createdAt";

/// Name under which a document's id is addressed in filters, sorts and output.
pub const ID_FIELD: &str = "_id";

/// Maximum bootcamp name length in characters.
pub const MAX_BOOTCAMP_NAME_LEN: usize = 50;

/// Maximum bootcamp description length in characters.
pub const MAX_BOOTCAMP_DESCRIPTION_LEN: usize = 500;

/// Maximum phone number length in characters.
pub const MAX_PHONE_LEN: usize = 20;

/// Minimum password length for registration.
pub const MIN_PASSWORD_LEN: usize = 6;

/// Photo assigned to bootcamps that have no upload yet.
pub const DEFAULT_PHOTO: &str = "no-photo.jpg";

/// Default HTTP server port.
pub const DEFAULT_PORT: u16 = 5000;

/// Default directory for WAL and snapshot files.
pub const DEFAULT_DATA_DIR: &str = "./data";

/// Default directory for uploaded bootcamp photos.
pub const DEFAULT_UPLOAD_DIR: &str = "./public/uploads";

/// Default maximum photo upload size in bytes.
pub const DEFAULT_MAX_FILE_UPLOAD: usize = 1_000_000;

/// Default JWT lifetime, in the `<n><unit>` form accepted by `JWT_EXPIRE`.
pub const DEFAULT_JWT_EXPIRE: &str = "30d";

/// Default lifetime of the `token` cookie in days.
pub const DEFAULT_JWT_COOKIE_EXPIRE_DAYS: u64 = 30;

/// Default interval (in seconds) between automatic snapshots. 0 = disabled.
pub const DEFAULT_SNAPSHOT_INTERVAL_SECS: u64 = 300;

/// Default graceful shutdown timeout in seconds.
pub const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 30;

/// Per-request timeout in seconds.
pub const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Global rate limit in requests per second.
pub const RATE_LIMIT_RPS: u64 = 100;

/// Maximum HTTP request body size in bytes (10 MB).
pub const MAX_REQUEST_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Maximum number of concurrent in-flight requests.
pub const MAX_CONCURRENT_REQUESTS: usize = 512;
