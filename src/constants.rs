/// Centralized constants for sqldash
pub mod constants {
    /// Directory name for local sqldash settings (hidden directory in the working directory)
    pub const SQLDASH_DIR_NAME: &str = ".sqldash";

    /// Configuration filename
    pub const CONFIG_FILENAME: &str = "config.toml";

    /// Global config directory name (in user config directory)
    pub const GLOBAL_CONFIG_DIR_NAME: &str = "sqldash";

    /// Environment variable overriding the backend base URL
    pub const API_URL_ENV: &str = "SQLDASH_API_URL";

    /// Environment variable overriding the request timeout
    pub const TIMEOUT_SECS_ENV: &str = "SQLDASH_TIMEOUT_SECS";

    /// Number of similar questions requested for a user search
    pub const DEFAULT_SEARCH_K: usize = 5;

    /// Number of records requested by the browse-all load
    pub const DEFAULT_BROWSE_K: usize = 100;

    /// Query sent by the browse-all load. The backend treats blank text as "match anything".
    pub const BROWSE_ALL_QUERY: &str = " ";

    /// SQL longer than this many characters is shown truncated
    pub const DEFAULT_TRUNCATE_AT: usize = 100;

    /// Request timeout applied to every backend call
    pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

    /// Backend endpoints
    pub const SEARCH_PATH: &str = "search";
    pub const UPLOAD_PATH: &str = "upload";
    pub const DELETE_PATH: &str = "delete";
}
