use std::collections::HashSet;
use std::env;
use std::path::PathBuf;

/// Runtime configuration, read from the environment once at startup.
///
/// Everything the request-handling core needs is injected from here; nothing
/// reads the environment at request time.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub server_host: String,
    pub server_port: u16,
    /// Secret used to sign and verify session tokens.
    pub jwt_secret: String,
    /// Session token lifetime in seconds.
    pub token_ttl_secs: i64,
    /// Directory where uploaded documents are stored.
    pub upload_dir: PathBuf,
    /// Maximum number of documents accepted per upload request.
    pub max_file_uploads: usize,
    /// Lowercased file extensions accepted for upload.
    pub allowed_extensions: HashSet<String>,
    /// Default page size for task listings when the client sends none.
    pub default_page_size: i64,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            database_url: env::var("DATABASE_URL").expect("DATABASE_URL must be set"),
            server_host: env::var("SERVER_HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            server_port: env::var("SERVER_PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .expect("SERVER_PORT must be a number"),
            jwt_secret: env::var("JWT_SECRET").expect("JWT_SECRET must be set"),
            token_ttl_secs: env::var("TOKEN_TTL_SECS")
                .unwrap_or_else(|_| "3600".to_string())
                .parse()
                .expect("TOKEN_TTL_SECS must be a number"),
            upload_dir: env::var("UPLOAD_DIR")
                .unwrap_or_else(|_| "uploads".to_string())
                .into(),
            max_file_uploads: env::var("MAX_FILE_UPLOADS")
                .unwrap_or_else(|_| "3".to_string())
                .parse()
                .expect("MAX_FILE_UPLOADS must be a number"),
            allowed_extensions: env::var("ALLOWED_EXTENSIONS")
                .unwrap_or_else(|_| "pdf".to_string())
                .split(',')
                .map(|ext| ext.trim().to_lowercase())
                .filter(|ext| !ext.is_empty())
                .collect(),
            default_page_size: env::var("DEFAULT_PAGE_SIZE")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .expect("DEFAULT_PAGE_SIZE must be a number"),
        }
    }

    pub fn server_url(&self) -> String {
        format!("http://{}:{}", self.server_host, self.server_port)
    }
}
