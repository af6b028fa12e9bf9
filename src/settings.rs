use base64::{engine::general_purpose, Engine as _};
use serde::{Deserialize, Serialize};
use std::fs;

use crate::guard::RouteRules;
use crate::models::MAX_SESSION_DURATION_HOURS;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct BillboardSettings {
    pub application: ApplicationSettings,
    pub proxy: ProxySettings,
    pub routes: RouteSettings,
    pub session: SessionSettings,
    pub cookies: CookieSettings,
    pub store: StoreSettings,
    pub identity: IdentitySettings,
    pub payments: PaymentSettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplicationSettings {
    pub host: String,
    pub port: u16,
    pub cors_origins: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxySettings {
    /// Base URL of the marketplace UI that allowed page requests are forwarded to
    pub upstream_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RouteSettings {
    /// Path prefixes that require a signed-in session
    pub protected_prefixes: Vec<String>,
    /// Exact paths that only signed-out visitors may reach
    pub auth_only_paths: Vec<String>,
    pub login_path: String,
    pub home_path: String,
    /// Query parameter carrying the original path on login redirects
    pub return_param: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    pub session_duration_hours: u64,
    pub session_secret: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CookieSettings {
    pub secure: bool,
}

/// Which document store implementation backs the API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Memory,
    Firestore,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    pub backend: StoreBackend,
    pub project_id: String,
    pub database: String,
    /// Override for the REST endpoint (emulators, proxies)
    pub endpoint: Option<String>,
    pub access_token: Option<String>,
    pub job_collections: Vec<String>,
    pub listing_collections: Vec<String>,
    pub chat_collection: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentitySettings {
    pub api_key: Option<String>,
    pub endpoint: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PaymentSettings {
    /// When false, feature requests are trusted without a payment record
    pub verify_payments: bool,
    pub collection: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub level: String,
}

impl Default for ApplicationSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            cors_origins: "http://localhost:3000,http://localhost:8080".to_string(),
        }
    }
}

impl Default for ProxySettings {
    fn default() -> Self {
        Self {
            upstream_url: "http://localhost:3000".to_string(),
        }
    }
}

impl Default for RouteSettings {
    fn default() -> Self {
        Self {
            protected_prefixes: [
                "/create-listing",
                "/my-listings",
                "/send-message",
                "/dashboard",
                "/profile",
                "/applications",
                "/messages",
            ]
            .iter()
            .map(ToString::to_string)
            .collect(),
            auth_only_paths: vec!["/login".to_string(), "/signup".to_string()],
            login_path: "/login".to_string(),
            home_path: "/".to_string(),
            return_param: "redirect".to_string(),
        }
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            session_duration_hours: 24 * 7,
            session_secret: String::new(), // Will be generated if empty
        }
    }
}

impl Default for CookieSettings {
    fn default() -> Self {
        Self {
            secure: true, // Default to secure cookies
        }
    }
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Memory,
            project_id: String::new(),
            database: "(default)".to_string(),
            endpoint: None,
            access_token: None,
            job_collections: vec!["jobs".to_string()],
            listing_collections: vec!["listings".to_string(), "billboards".to_string()],
            chat_collection: "chats".to_string(),
        }
    }
}

impl Default for IdentitySettings {
    fn default() -> Self {
        Self {
            api_key: None,
            endpoint: "https://identitytoolkit.googleapis.com/v1".to_string(),
        }
    }
}

impl Default for PaymentSettings {
    fn default() -> Self {
        Self {
            verify_payments: true,
            collection: "payments".to_string(),
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl BillboardSettings {
    /// Load settings from configuration files and environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Logger initialization fails
    /// - Settings file cannot be read or parsed
    pub fn load() -> Result<Self, Box<dyn std::error::Error>> {
        Self::load_env_file();

        let mut settings = Self::load_base_settings()?;
        Self::apply_env_overrides(&mut settings);

        Self::initialize_logging(&settings.logging)?;
        Ok(settings)
    }

    /// Initialize `env_logger`, honouring `RUST_LOG` and falling back to the configured level
    ///
    /// # Errors
    ///
    /// Returns an error if a global logger was already installed
    fn initialize_logging(logging: &LoggingSettings) -> Result<(), Box<dyn std::error::Error>> {
        env_logger::Builder::from_env(
            env_logger::Env::default().default_filter_or(logging.level.as_str()),
        )
        .try_init()?;
        Ok(())
    }

    /// Load base settings from TOML file(s) or use defaults
    /// Settings are loaded with the following priority (highest to lowest):
    /// 1. Environment variables (applied separately after loading base settings)
    /// 2. Settings.toml in `BILLBOARD_SECRETS_DIR` (if specified and exists)
    /// 3. Settings.toml in current directory (if exists)
    /// 4. Default settings
    ///
    /// # Errors
    ///
    /// Returns an error if a settings file cannot be read or parsed
    fn load_base_settings() -> Result<Self, Box<dyn std::error::Error>> {
        let mut settings = Self::default();

        let default_config_path = std::path::PathBuf::from("Settings.toml");
        if default_config_path.exists() {
            settings = Self::from_file(&default_config_path)?;
            println!(
                "✓ Loaded base settings from {}",
                default_config_path.display()
            );
        }

        if let Ok(secrets_dir) = std::env::var("BILLBOARD_SECRETS_DIR") {
            let secrets_path = std::path::Path::new(&secrets_dir).join("Settings.toml");
            if secrets_path.exists() {
                settings = Self::from_file(&secrets_path)?;
                println!("✓ Overriding settings from {}", secrets_path.display());
            } else {
                println!(
                    "ℹ BILLBOARD_SECRETS_DIR set but no Settings.toml found at: {}",
                    secrets_path.display()
                );
            }
        }

        Ok(settings)
    }

    /// Parse a single TOML settings file; missing sections take their defaults
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid TOML
    pub fn from_file(path: &std::path::Path) -> Result<Self, Box<dyn std::error::Error>> {
        let toml_content = fs::read_to_string(path)?;
        Ok(basic_toml::from_str(&toml_content)?)
    }

    /// Apply environment variable overrides to settings
    pub fn apply_env_overrides(settings: &mut Self) {
        Self::apply_application_env_overrides(&mut settings.application);
        if let Ok(upstream_url) = std::env::var("UPSTREAM_URL") {
            settings.proxy.upstream_url = upstream_url;
        }
        Self::apply_session_env_overrides(&mut settings.session);
        if let Ok(cookie_secure) = std::env::var("COOKIE_SECURE") {
            if let Ok(secure) = cookie_secure.parse::<bool>() {
                settings.cookies.secure = secure;
            }
        }
        Self::apply_store_env_overrides(&mut settings.store);
        if let Ok(api_key) = std::env::var("IDENTITY_API_KEY") {
            settings.identity.api_key = Some(api_key);
        }
        if let Ok(verify) = std::env::var("VERIFY_PAYMENTS") {
            if let Ok(verify) = verify.parse::<bool>() {
                settings.payments.verify_payments = verify;
            }
        }
        if let Ok(log_level) = std::env::var("RUST_LOG") {
            settings.logging.level = log_level;
        }
    }

    fn apply_application_env_overrides(app_settings: &mut ApplicationSettings) {
        if let Ok(host) = std::env::var("HOST") {
            app_settings.host = host;
        }
        if let Ok(port_str) = std::env::var("PORT") {
            if let Ok(port) = port_str.parse::<u16>() {
                app_settings.port = port;
            }
        }
        if let Ok(cors_origins) = std::env::var("CORS_ORIGINS") {
            app_settings.cors_origins = cors_origins;
        }
    }

    /// Apply environment overrides for session settings
    pub fn apply_session_env_overrides(session_settings: &mut SessionSettings) {
        if let Ok(value) = std::env::var("SESSION_DURATION_HOURS") {
            if let Ok(hours) = value.parse::<u64>() {
                session_settings.session_duration_hours = hours;
            }
        }
        if session_settings.session_duration_hours > MAX_SESSION_DURATION_HOURS {
            eprintln!(
                "⚠️  session_duration_hours {} exceeds {MAX_SESSION_DURATION_HOURS}; clamping",
                session_settings.session_duration_hours
            );
            session_settings.session_duration_hours = MAX_SESSION_DURATION_HOURS;
        }

        let env_secret_set = std::env::var("SESSION_SECRET").is_ok_and(|secret| {
            if secret.is_empty() {
                false
            } else {
                session_settings.session_secret = secret;
                true
            }
        });

        if !env_secret_set && session_settings.session_secret.is_empty() {
            session_settings.session_secret = Self::generate_random_session_secret();
            Self::warn_about_generated_secret();
        }
    }

    fn apply_store_env_overrides(store_settings: &mut StoreSettings) {
        if let Ok(backend) = std::env::var("STORE_BACKEND") {
            match backend.to_ascii_lowercase().as_str() {
                "memory" => store_settings.backend = StoreBackend::Memory,
                "firestore" => store_settings.backend = StoreBackend::Firestore,
                other => eprintln!("⚠️  Ignoring unknown STORE_BACKEND value '{other}'"),
            }
        }
        if let Ok(project_id) = std::env::var("FIRESTORE_PROJECT_ID") {
            store_settings.project_id = project_id;
        }
        if let Ok(token) = std::env::var("FIRESTORE_ACCESS_TOKEN") {
            store_settings.access_token = Some(token);
        }
        if let Ok(host) = std::env::var("FIRESTORE_EMULATOR_HOST") {
            store_settings.endpoint = Some(format!("http://{host}/v1"));
        }
    }

    /// Generates 32 bytes (256 bits) of entropy for AES-256 compatibility
    fn generate_random_session_secret() -> String {
        use rand::RngCore;
        let mut secret = [0u8; 32];
        rand::rng().fill_bytes(&mut secret);
        general_purpose::STANDARD.encode(secret)
    }

    fn warn_about_generated_secret() {
        eprintln!("⚠️  WARNING: Using auto-generated session secret");
        eprintln!("🔒 For production use, set the SESSION_SECRET environment variable");
        eprintln!("   or configure session_secret in Settings.toml");
        eprintln!("💡 Session cookies will not survive a restart unless a secret is configured");
    }

    /// Load environment variables from .env file
    fn load_env_file() {
        if let Ok(contents) = std::fs::read_to_string(".env") {
            for line in contents.lines() {
                let line = line.trim();
                if line.starts_with('#') {
                    continue;
                }
                if let Some((key, value)) = line.split_once('=') {
                    std::env::set_var(key.trim(), value.trim());
                }
            }
        }
    }

    /// Get the bind address for the server
    #[must_use]
    pub fn get_bind_address(&self) -> String {
        format!("{}:{}", self.application.host, self.application.port)
    }

    /// Get CORS origins as a vector of strings
    #[must_use]
    pub fn get_cors_origins(&self) -> Vec<String> {
        self.application
            .cors_origins
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }

    /// Build the guard's route rules from the `routes` section
    #[must_use]
    pub fn route_rules(&self) -> RouteRules {
        RouteRules::new(
            self.routes.protected_prefixes.clone(),
            self.routes.auth_only_paths.clone(),
        )
        .with_login_path(&self.routes.login_path)
        .with_home_path(&self.routes.home_path)
        .with_return_param(&self.routes.return_param)
    }
}
