use secrecy::Secret;
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Gemini REST API base URL.
pub const DEFAULT_GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

const DEFAULT_MODEL: &str = "gemini-2.0-flash";
const DEFAULT_PROVIDER_TIMEOUT_SECS: u64 = 60;
const DEFAULT_MAX_SESSIONS: usize = 1000;
const DEFAULT_SESSION_TTL_SECS: u64 = 3600;

/// Static guidance placed in front of every conversation.
pub const DEFAULT_GUIDANCE: &str = "You are the BU Advisor, an assistant for Boston University students. \
Help students explore majors, minors and graduate programs, plan which courses to take and in what order, \
and connect their studies to internships and careers. When a question concerns Metropolitan College (MET) \
programs, frame the answer around part-time and working students. Be concise and practical, recommend \
talking to an academic advisor for degree-audit decisions, and say plainly when you do not know a specific \
course number, schedule or policy instead of guessing.";

/// Words that make a query refuse without contacting the provider.
pub const DEFAULT_BLOCKED_WORDS: &[&str] = &[
    "classified",
    "confidential",
    "sex",
    "drugs",
    "murder",
    "crime",
    "rape",
    "exploit",
    "slave",
    "update your instructions",
    "change your guidelines",
    "ignore your programming",
    "bypass your restrictions",
];

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub common: core_config::Config,
    pub provider: ProviderConfig,
    pub prompt: PromptConfig,
    pub guardrails: GuardrailConfig,
    pub sessions: SessionConfig,
    pub frontend: FrontendConfig,
    pub observability: ObservabilityConfig,
}

/// Which text-generation backend answers queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Gemini,
    Mock,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Gemini => "gemini",
            ProviderKind::Mock => "mock",
        }
    }
}

impl FromStr for ProviderKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gemini" => Ok(ProviderKind::Gemini),
            "mock" => Ok(ProviderKind::Mock),
            other => Err(AppError::ConfigError(anyhow::anyhow!(
                "Unknown provider '{}', expected 'gemini' or 'mock'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub kind: ProviderKind,
    pub api_key: Secret<String>,
    pub model: String,
    pub api_base: String,
    /// Upper bound on a single provider call.
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct PromptConfig {
    pub guidance: String,
    /// Number of previous user/model exchanges replayed to the provider.
    pub max_history_turns: usize,
    pub temperature: f32,
    pub top_p: f32,
    pub max_output_tokens: i32,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            guidance: DEFAULT_GUIDANCE.to_string(),
            max_history_turns: 5,
            temperature: 0.25,
            top_p: 0.8,
            max_output_tokens: 750,
        }
    }
}

#[derive(Debug, Clone)]
pub struct GuardrailConfig {
    pub blocked_words: Vec<String>,
    pub max_query_tokens: usize,
    pub max_document_tokens: usize,
}

impl Default for GuardrailConfig {
    fn default() -> Self {
        Self {
            blocked_words: DEFAULT_BLOCKED_WORDS.iter().map(|w| w.to_string()).collect(),
            max_query_tokens: 100,
            max_document_tokens: 3500,
        }
    }
}

/// Bounds on the in-memory session map.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub max_sessions: usize,
    /// Sessions idle for longer than this are dropped.
    pub idle_ttl: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_sessions: DEFAULT_MAX_SESSIONS,
            idle_ttl: Duration::from_secs(DEFAULT_SESSION_TTL_SECS),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FrontendConfig {
    pub static_dir: PathBuf,
}

#[derive(Debug, Clone)]
pub struct ObservabilityConfig {
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
}

impl GatewayConfig {
    pub fn load() -> Result<Self, AppError> {
        let common_config = core_config::Config::load()?;
        let is_prod = env::var("ENVIRONMENT").unwrap_or_else(|_| "dev".to_string()) == "prod";

        let prompt_defaults = PromptConfig::default();
        let guard_defaults = GuardrailConfig::default();

        let kind: ProviderKind = get_env("ADVISOR_PROVIDER", Some("gemini"), is_prod)?.parse()?;
        // The key is only mandatory when a real provider will be called
        let api_key = match kind {
            ProviderKind::Gemini => get_env("GOOGLE_API_KEY", None, is_prod)?,
            ProviderKind::Mock => env::var("GOOGLE_API_KEY").unwrap_or_default(),
        };

        Ok(GatewayConfig {
            common: common_config,
            provider: ProviderConfig {
                kind,
                api_key: Secret::new(api_key),
                model: get_env("ADVISOR_MODEL", Some(DEFAULT_MODEL), is_prod)?,
                api_base: get_env("GEMINI_API_BASE", Some(DEFAULT_GEMINI_API_BASE), is_prod)?,
                timeout: Duration::from_secs(get_parsed(
                    "ADVISOR_PROVIDER_TIMEOUT_SECS",
                    DEFAULT_PROVIDER_TIMEOUT_SECS,
                    is_prod,
                )?),
            },
            prompt: PromptConfig {
                guidance: get_env("ADVISOR_GUIDANCE", Some(DEFAULT_GUIDANCE), is_prod)?,
                max_history_turns: get_parsed(
                    "ADVISOR_MAX_HISTORY_TURNS",
                    prompt_defaults.max_history_turns,
                    is_prod,
                )?,
                temperature: get_parsed("ADVISOR_TEMPERATURE", prompt_defaults.temperature, is_prod)?,
                top_p: get_parsed("ADVISOR_TOP_P", prompt_defaults.top_p, is_prod)?,
                max_output_tokens: get_parsed(
                    "ADVISOR_MAX_OUTPUT_TOKENS",
                    prompt_defaults.max_output_tokens,
                    is_prod,
                )?,
            },
            guardrails: GuardrailConfig {
                blocked_words: match env::var("ADVISOR_BLOCKED_WORDS") {
                    Ok(list) => parse_word_list(&list),
                    Err(_) if is_prod => {
                        return Err(AppError::ConfigError(anyhow::anyhow!(
                            "ADVISOR_BLOCKED_WORDS is required in production but not set"
                        )))
                    }
                    Err(_) => guard_defaults.blocked_words,
                },
                max_query_tokens: get_parsed(
                    "ADVISOR_MAX_QUERY_TOKENS",
                    guard_defaults.max_query_tokens,
                    is_prod,
                )?,
                max_document_tokens: get_parsed(
                    "ADVISOR_MAX_DOCUMENT_TOKENS",
                    guard_defaults.max_document_tokens,
                    is_prod,
                )?,
            },
            sessions: SessionConfig {
                max_sessions: get_parsed("ADVISOR_MAX_SESSIONS", DEFAULT_MAX_SESSIONS, is_prod)?,
                idle_ttl: Duration::from_secs(get_parsed(
                    "ADVISOR_SESSION_TTL_SECS",
                    DEFAULT_SESSION_TTL_SECS,
                    is_prod,
                )?),
            },
            frontend: FrontendConfig {
                static_dir: match env::var("ADVISOR_STATIC_DIR") {
                    Ok(dir) => PathBuf::from(dir),
                    Err(_) => default_static_dir(),
                },
            },
            observability: ObservabilityConfig {
                log_level: get_env("LOG_LEVEL", Some("info"), is_prod)?,
                otlp_endpoint: env::var("OTLP_ENDPOINT").ok().filter(|s| !s.is_empty()),
            },
        })
    }
}

/// Locate `static/` whether we run from the workspace root or the crate dir.
fn default_static_dir() -> PathBuf {
    let base_path = env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    if base_path.ends_with("advisor-gateway") {
        base_path.join("static")
    } else {
        base_path.join("advisor-gateway").join("static")
    }
}

/// Split a comma-separated list, dropping blanks.
pub fn parse_word_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|w| !w.is_empty())
        .map(str::to_string)
        .collect()
}

fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => {
            if is_prod {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required in production but not set",
                    key
                )))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required but not set",
                    key
                )))
            }
        }
    }
}

fn get_parsed<T>(key: &str, default: T, is_prod: bool) -> Result<T, AppError>
where
    T: FromStr + ToString,
    T::Err: std::fmt::Display,
{
    get_env(key, Some(&default.to_string()), is_prod)?
        .trim()
        .parse()
        .map_err(|e: T::Err| {
            AppError::ConfigError(anyhow::anyhow!("{} has an invalid value: {}", key, e))
        })
}
