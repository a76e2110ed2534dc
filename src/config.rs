// src/config.rs

use std::collections::HashMap;
use std::env;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use secrecy::SecretString;
use url::Url;

use crate::utils::normalize_chain_id;

const DEFAULT_RPC_URLS: &[(&str, &str)] = &[
    ("1", "https://ethereum-rpc.publicnode.com"),
    ("11155111", "https://ethereum-sepolia-rpc.publicnode.com"),
];

// A struct to hold all configuration, loaded once at startup from the .env file.
#[derive(Clone, Debug)]
pub struct Config {
    // Server settings
    pub port: u16,

    /// Chain id -> JSON-RPC URL. The public defaults are rate limited.
    pub chain_rpc_urls: HashMap<String, String>,
    /// Chain the environment handle is bound to.
    pub default_chain_id: String,

    /// Present => the environment is read-write.
    pub tx_private_key: Option<SecretString>,

    // External services
    pub swap_api_url: String,
    pub swap_api_key: Option<String>,
    pub bridge_api_url: String,
    pub bridge_api_key: Option<String>,

    // Routing
    pub llm_api_url: String,
    pub llm_api_key: Option<String>,
    pub llm_model: String,

    pub http_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            port: 8080,
            chain_rpc_urls: DEFAULT_RPC_URLS
                .iter()
                .map(|(id, url)| (id.to_string(), url.to_string()))
                .collect(),
            default_chain_id: "1".to_string(),
            tx_private_key: None,
            swap_api_url: "https://api.0x.org".to_string(),
            swap_api_key: None,
            bridge_api_url: "https://li.quest/v1".to_string(),
            bridge_api_key: None,
            llm_api_url: "https://api.openai.com/v1".to_string(),
            llm_api_key: None,
            llm_model: "gpt-4o-mini".to_string(),
            http_timeout: Duration::from_secs(30),
        }
    }
}

impl Config {
    /// Returns a list of configured chain IDs
    pub fn supported_chains(&self) -> Vec<String> {
        let mut chains: Vec<String> = self.chain_rpc_urls.keys().cloned().collect();
        chains.sort();
        chains
    }

    /// RPC URL for the default chain.
    pub fn rpc_url(&self) -> Result<&str> {
        self.chain_rpc_urls
            .get(&self.default_chain_id)
            .map(String::as_str)
            .ok_or_else(|| {
                anyhow!(
                    "no RPC URL configured for chain {} (configured: {})",
                    self.default_chain_id,
                    self.supported_chains().join(", ")
                )
            })
    }

    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        // Load variables from the .env file into the environment
        dotenvy::dotenv().ok();
        Self::from_vars(|key| env::var(key).ok())
    }

    /// Builds configuration from an arbitrary variable lookup. Blank values
    /// count as unset.
    pub fn from_vars<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Config::default();

        let chain_rpc_urls = match var("CHAIN_RPC_URLS") {
            Some(raw) => {
                let parsed: HashMap<String, String> = serde_json::from_str(&raw)
                    .context("Invalid CHAIN_RPC_URLS JSON format; expected {\"<chain id>\": \"<url>\"}")?;
                parsed
                    .into_iter()
                    .map(|(id, url)| (normalize_chain_id(&id), url))
                    .collect()
            }
            None => defaults.chain_rpc_urls,
        };
        for (chain_id, url) in &chain_rpc_urls {
            check_url(&format!("CHAIN_RPC_URLS[{}]", chain_id), url)?;
        }

        let default_chain_id = var("DEFAULT_CHAIN_ID")
            .map(|id| normalize_chain_id(&id))
            .unwrap_or(defaults.default_chain_id);
        if default_chain_id.parse::<u64>().is_err() {
            return Err(anyhow!("DEFAULT_CHAIN_ID must be a chain id or a known alias, got '{}'", default_chain_id));
        }

        let port = match var("PORT") {
            Some(p) => p.parse().context("PORT must be a valid number")?,
            None => defaults.port,
        };
        let http_timeout = match var("HTTP_TIMEOUT_SECS") {
            Some(t) => Duration::from_secs(t.parse().context("HTTP_TIMEOUT_SECS must be a whole number of seconds")?),
            None => defaults.http_timeout,
        };

        let url_var = |key: &str, default: String| -> Result<String> {
            let value = var(key).unwrap_or(default);
            check_url(key, &value)?;
            Ok(value.trim_end_matches('/').to_string())
        };

        let config = Config {
            port,
            chain_rpc_urls,
            default_chain_id,
            tx_private_key: var("TX_PRIVATE_KEY").map(SecretString::new),
            swap_api_url: url_var("SWAP_API_URL", defaults.swap_api_url)?,
            swap_api_key: var("SWAP_API_KEY"),
            bridge_api_url: url_var("BRIDGE_API_URL", defaults.bridge_api_url)?,
            bridge_api_key: var("BRIDGE_API_KEY"),
            llm_api_url: url_var("LLM_API_URL", defaults.llm_api_url)?,
            llm_api_key: var("LLM_API_KEY"),
            llm_model: var("LLM_MODEL").unwrap_or(defaults.llm_model),
            http_timeout,
        };
        config.rpc_url()?;
        Ok(config)
    }
}

fn check_url(key: &str, value: &str) -> Result<()> {
    let parsed = Url::parse(value).with_context(|| format!("{} is not a valid URL: '{}'", key, value))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(anyhow!("{} must use http or https, got '{}'", key, other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn empty_environment_uses_public_defaults() {
        let config = Config::from_vars(vars(&[])).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.default_chain_id, "1");
        assert_eq!(config.rpc_url().unwrap(), "https://ethereum-rpc.publicnode.com");
        assert_eq!(config.swap_api_url, "https://api.0x.org");
        assert!(config.tx_private_key.is_none());
        assert!(config.llm_api_key.is_none());
    }

    #[test]
    fn aliases_and_overrides_apply() {
        let config = Config::from_vars(vars(&[
            ("DEFAULT_CHAIN_ID", "sepolia"),
            ("TX_PRIVATE_KEY", "0xabc"),
            ("SWAP_API_URL", "http://localhost:9000/"),
            ("PORT", "9999"),
        ]))
        .unwrap();
        assert_eq!(config.default_chain_id, "11155111");
        assert_eq!(config.tx_private_key.unwrap().expose_secret(), "0xabc");
        assert_eq!(config.swap_api_url, "http://localhost:9000");
        assert_eq!(config.port, 9999);
    }

    #[test]
    fn invalid_values_are_startup_errors() {
        assert!(Config::from_vars(vars(&[("PORT", "eighty")])).is_err());
        assert!(Config::from_vars(vars(&[("CHAIN_RPC_URLS", "not json")])).is_err());
        assert!(Config::from_vars(vars(&[("SWAP_API_URL", "ftp://example.com")])).is_err());
        assert!(Config::from_vars(vars(&[("DEFAULT_CHAIN_ID", "137")])).is_err());
    }
}
