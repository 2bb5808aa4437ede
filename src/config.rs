//! Configuração do volimport carregada a partir de `volimport.toml`.
//!
//! A struct [`VolimportConfig`] contém todos os parâmetros configuráveis.
//! Valores não presentes no arquivo usam defaults sensíveis.
//! As variáveis `VOLIMPORT_ENDPOINT`, `VOLIMPORT_REGION` e
//! `VOLIMPORT_ACCESS_TOKEN` têm precedência sobre o arquivo.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

const DEFAULT_CONFIG_FILE: &str = "volimport.toml";

/// Configuração de nível superior carregada de `volimport.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VolimportConfig {
    /// URL base da API de compute.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_region")]
    pub region: String,

    /// Token bearer enviado à API de compute. Nunca é serializado de volta.
    #[serde(default, skip_serializing)]
    pub access_token: Option<String>,

    /// Timeout HTTP por requisição, em segundos.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Polling da tarefa de conversão.
    #[serde(default)]
    pub import_wait: WaitSettings,

    /// Polling do volume resultante.
    #[serde(default)]
    pub volume_wait: WaitSettings,
}

/// Atraso e número máximo de tentativas de uma espera.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaitSettings {
    #[serde(default = "default_delay_secs")]
    pub delay_secs: u64,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

fn default_endpoint() -> String {
    "http://localhost:8080/v1".to_string()
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_request_timeout_secs() -> u64 {
    60
}

// Valor padrão: 15s x 40 tentativas.
fn default_delay_secs() -> u64 {
    15
}

fn default_max_attempts() -> u32 {
    40
}

impl Default for WaitSettings {
    fn default() -> Self {
        Self {
            delay_secs: default_delay_secs(),
            max_attempts: default_max_attempts(),
        }
    }
}

impl WaitSettings {
    pub fn delay(&self) -> Duration {
        Duration::from_secs(self.delay_secs)
    }
}

impl Default for VolimportConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            region: default_region(),
            access_token: None,
            request_timeout_secs: default_request_timeout_secs(),
            import_wait: WaitSettings::default(),
            volume_wait: WaitSettings::default(),
        }
    }
}

impl VolimportConfig {
    /// Carrega `volimport.toml` do diretório atual, ou `path` quando informado.
    /// Arquivo padrão ausente resulta em defaults; arquivo explícito ausente é erro.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let default = Path::new(DEFAULT_CONFIG_FILE);
                if default.exists() {
                    Self::from_file(default)?
                } else {
                    Self::default()
                }
            }
        };

        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Ok(toml::from_str(&contents)?)
    }

    // Variáveis de ambiente têm precedência sobre o arquivo.
    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(endpoint) = lookup("VOLIMPORT_ENDPOINT")
            && !endpoint.is_empty()
        {
            self.endpoint = endpoint;
        }
        if let Some(region) = lookup("VOLIMPORT_REGION")
            && !region.is_empty()
        {
            self.region = region;
        }
        if let Some(token) = lookup("VOLIMPORT_ACCESS_TOKEN")
            && !token.is_empty()
        {
            self.access_token = Some(token);
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.endpoint.trim().is_empty() {
            return Err(ConfigError::Invalid("endpoint must not be empty".into()));
        }
        if self.region.trim().is_empty() {
            return Err(ConfigError::Invalid("region must not be empty".into()));
        }
        let waits = [
            ("import_wait", &self.import_wait),
            ("volume_wait", &self.volume_wait),
        ];
        for (name, wait) in waits {
            if wait.max_attempts == 0 {
                return Err(ConfigError::Invalid(format!(
                    "{name}.max_attempts must be at least 1"
                )));
            }
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
