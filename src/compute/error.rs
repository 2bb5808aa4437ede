//! Tipos de erro para o cliente da API de compute.
//!
//! Define [`ClientError`] com variantes para throttling, erros da API,
//! erros de rede e respostas que não puderam ser decodificadas.

use thiserror::Error;

/// Erros retornados por uma chamada de [`ComputeClient`](super::ComputeClient).
#[derive(Debug, Error)]
pub enum ClientError {
    /// O serviço retornou HTTP 429; `retry_after_ms` vem do header `retry-after`.
    #[error("throttled, retry after {retry_after_ms}ms")]
    Throttled { retry_after_ms: u64 },

    /// Qualquer outro status de erro, com o corpo da resposta como mensagem.
    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("decoding {operation} response: {source}")]
    Decode {
        operation: &'static str,
        #[source]
        source: serde_json::Error,
    },
}
