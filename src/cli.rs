//! Interface de linha de comando do volimport baseada em clap.
//!
//! Define a struct [`Cli`] com subcomandos [`Command`] (create, zones, config)
//! e flags globais (--config, --endpoint, --region, --verbose).

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// volimport: cria volumes de block storage a partir de manifestos de imagem.
#[derive(Debug, Parser)]
#[command(name = "volimport", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Caminho para o arquivo TOML de configuração (padrão: ./volimport.toml).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Endpoint da API de compute; sobrepõe arquivo e ambiente.
    #[arg(long, global = true)]
    pub endpoint: Option<String>,

    /// Região; sobrepõe arquivo e ambiente.
    #[arg(long, global = true)]
    pub region: Option<String>,

    /// Habilita logs de debug.
    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Importa um volume a partir da URL do manifesto e espera até ficar disponível.
    Create {
        /// URL do manifesto de importação.
        manifest_url: String,

        /// Imprime o registro completo em JSON em vez de só o ID do volume.
        #[arg(long)]
        json: bool,
    },

    /// Lista as zonas de disponibilidade onde um volume pode ser criado.
    Zones,

    /// Mostra a configuração efetiva.
    Config,
}
