//! Interface de terminal do volimport: spinner e saída colorida.
//!
//! Usa as crates `indicatif` para o spinner e `console` para estilização.
//! O spinner desenha em stderr, então a saída em stdout continua limpa.

use std::time::Duration;

use console::Style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::compute::AvailabilityZone;
use crate::error::ProvisionError;
use crate::provision::ProvisionRecord;

/// Indicador visual de progresso durante uma importação.
pub struct ImportProgress {
    pb: ProgressBar,
    green: Style,
    red: Style,
}

impl ImportProgress {
    pub fn start(manifest_url: &str) -> Self {
        let pb = ProgressBar::new_spinner();
        if let Ok(style) =
            ProgressStyle::default_spinner().template("{spinner:.cyan} {msg} [{elapsed}]")
        {
            pb.set_style(style);
        }
        pb.set_message(format!("importing volume from {manifest_url}"));
        pb.enable_steady_tick(Duration::from_millis(100));

        Self {
            pb,
            green: Style::new().green().bold(),
            red: Style::new().red().bold(),
        }
    }

    /// Finaliza o spinner e exibe o resultado em stderr.
    ///
    /// Sucesso é mostrado em verde com checkmark; falha em vermelho com X.
    pub fn complete(&self, outcome: Result<&ProvisionRecord, &ProvisionError>) {
        self.pb.finish_and_clear();
        match outcome {
            Ok(record) => eprintln!(
                "  {} volume {} available in {}",
                self.green.apply_to("✓"),
                record.volume_id,
                record.availability_zone
            ),
            Err(e) => eprintln!(
                "  {} import failed during {} ({}): {e}",
                self.red.apply_to("✗"),
                e.phase(),
                e.kind()
            ),
        }
    }
}

/// Formata a listagem de zonas, uma por linha.
pub fn format_zones(zones: &[AvailabilityZone]) -> String {
    let bold = Style::new().bold();
    zones
        .iter()
        .map(|z| format!("{}\t{}", bold.apply_to(&z.zone_name), z.state))
        .collect::<Vec<_>>()
        .join("\n")
}
