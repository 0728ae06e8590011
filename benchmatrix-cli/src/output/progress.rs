//! Progress spinners for matrix runs

use benchmatrix_core::{MatrixError, RunObserver, Variant};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

const SPINNER_TEMPLATE: &str = "{spinner:.cyan} [{elapsed_precise}] {msg}";

/// One spinner per running variant
pub struct ProgressObserver {
    multi: MultiProgress,
    bars: Mutex<HashMap<String, ProgressBar>>,
}

impl ProgressObserver {
    #[must_use]
    pub fn new() -> Self {
        Self {
            multi: MultiProgress::new(),
            bars: Mutex::new(HashMap::new()),
        }
    }

    fn take(&self, variant: &Variant) -> Option<ProgressBar> {
        self.bars
            .lock()
            .ok()
            .and_then(|mut bars| bars.remove(&variant.name))
    }
}

impl Default for ProgressObserver {
    fn default() -> Self {
        Self::new()
    }
}

impl RunObserver for ProgressObserver {
    fn matrix_started(&self, variants: &[Variant]) {
        let names: Vec<&str> = variants.iter().map(|v| v.name.as_str()).collect();
        let _ = self
            .multi
            .println(format!("Running {} variant(s): {}", names.len(), names.join(", ")));
    }

    fn variant_started(&self, variant: &Variant) {
        let bar = self.multi.add(spinner(&format!("{}: running", variant.name)));
        if let Ok(mut bars) = self.bars.lock() {
            bars.insert(variant.name.clone(), bar);
        }
    }

    fn variant_finished(&self, variant: &Variant, elapsed: Duration, capture_bytes: usize) {
        if let Some(bar) = self.take(variant) {
            bar.finish_with_message(format!(
                "{}: done in {:.1}s ({capture_bytes} bytes captured)",
                variant.name,
                elapsed.as_secs_f64()
            ));
        }
    }

    fn variant_failed(&self, variant: &Variant, error: &MatrixError) {
        if let Some(bar) = self.take(variant) {
            let reason = error.to_string();
            let first_line = reason.lines().next().unwrap_or_default().to_string();
            bar.abandon_with_message(format!("{}: {first_line}", variant.name));
        }
    }
}

#[must_use]
pub fn spinner(operation: &str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template(SPINNER_TEMPLATE)
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message(operation.to_string());
    spinner.enable_steady_tick(Duration::from_millis(80));
    spinner
}
