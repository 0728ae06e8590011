//! Ordered variant declarations and OS-dependent resolution
//!
//! The first resolved entry is always the baseline: the unmodified program
//! with no variant selector. Declared variants follow in declaration order,
//! minus the ones the current OS cannot build.

use crate::error::{MatrixError, MatrixResult};
use serde::{Deserialize, Serialize};

/// Name of the implicit baseline variant
pub const BASELINE: &str = "default";

/// One build/runtime configuration of the program under test
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variant {
    pub name: String,
    /// Extra suite arguments selecting this variant; empty means "use the
    /// suite's `variant_args` template"
    #[serde(default)]
    pub selector: Vec<String>,
    /// OS label tokens (case-insensitive substrings) this variant cannot run on
    #[serde(default)]
    pub unsupported_on: Vec<String>,
}

impl Variant {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            selector: Vec::new(),
            unsupported_on: Vec::new(),
        }
    }

    #[must_use]
    pub fn unsupported_on(mut self, os_token: impl Into<String>) -> Self {
        self.unsupported_on.push(os_token.into());
        self
    }

    #[must_use]
    pub fn baseline() -> Self {
        Self::new(BASELINE)
    }

    #[must_use]
    pub fn is_baseline(&self) -> bool {
        self.name == BASELINE
    }

    /// Whether this variant can run on a host with the given OS label
    #[must_use]
    pub fn supports(&self, os_label: &str) -> bool {
        let os = os_label.to_lowercase();
        !self
            .unsupported_on
            .iter()
            .any(|token| !token.is_empty() && os.contains(&token.to_lowercase()))
    }
}

/// Declared alternative variants, in report column order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariantRegistry {
    declared: Vec<Variant>,
}

impl Default for VariantRegistry {
    fn default() -> Self {
        Self {
            declared: vec![
                Variant::new("jemalloc").unsupported_on("windows"),
                Variant::new("snmalloc").unsupported_on("windows"),
                Variant::new("mimalloc"),
                Variant::new("rpmalloc"),
                Variant::new("smalloc"),
            ],
        }
    }
}

impl VariantRegistry {
    /// Build a registry from explicit declarations.
    ///
    /// The baseline is implicit and must not be declared; names must be
    /// unique and usable as file name components.
    pub fn new(declared: Vec<Variant>) -> MatrixResult<Self> {
        let mut seen = Vec::with_capacity(declared.len());
        for variant in &declared {
            validate_name(&variant.name)?;
            if variant.is_baseline() {
                return Err(MatrixError::config(
                    format!("'{BASELINE}' is the implicit baseline and cannot be declared"),
                    "remove it from the [[variants]] list",
                ));
            }
            if seen.contains(&variant.name.as_str()) {
                return Err(MatrixError::config(
                    format!("variant '{}' is declared twice", variant.name),
                    "keep a single declaration per variant",
                ));
            }
            seen.push(variant.name.as_str());
        }
        Ok(Self { declared })
    }

    #[must_use]
    pub fn declared(&self) -> &[Variant] {
        &self.declared
    }

    /// Baseline first, then every declared variant supported on `os_label`
    #[must_use]
    pub fn resolve(&self, os_label: &str) -> Vec<Variant> {
        let mut resolved = Vec::with_capacity(self.declared.len() + 1);
        resolved.push(Variant::baseline());
        for variant in &self.declared {
            if variant.supports(os_label) {
                resolved.push(variant.clone());
            } else {
                tracing::debug!(variant = %variant.name, os = %os_label, "Variant unsupported on this OS, skipping");
            }
        }
        resolved
    }

    /// Restrict a resolved sequence to the operator's selection.
    ///
    /// Registry order wins over selection order and the baseline is always
    /// kept. An empty selection keeps everything.
    pub fn select(
        resolved: &[Variant],
        selection: &[String],
        os_label: &str,
    ) -> MatrixResult<Vec<Variant>> {
        if selection.is_empty() {
            return Ok(resolved.to_vec());
        }
        for name in selection {
            if !resolved.iter().any(|variant| &variant.name == name) {
                return Err(MatrixError::UnknownVariant {
                    name: name.clone(),
                    os: os_label.to_string(),
                    available: resolved
                        .iter()
                        .map(|variant| variant.name.as_str())
                        .collect::<Vec<_>>()
                        .join(", "),
                });
            }
        }
        Ok(resolved
            .iter()
            .filter(|variant| variant.is_baseline() || selection.contains(&variant.name))
            .cloned()
            .collect())
    }
}

fn validate_name(name: &str) -> MatrixResult<()> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(MatrixError::config(
            format!("variant name '{name}' is not a valid file name component"),
            "use ASCII letters, digits, '-' or '_'",
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(variants: &[Variant]) -> Vec<&str> {
        variants.iter().map(|v| v.name.as_str()).collect()
    }

    #[test]
    fn resolves_full_list_on_linux() {
        let resolved = VariantRegistry::default().resolve("Ubuntu 24.04 LTS");
        assert_eq!(
            names(&resolved),
            ["default", "jemalloc", "snmalloc", "mimalloc", "rpmalloc", "smalloc"]
        );
        assert!(resolved[0].is_baseline());
    }

    #[test]
    fn drops_restricted_variants_on_windows() {
        let resolved = VariantRegistry::default().resolve("Microsoft Windows 11 Pro");
        assert_eq!(
            names(&resolved),
            ["default", "mimalloc", "rpmalloc", "smalloc"]
        );
    }

    #[test]
    fn selection_keeps_registry_order_and_baseline() {
        let resolved = VariantRegistry::default().resolve("linux");
        let picked = VariantRegistry::select(
            &resolved,
            &["smalloc".to_string(), "jemalloc".to_string()],
            "linux",
        )
        .unwrap();
        assert_eq!(names(&picked), ["default", "jemalloc", "smalloc"]);
    }

    #[test]
    fn selecting_an_excluded_variant_is_an_error() {
        let resolved = VariantRegistry::default().resolve("Windows");
        let err = VariantRegistry::select(&resolved, &["jemalloc".to_string()], "Windows")
            .unwrap_err();
        assert!(matches!(err, MatrixError::UnknownVariant { .. }));
        assert!(err.to_string().contains("mimalloc"));
    }

    #[test]
    fn rejects_declared_baseline_and_duplicates() {
        assert!(VariantRegistry::new(vec![Variant::baseline()]).is_err());
        assert!(
            VariantRegistry::new(vec![Variant::new("mimalloc"), Variant::new("mimalloc")])
                .is_err()
        );
        assert!(VariantRegistry::new(vec![Variant::new("bad name")]).is_err());
        assert!(VariantRegistry::new(vec![Variant::new("tcmalloc")]).is_ok());
    }
}
