//! Product name normalization.
//!
//! Marketplace listings carry long supplier-specific names. Reports and
//! purchase prices are keyed by a shorter group name obtained by stripping
//! known supplier prefixes.

/// Prefixes stripped by default, checked in order.
pub const DEFAULT_PREFIXES: &[&str] = &["Получешки Colibri ", "Полупальцы Colibri "];

/// Canonicalizes raw product names to grouping keys.
#[derive(Debug, Clone)]
pub struct ProductNameNormalizer {
    prefixes: Vec<String>,
}

impl ProductNameNormalizer {
    pub fn new(prefixes: Vec<String>) -> Self {
        Self { prefixes }
    }

    /// Strip the first matching prefix and trim the remainder.
    ///
    /// Total and deterministic: unmatched names pass through (trimmed).
    /// A name that consists only of a prefix keeps its original text so
    /// the group key is never empty.
    pub fn normalize(&self, raw: &str) -> String {
        let trimmed = raw.trim_start();
        for prefix in &self.prefixes {
            if let Some(rest) = trimmed.strip_prefix(prefix.as_str()) {
                let rest = rest.trim();
                if !rest.is_empty() {
                    return rest.to_string();
                }
            }
        }
        raw.trim().to_string()
    }
}

impl Default for ProductNameNormalizer {
    fn default() -> Self {
        Self::new(DEFAULT_PREFIXES.iter().map(|p| p.to_string()).collect())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
