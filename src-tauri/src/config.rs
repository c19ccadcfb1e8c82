use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::error::{AppError, AppResult};

const CONFIG_FILE: &str = "config.toml";

/// Default configuration embedded in the binary
const DEFAULT_CONFIG: &str = r#"
[company]
name = "Medstore Pharma & Surgical"
address = ""
phone = ""
header_text = ""
footer_text = "Thank you for your business."

[numbering]
sale = "INV"
purchase = "PUR"
sales_return = "SRT"
purchase_return = "PRT"
collection = "CRV"
payment = "CPV"
cash_book = "CB"
voucher = "JV"
padding = 4

[inventory]
enforce_stock = false

[print]
receipt_width = 42

[data]
seed_mock_data = true

[logging]
filter = "info,medstore_ledger_lib=debug"
"#;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub company: CompanyConfig,
    pub numbering: NumberingConfig,
    pub inventory: InventoryConfig,
    pub print: PrintConfig,
    pub data: DataConfig,
    pub logging: LoggingConfig,
}

/// Header and footer block printed on every exported document.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CompanyConfig {
    pub name: String,
    pub address: String,
    pub phone: String,
    pub header_text: String,
    pub footer_text: String,
}

impl Default for CompanyConfig {
    fn default() -> Self {
        Self {
            name: "Medstore Pharma & Surgical".into(),
            address: String::new(),
            phone: String::new(),
            header_text: String::new(),
            footer_text: "Thank you for your business.".into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NumberingConfig {
    pub sale: String,
    pub purchase: String,
    pub sales_return: String,
    pub purchase_return: String,
    pub collection: String,
    pub payment: String,
    pub cash_book: String,
    pub voucher: String,
    /// Width of the zero-padded counter, `4` gives `INV-2024-0001`.
    pub padding: usize,
}

impl Default for NumberingConfig {
    fn default() -> Self {
        Self {
            sale: "INV".into(),
            purchase: "PUR".into(),
            sales_return: "SRT".into(),
            purchase_return: "PRT".into(),
            collection: "CRV".into(),
            payment: "CPV".into(),
            cash_book: "CB".into(),
            voucher: "JV".into(),
            padding: 4,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct InventoryConfig {
    /// Reject saves that would take an item's stock below zero.
    pub enforce_stock: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PrintConfig {
    /// Characters per line on the thermal printer (32 for 58mm, 42/48 for 80mm).
    pub receipt_width: usize,
}

impl Default for PrintConfig {
    fn default() -> Self {
        Self { receipt_width: 42 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    pub seed_mock_data: bool,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            seed_mock_data: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info,medstore_ledger_lib=debug".into(),
        }
    }
}

impl AppConfig {
    pub fn from_toml_str(contents: &str) -> AppResult<Self> {
        toml::from_str(contents).map_err(|e| AppError::Config(format!("invalid config: {e}")))
    }

    pub fn embedded() -> AppResult<Self> {
        Self::from_toml_str(DEFAULT_CONFIG)
    }
}

/// Load configuration from config.toml
///
/// Search order:
/// 1. Next to the executable
/// 2. The current working directory
/// 3. Falls back to the embedded default config
pub fn load_config() -> AppResult<AppConfig> {
    for path in candidate_paths() {
        if path.exists() {
            return load_from(&path);
        }
    }
    tracing::info!("config.toml not found, using embedded defaults");
    AppConfig::embedded()
}

pub fn load_from(path: &Path) -> AppResult<AppConfig> {
    tracing::info!("loading config from {}", path.display());
    let contents = std::fs::read_to_string(path)?;
    AppConfig::from_toml_str(&contents)
}

fn candidate_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();
    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            paths.push(exe_dir.join(CONFIG_FILE));
        }
    }
    if let Ok(cwd) = std::env::current_dir() {
        paths.push(cwd.join(CONFIG_FILE));
    }
    paths
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_config_loads() {
        let config = AppConfig::embedded().unwrap();
        assert_eq!(config.numbering.sale, "INV");
        assert_eq!(config.numbering.padding, 4);
        assert_eq!(config.print.receipt_width, 42);
        assert!(config.data.seed_mock_data);
        assert!(!config.inventory.enforce_stock);
    }

    #[test]
    fn partial_config_keeps_defaults() {
        let config = AppConfig::from_toml_str(
            r#"
            [inventory]
            enforce_stock = true

            [numbering]
            sale = "SI"
            "#,
        )
        .unwrap();
        assert!(config.inventory.enforce_stock);
        assert_eq!(config.numbering.sale, "SI");
        assert_eq!(config.numbering.purchase, "PUR");
        assert_eq!(config.company.footer_text, "Thank you for your business.");
    }

    #[test]
    fn malformed_config_is_a_config_error() {
        let err = AppConfig::from_toml_str("[print]\nreceipt_width = \"wide\"").unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }
}
