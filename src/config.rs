use crate::access::{LockoutPolicy, UserEntry};
use crate::error::Result;
use crate::schema::BudgetField;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Runtime settings for loading, column resolution and access control.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    /// Worksheet read from `.xlsx` exports.
    pub data_sheet: String,
    pub columns: ColumnNames,
    pub lockout: LockoutPolicy,
    /// Username -> credentials. Empty means the shell runs without a login gate.
    pub users: BTreeMap<String, UserEntry>,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            data_sheet: "Data".to_string(),
            columns: ColumnNames::default(),
            lockout: LockoutPolicy::default(),
            users: BTreeMap::new(),
        }
    }
}

impl AnalyzerConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Source header used for each semantic field of the export.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ColumnNames {
    pub financing_program: String,
    pub managing_center: String,
    pub period: String,
    pub budget_position: String,
    pub fund_type: String,
    pub initial_allocation: String,
    pub current_allocation: String,
    pub reprogrammed_allocation: String,
    pub disbursed: String,
    pub availability: String,
}

impl Default for ColumnNames {
    fn default() -> Self {
        Self {
            financing_program: "Progr.financiación".to_string(),
            managing_center: "Centro gestor".to_string(),
            period: "Per.presup.".to_string(),
            budget_position: "Pos.presupuestaria".to_string(),
            fund_type: "Fondos".to_string(),
            initial_allocation: "PAC inicial".to_string(),
            current_allocation: "PAC Actual".to_string(),
            reprogrammed_allocation: "PAC Reprogramado".to_string(),
            disbursed: "Girado y Recaudado PAC".to_string(),
            availability: "Disponibilidad PAC".to_string(),
        }
    }
}

impl ColumnNames {
    pub fn name(&self, field: BudgetField) -> &str {
        match field {
            BudgetField::FinancingProgram => &self.financing_program,
            BudgetField::ManagingCenter => &self.managing_center,
            BudgetField::Period => &self.period,
            BudgetField::BudgetPosition => &self.budget_position,
            BudgetField::FundType => &self.fund_type,
            BudgetField::InitialAllocation => &self.initial_allocation,
            BudgetField::CurrentAllocation => &self.current_allocation,
            BudgetField::ReprogrammedAllocation => &self.reprogrammed_allocation,
            BudgetField::Disbursed => &self.disbursed,
            BudgetField::Availability => &self.availability,
        }
    }

    /// All ten headers in `BudgetField::ALL` order.
    pub fn headers(&self) -> Vec<&str> {
        BudgetField::ALL.iter().map(|field| self.name(*field)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_export_headers() {
        let config = AnalyzerConfig::default();
        assert_eq!(config.data_sheet, "Data");
        assert_eq!(config.columns.name(BudgetField::Period), "Per.presup.");
        assert_eq!(
            config.columns.name(BudgetField::Disbursed),
            "Girado y Recaudado PAC"
        );
        assert_eq!(config.lockout.max_attempts, 5);
        assert_eq!(config.lockout.lock_minutes, 3);
        assert!(config.users.is_empty());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let json = r#"{
            "data_sheet": "Hoja1",
            "columns": { "managing_center": "Centro" },
            "users": {
                "contador": {
                    "password": "secreto",
                    "role": "Contador",
                    "permissions": ["seguridad", "analisis_pac"]
                }
            }
        }"#;

        let config = AnalyzerConfig::from_json_str(json).unwrap();
        assert_eq!(config.data_sheet, "Hoja1");
        assert_eq!(config.columns.managing_center, "Centro");
        assert_eq!(config.columns.period, "Per.presup.");
        assert_eq!(config.users["contador"].role, "Contador");
        assert_eq!(config.lockout, LockoutPolicy::default());
    }

    #[test]
    fn test_invalid_json_is_serialization_error() {
        let err = AnalyzerConfig::from_json_str("{ not json").unwrap_err();
        assert!(matches!(err, crate::error::PacError::Serialization(_)));
    }
}
