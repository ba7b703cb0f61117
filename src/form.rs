//! Single-record form: typed input, range policy, conversion to a record.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::InputBounds;
use crate::encoder::CategoricalEncoder;
use crate::record::EmployeeRecord;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FormError {
    #[error("{field} must be between {min} and {max}, got {value}")]
    OutOfRange {
        field: &'static str,
        min: u32,
        max: u32,
        value: i64,
    },
}

/// Form payload. Identity fields are display-only. A model field left out
/// of the payload surfaces later as a missing-field encode error.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SingleRecordForm {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub surname: Option<String>,
    #[serde(default, rename = "IDNumber")]
    pub id_number: Option<String>,
    pub age: Option<i64>,
    pub business_travel: Option<String>,
    pub department: Option<String>,
    pub education: Option<i64>,
    pub education_field: Option<String>,
    pub gender: Option<String>,
    pub job_role: Option<String>,
    pub marital_status: Option<String>,
    pub monthly_income: Option<i64>,
    pub over_time: Option<String>,
}

fn check(field: &'static str, value: Option<i64>, min: u32, max: u32) -> Result<(), FormError> {
    match value {
        Some(v) if !(i64::from(min)..=i64::from(max)).contains(&v) => Err(FormError::OutOfRange {
            field,
            min,
            max,
            value: v,
        }),
        _ => Ok(()),
    }
}

impl SingleRecordForm {
    pub fn validate(&self, b: &InputBounds) -> Result<(), FormError> {
        check("Age", self.age, b.age_min, b.age_max)?;
        check("Education", self.education, b.education_min, b.education_max)?;
        check("MonthlyIncome", self.monthly_income, b.income_min, b.income_max)?;
        Ok(())
    }

    /// Field order mirrors the form layout; absent model fields stay absent.
    pub fn into_record(self) -> EmployeeRecord {
        let mut r = EmployeeRecord::new();
        r.insert("Name", self.name.unwrap_or_default());
        r.insert("Surname", self.surname.unwrap_or_default());
        r.insert("IDNumber", self.id_number.unwrap_or_default());
        let fields: [(&str, Option<serde_json::Value>); 10] = [
            ("Age", self.age.map(Into::into)),
            ("BusinessTravel", self.business_travel.map(Into::into)),
            ("Department", self.department.map(Into::into)),
            ("Education", self.education.map(Into::into)),
            ("EducationField", self.education_field.map(Into::into)),
            ("Gender", self.gender.map(Into::into)),
            ("JobRole", self.job_role.map(Into::into)),
            ("MaritalStatus", self.marital_status.map(Into::into)),
            ("MonthlyIncome", self.monthly_income.map(Into::into)),
            ("OverTime", self.over_time.map(Into::into)),
        ];
        for (k, v) in fields {
            if let Some(v) = v {
                r.insert(k, v);
            }
        }
        r
    }
}

/// Options served to the form: select choices per categorical field + bounds.
#[derive(Debug, Clone, Serialize)]
pub struct FormOptions {
    pub choices: Vec<FieldChoices>,
    pub bounds: InputBounds,
}

#[derive(Debug, Clone, Serialize)]
pub struct FieldChoices {
    pub field: &'static str,
    pub values: Vec<&'static str>,
}

pub fn form_options(encoder: &CategoricalEncoder, bounds: InputBounds) -> FormOptions {
    FormOptions {
        choices: encoder
            .mappings()
            .iter()
            .map(|m| FieldChoices {
                field: m.field,
                values: m.values().collect(),
            })
            .collect(),
        bounds,
    }
}
