use serde::{Deserialize, Serialize};

use crate::field::{Field, FEATURES};
use crate::table::RawRecord;

/// One validated patient observation. Every categorical code is in its
/// legal set and every numeric value is within its domain; only the repair
/// engine constructs these from raw input.
///
/// Field order matches the canonical CSV layout, so `csv` serialization
/// writes columns in canonical order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CanonicalRecord {
    pub age: i64,
    pub sex: i64,
    pub cp: i64,
    pub trestbps: i64,
    pub chol: i64,
    pub fbs: i64,
    pub restecg: i64,
    pub thalach: i64,
    pub exang: i64,
    pub oldpeak: f64,
    pub slope: i64,
    pub ca: i64,
    pub thal: i64,
}

impl CanonicalRecord {
    /// Numeric value of a feature. `target` is not a feature and reads as NaN.
    pub fn value(&self, field: Field) -> f64 {
        match field {
            Field::Oldpeak => self.oldpeak,
            Field::Target => f64::NAN,
            other => self.code(other).map(|c| c as f64).unwrap_or(f64::NAN),
        }
    }

    /// Integer value of a feature; `None` for `oldpeak` and `target`.
    pub fn code(&self, field: Field) -> Option<i64> {
        Some(match field {
            Field::Age => self.age,
            Field::Sex => self.sex,
            Field::Cp => self.cp,
            Field::Trestbps => self.trestbps,
            Field::Chol => self.chol,
            Field::Fbs => self.fbs,
            Field::Restecg => self.restecg,
            Field::Thalach => self.thalach,
            Field::Exang => self.exang,
            Field::Slope => self.slope,
            Field::Ca => self.ca,
            Field::Thal => self.thal,
            Field::Oldpeak | Field::Target => return None,
        })
    }

    /// The record as raw canonical input, e.g. to replay it through the
    /// prediction path.
    pub fn to_raw(&self) -> RawRecord {
        FEATURES
            .into_iter()
            .map(|f| (f.name(), self.value(f)))
            .collect()
    }
}

/// A record with its binarized training label.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LabeledRecord {
    pub record: CanonicalRecord,
    pub target: u8,
}

#[cfg(test)]
pub(crate) fn sample_record() -> CanonicalRecord {
    CanonicalRecord {
        age: 63,
        sex: 1,
        cp: 3,
        trestbps: 145,
        chol: 233,
        fbs: 1,
        restecg: 0,
        thalach: 150,
        exang: 0,
        oldpeak: 2.3,
        slope: 3,
        ca: 0,
        thal: 6,
    }
}
