use chrono::NaiveDate;
use serde::{Serialize, Serializer};

use crate::utils::time::format_iso_date;

use super::session::{Answer, Session};

/// Payload sent to the ledger. Built once when the user submits and never edited afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckinRecord {
    #[serde(serialize_with = "serialize_date")]
    pub date: NaiveDate,
    pub skincare: Answer,
    pub zero_sugar: Answer,
    pub notes: String,
}

impl CheckinRecord {
    pub fn from_session(session: &Session, date: NaiveDate) -> Self {
        Self {
            date,
            skincare: session.skincare(),
            zero_sugar: session.zero_sugar(),
            notes: session.notes().to_owned(),
        }
    }
}

fn serialize_date<S>(date: &NaiveDate, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&format_iso_date(*date))
}
