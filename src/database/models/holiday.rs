use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::database::repository::Model;
use crate::filter::FilterData;
use crate::types::Collection;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Holiday {
    pub id: Uuid,
    pub school_id: Uuid,
    pub name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

impl Holiday {
    pub const WEEKLY_NAME: &'static str = "Weekly Holiday";

    /// Single-day weekly holiday for `school_id`
    pub fn weekly(school_id: Uuid, date: NaiveDate) -> Self {
        Self {
            id: Uuid::new_v4(),
            school_id,
            name: Self::WEEKLY_NAME.to_string(),
            start_date: date,
            end_date: date,
            description: None,
            is_active: true,
        }
    }

    pub fn day_filter(&self) -> FilterData {
        FilterData::where_(json!({
            "schoolId": self.school_id,
            "name": self.name,
            "startDate": self.start_date,
        }))
    }
}

impl Model for Holiday {
    const COLLECTION: Collection = Collection::Holidays;
}
