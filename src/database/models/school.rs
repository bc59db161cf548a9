use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::database::repository::Model;
use crate::types::Collection;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct School {
    pub id: Uuid,
    pub name: String,
    /// Always non-working weekdays, 0 = Sunday through 6 = Saturday
    #[serde(default)]
    pub weekly_holidays: Vec<u8>,
}

impl School {
    pub fn observes(&self, weekday: u32) -> bool {
        self.weekly_holidays.iter().any(|d| u32::from(*d) == weekday)
    }
}

impl Model for School {
    const COLLECTION: Collection = Collection::Schools;
}
