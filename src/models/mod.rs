pub(crate) mod active_plan;
pub(crate) mod autopay;
pub(crate) mod criteria;
pub(crate) mod notification;
pub(crate) mod offer;
pub(crate) mod plan;
pub(crate) mod query;
pub(crate) mod referral;
pub(crate) mod transaction;
pub(crate) mod user;

/// Serde adapter for `Option<chrono::DateTime<Utc>>` stored as BSON datetimes.
/// bson only ships a helper for the non-optional case.
pub mod opt_datetime {
    use chrono::{DateTime, Utc};
    use mongodb::bson;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(
        value: &Option<DateTime<Utc>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(dt) => bson::DateTime::from_chrono(*dt).serialize(serializer),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<DateTime<Utc>>, D::Error> {
        let opt = Option::<bson::DateTime>::deserialize(deserializer)?;
        Ok(opt.map(|dt| dt.to_chrono()))
    }
}
