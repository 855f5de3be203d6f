//! Serde support for cache TTL overrides
//!
//! Accepts whole seconds (`300`) or a humantime string (`"5m"`). Serializes
//! as a humantime string.

use serde::{Deserialize, Deserializer, Serializer};
use std::time::Duration;

#[derive(Deserialize)]
#[serde(untagged)]
enum RawTtl {
    Seconds(u64),
    Text(#[serde(with = "humantime_serde")] Duration),
}

pub fn serialize<S: Serializer>(ttl: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error> {
    humantime_serde::serialize(ttl, serializer)
}

pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Duration>, D::Error> {
    Ok(Option::<RawTtl>::deserialize(deserializer)?.map(|raw| match raw {
        RawTtl::Seconds(secs) => Duration::from_secs(secs),
        RawTtl::Text(duration) => duration,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Serialize;
    use serde_json::json;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Holder {
        #[serde(default, with = "super")]
        ttl: Option<Duration>,
    }

    #[test]
    fn test_accepts_seconds_and_text() {
        let holder: Holder = serde_json::from_value(json!({"ttl": 300})).unwrap();
        assert_eq!(holder.ttl, Some(Duration::from_secs(300)));

        let holder: Holder = serde_json::from_value(json!({"ttl": "90s"})).unwrap();
        assert_eq!(holder.ttl, Some(Duration::from_secs(90)));

        let holder: Holder = serde_json::from_value(json!({"ttl": null})).unwrap();
        assert_eq!(holder.ttl, None);
        let holder: Holder = serde_json::from_value(json!({})).unwrap();
        assert_eq!(holder.ttl, None);
    }

    #[test]
    fn test_rejects_negative_and_garbage() {
        assert!(serde_json::from_value::<Holder>(json!({"ttl": -5})).is_err());
        assert!(serde_json::from_value::<Holder>(json!({"ttl": "soon"})).is_err());
    }

    #[test]
    fn test_serializes_as_text() {
        let holder = Holder {
            ttl: Some(Duration::from_secs(90)),
        };
        let value = serde_json::to_value(&holder).unwrap();
        assert_eq!(value, json!({"ttl": "1m 30s"}));
        assert_eq!(serde_json::from_value::<Holder>(value).unwrap(), holder);
    }
}
