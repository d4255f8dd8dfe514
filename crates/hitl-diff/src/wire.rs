//! Serde helpers shared by the wire types of the review crates

use serde::{Deserialize, Deserializer};

/// Deserialize an explicit `null` as `T::default()`
///
/// `#[serde(default)]` only covers a missing field; backends also send
/// `null` for empty collections. Pair the two:
///
/// ```rust,ignore
/// #[serde(default, deserialize_with = "hitl_diff::null_as_default")]
/// pub items: Vec<DiffEntity>,
/// ```
///
/// # Errors
/// Returns the deserializer's error when the value is neither `null` nor a `T`.
pub fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Deserialize)]
    struct Holder {
        #[serde(default, deserialize_with = "null_as_default")]
        items: Vec<u32>,
    }

    #[test]
    fn null_missing_and_present() {
        let null: Holder = serde_json::from_value(json!({"items": null})).unwrap();
        let missing: Holder = serde_json::from_value(json!({})).unwrap();
        let present: Holder = serde_json::from_value(json!({"items": [1, 2]})).unwrap();

        assert!(null.items.is_empty());
        assert!(missing.items.is_empty());
        assert_eq!(present.items, vec![1, 2]);
    }

    #[test]
    fn wrong_type_still_fails() {
        assert!(serde_json::from_value::<Holder>(json!({"items": "nope"})).is_err());
    }
}
