//! shared presence checks over raw [Value]s
//!
//! All helpers return `Ok(None)` for absent (or `null`) fields and fail on malformed presence.
use crate::error::{Entity, Result};
use crate::value::{Map, Value};

pub(crate) fn optional_string<'v>(
    entity: &Entity,
    raw: &'v Value,
    key: &'static str,
) -> Result<Option<&'v str>> {
    let Some(value) = raw.field(key) else {
        return Ok(None);
    };
    value
        .as_str()
        .map(Some)
        .ok_or_else(|| entity.error(key, format!("'{key}' has to be a string")))
}

pub(crate) fn required_string<'v>(
    entity: &Entity,
    raw: &'v Value,
    key: &'static str,
) -> Result<&'v str> {
    optional_string(entity, raw, key)?
        .ok_or_else(|| entity.error(key, format!("'{key}' has to be specified")))
}

pub(crate) fn optional_bool(entity: &Entity, raw: &Value, key: &'static str) -> Result<Option<bool>> {
    let Some(value) = raw.field(key) else {
        return Ok(None);
    };
    value
        .as_bool()
        .map(Some)
        .ok_or_else(|| entity.error(key, format!("'{key}', if defined, must be true or false")))
}

pub(crate) fn required_bool(entity: &Entity, raw: &Value, key: &'static str) -> Result<bool> {
    optional_bool(entity, raw, key)?
        .ok_or_else(|| entity.error(key, format!("'{key}' has to be specified")))
}

pub(crate) fn optional_positive_integer(
    entity: &Entity,
    raw: &Value,
    key: &'static str,
) -> Result<Option<u64>> {
    let Some(value) = raw.field(key) else {
        return Ok(None);
    };
    let number = value
        .as_integer()
        .ok_or_else(|| entity.error(key, format!("'{key}' has to be a number")))?;
    u64::try_from(number)
        .ok()
        .filter(|number| *number > 0)
        .map(Some)
        .ok_or_else(|| entity.error(key, format!("'{key}' has to be greater than zero")))
}

/// Optional map whose keys are all strings
pub(crate) fn optional_string_map<'v>(
    entity: &Entity,
    raw: &'v Value,
    key: &'static str,
) -> Result<Option<&'v Map>> {
    let Some(value) = raw.field(key) else {
        return Ok(None);
    };
    let map = value
        .as_object()
        .ok_or_else(|| entity.error(key, format!("The value for '{key}' has to be a hash")))?;
    if map.keys().all(|k| k.as_str().is_some()) {
        Ok(Some(map))
    } else {
        Err(entity.error(key, format!("The keys in the '{key}' hash have to be strings")))
    }
}

/// A single string or a list of strings, normalized to a list
pub(crate) fn optional_string_list(
    entity: &Entity,
    raw: &Value,
    key: &'static str,
) -> Result<Option<Vec<String>>> {
    match raw.field(key) {
        None => Ok(None),
        Some(Value::String(single)) => Ok(Some(vec![single.clone()])),
        Some(Value::Array(list)) => list
            .iter()
            .map(|element| element.as_str().map(str::to_string))
            .collect::<Option<Vec<_>>>()
            .map(Some)
            .ok_or_else(|| entity.error(key, format!("The {key} array must only contain strings"))),
        Some(_) => Err(entity.error(
            key,
            format!("The value for {key} has to be a string or an array"),
        )),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::error::EntityKind;
    use pretty_assertions::assert_eq;

    fn entity() -> Entity {
        Entity::new(EntityKind::Step, "test")
    }

    #[test]
    fn string_list_normalization() {
        let raw = crate::value!("single: a\nlist: [a, b]\nbroken: [a, 1]\nnumber: 1");
        assert_eq!(optional_string_list(&entity(), &raw, "single"), Ok(Some(vec!["a".into()])));
        assert_eq!(
            optional_string_list(&entity(), &raw, "list"),
            Ok(Some(vec!["a".into(), "b".into()]))
        );
        assert_eq!(optional_string_list(&entity(), &raw, "missing"), Ok(None));
        assert!(optional_string_list(&entity(), &raw, "broken").is_err());
        assert!(optional_string_list(&entity(), &raw, "number").is_err());
    }

    #[test]
    fn positive_integer() {
        let raw = crate::value!("zero: 0\nthree: 3\nword: three");
        assert_eq!(optional_positive_integer(&entity(), &raw, "three"), Ok(Some(3)));
        assert!(optional_positive_integer(&entity(), &raw, "zero").is_err());
        assert!(optional_positive_integer(&entity(), &raw, "word").is_err());
    }

    #[test]
    fn string_map_keys() {
        let raw = crate::value!("good: {a: 1}\nbad: {2: 1}\nscalar: x");
        assert!(optional_string_map(&entity(), &raw, "good").unwrap().is_some());
        assert!(optional_string_map(&entity(), &raw, "bad").is_err());
        assert!(optional_string_map(&entity(), &raw, "scalar").is_err());
    }
}
