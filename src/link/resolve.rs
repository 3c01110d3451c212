//! CR-032: Symbolic reference resolution against live objects.
//!
//! Field precedence for a `{ref}`:
//! 1. explicit `name.field`
//! 2. the consumer's default for that property (see [`default_field`])
//! 3. `id`

use super::provider::LiveObject;
use super::LinkError;
use crate::core::types::{PropValue, SymbolicRef};
use crate::lowerers::types;
use serde_json::Value;
use std::collections::HashMap;

pub const GENERIC_FIELD: &str = "id";

/// Field a bare ref means, by consuming resource type and top-level property.
pub fn default_field(resource_type: &str, property: &str) -> &'static str {
    match (resource_type, property) {
        (types::ROLE_POLICY_ATTACHMENT, "role") => "name",
        (types::ROLE_POLICY_ATTACHMENT, "policyArn") => "arn",
        (types::POLICY_ATTACHMENT, "policyArn") => "arn",
        (types::FUNCTION, "role") => "arn",
        (types::EVENT_SOURCE_MAPPING, "eventSourceArn") => "arn",
        (types::EVENT_SOURCE_MAPPING, "functionName") => "name",
        (types::PERMISSION, "function") => "name",
        (types::PERMISSION, "sourceArn") => "executionArn",
        (types::STAGE | types::INTEGRATION | types::ROUTE, "apiId") => "id",
        (types::INTEGRATION, "integrationUri") => "invokeArn",
        (types::ROUTE, "target") => "id",
        (types::BUCKET_VERSIONING, "bucket") => "id",
        _ => GENERIC_FIELD,
    }
}

/// Where a property being resolved lives, for error messages and defaults.
#[derive(Debug, Clone, Copy)]
pub struct RefSite<'a> {
    pub resource: &'a str,
    pub resource_type: &'a str,
    pub property: &'a str,
}

/// Resolve one property value, recursing into maps and lists.
pub fn resolve_value(
    value: &PropValue,
    site: RefSite,
    registry: &HashMap<String, LiveObject>,
) -> Result<Value, LinkError> {
    match value {
        PropValue::Ref(r) => resolve_ref(r, site, registry),
        PropValue::Bool(b) => Ok(Value::Bool(*b)),
        PropValue::Number(n) => Ok(Value::Number(n.clone())),
        PropValue::String(s) => Ok(Value::String(s.clone())),
        PropValue::Null => Ok(Value::Null),
        PropValue::List(items) => items
            .iter()
            .map(|v| resolve_value(v, site, registry))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        PropValue::Map(map) => {
            let mut out = serde_json::Map::with_capacity(map.len());
            for (k, v) in map {
                out.insert(k.clone(), resolve_value(v, site, registry)?);
            }
            Ok(Value::Object(out))
        }
    }
}

fn resolve_ref(
    r: &SymbolicRef,
    site: RefSite,
    registry: &HashMap<String, LiveObject>,
) -> Result<Value, LinkError> {
    let object = registry
        .get(r.resource())
        .ok_or_else(|| LinkError::UnresolvedRef {
            target: r.target.clone(),
            resource: site.resource.to_string(),
            property: site.property.to_string(),
        })?;
    let field = r
        .field()
        .unwrap_or_else(|| default_field(site.resource_type, site.property));
    object
        .field(field)
        .cloned()
        .ok_or_else(|| LinkError::UnresolvedField {
            target: r.target.clone(),
            resource: site.resource.to_string(),
            field: field.to_string(),
        })
}

/// Split an output template `"${name.field}"`.
pub fn parse_template(template: &str) -> Option<(&str, &str)> {
    let inner = template.strip_prefix("${")?.strip_suffix('}')?;
    let (name, field) = inner.split_once('.')?;
    if name.is_empty() || field.is_empty() {
        return None;
    }
    Some((name, field))
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;

    fn registry() -> HashMap<String, LiveObject> {
        let mut fields = IndexMap::new();
        fields.insert("id".to_string(), Value::String("role-id".to_string()));
        fields.insert("name".to_string(), Value::String("h-exec-role".to_string()));
        fields.insert(
            "arn".to_string(),
            Value::String("arn:aws:iam::000000000000:role/h-exec-role".to_string()),
        );
        let mut reg = HashMap::new();
        reg.insert(
            "h-exec-role".to_string(),
            LiveObject {
                name: "h-exec-role".to_string(),
                resource_type: types::ROLE.to_string(),
                fields,
            },
        );
        reg
    }

    fn site<'a>(resource_type: &'a str, property: &'a str) -> RefSite<'a> {
        RefSite {
            resource: "consumer",
            resource_type,
            property,
        }
    }

    #[test]
    fn test_cr032_default_field_table() {
        assert_eq!(default_field(types::FUNCTION, "role"), "arn");
        assert_eq!(default_field(types::ROLE_POLICY_ATTACHMENT, "role"), "name");
        assert_eq!(default_field(types::INTEGRATION, "integrationUri"), "invokeArn");
        assert_eq!(default_field(types::PERMISSION, "sourceArn"), "executionArn");
        assert_eq!(default_field(types::ROUTE, "apiId"), "id");
        assert_eq!(default_field(types::QUEUE, "anything"), "id");
    }

    #[test]
    fn test_cr032_bare_ref_uses_consumer_default() {
        let reg = registry();
        let v = resolve_value(
            &PropValue::reference("h-exec-role"),
            site(types::FUNCTION, "role"),
            &reg,
        )
        .unwrap();
        assert_eq!(v, Value::String("arn:aws:iam::000000000000:role/h-exec-role".to_string()));
        let v = resolve_value(
            &PropValue::reference("h-exec-role"),
            site(types::ROLE_POLICY_ATTACHMENT, "role"),
            &reg,
        )
        .unwrap();
        assert_eq!(v, Value::String("h-exec-role".to_string()));
        let v = resolve_value(
            &PropValue::reference("h-exec-role"),
            site(types::TOPIC, "whatever"),
            &reg,
        )
        .unwrap();
        assert_eq!(v, Value::String("role-id".to_string()));
    }

    #[test]
    fn test_cr032_explicit_field_wins() {
        let reg = registry();
        let v = resolve_value(
            &PropValue::reference("h-exec-role.name"),
            site(types::FUNCTION, "role"),
            &reg,
        )
        .unwrap();
        assert_eq!(v, Value::String("h-exec-role".to_string()));
    }

    #[test]
    fn test_cr032_nested_values() {
        let reg = registry();
        let mut inner = IndexMap::new();
        inner.insert("ROLE".to_string(), PropValue::reference("h-exec-role.arn"));
        inner.insert("N".to_string(), PropValue::int(3));
        let value = PropValue::Map(IndexMap::from([(
            "variables".to_string(),
            PropValue::List(vec![PropValue::Map(inner), PropValue::Null]),
        )]));
        let v = resolve_value(&value, site(types::FUNCTION, "environment"), &reg).unwrap();
        assert_eq!(
            v,
            serde_json::json!({"variables": [
                {"ROLE": "arn:aws:iam::000000000000:role/h-exec-role", "N": 3},
                null
            ]})
        );
    }

    #[test]
    fn test_cr032_missing_resource_is_fatal() {
        let err = resolve_value(
            &PropValue::reference("missing-role"),
            site(types::FUNCTION, "role"),
            &registry(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("Unresolved ref \"missing-role\""));
    }

    #[test]
    fn test_cr032_missing_field_is_fatal() {
        let err = resolve_value(
            &PropValue::reference("h-exec-role.url"),
            site(types::FUNCTION, "role"),
            &registry(),
        )
        .unwrap_err();
        assert!(matches!(err, LinkError::UnresolvedField { ref field, .. } if field == "url"));
    }

    #[test]
    fn test_cr032_parse_template() {
        assert_eq!(parse_template("${q-queue.url}"), Some(("q-queue", "url")));
        assert_eq!(parse_template("${q-queue}"), None);
        assert_eq!(parse_template("q-queue.url"), None);
        assert_eq!(parse_template("${.url}"), None);
    }
}
