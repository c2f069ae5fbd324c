//! Attribute schema handed to the host framework
//!
//! Every declared attribute is flagged `requires_replace`: Multipass cannot
//! resize or re-image a running instance, so any change means destroy and
//! launch again. The host plans that; [`requires_replace`] gives it the list
//! of fields that force it.

use serde::Serialize;

use super::drift::ResolveError;
use super::model::{DeclaredSpec, Field, ReconciledRecord, Value};
use crate::size::equal_sizes;

/// Value type of an attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeType {
    String,
    Number,
    Bool,
}

/// One attribute of a schema
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Attribute {
    pub name: &'static str,
    pub description: &'static str,
    #[serde(rename = "type")]
    pub kind: AttributeType,
    pub required: bool,
    pub optional: bool,
    /// Filled in by the provider rather than the caller
    pub computed: bool,
    /// A change forces destroy-and-recreate
    pub requires_replace: bool,
}

impl Attribute {
    fn required(name: &'static str, kind: AttributeType, description: &'static str) -> Self {
        Self {
            name,
            description,
            kind,
            required: true,
            optional: false,
            computed: false,
            requires_replace: true,
        }
    }

    fn optional(name: &'static str, kind: AttributeType, description: &'static str) -> Self {
        Self {
            optional: true,
            required: false,
            ..Self::required(name, kind, description)
        }
    }

    fn computed(name: &'static str, description: &'static str) -> Self {
        Self {
            name,
            description,
            kind: AttributeType::String,
            required: false,
            optional: false,
            computed: true,
            requires_replace: false,
        }
    }
}

/// A resource or data-source schema
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Schema {
    pub description: &'static str,
    pub version: u32,
    pub attributes: Vec<Attribute>,
}

impl Schema {
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name == name)
    }
}

/// Schema attribute for an instance resource field
pub fn attribute(field: Field) -> Attribute {
    use AttributeType::*;

    match field {
        Field::Name => Attribute::required(
            "name",
            String,
            "Name for the instance. If it is 'primary' (the configured primary instance \
             name), the user's home directory is mounted inside the instance.",
        ),
        Field::Image => Attribute::optional(
            "image",
            String,
            "Image to launch: a release, alias, partial image hash or an http://, \
             https:// or file:// URL. Defaults to the current Ubuntu LTS.",
        ),
        Field::Cpus => Attribute::optional(
            "cpus",
            Number,
            "Number of CPUs to allocate. Minimum: 1, default: 1.",
        ),
        Field::Memory => Attribute::optional(
            "memory",
            String,
            "Amount of memory to allocate, with a K, M, G or T suffix (KiB, MiB, GiB, TiB \
             also accepted). Minimum: 128MiB, default: 1GiB.",
        ),
        Field::Disk => Attribute::optional(
            "disk",
            String,
            "Disk space to allocate, with a K, M, G or T suffix (KiB, MiB, GiB, TiB also \
             accepted). Minimum: 512MiB, default: 5GiB.",
        ),
        Field::CloudInitFile => Attribute::optional(
            "cloudinit_file",
            String,
            "Path to a user-data cloud-init configuration.",
        ),
        Field::Network => Attribute::optional(
            "network",
            String,
            "Network interface spec to add, as accepted by `multipass launch --network`.",
        ),
        Field::Bridged => Attribute::optional(
            "bridged",
            Bool,
            "Attach the instance to the configured bridged network.",
        ),
        Field::Ipv4 => Attribute::computed("ipv4", "First IPv4 address of the instance."),
    }
}

/// Schema of the `multipass_instance` resource
pub fn instance_schema() -> Schema {
    Schema {
        description: "Multipass instance resource.",
        version: 0,
        attributes: Field::ALL.into_iter().map(attribute).collect(),
    }
}

/// Schema of the `multipass_instance` data source
pub fn instance_data_source_schema() -> Schema {
    Schema {
        description: "Multipass instance data source.",
        version: 0,
        attributes: vec![
            Attribute {
                requires_replace: false,
                ..Attribute::required("name", AttributeType::String, "Instance name.")
            },
            Attribute::computed("ipv4", "The IPv4 address of the instance."),
            Attribute::computed("state", "The state of the instance."),
            Attribute::computed("image", "The image of the instance."),
            Attribute::computed("image_hash", "The image hash of the instance."),
        ],
    }
}

/// Fields whose change from `prior` to `planned` forces a replacement
///
/// Sizes compare by magnitude, so rewriting `"1GiB"` as `"1024MiB"` does not
/// recreate anything.
pub fn requires_replace(
    prior: &ReconciledRecord,
    planned: &DeclaredSpec,
) -> Result<Vec<Field>, ResolveError> {
    let mut fields = Vec::new();

    for field in Field::ALL {
        if !attribute(field).requires_replace {
            continue;
        }

        let changed = match (prior.get(field), planned.get(field)) {
            (Some(Value::Text(a)), Some(Value::Text(b)))
                if matches!(field, Field::Memory | Field::Disk) =>
            {
                !equal_sizes(&a, &b).map_err(|source| ResolveError::Size { field, source })?
            }
            (a, b) => a != b,
        };

        if changed {
            fields.push(field);
        }
    }

    Ok(fields)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instance_schema_flags() {
        let schema = instance_schema();
        assert_eq!(schema.attributes.len(), Field::ALL.len());

        let name = schema.attribute("name").unwrap();
        assert!(name.required);
        assert!(name.requires_replace);

        for optional in ["image", "cpus", "memory", "disk", "cloudinit_file", "network", "bridged"] {
            let attr = schema.attribute(optional).unwrap();
            assert!(attr.optional, "{} should be optional", optional);
            assert!(attr.requires_replace, "{} should force replacement", optional);
        }

        let ipv4 = schema.attribute("ipv4").unwrap();
        assert!(ipv4.computed);
        assert!(!ipv4.requires_replace);

        assert_eq!(schema.attribute("cpus").unwrap().kind, AttributeType::Number);
        assert_eq!(schema.attribute("bridged").unwrap().kind, AttributeType::Bool);
    }

    #[test]
    fn test_data_source_schema() {
        let schema = instance_data_source_schema();
        assert!(schema.attribute("name").unwrap().required);
        for computed in ["ipv4", "state", "image", "image_hash"] {
            assert!(schema.attribute(computed).unwrap().computed);
        }
    }

    #[test]
    fn test_schema_serializes_type_key() {
        let json = serde_json::to_value(instance_schema()).unwrap();
        assert_eq!(json["attributes"][2]["name"], "cpus");
        assert_eq!(json["attributes"][2]["type"], "number");
    }

    #[test]
    fn test_no_replacement_when_unchanged() {
        let spec = DeclaredSpec {
            memory: Some("1GiB".into()),
            ..DeclaredSpec::new("vm")
        };
        let mut prior = ReconciledRecord::from_declared(spec.clone());
        prior.ipv4 = Some("10.0.0.2".into());

        assert!(requires_replace(&prior, &spec).unwrap().is_empty());
    }

    #[test]
    fn test_sizes_compare_by_magnitude() {
        let prior = ReconciledRecord::from_declared(DeclaredSpec {
            memory: Some("1GiB".into()),
            disk: Some("5GiB".into()),
            ..DeclaredSpec::new("vm")
        });
        let planned = DeclaredSpec {
            memory: Some("1024MiB".into()),
            disk: Some("10GiB".into()),
            ..DeclaredSpec::new("vm")
        };

        assert_eq!(requires_replace(&prior, &planned).unwrap(), vec![Field::Disk]);
    }

    #[test]
    fn test_setting_an_unset_field_replaces() {
        let prior = ReconciledRecord::from_declared(DeclaredSpec::new("vm"));
        let planned = DeclaredSpec {
            cpus: Some(2),
            image: Some("noble".into()),
            ..DeclaredSpec::new("vm")
        };

        assert_eq!(
            requires_replace(&prior, &planned).unwrap(),
            vec![Field::Image, Field::Cpus]
        );
    }

    #[test]
    fn test_invalid_planned_size() {
        let prior = ReconciledRecord::from_declared(DeclaredSpec {
            memory: Some("1GiB".into()),
            ..DeclaredSpec::new("vm")
        });
        let planned = DeclaredSpec {
            memory: Some("1XB".into()),
            ..DeclaredSpec::new("vm")
        };

        assert!(matches!(
            requires_replace(&prior, &planned),
            Err(ResolveError::Size { field: Field::Memory, .. })
        ));
    }
}
