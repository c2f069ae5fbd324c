//! Protocol request and response messages

use serde::{Deserialize, Serialize};

use crate::instance::{
    DeclaredSpec, Field, LifecycleError, ReconciledRecord, ResolveError, Schema,
};
use crate::multipass::InstanceInfo;

/// A request from the host, tagged by `op`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Request {
    /// Resource and data-source schemas
    Schema,
    Create { spec: DeclaredSpec },
    Read { record: ReconciledRecord },
    Delete { record: ReconciledRecord },
    /// Adopt an existing instance; `id` is the instance name
    Import { id: String },
    /// Data-source lookup
    Describe { name: String },
    /// Which fields force a replacement between `prior` and `planned`
    Plan {
        prior: ReconciledRecord,
        planned: DeclaredSpec,
    },
}

impl Request {
    pub fn op(&self) -> &'static str {
        match self {
            Request::Schema => "schema",
            Request::Create { .. } => "create",
            Request::Read { .. } => "read",
            Request::Delete { .. } => "delete",
            Request::Import { .. } => "import",
            Request::Describe { .. } => "describe",
            Request::Plan { .. } => "plan",
        }
    }
}

/// A response to the host, tagged by `status`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Response {
    Schema {
        resource: Schema,
        data_source: Schema,
    },
    /// The instance exists; persist this record
    Present { record: ReconciledRecord },
    /// The instance is gone; drop it from state
    Absent,
    Info { info: InstanceInfo },
    Plan { requires_replace: Vec<Field> },
    Error { kind: String, message: String },
}

impl Response {
    pub fn error(kind: &str, message: impl Into<String>) -> Self {
        Response::Error {
            kind: kind.to_string(),
            message: message.into(),
        }
    }

    pub fn from_error(err: &LifecycleError) -> Self {
        Self::error(err.kind(), err.to_string())
    }

    pub fn from_resolve_error(err: &ResolveError) -> Self {
        Self::error(err.kind(), err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_tags() {
        let req: Request = serde_json::from_str(r#"{"op": "import", "id": "primary"}"#).unwrap();
        assert_eq!(req, Request::Import { id: "primary".into() });
        assert_eq!(req.op(), "import");

        let req: Request =
            serde_json::from_str(r#"{"op": "create", "spec": {"name": "vm", "cpus": 2}}"#).unwrap();
        match req {
            Request::Create { spec } => {
                assert_eq!(spec.name, "vm");
                assert_eq!(spec.cpus, Some(2));
                assert_eq!(spec.memory, None);
            }
            other => panic!("unexpected request: {:?}", other),
        }

        let req: Request = serde_json::from_str(r#"{"op": "schema"}"#).unwrap();
        assert_eq!(req, Request::Schema);
    }

    #[test]
    fn test_unknown_op_is_rejected() {
        assert!(serde_json::from_str::<Request>(r#"{"op": "update", "name": "vm"}"#).is_err());
    }

    #[test]
    fn test_response_tags() {
        let json = serde_json::to_value(Response::Absent).unwrap();
        assert_eq!(json, serde_json::json!({"status": "absent"}));

        let json = serde_json::to_value(Response::Plan {
            requires_replace: vec![Field::Memory, Field::CloudInitFile],
        })
        .unwrap();
        assert_eq!(json["status"], "plan");
        assert_eq!(json["requires_replace"], serde_json::json!(["memory", "cloudinit_file"]));
    }

    #[test]
    fn test_error_response() {
        let json = serde_json::to_value(Response::from_error(&LifecycleError::NotFound(
            "ghost".into(),
        )))
        .unwrap();
        assert_eq!(json["status"], "error");
        assert_eq!(json["kind"], "not_found");
        assert_eq!(json["message"], "instance ghost not found");
    }
}
