use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::id::{format_sortable, parse_sortable};

/// Attribute names with fixed meaning in a stored release row.
pub const ATTR_ID: &str = "id";
pub const ATTR_APP: &str = "app";
pub const ATTR_ARTIFACT: &str = "ami";
pub const ATTR_CREATED: &str = "created";

/// Parameter holding the serialized deployment manifest.
pub const PARAM_MANIFEST: &str = "manifest";

/// Returns true for attribute names the store owns.
pub fn is_reserved(key: &str) -> bool {
    matches!(key, ATTR_ID | ATTR_APP | ATTR_ARTIFACT | ATTR_CREATED)
}

/// An immutable release: a build artifact paired with deployment parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseRecord {
    pub id: String,
    pub app: String,
    /// Machine image / build artifact identifier.
    pub artifact: Option<String>,
    pub created: DateTime<Utc>,
    /// Caller-defined string parameters, e.g. [`PARAM_MANIFEST`].
    pub params: BTreeMap<String, String>,
}

impl ReleaseRecord {
    /// Flatten into the string attribute map persisted by the record store.
    pub fn to_attributes(&self) -> BTreeMap<String, String> {
        let mut attrs: BTreeMap<String, String> = self
            .params
            .iter()
            .filter(|(k, _)| !is_reserved(k))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        attrs.insert(ATTR_ID.to_owned(), self.id.clone());
        attrs.insert(ATTR_APP.to_owned(), self.app.clone());
        attrs.insert(ATTR_CREATED.to_owned(), format_sortable(&self.created));
        if let Some(artifact) = &self.artifact {
            attrs.insert(ATTR_ARTIFACT.to_owned(), artifact.clone());
        }
        attrs
    }

    /// Rebuild a record from a stored row.
    pub fn from_attributes(mut attrs: BTreeMap<String, String>) -> crate::Result<Self> {
        let id = attrs
            .remove(ATTR_ID)
            .ok_or_else(|| crate::Error::MissingAttribute {
                id: String::new(),
                attribute: ATTR_ID,
            })?;

        let created_raw = attrs
            .remove(ATTR_CREATED)
            .ok_or_else(|| crate::Error::MissingAttribute {
                id: id.clone(),
                attribute: ATTR_CREATED,
            })?;

        let created =
            parse_sortable(&created_raw).map_err(|e| crate::Error::MalformedTimestamp {
                id: id.clone(),
                value: created_raw.clone(),
                source: e,
            })?;

        let app = attrs.remove(ATTR_APP).unwrap_or_default();
        let artifact = attrs.remove(ATTR_ARTIFACT).filter(|a| !a.is_empty());

        Ok(Self {
            id,
            app,
            artifact,
            created,
            params: attrs,
        })
    }

    pub fn manifest(&self) -> Option<&str> {
        self.params.get(PARAM_MANIFEST).map(String::as_str)
    }
}

/// One key/value pair of an infrastructure stack's parameter set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackParameter {
    #[serde(rename = "ParameterKey")]
    pub key: String,
    #[serde(rename = "ParameterValue")]
    pub value: String,
}

impl StackParameter {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}
