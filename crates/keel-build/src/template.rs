use std::collections::HashMap;

use keel_core::{ReleaseRecord, StackParameter};
use serde_json::{Map, Value, json};

/// Stack parameter that carries the active release id.
pub const RELEASE_PARAMETER: &str = "Release";

/// What an app's template is rendered from, besides the release itself.
#[derive(Debug, Clone)]
pub struct AppParams {
    pub rack: String,
    pub app: String,
    /// The app stack's current parameter set.
    pub parameters: Vec<StackParameter>,
}

/// Renders an app's CloudFormation template for a release.
pub struct FormationGenerator<'a> {
    params: &'a AppParams,
    release: &'a ReleaseRecord,
}

impl<'a> FormationGenerator<'a> {
    pub fn new(params: &'a AppParams, release: &'a ReleaseRecord) -> Self {
        Self { params, release }
    }

    pub fn render(&self) -> Result<String, TemplateError> {
        let artifact = self
            .release
            .artifact
            .as_deref()
            .ok_or_else(|| TemplateError::MissingArtifact {
                release: self.release.id.clone(),
            })?;

        let services = match self.release.manifest() {
            Some(manifest) => manifest_services(manifest).map_err(|e| {
                TemplateError::Manifest {
                    release: self.release.id.clone(),
                    source: e,
                }
            })?,
            None => Vec::new(),
        };

        let mut parameters = Map::new();
        for p in &self.params.parameters {
            parameters.insert(p.key.clone(), json!({ "Type": "String" }));
        }
        parameters.insert(RELEASE_PARAMETER.to_owned(), json!({ "Type": "String" }));

        let has_instance_type = self.params.parameters.iter().any(|p| p.key == "InstanceType");

        let mut resources = Map::new();
        resources.insert(
            "ReleaseHandle".to_owned(),
            json!({ "Type": "AWS::CloudFormation::WaitConditionHandle" }),
        );

        let mut owners: HashMap<String, &str> = HashMap::new();
        for service in &services {
            let resource = format!("{}LaunchConfiguration", upper_name(service));
            if let Some(first) = owners.insert(resource.clone(), service.as_str()) {
                return Err(TemplateError::ResourceCollision {
                    release: self.release.id.clone(),
                    resource,
                    first: first.to_owned(),
                    second: service.clone(),
                });
            }

            let mut properties = Map::new();
            properties.insert("ImageId".to_owned(), json!(artifact));
            if has_instance_type {
                properties.insert("InstanceType".to_owned(), json!({ "Ref": "InstanceType" }));
            }
            properties.insert(
                "UserData".to_owned(),
                json!({
                    "Fn::Base64": {
                        "Fn::Join": ["", [
                            "#!/bin/bash\n",
                            "export KEEL_RELEASE=", { "Ref": RELEASE_PARAMETER }, "\n",
                            format!("export KEEL_PROCESS={service}\n"),
                        ]]
                    }
                }),
            );

            resources.insert(
                resource,
                json!({
                    "Type": "AWS::AutoScaling::LaunchConfiguration",
                    "Properties": Value::Object(properties),
                }),
            );
        }

        let template = json!({
            "AWSTemplateFormatVersion": "2010-09-09",
            "Description": format!("keel app {} on rack {}", self.params.app, self.params.rack),
            "Parameters": Value::Object(parameters),
            "Resources": Value::Object(resources),
        });

        serde_json::to_string_pretty(&template).map_err(|e| TemplateError::Serialize { source: e })
    }
}

/// Service names declared by a docker-compose manifest (v1 or v2 layout).
pub fn manifest_services(manifest: &str) -> Result<Vec<String>, serde_yaml::Error> {
    let doc: serde_yaml::Value = serde_yaml::from_str(manifest)?;

    let table = match doc.get("services") {
        Some(services) => services,
        None => &doc,
    };

    let Some(mapping) = table.as_mapping() else {
        return Ok(Vec::new());
    };

    Ok(mapping
        .keys()
        .filter_map(|k| k.as_str())
        .filter(|k| !matches!(*k, "version" | "volumes" | "networks"))
        .map(str::to_owned)
        .collect())
}

/// `web-worker` → `WebWorker`
fn upper_name(name: &str) -> String {
    name.split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect()
}

#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    #[error("release {release} has no build artifact")]
    MissingArtifact { release: String },
    #[error("release {release} has an unreadable manifest")]
    Manifest {
        release: String,
        source: serde_yaml::Error,
    },
    #[error("services {first} and {second} of release {release} both map to resource {resource}")]
    ResourceCollision {
        release: String,
        resource: String,
        first: String,
        second: String,
    },
    #[error("failed to serialize template")]
    Serialize { source: serde_json::Error },
}
