//! Registry data records.
//!
//! These mirror the JSON returned by ACR-style listing endpoints. Every
//! attribute is optional on the wire, so every field is an `Option`; helpers
//! apply the registry's defaults where the purge logic needs a concrete value.

use serde::{Deserialize, Serialize};


/// Media type of a Docker manifest list.
pub const DOCKER_MANIFEST_LIST: &str = "application/vnd.docker.distribution.manifest.list.v2+json";

/// Media type of an OCI image index.
pub const OCI_IMAGE_INDEX: &str = "application/vnd.oci.image.index.v1+json";

/// Per-object locks an operator can set on a tag or manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeableAttributes {
    pub delete_enabled: Option<bool>,
    pub write_enabled: Option<bool>,
    pub read_enabled: Option<bool>,
    pub list_enabled: Option<bool>,
}

/// A tag as returned by the tag listing endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TagAttributes {
    pub name: Option<String>,
    pub digest: Option<String>,
    pub created_time: Option<String>,
    pub last_update_time: Option<String>,
    pub signed: Option<bool>,
    pub changeable_attributes: Option<ChangeableAttributes>,
}

impl TagAttributes {
    /// Whether the tag may be deleted. Absent attributes mean unlocked.
    pub fn delete_enabled(&self) -> bool {
        delete_enabled(self.changeable_attributes.as_ref())
    }
}

/// A manifest as returned by the manifest listing endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestAttributes {
    pub digest: Option<String>,
    pub image_size: Option<i64>,
    pub created_time: Option<String>,
    pub last_update_time: Option<String>,
    pub architecture: Option<String>,
    pub os: Option<String>,
    pub media_type: Option<String>,
    pub config_media_type: Option<String>,
    pub tags: Option<Vec<String>>,
    pub changeable_attributes: Option<ChangeableAttributes>,
}

impl ManifestAttributes {
    /// Whether the manifest may be deleted. Absent attributes mean unlocked.
    pub fn delete_enabled(&self) -> bool {
        delete_enabled(self.changeable_attributes.as_ref())
    }

    /// Number of tags currently pointing at this manifest.
    pub fn tag_count(&self) -> usize {
        self.tags.as_ref().map_or(0, Vec::len)
    }

    /// Whether the manifest body enumerates other manifests.
    pub fn is_manifest_list(&self) -> bool {
        matches!(
            self.media_type.as_deref(),
            Some(DOCKER_MANIFEST_LIST) | Some(OCI_IMAGE_INDEX)
        )
    }
}

fn delete_enabled(attributes: Option<&ChangeableAttributes>) -> bool {
    attributes.and_then(|a| a.delete_enabled).unwrap_or(true)
}

/// Body of the tag listing endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TagList {
    pub registry: Option<String>,
    pub image_name: Option<String>,
    pub tags: Option<Vec<TagAttributes>>,
}

/// Body of the manifest listing endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestAttributeList {
    pub registry: Option<String>,
    pub image_name: Option<String>,
    pub manifests: Option<Vec<ManifestAttributes>>,
}

/// Parsed body of a manifest list (multi-architecture manifest).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestListDescriptor {
    #[serde(default)]
    pub schema_version: i64,
    #[serde(default)]
    pub media_type: Option<String>,
    #[serde(default)]
    pub manifests: Vec<PlatformManifest>,
}

impl ManifestListDescriptor {
    /// Parses a manifest list body.
    pub fn from_bytes(bytes: &[u8]) -> crate::Result<Self> {
        serde_json::from_slice(bytes).map_err(|e| {
            crate::ReapError::validation_with_source("Failed to parse manifest list", e)
        })
    }

    /// Digests of every manifest the list references, in listed order.
    pub fn dependent_digests(&self) -> impl Iterator<Item = &str> {
        self.manifests.iter().map(|m| m.digest.as_str())
    }
}

/// One entry of a manifest list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformManifest {
    pub digest: String,
    #[serde(default)]
    pub media_type: Option<String>,
    #[serde(default)]
    pub size: Option<i64>,
    #[serde(default)]
    pub platform: Option<Platform>,
}

/// Target platform of a manifest list entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Platform {
    #[serde(default)]
    pub architecture: String,
    #[serde(default)]
    pub os: String,
}
