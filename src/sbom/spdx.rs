//! SPDX 2.2 JSON rendering.
//!
//! The document describes the image as one root package and lists every
//! installed package as a CONTAINS relationship of that root. The
//! document namespace derives from the layer digest, so re-rendering the
//! same inputs yields the same document.

use super::SbomOptions;
use anyhow::Result;
use serde::Serialize;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Document {
    spdx_version: &'static str,
    data_license: &'static str,
    #[serde(rename = "SPDXID")]
    spdxid: &'static str,
    name: String,
    document_namespace: String,
    creation_info: CreationInfo,
    packages: Vec<SpdxPackage>,
    relationships: Vec<Relationship>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreationInfo {
    created: String,
    creators: Vec<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SpdxPackage {
    #[serde(rename = "SPDXID")]
    spdxid: String,
    name: String,
    version_info: String,
    download_location: &'static str,
    files_analyzed: bool,
    license_declared: String,
    copyright_text: &'static str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    external_refs: Vec<ExternalRef>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ExternalRef {
    reference_category: &'static str,
    reference_type: &'static str,
    reference_locator: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Relationship {
    spdx_element_id: String,
    related_spdx_element: String,
    relationship_type: &'static str,
}

const IMAGE_ID: &str = "SPDXRef-Package-image";
const NOASSERTION: &str = "NOASSERTION";

pub(crate) fn render(options: &SbomOptions) -> Result<Vec<u8>> {
    let info = &options.image_info;
    let doc_name = info
        .name
        .clone()
        .unwrap_or_else(|| format!("sbom-{}", info.arch));

    let mut packages = vec![SpdxPackage {
        spdxid: IMAGE_ID.to_string(),
        name: doc_name.clone(),
        version_info: info.digest.clone(),
        download_location: NOASSERTION,
        files_analyzed: false,
        license_declared: NOASSERTION.to_string(),
        copyright_text: NOASSERTION,
        external_refs: Vec::new(),
    }];
    let mut relationships = vec![Relationship {
        spdx_element_id: "SPDXRef-DOCUMENT".to_string(),
        related_spdx_element: IMAGE_ID.to_string(),
        relationship_type: "DESCRIBES",
    }];

    for pkg in &options.packages {
        let id = format!("SPDXRef-Package-{}", sanitize_id(&pkg.name));
        packages.push(SpdxPackage {
            spdxid: id.clone(),
            name: pkg.name.clone(),
            version_info: pkg.version.clone(),
            download_location: NOASSERTION,
            files_analyzed: false,
            license_declared: if pkg.license.is_empty() {
                NOASSERTION.to_string()
            } else {
                pkg.license.clone()
            },
            copyright_text: NOASSERTION,
            external_refs: vec![ExternalRef {
                reference_category: "PACKAGE-MANAGER",
                reference_type: "purl",
                reference_locator: purl(pkg),
            }],
        });
        relationships.push(Relationship {
            spdx_element_id: IMAGE_ID.to_string(),
            related_spdx_element: id,
            relationship_type: "CONTAINS",
        });
    }

    let document = Document {
        spdx_version: "SPDX-2.2",
        data_license: "CC0-1.0",
        spdxid: "SPDXRef-DOCUMENT",
        name: doc_name,
        document_namespace: format!(
            "https://spdx.org/spdxdocs/layer-builder/{}",
            info.digest.replace(':', "-")
        ),
        creation_info: CreationInfo {
            created: super::created_at(options.source_date_epoch)?,
            creators: vec!["Tool: layer-builder".to_string()],
        },
        packages,
        relationships,
    };

    Ok(serde_json::to_vec_pretty(&document)?)
}

fn purl(pkg: &crate::apk::Package) -> String {
    if pkg.arch.is_empty() {
        format!("pkg:apk/{}@{}", pkg.name, pkg.version)
    } else {
        format!("pkg:apk/{}@{}?arch={}", pkg.name, pkg.version, pkg.arch)
    }
}

/// SPDX identifiers only allow letters, digits, `.` and `-`.
fn sanitize_id(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' {
                c
            } else {
                '-'
            }
        })
        .collect()
}
