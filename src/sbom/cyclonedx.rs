//! CycloneDX 1.4 JSON rendering.
//!
//! The image is the metadata component (type `container`, versioned by
//! its layer digest); each installed package becomes a `library`
//! component with an apk purl. No serial number is emitted: the document
//! must be reproducible from its inputs.

use super::SbomOptions;
use anyhow::Result;
use serde::Serialize;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Document {
    bom_format: &'static str,
    spec_version: &'static str,
    version: u32,
    metadata: Metadata,
    components: Vec<Component>,
}

#[derive(Serialize)]
struct Metadata {
    timestamp: String,
    component: Component,
}

#[derive(Serialize)]
struct Component {
    #[serde(rename = "type")]
    component_type: &'static str,
    name: String,
    version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    purl: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    licenses: Option<Vec<LicenseChoice>>,
}

#[derive(Serialize)]
struct LicenseChoice {
    license: License,
}

#[derive(Serialize)]
struct License {
    name: String,
}

pub(crate) fn render(options: &SbomOptions) -> Result<Vec<u8>> {
    let info = &options.image_info;

    let image = Component {
        component_type: "container",
        name: info
            .name
            .clone()
            .unwrap_or_else(|| format!("sbom-{}", info.arch)),
        version: info.digest.clone(),
        purl: None,
        licenses: None,
    };

    let components = options
        .packages
        .iter()
        .map(|pkg| Component {
            component_type: "library",
            name: pkg.name.clone(),
            version: pkg.version.clone(),
            purl: Some(if pkg.arch.is_empty() {
                format!("pkg:apk/{}@{}", pkg.name, pkg.version)
            } else {
                format!("pkg:apk/{}@{}?arch={}", pkg.name, pkg.version, pkg.arch)
            }),
            licenses: if pkg.license.is_empty() {
                None
            } else {
                Some(vec![LicenseChoice {
                    license: License {
                        name: pkg.license.clone(),
                    },
                }])
            },
        })
        .collect();

    let document = Document {
        bom_format: "CycloneDX",
        spec_version: "1.4",
        version: 1,
        metadata: Metadata {
            timestamp: super::created_at(options.source_date_epoch)?,
            component: image,
        },
        components,
    };

    Ok(serde_json::to_vec_pretty(&document)?)
}
