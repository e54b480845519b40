use std::io::Write as _;

use anyhow::Result;
use indoc::indoc;
use serde::Deserialize;
use serde_json::json;
use xml_metadata::{Options, from_reader_with_options, from_str_with_options};

const RECORD: &str = indoc! {r#"
    <?xml version="1.0" encoding="UTF-8"?>
    <ms:resourceInfo xmlns:ms="http://www.elrc-share.eu/ELRC-SHARE_SCHEMA/v2.0/"
                     xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance"
                     xsi:schemaLocation="http://www.elrc-share.eu/ELRC-SHARE_SCHEMA/v2.0/ ELRC-SHARE-SCHEMA.xsd">
      <identificationInfo>
        <resourceName lang="en">Public administration glossary</resourceName>
        <resourceName lang="el">Glossary EL</resourceName>
        <description lang="en">Terms collected from ministry websites.</description>
        <url>http://example.org/glossary</url>
      </identificationInfo>
      <contactPerson>
        <surname lang="en">Doe</surname>
        <email>jane@example.org</email>
        <email>office@example.org</email>
      </contactPerson>
      <distributionInfo>
        <availability>available</availability>
        <licenceInfo>
          <licence>CC-BY-4.0</licence>
        </licenceInfo>
        <allowsUsesBesidesDGT>true</allowsUsesBesidesDGT>
      </distributionInfo>
    </ms:resourceInfo>
"#};

#[test]
fn metadata_record_preset_produces_stable_shapes() -> Result<()> {
    let doc = from_str_with_options(RECORD, &Options::metadata_record())?;
    assert!(!doc.is_suspect());
    assert_eq!(
        doc.value,
        json!({
            "ms:resourceInfo": {
                "identificationInfo": {
                    "resourceName": {
                        "en": "Public administration glossary",
                        "el": "Glossary EL"
                    },
                    "description": {"en": "Terms collected from ministry websites."},
                    "url": ["http://example.org/glossary"]
                },
                "contactPerson": [{
                    "surname": {"en": "Doe"},
                    "email": ["jane@example.org", "office@example.org"]
                }],
                "distributionInfo": [{
                    "availability": "available",
                    "licenceInfo": [{"licence": "CC-BY-4.0"}],
                    "allowsUsesBesidesDGT": true
                }]
            }
        })
    );
    Ok(())
}

#[derive(Debug, Deserialize, PartialEq)]
struct Record {
    #[serde(rename = "ms:resourceInfo")]
    resource: ResourceInfo,
}

#[derive(Debug, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
struct ResourceInfo {
    identification_info: IdentificationInfo,
    contact_person: Vec<ContactPerson>,
}

#[derive(Debug, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
struct IdentificationInfo {
    resource_name: std::collections::BTreeMap<String, String>,
    url: Vec<String>,
}

#[derive(Debug, Deserialize, PartialEq)]
struct ContactPerson {
    email: Vec<String>,
}

#[test]
fn record_converts_into_typed_structure() -> Result<()> {
    let record: Record = from_str_with_options(RECORD, &Options::metadata_record())?.into_typed()?;
    assert_eq!(record.resource.identification_info.resource_name["el"], "Glossary EL");
    assert_eq!(record.resource.identification_info.url, ["http://example.org/glossary"]);
    assert_eq!(record.resource.contact_person[0].email.len(), 2);
    Ok(())
}

#[test]
fn record_read_from_a_file() -> Result<()> {
    let mut file = tempfile::NamedTempFile::new()?;
    file.write_all(RECORD.as_bytes())?;
    file.flush()?;

    let reader = std::fs::File::open(file.path())?;
    let from_file = from_reader_with_options(reader, &Options::metadata_record())?;
    let from_text = from_str_with_options(RECORD, &Options::metadata_record())?;
    assert_eq!(from_file.value, from_text.value);
    Ok(())
}

#[test]
fn record_items_stream_one_section_at_a_time() -> Result<()> {
    let options = Options {
        depth_cutoff: 2,
        ..Options::metadata_record()
    };
    let mut sections = Vec::new();
    xml_metadata::for_each_item(RECORD, &options, |path, _| {
        sections.push(path[1].name.clone());
    })?;
    assert_eq!(
        sections,
        ["identificationInfo", "contactPerson", "distributionInfo"]
    );
    Ok(())
}
