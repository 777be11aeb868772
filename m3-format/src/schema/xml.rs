//! Serde model of the XML schema description
//!
//! ```xml
//! <structures>
//!     <structure name="BONE">
//!         <versions><version number="1" size="160"/></versions>
//!         <fields>
//!             <field name="name" type="Reference" refTo="CHAR"/>
//!             <field name="flags" type="uint32">
//!                 <bits><bit name="animated" mask="0x200"/></bits>
//!             </field>
//!         </fields>
//!     </structure>
//! </structures>
//! ```

use serde::Deserialize;

use crate::error::SchemaError;

#[derive(Debug, Deserialize)]
pub(crate) struct SchemaDocument {
    #[serde(rename = "structure", default)]
    pub structures: Vec<StructureElement>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct StructureElement {
    #[serde(rename = "@name")]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub versions: VersionsElement,
    #[serde(default)]
    pub fields: FieldsElement,
}

#[derive(Debug, Deserialize)]
pub(crate) struct VersionsElement {
    #[serde(rename = "version", default)]
    pub versions: Vec<VersionElement>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct VersionElement {
    #[serde(rename = "@number")]
    pub number: u32,
    #[serde(rename = "@size")]
    pub size: usize,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct FieldsElement {
    #[serde(rename = "field", default)]
    pub fields: Vec<FieldElement>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct FieldElement {
    #[serde(rename = "@name")]
    pub name: String,
    #[serde(rename = "@type")]
    pub kind: String,
    #[serde(rename = "@refTo", default)]
    pub ref_to: Option<String>,
    #[serde(rename = "@size", default)]
    pub size: Option<usize>,
    #[serde(rename = "@since-version", default)]
    pub since_version: Option<u32>,
    #[serde(rename = "@till-version", default)]
    pub till_version: Option<u32>,
    #[serde(rename = "@default-value", default)]
    pub default_value: Option<String>,
    #[serde(rename = "@expected-value", default)]
    pub expected_value: Option<String>,
    #[serde(default)]
    pub bits: Option<BitsElement>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct BitsElement {
    #[serde(rename = "bit", default)]
    pub bits: Vec<BitElement>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct BitElement {
    #[serde(rename = "@name")]
    pub name: String,
    #[serde(rename = "@mask")]
    pub mask: String,
}

pub(crate) fn parse_document(text: &str) -> Result<SchemaDocument, SchemaError> {
    quick_xml::de::from_str(text).map_err(|e| SchemaError::Parse(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_document() {
        let doc = parse_document(
            r#"<structures>
                <structure name="VEC2">
                    <description>Two floats</description>
                    <versions><version number="0" size="8"/></versions>
                    <fields>
                        <field name="x" type="float" default-value="1.5"/>
                        <field name="y" type="float" since-version="0" till-version="3"/>
                    </fields>
                </structure>
                <structure name="FLAGS">
                    <versions><version number="2" size="4"/></versions>
                    <fields>
                        <field name="flags" type="uint32">
                            <bits>
                                <bit name="a" mask="0x1"/>
                                <bit name="b" mask="0x4"/>
                            </bits>
                        </field>
                    </fields>
                </structure>
            </structures>"#,
        )
        .unwrap();

        assert_eq!(doc.structures.len(), 2);
        let vec2 = &doc.structures[0];
        assert_eq!(vec2.name, "VEC2");
        assert_eq!(vec2.description.as_deref(), Some("Two floats"));
        assert_eq!(vec2.versions.versions[0].size, 8);
        assert_eq!(vec2.fields.fields[0].default_value.as_deref(), Some("1.5"));
        assert_eq!(vec2.fields.fields[1].till_version, Some(3));

        let bits = doc.structures[1].fields.fields[0].bits.as_ref().unwrap();
        assert_eq!(bits.bits.len(), 2);
        assert_eq!(bits.bits[1].mask, "0x4");
    }

    #[test]
    fn test_parse_error() {
        assert!(matches!(
            parse_document("<structures><structure>"),
            Err(SchemaError::Parse(_))
        ));
    }
}
