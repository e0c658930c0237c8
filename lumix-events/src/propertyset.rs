//! GENA `propertyset` parsing.

use lumix_state::{property_name, PropertyValue};
use xmltree::{Element, XMLNode};

/// Parse a NOTIFY body into `(canonical name, value)` pairs in document order.
///
/// ```text
/// <e:propertyset xmlns:e="urn:schemas-upnp-org:event-1-0">
///   <e:property><X_Panasonic_Cam_Sync>busy</X_Panasonic_Cam_Sync></e:property>
/// </e:propertyset>
/// ```
pub fn parse_propertyset(xml: &str) -> Result<Vec<(String, PropertyValue)>, String> {
    let root = Element::parse(xml.as_bytes()).map_err(|e| e.to_string())?;
    if root.name != "propertyset" {
        return Err(format!("unexpected root element {}", root.name));
    }

    let properties: Vec<(String, PropertyValue)> = elements(&root)
        .filter(|property| property.name == "property")
        .flat_map(elements)
        .map(|variable| {
            let text = variable.get_text().unwrap_or_default();
            (property_name(&variable.name), PropertyValue::parse(&text))
        })
        .collect();

    if properties.is_empty() {
        return Err("propertyset carries no properties".to_string());
    }
    Ok(properties)
}

fn elements(element: &Element) -> impl Iterator<Item = &Element> {
    element.children.iter().filter_map(XMLNode::as_element)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_panasonic_properties() {
        let xml = r#"<?xml version="1.0"?>
<e:propertyset xmlns:e="urn:schemas-upnp-org:event-1-0">
  <e:property><X_Panasonic_Cam_Sync>lens_Atta</X_Panasonic_Cam_Sync></e:property>
  <e:property><X_Panasonic_Cam_VRec>start</X_Panasonic_Cam_VRec></e:property>
  <e:property><BatteryLevel>80</BatteryLevel></e:property>
</e:propertyset>"#;

        let properties = parse_propertyset(xml).unwrap();
        assert_eq!(
            properties,
            vec![
                ("sync-status".to_string(), PropertyValue::from("lens_Atta")),
                ("recording-status".to_string(), PropertyValue::from("start")),
                ("battery-level".to_string(), PropertyValue::Integer(80)),
            ]
        );
    }

    #[test]
    fn test_multiple_variables_in_one_property() {
        let xml = r#"<e:propertyset xmlns:e="urn:schemas-upnp-org:event-1-0">
  <e:property><ZoomPosition>12</ZoomPosition><FocusPosition>300</FocusPosition></e:property>
</e:propertyset>"#;

        let properties = parse_propertyset(xml).unwrap();
        assert_eq!(properties[0].0, "zoom-position");
        assert_eq!(properties[1], ("focus-position".to_string(), PropertyValue::Integer(300)));
    }

    #[test]
    fn test_empty_value_is_text() {
        let xml = r#"<e:propertyset xmlns:e="urn:schemas-upnp-org:event-1-0">
  <e:property><SourceProtocolInfo></SourceProtocolInfo></e:property>
</e:propertyset>"#;
        let properties = parse_propertyset(xml).unwrap();
        assert_eq!(properties[0].1, PropertyValue::Text(String::new()));
    }

    #[test]
    fn test_rejects_malformed() {
        assert!(parse_propertyset("<e:propertyset").is_err());
        assert!(parse_propertyset("<other/>").is_err());
        assert!(parse_propertyset(
            r#"<e:propertyset xmlns:e="urn:schemas-upnp-org:event-1-0"></e:propertyset>"#
        )
        .is_err());
    }
}
