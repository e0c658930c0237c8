//! Tagged decoding of command replies.
//!
//! A SOAP `<ActionResponse>` element or an `ok` answer from `cam.cgi` is
//! decoded against the schema the command expects. Anything that does not
//! fit becomes [`Reply::Unrecognized`] instead of being guessed at.

use lumix_state::{property_name, PropertyValue};
use serde::Serialize;
use std::collections::BTreeMap;
use xmltree::{Element, XMLNode};

use crate::camcgi::CamReply;

/// Shape a command expects its reply to have.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ReplySchema {
    /// Success carries no data
    Ack,
    /// The listed output arguments must all be present
    Values(Vec<String>),
    /// Every element of the reply is a camera property
    State,
}

/// A decoded reply.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Reply {
    Ack,
    /// Output arguments by name
    Values(BTreeMap<String, String>),
    /// Camera properties by canonical name, in document order
    State(Vec<(String, PropertyValue)>),
    /// The reply did not match the expected schema
    Unrecognized(String),
}

impl Reply {
    /// Decode the `<ActionResponse>` element against `schema`
    pub fn decode(schema: &ReplySchema, response: &Element) -> Self {
        match schema {
            ReplySchema::Ack => Reply::Ack,
            ReplySchema::Values(expected) => {
                let values: BTreeMap<String, String> = child_elements(response)
                    .map(|child| (child.name.clone(), text_of(child)))
                    .collect();
                match expected.iter().find(|name| !values.contains_key(name.as_str())) {
                    Some(missing) => Reply::Unrecognized(format!("missing output {}", missing)),
                    None => Reply::Values(values),
                }
            }
            ReplySchema::State => {
                let mut properties = Vec::new();
                collect_state(response, &mut properties);
                if properties.is_empty() {
                    Reply::Unrecognized(format!("{} carries no state", response.name))
                } else {
                    Reply::State(properties)
                }
            }
        }
    }

    /// Decode an `ok` answer from `cam.cgi` against `schema`.
    ///
    /// Text answers fill `Values` outputs by position; documents by element
    /// name. The `<result>` element itself is never a value.
    pub fn decode_query(schema: &ReplySchema, reply: &CamReply) -> Self {
        match (schema, reply) {
            (ReplySchema::Ack, _) => Reply::Ack,
            (ReplySchema::Values(expected), CamReply::Fields(fields)) => {
                if fields.len() < expected.len() {
                    return Reply::Unrecognized(format!(
                        "expected {} fields, got {}",
                        expected.len(),
                        fields.len()
                    ));
                }
                Reply::Values(expected.iter().cloned().zip(fields.iter().cloned()).collect())
            }
            (ReplySchema::Values(_), CamReply::Document(document)) => {
                Reply::decode(schema, &without_result(document))
            }
            (ReplySchema::State, CamReply::Document(document)) => {
                Reply::decode(schema, &without_result(document))
            }
            (ReplySchema::State, CamReply::Fields(_)) => {
                Reply::Unrecognized("state reply is not a document".to_string())
            }
        }
    }

    /// Named output value of a `Values` reply
    pub fn value(&self, name: &str) -> Option<&str> {
        match self {
            Reply::Values(values) => values.get(name).map(String::as_str),
            _ => None,
        }
    }
}

fn without_result(document: &Element) -> Element {
    let mut document = document.clone();
    document
        .children
        .retain(|node| node.as_element().map_or(true, |element| element.name != "result"));
    document
}

fn child_elements(element: &Element) -> impl Iterator<Item = &Element> {
    element.children.iter().filter_map(XMLNode::as_element)
}

fn text_of(element: &Element) -> String {
    element
        .get_text()
        .map(|text| text.trim().to_string())
        .unwrap_or_default()
}

/// Flatten leaf elements into properties.
///
/// UPnP out-arguments are strings, so cameras often return state as an
/// escaped XML document inside one argument; that text is parsed and
/// flattened as well.
fn collect_state(element: &Element, out: &mut Vec<(String, PropertyValue)>) {
    for child in child_elements(element) {
        if child_elements(child).next().is_some() {
            collect_state(child, out);
            continue;
        }

        let text = text_of(child);
        if text.starts_with('<') {
            if let Ok(embedded) = Element::parse(text.as_bytes()) {
                if child_elements(&embedded).next().is_some() {
                    collect_state(&embedded, out);
                } else {
                    out.push((property_name(&embedded.name), PropertyValue::parse(&text_of(&embedded))));
                }
                continue;
            }
        }
        out.push((property_name(&child.name), PropertyValue::parse(&text)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(xml: &str) -> Element {
        Element::parse(xml.as_bytes()).unwrap()
    }

    #[test]
    fn test_ack_ignores_content() {
        let response = parse("<u:CaptureResponse xmlns:u=\"urn:x\"/>");
        assert_eq!(Reply::decode(&ReplySchema::Ack, &response), Reply::Ack);
    }

    #[test]
    fn test_values_decode() {
        let response = parse(
            "<u:SetFocusResponse xmlns:u=\"urn:x\"><FocusPosition> 564 </FocusPosition><Extra>1</Extra></u:SetFocusResponse>",
        );
        let reply = Reply::decode(&ReplySchema::Values(vec!["FocusPosition".to_string()]), &response);

        assert_eq!(reply.value("FocusPosition"), Some("564"));
        assert_eq!(reply.value("Extra"), Some("1"));
        assert_eq!(reply.value("Missing"), None);
    }

    #[test]
    fn test_values_missing_output_is_unrecognized() {
        let response = parse("<u:SetFocusResponse xmlns:u=\"urn:x\"><Other>1</Other></u:SetFocusResponse>");
        let reply = Reply::decode(&ReplySchema::Values(vec!["FocusPosition".to_string()]), &response);
        assert!(matches!(reply, Reply::Unrecognized(_)));
    }

    #[test]
    fn test_state_decode_normalizes_names() {
        let response = parse(
            "<u:GetStateResponse xmlns:u=\"urn:x\">\
                <BatteryLevel>80</BatteryLevel>\
                <CameraMode>rec</CameraMode>\
                <X_Panasonic_Cam_Sync>busy</X_Panasonic_Cam_Sync>\
             </u:GetStateResponse>",
        );
        let reply = Reply::decode(&ReplySchema::State, &response);

        assert_eq!(
            reply,
            Reply::State(vec![
                ("battery-level".to_string(), PropertyValue::Integer(80)),
                ("camera-mode".to_string(), PropertyValue::Text("rec".to_string())),
                ("sync-status".to_string(), PropertyValue::Text("busy".to_string())),
            ])
        );
    }

    #[test]
    fn test_state_decode_embedded_document() {
        let response = parse(
            "<u:GetStateResponse xmlns:u=\"urn:x\">\
                <State>&lt;state&gt;&lt;batt&gt;55&lt;/batt&gt;&lt;rec&gt;off&lt;/rec&gt;&lt;/state&gt;</State>\
             </u:GetStateResponse>",
        );
        let reply = Reply::decode(&ReplySchema::State, &response);

        assert_eq!(
            reply,
            Reply::State(vec![
                ("battery-level".to_string(), PropertyValue::Integer(55)),
                ("recording-status".to_string(), PropertyValue::Text("off".to_string())),
            ])
        );
    }

    #[test]
    fn test_query_state_document_skips_result() {
        let document = parse(
            "<camrply><result>ok</result><state><batt>3/3</batt><cammode>rec</cammode><rec>off</rec></state></camrply>",
        );
        let reply = Reply::decode_query(&ReplySchema::State, &CamReply::Document(document));

        assert_eq!(
            reply,
            Reply::State(vec![
                ("battery-level".to_string(), PropertyValue::Text("3/3".to_string())),
                ("camera-mode".to_string(), PropertyValue::Text("rec".to_string())),
                ("recording-status".to_string(), PropertyValue::Text("off".to_string())),
            ])
        );
    }

    #[test]
    fn test_query_result_alone_is_not_state() {
        let document = parse("<camrply><result>ok</result></camrply>");
        assert!(matches!(
            Reply::decode_query(&ReplySchema::State, &CamReply::Document(document)),
            Reply::Unrecognized(_)
        ));
        assert!(matches!(
            Reply::decode_query(&ReplySchema::State, &CamReply::Fields(vec!["1".to_string()])),
            Reply::Unrecognized(_)
        ));
    }

    #[test]
    fn test_query_fields_fill_values_by_position() {
        let schema = ReplySchema::Values(vec!["FocusPosition".to_string(), "FocusRange".to_string()]);
        let fields = CamReply::Fields(vec!["564".to_string(), "1024".to_string(), "0".to_string()]);
        let reply = Reply::decode_query(&schema, &fields);

        assert_eq!(reply.value("FocusPosition"), Some("564"));
        assert_eq!(reply.value("FocusRange"), Some("1024"));

        let short = CamReply::Fields(vec!["564".to_string()]);
        assert!(matches!(Reply::decode_query(&schema, &short), Reply::Unrecognized(_)));
    }

    #[test]
    fn test_query_ack_ignores_content() {
        let fields = CamReply::Fields(vec!["anything".to_string()]);
        assert_eq!(Reply::decode_query(&ReplySchema::Ack, &fields), Reply::Ack);
    }

    #[test]
    fn test_empty_state_is_unrecognized() {
        let response = parse("<u:GetStateResponse xmlns:u=\"urn:x\"/>");
        assert!(matches!(
            Reply::decode(&ReplySchema::State, &response),
            Reply::Unrecognized(_)
        ));
    }
}
