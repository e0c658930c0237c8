//! The camera's `cam.cgi` remote-control interface.
//!
//! Every request is `GET /cam.cgi?mode=..&type=..&value=..&value2=..`. The
//! camera answers with either an XML document
//! (`<camrply><result>ok</result>...</camrply>`) or comma-separated text
//! (`ok,564,1024,...`). Any result other than `ok` is a failure.

use serde::Serialize;
use xmltree::Element;

use crate::error::{CommandError, Result};

/// `mode` values the camera accepts
pub const MODES: &[&str] = &[
    "accctrl",
    "camcmd",
    "camctrl",
    "getinfo",
    "getsetting",
    "getstate",
    "setsetting",
    "startstream",
    "stopstream",
];

/// Query parameters of one `cam.cgi` request.
///
/// ```
/// use lumix_control::CamQuery;
///
/// let query = CamQuery::new("camctrl").with_type("focus").with_value("tele-fast");
/// assert_eq!(
///     query.params(),
///     [("mode", "camctrl"), ("type", "focus"), ("value", "tele-fast")]
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CamQuery {
    mode: String,
    kind: Option<String>,
    value: Option<String>,
    value2: Option<String>,
}

impl CamQuery {
    pub fn new(mode: impl Into<String>) -> Self {
        Self {
            mode: mode.into(),
            kind: None,
            value: None,
            value2: None,
        }
    }

    /// Set the `type` parameter
    pub fn with_type(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }

    pub fn with_value(mut self, value: impl ToString) -> Self {
        self.value = Some(value.to_string());
        self
    }

    pub fn with_value2(mut self, value2: impl ToString) -> Self {
        self.value2 = Some(value2.to_string());
        self
    }

    pub fn mode(&self) -> &str {
        &self.mode
    }

    /// Parameters in the order the camera's own app sends them
    pub fn params(&self) -> Vec<(&'static str, &str)> {
        let mut params = vec![("mode", self.mode.as_str())];
        params.extend(self.kind.as_deref().map(|kind| ("type", kind)));
        params.extend(self.value.as_deref().map(|value| ("value", value)));
        params.extend(self.value2.as_deref().map(|value2| ("value2", value2)));
        params
    }

    /// Everything but the access handshake needs an open session
    pub fn needs_session(&self) -> bool {
        self.mode != "accctrl"
    }

    pub fn is_known_mode(&self) -> bool {
        MODES.contains(&self.mode.as_str())
    }
}

/// Undecoded answer to a `cam.cgi` request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawReply {
    /// Media type without parameters, e.g. `text/xml`
    pub content_type: String,
    pub body: String,
}

impl RawReply {
    pub fn xml(body: impl Into<String>) -> Self {
        Self {
            content_type: "text/xml".to_string(),
            body: body.into(),
        }
    }

    pub fn text(body: impl Into<String>) -> Self {
        Self {
            content_type: "text/plain".to_string(),
            body: body.into(),
        }
    }

    fn is_xml(&self) -> bool {
        matches!(
            self.content_type.split(';').next().map(str::trim),
            Some("text/xml" | "application/xml" | "xml")
        )
    }

    fn is_text(&self) -> bool {
        self.content_type.split(';').next().map(str::trim) == Some("text/plain")
    }
}

/// A `cam.cgi` answer whose result was `ok`
#[derive(Debug, Clone, PartialEq)]
pub enum CamReply {
    /// The `<camrply>` document
    Document(Element),
    /// Text fields after the leading `ok`
    Fields(Vec<String>),
}

/// Check the result of a `cam.cgi` answer to `command`.
///
/// `err_busy`, `err_param` and `err_reject` map to their own
/// [`CommandError`] variants; other results become
/// [`CommandError::DeviceStatus`].
pub fn parse_reply(command: &str, raw: &RawReply) -> Result<CamReply> {
    let (status, reply) = if raw.is_xml() {
        let document = Element::parse(raw.body.as_bytes())
            .map_err(|e| CommandError::MalformedResponse(format!("{}: {}", command, e)))?;
        let status = document
            .get_child("result")
            .and_then(|result| result.get_text())
            .map(|text| text.trim().to_string())
            .ok_or_else(|| CommandError::MalformedResponse(format!("{}: reply has no result", command)))?;
        (status, CamReply::Document(document))
    } else if raw.is_text() {
        let mut fields = raw.body.trim().split(',').map(|field| field.trim().to_string());
        let status = fields.next().unwrap_or_default();
        (status, CamReply::Fields(fields.collect()))
    } else {
        return Err(CommandError::MalformedResponse(format!(
            "{}: unexpected content type {}",
            command, raw.content_type
        )));
    };

    if status == "ok" {
        Ok(reply)
    } else {
        Err(CommandError::from_status(command, &status))
    }
}

const ACCESS_KEY: [u32; 9] = [
    0x3534_4434,
    0x3033_3934,
    0x3031_302d,
    0x3031_2d30,
    0x382d_3030,
    0x2d31_3030,
    0x3041_3230,
    0x3230_3030,
    0x3831_3534,
];
const ACCESS_CHECK: u32 = 0xff35_5046;

/// `value` and `value2` answering a `req_acc_g` challenge.
///
/// The challenge is four bytes in hex, read as a little-endian word; both
/// answers are that word XORed with fixed keys, written big-endian in hex.
pub fn access_response(challenge: &str) -> Result<(String, String)> {
    let challenge = challenge.trim();
    let invalid = || CommandError::MalformedResponse(format!("accctrl: invalid challenge {:?}", challenge));
    if challenge.len() != 8 || !challenge.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(invalid());
    }
    let seed = u32::from_str_radix(challenge, 16).map_err(|_| invalid())?.swap_bytes();

    let value: String = ACCESS_KEY.iter().map(|key| format!("{:08x}", seed ^ key)).collect();
    let value2 = format!("{:08x}", seed ^ ACCESS_CHECK);
    Ok((value, value2))
}
