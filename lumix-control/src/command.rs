//! Command values sent through the [`CommandClient`](crate::CommandClient).

use serde::Serialize;

use crate::camcgi::CamQuery;
use crate::reply::ReplySchema;

/// Where a command's successful reply finds the value of a camera property.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum EffectSource {
    /// The value the command itself sent, by argument position
    Argument(usize),
    /// A named output of a `Values` reply
    Output(String),
    /// A value fixed when the command was built
    Constant(String),
}

/// How a command reaches the camera
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Route {
    /// UPnP action on the service declaring it, arguments paired with the
    /// declared in-argument names
    Action,
    /// `cam.cgi` request
    Query(CamQuery),
}

/// One camera property a successful reply reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PropertyEffect {
    /// Canonical property name, e.g. `zoom-position`
    pub property: String,
    pub source: EffectSource,
}

/// A single remote-control action.
///
/// Commands are plain values; build one per invocation. A UPnP action
/// carries ordered argument values, paired with the in-argument names the
/// camera declared. A `cam.cgi` command carries its whole query instead.
///
/// ```
/// use lumix_control::{Command, EffectSource, ReplySchema};
///
/// let command = Command::new("SetZoom")
///     .arg(50)
///     .reports("zoom-position", EffectSource::Argument(0));
///
/// assert_eq!(command.name(), "SetZoom");
/// assert_eq!(command.args(), ["50"]);
/// assert_eq!(command.schema(), &ReplySchema::Ack);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Command {
    name: String,
    route: Route,
    args: Vec<String>,
    schema: ReplySchema,
    effects: Vec<PropertyEffect>,
    requires_idle: bool,
}

impl Command {
    /// A UPnP action expecting a bare acknowledgement
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            route: Route::Action,
            args: Vec::new(),
            schema: ReplySchema::Ack,
            effects: Vec::new(),
            requires_idle: false,
        }
    }

    /// A `cam.cgi` command named `name` in logs and errors
    pub fn query(name: impl Into<String>, query: CamQuery) -> Self {
        Self {
            route: Route::Query(query),
            ..Self::new(name)
        }
    }

    /// Append one argument
    pub fn arg(mut self, value: impl ToString) -> Self {
        self.args.push(value.to_string());
        self
    }

    /// Set the expected reply schema
    pub fn expect(mut self, schema: ReplySchema) -> Self {
        self.schema = schema;
        self
    }

    /// Declare that a successful reply reports `property`
    pub fn reports(mut self, property: impl Into<String>, source: EffectSource) -> Self {
        self.effects.push(PropertyEffect {
            property: property.into(),
            source,
        });
        self
    }

    /// Refuse to send while the camera reports local operation
    pub fn requires_idle(mut self) -> Self {
        self.requires_idle = true;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn route(&self) -> &Route {
        &self.route
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub fn schema(&self) -> &ReplySchema {
        &self.schema
    }

    pub fn effects(&self) -> &[PropertyEffect] {
        &self.effects
    }

    pub fn is_idle_only(&self) -> bool {
        self.requires_idle
    }
}
