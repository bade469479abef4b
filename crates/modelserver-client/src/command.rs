//! Structural edit commands.
//!
//! Commands are explicit tagged variants. The wire form carries the tag under
//! `type`; decoding looks the tag up through [`CommandKind::from_tag`] and
//! anything outside the built-in vocabulary becomes [`Command::Custom`].

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::decode::{self, DecodeError, TypeGuard};
use crate::model::{ModelElement, ModelReference};

const TYPE_FIELD: &str = "type";
const OBJECTS_TO_ADD_FRAGMENT: &str = "//@objectsToAdd";

/// Discriminator of a [`Command`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CommandKind {
    /// Replace the values of a feature.
    Set,
    /// Append values to a feature.
    Add,
    /// Remove values from a feature.
    Remove,
    /// Execute several commands as one unit.
    Compound,
    /// Server-specific command identified by its tag.
    Custom(String),
}

impl CommandKind {
    /// Looks a wire tag up in the command vocabulary.
    #[must_use]
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "set" => Self::Set,
            "add" => Self::Add,
            "remove" => Self::Remove,
            "compound" => Self::Compound,
            other => Self::Custom(other.to_owned()),
        }
    }

    /// Wire tag of the kind.
    #[must_use]
    pub fn tag(&self) -> &str {
        match self {
            Self::Set => "set",
            Self::Add => "add",
            Self::Remove => "remove",
            Self::Compound => "compound",
            Self::Custom(tag) => tag.as_str(),
        }
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.tag())
    }
}

/// Payload shared by `set`, `add` and `remove`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureChange {
    /// Element whose feature changes.
    pub owner: Option<ModelReference>,
    /// Name of the changed feature.
    #[serde(default)]
    pub feature: String,
    /// Scalar values.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub data_values: Vec<Value>,
    /// References to existing or newly added objects.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub object_values: Vec<ModelReference>,
    /// New objects created by the command.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub objects_to_add: Vec<Value>,
    /// Positions affected within a many-valued feature.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub indices: Vec<u64>,
}

impl FeatureChange {
    fn classify(owner: ModelReference, feature: String, values: Vec<Value>) -> Self {
        let mut change = Self {
            owner: Some(owner),
            feature,
            ..Self::default()
        };

        // Every value must be a decodable reference or an embedded object;
        // otherwise the whole list is plain data.
        let elements: Option<Vec<Option<ModelReference>>> = values
            .iter()
            .map(|value| {
                if decode::is_model_reference(value) {
                    ModelReference::deserialize(value).ok().map(Some)
                } else {
                    decode::is_model_object(value).then_some(None)
                }
            })
            .collect();
        let Some(elements) = elements.filter(|_| !values.is_empty()) else {
            change.data_values = values;
            return change;
        };

        for (value, element) in values.into_iter().zip(elements) {
            if let Some(reference) = element {
                change.object_values.push(reference);
                continue;
            }
            let placeholder = ModelReference {
                type_tag: value.element_type().map(ToOwned::to_owned),
                reference: format!("{OBJECTS_TO_ADD_FRAGMENT}.{}", change.objects_to_add.len()),
            };
            change.object_values.push(placeholder);
            change.objects_to_add.push(value);
        }
        change
    }
}

/// Ordered list of commands executed atomically by the server.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompoundCommand {
    /// Child commands in execution order.
    #[serde(default)]
    pub commands: Vec<Command>,
}

/// Command outside the built-in vocabulary.
#[derive(Debug, Clone, PartialEq)]
pub struct CustomCommand {
    /// Wire tag.
    pub tag: String,
    /// Remaining properties.
    pub properties: Map<String, Value>,
}

/// Structural edit sent to the server.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Replace the values of a feature.
    Set(FeatureChange),
    /// Append values to a feature.
    Add(FeatureChange),
    /// Remove values from a feature.
    Remove(FeatureChange),
    /// Execute several commands as one unit.
    Compound(CompoundCommand),
    /// Server-specific command.
    Custom(CustomCommand),
}

/// Guard for command payloads.
pub const COMMAND: TypeGuard<Command> = TypeGuard::new("command", decode::is_command);

impl Command {
    /// Sets `feature` of `owner` to `values`.
    ///
    /// Values that are all model references or objects populate
    /// `objectValues` (new objects also land in `objectsToAdd`); anything else
    /// populates `dataValues`.
    #[must_use]
    pub fn set(owner: ModelReference, feature: impl Into<String>, values: Vec<Value>) -> Self {
        Self::Set(FeatureChange::classify(owner, feature.into(), values))
    }

    /// Adds `values` to `feature` of `owner`, classified as for [`Command::set`].
    #[must_use]
    pub fn add(owner: ModelReference, feature: impl Into<String>, values: Vec<Value>) -> Self {
        Self::Add(FeatureChange::classify(owner, feature.into(), values))
    }

    /// Removes `values` from `feature` of `owner`.
    ///
    /// A list made only of unsigned integers is read as positions and
    /// populates `indices`; otherwise values are classified as for
    /// [`Command::set`].
    #[must_use]
    pub fn remove(owner: ModelReference, feature: impl Into<String>, values: Vec<Value>) -> Self {
        let feature_name = feature.into();
        if !values.is_empty() && values.iter().all(Value::is_u64) {
            let indices = values.iter().filter_map(Value::as_u64).collect();
            return Self::Remove(FeatureChange {
                owner: Some(owner),
                feature: feature_name,
                indices,
                ..FeatureChange::default()
            });
        }
        Self::Remove(FeatureChange::classify(owner, feature_name, values))
    }

    /// Groups commands into one atomic unit.
    #[must_use]
    pub const fn compound(commands: Vec<Self>) -> Self {
        Self::Compound(CompoundCommand { commands })
    }

    /// Builds a server-specific command.
    #[must_use]
    pub fn custom(tag: impl Into<String>, properties: Map<String, Value>) -> Self {
        Self::Custom(CustomCommand {
            tag: tag.into(),
            properties,
        })
    }

    /// Discriminator of the command.
    #[must_use]
    pub fn kind(&self) -> CommandKind {
        match self {
            Self::Set(_) => CommandKind::Set,
            Self::Add(_) => CommandKind::Add,
            Self::Remove(_) => CommandKind::Remove,
            Self::Compound(_) => CommandKind::Compound,
            Self::Custom(custom) => CommandKind::Custom(custom.tag.clone()),
        }
    }

    /// Owner of a feature command.
    #[must_use]
    pub const fn owner(&self) -> Option<&ModelReference> {
        match self {
            Self::Set(change) | Self::Add(change) | Self::Remove(change) => change.owner.as_ref(),
            Self::Compound(_) | Self::Custom(_) => None,
        }
    }

    /// Decodes a command from its wire form.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError`] when the value has no string `type` tag or its
    /// body does not fit the tagged variant.
    pub fn from_value(value: &Value) -> Result<Self, DecodeError> {
        if !COMMAND.matches(value) {
            return Err(DecodeError::new(COMMAND.expected(), value));
        }
        let tag = value
            .get(TYPE_FIELD)
            .and_then(Value::as_str)
            .unwrap_or_default();

        Ok(match CommandKind::from_tag(tag) {
            CommandKind::Set => Self::Set(decode::deserialize_ref(value, "set command")?),
            CommandKind::Add => Self::Add(decode::deserialize_ref(value, "add command")?),
            CommandKind::Remove => Self::Remove(decode::deserialize_ref(value, "remove command")?),
            CommandKind::Compound => {
                let commands = match value.get("commands") {
                    None => Vec::new(),
                    Some(children) => children
                        .as_array()
                        .ok_or_else(|| DecodeError::new("compound command", value))?
                        .iter()
                        .map(Self::from_value)
                        .collect::<Result<Vec<_>, _>>()?,
                };
                Self::compound(commands)
            }
            CommandKind::Custom(tag) => {
                let mut properties = value.as_object().cloned().unwrap_or_default();
                properties.remove(TYPE_FIELD);
                Self::custom(tag, properties)
            }
        })
    }

    /// Encodes the command in its wire form.
    ///
    /// # Errors
    ///
    /// Returns the serialiser's error when a payload cannot be encoded.
    pub fn to_value(&self) -> Result<Value, serde_json::Error> {
        let mut body = match self {
            Self::Set(change) | Self::Add(change) | Self::Remove(change) => {
                into_object(serde_json::to_value(change)?)
            }
            Self::Compound(compound) => {
                let commands = compound
                    .commands
                    .iter()
                    .map(Self::to_value)
                    .collect::<Result<Vec<_>, _>>()?;
                let mut object = Map::new();
                object.insert(String::from("commands"), Value::Array(commands));
                object
            }
            Self::Custom(custom) => custom.properties.clone(),
        };
        body.insert(
            String::from(TYPE_FIELD),
            Value::String(self.kind().tag().to_owned()),
        );
        Ok(Value::Object(body))
    }
}

fn into_object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(object) => object,
        _ => Map::new(),
    }
}

impl Serialize for Command {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value()
            .map_err(serde::ser::Error::custom)?
            .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Command {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Self::from_value(&value).map_err(serde::de::Error::custom)
    }
}
