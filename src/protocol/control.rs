use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ProtocolError;

/// What the terminal should do with a graphics command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Transmit,
    TransmitDisplay,
    Query,
    Display,
    Delete,
}

impl Action {
    pub fn code(self) -> char {
        match self {
            Action::Transmit => 't',
            Action::TransmitDisplay => 'T',
            Action::Query => 'q',
            Action::Display => 'p',
            Action::Delete => 'd',
        }
    }

    fn from_code(code: &str) -> Option<Self> {
        Some(match code {
            "t" => Action::Transmit,
            "T" => Action::TransmitDisplay,
            "q" => Action::Query,
            "p" => Action::Display,
            "d" => Action::Delete,
            _ => return None,
        })
    }

    /// Whether the terminal replies to this action
    pub fn expects_answer(self) -> bool {
        matches!(
            self,
            Action::Transmit | Action::TransmitDisplay | Action::Query
        )
    }
}

/// How the image data reaches the terminal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Medium {
    /// Payload carries the encoded bytes
    #[serde(rename = "direct")]
    Direct,
    /// Payload is the path of a file the terminal reads
    #[serde(rename = "file")]
    File,
    /// Like `File`, but the terminal deletes the file after reading it
    #[default]
    #[serde(rename = "tempfile")]
    TempFile,
    #[serde(rename = "shared_mem")]
    SharedMemory,
}

impl Medium {
    pub fn code(self) -> char {
        match self {
            Medium::Direct => 'd',
            Medium::File => 'f',
            Medium::TempFile => 't',
            Medium::SharedMemory => 's',
        }
    }

    fn from_code(code: &str) -> Option<Self> {
        Some(match code {
            "d" => Medium::Direct,
            "f" => Medium::File,
            "t" => Medium::TempFile,
            "s" => Medium::SharedMemory,
            _ => return None,
        })
    }
}

impl FromStr for Medium {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "direct" => Ok(Medium::Direct),
            "file" => Ok(Medium::File),
            "tempfile" | "temp" => Ok(Medium::TempFile),
            "shared_mem" | "shm" => Ok(Medium::SharedMemory),
            _ => Err(format!(
                "invalid medium '{}': use direct, file, tempfile or shared_mem",
                s
            )),
        }
    }
}

/// Pixel format of transmitted data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    Rgb,
    Rgba,
    Png,
}

impl Format {
    pub fn code(self) -> u32 {
        match self {
            Format::Rgb => 24,
            Format::Rgba => 32,
            Format::Png => 100,
        }
    }

    fn from_code(code: &str) -> Option<Self> {
        Some(match code {
            "24" => Format::Rgb,
            "32" => Format::Rgba,
            "100" => Format::Png,
            _ => return None,
        })
    }
}

/// Which placements a delete command removes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeleteTarget {
    All,
    Id,
    Cursor,
    Position,
    ZIndex,
}

impl DeleteTarget {
    fn code(self) -> char {
        match self {
            DeleteTarget::All => 'a',
            DeleteTarget::Id => 'i',
            DeleteTarget::Cursor => 'c',
            DeleteTarget::Position => 'p',
            DeleteTarget::ZIndex => 'z',
        }
    }

    fn from_code(code: char) -> Option<Self> {
        Some(match code {
            'a' => DeleteTarget::All,
            'i' => DeleteTarget::Id,
            'c' => DeleteTarget::Cursor,
            'p' => DeleteTarget::Position,
            'z' => DeleteTarget::ZIndex,
            _ => return None,
        })
    }
}

/// One `key=value` pair of a graphics command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Control {
    Action(Action),
    Medium(Medium),
    Format(Format),
    Id(u32),
    ZIndex(i32),
    /// Pixel offset inside the first cell, as the caller means it
    OffsetX(u32),
    OffsetY(u32),
    CropW(u32),
    CropH(u32),
    /// Uppercase target codes also free the image data
    Delete { target: DeleteTarget, free: bool },
    Width(u32),
    Height(u32),
    More(bool),
}

impl Control {
    /// Human readable name, for logs
    pub fn name(&self) -> &'static str {
        match self {
            Control::Action(_) => "action",
            Control::Medium(_) => "medium",
            Control::Format(_) => "format",
            Control::Id(_) => "id",
            Control::ZIndex(_) => "z_index",
            Control::OffsetX(_) => "offset_x",
            Control::OffsetY(_) => "offset_y",
            Control::CropW(_) => "crop_w",
            Control::CropH(_) => "crop_h",
            Control::Delete { .. } => "delete",
            Control::Width(_) => "width",
            Control::Height(_) => "height",
            Control::More(_) => "more",
        }
    }

    /// Key on the wire
    pub fn key(&self) -> char {
        match self {
            Control::Action(_) => 'a',
            Control::Medium(_) => 't',
            Control::Format(_) => 'f',
            Control::Id(_) => 'i',
            Control::ZIndex(_) => 'z',
            Control::OffsetX(_) => 'X',
            Control::OffsetY(_) => 'Y',
            Control::CropW(_) => 'w',
            Control::CropH(_) => 'h',
            Control::Delete { .. } => 'd',
            Control::Width(_) => 's',
            Control::Height(_) => 'v',
            Control::More(_) => 'm',
        }
    }

    /// Value on the wire, without any compensation applied
    pub fn value(&self) -> String {
        match *self {
            Control::Action(action) => action.code().to_string(),
            Control::Medium(medium) => medium.code().to_string(),
            Control::Format(format) => format.code().to_string(),
            Control::Id(v)
            | Control::OffsetX(v)
            | Control::OffsetY(v)
            | Control::CropW(v)
            | Control::CropH(v)
            | Control::Width(v)
            | Control::Height(v) => v.to_string(),
            Control::ZIndex(z) => z.to_string(),
            Control::Delete { target, free } => {
                let code = target.code();
                if free {
                    code.to_ascii_uppercase().to_string()
                } else {
                    code.to_string()
                }
            }
            Control::More(more) => u8::from(more).to_string(),
        }
    }

    /// Parse a wire `key=value` pair
    pub fn parse(key: &str, value: &str) -> Result<Control, ProtocolError> {
        let invalid = || ProtocolError::Malformed(format!("invalid value {:?} for key {:?}", value, key));
        let number = || value.parse::<u32>().map_err(|_| invalid());

        let control = match key {
            "a" => Control::Action(Action::from_code(value).ok_or_else(invalid)?),
            "t" => Control::Medium(Medium::from_code(value).ok_or_else(invalid)?),
            "f" => Control::Format(Format::from_code(value).ok_or_else(invalid)?),
            "i" => Control::Id(number()?),
            "z" => Control::ZIndex(value.parse().map_err(|_| invalid())?),
            "X" => Control::OffsetX(number()?),
            "Y" => Control::OffsetY(number()?),
            "w" => Control::CropW(number()?),
            "h" => Control::CropH(number()?),
            "d" => {
                let mut chars = value.chars();
                let (Some(code), None) = (chars.next(), chars.next()) else {
                    return Err(invalid());
                };
                let target = DeleteTarget::from_code(code.to_ascii_lowercase()).ok_or_else(invalid)?;
                Control::Delete {
                    target,
                    free: code.is_ascii_uppercase(),
                }
            }
            "s" => Control::Width(number()?),
            "v" => Control::Height(number()?),
            "m" => match value {
                "0" => Control::More(false),
                "1" => Control::More(true),
                _ => return Err(invalid()),
            },
            _ => return Err(ProtocolError::Malformed(format!("unknown key {:?}", key))),
        };

        Ok(control)
    }
}

impl fmt::Display for Control {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.key(), self.value())
    }
}

/// An ordered set of controls plus an optional payload
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Command {
    pub controls: Vec<Control>,
    pub payload: Option<Vec<u8>>,
}

impl Command {
    pub fn new() -> Self {
        Command::default()
    }

    /// Add a control, replacing an earlier one with the same key in place
    pub fn with(mut self, control: Control) -> Self {
        self.set(control);
        self
    }

    pub fn set(&mut self, control: Control) {
        match self.controls.iter_mut().find(|c| c.key() == control.key()) {
            Some(existing) => *existing = control,
            None => self.controls.push(control),
        }
    }

    pub fn with_payload(mut self, payload: impl Into<Vec<u8>>) -> Self {
        self.payload = Some(payload.into());
        self
    }

    pub fn get(&self, key: char) -> Option<&Control> {
        self.controls.iter().find(|c| c.key() == key)
    }

    /// The action, transmit when none is set
    pub fn action(&self) -> Action {
        match self.get('a') {
            Some(Control::Action(action)) => *action,
            _ => Action::Transmit,
        }
    }

    pub fn id(&self) -> Option<u32> {
        match self.get('i') {
            Some(Control::Id(id)) => Some(*id),
            _ => None,
        }
    }

    /// The medium, direct when none is set
    pub fn medium(&self) -> Medium {
        match self.get('t') {
            Some(Control::Medium(medium)) => *medium,
            _ => Medium::Direct,
        }
    }

    /// Ask whether the terminal knows about image `id`
    pub fn query(id: u32) -> Self {
        Command::new()
            .with(Control::Action(Action::Query))
            .with(Control::Id(id))
    }

    /// Delete the placements of image `id`, and its data too when `free`
    pub fn delete_id(id: u32, free: bool) -> Self {
        Command::new()
            .with(Control::Action(Action::Delete))
            .with(Control::Delete {
                target: DeleteTarget::Id,
                free,
            })
            .with(Control::Id(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_control_keys_and_values() {
        assert_eq!(Control::Action(Action::TransmitDisplay).to_string(), "a=T");
        assert_eq!(Control::Medium(Medium::TempFile).to_string(), "t=t");
        assert_eq!(Control::Format(Format::Png).to_string(), "f=100");
        assert_eq!(Control::ZIndex(-1).to_string(), "z=-1");
        assert_eq!(Control::More(true).to_string(), "m=1");
        assert_eq!(
            Control::Delete {
                target: DeleteTarget::Id,
                free: true
            }
            .to_string(),
            "d=I"
        );
    }

    #[test]
    fn test_control_parse() {
        assert_eq!(
            Control::parse("d", "z").unwrap(),
            Control::Delete {
                target: DeleteTarget::ZIndex,
                free: false
            }
        );
        assert_eq!(Control::parse("i", "42").unwrap(), Control::Id(42));
        assert!(Control::parse("a", "x").is_err());
        assert!(Control::parse("q", "1").is_err());
        assert!(Control::parse("d", "ii").is_err());
    }

    #[test]
    fn test_with_replaces_same_key() {
        let command = Command::new()
            .with(Control::Id(1))
            .with(Control::ZIndex(3))
            .with(Control::Id(2));
        assert_eq!(command.controls, vec![Control::Id(2), Control::ZIndex(3)]);
    }

    #[test]
    fn test_default_action_and_medium() {
        let command = Command::new();
        assert_eq!(command.action(), Action::Transmit);
        assert_eq!(command.medium(), Medium::Direct);
        assert!(command.action().expects_answer());
        assert!(!Action::Delete.expects_answer());
        assert!(!Action::Display.expects_answer());
    }

    #[test]
    fn test_medium_from_config_name() {
        assert_eq!("tempfile".parse::<Medium>(), Ok(Medium::TempFile));
        assert_eq!("shared_mem".parse::<Medium>(), Ok(Medium::SharedMemory));
        assert!("pipe".parse::<Medium>().is_err());
    }
}
