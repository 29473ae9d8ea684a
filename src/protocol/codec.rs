use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use std::ops::RangeInclusive;
use std::time::Duration;

use super::control::{Command, Control, Medium};
use crate::error::ProtocolError;
use crate::storage::ProtocolConfig;

/// Application program command introducer for graphics
pub const ESCAPE_PREFIX: &str = "\x1b_G";
/// String terminator
pub const ESCAPE_SUFFIX: &str = "\x1b\\";
pub const MIN_ID: u32 = 1;
pub const MAX_ID: u32 = u32::MAX;
/// Largest base64 payload sent in one direct-medium message
pub const CHUNK_SIZE: usize = 4096;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(3);

/// Builds and parses graphics escape sequences
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Codec {
    pub prefix: String,
    pub suffix: String,
    pub ids: RangeInclusive<u32>,
    pub timeout: Duration,
}

impl Default for Codec {
    fn default() -> Self {
        Codec {
            prefix: ESCAPE_PREFIX.to_string(),
            suffix: ESCAPE_SUFFIX.to_string(),
            ids: MIN_ID..=MAX_ID,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl Codec {
    pub fn from_config(config: &ProtocolConfig) -> Self {
        Codec {
            ids: config.min_id..=config.max_id,
            timeout: config.timeout(),
            ..Codec::default()
        }
    }

    /// Last byte of an answer
    pub fn terminator(&self) -> u8 {
        self.suffix.bytes().last().unwrap_or(b'\\')
    }

    /// Encode a command into one message, or several chunks when a direct
    /// payload is too large for one
    ///
    /// The terminal places images one pixel left of the requested X offset,
    /// so `OffsetX` goes out incremented (as `X=1` when absent). `OffsetY`
    /// is sent as is.
    pub fn encode(&self, command: &Command) -> Result<Vec<String>, ProtocolError> {
        if let Some(id) = command.id() {
            if !self.ids.contains(&id) {
                return Err(ProtocolError::IdOutOfRange {
                    id,
                    min: *self.ids.start(),
                    max: *self.ids.end(),
                });
            }
        }

        let mut keys: Vec<String> = command
            .controls
            .iter()
            .map(|control| match control {
                Control::OffsetX(x) => format!("X={}", x.saturating_add(1)),
                other => other.to_string(),
            })
            .collect();
        if command.get('X').is_none() {
            keys.push("X=1".to_string());
        }

        let payload = command
            .payload
            .as_deref()
            .map(|bytes| STANDARD.encode(bytes))
            .unwrap_or_default();

        let chunked = command.medium() == Medium::Direct
            && payload.len() > CHUNK_SIZE
            && command.get('m').is_none();
        if !chunked {
            return Ok(vec![self.frame(&keys.join(","), &payload)]);
        }

        // Only the first chunk carries the controls
        let chunks: Vec<&str> = payload
            .as_bytes()
            .chunks(CHUNK_SIZE)
            .map(|chunk| std::str::from_utf8(chunk).unwrap_or_default())
            .collect();
        let last = chunks.len() - 1;

        Ok(chunks
            .iter()
            .enumerate()
            .map(|(n, chunk)| {
                let more = Control::More(n < last).to_string();
                if n == 0 {
                    self.frame(&format!("{},{}", keys.join(","), more), chunk)
                } else {
                    self.frame(&more, chunk)
                }
            })
            .collect())
    }

    fn frame(&self, keys: &str, payload: &str) -> String {
        format!("{}{};{}{}", self.prefix, keys, payload, self.suffix)
    }

    /// Parse one message back into a command, undoing the X compensation
    pub fn decode(&self, message: &str) -> Result<Command, ProtocolError> {
        let body = message
            .strip_prefix(self.prefix.as_str())
            .and_then(|rest| rest.strip_suffix(self.suffix.as_str()))
            .ok_or_else(|| ProtocolError::Malformed(format!("not a graphics message: {:?}", message)))?;

        let (keys, payload) = body.split_once(';').unwrap_or((body, ""));

        let mut command = Command::new();
        for pair in keys.split(',').filter(|pair| !pair.is_empty()) {
            let (key, value) = pair
                .split_once('=')
                .ok_or_else(|| ProtocolError::Malformed(format!("expected key=value, got {:?}", pair)))?;

            let control = match Control::parse(key, value)? {
                Control::OffsetX(x) => Control::OffsetX(x.saturating_sub(1)),
                other => other,
            };
            command.controls.push(control);
        }

        if !payload.is_empty() {
            command.payload = Some(STANDARD.decode(payload)?);
        }

        Ok(command)
    }
}

/// A terminal's reply to a graphics command, e.g. `ESC _Gi=5;OK ESC \`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Answer {
    pub raw: String,
}

impl Answer {
    pub fn new(raw: impl Into<String>) -> Self {
        Answer { raw: raw.into() }
    }

    pub fn is_ok(&self) -> bool {
        self.raw.contains(";OK")
    }

    fn body(&self) -> &str {
        let start = self.raw.find(ESCAPE_PREFIX).map_or(0, |at| at + ESCAPE_PREFIX.len());
        let body = &self.raw[start..];
        body.strip_suffix(ESCAPE_SUFFIX).unwrap_or(body)
    }

    /// Image id the answer refers to
    pub fn id(&self) -> Option<u32> {
        let (keys, _) = self.body().split_once(';')?;
        keys.split(',')
            .find_map(|pair| pair.strip_prefix("i="))
            .and_then(|id| id.parse().ok())
    }

    /// `OK` or the error text
    pub fn message(&self) -> &str {
        self.body().split_once(';').map_or("", |(_, message)| message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::control::{Action, Format};

    fn display(id: u32) -> Command {
        Command::new()
            .with(Control::OffsetX(0))
            .with(Control::Action(Action::TransmitDisplay))
            .with(Control::Id(id))
            .with_payload("/tmp/tty-graphics-protocol-x.png")
    }

    #[test]
    fn test_encode_compensates_offset_x() {
        let codec = Codec::default();
        let messages = codec.encode(&display(5)).unwrap();
        assert_eq!(messages.len(), 1);

        let message = &messages[0];
        assert!(message.starts_with("\x1b_G"));
        assert!(message.ends_with("\x1b\\"));
        assert!(message.contains("X=1"));
        assert!(message.contains("a=T"));
        assert!(message.contains("i=5"));

        let payload = message.split_once(';').unwrap().1.trim_end_matches("\x1b\\");
        assert_eq!(
            STANDARD.decode(payload).unwrap(),
            b"/tmp/tty-graphics-protocol-x.png"
        );
    }

    #[test]
    fn test_encode_appends_missing_offset_x() {
        let codec = Codec::default();
        let messages = codec.encode(&Command::query(1)).unwrap();
        assert_eq!(messages, vec!["\x1b_Ga=q,i=1,X=1;\x1b\\".to_string()]);
    }

    #[test]
    fn test_encode_keeps_offset_y() {
        let codec = Codec::default();
        let command = Command::new().with(Control::OffsetY(7));
        let message = &codec.encode(&command).unwrap()[0];
        assert!(message.contains("Y=7"));
    }

    #[test]
    fn test_encode_rejects_id_outside_range() {
        let codec = Codec {
            ids: 10..=20,
            ..Codec::default()
        };
        let err = codec.encode(&Command::query(21)).unwrap_err();
        assert!(matches!(err, ProtocolError::IdOutOfRange { id: 21, min: 10, max: 20 }));
        assert!(codec.encode(&Command::query(0)).is_err());
        assert!(codec.encode(&Command::query(10)).is_ok());
    }

    #[test]
    fn test_direct_payload_is_chunked() {
        let codec = Codec::default();
        let command = Command::new()
            .with(Control::Action(Action::TransmitDisplay))
            .with(Control::Medium(Medium::Direct))
            .with(Control::Format(Format::Png))
            .with(Control::Id(3))
            .with_payload(vec![7u8; 6000]);

        let messages = codec.encode(&command).unwrap();
        // 6000 bytes are 8000 base64 characters
        assert_eq!(messages.len(), 2);
        assert!(messages[0].contains("a=T"));
        assert!(messages[0].contains(",m=1;"));
        assert!(messages[1].starts_with("\x1b_Gm=0;"));
        assert!(!messages[1].contains("a=T"));

        let joined: String = messages
            .iter()
            .map(|m| m.split_once(';').unwrap().1.trim_end_matches("\x1b\\"))
            .collect();
        assert_eq!(STANDARD.decode(joined).unwrap(), vec![7u8; 6000]);
    }

    #[test]
    fn test_tempfile_payload_is_not_chunked() {
        let codec = Codec::default();
        let command = Command::new()
            .with(Control::Medium(Medium::TempFile))
            .with_payload(vec![b'a'; 6000]);
        assert_eq!(codec.encode(&command).unwrap().len(), 1);
    }

    #[test]
    fn test_decode_inverts_encode() {
        let codec = Codec::default();
        let command = display(9).with(Control::OffsetX(4)).with(Control::ZIndex(-1));
        let message = &codec.encode(&command).unwrap()[0];
        assert!(message.contains("X=5"));

        let decoded = codec.decode(message).unwrap();
        assert_eq!(decoded, command);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        let codec = Codec::default();
        assert!(codec.decode("hello").is_err());
        assert!(codec.decode("\x1b_Ga;\x1b\\").is_err());
        assert!(matches!(
            codec.decode("\x1b_Ga=q;!!!\x1b\\"),
            Err(ProtocolError::Base64(_))
        ));
    }

    #[test]
    fn test_answer_parsing() {
        let ok = Answer::new("\x1b_Gi=31;OK\x1b\\");
        assert!(ok.is_ok());
        assert_eq!(ok.id(), Some(31));
        assert_eq!(ok.message(), "OK");

        let err = Answer::new("\x1b_Gi=1;ENOENT:No such image\x1b\\");
        assert!(!err.is_ok());
        assert_eq!(err.message(), "ENOENT:No such image");
    }
}
