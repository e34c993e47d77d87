use std::fmt;

/// One-byte discriminator stored alongside every KV entry.
///
/// Object read paths must skip any entry whose tag is not
/// [`RecordKind::Object`] so that other record classes sharing the key
/// space never leak into object listings or proximity scans.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum RecordKind {
    Object = 1,
    /// Reserved for persisted events; nothing writes this tag today.
    Event = 2,
}

impl RecordKind {
    pub fn as_byte(self) -> u8 {
        self as u8
    }

    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            1 => Some(Self::Object),
            2 => Some(Self::Event),
            _ => None,
        }
    }

    /// Returns `true` if `byte` is the tag of this kind.
    pub fn matches(self, byte: u8) -> bool {
        self.as_byte() == byte
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Object => write!(f, "object"),
            Self::Event => write!(f, "event"),
        }
    }
}
