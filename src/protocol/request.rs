//! Command type-name grammar
//!
//! Commands are ordinary messages whose type name carries a 4-character
//! prefix: `GET_`, `STT_`, `STP_` or `RTS_`, followed by the bare data type
//! (e.g. `GET_TRANSFORM` asks for a `TRANSFORM`).

/// Length of every command prefix, separator included
pub const PREFIX_LEN: usize = 4;

/// What a command type name asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestKind {
    /// `GET_` - one-shot query
    Get,
    /// `STT_` - start streaming
    Start,
    /// `STP_` - stop streaming
    Stop,
    /// `RTS_` - ready-to-send / not-supported reply
    Rts,
    /// Anything else
    Unknown,
}

impl RequestKind {
    /// Classify a type name by its prefix
    ///
    /// # Examples
    ///
    /// ```
    /// use openigtlink_provider::protocol::request::RequestKind;
    ///
    /// assert_eq!(RequestKind::classify("GET_STATUS"), RequestKind::Get);
    /// assert_eq!(RequestKind::classify("TRANSFORM"), RequestKind::Unknown);
    /// ```
    pub fn classify(type_name: &str) -> Self {
        match type_name.get(..PREFIX_LEN) {
            Some("GET_") => RequestKind::Get,
            Some("STT_") => RequestKind::Start,
            Some("STP_") => RequestKind::Stop,
            Some("RTS_") => RequestKind::Rts,
            _ => RequestKind::Unknown,
        }
    }

    /// True for the four command prefixes
    ///
    /// The transport routes these frames to the command queue.
    pub fn is_command(type_name: &str) -> bool {
        Self::classify(type_name) != RequestKind::Unknown
    }

    /// Prefix string, `None` for [`RequestKind::Unknown`]
    pub fn prefix(self) -> Option<&'static str> {
        match self {
            RequestKind::Get => Some("GET_"),
            RequestKind::Start => Some("STT_"),
            RequestKind::Stop => Some("STP_"),
            RequestKind::Rts => Some("RTS_"),
            RequestKind::Unknown => None,
        }
    }

    /// Build the command type name for `bare`, e.g. `GET_` + `STATUS`
    pub fn type_name_for(self, bare: &str) -> Option<String> {
        self.prefix().map(|prefix| format!("{prefix}{bare}"))
    }
}

/// Drop the first four characters of a type name
///
/// Applied to every inbound command regardless of its prefix. Names shorter
/// than four characters yield an empty string.
pub fn strip_request_prefix(type_name: &str) -> &str {
    type_name
        .char_indices()
        .nth(PREFIX_LEN)
        .map(|(idx, _)| &type_name[idx..])
        .unwrap_or("")
}

/// Check a type name against `^(GET|STT|STP|RTS)_[A-Z0-9]+$`
pub fn is_valid_command_type(type_name: &str) -> bool {
    if RequestKind::classify(type_name) == RequestKind::Unknown {
        return false;
    }
    let bare = &type_name[PREFIX_LEN..];
    !bare.is_empty()
        && bare
            .bytes()
            .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit())
}
