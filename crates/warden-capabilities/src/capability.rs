//! The closed capability ID space.
//!
//! Indices are persisted inside suite settings records, so a variant's
//! position in [`Capability::ALL`] must never change. New capabilities are
//! appended.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CapabilityError;

/// One named category of restricted operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum Capability {
    /// Runtime-internal operations. Never user-negotiable.
    SystemInternal,
    /// Application management (install, remove, launch other suites).
    SystemAms,
    /// Outbound HTTP connections.
    NetHttp,
    /// Outbound HTTPS connections.
    NetHttps,
    /// Datagram client sockets.
    NetDatagram,
    /// Datagram server sockets.
    NetDatagramServer,
    /// Raw stream socket clients.
    NetSocket,
    /// Listening stream sockets.
    NetServerSocket,
    /// TLS socket connections.
    NetSsl,
    /// Serial and local port access.
    Comm,
    /// Registering for launch by inbound connections (auto-invocation).
    PushRegistry,
    /// Letting inbound data interrupt this suite to launch another one.
    PushInterrupt,
    /// Letting an alarm interrupt this suite to launch another one.
    AlarmInterrupt,
    /// Sending messages that may cost the user money.
    MessageSend,
    /// Receiving messages.
    MessageReceive,
    /// Reading user files.
    FileRead,
    /// Writing user files.
    FileWrite,
    /// Recording audio or video.
    MediaRecord,
}

/// Coarse grouping used for the mutually exclusive combination rule and for
/// presenting permissions in settings screens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapabilityGroup {
    /// Runtime administration.
    Administrative,
    /// Network access that may cost the user money.
    Network,
    /// Local connectivity.
    LocalConnectivity,
    /// Launching without the user starting the application.
    AutoInvocation,
    /// Interrupting whatever the user is doing.
    Interruption,
    /// Messaging.
    Messaging,
    /// Access to the user's data.
    UserData,
    /// Cameras and microphones.
    Multimedia,
}

impl Capability {
    /// Number of capabilities; the length of every permission array.
    pub const COUNT: usize = 18;

    /// Every capability, in index order.
    pub const ALL: [Capability; Self::COUNT] = [
        Self::SystemInternal,
        Self::SystemAms,
        Self::NetHttp,
        Self::NetHttps,
        Self::NetDatagram,
        Self::NetDatagramServer,
        Self::NetSocket,
        Self::NetServerSocket,
        Self::NetSsl,
        Self::Comm,
        Self::PushRegistry,
        Self::PushInterrupt,
        Self::AlarmInterrupt,
        Self::MessageSend,
        Self::MessageReceive,
        Self::FileRead,
        Self::FileWrite,
        Self::MediaRecord,
    ];

    /// Stable array index of this capability.
    #[must_use]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Capability at `index`, if any.
    #[must_use]
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// Stable dotted name used in policy files and on the command line.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::SystemInternal => "system.internal",
            Self::SystemAms => "system.ams",
            Self::NetHttp => "net.http",
            Self::NetHttps => "net.https",
            Self::NetDatagram => "net.datagram",
            Self::NetDatagramServer => "net.datagram-server",
            Self::NetSocket => "net.socket",
            Self::NetServerSocket => "net.server-socket",
            Self::NetSsl => "net.ssl",
            Self::Comm => "comm",
            Self::PushRegistry => "push.register",
            Self::PushInterrupt => "push.interrupt",
            Self::AlarmInterrupt => "alarm.interrupt",
            Self::MessageSend => "messaging.send",
            Self::MessageReceive => "messaging.receive",
            Self::FileRead => "file.read",
            Self::FileWrite => "file.write",
            Self::MediaRecord => "media.record",
        }
    }

    /// The group this capability belongs to.
    #[must_use]
    pub fn group(self) -> CapabilityGroup {
        match self {
            Self::SystemInternal | Self::SystemAms => CapabilityGroup::Administrative,
            Self::NetHttp
            | Self::NetHttps
            | Self::NetDatagram
            | Self::NetDatagramServer
            | Self::NetSocket
            | Self::NetServerSocket
            | Self::NetSsl => CapabilityGroup::Network,
            Self::Comm => CapabilityGroup::LocalConnectivity,
            Self::PushRegistry => CapabilityGroup::AutoInvocation,
            Self::PushInterrupt | Self::AlarmInterrupt => CapabilityGroup::Interruption,
            Self::MessageSend | Self::MessageReceive => CapabilityGroup::Messaging,
            Self::FileRead | Self::FileWrite => CapabilityGroup::UserData,
            Self::MediaRecord => CapabilityGroup::Multimedia,
        }
    }

    /// Administrative capabilities are only ever `Allow` or `Never` and are
    /// checked with `check_if_allowed`, never with a prompt.
    #[must_use]
    pub fn is_administrative(self) -> bool {
        self.group() == CapabilityGroup::Administrative
    }

    /// Whether a standing grant of this capability can cost the user money
    /// without them noticing. Such capabilities may not be blanket-granted
    /// together with auto-invocation.
    #[must_use]
    pub fn is_chargeable(self) -> bool {
        matches!(self.group(), CapabilityGroup::Network) || self == Self::MessageSend
    }

    /// Sentence used in the body of a permission question.
    #[must_use]
    pub fn description(self) -> &'static str {
        match self {
            Self::SystemInternal => "perform runtime-internal operations",
            Self::SystemAms => "manage other applications",
            Self::NetHttp | Self::NetHttps => "send and receive data over the web",
            Self::NetDatagram
            | Self::NetDatagramServer
            | Self::NetSocket
            | Self::NetServerSocket
            | Self::NetSsl => "send and receive data over the network",
            Self::Comm => "use a local connection port",
            Self::PushRegistry => "start automatically when data arrives",
            Self::PushInterrupt => "be interrupted by another application receiving data",
            Self::AlarmInterrupt => "be interrupted by another application's alarm",
            Self::MessageSend => "send messages, which may cost you money",
            Self::MessageReceive => "read incoming messages",
            Self::FileRead => "read your files",
            Self::FileWrite => "modify your files",
            Self::MediaRecord => "record audio or video",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Capability {
    type Err = CapabilityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|cap| cap.name() == s)
            .ok_or_else(|| CapabilityError::UnknownCapability(s.to_string()))
    }
}

impl From<Capability> for String {
    fn from(cap: Capability) -> Self {
        cap.name().to_string()
    }
}

impl TryFrom<String> for Capability {
    type Error = CapabilityError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_indices_match_table_order() {
        for (i, cap) in Capability::ALL.iter().enumerate() {
            assert_eq!(cap.index(), i);
            assert_eq!(Capability::from_index(i), Some(*cap));
        }
        assert_eq!(Capability::from_index(Capability::COUNT), None);
    }

    #[test]
    fn test_name_round_trip() {
        for cap in Capability::ALL {
            assert_eq!(cap.name().parse::<Capability>().unwrap(), cap);
        }
    }

    #[test]
    fn test_unknown_name() {
        assert!(matches!(
            "net.gopher".parse::<Capability>(),
            Err(CapabilityError::UnknownCapability(name)) if name == "net.gopher"
        ));
    }

    #[test]
    fn test_groups() {
        assert!(Capability::SystemAms.is_administrative());
        assert!(!Capability::NetHttp.is_administrative());
        assert!(Capability::NetSsl.is_chargeable());
        assert!(Capability::MessageSend.is_chargeable());
        assert!(!Capability::MessageReceive.is_chargeable());
        assert_eq!(
            Capability::PushRegistry.group(),
            CapabilityGroup::AutoInvocation
        );
    }

    #[test]
    fn test_serde_uses_names() {
        let json = serde_json::to_string(&Capability::NetServerSocket).unwrap();
        assert_eq!(json, "\"net.server-socket\"");
        let parsed: Capability = serde_json::from_str("\"file.read\"").unwrap();
        assert_eq!(parsed, Capability::FileRead);
        assert!(serde_json::from_str::<Capability>("\"nope\"").is_err());
    }
}
