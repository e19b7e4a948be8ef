//! Vocabulary carried on the bus: packet types, module types, capability
//! flags and the node mode that STOP and DISARMED move between.
//!
//! Payloads stay opaque to the engine; only the type byte is interpreted.

/// Top bit of the type byte: the frame answers an earlier command.
pub const RESPONSE_MASK: u8 = 0x80;

/// True when `code` carries the response bit.
#[inline]
pub const fn is_response(code: u8) -> bool {
    code & RESPONSE_MASK != 0
}

//==================================================================================PACKET_TYPE
/// Every packet type the modules exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum PacketType {
    /// Generic acknowledgement, echoes the acknowledged seq.
    Ack = 0x80,
    /// Broadcast by the master to enumerate modules.
    RequestId = 0x01,
    /// Module reply to `RequestId`; payload `[flags, 0]`.
    ResponseId = 0x81,
    /// Mode reset; cancels any queued packet.
    Stop = 0x02,
    Configure = 0x03,
    Start = 0x04,
    Strike = 0x05,
    Error = 0x06,
    Disarmed = 0x07,
    Needy = 0x08,
    ReadStatus = 0x09,
    Status = 0x89,
    Sound = 0x0A,
    SetTime = 0x0B,
    ShowTime = 0x0C,
}

impl PacketType {
    /// Number of variants, i.e. the size of a dispatch table.
    pub const COUNT: usize = 15;

    /// All variants in table order.
    pub const ALL: [PacketType; Self::COUNT] = [
        PacketType::Ack,
        PacketType::RequestId,
        PacketType::ResponseId,
        PacketType::Stop,
        PacketType::Configure,
        PacketType::Start,
        PacketType::Strike,
        PacketType::Error,
        PacketType::Disarmed,
        PacketType::Needy,
        PacketType::ReadStatus,
        PacketType::Status,
        PacketType::Sound,
        PacketType::SetTime,
        PacketType::ShowTime,
    ];

    /// Wire code.
    #[inline]
    pub const fn code(self) -> u8 {
        self as u8
    }

    /// Position in a dispatch table.
    pub const fn index(self) -> usize {
        match self {
            PacketType::Ack => 0,
            PacketType::RequestId => 1,
            PacketType::ResponseId => 2,
            PacketType::Stop => 3,
            PacketType::Configure => 4,
            PacketType::Start => 5,
            PacketType::Strike => 6,
            PacketType::Error => 7,
            PacketType::Disarmed => 8,
            PacketType::Needy => 9,
            PacketType::ReadStatus => 10,
            PacketType::Status => 11,
            PacketType::Sound => 12,
            PacketType::SetTime => 13,
            PacketType::ShowTime => 14,
        }
    }

    /// Whether this type answers an earlier command.
    #[inline]
    pub const fn is_response(self) -> bool {
        is_response(self.code())
    }
}

impl TryFrom<u8> for PacketType {
    /// The unknown wire code.
    type Error = u8;

    fn try_from(code: u8) -> Result<Self, u8> {
        PacketType::ALL
            .iter()
            .copied()
            .find(|packet_type| packet_type.code() == code)
            .ok_or(code)
    }
}

impl From<PacketType> for u8 {
    fn from(packet_type: PacketType) -> Self {
        packet_type.code()
    }
}

//==================================================================================MODULE_TYPE
/// High byte of a node address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ModuleType {
    Sound,
    Wires,
    Button,
    Keypad,
    Simon,
    Morse,
    Timer,
    /// Module types without a name yet.
    Other(u8),
}

impl ModuleType {
    pub const fn code(self) -> u8 {
        match self {
            ModuleType::Sound => 0x00,
            ModuleType::Wires => 0x01,
            ModuleType::Button => 0x02,
            ModuleType::Keypad => 0x03,
            ModuleType::Simon => 0x04,
            ModuleType::Morse => 0x07,
            ModuleType::Timer => 0x12,
            ModuleType::Other(code) => code,
        }
    }
}

impl From<u8> for ModuleType {
    fn from(code: u8) -> Self {
        match code {
            0x00 => ModuleType::Sound,
            0x01 => ModuleType::Wires,
            0x02 => ModuleType::Button,
            0x03 => ModuleType::Keypad,
            0x04 => ModuleType::Simon,
            0x07 => ModuleType::Morse,
            0x12 => ModuleType::Timer,
            other => ModuleType::Other(other),
        }
    }
}

//==================================================================================MODULE_FLAGS
/// Capability bits a module advertises in its RESPONSE_ID payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ModuleFlags(u8);

impl ModuleFlags {
    /// Module can end the game (e.g. the timer reaching zero).
    pub const TRIGGER: Self = Self(0x01);
    /// Module periodically demands attention.
    pub const NEEDY: Self = Self(0x02);
    /// At most one module of this type takes part in a game.
    pub const EXCLUSIVE: Self = Self(0x04);

    pub const fn empty() -> Self {
        Self(0)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// RESPONSE_ID payload: flags byte followed by a reserved zero.
    pub const fn id_payload(self) -> [u8; 2] {
        [self.0, 0]
    }
}

impl core::ops::BitOr for ModuleFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

//==================================================================================MODE
/// Game lifecycle of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Mode {
    /// Power-up state, and where STOP returns every node.
    #[default]
    Sleep,
    Ready,
    Armed,
    Disarmed,
    Ended,
}
