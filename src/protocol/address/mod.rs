//! 16-bit node addresses: `(module_type << 8) | unique_id`, plus the reserved
//! master, broadcast-to-all and per-type group broadcast forms.
use crate::protocol::messages::ModuleType;

/// Low byte marking a group broadcast ("every node of this type").
pub const BROADCAST_MASK: u16 = 0x00FF;

//==================================================================================NODE_ADDRESS
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
/// Address of one endpoint on the bus.
pub struct NodeAddress(pub u16);

impl NodeAddress {
    /// The timer node that runs the game.
    pub const MASTER: NodeAddress = NodeAddress(0x0000);
    /// Every node on the bus.
    pub const BROADCAST_ALL: NodeAddress = NodeAddress(0xFFFF);

    /// Compose an address from its module type and unique id.
    pub const fn new(module_type: ModuleType, unique_id: u8) -> Self {
        NodeAddress(((module_type.code() as u16) << 8) | unique_id as u16)
    }

    /// Group broadcast to all nodes of `module_type`.
    pub const fn group(module_type: ModuleType) -> Self {
        NodeAddress(((module_type.code() as u16) << 8) | BROADCAST_MASK)
    }

    /// Build the address from the node's configuration blob.
    ///
    /// The first byte is the unique id assigned at manufacture; an empty blob
    /// falls back to id `0x00`.
    pub fn from_config(module_type: ModuleType, config: &[u8]) -> Self {
        Self::new(module_type, config.first().copied().unwrap_or(0x00))
    }

    /// High byte.
    pub fn module_type(&self) -> ModuleType {
        ModuleType::from((self.0 >> 8) as u8)
    }

    /// Low byte.
    pub const fn unique_id(&self) -> u8 {
        (self.0 & 0xFF) as u8
    }

    /// Low byte is the broadcast mask. Covers [`Self::BROADCAST_ALL`] too.
    /// Frames sent here never get an individual ACK.
    pub const fn is_broadcast(&self) -> bool {
        self.0 & BROADCAST_MASK == BROADCAST_MASK
    }

    /// Broadcast to this node's own type.
    pub const fn own_group(&self) -> NodeAddress {
        NodeAddress(self.0 | BROADCAST_MASK)
    }

    /// Whether a frame sent to `dest` is meant for this node.
    pub const fn accepts(&self, dest: NodeAddress) -> bool {
        dest.0 == self.0 || dest.0 == Self::BROADCAST_ALL.0 || dest.0 == self.own_group().0
    }

    pub const fn to_le_bytes(self) -> [u8; 2] {
        self.0.to_le_bytes()
    }

    pub const fn from_le_bytes(bytes: [u8; 2]) -> Self {
        NodeAddress(u16::from_le_bytes(bytes))
    }
}

impl From<u16> for NodeAddress {
    fn from(raw: u16) -> Self {
        NodeAddress(raw)
    }
}

impl From<NodeAddress> for u16 {
    fn from(address: NodeAddress) -> Self {
        address.0
    }
}

impl core::fmt::Display for NodeAddress {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "0x{:04x}", self.0)
    }
}
