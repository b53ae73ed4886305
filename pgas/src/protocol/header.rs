use crate::protocol::message::PgasMessage;

/// Size of the wire header in bytes.
pub const HEADER_SIZE: usize = 8;

/// Traffic class of the message that follows the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Lane {
    /// Barrier arrive/go.
    Sync = 0,
    /// Collective request/down/up/response.
    Collective = 1,
    /// Group join and split coordination.
    Group = 2,
}

impl Lane {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(Lane::Sync),
            1 => Some(Lane::Collective),
            2 => Some(Lane::Group),
            _ => None,
        }
    }

    /// Whether handlers of this lane share the node's handler limit.
    /// Only collective traffic carries payloads and runs application
    /// operators; barrier and group coordination is always admitted.
    pub fn is_bounded(self) -> bool {
        matches!(self, Lane::Collective)
    }

    pub fn of(msg: &PgasMessage) -> Self {
        match msg {
            PgasMessage::BarrierArrive { .. } | PgasMessage::BarrierGo { .. } => Lane::Sync,
            PgasMessage::Request { .. }
            | PgasMessage::Down { .. }
            | PgasMessage::Up { .. }
            | PgasMessage::Response { .. } => Lane::Collective,
            PgasMessage::GroupQuery { .. }
            | PgasMessage::GroupQueryAnswer { .. }
            | PgasMessage::GroupJoinRequest { .. }
            | PgasMessage::GroupJoinInform { .. }
            | PgasMessage::GroupJoinConfirm { .. }
            | PgasMessage::GroupJoinResponse { .. }
            | PgasMessage::SplitRequest { .. }
            | PgasMessage::SplitQuery { .. }
            | PgasMessage::SplitAnswer { .. }
            | PgasMessage::SplitAssign { .. }
            | PgasMessage::SplitReady { .. }
            | PgasMessage::SplitGo { .. } => Lane::Group,
        }
    }
}

/// 8-byte wire header prepended to every framed message.
///
/// ```text
/// [0..4] payload_length: u32 LE
/// [4..6] version: u16 LE
/// [6]    lane: u8
/// [7]    reserved: u8 (must be 0)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Length of the payload following this header.
    pub payload_length: u32,
    /// Protocol version of the sender.
    pub version: u16,
    pub lane: Lane,
}

impl Header {
    /// Encode header to 8 bytes (little-endian).
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        buf[0..4].copy_from_slice(&self.payload_length.to_le_bytes());
        buf[4..6].copy_from_slice(&self.version.to_le_bytes());
        buf[6] = self.lane as u8;
        buf
    }

    /// Decode header from 8 bytes.
    ///
    /// Returns `None` if the lane byte is invalid.
    pub fn decode(buf: &[u8; HEADER_SIZE]) -> Option<Self> {
        let payload_length = u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]);
        let version = u16::from_le_bytes([buf[4], buf[5]]);
        let lane = Lane::from_u8(buf[6])?;
        Some(Header {
            payload_length,
            version,
            lane,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_roundtrip() {
        let h = Header {
            payload_length: 12345,
            version: 1,
            lane: Lane::Collective,
        };
        let decoded = Header::decode(&h.encode()).unwrap();
        assert_eq!(h, decoded);
    }

    #[test]
    fn test_header_invalid_lane() {
        let mut buf = [0u8; HEADER_SIZE];
        buf[6] = 255;
        assert!(Header::decode(&buf).is_none());
    }

    #[test]
    fn test_header_reserved_byte_zeroed() {
        let h = Header {
            payload_length: 42,
            version: 3,
            lane: Lane::Group,
        };
        assert_eq!(h.encode()[7], 0);
    }

    #[test]
    fn test_only_collective_lane_is_bounded() {
        assert!(Lane::Collective.is_bounded());
        assert!(!Lane::Sync.is_bounded());
        assert!(!Lane::Group.is_bounded());
    }

    #[test]
    fn test_lane_of_message() {
        assert_eq!(
            Lane::of(&PgasMessage::BarrierGo {
                group_id: 0,
                round: 1
            }),
            Lane::Sync
        );
        assert_eq!(
            Lane::of(&PgasMessage::SplitGo {
                group_id: 0,
                round: 1,
                failures: vec![],
            }),
            Lane::Group
        );
    }
}
