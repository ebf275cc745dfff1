use std::convert::TryFrom;

/// One of the two competitors in a game. `A` always moves first from an empty board.
#[repr(u8)]
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Side {
    A = b'1',
    B = b'2',
}

impl Side {
    pub fn other(self) -> Self {
        match self {
            Side::A => Side::B,
            Side::B => Side::A,
        }
    }

    /// The side tag byte used on the wire.
    pub fn tag(self) -> u8 {
        self as u8
    }

    /// The side to move after `ply_count` moves have been played from an empty board.
    pub fn to_move_after(ply_count: usize) -> Self {
        if ply_count % 2 == 0 {
            Side::A
        } else {
            Side::B
        }
    }
}

impl TryFrom<u8> for Side {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            b'1' => Ok(Side::A),
            b'2' => Ok(Side::B),
            _ => Err(value),
        }
    }
}
