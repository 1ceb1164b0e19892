use crate::mmu::{MemoryMap, REG_JOYP};

const SELECT_DIRECTIONS: u8 = 0x10;
const SELECT_ACTIONS: u8 = 0x20;

/// Decoded joypad keys. Raw key mapping belongs to the frontend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Right,
    Left,
    Up,
    Down,
    A,
    B,
    Select,
    Start,
}

impl Key {
    /// (direction group, active-low bit) for this key.
    fn encoding(self) -> (bool, u8) {
        match self {
            Key::Right => (true, 0x01),
            Key::Left => (true, 0x02),
            Key::Up => (true, 0x04),
            Key::Down => (true, 0x08),
            Key::A => (false, 0x01),
            Key::B => (false, 0x02),
            Key::Select => (false, 0x04),
            Key::Start => (false, 0x08),
        }
    }
}

/// Joypad state. The 0xFF00 register's low nibble is recomputed on every
/// access through the signaler so read-triggered polling always observes
/// fresh state.
pub struct Input {
    /// Active-low direction nibble (right, left, up, down).
    directions: u8,
    /// Active-low action nibble (a, b, select, start).
    actions: u8,
    interrupt_flag: u8,
}

impl Input {
    pub fn new(interrupt_flag: u8) -> Self {
        Self {
            directions: 0x0F,
            actions: 0x0F,
            interrupt_flag,
        }
    }

    /// Record a key press or release. A press whose group is currently
    /// selected requests the joypad interrupt (high-to-low transition on a
    /// selected line).
    pub fn key_event(&mut self, key: Key, pressed: bool, map: &mut MemoryMap) {
        let (direction, bit) = key.encoding();
        let nibble = if direction {
            &mut self.directions
        } else {
            &mut self.actions
        };
        if pressed {
            *nibble &= !bit;
        } else {
            *nibble |= bit;
        }

        let joyp = map.byte(REG_JOYP);
        let selected = (direction && joyp & SELECT_DIRECTIONS == 0)
            || (!direction && joyp & SELECT_ACTIONS == 0);
        if pressed && selected {
            map.request_interrupt(self.interrupt_flag);
        }
        self.refresh_register(map);
    }

    /// Signaler hook for 0xFF00: rebuild the low nibble from the select bits.
    /// Both groups selected reads as the AND of the two nibbles.
    pub fn refresh_register(&mut self, map: &mut MemoryMap) {
        let joyp = map.byte(REG_JOYP);
        let mut low = 0x0F;
        if joyp & SELECT_DIRECTIONS == 0 {
            low &= self.directions;
        }
        if joyp & SELECT_ACTIONS == 0 {
            low &= self.actions;
        }
        map.set_byte(REG_JOYP, (joyp & 0x30) | low | 0xC0);
    }
}
