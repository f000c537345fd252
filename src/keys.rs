//! Logical key identifiers and key sets
//!
//! Analog keys are identified by their USB HID keyboard usage code, which is
//! what both the vendor analog report and the boot keyboard report carry.
//! The code space is a single byte, so per-key state lives in fixed 256-slot
//! tables instead of maps.

/// Identifier of a physical analog key (HID keyboard usage code)
pub type LogicalKey = u8;

/// Number of distinct logical keys
pub const KEY_SPACE: usize = 256;

/// Fixed-size set of logical keys (256-bit bitset)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KeySet {
    words: [u64; 4],
}

impl KeySet {
    pub const fn new() -> Self {
        Self { words: [0; 4] }
    }

    #[inline]
    fn slot(key: LogicalKey) -> (usize, u64) {
        ((key >> 6) as usize, 1u64 << (key & 63))
    }

    /// Insert a key, returning true if it was not already present
    pub fn insert(&mut self, key: LogicalKey) -> bool {
        let (word, bit) = Self::slot(key);
        let was_present = self.words[word] & bit != 0;
        self.words[word] |= bit;
        !was_present
    }

    /// Remove a key, returning true if it was present
    pub fn remove(&mut self, key: LogicalKey) -> bool {
        let (word, bit) = Self::slot(key);
        let was_present = self.words[word] & bit != 0;
        self.words[word] &= !bit;
        was_present
    }

    #[inline]
    pub fn contains(&self, key: LogicalKey) -> bool {
        let (word, bit) = Self::slot(key);
        self.words[word] & bit != 0
    }

    pub fn len(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|&w| w == 0)
    }

    pub fn clear(&mut self) {
        self.words = [0; 4];
    }

    /// Keys in `self` that are not in `other`
    pub fn difference(&self, other: &KeySet) -> KeySet {
        let mut out = KeySet::new();
        for (i, word) in out.words.iter_mut().enumerate() {
            *word = self.words[i] & !other.words[i];
        }
        out
    }

    /// Iterate over keys in ascending order
    pub fn iter(&self) -> impl Iterator<Item = LogicalKey> + '_ {
        self.words.iter().enumerate().flat_map(|(i, &word)| {
            let mut bits = word;
            std::iter::from_fn(move || {
                if bits == 0 {
                    return None;
                }
                let tz = bits.trailing_zeros();
                bits &= bits - 1;
                Some((i as u32 * 64 + tz) as LogicalKey)
            })
        })
    }
}

impl FromIterator<LogicalKey> for KeySet {
    fn from_iter<I: IntoIterator<Item = LogicalKey>>(iter: I) -> Self {
        let mut set = KeySet::new();
        for key in iter {
            set.insert(key);
        }
        set
    }
}

/// HID keyboard usage names (USB HID Usage Tables, Section 10)
#[rustfmt::skip]
const KEY_NAMES: &[(LogicalKey, &str)] = &[
    (0x04, "A"), (0x05, "B"), (0x06, "C"), (0x07, "D"),
    (0x08, "E"), (0x09, "F"), (0x0A, "G"), (0x0B, "H"),
    (0x0C, "I"), (0x0D, "J"), (0x0E, "K"), (0x0F, "L"),
    (0x10, "M"), (0x11, "N"), (0x12, "O"), (0x13, "P"),
    (0x14, "Q"), (0x15, "R"), (0x16, "S"), (0x17, "T"),
    (0x18, "U"), (0x19, "V"), (0x1A, "W"), (0x1B, "X"),
    (0x1C, "Y"), (0x1D, "Z"),
    (0x1E, "1"), (0x1F, "2"), (0x20, "3"), (0x21, "4"),
    (0x22, "5"), (0x23, "6"), (0x24, "7"), (0x25, "8"),
    (0x26, "9"), (0x27, "0"),
    (0x28, "Enter"), (0x29, "Esc"), (0x2A, "Backspace"),
    (0x2B, "Tab"), (0x2C, "Space"), (0x2D, "-"), (0x2E, "="),
    (0x2F, "["), (0x30, "]"), (0x31, "\\"),
    (0x33, ";"), (0x34, "'"), (0x35, "`"), (0x36, ","),
    (0x37, "."), (0x38, "/"), (0x39, "CapsLock"),
    (0x3A, "F1"), (0x3B, "F2"), (0x3C, "F3"), (0x3D, "F4"),
    (0x3E, "F5"), (0x3F, "F6"), (0x40, "F7"), (0x41, "F8"),
    (0x42, "F9"), (0x43, "F10"), (0x44, "F11"), (0x45, "F12"),
    (0x46, "PrintScr"), (0x47, "ScrollLock"), (0x48, "Pause"),
    (0x49, "Insert"), (0x4A, "Home"), (0x4B, "PageUp"),
    (0x4C, "Delete"), (0x4D, "End"), (0x4E, "PageDown"),
    (0x4F, "Right"), (0x50, "Left"), (0x51, "Down"), (0x52, "Up"),
    (0x65, "Menu"),
    (0xE0, "LCtrl"), (0xE1, "LShift"), (0xE2, "LAlt"), (0xE3, "LGUI"),
    (0xE4, "RCtrl"), (0xE5, "RShift"), (0xE6, "RAlt"), (0xE7, "RGUI"),
];

/// Short aliases accepted when parsing key names
const KEY_ALIASES: &[(&str, LogicalKey)] = &[
    ("Escape", 0x29),
    ("Back", 0x2A),
    ("Bksp", 0x2A),
    ("Caps", 0x39),
    ("Spc", 0x2C),
    ("Ctrl", 0xE0),
    ("LShft", 0xE1),
    ("RShft", 0xE5),
    ("Alt", 0xE2),
    ("Win", 0xE3),
    ("RCtl", 0xE4),
    ("LCtl", 0xE0),
    ("Ins", 0x49),
    ("Del", 0x4C),
    ("PgUp", 0x4B),
    ("PgDn", 0x4E),
    ("App", 0x65),
];

/// Get the display name of a key code
pub fn key_name(key: LogicalKey) -> Option<&'static str> {
    KEY_NAMES
        .iter()
        .find(|(code, _)| *code == key)
        .map(|(_, name)| *name)
}

/// Resolve a key name (case-insensitive) to its code
pub fn key_code_from_name(name: &str) -> Option<LogicalKey> {
    KEY_NAMES
        .iter()
        .find(|(_, n)| n.eq_ignore_ascii_case(name))
        .map(|(code, _)| *code)
        .or_else(|| {
            KEY_ALIASES
                .iter()
                .find(|(n, _)| n.eq_ignore_ascii_case(name))
                .map(|(_, code)| *code)
        })
}

/// Parse a string-encoded key: decimal (`"26"`), hex (`"0x1A"`) or a name (`"W"`)
pub fn parse_key(s: &str) -> Option<LogicalKey> {
    let s = s.trim();
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        return u8::from_str_radix(hex, 16).ok();
    }
    // Digit strings are always codes; number-row keys need hex or "Digit1"
    if !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()) {
        return s.parse().ok();
    }
    if let Some(digit) = s.strip_prefix("Digit") {
        return key_code_from_name(digit);
    }
    key_code_from_name(s)
}

/// All named keys, in table order
pub fn named_keys() -> impl Iterator<Item = (LogicalKey, &'static str)> {
    KEY_NAMES.iter().copied()
}
