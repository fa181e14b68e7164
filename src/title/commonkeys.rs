// title/commonkeys.rs from wadsmith (c) 2025 NinjaCheetah & Contributors
//
// Common key table used to wrap Title Keys.

const COMMON_KEY: [u8; 16] = [0xeb, 0xe4, 0x2a, 0x22, 0x5e, 0x85, 0x93, 0xe4, 0x48, 0xd9, 0xc5, 0x45, 0x73, 0x81, 0xaa, 0xf7];
const KOREAN_KEY: [u8; 16] = [0x63, 0xb8, 0x2b, 0xb4, 0xf4, 0x61, 0x4e, 0x2e, 0x13, 0xf2, 0xfe, 0xfb, 0xba, 0x4c, 0x9b, 0x7e];
const VWII_KEY: [u8; 16] = [0x30, 0xbf, 0xc7, 0x6e, 0x7c, 0x19, 0xaf, 0xbb, 0x23, 0x16, 0x33, 0x30, 0xce, 0xd7, 0xc2, 0x8d];
const DEV_COMMON_KEY: [u8; 16] = [0xa1, 0x60, 0x4a, 0x6a, 0x71, 0x23, 0xb5, 0x29, 0xae, 0x8b, 0xec, 0x32, 0xc8, 0x16, 0xfc, 0xaa];

/// The key slots a Ticket can reference through its common key index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommonKeySlot {
    Retail,
    Korean,
    Vwii,
    Development,
}

impl CommonKeySlot {
    /// Picks the slot for a Ticket's common key index. Index 0 resolves to the development key
    /// when the Ticket was signed for development consoles, and unknown indices fall back to the
    /// retail key like the console does.
    pub fn from_index(index: u8, is_dev: bool) -> Self {
        match index {
            1 => CommonKeySlot::Korean,
            2 => CommonKeySlot::Vwii,
            _ if is_dev => CommonKeySlot::Development,
            _ => CommonKeySlot::Retail,
        }
    }

    /// Gets the index that should be stored in a Ticket using this slot.
    pub fn index(&self) -> u8 {
        match self {
            CommonKeySlot::Retail | CommonKeySlot::Development => 0,
            CommonKeySlot::Korean => 1,
            CommonKeySlot::Vwii => 2,
        }
    }

    pub fn key(&self) -> [u8; 16] {
        match self {
            CommonKeySlot::Retail => COMMON_KEY,
            CommonKeySlot::Korean => KOREAN_KEY,
            CommonKeySlot::Vwii => VWII_KEY,
            CommonKeySlot::Development => DEV_COMMON_KEY,
        }
    }
}

/// Returns the common key for the specified index.
pub fn get_common_key(index: u8, is_dev: bool) -> [u8; 16] {
    CommonKeySlot::from_index(index, is_dev).key()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_common_key() {
        assert_eq!(get_common_key(0, false), [0xeb, 0xe4, 0x2a, 0x22, 0x5e, 0x85, 0x93, 0xe4, 0x48, 0xd9, 0xc5, 0x45, 0x73, 0x81, 0xaa, 0xf7]);
    }
    #[test]
    fn test_get_invalid_index() {
        assert_eq!(get_common_key(57, false), get_common_key(0, false));
    }
    #[test]
    fn test_get_korean_key() {
        assert_eq!(get_common_key(1, false), [0x63, 0xb8, 0x2b, 0xb4, 0xf4, 0x61, 0x4e, 0x2e, 0x13, 0xf2, 0xfe, 0xfb, 0xba, 0x4c, 0x9b, 0x7e]);
    }
    #[test]
    fn test_get_dev_key() {
        assert_eq!(get_common_key(0, true), [0xa1, 0x60, 0x4a, 0x6a, 0x71, 0x23, 0xb5, 0x29, 0xae, 0x8b, 0xec, 0x32, 0xc8, 0x16, 0xfc, 0xaa]);
    }
    #[test]
    fn test_dev_flag_ignored_for_vwii() {
        assert_eq!(CommonKeySlot::from_index(2, true), CommonKeySlot::Vwii);
        assert_eq!(CommonKeySlot::Development.index(), 0);
    }
}
