//! Allow-list matching of discovered Bluetooth addresses.
//!
//! Each [`ScanKind`] has its own ordered allow-list. Lookups are exact
//! string matches after the discovered address has been validated and
//! lowercased; anything that does not look like a hardware address fails
//! closed.

use serde::{Deserialize, Serialize};

use crate::types::{is_valid_mac_address, ScanKind};

/// The BLE and Classic allow-lists.
///
/// Entries are expected in lowercase `xx:xx:xx:xx:xx:xx` form; configuration
/// validation guarantees this before the lists reach the matcher.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllowLists {
    /// Addresses authorized when seen by BLE scanning.
    #[serde(default)]
    pub ble: Vec<String>,

    /// Addresses authorized when seen by Classic inquiry.
    #[serde(default)]
    pub classic: Vec<String>,
}

impl AllowLists {
    /// Build allow-lists from the two address sequences.
    #[must_use]
    pub const fn new(ble: Vec<String>, classic: Vec<String>) -> Self {
        Self { ble, classic }
    }

    /// The list consulted for `kind`.
    #[must_use]
    pub fn list(&self, kind: ScanKind) -> &[String] {
        match kind {
            ScanKind::Ble => &self.ble,
            ScanKind::Classic => &self.classic,
        }
    }

    /// Total number of authorized entries across both kinds.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ble.len() + self.classic.len()
    }

    /// Returns `true` if neither kind has any entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ble.is_empty() && self.classic.is_empty()
    }
}

/// Normalize an address reported by the radio stack.
///
/// Returns `None` for anything that is not exactly a 6-octet colon-separated
/// address; surrounding whitespace is not stripped.
#[must_use]
pub fn normalize_address(raw: &str) -> Option<String> {
    is_valid_mac_address(raw).then(|| raw.to_ascii_lowercase())
}

/// Decides whether a discovered device is authorized.
#[derive(Debug, Clone)]
pub struct DeviceMatcher {
    allow_lists: AllowLists,
}

impl DeviceMatcher {
    /// Create a matcher over the given allow-lists.
    #[must_use]
    pub const fn new(allow_lists: AllowLists) -> Self {
        Self { allow_lists }
    }

    /// The allow-lists this matcher consults.
    #[must_use]
    pub const fn allow_lists(&self) -> &AllowLists {
        &self.allow_lists
    }

    /// Returns `true` iff `address`, lowercased, is on the `kind` allow-list.
    #[must_use]
    pub fn is_authorized(&self, address: &str, kind: ScanKind) -> bool {
        let Some(normalized) = normalize_address(address) else {
            return false;
        };
        self.allow_lists
            .list(kind)
            .iter()
            .any(|entry| *entry == normalized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matcher() -> DeviceMatcher {
        DeviceMatcher::new(AllowLists::new(
            vec!["aa:bb:cc:dd:ee:ff".into(), "11:22:33:44:55:66".into()],
            vec!["01:02:03:04:05:06".into()],
        ))
    }

    #[test]
    fn test_matches_mixed_case_discovery() {
        let m = matcher();
        assert!(m.is_authorized("AA:BB:CC:DD:EE:FF", ScanKind::Ble));
        assert!(m.is_authorized("aa:Bb:cC:dd:EE:ff", ScanKind::Ble));
        assert!(m.is_authorized("11:22:33:44:55:66", ScanKind::Ble));
    }

    #[test]
    fn test_lists_are_independent_per_kind() {
        let m = matcher();
        assert!(!m.is_authorized("aa:bb:cc:dd:ee:ff", ScanKind::Classic));
        assert!(!m.is_authorized("01:02:03:04:05:06", ScanKind::Ble));
        assert!(m.is_authorized("01:02:03:04:05:06", ScanKind::Classic));
    }

    #[test]
    fn test_no_partial_or_prefix_match() {
        let m = matcher();
        assert!(!m.is_authorized("aa:bb:cc:dd:ee", ScanKind::Ble));
        assert!(!m.is_authorized("aa:bb:cc:dd:ee:f0", ScanKind::Ble));
        assert!(!m.is_authorized("aa:bb:cc:dd:ee:ff:00", ScanKind::Ble));
    }

    #[test]
    fn test_malformed_addresses_fail_closed() {
        let m = matcher();
        assert!(!m.is_authorized("", ScanKind::Ble));
        assert!(!m.is_authorized("   ", ScanKind::Classic));
        assert!(!m.is_authorized("not an address", ScanKind::Ble));
        assert!(!m.is_authorized("aa-bb-cc-dd-ee-ff", ScanKind::Ble));
    }

    #[test]
    fn test_surrounding_whitespace_does_not_match() {
        let m = matcher();
        assert!(!m.is_authorized(" AA:BB:CC:DD:EE:FF\n", ScanKind::Ble));
        assert!(!m.is_authorized("aa:bb:cc:dd:ee:ff ", ScanKind::Ble));
        assert_eq!(normalize_address("\taa:bb:cc:dd:ee:ff"), None);
    }

    #[test]
    fn test_empty_list_never_matches() {
        let m = DeviceMatcher::new(AllowLists::new(vec!["aa:bb:cc:dd:ee:ff".into()], Vec::new()));
        assert!(!m.is_authorized("aa:bb:cc:dd:ee:ff", ScanKind::Classic));
        assert!(AllowLists::default().is_empty());
        assert_eq!(m.allow_lists().len(), 1);
    }

    #[test]
    fn test_matches_iff_lowercase_is_listed() {
        let m = matcher();
        let candidates = [
            "AA:BB:CC:DD:EE:FF",
            "aa:bb:cc:dd:ee:ff",
            "11:22:33:44:55:66",
            "01:02:03:04:05:06",
            "ff:ff:ff:ff:ff:ff",
            " AA:BB:CC:DD:EE:FF\n",
            "aa:bb:cc:dd:ee:ff ",
            "",
            "garbage",
        ];
        for kind in [ScanKind::Ble, ScanKind::Classic] {
            for address in candidates {
                let expected = m
                    .allow_lists()
                    .list(kind)
                    .contains(&address.to_lowercase());
                assert_eq!(m.is_authorized(address, kind), expected, "{address} / {kind}");
            }
        }
    }

    #[test]
    fn test_normalize_address() {
        assert_eq!(
            normalize_address("AA:BB:CC:DD:EE:FF").as_deref(),
            Some("aa:bb:cc:dd:ee:ff")
        );
        assert_eq!(normalize_address(""), None);
    }
}
