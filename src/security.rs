//! Security classification for scanned and saved networks.
//!
//! Scan capability strings can carry several security tokens at once, so
//! classification is an ordered rule table: more specific tokens are tested
//! before the generic ones they contain (`"PSK+SAE"` before `"SAE"` before
//! `"PSK"`). The table order is load-bearing; changing it changes how
//! transition-mode networks classify.

use crate::control::{KeyMgmt, SavedConfig};

/// Security classification of a network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Security {
    None,
    Wep,
    /// WPA/WPA2-Personal.
    Psk,
    /// WPA/WPA2/WPA3-Enterprise.
    Eap,
    /// Enhanced open.
    Owe,
    /// WPA3-Personal.
    Sae,
    /// WPA3-Enterprise 192-bit.
    EapSuiteB,
    /// WPA2/WPA3-Personal transition mode.
    PskSaeTransition,
    /// Open / enhanced-open transition mode.
    OweTransition,
}

/// PSK flavor carried in the capability string, used for display only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PskType {
    #[default]
    Unknown,
    Wpa,
    Wpa2,
    WpaWpa2,
    Sae,
}

/// EAP flavor carried in the capability string, used for display only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EapType {
    #[default]
    Unknown,
    /// WPA-Enterprise, advertised as WPA-EAP-TKIP.
    Wpa,
    /// WPA2/WPA3-Enterprise (non 192-bit), advertised as RSN-EAP-CCMP.
    Wpa2Wpa3,
}

/// Capability token rules, tested in order; first match wins.
const CAPABILITY_RULES: &[(&str, Security)] = &[
    ("WEP", Security::Wep),
    ("PSK+SAE", Security::PskSaeTransition),
    ("SAE", Security::Sae),
    ("PSK", Security::Psk),
    ("EAP_SUITE_B_192", Security::EapSuiteB),
    ("EAP", Security::Eap),
    ("OWE_TRANSITION", Security::OweTransition),
    ("OWE", Security::Owe),
];

impl Security {
    /// Classify a scan result's capability string.
    pub fn from_capabilities(capabilities: &str) -> Self {
        CAPABILITY_RULES
            .iter()
            .find(|(token, _)| capabilities.contains(token))
            .map(|&(_, security)| security)
            .unwrap_or(Security::None)
    }

    /// Classify a saved profile by its allowed key management set.
    ///
    /// Extended schemes (OWE, SAE, Suite-B) are checked before the standard
    /// PSK/EAP bits, then WEP key presence decides between WEP and open.
    pub fn from_config(config: &SavedConfig) -> Self {
        if config.allows(KeyMgmt::Owe) {
            return Security::Owe;
        }
        if config.allows(KeyMgmt::Sae) {
            return Security::Sae;
        }
        if config.allows(KeyMgmt::SuiteB192) {
            return Security::EapSuiteB;
        }
        if config.allows(KeyMgmt::WpaPsk) {
            return Security::Psk;
        }
        if config.allows(KeyMgmt::WpaEap) || config.allows(KeyMgmt::Ieee8021x) {
            return Security::Eap;
        }

        if config.has_wep_key {
            Security::Wep
        } else {
            Security::None
        }
    }

    /// Short stable tag used in AccessPoint identity keys.
    pub fn tag(&self) -> &'static str {
        match self {
            Security::None => "none",
            Security::Wep => "wep",
            Security::Psk => "psk",
            Security::Eap => "eap",
            Security::Owe => "owe",
            Security::Sae => "sae",
            Security::EapSuiteB => "eap-suite-b",
            Security::PskSaeTransition => "psk+sae",
            Security::OweTransition => "owe-transition",
        }
    }

    /// Whether the network can be joined without credentials.
    pub fn is_open(&self) -> bool {
        matches!(
            self,
            Security::None | Security::Owe | Security::OweTransition
        )
    }

    /// Whether the network requires an enterprise (EAP) exchange.
    pub fn is_enterprise(&self) -> bool {
        matches!(self, Security::Eap | Security::EapSuiteB)
    }
}

impl PskType {
    pub fn from_capabilities(capabilities: &str) -> Self {
        let wpa = capabilities.contains("WPA-PSK");
        let wpa2 = capabilities.contains("RSN-PSK");
        let transition = capabilities.contains("PSK+SAE");

        if transition {
            PskType::Sae
        } else if wpa && wpa2 {
            PskType::WpaWpa2
        } else if wpa2 {
            PskType::Wpa2
        } else if wpa {
            PskType::Wpa
        } else {
            PskType::Unknown
        }
    }
}

impl EapType {
    pub fn from_capabilities(capabilities: &str) -> Self {
        if capabilities.contains("RSN-EAP") {
            EapType::Wpa2Wpa3
        } else if capabilities.contains("WPA-EAP") {
            EapType::Wpa
        } else {
            EapType::Unknown
        }
    }
}

/// Human-readable security label.
///
/// `concise` picks the short form ("WPA2") over the descriptive one
/// ("WPA2-Personal"). Open and transition-without-profile networks label
/// as empty/"None" respectively.
pub fn security_label(
    security: Security,
    psk_type: PskType,
    eap_type: EapType,
    concise: bool,
) -> &'static str {
    match security {
        Security::Wep => "WEP",

        Security::Psk => match psk_type {
            PskType::Wpa => {
                if concise {
                    "WPA"
                } else {
                    "WPA-Personal"
                }
            }
            PskType::Wpa2 => {
                if concise {
                    "WPA2"
                } else {
                    "WPA2-Personal"
                }
            }
            _ => {
                if concise {
                    "WPA/WPA2"
                } else {
                    "WPA/WPA2-Personal"
                }
            }
        },

        Security::Eap => match eap_type {
            EapType::Wpa => {
                if concise {
                    "WPA-EAP"
                } else {
                    "WPA-Enterprise"
                }
            }
            EapType::Wpa2Wpa3 => {
                if concise {
                    "RSN-EAP"
                } else {
                    "WPA2/WPA3-Enterprise"
                }
            }
            EapType::Unknown => {
                if concise {
                    "802.1x"
                } else {
                    "WPA/WPA2/WPA3-Enterprise"
                }
            }
        },

        Security::Owe => {
            if concise {
                "OWE"
            } else {
                "Enhanced Open"
            }
        }

        Security::Sae | Security::PskSaeTransition => {
            if psk_type == PskType::Sae {
                if concise {
                    "WPA2/WPA3"
                } else {
                    "WPA2/WPA3-Personal"
                }
            } else if concise {
                "WPA3"
            } else {
                "WPA3-Personal"
            }
        }

        Security::EapSuiteB => {
            if concise {
                "Suite-B-192"
            } else {
                "WPA3-Enterprise 192-bit"
            }
        }

        Security::OweTransition | Security::None => {
            if concise {
                ""
            } else {
                "None"
            }
        }
    }
}
