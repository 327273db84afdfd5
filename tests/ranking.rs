//! Ranking comparator laws.
//!
//! The list order must be a strict total order or sorting is unstable
//! across refreshes: transitivity, antisymmetry, and self-equality are
//! checked over generated AccessPoints covering every ranking dimension
//! (connected, reachable, saved, signal bucket, title casing).

use proptest::prelude::*;
use std::cmp::Ordering;

use wifi_tracker::{AccessPoint, SavedConfig, ScanResult, UNREACHABLE_RSSI};

#[derive(Debug, Clone)]
struct ApSeed {
    ssid: String,
    bssid_octet: u8,
    capabilities: &'static str,
    rssi: i32,
    reachable: bool,
    saved: bool,
    connected: bool,
}

fn arb_seed() -> impl Strategy<Value = ApSeed> {
    (
        // Small alphabet with both cases so titles collide and the
        // case-sensitive tie-break gets exercised.
        proptest::string::string_regex("[aAbB]{1,4}").unwrap(),
        any::<u8>(),
        prop::sample::select(vec![
            "[ESS]",
            "[RSN-PSK-CCMP][ESS]",
            "[RSN-SAE-CCMP][ESS]",
            "[RSN-EAP-CCMP][ESS]",
            "[WEP][ESS]",
        ]),
        -100i32..=-40,
        any::<bool>(),
        any::<bool>(),
        any::<bool>(),
    )
        .prop_map(
            |(ssid, bssid_octet, capabilities, rssi, reachable, saved, connected)| ApSeed {
                ssid,
                bssid_octet,
                capabilities,
                rssi,
                reachable,
                saved,
                connected,
            },
        )
}

fn build(seed: &ApSeed) -> AccessPoint {
    let level = if seed.reachable {
        seed.rssi
    } else {
        UNREACHABLE_RSSI
    };
    let bssid = format!("00:11:22:33:44:{:02X}", seed.bssid_octet);
    let mut ap = AccessPoint::from_scan_results(vec![ScanResult::new(
        &seed.ssid,
        &bssid,
        seed.capabilities,
        level,
        2412,
    )]);
    if seed.saved {
        ap.update_config(Some(SavedConfig::new(&seed.ssid)));
    }
    ap.is_connected = seed.connected;
    ap
}

proptest! {
    #[test]
    fn comparison_is_reflexively_equal(seed in arb_seed()) {
        let ap = build(&seed);
        prop_assert_eq!(ap.cmp(&ap), Ordering::Equal);
    }

    #[test]
    fn comparison_is_antisymmetric(a in arb_seed(), b in arb_seed()) {
        let a = build(&a);
        let b = build(&b);
        prop_assert_eq!(a.cmp(&b), b.cmp(&a).reverse());
    }

    #[test]
    fn strict_order_is_transitive(a in arb_seed(), b in arb_seed(), c in arb_seed()) {
        let a = build(&a);
        let b = build(&b);
        let c = build(&c);
        if a.cmp(&b) == Ordering::Less && b.cmp(&c) == Ordering::Less {
            prop_assert_eq!(a.cmp(&c), Ordering::Less);
        }
    }

    #[test]
    fn non_strict_order_is_transitive(a in arb_seed(), b in arb_seed(), c in arb_seed()) {
        let a = build(&a);
        let b = build(&b);
        let c = build(&c);
        if a.cmp(&b) != Ordering::Greater && b.cmp(&c) != Ordering::Greater {
            prop_assert_ne!(a.cmp(&c), Ordering::Greater);
        }
    }

    #[test]
    fn sorting_is_deterministic_under_shuffle(seeds in proptest::collection::vec(arb_seed(), 2..8)) {
        let mut forward: Vec<AccessPoint> = seeds.iter().map(build).collect();
        let mut backward: Vec<AccessPoint> = seeds.iter().rev().map(build).collect();
        forward.sort();
        backward.sort();

        let forward_keys: Vec<&str> = forward.iter().map(|ap| ap.ssid.as_str()).collect();
        let backward_keys: Vec<&str> = backward.iter().map(|ap| ap.ssid.as_str()).collect();
        prop_assert_eq!(forward_keys, backward_keys);
    }
}

#[test]
fn ranking_dimensions_apply_in_order() {
    let connected = {
        let mut ap = build(&seed("zz", -95, true, false));
        ap.is_connected = true;
        ap
    };
    let saved_weak = build(&seed("yy", -80, true, true));
    let unsaved_strong = build(&seed("aa", -50, true, false));
    let unreachable_saved = build(&seed("bb", -50, false, true));

    let mut list = vec![
        unreachable_saved,
        unsaved_strong,
        saved_weak,
        connected,
    ];
    list.sort();

    assert_eq!(list[0].ssid, "zz");
    assert_eq!(list[1].ssid, "yy");
    assert_eq!(list[2].ssid, "aa");
    assert_eq!(list[3].ssid, "bb");
}

fn seed(ssid: &str, rssi: i32, reachable: bool, saved: bool) -> ApSeed {
    ApSeed {
        ssid: ssid.to_string(),
        bssid_octet: 1,
        capabilities: "[RSN-PSK-CCMP][ESS]",
        rssi,
        reachable,
        saved,
        connected: false,
    }
}
