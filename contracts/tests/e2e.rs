//! End-to-end integration tests for the USDX protocol.
//!
//! These exercise the full hub/spoke lifecycle across assembled domains:
//! deposit on the hub, yield accrual, snapshot-bounded spoke mints,
//! bridged transfers in both directions, duplicate deliveries, and the
//! conservation of cross-domain supply.
//!
//! Each test builds its own hub and spoke from genesis and drives time
//! with explicit timestamps. No shared state, no sleeping, no flaky
//! failures.

use chrono::{DateTime, Duration, Utc};

use usdx_contracts::{HubDomain, SpokeDomain};
use usdx_protocol::config::RELAYER_ADDRESS;
use usdx_protocol::events::LedgerEvent;
use usdx_protocol::ids::{ChainId, MintId, TransferId};

const HUB: ChainId = ChainId(1);
const SPOKE: ChainId = ChainId(137);

// One thousand tokens at six decimals.
const ONE_THOUSAND: u64 = 1_000_000_000;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn genesis_time() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z")
        .unwrap()
        .with_timezone(&Utc)
}

fn setup() -> (HubDomain, SpokeDomain) {
    let hub = HubDomain::genesis(HUB, SPOKE, RELAYER_ADDRESS, 500, genesis_time());
    let spoke = SpokeDomain::genesis(SPOKE, HUB, RELAYER_ADDRESS);
    (hub, spoke)
}

fn initiated_id(event: &LedgerEvent) -> TransferId {
    match event {
        LedgerEvent::TransferInitiated { transfer_id, .. } => *transfer_id,
        other => panic!("expected TransferInitiated, got {other:?}"),
    }
}

/// Total USDX across both domains — the quantity bridging must conserve.
fn cross_domain_supply(hub: &HubDomain, spoke: &SpokeDomain) -> u64 {
    hub.usdx_total_supply() + spoke.usdx_total_supply()
}

// ---------------------------------------------------------------------------
// Deposit / withdraw round trip with yield
// ---------------------------------------------------------------------------

#[test]
fn deposit_yield_withdraw_lifecycle() {
    let (mut hub, _) = setup();
    let t0 = genesis_time();

    hub.fund("alice", 10 * ONE_THOUSAND).unwrap();
    hub.deposit("alice", ONE_THOUSAND, t0).unwrap();

    // Immediately after deposit: collateral and balance both 1000.
    assert_eq!(hub.user_collateral("alice"), ONE_THOUSAND);
    assert_eq!(hub.usdx_balance("alice"), ONE_THOUSAND);

    // 30 days later the position is worth strictly more than 1000 while
    // the share units are unchanged.
    let t1 = t0 + Duration::days(30);
    let (shares_before, _) = hub.user_yield_position("alice", t0);
    let (shares_after, value_after) = hub.user_yield_position("alice", t1);
    assert_eq!(shares_before, shares_after);
    assert!(hub.user_position("alice", t1) > ONE_THOUSAND);
    assert_eq!(hub.user_position("alice", t1), value_after);

    // Withdraw 500: USDX balance halves, USDC payout carries yield.
    let usdc_before = hub.usdc_balance("alice");
    let event = hub.withdraw("alice", ONE_THOUSAND / 2, t1).unwrap();
    let payout = match event {
        LedgerEvent::Withdrawn { usdc_amount, .. } => usdc_amount,
        other => panic!("unexpected event {other:?}"),
    };

    assert_eq!(hub.usdx_balance("alice"), ONE_THOUSAND / 2);
    assert!(payout >= ONE_THOUSAND / 2);
    assert_eq!(hub.usdc_balance("alice"), usdc_before + payout);

    // Remaining collateral halved, and its value still covers the
    // remaining USDX.
    assert_eq!(hub.user_collateral("alice"), ONE_THOUSAND / 2);
    assert!(hub.user_position("alice", t1) >= ONE_THOUSAND / 2);
}

#[test]
fn withdrawal_beyond_collateral_is_rejected() {
    let (mut hub, _) = setup();
    hub.fund("alice", ONE_THOUSAND).unwrap();
    hub.deposit("alice", ONE_THOUSAND, genesis_time()).unwrap();

    let err = hub
        .withdraw("alice", ONE_THOUSAND + 1, genesis_time())
        .unwrap_err();
    assert!(err.to_string().contains("insufficient collateral"));
    assert_eq!(hub.usdx_balance("alice"), ONE_THOUSAND);
}

// ---------------------------------------------------------------------------
// Spoke mints against attested snapshots
// ---------------------------------------------------------------------------

#[test]
fn spoke_mint_flow_with_relayed_snapshot() {
    let (mut hub, mut spoke) = setup();
    let now = genesis_time();

    hub.fund("bob", 2 * ONE_THOUSAND).unwrap();
    hub.deposit("bob", 2 * ONE_THOUSAND, now).unwrap();

    // Relayer reads the hub position and attests it with the mint.
    let snapshot = hub.user_position("bob", now);
    spoke
        .mint_from_hub_position(
            RELAYER_ADDRESS,
            "bob",
            ONE_THOUSAND,
            snapshot,
            MintId::derive("bob", "mint-1"),
            now,
        )
        .unwrap();
    assert_eq!(spoke.usdx_balance("bob"), ONE_THOUSAND);

    // Replaying the exact delivery is a rejected duplicate with no
    // second effect.
    let err = spoke
        .mint_from_hub_position(
            RELAYER_ADDRESS,
            "bob",
            ONE_THOUSAND,
            snapshot,
            MintId::derive("bob", "mint-1"),
            now,
        )
        .unwrap_err();
    assert!(err.is_duplicate());
    assert_eq!(spoke.usdx_balance("bob"), ONE_THOUSAND);

    // A fresh key works until the snapshot bound is reached, then stops.
    spoke
        .mint_from_hub_position(
            RELAYER_ADDRESS,
            "bob",
            snapshot - ONE_THOUSAND,
            snapshot,
            MintId::derive("bob", "mint-2"),
            now,
        )
        .unwrap();
    let err = spoke
        .mint_from_hub_position(
            RELAYER_ADDRESS,
            "bob",
            1,
            snapshot,
            MintId::derive("bob", "mint-3"),
            now,
        )
        .unwrap_err();
    assert!(!err.is_duplicate());
    assert_eq!(spoke.minted_total("bob"), snapshot);
}

#[test]
fn no_mint_sequence_can_exceed_a_fixed_snapshot() {
    let (_, mut spoke) = setup();
    let now = genesis_time();
    let snapshot = 1_000u64;

    // Greedily mint in descending chunk sizes; whatever lands, the
    // cumulative total must never pass the snapshot.
    let mut seq = 0u32;
    for chunk in [600, 600, 300, 300, 100, 100, 1] {
        seq += 1;
        let _ = spoke.mint_from_hub_position(
            RELAYER_ADDRESS,
            "carol",
            chunk,
            snapshot,
            MintId::derive("carol", &format!("chunk-{seq}")),
            now,
        );
        assert!(spoke.minted_total("carol") <= snapshot);
    }
    assert_eq!(spoke.minted_total("carol"), 1_000);
}

// ---------------------------------------------------------------------------
// Bridge round trips
// ---------------------------------------------------------------------------

#[test]
fn bridge_round_trip_conserves_cross_domain_supply() {
    let (mut hub, mut spoke) = setup();
    let now = genesis_time();

    hub.fund("alice", 5 * ONE_THOUSAND).unwrap();
    hub.deposit("alice", 5 * ONE_THOUSAND, now).unwrap();
    let supply_before = cross_domain_supply(&hub, &spoke);

    // Hub → spoke.
    let event = hub
        .transfer_cross_chain("alice", ONE_THOUSAND, SPOKE, "bob", now)
        .unwrap();
    let id = initiated_id(&event);

    // Burned on the source before any completion.
    assert_eq!(hub.usdx_balance("alice"), 4 * ONE_THOUSAND);
    assert_eq!(cross_domain_supply(&hub, &spoke), supply_before - ONE_THOUSAND);

    spoke
        .complete_transfer(RELAYER_ADDRESS, id, HUB, "alice", ONE_THOUSAND, "bob", now)
        .unwrap();

    assert_eq!(spoke.usdx_balance("bob"), ONE_THOUSAND);
    assert_eq!(cross_domain_supply(&hub, &spoke), supply_before);

    // Spoke → hub, back to the original holder.
    let event = spoke
        .transfer_cross_chain("bob", ONE_THOUSAND, HUB, "alice", now)
        .unwrap();
    let id = initiated_id(&event);
    hub.complete_transfer(RELAYER_ADDRESS, id, SPOKE, "bob", ONE_THOUSAND, "alice", now)
        .unwrap();

    assert_eq!(hub.usdx_balance("alice"), 5 * ONE_THOUSAND);
    assert_eq!(spoke.usdx_balance("bob"), 0);
    assert_eq!(cross_domain_supply(&hub, &spoke), supply_before);
}

#[test]
fn duplicate_completion_cannot_double_mint() {
    let (mut hub, mut spoke) = setup();
    let now = genesis_time();

    hub.fund("alice", ONE_THOUSAND).unwrap();
    hub.deposit("alice", ONE_THOUSAND, now).unwrap();

    let event = hub
        .transfer_cross_chain("alice", ONE_THOUSAND, SPOKE, "bob", now)
        .unwrap();
    let id = initiated_id(&event);

    spoke
        .complete_transfer(RELAYER_ADDRESS, id, HUB, "alice", ONE_THOUSAND, "bob", now)
        .unwrap();
    let supply_after_first = cross_domain_supply(&hub, &spoke);

    // At-least-once delivery: the relayer crashes and resubmits.
    let err = spoke
        .complete_transfer(RELAYER_ADDRESS, id, HUB, "alice", ONE_THOUSAND, "bob", now)
        .unwrap_err();

    assert!(err.is_duplicate());
    assert_eq!(spoke.usdx_balance("bob"), ONE_THOUSAND);
    assert_eq!(cross_domain_supply(&hub, &spoke), supply_after_first);
}

// ---------------------------------------------------------------------------
// Full lifecycle
// ---------------------------------------------------------------------------

#[test]
fn full_flow_deposit_yield_spoke_mint_bridge_withdraw() {
    let (mut hub, mut spoke) = setup();
    let t0 = genesis_time();

    // Step 1: deposit 5000 USDC on the hub.
    hub.fund("dana", 5 * ONE_THOUSAND).unwrap();
    hub.deposit("dana", 5 * ONE_THOUSAND, t0).unwrap();
    let hub_position_t0 = hub.user_position("dana", t0);
    assert_eq!(hub_position_t0, 5 * ONE_THOUSAND);

    // Step 2: 60 days of yield.
    let t1 = t0 + Duration::days(60);
    let snapshot = hub.user_position("dana", t1);
    assert!(snapshot > 5 * ONE_THOUSAND);

    // Step 3: mint 2000 on the spoke against the fresh snapshot.
    spoke
        .mint_from_hub_position(
            RELAYER_ADDRESS,
            "dana",
            2 * ONE_THOUSAND,
            snapshot,
            MintId::derive("dana", "e2e-1"),
            t1,
        )
        .unwrap();
    assert_eq!(spoke.usdx_balance("dana"), 2 * ONE_THOUSAND);

    // Step 4: bridge 1000 of it back to the hub.
    let event = spoke
        .transfer_cross_chain("dana", ONE_THOUSAND, HUB, "dana", t1)
        .unwrap();
    assert_eq!(spoke.usdx_balance("dana"), ONE_THOUSAND);

    // Step 5: relayer completes on the hub.
    let id = initiated_id(&event);
    hub.complete_transfer(RELAYER_ADDRESS, id, SPOKE, "dana", ONE_THOUSAND, "dana", t1)
        .unwrap();
    assert_eq!(hub.usdx_balance("dana"), 6 * ONE_THOUSAND);

    // Step 6: withdraw 1500 on the hub; collateral shrinks, payout
    // carries yield.
    let collateral_before = hub.user_collateral("dana");
    let event = hub.withdraw("dana", 1_500_000_000, t1).unwrap();
    let payout = match event {
        LedgerEvent::Withdrawn { usdc_amount, .. } => usdc_amount,
        other => panic!("unexpected event {other:?}"),
    };
    assert!(payout >= 1_500_000_000);
    assert!(hub.user_collateral("dana") < collateral_before);
    assert_eq!(hub.usdx_balance("dana"), 4_500_000_000);
}

// ---------------------------------------------------------------------------
// Event log as the relayer's view
// ---------------------------------------------------------------------------

#[test]
fn event_log_reflects_every_applied_operation_in_order() {
    let (mut hub, mut spoke) = setup();
    let now = genesis_time();

    hub.fund("alice", 2 * ONE_THOUSAND).unwrap();
    hub.deposit("alice", 2 * ONE_THOUSAND, now).unwrap();
    let event = hub
        .transfer_cross_chain("alice", ONE_THOUSAND, SPOKE, "alice", now)
        .unwrap();
    hub.withdraw("alice", ONE_THOUSAND / 2, now).unwrap();

    let (next, events) = hub.events_since(0, 64);
    assert_eq!(next, 3);
    assert_eq!(
        events.iter().map(|e| e.kind()).collect::<Vec<_>>(),
        vec!["deposited", "transfer_initiated", "withdrawn"],
    );

    // The relayer consumes the initiation from the log and completes it
    // on the spoke — where the completion appears in that log.
    let id = initiated_id(&event);
    spoke
        .complete_transfer(RELAYER_ADDRESS, id, HUB, "alice", ONE_THOUSAND, "alice", now)
        .unwrap();
    let (_, spoke_events) = spoke.events_since(0, 64);
    assert_eq!(spoke_events.len(), 1);
    assert_eq!(spoke_events[0].kind(), "transfer_completed");
}
