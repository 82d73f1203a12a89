//! Tests for fieldwatch-core: history, tier tables, balance, protocol, errors

use fieldwatch_core::*;
use serde_json::json;

// ===========================================================================
// BoundedHistory
// ===========================================================================

#[test]
fn history_keeps_last_items_in_order() {
    let mut h = SampleHistory::new(5);
    for i in 0..8 {
        h.append(TelemetrySample::new(i as f64 / 10.0, i));
        assert!(h.len() <= 5);
    }
    assert_eq!(h.values(), vec![0.3, 0.4, 0.5, 0.6, 0.7]);
    assert_eq!(h.latest().unwrap().timestamp_ms, 7);
}

#[test]
fn history_cap_never_exceeded_for_any_cap() {
    for cap in 0..12 {
        let mut h: BoundedHistory<u32> = BoundedHistory::new(cap);
        for i in 0..30 {
            h.append(i);
            assert!(h.len() <= cap, "cap {} exceeded", cap);
        }
    }
}

#[test]
fn history_module_constants() {
    assert_eq!(VALIDATION_HISTORY_CAP, 100);
    assert_eq!(ACTIVE_MODULE_SLOTS, 5);
}

#[test]
fn significant_filter_uses_previous_sample() {
    let mut h = SampleHistory::new(10);
    for (i, v) in [0.50, 0.51, 0.60, 0.61, 0.40].iter().enumerate() {
        h.append(TelemetrySample::new(*v, i as i64));
    }
    let kept: Vec<f64> = h.significant(0.05).iter().map(|s| s.value).collect();
    assert_eq!(kept, vec![0.50, 0.60, 0.40]);
}

// ===========================================================================
// Tier tables
// ===========================================================================

#[test]
fn coherence_table_examples() {
    let t = TierTable::coherence();
    assert_eq!(t.tier(0.96), Tier(4));
    assert_eq!(t.tier(0.91), Tier(3));
    assert_eq!(t.tier(0.86), Tier(2));
    assert_eq!(t.tier(0.10), Tier(1));
}

#[test]
fn thresholds_are_strict() {
    let t = TierTable::coherence();
    assert_eq!(t.tier(0.95), Tier(3));
    assert_eq!(t.tier(0.90), Tier(2));
    assert_eq!(t.tier(0.85), Tier(1));
}

#[test]
fn builtin_tables_are_monotone_over_unit_interval() {
    for table in [TierTable::coherence(), TierTable::balance()] {
        let mut prev = Tier(0);
        for i in 0..=1000 {
            let v = i as f64 / 1000.0;
            let tier = table.tier(v);
            assert!(tier >= prev, "{} not monotone at {}", table.name, v);
            prev = tier;
        }
    }
}

#[test]
fn out_of_range_lands_in_default_tier() {
    for table in [TierTable::coherence(), TierTable::balance()] {
        for v in [-1.0, 1.5, f64::NAN, f64::INFINITY] {
            assert_eq!(table.classify(v), table.default_spec());
        }
    }
}

#[test]
fn balance_table_labels() {
    let t = TierTable::balance();
    assert_eq!(t.classify(0.751).label, "stability");
    assert_eq!(t.classify(0.9).label, "rigidity");
    assert_eq!(t.classify(0.6).label, "exploration");
    assert_eq!(t.classify(0.3).label, "dissonance");
}

#[test]
fn builtin_lookup() {
    assert!(TierTable::builtin("coherence").is_some());
    assert!(TierTable::builtin("balance").is_some());
    assert!(TierTable::builtin("lemniscate").is_none());
}

#[test]
fn custom_table_validation() {
    let default = TierSpec::new(1, "low", "", "red");
    let ok = TierTable::new(
        "custom",
        vec![
            Breakpoint {
                above: 0.8,
                spec: TierSpec::new(3, "high", "", "green"),
            },
            Breakpoint {
                above: 0.4,
                spec: TierSpec::new(2, "mid", "", "yellow"),
            },
        ],
        default.clone(),
    )
    .unwrap();
    assert_eq!(ok.classify(0.5).label, "mid");

    let ascending = TierTable::new(
        "bad",
        vec![
            Breakpoint {
                above: 0.4,
                spec: TierSpec::new(2, "mid", "", "yellow"),
            },
            Breakpoint {
                above: 0.8,
                spec: TierSpec::new(3, "high", "", "green"),
            },
        ],
        default.clone(),
    );
    assert!(matches!(ascending, Err(Error::Config(_))));

    let nan = TierTable::new(
        "bad",
        vec![Breakpoint {
            above: f64::NAN,
            spec: TierSpec::new(2, "x", "", "gray"),
        }],
        default,
    );
    assert!(nan.is_err());
}

#[test]
fn tier_ranked_below_default_is_rejected() {
    let sunk = TierTable::new(
        "sunk",
        vec![Breakpoint {
            above: 0.5,
            spec: TierSpec::new(1, "above", "", "green"),
        }],
        TierSpec::new(2, "floor", "", "red"),
    );
    assert!(matches!(sunk, Err(Error::Config(ref msg)) if msg.contains("below the default")));
}

// ===========================================================================
// Reading extraction
// ===========================================================================

#[test]
fn reading_from_nested_field() {
    let r = Reading::extract(json!({"metrics": {"stability": 0.7}, "phase": "x"}), "metrics.stability", None).unwrap();
    assert_eq!(r.value, 0.7);
    assert_eq!(r.extra["phase"], "x");
}

#[test]
fn reading_rejects_non_numeric_and_non_object() {
    assert!(matches!(
        Reading::extract(json!({"coherence": "high"}), "coherence", None),
        Err(Error::Parse(_))
    ));
    assert!(Reading::extract(json!([1, 2]), "coherence", None).is_err());
}

// ===========================================================================
// Balance
// ===========================================================================

#[test]
fn balance_defaults_and_status() {
    let b = Balance::default();
    assert_eq!(b.ratio_label(), "3.00:1");
    assert_eq!(b.status(), BalanceStatus::Optimal);
    assert_eq!(Balance::new(0.85, 0.15).status(), BalanceStatus::Suboptimal);
    assert_eq!(Balance::new(0.3, 0.7).status(), BalanceStatus::Critical);
    assert_eq!(Balance::new(0.75, 0.0).ratio(), None);
}

#[test]
fn balance_from_partial_payload() {
    let b = Balance::from_json(&json!({"stability": 0.8})).unwrap();
    assert_eq!(b.exploration, 0.25);
    assert!(Balance::from_json(&json!({"coherence": 0.8})).is_none());
}

// ===========================================================================
// Protocol
// ===========================================================================

#[test]
fn decode_known_kinds() {
    let m = FieldMessage::decode(r#"{"type":"coherence_update","data":{"stability":0.74,"ratio":2.85}}"#).unwrap();
    assert_eq!(m.kind(), "coherence_update");
    assert_eq!(m.stability(), Some(0.74));

    let m = FieldMessage::decode(r#"{"type":"system","data":{"message":"Connected"}}"#).unwrap();
    assert!(matches!(m, FieldMessage::System(ref s) if s.message == "Connected"));
    assert_eq!(m.stability(), None);
}

#[test]
fn unknown_kind_is_preserved_not_rejected() {
    let m = FieldMessage::decode(r#"{"type":"lemniscate_mode","data":{"loops":3}}"#).unwrap();
    match m {
        FieldMessage::Unknown { kind, data } => {
            assert_eq!(kind, "lemniscate_mode");
            assert_eq!(data["loops"], 3);
        }
        other => panic!("expected Unknown, got {:?}", other),
    }
}

#[test]
fn malformed_frames_are_parse_errors() {
    assert!(matches!(FieldMessage::decode("not json"), Err(Error::Parse(_))));
    assert!(matches!(
        FieldMessage::decode(r#"{"type":"coherence_update","data":{"ratio":1}}"#),
        Err(Error::Parse(_))
    ));
}

#[test]
fn chat_request_uses_wire_names() {
    let req = ChatRequest {
        message: "hi".into(),
        user_id: "u1".into(),
        user_resonance: Some(0.8),
    };
    let v = serde_json::to_value(&req).unwrap();
    assert_eq!(v["userResonance"], 0.8);
    assert_eq!(v["user_id"], "u1");
}

#[test]
fn chat_reply_keeps_unknown_fields() {
    let reply: ChatReply = serde_json::from_value(json!({
        "response": "ok",
        "stability": 0.75,
        "soul_state": "calm"
    }))
    .unwrap();
    assert_eq!(reply.stability, Some(0.75));
    assert_eq!(reply.extra["soul_state"], "calm");
}

// ===========================================================================
// Errors
// ===========================================================================

#[test]
fn error_kinds() {
    assert_eq!(Error::network("x").kind(), "network");
    assert_eq!(Error::http(500, "boom").kind(), "http");
    assert_eq!(Error::user_input("x").kind(), "user_input");
    assert!(Error::http(503, "").is_remote());
    assert!(!Error::user_input("x").is_remote());
    assert!(Error::http(500, "boom").to_string().contains("500"));
}
