use super::*;
use crate::context::{
    Channel, CommunicationInfo, Obligation, ObligationStatus, PromiseOutcome, PromiseRecord, Touch,
};
use crate::taxonomy::{ActionKind, Tone};
use chrono::{Duration, NaiveDate, TimeZone};
use proptest::prelude::*;

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 10, 12, 0, 0).unwrap()
}

fn touch(days_ago: i64, tone: Option<Tone>) -> Touch {
    Touch {
        sent_at: now() - Duration::days(days_ago),
        channel: Channel::Email,
        tone,
        had_response: false,
    }
}

fn base_context() -> CaseContext {
    let mut ctx = CaseContext::new("P-100");
    ctx.obligations.push(Obligation {
        invoice_number: "INV-1".to_string(),
        amount_due: 1200.0,
        due_date: NaiveDate::from_ymd_opt(2025, 1, 15).unwrap(),
        days_past_due: 54,
        status: ObligationStatus::Open,
    });
    ctx
}

fn promise(days_ago: i64) -> PromiseRecord {
    PromiseRecord {
        promise_date: now().date_naive() - Duration::days(days_ago),
        amount: Some(500.0),
        outcome: PromiseOutcome::Pending,
    }
}

fn evaluate(ctx: &CaseContext, action: ProposedAction) -> GateEvaluationResult {
    GateEvaluator::default()
        .evaluate_at(ctx, &action, now())
        .unwrap()
}

fn decision(result: &GateEvaluationResult, gate: GateName) -> &GateDecision {
    result.decision(gate).unwrap()
}

#[test]
fn test_clean_context_allows_professional_email() {
    let result = evaluate(&base_context(), ProposedAction::email(Tone::Professional));
    assert!(result.allowed());
    assert_eq!(result.recommended_action(), None);

    let order: Vec<GateName> = result.decisions().iter().map(|d| d.gate).collect();
    assert_eq!(order, GateName::ALL.to_vec());
}

#[test]
fn test_touch_cap_boundary_is_inclusive() {
    let mut ctx = base_context();
    ctx.organization.touch_cap = 3;
    ctx.organization.touch_interval_days = 0;
    ctx.recent_touches = vec![touch(3, None), touch(10, None), touch(20, None)];

    let at_cap = evaluate(&ctx, ProposedAction::email(Tone::Professional));
    let gate = decision(&at_cap, GateName::TouchCap);
    assert!(gate.allowed);
    assert_eq!(gate.reason, "3 contacts in 30 days, cap is 3");

    ctx.recent_touches.push(touch(25, None));
    let over_cap = evaluate(&ctx, ProposedAction::email(Tone::Professional));
    let gate = decision(&over_cap, GateName::TouchCap);
    assert!(!gate.allowed);
    assert_eq!(gate.figures["touch_count"], 4);
    assert!(!over_cap.allowed());
}

#[test]
fn test_touch_cap_ignores_touches_outside_period() {
    let mut ctx = base_context();
    ctx.organization.touch_cap = 1;
    ctx.recent_touches = vec![touch(5, None), touch(30, None), touch(45, None)];

    let result = evaluate(&ctx, ProposedAction::email(Tone::Professional));
    let gate = decision(&result, GateName::TouchCap);
    assert!(gate.allowed);
    assert_eq!(gate.figures["touch_count"], 1);
}

#[test]
fn test_touch_cap_party_override_wins() {
    let mut ctx = base_context();
    ctx.organization.touch_cap = 10;
    ctx.party.touch_cap_override = Some(1);
    ctx.recent_touches = vec![touch(5, None), touch(8, None)];

    let result = evaluate(&ctx, ProposedAction::email(Tone::Professional));
    assert!(!decision(&result, GateName::TouchCap).allowed);
}

#[test]
fn test_touch_cap_counts_backend_summary() {
    let mut ctx = base_context();
    ctx.organization.touch_interval_days = 0;
    ctx.communication = Some(CommunicationInfo {
        touch_count: 15,
        ..Default::default()
    });

    let result = evaluate(&ctx, ProposedAction::email(Tone::Professional));
    let gate = decision(&result, GateName::TouchCap);
    assert!(!gate.allowed);
    assert_eq!(gate.reason, "15 contacts in 30 days, cap is 10");
    assert_eq!(gate.figures["touches_listed"], 0);
    assert_eq!(gate.figures["touches_reported"], 15);
}

#[test]
fn test_touch_cap_takes_larger_of_list_and_counters() {
    let mut ctx = base_context();
    ctx.organization.touch_cap = 3;
    ctx.organization.touch_interval_days = 0;
    ctx.recent_touches = vec![touch(2, None), touch(6, None), touch(9, None)];
    ctx.monthly_touch_count = Some(2);

    let result = evaluate(&ctx, ProposedAction::email(Tone::Professional));
    let gate = decision(&result, GateName::TouchCap);
    assert!(gate.allowed);
    assert_eq!(gate.figures["touch_count"], 3);

    ctx.party.monthly_touch_count = 4;
    let result = evaluate(&ctx, ProposedAction::email(Tone::Professional));
    let gate = decision(&result, GateName::TouchCap);
    assert!(!gate.allowed);
    assert_eq!(gate.figures["touch_count"], 4);
    assert_eq!(gate.figures["touches_listed"], 3);
}

#[test]
fn test_resolved_top_level_limits_drive_contact_gates() {
    let ctx: CaseContext = serde_json::from_value(serde_json::json!({
        "party": {"party_id": "P-7", "customer_code": "ACME"},
        "touch_cap": 2,
        "touch_interval_days": 7,
        "recent_touches": [
            {"sent_at": (now() - Duration::days(4)).to_rfc3339()},
            {"sent_at": (now() - Duration::days(5)).to_rfc3339()},
            {"sent_at": (now() - Duration::days(6)).to_rfc3339()}
        ]
    }))
    .unwrap();

    let result = evaluate(&ctx, ProposedAction::email(Tone::Professional));
    let cap = decision(&result, GateName::TouchCap);
    assert!(!cap.allowed);
    assert_eq!(cap.figures["touch_cap"], 2);
    let cooling = decision(&result, GateName::CoolingOff);
    assert!(!cooling.allowed);
    assert_eq!(cooling.figures["min_days"], 7);
    assert_eq!(cooling.reason, "4 days since last contact, minimum is 7");
}

#[test]
fn test_touch_inside_clock_skew_counts_as_just_sent() {
    let mut ctx = base_context();
    ctx.recent_touches = vec![Touch {
        sent_at: now() + Duration::minutes(2),
        channel: Channel::Email,
        tone: None,
        had_response: false,
    }];

    let result = evaluate(&ctx, ProposedAction::email(Tone::Professional));
    let cooling = decision(&result, GateName::CoolingOff);
    assert!(!cooling.allowed);
    assert_eq!(cooling.figures["days_since_last_touch"], 0);
    assert_eq!(decision(&result, GateName::TouchCap).figures["touch_count"], 1);
}

#[test]
fn test_cooling_off_blocks_recent_contact() {
    let mut ctx = base_context();
    ctx.recent_touches = vec![touch(1, Some(Tone::Professional))];

    let result = evaluate(&ctx, ProposedAction::email(Tone::Professional));
    let gate = decision(&result, GateName::CoolingOff);
    assert!(!gate.allowed);
    assert_eq!(gate.reason, "1 day since last contact, minimum is 3");
    assert_eq!(
        result.recommended_action(),
        Some("Wait 2 more days before next contact")
    );
}

#[test]
fn test_cooling_off_allows_at_interval() {
    let mut ctx = base_context();
    ctx.recent_touches = vec![touch(3, None)];

    let result = evaluate(&ctx, ProposedAction::email(Tone::Professional));
    assert!(decision(&result, GateName::CoolingOff).allowed);
}

#[test]
fn test_cooling_off_reads_summary_timestamp() {
    let mut ctx = base_context();
    ctx.recent_touches = vec![touch(10, None)];
    ctx.communication = Some(CommunicationInfo {
        touch_count: 4,
        last_touch_at: Some(now() - Duration::hours(20)),
        ..Default::default()
    });

    let result = evaluate(&ctx, ProposedAction::email(Tone::Professional));
    let gate = decision(&result, GateName::CoolingOff);
    assert!(!gate.allowed);
    assert_eq!(gate.figures["days_since_last_touch"], 0);
}

#[test]
fn test_dispute_blocks() {
    let mut ctx = base_context();
    ctx.active_dispute = true;

    let result = evaluate(&ctx, ProposedAction::email(Tone::FriendlyReminder));
    assert!(!decision(&result, GateName::DisputeActive).allowed);
    assert!(!result.allowed());
}

#[test]
fn test_hardship_allows_only_appropriate_actions() {
    let mut ctx = base_context();
    ctx.hardship_indicated = true;

    let firm = evaluate(&ctx, ProposedAction::email(Tone::Firm));
    assert!(!decision(&firm, GateName::Hardship).allowed);

    let concerned = evaluate(&ctx, ProposedAction::email(Tone::ConcernedInquiry));
    assert!(decision(&concerned, GateName::Hardship).allowed);
    assert!(concerned.allowed());

    let close = evaluate(&ctx, ProposedAction::new(ActionKind::CloseCase));
    assert!(decision(&close, GateName::Hardship).allowed);
}

#[test]
fn test_unsubscribe_blocks_everything() {
    let mut ctx = base_context();
    ctx.unsubscribe_requested = true;

    let result = evaluate(&ctx, ProposedAction::email(Tone::ConcernedInquiry));
    assert!(!decision(&result, GateName::Unsubscribe).allowed);
    assert!(!result.allowed());
}

#[test]
fn test_no_short_circuit_on_first_block() {
    let mut ctx = base_context();
    ctx.unsubscribe_requested = true;
    ctx.active_dispute = true;
    ctx.recent_touches = vec![touch(0, Some(Tone::Professional))];

    let result = evaluate(&ctx, ProposedAction::email(Tone::FinalNotice));
    assert_eq!(result.decisions().len(), GateName::ALL.len());
    assert_eq!(result.blocking().count(), 4);
    assert_eq!(
        result.recommended_action(),
        Some("Wait 3 more days before next contact")
    );
}

#[test]
fn test_escalation_without_history_caps_at_professional() {
    let ctx = base_context();

    assert!(evaluate(&ctx, ProposedAction::email(Tone::Professional)).allowed());

    let firm = evaluate(&ctx, ProposedAction::email(Tone::Firm));
    let gate = decision(&firm, GateName::EscalationAppropriate);
    assert!(!gate.allowed);
    assert_eq!(gate.figures["ceiling_severity"], 2);
    assert_eq!(
        firm.recommended_action(),
        Some("Use a tone no harsher than professional")
    );
}

#[test]
fn test_escalation_earned_by_touches_at_level() {
    let mut ctx = base_context();
    ctx.recent_touches = vec![
        touch(5, Some(Tone::Professional)),
        touch(9, Some(Tone::Professional)),
    ];

    let result = evaluate(&ctx, ProposedAction::email(Tone::Firm));
    assert!(decision(&result, GateName::EscalationAppropriate).allowed);

    let skip = evaluate(&ctx, ProposedAction::email(Tone::FinalNotice));
    assert!(!decision(&skip, GateName::EscalationAppropriate).allowed);
}

#[test]
fn test_escalation_earned_by_days_at_level() {
    let mut ctx = base_context();
    ctx.recent_touches = vec![touch(15, Some(Tone::Firm))];

    let result = evaluate(&ctx, ProposedAction::email(Tone::FinalNotice));
    let gate = decision(&result, GateName::EscalationAppropriate);
    assert!(gate.allowed);
    assert_eq!(gate.figures["days_at_level"], 15);
}

#[test]
fn test_escalation_earned_by_broken_promise() {
    let mut ctx = base_context();
    ctx.recent_touches = vec![touch(5, Some(Tone::Professional))];

    let held = evaluate(&ctx, ProposedAction::email(Tone::Firm));
    assert!(!decision(&held, GateName::EscalationAppropriate).allowed);

    ctx.promises.push(promise(10));
    let earned = evaluate(&ctx, ProposedAction::email(Tone::Firm));
    let gate = decision(&earned, GateName::EscalationAppropriate);
    assert!(gate.allowed);
    assert_eq!(gate.figures["broken_promises"], 1);
}

#[test]
fn test_current_promise_caps_escalation() {
    let mut ctx = base_context();
    ctx.recent_touches = vec![
        touch(5, Some(Tone::Firm)),
        touch(10, Some(Tone::Firm)),
    ];
    ctx.promises.push(promise(2));

    let result = evaluate(&ctx, ProposedAction::email(Tone::Firm));
    let gate = decision(&result, GateName::EscalationAppropriate);
    assert!(!gate.allowed);
    assert!(gate.reason.contains("capped by a promise within grace"));
}

#[test]
fn test_promise_grace_boundary_drives_escalation() {
    let mut ctx = base_context();
    ctx.recent_touches = vec![touch(5, Some(Tone::Professional))];

    ctx.promises = vec![promise(2)];
    let within = evaluate(&ctx, ProposedAction::email(Tone::Firm));
    assert!(!within.allowed());

    ctx.promises = vec![promise(4)];
    let lapsed = evaluate(&ctx, ProposedAction::email(Tone::Firm));
    assert!(lapsed.allowed());
}

#[test]
fn test_escalate_action_needs_final_notice_history() {
    let mut ctx = base_context();
    ctx.recent_touches = vec![
        touch(4, Some(Tone::FinalNotice)),
        touch(8, Some(Tone::FinalNotice)),
    ];
    assert!(evaluate(&ctx, ProposedAction::new(ActionKind::Escalate)).allowed());

    ctx.recent_touches = vec![touch(4, Some(Tone::Firm)), touch(8, Some(Tone::Firm))];
    let early = evaluate(&ctx, ProposedAction::new(ActionKind::Escalate));
    assert!(!decision(&early, GateName::EscalationAppropriate).allowed);
}

#[test]
fn test_escalation_falls_back_to_summary_tone() {
    let mut ctx = base_context();
    ctx.communication = Some(CommunicationInfo {
        touch_count: 6,
        last_touch_at: Some(now() - Duration::days(20)),
        last_tone_used: Some(Tone::Firm),
        ..Default::default()
    });

    let result = evaluate(&ctx, ProposedAction::email(Tone::FinalNotice));
    assert!(decision(&result, GateName::EscalationAppropriate).allowed);
}

#[test]
fn test_malformed_context_is_an_error() {
    let mut ctx = base_context();
    ctx.party.party_id = String::new();
    let err = GateEvaluator::default()
        .evaluate_at(&ctx, &ProposedAction::email(Tone::Professional), now())
        .unwrap_err();
    assert_eq!(err, GateError::Validation(ValidationError::EmptyPartyId));

    let mut future = base_context();
    future.recent_touches.push(touch(-1, None));
    assert!(GateEvaluator::default()
        .evaluate_at(&future, &ProposedAction::email(Tone::Professional), now())
        .is_err());
}

#[test]
fn test_custom_grace_policy() {
    let mut ctx = base_context();
    ctx.recent_touches = vec![touch(5, Some(Tone::Professional))];
    ctx.promises.push(promise(4));

    let lenient = GateEvaluator::new(GatePolicy::default().with_grace_days(7));
    let result = lenient
        .evaluate_at(&ctx, &ProposedAction::email(Tone::Firm), now())
        .unwrap();
    assert!(!result.allowed());
}

#[test]
fn test_batch_shares_now_and_checks_limits() {
    let evaluator = GateEvaluator::default();
    let action = ProposedAction::email(Tone::Professional);

    let mut blocked = base_context();
    blocked.unsubscribe_requested = true;
    let results = evaluator
        .evaluate_batch(&[base_context(), blocked], &action, now())
        .unwrap();
    assert_eq!(results.len(), 2);
    assert!(results[0].allowed());
    assert!(!results[1].allowed());
    assert_eq!(results[0].evaluated_at(), results[1].evaluated_at());

    assert_eq!(
        evaluator.evaluate_batch(&[], &action, now()),
        Err(GateError::EmptyBatch)
    );

    let too_many = vec![base_context(); MAX_BATCH_SIZE + 1];
    assert!(matches!(
        evaluator.evaluate_batch(&too_many, &action, now()),
        Err(GateError::BatchTooLarge { got: 101, max: 100 })
    ));

    let mut invalid = base_context();
    invalid.party.party_id = String::new();
    assert!(matches!(
        evaluator.evaluate_batch(&[base_context(), invalid], &action, now()),
        Err(GateError::BatchItem { index: 1, .. })
    ));
}

fn arb_tone() -> impl Strategy<Value = Tone> {
    prop::sample::select(Tone::ALL.to_vec())
}

fn arb_action() -> impl Strategy<Value = ProposedAction> {
    (
        prop::sample::select(vec![
            ActionKind::SendEmail,
            ActionKind::CreateCase,
            ActionKind::Escalate,
            ActionKind::CloseCase,
        ]),
        prop::option::of(arb_tone()),
    )
        .prop_map(|(action, tone)| ProposedAction { action, tone })
}

prop_compose! {
    fn arb_context()(
        touches in prop::collection::vec((0i64..60, prop::option::of(arb_tone())), 0..12),
        promise_days in prop::collection::vec(-5i64..20, 0..3),
        broken in 0u32..3,
        dispute in any::<bool>(),
        hardship in any::<bool>(),
        unsubscribe in any::<bool>(),
        cap in 0u32..12,
        interval in 0u32..7,
    ) -> CaseContext {
        let mut ctx = base_context();
        ctx.recent_touches = touches.into_iter().map(|(d, t)| touch(d, t)).collect();
        ctx.promises = promise_days.into_iter().map(promise).collect();
        ctx.broken_promises_count = broken;
        ctx.active_dispute = dispute;
        ctx.hardship_indicated = hardship;
        ctx.unsubscribe_requested = unsubscribe;
        ctx.organization.touch_cap = cap;
        ctx.organization.touch_interval_days = interval;
        ctx
    }
}

proptest! {
    #[test]
    fn prop_allowed_is_and_of_decisions(ctx in arb_context(), action in arb_action()) {
        let result = evaluate(&ctx, action);
        let expected = result.decisions().iter().all(|d| d.allowed);
        prop_assert_eq!(result.allowed(), expected);
        prop_assert_eq!(result.decisions().len(), GateName::ALL.len());
        prop_assert_eq!(result.recommended_action().is_some(), !expected);
    }

    #[test]
    fn prop_no_touches_means_cooling_off_allowed(mut ctx in arb_context(), action in arb_action()) {
        ctx.recent_touches.clear();
        ctx.communication = None;
        let result = evaluate(&ctx, action);
        prop_assert!(decision(&result, GateName::CoolingOff).allowed);
    }

    #[test]
    fn prop_evaluation_is_idempotent(ctx in arb_context(), action in arb_action()) {
        prop_assert_eq!(evaluate(&ctx, action), evaluate(&ctx, action));
    }
}
