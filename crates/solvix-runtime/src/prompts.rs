//! Prompt templates for classification and draft generation.
//!
//! Prompts are data. Rendering is a pure function of its inputs, so the same
//! context always produces byte-identical prompt text:
//! 1. A fixed system prompt per operation
//! 2. For drafts, one row from the category table and one from the tone
//!    table, composed (13 x 5 variants, none written out by hand)
//! 3. A user prompt rendering the case context

use std::fmt::Write as _;

use chrono::{DateTime, Utc};
use solvix_core::{CaseContext, Category, Objective, Tone};

use crate::classifier::EmailContent;

/// Most overdue invoices listed in a draft prompt.
pub const MAX_PROMPT_INVOICES: usize = 10;

/// System prompt for email classification.
pub const CLASSIFY_SYSTEM_PROMPT: &str = r#"You classify inbound emails sent by debtors to a B2B accounts-receivable team.

## Categories (highest priority first when an email has several intents)
1. INSOLVENCY: administration, liquidation, bankruptcy, CVA, IVA or receivership. Legal implications; collection must pause.
2. DISPUTE: the debtor contests the invoice (wrong amount, goods not received, quality issue, billing error).
3. ALREADY_PAID: the debtor states payment has already been made.
4. UNSUBSCRIBE: the sender asks to stop receiving emails. This must be honoured.
5. HOSTILE: aggressive, threatening or abusive language.
6. PROMISE_TO_PAY: a commitment to pay on a specific date or a specific amount.
7. HARDSHIP: financial difficulty, cash-flow problems, struggling to pay.
8. PLAN_REQUEST: asks to pay in instalments.
9. REDIRECT: asks us to contact another person or department.
10. REQUEST_INFO: asks for an invoice copy, a statement or other information.
11. OUT_OF_OFFICE: an automatic reply or absence notice.
12. COOPERATIVE: willing to work with us, acknowledges the debt, positive tone.
13. UNCLEAR: cannot be classified with confidence; a human should review.

## Data to extract
- PROMISE_TO_PAY: promise_date (YYYY-MM-DD) and promise_amount when stated.
- DISPUTE or ALREADY_PAID: dispute_type (goods_not_received, quality_issue, pricing_error, already_paid, wrong_customer, other) and dispute_reason.
- REDIRECT: redirect_contact (name) and redirect_email.

## Confidence
- 0.9 to 1.0: clear and unambiguous
- 0.7 to 0.9: likely, with some ambiguity
- 0.5 to 0.7: uncertain; may need review
- below 0.5: answer UNCLEAR instead

## Output (JSON only)
{
  "category": "ONE_OF_THE_13_LABELS",
  "confidence": 0.0,
  "rationale": "one or two sentences",
  "extracted_data": {
    "promise_date": null,
    "promise_amount": null,
    "dispute_type": null,
    "dispute_reason": null,
    "redirect_contact": null,
    "redirect_email": null
  }
}"#;

/// Base system prompt for draft generation.
pub const DRAFT_SYSTEM_PROMPT: &str = r#"You write collection emails for a B2B accounts-receivable team.

## Rules
- Stay professional and respectful in every tone.
- Name the specific invoice numbers and amounts you are chasing.
- Acknowledge earlier contact and any promises made.
- End with one clear call to action (pay by a date, book a call, share a timeline, discuss a plan).
- Keep it concise.
- Never threaten and never use language that could read as harassment.
- Where a payment may already be in transit, add: "If you have recently made payment, please disregard this message."
- Sign off with the placeholders [SENDER_NAME] and [SENDER_TITLE].

## Structure
1. Greeting
2. Outstanding amount
3. Overdue invoices (number, amount, days overdue)
4. Reference to earlier contact, if any
5. Call to action
6. Contact details for queries
7. Sign-off

## Output (JSON only)
{
  "subject": "email subject line",
  "body": "full email body"
}"#;

/// How to handle the customer's situation, per category.
pub fn category_guidance(category: Category) -> &'static str {
    match category {
        Category::Insolvency => {
            "The customer reports an insolvency event. Do not request payment. Acknowledge the \
             notice, ask for the appointed practitioner's contact details and confirm that \
             collection activity is paused."
        }
        Category::Dispute => {
            "The customer disputes the invoice. Do not press for payment of the disputed amount. \
             Acknowledge the concern, summarise what was raised and explain how it will be \
             investigated."
        }
        Category::AlreadyPaid => {
            "The customer says the invoice is already paid. Thank them, ask for the payment \
             date, amount and reference so it can be matched, and do not demand payment again."
        }
        Category::Unsubscribe => {
            "The customer asked not to be emailed. Write only a brief confirmation that the \
             request has been recorded and name another way to reach the team."
        }
        Category::Hostile => {
            "The customer's last message was hostile. Stay calm and neutral, do not mirror the \
             language, restate the facts briefly and offer a call with a named contact."
        }
        Category::PromiseToPay => {
            "The customer promised a payment. Confirm the promised date and amount back to them, \
             thank them and say what happens if the date is missed."
        }
        Category::Hardship => {
            "The customer is in financial difficulty. Lead with empathy, avoid pressure, and \
             offer to discuss a payment plan or a short pause."
        }
        Category::PlanRequest => {
            "The customer asked to pay in instalments. Welcome the request, ask for a proposed \
             schedule and state what information is needed to agree it."
        }
        Category::Redirect => {
            "The customer pointed to a different contact. Address the new contact, explain \
             briefly why you are writing and restate the outstanding invoices."
        }
        Category::RequestInfo => {
            "The customer asked for information. Provide or promise the requested documents and \
             restate the invoice details they will need."
        }
        Category::OutOfOffice => {
            "The last reply was an automatic absence notice. Keep the message short and easy to \
             act on when the recipient returns."
        }
        Category::Cooperative => {
            "The customer is cooperative. Thank them and make the next step easy with exact \
             amounts and payment details."
        }
        Category::Unclear => {
            "The customer's intent is unclear. Ask one open question to understand their \
             position and restate the outstanding balance neutrally."
        }
    }
}

/// Stylistic directive per tone.
pub fn tone_directive(tone: Tone) -> &'static str {
    match tone {
        Tone::FriendlyReminder => {
            "friendly_reminder: first contact; assume an oversight. Warm and helpful, e.g. \
             \"We wanted to bring to your attention...\""
        }
        Tone::Professional => {
            "professional: standard business tone with clear expectations, e.g. \"Our records \
             show the following outstanding...\""
        }
        Tone::Firm => {
            "firm: serious and direct, emphasising the obligation while staying respectful, e.g. \
             \"We must now ask for your urgent attention...\""
        }
        Tone::FinalNotice => {
            "final_notice: the last attempt before escalation; state the consequences plainly, \
             e.g. \"This is our final reminder before...\""
        }
        Tone::ConcernedInquiry => {
            "concerned_inquiry: for a usually reliable customer behaving unusually; check in \
             rather than chase, e.g. \"We noticed this is unusual for your account...\""
        }
    }
}

/// What the email should achieve.
pub fn objective_directive(objective: Option<Objective>) -> &'static str {
    match objective {
        None => "collect payment",
        Some(Objective::FollowUp) => "follow up on the previous email and collect payment",
        Some(Objective::PromiseReminder) => "remind the customer of their promise to pay",
        Some(Objective::Escalation) => "escalate the tone of collection for long-overdue invoices",
        Some(Objective::InitialContact) => "make first contact about the overdue invoices",
    }
}

/// Draft system prompt for one category and tone.
pub fn draft_system_prompt(category: Category, tone: Tone) -> String {
    format!(
        "{DRAFT_SYSTEM_PROMPT}\n\n## Situation ({category})\n{}\n\n## Tone\n{}",
        category_guidance(category),
        tone_directive(tone),
    )
}

/// Format an amount with thousands separators and two decimals.
pub fn format_amount(amount: f64) -> String {
    let fixed = format!("{:.2}", amount.abs());
    let (whole, frac) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, digit) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    let sign = if amount < 0.0 && fixed != "0.00" { "-" } else { "" };
    format!("{sign}{grouped}.{frac}")
}

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "yes"
    } else {
        "no"
    }
}

fn or_unknown(value: Option<&str>) -> &str {
    value.filter(|v| !v.trim().is_empty()).unwrap_or("unknown")
}

fn party_name(context: &CaseContext) -> &str {
    if context.party.name.trim().is_empty() {
        &context.party.party_id
    } else {
        &context.party.name
    }
}

/// User prompt for classifying one email.
pub fn render_classification_prompt(context: &CaseContext, email: &EmailContent) -> String {
    let party = &context.party;
    let oldest = context
        .outstanding_by_overdue()
        .first()
        .map(|o| o.days_past_due)
        .unwrap_or(0);
    let segment = context.behavior.as_ref().and_then(|b| b.segment.as_deref());

    let mut out = String::new();
    out.push_str("Classify this email from a debtor.\n\n");
    out.push_str("## Debtor context\n");
    let _ = writeln!(out, "- Company: {}", party_name(context));
    let _ = writeln!(out, "- Customer code: {}", or_unknown(Some(party.customer_code.as_str())));
    let _ = writeln!(
        out,
        "- Total outstanding: {} {}",
        party.currency,
        format_amount(context.total_outstanding())
    );
    let _ = writeln!(out, "- Oldest overdue: {oldest} days");
    let _ = writeln!(out, "- Broken promises: {}", context.broken_promises_count);
    let _ = writeln!(out, "- Payment segment: {}", or_unknown(segment));
    let _ = writeln!(out, "- Active dispute: {}", yes_no(context.active_dispute));
    let _ = writeln!(out, "- Hardship indicated: {}", yes_no(context.hardship_indicated));

    out.push_str("\n## Email\n");
    match email.from_name.as_deref().filter(|n| !n.trim().is_empty()) {
        Some(name) => {
            let _ = writeln!(out, "From: {name} <{}>", email.from_address);
        }
        None => {
            let _ = writeln!(out, "From: {}", email.from_address);
        }
    }
    let _ = writeln!(out, "Subject: {}\n", email.subject);
    out.push_str(&email.body);
    out.push_str("\n\nClassify this email and extract any relevant data.");
    out
}

/// Inputs to the draft user prompt beyond the case context.
#[derive(Debug, Clone, Copy)]
pub struct DraftPromptInput<'a> {
    pub tone: Tone,
    pub objective: Option<Objective>,
    pub custom_instructions: Option<&'a str>,
    pub now: DateTime<Utc>,
}

/// Invoice lines, most overdue first, at most [`MAX_PROMPT_INVOICES`].
pub fn render_invoice_list(context: &CaseContext) -> String {
    let open = context.outstanding_by_overdue();
    if open.is_empty() {
        return "No specific invoices provided".to_string();
    }
    open.iter()
        .take(MAX_PROMPT_INVOICES)
        .map(|o| {
            format!(
                "- {}: {} {} ({} days overdue)",
                o.invoice_number,
                context.party.currency,
                format_amount(o.amount_due),
                o.days_past_due
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// User prompt for generating one draft.
pub fn render_draft_prompt(context: &CaseContext, input: &DraftPromptInput<'_>) -> String {
    let party = &context.party;
    let comm = context.communication.clone().unwrap_or_default();
    let last_touch = context.most_recent_touch_at();
    let behavior = context.behavior.clone().unwrap_or_default();

    let mut out = String::new();
    out.push_str("Generate a collection email draft.\n\n");

    out.push_str("## Debtor\n");
    let _ = writeln!(out, "- Company: {}", party_name(context));
    let _ = writeln!(out, "- Customer code: {}", or_unknown(Some(party.customer_code.as_str())));
    let _ = writeln!(
        out,
        "- Total outstanding: {} {}",
        party.currency,
        format_amount(context.total_outstanding())
    );

    out.push_str("\n## Overdue invoices\n");
    out.push_str(&render_invoice_list(context));
    out.push('\n');

    out.push_str("\n## Communication history\n");
    let _ = writeln!(out, "- Previous touches: {}", comm.touch_count);
    let _ = writeln!(
        out,
        "- Touches this month: {}",
        context
            .monthly_touch_count
            .unwrap_or(context.party.monthly_touch_count)
    );
    let _ = writeln!(
        out,
        "- Last contact: {}",
        last_touch
            .map(|t| t.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "never".to_string())
    );
    let _ = writeln!(
        out,
        "- Last tone used: {}",
        comm.last_tone_used.map(|t| t.as_str()).unwrap_or("none")
    );
    let _ = writeln!(
        out,
        "- Last response type: {}",
        comm.last_response_type.as_deref().unwrap_or("no response")
    );

    out.push_str("\n## Current state\n");
    let _ = writeln!(
        out,
        "- Case state: {}",
        context.case_state.as_deref().unwrap_or("ACTIVE")
    );
    match last_touch {
        Some(at) => {
            let days = (input.now - at).num_days().max(0);
            let _ = writeln!(out, "- Days since last touch: {days}");
        }
        None => out.push_str("- Days since last touch: n/a\n"),
    }
    let _ = writeln!(out, "- Broken promises: {}", context.broken_promises_count);
    let _ = writeln!(out, "- Active dispute: {}", yes_no(context.active_dispute));
    let _ = writeln!(out, "- Hardship indicated: {}", yes_no(context.hardship_indicated));

    out.push_str("\n## Behaviour\n");
    let _ = writeln!(out, "- Payment segment: {}", behavior.segment.as_deref().unwrap_or("standard"));
    let _ = writeln!(
        out,
        "- On-time rate: {}",
        behavior
            .on_time_rate
            .map(|r| format!("{:.0}%", r * 100.0))
            .unwrap_or_else(|| "unknown".to_string())
    );
    let _ = writeln!(
        out,
        "- Average days to pay: {}",
        behavior
            .avg_days_to_pay
            .map(|d| format!("{d:.0}"))
            .unwrap_or_else(|| "unknown".to_string())
    );

    out.push_str("\n## Instructions\n");
    let _ = writeln!(out, "- Tone: {}", input.tone);
    let _ = writeln!(out, "- Objective: {}", objective_directive(input.objective));
    let _ = writeln!(out, "- Brand tone: {}", context.effective_brand_tone());
    if let Some(extra) = input.custom_instructions.filter(|s| !s.trim().is_empty()) {
        let _ = writeln!(out, "- Additional: {}", extra.trim());
    }

    out.push_str("\nGenerate the email draft.");
    out
}
