//! Knowledge shipped with the binary: curated operations facts and the
//! sample onboarding case book.

use crate::cases::{CaseBook, CaseRecord};
use crate::loader::Source;

const FACTS: &[&str] = &[
    "Q: What is S&A? A: S&A stands for Service & Administration. It handles centralized operations, client onboarding, service centers, and back-office activities including account maintenance, document processing, and operational support.",
    "Q: What is CWM? A: CWM stands for Consumer & Wealth Management. It provides mass market wealth services including investment accounts, retirement planning, and financial advisory services for retail clients.",
    "Q: What is Supervision & Compliance? A: Supervision & Compliance handles regulatory oversight, trade review, surveillance, and account review to ensure all activities meet regulatory requirements and internal policies.",
    "Q: What is the client onboarding process? A: The client onboarding process includes: 1) Initial consultation and needs assessment, 2) Account application and documentation collection, 3) ID verification and compliance checks, 4) Account funding and portfolio setup, 5) Welcome call and service introduction. The process typically takes 3-5 business days.",
    "Q: What happens if ID verification is delayed? A: If ID verification is delayed beyond 48 hours: 1) Send automated e-ID reminders, 2) Prefill missing fields in the application, 3) Notify assigned advisors, 4) Schedule follow-up tasks, 5) Monitor for SLA breaches.",
    "Q: How do I handle stalled onboarding cases? A: For stalled onboarding cases: 1) Review the specific hold reason, 2) Send targeted reminders based on missing information, 3) Update CRM notes with action taken, 4) Schedule same-day follow-up tasks, 5) Escalate to supervisor if no response within 72 hours.",
    "Q: What documents does KYC/AML require? A: Required documents are a passport or ID, proof of address, tax forms (W-8BEN, FATCA) and a source of funds declaration. Document management, compliance officers and relationship managers share the review.",
    "Q: Why is account funding delayed? A: Funding arrives by wire transfer, check deposit or internal fund transfer. Common delays are a pending treasury posting and bank clearance.",
    "Q: What is the escalation path? A: Operations, then Compliance, then Manager approval, then Executive escalation for urgent SLA breaches.",
    "Q: How do I handle compliance flags? A: For compliance flags: 1) Immediately review the flag details, 2) Assess risk level and urgency, 3) Gather additional information if needed, 4) Document findings and actions, 5) Escalate to compliance team if required, 6) Update client records, 7) Monitor for resolution.",
    "Q: What is the standard response time for client inquiries? A: Urgent matters: 2 hours. General inquiries: 24 hours. Account changes: 48 hours. Document requests: 72 hours. Complex issues: 5 business days. All responses should be documented in CRM.",
    "Q: When should I escalate a client issue? A: Escalation triggers: 1) Compliance violations or concerns, 2) Large financial losses, 3) Client complaints or threats, 4) System failures affecting multiple clients, 5) Regulatory inquiries, 6) Unusual trading activity, 7) Data security incidents, 8) Legal matters or disputes.",
];

/// Curated facts as loader sources, ids `faq-01`, `faq-02`, ...
pub fn fact_sources() -> Vec<Source> {
    FACTS
        .iter()
        .enumerate()
        .map(|(i, text)| Source::fact(format!("faq-{:02}", i + 1), *text))
        .collect()
}

fn case(
    client: &str,
    advisor: &str,
    status: &str,
    pending_step: &str,
    responsible: &str,
    sla_hours: u32,
    notes: &str,
) -> CaseRecord {
    CaseRecord {
        client: client.into(),
        advisor: advisor.into(),
        status: status.into(),
        pending_step: pending_step.into(),
        responsible: responsible.into(),
        sla_hours,
        notes: notes.into(),
    }
}

pub fn case_book() -> CaseBook {
    CaseBook::new(vec![
        case("John Kim", "James Lee", "ID Verification", "Attestation", "Maria Gomez", 48, "Passport uploaded, needs manager attestation"),
        case("Maria Gomez", "Laura Smith", "Address Proof", "Verification", "Anil Kapoor", 36, "Utility bill submitted, pending compliance check"),
        case("Michael Brown", "David Wilson", "Funding", "Treasury posting", "Treasury Ops", 72, "Wire transfer received, pending posting"),
        case("Priya Mehta", "Sophie Chen", "Account Approval", "Compliance review", "David Chen", 72, "Tax residency form under review"),
        case("James Wong", "Emily Davis", "Document Rejection", "Updated proof needed", "Client", 24, "Utility bill over 6 months old"),
    ])
}

/// Every built-in source: facts first, then case records.
pub fn sources() -> Vec<Source> {
    let mut sources = fact_sources();
    sources.extend(case_book().to_sources());
    sources
}
