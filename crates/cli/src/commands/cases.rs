//! `parley cases`: List client onboarding cases.

use parley_knowledge::{CaseRecord, builtin};

pub fn run(stalled: bool, name: Option<&str>) -> Result<(), Box<dyn std::error::Error>> {
    let book = builtin::case_book();

    let mut cases: Vec<&CaseRecord> = match name {
        Some(name) => book.find(name),
        None if stalled => book.stalled(),
        None => book.all().iter().collect(),
    };
    if stalled && name.is_some() {
        cases.retain(|c| c.is_stalled());
    }

    if cases.is_empty() {
        println!("No matching cases.");
        return Ok(());
    }

    println!(
        "{:<16} {:<14} {:<20} {:<22} {:<14} {:>4}",
        "CLIENT", "ADVISOR", "STATUS", "PENDING", "OWNER", "SLA"
    );
    for case in &cases {
        println!(
            "{:<16} {:<14} {:<20} {:<22} {:<14} {:>3}h",
            case.client, case.advisor, case.status, case.pending_step, case.responsible, case.sla_hours
        );
        println!("    {}", case.notes);
    }
    println!();
    println!("{} case(s)", cases.len());
    Ok(())
}
