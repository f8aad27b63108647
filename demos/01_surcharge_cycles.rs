/// surcharge cycles - how late cycles lock as time passes
use installment_ledger::{BillingRow, DateOnly, EventStore, Money, SurchargeEngine, Uuid};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== surcharge cycles ===\n");

    let engine = SurchargeEngine::default();
    let mut events = EventStore::new();
    let contract_id = Uuid::new_v4();

    let due = DateOnly::from_ymd(2025, 1, 1).ok_or("bad date")?;
    let first_payment = due.add_days(31).ok_or("bad date")?;

    // 100,000 installment, 20,000 paid a month late
    let mut row = BillingRow::new(1, "1st INSTALLMENT".to_string(), Money::from_major(100_000), due)
        .with_payment(Money::from_major(20_000), first_payment);

    for days in [10, 31, 45, 61, 91] {
        let today = due.add_days(days).ok_or("bad date")?;
        let eval = engine.lock(contract_id, &mut row, today, &mut events);
        println!(
            "day {:>3}: cycles {} locked {:>6} base {:?} (+{})",
            days,
            row.surcharge.cycles_applied,
            row.surcharge.locked_amount,
            row.surcharge.balance_base.map(|b| b.to_string()),
            eval.increment()
        );
    }

    // paying the rest stops the clock at the payment date
    row.add_child(Money::from_major(80_000), due.add_days(100).ok_or("bad date")?);
    let today = due.add_days(400).ok_or("bad date")?;
    engine.lock(contract_id, &mut row, today, &mut events);
    println!("\nafter settling on day 100, checked on day 400:");
    println!("cycles {} locked {}", row.surcharge.cycles_applied, row.surcharge.locked_amount);

    println!("\nevents:");
    for event in events.take_events() {
        println!("  {:?}", event);
    }

    Ok(())
}
