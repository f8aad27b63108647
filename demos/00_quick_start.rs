/// quick start - open a contract and print its schedule
use chrono::{TimeZone, Utc};
use installment_ledger::{
    Contract, DateOnly, InMemoryFileStore, InMemoryLedgerStore, LedgerConfig, LedgerService,
    Money, SafeTimeProvider, TimeSource,
};
use rust_decimal_macros::dec;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let time = SafeTimeProvider::new(TimeSource::Test(
        Utc.with_ymd_and_hms(2025, 1, 1, 7, 0, 0).unwrap()
    ));

    let mut service = LedgerService::new(
        LedgerConfig::standard(),
        InMemoryLedgerStore::new(),
        InMemoryFileStore::default(),
    )?;

    // 10M plot, 2M down, 10% at possession, rest over 36 months
    let contract = Contract::new(
        Money::from_major(10_000_000),
        Money::from_major(2_000_000),
        dec!(10),
        36,
        DateOnly::from_ymd(2025, 1, 1),
    )?;

    let view = service.open_contract(contract, &time)?;

    for row in view.rows.iter().take(4) {
        println!("{:>3}  {:<18} {:>10}  due {}", row.sequence, row.description, row.installment_amount, row.due_date);
    }
    println!("...");
    println!("possession: {}", view.contract.possession.amount);
    println!("{}", serde_json::to_string_pretty(&view.totals)?);

    Ok(())
}
