/// save and statement - the save pipeline from loose form input to a statement
use chrono::{Duration, TimeZone, Utc};
use installment_ledger::{
    AmountInput, Contract, DateInput, DateOnly, InMemoryFileStore, InMemoryLedgerStore,
    JsonStatementRenderer, LedgerConfig, LedgerService, Money, ProofTarget, ProofUpload, RowDraft,
    SafeTimeProvider, SaveRequest, TimeSource,
};
use rust_decimal_macros::dec;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let time = SafeTimeProvider::new(TimeSource::Test(
        Utc.with_ymd_and_hms(2025, 1, 1, 7, 0, 0).unwrap()
    ));
    let controller = time.test_control().unwrap();

    let mut service = LedgerService::new(
        LedgerConfig::standard(),
        InMemoryLedgerStore::new(),
        InMemoryFileStore::default(),
    )?;
    let contract = Contract::new(
        Money::from_major(1_200_000),
        Money::ZERO,
        dec!(10),
        12,
        DateOnly::from_ymd(2025, 1, 1),
    )?;
    let id = service.open_contract(contract, &time)?.contract.id;

    // staff record a partial payment the way the form sends it
    let mut rows: Vec<RowDraft> = service.load(id)?.rows.iter().map(RowDraft::from).collect();
    rows[0].amount_paid = Some(AmountInput::from("30,000"));
    rows[0].payment_date = Some(DateInput::from("05/01/2025"));
    service.save(id, SaveRequest::rows(rows), &time)?;

    service.attach_proof(
        id,
        ProofTarget::Sequence(1),
        ProofUpload::new("receipt.pdf", "application/pdf", b"%PDF-1.7".to_vec()),
    )?;

    // two months later, an unchanged save locks the cycles that passed
    controller.advance(Duration::days(61));
    let view = service.save(id, SaveRequest::default(), &time)?;
    println!("row 1 surcharge: {}", view.rows[0].surcharge.locked_amount);

    let bytes = service.render_statement(id, &time, &JsonStatementRenderer)?;
    println!("{}", String::from_utf8(bytes)?);

    for event in service.take_events() {
        println!("{:?}", event);
    }

    Ok(())
}
