//! Number, draft and report a store's cash sales through the external signer.
//!
//! Run with: `cargo run --example report_invoice -- zatca.toml`
//!
//! Without a config file only the first draft is built and printed.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal_macros::dec;
use zatca_pos::config::ZatcaConfig;
use zatca_pos::core::*;
use zatca_pos::reporting::{BatchItem, InvoiceRepository, LastReported, ReportOutcome, Reporter};
use zatca_pos::signer::ProcessSigner;
use zatca_pos::ubl::{self, DraftContext, InvoiceTemplate};

/// Keeps everything in memory; a POS would back this with its database.
struct DemoRepository {
    store: Store,
    states: Mutex<HashMap<String, (u64, ZatcaState)>>,
}

#[async_trait]
impl InvoiceRepository for DemoRepository {
    async fn find_store_by_id(&self, id: &str) -> Result<Option<Store>, ZatcaError> {
        Ok((id == self.store.id).then(|| self.store.clone()))
    }

    async fn find_customer_by_id(&self, _id: &str) -> Result<Option<Customer>, ZatcaError> {
        Ok(None)
    }

    async fn find_last_reported(&self, _store_id: &str) -> Result<Option<LastReported>, ZatcaError> {
        let states = self.states.lock().unwrap();
        Ok(states
            .values()
            .filter(|(_, z)| z.reporting_passed)
            .max_by_key(|(icv, _)| *icv)
            .and_then(|(icv, z)| {
                z.hash.clone().map(|hash| LastReported {
                    hash,
                    invoice_count_value: *icv,
                })
            }))
    }

    async fn save_zatca_state(&self, invoice: &Invoice) -> Result<(), ZatcaError> {
        self.states.lock().unwrap().insert(
            invoice.id.clone(),
            (invoice.invoice_count_value, invoice.zatca.clone()),
        );
        Ok(())
    }
}

fn store() -> Store {
    Store {
        id: "s1".into(),
        name: "Olaya Branch".into(),
        name_in_arabic: "فرع العليا".into(),
        code: "OLY".into(),
        registration_number: "1010010000".into(),
        vat_no: "399999999900003".into(),
        vat_percent: dec!(15),
        national_address: NationalAddress {
            building_no: "1234".into(),
            street_name: "King Fahd Road".into(),
            district_name: "Olaya".into(),
            city_name: "Riyadh".into(),
            zipcode: "12211".into(),
            additional_no: "5678".into(),
            ..Default::default()
        },
        ..Default::default()
    }
}

fn cash_sales(store: &Store) -> Vec<Invoice> {
    let mut sequence = InvoiceSequence::new(&store.code);
    let baskets = [
        vec![("Coffee beans", dec!(1), "Kg", dec!(85.00))],
        vec![("Paper cups", dec!(3), "set", dec!(12.50)), ("Milk", dec!(2), "L", dec!(6.75))],
    ];
    baskets
        .into_iter()
        .map(|basket| {
            let number = sequence.next_number();
            let mut inv = Invoice::sale(
                uuid::Uuid::new_v4().to_string(),
                number.code,
                &store.id,
                Utc::now(),
                number.invoice_count_value,
                store.vat_percent,
            );
            for (name, qty, unit, price) in basket {
                inv.lines.push(LineItem::new(name, qty, unit, price));
            }
            inv.payment_methods.push(PaymentMethod::Cash);
            inv.calculate_totals();
            inv
        })
        .collect()
}

#[tokio::main]
async fn main() {
    let store = store();
    let mut invoices = cash_sales(&store);

    let Some(config_path) = std::env::args().nth(1) else {
        let ctx = DraftContext {
            is_simplified: true,
            prev_hash: ubl::seed_hash(),
        };
        let offset = ZatcaConfig::default().utc_offset().unwrap();
        let xml = ubl::build_invoice_xml(&invoices[0], &store, None, &ctx, &InvoiceTemplate::default(), offset)
            .unwrap();
        println!("{xml}");
        println!("canonical hash: {}", ubl::canonical_invoice_hash(&xml).unwrap());
        return;
    };

    let mut config = ZatcaConfig::from_file(Path::new(&config_path)).unwrap();
    config.apply_env_overrides().unwrap();
    let signer = ProcessSigner::new(&config.signer);
    let repository = DemoRepository {
        store,
        states: Mutex::new(HashMap::new()),
    };
    let reporter = Reporter::new(config, repository, signer).unwrap();

    for item in reporter.report_batch(&mut invoices).await {
        match item {
            BatchItem::Reported {
                code,
                outcome: ReportOutcome::Reported { invoice_hash, archive_path, .. },
            } => println!("{code}: reported {invoice_hash}, archived at {}", archive_path.display()),
            BatchItem::Reported { code, .. } => println!("{code}: already reported"),
            BatchItem::Failed { code, error } => println!("{code}: {}", error.failure_message()),
            BatchItem::Skipped { code } => println!("{code}: skipped"),
        }
    }
}
