use clap::Parser;
use miette::{IntoDiagnostic, Result};
use payflow::application::gateway::{GatewayConfig, PaymentGateway};
use payflow::application::reconciler::NotificationReconciler;
use payflow::domain::compose::{ComposerRegistry, Order};
use payflow::domain::money::{Amount, Money};
use payflow::domain::notification::{EventCode, Notification};
use payflow::domain::payment::Payment;
use payflow::domain::ports::PaymentStoreRef;
use payflow::error::PaymentError;
use payflow::infrastructure::hmac::HmacSha256Verifier;
use payflow::infrastructure::in_memory::{InMemoryPaymentStore, LogEventSink};
use payflow::infrastructure::sandbox::SandboxProcessor;
use payflow::interfaces::csv::operation_reader::{OperationReader, OperationRecord, OperationType};
use payflow::interfaces::csv::payment_writer::PaymentWriter;
use std::fs::File;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Input operations CSV file
    input: PathBuf,

    /// Gateway configuration JSON file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[cfg(feature = "storage-rocksdb")]
    #[arg(long)]
    db_path: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    let config: GatewayConfig = match &cli.config {
        Some(path) => {
            let file = File::open(path).into_diagnostic()?;
            serde_json::from_reader(file).into_diagnostic()?
        }
        None => GatewayConfig::default(),
    };

    let store = open_store(&cli)?;
    let verifier = HmacSha256Verifier::from_hex_key(&config.hmac_key).into_diagnostic()?;
    let events = Arc::new(LogEventSink);

    let gateway = PaymentGateway::new(
        store.clone(),
        Arc::new(SandboxProcessor::new()),
        ComposerRegistry::with_defaults(),
        events.clone(),
        config.clone(),
    );
    let reconciler = NotificationReconciler::new(store, Arc::new(verifier), events);

    let file = File::open(&cli.input).into_diagnostic()?;
    let reader = OperationReader::new(file);
    for record in reader.operations() {
        match record {
            Ok(record) => {
                if let Err(e) = run_operation(&gateway, &reconciler, record, &config).await {
                    eprintln!("Error processing operation: {}", e);
                }
            }
            Err(e) => {
                eprintln!("Error reading operation: {}", e);
            }
        }
    }

    let payments = gateway.all_payments().await.into_diagnostic()?;
    let stdout = io::stdout();
    PaymentWriter::new(stdout.lock())
        .write_payments(payments)
        .into_diagnostic()?;

    Ok(())
}

fn open_store(cli: &Cli) -> Result<PaymentStoreRef> {
    #[cfg(feature = "storage-rocksdb")]
    if let Some(db_path) = &cli.db_path {
        let store = payflow::infrastructure::rocksdb::RocksDBStore::open(db_path)
            .into_diagnostic()?;
        return Ok(Arc::new(store));
    }
    let _ = cli;
    Ok(Arc::new(InMemoryPaymentStore::new()))
}

async fn run_operation(
    gateway: &PaymentGateway,
    reconciler: &NotificationReconciler,
    record: OperationRecord,
    config: &GatewayConfig,
) -> payflow::error::Result<()> {
    match record.op {
        OperationType::Authorize => {
            let money = required_money(&record)?;
            let capture = match record.arg.as_deref().unwrap_or("") {
                "capture" => true,
                "auth" => false,
                "" => config.capture_on_authorize,
                other => {
                    return Err(PaymentError::InvalidOrder(format!(
                        "unknown authorize argument '{other}'"
                    )));
                }
            };
            let payment = Payment::new(&record.payment, money);
            let order = synthetic_order(&record.payment);
            gateway.authorize(payment, &order, capture).await?;
        }
        OperationType::Capture => {
            gateway
                .capture(&record.payment, optional_amount(&record)?)
                .await?;
        }
        OperationType::Void => {
            gateway.void(&record.payment).await?;
        }
        OperationType::Refund => {
            gateway
                .refund(&record.payment, optional_amount(&record)?)
                .await?;
        }
        OperationType::Notify => {
            let notification = parse_notification(&record)?;
            reconciler.apply(&notification).await?;
        }
    }
    Ok(())
}

fn required_money(record: &OperationRecord) -> payflow::error::Result<Money> {
    let (Some(amount), Some(currency)) = (record.amount, record.currency.as_deref()) else {
        return Err(PaymentError::InvalidAmount(format!(
            "operation on '{}' requires both amount and currency",
            record.payment
        )));
    };
    Ok(Money::new(amount, currency.parse()?))
}

fn optional_amount(record: &OperationRecord) -> payflow::error::Result<Option<Amount>> {
    match record.amount {
        Some(_) => Ok(Some(Amount::new(required_money(record)?)?)),
        None => Ok(None),
    }
}

/// `notify` rows encode the notification as `<event_code>:<success>:<psp>`.
fn parse_notification(record: &OperationRecord) -> payflow::error::Result<Notification> {
    let arg = record.arg.as_deref().unwrap_or("");
    let mut parts = arg.splitn(3, ':');
    let (Some(code), Some(success), Some(psp_reference)) =
        (parts.next(), parts.next(), parts.next())
    else {
        return Err(PaymentError::InvalidOrder(format!(
            "notify argument '{arg}' must be <event_code>:<success>:<psp_reference>"
        )));
    };
    let success: bool = success.parse().map_err(|_| {
        PaymentError::InvalidOrder(format!("notify success flag '{success}' must be a boolean"))
    })?;
    let amount = match record.amount {
        Some(_) => Some(required_money(record)?),
        None => None,
    };
    Ok(Notification {
        psp_reference: psp_reference.to_string(),
        merchant_reference: record.payment.clone(),
        event_code: EventCode::parse(code),
        success,
        amount,
    })
}

fn synthetic_order(payment_id: &str) -> Order {
    Order {
        id: payment_id.to_string(),
        shopper_reference: format!("shopper-{payment_id}"),
        shopper_email: format!("{payment_id}@example.com"),
        ..Default::default()
    }
}
