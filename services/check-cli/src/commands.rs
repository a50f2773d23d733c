use crate::infra::{parse_diff_tag, read_json_arg, DecisionChoice, FixtureVerifier, ScriptedPresenter};
use address_check::config::CheckConfig;
use address_check::error::AppError;
use address_check::{
    telemetry, AddressCheckEngine, AddressEntity, AddressSnapshot, CheckContext, CheckOptions,
    DiffTag, InMemoryFieldBinding, VerificationRequest, VerificationResponse, WordDiff,
};
use clap::Args;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

#[derive(Args, Debug)]
pub(crate) struct CheckArgs {
    /// Address as JSON (inline or a file path), e.g. '{"countryCode":"DE","locality":"Berlin"}'
    #[arg(long)]
    pub(crate) address: String,
    /// Recorded verifier responses keyed by fingerprint (inline JSON or a file path)
    #[arg(long)]
    pub(crate) responses: String,
    /// How the correction dialog is answered if the pass opens one
    #[arg(long, value_enum, default_value_t = DecisionChoice::Keep)]
    pub(crate) decision: DecisionChoice,
    /// Queue priority level (0 = background, 1 = interactive)
    #[arg(long, default_value_t = 0)]
    pub(crate) level: u32,
    /// Entity id used for the queue key and log lines
    #[arg(long, default_value = "cli")]
    pub(crate) entity: String,
}

#[derive(Args, Debug)]
pub(crate) struct FingerprintArgs {
    /// Address as JSON (inline or a file path)
    #[arg(long)]
    pub(crate) address: String,
    /// Also print the queue key for this entity id
    #[arg(long)]
    pub(crate) entity: Option<String>,
    /// Also print the request body sent to the verifier
    #[arg(long)]
    pub(crate) request: bool,
}

#[derive(Args, Debug)]
pub(crate) struct DiffArgs {
    #[arg(long)]
    pub(crate) old: String,
    #[arg(long)]
    pub(crate) new: String,
    /// Only print segments with these tags
    #[arg(long, value_delimiter = ',', value_parser = parse_diff_tag)]
    pub(crate) only: Vec<DiffTag>,
}

fn load_address(raw: &str) -> Result<AddressSnapshot, AppError> {
    let text = read_json_arg(raw)?;
    Ok(serde_json::from_str(&text)?)
}

pub(crate) async fn run_check(args: CheckArgs) -> Result<(), AppError> {
    let config = CheckConfig::load()?;
    telemetry::init(&config.telemetry)?;

    let address = load_address(&args.address)?;
    let responses: HashMap<String, VerificationResponse> =
        serde_json::from_str(&read_json_arg(&args.responses)?)?;
    info!(
        environment = ?config.environment,
        recorded = responses.len(),
        "running address check from fixtures"
    );

    let context = CheckContext::new(
        config.engine,
        Arc::new(FixtureVerifier::new(responses)),
        Arc::new(ScriptedPresenter::new(args.decision)),
    )?;
    let engine = AddressCheckEngine::new(context);

    let binding = Arc::new(InMemoryFieldBinding::from_snapshot(&address));
    let entity = Arc::new(AddressEntity::new(args.entity, binding));
    let result = engine
        .check_address(&entity, CheckOptions { level: args.level })
        .await;

    let output = json!({
        "result": result,
        "state": entity.state(),
        "validity": entity.validity().get(),
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

pub(crate) fn run_fingerprint(args: FingerprintArgs) -> Result<(), AppError> {
    let address = load_address(&args.address)?;
    let fingerprint = address.fingerprint();
    println!("{fingerprint}");
    if let Some(entity) = args.entity {
        println!("{}", fingerprint.queue_key(&entity));
    }
    if args.request {
        let request = VerificationRequest::from_snapshot(&address);
        println!("{}", serde_json::to_string_pretty(&request)?);
    }
    Ok(())
}

pub(crate) fn run_diff(args: DiffArgs) -> Result<(), AppError> {
    let diff = WordDiff::between(&args.old, &args.new);
    let tags = if args.only.is_empty() {
        DiffTag::all().to_vec()
    } else {
        args.only
    };

    for segment in diff.filtered(&tags) {
        let marker = match segment.tag {
            DiffTag::Unchanged => ' ',
            DiffTag::Added => '+',
            DiffTag::Removed => '-',
        };
        println!("{marker} {:?}", segment.text);
    }
    Ok(())
}
