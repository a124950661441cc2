//! SafeReport command line client.
//!
//! # Commands
//!
//! - `safereport submit` - Submit an incident report, then show nearby services
//! - `safereport nearby` - Show the nearest police station and hospital
//! - `safereport contacts` - Print the emergency contact directory
//!
//! Configuration is read from `SAFEREPORT_*` environment variables; see
//! [`safereport::config::Config`].

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, bail};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use safereport::cache::ServiceCache;
use safereport::client::{ReportClient, ReportSession};
use safereport::config::{Config, valid_coordinates};
use safereport::contacts;
use safereport::error::PositionError;
use safereport::geolocation::{FailingPositionSource, FixedPositionSource, PositionSource};
use safereport::locator::{Locator, LocatorSettings, LocatorView};
use safereport::model::{
    Category, Coordinates, DraftField, EvidenceFile, Gender, ServiceKind, SubmissionResult,
};
use safereport::routing::RouteClient;
use safereport::services::{NearestServicesClient, ServiceLookup};
use safereport::wizard::{WizardEvent, WizardPhase};

#[derive(Parser)]
#[command(name = "safereport", version, about = "Report an incident and find help nearby")]
struct Cli {
    /// Print screens as JSON instead of text.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Submit an incident report.
    Submit(SubmitArgs),
    /// Show the nearest police station and hospital.
    Nearby {
        #[command(flatten)]
        location: LocationArgs,
    },
    /// Print the emergency contact directory.
    Contacts,
}

#[derive(Args)]
struct SubmitArgs {
    /// Category of incident, e.g. "Sexual Harassment".
    #[arg(long, default_value = "")]
    category: String,

    /// Description of what happened.
    #[arg(long, default_value = "")]
    description: String,

    /// Gender of the affected person (female, male, other).
    #[arg(long, value_parser = parse_gender, default_value = "")]
    gender: Gender,

    /// Where the incident happened.
    #[arg(long, default_value = "")]
    location: String,

    /// Any details about the perpetrator.
    #[arg(long, default_value = "")]
    perpetrator_details: String,

    /// Submit without contact details.
    #[arg(long)]
    anonymous: bool,

    #[arg(long, default_value = "")]
    contact_phone: String,

    #[arg(long, default_value = "")]
    contact_email: String,

    /// A JPG, PNG or PDF file up to 10MB.
    #[arg(long)]
    evidence: Option<PathBuf>,

    #[command(flatten)]
    position: LocationArgs,
}

#[derive(Args)]
struct LocationArgs {
    /// Current latitude. Without it the default location is used.
    #[arg(long, requires = "lng", allow_negative_numbers = true)]
    lat: Option<f64>,

    /// Current longitude.
    #[arg(long, requires = "lat", allow_negative_numbers = true)]
    lng: Option<f64>,

    /// Also fetch directions to this service.
    #[arg(long, value_enum)]
    route_to: Option<RouteTarget>,
}

#[derive(Clone, Copy, ValueEnum)]
enum RouteTarget {
    Police,
    Hospital,
}

impl From<RouteTarget> for ServiceKind {
    fn from(target: RouteTarget) -> Self {
        match target {
            RouteTarget::Police => ServiceKind::Police,
            RouteTarget::Hospital => ServiceKind::Hospital,
        }
    }
}

fn parse_gender(value: &str) -> Result<Gender, String> {
    Gender::parse(value).ok_or_else(|| format!("unknown gender '{value}'"))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // PRIVACY NOTE: Default log level is INFO; report contents are never logged at any level
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env().add_directive("safereport=info".parse()?))
        .init();

    let cli = Cli::parse();
    let config = Config::from_env();
    info!(api_url = %config.api_url, "Starting SafeReport");

    match cli.command {
        Command::Submit(args) => submit(&config, args, cli.json).await,
        Command::Nearby { location } => {
            show_nearby(&config, &location, None, cli.json).await
        }
        Command::Contacts => {
            print_contacts(cli.json)?;
            Ok(())
        }
    }
}

async fn submit(config: &Config, args: SubmitArgs, json: bool) -> anyhow::Result<()> {
    let category = if args.category.trim().is_empty() {
        String::new()
    } else {
        Category::parse(&args.category)
            .map(|c| c.label().to_string())
            .with_context(|| {
                let known: Vec<&str> = Category::ALL.iter().map(Category::label).collect();
                format!("unknown category; expected one of: {}", known.join(", "))
            })?
    };

    let client = ReportClient::new(&config.api_url, config.http_timeout)?;
    let mut session = ReportSession::new(client);

    // Step 1: incident details.
    session.set(DraftField::Category(category)).await;
    session.set(DraftField::Description(args.description)).await;
    session.set(DraftField::Gender(args.gender)).await;
    session.set(DraftField::Location(args.location)).await;
    session.advance().await;

    // Step 2: additional information.
    session
        .set(DraftField::PerpetratorDetails(args.perpetrator_details))
        .await;
    session.set(DraftField::Anonymous(args.anonymous)).await;
    session.set(DraftField::ContactPhone(args.contact_phone)).await;
    session.set(DraftField::ContactEmail(args.contact_email)).await;

    if let Some(path) = &args.evidence {
        let file = EvidenceFile::from_path(path).await?;
        let wizard = session.dispatch(WizardEvent::EvidenceSelected(file)).await;
        if let Some(error) = &wizard.attachment_error {
            bail!("{error}");
        }
    }

    let wizard = session.submit().await;
    match (wizard.phase, &wizard.notice) {
        (WizardPhase::Submitted, _) => {
            println!("Report Submitted");
            println!("Thank you for your report. It has been submitted securely.");
            if let Some(message) = wizard.confirmation_message() {
                println!("{message}");
            }
            println!();
        }
        (_, Some(notice)) => bail!("{}: {}", notice.title, notice.message),
        (phase, None) => bail!("report was not submitted (stopped at {phase:?})"),
    }

    let submission = wizard.submission.clone();
    show_nearby(config, &args.position, submission.as_ref(), json).await
}

async fn show_nearby(
    config: &Config,
    location: &LocationArgs,
    submission: Option<&SubmissionResult>,
    json: bool,
) -> anyhow::Result<()> {
    let route_to = location.route_to.map(ServiceKind::from);
    match (location.lat, location.lng) {
        (Some(lat), Some(lng)) => {
            if !valid_coordinates(lat, lng) {
                bail!("coordinates out of range: {lat}, {lng}");
            }
            let source = Arc::new(FixedPositionSource(Coordinates::new(lat, lng)));
            run_locator(config, source, submission, route_to, json).await
        }
        _ => {
            let source = Arc::new(FailingPositionSource(PositionError::PositionUnavailable));
            run_locator(config, source, submission, route_to, json).await
        }
    }
}

async fn run_locator<S: PositionSource>(
    config: &Config,
    source: Arc<S>,
    submission: Option<&SubmissionResult>,
    route_to: Option<ServiceKind>,
    json: bool,
) -> anyhow::Result<()> {
    let http = reqwest::Client::builder()
        .timeout(config.http_timeout)
        .build()?;
    let lookup = ServiceLookup::new(
        NearestServicesClient::with_client(http.clone(), &config.api_url),
        ServiceCache::new(config.cache_ttl),
    );
    let mut locator = Locator::new(LocatorSettings::from(config), source, lookup)
        .with_routes(RouteClient::with_client(http, &config.routing_url));

    match submission {
        Some(submission) => locator.activate(submission).await,
        None => locator.locate().await,
    }

    if let Some(kind) = route_to {
        locator.toggle_route(kind).await;
    }

    let view = locator.view();
    locator.shutdown();
    print_view(&view, json)
}

fn print_view(view: &LocatorView, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(view)?);
        return Ok(());
    }

    println!("Emergency Services Near You");
    println!("===========================");

    if let Some(notice) = &view.location_notice {
        println!("! {notice}");
    }
    if let Some(label) = view.retry_label {
        println!("  ({label})");
    }
    if let Some(error) = &view.services_error {
        println!("! {error}");
    }

    for card in &view.cards {
        println!();
        println!("{}", card.title);
        match (&card.name, card.empty_message) {
            (Some(name), _) => {
                println!("  {name}");
                if let Some(distance) = &card.distance {
                    println!("  {distance}");
                }
                if let Some(phone) = &card.phone {
                    println!("  Phone: {phone}");
                }
            }
            (None, Some(message)) => println!("  {message}"),
            (None, None) => {}
        }
    }

    if let Some(map) = &view.map {
        println!();
        println!(
            "Map centre: {:.4}, {:.4} (tile {})",
            map.center.lat,
            map.center.lng,
            map.center_tile_url()
        );
        if let Some(overlay) = &map.route {
            println!(
                "Directions to {}: {:.1} km, about {} min",
                overlay.to.label(),
                overlay.route.distance_m / 1000.0,
                overlay.route.duration_minutes()
            );
            println!("  {}", overlay.directions_link);
        }
    }
    if let Some(error) = &view.route_error {
        println!("! {error}");
    }

    println!();
    println!("Emergency contacts");
    for contact in &view.contacts {
        let marker = if contact.urgent { "*" } else { " " };
        println!("{marker} {:<38} {}", contact.name, contact.number);
    }
    Ok(())
}

fn print_contacts(json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(&contacts::EMERGENCY_CONTACTS)?);
        return Ok(());
    }

    println!("If you're in immediate danger, please contact one of these emergency numbers:");
    for contact in contacts::urgent() {
        println!("  {:<38} {}", contact.name, contact.number);
    }
    println!();
    println!("Other contacts:");
    for contact in contacts::other() {
        println!("  {:<38} {}", contact.name, contact.number);
    }
    Ok(())
}
