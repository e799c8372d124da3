// Walks a capture session through its stages with the native collaborators,
// accepting the proposed corners for every page.

use std::path::PathBuf;

use clap::Parser;
use idcapture::{
    models::DocumentType, processing::Collaborators, CaptureConfig, DocumentScanner, PageSide, Result,
    ScannerSession, ScannerStage,
};
use log::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "session_demo")]
#[command(version, about = "Run a front/back capture session", long_about = None)]
struct Args {
    /// Front side photo
    front: PathBuf,

    /// Back side photo, used when the front is an INE card
    back: Option<PathBuf>,

    /// Treat the document as a passport instead of an INE card
    #[arg(long)]
    passport: bool,
}

async fn process_page(
    session: &mut ScannerSession,
    index: usize,
    scanner: &DocumentScanner,
    collaborators: &Collaborators,
) -> Result<()> {
    let corners = session.detect(index, scanner, collaborators)?;
    info!("Proposed corners: {:?}", corners);

    let extraction = session.confirm(index, scanner, collaborators)?;
    if !extraction.success {
        warn!("Extraction failed: {}", extraction.message);
        return Ok(());
    }

    let side = session.page(index)?.side();
    let result = session.validate(index, scanner, collaborators).await?;
    println!("{:?} page: {:?} - {}", side, result.outcome, result.message);
    Ok(())
}

async fn run(args: Args) -> Result<()> {
    let config = CaptureConfig::from_env();
    let collaborators = Collaborators::unloaded();
    collaborators.load_native(&config).await?;
    let scanner = DocumentScanner::new(config);

    let document_type = if args.passport {
        DocumentType::Passport
    } else {
        DocumentType::Ine
    };
    let mut session = ScannerSession::new(document_type, None);

    let front = session.add_page(image::open(&args.front)?, PageSide::Front)?;
    process_page(&mut session, front, &scanner, &collaborators).await?;

    if session.page(front)?.stage() == ScannerStage::WaitingForBack {
        match args.back {
            Some(path) => {
                let back = session.add_page(image::open(&path)?, PageSide::Back)?;
                process_page(&mut session, back, &scanner, &collaborators).await?;
            }
            None => warn!("Front page is waiting for its back side, none given"),
        }
    }

    for page in session.pages() {
        println!("{:?}: {:?}", page.side(), page.stage());
    }
    println!("Session complete: {}", session.is_complete());
    Ok(())
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(err) = run(Args::parse()).await {
        eprintln!("Error: {}", err);
        std::process::exit(1);
    }
}
