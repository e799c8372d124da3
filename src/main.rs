// ID document capture and validation from the command line.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use idcapture::{
    models::{CornerPoints, DocumentType, PersonalData},
    processing::Collaborators,
    utils::geometry::Point,
    CaptureConfig, CaptureError, DocumentScanner, Result,
};
use log::info;

#[derive(Parser, Debug)]
#[command(name = "idcapture")]
#[command(version, about = "Capture and validate Mexican INE cards and passports", long_about = None)]
struct Cli {
    /// JSON configuration file; defaults are used when omitted
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Detect, rectify, OCR and validate a photo of a document
    Scan {
        image: PathBuf,

        /// JSON file with the identity the document should carry
        #[arg(long)]
        expected: Option<PathBuf>,

        #[arg(long, value_enum)]
        document: Option<DocumentArg>,

        /// Manual corners as eight comma-separated numbers (x,y pairs)
        #[arg(long, value_delimiter = ',', allow_negative_numbers = true)]
        corners: Option<Vec<f32>>,

        /// Write the rectified document as PNG
        #[arg(long)]
        output_image: Option<PathBuf>,
    },
    /// Decode the MRZ in a text file and run the structural checks
    Mrz {
        text_file: PathBuf,

        #[arg(long, default_value_t = 0)]
        width: u32,

        #[arg(long, default_value_t = 0)]
        height: u32,

        #[arg(long, value_enum)]
        document: Option<DocumentArg>,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum DocumentArg {
    Ine,
    Passport,
}

impl From<DocumentArg> for DocumentType {
    fn from(arg: DocumentArg) -> Self {
        match arg {
            DocumentArg::Ine => DocumentType::Ine,
            DocumentArg::Passport => DocumentType::Passport,
        }
    }
}

fn parse_corners(values: &[f32]) -> Result<CornerPoints> {
    if values.len() != 8 {
        return Err(CaptureError::InvalidCorners(format!(
            "Expected 8 coordinates, got {}",
            values.len()
        )));
    }
    let points = [
        Point::new(values[0], values[1]),
        Point::new(values[2], values[3]),
        Point::new(values[4], values[5]),
        Point::new(values[6], values[7]),
    ];
    Ok(CornerPoints::from_unordered(points))
}

async fn scan(
    config: CaptureConfig,
    image_path: PathBuf,
    expected: Option<PathBuf>,
    document: Option<DocumentArg>,
    corners: Option<Vec<f32>>,
    output_image: Option<PathBuf>,
) -> Result<()> {
    let image = image::open(&image_path)?;
    info!("Loaded {:?} ({}x{})", image_path, image.width(), image.height());

    let expected: Option<PersonalData> = match expected {
        Some(path) => Some(serde_json::from_str(&std::fs::read_to_string(path)?)?),
        None => None,
    };

    let collaborators = Collaborators::unloaded();
    collaborators.load_native(&config).await?;
    let scanner = DocumentScanner::new(config);

    let corners = match corners {
        Some(values) => parse_corners(&values)?,
        None => {
            let detection = scanner.detect_corners(&image, &collaborators);
            info!("{} (confidence {:.2})", detection.message, detection.confidence);
            scanner.proposed_corners(&image, &detection)
        }
    };

    let extraction = scanner.extract(&image, &corners, &collaborators);
    let page = match (&extraction.image, extraction.success) {
        (Some(page), true) => page,
        _ => return Err(CaptureError::DetectionError(extraction.message.clone())),
    };

    if let (Some(path), Some(bytes)) = (output_image, extraction.encoded.as_ref()) {
        std::fs::write(&path, bytes)?;
        info!("Rectified document written to {:?}", path);
    }

    let result = scanner
        .scan_page(page, document.map(DocumentType::from), expected.as_ref(), &collaborators)
        .await?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

fn mrz(config: CaptureConfig, text_file: PathBuf, width: u32, height: u32, document: Option<DocumentArg>) -> Result<()> {
    let text = std::fs::read_to_string(&text_file)?;
    let scanner = DocumentScanner::new(config);

    let structure = scanner.validate_structure(&text, width, height, document.map(DocumentType::from));
    let decoded = scanner.try_decode_mrz(&text);

    let report = serde_json::json!({
        "mrz": decoded.as_ref().ok(),
        "error": decoded.as_ref().err().map(|e| e.to_string()),
        "structure": structure,
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    decoded.map(|_| ())
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => CaptureConfig::load(path),
        None => Ok(CaptureConfig::from_env()),
    };

    let outcome = match config {
        Ok(config) => match cli.command {
            Command::Scan {
                image,
                expected,
                document,
                corners,
                output_image,
            } => scan(config, image, expected, document, corners, output_image).await,
            Command::Mrz {
                text_file,
                width,
                height,
                document,
            } => mrz(config, text_file, width, height, document),
        },
        Err(e) => Err(e),
    };

    if let Err(err) = outcome {
        eprintln!("Error: {}", err);
        std::process::exit(1);
    }
}
