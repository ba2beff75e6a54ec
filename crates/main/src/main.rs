use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use log::info;
use variance_report::model::VisualRef;
use variance_report::{
    ImageFileVisual, ReportBuilder, ReportConfig, ReportContext, ReportData, ReportError,
};

/// Builds payroll variance reports from exported dashboard data.
///
/// Logging follows `RUST_LOG` and defaults to `info`.
#[derive(Parser)]
#[command(author, version, about = "Render payroll variance reports to PDF")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render the report PDF into the output directory.
    #[command(name = "render")]
    Render(RenderArgs),

    /// Print the laid-out text of every page without writing a PDF.
    #[command(name = "inspect", aliases = ["dry-run"])]
    Inspect(InputArgs),
}

#[derive(Args)]
struct InputArgs {
    /// JSON file with the period, summary and table rows.
    #[arg(long)]
    data: PathBuf,

    /// Optional JSON configuration; missing keys keep their defaults.
    #[arg(long)]
    config: Option<PathBuf>,

    /// A rendered chart to embed, as `Title=path/to/image.png`. Repeatable;
    /// charts appear in the order given.
    #[arg(long = "visual", value_parser = parse_visual)]
    visuals: Vec<(String, PathBuf)>,

    /// Footer timestamp to print instead of the current time.
    #[arg(long)]
    timestamp: Option<String>,
}

#[derive(Args)]
struct RenderArgs {
    #[command(flatten)]
    input: InputArgs,

    /// Directory the PDF is written to.
    #[arg(long, default_value = ".")]
    output: PathBuf,

    /// Add a PDF outline with one entry per section.
    #[cfg(feature = "bookmarks")]
    #[arg(long)]
    bookmarks: bool,
}

fn parse_visual(value: &str) -> Result<(String, PathBuf), String> {
    let (title, path) = value
        .split_once('=')
        .ok_or_else(|| format!("expected TITLE=PATH, got \"{value}\""))?;
    if title.trim().is_empty() {
        return Err("visual title must not be empty".to_string());
    }
    Ok((title.trim().to_string(), PathBuf::from(path)))
}

fn load(input: &InputArgs) -> Result<(ReportBuilder, ReportContext), ReportError> {
    let config = match &input.config {
        Some(path) => ReportConfig::from_json_file(path)?,
        None => ReportConfig::default(),
    };

    let data = ReportData::from_json(&std::fs::read_to_string(&input.data)?)?;
    let visuals = input
        .visuals
        .iter()
        .map(|(title, path)| {
            let name = path
                .file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
                .unwrap_or_else(|| title.clone());
            VisualRef::new(title.as_str(), Arc::new(ImageFileVisual::new(name, path.as_path())))
        })
        .collect();
    let context = ReportContext::from_data(data, visuals)?;

    let mut builder = ReportBuilder::new().with_config(config);
    if let Some(timestamp) = &input.timestamp {
        builder = builder.with_timestamp(timestamp.as_str());
    }
    Ok((builder, context))
}

async fn run(command: Commands) -> Result<(), ReportError> {
    match command {
        Commands::Render(args) => {
            let (builder, context) = load(&args.input)?;
            #[cfg(feature = "bookmarks")]
            let builder = builder.with_bookmarks(args.bookmarks);
            let report = builder.render(&context).await?;
            let path = report.write_to_dir(&args.output)?;
            info!("{} page(s) written to {}", report.page_count, path.display());
            println!("{}", path.display());
        }
        Commands::Inspect(input) => {
            let (builder, context) = load(&input)?;
            let document = builder.compose(&context).await?;
            for page in document.pages() {
                println!("--- page {} of {} ---", page.index() + 1, document.page_count());
                println!("{}", page.text());
            }
        }
    }
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    if let Err(err) = run(cli.command).await {
        eprintln!("Error: {}", err);
        print_error_sources(&err);
        std::process::exit(1);
    }
}

fn print_error_sources(mut error: &(dyn Error + 'static)) {
    while let Some(source) = error.source() {
        eprintln!("  caused by: {}", source);
        error = source;
    }
}
