//! PDF Image Extractor CLI
//!
//! Command-line interface for extracting images from PDFs.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use pdf_image_extract::{extract_path, ExtractOptions, DEFAULT_OUTPUT_DIR_NAME};

/// Extract embedded images from PDFs without recompression
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Directory of PDFs, or path of a single PDF (prompted for if omitted)
    path: Option<PathBuf>,

    /// Name of the folder created next to each PDF
    #[arg(short, long, default_value = DEFAULT_OUTPUT_DIR_NAME)]
    output_dir_name: String,

    /// Decode images but do not write any files
    #[arg(short = 'n', long)]
    dry_run: bool,

    /// Verbose output (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

/// Ask for a path on stdin until one that exists is given
fn prompt_for_path() -> anyhow::Result<PathBuf> {
    let stdin = io::stdin();
    loop {
        print!("\nEnter directory of PDFs, or path of single PDF: ");
        io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            anyhow::bail!("no path given");
        }

        let input = line.trim();
        if !input.is_empty() {
            let path = PathBuf::from(input);
            if path.exists() {
                return Ok(path);
            }
        }
        println!("File or directory does not exist. Try again. (ctrl-c to quit)");
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let default_level = match args.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    let path = match args.path {
        Some(path) => path,
        None => prompt_for_path()?,
    };

    let options = ExtractOptions {
        output_dir_name: args.output_dir_name,
        dry_run: args.dry_run,
    };

    let summary = extract_path(&path, &options)
        .with_context(|| format!("Failed to extract images from {}", path.display()))?;

    println!(
        "\nDone! {} document(s), {} page(s), {} image(s): {} written, {} skipped, {} unrecognized",
        summary.documents,
        summary.pages,
        summary.images,
        summary.written,
        summary.skipped,
        summary.unrecognized
    );
    if summary.planned > 0 {
        println!("{} image(s) would be written (dry run)", summary.planned);
    }
    if summary.failed_documents > 0 {
        println!("{} document(s) could not be opened", summary.failed_documents);
    }

    Ok(())
}
