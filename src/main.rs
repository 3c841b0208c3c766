use std::env;
use std::path::PathBuf;
use std::process;

use anyhow::{bail, Result};
use tracing_subscriber::EnvFilter;

use site_audit::{process_audit, AuditOptions};

fn main() {
    // Recoverable issues land in the diagnostic log; progress goes to stdout
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = run() {
        eprintln!("❌ Audit failed: {:#}", err);
        process::exit(1);
    }
}

fn run() -> Result<()> {
    let args: Vec<String> = env::args().collect();

    let mut data_folder: Option<PathBuf> = None;
    let mut client_name = String::new();
    let mut options = AuditOptions::default();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--template" => {
                i += 1;
                match args.get(i) {
                    Some(path) => options.template = Some(PathBuf::from(path)),
                    None => bail!("--template needs a path"),
                }
            }
            "--out" => {
                i += 1;
                match args.get(i) {
                    Some(path) => options.output_dir = Some(PathBuf::from(path)),
                    None => bail!("--out needs a directory"),
                }
            }
            "--help" | "-h" => {
                print_usage();
                return Ok(());
            }
            arg => {
                if data_folder.is_none() {
                    data_folder = Some(PathBuf::from(arg));
                } else if client_name.is_empty() {
                    client_name = arg.to_string();
                } else {
                    bail!("Unexpected argument: {}", arg);
                }
            }
        }
        i += 1;
    }

    let Some(data_folder) = data_folder else {
        print_usage();
        bail!("No data folder given");
    };

    println!("🔍 Site Audit - crawl exports → technical audit report");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("\n📂 Data folder: {}", data_folder.display());
    if !client_name.is_empty() {
        println!("👤 Client: {}", client_name);
    }

    println!("\n⚙️  Running audit...");
    let outcome = process_audit(&data_folder, &client_name, &options)?;

    println!("✓ Audit values updated: {} rows", outcome.summary.rows_updated);
    println!(
        "  {} passed, {} failed, {} for manual review",
        outcome.summary.passed, outcome.summary.failed, outcome.summary.opportunities
    );
    if outcome.summary.unimplemented > 0 {
        println!(
            "  {} rule(s) have no calculation yet and are flagged in the report",
            outcome.summary.unimplemented
        );
    }
    if outcome.imported_files > 0 {
        println!(
            "✓ Imported {} spreadsheet file(s) as additional tabs",
            outcome.imported_files
        );
    }

    println!("\n🎉 Report saved to: {}", outcome.output_path.display());
    Ok(())
}

fn print_usage() {
    println!("Usage: site-audit <data-folder> [client-name] [--template <file>] [--out <dir>]");
    println!();
    println!("  <data-folder>      Folder with the crawl CSV exports; any other");
    println!("                     spreadsheets in it are merged into the report");
    println!("  [client-name]      Label used in the output file name");
    println!("  --template <file>  Report template workbook to fill");
    println!("  --out <dir>        Output directory (default: desktop)");
}
