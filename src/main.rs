use anyhow::{Result, bail};
use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt};

use pcd2bin::cli::{Cli, Commands};
use pcd2bin::{convert, inspect, schema, validate};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    match cli.command {
        Commands::Convert {
            pcd_dir,
            bin_dir,
            jobs,
            fail_fast,
            dry_run,
            no_progress,
            manifest,
            ..
        } => {
            let options = convert::ConvertOptions {
                input_dir: pcd_dir.into(),
                output_dir: bin_dir.into(),
                manifest_name: manifest,
                jobs: jobs.unwrap_or_else(convert::default_jobs),
                fail_fast,
                dry_run,
                show_progress: !no_progress,
            };
            let summary = convert::convert_dir(&options)?;
            if !summary.is_success() {
                for (path, err) in &summary.failures {
                    eprintln!("[pcd2bin][failed] {}: {}", path.display(), err);
                }
                bail!(
                    "{} of {} files failed to convert ({} not attempted)",
                    summary.failed,
                    summary.discovered,
                    summary.skipped
                );
            }
            Ok(())
        }
        Commands::Inspect { pcd, json } => inspect::inspect_pcd(&pcd, json),
        Commands::Validate { bin } => validate::validate_bin(&bin),
        Commands::Schema {} => schema::print_schema(),
    }
}
