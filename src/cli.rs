use clap::{ArgAction, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "pcd2bin", about = "Convert PCD point clouds into flat x,y,z,intensity .bin files", version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Convert every .pcd file under a directory into .bin files plus a manifest
    Convert {
        /// Directory scanned recursively for .pcd files
        pcd_dir: String,
        /// Output directory (created if missing)
        bin_dir: String,
        /// Number of parallel conversion workers (defaults to the number of CPUs)
        #[arg(long = "jobs", short = 'j')]
        jobs: Option<usize>,
        /// Stop at the first file that fails instead of skipping it
        #[arg(long = "fail-fast")]
        fail_fast: bool,
        /// Dry-run: show the plan but do not write anything
        #[arg(long = "dry-run")]
        dry_run: bool,
        /// Show progress bar (enabled by default)
        #[arg(long = "progress", action = ArgAction::SetTrue, overrides_with = "no_progress")]
        progress: bool,
        /// Hide the progress bar
        #[arg(long = "no-progress", action = ArgAction::SetTrue, overrides_with = "progress")]
        no_progress: bool,
        /// Manifest file name inside the output directory
        #[arg(long = "manifest", default_value = crate::manifest::DEFAULT_MANIFEST_NAME)]
        manifest: String,
    },

    /// Print the header of a .pcd file
    Inspect {
        /// Path to the .pcd file
        pcd: String,
        /// Print the header as JSON
        #[arg(long = "json")]
        json: bool,
    },

    /// Check that a .bin file is a whole number of records
    Validate { bin: String },

    /// Show the .bin record layout
    Schema {},
}
