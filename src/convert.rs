use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::{BTreeMap, HashMap};
use std::ffi::OsString;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;
use walkdir::WalkDir;

use crate::encoder::{self, RECORD_FIELDS};
use crate::error::Error;
use crate::manifest::{CsvManifest, ManifestRow, ManifestSink};
use crate::pcd;

/// Extension of the files picked up from the input directory.
pub const INPUT_EXTENSION: &str = "pcd";
/// Extension given to every output file.
pub const OUTPUT_EXTENSION: &str = "bin";

/// Options for converting a directory of PCD files
#[derive(Debug, Clone)]
pub struct ConvertOptions {
    /// Directory scanned recursively for `.pcd` files
    pub input_dir: PathBuf,
    /// Directory receiving the `.bin` files and the manifest
    pub output_dir: PathBuf,
    /// File name of the manifest inside `output_dir`
    pub manifest_name: String,
    /// Number of conversion workers
    pub jobs: usize,
    /// Stop scheduling new files after the first failure
    pub fail_fast: bool,
    /// Dry run: print the plan but write nothing
    pub dry_run: bool,
    /// Show progress bar
    pub show_progress: bool,
}

impl ConvertOptions {
    pub fn new(input_dir: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        ConvertOptions {
            input_dir: input_dir.into(),
            output_dir: output_dir.into(),
            manifest_name: crate::manifest::DEFAULT_MANIFEST_NAME.to_string(),
            jobs: default_jobs(),
            fail_fast: false,
            dry_run: false,
            show_progress: false,
        }
    }
}

pub fn default_jobs() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// One planned conversion.
#[derive(Debug, Clone)]
pub struct Job {
    pub input: PathBuf,
    pub output: PathBuf,
    pub row: ManifestRow,
}

/// What happened to one input file.
#[derive(Debug)]
pub enum Outcome {
    Converted { points: usize },
    Failed(Error),
    /// Not attempted because an earlier file failed in fail-fast mode.
    Skipped,
}

#[derive(Debug, Default)]
pub struct ConvertSummary {
    pub discovered: usize,
    pub converted: usize,
    pub failed: usize,
    pub skipped: usize,
    pub points: u64,
    /// Input path and error message for every failed file, in input order
    pub failures: Vec<(PathBuf, String)>,
    pub manifest_path: Option<PathBuf>,
}

impl ConvertSummary {
    pub fn is_success(&self) -> bool {
        self.failed == 0 && self.skipped == 0
    }
}

/// Recursively collect `.pcd` files under `dir`, sorted by full path.
pub fn discover_inputs(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        anyhow::bail!("input directory does not exist: {}", dir.display());
    }
    let mut files = Vec::new();
    for entry in WalkDir::new(dir).follow_links(true) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(error = %e, "skipping unreadable directory entry");
                continue;
            }
        };
        if entry.file_type().is_file()
            && entry.path().extension().is_some_and(|ext| ext == INPUT_EXTENSION)
        {
            files.push(entry.into_path());
        }
    }
    // byte-wise on the whole path, not component-wise
    files.sort_by(|a, b| a.as_os_str().cmp(b.as_os_str()));
    Ok(files)
}

/// Output file name for `input`: its base name without extension plus `.bin`.
pub fn output_name(input: &Path) -> Option<OsString> {
    let mut name = input.file_stem()?.to_os_string();
    name.push(".");
    name.push(OUTPUT_EXTENSION);
    Some(name)
}

/// Pair every input with its output path. Inputs whose output name is already
/// taken by an earlier input come back as failures instead of jobs.
pub fn plan(inputs: &[PathBuf], output_dir: &Path) -> Vec<std::result::Result<Job, Error>> {
    let mut taken: HashMap<OsString, &Path> = HashMap::new();
    inputs
        .iter()
        .map(|input| -> std::result::Result<Job, Error> {
            let name = output_name(input).ok_or_else(|| {
                Error::io(input, io::Error::new(io::ErrorKind::InvalidInput, "input has no file name"))
            })?;
            if let Some(first) = taken.get(&name) {
                return Err(Error::io(
                    input,
                    io::Error::new(
                        io::ErrorKind::AlreadyExists,
                        format!(
                            "output name {} collides with {}",
                            Path::new(&name).display(),
                            first.display()
                        ),
                    ),
                ));
            }
            taken.insert(name.clone(), input.as_path());
            let row = ManifestRow {
                pcd_file_name: input
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default(),
                bin_file_name: name.to_string_lossy().into_owned(),
            };
            Ok(Job {
                input: input.clone(),
                output: output_dir.join(&name),
                row,
            })
        })
        .collect()
}

/// Convert one PCD file to one `.bin` file. Returns the number of points.
pub fn convert_file(input: &Path, output: &Path) -> crate::Result<usize> {
    let cloud = pcd::load_requiring(input, &RECORD_FIELDS)?;
    let buf = encoder::encode(&cloud)?;
    encoder::write(&buf, output)?;
    Ok(cloud.len())
}

/// Run the planned jobs on `workers` threads and hand every outcome to
/// `on_outcome` in input order, whatever order the workers finish in.
///
/// With `fail_fast`, every job after the first failure in input order is
/// reported as [`Outcome::Skipped`]. Jobs before it still run, including when
/// the failure was found while planning.
pub fn run_jobs<F>(
    planned: Vec<std::result::Result<Job, Error>>,
    workers: usize,
    fail_fast: bool,
    mut on_outcome: F,
) -> Result<()>
where
    F: FnMut(usize, Option<&Job>, Outcome) -> Result<()>,
{
    let total = planned.len();
    let mut jobs: Vec<Option<Job>> = Vec::with_capacity(total);
    let mut pending: BTreeMap<usize, Outcome> = BTreeMap::new();

    let (job_tx, job_rx) = flume::unbounded::<(usize, Job)>();
    let (result_tx, result_rx) = flume::unbounded::<(usize, Outcome)>();

    for (index, entry) in planned.into_iter().enumerate() {
        match entry {
            Ok(job) => {
                job_tx.send((index, job.clone()))?;
                jobs.push(Some(job));
            }
            Err(e) => {
                pending.insert(index, Outcome::Failed(e));
                jobs.push(None);
            }
        }
    }
    drop(job_tx);

    // index of the earliest failure; jobs after it are skipped
    let first_failure = AtomicUsize::new(match pending.keys().next() {
        Some(&index) if fail_fast => index,
        _ => usize::MAX,
    });
    let mut next = 0usize;

    std::thread::scope(|scope| -> Result<()> {
        for id in 0..workers.max(1) {
            let rx = job_rx.clone();
            let tx = result_tx.clone();
            let first_failure = &first_failure;
            scope.spawn(move || conversion_worker(id, rx, tx, first_failure, fail_fast));
        }
        drop(result_tx);

        let mut emit_ready = |pending: &mut BTreeMap<usize, Outcome>, next: &mut usize| -> Result<()> {
            while let Some(outcome) = pending.remove(&*next) {
                on_outcome(*next, jobs[*next].as_ref(), outcome)?;
                *next += 1;
            }
            Ok(())
        };

        let mut delivered = emit_ready(&mut pending, &mut next);
        if delivered.is_ok() {
            for (index, outcome) in result_rx.iter() {
                pending.insert(index, outcome);
                delivered = emit_ready(&mut pending, &mut next);
                if delivered.is_err() {
                    break;
                }
            }
        }
        if delivered.is_err() {
            // the batch is lost, so leave queued files untouched
            let abandoned = job_rx.drain().count();
            tracing::debug!(abandoned, "dropped queued conversions");
        }
        delivered
    })?;

    debug_assert!(pending.is_empty() && next == total);
    Ok(())
}

fn conversion_worker(
    _id: usize,
    rx: flume::Receiver<(usize, Job)>,
    tx: flume::Sender<(usize, Outcome)>,
    first_failure: &AtomicUsize,
    fail_fast: bool,
) {
    while let Ok((index, job)) = rx.recv() {
        let outcome = if index > first_failure.load(Ordering::Relaxed) {
            Outcome::Skipped
        } else {
            match convert_file(&job.input, &job.output) {
                Ok(points) => Outcome::Converted { points },
                Err(e) => {
                    if fail_fast {
                        first_failure.fetch_min(index, Ordering::Relaxed);
                    }
                    Outcome::Failed(e)
                }
            }
        };
        if tx.send((index, outcome)).is_err() {
            break;
        }
    }
}

/// Convert every `.pcd` file under `options.input_dir`.
///
/// Per-file failures are logged and counted in the returned summary; only
/// problems affecting the whole run (missing input directory, output directory
/// that cannot be created, manifest write failure) return `Err`.
///
/// # Example
///
/// ```rust,no_run
/// use pcd2bin::{convert_dir, ConvertOptions};
///
/// let options = ConvertOptions::new("lidar_pcd", "lidar_bin");
/// let summary = convert_dir(&options)?;
/// println!("{} files converted", summary.converted);
/// # Ok::<(), anyhow::Error>(())
/// ```
pub fn convert_dir(options: &ConvertOptions) -> Result<ConvertSummary> {
    if options.jobs == 0 {
        anyhow::bail!("jobs must be >= 1");
    }
    check_manifest_name(&options.manifest_name)?;
    let started = Instant::now();

    let inputs = discover_inputs(&options.input_dir)?;
    tracing::info!(
        files = inputs.len(),
        dir = %options.input_dir.display(),
        "found point clouds"
    );

    let planned = plan(&inputs, &options.output_dir);
    let mut summary = ConvertSummary {
        discovered: inputs.len(),
        ..Default::default()
    };

    if options.dry_run {
        for entry in &planned {
            match entry {
                Ok(job) => println!("{} -> {}", job.input.display(), job.output.display()),
                Err(e) => println!("[skip] {e}"),
            }
        }
        println!(
            "Plan: {} files → {} (manifest: {})",
            inputs.len(),
            options.output_dir.display(),
            options.output_dir.join(&options.manifest_name).display()
        );
        return Ok(summary);
    }

    std::fs::create_dir_all(&options.output_dir).with_context(|| {
        format!(
            "failed to create output directory: {}",
            options.output_dir.display()
        )
    })?;
    let mut manifest = CsvManifest::create(options.output_dir.join(&options.manifest_name))
        .context("failed to create manifest")?;

    let pb = if options.show_progress {
        let pb = ProgressBar::new(inputs.len() as u64);
        pb.set_style(
            ProgressStyle::with_template("{bar:40} {pos}/{len} files {wide_msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        Some(pb)
    } else {
        None
    };

    run_jobs(planned, options.jobs, options.fail_fast, |_, job, outcome| {
        let input = job.map(|j| j.input.as_path());
        match outcome {
            Outcome::Converted { points } => {
                // a converted outcome always comes from a job
                if let Some(job) = job {
                    tracing::debug!(
                        input = %job.input.display(),
                        output = %job.output.display(),
                        points,
                        "converted"
                    );
                    manifest.push(&job.row)?;
                    if let Some(pb) = &pb {
                        pb.set_message(job.row.bin_file_name.clone());
                    }
                }
                summary.converted += 1;
                summary.points += points as u64;
            }
            Outcome::Failed(e) => {
                let path = input.map(Path::to_path_buf).unwrap_or_else(|| error_path(&e));
                tracing::error!(file = %path.display(), kind = e.kind(), "conversion failed: {e}");
                summary.failed += 1;
                summary.failures.push((path, e.to_string()));
            }
            Outcome::Skipped => {
                summary.skipped += 1;
            }
        }
        if let Some(pb) = &pb {
            pb.inc(1);
        }
        Ok(())
    })?;

    if let Some(pb) = &pb {
        pb.finish_and_clear();
    }

    let manifest_path = manifest.finish().context("failed to write manifest")?;
    summary.manifest_path = Some(manifest_path);

    tracing::info!(
        converted = summary.converted,
        failed = summary.failed,
        skipped = summary.skipped,
        points = summary.points,
        elapsed = ?started.elapsed(),
        "conversion finished"
    );
    Ok(summary)
}

/// The manifest must be a plain file name that no converted file can share.
/// Every output is named `<stem>.bin`, so refusing that extension keeps the
/// manifest clear of all of them.
fn check_manifest_name(name: &str) -> Result<()> {
    let path = Path::new(name);
    let mut components = path.components();
    if name.contains(['/', '\\'])
        || !matches!((components.next(), components.next()), (Some(Component::Normal(_)), None))
    {
        anyhow::bail!("manifest name must be a plain file name, got {name:?}");
    }
    if path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case(OUTPUT_EXTENSION))
    {
        anyhow::bail!("manifest name {name:?} would be mistaken for a converted .{OUTPUT_EXTENSION} file");
    }
    Ok(())
}

fn error_path(e: &Error) -> PathBuf {
    match e {
        Error::Io { path, .. } | Error::MalformedInput { path, .. } => path.clone(),
        Error::Encoding { .. } => PathBuf::new(),
    }
}
