//! DICOM-cluster CLI - group DICOM files by header similarity.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use dicom_cluster::{
    ClusterError, DicomClustering, DistanceKind, FieldWeights, find_dicom_files_in, matrix_where,
};

#[derive(Parser)]
#[command(name = "dicom-cluster")]
#[command(about = "Group DICOM files by header similarity")]
#[command(version)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the DICOM files under the given folders
    Scan {
        #[arg(required = true)]
        folders: Vec<PathBuf>,
    },
    /// Group files with identical header fields, optionally merging
    /// similar groups
    Group(GroupArgs),
    /// Group files and copy each group into a subfolder of a destination
    Copy(CopyArgs),
}

#[derive(Args)]
struct GroupArgs {
    #[arg(required = true)]
    folders: Vec<PathBuf>,

    #[command(flatten)]
    clustering: ClusteringArgs,

    /// Report representatives sharing a folder prefix of this depth
    #[arg(long)]
    folder_depth: Option<usize>,

    /// Report the distinct values of this field per group
    #[arg(long, value_name = "FIELD")]
    unique_values: Option<String>,

    /// Key the unique-value report by this representative field
    #[arg(long, value_name = "FIELD", requires = "unique_values")]
    key_field: Option<String>,
}

#[derive(Args)]
struct CopyArgs {
    #[arg(required = true)]
    folders: Vec<PathBuf>,

    #[command(flatten)]
    clustering: ClusteringArgs,

    /// Destination folder for the copied groups
    #[arg(short, long)]
    dest: PathBuf,

    /// Name group subfolders after this representative field instead of
    /// the representative's filename
    #[arg(long, value_name = "FIELD")]
    groupby: Option<String>,
}

#[derive(Args)]
struct ClusteringArgs {
    /// Header fields to compare, as NAME or NAME=WEIGHT
    /// (default: PatientID, PatientName, PatientBirthDate)
    #[arg(short, long, value_delimiter = ',', value_parser = parse_field_weight)]
    fields: Vec<(String, f64)>,

    /// Distance measure for the representative analysis
    #[arg(long, value_enum, default_value_t = DistanceArg::Levenshtein)]
    distance: DistanceArg,

    /// Merge group pairs below this distance percentile (0-100)
    #[arg(long, value_name = "PERC")]
    merge_percentile: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum DistanceArg {
    Levenshtein,
    Exact,
}

impl From<DistanceArg> for DistanceKind {
    fn from(arg: DistanceArg) -> Self {
        match arg {
            DistanceArg::Levenshtein => DistanceKind::Levenshtein,
            DistanceArg::Exact => DistanceKind::Exact,
        }
    }
}

fn parse_field_weight(raw: &str) -> Result<(String, f64), String> {
    match raw.split_once('=') {
        None => Ok((raw.to_string(), 1.0)),
        Some((name, weight)) => {
            let weight: f64 = weight
                .parse()
                .map_err(|_| format!("invalid weight in {raw:?}"))?;
            if weight < 0.0 {
                return Err(format!("weight must be non-negative in {raw:?}"));
            }
            Ok((name.to_string(), weight))
        }
    }
}

impl ClusteringArgs {
    fn field_weights(&self) -> FieldWeights {
        if self.fields.is_empty() {
            FieldWeights::patient_defaults()
        } else {
            FieldWeights::from_weights(self.fields.iter().cloned())
        }
    }

    fn build(&self, folders: &[PathBuf]) -> Result<DicomClustering, ClusterError> {
        let mut clustering = DicomClustering::from_folders(
            folders,
            self.field_weights(),
            self.distance.into(),
        )?;
        if let Some(percentile) = self.merge_percentile {
            let matrix = clustering.distance_matrix(None)?;
            let mask = matrix.percentile_threshold(percentile, 1);
            let (targets, sources) = matrix_where(&mask);
            if !targets.is_empty() {
                clustering.merge_groups(&targets, &sources)?;
            }
        }
        Ok(clustering)
    }
}

fn main() -> Result<(), ClusterError> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .init();

    match cli.command {
        Commands::Scan { folders } => {
            for path in find_dicom_files_in(&folders)? {
                println!("{}", path.display());
            }
        }
        Commands::Group(args) => {
            let clustering = args.clustering.build(&args.folders)?;
            print_groups(&clustering, cli.verbose);

            if let Some(depth) = args.folder_depth {
                println!("\nGroups sharing a folder prefix of depth {depth}:");
                for (first, second) in clustering.groups_in_same_folder(depth) {
                    println!("  {} and {}", first.display(), second.display());
                }
            }

            if let Some(field) = &args.unique_values {
                println!("\nDistinct {field} values per group:");
                let values = clustering
                    .unique_field_values_per_group(field, args.key_field.as_deref())?;
                for (key, values) in values {
                    let values: Vec<&str> = values.iter().map(String::as_str).collect();
                    println!("  {key}: {}", values.join(", "));
                }
            }
        }
        Commands::Copy(args) => {
            let clustering = args.clustering.build(&args.folders)?;
            clustering.copy_to_folder(&args.dest, args.groupby.as_deref())?;
            println!(
                "copied {} files in {} groups to {}",
                clustering.num_files(),
                clustering.groups().len(),
                args.dest.display(),
            );
        }
    }

    Ok(())
}

fn print_groups(clustering: &DicomClustering, verbose: bool) {
    println!(
        "{} files in {} groups",
        clustering.num_files(),
        clustering.groups().len(),
    );
    for group in clustering.groups() {
        println!("{} ({} files)", group.representative().display(), group.len());
        if verbose {
            for member in &group.members()[1..] {
                println!("    {}", member.display());
            }
        }
    }
}
