//! pkiscan: report cryptographic hygiene issues in certificates, CSRs,
//! private keys and PKCS#12 bundles.

use anyhow::{Context, Result};
use clap::{ArgGroup, Parser};
use pkiscan_lib::{ArtifactKind, InspectError, InspectOptions, Report, RuleOptions, TrustSource, TrustStore};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use zeroize::Zeroizing;

#[derive(Parser, Debug)]
#[command(
    name = "pkiscan",
    version,
    about = "Report cryptographic hygiene issues in X.509 material",
    long_about = "pkiscan inspects certificates, certificate signing requests, private keys\n\
                  and PKCS#12 bundles and reports weak signature algorithms, short keys,\n\
                  unencrypted private keys and weak PKCS#12 MACs.\n\n\
                  The parser is chosen by file extension (.pfx/.p12, .pem/.crt/.cer/.der,\n\
                  .csr/.req, .key); other files are recognised by content.\n\n\
                  Without --ca-file, --ca-path or --system-roots each certificate is\n\
                  verified against itself only, which is not a chain-of-trust check.",
    after_help = "EXAMPLES:\n\
                  \n  pkiscan -f server.pem\
                  \n  pkiscan -f bundle.pfx --ask-passphrase\
                  \n  pkiscan -f leaf.pem --ca-file root.pem\
                  \n  pkiscan -f certs/ --recurse --expiring-within 30d\
                  \n  pkiscan -f request.csr --json",
    group(
        ArgGroup::new("passphrase_source")
            .args(["passphrase", "passphrase_file", "ask_passphrase"])
            .multiple(false)
    )
)]
struct Cli {
    /// Artifact file or directory to inspect (repeatable)
    #[arg(short = 'f', long = "file", value_name = "PATH", required = true, num_args = 1..)]
    files: Vec<PathBuf>,
    /// Passphrase for encrypted keys and PKCS#12 bundles (visible in the
    /// process list; prefer --passphrase-file or --ask-passphrase)
    #[arg(short = 'p', long, value_name = "PASS")]
    passphrase: Option<String>,
    /// Read the passphrase from the first line of a file
    #[arg(long, value_name = "PATH")]
    passphrase_file: Option<PathBuf>,
    /// Prompt for the passphrase without echo
    #[arg(long)]
    ask_passphrase: bool,
    /// Trust anchors from a PEM bundle
    #[arg(long, value_name = "FILE")]
    ca_file: Option<PathBuf>,
    /// Trust anchors from a directory of PEM files
    #[arg(long, value_name = "DIR")]
    ca_path: Option<PathBuf>,
    /// Trust anchors from the system store (same locations as OpenSSL)
    #[arg(long)]
    system_roots: bool,
    /// Warn when a certificate expires within DURATION (e.g. 30d, 2w, 86400)
    #[arg(long, value_name = "DURATION")]
    expiring_within: Option<String>,
    /// Output the report as JSON
    #[arg(long)]
    json: bool,
    /// Recurse into subdirectories
    #[arg(short, long)]
    recurse: bool,
    /// Enable debug logging on stderr
    #[arg(short, long)]
    verbose: bool,
}

/// Parse a human-readable duration string into a `Duration`.
///
/// Plain numbers (e.g. "3600") default to seconds. Otherwise, standard
/// humantime units are accepted: `s`, `m`, `h`, `d`, `w`, `months`, `y`, etc.
fn parse_duration(s: &str) -> Result<Duration> {
    if s.chars().all(|c| c.is_ascii_digit()) {
        let secs: u64 = s.parse().context("Invalid duration value")?;
        return Ok(Duration::from_secs(secs));
    }
    humantime::parse_duration(s).with_context(|| format!("Invalid duration: '{s}'"))
}

/// Check if a path has an extension the dispatcher knows.
fn is_artifact_file(path: &Path) -> bool {
    ArtifactKind::from_path(path) != ArtifactKind::Unknown
}

/// Find all artifact files in a directory, sorted.
fn find_artifact_files(dir: &Path, recurse: bool) -> Vec<PathBuf> {
    let walker = if recurse {
        walkdir::WalkDir::new(dir)
    } else {
        walkdir::WalkDir::new(dir).max_depth(1)
    };
    let mut files: Vec<PathBuf> = walker
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file() && is_artifact_file(e.path()))
        .map(|e| e.into_path())
        .collect();
    files.sort();
    files
}

/// Expand directories in the order given; plain files pass through.
fn expand_inputs(inputs: &[PathBuf], recurse: bool) -> Vec<PathBuf> {
    inputs
        .iter()
        .flat_map(|p| {
            if p.is_dir() {
                find_artifact_files(p, recurse)
            } else {
                vec![p.clone()]
            }
        })
        .collect()
}

/// First line of a passphrase file, without its line terminator.
fn read_passphrase_file(path: &Path) -> Result<Zeroizing<String>> {
    let contents = Zeroizing::new(
        std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read passphrase file: {}", path.display()))?,
    );
    let line = contents.lines().next().unwrap_or("");
    Ok(Zeroizing::new(line.to_string()))
}

/// Take the passphrase out of `cli` so no unwiped copy outlives the run.
fn acquire_passphrase(cli: &mut Cli) -> Result<Option<Zeroizing<String>>> {
    if let Some(p) = cli.passphrase.take() {
        return Ok(Some(Zeroizing::new(p)));
    }
    if let Some(path) = &cli.passphrase_file {
        return read_passphrase_file(path).map(Some);
    }
    if cli.ask_passphrase {
        let p = rpassword::prompt_password("Passphrase: ").context("Failed to read passphrase")?;
        return Ok(Some(Zeroizing::new(p)));
    }
    Ok(None)
}

fn build_trust(cli: &Cli) -> Result<TrustSource> {
    if cli.ca_file.is_none() && cli.ca_path.is_none() && !cli.system_roots {
        return Ok(TrustSource::SelfSigned);
    }
    let mut store = TrustStore::new();
    if let Some(file) = &cli.ca_file {
        store.extend(TrustStore::from_pem_file(file).context("Failed to load --ca-file")?);
    }
    if let Some(dir) = &cli.ca_path {
        store.extend(TrustStore::from_pem_directory(dir).context("Failed to load --ca-path")?);
    }
    if cli.system_roots {
        tracing::debug!(bundle = ?pkiscan_lib::find_system_ca_bundle(), "loading system trust store");
        store.extend(TrustStore::system()?);
    }
    tracing::debug!(anchors = store.len(), "trust store ready");
    Ok(TrustSource::Anchors(store))
}

/// Inspect every file in parallel. Results keep input order.
fn run_batch(
    files: &[PathBuf],
    passphrase: Option<&str>,
    options: &InspectOptions,
) -> Vec<Result<Report, InspectError>> {
    files
        .par_iter()
        .map(|f| pkiscan_lib::inspect(f, None, passphrase, options))
        .collect()
}

/// Set up everything that must succeed before any file is inspected.
fn prepare(cli: &mut Cli) -> Result<(Option<Zeroizing<String>>, InspectOptions)> {
    let expiry_window = cli
        .expiring_within
        .as_deref()
        .map(parse_duration)
        .transpose()?;
    let passphrase = acquire_passphrase(cli)?;
    let options = InspectOptions {
        rules: RuleOptions {
            now: None,
            expiry_window,
        },
        trust: build_trust(cli)?,
    };
    Ok((passphrase, options))
}

fn main() -> ExitCode {
    let mut cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let (passphrase, options) = match prepare(&mut cli) {
        Ok(v) => v,
        Err(e) => {
            eprintln!("Error: {e:#}");
            return ExitCode::from(2);
        }
    };

    let files = expand_inputs(&cli.files, cli.recurse);
    tracing::debug!(count = files.len(), "inspecting files");

    let results = run_batch(&files, passphrase.as_deref().map(String::as_str), &options);
    drop(passphrase);

    let mut report = Report::new();
    let mut failed = false;
    for result in results {
        match result {
            Ok(r) => report.append(r),
            Err(e) => {
                eprintln!("{e}");
                failed = true;
            }
        }
    }
    failed |= report.has_failures();

    if cli.json {
        match pkiscan_lib::to_json(&report) {
            Ok(json) => println!("{json}"),
            Err(e) => {
                eprintln!("Error: {e}");
                return ExitCode::FAILURE;
            }
        }
    } else {
        print!("{}", pkiscan_lib::display_text(&report));
        for section in report.sections.iter().filter(|s| s.failure.is_some()) {
            if let Some(failure) = &section.failure {
                eprintln!("{}: {}", section.artifact, failure);
            }
        }
    }

    if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;

    fn testdata() -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("../testdata")
    }

    #[test]
    fn parse_plain_seconds() {
        assert_eq!(parse_duration("3600").unwrap(), Duration::from_secs(3600));
        assert_eq!(parse_duration("0").unwrap(), Duration::from_secs(0));
    }

    #[test]
    fn parse_humantime_units() {
        assert_eq!(parse_duration("5m").unwrap(), Duration::from_secs(300));
        assert_eq!(parse_duration("1h30m").unwrap(), Duration::from_secs(5400));
        assert_eq!(parse_duration("30d").unwrap(), Duration::from_secs(30 * 86400));
    }

    #[test]
    fn parse_invalid_durations() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("abc").is_err());
        assert!(parse_duration("-5").is_err());
    }

    #[test]
    fn file_is_required() {
        let err = Cli::try_parse_from(["pkiscan"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn one_passphrase_source_only() {
        let err = Cli::try_parse_from([
            "pkiscan",
            "-f",
            "a.pfx",
            "-p",
            "secret",
            "--ask-passphrase",
        ])
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ArgumentConflict);
    }

    #[test]
    fn several_files_in_order() {
        let cli = Cli::try_parse_from(["pkiscan", "-f", "b.pem", "a.key", "-f", "c.csr"]).unwrap();
        assert_eq!(
            cli.files,
            vec![PathBuf::from("b.pem"), PathBuf::from("a.key"), PathBuf::from("c.csr")]
        );
        assert!(!cli.json);
    }

    #[test]
    fn directory_expansion_is_sorted_and_filtered() {
        let files = find_artifact_files(&testdata(), false);
        assert!(!files.is_empty());
        let mut sorted = files.clone();
        sorted.sort();
        assert_eq!(files, sorted);
        assert!(files.iter().all(|f| is_artifact_file(f)));
        assert!(!files.iter().any(|f| f.ends_with("generate.sh")));
    }

    #[test]
    fn passphrase_file_first_line() {
        let path = std::env::temp_dir().join(format!("pkiscan-pass-{}", std::process::id()));
        std::fs::write(&path, "secret\r\nignored\n").unwrap();
        let pass = read_passphrase_file(&path).unwrap();
        let _ = std::fs::remove_file(&path);
        assert_eq!(pass.as_str(), "secret");
    }

    #[test]
    fn passphrase_flag_is_moved_out() {
        let mut cli = Cli::try_parse_from(["pkiscan", "-f", "a.pfx", "-p", "secret"]).unwrap();
        let pass = acquire_passphrase(&mut cli).unwrap().unwrap();
        assert_eq!(pass.as_str(), "secret");
        assert!(cli.passphrase.is_none());
    }

    #[test]
    fn ca_file_becomes_anchor_set() {
        let ca = testdata().join("root-ca.pem");
        let cli =
            Cli::try_parse_from(["pkiscan", "-f", "leaf.pem", "--ca-file", ca.to_str().unwrap()])
                .unwrap();
        match build_trust(&cli).unwrap() {
            TrustSource::Anchors(store) => assert_eq!(store.len(), 1),
            TrustSource::SelfSigned => panic!("expected anchors"),
        }
    }

    #[test]
    fn unreadable_ca_file_is_a_setup_error() {
        let cli = Cli::try_parse_from([
            "pkiscan",
            "-f",
            "leaf.pem",
            "--ca-file",
            "/nonexistent/pkiscan/ca.pem",
        ])
        .unwrap();
        assert!(build_trust(&cli).is_err());
    }

    #[test]
    fn no_trust_flags_means_self_verification() {
        let cli = Cli::try_parse_from(["pkiscan", "-f", "leaf.pem"]).unwrap();
        assert!(matches!(build_trust(&cli).unwrap(), TrustSource::SelfSigned));
    }
}
