use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use photoblast_uploader::{
    app::{CandidateFile, SessionStatus, SubmitAttempt, UploadController, UploadOutcome},
    domain::{TaskSelection, UploadError, UploadErrorCategory},
    infra::http::{PhotoBlastClient, UploadTransport},
};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

const SETTLE_MARGIN: Duration = Duration::from_secs(5);

// sysexits.h
const EXIT_USAGE: u8 = 64;
const EXIT_SOFTWARE: u8 = 70;
const EXIT_TEMPFAIL: u8 = 75;

#[derive(Debug, Parser)]
#[command(name = "photoblast-upload")]
#[command(about = "Upload an image to PhotoBlast for background processing")]
#[command(version)]
struct Cli {
    /// Image file to upload
    #[arg(required_unless_present = "health")]
    image: Option<PathBuf>,

    /// Comma-separated processing tasks (RESIZE, THUMBNAIL, WATERMARK)
    #[arg(long, env = "PHOTOBLAST_DEFAULT_TASKS", value_parser = parse_task_selection)]
    tasks: Option<TaskSelection>,

    /// Extra attempts after a retryable failure, reusing the idempotency key
    #[arg(long, default_value_t = 0, value_parser = clap::value_parser!(u32).range(0..=10))]
    retries: u32,

    /// Only check that the backend is reachable
    #[arg(long, conflicts_with = "image")]
    health: bool,
}

fn parse_task_selection(value: &str) -> Result<TaskSelection, String> {
    value
        .parse::<TaskSelection>()
        .map_err(|error| error.user_message())
}

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "photoblast_uploader=info,photoblast_upload=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(code) => code,
        Err(error) => {
            eprintln!("photoblast-upload: {}", error.user_message());
            ExitCode::from(exit_code_for(error.category()))
        }
    }
}

fn exit_code_for(category: UploadErrorCategory) -> u8 {
    match category {
        UploadErrorCategory::UserActionRequired => EXIT_USAGE,
        UploadErrorCategory::TemporaryFailure => EXIT_TEMPFAIL,
        UploadErrorCategory::InternalFailure => EXIT_SOFTWARE,
    }
}

fn run(cli: Cli) -> Result<ExitCode, UploadError> {
    let client = PhotoBlastClient::from_env()?;

    if cli.health {
        client.health_check()?;
        println!("PhotoBlast backend at {} is healthy", client.api_base_url());
        return Ok(ExitCode::SUCCESS);
    }
    let Some(path) = cli.image else {
        return Err(UploadError::validation("an image path is required"));
    };

    let settle_timeout = client.timeout() + SETTLE_MARGIN;
    let mut controller = UploadController::builder(Arc::new(client))
        .default_tasks(cli.tasks.unwrap_or_default())
        .build()?;

    let candidate = CandidateFile::from_path(&path)?;
    if !controller.on_file_picked([candidate])? {
        return Err(UploadError::validation(format!(
            "'{}' is not an image; nothing to upload",
            path.display()
        )));
    }

    let mut retries_left = cli.retries;
    loop {
        if let SubmitAttempt::Ignored(blocker) = controller.submit()? {
            return Err(UploadError::validation(format!(
                "upload is not available ({blocker:?})"
            )));
        }

        match controller.wait_until_settled(settle_timeout) {
            SessionStatus::Succeeded => {
                if let Some(receipt) = controller.result().and_then(UploadOutcome::receipt) {
                    println!("Upload successful!");
                    println!("Job ID: {}", receipt.job_id);
                    println!("Photo ID: {}", receipt.photo_id);
                }
                return Ok(ExitCode::SUCCESS);
            }
            SessionStatus::Failed => {
                let (message, retryable) = match controller.result() {
                    Some(UploadOutcome::Failed { message, retryable }) => {
                        (message.clone(), *retryable)
                    }
                    _ => ("Upload failed".to_string(), false),
                };
                if retryable && retries_left > 0 {
                    retries_left -= 1;
                    tracing::warn!(%message, retries_left, "retrying upload with the same idempotency key");
                    continue;
                }
                eprintln!("photoblast-upload: {message}");
                let code = if retryable { EXIT_TEMPFAIL } else { 1 };
                return Ok(ExitCode::from(code));
            }
            _ => return Err(UploadError::Timeout),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use clap::{CommandFactory, Parser};
    use photoblast_uploader::domain::{UploadError, UploadErrorCategory};

    use super::{Cli, EXIT_SOFTWARE, EXIT_TEMPFAIL, EXIT_USAGE, exit_code_for};

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn cli_reads_path_tasks_and_retries() {
        let cli = Cli::try_parse_from([
            "photoblast-upload",
            "cat.jpg",
            "--tasks",
            "watermark,resize",
            "--retries",
            "2",
        ])
        .expect("arguments should parse");

        assert_eq!(cli.image, Some(PathBuf::from("cat.jpg")));
        assert_eq!(
            cli.tasks.map(|tasks| tasks.to_query_value()),
            Some("RESIZE,WATERMARK".to_string())
        );
        assert_eq!(cli.retries, 2);
        assert!(!cli.health);
    }

    #[test]
    fn cli_accepts_health_without_path() {
        let cli = Cli::try_parse_from(["photoblast-upload", "--health"])
            .expect("health should parse");
        assert!(cli.health);
        assert!(cli.image.is_none());
    }

    #[test]
    fn cli_rejects_missing_path_and_bad_values() {
        for args in [
            vec!["photoblast-upload"],
            vec!["photoblast-upload", "a.jpg", "b.jpg"],
            vec!["photoblast-upload", "a.jpg", "--retries", "-1"],
            vec!["photoblast-upload", "a.jpg", "--retries", "many"],
            vec!["photoblast-upload", "a.jpg", "--tasks", "SHARPEN"],
            vec!["photoblast-upload", "a.jpg", "--tasks", ""],
            vec!["photoblast-upload", "a.jpg", "--health"],
            vec!["photoblast-upload", "a.jpg", "--verbose"],
        ] {
            assert!(
                Cli::try_parse_from(args.iter().copied()).is_err(),
                "{args:?} should be rejected"
            );
        }
    }

    #[test]
    fn exit_codes_follow_error_category() {
        assert_eq!(
            exit_code_for(UploadError::validation("bad file").category()),
            EXIT_USAGE
        );
        assert_eq!(exit_code_for(UploadError::Timeout.category()), EXIT_TEMPFAIL);
        assert_eq!(
            exit_code_for(UploadErrorCategory::InternalFailure),
            EXIT_SOFTWARE
        );
    }
}
