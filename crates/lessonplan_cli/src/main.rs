//! Terminal entry point.
//!
//! # Responsibility
//! - Load configuration from `LESSONPLAN_CONFIG` or `./lessonplan.toml`.
//! - Start file logging when a log directory is configured.
//! - Run one interactive session on stdin/stdout.

mod app;

use app::App;
use lessonplan_core::{
    config_path_from_env, core_version, init_logging, load_config, LessonSession,
};
use log::info;
use std::error::Error;
use std::process::ExitCode;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("lessonplan: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), Box<dyn Error>> {
    let config_path = config_path_from_env();
    let config = load_config(&config_path)?;

    if let Some(log_dir) = config.logging.dir.as_deref() {
        // Not fatal; the session runs without file logs.
        if let Err(err) = init_logging(&config.logging.level, log_dir) {
            eprintln!("lessonplan: logging disabled: {err}");
        }
    }
    info!(
        "event=cli_start module=cli status=ok version={} config={}",
        core_version(),
        config_path.display()
    );

    let session = LessonSession::from_config(&config)?;
    let stdin = std::io::stdin();
    let stdout = std::io::stdout();
    App::new(session).run(&mut stdin.lock(), &mut stdout.lock())?;
    Ok(())
}
