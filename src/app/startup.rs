use crate::app::cli::{Args, PipelineConfig};
use crate::app::commands;
use crate::app::error::{AppError, EXIT_CONFIG};
use crate::app::pipeline::Pipeline;
use crate::core::error_handling::log_error_with_context;
use crate::core::logging::init_logging;
use crate::core::shutdown::ShutdownCoordinator;
use crate::core::version::long_version;
use clap::Parser;

/// Run the command line and return the process exit status
pub async fn startup() -> i32 {
    // clap handles --help/--version and usage errors (exit status 2) itself
    let args = Args::parse();

    let mut config = match PipelineConfig::load(args.config_file.as_deref()).await {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            return EXIT_CONFIG;
        }
    };
    config.apply_env(|key| std::env::var(key).ok());
    config.apply_args(&args);

    let use_color = args.use_color();
    colored::control::set_override(use_color);
    let log_file = config
        .logging
        .file_path()
        .map(|path| path.to_string_lossy().into_owned());
    if let Err(e) = init_logging(
        Some(&config.logging.level),
        Some(&config.logging.format),
        log_file.as_deref(),
        use_color,
    ) {
        eprintln!("Error: could not initialise logging: {}", e);
        return EXIT_CONFIG;
    }

    if let Err(e) = config.validate() {
        log_error_with_context(&e, "Configuration validation");
        return EXIT_CONFIG;
    }

    log::info!("commitscan {} starting {}", long_version(), args.command_name());
    log::debug!("Effective configuration: {:?}", redacted(&config));

    let pipeline = match Pipeline::build(config) {
        Ok(pipeline) => pipeline,
        Err(e) => return report(&e, "Pipeline setup"),
    };

    let shutdown = ShutdownCoordinator::new();
    shutdown.install_signal_handlers();

    match commands::execute(&args.command, &pipeline, &shutdown).await {
        Ok(code) => code,
        Err(e) => report(&e, args.command_name()),
    }
}

fn report(error: &AppError, context: &str) -> i32 {
    log_error_with_context(error, context);
    error.exit_code()
}

/// Configuration with secrets replaced for debug logging
fn redacted(config: &PipelineConfig) -> PipelineConfig {
    let mut copy = config.clone();
    copy.github.tokens = copy
        .github
        .tokens
        .iter()
        .map(|token| crate::github::Credential::new(token.as_str()).masked())
        .collect();
    if !copy.scanner.token.is_empty() {
        copy.scanner.token = "****".to_string();
    }
    copy
}
