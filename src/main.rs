//! sqldeploy - deploys a SQL script one statement at a time.

use sql_deploy::cli::{Cli, ScriptSource};
use sql_deploy::config::Config;
use sql_deploy::db::{self, DeployTarget, MockTarget};
use sql_deploy::deploy::{DeployRequest, Deployer, DeploymentRun, DispatchResult, TracingProgress};
use sql_deploy::error::{DeployError, Result};
use sql_deploy::logging;
use sql_deploy::script::{classify_all, segment, ClassifiedStatement};
use sql_deploy::validate::{validate, ValidationReport};
use std::io::Read;
use std::process::ExitCode;
use tracing::{error, info, warn};

/// Statements longer than this are cut in `--check` output.
const CHECK_PREVIEW_CHARS: usize = 1000;

/// Database name reported for dry runs when none is configured.
const MOCK_DATABASE: &str = "MOCK_DB";

#[tokio::main]
async fn main() -> ExitCode {
    // A missing .env file is fine.
    let _ = dotenvy::dotenv();
    logging::init_stderr_logging();

    match run().await {
        Ok(code) => code,
        Err(e) => {
            error!("{}: {}", e.category(), e);
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<ExitCode> {
    let cli = Cli::parse_args();

    let config_path = cli.config_path();
    info!("Loading config from: {}", config_path.display());
    let mut config = Config::load_from_file(&config_path)?;
    cli.apply_deploy_overrides(&mut config.deploy);

    let script = read_script(&cli.script_source())?;
    let statements = segment(&script, config.deploy.single_statement);
    let classified = classify_all(&statements);
    let report = validate(&classified);
    info!(
        statements = classified.len(),
        errors = report.errors.len(),
        warnings = report.warnings.len(),
        "Script parsed"
    );

    if cli.check {
        print_check(&classified, &report);
        return Ok(if classified.is_empty() {
            ExitCode::FAILURE
        } else {
            ExitCode::SUCCESS
        });
    }

    // Validation is advisory; the engine has the final word.
    print_report(&report);
    if classified.is_empty() {
        warn!("No valid SQL statements found.");
    }

    let connection = config.resolve_connection(cli.to_connection_config()?, cli.connection_name())?;

    let (target, database): (Box<dyn DeployTarget>, String) = if cli.mock_db {
        let database = connection
            .as_ref()
            .and_then(|conn| conn.database.clone())
            .unwrap_or_else(|| MOCK_DATABASE.to_string());
        (Box::new(MockTarget::new()), database)
    } else {
        let connection = connection.as_ref().ok_or_else(|| {
            DeployError::config("No database connection configured. Use --help for usage information.")
        })?;
        let database = connection
            .database
            .clone()
            .ok_or_else(|| DeployError::config("Database name is required"))?;
        info!("Connection: {}", connection.display_string());
        (db::connect(connection).await?, database)
    };

    let mut request = DeployRequest::new(config.deploy.full_query_tag(&cli.tag), database);
    request.schema = cli
        .schema
        .clone()
        .or_else(|| connection.as_ref().and_then(|conn| conn.schema.clone()));

    let deployment = Deployer::new(target.as_ref())
        .with_progress(&TracingProgress)
        .run(&request, &classified)
        .await;

    if let Err(e) = target.close().await {
        warn!("Failed to close connection: {}", e);
    }

    if cli.json {
        let json = serde_json::to_string_pretty(&deployment)
            .map_err(|e| DeployError::internal(format!("Failed to serialize run: {e}")))?;
        println!("{json}");
    } else {
        println!("{}", deployment.render());
    }

    let path = deployment.write_to(&config.deploy.log_dir())?;
    info!("Deployment log written to {}", path.display());

    report_outcome(&deployment);
    Ok(if deployment.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn read_script(source: &ScriptSource) -> Result<String> {
    match source {
        ScriptSource::Stdin => {
            let mut script = String::new();
            std::io::stdin().read_to_string(&mut script)?;
            Ok(script)
        }
        ScriptSource::File(path) => std::fs::read_to_string(path).map_err(|e| {
            DeployError::config(format!("Failed to read script {}: {e}", path.display()))
        }),
    }
}

fn check_preview(sql: &str) -> String {
    if sql.chars().count() > CHECK_PREVIEW_CHARS {
        let cut: String = sql.chars().take(CHECK_PREVIEW_CHARS).collect();
        format!("{cut}...")
    } else {
        sql.to_string()
    }
}

fn print_check(statements: &[ClassifiedStatement], report: &ValidationReport) {
    if statements.is_empty() {
        println!("No valid SQL statements found.");
        return;
    }

    println!("Found {} statement(s):", statements.len());
    for statement in statements {
        println!();
        println!("-- Statement {} ({})", statement.ordinal(), statement.category);
        println!("{}", check_preview(statement.text()));
    }

    if report.is_clean() {
        println!();
        println!("No issues found.");
        return;
    }
    if !report.errors.is_empty() {
        println!();
        println!("Errors ({}):", report.errors.len());
        for issue in &report.errors {
            println!("  {issue}");
        }
    }
    if !report.warnings.is_empty() {
        println!();
        println!("Warnings ({}):", report.warnings.len());
        for issue in &report.warnings {
            println!("  {issue}");
        }
    }
}

fn print_report(report: &ValidationReport) {
    for issue in &report.errors {
        warn!("Validation error: {}", issue);
    }
    for issue in &report.warnings {
        warn!("Validation warning: {}", issue);
    }
    if report.has_errors() {
        warn!("Validation errors found; deploying anyway, the database may reject these statements");
    }
}

fn report_outcome(deployment: &DeploymentRun) {
    for note in &deployment.notes {
        info!("{}. Make sure your SQL uses fully qualified object names.", note);
    }

    if deployment.is_success() {
        info!("Deployment complete");
        return;
    }

    error!("Deployment failed");
    if let Some(outcome) = deployment.failed_outcome() {
        if let DispatchResult::Failed { error, hints } = &outcome.result {
            error!(
                "Error in statement {} ({}): {}",
                outcome.ordinal, outcome.category, error
            );
            for hint in hints {
                warn!("Syntax check: {}", hint);
            }
        }
    }
}
