//! CoverForm CLI - Bridge interface for the web frontend
//!
//! Commands: forms, validate, submit, submissions, draft
//! Outputs JSON to stdout
//! Returns non-zero on validation failure

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

use coverform_core::{
    schema::load_schemas_from_dir, DraftStore, FormSchema, FormSession, FormValues, PortalClient,
    SubmitError, SubmissionSink, DEFAULT_API_URL,
};

#[derive(Parser)]
#[command(name = "coverform-cli")]
#[command(about = "CoverForm CLI - Insurance Application Portal Engine")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Base URL of the portal service
    #[arg(long, env = "COVERFORM_API_URL", default_value = DEFAULT_API_URL)]
    api_url: String,

    /// Load schemas from a local directory of JSON files instead of the
    /// service
    #[arg(long)]
    schemas_dir: Option<PathBuf>,

    /// Directory for local drafts
    #[arg(long, env = "COVERFORM_DRAFTS_DIR")]
    drafts_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// List available form schemas
    Forms,

    /// Validate a payload against a form schema
    Validate {
        /// Form id
        #[arg(short, long)]
        form: String,

        /// JSON payload (FormValues)
        #[arg(short, long)]
        payload: String,
    },

    /// Submit a filled form
    Submit {
        /// Form id
        #[arg(short, long)]
        form: String,

        /// JSON payload (FormValues)
        #[arg(short, long)]
        payload: String,
    },

    /// Browse submissions with search, sort, and pagination
    Submissions {
        /// Search query matched against every column
        #[arg(short, long, default_value = "")]
        query: String,

        /// Column to sort by
        #[arg(short, long)]
        sort: Option<String>,

        /// Sort descending instead of ascending
        #[arg(long)]
        desc: bool,

        /// Page number (1-indexed)
        #[arg(long, default_value_t = 1)]
        page: usize,

        /// Comma-separated subset of columns to project
        #[arg(long, value_delimiter = ',')]
        columns: Vec<String>,
    },

    /// Manage local drafts
    Draft {
        #[command(subcommand)]
        action: DraftAction,
    },
}

#[derive(Subcommand)]
enum DraftAction {
    /// Save a draft payload for a form
    Save {
        #[arg(short, long)]
        form: String,
        #[arg(short, long)]
        payload: String,
    },
    /// Print the stored draft for a form
    Show {
        #[arg(short, long)]
        form: String,
    },
    /// Delete the stored draft for a form
    Clear {
        #[arg(short, long)]
        form: String,
    },
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    match run(&cli) {
        Ok(code) => code,
        Err(message) => {
            eprintln!(r#"{{"error": {}}}"#, json_string(&message));
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<ExitCode, String> {
    match &cli.command {
        Commands::Forms => {
            let schemas = load_schemas(cli)?;
            let listing: Vec<_> = schemas
                .iter()
                .map(|s| {
                    serde_json::json!({
                        "id": s.id,
                        "title": s.title,
                        "description": s.description,
                        "sections": s.sections.len(),
                        "fields": s.fields().count(),
                    })
                })
                .collect();
            println!("{}", pretty(&listing)?);
            Ok(ExitCode::SUCCESS)
        }

        Commands::Validate { form, payload } => {
            let schema = find_schema(cli, form)?;
            let values = parse_values(payload)?;
            let session = FormSession::start(schema, Some(values), None)
                .map_err(|e| format!("Failed to start session: {}", e))?;
            let report = session.validate();
            println!("{}", pretty(&report)?);
            if report.valid {
                Ok(ExitCode::SUCCESS)
            } else {
                Ok(ExitCode::from(2)) // Validation failure
            }
        }

        Commands::Submit { form, payload } => {
            let schema = find_schema(cli, form)?;
            let values = parse_values(payload)?;
            let client = client(cli)?;
            let mut session = FormSession::start(schema, Some(values), None)
                .map_err(|e| format!("Failed to start session: {}", e))?;

            match session.submit(&client as &dyn SubmissionSink) {
                Ok(ack) => {
                    // A successful submit invalidates any locally kept draft.
                    if let Ok(store) = DraftStore::open(drafts_dir(cli)) {
                        if let Err(e) = store.delete(form) {
                            log::warn!("failed to clear local draft for {}: {}", form, e);
                        }
                    }
                    let output = serde_json::json!({
                        "success": true,
                        "submission": ack,
                    });
                    println!("{}", pretty(&output)?);
                    Ok(ExitCode::SUCCESS)
                }
                Err(SubmitError::Validation(report)) => {
                    println!("{}", pretty(&report)?);
                    Ok(ExitCode::from(2)) // Validation failure
                }
                Err(SubmitError::Sink(e)) => {
                    let output = serde_json::json!({
                        "success": false,
                        "error": e.to_string(),
                    });
                    println!("{}", pretty(&output)?);
                    Ok(ExitCode::FAILURE)
                }
            }
        }

        Commands::Submissions {
            query,
            sort,
            desc,
            page,
            columns,
        } => {
            let client = client(cli)?;
            let fetched = client
                .get_submissions()
                .map_err(|e| format!("Failed to load submissions: {}", e))?;

            let mut table = coverform_core::SubmissionTable::new(fetched);
            if !query.is_empty() {
                table.set_query(query.clone());
            }
            if let Some(column) = sort {
                table.toggle_sort(column);
                if *desc {
                    table.toggle_sort(column);
                }
            }
            if !columns.is_empty() {
                table.set_visible_columns(columns.clone());
            }
            table.set_page(*page);

            println!("{}", pretty(&table.view())?);
            Ok(ExitCode::SUCCESS)
        }

        Commands::Draft { action } => {
            let store = DraftStore::open(drafts_dir(cli))
                .map_err(|e| format!("Failed to open draft store: {}", e))?;
            match action {
                DraftAction::Save { form, payload } => {
                    let values = parse_values(payload)?;
                    store
                        .save(form, &values)
                        .map_err(|e| format!("Failed to save draft: {}", e))?;
                    println!(r#"{{"saved": true, "formId": {}}}"#, json_string(form));
                }
                DraftAction::Show { form } => match store.load(form) {
                    Some(values) => println!("{}", pretty(&values)?),
                    None => println!("null"),
                },
                DraftAction::Clear { form } => {
                    store
                        .delete(form)
                        .map_err(|e| format!("Failed to clear draft: {}", e))?;
                    println!(r#"{{"cleared": true, "formId": {}}}"#, json_string(form));
                }
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn client(cli: &Cli) -> Result<PortalClient, String> {
    PortalClient::new(cli.api_url.clone()).map_err(|e| format!("Failed to build client: {}", e))
}

fn load_schemas(cli: &Cli) -> Result<Vec<FormSchema>, String> {
    match &cli.schemas_dir {
        Some(dir) => {
            load_schemas_from_dir(dir).map_err(|e| format!("Failed to load schemas: {}", e))
        }
        None => client(cli)?
            .get_forms()
            .map_err(|e| format!("Failed to fetch schemas: {}", e)),
    }
}

fn find_schema(cli: &Cli, form_id: &str) -> Result<FormSchema, String> {
    load_schemas(cli)?
        .into_iter()
        .find(|s| s.id == form_id)
        .ok_or_else(|| format!("Form not found: {}", form_id))
}

fn parse_values(payload: &str) -> Result<FormValues, String> {
    serde_json::from_str(payload).map_err(|e| format!("Invalid payload: {}", e))
}

fn drafts_dir(cli: &Cli) -> PathBuf {
    cli.drafts_dir.clone().unwrap_or_else(|| {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("coverform")
            .join("drafts")
    })
}

fn pretty<T: serde::Serialize>(value: &T) -> Result<String, String> {
    serde_json::to_string_pretty(value).map_err(|e| format!("Failed to encode output: {}", e))
}

fn json_string(value: &str) -> String {
    serde_json::Value::String(value.to_string()).to_string()
}
