//! Core application

use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::Value;

use crate::core::cli::{self, Commands};
use crate::core::config::AppConfig;
use crate::core::constants::{
    APP_NAME_LOWER, ENV_LOG, LOG_TARGET, MAX_BODY_JSON_SIZE, MAX_BODY_PARAMS,
};
use crate::filters::{Combinator, FilterSet, Predicate, RequestParams, SqlParams};

/// Where the filter body of a `compile` run comes from
#[derive(Debug, Clone)]
pub enum BodySource {
    Inline(String),
    File(std::path::PathBuf),
    Params(Vec<(String, String)>),
    Stdin,
}

/// JSON printed by `filterc compile`
#[derive(Debug, Serialize)]
pub struct CompileOutput {
    pub predicate: Predicate,
    pub params: Value,
}

impl CompileOutput {
    pub fn new(predicate: Predicate, params: &SqlParams) -> Self {
        // Binds of an aborted pass are meaningless to callers
        let params = match predicate {
            Predicate::Sql(_) => params.to_json(),
            _ => Value::Object(Default::default()),
        };
        Self { predicate, params }
    }
}

pub struct CoreApp {
    pub config: AppConfig,
}

impl CoreApp {
    /// Run the application with CLI argument parsing
    pub fn run() -> Result<()> {
        dotenvy::dotenv().ok();
        Self::init_logging();

        tracing::debug!("Application starting");

        let (cli_config, command) = cli::parse();
        tracing::trace!(command = ?command, "Parsed command");

        let app = Self {
            config: AppConfig::load(&cli_config)?,
        };

        match command {
            Commands::Compile {
                body,
                body_file,
                param,
                any,
                pretty,
            } => {
                let source = match (body, body_file) {
                    (Some(json), _) => BodySource::Inline(json),
                    (None, Some(path)) => BodySource::File(path),
                    (None, None) if !param.is_empty() => BodySource::Params(param),
                    (None, None) => BodySource::Stdin,
                };
                let default = if any {
                    Combinator::Any
                } else {
                    app.config.default_combinator
                };
                let output = app.compile(source, default)?;
                let rendered = if pretty {
                    serde_json::to_string_pretty(&output)?
                } else {
                    serde_json::to_string(&output)?
                };
                println!("{}", rendered);
                Ok(())
            }
            Commands::Filters => {
                print!("{}", render_filter_list(&app.config.filters));
                Ok(())
            }
        }
    }

    /// Compile one body from `source` with the configured filters
    pub fn compile(&self, source: BodySource, default: Combinator) -> Result<CompileOutput> {
        let mut compiler = self.config.compiler();
        let predicate = match source {
            BodySource::Params(pairs) => {
                if pairs.len() > MAX_BODY_PARAMS {
                    anyhow::bail!("Maximum {} parameters allowed", MAX_BODY_PARAMS);
                }
                let body: RequestParams = pairs.into_iter().collect();
                compiler.generate(&body, default)?
            }
            source => {
                let body = read_body(source)?;
                compiler.generate(&body, default)?
            }
        };
        Ok(CompileOutput::new(predicate, compiler.params()))
    }

    fn init_logging() {
        let default_filter = format!("warn,{}=info", LOG_TARGET);

        let filter = std::env::var(ENV_LOG)
            .or_else(|_| std::env::var("RUST_LOG"))
            .unwrap_or(default_filter);

        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_thread_ids(false)
            .with_level(true)
            .with_ansi(true)
            .compact()
            .with_env_filter(filter)
            .init();

        tracing::trace!(app = APP_NAME_LOWER, "Logging initialized");
    }
}

fn read_body(source: BodySource) -> Result<Value> {
    let raw = match source {
        BodySource::Inline(json) => json,
        BodySource::File(path) => read_body_file(&path)?,
        BodySource::Stdin => {
            let mut raw = String::new();
            std::io::stdin()
                .take(MAX_BODY_JSON_SIZE as u64 + 1)
                .read_to_string(&mut raw)
                .context("Failed to read filter body from stdin")?;
            raw
        }
        BodySource::Params(_) => anyhow::bail!("Request parameters are not a JSON body"),
    };
    parse_body(&raw)
}

fn read_body_file(path: &Path) -> Result<String> {
    std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read filter body: {}", path.display()))
}

/// Parse a JSON filter body, enforcing the size limit
fn parse_body(raw: &str) -> Result<Value> {
    if raw.len() > MAX_BODY_JSON_SIZE {
        anyhow::bail!(
            "Filter body exceeds maximum size of {} bytes",
            MAX_BODY_JSON_SIZE
        );
    }
    serde_json::from_str(raw).context("Invalid filter body JSON")
}

/// One line per filter: name, type, field
fn render_filter_list(filters: &FilterSet) -> String {
    let width = filters.iter().map(|(name, _)| name.len()).max().unwrap_or(0);
    filters
        .iter()
        .map(|(name, descriptor)| {
            let mut line = format!(
                "{:width$}  {:<21}  {}",
                name,
                descriptor.kind.to_string(),
                descriptor.field,
                width = width
            );
            if let Some(class_name) = &descriptor.class_name {
                line.push_str(&format!("  ({})", class_name));
            }
            format!("{}\n", line.trim_end())
        })
        .collect()
}
