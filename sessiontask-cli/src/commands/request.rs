//! Request command - run one task and report every notification.

use anyhow::{Context, Result};
use clap::Args;
use sessiontask_core::{Method, Params};
use sessiontask_fetch::{SessionTask, TaskContext, TaskListener, TaskRunner};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, warn};

use crate::commands::{load_network_config, open_cache};
use crate::output::{JsonFormatter, NotificationOutput, RequestOutput, TextFormatter};
use crate::{Cli, ExitCode, OutputFormat};

/// Arguments for the request command.
#[derive(Args, Debug)]
pub struct RequestArgs {
    /// Path template, e.g. `/items/:id`.
    pub path: String,

    /// HTTP method.
    #[arg(long, short = 'X', default_value = "GET")]
    pub method: String,

    /// Base URL, overriding the configured default.
    #[arg(long)]
    pub base_url: Option<String>,

    /// Parameter as `key=value`. Repeatable.
    #[arg(long = "param", short = 'p')]
    pub params: Vec<String>,

    /// Path substitution, applied in order. Repeatable.
    #[arg(long = "sub", short = 's')]
    pub subs: Vec<String>,

    /// Header as `Name:value`. Repeatable.
    #[arg(long = "header", short = 'H')]
    pub headers: Vec<String>,

    /// Page number.
    #[arg(long)]
    pub page: Option<u32>,

    /// Page size.
    #[arg(long)]
    pub page_size: Option<u32>,

    /// Neither read nor write the response cache.
    #[arg(long)]
    pub no_cache: bool,

    /// Skip the cache import but still cache a successful response.
    #[arg(long)]
    pub no_import: bool,

    /// Do not require the success business code.
    #[arg(long)]
    pub no_check_code: bool,

    /// Request type tag reported in the output.
    #[arg(long = "type", default_value = "cli")]
    pub request_type: String,
}

// ============================================================================
// Listener
// ============================================================================

/// Records notifications and optionally echoes them as they happen.
struct CliListener {
    echo: Option<TextFormatter>,
    notifications: Mutex<Vec<NotificationOutput>>,
}

impl CliListener {
    fn new(echo: Option<TextFormatter>) -> Self {
        Self {
            echo,
            notifications: Mutex::new(Vec::new()),
        }
    }

    fn record(&self, event: &'static str, task: &SessionTask) {
        let notification = NotificationOutput::capture(event, task);
        if let Some(formatter) = &self.echo {
            println!("{}", formatter.format_notification(&notification));
        }
        self.notifications
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(notification);
    }

    fn take(&self) -> Vec<NotificationOutput> {
        std::mem::take(
            &mut *self
                .notifications
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        )
    }
}

impl TaskListener for CliListener {
    fn on_sending(&self, task: &SessionTask) {
        self.record("sending", task);
    }

    fn on_connected(&self, task: &SessionTask) {
        self.record("connected", task);
    }

    fn on_lost(&self, task: &SessionTask) {
        self.record("lost", task);
    }
}

// ============================================================================
// Command
// ============================================================================

/// Runs the request command.
pub async fn run(args: &RequestArgs, cli: &Cli) -> Result<ExitCode> {
    let config = load_network_config(cli).await?;
    let ctx = TaskContext::builder()
        .config(config)
        .cache(Arc::new(open_cache(cli)))
        .build();
    let runner = TaskRunner::new(ctx);

    let echo = (cli.format == OutputFormat::Text && !cli.quiet).then(|| TextFormatter::new(!cli.no_color));
    let listener = Arc::new(CliListener::new(echo));
    let mut task = build_task(args, &listener)?;

    let handle = task.cancel_handle();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling request");
            handle.cancel();
        }
    });

    let outcome = runner.run(&mut task).await?;
    interrupt.abort();
    debug!(state = %outcome.state, "Request finished");

    let notifications = listener.take();
    match cli.format {
        OutputFormat::Text => {
            let formatter = TextFormatter::new(!cli.no_color);
            if !cli.quiet {
                println!();
            }
            println!("{}", formatter.format_request(&task, &outcome));
        }
        OutputFormat::Json => {
            let formatter = JsonFormatter::new(cli.pretty);
            let output = RequestOutput::new(&task, &outcome, &notifications);
            println!("{}", formatter.format(&output)?);
        }
    }

    Ok(ExitCode::from_lifecycle(outcome.state.lifecycle()))
}

/// Builds the task described by `args`.
fn build_task<L: TaskListener + 'static>(args: &RequestArgs, listener: &Arc<L>) -> Result<SessionTask> {
    let method: Method = args.method.parse()?;

    let params = args
        .params
        .iter()
        .map(|p| parse_pair(p, '='))
        .collect::<Result<Params>>()?;

    let mut task = SessionTask::with_path_substitutions(
        method,
        &args.path,
        params,
        args.subs.clone(),
        listener,
        &args.request_type,
    );

    task.set_base_url(args.base_url.clone());
    task.set_page(args.page);
    task.set_page_size(args.page_size);
    task.set_cached(!args.no_cache);
    task.set_import_cache_once(!args.no_import);
    task.set_should_check_code(!args.no_check_code);

    for header in &args.headers {
        let (name, value) = parse_pair(header, ':')?;
        task.set_header(name, value.trim());
    }

    Ok(task)
}

/// Splits `key<sep>value`; the key must not be empty.
pub fn parse_pair(input: &str, separator: char) -> Result<(String, String)> {
    let (key, value) = input
        .split_once(separator)
        .with_context(|| format!("expected `key{separator}value`, got `{input}`"))?;
    let key = key.trim();
    if key.is_empty() {
        anyhow::bail!("empty key in `{input}`");
    }
    Ok((key.to_string(), value.to_string()))
}
