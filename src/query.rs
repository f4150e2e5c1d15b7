use std::{future::Future, path::PathBuf, process::Stdio};

use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::{
    Result, cancellable,
    error::{Error, ExecError},
};

/// Executable used when none is configured.
pub const DEFAULT_EXECUTABLE: &str = "kubectl";

/// A `get` query for one resource type with optional column and field-selector
/// clauses.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuerySpec {
    pub resource_type: String,
    /// Column specs rendered as `--custom-columns`, in the given order.
    pub fields: Vec<String>,
    /// Field selectors rendered as `--field-selector`, in the given order.
    pub filters: Vec<String>,
    pub dry_run: bool,
}

impl QuerySpec {
    pub fn new(resource_type: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            ..Default::default()
        }
    }

    pub fn with_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_filters<I, S>(mut self, filters: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.filters = filters.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Arguments passed to the executable, without the executable itself.
    pub fn args(&self) -> Vec<String> {
        let mut args = vec!["get".to_string(), self.resource_type.clone()];
        if !self.fields.is_empty() {
            args.push(format!("--custom-columns={}", self.fields.join(",")));
        }
        if !self.filters.is_empty() {
            args.push(format!("--field-selector={}", self.filters.join(",")));
        }
        args
    }

    /// The full command line, as shown for a dry run.
    pub fn render(&self, executable: &str) -> String {
        format!("{executable} {}", self.args().join(" "))
    }
}

/// Outcome of [`QueryBuilder::build`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryResult {
    /// Dry run: the command that would have been executed.
    Rendered(String),
    /// The command ran and exited successfully. Output is decoded as in
    /// [`ExecOutput`].
    Executed {
        stdout: String,
        stderr: String,
        exit_code: i32,
    },
}

impl QueryResult {
    /// The rendered command or the captured standard output.
    pub fn output(&self) -> &str {
        match self {
            QueryResult::Rendered(command) => command,
            QueryResult::Executed { stdout, .. } => stdout,
        }
    }
}

/// Captured result of one executor run.
///
/// [`ProcessExecutor`] decodes both streams with [`String::from_utf8_lossy`], so
/// bytes that are not valid UTF-8 come back as `U+FFFD`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

/// Runs a command to completion and captures its output.
pub trait QueryExecutor {
    fn execute(
        &self,
        program: &str,
        args: &[String],
    ) -> impl Future<Output = std::io::Result<ExecOutput>>;
}

impl<E: QueryExecutor> QueryExecutor for &E {
    fn execute(
        &self,
        program: &str,
        args: &[String],
    ) -> impl Future<Output = std::io::Result<ExecOutput>> {
        (**self).execute(program, args)
    }
}

/// Spawns the query as a child process.
///
/// Output is captured, never streamed. The child is killed when the run is
/// cancelled. Context and namespace flags are appended after the query
/// arguments, since `--all-namespaces` belongs to `get`.
#[derive(Debug, Clone, Default)]
pub struct ProcessExecutor {
    kubeconfig: Option<PathBuf>,
    context: Option<String>,
    namespace: Option<String>,
    all_namespaces: bool,
}

impl ProcessExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Point the child at an explicit kubeconfig through `KUBECONFIG`.
    pub fn with_kubeconfig(mut self, kubeconfig: Option<PathBuf>) -> Self {
        self.kubeconfig = kubeconfig;
        self
    }

    /// Pass `--context=<context>` on every invocation.
    pub fn with_context(mut self, context: Option<String>) -> Self {
        self.context = context;
        self
    }

    /// Pass `--namespace=<namespace>` on every invocation.
    pub fn with_namespace(mut self, namespace: Option<String>) -> Self {
        self.namespace = namespace;
        self
    }

    /// Pass `--all-namespaces`; takes precedence over [`Self::with_namespace`].
    pub fn with_all_namespaces(mut self, all_namespaces: bool) -> Self {
        self.all_namespaces = all_namespaces;
        self
    }

    /// The arguments the child receives for `args`.
    pub fn command_args(&self, args: &[String]) -> Vec<String> {
        let mut command_args = args.to_vec();
        if let Some(context) = &self.context {
            command_args.push(format!("--context={context}"));
        }
        if self.all_namespaces {
            command_args.push("--all-namespaces".to_string());
        } else if let Some(namespace) = &self.namespace {
            command_args.push(format!("--namespace={namespace}"));
        }
        command_args
    }

    fn command(&self, program: &str, args: &[String]) -> Command {
        let mut command = Command::new(program);
        command
            .args(self.command_args(args))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(kubeconfig) = &self.kubeconfig {
            command.env("KUBECONFIG", kubeconfig);
        }
        command
    }
}

impl QueryExecutor for ProcessExecutor {
    async fn execute(&self, program: &str, args: &[String]) -> std::io::Result<ExecOutput> {
        let output = self.command(program, args).output().await?;
        Ok(ExecOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            // No exit code when terminated by a signal.
            exit_code: output.status.code().unwrap_or(-1),
        })
    }
}

/// Turns a [`QuerySpec`] into a rendered command or an executed query.
#[derive(Debug, Clone)]
pub struct QueryBuilder<E> {
    executor: E,
    executable: String,
}

impl<E: QueryExecutor> QueryBuilder<E> {
    pub fn new(executor: E) -> Self {
        Self {
            executor,
            executable: DEFAULT_EXECUTABLE.to_string(),
        }
    }

    pub fn with_executable(mut self, executable: impl Into<String>) -> Self {
        self.executable = executable.into();
        self
    }

    /// Render the query for a dry run, or execute it and return its standard output.
    ///
    /// # Errors
    /// - [`Error::Exec`] when the executable cannot be started or exits non-zero.
    /// - [`Error::Cancelled`] when `cancel` fires first, including before a dry run.
    pub async fn build(&self, spec: &QuerySpec, cancel: &CancellationToken) -> Result<QueryResult> {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        if spec.dry_run {
            let rendered = spec.render(&self.executable);
            trace!(command = %rendered, "rendered dry-run query");
            return Ok(QueryResult::Rendered(rendered));
        }

        let args = spec.args();
        debug!(program = %self.executable, ?args, "executing query");
        let output = cancellable(cancel, async {
            self.executor
                .execute(&self.executable, &args)
                .await
                .map_err(|source| {
                    Error::from(ExecError::Spawn {
                        program: self.executable.clone(),
                        source,
                    })
                })
        })
        .await?;

        if output.exit_code != 0 {
            return Err(ExecError::Status {
                program: self.executable.clone(),
                exit_code: output.exit_code,
                stderr: output.stderr,
            }
            .into());
        }

        Ok(QueryResult::Executed {
            stdout: output.stdout,
            stderr: output.stderr,
            exit_code: output.exit_code,
        })
    }
}
