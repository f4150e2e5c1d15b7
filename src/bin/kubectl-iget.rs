use std::path::PathBuf;

use anyhow::Context;
use clap::{CommandFactory, Parser};
use kubeiget::{
    CancellationToken, DynamicLister, Error, ProcessExecutor, QueryBuilder, QuerySpec,
    ResourceDescriptor, SchemaResolver, Settings, claputil, clap_complete::env::CompleteEnv,
    kube::Client, object_names,
};
use tracing::warn;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "kubectl-iget",
    version,
    about = "Interactive get for Kubernetes objects",
    long_about = "Resolve a resource type the way `kubectl get` does (kind, plural, singular \
                  or short name), then list its objects or build a `kubectl get` query with \
                  custom columns and field selectors."
)]
struct Cli {
    /// Resource type, e.g. `pods`, `po` or `Deployment`.
    #[arg(add = claputil::resource_value_completer())]
    resource: String,

    /// Namespace to list in; defaults to the context namespace.
    #[arg(short, long)]
    namespace: Option<String>,

    /// List across all namespaces.
    #[arg(short = 'A', long, conflicts_with = "namespace")]
    all_namespaces: bool,

    #[arg(long, add = claputil::context_value_completer())]
    /// Kubernetes context to target.
    context: Option<String>,

    /// Kubeconfig file to use instead of the default lookup.
    #[arg(long)]
    kubeconfig: Option<PathBuf>,

    /// Settings file (default is $HOME/.kubectl-iget.yaml).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Custom columns, e.g. `NAME:.metadata.name,STATUS:.status.phase`.
    #[arg(short = 'c', long = "columns", value_delimiter = ',')]
    columns: Vec<String>,

    /// Field selectors, e.g. `status.phase=Running`.
    #[arg(long = "field-selector", value_delimiter = ',')]
    field_selectors: Vec<String>,

    /// Print the query instead of running it.
    #[arg(long)]
    dry_run: bool,

    /// Executable used to run queries.
    #[arg(long)]
    kubectl: Option<String>,
}

impl Cli {
    fn settings_overrides(&self) -> Settings {
        Settings {
            kubeconfig: self.kubeconfig.clone(),
            context: self.context.clone(),
            namespace: self.namespace.clone(),
            executable: self.kubectl.clone(),
        }
    }

    fn builds_query(&self) -> bool {
        self.dry_run || !self.columns.is_empty() || !self.field_selectors.is_empty()
    }

    /// The resource type handed to the executable: the resolved plural name, or
    /// the raw input when a dry run could not resolve it.
    fn query_resource<'a>(&'a self, descriptor: Option<&'a ResourceDescriptor>) -> &'a str {
        descriptor.map_or(self.resource.as_str(), |d| d.plural_name.as_str())
    }

    /// An executor scoped like a list would be: all namespaces with `-A`, the
    /// configured namespace for namespaced resources, and kubectl's own default
    /// otherwise.
    fn query_executor(
        &self,
        settings: &Settings,
        descriptor: Option<&ResourceDescriptor>,
    ) -> ProcessExecutor {
        let namespaced = descriptor.is_none_or(|d| d.namespaced);
        ProcessExecutor::new()
            .with_kubeconfig(settings.kubeconfig.clone())
            .with_context(settings.context.clone())
            .with_all_namespaces(self.all_namespaces)
            .with_namespace(settings.namespace.clone().filter(|_| namespaced))
    }
}

async fn resolve(
    settings: &Settings,
    resource: &str,
    cancel: &CancellationToken,
) -> anyhow::Result<(Client, ResourceDescriptor)> {
    let client = settings
        .client()
        .await
        .context("failed to create Kubernetes client")?;
    let descriptor = SchemaResolver::new(client.clone())
        .resolve(resource, cancel)
        .await?;
    Ok((client, descriptor))
}

/// The resolved descriptor for a query. A dry run only renders text, so it
/// goes ahead without one when the cluster cannot be reached or the type is
/// unknown, unless it was cancelled.
fn query_descriptor<C>(
    resolved: anyhow::Result<(C, ResourceDescriptor)>,
    dry_run: bool,
    resource: &str,
) -> anyhow::Result<Option<ResourceDescriptor>> {
    match resolved {
        Ok((_, descriptor)) => Ok(Some(descriptor)),
        Err(err) if dry_run && !is_cancelled(&err) => {
            warn!(
                resource,
                error = %format!("{err:#}"),
                "rendering unresolved resource type"
            );
            Ok(None)
        }
        Err(err) => Err(err),
    }
}

fn is_cancelled(err: &anyhow::Error) -> bool {
    matches!(err.downcast_ref::<Error>(), Some(Error::Cancelled))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    CompleteEnv::with_factory(Cli::command).complete();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let settings = Settings::load(cli.config.as_deref())
        .context("failed to load settings")?
        .merge(cli.settings_overrides());

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        }
    });

    let resolved = resolve(&settings, &cli.resource, &cancel).await;

    if cli.builds_query() {
        let descriptor = query_descriptor(resolved, cli.dry_run, &cli.resource)?;
        let executor = cli.query_executor(&settings, descriptor.as_ref());
        let spec = QuerySpec::new(cli.query_resource(descriptor.as_ref()))
            .with_fields(cli.columns.iter().cloned())
            .with_filters(cli.field_selectors.iter().cloned())
            .with_dry_run(cli.dry_run);
        let result = QueryBuilder::new(executor)
            .with_executable(settings.executable())
            .build(&spec, &cancel)
            .await?;
        if spec.dry_run {
            println!("{}", result.output());
        } else {
            print!("{}", result.output());
        }
        return Ok(());
    }

    let (client, descriptor) = resolved?;
    let namespace = if cli.all_namespaces || !descriptor.namespaced {
        String::new()
    } else {
        settings
            .resolve_namespace()
            .context("failed to determine namespace")?
    };

    let objects = DynamicLister::new(client)
        .list(&descriptor, &namespace, &cancel)
        .await?;
    for name in object_names(&objects, namespace.is_empty()) {
        println!("{name}");
    }

    Ok(())
}
