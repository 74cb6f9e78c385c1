//! A minimal demo operator built on `reconcile_core`: it watches `Echo`
//! custom resources and mirrors `spec.message` into `status.echoedMessage`.
//! Exists to exercise the crate end-to-end, the way the teacher's own
//! binary wires its CRDs into its operator runtime.

use std::{net::SocketAddr, path::PathBuf, sync::Arc};

use clap::Parser;
use kube::CustomResource;
use reconcile_core::{
    client::{try_new, KubeApiClient},
    config::OperatorConfig,
    controller::Controller,
    descriptor::ResourceDescriptor,
    logging,
    operator::Operator,
    watcher::Watcher,
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

/// `spec` of the `Echo` custom resource.
#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, JsonSchema)]
#[kube(
    group = "examples.reconcile-core.rs",
    version = "v1",
    kind = "Echo",
    namespaced,
    status = "EchoStatus",
    shortname = "echo"
)]
pub struct EchoSpec {
    pub message: String,
}

/// `status` of the `Echo` custom resource.
#[derive(Serialize, Deserialize, Clone, Debug, Default, JsonSchema, PartialEq)]
pub struct EchoStatus {
    #[serde(rename = "echoedMessage")]
    pub echoed_message: Option<String>,
    #[serde(rename = "observedGeneration")]
    pub observed_generation: Option<i64>,
}

#[derive(Parser, Debug)]
#[command(name = "echo-operator", about = "Demo operator built on reconcile-core")]
struct Args {
    /// Path to a kubeconfig file. Defaults to the environment/in-cluster config.
    #[arg(long)]
    kubeconfig: Option<PathBuf>,

    /// Path to a configuration file layered on top of the built-in defaults.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Verbosity, repeatable (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    logging::init(args.verbose)?;

    let config = OperatorConfig::load(args.config)?;
    let kube_client = try_new(args.kubeconfig).await?;

    let client = match &config.watch_namespace {
        Some(namespace) => Arc::new(KubeApiClient::<Echo>::namespaced(kube_client, namespace)),
        None => Arc::new(KubeApiClient::<Echo>::cluster(kube_client)),
    };

    let descriptor = ResourceDescriptor::new("examples.reconcile-core.rs", "v1", "echoes");
    let controller = Arc::new(
        Controller::<Echo, KubeApiClient<Echo>, kube::Error>::new(
            descriptor,
            Arc::clone(&client),
            config.retry_policy.clone().into(),
            config.discard_duplicate_generations,
        )
        .on_add_or_modify(Box::new(|obj, ctx| {
            Box::pin(async move {
                let status = serde_json::json!({
                    "echoedMessage": obj.spec.message,
                    "observedGeneration": obj.metadata.generation,
                });
                ctx.update_status(&obj, status).await?;
                Ok(())
            })
        })),
    );

    let watcher = Watcher::new(Arc::clone(&controller), client, config.watch_label_selector.clone());

    let operator = Arc::new(Operator::new());
    operator.add_watcher(Box::new(move |cancel| {
        tokio::spawn(async move { watcher.run(cancel).await.map_err(|err| err.to_string()) })
    }))?;

    let listen: SocketAddr = config.listen.parse()?;
    let http_cancel = operator.cancellation();
    let http_task = tokio::spawn(async move {
        if let Err(err) = reconcile_core::http::serve(listen, http_cancel).await {
            error!(error = %err, "liveness/metrics server exited with an error");
        }
    });

    let operator_for_signal = Arc::clone(&operator);
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        info!("received shutdown signal");
        operator_for_signal.stop();
    });

    let code = operator.start().await?;
    operator.stop();
    http_task.abort();

    std::process::exit(code);
}
