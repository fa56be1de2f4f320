//! Process assembly.
//!
//! Turns validated [`Options`] into supervised tasks:
//!
//! | task           | runs when                              | stops on            |
//! |----------------|----------------------------------------|---------------------|
//! | `signal`       | always                                 | SIGINT / SIGTERM    |
//! | `http`         | always                                 | interrupt           |
//! | `timer`        | `--duration` is non-zero               | duration elapsed    |
//! | `writer`       | write endpoint set                     | shutdown + verdict  |
//! | `reader`       | write and read endpoints set           | shutdown + verdict  |
//! | `query-reader` | read endpoint and queries file set     | shutdown            |
//!
//! The probe tasks share one shutdown token; interrupting any of them
//! cancels it for all.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, info, info_span};

use crate::client::{self, QueryClient, RemoteWriteClient};
use crate::config::Options;
use crate::counters::OutcomeCounters;
use crate::probe::{NamedQueryProbe, ReadProbe, WriteProbe};
use crate::runner::{PeriodicRunner, QueryLoop};
use crate::supervisor::Supervisor;
use crate::telemetry;
use crate::{Result, UpError};

/// Run the probe until its duration elapses or a signal arrives.
///
/// Installs the global metrics recorder, so call at most once per process.
pub async fn run(options: Options) -> Result<()> {
    let mut supervisor = Supervisor::new();
    add_signal_listener(&mut supervisor);
    add_metrics_server(&mut supervisor, options.listen)?;
    add_probes(
        &mut supervisor,
        &options,
        OutcomeCounters::new(),
        client::http_client()?,
        CancellationToken::new(),
    );
    supervisor.run().await
}

/// Register the probe tasks (and the run-duration timer) for `options`.
///
/// Every probe task is interrupted by cancelling `shutdown`.
pub fn add_probes(
    supervisor: &mut Supervisor,
    options: &Options,
    counters: OutcomeCounters,
    http: Client,
    shutdown: CancellationToken,
) {
    if let Some(duration) = options.duration {
        add_timer(supervisor, duration);
    }

    if let Some(endpoint) = options.write_endpoint.clone() {
        let client = RemoteWriteClient::new(http.clone(), endpoint, options.token.clone());
        let probe = Arc::new(WriteProbe::new(client, options.labels.clone()));
        let runner =
            PeriodicRunner::new(options.period, options.success_threshold, counters.clone());
        let token = shutdown.clone();
        add_probe_task(
            supervisor,
            "writer",
            async move {
                info!("starting the writer");
                runner.run(probe, token).await
            },
            &shutdown,
        );
    }

    if let (Some(endpoint), Some(_)) = (options.read_endpoint.clone(), &options.write_endpoint) {
        let client = QueryClient::new(http.clone(), endpoint, options.token.clone());
        let probe = Arc::new(ReadProbe::new(
            Arc::new(client),
            &options.labels,
            options.initial_query_delay,
            options.latency,
        ));
        let runner =
            PeriodicRunner::new(options.period, options.success_threshold, counters.clone())
                .initial_delay(options.initial_query_delay);
        let token = shutdown.clone();
        add_probe_task(
            supervisor,
            "reader",
            async move {
                info!("starting the reader");
                runner.run(probe, token).await
            },
            &shutdown,
        );
    }

    if let (Some(endpoint), Some(queries)) = (options.read_endpoint.clone(), options.queries.clone()) {
        let client = QueryClient::at_api_root(http, endpoint, options.token.clone());
        let probe = NamedQueryProbe::new(Arc::new(client), counters);
        let query_loop = QueryLoop::new(probe, queries, options.initial_query_delay);
        let token = shutdown.clone();
        add_probe_task(
            supervisor,
            "query-reader",
            async move {
                info!("starting the reader for queries");
                query_loop.run(token).await
            },
            &shutdown,
        );
    }
}

fn add_probe_task<F>(
    supervisor: &mut Supervisor,
    component: &'static str,
    execute: F,
    shutdown: &CancellationToken,
) where
    F: Future<Output = Result<()>> + Send + 'static,
{
    let shutdown = shutdown.clone();
    supervisor.add(
        component,
        execute.instrument(info_span!("probe", component)),
        move || shutdown.cancel(),
    );
}

/// A task that ends once `duration` has elapsed, which stops the others.
fn add_timer(supervisor: &mut Supervisor, duration: Duration) {
    let stop = CancellationToken::new();
    let interrupt = stop.clone();
    supervisor.add("timer", wait_for(duration, stop), move || interrupt.cancel());
}

async fn wait_for(duration: Duration, stop: CancellationToken) -> Result<()> {
    tokio::select! {
        _ = tokio::time::sleep(duration) => info!(?duration, "run duration elapsed"),
        _ = stop.cancelled() => {}
    }
    Ok(())
}

fn add_signal_listener(supervisor: &mut Supervisor) {
    let stop = CancellationToken::new();
    let interrupt = stop.clone();
    supervisor.add("signal", listen_for_signal(stop), move || interrupt.cancel());
}

async fn listen_for_signal(stop: CancellationToken) -> Result<()> {
    tokio::select! {
        caught = shutdown_signal() => {
            caught?;
            info!(component = "signal", "caught interrupt");
        }
        _ = stop.cancelled() => {}
    }
    Ok(())
}

#[cfg(unix)]
async fn shutdown_signal() -> Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut terminate = signal(SignalKind::terminate())?;
    tokio::select! {
        caught = tokio::signal::ctrl_c() => caught?,
        _ = terminate.recv() => {}
    }
    Ok(())
}

#[cfg(not(unix))]
async fn shutdown_signal() -> Result<()> {
    tokio::signal::ctrl_c().await?;
    Ok(())
}

fn add_metrics_server(supervisor: &mut Supervisor, listen: SocketAddr) -> Result<()> {
    let (recorder, serve) = telemetry::exporter(listen)?;
    telemetry::install(recorder)?;

    let stop = CancellationToken::new();
    let interrupt = stop.clone();
    supervisor.add("http", serve_metrics(listen, serve, stop), move || {
        interrupt.cancel()
    });
    Ok(())
}

async fn serve_metrics(
    listen: SocketAddr,
    serve: telemetry::ExporterFuture,
    stop: CancellationToken,
) -> Result<()> {
    info!(component = "http", address = %listen, "starting the HTTP server");
    tokio::select! {
        served = serve => {
            served?;
            Err(UpError::Http("internal server closed unexpectedly".into()))
        }
        _ = stop.cancelled() => {
            info!(component = "http", "shutting down internal server");
            Ok(())
        }
    }
}
