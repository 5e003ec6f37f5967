use anyhow::Context;
use clap::Parser;
use mimalloc::MiMalloc;
use stampede::cli::{Cli, Settings};
use stampede::executor::HttpExecutor;
use stampede::{dispatcher, logging, progress, render};
use std::io::Write;
use std::sync::Arc;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

fn main() -> anyhow::Result<()> {
    logging::init_tracing_once();
    let Settings {
        config,
        format,
        progress: draw_progress,
    } = Cli::parse().into_settings()?;
    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to build tokio runtime")?;
    let report = rt.block_on(async move {
        let total = config.requests;
        let run = dispatcher::dispatch(Arc::new(config), Arc::new(HttpExecutor::default()))?;
        let observer = draw_progress.then(|| {
            tokio::spawn(progress::observe(
                run.progress(),
                total,
                run.started(),
                std::io::stderr(),
            ))
        });
        let report = run.collect().await;
        if let Some(observer) = observer {
            match observer.await {
                Ok(Ok(_)) => {}
                Ok(Err(e)) => tracing::warn!(error = %e, "failed to draw progress"),
                Err(e) => tracing::warn!(error = %e, "progress task failed"),
            }
        }
        anyhow::Ok(report)
    })?;
    let rendered = render::render(&report, format).context("failed to render report")?;
    let mut stdout = std::io::stdout().lock();
    stdout
        .write_all(rendered.as_bytes())
        .context("failed to write report")?;
    stdout.flush().context("failed to flush report")?;
    Ok(())
}
