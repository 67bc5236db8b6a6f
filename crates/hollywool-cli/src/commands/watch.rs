use anyhow::Result;
use tokio::time::MissedTickBehavior;

use hollywool_application::Workbench;
use hollywool_core::config::HollywoolConfig;
use hollywool_infrastructure::HollywoolPaths;

use super::job_line;

async fn print_live(workbench: &Workbench) {
    let jobs = workbench.live_jobs().await;
    if jobs.is_empty() {
        println!("No live jobs.");
    }
    for (job, view) in &jobs {
        println!("{}", job_line(job, view));
    }
}

pub async fn run(config: &HollywoolConfig, paths: &HollywoolPaths, once: bool) -> Result<()> {
    let workbench = Workbench::from_config(config, paths)?;

    if once {
        for kind in workbench.notifications().kinds() {
            if let Some(poller) = workbench.poller(kind)
                && let Err(e) = poller.poll_list_once().await
            {
                eprintln!("warning: could not list {kind} jobs: {e}");
            }
        }
        print_live(&workbench).await;
        workbench.shutdown().await;
        return Ok(());
    }

    workbench.start().await;
    let mut ticker = tokio::time::interval(config.list_poll_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = ticker.tick() => {
                println!("---");
                print_live(&workbench).await;
            }
        }
    }
    workbench.shutdown().await;
    Ok(())
}
