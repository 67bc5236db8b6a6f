use anyhow::Result;

use hollywool_application::{Activity, Workbench};
use hollywool_core::config::HollywoolConfig;
use hollywool_infrastructure::HollywoolPaths;

fn print_activity(activity: &Activity) {
    let mut line = format!(
        "  {:<20} {:<10} {:>5.1}%  {}  ({})",
        activity.kind.to_string(),
        activity.status.as_str(),
        activity.progress,
        activity.title,
        activity.time_ago
    );
    if let Some(error) = &activity.error {
        line.push_str(&format!("  error: {error}"));
    }
    println!("{line}");
}

pub async fn run(config: &HollywoolConfig, paths: &HollywoolPaths, json: bool) -> Result<()> {
    let workbench = Workbench::from_config(config, paths)?;
    let feed = workbench.notifications().refresh().await;

    if json {
        println!("{}", serde_json::to_string_pretty(&feed)?);
        return Ok(());
    }

    println!("Active ({})", feed.active.len());
    feed.active.iter().for_each(print_activity);
    println!("Done ({})", feed.done.len());
    feed.done.iter().for_each(print_activity);
    Ok(())
}
