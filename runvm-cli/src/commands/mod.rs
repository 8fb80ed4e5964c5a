pub mod kill;
pub mod pause;
pub mod resume;
pub mod run;
pub mod state;
pub mod verify_image;

use runvm::RunvmResult;

/// Run a blocking lifecycle call off the async runtime.
pub async fn blocking<T, F>(f: F) -> anyhow::Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> RunvmResult<T> + Send + 'static,
{
    Ok(tokio::task::spawn_blocking(f).await??)
}

/// Apply `op` to every target, reporting each failure and summarising at the end.
pub async fn for_each_target<F>(targets: Vec<String>, verb: &str, op: F) -> anyhow::Result<()>
where
    F: Fn(&str) -> RunvmResult<()> + Clone + Send + 'static,
{
    let mut errors = Vec::new();
    let mut success_count = 0;

    for target in targets {
        let op = op.clone();
        let id = target.clone();
        match blocking(move || op(&id)).await {
            Ok(()) => {
                println!("{}", target);
                success_count += 1;
            }
            Err(e) => {
                eprintln!("Error: failed to {} '{}': {:#}", verb, target, e);
                errors.push(format!("{}: {:#}", target, e));
            }
        }
    }

    if !errors.is_empty() {
        let error_summary = if success_count > 0 {
            format!(
                "Failed to {} {} of {} VM(s)",
                verb,
                errors.len(),
                errors.len() + success_count
            )
        } else {
            format!("Failed to {} all {} VM(s)", verb, errors.len())
        };

        anyhow::bail!("{}\nErrors:\n  {}", error_summary, errors.join("\n  "));
    }
    Ok(())
}
