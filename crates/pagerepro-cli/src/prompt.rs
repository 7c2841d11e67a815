use pagerepro_engine::{DefectAcknowledger, DefectNotice};
use tokio::io::{AsyncBufReadExt, BufReader};

/// Prints where to find the server stack trace and waits for Enter, so the
/// container is still around while the operator looks.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsolePrompt;

impl DefectAcknowledger for ConsolePrompt {
    async fn acknowledge(&self, notice: &DefectNotice) {
        println!();
        println!("Reproduced: {}", notice.message);
        println!(
            "Container '{}' is still running. Inspect the server stack trace with:",
            notice.container_name
        );
        println!("  {}", notice.logs_hint);
        println!("Press Enter to tear down the container...");

        let mut line = String::new();
        let mut stdin = BufReader::new(tokio::io::stdin());
        if let Err(e) = stdin.read_line(&mut line).await {
            tracing::warn!(error = %e, "Could not read stdin, continuing to teardown");
        }
    }
}
