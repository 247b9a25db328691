use flowz_dashboard::{DashboardRunner, UserAction};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    // 1. Create Runner
    let args: Vec<String> = std::env::args().collect();
    let default_config = "config.toml".to_string();
    let config_path = args.get(1).unwrap_or(&default_config);
    if !std::path::Path::new(config_path).exists() {
        eprintln!(
            "Config file '{}' not found. Please create one.",
            config_path
        );
        std::process::exit(1);
    }

    let runner = DashboardRunner::new(config_path)?;

    // 2. Forward stdin lines as user actions
    let (tx, rx) = mpsc::channel(32);
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if line.trim().is_empty() {
                continue;
            }
            match line.parse::<UserAction>() {
                Ok(action) => {
                    let quit = action == UserAction::Quit;
                    if tx.send(action).await.is_err() || quit {
                        break;
                    }
                }
                Err(e) => eprintln!("{}", e),
            }
        }
    });

    // 3. Run
    if let Err(e) = runner.run(rx).await {
        eprintln!("Dashboard error: {}", e);
        std::process::exit(1);
    }

    Ok(())
}
