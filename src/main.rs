// src/main.rs

use cronlock::exec::TaskRegistry;

#[tokio::main]
async fn main() {
    if let Err(err) = cronlock::cli_main(TaskRegistry::new()).await {
        eprintln!("cronlock error: {err:?}");
        std::process::exit(1);
    }
}
