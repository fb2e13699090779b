use std::io::Write;

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format(|buf, record| writeln!(buf, "[{}] {}", record.level(), record.args()))
        .init();

    if let Err(e) = comicrawl::cli::run().await {
        log::error!("{}", e.user_message());
    }

    // Prompt reads may still be blocking a worker thread
    std::process::exit(0);
}
