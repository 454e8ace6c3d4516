use seedcrawl::commands::command_argument_builder;
use seedcrawl::handlers::{handle_crawl, init_logging, log_level};

#[tokio::main]
async fn main() {
    let args = command_argument_builder().get_matches();
    init_logging(log_level(args.get_flag("quiet"), args.get_count("verbose")));

    // Failed seeds are logged and skipped; only a broken setup ends up here
    if let Err(e) = handle_crawl(&args).await {
        eprintln!("✗ Crawl failed: {:#}", e);
        std::process::exit(1);
    }
}
