use crate::CLAP_STYLING;
use clap::arg;

pub fn command_argument_builder() -> clap::Command {
    clap::Command::new("seedcrawl")
        .version(env!("CARGO_PKG_VERSION"))
        .bin_name("seedcrawl")
        .about("Fetch a set of seed pages concurrently and list the unique absolute links they contain")
        .styles(CLAP_STYLING)
        .arg(
            arg!([URL] ...)
                .required(false)
                .help("Seed pages to crawl. Only these pages are fetched, links are not followed"),
        )
        .arg(
            arg!(-q --"quiet")
                .required(false)
                .help("Only log errors")
                .conflicts_with("verbose"),
        )
        .arg(
            arg!(-v --"verbose" ...)
                .required(false)
                .help("Log more detail (-v info, -vv debug, -vvv trace)"),
        )
        .arg(
            arg!(--"timeout" <SECONDS>)
                .required(false)
                .help("Per-request timeout in seconds")
                .value_parser(clap::value_parser!(u64).range(1..))
                .default_value("10"),
        )
}
