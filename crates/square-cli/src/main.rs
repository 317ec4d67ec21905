//! `square` - command-line client for the Public Square feed

mod render;

use anyhow::{bail, Context, Result};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use square_feed::{Feed, PostSnapshot, Services, SquareConfig};
use square_ledger::{Address, PostFilter, TxId, APP_NAME};
use square_wallet::{connect_signer, JsonRpcBridge, PostDraft, WalletProvider, DEFAULT_BRIDGE_URL};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn filter_args(command: Command) -> Command {
    command
        .arg(
            Arg::new("topic")
                .long("topic")
                .help("Only posts tagged with this topic"),
        )
        .arg(
            Arg::new("author")
                .long("author")
                .help("Only posts by this wallet address"),
        )
        .arg(
            Arg::new("count")
                .long("count")
                .value_parser(value_parser!(u32))
                .help("Page size (at most 100)"),
        )
}

fn cli() -> Command {
    Command::new("square")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Read and post to the Public Square feed")
        .subcommand_required(true)
        .arg(
            Arg::new("config")
                .long("config")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("TOML configuration file"),
        )
        .arg(
            Arg::new("graphql-url")
                .long("graphql-url")
                .global(true)
                .help("Override the GraphQL endpoint"),
        )
        .arg(
            Arg::new("gateway-url")
                .long("gateway-url")
                .global(true)
                .help("Override the content gateway"),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Emit logs as JSON"),
        )
        .subcommand(filter_args(
            Command::new("feed").about("Load a page of posts").arg(
                Arg::new("wait")
                    .long("wait")
                    .action(ArgAction::SetTrue)
                    .help("Wait for bodies and profiles before printing"),
            ),
        ))
        .subcommand(filter_args(
            Command::new("await")
                .about("Poll until a submitted post is indexed")
                .arg(Arg::new("txid").required(true).help("Transaction id to wait for")),
        ))
        .subcommand(
            Command::new("profile")
                .about("Resolve the author identity of an address")
                .arg(Arg::new("address").required(true).help("Wallet address")),
        )
        .subcommand(
            Command::new("post")
                .about("Submit a post through a wallet and wait for it")
                .arg(Arg::new("body").required(true).help("Post text"))
                .arg(Arg::new("topic").long("topic").help("Topic tag"))
                .arg(
                    Arg::new("wallet")
                        .long("wallet")
                        .default_value("arconnect")
                        .value_parser(["arconnect", "arweave-app"])
                        .help("Wallet provider"),
                )
                .arg(
                    Arg::new("bridge")
                        .long("bridge")
                        .default_value(DEFAULT_BRIDGE_URL)
                        .help("Wallet bridge endpoint"),
                ),
        )
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn load_config(args: &ArgMatches) -> Result<SquareConfig> {
    let mut config = match args.get_one::<PathBuf>("config") {
        Some(path) => SquareConfig::load(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => SquareConfig::default(),
    };

    if let Some(url) = args.get_one::<String>("graphql-url") {
        config = config.with_graphql_url(url.clone());
    }
    if let Some(url) = args.get_one::<String>("gateway-url") {
        config = config.with_gateway_url(url.clone());
    }

    config.validate()?;
    Ok(config)
}

fn page_filter(args: &ArgMatches, config: &SquareConfig) -> PostFilter {
    let mut filter = PostFilter::new().with_count(
        args.get_one::<u32>("count")
            .copied()
            .unwrap_or(config.page_size),
    );
    if let Some(topic) = args.get_one::<String>("topic") {
        filter = filter.with_topic(topic.clone());
    }
    if let Some(author) = args.get_one::<String>("author") {
        filter = filter.with_author(author.as_str());
    }
    filter
}

fn print_posts(snapshots: &[PostSnapshot]) {
    for snapshot in snapshots {
        println!("{}", render::post(snapshot));
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = cli().get_matches();
    init_tracing(matches.get_flag("json"));

    let config = load_config(&matches)?;
    let services = Services::from_config(&config);

    match matches.subcommand() {
        Some(("feed", args)) => {
            let feed = Feed::new(services, &config);
            let posts = feed.load(&page_filter(args, &config)).await?;

            let snapshots = if args.get_flag("wait") {
                feed.settled().await
            } else {
                posts.iter().map(|post| post.snapshot()).collect()
            };
            if snapshots.is_empty() {
                println!("No posts.");
            }
            print_posts(&snapshots);
        }
        Some(("await", args)) => {
            let Some(txid) = args.get_one::<String>("txid") else {
                bail!("missing transaction id");
            };
            let feed = Feed::new(services, &config);
            let outcome = feed
                .await_post(&TxId::new(txid.as_str()), &page_filter(args, &config))
                .await?;

            info!(attempts = outcome.attempts, waited = ?outcome.waited, "post indexed");
            print_posts(&feed.settled().await);
        }
        Some(("profile", args)) => {
            let Some(address) = args.get_one::<String>("address") else {
                bail!("missing address");
            };
            let identity = services.profiles.resolve(&Address::new(address.as_str())).await;
            println!("{}", render::identity(&identity));
        }
        Some(("post", args)) => {
            let Some(body) = args.get_one::<String>("body") else {
                bail!("missing post body");
            };
            let mut draft = PostDraft::new(body.as_str());
            if let Some(topic) = args.get_one::<String>("topic") {
                draft = draft.with_topic(topic.as_str());
            }

            let provider = match args.get_one::<String>("wallet").map(String::as_str) {
                Some("arweave-app") => WalletProvider::ArweaveApp,
                _ => WalletProvider::ArConnect,
            };
            let bridge_url = args
                .get_one::<String>("bridge")
                .map_or(DEFAULT_BRIDGE_URL, String::as_str);
            let signer = connect_signer(provider, Arc::new(JsonRpcBridge::with_url(bridge_url)), APP_NAME)
                .await
                .context("connecting wallet")?;

            let mut filter = PostFilter::new().with_count(config.page_size);
            if let Some(topic) = &draft.topic {
                filter = filter.with_topic(topic.clone());
            }

            let feed = Feed::new(services, &config);
            let outcome = feed.publish(signer.as_ref(), &draft, &filter).await?;
            print_posts(&[outcome.posts[0].settled().await]);
        }
        _ => bail!("unknown command"),
    }

    Ok(())
}
