mod shell;

use shell::Shell;
use sp_core::SpliceError;
use sp_core::SpliceResult;
use sp_nav::HttpPageLoader;
use sp_nav::NavigatorConfig;
use sp_net::ClientConfig;
use sp_net::PageUrl;
use sp_net::TrustStoreMode;
use std::io::BufRead;
use std::io::Write;
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_DIRECTIVES: &str = "splice_shell=info,sp_nav=info";

fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_DIRECTIVES));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let start = match start_url_from_args() {
        Ok(url) => url,
        Err(error) => {
            eprintln!("splice-shell: {error}");
            eprintln!("usage: splice-shell <start-url>");
            std::process::exit(2);
        }
    };

    if let Err(error) = run(start) {
        eprintln!("splice-shell: {error}");
        std::process::exit(1);
    }
}

fn start_url_from_args() -> SpliceResult<PageUrl> {
    let mut args = std::env::args().skip(1);
    let raw = args
        .next()
        .ok_or_else(|| SpliceError::new("shell.args.missing_url", "missing start URL"))?;
    if let Some(extra) = args.next() {
        return Err(SpliceError::new(
            "shell.args.unexpected",
            format!("unexpected argument `{extra}`"),
        ));
    }
    PageUrl::parse(&raw)
}

fn client_config_from_env() -> SpliceResult<ClientConfig> {
    let mut config = ClientConfig::default();
    if let Ok(value) = std::env::var("SPLICE_TRUST_STORE") {
        config.trust_store = TrustStoreMode::from_token(&value).ok_or_else(|| {
            SpliceError::new(
                "shell.config.invalid_trust_store",
                format!("SPLICE_TRUST_STORE must be `webpki` or `os`, got `{value}`"),
            )
        })?;
    }
    Ok(config)
}

fn run(start: PageUrl) -> SpliceResult<()> {
    let loader = HttpPageLoader::new(client_config_from_env()?)?;
    let mut shell = Shell::open(NavigatorConfig::from_env()?, loader, start)?;
    shell.print_summary();

    let stdin = std::io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        print!("splice> ");
        let _ = std::io::stdout().flush();

        let Some(Ok(line)) = lines.next() else {
            break;
        };
        match shell.execute(&line) {
            Ok(true) => {}
            Ok(false) => break,
            Err(error) => println!("error: {error}"),
        }
    }
    Ok(())
}
