use eventhub_dumper::{
    app,
    options::{ParseError, Options, EXIT_FAILURE, EXIT_SUCCESS},
    Config,
};

#[tokio::main]
async fn main() {
    // Settings may come from a .env file in the working directory
    let _ = dotenv::dotenv();
    env_logger::init();

    let code = match Options::parse_config(std::env::args_os()) {
        Ok(config) => run(config).await,
        Err(err) => report(err),
    };
    std::process::exit(code)
}

async fn run(config: Config) -> i32 {
    match app::connect_and_run(config).await {
        Ok(()) => EXIT_SUCCESS,
        Err(err) => {
            log::error!("{:?}", err);
            eprintln!("error: {}", err);
            EXIT_FAILURE
        }
    }
}

fn report(err: ParseError) -> i32 {
    match &err {
        ParseError::Arguments(clap_err) => {
            if let Err(io_err) = clap_err.print() {
                log::error!("Failed to print usage: {}", io_err);
            }
        }
        ParseError::Validation(_) => eprintln!("{}", err.render()),
    }

    let code = err.exit_code();
    if !err.is_help_or_version() {
        eprintln!("errors {}", err.error_count());
        eprintln!("Exit code {}", code);
    }
    code
}
