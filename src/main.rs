use tracing::{error, info, Level};

use relay::{
    configuration::{
        get_configuration, set_configuration, AppState, Config, State,
    },
    dao::DataBase,
    error::Error,
    provider::WebPush,
    server,
};

#[tokio::main]
async fn main() -> Result<(), Error> {
    let result = app_main().await;

    if let Err(err) = &result {
        error!("{}", err);
    }

    result
}

async fn app_main() -> Result<(), Error> {
    let subscriber = tracing_subscriber::fmt()
        .compact()
        .with_level(true)
        .with_max_level(Level::INFO)
        .with_file(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    let (config, database) = match init().await {
        Ok((config, database)) => (config, database),
        Err(e) => return Err(Error::ConfigurationError(e.to_string())),
    };

    let push = WebPush::new(&config)?;

    info!("relay listening on {}:{}", config.server_host, config.port);

    let state = State::new(config, database, push);
    let app_state = AppState::new(state);

    server::server_task(&app_state).await
}

async fn init() -> Result<(Config, DataBase), Error> {
    set_configuration()?;
    let config = get_configuration()?;
    let database = DataBase::new(&config).await?;
    Ok((config, database))
}
