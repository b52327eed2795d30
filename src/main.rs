use std::{net::SocketAddr, path::PathBuf, str::FromStr, sync::Arc};

use clap::Parser;
use tera::Tera;
use tokio::net::TcpListener;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use crate::{site::Context, store::Store};

mod error;
mod pipeline;
mod registry;
mod server;
mod site;
mod store;

#[derive(Parser, Debug)]
#[command(name = "sitekeeper")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Site root holding config.toml, data/, templates/ and assets/
    #[arg(default_value = ".")]
    path: String,
    /// Where rendered pages land, overriding config.toml (default: the site root)
    output_dir: Option<String>,
    /// Render all registered pages once and exit instead of serving
    #[arg(short, long)]
    build: bool,
    /// Port for the admin server (overrides config.toml)
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    debug!(?args, "starting");

    let home = PathBuf::from_str(&args.path)?;
    let context = Arc::new(Context::new(home)?.with_output_dir(args.output_dir.clone()));
    let tera = Arc::new(setup_template_engine(&context)?);

    if args.build {
        let store = Store::new(context.data_dir());
        return pipeline::regenerate(&context, &tera, &store);
    }

    let port = args.port.unwrap_or(context.config.port);
    let state = server::AppState::new(context, tera);
    let app = server::router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;
    info!("admin server listening on http://{addr}");

    axum::serve(listener, app).await?;

    Ok(())
}

fn setup_template_engine(context: &Context) -> anyhow::Result<Tera> {
    let template_dir = context.templates_dir();

    let tera = Tera::new(&template_dir.join("**").join("*").to_string_lossy())?;

    debug!(
        templates = ?tera.get_template_names().collect::<Vec<_>>(),
        "loaded templates"
    );

    Ok(tera)
}
