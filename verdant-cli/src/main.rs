use std::path::PathBuf;

use clap::{Parser, Subcommand};
use verdant_cli::commands::{self, plants, role, Connection};

#[derive(Parser)]
#[command(name = "verdant", version, about = "Verdant CLI - browse and list plants on a marketplace API")]
struct Cli {
    /// Configuration profile (overridden by VERDANT_PROFILE)
    #[arg(long, global = true, default_value = "dev")]
    profile: String,

    /// Directory holding application.yaml and .env files
    #[arg(long, global = true, default_value = ".")]
    config_dir: PathBuf,

    /// API origin, overriding api.url
    #[arg(long, global = true)]
    api_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Browse or add plant listings
    Plants {
        #[command(subcommand)]
        action: PlantsAction,
    },
    /// Resolve the role of a user
    Role {
        /// User email
        email: String,
        /// Bearer token, defaults to api.token
        #[arg(long)]
        token: Option<String>,
    },
}

#[derive(Subcommand)]
enum PlantsAction {
    /// List every plant
    List,
    /// Show one plant
    Show {
        /// Plant id
        id: String,
    },
    /// Upload an image and list a new plant
    Add {
        #[arg(long)]
        name: String,
        /// One of Indoor, Outdoor, Succulent, Flowering
        #[arg(long)]
        category: String,
        #[arg(long)]
        description: String,
        #[arg(long)]
        price: String,
        #[arg(long)]
        quantity: String,
        /// Image file to upload
        #[arg(long)]
        image: Option<PathBuf>,
        /// Seller email
        #[arg(long)]
        email: String,
        /// Seller display name
        #[arg(long)]
        display_name: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    verdant::init_tracing();
    let cli = Cli::parse();
    let connection = Connection {
        profile: cli.profile,
        config_dir: cli.config_dir,
        api_url: cli.api_url,
    };

    if let Err(e) = run(&connection, cli.command).await {
        eprintln!("{}", colored::Colorize::red(format!("Error: {e}").as_str()));
        std::process::exit(1);
    }
}

async fn run(connection: &Connection, command: Commands) -> commands::CommandResult {
    let market = commands::connect(connection).await?;
    match command {
        Commands::Plants { action } => match action {
            PlantsAction::List => plants::list(&market).await,
            PlantsAction::Show { id } => plants::show(&market, &id).await,
            PlantsAction::Add {
                name,
                category,
                description,
                price,
                quantity,
                image,
                email,
                display_name,
            } => {
                let args = plants::AddArgs {
                    name,
                    category,
                    description,
                    price,
                    quantity,
                    image,
                    email,
                    display_name,
                };
                plants::add(&market, args).await
            }
        },
        Commands::Role { email, token } => role::run(&market, &email, token).await,
    }
}
