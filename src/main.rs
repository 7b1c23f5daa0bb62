//! todosync command line front end.
//!
//! ```bash
//! todosync login -e me@example.com -p secret
//! todosync add "Buy milk" --photo ./receipt.jpg --lat -33.45 --lon -70.66
//! todosync list
//! todosync toggle <id>
//! ```

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use todosync::backend::{ApiError, Location, TodoPatch};
use todosync::config::Config;
use todosync::constants::{
    ERROR_SESSION_EXPIRED, ERROR_TASK_CREATE_FAILED, ERROR_TASK_DELETE_FAILED, ERROR_TASK_LOAD_FAILED,
    ERROR_TASK_UPDATE_FAILED, SUCCESS_LOGGED_IN, SUCCESS_LOGGED_OUT, SUCCESS_REGISTERED, SUCCESS_TASK_CREATED,
    SUCCESS_TASK_DELETED, SUCCESS_TASK_UPDATED,
};
use todosync::logger::{parse_level, Logger};
use todosync::sync::{NewTask, Task, TaskSyncService};
use todosync::upload::ImageSource;

#[derive(Parser)]
#[command(name = "todosync")]
#[command(author, version, about = "Sync tasks and their photos with a remote todo service")]
struct Cli {
    /// Configuration file to use instead of the default lookup
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create an account
    Register {
        #[arg(short, long)]
        email: String,
        #[arg(short, long)]
        password: String,
    },
    /// Log in with an existing account
    Login {
        #[arg(short, long)]
        email: String,
        #[arg(short, long)]
        password: String,
    },
    /// Forget the stored session
    Logout,
    /// List all tasks
    List,
    /// Show one task
    Show { id: String },
    /// Create a task
    Add {
        title: String,
        /// Image file to attach
        #[arg(long)]
        photo: Option<PathBuf>,
        #[arg(long, requires = "lon", allow_hyphen_values = true)]
        lat: Option<f64>,
        #[arg(long, requires = "lat", allow_hyphen_values = true)]
        lon: Option<f64>,
    },
    /// Rename a task
    Rename { id: String, title: String },
    /// Flip a task between done and open
    Toggle { id: String },
    /// Delete a task
    Delete { id: String },
    /// Write a default configuration file
    InitConfig {
        /// Destination, defaults to the XDG config path
        path: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Commands::InitConfig { path } = &cli.command {
        let path = match path {
            Some(path) => path.clone(),
            None => Config::get_default_config_path()?,
        };
        return Config::generate_default_config(path);
    }

    let config = match &cli.config {
        Some(path) => {
            let mut config = Config::load_from_file(path)?;
            config.apply_env_overrides();
            config.validate()?;
            config
        }
        None => Config::load()?,
    };

    let logger = Logger::from_config(&config.logging)?;
    logger.install(parse_level(&config.logging.level)?)?;

    let service = TaskSyncService::from_config(&config).await?;
    if let Err(e) = run(&service, cli.command).await {
        match e.downcast_ref::<ApiError>() {
            Some(ApiError::SessionExpired) => eprintln!("{ERROR_SESSION_EXPIRED}"),
            _ => eprintln!("{e:#}"),
        }
        std::process::exit(1);
    }
    Ok(())
}

async fn run(service: &TaskSyncService, command: Commands) -> Result<()> {
    match command {
        Commands::Register { email, password } => {
            let user = service.register(&email, &password).await?;
            println!("{SUCCESS_REGISTERED}: {}", user.email);
        }
        Commands::Login { email, password } => {
            let user = service.login(&email, &password).await?;
            println!("{SUCCESS_LOGGED_IN}: {}", user.email);
        }
        Commands::Logout => {
            service.logout().await?;
            println!("{SUCCESS_LOGGED_OUT}");
        }
        Commands::List => {
            require_session(service).await?;
            let tasks = service
                .list_tasks()
                .await
                .map_err(|e| anyhow::Error::new(e).context(ERROR_TASK_LOAD_FAILED))?;
            if tasks.is_empty() {
                println!("No tasks");
            }
            for task in &tasks {
                print_task(task);
            }
        }
        Commands::Show { id } => {
            require_session(service).await?;
            let task = service
                .get_task(&id)
                .await
                .map_err(|e| anyhow::Error::new(e).context(ERROR_TASK_LOAD_FAILED))?;
            print_task(&task);
        }
        Commands::Add { title, photo, lat, lon } => {
            require_session(service).await?;
            let location = match (lat, lon) {
                (Some(latitude), Some(longitude)) => Some(Location { latitude, longitude }),
                _ => None,
            };
            let new_task = NewTask {
                title,
                photo: photo.map(|path| ImageSource::new(path.to_string_lossy())),
                location,
            };
            let outcome = service.create_task(new_task).await.map_err(|e| match e {
                ApiError::SessionExpired => anyhow::Error::new(e),
                e => anyhow::Error::new(e).context(ERROR_TASK_CREATE_FAILED),
            })?;
            if let Some(advisory) = outcome.advisory {
                println!("{}", advisory.message());
            }
            println!("{SUCCESS_TASK_CREATED}");
            print_task(&outcome.task);
        }
        Commands::Rename { id, title } => {
            require_session(service).await?;
            let patch = TodoPatch {
                title: Some(title),
                ..Default::default()
            };
            let task = service
                .update_task(&id, &patch)
                .await
                .map_err(|e| anyhow::Error::new(e).context(ERROR_TASK_UPDATE_FAILED))?;
            println!("{SUCCESS_TASK_UPDATED}");
            print_task(&task);
        }
        Commands::Toggle { id } => {
            require_session(service).await?;
            let task = service
                .toggle_complete(&id)
                .await
                .map_err(|e| anyhow::Error::new(e).context(ERROR_TASK_UPDATE_FAILED))?;
            println!("{SUCCESS_TASK_UPDATED}");
            print_task(&task);
        }
        Commands::Delete { id } => {
            require_session(service).await?;
            service
                .delete_task(&id)
                .await
                .map_err(|e| anyhow::Error::new(e).context(ERROR_TASK_DELETE_FAILED))?;
            println!("{SUCCESS_TASK_DELETED}");
        }
        Commands::InitConfig { .. } => {}
    }
    Ok(())
}

async fn require_session(service: &TaskSyncService) -> Result<()> {
    if service.is_authenticated().await? {
        Ok(())
    } else {
        Err(ApiError::SessionExpired.into())
    }
}

fn print_task(task: &Task) {
    let mark = if task.completed { "[x]" } else { "[ ]" };
    println!("{mark} {}  {}", task.id, task.title);
    if let Some(image) = &task.image {
        println!("      image: {image}");
    }
    if let Some(location) = &task.location {
        println!("      location: {:.5}, {:.5}", location.latitude, location.longitude);
    }
}
