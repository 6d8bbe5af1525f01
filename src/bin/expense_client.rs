use clap::{Parser, Subcommand};
use std::process::ExitCode;
use std::sync::Arc;

use expense_tracker::client::{
    navigate, ApiClient, ClientError, FileTokenStorage, Navigation, Route, Session,
};
use expense_tracker::models::{Expense, ExpensePage};

#[derive(Parser)]
#[command(name = "expense-client", version, about = "Expense Tracker client")]
struct Cli {
    /// API base URL
    #[arg(long, env = "EXPENSE_API_URL", default_value = "http://localhost:8000")]
    base_url: String,

    /// File holding the persisted token
    #[arg(long, env = "EXPENSE_CLIENT_STORAGE", default_value = ".expense-client.json")]
    storage: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in and store the token
    Login {
        #[arg(long)]
        email: String,
        #[arg(long, env = "EXPENSE_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Forget the stored token
    Logout,
    /// Resolve a route the way the app's router would
    Open {
        /// Path such as /, /login or /expenses
        path: String,
    },
    /// List your expenses
    List {
        #[arg(long, default_value = "1")]
        page: u64,
    },
    /// Record an expense
    Add {
        #[arg(long)]
        item: String,
        #[arg(long)]
        amount: String,
        /// YYYY-MM-DD
        #[arg(long)]
        date: String,
    },
    /// Delete one of your expenses
    Delete {
        /// Expense ID
        id: String,
    },
    /// Show the logged-in user
    Whoami,
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("warn"));

    let cli = Cli::parse();
    let session = Arc::new(Session::new(Box::new(FileTokenStorage::new(&cli.storage))));

    let client = match ApiClient::new(&cli.base_url, session) {
        Ok(client) => client,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    match run(&client, cli.command).await {
        Ok(code) => code,
        Err(ClientError::Unauthenticated(msg)) => {
            eprintln!("{}. Run `expense-client login` to sign in again.", msg);
            ExitCode::FAILURE
        }
        Err(e) => {
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(client: &ApiClient, command: Commands) -> Result<ExitCode, ClientError> {
    match command {
        Commands::Login { email, password } => {
            client.login(&email, &password).await?;
            println!("Logged in as {}", email);
        }
        Commands::Logout => {
            client.session().clear()?;
            println!("Logged out");
        }
        Commands::Open { path } => {
            let nav = navigate(Route::resolve(&path), client.session(), client).await?;
            match nav {
                Navigation::Allow(route) => println!("{}", route.path()),
                Navigation::Redirect(route) => println!("{} -> {}", path, route.path()),
            }
        }
        Commands::List { page } => {
            if !enter_expenses(client).await? {
                return Ok(ExitCode::FAILURE);
            }
            print_page(&client.list_expenses(page).await?);
        }
        Commands::Add { item, amount, date } => {
            if !enter_expenses(client).await? {
                return Ok(ExitCode::FAILURE);
            }
            let expense = client.create_expense(&item, &amount, &date).await?;
            println!("Created:");
            print_expense(&expense);
        }
        Commands::Delete { id } => {
            if !enter_expenses(client).await? {
                return Ok(ExitCode::FAILURE);
            }
            client.delete_expense(&id).await?;
            println!("Deleted {}", id);
        }
        Commands::Whoami => {
            let user = client.current_user().await?;
            match user.name {
                Some(name) => println!("{} <{}>", name, user.email),
                None => println!("{}", user.email),
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}

/// Runs the router guard for /expenses. False when sent to login.
async fn enter_expenses(client: &ApiClient) -> Result<bool, ClientError> {
    match navigate(Route::Expenses, client.session(), client).await? {
        Navigation::Allow(_) => Ok(true),
        Navigation::Redirect(route) => {
            eprintln!(
                "Redirected to {}: run `expense-client login --email <email>` first.",
                route.path()
            );
            Ok(false)
        }
    }
}

fn print_page(page: &ExpensePage) {
    if page.data.is_empty() {
        println!("No expenses on page {} (total {}).", page.current_page, page.total);
        return;
    }

    for expense in &page.data {
        print_expense(expense);
    }
    println!(
        "Page {}/{}, showing {}-{} of {}",
        page.current_page,
        page.last_page,
        page.from.unwrap_or(0),
        page.to.unwrap_or(0),
        page.total
    );
}

fn print_expense(expense: &Expense) {
    println!(
        "  {}  {}  {:>10.2}  {}",
        expense.id, expense.date, expense.amount, expense.item_name
    );
}
