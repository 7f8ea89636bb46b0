//! Command definitions and output for the `hok-admin` binary
//!
//! Usage:
//!   hok-admin login <email> [--remember]     Sign in and store the token
//!   hok-admin status                         Show the stored session
//!   hok-admin products list [--page N]       List products
//!   hok-admin categories create --name N     Create a category
//!   hok-admin orders update <id> ...         Update an order's delivery
//!   hok-admin settings set <field> <value>   Change a store setting
//!   hok-admin dashboard [--watch SECS]       Summary that revalidates on a timer

use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Args as ClapArgs, Subcommand};
use secrecy::SecretString;
use serde::Serialize;
use serde_json::{json, Value};

use hok_admin::admin::auth::AuthController;
use hok_admin::admin::categories::{CategoryController, CategoryDraft};
use hok_admin::admin::customers::{CustomerController, CustomerLookup};
use hok_admin::admin::orders::{self, DeliveryLocationType, OrderController, OrderUpdate};
use hok_admin::admin::products::{self, ProductController};
use hok_admin::admin::settings::SettingsStore;
use hok_admin::admin::transactions::{self, TransactionController};
use hok_admin::admin::{ListController, ListParams, ListView, Searchable};
use hok_admin::fetch::{FetchCache, ResourceKey, Snapshot};
use hok_admin::http::normalize_page;
use hok_admin::notify::{Notice, Notifier};
use hok_admin::upload::ImageFile;
use hok_admin::AdminError;

use crate::App;

/// Prints notices to stderr
pub struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn notify(&self, notice: &Notice) {
        eprintln!("{}: {}", notice.severity.label(), notice.message);
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Sign in and store the bearer token
    Login {
        /// Admin email
        email: String,

        /// Password (prompted on stdin if not provided)
        #[arg(long, env = "HOK_ADMIN_PASSWORD", hide_env_values = true)]
        password: Option<String>,

        /// Keep the token across runs
        #[arg(short, long)]
        remember: bool,
    },

    /// Forget the stored token
    Logout,

    /// Show the stored session
    Status,

    /// Product catalog
    Products {
        #[command(subcommand)]
        action: ProductCommand,
    },

    /// Product categories
    Categories {
        #[command(subcommand)]
        action: CategoryCommand,
    },

    /// Customer records
    Customers {
        #[command(subcommand)]
        action: CustomerCommand,
    },

    /// Order lifecycle
    Orders {
        #[command(subcommand)]
        action: OrderCommand,
    },

    /// Payment transactions
    Transactions {
        #[command(subcommand)]
        action: TransactionCommand,
    },

    /// Local store settings
    Settings {
        #[command(subcommand)]
        action: SettingsCommand,
    },

    /// Orders, products and transactions at a glance
    Dashboard {
        /// Revalidate every SECS seconds until interrupted
        #[arg(long, value_name = "SECS")]
        watch: Option<u64>,
    },
}

#[derive(ClapArgs, Debug, Clone)]
pub struct ListArgs {
    /// Page to fetch
    #[arg(short, long, default_value_t = 1)]
    page: u32,

    /// Page size (defaults to api.page_limit)
    #[arg(short, long)]
    limit: Option<u32>,

    /// Only show rows containing this text
    #[arg(short, long)]
    search: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum ProductCommand {
    /// List products
    List(ListArgs),
    /// Show one product
    Get { id: String },
    /// Delete a product
    Delete { id: String },
    /// Delete every product
    DeleteAll {
        /// Confirm the deletion
        #[arg(long)]
        yes: bool,
    },
}

#[derive(ClapArgs, Debug)]
pub struct CategoryForm {
    /// Category name
    #[arg(long)]
    name: String,

    /// Category description
    #[arg(long, default_value = "")]
    description: String,

    /// Image file to upload
    #[arg(long, conflicts_with = "image_url")]
    image: Option<PathBuf>,

    /// Existing image URL
    #[arg(long, default_value = "")]
    image_url: String,
}

#[derive(Subcommand, Debug)]
pub enum CategoryCommand {
    /// List categories
    List(ListArgs),
    /// Create a category
    Create(CategoryForm),
    /// Update a category
    Update {
        id: String,
        #[command(flatten)]
        form: CategoryForm,
    },
    /// Delete a category
    Delete { id: String },
}

#[derive(Subcommand, Debug)]
pub enum CustomerCommand {
    /// List customers
    List(ListArgs),
    /// Look up one customer
    Find {
        #[arg(long, group = "key")]
        id: Option<String>,
        #[arg(long, group = "key")]
        email: Option<String>,
        #[arg(long, group = "key")]
        username: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
pub enum OrderCommand {
    /// List orders
    List(ListArgs),
    /// Update delivery status
    Update {
        order_id: String,
        #[arg(long)]
        user_id: String,
        /// New delivery status
        #[arg(long)]
        status: String,
        /// PICKUP or DOOR
        #[arg(long, default_value = "DOOR")]
        location_type: DeliveryLocationType,
        /// Required for PICKUP
        #[arg(long)]
        pickup_location: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
pub enum TransactionCommand {
    /// List transactions
    List {
        #[command(flatten)]
        list: ListArgs,
        /// Only this customer's transactions
        #[arg(long)]
        email: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
pub enum SettingsCommand {
    /// Print the current settings
    Show,
    /// Change one setting (dotted camelCase path, e.g. shipping.expressRate)
    Set { field: String, value: String },
    /// Restore the defaults
    Reset,
}

/// Run a command. Returns `false` when it failed after reporting why.
pub async fn run(app: &App, command: Command) -> anyhow::Result<bool> {
    match execute(app, command).await {
        Ok(ok) => Ok(ok),
        // Request failures were already shown by the notifier
        Err(e) if is_notified(&e) => Ok(false),
        Err(e) => match e.downcast::<AdminError>() {
            Ok(e) => {
                eprintln!("error: {e}");
                Ok(false)
            }
            Err(e) => Err(e),
        },
    }
}

async fn execute(app: &App, command: Command) -> anyhow::Result<bool> {
    let limit = app.config.api.page_limit;
    match command {
        Command::Login {
            email,
            password,
            remember,
        } => login(app, &email, password, remember).await,
        Command::Logout => {
            AuthController::new(Arc::clone(&app.client)).logout()?;
            print_ok(app, "logged out");
            Ok(true)
        }
        Command::Status => {
            let status = AuthController::new(Arc::clone(&app.client)).status()?;
            if app.json {
                print_json(&status)?;
            } else {
                println!("api: {}", app.client.base_url());
                match status.persistence {
                    Some(tier) => println!("logged in ({})", json!(tier).as_str().unwrap_or("?")),
                    None => println!("not logged in"),
                }
            }
            Ok(true)
        }
        Command::Products { action } => {
            let products = ProductController::new(Arc::clone(&app.client), limit);
            match action {
                ProductCommand::List(args) => {
                    list(app, products.list(), &args, "ID  NAME  PRICE", |p| {
                        format!(
                            "{:<26} {:<36} {}",
                            p.id,
                            p.product_name,
                            p.product_price.map(|v| format!("{v:.2}")).unwrap_or_default()
                        )
                    })
                    .await
                }
                ProductCommand::Get { id } => {
                    let product = products.get(&id).await?;
                    print_json(&product)?;
                    Ok(true)
                }
                ProductCommand::Delete { id } => {
                    products.delete(&id).await?;
                    print_ok(app, &format!("deleted product {id}"));
                    Ok(true)
                }
                ProductCommand::DeleteAll { yes } => {
                    if !yes {
                        eprintln!("error: refusing to delete every product without --yes");
                        return Ok(false);
                    }
                    products.delete_all().await?;
                    print_ok(app, "deleted all products");
                    Ok(true)
                }
            }
        }
        Command::Categories { action } => {
            let categories = CategoryController::new(
                Arc::clone(&app.client),
                Arc::clone(&app.uploader),
                limit,
            );
            match action {
                CategoryCommand::List(args) => {
                    list(app, categories.list(), &args, "ID  NAME  IMAGE", |c| {
                        format!("{:<26} {:<24} {}", c.id, c.category_name, c.category_image)
                    })
                    .await
                }
                CategoryCommand::Create(form) => {
                    categories.submit(draft(form).await?, None).await?;
                    print_ok(app, "category created");
                    Ok(true)
                }
                CategoryCommand::Update { id, form } => {
                    categories.submit(draft(form).await?, Some(&id)).await?;
                    print_ok(app, &format!("category {id} updated"));
                    Ok(true)
                }
                CategoryCommand::Delete { id } => {
                    categories.delete(&id).await?;
                    print_ok(app, &format!("deleted category {id}"));
                    Ok(true)
                }
            }
        }
        Command::Customers { action } => {
            let customers = CustomerController::new(Arc::clone(&app.client), limit);
            match action {
                CustomerCommand::List(args) => {
                    list(app, customers.list(), &args, "ID  NAME  EMAIL", |c| {
                        format!("{:<26} {:<24} {}", c.id, c.display_name(), c.email)
                    })
                    .await
                }
                CustomerCommand::Find {
                    id,
                    email,
                    username,
                } => {
                    let lookup = match (id, email, username) {
                        (Some(id), _, _) => CustomerLookup::Id(id),
                        (_, Some(email), _) => CustomerLookup::Email(email),
                        (_, _, Some(username)) => CustomerLookup::Username(username),
                        _ => {
                            eprintln!("error: one of --id, --email or --username is required");
                            return Ok(false);
                        }
                    };
                    let customer = customers.find(&lookup).await?;
                    print_json(&customer)?;
                    Ok(true)
                }
            }
        }
        Command::Orders { action } => {
            let orders = OrderController::new(Arc::clone(&app.client), limit);
            match action {
                OrderCommand::List(args) => {
                    list(app, orders.list(), &args, "ID  STATUS  LOCATION", |o| {
                        format!(
                            "{:<26} {:<14} {}",
                            o.id,
                            o.delivery_status.as_deref().unwrap_or("-"),
                            o.delivery_location_type
                                .map(|t| t.to_string())
                                .unwrap_or_else(|| "-".to_string())
                        )
                    })
                    .await
                }
                OrderCommand::Update {
                    order_id,
                    user_id,
                    status,
                    location_type,
                    pickup_location,
                } => {
                    let update = OrderUpdate::new(
                        order_id,
                        user_id,
                        status,
                        location_type,
                        pickup_location,
                    )?;
                    orders.update(&update).await?;
                    print_ok(app, &format!("order {} updated", update.order_id));
                    Ok(true)
                }
            }
        }
        Command::Transactions {
            action: TransactionCommand::List { list: args, email },
        } => {
            let transactions = TransactionController::new(Arc::clone(&app.client), limit);
            transactions.filter_by_email(email.as_deref());
            list(app, transactions.list(), &args, "REFERENCE  EMAIL  AMOUNT  STATUS", |t| {
                format!(
                    "{:<20} {:<28} {:>10.2} {:<4} {}",
                    t.reference, t.email, t.amount, t.currency, t.status
                )
            })
            .await
        }
        Command::Settings { action } => {
            let settings = SettingsStore::new(Arc::clone(&app.local));
            let current = match action {
                SettingsCommand::Show => settings.load()?,
                SettingsCommand::Set { field, value } => settings.set(&field, &value)?,
                SettingsCommand::Reset => settings.reset()?,
            };
            print_json(&current)?;
            Ok(true)
        }
        Command::Dashboard { watch } => dashboard(app, watch).await,
    }
}

fn is_notified(e: &anyhow::Error) -> bool {
    matches!(
        e.downcast_ref::<AdminError>(),
        Some(AdminError::Api(api)) if api.failure().is_some()
    )
}

async fn login(
    app: &App,
    email: &str,
    password: Option<String>,
    remember: bool,
) -> anyhow::Result<bool> {
    let password = match password {
        Some(p) => p,
        None => {
            eprint!("password: ");
            std::io::stderr().flush()?;
            let mut input = String::new();
            std::io::stdin().lock().read_line(&mut input)?;
            input.trim_end_matches(['\r', '\n']).to_string()
        }
    };
    let password = SecretString::from(password);

    let auth = AuthController::new(Arc::clone(&app.client));
    let tier = auth.login(email, &password, remember).await?;
    if !remember {
        eprintln!("note: session tokens last only for this process; use --remember to keep it");
    }
    print_ok(app, &format!("logged in ({tier:?})").to_lowercase());
    Ok(true)
}

async fn draft(form: CategoryForm) -> anyhow::Result<CategoryDraft> {
    let image_file = match &form.image {
        Some(path) => Some(ImageFile::read(path).await?),
        None => None,
    };
    Ok(CategoryDraft {
        name: form.name,
        description: form.description,
        image_url: form.image_url,
        image_file,
    })
}

async fn list<T, F>(
    app: &App,
    controller: &ListController<T>,
    args: &ListArgs,
    header: &str,
    row: F,
) -> anyhow::Result<bool>
where
    T: serde::de::DeserializeOwned + Serialize + Searchable + Clone,
    F: Fn(&T) -> String,
{
    let limit = args.limit.unwrap_or(app.config.api.page_limit);
    controller
        .on_params_changed(ListParams::new(args.page, limit))
        .await;
    let view: ListView<T> = controller.view();
    controller.on_detach();

    if let Some(error) = &view.error {
        eprintln!("error: {error}");
        return Ok(false);
    }

    let rows = view.visible(args.search.as_deref().unwrap_or(""));
    if app.json {
        print_json(&json!({
            "items": rows,
            "page": view.pager.current(),
            "pages": view.pager.total(),
        }))?;
        return Ok(true);
    }

    if rows.is_empty() {
        eprintln!("no results");
    } else {
        println!("{header}");
        for item in &rows {
            println!("{}", row(item));
        }
    }
    let nav = [
        view.pager.prev().map(|p| format!("prev: --page {p}")),
        view.pager.next().map(|p| format!("next: --page {p}")),
    ];
    let nav: Vec<String> = nav.into_iter().flatten().collect();
    eprintln!(
        "page {} of {}{}{}",
        view.pager.current(),
        view.pager.total(),
        if nav.is_empty() { "" } else { "  " },
        nav.join("  ")
    );
    Ok(true)
}

async fn dashboard(app: &App, watch: Option<u64>) -> anyhow::Result<bool> {
    let cache = FetchCache::new(Arc::clone(&app.client), &app.config.fetch);
    let limit = app.config.api.page_limit;
    let keys = [
        ("orders", ResourceKey::new(orders::LIST_PATH)),
        ("products", ResourceKey::new(products::LIST_PATH)),
        ("transactions", ResourceKey::new(transactions::LIST_PATH)),
    ]
    .map(|(name, key)| (name, key.param("page", 1).param("limit", limit)));

    for (_, key) in &keys {
        cache.mount(Some(key)).await;
    }
    let mut ok = print_dashboard(app, &cache, &keys)?;

    if let Some(secs) = watch {
        let mut interval = tokio::time::interval(Duration::from_secs(secs.max(1)));
        interval.tick().await;
        let shutdown = shutdown_signal();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = interval.tick() => {
                    cache.focus().await;
                    ok = print_dashboard(app, &cache, &keys)?;
                }
            }
        }
    }

    for (_, key) in &keys {
        cache.unmount(Some(key));
    }
    Ok(ok)
}

#[derive(Serialize)]
struct DashboardRow {
    resource: &'static str,
    state: String,
    items: Option<u64>,
    pages: Option<u32>,
    error: Option<String>,
    last_validated: Option<String>,
}

fn dashboard_row(resource: &'static str, snapshot: Snapshot) -> DashboardRow {
    let page = snapshot
        .data
        .as_ref()
        .filter(|env| env.success)
        .and_then(|env| normalize_page::<Value>(env.data.clone(), 1).ok());
    DashboardRow {
        resource,
        state: format!("{:?}", snapshot.state).to_lowercase(),
        items: page.as_ref().map(|p| p.total_items),
        pages: page.as_ref().map(|p| p.pages),
        error: snapshot.error.map(|e| e.to_string()),
        last_validated: snapshot.last_validated.map(|t| t.to_rfc3339()),
    }
}

fn print_dashboard(
    app: &App,
    cache: &FetchCache,
    keys: &[(&'static str, ResourceKey)],
) -> anyhow::Result<bool> {
    let rows: Vec<DashboardRow> = keys
        .iter()
        .filter_map(|(name, key)| cache.snapshot(Some(key)).map(|s| dashboard_row(*name, s)))
        .collect();
    let ok = rows.iter().all(|r| r.error.is_none());

    if app.json {
        print_json(&rows)?;
        return Ok(ok);
    }

    println!("{:<14} {:<10} {:>8} {:>6}", "RESOURCE", "STATE", "ITEMS", "PAGES");
    for row in &rows {
        println!(
            "{:<14} {:<10} {:>8} {:>6}",
            row.resource,
            row.state,
            row.items.map(|n| n.to_string()).unwrap_or_else(|| "-".into()),
            row.pages.map(|n| n.to_string()).unwrap_or_else(|| "-".into()),
        );
    }
    Ok(ok)
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("received Ctrl+C"),
        Err(e) => {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    }
}

fn print_ok(app: &App, message: &str) {
    if app.json {
        println!("{}", json!({"ok": true, "message": message}));
    } else {
        println!("{message}");
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
