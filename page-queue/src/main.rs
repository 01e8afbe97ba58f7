//! page-queue - Author and manage page posts
//!
//! Unix-style tool for registering destination pages, writing posts and
//! scheduling them for `page-send`.

use clap::{Parser, Subcommand};
use libpagecast::config::resolve_db_path;
use libpagecast::logging::LoggingConfig;
use libpagecast::scheduling::parse_schedule;
use libpagecast::{
    Config, Database, Destination, PagecastError, Post, PostStatus, Result, Template,
};
use secrecy::SecretString;
use tracing::debug;

#[derive(Parser, Debug)]
#[command(name = "page-queue")]
#[command(version)]
#[command(about = "Author and manage page posts")]
#[command(long_about = "\
page-queue - Author and manage page posts

DESCRIPTION:
    page-queue manages everything page-send publishes: the destination pages
    with their access tokens, and the posts with their images and schedule.
    Posts created without --schedule stay drafts until rescheduled.

COMMANDS:
    destination add   Register a page and its access token
    destination list  List registered pages (tokens are never shown)
    template add      Save a reusable post body with images
    template list     List saved templates
    template delete   Remove a template
    create            Write a new post, optionally scheduled or from a template
    list              List posts, optionally filtered by status
    reschedule        Schedule a draft or failed post (again)
    stats             Count posts per status

USAGE EXAMPLES:
    # Register a page
    page-queue destination add 1234567890 --name \"Corner Bakery\" --token EAAB...

    # Schedule a post with two images
    page-queue create \"Fresh bread today\" --destination 1234567890 \\
        --image https://cdn.example.com/a.jpg --image /uploads/b.jpg \\
        --schedule \"tomorrow 9am\"

    # Save a template and start a post from it
    page-queue template add \"Weekend sale\" --content \"30% off this weekend\"
    page-queue create --template <TEMPLATE_ID> --destination 1234567890

    # Show failed posts as JSON
    page-queue list --status failed --format json

    # Try a failed post again in ten minutes
    page-queue reschedule <POST_ID> 10m

CONFIGURATION:
    Configuration file: ~/.config/pagecast/config.toml
    Database location: ~/.local/share/pagecast/posts.db

    Relative image paths are joined onto [publishing] public_base_url.

    Override with environment variables:
        PAGECAST_CONFIG      - Path to config file
        PAGECAST_DB_PATH     - Path to database file
        PAGECAST_PAGE_TOKEN  - Access token for destination add

EXIT CODES:
    0 - Success
    1 - Operation failed
    2 - Database or configuration error
    3 - Invalid input (unknown id, bad time format, etc.)
")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging to stderr
    #[arg(short, long, global = true)]
    #[arg(help = "Enable verbose logging to stderr (useful for debugging)")]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Manage destination pages
    Destination {
        #[command(subcommand)]
        action: DestinationCommands,
    },

    /// Manage post templates
    Template {
        #[command(subcommand)]
        action: TemplateCommands,
    },

    /// Create a post
    Create {
        /// Post text (defaults to the template's text)
        #[arg(required_unless_present = "template")]
        content: Option<String>,

        /// Template id to pre-fill text and images from
        #[arg(short, long, value_name = "TEMPLATE_ID")]
        template: Option<String>,

        /// Destination id or external page id
        #[arg(short, long)]
        destination: String,

        /// Image URL or path, in display order (repeatable)
        #[arg(short, long = "image", value_name = "URL")]
        images: Vec<String>,

        /// When to publish (e.g., "tomorrow 3pm", "2h", RFC 3339)
        #[arg(short, long, value_name = "WHEN")]
        schedule: Option<String>,
    },

    /// List posts
    List {
        /// Only posts with this status
        #[arg(short, long)]
        status: Option<String>,

        /// Output format: text or json
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Schedule a draft, failed or scheduled post for a new time
    Reschedule {
        /// Post ID to reschedule
        post_id: String,

        /// New schedule time (e.g., "tomorrow 3pm", "30m")
        time: String,
    },

    /// Show post counts per status
    Stats {
        /// Output format: text or json
        #[arg(short, long, default_value = "text")]
        format: String,
    },
}

#[derive(Subcommand, Debug)]
enum DestinationCommands {
    /// Register a destination page
    Add {
        /// Page id on the platform
        external_id: String,

        /// Display name
        #[arg(short, long)]
        name: String,

        /// Page access token
        #[arg(short, long, env = "PAGECAST_PAGE_TOKEN", hide_env_values = true)]
        token: String,
    },

    /// List destination pages
    List {
        /// Output format: text or json
        #[arg(short, long, default_value = "text")]
        format: String,
    },
}

#[derive(Subcommand, Debug)]
enum TemplateCommands {
    /// Save a template
    Add {
        /// Template name
        name: String,

        /// Post text the template pre-fills
        #[arg(short, long)]
        content: String,

        /// Image URL or path, in display order (repeatable)
        #[arg(short, long = "image", value_name = "URL")]
        images: Vec<String>,
    },

    /// List templates
    List {
        /// Output format: text or json
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Delete a template
    Delete {
        /// Template ID to delete
        template_id: String,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Quiet by default so stdout stays scriptable
    let mut logging = LoggingConfig::from_env(cli.verbose);
    if std::env::var("PAGECAST_LOG_LEVEL").is_err() {
        logging.level = "error".to_string();
    }
    logging.init();

    // Run the main logic and handle errors
    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(e.exit_code());
    }
}

async fn run(cli: Cli) -> Result<()> {
    // Load configuration
    let config = Config::load()?;

    // Initialize database
    let db_path = resolve_db_path(Some(&config.database.path))?;
    debug!(db_path = %db_path, "Opening database");
    let db = Database::new(&db_path).await?;

    // Execute command
    match cli.command {
        Commands::Destination { action } => match action {
            DestinationCommands::Add {
                external_id,
                name,
                token,
            } => cmd_destination_add(&db, &external_id, &name, token).await?,
            DestinationCommands::List { format } => cmd_destination_list(&db, &format).await?,
        },
        Commands::Template { action } => match action {
            TemplateCommands::Add {
                name,
                content,
                images,
            } => cmd_template_add(&db, &config, &name, &content, &images).await?,
            TemplateCommands::List { format } => cmd_template_list(&db, &format).await?,
            TemplateCommands::Delete { template_id } => {
                cmd_template_delete(&db, &template_id).await?
            }
        },
        Commands::Create {
            content,
            template,
            destination,
            images,
            schedule,
        } => {
            cmd_create(
                &db,
                &config,
                content.as_deref(),
                template.as_deref(),
                &destination,
                &images,
                schedule.as_deref(),
            )
            .await?;
        }
        Commands::List { status, format } => {
            cmd_list(&db, status.as_deref(), &format).await?;
        }
        Commands::Reschedule { post_id, time } => {
            cmd_reschedule(&db, &post_id, &time).await?;
        }
        Commands::Stats { format } => {
            cmd_stats(&db, &format).await?;
        }
    }

    Ok(())
}

fn validate_format(format: &str) -> Result<()> {
    if format != "text" && format != "json" {
        return Err(PagecastError::InvalidInput(format!(
            "Invalid format '{}'. Must be 'text' or 'json'",
            format
        )));
    }
    Ok(())
}

/// Register a destination page
async fn cmd_destination_add(db: &Database, external_id: &str, name: &str, token: String) -> Result<()> {
    let external_id = external_id.trim();
    if external_id.is_empty() {
        return Err(PagecastError::InvalidInput(
            "External page id cannot be empty".to_string(),
        ));
    }
    if token.trim().is_empty() {
        return Err(PagecastError::InvalidInput(
            "Access token cannot be empty".to_string(),
        ));
    }
    if db.get_destination(external_id).await?.is_some() {
        return Err(PagecastError::InvalidInput(format!(
            "Destination '{}' is already registered",
            external_id
        )));
    }

    let destination = Destination::new(
        external_id.to_string(),
        name.to_string(),
        SecretString::from(token),
    );
    db.create_destination(&destination).await?;

    println!("{}", destination.id);
    Ok(())
}

/// List destination pages
async fn cmd_destination_list(db: &Database, format: &str) -> Result<()> {
    validate_format(format)?;
    let destinations = db.list_destinations().await?;

    if format == "json" {
        let json: Vec<serde_json::Value> = destinations
            .iter()
            .map(|d| {
                serde_json::json!({
                    "id": d.id,
                    "external_id": d.external_id,
                    "name": d.name,
                    "created_at": d.created_at,
                })
            })
            .collect();
        println!("{}", serde_json::Value::Array(json));
    } else {
        for d in &destinations {
            println!("{} | {} | {}", d.id, d.external_id, d.name);
        }
    }

    Ok(())
}

/// Save a template
async fn cmd_template_add(
    db: &Database,
    config: &Config,
    name: &str,
    content: &str,
    images: &[String],
) -> Result<()> {
    if name.trim().is_empty() || content.trim().is_empty() {
        return Err(PagecastError::InvalidInput(
            "Template name and content cannot be empty".to_string(),
        ));
    }

    let images = images
        .iter()
        .map(|image| config.publishing.resolve_image_url(image))
        .collect::<Result<Vec<_>>>()?;

    let template = Template::new(name.trim().to_string(), content.to_string());
    db.create_template(&template, &images).await?;
    debug!(template_id = %template.id, images = images.len(), "Template created");

    println!("{}", template.id);
    Ok(())
}

/// List templates
async fn cmd_template_list(db: &Database, format: &str) -> Result<()> {
    validate_format(format)?;
    let templates = db.list_templates().await?;

    if format == "json" {
        let mut json = Vec::with_capacity(templates.len());
        for t in &templates {
            let images = db.get_template_images(&t.id).await?;
            json.push(serde_json::json!({
                "id": t.id,
                "name": t.name,
                "content": t.content,
                "created_at": t.created_at,
                "images": images,
            }));
        }
        println!("{}", serde_json::Value::Array(json));
    } else {
        for t in &templates {
            println!("{} | {} | {}", t.id, t.name, truncate_content(&t.content, 50));
        }
    }

    Ok(())
}

/// Delete a template
async fn cmd_template_delete(db: &Database, template_id: &str) -> Result<()> {
    if !db.delete_template(template_id).await? {
        return Err(PagecastError::NotFound(format!("Template '{}'", template_id)));
    }

    println!("Deleted template {}", template_id);
    Ok(())
}

/// Create a post
///
/// With a template, its text is used unless `content` is given and its
/// images come before any `--image` arguments.
async fn cmd_create(
    db: &Database,
    config: &Config,
    content: Option<&str>,
    template: Option<&str>,
    destination: &str,
    images: &[String],
    schedule: Option<&str>,
) -> Result<()> {
    let (content, images) = match template {
        Some(template_id) => {
            let template = db
                .get_template(template_id)
                .await?
                .ok_or_else(|| PagecastError::NotFound(format!("Template '{}'", template_id)))?;
            let mut all_images = db.get_template_images(&template.id).await?;
            all_images.extend(images.iter().cloned());
            let content = content.map(str::to_string).unwrap_or(template.content);
            (content, all_images)
        }
        None => (content.unwrap_or_default().to_string(), images.to_vec()),
    };

    if content.trim().is_empty() {
        return Err(PagecastError::InvalidInput(
            "Content cannot be empty".to_string(),
        ));
    }

    let destination = db
        .get_destination(destination)
        .await?
        .ok_or_else(|| PagecastError::NotFound(format!("Destination '{}'", destination)))?;

    let images = images
        .iter()
        .map(|image| config.publishing.resolve_image_url(image))
        .collect::<Result<Vec<_>>>()?;

    let post = match schedule {
        Some(when) => {
            let at = parse_schedule(when)?;
            Post::scheduled(content, destination.id.clone(), at.timestamp())
        }
        None => Post::new(content, destination.id.clone()),
    };

    db.create_post(&post, &images).await?;
    debug!(post_id = %post.id, status = %post.status, images = images.len(), "Post created");

    println!("{}", post.id);
    Ok(())
}

/// List posts
async fn cmd_list(db: &Database, status: Option<&str>, format: &str) -> Result<()> {
    validate_format(format)?;
    let status = status.map(str::parse::<PostStatus>).transpose()?;

    let posts = db.list_posts(status).await?;

    if format == "json" {
        output_list_json(db, &posts).await?;
    } else {
        output_list_text(&posts);
    }

    Ok(())
}

/// Output posts as JSON
async fn output_list_json(db: &Database, posts: &[Post]) -> Result<()> {
    let mut json = Vec::with_capacity(posts.len());
    for p in posts {
        let images = db.get_post_images(&p.id).await?;
        json.push(serde_json::json!({
            "id": p.id,
            "content": p.content,
            "destination_id": p.destination_id,
            "status": p.status,
            "created_at": p.created_at,
            "scheduled_at": p.scheduled_at,
            "published_at": p.published_at,
            "external_post_id": p.external_post_id,
            "error_message": p.error_message,
            "images": images,
        }));
    }

    println!("{}", serde_json::Value::Array(json));
    Ok(())
}

/// Output posts as human-readable text
fn output_list_text(posts: &[Post]) {
    let now = chrono::Utc::now().timestamp();

    for post in posts {
        let content_preview = truncate_content(&post.content, 50);
        let detail = match post.status {
            PostStatus::Scheduled => post
                .scheduled_at
                .map(|ts| format_time_until(now, ts))
                .unwrap_or_else(|| "unknown".to_string()),
            PostStatus::Published => post.external_post_id.clone().unwrap_or_default(),
            PostStatus::Failed => post.error_message.clone().unwrap_or_default(),
            PostStatus::Draft => String::new(),
        };

        println!(
            "{} | {} | {} | {}",
            post.id, post.status, content_preview, detail
        );
    }
}

/// Truncate content to max characters with ellipsis
fn truncate_content(content: &str, max_len: usize) -> String {
    if content.chars().count() <= max_len {
        content.to_string()
    } else {
        let truncated: String = content.chars().take(max_len).collect();
        format!("{}...", truncated)
    }
}

/// Format time until scheduled time in human-readable format
fn format_time_until(now: i64, scheduled_at: i64) -> String {
    let diff = scheduled_at - now;

    if diff < 0 {
        return "due".to_string();
    }

    let minutes = diff / 60;
    let hours = minutes / 60;
    let days = hours / 24;

    if days > 0 {
        format!("in {} day{}", days, if days == 1 { "" } else { "s" })
    } else if hours > 0 {
        format!("in {} hour{}", hours, if hours == 1 { "" } else { "s" })
    } else if minutes > 0 {
        format!("in {} minute{}", minutes, if minutes == 1 { "" } else { "s" })
    } else {
        "in <1 minute".to_string()
    }
}

/// Reschedule a post
async fn cmd_reschedule(db: &Database, post_id: &str, time: &str) -> Result<()> {
    let post = db
        .get_post(post_id)
        .await?
        .ok_or_else(|| PagecastError::NotFound(format!("Post '{}'", post_id)))?;

    let at = parse_schedule(time)?;

    if !db.reschedule_post(&post.id, at.timestamp()).await? {
        return Err(PagecastError::InvalidInput(format!(
            "Post '{}' is {} and cannot be rescheduled",
            post.id, post.status
        )));
    }

    println!("{} scheduled for {}", post.id, at.to_rfc3339());
    Ok(())
}

/// Show post counts per status
async fn cmd_stats(db: &Database, format: &str) -> Result<()> {
    validate_format(format)?;
    let counts = db.count_by_status().await?;

    let count_of = |status: PostStatus| {
        counts
            .iter()
            .find(|(s, _)| *s == status)
            .map(|(_, n)| *n)
            .unwrap_or(0)
    };
    let statuses = [
        PostStatus::Draft,
        PostStatus::Scheduled,
        PostStatus::Published,
        PostStatus::Failed,
    ];
    let total: i64 = statuses.iter().map(|s| count_of(*s)).sum();

    if format == "json" {
        let mut json = serde_json::Map::new();
        for status in statuses {
            json.insert(status.to_string(), serde_json::json!(count_of(status)));
        }
        json.insert("total".to_string(), serde_json::json!(total));
        println!("{}", serde_json::Value::Object(json));
    } else {
        for status in statuses {
            println!("{:<10} {}", status, count_of(status));
        }
        println!("{:<10} {}", "total", total);
    }

    Ok(())
}
