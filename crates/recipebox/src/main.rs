//! `recipebox` - CLI for the recipe community
//!
//! This binary provides the command-line interface for publishing recipes,
//! browsing the feed, keeping favorites and rating what others cook.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::Parser;

use recipebox::cli::{
    output, parse_positioned, Cli, Command, ConfigCommand, FavoriteCommand, FeedCommand,
    OutputFormat, ProfileCommand, RecipeAddCommand, RecipeCommand, RecipeEditCommand,
    SessionFile, SignupCommand,
};
use recipebox::{
    init_logging, Config, FeedQuery, ImageChange, NewRecipe, ProfileChanges, RecipeBox,
    RecipeChanges, Session, SignUp, StepList,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    init_logging(cli.verbosity());

    // Load configuration
    let config = Config::load_from(cli.config.clone())?;

    // Configuration commands never touch the database
    match cli.command {
        Command::Config(config_cmd) => handle_config(&config, config_cmd)?,
        command => run(config, command)?,
    }
    Ok(())
}

fn run(config: Config, command: Command) -> anyhow::Result<()> {
    let sessions = SessionFile::new(config.session_file());
    let app = RecipeBox::open(config).context("failed to open the recipe database")?;

    match command {
        Command::Signup(cmd) => handle_signup(&app, &sessions, cmd)?,
        Command::Login(cmd) => handle_login(&app, &sessions, &cmd.email, cmd.password)?,
        Command::Logout => handle_logout(&app, &sessions)?,
        Command::Whoami { json } => handle_whoami(&app, &sessions, json)?,
        Command::Passwd(cmd) => {
            let session = require_session(&app, &sessions)?;
            let renewed = app.change_password(&session, &cmd.current, &cmd.new)?;
            sessions.save(&renewed.token)?;
            println!("Password changed. Other sessions were signed out.");
        }
        Command::Profile(cmd) => handle_profile(&app, &sessions, cmd)?,
        Command::Recipe(cmd) => handle_recipe(&app, &sessions, cmd)?,
        Command::Feed(cmd) => handle_feed(&app, &sessions, &cmd)?,
        Command::Categories { json } => {
            let categories = app.categories()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&categories)?);
            } else {
                print!("{}", output::category_list(&categories));
            }
        }
        Command::Favorite(cmd) => handle_favorite(&app, &sessions, cmd)?,
        Command::Rate(cmd) => {
            let session = require_session(&app, &sessions)?;
            let rating = app.rate_recipe(&session, cmd.id, cmd.score, cmd.review.as_deref())?;
            println!("Rated recipe #{} {}", cmd.id, rating.score.stars());
        }
        Command::Unrate { id } => {
            let session = require_session(&app, &sessions)?;
            if app.remove_rating(&session, id)? {
                println!("Removed your rating of recipe #{id}");
            } else {
                println!("You have not rated recipe #{id}");
            }
        }
        Command::Reviews { id, json } => {
            let ratings = app.ratings(id)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&ratings)?);
            } else {
                print!("{}", output::reviews_page(&ratings));
            }
        }
        Command::Status(cmd) => handle_status(&app, cmd.json)?,
        Command::Config(cmd) => handle_config(app.config(), cmd)?,
    }
    Ok(())
}

/// Resolve the stored session, forgetting it if it is no longer valid.
fn require_session(app: &RecipeBox, sessions: &SessionFile) -> anyhow::Result<Session> {
    let token = sessions
        .require()
        .context("not signed in; run `recipebox login` first")?;
    match app.session(&token) {
        Ok(session) => Ok(session),
        Err(e) if e.is_auth_error() => {
            sessions.clear()?;
            Err(anyhow::Error::new(e).context("please sign in again"))
        }
        Err(e) => Err(e.into()),
    }
}

/// Take the password from the flag or read one line from standard input.
fn password_or_prompt(password: Option<String>) -> anyhow::Result<String> {
    if let Some(password) = password {
        return Ok(password);
    }
    eprint!("Password: ");
    io::stderr().flush()?;
    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .context("failed to read password")?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

fn handle_signup(
    app: &RecipeBox,
    sessions: &SessionFile,
    cmd: SignupCommand,
) -> anyhow::Result<()> {
    let password = password_or_prompt(cmd.password)?;
    let (profile, session) = app.sign_up(&SignUp {
        email: cmd.email,
        username: cmd.username,
        password,
        display_name: cmd.display_name,
    })?;
    sessions.save(&session.token)?;
    println!("Welcome, {}! You are signed in.", profile.name());
    Ok(())
}

fn handle_login(
    app: &RecipeBox,
    sessions: &SessionFile,
    email: &str,
    password: Option<String>,
) -> anyhow::Result<()> {
    let password = password_or_prompt(password)?;
    let (profile, session) = app.sign_in(email, &password)?;
    sessions.save(&session.token)?;
    println!("Signed in as {}", profile.username);
    Ok(())
}

fn handle_logout(app: &RecipeBox, sessions: &SessionFile) -> anyhow::Result<()> {
    match sessions.load()? {
        Some(token) => {
            app.sign_out(&token)?;
            sessions.clear()?;
            println!("Signed out.");
        }
        None => println!("Not signed in."),
    }
    Ok(())
}

fn handle_whoami(app: &RecipeBox, sessions: &SessionFile, json: bool) -> anyhow::Result<()> {
    let session = require_session(app, sessions)?;
    let profile = app.current_user(&session)?;
    if json {
        let whoami = serde_json::json!({
            "profile": profile,
            "session_expires_at": session.expires_at,
        });
        println!("{}", serde_json::to_string_pretty(&whoami)?);
    } else {
        println!("{} (@{}) <{}>", profile.name(), profile.username, profile.email);
        println!(
            "Session valid until {}",
            session.expires_at.format("%Y-%m-%d %H:%M UTC")
        );
    }
    Ok(())
}

fn handle_profile(
    app: &RecipeBox,
    sessions: &SessionFile,
    cmd: ProfileCommand,
) -> anyhow::Result<()> {
    match cmd {
        ProfileCommand::Show { username, json } => {
            let profile = match username {
                Some(username) => app.profile(&username)?,
                None => {
                    let session = require_session(app, sessions)?;
                    app.current_user(&session)?
                }
            };
            let recipes = app.storage().recipes_by_author(&profile.id)?;
            if json {
                let page = serde_json::json!({
                    "profile": profile,
                    "recipes": recipes,
                });
                println!("{}", serde_json::to_string_pretty(&page)?);
            } else {
                print!("{}", output::profile_page(&profile, recipes.len()));
            }
        }
        ProfileCommand::Edit(edit) => {
            let session = require_session(app, sessions)?;
            let changes = ProfileChanges {
                username: edit.username,
                display_name: edit.display_name,
                bio: edit.bio,
            };
            let avatar = image_change(edit.avatar, edit.remove_avatar);
            if changes.is_empty() && avatar == ImageChange::Keep {
                bail!("nothing to change");
            }
            let profile = app.update_profile(&session, &changes, &avatar)?;
            print!("{}", output::profile_page(&profile, app.my_recipes(&session)?.len()));
        }
    }
    Ok(())
}

fn image_change(file: Option<PathBuf>, remove: bool) -> ImageChange {
    match (file, remove) {
        (Some(path), _) => ImageChange::Replace(path),
        (None, true) => ImageChange::Remove,
        (None, false) => ImageChange::Keep,
    }
}

fn handle_recipe(app: &RecipeBox, sessions: &SessionFile, cmd: RecipeCommand) -> anyhow::Result<()> {
    match cmd {
        RecipeCommand::Add(add) => {
            let session = require_session(app, sessions)?;
            let image = image_change(add.image.clone(), false);
            let draft = build_draft(app, add)?;
            let card = app.create_recipe(&session, draft, &image)?;
            println!("Published recipe #{}", card.recipe.id);
            println!("{}", output::card_line(&card));
        }
        RecipeCommand::Show { id, json } => {
            let viewer = match sessions.load()? {
                Some(token) => app.session(&token).ok(),
                None => None,
            };
            let details = app.recipe_details(id, viewer.as_ref())?;
            if json {
                println!("{}", serde_json::to_string_pretty(&details)?);
            } else {
                print!("{}", output::recipe_page(&details));
            }
        }
        RecipeCommand::Edit(edit) => {
            let session = require_session(app, sessions)?;
            let id = edit.id;
            let image = image_change(edit.image.clone(), edit.no_image);
            let changes = build_changes(app, edit)?;
            if changes.is_empty() && image == ImageChange::Keep {
                bail!("nothing to change");
            }
            let card = app.update_recipe(&session, id, &changes, &image)?;
            println!("Updated recipe #{id}");
            println!("{}", output::card_line(&card));
        }
        RecipeCommand::Delete { id, yes } => {
            let session = require_session(app, sessions)?;
            let card = app.recipe(id)?;
            if !yes {
                println!(
                    "This will delete \"{}\" with its ratings and favorites.",
                    card.recipe.title
                );
                println!("Use --yes to confirm.");
                return Ok(());
            }
            let recipe = app.delete_recipe(&session, id)?;
            println!("Deleted recipe #{} \"{}\"", recipe.id, recipe.title);
        }
        RecipeCommand::Mine { json } => {
            let session = require_session(app, sessions)?;
            let recipes = app.my_recipes(&session)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&recipes)?);
            } else if recipes.is_empty() {
                println!("You have not published any recipes yet.");
            } else {
                print!("{}", output::recipe_list(&recipes));
            }
        }
    }
    Ok(())
}

fn build_draft(app: &RecipeBox, add: RecipeAddCommand) -> anyhow::Result<NewRecipe> {
    let mut draft = match &add.from_file {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            serde_json::from_str::<NewRecipe>(&text)
                .with_context(|| format!("invalid recipe file {}", path.display()))?
        }
        None => NewRecipe {
            title: add.title.unwrap_or_default(),
            description: add.description,
            ingredients: add.ingredients.into_iter().collect(),
            instructions: add.steps.into_iter().collect(),
            prep_minutes: add.prep,
            cook_minutes: add.cook,
            servings: add.servings,
            difficulty: add.difficulty.into(),
            image: None,
            category_id: None,
        },
    };

    if let Some(name) = &add.category {
        draft.category_id = Some(app.category(name)?.id);
    }
    Ok(draft)
}

/// Convert a 1-based position from the command line.
fn position(n: usize) -> anyhow::Result<usize> {
    n.checked_sub(1).context("positions start at 1")
}

fn build_changes(app: &RecipeBox, edit: RecipeEditCommand) -> anyhow::Result<RecipeChanges> {
    let current = app.recipe(edit.id)?.recipe;
    let mut changes = RecipeChanges {
        title: edit.title,
        description: edit.description,
        prep_minutes: edit.prep,
        cook_minutes: edit.cook,
        servings: edit.servings,
        difficulty: edit.difficulty.map(Into::into),
        ..RecipeChanges::default()
    };

    if !edit.remove_ingredient.is_empty() || !edit.add_ingredient.is_empty() {
        let mut ingredients = StepList::from(current.ingredients);
        let mut removals = edit
            .remove_ingredient
            .into_iter()
            .map(position)
            .collect::<anyhow::Result<Vec<_>>>()?;
        // Highest first so earlier positions stay put
        removals.sort_unstable_by(|a, b| b.cmp(a));
        removals.dedup();
        for index in removals {
            ingredients.remove(index)?;
        }
        for text in edit.add_ingredient {
            ingredients.push(text);
        }
        changes.ingredients = Some(ingredients);
    }

    let edits_steps = !edit.add_step.is_empty()
        || !edit.insert_step.is_empty()
        || !edit.replace_step.is_empty()
        || !edit.remove_step.is_empty()
        || edit.step_up.is_some()
        || edit.step_down.is_some();
    if edits_steps {
        let mut steps = StepList::from(current.instructions);
        for arg in &edit.replace_step {
            let (index, text) = parse_positioned(arg)?;
            steps.replace(index, text)?;
        }
        if let Some(n) = edit.step_up {
            steps.move_up(position(n)?)?;
        }
        if let Some(n) = edit.step_down {
            steps.move_down(position(n)?)?;
        }
        let mut removals = edit
            .remove_step
            .into_iter()
            .map(position)
            .collect::<anyhow::Result<Vec<_>>>()?;
        removals.sort_unstable_by(|a, b| b.cmp(a));
        removals.dedup();
        for index in removals {
            steps.remove(index)?;
        }
        for arg in &edit.insert_step {
            let (index, text) = parse_positioned(arg)?;
            steps.insert(index, text)?;
        }
        for text in edit.add_step {
            steps.push(text);
        }
        changes.instructions = Some(steps);
    }

    if edit.no_category {
        changes.category_id = Some(None);
    } else if let Some(name) = &edit.category {
        changes.category_id = Some(Some(app.category(name)?.id));
    }

    Ok(changes)
}

fn handle_feed(app: &RecipeBox, sessions: &SessionFile, cmd: &FeedCommand) -> anyhow::Result<()> {
    let limit = app.config().page_size(cmd.limit);
    let offset = cmd.page.saturating_sub(1).saturating_mul(limit);
    let mut query = FeedQuery::new().sort(cmd.sort.into()).page(limit, offset);

    if let Some(search) = &cmd.search {
        query = query.search(search.as_str());
    }
    if let Some(name) = &cmd.category {
        query = query.category(app.category(name)?.id);
    }
    if let Some(difficulty) = cmd.difficulty {
        query = query.difficulty(difficulty.into());
    }
    if let Some(minutes) = cmd.max_minutes {
        query = query.max_total_minutes(minutes);
    }
    if let Some(username) = &cmd.author {
        query = query.author(app.profile(username)?.id);
    }
    if cmd.favorites {
        let session = require_session(app, sessions)?;
        query = query.favorited_by(session.user_id);
    }
    if let Some(stars) = cmd.min_rating {
        query = query.min_rating(stars);
    }

    let page = app.feed(&query)?;
    match cmd.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&page)?),
        OutputFormat::Table => print!("{}", output::card_table(&page.cards)),
        OutputFormat::Plain => {
            for card in &page.cards {
                println!("{}", output::card_line(card));
            }
        }
    }

    if cmd.format != OutputFormat::Json {
        if page.cards.is_empty() {
            println!("No recipes found.");
        } else if page.has_more() {
            println!(
                "Showing {}-{} of {}. Use --page {} for more.",
                page.offset + 1,
                page.offset + page.cards.len(),
                page.total,
                cmd.page + 1
            );
        }
    }
    Ok(())
}

fn handle_favorite(
    app: &RecipeBox,
    sessions: &SessionFile,
    cmd: FavoriteCommand,
) -> anyhow::Result<()> {
    let session = require_session(app, sessions)?;
    match cmd {
        FavoriteCommand::Toggle { id } => {
            if app.toggle_favorite(&session, id)? {
                println!("♥ Added recipe #{id} to favorites");
            } else {
                println!("Removed recipe #{id} from favorites");
            }
        }
        FavoriteCommand::Add { id } => {
            if app.add_favorite(&session, id)? {
                println!("♥ Added recipe #{id} to favorites");
            } else {
                println!("Recipe #{id} is already a favorite");
            }
        }
        FavoriteCommand::Remove { id } => {
            if app.remove_favorite(&session, id)? {
                println!("Removed recipe #{id} from favorites");
            } else {
                println!("Recipe #{id} is not a favorite");
            }
        }
        FavoriteCommand::List { json } => {
            let cards = app.favorites(&session)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&cards)?);
            } else if cards.is_empty() {
                println!("No favorites yet.");
            } else {
                for card in &cards {
                    println!("{}", output::card_line(card));
                }
            }
        }
    }
    Ok(())
}

fn handle_status(app: &RecipeBox, json: bool) -> anyhow::Result<()> {
    let stats = app.stats()?;
    let config = app.config();
    if json {
        let status = serde_json::json!({
            "database_path": config.database_path(),
            "images_dir": config.images_dir(),
            "stats": stats,
        });
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        println!("recipebox status");
        println!("----------------");
        println!("Database:      {}", config.database_path().display());
        println!("Images:        {}", config.images_dir().display());
        println!();
        print!("{}", output::stats_page(&stats));
    }
    Ok(())
}

fn handle_config(config: &Config, cmd: ConfigCommand) -> anyhow::Result<()> {
    match cmd {
        ConfigCommand::Show { json } => {
            if json {
                println!("{}", serde_json::to_string_pretty(config)?);
            } else {
                println!("Current Configuration");
                println!("=====================");
                println!();
                println!("[Storage]");
                println!("  Database path:      {}", config.database_path().display());
                println!("  Images dir:         {}", config.images_dir().display());
                println!("  Session file:       {}", config.session_file().display());
                println!();
                println!("[Auth]");
                println!("  Session TTL (h):    {}", config.auth.session_ttl_hours);
                println!("  Min password len:   {}", config.auth.min_password_length);
                println!();
                println!("[Feed]");
                println!("  Default page size:  {}", config.feed.default_page_size);
                println!("  Max page size:      {}", config.feed.max_page_size);
                println!();
                println!("[Images]");
                println!("  Max bytes:          {}", config.images.max_bytes);
                println!(
                    "  Extensions:         {}",
                    config.images.allowed_extensions.join(", ")
                );
                println!();
                println!("[Ratings]");
                println!("  Max review length:  {}", config.ratings.max_review_length);
            }
        }
        ConfigCommand::Path => {
            println!("{}", Config::default_config_path().display());
        }
        ConfigCommand::Validate { file } => {
            let path = file.unwrap_or_else(Config::default_config_path);
            println!("Validating configuration: {}", path.display());
            match Config::load_from(Some(path)) {
                Ok(_) => println!("Configuration is valid."),
                Err(e) => println!("Configuration error: {e}"),
            }
        }
    }
    Ok(())
}
