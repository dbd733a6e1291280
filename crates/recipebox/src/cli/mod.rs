//! Command-line interface for recipebox.
//!
//! This module provides the CLI structure, the stored login session and
//! the text renderers used by the `recipebox` binary.

mod commands;
pub mod output;
mod session;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use commands::{
    parse_positioned, ConfigCommand, DifficultyArg, FavoriteCommand, FeedCommand, LoginCommand,
    OutputFormat, PasswordCommand, ProfileCommand, ProfileEditCommand, RateCommand,
    RecipeAddCommand, RecipeCommand, RecipeEditCommand, SignupCommand, SortArg, StatusCommand,
};
pub use session::SessionFile;

use crate::logging::Verbosity;

/// recipebox - Share, rate and collect recipes
///
/// Publish your recipes, browse what others cook, keep favorites and leave
/// ratings, all from the terminal.
#[derive(Debug, Parser)]
#[command(name = "recipebox")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to custom configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v for info, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Create an account and sign in
    Signup(SignupCommand),

    /// Sign in to an existing account
    Login(LoginCommand),

    /// Sign out
    Logout,

    /// Show who is signed in
    Whoami {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Change your password
    Passwd(PasswordCommand),

    /// View or edit profiles
    #[command(subcommand)]
    Profile(ProfileCommand),

    /// Publish, view and manage recipes
    #[command(subcommand)]
    Recipe(RecipeCommand),

    /// Browse the community feed
    Feed(FeedCommand),

    /// List recipe categories
    Categories {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Manage favorite recipes
    #[command(subcommand)]
    Favorite(FavoriteCommand),

    /// Rate a recipe
    Rate(RateCommand),

    /// Withdraw your rating of a recipe
    Unrate {
        /// Recipe id
        id: i64,
    },

    /// Show the ratings and reviews of a recipe
    Reviews {
        /// Recipe id
        id: i64,

        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show database status
    Status(StatusCommand),

    /// View or check configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

impl Cli {
    /// Get the verbosity level based on flags.
    #[must_use]
    pub fn verbosity(&self) -> Verbosity {
        Verbosity::from_flags(self.quiet, self.verbose)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_debug() {
        let cli = Cli::command();
        assert_eq!(cli.get_name(), "recipebox");
    }

    #[test]
    fn test_cli_verify() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_verbosity() {
        let cli = Cli::try_parse_from(["recipebox", "-q", "logout"]).unwrap();
        assert_eq!(cli.verbosity(), Verbosity::Quiet);

        let cli = Cli::try_parse_from(["recipebox", "logout"]).unwrap();
        assert_eq!(cli.verbosity(), Verbosity::Normal);

        let cli = Cli::try_parse_from(["recipebox", "-v", "logout"]).unwrap();
        assert_eq!(cli.verbosity(), Verbosity::Verbose);

        let cli = Cli::try_parse_from(["recipebox", "-vv", "logout"]).unwrap();
        assert_eq!(cli.verbosity(), Verbosity::Trace);
    }

    #[test]
    fn test_parse_with_config() {
        let args = ["recipebox", "-c", "/custom/config.toml", "status"];
        let cli = Cli::try_parse_from(args).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/custom/config.toml")));
    }

    #[test]
    fn test_parse_signup() {
        let cli = Cli::try_parse_from([
            "recipebox",
            "signup",
            "cook@example.com",
            "cook",
            "--display-name",
            "The Cook",
        ])
        .unwrap();
        let Command::Signup(cmd) = cli.command else {
            panic!("expected signup");
        };
        assert_eq!(cmd.username, "cook");
        assert_eq!(cmd.display_name.as_deref(), Some("The Cook"));
        assert!(cmd.password.is_none());
    }

    #[test]
    fn test_parse_recipe_add() {
        let cli = Cli::try_parse_from([
            "recipebox", "recipe", "add", "Pancakes", "-i", "2 eggs", "-i", "flour", "-s",
            "Whisk", "--prep", "5", "--difficulty", "medium", "--category", "Breakfast",
        ])
        .unwrap();
        let Command::Recipe(RecipeCommand::Add(cmd)) = cli.command else {
            panic!("expected recipe add");
        };
        assert_eq!(cmd.title.as_deref(), Some("Pancakes"));
        assert_eq!(cmd.ingredients, ["2 eggs", "flour"]);
        assert_eq!(cmd.steps, ["Whisk"]);
        assert_eq!(cmd.prep, 5);
        assert_eq!(cmd.servings, 4);
        assert_eq!(cmd.difficulty, DifficultyArg::Medium);
    }

    #[test]
    fn test_parse_recipe_add_requires_title() {
        assert!(Cli::try_parse_from(["recipebox", "recipe", "add"]).is_err());
        assert!(
            Cli::try_parse_from(["recipebox", "recipe", "add", "--from-file", "r.json"]).is_ok()
        );
    }

    #[test]
    fn test_parse_feed() {
        let cli = Cli::try_parse_from([
            "recipebox", "feed", "soup", "-s", "top-rated", "-t", "30", "--favorites",
        ])
        .unwrap();
        let Command::Feed(cmd) = cli.command else {
            panic!("expected feed");
        };
        assert_eq!(cmd.search.as_deref(), Some("soup"));
        assert_eq!(cmd.sort, SortArg::TopRated);
        assert_eq!(cmd.max_minutes, Some(30));
        assert!(cmd.favorites);
        assert_eq!(cmd.page, 1);
        assert_eq!(cmd.format, OutputFormat::Table);
    }

    #[test]
    fn test_parse_rate_range() {
        assert!(Cli::try_parse_from(["recipebox", "rate", "1", "5"]).is_ok());
        assert!(Cli::try_parse_from(["recipebox", "rate", "1", "0"]).is_err());
        assert!(Cli::try_parse_from(["recipebox", "rate", "1", "6"]).is_err());
    }

    #[test]
    fn test_parse_favorite_toggle() {
        let cli = Cli::try_parse_from(["recipebox", "favorite", "toggle", "7"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Favorite(FavoriteCommand::Toggle { id: 7 })
        ));
    }

    #[test]
    fn test_conflicting_image_flags() {
        assert!(Cli::try_parse_from([
            "recipebox", "recipe", "edit", "1", "--image", "a.png", "--no-image",
        ])
        .is_err());
    }
}
