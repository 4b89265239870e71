//! CLI command definitions

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "mentorgate")]
#[command(about = "Inspect role navigation and feature gates", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Database URL
    #[arg(long, env = "DATABASE_URL", global = true)]
    pub database_url: Option<String>,

    /// Log filter when RUST_LOG is unset
    #[arg(long, default_value = "info", global = true)]
    pub log_level: String,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List the roles and the features each grants
    Roles,

    /// Print a role's navigation
    ///
    /// Examples:
    ///   mentorgate nav --role alumni
    ///   mentorgate nav --role admin --json
    Nav {
        /// Role name (student, alumni, admin)
        #[arg(short, long)]
        role: String,

        /// Print JSON instead of a tree
        #[arg(long)]
        json: bool,
    },

    /// Check whether a role may use a feature
    ///
    /// Examples:
    ///   mentorgate check --role admin --feature canManageUsers
    Check {
        #[arg(short, long)]
        role: String,

        /// Feature key, e.g. canCreateWebinars
        #[arg(short, long)]
        feature: String,
    },

    /// Check whether a route is within a role's navigation
    Route {
        #[arg(short, long)]
        role: String,

        /// Route path, e.g. /alumni/dashboard/settings
        path: String,
    },

    /// Print a role's landing route
    Landing {
        #[arg(short, long)]
        role: String,
    },

    /// Resolve a subject's effective role from the database
    Resolve {
        /// Subject (user) ID
        subject: String,
    },

    /// Follow a subject's effective role until interrupted
    Watch {
        /// Subject (user) ID
        subject: String,
    },

    /// Install the role-change notification trigger
    Init,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once("mentorgate").chain(args.iter().copied()))
    }

    #[test]
    fn test_nav_args() {
        let cli = parse(&["nav", "--role", "alumni", "--json"]).unwrap();
        match cli.command {
            Commands::Nav { role, json } => {
                assert_eq!(role, "alumni");
                assert!(json);
            }
            _ => panic!("expected nav"),
        }
        assert_eq!(cli.log_level, "info");
    }

    #[test]
    fn test_check_and_route_args() {
        let cli = parse(&["check", "-r", "admin", "-f", "canManageUsers"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Check { ref role, ref feature } if role == "admin" && feature == "canManageUsers"
        ));

        let cli = parse(&["route", "--role", "student", "/student/jobs/browse"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Route { ref role, ref path } if role == "student" && path == "/student/jobs/browse"
        ));
    }

    #[test]
    fn test_subject_commands_and_globals() {
        let cli = parse(&[
            "watch",
            "u-42",
            "--database-url",
            "postgres://app@localhost/campus",
            "--log-level",
            "debug",
        ])
        .unwrap();

        assert!(matches!(cli.command, Commands::Watch { ref subject } if subject == "u-42"));
        assert_eq!(cli.database_url.as_deref(), Some("postgres://app@localhost/campus"));
        assert_eq!(cli.log_level, "debug");

        assert!(matches!(parse(&["init"]).unwrap().command, Commands::Init));
        assert!(matches!(parse(&["roles"]).unwrap().command, Commands::Roles));
    }

    #[test]
    fn test_missing_required_args_rejected() {
        assert!(parse(&["nav"]).is_err());
        assert!(parse(&["check", "--role", "admin"]).is_err());
        assert!(parse(&["resolve"]).is_err());
        assert!(parse(&[]).is_err());
    }
}
