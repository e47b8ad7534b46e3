use anyhow::{bail, Context, Result};
use chrono::{Local, NaiveDate, Utc};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use uuid::Uuid;
use visiotrack_core::{
    export_csv, export_file_name, filter, Criteria, Desk, ProfileField, SqliteSlot, StatusFilter,
};
use visiotrack_hw::Camera;

mod config;
mod scan;
mod view;

use config::Config;

#[derive(Parser)]
#[command(name = "visiotrack", about = "VisioTrack visitor check-in desk")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check in a visitor from a photo (upload or camera)
    Scan(scan::ScanArgs),
    /// List visitors, newest first
    List {
        #[command(flatten)]
        filters: FilterArgs,
        /// Print records as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show one visitor, with raw and reviewed profiles side by side
    Show {
        id: Uuid,
    },
    /// Check a visitor out
    Checkout {
        id: Uuid,
    },
    /// Correct a visitor's reviewed profile
    Edit {
        id: Uuid,
        #[command(flatten)]
        fields: ProfileArgs,
    },
    /// Remove a visitor from the log
    Delete {
        id: Uuid,
    },
    /// Export the (filtered) log as CSV
    Export {
        #[command(flatten)]
        filters: FilterArgs,
        /// Output file (default: visitor_log_<date>.csv); "-" for stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// List capture devices
    Cameras,
}

#[derive(Args, Default)]
struct FilterArgs {
    /// Earliest check-in date (YYYY-MM-DD, UTC day, inclusive)
    #[arg(long)]
    from: Option<NaiveDate>,
    /// Latest check-in date (YYYY-MM-DD, whole UTC day included)
    #[arg(long)]
    to: Option<NaiveDate>,
    /// Visitor status
    #[arg(long, value_enum, default_value_t = StatusArg::All)]
    status: StatusArg,
    /// Case-insensitive name substring
    #[arg(long)]
    name: Option<String>,
}

#[derive(Clone, Copy, Default, ValueEnum)]
enum StatusArg {
    #[default]
    All,
    CheckedIn,
    CheckedOut,
}

impl FilterArgs {
    fn criteria(&self) -> Criteria {
        Criteria {
            start_date: self.from,
            end_date: self.to,
            status: match self.status {
                StatusArg::All => StatusFilter::All,
                StatusArg::CheckedIn => StatusFilter::CheckedIn,
                StatusArg::CheckedOut => StatusFilter::CheckedOut,
            },
            name_substring: self.name.clone(),
        }
    }
}

/// Profile field overrides.
#[derive(Args, Default)]
pub(crate) struct ProfileArgs {
    #[arg(long)]
    name: Option<String>,
    #[arg(long)]
    age: Option<String>,
    #[arg(long)]
    gender: Option<String>,
    #[arg(long)]
    profession: Option<String>,
}

impl ProfileArgs {
    pub(crate) fn overrides(&self) -> Vec<(ProfileField, &str)> {
        [
            (ProfileField::Name, &self.name),
            (ProfileField::Age, &self.age),
            (ProfileField::Gender, &self.gender),
            (ProfileField::Profession, &self.profession),
        ]
        .into_iter()
        .filter_map(|(field, value)| value.as_deref().map(|v| (field, v)))
        .collect()
    }
}

fn open_desk(config: &Config) -> Result<Desk<SqliteSlot>> {
    let slot = SqliteSlot::open(&config.db_path)
        .with_context(|| format!("opening visitor database {}", config.db_path.display()))?;
    let desk = Desk::open(slot);
    tracing::debug!(
        path = %config.db_path.display(),
        records = desk.log().len(),
        "visitor log opened"
    );
    Ok(desk)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::from_env();

    match cli.command {
        Commands::Scan(args) => {
            let mut desk = open_desk(&config)?;
            scan::run(&config, &mut desk, args).await?;
        }
        Commands::List { filters, json } => {
            let desk = open_desk(&config)?;
            let records = filter(desk.log().records(), &filters.criteria());
            if json {
                println!("{}", serde_json::to_string_pretty(&records)?);
            } else {
                view::print_table(&records);
            }
        }
        Commands::Show { id } => {
            let desk = open_desk(&config)?;
            let Some(record) = desk.log().get(id) else {
                bail!("no visitor with id {id}");
            };
            view::print_details(record);
        }
        Commands::Checkout { id } => {
            let mut desk = open_desk(&config)?;
            if desk.log().get(id).and_then(|r| r.check_out_time()).is_some() {
                println!("Visitor {id} is already checked out");
            } else if desk.check_out(id, Utc::now()) {
                println!("Checked out {id}");
            } else {
                bail!("no visitor with id {id}");
            }
        }
        Commands::Edit { id, fields } => {
            let mut desk = open_desk(&config)?;
            let Some(record) = desk.log().get(id) else {
                bail!("no visitor with id {id}");
            };
            let overrides = fields.overrides();
            if overrides.is_empty() {
                bail!("nothing to change; pass --name, --age, --gender or --profession");
            }
            let corrected = overrides
                .into_iter()
                .fold(record.enhanced_profile().clone(), |p, (field, value)| {
                    p.with_field(field, value)
                });
            desk.correct_profile(id, corrected)
                .with_context(|| format!("updating visitor {id}"))?;
            println!("Updated {id}");
        }
        Commands::Delete { id } => {
            let mut desk = open_desk(&config)?;
            if !desk.remove(id) {
                bail!("no visitor with id {id}");
            }
            println!("Deleted {id}");
        }
        Commands::Export { filters, output } => {
            let desk = open_desk(&config)?;
            let records = filter(desk.log().records(), &filters.criteria());
            let csv = export_csv(&records, &Local).context("formatting CSV export")?;
            let path = output.unwrap_or_else(|| PathBuf::from(export_file_name(Local::now().date_naive())));
            if path.as_os_str() == "-" {
                print!("{csv}");
            } else {
                std::fs::write(&path, csv)
                    .with_context(|| format!("writing {}", path.display()))?;
                println!("Exported {} visitors to {}", records.len(), path.display());
            }
        }
        Commands::Cameras => {
            let devices = Camera::list_devices();
            if devices.is_empty() {
                println!("No capture devices found");
            }
            for d in devices {
                println!("{}  {} ({}, {})", d.path, d.name, d.driver, d.bus);
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_filter_args_to_criteria() {
        let cli = Cli::try_parse_from([
            "visiotrack", "list", "--from", "2024-06-01", "--to", "2024-06-10",
            "--status", "checked-out", "--name", "ali",
        ])
        .unwrap();
        let Commands::List { filters, json } = cli.command else {
            panic!("expected list");
        };
        assert!(!json);
        let c = filters.criteria();
        assert_eq!(c.start_date, NaiveDate::from_ymd_opt(2024, 6, 1));
        assert_eq!(c.end_date, NaiveDate::from_ymd_opt(2024, 6, 10));
        assert_eq!(c.status, StatusFilter::CheckedOut);
        assert_eq!(c.name_substring.as_deref(), Some("ali"));
    }

    #[test]
    fn test_default_filters_accept_everything() {
        assert_eq!(FilterArgs::default().criteria(), Criteria::default());
    }

    #[test]
    fn test_bad_date_rejected() {
        assert!(Cli::try_parse_from(["visiotrack", "list", "--from", "June 1st"]).is_err());
    }

    #[test]
    fn test_profile_overrides_in_field_order() {
        let args = ProfileArgs {
            profession: Some("Nurse".into()),
            name: Some("Dana".into()),
            ..Default::default()
        };
        assert_eq!(
            args.overrides(),
            vec![(ProfileField::Name, "Dana"), (ProfileField::Profession, "Nurse")]
        );
    }

    #[test]
    fn test_date_flags_document_utc_days() {
        use clap::CommandFactory;
        let cli = Cli::command();
        let list = cli.find_subcommand("list").unwrap();
        for flag in ["from", "to"] {
            let arg = list.get_arguments().find(|a| a.get_id() == flag).unwrap();
            let help = arg.get_help().unwrap().to_string();
            assert!(help.contains("UTC"), "{flag}: {help}");
        }
    }
}
