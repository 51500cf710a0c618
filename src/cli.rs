use crate::api::{self, ContractSchedule, ScheduleRepo};
use crate::core::finance::Money;
use crate::storage::{self, FileSystem, schedule_to_csv};

use clap::{ArgAction, Parser, Subcommand};
use thiserror::Error;
use tracing::Level;

use std::io;
use std::path::PathBuf;

const PAGE_SIZE: usize = 20;

#[derive(Debug, Error)]
pub enum Error {
    #[error("cant find home directory, use --root")]
    NoHome,
    #[error("installment number starts from 1")]
    InvalidNumber,
    #[error(transparent)]
    Storage(#[from] storage::Error),
    #[error(transparent)]
    Api(#[from] api::Error),
}

#[derive(Parser)]
#[clap(name = "installments", version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Директория хранилища договоров и графиков
    #[clap(long, env = "INSTALLMENTS_HOME", global = true)]
    root: Option<PathBuf>,

    /// Подробный вывод (-v, -vv)
    #[clap(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Построить график по условиям договора и сохранить
    Plan { id: String },

    /// Показать сохранённый график
    Show { id: String },

    /// Удалить платёж (нумерация с 1), его сумма уйдёт остальным
    #[clap(alias = "rm")]
    Remove { id: String, number: usize },

    /// Изменилась сумма договора
    Retotal {
        id: String,
        total: Money,
        /// Подогнать платежи пропорционально, если они не сходятся с новой суммой
        #[clap(long)]
        renormalize: bool,
    },

    /// Изменить число платежей
    Count { id: String, count: u32 },

    /// Подогнать платежи под сумму договора пропорционально
    Renormalize { id: String },

    /// Список сохранённых графиков
    #[clap(alias = "ls")]
    List {
        #[clap(long)]
        from: Option<String>,
        #[clap(long, default_value_t = PAGE_SIZE)]
        limit: usize,
    },

    /// Выгрузить график в CSV
    Export { id: String },
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        _ => Level::DEBUG,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(io::stderr)
        .init();
}

fn storage_root(root: Option<PathBuf>) -> Result<PathBuf, Error> {
    root.or_else(|| dirs::home_dir().map(|h| h.join(".installments")))
        .ok_or(Error::NoHome)
}

/// Печатает график и сохраняет его, если он сходится
fn show_and_save(repo: &FileSystem, schedule: &ContractSchedule) -> Result<(), Error> {
    println!("{schedule}");
    match api::save_schedule(repo, schedule) {
        Ok(reconciliation) => {
            println!("{reconciliation}");
            Ok(())
        }
        Err(api::Error::Unbalanced { .. }) => {
            println!("{}", schedule.reconcile());
            println!("График не сохранён. Попробуйте renormalize");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

/// Запуск cli для работы с хранилищем договоров
///
/// # Errors
/// Хранилище недоступно, договора нет или операция над графиком невозможна
///
/// returns: Result<(), Error>
pub fn run() -> Result<(), Error> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let repo = FileSystem::init(storage_root(cli.root)?)?;

    match cli.command {
        Commands::Plan { id } => {
            let terms = api::contract_terms(&repo, &id)?;
            let schedule = api::plan_schedule(&id, &terms)?;
            show_and_save(&repo, &schedule)
        }
        Commands::Show { id } => {
            let schedule = api::schedule_by_id(&repo, &id)?;
            println!("{schedule}");
            println!("{}", schedule.reconcile());
            Ok(())
        }
        Commands::Remove { id, number } => {
            let index = number.checked_sub(1).ok_or(Error::InvalidNumber)?;
            let schedule = api::schedule_by_id(&repo, &id)?;
            show_and_save(&repo, &api::remove_installment(&schedule, index)?)
        }
        Commands::Retotal {
            id,
            total,
            renormalize,
        } => {
            let schedule = api::schedule_by_id(&repo, &id)?;
            let mut changed = api::change_total(&schedule, total)?;
            if !changed.reconcile().is_balanced() {
                if renormalize {
                    changed = api::renormalize_schedule(&changed);
                } else {
                    println!("Платежи не сходятся с новой суммой, повторите с --renormalize");
                }
            }
            show_and_save(&repo, &changed)
        }
        Commands::Count { id, count } => {
            let schedule = api::schedule_by_id(&repo, &id)?;
            show_and_save(&repo, &api::change_count(&schedule, count)?)
        }
        Commands::Renormalize { id } => {
            let schedule = api::schedule_by_id(&repo, &id)?;
            show_and_save(&repo, &api::renormalize_schedule(&schedule))
        }
        Commands::List { from, limit } => {
            let page = api::schedule_list(&repo, from, limit);
            println!("Хранилище: {}", repo.location());
            for schedule in page.iter() {
                println!(
                    "{:<20} {:>14} {}",
                    schedule.id,
                    schedule.total.to_string(),
                    schedule.reconcile()
                );
            }
            if let Some(next) = page.next_cursor {
                println!("Дальше: --from {next}");
            }
            Ok(())
        }
        Commands::Export { id } => {
            let schedule = api::schedule_by_id(&repo, &id)?;
            schedule_to_csv(&schedule, io::stdout().lock())?;
            Ok(())
        }
    }
}
