use crate::api::{self, ContractId, ContractSchedule, ContractTerms, ScheduleRepo};
use crate::core::finance::Money;

use serde::Serialize;
use thiserror::Error;
use tracing::{error, info};

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Debug, Error)]
pub enum Error {
    #[error("cant read contract")]
    CantReadContract,
    #[error("cant parse contract")]
    CantParseContract,
    #[error("cant read schedule")]
    CantReadSchedule,
    #[error("cant parse schedule")]
    CantParseSchedule,
    #[error("cant export schedule")]
    CantExport,
    #[error("storage init failed: {0}")]
    Init(String),
}

/// Парсит условия договора из YAML
///
/// # Arguments
///
/// * `path`: Путь к файлу
///
/// returns: ContractTerms
///
/// # Errors
/// - `CantReadContract` - Проблема чтения файла
/// - `CantParseContract` - Проблема парсинга файла
///
pub fn contract_from_yaml(path: &Path) -> Result<ContractTerms, Error> {
    let yaml_data = fs::read_to_string(path).map_err(|e| {
        error!("Невозможно прочитать файл {}: {e}", path.display());
        Error::CantReadContract
    })?;
    serde_yaml::from_str(&yaml_data).map_err(|e| {
        error!("Невозможно спарсить файл {}: {e}", path.display());
        Error::CantParseContract
    })
}

/// Читает JSON файл с графиком платежей
///
/// # Errors
/// - `CantReadSchedule` - Проблема чтения файла
/// - `CantParseSchedule` - Проблема парсинга файла
///
pub fn schedule_from_json(path: &Path) -> Result<ContractSchedule, Error> {
    let json_data = fs::read_to_string(path).map_err(|e| {
        error!("Невозможно прочитать файл: {e}");
        Error::CantReadSchedule
    })?;
    serde_json::from_str(&json_data).map_err(|e| {
        error!("Невозможно спарсить JSON файл {:?}: {e}", path.file_name());
        Error::CantParseSchedule
    })
}

#[derive(Serialize)]
struct CsvRow<'a> {
    n: usize,
    due_date: chrono::NaiveDate,
    amount: Money,
    payment_type: &'a str,
    description: &'a str,
    pinned: bool,
}

/// Выгружает платежи в CSV
///
/// # Errors
/// `CantExport` - ошибка записи
pub fn schedule_to_csv<W: Write>(schedule: &ContractSchedule, writer: W) -> Result<(), Error> {
    let mut wtr = csv::Writer::from_writer(writer);
    for (i, installment) in schedule.installments.iter().enumerate() {
        wtr.serialize(CsvRow {
            n: i + 1,
            due_date: installment.due_date,
            amount: installment.amount,
            payment_type: installment.payment_type.as_str(),
            description: &installment.description,
            pinned: installment.pinned,
        })
        .map_err(|e| {
            error!("Невозможно записать CSV: {e}");
            Error::CantExport
        })?;
    }
    wtr.flush().map_err(|_| Error::CantExport)
}

#[derive(Debug)]
pub struct FileSystem {
    root_dir: PathBuf,
    contracts_path: PathBuf,
    schedules_path: PathBuf,
}

impl FileSystem {
    const DEFAULT_CONTRACT_CONTENT: &'static str = include_str!("../example/contract.yaml");
    const EXAMPLE_CONTRACT_ID: &'static str = "example";

    fn root(&self) -> &PathBuf {
        &self.root_dir
    }

    fn contract_path(&self, id: &ContractId) -> PathBuf {
        self.contracts_path.join(format!("{id}.yaml"))
    }

    fn schedule_path(&self, id: &ContractId) -> PathBuf {
        self.schedules_path.join(format!("{id}.json"))
    }

    /// Подготавливает структуру хранилища (директории, пример договора)
    fn prepare_storage(&self) -> Result<(), Error> {
        info!("Хранилище не найдено, инициализирую: {}", self.root_dir.display());
        for dir in [&self.root_dir, &self.contracts_path, &self.schedules_path] {
            fs::create_dir_all(dir)
                .map_err(|e| Error::Init(format!("Ошибка создания {}: {e}", dir.display())))?;
            info!("Создана директория: {}", dir.display());
        }
        let example = self.contract_path(&Self::EXAMPLE_CONTRACT_ID.to_string());
        if !example.exists() {
            fs::write(&example, Self::DEFAULT_CONTRACT_CONTENT)
                .map_err(|e| Error::Init(format!("Ошибка создания примера: {e}")))?;
            info!("Создан пример договора: {}", example.display());
        }
        info!("Хранилище инициализировано: {}", self.root_dir.display());
        Ok(())
    }

    /// Инициализирует хранилище, если оно не инициализировано, и возвращает FileSystem
    ///
    /// # Errors
    /// `Init` - не удалось создать директории или пример договора
    pub fn init<P: AsRef<Path>>(root_dir: P) -> Result<Self, Error> {
        let root_dir = root_dir.as_ref().to_path_buf();
        let fs = Self {
            contracts_path: root_dir.join("contracts"),
            schedules_path: root_dir.join("schedules"),
            root_dir,
        };
        if fs.contracts_path.exists() && fs.schedules_path.exists() {
            return Ok(fs);
        }
        fs.prepare_storage()?;
        info!(fs = ?fs);
        Ok(fs)
    }

    fn full_storage(&self) -> impl Iterator<Item = ContractId> {
        let mut ids: Vec<_> = match fs::read_dir(&self.schedules_path) {
            Ok(rd) => rd
                .filter_map(|e| {
                    let path = e.ok()?.path();
                    if path.extension().is_some_and(|ext| ext == "json") {
                        path.file_stem()
                            .map(|os_str| os_str.to_string_lossy().to_string())
                    } else {
                        None
                    }
                })
                .collect(),
            Err(_) => Vec::new(),
        };
        ids.sort();
        ids.into_iter()
    }
}

impl ScheduleRepo for FileSystem {
    fn location(&self) -> &str {
        self.root().to_str().unwrap_or_default()
    }

    fn contract_terms(&self, id: &ContractId) -> Option<ContractTerms> {
        contract_from_yaml(&self.contract_path(id)).ok()
    }

    fn save_schedule(&self, schedule: &ContractSchedule) -> Result<(), api::Error> {
        let result_path = self.schedule_path(&schedule.id);
        let mut file = File::create(&result_path).map_err(|_| api::Error::CantSaveSchedule)?;

        let json_result =
            serde_json::to_string_pretty(schedule).map_err(|_| api::Error::CantSaveSchedule)?;
        file.write_all(json_result.as_bytes())
            .map_err(|_| api::Error::CantSaveSchedule)?;

        info!("Записано в {result_path:?}");
        Ok(())
    }

    fn schedule_ids<'r>(
        &'r self,
        from: Option<api::Cursor>,
        limit: usize,
    ) -> Box<dyn Iterator<Item = ContractId> + 'r> {
        let ids: Vec<_> = self.full_storage().collect();
        let start = from
            .as_ref()
            .and_then(|cursor| ids.iter().position(|p| p == cursor))
            .map_or(0, |idx| idx + 1);
        Box::new(ids.into_iter().skip(start).take(limit))
    }

    fn schedule_by_id(&self, id: &ContractId) -> Option<ContractSchedule> {
        match schedule_from_json(&self.schedule_path(id)) {
            Ok(schedule) => Some(schedule),
            Err(e) => {
                error!("Не удалось загрузить график {id}: {e:?}");
                None
            }
        }
    }
}
