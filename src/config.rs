// Run configuration: command-line flags layered over an optional TOML file
// layered over built-in defaults.
use crate::classify::{MatchBy, Variant};
use crate::error::ConfigError;
use crate::filter::{BasinSelection, DateRange};
use crate::loader::{LoadRequest, SheetName};
use crate::util::parse_date_safe;
use chrono::NaiveDate;
use clap::{ArgAction, Parser};
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const DEFAULT_PLANNING_PATH: &str = "Universalização 2026.xlsx";
pub const DEFAULT_EXECUTION_PATH: &str = "Executado Obra Lean.xlsx";
pub const DEFAULT_START: &str = "2025-01-01";

const PLANNING_YEAR_SHEET: (&str, &[&str]) = ("Serviços por Ano", &["Services by Year"]);
const PLANNING_BASIN_SHEET: (&str, &[&str]) =
    ("Planejamento Físico Bacias", &["Basin Physical Planning"]);
const EXECUTION_SHEET: (&str, &[&str]) = ("Tarefas", &["Tasks"]);

#[derive(Parser, Debug, Default)]
#[command(
    name = "universalization-report",
    about = "Planned versus executed progress of the network universalization rollout"
)]
pub struct Cli {
    /// TOML file with paths, sheet names and default filters
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Planning workbook
    #[arg(long, value_name = "FILE")]
    pub planning: Option<PathBuf>,

    /// Execution workbook (repeatable)
    #[arg(long = "execution", value_name = "FILE", action = ArgAction::Append)]
    pub execution: Vec<PathBuf>,

    /// Folder holding the execution workbooks listed in the config file
    #[arg(long, value_name = "DIR")]
    pub execution_dir: Option<PathBuf>,

    #[arg(long, value_enum)]
    pub variant: Option<Variant>,

    /// Execution column matched against basins in the comparison chart
    #[arg(long, value_enum)]
    pub match_by: Option<MatchBy>,

    /// First day of the period (YYYY-MM-DD)
    #[arg(long, value_name = "DATE")]
    pub start: Option<String>,

    /// Last day of the period (YYYY-MM-DD), defaults to today
    #[arg(long, value_name = "DATE")]
    pub end: Option<String>,

    /// Basin to include (repeatable); all basins when omitted
    #[arg(long = "basin", value_name = "LABEL", action = ArgAction::Append)]
    pub basins: Vec<String>,

    /// Where exported CSV/JSON files are written
    #[arg(long, value_name = "DIR")]
    pub out_dir: Option<PathBuf>,

    /// Render once with the given filters and exit
    #[arg(long)]
    pub batch: bool,

    /// Increase log verbosity (-v, -vv)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct SheetConfig {
    pub planning_year: Option<String>,
    pub planning_basin: Option<String>,
    pub execution: Option<String>,
}

/// Contents of the optional TOML file. Every key is optional.
///
/// ```toml
/// variant = "grouped"
/// planning = "Universalização 2026.xlsx"
/// execution_dir = "executado"
/// execution_files = ["Executado Icaraí.xlsx", "Executado Barreto.xlsx"]
/// start = "2025-01-01"
///
/// [sheets]
/// execution = "Tarefas"
/// ```
#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct FileConfig {
    pub planning: Option<PathBuf>,
    pub execution: Vec<PathBuf>,
    pub execution_dir: Option<PathBuf>,
    pub execution_files: Vec<String>,
    pub variant: Option<Variant>,
    pub match_by: Option<MatchBy>,
    pub start: Option<String>,
    pub end: Option<String>,
    pub basins: Vec<String>,
    pub out_dir: Option<PathBuf>,
    pub sheets: SheetConfig,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub load: LoadRequest,
    pub match_by: MatchBy,
    pub range: DateRange,
    pub basins: BasinSelection,
    pub out_dir: PathBuf,
    pub batch: bool,
}

pub fn parse_date(s: &str) -> Result<NaiveDate, ConfigError> {
    parse_date_safe(Some(s)).ok_or_else(|| ConfigError::InvalidDate(s.to_string()))
}

fn sheet(configured: Option<&String>, default: (&str, &[&str])) -> SheetName {
    SheetName::new(configured.map_or(default.0, String::as_str), default.1)
}

impl Settings {
    /// Read the config file named by `--config`, if any, and merge.
    pub fn resolve(cli: &Cli, today: NaiveDate) -> Result<Self, ConfigError> {
        let file = match &cli.config {
            Some(path) => FileConfig::load(path)?,
            None => FileConfig::default(),
        };
        Self::merge(cli, file, today)
    }

    /// Flag beats file beats default.
    pub fn merge(cli: &Cli, file: FileConfig, today: NaiveDate) -> Result<Self, ConfigError> {
        let variant = cli.variant.or(file.variant).unwrap_or_default();
        let match_by = cli.match_by.or(file.match_by).unwrap_or_default();

        let planning_path = cli
            .planning
            .clone()
            .or(file.planning)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_PLANNING_PATH));

        let execution_dir = cli.execution_dir.clone().or(file.execution_dir);
        let execution_paths = if !cli.execution.is_empty() {
            cli.execution.clone()
        } else if !file.execution.is_empty() {
            file.execution
        } else {
            let dir = execution_dir.unwrap_or_default();
            if file.execution_files.is_empty() {
                vec![dir.join(DEFAULT_EXECUTION_PATH)]
            } else {
                file.execution_files.iter().map(|f| dir.join(f)).collect()
            }
        };

        let start = match cli.start.as_deref().or(file.start.as_deref()) {
            Some(s) => parse_date(s)?,
            None => parse_date(DEFAULT_START)?,
        };
        let end = match cli.end.as_deref().or(file.end.as_deref()) {
            Some(s) => parse_date(s)?,
            None => today,
        };
        let range = DateRange::new(start, end)?;

        let basins = if cli.basins.is_empty() {
            file.basins.into_iter().collect()
        } else {
            cli.basins.iter().cloned().collect()
        };

        Ok(Self {
            load: LoadRequest {
                planning_path,
                planning_year_sheet: sheet(file.sheets.planning_year.as_ref(), PLANNING_YEAR_SHEET),
                planning_basin_sheet: sheet(
                    file.sheets.planning_basin.as_ref(),
                    PLANNING_BASIN_SHEET,
                ),
                execution_paths,
                execution_sheet: sheet(file.sheets.execution.as_ref(), EXECUTION_SHEET),
                variant,
            },
            match_by,
            range,
            basins,
            out_dir: cli
                .out_dir
                .clone()
                .or(file.out_dir)
                .unwrap_or_else(|| PathBuf::from(".")),
            batch: cli.batch,
        })
    }

    pub fn variant(&self) -> Variant {
        self.load.variant
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 10).unwrap()
    }

    fn cli(args: &[&str]) -> Cli {
        let mut full = vec!["universalization-report"];
        full.extend_from_slice(args);
        Cli::try_parse_from(full).unwrap()
    }

    #[test]
    fn defaults_match_the_dashboard() {
        let s = Settings::merge(&cli(&[]), FileConfig::default(), today()).unwrap();
        assert_eq!(s.variant(), Variant::Small);
        assert_eq!(s.match_by, MatchBy::Basin);
        assert_eq!(s.load.planning_path, PathBuf::from(DEFAULT_PLANNING_PATH));
        assert_eq!(s.load.execution_paths, vec![PathBuf::from(DEFAULT_EXECUTION_PATH)]);
        assert_eq!(s.load.execution_sheet.primary, "Tarefas");
        assert_eq!(s.load.planning_year_sheet.aliases, vec!["Services by Year"]);
        assert_eq!(s.range.start(), NaiveDate::from_ymd_opt(2025, 1, 1).unwrap());
        assert_eq!(s.range.end(), today());
        assert!(s.basins.is_all());
        assert!(!s.batch);
    }

    #[test]
    fn flags_override_file_values() {
        let file: FileConfig = toml::from_str(
            r#"
            variant = "grouped"
            match_by = "sub-basin"
            planning = "plan.xlsx"
            start = "2025-03-01"
            basins = ["Bacia Sapê"]
            "#,
        )
        .unwrap();
        let c = cli(&["--variant", "small", "--start", "2025-06-01", "--basin", "Icaraí", "--batch"]);
        let s = Settings::merge(&c, file, today()).unwrap();
        assert_eq!(s.variant(), Variant::Small);
        assert_eq!(s.match_by, MatchBy::SubBasin);
        assert_eq!(s.load.planning_path, PathBuf::from("plan.xlsx"));
        assert_eq!(s.range.start(), NaiveDate::from_ymd_opt(2025, 6, 1).unwrap());
        assert_eq!(s.basins.labels().collect::<Vec<_>>(), vec!["Icaraí"]);
        assert!(s.batch);
    }

    #[test]
    fn execution_files_are_joined_to_the_folder() {
        let file: FileConfig = toml::from_str(
            r#"
            execution_dir = "exec"
            execution_files = ["Obra ICARAI.xlsx", "Obra BARRETO.xlsx"]

            [sheets]
            execution = "Planilha1"
            "#,
        )
        .unwrap();
        let s = Settings::merge(&cli(&["--execution-dir", "/data"]), file, today()).unwrap();
        assert_eq!(
            s.load.execution_paths,
            vec![PathBuf::from("/data/Obra ICARAI.xlsx"), PathBuf::from("/data/Obra BARRETO.xlsx")]
        );
        assert_eq!(s.load.execution_sheet.primary, "Planilha1");
        assert_eq!(s.load.execution_sheet.aliases, vec!["Tasks"]);
    }

    #[test]
    fn explicit_execution_flags_win() {
        let c = cli(&["--execution", "a.xlsx", "--execution", "b.xlsx"]);
        let s = Settings::merge(&c, FileConfig::default(), today()).unwrap();
        assert_eq!(s.load.execution_paths, vec![PathBuf::from("a.xlsx"), PathBuf::from("b.xlsx")]);
    }

    #[test]
    fn bad_dates_are_rejected() {
        let err = Settings::merge(&cli(&["--start", "ontem"]), FileConfig::default(), today());
        assert!(matches!(err, Err(ConfigError::InvalidDate(_))));

        let err = Settings::merge(
            &cli(&["--start", "2026-05-01", "--end", "2026-04-01"]),
            FileConfig::default(),
            today(),
        );
        assert!(matches!(err, Err(ConfigError::InvalidRange { .. })));
    }

    #[test]
    fn config_file_is_read_from_disk() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("painel.toml");
        std::fs::write(&path, "variant = \"grouped\"\nend = \"2025-12-31\"\n").unwrap();
        let c = Cli {
            config: Some(path),
            ..Cli::default()
        };
        let s = Settings::resolve(&c, today()).unwrap();
        assert_eq!(s.variant(), Variant::Grouped);
        assert_eq!(s.range.end(), NaiveDate::from_ymd_opt(2025, 12, 31).unwrap());

        std::fs::write(dir.path().join("bad.toml"), "variant = [").unwrap();
        let c = Cli {
            config: Some(dir.path().join("bad.toml")),
            ..Cli::default()
        };
        assert!(matches!(Settings::resolve(&c, today()), Err(ConfigError::Parse { .. })));

        let c = Cli {
            config: Some(dir.path().join("missing.toml")),
            ..Cli::default()
        };
        assert!(matches!(Settings::resolve(&c, today()), Err(ConfigError::Read { .. })));
    }
}
