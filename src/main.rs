// Entry point and high-level CLI flow.
//
// The binary loads the planning and execution workbooks once, then lets the
// user change the period and basin filters and regenerate the dashboard as
// often as needed. Every generation recomputes from the in-memory dataset.
mod classify;
mod config;
mod error;
mod filter;
mod loader;
mod logging;
mod normalize;
mod output;
mod reports;
mod types;
mod util;

use chrono::Local;
use clap::Parser;
use config::{parse_date, Cli, Settings};
use error::DashboardError;
use filter::{available_basins, BasinSelection, DateRange};
use loader::Loaded;
use std::io::{self, Write};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};

struct Session {
    settings: Settings,
    loaded: Option<Arc<Loaded>>,
}

fn prompt(text: &str) -> String {
    print!("{}", text);
    let _ = io::stdout().flush();
    let mut buf = String::new();
    io::stdin().read_line(&mut buf).ok();
    buf.trim().to_string()
}

/// Load (or reload) the workbooks and print a short summary of what was
/// found.
fn handle_load(session: &mut Session, reload: bool) {
    if reload {
        loader::clear_cache();
    }
    let loaded = loader::load_dataset(&session.settings.load);
    let r = &loaded.report;
    println!(
        "Planejamento: {} períodos, {} categorias de bacia",
        util::format_count(r.planning_year_rows),
        util::format_count(r.planning_categories)
    );
    println!(
        "Executado: {} registros de {} arquivo(s)",
        util::format_count(r.execution_rows),
        util::format_count(r.execution_files_loaded)
    );
    if r.execution_files_skipped > 0 {
        println!(
            "Aviso: {} arquivo(s) de execução ignorado(s).",
            util::format_count(r.execution_files_skipped)
        );
    }
    println!();
    session.loaded = Some(loaded);
}

fn handle_period(session: &mut Session) {
    let current = session.settings.range;
    let start = prompt(&format!(
        "Início [{}]: ",
        current.start().format("%Y-%m-%d")
    ));
    let end = prompt(&format!("Fim [{}]: ", current.end().format("%Y-%m-%d")));
    let parsed = (|| {
        let s = if start.is_empty() { current.start() } else { parse_date(&start)? };
        let e = if end.is_empty() { current.end() } else { parse_date(&end)? };
        DateRange::new(s, e)
    })();
    match parsed {
        Ok(range) => {
            session.settings.range = range;
            println!("Período atualizado.\n");
        }
        Err(e) => println!("Período inválido: {}\n", e),
    }
}

/// Turn "1,3" into the labels at those 1-based positions. Blank means all.
fn parse_basin_choice(input: &str, options: &[String]) -> Result<BasinSelection, String> {
    if input.trim().is_empty() {
        return Ok(BasinSelection::all());
    }
    input
        .split(',')
        .map(|tok| {
            let tok = tok.trim();
            tok.parse::<usize>()
                .ok()
                .and_then(|n| n.checked_sub(1))
                .and_then(|i| options.get(i).cloned())
                .ok_or_else(|| format!("opção inválida: '{}'", tok))
        })
        .collect()
}

fn handle_basins(session: &mut Session) {
    let Some(loaded) = session.loaded.as_ref() else {
        println!("Carregue os arquivos primeiro (opção 1).\n");
        return;
    };
    let options = available_basins(session.settings.variant(), &loaded.dataset.execution);
    if session.settings.basins.is_all() {
        println!("Seleção atual: todas");
    }
    for (i, label) in options.iter().enumerate() {
        let mark = if session.settings.basins.admits(label) { "x" } else { " " };
        println!("[{}] ({}) {}", i + 1, mark, label);
    }
    let input = prompt("Bacias (ex.: 1,3; vazio = todas): ");
    match parse_basin_choice(&input, &options) {
        Ok(sel) => {
            session.settings.basins = sel;
            println!("Filtro de bacias atualizado.\n");
        }
        Err(e) => println!("{}\n", e),
    }
}

/// Build, print and export the dashboard for the current filters.
fn generate(settings: &Settings, loaded: &Loaded) -> Result<(), DashboardError> {
    let report = reports::build_report(
        &loaded.dataset,
        &settings.range,
        &settings.basins,
        settings.variant(),
        settings.match_by,
    )?;
    output::print_report(&report);
    let written = output::export_report(&report, &settings.out_dir)?;
    info!(files = written.len(), dir = %settings.out_dir.display(), "exports written");
    println!(
        "(Tabelas exportadas para {})\n",
        settings.out_dir.display()
    );
    Ok(())
}

fn run_batch(settings: &Settings) -> Result<(), DashboardError> {
    let loaded = loader::load_dataset(&settings.load);
    generate(settings, &loaded)
}

fn run_menu(settings: Settings) {
    let mut session = Session {
        settings,
        loaded: None,
    };
    handle_load(&mut session, false);
    loop {
        println!("Painel Universalização");
        println!("[1] Recarregar arquivos");
        println!("[2] Definir período");
        println!("[3] Selecionar bacias");
        println!("[4] Gerar painel");
        println!("[5] Sair\n");
        match prompt("Opção: ").as_str() {
            "1" => handle_load(&mut session, true),
            "2" => handle_period(&mut session),
            "3" => handle_basins(&mut session),
            "4" => {
                println!();
                if let Some(loaded) = session.loaded.clone() {
                    if let Err(e) = generate(&session.settings, &loaded) {
                        error!("{}", e);
                        println!("Erro: {}\n", e);
                    }
                }
            }
            "5" => {
                println!("Encerrando.");
                break;
            }
            _ => println!("Opção inválida. Digite um número de 1 a 5.\n"),
        }
    }
}

fn run(cli: &Cli) -> Result<(), DashboardError> {
    let settings = Settings::resolve(cli, Local::now().date_naive())?;
    if settings.batch {
        return run_batch(&settings);
    }
    run_menu(settings);
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            eprintln!("Erro: {}", e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FileConfig;
    use crate::loader::fixtures::{tasks_sheet, write_workbook, Cell};
    use chrono::NaiveDate;
    use tempfile::tempdir;

    fn settings_for(dir: &std::path::Path, execution: &[&str], variant: &str) -> Settings {
        let mut args = vec![
            "universalization-report".to_string(),
            "--planning".to_string(),
            dir.join("plan.xlsx").display().to_string(),
            "--variant".to_string(),
            variant.to_string(),
            "--start".to_string(),
            "2025-01-01".to_string(),
            "--end".to_string(),
            "2025-02-28".to_string(),
            "--out-dir".to_string(),
            dir.join("out").display().to_string(),
            "--batch".to_string(),
        ];
        for e in execution {
            args.push("--execution".to_string());
            args.push(dir.join(e).display().to_string());
        }
        let cli = Cli::try_parse_from(args).unwrap();
        Settings::merge(&cli, FileConfig::default(), NaiveDate::from_ymd_opt(2026, 1, 1).unwrap())
            .unwrap()
    }

    #[test]
    fn missing_everything_is_fatal() {
        let dir = tempdir().unwrap();
        let settings = settings_for(dir.path(), &["nope.xlsx"], "small");
        assert!(matches!(run_batch(&settings), Err(DashboardError::NoData)));
        assert!(!dir.path().join("out").exists());
    }

    #[test]
    fn batch_run_exports_grouped_dashboard() {
        let dir = tempdir().unwrap();
        write_workbook(
            &dir.path().join("Executado BARRETO.xlsx"),
            &[(
                "Tarefas",
                tasks_sheet(&[("2025-01-15", 100.0, 2.0, "Centro"), ("2025-02-20", 50.0, 1.0, "Centro")]),
            )],
        );
        write_workbook(
            &dir.path().join("plan.xlsx"),
            &[(
                "Planejamento Físico Bacias",
                vec![
                    vec![Cell::Text("Mês"), Cell::Text("Engenhoca (Bacia Barreto)")],
                    vec![Cell::Text("jan/25"), Cell::Num(500.0)],
                ],
            )],
        );
        let settings = settings_for(dir.path(), &["Executado BARRETO.xlsx"], "grouped");
        run_batch(&settings).unwrap();

        let csv_text = std::fs::read_to_string(dir.path().join("out").join(output::COMPARISON_FILE)).unwrap();
        assert!(csv_text.contains("Bacia Barreto,500,150"));
        let summary = std::fs::read_to_string(dir.path().join("out").join(output::SUMMARY_FILE)).unwrap();
        assert!(summary.contains("Bacia Barreto"));
        assert!(!summary.contains("Centro"));
    }

    #[test]
    fn inverted_period_is_a_config_error() {
        let cli = Cli::try_parse_from([
            "universalization-report",
            "--start",
            "2025-03-01",
            "--end",
            "2025-01-01",
            "--batch",
        ])
        .unwrap();
        let err = run(&cli).unwrap_err();
        assert!(matches!(
            err,
            DashboardError::Config(crate::error::ConfigError::InvalidRange { .. })
        ));
        assert!(err.to_string().starts_with("configuration error:"));
    }

    #[test]
    fn basin_choice_parses_positions() {
        let options = vec!["Barreto".to_string(), "Icaraí".to_string(), "Sapê".to_string()];
        let sel = parse_basin_choice("1, 3", &options).unwrap();
        assert_eq!(sel.labels().collect::<Vec<_>>(), vec!["Barreto", "Sapê"]);
        assert!(parse_basin_choice("  ", &options).unwrap().is_all());
        assert!(parse_basin_choice("0", &options).is_err());
        assert!(parse_basin_choice("4", &options).is_err());
        assert!(parse_basin_choice("x", &options).is_err());
    }
}
