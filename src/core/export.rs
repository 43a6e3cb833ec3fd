use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use super::accounts::{AssetCategory, LedgerSeries};
use super::kpi::Kpi;
use super::ledger::{ExpenseCategory, RevenueCategory, TaxCategory};
use super::simulation::{RunResult, Simulation};

pub const SEPARATOR: &str = ";";
pub const CASH_FLOW_FILE: &str = "cash_flow.csv";
pub const BALANCE_SHEET_FILE: &str = "balance_sheet.csv";
pub const MONTE_CARLO_FILE: &str = "monte_carlo.csv";

fn unit(value: f64) -> String {
    (value.round() as i64).to_string()
}

fn percent(rate: f64) -> String {
    unit(rate * 100.0)
}

fn optional(value: Option<f64>) -> String {
    value.map(unit).unwrap_or_default()
}

fn write_row<W: Write>(out: &mut W, cells: &[String]) -> io::Result<()> {
    writeln!(out, "{}", cells.join(SEPARATOR))
}

pub fn write_cash_flow<W: Write>(out: &mut W, series: &LedgerSeries) -> io::Result<()> {
    let mut header = vec!["Year".to_string()];
    header.extend(RevenueCategory::ALL.iter().map(|c| c.label().to_string()));
    header.push("Total revenues".to_string());
    header.push("Taxable revenues".to_string());
    header.extend(TaxCategory::ALL.iter().map(|c| c.label().to_string()));
    header.push("Total taxes".to_string());
    header.push("Marginal tax rate (%)".to_string());
    header.extend(ExpenseCategory::ALL.iter().map(|c| c.label().to_string()));
    header.push("Total expenses".to_string());
    header.push("Net cash flow".to_string());
    header.push("Withdrawals".to_string());
    header.push("Deposit".to_string());
    header.push("Delayed taxable income".to_string());
    write_row(out, &header)?;

    for ledger in series.ledgers() {
        let mut row = vec![ledger.year().to_string()];
        row.extend(RevenueCategory::ALL.iter().map(|c| unit(ledger.revenues().get(*c))));
        row.push(unit(ledger.revenues().total()));
        row.push(unit(ledger.taxable_revenues()));
        row.extend(TaxCategory::ALL.iter().map(|c| unit(ledger.taxes().get(*c))));
        row.push(unit(ledger.taxes().total()));
        row.push(percent(ledger.marginal_tax_rate()));
        row.extend(ExpenseCategory::ALL.iter().map(|c| unit(ledger.expenses().get(*c))));
        row.push(unit(ledger.expenses().total()));
        row.push(unit(ledger.net_cash_flow()));
        row.push(unit(ledger.withdrawn()));
        row.push(unit(ledger.deposit().map_or(0.0, |d| d.amount)));
        row.push(unit(ledger.delayed_taxable_income()));
        write_row(out, &row)?;
    }
    Ok(())
}

pub fn write_balance_sheet<W: Write>(out: &mut W, series: &LedgerSeries) -> io::Result<()> {
    let mut header = vec!["Year".to_string()];
    header.extend(AssetCategory::ALL.iter().map(|c| c.label().to_string()));
    header.extend(
        ["Total assets", "Liabilities", "Net value", "Adults net value"]
            .iter()
            .map(|h| h.to_string()),
    );
    write_row(out, &header)?;

    for sheet in series.balance_sheets() {
        let mut row = vec![sheet.year.to_string()];
        row.extend(AssetCategory::ALL.iter().map(|c| unit(sheet.assets.get(*c))));
        row.push(unit(sheet.assets.total()));
        row.push(unit(sheet.liabilities));
        row.push(unit(sheet.net_value));
        row.push(unit(sheet.adults_net_value));
        write_row(out, &row)?;
    }
    Ok(())
}

pub fn write_monte_carlo<W: Write>(
    out: &mut W,
    kpis: &[Kpi],
    results: &[RunResult],
) -> io::Result<()> {
    let persons: Vec<&String> = results
        .first()
        .map(|r| r.inputs.persons.keys().collect())
        .unwrap_or_default();

    let mut header: Vec<String> = [
        "Run",
        "Inflation (%)",
        "Securities return (%)",
        "Bonds return (%)",
        "Pension devaluation (%)",
        "Expenses underevaluation (%)",
    ]
    .iter()
    .map(|h| h.to_string())
    .collect();
    for person in &persons {
        header.push(format!("{person} age of death"));
        header.push(format!("{person} dependency years"));
    }
    header.extend(kpis.iter().map(|k| k.kind().label().to_string()));
    header.push("Shortfall year".to_string());
    write_row(out, &header)?;

    for result in results {
        let inputs = &result.inputs;
        let mut row = vec![
            result.index.to_string(),
            percent(inputs.economy.inflation),
            percent(inputs.economy.securities_return),
            percent(inputs.economy.bonds_return),
            percent(inputs.socio_economy.pension_devaluation_rate),
            percent(inputs.socio_economy.expenses_underevaluation_rate),
        ];
        for person in &persons {
            let draw = inputs.persons.get(*person);
            row.push(optional(draw.map(|d| d.age_of_death)));
            row.push(optional(draw.map(|d| d.dependency_years)));
        }
        row.extend(result.kpi_values.iter().map(|v| optional(*v)));
        row.push(result.shortfall_year.map(|y| y.to_string()).unwrap_or_default());
        write_row(out, &row)?;
    }
    Ok(())
}

fn create(dir: &Path, name: &str) -> io::Result<(PathBuf, BufWriter<File>)> {
    let path = dir.join(name);
    let file = File::create(&path)?;
    Ok((path, BufWriter::new(file)))
}

pub fn write_series(dir: &Path, series: &LedgerSeries) -> io::Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)?;
    let (cash_flow, mut out) = create(dir, CASH_FLOW_FILE)?;
    write_cash_flow(&mut out, series)?;
    out.flush()?;

    let (balance_sheet, mut out) = create(dir, BALANCE_SHEET_FILE)?;
    write_balance_sheet(&mut out, series)?;
    out.flush()?;
    Ok(vec![cash_flow, balance_sheet])
}

pub fn write_all(dir: &Path, simulation: &Simulation) -> io::Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)?;
    let mut written = match simulation.last_series() {
        Some(series) => write_series(dir, series)?,
        None => Vec::new(),
    };
    if !simulation.run_results().is_empty() {
        let (path, mut out) = create(dir, MONTE_CARLO_FILE)?;
        write_monte_carlo(&mut out, simulation.kpis(), simulation.run_results())?;
        out.flush()?;
        written.push(path);
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::fixtures;
    use crate::core::kpi::KpiKind;
    use crate::core::simulation::SimulationSettings;

    fn render(write: impl FnOnce(&mut Vec<u8>) -> io::Result<()>) -> Vec<String> {
        let mut out = Vec::new();
        write(&mut out).expect("in-memory write");
        String::from_utf8(out)
            .expect("utf-8")
            .lines()
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn cash_flow_has_one_rounded_row_per_year() {
        let model = fixtures::retired_single(6_500.4, 1_000.0);
        let mut scenario = fixtures::scenario(&model);
        let series = LedgerSeries::build(2025, 20, &mut scenario);

        let lines = render(|out| write_cash_flow(out, &series));

        assert_eq!(lines.len(), 7);
        assert!(lines[0].starts_with("Year;Work income;Pensions;"));
        let columns = lines[0].split(';').count();
        assert!(lines.iter().all(|l| l.split(';').count() == columns));
        let first: Vec<&str> = lines[1].split(';').collect();
        assert_eq!(first[0], "2025");
        let net = lines[0]
            .split(';')
            .position(|h| h == "Net cash flow")
            .expect("net column");
        assert_eq!(first[net], "-1000");
        assert!(lines[1..].iter().all(|l| !l.contains('.')));
    }

    #[test]
    fn balance_sheet_lists_assets_and_net_value() {
        let model = fixtures::retired_single(10_000.0, 1_000.0);
        let mut scenario = fixtures::scenario(&model);
        let series = LedgerSeries::build(2025, 2, &mut scenario);

        let lines = render(|out| write_balance_sheet(out, &series));

        assert_eq!(
            lines[0],
            "Year;Free investments;Periodic investments;Real estate;Total assets;Liabilities;Net value;Adults net value"
        );
        assert_eq!(lines[2], "2026;8000;0;0;8000;0;8000;8000");
    }

    #[test]
    fn monte_carlo_file_has_one_row_per_run() {
        let model = fixtures::retired_single(6_500.0, 1_000.0);
        let kpis = vec![Kpi::new(KpiKind::MinimumAdultAssets, 0.0, 0.5).expect("kpi")];
        let settings = SimulationSettings {
            first_year: 2025,
            years: 10,
            runs: 3,
            seed: 4,
        };
        let mut simulation = Simulation::new(model, kpis, settings).expect("valid");
        simulation.compute(None).expect("computed");

        let lines = render(|out| {
            write_monte_carlo(out, simulation.kpis(), simulation.run_results())
        });

        assert_eq!(lines.len(), 4);
        assert!(lines[0].contains("Ana age of death;Ana dependency years"));
        assert!(lines[0].ends_with("Minimum adult assets;Shortfall year"));
        assert_eq!(lines[1], "1;0;0;0;0;0;100;0;0;2031");
    }

    #[test]
    fn write_all_creates_the_three_files() {
        let model = fixtures::retired_single(6_500.0, 1_000.0);
        let kpis = vec![Kpi::new(KpiKind::MinimumAdultAssets, 0.0, 0.5).expect("kpi")];
        let settings = SimulationSettings {
            first_year: 2025,
            years: 5,
            runs: 2,
            seed: 1,
        };
        let mut simulation = Simulation::new(model, kpis, settings).expect("valid");
        simulation.compute(None).expect("computed");
        let dir = std::env::temp_dir().join(format!("patrisim-export-{}", std::process::id()));

        let written = write_all(&dir, &simulation).expect("written");

        assert_eq!(written.len(), 3);
        assert!(written.iter().all(|p| p.exists()));
        std::fs::remove_dir_all(&dir).expect("cleanup");
    }
}
