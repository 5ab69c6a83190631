use mig_core::OperationReport;
use serde::Serialize;

pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// One line per target, plus one for any operation that never reached its
/// targets.
pub fn print_reports(reports: &[OperationReport]) {
    let mut rows: Vec<[&str; 4]> = Vec::new();
    for report in reports {
        let module = report.module.as_str();
        if let Some(err) = &report.results.error {
            rows.push([module, "-", "-", err.as_str()]);
        }
        for (group, targets) in &report.results.results {
            for (target, status) in targets {
                rows.push([module, group.as_str(), target.as_str(), status.as_str()]);
            }
        }
    }
    print_table(["MODULE", "NAME", "TARGET", "STATUS"], &rows);
}

fn print_table<const N: usize>(headers: [&str; N], rows: &[[&str; N]]) {
    let mut widths = headers.map(str::len);
    for row in rows {
        for (w, cell) in widths.iter_mut().zip(row) {
            *w = (*w).max(cell.len());
        }
    }

    let line = |cells: &[&str; N]| {
        let padded: Vec<String> = cells
            .iter()
            .zip(&widths)
            .map(|(cell, &w)| format!("{cell:w$}"))
            .collect();
        println!("{}", padded.join("  ").trim_end());
    };

    line(&headers);
    let rules = widths.map(|w| "-".repeat(w));
    line(&rules.each_ref().map(String::as_str));
    for row in rows {
        line(row);
    }
}
